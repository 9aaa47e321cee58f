//! Chat handlers.

use super::{Ctx, PacketHandler};
use crate::error::HandlerResult;
use crate::game::broadcast_nearby;
use runegate_proto::{server, PacketReader};

/// Tiles a normal say carries.
const SAY_RADIUS: i32 = 12;
/// Tiles a shout carries.
const SHOUT_RADIUS: i32 = 30;

/// Chat kinds on the wire.
const KIND_NORMAL: u8 = 0;
const KIND_SHOUT: u8 = 1;
const KIND_WHISPER: u8 = 2;
const KIND_PARTY: u8 = 3;
const KIND_CLAN: u8 = 4;

pub struct ChatHandler;

impl PacketHandler for ChatHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, r: &mut PacketReader<'_>) -> HandlerResult {
        let kind = r.u8()?;
        let text = r.cstr()?;
        if text.is_empty() {
            return Ok(());
        }

        let char_id = ctx.char_id()?;
        let Some(p) = ctx.world.players.get(&char_id) else {
            return Ok(());
        };
        let (map, x, y, name) = (p.map, p.x, p.y, p.name.clone());

        match kind {
            KIND_NORMAL | KIND_SHOUT => {
                let radius = if kind == KIND_SHOUT {
                    SHOUT_RADIUS
                } else {
                    SAY_RADIUS
                };
                let pkt = server::say(char_id, kind, &name, &text);
                for session in ctx.world.nearby_player_sessions(map, x, y, radius) {
                    ctx.env.sessions.send_to(session, &pkt);
                }
            }
            KIND_PARTY => {
                let Some(party_id) = ctx.world.players.get(&char_id).and_then(|p| p.party) else {
                    return Ok(());
                };
                let Some(party) = ctx.world.parties.get(party_id) else {
                    return Ok(());
                };
                let pkt = server::say(char_id, KIND_PARTY, &name, &text);
                for &member in &party.members {
                    if let Some(m) = ctx.world.players.get(&member) {
                        ctx.env.sessions.send_to(m.session_id, &pkt);
                    }
                }
            }
            KIND_CLAN => {
                let Some(clan_id) = ctx.world.players.get(&char_id).and_then(|p| p.clan) else {
                    return Ok(());
                };
                let Some(clan) = ctx.world.clans.get(clan_id) else {
                    return Ok(());
                };
                let pkt = server::say(char_id, KIND_CLAN, &name, &text);
                for member in clan.online_members() {
                    if let Some(m) = ctx.world.players.get(&member) {
                        ctx.env.sessions.send_to(m.session_id, &pkt);
                    }
                }
            }
            _ => {
                // Unknown chat kinds fall back to local say.
                let pkt = server::say(char_id, KIND_NORMAL, &name, &text);
                broadcast_nearby(ctx.world, ctx.env, map, x, y, &pkt);
            }
        }
        Ok(())
    }
}

pub struct WhisperHandler;

impl PacketHandler for WhisperHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, r: &mut PacketReader<'_>) -> HandlerResult {
        let target_name = r.cstr()?;
        let text = r.cstr()?;
        if text.is_empty() {
            return Ok(());
        }

        let char_id = ctx.char_id()?;
        let Some(p) = ctx.world.players.get(&char_id) else {
            return Ok(());
        };
        let name = p.name.clone();

        let Some(target) = ctx.world.player_by_name(&target_name) else {
            return Ok(());
        };
        let pkt = server::say(char_id, KIND_WHISPER, &name, &text);
        ctx.env.sessions.send_to(target.session_id, &pkt);
        Ok(())
    }
}
