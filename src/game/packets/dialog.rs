//! Yes/no dialog answers.
//!
//! Every outstanding question a player can be asked funnels through one
//! pending slot; the answer packet routes by what was pending, not by the
//! dialog id the client echoes.

use super::clan::persist_clan;
use super::party::{join_chat_party, join_party};
use super::{Ctx, PacketHandler};
use crate::error::HandlerResult;
use crate::game::trade::open_trade;
use crate::world::{ClanMember, PendingDialog};
use runegate_proto::{server, PacketReader};

pub struct DialogAnswerHandler;

impl PacketHandler for DialogAnswerHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, r: &mut PacketReader<'_>) -> HandlerResult {
        let _dialog_id = r.u16()?;
        let answer = r.u8()? != 0;

        let char_id = ctx.char_id()?;
        let pending = {
            let Some(p) = ctx.world.players.get_mut(&char_id) else {
                return Ok(());
            };
            p.pending_dialog.take()
        };
        let Some(pending) = pending else {
            return Ok(());
        };
        if !answer {
            return Ok(());
        }

        match pending {
            PendingDialog::PartyInvite { from } => {
                join_party(ctx.world, ctx.env, from, char_id);
            }
            PendingDialog::ChatPartyInvite { from } => {
                join_chat_party(ctx.world, ctx.env, from, char_id);
            }
            PendingDialog::ClanInvite { from } => {
                accept_clan_invite(ctx, from, char_id);
            }
            PendingDialog::TradeRequest { from } => {
                let _ = open_trade(ctx.world, ctx.env, from, char_id);
            }
        }
        Ok(())
    }
}

fn accept_clan_invite(ctx: &mut Ctx<'_>, inviter: u32, joiner: u32) {
    let Some(clan_id) = ctx.world.players.get(&inviter).and_then(|p| p.clan) else {
        return;
    };
    if ctx.world.players.get(&joiner).is_some_and(|p| p.clan.is_some()) {
        return;
    }
    let joiner_name = ctx
        .world
        .players
        .get(&joiner)
        .map(|p| p.name.clone())
        .unwrap_or_default();

    let Some(c) = ctx.world.clans.get_mut(clan_id) else {
        return;
    };
    c.members.insert(
        joiner,
        ClanMember {
            char_id: joiner,
            name: joiner_name.clone(),
            rank: 2,
            notes: String::new(),
            online: true,
        },
    );
    if let Some(p) = ctx.world.players.get_mut(&joiner) {
        p.clan = Some(clan_id);
        p.clan_rank = 2;
        p.dirty = true;
    }

    let pkt = server::clan_join(&joiner_name);
    let members = ctx
        .world
        .clans
        .get(clan_id)
        .map(|c| c.online_members())
        .unwrap_or_default();
    for member in members {
        if let Some(m) = ctx.world.players.get(&member) {
            ctx.env.sessions.send_to(m.session_id, &pkt);
        }
    }
    persist_clan(ctx.world, ctx.env, clan_id);
}
