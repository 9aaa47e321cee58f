//! Clan handlers: create, invite, leave, kick, rank grants, member notes,
//! announcements, and emblem upload.

use super::party::DIALOG_CLAN_INVITE;
use super::{Ctx, PacketHandler};
use crate::error::{HandlerError, HandlerResult};
use crate::game::{messages, server_message, Env};
use crate::world::clan::{may_grant, ANNOUNCEMENT_MAX, NOTE_MAX, RANK_PRINCE};
use crate::world::{PendingDialog, World};
use runegate_proto::{server, PacketReader};
use tracing::warn;

/// Sub-operations of the clan packet.
const OP_CREATE: u8 = 1;
const OP_INVITE: u8 = 2;
const OP_LEAVE: u8 = 3;
const OP_KICK: u8 = 4;
const OP_RANK: u8 = 5;
const OP_NOTE: u8 = 6;

/// Write-through of a clan's current state.
pub(crate) fn persist_clan(world: &World, env: &Env, clan_id: u32) {
    let Some(c) = world.clans.get(clan_id) else {
        return;
    };
    let row = crate::db::ClanRow {
        clan_id: c.clan_id,
        name: c.name.clone(),
        leader: c.leader,
        announcement: c.announcement.clone(),
        emblem_id: c.emblem_id,
    };
    let members: Vec<crate::db::ClanMemberRow> = c
        .members
        .values()
        .map(|m| crate::db::ClanMemberRow {
            clan_id: c.clan_id,
            char_id: m.char_id,
            name: m.name.clone(),
            rank: m.rank,
            notes: m.notes.clone(),
        })
        .collect();
    let db = env.db.clone();
    if let Err(e) = env
        .rt
        .block_on(async { db.clans().save(&row, &members).await })
    {
        warn!(clan = %clan_id, error = %e, "Clan save failed");
    }
}

fn broadcast_to_clan(world: &World, env: &Env, clan_id: u32, pkt: &bytes::Bytes) {
    let members = world
        .clans
        .get(clan_id)
        .map(|c| c.online_members())
        .unwrap_or_default();
    for member in members {
        if let Some(m) = world.players.get(&member) {
            env.sessions.send_to(m.session_id, pkt);
        }
    }
}

pub struct ClanHandler;

impl PacketHandler for ClanHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, r: &mut PacketReader<'_>) -> HandlerResult {
        let op = r.u8()?;
        match op {
            OP_CREATE => {
                let name = r.cstr()?;
                create(ctx, name)
            }
            OP_INVITE => {
                let target = r.u32()?;
                invite(ctx, target)
            }
            OP_LEAVE => leave(ctx),
            OP_KICK => {
                let name = r.cstr()?;
                kick(ctx, name)
            }
            OP_RANK => {
                let name = r.cstr()?;
                let rank = r.u8()?;
                grant_rank(ctx, name, rank)
            }
            OP_NOTE => {
                let name = r.cstr()?;
                let note = r.cstr()?;
                set_note(ctx, name, note)
            }
            _ => Ok(()),
        }
    }
}

fn create(ctx: &mut Ctx<'_>, name: String) -> HandlerResult {
    let char_id = ctx.char_id()?;
    if name.is_empty() || name.len() > 16 {
        return Ok(());
    }
    let (my_name, has_clan) = {
        let p = ctx
            .world
            .players
            .get(&char_id)
            .ok_or(HandlerError::TargetInvalid("gone"))?;
        (p.name.clone(), p.clan.is_some())
    };
    if has_clan || ctx.world.clans.iter().any(|c| c.name == name) {
        return Ok(());
    }
    let clan_id = ctx.world.clans.create(name, char_id, my_name);
    if let Some(p) = ctx.world.players.get_mut(&char_id) {
        p.clan = Some(clan_id);
        p.clan_rank = RANK_PRINCE;
        p.dirty = true;
    }
    persist_clan(ctx.world, ctx.env, clan_id);
    Ok(())
}

fn invite(ctx: &mut Ctx<'_>, target: u32) -> HandlerResult {
    let char_id = ctx.char_id()?;
    let Some(_clan_id) = ctx.world.players.get(&char_id).and_then(|p| p.clan) else {
        return Ok(());
    };
    // Prince-only invitation keeps the grant matrix simple downstream.
    if ctx
        .world
        .players
        .get(&char_id)
        .is_none_or(|p| p.clan_rank != RANK_PRINCE)
    {
        server_message(ctx.env, ctx.session_id, messages::NO_AUTHORITY);
        return Ok(());
    }
    let my_name = ctx
        .world
        .players
        .get(&char_id)
        .map(|p| p.name.clone())
        .unwrap_or_default();
    let Some(t) = ctx.world.players.get_mut(&target) else {
        return Err(HandlerError::TargetInvalid("offline"));
    };
    if t.clan.is_some() || t.pending_dialog.is_some() {
        return Ok(());
    }
    t.pending_dialog = Some(PendingDialog::ClanInvite { from: char_id });
    ctx.env.sessions.send_to(
        t.session_id,
        &server::yes_no_dialog(DIALOG_CLAN_INVITE, DIALOG_CLAN_INVITE, &[my_name.as_str()]),
    );
    Ok(())
}

fn leave(ctx: &mut Ctx<'_>) -> HandlerResult {
    let char_id = ctx.char_id()?;
    remove_member(ctx.world, ctx.env, char_id);
    Ok(())
}

/// Shared by voluntary leave and kick. The leader cannot leave a clan
/// with remaining members.
pub(crate) fn remove_member(world: &mut World, env: &Env, char_id: u32) {
    let Some(clan_id) = world.players.get(&char_id).and_then(|p| p.clan) else {
        return;
    };
    let name = world
        .players
        .get(&char_id)
        .map(|p| p.name.clone())
        .unwrap_or_default();

    let removed = {
        let Some(c) = world.clans.get_mut(clan_id) else {
            return;
        };
        if c.leader == char_id && c.members.len() > 1 {
            return;
        }
        c.release_warehouse(char_id);
        c.members.remove(&char_id).is_some()
    };
    if !removed {
        return;
    }
    if let Some(p) = world.players.get_mut(&char_id) {
        p.clan = None;
        p.clan_rank = 0;
        p.dirty = true;
    }
    let pkt = server::clan_leave(&name);
    broadcast_to_clan(world, env, clan_id, &pkt);

    let now_empty = world.clans.get(clan_id).is_some_and(|c| c.members.is_empty());
    if now_empty {
        let db = env.db.clone();
        if let Err(e) = env.rt.block_on(async { db.clans().delete(clan_id).await }) {
            warn!(clan = %clan_id, error = %e, "Clan delete failed");
        }
    } else {
        persist_clan(world, env, clan_id);
    }
}

fn kick(ctx: &mut Ctx<'_>, name: String) -> HandlerResult {
    let char_id = ctx.char_id()?;
    let Some(clan_id) = ctx.world.players.get(&char_id).and_then(|p| p.clan) else {
        return Ok(());
    };
    if ctx
        .world
        .players
        .get(&char_id)
        .is_none_or(|p| p.clan_rank != RANK_PRINCE)
    {
        server_message(ctx.env, ctx.session_id, messages::NO_AUTHORITY);
        return Ok(());
    }
    let target = ctx
        .world
        .clans
        .get(clan_id)
        .and_then(|c| c.members.values().find(|m| m.name == name))
        .map(|m| m.char_id);
    if let Some(target) = target {
        if target != char_id {
            remove_member(ctx.world, ctx.env, target);
        }
    }
    Ok(())
}

fn grant_rank(ctx: &mut Ctx<'_>, name: String, rank: u8) -> HandlerResult {
    let char_id = ctx.char_id()?;
    let Some(clan_id) = ctx.world.players.get(&char_id).and_then(|p| p.clan) else {
        return Ok(());
    };
    let granter_rank = ctx
        .world
        .players
        .get(&char_id)
        .map(|p| p.clan_rank)
        .unwrap_or(0);
    if !may_grant(granter_rank, rank) {
        server_message(ctx.env, ctx.session_id, messages::NO_AUTHORITY);
        return Ok(());
    }

    let target = {
        let Some(c) = ctx.world.clans.get_mut(clan_id) else {
            return Ok(());
        };
        let Some(m) = c.members.values_mut().find(|m| m.name == name) else {
            return Ok(());
        };
        m.rank = rank;
        m.char_id
    };
    if let Some(p) = ctx.world.players.get_mut(&target) {
        p.clan_rank = rank;
        p.dirty = true;
    }
    let pkt = server::clan_rank(&name, rank);
    broadcast_to_clan(ctx.world, ctx.env, clan_id, &pkt);
    persist_clan(ctx.world, ctx.env, clan_id);
    Ok(())
}

fn set_note(ctx: &mut Ctx<'_>, name: String, note: String) -> HandlerResult {
    let char_id = ctx.char_id()?;
    let Some(clan_id) = ctx.world.players.get(&char_id).and_then(|p| p.clan) else {
        return Ok(());
    };
    if note.len() > NOTE_MAX {
        return Ok(());
    }
    let changed = {
        let Some(c) = ctx.world.clans.get_mut(clan_id) else {
            return Ok(());
        };
        match c.members.values_mut().find(|m| m.name == name) {
            Some(m) => {
                m.notes = note;
                true
            }
            None => false,
        }
    };
    if changed {
        persist_clan(ctx.world, ctx.env, clan_id);
    }
    Ok(())
}

pub struct ClanAnnouncementHandler;

impl PacketHandler for ClanAnnouncementHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, r: &mut PacketReader<'_>) -> HandlerResult {
        let text = r.cstr()?;
        if text.len() > ANNOUNCEMENT_MAX {
            return Ok(());
        }
        let char_id = ctx.char_id()?;
        let Some(clan_id) = ctx.world.players.get(&char_id).and_then(|p| p.clan) else {
            return Ok(());
        };
        if ctx
            .world
            .players
            .get(&char_id)
            .is_none_or(|p| p.clan_rank != RANK_PRINCE)
        {
            server_message(ctx.env, ctx.session_id, messages::NO_AUTHORITY);
            return Ok(());
        }
        if let Some(c) = ctx.world.clans.get_mut(clan_id) {
            c.announcement = text.clone();
        }
        let pkt = server::clan_announcement(&text);
        broadcast_to_clan(ctx.world, ctx.env, clan_id, &pkt);
        persist_clan(ctx.world, ctx.env, clan_id);
        Ok(())
    }
}

pub struct ClanEmblemHandler;

impl PacketHandler for ClanEmblemHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, r: &mut PacketReader<'_>) -> HandlerResult {
        let len = r.u16()? as usize;
        let data = r.raw(len)?.to_vec();
        let char_id = ctx.char_id()?;
        let Some(clan_id) = ctx.world.players.get(&char_id).and_then(|p| p.clan) else {
            return Ok(());
        };
        // Prince-only upload.
        if ctx
            .world
            .players
            .get(&char_id)
            .is_none_or(|p| p.clan_rank != RANK_PRINCE)
        {
            server_message(ctx.env, ctx.session_id, messages::NO_AUTHORITY);
            return Ok(());
        }

        let emblem_id = ctx.world.clans.allocate_emblem_id();
        let dir = std::path::Path::new(&ctx.env.config.server.emblem_dir);
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!(error = %e, "Emblem directory unavailable");
            return Ok(());
        }
        let path = dir.join(emblem_id.to_string());
        if let Err(e) = std::fs::write(&path, &data) {
            warn!(error = %e, path = %path.display(), "Emblem write failed");
            return Ok(());
        }
        if let Some(c) = ctx.world.clans.get_mut(clan_id) {
            c.emblem_id = emblem_id;
        }
        let pkt = server::emblem(clan_id, emblem_id, &data);
        broadcast_to_clan(ctx.world, ctx.env, clan_id, &pkt);
        persist_clan(ctx.world, ctx.env, clan_id);
        Ok(())
    }
}
