//! Party and chat-party handlers, plus the membership helpers the
//! disconnect path reuses.

use super::{Ctx, PacketHandler};
use crate::error::{HandlerError, HandlerResult};
use crate::game::{messages, server_message, Env};
use crate::world::{LeaveOutcome, PendingDialog, World};
use runegate_proto::{server, PacketReader};

/// Dialog id space for party invites.
pub(crate) const DIALOG_PARTY_INVITE: u16 = 1;
pub(crate) const DIALOG_CHAT_PARTY_INVITE: u16 = 2;
pub(crate) const DIALOG_CLAN_INVITE: u16 = 3;
pub(crate) const DIALOG_TRADE_REQUEST: u16 = 4;

/// Meter lines to all other members when one member's HP moves.
pub fn party_hp_update(world: &World, env: &Env, char_id: u32) {
    let Some(p) = world.players.get(&char_id) else {
        return;
    };
    let Some(party_id) = p.party else { return };
    let Some(party) = world.parties.get(party_id) else {
        return;
    };
    let pkt = server::hp_meter(char_id, p.hp_ratio());
    for &member in &party.members {
        if member == char_id {
            continue;
        }
        if let Some(m) = world.players.get(&member) {
            env.sessions.send_to(m.session_id, &pkt);
        }
    }
}

/// Clear meter lines both ways between a departing member and the rest,
/// and between the departing member and themselves.
fn clear_meters(world: &World, env: &Env, departing: u32, others: &[u32]) {
    let departing_session = world.players.get(&departing).map(|p| p.session_id);
    let clear_departing = server::hp_meter_clear(departing);
    for &other in others {
        if other == departing {
            continue;
        }
        if let Some(o) = world.players.get(&other) {
            env.sessions.send_to(o.session_id, &clear_departing);
            if let Some(ds) = departing_session {
                env.sessions.send_to(ds, &server::hp_meter_clear(other));
            }
        }
    }
    if let Some(ds) = departing_session {
        env.sessions.send_to(ds, &clear_departing);
    }
}

/// Remove a char from its party (voluntary leave, kick, or disconnect),
/// applying the breakup rule and the meter-clearing protocol.
pub fn leave_party(world: &mut World, env: &Env, char_id: u32) {
    let Some(party_id) = world.players.get(&char_id).and_then(|p| p.party) else {
        return;
    };
    let name = world
        .players
        .get(&char_id)
        .map(|p| p.name.clone())
        .unwrap_or_default();

    match world.parties.leave(party_id, char_id) {
        LeaveOutcome::Removed { remaining } => {
            clear_meters(world, env, char_id, &remaining);
            let pkt = server::party_leave(&name, false);
            for &member in &remaining {
                if let Some(m) = world.players.get(&member) {
                    env.sessions.send_to(m.session_id, &pkt);
                }
            }
            if let Some(p) = world.players.get_mut(&char_id) {
                p.party = None;
            }
            if let Some(p) = world.players.get(&char_id) {
                env.sessions
                    .send_to(p.session_id, &server::party_leave(&name, false));
            }
        }
        LeaveOutcome::Dissolved { members } => {
            let pkt = server::party_leave(&name, true);
            for &member in &members {
                clear_meters(world, env, member, &members);
                if let Some(m) = world.players.get_mut(&member) {
                    m.party = None;
                }
                if let Some(m) = world.players.get(&member) {
                    env.sessions.send_to(m.session_id, &pkt);
                    server_message(env, m.session_id, messages::PARTY_DISSOLVED);
                }
            }
        }
        LeaveOutcome::NotAMember => {
            if let Some(p) = world.players.get_mut(&char_id) {
                p.party = None;
            }
        }
    }
}

/// Chat-party counterpart; same breakup rule, no meters.
pub fn leave_chat_party(world: &mut World, env: &Env, char_id: u32) {
    let Some(party_id) = world.players.get(&char_id).and_then(|p| p.chat_party) else {
        return;
    };
    let name = world
        .players
        .get(&char_id)
        .map(|p| p.name.clone())
        .unwrap_or_default();

    match world.chat_parties.leave(party_id, char_id) {
        LeaveOutcome::Removed { remaining } => {
            let pkt = server::party_leave(&name, false);
            for &member in &remaining {
                if let Some(m) = world.players.get(&member) {
                    env.sessions.send_to(m.session_id, &pkt);
                }
            }
            if let Some(p) = world.players.get_mut(&char_id) {
                p.chat_party = None;
            }
        }
        LeaveOutcome::Dissolved { members } => {
            let pkt = server::party_leave(&name, true);
            for &member in &members {
                if let Some(m) = world.players.get_mut(&member) {
                    m.chat_party = None;
                }
                if let Some(m) = world.players.get(&member) {
                    env.sessions.send_to(m.session_id, &pkt);
                }
            }
        }
        LeaveOutcome::NotAMember => {
            if let Some(p) = world.players.get_mut(&char_id) {
                p.chat_party = None;
            }
        }
    }
}

/// Accept path shared by the dialog handler.
pub(crate) fn join_party(world: &mut World, env: &Env, inviter: u32, joiner: u32) {
    let max = env.config.game.max_party_size;
    if world.players.get(&joiner).is_some_and(|p| p.party.is_some()) {
        return;
    }
    let party_id = match world.players.get(&inviter).and_then(|p| p.party) {
        Some(id) => {
            let is_leader = world.parties.get(id).is_some_and(|p| p.leader == inviter);
            if !is_leader || !world.parties.join(id, joiner, max) {
                return;
            }
            id
        }
        None => {
            let id = world.parties.create(inviter, joiner);
            if let Some(p) = world.players.get_mut(&inviter) {
                p.party = Some(id);
            }
            id
        }
    };
    if let Some(p) = world.players.get_mut(&joiner) {
        p.party = Some(party_id);
    }

    let joiner_name = world
        .players
        .get(&joiner)
        .map(|p| p.name.clone())
        .unwrap_or_default();
    let members: Vec<u32> = world
        .parties
        .get(party_id)
        .map(|p| p.members.clone())
        .unwrap_or_default();
    let pkt = server::party_join(&joiner_name);
    for &member in &members {
        if let Some(m) = world.players.get(&member) {
            env.sessions.send_to(m.session_id, &pkt);
        }
    }
    // Seed meters in both directions for the new pairing.
    for &member in &members {
        party_hp_update(world, env, member);
    }
}

pub(crate) fn join_chat_party(world: &mut World, env: &Env, inviter: u32, joiner: u32) {
    let max = env.config.game.max_party_size;
    if world
        .players
        .get(&joiner)
        .is_some_and(|p| p.chat_party.is_some())
    {
        return;
    }
    let party_id = match world.players.get(&inviter).and_then(|p| p.chat_party) {
        Some(id) => {
            if !world.chat_parties.join(id, joiner, max) {
                return;
            }
            id
        }
        None => {
            let id = world.chat_parties.create(inviter, joiner);
            if let Some(p) = world.players.get_mut(&inviter) {
                p.chat_party = Some(id);
            }
            id
        }
    };
    if let Some(p) = world.players.get_mut(&joiner) {
        p.chat_party = Some(party_id);
    }
    let joiner_name = world
        .players
        .get(&joiner)
        .map(|p| p.name.clone())
        .unwrap_or_default();
    if let Some(party) = world.chat_parties.get(party_id) {
        let pkt = server::party_join(&joiner_name);
        for &member in &party.members {
            if let Some(m) = world.players.get(&member) {
                env.sessions.send_to(m.session_id, &pkt);
            }
        }
    }
}

fn send_invite_dialog(
    ctx: &mut Ctx<'_>,
    target: u32,
    dialog: u16,
    pending: PendingDialog,
) -> HandlerResult {
    let char_id = ctx.char_id()?;
    if target == char_id {
        return Ok(());
    }
    let inviter_name = ctx
        .world
        .players
        .get(&char_id)
        .map(|p| p.name.clone())
        .unwrap_or_default();
    let Some(t) = ctx.world.players.get_mut(&target) else {
        return Err(HandlerError::TargetInvalid("offline"));
    };
    if t.dead || t.pending_dialog.is_some() {
        return Ok(());
    }
    t.pending_dialog = Some(pending);
    ctx.env.sessions.send_to(
        t.session_id,
        &server::yes_no_dialog(dialog, dialog, &[inviter_name.as_str()]),
    );
    Ok(())
}

pub struct PartyInviteHandler;

impl PacketHandler for PartyInviteHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, r: &mut PacketReader<'_>) -> HandlerResult {
        let target = r.u32()?;
        let char_id = ctx.char_id()?;

        // Only the leader extends an existing party.
        if let Some(party_id) = ctx.world.players.get(&char_id).and_then(|p| p.party) {
            let is_leader = ctx
                .world
                .parties
                .get(party_id)
                .is_some_and(|p| p.leader == char_id);
            if !is_leader {
                server_message(ctx.env, ctx.session_id, messages::NO_AUTHORITY);
                return Ok(());
            }
        }
        if ctx
            .world
            .players
            .get(&target)
            .is_some_and(|p| p.party.is_some())
        {
            server_message(ctx.env, ctx.session_id, messages::ALREADY_IN_PARTY);
            return Ok(());
        }
        send_invite_dialog(
            ctx,
            target,
            DIALOG_PARTY_INVITE,
            PendingDialog::PartyInvite { from: char_id },
        )
    }
}

pub struct PartyLeaveHandler;

impl PacketHandler for PartyLeaveHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, _r: &mut PacketReader<'_>) -> HandlerResult {
        let char_id = ctx.char_id()?;
        leave_party(ctx.world, ctx.env, char_id);
        Ok(())
    }
}

pub struct PartyKickHandler;

impl PacketHandler for PartyKickHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, r: &mut PacketReader<'_>) -> HandlerResult {
        let target_name = r.cstr()?;
        let char_id = ctx.char_id()?;
        let Some(party_id) = ctx.world.players.get(&char_id).and_then(|p| p.party) else {
            return Ok(());
        };
        let is_leader = ctx
            .world
            .parties
            .get(party_id)
            .is_some_and(|p| p.leader == char_id);
        if !is_leader {
            server_message(ctx.env, ctx.session_id, messages::NO_AUTHORITY);
            return Ok(());
        }
        let Some(target) = ctx.world.player_by_name(&target_name).map(|p| p.char_id) else {
            return Ok(());
        };
        if target != char_id {
            leave_party(ctx.world, ctx.env, target);
        }
        Ok(())
    }
}

pub struct ChatPartyInviteHandler;

impl PacketHandler for ChatPartyInviteHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, r: &mut PacketReader<'_>) -> HandlerResult {
        let target = r.u32()?;
        let char_id = ctx.char_id()?;
        send_invite_dialog(
            ctx,
            target,
            DIALOG_CHAT_PARTY_INVITE,
            PendingDialog::ChatPartyInvite { from: char_id },
        )
    }
}

pub struct ChatPartyLeaveHandler;

impl PacketHandler for ChatPartyLeaveHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, _r: &mut PacketReader<'_>) -> HandlerResult {
        let char_id = ctx.char_id()?;
        leave_chat_party(ctx.world, ctx.env, char_id);
        Ok(())
    }
}
