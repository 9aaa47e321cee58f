//! Disconnect cleanup.
//!
//! Runs in one strict order, atomic from the view of every other system
//! (nothing else runs mid-sequence on the tick thread):
//!
//! 1. Cancel any active trade, restoring both sides.
//! 2. Leave party and chat party under the breakup rule, clearing meters.
//! 3. Release the clan-warehouse lock, mark the member offline.
//! 4. Destroy owned companions (followers restore their NPC, pets save).
//! 5. Broadcast the removal and clear the tile.
//! 6. Save the character with everything it owns.

use super::ai::companion::destroy_companion;
use super::packets::{leave_chat_party, leave_party};
use super::{broadcast_nearby, persist, trade, warehouse, Env};
use crate::world::World;
use runegate_proto::server;
use tracing::{info, warn};

/// Full cleanup for a closing session. Safe to call for sessions that
/// never entered the world.
pub fn cleanup_session(world: &mut World, env: &Env, session_id: u64) {
    let Some(char_id) = world.char_by_session(session_id) else {
        return;
    };
    info!(session = %session_id, char = %char_id, "Disconnect cleanup");

    // 1. Trade: both sides restored, the disconnector's items flow to the
    // save below.
    if let Some(trade_id) = world.players.get(&char_id).and_then(|p| p.trade) {
        trade::cancel(world, env, trade_id);
    }

    // 2. Party and chat party.
    leave_party(world, env, char_id);
    leave_chat_party(world, env, char_id);

    // 3. Clan lock and presence.
    warehouse::release_clan_lock(world, char_id);
    if let Some(clan_id) = world.players.get(&char_id).and_then(|p| p.clan) {
        if let Some(clan) = world.clans.get_mut(clan_id) {
            if let Some(m) = clan.members.get_mut(&char_id) {
                m.online = false;
            }
        }
    }

    // 4. Companions.
    let companions: Vec<u32> = world
        .players
        .get(&char_id)
        .map(|p| p.companions.clone())
        .unwrap_or_default();
    for obj in companions {
        destroy_companion(world, env, obj, true);
    }

    // 5. Removal broadcast; the tile clears with the entity below.
    if let Some(p) = world.players.get(&char_id) {
        let (map, x, y) = (p.map, p.x, p.y);
        let pkt = server::remove_object(char_id);
        broadcast_nearby(world, env, map, x, y, &pkt);
    }

    // 6. Save, then drop from the world.
    if !persist::save_player(world, env, char_id) {
        warn!(char = %char_id, "Disconnect save failed");
    }
    world.remove_player(char_id);
}
