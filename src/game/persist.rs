//! The persistence phase.
//!
//! Every interval, dirty players are written out: character row (base
//! values), inventory + equipment, buffs with remaining seconds, known
//! spells, bookmarks, and map timers. A timeout leaves the player dirty
//! for the next cycle; nothing surfaces to the client. Shutdown runs the
//! same save with `dirty_only = false`.

use super::{Env, System};
use crate::db::{BuffRow, CharacterRow, EquipmentRow, ItemRow};
use crate::world::inventory::add_deltas;
use crate::world::World;
use std::time::Duration;
use tracing::{info, warn};

pub struct PersistSystem;

impl System for PersistSystem {
    fn name(&self) -> &'static str {
        "persist"
    }

    fn update(&mut self, world: &mut World, env: &Env) {
        let interval = env.config.game.save_interval_ticks.max(1);
        if world.tick % interval != 0 {
            return;
        }
        save_players(world, env, true);
    }

    fn shutdown(&mut self, world: &mut World, env: &Env) {
        info!(players = %world.players.len(), "Shutdown save");
        save_players(world, env, false);
    }
}

/// Save every (dirty) player, then advance the WAL high-water mark.
pub fn save_players(world: &mut World, env: &Env, dirty_only: bool) {
    let chars: Vec<u32> = world
        .players
        .iter()
        .filter(|(_, p)| !dirty_only || p.dirty)
        .map(|(&c, _)| c)
        .collect();
    let mut failures = 0u32;
    for char_id in &chars {
        if save_player(world, env, *char_id) {
            if let Some(p) = world.players.get_mut(char_id) {
                p.dirty = false;
            }
        } else {
            failures += 1;
        }
    }

    // WAL entries whose participants are saved become markable.
    if failures == 0 && world.wal_high_water > 0 {
        let db = env.db.clone();
        let high = world.wal_high_water;
        match env
            .rt
            .block_on(async { db.wal().mark_processed(high).await })
        {
            Ok(()) => world.wal_high_water = 0,
            Err(e) => warn!(error = %e, "WAL mark_processed failed"),
        }
    }
}

/// One player's full save. Returns false on failure or timeout; the
/// caller keeps the player dirty so the next cycle retries.
pub fn save_player(world: &World, env: &Env, char_id: u32) -> bool {
    let Some(p) = world.players.get(&char_id) else {
        return true;
    };

    // The base-value rule: equipment and buff contributions come off
    // before primary stats and MaxHP/MaxMP hit the row. Login re-applies
    // both additively.
    let mut bonuses = p.inventory.equip_delta_total();
    add_deltas(&mut bonuses, &p.buffs.delta_total());

    let row = CharacterRow {
        char_id: p.char_id,
        account: p.account.clone(),
        name: p.name.clone(),
        class: p.class,
        map: p.map,
        x: p.x,
        y: p.y,
        heading: p.heading,
        level: p.level,
        exp: p.exp,
        lawful: p.lawful,
        attr_grants: p.attr_grants,
        base_str: p.str_ - bonuses.str_,
        base_dex: p.dex - bonuses.dex,
        base_con: p.con - bonuses.con,
        base_int: p.int - bonuses.int,
        base_wis: p.wis - bonuses.wis,
        base_cha: p.cha - bonuses.cha,
        base_max_hp: p.max_hp - bonuses.max_hp,
        base_max_mp: p.max_mp - bonuses.max_mp,
        cur_hp: p.cur_hp,
        cur_mp: p.cur_mp,
        bookmarks: p.bookmarks.clone(),
        map_time_secs: p.map_time_secs,
    };

    let items: Vec<ItemRow> = p
        .inventory
        .items()
        .iter()
        .map(|i| ItemRow {
            obj_id: i.obj_id,
            item_id: i.item_id,
            count: i.count,
            enchant: i.enchant,
            identified: i.identified,
            durability: i.durability,
        })
        .collect();
    let equipment: Vec<EquipmentRow> = p
        .inventory
        .worn()
        .map(|(slot, obj_id)| EquipmentRow {
            slot: slot.wire(),
            obj_id,
        })
        .collect();
    let buffs: Vec<BuffRow> = p
        .buffs
        .iter()
        .map(|b| BuffRow {
            skill_id: b.skill_id,
            remaining_secs: b.remaining_secs(),
            deltas: b.deltas,
            flags: b.flags,
            poly_id: b.poly_id,
        })
        .collect();
    let spells: Vec<u16> = p.known_skills.iter().copied().collect();
    let timers = vec![(p.map, p.map_time_secs)];

    let db = env.db.clone();
    let timeout = Duration::from_secs(env.config.game.save_timeout_secs);
    let result = env.rt.block_on(async {
        tokio::time::timeout(timeout, async {
            db.characters().save(&row).await?;
            db.inventory().replace(char_id, &items, &equipment).await?;
            db.buffs().replace(char_id, &buffs).await?;
            db.characters().save_known_spells(char_id, &spells).await?;
            db.characters().save_map_timers(char_id, &timers).await?;
            Ok::<(), crate::db::DbError>(())
        })
        .await
    });

    match result {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(char = %char_id, error = %e, "Save failed, will retry");
            crate::metrics::SAVE_FAILURES.inc();
            false
        }
        Err(_) => {
            warn!(char = %char_id, "Save timed out, will retry");
            crate::metrics::SAVE_FAILURES.inc();
            false
        }
    }
}
