//! Death resolution: NPC kills with hate-split rewards, player deaths
//! with penalty and PK consequences, and level progression.

use super::packets::party_hp_update;
use super::{broadcast_nearby, messages, send_hp, server_message, Env};
use crate::data::ItemKind;
use crate::world::{GroundItem, ItemInstance, World, WorldEvent, ADENA};
use rand::Rng;
use runegate_proto::server;
use tracing::{debug, info, warn};

/// Corpse pose action GFX.
const ACTION_DIE: u8 = 8;
/// Corpse lifetime before deletion, in ticks (10 s).
pub const CORPSE_TICKS: u32 = 50;
/// Drop probability scale: chances are per million.
const DROP_SCALE: u32 = 1_000_000;

/// Resolve an NPC reaching zero HP.
pub fn npc_death(world: &mut World, env: &Env, npc_obj: u32, killer_session: u64) {
    let (template_id, map, x, y) = {
        let Some(n) = world.npcs.get_mut(&npc_obj) else {
            return;
        };
        if n.dead {
            return;
        }
        n.dead = true;
        n.cur_hp = 0;
        n.aggro_target = 0;
        n.delete_ticks = Some(CORPSE_TICKS);
        (n.template, n.map, n.x, n.y)
    };

    // Out of the AOI grid and off the tile; the corpse itself stays
    // renderable until the delete timer fires.
    world.unindex_npc(npc_obj);
    world.map_data.set_impassable(map, x, y, false);

    let pkt = server::action_gfx(npc_obj, ACTION_DIE);
    broadcast_nearby(world, env, map, x, y, &pkt);

    let Some(template) = env.tables.npc(template_id).cloned() else {
        warn!(npc = %npc_obj, template = %template_id, "Dead NPC has no template, no rewards");
        if let Some(n) = world.npcs.get_mut(&npc_obj) {
            n.hate.clear();
        }
        return;
    };

    // Guards grant nothing.
    if !template.is_guard {
        let exp_total = (template.exp as f64 * env.config.rates.exp) as u64;

        // Hate snapshot over live, same-map players only.
        let hate: Vec<(u64, i64)> = world
            .npcs
            .get(&npc_obj)
            .map(|n| {
                n.hate
                    .iter()
                    .filter(|(s, _)| {
                        world
                            .player_by_session(*s)
                            .is_some_and(|p| !p.dead && p.map == map)
                    })
                    .collect()
            })
            .unwrap_or_default();
        let total_damage: i64 = hate.iter().map(|(_, d)| *d).sum();

        if hate.len() > 1 && total_damage > 0 {
            for &(session, dmg) in &hate {
                let share = (exp_total as i128 * dmg as i128 / total_damage as i128) as u64;
                if let Some(char_id) = world.char_by_session(session) {
                    grant_exp(world, env, char_id, share);
                }
            }
        } else if let Some(char_id) = world.char_by_session(killer_session) {
            grant_exp(world, env, char_id, exp_total);
        }

        // Pet XP rides on the killer's active pet.
        if let Some(killer_char) = world.char_by_session(killer_session) {
            let pet_exp = (template.exp as f64 * env.config.rates.pet_exp) as u64;
            let pet_obj = world.players.get(&killer_char).and_then(|p| {
                p.companions
                    .iter()
                    .copied()
                    .find(|o| {
                        world
                            .companions
                            .get(o)
                            .is_some_and(|c| c.kind == crate::world::CompanionKind::Pet)
                    })
            });
            if let Some(pet_obj) = pet_obj {
                if let Some(pet) = world.companions.get_mut(&pet_obj) {
                    pet.exp += pet_exp;
                }
            }

            // Lawful drift: slaying evil raises alignment, and vice versa.
            if let Some(p) = world.players.get_mut(&killer_char) {
                p.lawful = (p.lawful - template.lawful / 100).clamp(-32768, 32767);
                p.dirty = true;
            }
        }

        roll_drops(world, env, template_id, map, x, y);
    }

    if let Some(n) = world.npcs.get_mut(&npc_obj) {
        n.hate.clear();
    }
    world.events.push(WorldEvent::EntityKilled {
        npc_obj,
        killer_session,
    });
    crate::metrics::LIVE_NPCS.set(
        world
            .npcs
            .values()
            .filter(|n| !n.dead)
            .count() as i64,
    );
}

/// Per-item probability roll, quantity between min and max, rates applied
/// and clamped. Monster-dropped weapons and armor come unidentified.
fn roll_drops(world: &mut World, env: &Env, template_id: u32, map: u32, x: i32, y: i32) {
    let rows = env.tables.drops(template_id).to_vec();
    let mut rng = rand::thread_rng();
    for row in rows {
        let chance = ((row.chance as f64 * env.config.rates.drop) as u32).min(DROP_SCALE);
        if rng.gen_range(0..DROP_SCALE) >= chance {
            continue;
        }
        let mut count = if row.max > row.min {
            rng.gen_range(row.min..=row.max)
        } else {
            row.min
        };
        if row.item_id == ADENA {
            count = (count as f64 * env.config.rates.adena) as u32;
        }
        if count == 0 {
            continue;
        }

        let template = env.tables.item(row.item_id);
        let identified = !template.is_some_and(|t| {
            matches!(t.kind, ItemKind::Weapon | ItemKind::Armor)
        });
        let obj_id = world.alloc_obj_id();
        let item = ItemInstance {
            obj_id,
            item_id: row.item_id,
            count,
            enchant: 0,
            identified,
            durability: template.map_or(0, |t| t.max_durability),
        };
        let (gx, gy) = (x + rng.gen_range(-1..=1), y + rng.gen_range(-1..=1));
        let drop_pkt = server::drop_item(obj_id, row.item_id, gx, gy, count);
        world.add_ground(GroundItem {
            obj_id,
            item,
            map,
            x: gx,
            y: gy,
            ttl: env.config.game.ground_item_ttl,
        });
        broadcast_nearby(world, env, map, gx, gy, &drop_pkt);
    }
}

/// Add experience and resolve any level-ups it causes.
pub fn grant_exp(world: &mut World, env: &Env, char_id: u32, amount: u64) {
    let Some(p) = world.players.get_mut(&char_id) else {
        return;
    };
    if p.dead {
        return;
    }
    p.exp = p.exp.saturating_add(amount);
    p.dirty = true;

    let target_level = env.engine.level_from_exp(p.exp);
    while p.level < target_level {
        p.level += 1;
        let gain = env.engine.calc_level_up(p.class, p.con, p.wis);
        p.max_hp += gain.hp;
        p.max_mp += gain.mp;
        p.cur_hp = (p.cur_hp + gain.hp).min(p.max_hp);
        p.cur_mp = (p.cur_mp + gain.mp).min(p.max_mp);
        if p.attribute_total() < crate::world::player::ATTRIBUTE_CAP {
            p.attr_grants = p.attr_grants.saturating_add(1);
        }
        info!(char = %char_id, level = %p.level, "Level up");
        server_message(env, p.session_id, messages::LEVEL_UP);
    }

    let weight = super::weight_pct(p, &env.tables);
    super::send_status(env, world.players.get(&char_id).expect("here"), weight);
}

/// Resolve a player reaching zero HP.
pub fn player_death(world: &mut World, env: &Env, char_id: u32, killer_session: Option<u64>) {
    {
        let Some(p) = world.players.get_mut(&char_id) else {
            return;
        };
        if p.dead {
            return;
        }
        p.dead = true;
        p.cur_hp = 0;
        p.poison = None;
        p.curse = None;
        p.dirty = true;
    }

    // Death strips everything, non-cancellable and speed included.
    super::skills::effect::clear_all_buffs_on_death(world, env, char_id);

    let (map, x, y, victim_lawful, exp, level) = {
        let p = world.players.get(&char_id).expect("checked");
        (p.map, p.x, p.y, p.lawful, p.exp, p.level)
    };

    let pkt = server::action_gfx(char_id, ACTION_DIE);
    broadcast_nearby(world, env, map, x, y, &pkt);

    // Experience penalty.
    let after = env.engine.calc_death_exp_penalty(level, exp);
    if let Some(p) = world.players.get_mut(&char_id) {
        p.exp = after;
        send_hp(env, p);
    }
    party_hp_update(world, env, char_id);

    // PK accounting when a player struck the killing blow.
    if let Some(killer_session) = killer_session {
        if let Some(killer_char) = world.char_by_session(killer_session) {
            if killer_char != char_id {
                let penalty = env.engine.pk_lawful_penalty(victim_lawful);
                if penalty != 0 {
                    if let Some(k) = world.players.get_mut(&killer_char) {
                        k.lawful = (k.lawful + penalty).clamp(-32768, 32767);
                        k.dirty = true;
                    }
                }
            }
        }
        drop_pk_items(world, env, char_id, victim_lawful);
    }

    debug!(char = %char_id, "Player death resolved");
}

/// Red-named victims shed items on death.
fn drop_pk_items(world: &mut World, env: &Env, char_id: u32, lawful: i32) {
    let count = env.engine.pk_item_drop(lawful);
    if count == 0 {
        return;
    }
    let mut rng = rand::thread_rng();
    for _ in 0..count {
        let pick = {
            let Some(p) = world.players.get(&char_id) else {
                return;
            };
            let droppable: Vec<u32> = p
                .inventory
                .items()
                .iter()
                .filter(|i| !p.inventory.is_equipped(i.obj_id))
                .map(|i| i.obj_id)
                .collect();
            if droppable.is_empty() {
                return;
            }
            droppable[rng.gen_range(0..droppable.len())]
        };
        let (item, map, x, y, session) = {
            let p = world.players.get_mut(&char_id).expect("checked");
            let Some(item) = p.inventory.remove(pick) else {
                continue;
            };
            (item, p.map, p.x, p.y, p.session_id)
        };
        env.sessions
            .send_to(session, &server::inventory_remove(item.obj_id));
        let drop_pkt = server::drop_item(item.obj_id, item.item_id, x, y, item.count);
        world.add_ground(GroundItem {
            obj_id: item.obj_id,
            item,
            map,
            x,
            y,
            ttl: env.config.game.ground_item_ttl,
        });
        broadcast_nearby(world, env, map, x, y, &drop_pkt);
    }
}
