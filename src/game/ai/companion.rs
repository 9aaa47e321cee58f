//! Companion AI: summons, dolls, followers, and pets in four passes over
//! one shared frame.
//!
//! Movement is a one-tile step with two side-step candidates, falling
//! through to an ignore-occupant pass as a last resort - companions slip
//! through NPCs but never players. All companion damage books hate under
//! the master's session so the mob turns on the master, and kills route
//! through the normal death path so the master's rewards fire.

use super::super::combat::damage_npc;
use super::super::{broadcast_nearby, Env, System};
use super::step_toward;
use crate::db::PetRow;
use crate::script::MeleeContext;
use crate::world::{chebyshev, Companion, CompanionKind, CompanionStatus, Npc, World};
use runegate_proto::server;
use tracing::{debug, warn};

/// A companion farther than this from its master drops its target and
/// follows.
const LEASH_RANGE: i32 = 5;
/// Followers beyond this are dismissed outright.
const FOLLOWER_RANGE: i32 = 13;
/// Target-acquisition radius.
const ACQUIRE_RANGE: i32 = 8;
/// Alert-mode defense radius.
const ALERT_RANGE: i32 = 3;

pub struct CompanionAiSystem;

impl System for CompanionAiSystem {
    fn name(&self) -> &'static str {
        "companion-ai"
    }

    fn update(&mut self, world: &mut World, env: &Env) {
        // Four passes, one kind each, in a fixed order.
        for kind in [
            CompanionKind::Summon,
            CompanionKind::Doll,
            CompanionKind::Follower,
            CompanionKind::Pet,
        ] {
            let ids: Vec<u32> = world
                .companions
                .iter()
                .filter(|(_, c)| c.kind == kind)
                .map(|(&id, _)| id)
                .collect();
            for obj in ids {
                tick_companion(world, env, obj);
            }
        }
    }
}

fn tick_companion(world: &mut World, env: &Env, obj: u32) {
    // Timer expiry.
    let expired = {
        let Some(c) = world.companions.get_mut(&obj) else {
            return;
        };
        if let Some(t) = c.expiry.as_mut() {
            *t = t.saturating_sub(1);
            *t == 0
        } else {
            false
        }
    };
    if expired {
        destroy_companion(world, env, obj, true);
        return;
    }

    let (kind, master, map, x, y) = match world.companions.get(&obj) {
        Some(c) => (c.kind, c.master, c.map, c.x, c.y),
        None => return,
    };
    let Some(m) = world.players.get(&master) else {
        // Master gone without cleanup; drop the companion safely.
        destroy_companion(world, env, obj, true);
        return;
    };
    let (m_map, mx, my, m_session) = (m.map, m.x, m.y, m.session_id);

    // Cross-map companions snap to the master.
    if map != m_map {
        let pkt = server::remove_object(obj);
        broadcast_nearby(world, env, map, x, y, &pkt);
        world.relocate_companion(obj, m_map, mx + 1, my);
        return;
    }

    // Runaway followers dismiss themselves.
    if kind == CompanionKind::Follower && chebyshev(x, y, mx, my) > FOLLOWER_RANGE {
        destroy_companion(world, env, obj, true);
        return;
    }

    let (status, target, can_attack, can_move) = {
        let Some(c) = world.companions.get_mut(&obj) else {
            return;
        };
        c.attack_cd = c.attack_cd.saturating_sub(1);
        c.move_cd = c.move_cd.saturating_sub(1);
        (c.status, c.target, c.attack_cd == 0, c.move_cd == 0)
    };

    let master_dist = chebyshev(x, y, mx, my);

    // Leash: too far from the master means drop everything and follow.
    if target.is_some() && master_dist > LEASH_RANGE {
        if let Some(c) = world.companions.get_mut(&obj) {
            c.target = None;
        }
        if can_move {
            follow_step(world, env, obj, (mx, my));
        }
        return;
    }

    // Validate or drop the current target.
    let target = target.filter(|&t| {
        world
            .npcs
            .get(&t)
            .is_some_and(|n| !n.dead && n.map == m_map && chebyshev(n.x, n.y, x, y) <= ACQUIRE_RANGE + 2)
    });
    if world.companions.get(&obj).is_some_and(|c| c.target != target) {
        if let Some(c) = world.companions.get_mut(&obj) {
            c.target = target;
        }
    }

    match status {
        CompanionStatus::Rest => {
            if can_move && master_dist > 2 {
                follow_step(world, env, obj, (mx, my));
            }
        }
        CompanionStatus::Whistle => {
            if master_dist <= 1 {
                if let Some(c) = world.companions.get_mut(&obj) {
                    c.status = CompanionStatus::Rest;
                }
            } else if can_move {
                follow_step(world, env, obj, (mx, my));
            }
        }
        CompanionStatus::Extend => {
            // Keep distance: trail the master loosely.
            if can_move && master_dist > 4 {
                follow_step(world, env, obj, (mx, my));
            }
        }
        CompanionStatus::Aggressive | CompanionStatus::Defensive | CompanionStatus::Alert => {
            let target = match target {
                Some(t) => Some(t),
                None => acquire_target(world, obj, status, m_session, map, x, y),
            };
            if let Some(t) = target {
                if let Some(c) = world.companions.get_mut(&obj) {
                    c.target = Some(t);
                }
                engage(world, env, obj, t, m_session, can_attack, can_move);
            } else if can_move && status != CompanionStatus::Alert && master_dist > 2 {
                follow_step(world, env, obj, (mx, my));
            }
        }
    }
}

/// Pick something to fight, by stance.
fn acquire_target(
    world: &World,
    _obj: u32,
    status: CompanionStatus,
    master_session: u64,
    map: u32,
    x: i32,
    y: i32,
) -> Option<u32> {
    let radius = if status == CompanionStatus::Alert {
        ALERT_RANGE
    } else {
        ACQUIRE_RANGE
    };
    world
        .nearby_npcs(map, x, y, radius)
        .into_iter()
        .filter(|&o| {
            world.npcs.get(&o).is_some_and(|n| {
                if n.dead {
                    return false;
                }
                match status {
                    // Aggressive: anything the master is tangled with.
                    CompanionStatus::Aggressive => {
                        n.hate.iter().any(|(s, _)| s == master_session)
                    }
                    // Defensive/Alert: only mobs actively on the master.
                    _ => n.aggro_target == master_session,
                }
            })
        })
        .min_by_key(|&o| {
            world
                .npcs
                .get(&o)
                .map(|n| chebyshev(n.x, n.y, x, y))
                .unwrap_or(i32::MAX)
        })
}

/// Close and strike.
fn engage(
    world: &mut World,
    env: &Env,
    obj: u32,
    npc_obj: u32,
    master_session: u64,
    can_attack: bool,
    can_move: bool,
) {
    let (x, y, level, template_id) = match world.companions.get(&obj) {
        Some(c) => (c.x, c.y, c.level, c.template),
        None => return,
    };
    let (nx, ny) = match world.npcs.get(&npc_obj) {
        Some(n) => (n.x, n.y),
        None => return,
    };

    if chebyshev(x, y, nx, ny) <= 1 {
        if !can_attack {
            return;
        }
        let own = env.tables.npc(template_id);
        let (t_ac, t_level, t_mr, t_big) = world
            .npcs
            .get(&npc_obj)
            .and_then(|n| env.tables.npc(n.template))
            .map(|t| (t.ac, t.level, t.mr, t.big))
            .unwrap_or((0, 1, 0, false));
        let ctx = MeleeContext {
            attacker_level: level,
            str_: own.map_or(12, |t| t.str_),
            dex: own.map_or(12, |t| t.dex),
            weapon_small: own.map_or(6, |t| t.str_.max(1)),
            weapon_large: own.map_or(6, |t| t.str_.max(1)),
            enchant: 0,
            hit_mod: 0,
            dmg_mod: 0,
            target_ac: t_ac,
            target_level: t_level,
            target_mr: t_mr,
            target_big: t_big,
        };
        let outcome = env.engine.calc_melee_attack(ctx);
        let damage = if outcome.hit { outcome.damage.max(0) } else { 0 };
        let heading = crate::world::heading_toward(x, y, nx, ny);
        if let Some(c) = world.companions.get_mut(&obj) {
            c.heading = heading;
            c.attack_cd = env
                .tables
                .npc(template_id)
                .map_or(6, |t| t.atk_speed_ticks);
        }
        let (map, _, _) = match world.companions.get(&obj) {
            Some(c) => (c.map, c.x, c.y),
            None => return,
        };
        let pkt = server::attack(obj, npc_obj, damage, heading);
        broadcast_nearby(world, env, map, x, y, &pkt);
        // Hate books under the master so the mob chases them, and the
        // kill routes through the master's rewards.
        damage_npc(world, env, npc_obj, damage, master_session);
    } else if can_move {
        companion_move_toward(world, env, obj, (nx, ny));
    }
}

fn follow_step(world: &mut World, env: &Env, obj: u32, to: (i32, i32)) {
    companion_move_toward(world, env, obj, to);
}

/// The shared companion step: direct plus side-steps, then the
/// ignore-occupant fallback.
fn companion_move_toward(world: &mut World, env: &Env, obj: u32, to: (i32, i32)) {
    let (map, x, y, template_id) = match world.companions.get(&obj) {
        Some(c) => (c.map, c.x, c.y, c.template),
        None => return,
    };
    let step = step_toward(world, map, (x, y), to, false)
        .or_else(|| step_toward(world, map, (x, y), to, true));
    let Some((nx, ny, dir)) = step else {
        return;
    };
    // Never onto a player's tile, even in the fallback pass.
    let occupied_by_player = world
        .nearby_players(map, nx, ny, 0)
        .into_iter()
        .any(|c| world.players.get(&c).is_some_and(|p| p.x == nx && p.y == ny));
    if occupied_by_player {
        return;
    }
    if let Some(c) = world.companions.get_mut(&obj) {
        c.x = nx;
        c.y = ny;
        c.heading = dir;
        c.move_cd = env
            .tables
            .npc(template_id)
            .map_or(2, |t| t.move_speed_ticks.max(1) / 2 + 1);
    }
    let pkt = server::move_object(obj, x, y, dir);
    broadcast_nearby(world, env, map, nx, ny, &pkt);
}

/// Remove a companion from the world with its lifecycle side effects:
/// followers restore their source NPC at its recorded spawn tile, pets
/// persist to their collar row when `save_pet` is set.
pub fn destroy_companion(world: &mut World, env: &Env, obj: u32, save_pet: bool) {
    let Some(c) = world.remove_companion(obj) else {
        return;
    };
    let pkt = server::remove_object(obj);
    broadcast_nearby(world, env, c.map, c.x, c.y, &pkt);

    match c.kind {
        CompanionKind::Follower => {
            if let Some(origin) = c.origin {
                respawn_follower_npc(world, env, origin);
            }
        }
        CompanionKind::Pet => {
            if save_pet {
                save_pet_row(env, &c);
            }
        }
        CompanionKind::Summon | CompanionKind::Doll => {}
    }
    debug!(companion = %obj, kind = ?c.kind, "Companion destroyed");
}

/// Persist a pet to its collar row.
pub fn save_pet_row(env: &Env, c: &Companion) {
    let Some(collar) = c.collar_obj_id else {
        return;
    };
    let row = PetRow {
        collar_obj_id: collar,
        npc_template: c.template,
        name: c.name.clone(),
        level: c.level,
        cur_hp: c.cur_hp,
        cur_mp: c.cur_mp,
        exp: c.exp,
        lawful: c.lawful,
    };
    let db = env.db.clone();
    if let Err(e) = env.rt.block_on(async { db.pets().save(&row).await }) {
        warn!(collar = %collar, error = %e, "Pet save failed");
    }
}

fn respawn_follower_npc(world: &mut World, env: &Env, origin: crate::world::FollowerOrigin) {
    let Some(template) = env.tables.npc(origin.npc_id) else {
        warn!(npc = %origin.npc_id, "Follower origin template missing");
        return;
    };
    let obj_id = world.alloc_obj_id();
    let npc = Npc::new(obj_id, origin.npc_id, origin.map, origin.x, origin.y, template.hp, template.mp);
    world.add_npc(npc);
}
