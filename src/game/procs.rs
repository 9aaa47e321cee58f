//! Weapon special effects.
//!
//! Five hard-coded weapons short-circuit the generic table; everything
//! else rolls a per-weapon proc row. Proc damage is magic-flavored and
//! shaved by the target's magic resistance on a piecewise curve.

use super::combat::{damage_npc, WeaponFacts};
use super::{broadcast_nearby, Env};
use crate::world::World;
use rand::Rng;
use runegate_proto::server;
use tracing::debug;

/// The hard-coded five.
const BAPHOMET_STAFF: u32 = 124;
const DICE_DAGGER: u32 = 2;
const KIRINGKU: u32 = 270;
const KIRINGKU_SEALED: u32 = 271;
const FREEZING_LANCER: u32 = 260;
const RAGING_WIND: u32 = 261;

/// MR-based reduction coefficient, piecewise around MR 100.
///
/// `MR <= 100`: divisor `(mr - magic_hit) / 2`, coefficient
/// `1 - 0.01 * floor(divisor)`. Above 100 the divisor uses `/10` and the
/// coefficient starts from 0.6.
fn mr_coefficient(mr: i32, magic_hit: i32) -> f64 {
    if mr <= 100 {
        let divisor = (mr - magic_hit) / 2;
        1.0 - 0.01 * divisor as f64
    } else {
        let divisor = (mr - magic_hit) / 10;
        0.6 - 0.01 * divisor as f64
    }
}

fn npc_mr(world: &World, env: &Env, npc_obj: u32) -> (i32, i32) {
    let Some(n) = world.npcs.get(&npc_obj) else {
        return (0, 0);
    };
    let Some(t) = env.tables.npc(n.template) else {
        return (0, 0);
    };
    // Elemental resistance is absent until the NPC attribute system
    // exists; treat the missing value as zero.
    (t.mr, t.elemental_mr.unwrap_or(0))
}

fn proc_damage(fix: i32, random: i32, mr: i32, magic_hit: i32) -> i32 {
    let mut rng = rand::thread_rng();
    let raw = fix + if random > 0 { rng.gen_range(0..=random) } else { 0 };
    ((raw as f64) * mr_coefficient(mr, magic_hit)).floor().max(0.0) as i32
}

/// Nearby non-frozen NPCs inside an area, excluding the primary target.
fn aoe_targets(world: &World, npc_obj: u32, area: i32) -> Vec<u32> {
    let Some(primary) = world.npcs.get(&npc_obj) else {
        return Vec::new();
    };
    world
        .nearby_npcs(primary.map, primary.x, primary.y, area)
        .into_iter()
        .filter(|&obj| {
            obj != npc_obj
                && world
                    .npcs
                    .get(&obj)
                    .is_some_and(|n| !n.dead && !n.paralyzed)
        })
        .collect()
}

/// Roll and apply the wielded weapon's proc against an NPC target.
pub(crate) fn weapon_proc(
    world: &mut World,
    env: &Env,
    attacker_char: u32,
    npc_obj: u32,
    weapon: WeaponFacts,
) {
    let attacker_session = match world.players.get(&attacker_char) {
        Some(p) => p.session_id,
        None => return,
    };
    let mut rng = rand::thread_rng();

    match weapon.item_id {
        BAPHOMET_STAFF => {
            if rng.gen_range(0..100) < 14 {
                let (mr, _) = npc_mr(world, env, npc_obj);
                let dmg = proc_damage(14, 15, mr, 0);
                broadcast_effect(world, env, npc_obj, 129);
                damage_npc(world, env, npc_obj, dmg, attacker_session);
            }
        }
        DICE_DAGGER => {
            // 3% to deal sharp damage and crumble the dagger.
            if rng.gen_range(0..100) < 3 {
                let dmg = {
                    let hp = world.npcs.get(&npc_obj).map_or(0, |n| n.cur_hp);
                    hp / 2
                };
                broadcast_effect(world, env, npc_obj, 2245);
                damage_npc(world, env, npc_obj, dmg, attacker_session);
                if let Some(p) = world.players.get_mut(&attacker_char) {
                    if let Some(slot) = env
                        .tables
                        .item(weapon.item_id)
                        .and_then(|t| t.slot)
                    {
                        if let Some((obj, deltas)) = p.inventory.clear_equipped(slot) {
                            p.apply_deltas(&deltas, -1);
                            p.inventory.remove(obj);
                            env.sessions
                                .send_to(p.session_id, &server::inventory_remove(obj));
                        }
                    }
                }
            }
        }
        KIRINGKU | KIRINGKU_SEALED => {
            if rng.gen_range(0..100) < 9 {
                let (mr, _) = npc_mr(world, env, npc_obj);
                let dmg = proc_damage(weapon.enchant.max(1) * 2, 10, mr, 10);
                broadcast_effect(world, env, npc_obj, 6983);
                damage_npc(world, env, npc_obj, dmg, attacker_session);
            }
        }
        FREEZING_LANCER => {
            if rng.gen_range(0..100) < 7 {
                // Attribute-keyed area freeze.
                let (_, elem) = npc_mr(world, env, npc_obj);
                let dmg = proc_damage(20, 20, elem, 10);
                for obj in aoe_targets(world, npc_obj, 3) {
                    damage_npc(world, env, obj, dmg / 2, attacker_session);
                }
                broadcast_effect(world, env, npc_obj, 4394);
                damage_npc(world, env, npc_obj, dmg, attacker_session);
            }
        }
        RAGING_WIND => {
            if rng.gen_range(0..100) < 7 {
                let (_, elem) = npc_mr(world, env, npc_obj);
                let dmg = proc_damage(18, 24, elem, 10);
                for obj in aoe_targets(world, npc_obj, 4) {
                    damage_npc(world, env, obj, dmg / 2, attacker_session);
                }
                broadcast_effect(world, env, npc_obj, 7025);
                damage_npc(world, env, npc_obj, dmg, attacker_session);
            }
        }
        _ => {
            let Some(row) = env.tables.weapon_proc(weapon.item_id).cloned() else {
                return;
            };
            if rng.gen_range(0..100) >= row.chance as i32 {
                return;
            }
            debug!(weapon = %weapon.item_id, npc = %npc_obj, "Weapon proc");
            if let Some(gfx) = row.gfx {
                broadcast_effect(world, env, npc_obj, gfx);
            }
            let (mr, _) = npc_mr(world, env, npc_obj);
            let dmg = proc_damage(row.fix_damage, row.random_damage, mr, row.magic_hit);
            if row.area > 0 {
                for obj in aoe_targets(world, npc_obj, row.area) {
                    damage_npc(world, env, obj, dmg, attacker_session);
                }
            }
            if let Some(debuff) = row.debuff_skill {
                super::skills::npc_debuff::apply_npc_debuff(
                    world,
                    env,
                    attacker_char,
                    npc_obj,
                    debuff,
                );
            }
            damage_npc(world, env, npc_obj, dmg, attacker_session);
        }
    }
}

fn broadcast_effect(world: &World, env: &Env, npc_obj: u32, gfx: u16) {
    if let Some(n) = world.npcs.get(&npc_obj) {
        let pkt = server::skill_effect(npc_obj, gfx);
        broadcast_nearby(world, env, n.map, n.x, n.y, &pkt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mr_coefficient_is_piecewise() {
        // Low MR barely shaves.
        assert!((mr_coefficient(0, 0) - 1.0).abs() < f64::EPSILON);
        assert!((mr_coefficient(40, 0) - 0.8).abs() < 1e-9);
        // The curve steps down past 100.
        assert!((mr_coefficient(100, 0) - 0.5).abs() < 1e-9);
        assert!((mr_coefficient(120, 0) - 0.48).abs() < 1e-9);
        // Magic hit pushes the divisor down.
        assert!(mr_coefficient(40, 20) > mr_coefficient(40, 0));
    }

    #[test]
    fn proc_damage_never_negative() {
        assert_eq!(proc_damage(0, 0, 500, 0), 0);
        assert!(proc_damage(10, 0, 0, 0) >= 10);
    }
}
