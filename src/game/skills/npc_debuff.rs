//! NPC-debuff variant: hostile non-damage skills landing on mobs.
//!
//! Each skill arms its own way; what they share is the range check, the
//! face-the-target turn, and a symbolic hate entry so the mob retaliates
//! without skewing the kill's XP split.

use super::super::{broadcast_nearby, Env};
use crate::data::{EquipSlot, SkillTemplate};
use crate::world::npc::{NpcDebuff, NpcPoison, PendingDebuff, SYMBOLIC_HATE};
use crate::world::{heading_toward, World};
use rand::Rng;
use runegate_proto::server;
use tracing::debug;

/// Mummy curse escalates through this synthetic debuff id.
const MUMMY_STAGE2: u16 = 4001;
/// Ticks until the mummy curse holds (5 s).
const MUMMY_DELAY_TICKS: u32 = 25;
/// Poison-curse debuff lifetime.
const POISON_TICKS: u32 = 150;

/// Entry point from the cast pipeline.
pub(crate) fn npc_debuff_cast(
    world: &mut World,
    env: &Env,
    caster_char: u32,
    npc_obj: u32,
    template: &SkillTemplate,
) {
    let (tx, ty, dead) = match world.npcs.get(&npc_obj) {
        Some(n) => (n.x, n.y, n.dead),
        None => return,
    };
    if dead || !super::buff::in_cast_range(world, caster_char, tx, ty, template) {
        return;
    }

    // Face the target; the mob remembers who did this.
    let session = {
        let Some(p) = world.players.get_mut(&caster_char) else {
            return;
        };
        p.heading = heading_toward(p.x, p.y, tx, ty);
        p.session_id
    };
    if let Some(n) = world.npcs.get_mut(&npc_obj) {
        n.hate.add(session, SYMBOLIC_HATE);
    }

    apply_npc_debuff(world, env, caster_char, npc_obj, template.skill_id);
}

/// Arm one debuff on an NPC. Reused by weapon procs and NPC-cast skills.
pub(crate) fn apply_npc_debuff(
    world: &mut World,
    env: &Env,
    caster_char: u32,
    npc_obj: u32,
    skill_id: u16,
) {
    let (caster_level, caster_int, session) = world
        .players
        .get(&caster_char)
        .map(|p| (p.level as i32, p.int, p.session_id))
        .unwrap_or((1, 0, 0));
    let (map, x, y, mr) = match world.npcs.get(&npc_obj) {
        Some(n) => (
            n.map,
            n.x,
            n.y,
            env.tables.npc(n.template).map_or(0, |t| t.mr),
        ),
        None => return,
    };
    let duration_ticks = env
        .tables
        .skill(skill_id)
        .map(|s| (s.buff_duration.max(1) as u32) * 5)
        .unwrap_or(150);
    let mr_roll = |chance_base: i32| {
        let chance = (chance_base + caster_int - mr).clamp(10, 90);
        rand::thread_rng().gen_range(0..100) < chance
    };

    match skill_id {
        // Stun needs the weight of a two-handed sword behind it.
        87 => {
            let two_handed = world.players.get(&caster_char).is_some_and(|p| {
                p.inventory
                    .equipped_in(EquipSlot::Weapon)
                    .and_then(|o| p.inventory.get(o))
                    .and_then(|i| env.tables.item(i.item_id))
                    .is_some_and(|t| t.two_handed)
            });
            if !two_handed || !mr_roll(40 + caster_level) {
                return;
            }
            freeze(world, env, npc_obj, skill_id, 15, map, x, y);
        }
        // Earth barrier holds and tints.
        157 => {
            if !mr_roll(50 + caster_level) {
                return;
            }
            freeze(world, env, npc_obj, skill_id, duration_ticks, map, x, y);
        }
        // Sleep mist.
        66 => {
            if !mr_roll(50 + caster_level) {
                return;
            }
            if let Some(n) = world.npcs.get_mut(&npc_obj) {
                n.sleeping = true;
                n.debuffs.insert(
                    skill_id,
                    NpcDebuff {
                        skill_id,
                        ticks_left: duration_ticks,
                        freezes: false,
                    },
                );
            }
        }
        // Darkness and blind family.
        103 | 20 | 40 => {
            plain_debuff(world, npc_obj, skill_id, duration_ticks);
        }
        // Slow family.
        29 | 76 | 152 => {
            if !mr_roll(50 + caster_level) {
                return;
            }
            plain_debuff(world, npc_obj, skill_id, duration_ticks);
        }
        // Ice lance freezes with the grey tone.
        50 => {
            if mr_roll(50 + caster_level) {
                freeze(world, env, npc_obj, skill_id, duration_ticks, map, x, y);
            }
        }
        // Mummy curse: stage 2 lands later through the pending queue.
        33 => {
            if let Some(n) = world.npcs.get_mut(&npc_obj) {
                n.pending_debuffs.push(PendingDebuff {
                    skill_id: MUMMY_STAGE2,
                    ticks_left: MUMMY_DELAY_TICKS,
                });
                n.poison_color = 2;
            }
            let pkt = server::poison_color(npc_obj, 2);
            broadcast_nearby(world, env, map, x, y, &pkt);
        }
        // Weakness and disease.
        47 | 56 => {
            plain_debuff(world, npc_obj, skill_id, duration_ticks);
        }
        // Ice storm also freezes on its roll.
        80 => {
            if mr_roll(40 + caster_level) {
                freeze(world, env, npc_obj, skill_id, duration_ticks, map, x, y);
            }
        }
        // Cancel wipes everything on the mob.
        44 => {
            if let Some(n) = world.npcs.get_mut(&npc_obj) {
                n.clear_afflictions();
            }
            let pkt = server::poison_color(npc_obj, 0);
            broadcast_nearby(world, env, map, x, y, &pkt);
        }
        // Poison-curse: periodic damage credited to the caster.
        11 => {
            if let Some(n) = world.npcs.get_mut(&npc_obj) {
                n.poison = Some(NpcPoison {
                    amount: 5,
                    timer: 0,
                    attacker: session,
                });
                n.debuffs.insert(
                    skill_id,
                    NpcDebuff {
                        skill_id,
                        ticks_left: POISON_TICKS,
                        freezes: false,
                    },
                );
                n.poison_color = 1;
            }
            let pkt = server::poison_color(npc_obj, 1);
            broadcast_nearby(world, env, map, x, y, &pkt);
        }
        // Stage-2 mummy hold, armed by the pending queue as well.
        MUMMY_STAGE2 => {
            freeze(world, env, npc_obj, skill_id, duration_ticks, map, x, y);
        }
        other => {
            debug!(skill = %other, "NPC debuff with no arm logic");
        }
    }
}

fn plain_debuff(world: &mut World, npc_obj: u32, skill_id: u16, ticks: u32) {
    if let Some(n) = world.npcs.get_mut(&npc_obj) {
        n.debuffs.insert(
            skill_id,
            NpcDebuff {
                skill_id,
                ticks_left: ticks,
                freezes: false,
            },
        );
    }
}

fn freeze(
    world: &mut World,
    env: &Env,
    npc_obj: u32,
    skill_id: u16,
    ticks: u32,
    map: u32,
    x: i32,
    y: i32,
) {
    if let Some(n) = world.npcs.get_mut(&npc_obj) {
        n.paralyzed = true;
        n.poison_color = 2;
        n.debuffs.insert(
            skill_id,
            NpcDebuff {
                skill_id,
                ticks_left: ticks,
                freezes: true,
            },
        );
    }
    let pkt = server::poison_color(npc_obj, 2);
    broadcast_nearby(world, env, map, x, y, &pkt);
}
