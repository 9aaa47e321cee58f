//! HP/MP regeneration and timed-map accounting.

use super::packets::party_hp_update;
use super::{send_hp, send_mp, Env, System};
use crate::world::World;

/// Regen pulse interval: every 5 seconds.
const REGEN_TICKS: u64 = 25;
/// Map-time accrues a second every 5 ticks.
const MAP_TIME_TICKS: u64 = 5;

pub struct RegenSystem;

impl System for RegenSystem {
    fn name(&self) -> &'static str {
        "regen"
    }

    fn update(&mut self, world: &mut World, env: &Env) {
        if world.tick % MAP_TIME_TICKS == 0 {
            for p in world.players.values_mut() {
                p.map_time_secs = p.map_time_secs.saturating_add(1);
            }
        }

        if world.tick % REGEN_TICKS != 0 {
            return;
        }

        let chars: Vec<u32> = world.players.keys().copied().collect();
        for char_id in chars {
            let changed = {
                let Some(p) = world.players.get_mut(&char_id) else {
                    continue;
                };
                if p.dead {
                    continue;
                }
                let hp_gain = env.engine.hp_regen_amount(p.level, p.con) + p.hpr;
                let mp_gain = env.engine.mp_regen_amount(p.level, p.wis) + p.mpr;
                let before = (p.cur_hp, p.cur_mp);
                p.cur_hp = (p.cur_hp + hp_gain.max(0)).min(p.max_hp);
                p.cur_mp = (p.cur_mp + mp_gain.max(0)).min(p.max_mp);
                if (p.cur_hp, p.cur_mp) == before {
                    continue;
                }
                p.dirty = true;
                send_hp(env, p);
                send_mp(env, p);
                before.0 != p.cur_hp
            };
            if changed {
                party_hp_update(world, env, char_id);
            }
        }
    }
}
