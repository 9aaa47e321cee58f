//! Self-skill branch.

use super::super::{broadcast_nearby, send_hp, send_mp, Env};
use super::effect;
use crate::data::SkillTemplate;
use crate::world::World;
use runegate_proto::server;

/// Detection skills strip invisibility nearby.
const DETECTIONS: [u16; 2] = [13, 72];
/// HP into MP at a quarter ratio.
const HEART_TO_SOUL: u16 = 118;
/// MP into HP at a quarter ratio.
const SOUL_TO_HEART: u16 = 119;
/// Storm run: clears conflicting speed, then brave level 4.
const STORM_RUN: u16 = 172;
/// Transfer unit per cast.
const TRANSFER_UNIT: i32 = 20;

pub fn self_skill(world: &mut World, env: &Env, char_id: u32, template: &SkillTemplate) {
    match template.skill_id {
        id if DETECTIONS.contains(&id) => {
            let (map, x, y) = match world.players.get(&char_id) {
                Some(p) => (p.map, p.x, p.y),
                None => return,
            };
            let radius = env.config.game.visibility_radius;
            let nearby = world.nearby_players(map, x, y, radius);
            for pid in nearby {
                strip_invisibility(world, env, pid);
            }
            strip_invisibility(world, env, char_id);
        }
        HEART_TO_SOUL => {
            let Some(p) = world.players.get_mut(&char_id) else {
                return;
            };
            if p.cur_hp > TRANSFER_UNIT {
                p.cur_hp -= TRANSFER_UNIT;
                p.cur_mp = (p.cur_mp + TRANSFER_UNIT / 4).min(p.max_mp);
                send_hp(env, p);
                send_mp(env, p);
            }
        }
        SOUL_TO_HEART => {
            let Some(p) = world.players.get_mut(&char_id) else {
                return;
            };
            if p.cur_mp > TRANSFER_UNIT {
                p.cur_mp -= TRANSFER_UNIT;
                p.cur_hp = (p.cur_hp + TRANSFER_UNIT / 4).min(p.max_hp);
                send_hp(env, p);
                send_mp(env, p);
            }
        }
        STORM_RUN => {
            // Conflicting speed sources go first; the brave payload then
            // applies cleanly.
            let speed_buffs: Vec<u16> = world
                .players
                .get(&char_id)
                .map(|p| {
                    p.buffs
                        .iter()
                        .filter(|b| b.flags.move_speed.is_some() || b.flags.brave_speed.is_some())
                        .map(|b| b.skill_id)
                        .collect()
                })
                .unwrap_or_default();
            for id in speed_buffs {
                effect::remove_buff(world, env, char_id, id);
            }
        }
        _ => {}
    }

    let level = world.players.get(&char_id).map(|p| p.level).unwrap_or(1);
    effect::apply_buff_effect(world, env, char_id, template.skill_id, level);

    if template.gfx_id != 0 {
        if let Some(p) = world.players.get(&char_id) {
            let pkt = server::skill_effect(char_id, template.gfx_id);
            broadcast_nearby(world, env, p.map, p.x, p.y, &pkt);
        }
    }
}

fn strip_invisibility(world: &mut World, env: &Env, char_id: u32) {
    let invisible: Vec<u16> = world
        .players
        .get(&char_id)
        .map(|p| {
            p.buffs
                .iter()
                .filter(|b| b.flags.invisible)
                .map(|b| b.skill_id)
                .collect()
        })
        .unwrap_or_default();
    for id in invisible {
        effect::remove_buff(world, env, char_id, id);
    }
}
