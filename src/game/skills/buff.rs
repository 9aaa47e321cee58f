//! Buff-skill branch: helpful and hostile casts on players, with the
//! NPC-debuff variant delegated when the target is a mob.

use super::super::combat::heal_player;
use super::super::Env;
use super::{effect, npc_debuff};
use crate::data::SkillTemplate;
use crate::world::{chebyshev, TargetRef, World};
use rand::Rng;
use tracing::debug;

/// Counter-magic eats one hostile or neutral cast.
const COUNTER_MAGIC: u16 = 31;
/// Casts counter-magic lets through.
const COUNTER_MAGIC_EXEMPT: [u16; 4] = [9, 35, 37, 160];

/// Hostile-on-player set; these require the player MR check.
const PLAYER_DEBUFFS: [u16; 14] = [11, 20, 29, 33, 40, 44, 47, 56, 66, 71, 76, 103, 152, 153];

/// Skills the NPC-debuff variant owns.
pub(crate) const NPC_DEBUFFS: [u16; 14] = [11, 20, 29, 33, 40, 44, 47, 50, 56, 66, 76, 80, 87, 103];

pub fn buff_skill(
    world: &mut World,
    env: &Env,
    char_id: u32,
    template: &SkillTemplate,
    target_id: u32,
) {
    let Some(target_ref) = world.resolve_target(if target_id == 0 { char_id } else { target_id })
    else {
        return;
    };

    match target_ref {
        TargetRef::Npc(obj) => {
            if NPC_DEBUFFS.contains(&template.skill_id) {
                npc_debuff::npc_debuff_cast(world, env, char_id, obj, template);
            }
        }
        TargetRef::Player(target_char) => {
            player_buff(world, env, char_id, target_char, template);
        }
        TargetRef::Companion(_) => {}
    }
}

fn player_buff(
    world: &mut World,
    env: &Env,
    caster_char: u32,
    target_char: u32,
    template: &SkillTemplate,
) {
    let skill_id = template.skill_id;

    // Counter-magic cancels anything not on the exempt list, consuming
    // itself.
    let countered = target_char != caster_char
        && !COUNTER_MAGIC_EXEMPT.contains(&skill_id)
        && world
            .players
            .get(&target_char)
            .is_some_and(|t| t.buffs.contains(COUNTER_MAGIC));
    if countered {
        debug!(caster = %caster_char, target = %target_char, skill = %skill_id, "Counter-magic");
        effect::remove_buff(world, env, target_char, COUNTER_MAGIC);
        return;
    }

    // Hostile casts on another player pass an MR gate.
    if target_char != caster_char && PLAYER_DEBUFFS.contains(&skill_id) {
        let (c_level, c_int) = world
            .players
            .get(&caster_char)
            .map(|p| (p.level as i32, p.int))
            .unwrap_or((1, 0));
        let (t_level, t_mr) = world
            .players
            .get(&target_char)
            .map(|p| (p.level as i32, p.mr))
            .unwrap_or((1, 0));
        let chance = (50 + 3 * (c_level - t_level) + c_int - t_mr).clamp(10, 90);
        if rand::thread_rng().gen_range(0..100) >= chance {
            return;
        }
    }

    let caster_session = world
        .players
        .get(&caster_char)
        .map(|p| p.session_id)
        .unwrap_or(0);

    // Special-case effects before the generic buff application.
    match skill_id {
        // Cure poison.
        9 => effect::cure_poison(world, env, target_char),
        // Damage-poison infliction.
        11 => effect::inflict_damage_poison(world, env, target_char, 5, caster_session),
        // Insight and the darkness family ride the generic payload.
        23 | 20 | 40 => {}
        // Mummy curse, stage 1.
        33 => effect::inflict_curse(world, env, target_char),
        // Holy light: full cure of poison, curse, and darkness.
        37 => {
            effect::cure_poison(world, env, target_char);
            if let Some(p) = world.players.get_mut(&target_char) {
                p.curse = None;
                p.paralysis.from_curse = false;
            }
            for dark in [20, 40, 103] {
                effect::remove_buff(world, env, target_char, dark);
            }
        }
        // Drain MP.
        39 => {
            let drained = {
                let Some(t) = world.players.get_mut(&target_char) else {
                    return;
                };
                let d = (t.level as i32 / 8 + 3).min(t.cur_mp);
                t.cur_mp -= d;
                super::super::send_mp(env, t);
                d
            };
            if drained > 0 {
                if let Some(c) = world.players.get_mut(&caster_char) {
                    c.cur_mp = (c.cur_mp + drained).min(c.max_mp);
                    super::super::send_mp(env, c);
                }
            }
        }
        // Dispels.
        44 | 153 => {
            effect::cancel_all(world, env, target_char);
            return;
        }
        // Potion-freeze rides the generic payload.
        71 => {}
        _ => {}
    }

    // Healing: type 16 or dice-carrying buff skills.
    if template.is_heal() {
        let (int, sp) = world
            .players
            .get(&caster_char)
            .map(|p| (p.int, p.sp))
            .unwrap_or((0, 0));
        let amount = env
            .engine
            .calc_heal(template.value, template.dice, template.dice_count, int, sp);
        if template.area == -1 {
            // Everyone nearby, caster included.
            let (map, x, y) = match world.players.get(&caster_char) {
                Some(p) => (p.map, p.x, p.y),
                None => return,
            };
            let radius = env.config.game.visibility_radius;
            for pid in world.nearby_players(map, x, y, radius) {
                heal_player(world, env, pid, amount);
            }
        } else {
            heal_player(world, env, target_char, amount);
        }
    }

    let level = world
        .players
        .get(&caster_char)
        .map(|p| p.level)
        .unwrap_or(1);
    effect::apply_buff_effect(world, env, target_char, skill_id, level);
}

/// Buff-range sanity shared with the NPC-debuff variant.
pub(crate) fn in_cast_range(
    world: &World,
    caster_char: u32,
    tx: i32,
    ty: i32,
    template: &SkillTemplate,
) -> bool {
    world.players.get(&caster_char).is_some_and(|p| {
        chebyshev(p.x, p.y, tx, ty) <= template.ranged.max(1) + 2
    })
}
