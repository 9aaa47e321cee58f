//! Attack-skill branch.

use super::super::combat::{damage_npc, damage_player};
use super::super::{broadcast_nearby, Env};
use super::effect;
use crate::data::SkillTemplate;
use crate::script::SkillDamageContext;
use crate::world::{chebyshev, SkillRequest, TargetRef, World};
use rand::Rng;
use runegate_proto::server;

/// Triple arrow keeps its listed range with no tolerance.
const TRIPLE_ARROW: u16 = 132;
/// Drain life converts dealt damage into caster healing.
const DRAIN_LIFE: u16 = 113;
/// Skills that freeze the target on a post-damage MR roll.
const FREEZE_SKILLS: [u16; 3] = [50, 80, 157];

/// Use-type bytes for the cast packet.
const USE_TYPE_SINGLE: u8 = 6;
const USE_TYPE_AREA: u8 = 8;

pub fn attack_skill(
    world: &mut World,
    env: &Env,
    char_id: u32,
    template: &SkillTemplate,
    req: &SkillRequest,
) {
    let Some(caster) = world.players.get(&char_id) else {
        return;
    };
    let (map, cx, cy, level, int, sp, session) = (
        caster.map,
        caster.x,
        caster.y,
        caster.level,
        caster.int,
        caster.sp,
        caster.session_id,
    );

    let Some(target_ref) = world.resolve_target(req.target) else {
        return;
    };
    let (tx, ty, t_level, t_mr, alive) = match target_ref {
        TargetRef::Npc(obj) => {
            let n = world.npcs.get(&obj).expect("resolved");
            let t = env.tables.npc(n.template);
            (
                n.x,
                n.y,
                t.map_or(1, |t| t.level),
                t.map_or(0, |t| t.mr),
                !n.dead && n.map == map,
            )
        }
        TargetRef::Player(pid) => {
            let t = world.players.get(&pid).expect("resolved");
            (t.x, t.y, t.level, t.mr, !t.dead && t.map == map)
        }
        TargetRef::Companion(_) => return,
    };
    if !alive {
        return;
    }

    // Range: listed reach plus two tiles of latency tolerance; the triple
    // arrow keeps its cap.
    let tolerance = if template.skill_id == TRIPLE_ARROW { 0 } else { 2 };
    if chebyshev(cx, cy, tx, ty) > template.ranged.max(1) + tolerance {
        return;
    }

    let outcome = env.engine.calc_skill_damage(SkillDamageContext {
        skill_id: template.skill_id,
        caster_level: level,
        int,
        sp,
        dice: template.dice,
        dice_count: template.dice_count,
        value: template.value,
        target_level: t_level,
        target_mr: t_mr,
    });

    // Physical skills look like swings; magical ones carry the cast
    // packet with a projectile or area use-type byte.
    let use_type = if template.area != 0 {
        USE_TYPE_AREA
    } else {
        USE_TYPE_SINGLE
    };
    let pkt = if template.magic {
        server::use_attack_skill(
            char_id,
            req.target,
            template.act_id,
            template.gfx_id,
            outcome.damage,
            use_type,
            tx,
            ty,
        )
    } else {
        server::attack(char_id, req.target, outcome.damage, 0)
    };
    broadcast_nearby(world, env, map, cx, cy, &pkt);

    let mut total = 0i32;
    for _ in 0..outcome.hit_count.max(1) {
        total += outcome.damage;
        apply_hit(world, env, session, target_ref, outcome.damage);
    }

    // Area skills splash everything else in the radius around the target.
    if template.area > 0 {
        let others: Vec<u32> = world
            .nearby_npcs(map, tx, ty, template.area)
            .into_iter()
            .filter(|&obj| TargetRef::Npc(obj) != target_ref)
            .collect();
        for obj in others {
            total += outcome.damage;
            apply_hit(world, env, session, TargetRef::Npc(obj), outcome.damage);
        }
    }

    // MP drain feeds the caster.
    if outcome.drain_mp > 0 {
        let drained = match target_ref {
            TargetRef::Player(pid) => {
                let Some(t) = world.players.get_mut(&pid) else {
                    return;
                };
                let d = outcome.drain_mp.min(t.cur_mp);
                t.cur_mp -= d;
                super::super::send_mp(env, t);
                d
            }
            TargetRef::Npc(obj) => {
                let Some(n) = world.npcs.get_mut(&obj) else {
                    return;
                };
                let d = outcome.drain_mp.min(n.cur_mp);
                n.cur_mp -= d;
                d
            }
            TargetRef::Companion(_) => 0,
        };
        if drained > 0 {
            if let Some(p) = world.players.get_mut(&char_id) {
                p.cur_mp = (p.cur_mp + drained).min(p.max_mp);
                super::super::send_mp(env, p);
            }
        }
    }

    // Drain life heals by what was dealt, capped by MaxHP.
    if template.skill_id == DRAIN_LIFE && total > 0 {
        super::super::combat::heal_player(world, env, char_id, total);
    }

    // Freeze riders roll MR after damage.
    if FREEZE_SKILLS.contains(&template.skill_id) {
        if let TargetRef::Npc(obj) = target_ref {
            try_freeze_npc(world, env, obj, template, level);
        }
    }
}

fn apply_hit(world: &mut World, env: &Env, session: u64, target: TargetRef, damage: i32) {
    match target {
        TargetRef::Npc(obj) => damage_npc(world, env, obj, damage, session),
        TargetRef::Player(pid) => damage_player(world, env, pid, damage, Some(session)),
        TargetRef::Companion(_) => {}
    }
}

/// Post-damage MR roll; success paralyzes, registers the freeze debuff
/// for `(duration + 1) * 5` ticks, and tints the target grey.
fn try_freeze_npc(
    world: &mut World,
    env: &Env,
    npc_obj: u32,
    template: &SkillTemplate,
    caster_level: u16,
) {
    let (mr, map, x, y, dead) = {
        let Some(n) = world.npcs.get(&npc_obj) else {
            return;
        };
        let mr = env.tables.npc(n.template).map_or(0, |t| t.mr);
        (mr, n.map, n.x, n.y, n.dead)
    };
    if dead {
        return;
    }
    let chance = (50 + caster_level as i32 - mr).clamp(10, 90);
    if rand::thread_rng().gen_range(0..100) >= chance {
        return;
    }
    let ticks = ((template.buff_duration + 1) as u32) * 5;
    if let Some(n) = world.npcs.get_mut(&npc_obj) {
        n.paralyzed = true;
        n.poison_color = 2;
        n.debuffs.insert(
            template.skill_id,
            crate::world::NpcDebuff {
                skill_id: template.skill_id,
                ticks_left: ticks,
                freezes: true,
            },
        );
    }
    effect_grey(world, env, npc_obj, map, x, y);
}

fn effect_grey(world: &World, env: &Env, npc_obj: u32, map: u32, x: i32, y: i32) {
    let pkt = server::poison_color(npc_obj, 2);
    broadcast_nearby(world, env, map, x, y, &pkt);
}
