//! Monster and guard AI, and NPC attacks landing on players.
//!
//! Monsters think through the scripting engine: the frame here ticks
//! afflictions and timers, keeps the hate target valid, builds the
//! decision context, and executes the returned command list in order.
//! Guards are native: they prefer criminal targets, leash home, and never
//! consult the engine.

use super::super::combat::{damage_npc, damage_player, weapon_facts};
use super::super::{broadcast_nearby, Env, System};
use super::step_toward;
use crate::data::NpcTemplate;
use crate::script::{AiCommand, AiContext, AiSkill, MeleeContext, SkillDamageContext};
use crate::world::{chebyshev, heading_toward, World};
use rand::Rng;
use runegate_proto::server;
use tracing::trace;

/// Aggro scan radius.
const AGGRO_RANGE: i32 = 8;
/// Guards drop aggro (and leash home) past this distance.
const GUARD_LEASH: i32 = 30;
/// NPC poison pulse interval.
const NPC_POISON_TICKS: u32 = 15;
/// Chance of a poison-capable NPC applying its poison on a hit, percent.
const POISON_ATTACK_CHANCE: u32 = 15;
/// Counter-barrier reflection chance, percent.
const COUNTER_BARRIER_CHANCE: u32 = 25;

pub struct MonsterAiSystem;

impl System for MonsterAiSystem {
    fn name(&self) -> &'static str {
        "npc-ai"
    }

    fn update(&mut self, world: &mut World, env: &Env) {
        let ids: Vec<u32> = world.npcs.keys().copied().collect();
        for obj in ids {
            tick_npc(world, env, obj);
        }
    }
}

fn tick_npc(world: &mut World, env: &Env, obj: u32) {
    let Some(template) = world
        .npcs
        .get(&obj)
        .and_then(|n| env.tables.npc(n.template))
        .cloned()
    else {
        return;
    };
    if world.npcs.get(&obj).is_none_or(|n| n.dead) {
        return;
    }

    tick_npc_poison(world, obj);
    tick_npc_debuffs(world, env, obj);

    // Paralyzed or sleeping mobs still ticked their timers above.
    let (paralyzed, sleeping) = match world.npcs.get_mut(&obj) {
        Some(n) => {
            n.attack_cd = n.attack_cd.saturating_sub(1);
            n.move_cd = n.move_cd.saturating_sub(1);
            (n.paralyzed, n.sleeping)
        }
        None => return,
    };
    if paralyzed || sleeping {
        return;
    }

    resolve_target(world, obj, &template);

    if template.is_guard {
        guard_act(world, env, obj, &template);
    } else {
        monster_act(world, env, obj, &template);
    }
}

/// Every 15 ticks the poison bites, flooring at 1 HP.
fn tick_npc_poison(world: &mut World, obj: u32) {
    let Some(n) = world.npcs.get_mut(&obj) else {
        return;
    };
    let Some(mut poison) = n.poison else { return };
    poison.timer += 1;
    if poison.timer % NPC_POISON_TICKS == 0 {
        n.cur_hp = (n.cur_hp - poison.amount).max(1);
        n.hate.add(poison.attacker, poison.amount as i64);
    }
    n.poison = Some(poison);
}

/// Decrement debuff lifetimes; expiry releases freeze/sleep and clears
/// visuals when nothing else holds them.
fn tick_npc_debuffs(world: &mut World, env: &Env, obj: u32) {
    // Pending escalations (mummy curse stage 2).
    let fired: Vec<u16> = {
        let Some(n) = world.npcs.get_mut(&obj) else {
            return;
        };
        let mut fired = Vec::new();
        for pd in n.pending_debuffs.iter_mut() {
            pd.ticks_left = pd.ticks_left.saturating_sub(1);
            if pd.ticks_left == 0 {
                fired.push(pd.skill_id);
            }
        }
        n.pending_debuffs.retain(|pd| pd.ticks_left > 0);
        fired
    };
    for skill_id in fired {
        super::super::skills::npc_debuff::apply_npc_debuff(world, env, 0, obj, skill_id);
    }

    let (map, x, y, color) = {
        let Some(n) = world.npcs.get_mut(&obj) else {
            return;
        };
        let mut expired = Vec::new();
        for d in n.debuffs.values_mut() {
            d.ticks_left = d.ticks_left.saturating_sub(1);
            if d.ticks_left == 0 {
                expired.push(d.skill_id);
            }
        }
        if expired.is_empty() {
            return;
        }
        for id in &expired {
            n.debuffs.remove(id);
        }
        if !n.debuffs.values().any(|d| d.freezes) {
            n.paralyzed = false;
        }
        if !n.debuffs.contains_key(&66) {
            n.sleeping = false;
        }
        let color = if n.poison.is_some() {
            1
        } else if n.paralyzed {
            2
        } else {
            0
        };
        n.poison_color = color;
        (n.map, n.x, n.y, color)
    };
    let pkt = server::poison_color(obj, color);
    broadcast_nearby(world, env, map, x, y, &pkt);
}

/// Target upkeep: drop invalid targets and promote the next-highest hate
/// holder; otherwise scan for fresh aggro. The current target is always
/// either zero or a key of the hate list.
fn resolve_target(world: &mut World, obj: u32, template: &NpcTemplate) {
    let (map, x, y, current) = match world.npcs.get(&obj) {
        Some(n) => (n.map, n.x, n.y, n.aggro_target),
        None => return,
    };

    if current != 0 {
        let valid = world
            .player_by_session(current)
            .is_some_and(|p| !p.dead && p.map == map);
        if !valid {
            if let Some(n) = world.npcs.get_mut(&obj) {
                n.hate.remove(current);
                n.aggro_target = n.hate.top().unwrap_or(0);
            }
        }
        return;
    }

    // Retaliation first: anything already on the hate list.
    if let Some(top) = world.npcs.get(&obj).and_then(|n| n.hate.top()) {
        if let Some(n) = world.npcs.get_mut(&obj) {
            n.aggro_target = top;
        }
        return;
    }

    if !template.aggro {
        return;
    }
    // Aggro scan: nearby, visible, outside safety zones.
    let candidate = world
        .nearby_players(map, x, y, AGGRO_RANGE)
        .into_iter()
        .filter_map(|c| world.players.get(&c))
        .filter(|p| {
            !p.dead && p.invisible == 0 && !world.map_data.is_safety_zone(map, p.x, p.y)
        })
        .min_by_key(|p| chebyshev(p.x, p.y, x, y))
        .map(|p| p.session_id);
    if let Some(session) = candidate {
        if let Some(n) = world.npcs.get_mut(&obj) {
            // Snap out of wander and commit.
            n.hate.add(session, crate::world::npc::SYMBOLIC_HATE);
            n.aggro_target = session;
        }
    }
}

/// Native guard frame: criminals first, leash home, melee or ranged by
/// reach.
fn guard_act(world: &mut World, env: &Env, obj: u32, template: &NpcTemplate) {
    let (map, x, y, spawn_x, spawn_y, target, can_attack, can_move) =
        match world.npcs.get(&obj) {
            Some(n) => (
                n.map,
                n.x,
                n.y,
                n.spawn_x,
                n.spawn_y,
                n.aggro_target,
                n.attack_cd == 0,
                n.move_cd == 0,
            ),
            None => return,
        };

    // Prefer red-named prey in sight.
    if target == 0 {
        let wanted = world
            .nearby_players(map, x, y, AGGRO_RANGE)
            .into_iter()
            .filter_map(|c| world.players.get(&c))
            .filter(|p| !p.dead && p.lawful < 0 && p.invisible == 0)
            .min_by_key(|p| chebyshev(p.x, p.y, x, y))
            .map(|p| p.session_id);
        if let Some(session) = wanted {
            if let Some(n) = world.npcs.get_mut(&obj) {
                n.hate.add(session, crate::world::npc::SYMBOLIC_HATE);
                n.aggro_target = session;
            }
        } else if (x, y) != (spawn_x, spawn_y) && can_move {
            // Idle: walk home, teleporting when far adrift.
            if chebyshev(x, y, spawn_x, spawn_y) > GUARD_LEASH {
                teleport_npc_home(world, env, obj);
            } else if let Some((nx, ny, dir)) =
                step_toward(world, map, (x, y), (spawn_x, spawn_y), false)
            {
                move_npc(world, env, obj, nx, ny, dir, template.move_speed_ticks);
            }
            return;
        } else {
            return;
        }
    }

    let target = match world.npcs.get(&obj) {
        Some(n) => n.aggro_target,
        None => return,
    };
    let Some(p) = world.player_by_session(target) else {
        return;
    };
    let (px, py) = (p.x, p.y);
    let dist = chebyshev(x, y, px, py);

    if dist > GUARD_LEASH {
        if let Some(n) = world.npcs.get_mut(&obj) {
            n.hate.remove(target);
            n.aggro_target = n.hate.top().unwrap_or(0);
        }
        return;
    }

    let reach = template.ranged.max(1);
    if dist <= reach {
        if can_attack {
            npc_attack_player(world, env, obj, template, target, template.ranged > 1);
        }
    } else if can_move {
        if let Some((nx, ny, dir)) = step_toward(world, map, (x, y), (px, py), false) {
            move_npc(world, env, obj, nx, ny, dir, template.move_speed_ticks);
        }
    }
}

/// Scripting-driven monster frame.
fn monster_act(world: &mut World, env: &Env, obj: u32, template: &NpcTemplate) {
    let (map, x, y, target, can_attack, can_move, spawn_dist, hp_ratio, spawn_x, spawn_y) =
        match world.npcs.get(&obj) {
            Some(n) => (
                n.map,
                n.x,
                n.y,
                n.aggro_target,
                n.attack_cd == 0,
                n.move_cd == 0,
                n.spawn_distance(),
                n.hp_ratio(template.hp),
                n.spawn_x,
                n.spawn_y,
            ),
            None => return,
        };

    let (target_id, tx, ty, tdist, tac, tlevel) = match world.player_by_session(target) {
        Some(p) if !p.dead && p.map == map => (
            p.char_id,
            p.x,
            p.y,
            chebyshev(x, y, p.x, p.y),
            p.ac,
            p.level,
        ),
        _ => (0, 0, 0, 0, 0, 0),
    };

    let ctx = AiContext {
        npc_level: template.level,
        hp_ratio_pct: hp_ratio as i32,
        can_attack,
        can_move,
        reach: template.ranged.max(1),
        target_id,
        target_x: tx,
        target_y: ty,
        target_dist: tdist,
        target_ac: tac,
        target_level: tlevel,
        skills: template
            .skills
            .iter()
            .map(|s| AiSkill {
                skill_id: s.skill_id,
                chance: s.chance,
                act_id: s.act_id,
                gfx_id: s.gfx_id,
                area: s.area,
            })
            .collect(),
        wander_dist: template.wander_dist,
        spawn_dist,
    };

    let commands = env.engine.run_npc_ai(&ctx);
    for cmd in commands {
        trace!(npc = %obj, ?cmd, "AI command");
        match cmd {
            AiCommand::Attack => {
                npc_attack_player(world, env, obj, template, target, false);
            }
            AiCommand::RangedAttack => {
                npc_attack_player(world, env, obj, template, target, true);
            }
            AiCommand::Skill {
                skill_id,
                act_id,
                gfx_id,
            } => {
                npc_skill(world, env, obj, template, target, skill_id, act_id, gfx_id);
            }
            AiCommand::MoveToward => {
                if target_id != 0 {
                    if let Some((nx, ny, dir)) = step_toward(world, map, (x, y), (tx, ty), false) {
                        move_npc(world, env, obj, nx, ny, dir, template.move_speed_ticks);
                    }
                }
            }
            AiCommand::Wander { dir } => {
                let dir = dir & 7;
                let (dx, dy) = crate::data::map::HEADING_DELTAS[dir as usize];
                let cand = (x + dx, y + dy);
                if chebyshev(cand.0, cand.1, spawn_x, spawn_y) <= template.wander_dist
                    && world.map_data.is_passable(map, cand.0, cand.1, dir)
                {
                    move_npc(world, env, obj, cand.0, cand.1, dir, template.move_speed_ticks);
                }
            }
            AiCommand::LoseAggro => {
                if let Some(n) = world.npcs.get_mut(&obj) {
                    n.hate.clear();
                    n.aggro_target = 0;
                }
            }
        }
    }
}

fn move_npc(world: &mut World, env: &Env, obj: u32, nx: i32, ny: i32, dir: u8, cd: u32) {
    let (map, old_x, old_y) = match world.npcs.get(&obj) {
        Some(n) => (n.map, n.x, n.y),
        None => return,
    };
    world.relocate_npc(obj, nx, ny);
    if let Some(n) = world.npcs.get_mut(&obj) {
        n.heading = dir;
        n.move_cd = cd;
    }
    let pkt = server::move_object(obj, old_x, old_y, dir);
    broadcast_nearby(world, env, map, nx, ny, &pkt);
}

fn teleport_npc_home(world: &mut World, env: &Env, obj: u32) {
    let (map, x, y, sx, sy) = match world.npcs.get(&obj) {
        Some(n) => (n.map, n.x, n.y, n.spawn_x, n.spawn_y),
        None => return,
    };
    let pkt = server::remove_object(obj);
    broadcast_nearby(world, env, map, x, y, &pkt);
    world.relocate_npc(obj, sx, sy);
}

/// An NPC swing (or shot) at a player.
#[allow(clippy::too_many_arguments)]
fn npc_attack_player(
    world: &mut World,
    env: &Env,
    obj: u32,
    template: &NpcTemplate,
    target_session: u64,
    ranged: bool,
) {
    let Some(p) = world.player_by_session(target_session) else {
        return;
    };
    let target_char = p.char_id;
    let (map, px, py, barrier) = (p.map, p.x, p.y, p.absolute_barrier);
    let (x, y) = match world.npcs.get(&obj) {
        Some(n) => (n.x, n.y),
        None => return,
    };

    // Absolute barrier blanks the mob's interest entirely.
    if barrier {
        if let Some(n) = world.npcs.get_mut(&obj) {
            n.hate.remove(target_session);
            n.aggro_target = n.hate.top().unwrap_or(0);
        }
        return;
    }

    let (t_ac, t_level, t_mr) = world
        .players
        .get(&target_char)
        .map(|p| (p.ac, p.level, p.mr))
        .unwrap_or((0, 1, 0));
    let ctx = MeleeContext {
        attacker_level: template.level,
        str_: template.str_,
        dex: template.dex,
        weapon_small: template.str_.max(1),
        weapon_large: template.str_.max(1),
        enchant: 0,
        hit_mod: 0,
        dmg_mod: 0,
        target_ac: t_ac,
        target_level: t_level,
        target_mr: t_mr,
        target_big: false,
    };
    let outcome = if ranged {
        env.engine.calc_ranged_attack(ctx)
    } else {
        env.engine.calc_melee_attack(ctx)
    };
    let damage = if outcome.hit { outcome.damage.max(0) } else { 0 };
    let heading = heading_toward(x, y, px, py);

    if let Some(n) = world.npcs.get_mut(&obj) {
        n.heading = heading;
        n.attack_cd = template.atk_speed_ticks;
    }

    // Counter-barrier reflects with the PC formula.
    let has_barrier = world
        .players
        .get(&target_char)
        .is_some_and(|p| p.buffs.contains(super::super::combat::COUNTER_BARRIER));
    if damage > 0 && has_barrier && rand::thread_rng().gen_range(0..100) < COUNTER_BARRIER_CHANCE {
        let w = weapon_facts(world, env, target_char).unwrap_or_default();
        let dmg_mod = world.players.get(&target_char).map(|p| p.dmg_mod).unwrap_or(0);
        let counter = (w.large + w.enchant + dmg_mod + w.dmg_mod) * 2 * 3 / 2;
        let pkt = server::attack(target_char, obj, counter, heading_toward(px, py, x, y));
        broadcast_nearby(world, env, map, px, py, &pkt);
        damage_npc(world, env, obj, counter, target_session);
        let miss = server::attack(obj, target_char, 0, heading);
        broadcast_nearby(world, env, map, x, y, &miss);
        return;
    }

    let pkt = if ranged {
        server::arrow_attack(obj, target_char, damage, heading, 66)
    } else {
        server::attack(obj, target_char, damage, heading)
    };
    broadcast_nearby(world, env, map, x, y, &pkt);

    // Poison-capable mobs have a chance to apply their class on a hit,
    // unless the target is already poisoned.
    if damage > 0 && template.poison_atk != 0 {
        let already = world
            .players
            .get(&target_char)
            .is_some_and(|p| p.poison.is_some());
        if !already && rand::thread_rng().gen_range(0..100) < POISON_ATTACK_CHANCE {
            match template.poison_atk {
                1 => super::super::skills::effect::inflict_damage_poison(
                    world, env, target_char, 5, 0,
                ),
                2 => super::super::skills::effect::inflict_special_poison(
                    world, env, target_char, false,
                ),
                3 => super::super::skills::effect::inflict_special_poison(
                    world, env, target_char, true,
                ),
                _ => {}
            }
        }
    }

    damage_player(world, env, target_char, damage, None);
}

/// An NPC skill cast: magic projectile or debuff-on-player.
#[allow(clippy::too_many_arguments)]
fn npc_skill(
    world: &mut World,
    env: &Env,
    obj: u32,
    template: &NpcTemplate,
    target_session: u64,
    skill_id: u16,
    act_id: u16,
    gfx_id: u16,
) {
    let Some(p) = world.player_by_session(target_session) else {
        return;
    };
    let target_char = p.char_id;
    let (map, px, py, t_level, t_mr) = (p.map, p.x, p.y, p.level, p.mr);
    let (x, y) = match world.npcs.get(&obj) {
        Some(n) => (n.x, n.y),
        None => return,
    };

    if let Some(n) = world.npcs.get_mut(&obj) {
        n.attack_cd = template.atk_speed_ticks;
    }

    let skill = env.tables.skill(skill_id).cloned();
    let is_attack = skill
        .as_ref()
        .map(|s| s.target == crate::data::SkillTarget::Attack)
        .unwrap_or(true);

    if is_attack {
        let (dice, dice_count, value, area) = skill
            .as_ref()
            .map(|s| (s.dice, s.dice_count, s.value, s.area))
            .unwrap_or((6, 2, template.level as i32 / 4, 0));
        let outcome = env.engine.calc_skill_damage(SkillDamageContext {
            skill_id,
            caster_level: template.level,
            int: 12,
            sp: 0,
            dice,
            dice_count,
            value,
            target_level: t_level,
            target_mr: t_mr,
        });
        let use_type: u8 = if area > 0 { 8 } else { 6 };
        let pkt = server::use_attack_skill(
            obj,
            target_char,
            act_id,
            gfx_id,
            outcome.damage,
            use_type,
            px,
            py,
        );
        broadcast_nearby(world, env, map, x, y, &pkt);
        damage_player(world, env, target_char, outcome.damage, None);
        if area > 0 {
            let radius = area;
            let others: Vec<u32> = world
                .nearby_players(map, px, py, radius)
                .into_iter()
                .filter(|&c| c != target_char)
                .collect();
            for c in others {
                damage_player(world, env, c, outcome.damage, None);
            }
        }
    } else {
        // Debuff: effect broadcast, then the buff payload on the player.
        let pkt = server::skill_effect(target_char, gfx_id);
        broadcast_nearby(world, env, map, px, py, &pkt);
        super::super::skills::effect::apply_buff_effect(
            world,
            env,
            target_char,
            skill_id,
            template.level,
        );
    }
}
