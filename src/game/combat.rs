//! Combat resolution.
//!
//! Queued attack requests drain here in FIFO order, before AI acts on the
//! same tick. Damage application helpers are shared with the skill system
//! and NPC AI so hate, sleep-break, meters, and death routing behave the
//! same regardless of the source.

use super::death;
use super::packets::party_hp_update;
use super::{broadcast_nearby, procs, send_hp, Env, System};
use crate::script::MeleeContext;
use crate::world::{chebyshev, heading_toward, CombatRequest, TargetRef, World};
use rand::Rng;
use runegate_proto::server;
use tracing::debug;

/// Melee reach in tiles (Chebyshev).
pub const MELEE_RANGE: i32 = 2;
/// Bow reach in tiles.
pub const RANGED_RANGE: i32 = 10;
/// Counter-barrier proc chance, percent.
const COUNTER_BARRIER_CHANCE: u32 = 25;
/// Counter-barrier buff id.
pub const COUNTER_BARRIER: u16 = 91;

/// Wielded-weapon fields the resolution needs.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WeaponFacts {
    pub obj_id: u32,
    pub item_id: u32,
    pub enchant: i32,
    pub small: i32,
    pub large: i32,
    pub hit_mod: i32,
    pub dmg_mod: i32,
    pub ranged: bool,
}

pub(crate) fn weapon_facts(world: &World, env: &Env, char_id: u32) -> Option<WeaponFacts> {
    let p = world.players.get(&char_id)?;
    let w = p.inventory.weapon()?;
    let t = env.tables.item(w.item_id)?;
    Some(WeaponFacts {
        obj_id: w.obj_id,
        item_id: w.item_id,
        enchant: w.enchant,
        small: t.dmg_small,
        large: t.dmg_large,
        hit_mod: t.hit_mod,
        dmg_mod: t.dmg_mod,
        ranged: t.ranged,
    })
}

/// Drains the combat queue each update phase.
pub struct CombatSystem;

impl System for CombatSystem {
    fn name(&self) -> &'static str {
        "combat"
    }

    fn update(&mut self, world: &mut World, env: &Env) {
        while let Some(req) = world.queues.combat.pop_front() {
            process_attack(world, env, req);
        }
    }
}

fn process_attack(world: &mut World, env: &Env, req: CombatRequest) {
    let Some(attacker) = world.player_by_session(req.attacker) else {
        return;
    };
    if attacker.dead || attacker.paralysis.incapacitated() {
        return;
    }
    let char_id = attacker.char_id;
    let (map, ax, ay) = (attacker.map, attacker.x, attacker.y);
    let breaks_stealth = attacker.absolute_barrier || attacker.invisible > 0;

    // Attacking breaks absolute barrier and invisibility.
    if breaks_stealth {
        super::skills::effect::remove_buff(world, env, char_id, 90);
        super::skills::effect::remove_buff(world, env, char_id, 60);
    }

    let weapon = weapon_facts(world, env, char_id);
    let Some(target_ref) = world.resolve_target(req.target) else {
        return;
    };

    let max_range = if req.ranged { RANGED_RANGE } else { MELEE_RANGE };
    let (tx, ty, target_big, target_ac, target_level, target_mr, target_alive) = match target_ref {
        TargetRef::Npc(obj) => {
            let n = world.npcs.get(&obj).expect("resolved");
            let t = env.tables.npc(n.template);
            (
                n.x,
                n.y,
                t.is_some_and(|t| t.big),
                t.map_or(0, |t| t.ac),
                t.map_or(1, |t| t.level),
                t.map_or(0, |t| t.mr),
                !n.dead && n.map == map,
            )
        }
        TargetRef::Player(pid) => {
            let t = world.players.get(&pid).expect("resolved");
            (
                t.x,
                t.y,
                false,
                t.ac,
                t.level,
                t.mr,
                !t.dead && t.map == map,
            )
        }
        TargetRef::Companion(_) => return,
    };
    if !target_alive || chebyshev(ax, ay, tx, ty) > max_range {
        return;
    }

    // Ranged consumes one arrow from the bag.
    if req.ranged {
        let consumed = {
            let p = world.players.get_mut(&char_id).expect("resolved");
            match p.inventory.find_arrow(&env.tables) {
                Some(arrow_obj) => p.inventory.take(arrow_obj, 1, 0).is_some(),
                None => false,
            }
        };
        if !consumed {
            return;
        }
    }

    let attacker = world.players.get(&char_id).expect("resolved");
    let w = weapon.unwrap_or_default();
    let ctx = MeleeContext {
        attacker_level: attacker.level,
        str_: attacker.str_,
        dex: attacker.dex,
        weapon_small: w.small,
        weapon_large: w.large,
        enchant: w.enchant,
        hit_mod: attacker.hit_mod + w.hit_mod + if req.ranged { attacker.bow_hit } else { 0 },
        dmg_mod: attacker.dmg_mod + w.dmg_mod + if req.ranged { attacker.bow_dmg } else { 0 },
        target_ac,
        target_level,
        target_mr,
        target_big,
    };
    let outcome = if req.ranged {
        env.engine.calc_ranged_attack(ctx)
    } else {
        env.engine.calc_melee_attack(ctx)
    };
    let mut damage = if outcome.hit { outcome.damage.max(0) } else { 0 };
    let heading = heading_toward(ax, ay, tx, ty);

    // Safety zones keep PvP to the animation.
    if matches!(target_ref, TargetRef::Player(_))
        && (world.map_data.is_safety_zone(map, ax, ay)
            || world.map_data.is_safety_zone(map, tx, ty))
    {
        damage = 0;
    }

    // Counter-barrier reflects before anything lands.
    if let TargetRef::Player(pid) = target_ref {
        let has_barrier = world
            .players
            .get(&pid)
            .is_some_and(|t| t.buffs.contains(COUNTER_BARRIER));
        if damage > 0 && has_barrier && rand::thread_rng().gen_range(0..100) < COUNTER_BARRIER_CHANCE
        {
            let counter = (w.large + w.enchant + ctx.dmg_mod) * 2 * 3 / 2;
            debug!(attacker = %char_id, target = %pid, counter = %counter, "Counter barrier");
            let pkt = server::attack(req.target, char_id, counter, heading_toward(tx, ty, ax, ay));
            broadcast_nearby(world, env, map, tx, ty, &pkt);
            damage_player(world, env, char_id, counter, None);
            // The original swing lands as zero; no durability loss either.
            let miss = if req.ranged {
                server::arrow_attack(char_id, req.target, 0, heading, 66)
            } else {
                server::attack(char_id, req.target, 0, heading)
            };
            broadcast_nearby(world, env, map, ax, ay, &miss);
            return;
        }
    }

    let pkt = if req.ranged {
        server::arrow_attack(char_id, req.target, damage, heading, 66)
    } else {
        server::attack(char_id, req.target, damage, heading)
    };
    broadcast_nearby(world, env, map, ax, ay, &pkt);

    if let Some(p) = world.players.get_mut(&char_id) {
        p.heading = heading;
    }

    // Weapon durability wears on use.
    if damage > 0 && w.obj_id != 0 && rand::thread_rng().gen_range(0..100) < 4 {
        if let Some(p) = world.players.get_mut(&char_id) {
            if let Some(item) = p.inventory.get_mut(w.obj_id) {
                item.durability = (item.durability - 1).max(0);
            }
        }
    }

    match target_ref {
        TargetRef::Npc(obj) => {
            if damage > 0 {
                if let Some(facts) = weapon {
                    procs::weapon_proc(world, env, char_id, obj, facts);
                }
            }
            damage_npc(world, env, obj, damage, req.attacker);
        }
        TargetRef::Player(pid) => {
            damage_player(world, env, pid, damage, Some(req.attacker));
        }
        TargetRef::Companion(_) => {}
    }
}

/// Apply damage to an NPC: sleep break, hate, meter, death routing.
pub(crate) fn damage_npc(world: &mut World, env: &Env, npc_obj: u32, damage: i32, attacker: u64) {
    let (dead_now, map, x, y, ratio) = {
        let Some(n) = world.npcs.get_mut(&npc_obj) else {
            return;
        };
        if n.dead {
            return;
        }
        if damage > 0 {
            n.sleeping = false;
            n.cur_hp = (n.cur_hp - damage).max(0);
            n.hate.add(attacker, damage as i64);
        }
        let max_hp = env.tables.npc(n.template).map_or(n.cur_hp.max(1), |t| t.hp);
        (n.cur_hp == 0, n.map, n.x, n.y, n.hp_ratio(max_hp))
    };

    let meter = server::hp_meter(npc_obj, ratio);
    broadcast_nearby(world, env, map, x, y, &meter);

    if dead_now {
        death::npc_death(world, env, npc_obj, attacker);
    }
}

/// Apply damage to a player: sleep break, vitals, meters, death routing.
/// `attacker` is the session credited for a PvP kill; NPC damage passes
/// `None`.
pub(crate) fn damage_player(
    world: &mut World,
    env: &Env,
    char_id: u32,
    damage: i32,
    attacker: Option<u64>,
) {
    let dead_now = {
        let Some(p) = world.players.get_mut(&char_id) else {
            return;
        };
        if p.dead {
            return;
        }
        if damage > 0 && p.paralysis.asleep() {
            // Damage wakes; the buff-side bookkeeping follows below.
            p.paralysis.sleep = 0;
        }
        if damage > 0 {
            p.cur_hp = (p.cur_hp - damage).max(0);
            p.dirty = true;
        }
        p.cur_hp == 0
    };
    if damage > 0 {
        super::skills::effect::strip_sleep_buffs(world, env, char_id);
    }

    if let Some(p) = world.players.get(&char_id) {
        send_hp(env, p);
        let meter = server::hp_meter(char_id, p.hp_ratio());
        broadcast_nearby(world, env, p.map, p.x, p.y, &meter);
    }
    party_hp_update(world, env, char_id);

    if dead_now {
        death::player_death(world, env, char_id, attacker);
    }
}

/// Heal a player, clamped to MaxHP, with meter updates.
pub(crate) fn heal_player(world: &mut World, env: &Env, char_id: u32, amount: i32) {
    let Some(p) = world.players.get_mut(&char_id) else {
        return;
    };
    if p.dead || amount <= 0 {
        return;
    }
    p.cur_hp = (p.cur_hp + amount).min(p.max_hp);
    p.dirty = true;
    send_hp(env, p);
    party_hp_update(world, env, char_id);
}
