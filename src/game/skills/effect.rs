//! Buff application, reversal, and timed affliction ticking.
//!
//! Every buff carries its full delta record, so reversal is subtraction
//! plus a flag recompute over whatever buffs remain. The four paralysis
//! sources stay independent throughout.

use crate::game::packets::party_hp_update;
use crate::game::{broadcast_nearby, send_ability_scores, send_hp, send_status, weight_pct, Env};
use crate::world::{ActiveBuff, Player, PoisonKind, World};
use runegate_proto::server;
use tracing::debug;

/// Client codes for the paralysis packet.
const PARA_HOLD: u8 = 1;
const PARA_SLEEP: u8 = 2;
const PARA_FREEZE: u8 = 3;

/// Damage-poison pulse interval, in ticks.
const POISON_PULSE_TICKS: u32 = 15;
/// Paralyzing poison advances a stage this often.
const POISON_STAGE_TICKS: u32 = 10;
/// Poisons and curses wear off after this many ticks.
const AFFLICTION_TICKS: u32 = 150;
/// Mummy curse escalates to its holding stage after 5 seconds.
const CURSE_STAGE2_TICKS: u32 = 25;

/// Register and apply a buff skill's payload on a player.
///
/// Exclusion skills are removed first; a same-id buff is replaced with its
/// old deltas reverted; conflicting speed types cancel to zero.
pub fn apply_buff_effect(world: &mut World, env: &Env, char_id: u32, skill_id: u16, level: u16) {
    let effect = env.engine.buff_effect(skill_id, level);
    if effect.duration_secs <= 0 {
        return;
    }

    for ex in &effect.exclusions {
        remove_buff(world, env, char_id, *ex);
    }

    // Speed-type conflict after exclusions: both sides drop to zero.
    if let Some(new_speed) = effect.flags.move_speed {
        let conflicting: Vec<u16> = world
            .players
            .get(&char_id)
            .map(|p| {
                p.buffs
                    .iter()
                    .filter(|b| b.flags.move_speed.is_some_and(|v| v != new_speed))
                    .map(|b| b.skill_id)
                    .collect()
            })
            .unwrap_or_default();
        if !conflicting.is_empty() {
            debug!(char = %char_id, skill = %skill_id, "Move-speed conflict, cancelling both");
            for id in conflicting {
                remove_buff(world, env, char_id, id);
            }
            return;
        }
    }

    let buff = ActiveBuff {
        skill_id,
        ticks_left: (effect.duration_secs as u32) * 5,
        deltas: effect.deltas,
        flags: effect.flags,
        poly_id: effect.poly_id,
        non_cancellable: effect.non_cancellable || env.engine.is_non_cancellable(skill_id),
    };

    let primaries_touched = {
        let Some(p) = world.players.get_mut(&char_id) else {
            return;
        };
        let secs = buff.remaining_secs() as u16;
        let deltas = buff.deltas;
        let flags = buff.flags;
        if let Some(old) = p.buffs.add(buff) {
            p.apply_deltas(&old.deltas, -1);
        }
        p.apply_deltas(&deltas, 1);
        recompute_flags(p);
        if flags.sleeped {
            env.sessions
                .send_to(p.session_id, &server::paralysis(PARA_SLEEP, true));
        }
        if flags.paralyzed {
            env.sessions
                .send_to(p.session_id, &server::paralysis(PARA_FREEZE, true));
        }
        env.sessions
            .send_to(p.session_id, &server::buff_icon(skill_id, secs, true));
        p.dirty = true;
        deltas.touches_primaries()
    };

    if primaries_touched {
        if let Some(p) = world.players.get(&char_id) {
            send_ability_scores(env, p);
            send_status(env, p, weight_pct(p, &env.tables));
        }
    } else if let Some(p) = world.players.get(&char_id) {
        send_status(env, p, weight_pct(p, &env.tables));
    }
}

/// Attach a buff loaded from the database to a not-yet-inserted player.
/// Applies deltas and flags without emitting packets; login sends the
/// icon set afterwards.
pub fn attach_restored_buff(p: &mut Player, buff: ActiveBuff) {
    let deltas = buff.deltas;
    if let Some(old) = p.buffs.add(buff) {
        p.apply_deltas(&old.deltas, -1);
    }
    p.apply_deltas(&deltas, 1);
    recompute_flags(p);
}

/// Remove one buff: revert its deltas, recompute flags, notify.
pub fn remove_buff(world: &mut World, env: &Env, char_id: u32, skill_id: u16) {
    let Some(p) = world.players.get_mut(&char_id) else {
        return;
    };
    let Some(buff) = p.buffs.remove(skill_id) else {
        return;
    };
    p.apply_deltas(&buff.deltas, -1);
    let had_poly = buff.poly_id.is_some();
    recompute_flags(p);

    let session = p.session_id;
    env.sessions
        .send_to(session, &server::buff_icon(skill_id, 0, false));
    if buff.flags.sleeped && !p.paralysis.asleep() {
        env.sessions.send_to(session, &server::paralysis(PARA_SLEEP, false));
    }
    if buff.flags.paralyzed && p.paralysis.from_buff == 0 {
        env.sessions
            .send_to(session, &server::paralysis(PARA_FREEZE, false));
    }
    p.dirty = true;

    if had_poly {
        // UndoPoly: shape reverts; viewers learn via the status resend and
        // the next visibility pass.
        debug!(char = %char_id, "Polymorph reverted");
    }
    let touches = buff.deltas.touches_primaries();
    if let Some(p) = world.players.get(&char_id) {
        if touches {
            send_ability_scores(env, p);
        }
        send_status(env, p, weight_pct(p, &env.tables));
    }
}

/// Recompute every buff-derived flag from the surviving buff set. Poison,
/// curse, and sleep sources outside the buff map are left untouched.
fn recompute_flags(p: &mut Player) {
    let mut move_speed = 0u8;
    let mut brave_speed = 0u8;
    let mut invisible = 0u8;
    let mut held = 0u8;
    let mut sleep = 0u8;
    let mut barrier = false;
    let mut poly = None;
    for b in p.buffs.iter() {
        if let Some(v) = b.flags.move_speed {
            move_speed = move_speed.max(v);
        }
        if let Some(v) = b.flags.brave_speed {
            brave_speed = brave_speed.max(v);
        }
        if b.flags.invisible {
            invisible += 1;
        }
        if b.flags.paralyzed {
            held += 1;
        }
        if b.flags.sleeped {
            sleep += 1;
        }
        if b.flags.absolute_barrier {
            barrier = true;
        }
        if b.poly_id.is_some() {
            poly = b.poly_id;
        }
    }
    p.move_speed = move_speed;
    p.brave_speed = brave_speed;
    p.invisible = invisible;
    p.paralysis.from_buff = held;
    p.paralysis.sleep = sleep;
    p.absolute_barrier = barrier;
    p.poly_id = poly;
}

/// Remove every cancellable buff (dispel).
pub fn cancel_all(world: &mut World, env: &Env, char_id: u32) {
    let ids: Vec<u16> = world
        .players
        .get(&char_id)
        .map(|p| {
            p.buffs
                .iter()
                .filter(|b| !b.non_cancellable)
                .map(|b| b.skill_id)
                .collect()
        })
        .unwrap_or_default();
    for id in ids {
        remove_buff(world, env, char_id, id);
    }
}

/// Death strips everything, non-cancellable, speed, and polymorph
/// included.
pub fn clear_all_buffs_on_death(world: &mut World, env: &Env, char_id: u32) {
    let ids: Vec<u16> = world
        .players
        .get(&char_id)
        .map(|p| p.buffs.ids())
        .unwrap_or_default();
    for id in ids {
        remove_buff(world, env, char_id, id);
    }
}

/// Damage breaks sleep: remove every sleep-flagged buff.
pub fn strip_sleep_buffs(world: &mut World, env: &Env, char_id: u32) {
    let ids: Vec<u16> = world
        .players
        .get(&char_id)
        .map(|p| {
            p.buffs
                .iter()
                .filter(|b| b.flags.sleeped)
                .map(|b| b.skill_id)
                .collect()
        })
        .unwrap_or_default();
    for id in ids {
        remove_buff(world, env, char_id, id);
    }
}

/// Clear poison and its visuals; a stage-4 paralyzing poison releases its
/// hold, other paralysis sources stay.
pub fn cure_poison(world: &mut World, env: &Env, char_id: u32) {
    let Some(p) = world.players.get_mut(&char_id) else {
        return;
    };
    if p.poison.take().is_some() {
        p.paralysis.from_poison = false;
        let (map, x, y) = (p.map, p.x, p.y);
        let pkt = server::poison_color(char_id, 0);
        broadcast_nearby(world, env, map, x, y, &pkt);
    }
}

/// Inflict damage-poison on a player, credited to a session.
pub fn inflict_damage_poison(
    world: &mut World,
    env: &Env,
    char_id: u32,
    amount: i32,
    attacker: u64,
) {
    let Some(p) = world.players.get_mut(&char_id) else {
        return;
    };
    if p.poison.is_some() {
        return;
    }
    p.poison = Some(crate::world::Poison {
        kind: PoisonKind::Damage { amount, attacker },
        timer: 0,
    });
    let (map, x, y) = (p.map, p.x, p.y);
    let pkt = server::poison_color(char_id, 1);
    broadcast_nearby(world, env, map, x, y, &pkt);
}

/// Inflict silence- or paralysis-poison.
pub fn inflict_special_poison(world: &mut World, env: &Env, char_id: u32, paralyzing: bool) {
    let Some(p) = world.players.get_mut(&char_id) else {
        return;
    };
    if p.poison.is_some() {
        return;
    }
    p.poison = Some(crate::world::Poison {
        kind: if paralyzing {
            PoisonKind::Paralyzing { stage: 1 }
        } else {
            PoisonKind::Silence
        },
        timer: 0,
    });
    let (map, x, y) = (p.map, p.x, p.y);
    let pkt = server::poison_color(char_id, 2);
    broadcast_nearby(world, env, map, x, y, &pkt);
}

/// Start the mummy curse at stage 1.
pub fn inflict_curse(world: &mut World, env: &Env, char_id: u32) {
    let Some(p) = world.players.get_mut(&char_id) else {
        return;
    };
    if p.curse.is_some() {
        return;
    }
    p.curse = Some(crate::world::player::Curse { stage: 1, timer: 0 });
    let (map, x, y) = (p.map, p.x, p.y);
    let pkt = server::poison_color(char_id, 2);
    broadcast_nearby(world, env, map, x, y, &pkt);
}

/// Ticks buff lifetimes and poison/curse afflictions for every player.
pub struct BuffTickSystem;

impl crate::game::System for BuffTickSystem {
    fn name(&self) -> &'static str {
        "buff-tick"
    }

    fn update(&mut self, world: &mut World, env: &Env) {
        let chars: Vec<u32> = world.players.keys().copied().collect();
        for char_id in chars {
            // Buff lifetimes.
            let expired = match world.players.get_mut(&char_id) {
                Some(p) => p.buffs.tick(),
                None => continue,
            };
            for skill_id in expired {
                remove_buff(world, env, char_id, skill_id);
            }

            tick_afflictions(world, env, char_id);
        }
    }
}

fn tick_afflictions(world: &mut World, env: &Env, char_id: u32) {
    // Poison.
    let mut pulse: Option<(i32, u64)> = None;
    let mut cleared = false;
    {
        let Some(p) = world.players.get_mut(&char_id) else {
            return;
        };
        if let Some(mut poison) = p.poison {
            poison.timer += 1;
            if poison.timer >= AFFLICTION_TICKS {
                p.poison = None;
                p.paralysis.from_poison = false;
                cleared = true;
            } else {
                match poison.kind {
                    PoisonKind::Damage { amount, attacker } => {
                        if poison.timer % POISON_PULSE_TICKS == 0 && !p.dead {
                            pulse = Some((amount, attacker));
                        }
                        p.poison = Some(poison);
                    }
                    PoisonKind::Silence => {
                        p.poison = Some(poison);
                    }
                    PoisonKind::Paralyzing { stage } => {
                        let mut stage = stage;
                        if stage < 4 && poison.timer % POISON_STAGE_TICKS == 0 {
                            stage += 1;
                            if stage == 4 {
                                p.paralysis.from_poison = true;
                                env.sessions
                                    .send_to(p.session_id, &server::paralysis(PARA_HOLD, true));
                            }
                        }
                        p.poison = Some(crate::world::Poison {
                            kind: PoisonKind::Paralyzing { stage },
                            timer: poison.timer,
                        });
                    }
                }
            }
        }
    }
    if let Some((amount, _attacker)) = pulse {
        // Poison never lands the killing blow; it floors at 1 HP.
        if let Some(p) = world.players.get_mut(&char_id) {
            p.cur_hp = (p.cur_hp - amount).max(1);
            p.dirty = true;
            send_hp(env, p);
        }
        party_hp_update(world, env, char_id);
    }
    if cleared {
        if let Some(p) = world.players.get(&char_id) {
            let (map, x, y) = (p.map, p.x, p.y);
            let still_held = p.paralysis.held();
            let session = p.session_id;
            let pkt = server::poison_color(char_id, p.poison_color());
            broadcast_nearby(world, env, map, x, y, &pkt);
            if !still_held {
                env.sessions.send_to(session, &server::paralysis(PARA_HOLD, false));
            }
        }
    }

    // Curse.
    let mut curse_cleared = false;
    {
        let Some(p) = world.players.get_mut(&char_id) else {
            return;
        };
        if let Some(mut curse) = p.curse {
            curse.timer += 1;
            if curse.timer >= AFFLICTION_TICKS {
                p.curse = None;
                p.paralysis.from_curse = false;
                curse_cleared = true;
            } else {
                if curse.stage == 1 && curse.timer >= CURSE_STAGE2_TICKS {
                    curse.stage = 2;
                    p.paralysis.from_curse = true;
                    env.sessions
                        .send_to(p.session_id, &server::paralysis(PARA_HOLD, true));
                }
                p.curse = Some(curse);
            }
        }
    }
    if curse_cleared {
        if let Some(p) = world.players.get(&char_id) {
            let (map, x, y) = (p.map, p.x, p.y);
            let still_held = p.paralysis.held();
            let session = p.session_id;
            let pkt = server::poison_color(char_id, p.poison_color());
            broadcast_nearby(world, env, map, x, y, &pkt);
            if !still_held {
                env.sessions.send_to(session, &server::paralysis(PARA_HOLD, false));
            }
        }
    }
}
