//! Skill execution.
//!
//! One system owns every cast: requests drain FIFO, walk the validation
//! pipeline, consume resources, and dispatch by target type. The split
//! into attack / buff / self / NPC-debuff / special-routing keeps each
//! branch readable while ordering stays with the single queue owner.

pub mod attack;
pub mod buff;
pub mod effect;
pub mod npc_debuff;
pub mod self_cast;
pub mod special;

use super::{messages, server_message, Env, System};
use crate::data::{SkillTarget, SkillTemplate};
use crate::world::{SkillRequest, World};
use tracing::trace;

/// Drains the skill queue each update phase.
pub struct SkillSystem;

impl System for SkillSystem {
    fn name(&self) -> &'static str {
        "skills"
    }

    fn update(&mut self, world: &mut World, env: &Env) {
        while let Some(req) = world.queues.skill.pop_front() {
            execute_cast(world, env, req);
        }
    }
}

fn execute_cast(world: &mut World, env: &Env, req: SkillRequest) {
    // 1. Definition; the handler already verified the caster knows it.
    let Some(template) = env.tables.skill(req.skill_id).cloned() else {
        return;
    };

    let Some(caster) = world.player_by_session(req.caster) else {
        return;
    };
    let char_id = caster.char_id;
    let session = req.caster;

    // 2. Incapacity aborts silently; casting breaks barrier and stealth.
    if caster.dead || caster.paralysis.incapacitated() || caster.silenced() {
        return;
    }
    if caster.absolute_barrier || caster.invisible > 0 {
        effect::remove_buff(world, env, char_id, 90);
        effect::remove_buff(world, env, char_id, 60);
    }

    let caster = world.players.get(&char_id).expect("resolved");

    // 3. Polymorph gate.
    if let Some(poly) = caster.poly_id {
        if env.tables.polymorph(poly).is_some_and(|p| p.no_cast) {
            server_message(env, session, messages::POLY_FORBIDS);
            return;
        }
    }

    // 4. Global cooldown.
    if world.now_ms() < caster.skill_delay_until {
        return;
    }

    // 5. Costs.
    if caster.cur_hp <= template.hp_cost {
        server_message(env, session, messages::NOT_ENOUGH_HP);
        return;
    }
    if caster.cur_mp < template.mp_cost {
        server_message(env, session, messages::NOT_ENOUGH_MP);
        return;
    }

    // 6. Material on hand.
    if let Some((item_id, count)) = template.material {
        if caster.inventory.count_of(item_id) < count {
            server_message(env, session, messages::MISSING_MATERIAL);
            return;
        }
    }

    // 7. Special routing validates further before anything is consumed.
    if special::try_route(world, env, char_id, &template, &req) {
        return;
    }

    // 8. Consume and arm the cooldown.
    consume_resources(world, env, char_id, &template);

    trace!(char = %char_id, skill = %req.skill_id, "Cast");

    // 9. Dispatch by target type.
    match template.target {
        SkillTarget::Attack => attack::attack_skill(world, env, char_id, &template, &req),
        SkillTarget::Buff => buff::buff_skill(world, env, char_id, &template, req.target),
        SkillTarget::SelfOnly => self_cast::self_skill(world, env, char_id, &template),
    }
}

/// Deduct HP/MP/material and set the reuse gate. Callers have validated.
pub(crate) fn consume_resources(
    world: &mut World,
    env: &Env,
    char_id: u32,
    template: &SkillTemplate,
) {
    let now = world.now_ms();
    let Some(p) = world.players.get_mut(&char_id) else {
        return;
    };
    p.cur_hp = (p.cur_hp - template.hp_cost).max(1);
    p.cur_mp = (p.cur_mp - template.mp_cost).max(0);
    if let Some((item_id, count)) = template.material {
        p.inventory.consume(item_id, count);
    }
    p.skill_delay_until = now + template.reuse_delay_ms;
    p.dirty = true;
    super::send_hp(env, p);
    super::send_mp(env, p);
}
