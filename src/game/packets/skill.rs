//! Skill request handler: validate cheaply, enqueue for the skill system.

use super::{Ctx, PacketHandler};
use crate::error::{HandlerError, HandlerResult};
use crate::world::SkillRequest;
use runegate_proto::PacketReader;

pub struct UseSkillHandler;

impl PacketHandler for UseSkillHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, r: &mut PacketReader<'_>) -> HandlerResult {
        let skill_id = r.u16()?;
        let target = r.u32()?;
        let x = r.i32()?;
        let y = r.i32()?;

        let char_id = ctx.char_id()?;
        let Some(p) = ctx.world.players.get(&char_id) else {
            return Ok(());
        };
        if p.dead {
            return Ok(());
        }
        if !p.known_skills.contains(&skill_id) {
            return Err(HandlerError::UnknownSkill);
        }

        ctx.world.queues.skill.push_back(SkillRequest {
            caster: ctx.session_id,
            skill_id,
            target,
            x,
            y,
        });
        Ok(())
    }
}
