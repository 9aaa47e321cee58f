//! Attack request handler: validate cheaply, enqueue for the combat
//! system.

use super::{Ctx, PacketHandler};
use crate::error::HandlerResult;
use crate::world::CombatRequest;
use runegate_proto::PacketReader;

pub struct AttackHandler;

impl PacketHandler for AttackHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, r: &mut PacketReader<'_>) -> HandlerResult {
        let target = r.u32()?;
        let _x = r.i32()?;
        let _y = r.i32()?;

        let char_id = ctx.char_id()?;
        let Some(p) = ctx.world.players.get(&char_id) else {
            return Ok(());
        };
        if p.dead {
            return Ok(());
        }

        // Melee vs ranged is the server's call, from the wielded weapon.
        let ranged = p
            .inventory
            .weapon()
            .and_then(|w| ctx.env.tables.item(w.item_id))
            .is_some_and(|t| t.ranged);

        ctx.world.queues.combat.push_back(CombatRequest {
            attacker: ctx.session_id,
            target,
            ranged,
        });
        Ok(())
    }
}
