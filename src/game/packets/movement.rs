//! Movement handler.

use super::{Ctx, PacketHandler};
use crate::error::HandlerResult;
use crate::game::broadcast_nearby_except;
use crate::world::chebyshev;
use runegate_proto::{server, PacketReader};
use tracing::debug;

/// Minimum ticks between steps at normal speed. Haste halves it, brave
/// stacks on top.
fn min_step_ticks(move_speed: u8, brave_speed: u8) -> u64 {
    let base = 4u64;
    let hasted = if move_speed > 0 { base / 2 } else { base };
    if brave_speed > 0 {
        (hasted * 2) / 3
    } else {
        hasted
    }
    .max(1)
}

/// One-tile move request.
pub struct MoveHandler;

impl PacketHandler for MoveHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, r: &mut PacketReader<'_>) -> HandlerResult {
        let x = r.i32()?;
        let y = r.i32()?;
        let heading = r.u8()? & 7;

        let char_id = ctx.char_id()?;
        let Some(p) = ctx.world.players.get(&char_id) else {
            return Ok(());
        };
        if p.dead || p.paralysis.incapacitated() {
            return Ok(());
        }

        // Basic move-rate rejection: snap back a client stepping faster
        // than its speed allows or further than one tile.
        let too_fast =
            ctx.world.tick - p.last_move_tick < min_step_ticks(p.move_speed, p.brave_speed);
        let too_far = chebyshev(p.x, p.y, x, y) > 1;
        if too_fast || too_far {
            debug!(char = %char_id, "Move rejected, snapping back");
            ctx.reply(&server::move_object(char_id, p.x, p.y, p.heading));
            return Ok(());
        }

        if !ctx.world.map_data.is_passable(p.map, x, y, heading) {
            ctx.reply(&server::move_object(char_id, p.x, p.y, p.heading));
            return Ok(());
        }

        let (map, old_x, old_y) = (p.map, p.x, p.y);
        let now = ctx.world.tick;
        ctx.world.relocate_player(char_id, map, x, y);
        if let Some(p) = ctx.world.players.get_mut(&char_id) {
            p.heading = heading;
            p.last_move_tick = now;
            p.dirty = true;
        }

        // Move packets carry the tile being left; viewers animate from it.
        let pkt = server::move_object(char_id, old_x, old_y, heading);
        broadcast_nearby_except(ctx.world, ctx.env, map, x, y, &pkt, ctx.session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_ticks_scale_with_speed_buffs() {
        assert_eq!(min_step_ticks(0, 0), 4);
        assert_eq!(min_step_ticks(1, 0), 2);
        assert!(min_step_ticks(1, 1) < min_step_ticks(1, 0) + 1);
        assert!(min_step_ticks(2, 4) >= 1);
    }
}
