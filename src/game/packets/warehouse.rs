//! Warehouse window handler. The operation logic lives in
//! [`crate::game::warehouse`].

use super::{Ctx, PacketHandler};
use crate::error::HandlerResult;
use crate::game::warehouse;
use runegate_proto::PacketReader;

const OP_DEPOSIT: u8 = 0;
const OP_WITHDRAW: u8 = 1;
const OP_CLOSE: u8 = 2;

pub struct WarehouseHandler;

impl PacketHandler for WarehouseHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, r: &mut PacketReader<'_>) -> HandlerResult {
        let kind = r.u8()?;
        let op = r.u8()?;
        let char_id = ctx.char_id()?;

        match op {
            OP_DEPOSIT => {
                let obj_id = r.u32()?;
                let count = r.u32()?;
                warehouse::deposit(ctx.world, ctx.env, char_id, kind, obj_id, count)
            }
            OP_WITHDRAW => {
                let obj_id = r.u32()?;
                warehouse::withdraw(ctx.world, ctx.env, char_id, kind, obj_id)
            }
            OP_CLOSE => {
                warehouse::close(ctx.world, ctx.env, char_id);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
