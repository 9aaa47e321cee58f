//! Trade window handlers. The flow logic lives in [`crate::game::trade`];
//! these decode, validate proximity, and call through.

use super::party::DIALOG_TRADE_REQUEST;
use super::{Ctx, PacketHandler};
use crate::error::{HandlerError, HandlerResult};
use crate::game::trade;
use crate::world::{chebyshev, PendingDialog};
use runegate_proto::{server, PacketReader};

/// Trade partners must stand within this many tiles.
const TRADE_RANGE: i32 = 3;

pub struct TradeRequestHandler;

impl PacketHandler for TradeRequestHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, r: &mut PacketReader<'_>) -> HandlerResult {
        let target = r.u32()?;
        let char_id = ctx.char_id()?;
        if target == char_id {
            return Ok(());
        }

        let (map, x, y, my_name) = {
            let p = ctx
                .world
                .players
                .get(&char_id)
                .ok_or(HandlerError::TargetInvalid("gone"))?;
            if p.dead || p.trade.is_some() {
                return Ok(());
            }
            (p.map, p.x, p.y, p.name.clone())
        };

        let Some(t) = ctx.world.players.get_mut(&target) else {
            return Err(HandlerError::TargetInvalid("offline"));
        };
        if t.dead
            || t.trade.is_some()
            || t.pending_dialog.is_some()
            || t.map != map
            || chebyshev(t.x, t.y, x, y) > TRADE_RANGE
        {
            return Ok(());
        }
        t.pending_dialog = Some(PendingDialog::TradeRequest { from: char_id });
        ctx.env.sessions.send_to(
            t.session_id,
            &server::yes_no_dialog(DIALOG_TRADE_REQUEST, DIALOG_TRADE_REQUEST, &[my_name.as_str()]),
        );
        Ok(())
    }
}

pub struct TradeAddItemHandler;

impl PacketHandler for TradeAddItemHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, r: &mut PacketReader<'_>) -> HandlerResult {
        let obj_id = r.u32()?;
        let count = r.u32()?;
        let char_id = ctx.char_id()?;
        trade::add_item(ctx.world, ctx.env, char_id, obj_id, count);
        Ok(())
    }
}

pub struct TradeAddGoldHandler;

impl PacketHandler for TradeAddGoldHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, r: &mut PacketReader<'_>) -> HandlerResult {
        let amount = r.u32()?;
        let char_id = ctx.char_id()?;
        trade::add_gold(ctx.world, ctx.env, char_id, amount);
        Ok(())
    }
}

pub struct TradeOkHandler;

impl PacketHandler for TradeOkHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, _r: &mut PacketReader<'_>) -> HandlerResult {
        let char_id = ctx.char_id()?;
        trade::set_ok(ctx.world, ctx.env, char_id);
        Ok(())
    }
}

pub struct TradeCancelHandler;

impl PacketHandler for TradeCancelHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, _r: &mut PacketReader<'_>) -> HandlerResult {
        let char_id = ctx.char_id()?;
        if let Some(trade_id) = ctx.world.players.get(&char_id).and_then(|p| p.trade) {
            trade::cancel(ctx.world, ctx.env, trade_id);
        }
        Ok(())
    }
}
