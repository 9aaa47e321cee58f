//! Trade flow and the economic write-ahead log.
//!
//! Adding an item deducts it immediately; the window is the only holder
//! until commit or cancel. Commit writes the WAL synchronously before any
//! memory deposit becomes visible; a failed WAL write cancels the trade
//! and restores both sides byte-identical.

use super::{messages, server_message, Env};
use crate::db::WalEntry;
use crate::world::{TradeSide, World, ADENA};
use runegate_proto::server;
use tracing::{info, warn};

/// Open a trade between two players and bind it to both. The client
/// opens its window off the accepted request dialog; nothing is sent
/// here.
pub fn open_trade(world: &mut World, _env: &Env, a: u32, b: u32) -> Option<u32> {
    let ok = world.players.get(&a).is_some_and(|p| p.trade.is_none())
        && world.players.get(&b).is_some_and(|p| p.trade.is_none());
    if !ok {
        return None;
    }
    let id = world.trades.open(a, b);
    world.players.get_mut(&a).expect("checked").trade = Some(id);
    world.players.get_mut(&b).expect("checked").trade = Some(id);
    Some(id)
}

/// Move `count` of an inventory item into the open trade window.
pub fn add_item(world: &mut World, env: &Env, char_id: u32, obj_id: u32, count: u32) {
    let Some(trade_id) = world.players.get(&char_id).and_then(|p| p.trade) else {
        return;
    };
    let next_obj = world.alloc_obj_id();
    let Some(p) = world.players.get_mut(&char_id) else {
        return;
    };
    let session = p.session_id;
    let Some(part) = p.inventory.take(obj_id, count, next_obj) else {
        return;
    };
    let remaining = p.inventory.get(obj_id).map(|i| i.count).unwrap_or(0);
    p.dirty = true;
    if remaining > 0 {
        env.sessions
            .send_to(session, &server::inventory_count(obj_id, remaining));
    } else {
        env.sessions.send_to(session, &server::inventory_remove(obj_id));
    }

    if let Some(t) = world.trades.get_mut(trade_id) {
        let side = t.side_of(char_id).expect("bound");
        t.items_of(side).push(part);
        t.reset_ok();
    }
}

/// Move adena into the open trade window.
pub fn add_gold(world: &mut World, env: &Env, char_id: u32, amount: u32) {
    if amount == 0 {
        return;
    }
    let Some(trade_id) = world.players.get(&char_id).and_then(|p| p.trade) else {
        return;
    };
    let Some(p) = world.players.get_mut(&char_id) else {
        return;
    };
    let session = p.session_id;
    if !p.inventory.consume(ADENA, amount) {
        server_message(env, session, messages::GOLD_SHORT);
        return;
    }
    p.dirty = true;
    if let Some(t) = world.trades.get_mut(trade_id) {
        match t.side_of(char_id).expect("bound") {
            TradeSide::A => t.a_adena += amount,
            TradeSide::B => t.b_adena += amount,
        }
        t.reset_ok();
    }
}

/// Press OK; when both sides have confirmed, commit.
pub fn set_ok(world: &mut World, env: &Env, char_id: u32) {
    let Some(trade_id) = world.players.get(&char_id).and_then(|p| p.trade) else {
        return;
    };
    let both = {
        let Some(t) = world.trades.get_mut(trade_id) else {
            return;
        };
        match t.side_of(char_id) {
            Some(TradeSide::A) => t.a_ok = true,
            Some(TradeSide::B) => t.b_ok = true,
            None => return,
        }
        t.both_ok()
    };
    if both {
        commit(world, env, trade_id);
    }
}

/// Commit: WAL first, deposits only after the write lands.
fn commit(world: &mut World, env: &Env, trade_id: u32) {
    let Some(trade) = world.trades.close(trade_id) else {
        return;
    };

    let mut entries = Vec::new();
    for item in &trade.a_items {
        entries.push(WalEntry {
            tx_type: "trade",
            from_char: trade.a,
            to_char: trade.b,
            item_id: item.item_id,
            count: item.count,
            enchant: item.enchant,
            gold: 0,
        });
    }
    for item in &trade.b_items {
        entries.push(WalEntry {
            tx_type: "trade",
            from_char: trade.b,
            to_char: trade.a,
            item_id: item.item_id,
            count: item.count,
            enchant: item.enchant,
            gold: 0,
        });
    }
    if trade.a_adena > 0 {
        entries.push(WalEntry {
            tx_type: "trade",
            from_char: trade.a,
            to_char: trade.b,
            item_id: ADENA,
            count: 0,
            enchant: 0,
            gold: trade.a_adena,
        });
    }
    if trade.b_adena > 0 {
        entries.push(WalEntry {
            tx_type: "trade",
            from_char: trade.b,
            to_char: trade.a,
            item_id: ADENA,
            count: 0,
            enchant: 0,
            gold: trade.b_adena,
        });
    }

    if !entries.is_empty() {
        let db = env.db.clone();
        let wrote = env.rt.block_on(async { db.wal().write(&entries).await });
        match wrote {
            Ok(high) => world.wal_high_water = world.wal_high_water.max(high),
            Err(e) => {
                warn!(error = %e, "WAL write failed, cancelling trade");
                restore_sides(world, env, trade);
                return;
            }
        }
    }

    info!(a = %trade.a, b = %trade.b, "Trade committed");

    // Deposit A's window into B and vice versa.
    deposit(world, env, trade.b, trade.a_items, trade.a_adena);
    deposit(world, env, trade.a, trade.b_items, trade.b_adena);

    for char_id in [trade.a, trade.b] {
        if let Some(p) = world.players.get_mut(&char_id) {
            p.trade = None;
            p.dirty = true;
            server_message(env, p.session_id, messages::TRADE_DONE);
        }
    }
}

/// Cancel an open trade (window close, disconnect, WAL failure); both
/// sides get their deductions back byte-identical.
pub fn cancel(world: &mut World, env: &Env, trade_id: u32) {
    let Some(trade) = world.trades.close(trade_id) else {
        return;
    };
    restore_sides(world, env, trade);
}

fn restore_sides(world: &mut World, env: &Env, trade: crate::world::Trade) {
    let crate::world::Trade {
        a,
        b,
        a_items,
        b_items,
        a_adena,
        b_adena,
        ..
    } = trade;
    deposit(world, env, a, a_items, a_adena);
    deposit(world, env, b, b_items, b_adena);
    for char_id in [a, b] {
        if let Some(p) = world.players.get_mut(&char_id) {
            p.trade = None;
            p.dirty = true;
            server_message(env, p.session_id, messages::TRADE_CANCELLED);
        }
    }
}

fn deposit(world: &mut World, env: &Env, char_id: u32, items: Vec<crate::world::ItemInstance>, adena: u32) {
    let next_obj = world.alloc_obj_id();
    let Some(p) = world.players.get_mut(&char_id) else {
        // Receiver vanished mid-commit; the items fall to the floor at the
        // last known spot is not possible without a position, so they are
        // dropped from memory. The WAL row still records the flow.
        warn!(char = %char_id, "Trade deposit target offline, items lost to recovery");
        return;
    };
    let session = p.session_id;
    for item in items {
        let resident = p.inventory.add(item, &env.tables);
        if let Some(i) = p.inventory.get(resident) {
            let desc = env
                .tables
                .item(i.item_id)
                .map(|t| i.describe(t))
                .unwrap_or_default();
            env.sessions.send_to(
                session,
                &server::inventory_add(resident, i.item_id, i.count, i.identified, &desc),
            );
        }
    }
    if adena > 0 {
        let instance = crate::world::ItemInstance {
            obj_id: next_obj,
            item_id: ADENA,
            count: adena,
            enchant: 0,
            identified: true,
            durability: 0,
        };
        let resident = p.inventory.add(instance, &env.tables);
        if let Some(i) = p.inventory.get(resident) {
            env.sessions
                .send_to(session, &server::inventory_count(resident, i.count));
        }
    }
    p.dirty = true;
}

/// Crash recovery: replay unprocessed WAL rows into stored inventories,
/// then mark them processed. Runs once at startup, before the world opens.
pub async fn recover_wal(db: &crate::db::Database) -> Result<(), crate::db::DbError> {
    let rows = db.wal().load_unprocessed().await?;
    if rows.is_empty() {
        return Ok(());
    }
    info!(count = rows.len(), "Replaying unprocessed WAL entries");

    let mut high = 0i64;
    for row in rows {
        high = high.max(row.id);
        let (items, _) = db.inventory().load(row.to_char).await?;
        if row.gold > 0 {
            // Top up the receiver's adena stack.
            let mut items = items;
            if let Some(stack) = items.iter_mut().find(|i| i.item_id == ADENA) {
                stack.count += row.gold;
            } else {
                let max_id = db.inventory().max_obj_id().await?;
                items.push(crate::db::ItemRow {
                    obj_id: max_id + 1,
                    item_id: ADENA,
                    count: row.gold,
                    enchant: 0,
                    identified: true,
                    durability: 0,
                });
            }
            let (_, equipment) = db.inventory().load(row.to_char).await?;
            db.inventory().replace(row.to_char, &items, &equipment).await?;
        } else if row.item_id != 0 {
            // Only replay flows the saved inventory does not already show.
            let already = items
                .iter()
                .any(|i| i.item_id == row.item_id && i.enchant == row.enchant);
            if !already {
                let mut items = items;
                let max_id = db.inventory().max_obj_id().await?;
                items.push(crate::db::ItemRow {
                    obj_id: max_id + 1,
                    item_id: row.item_id,
                    count: row.count.max(1),
                    enchant: row.enchant,
                    identified: true,
                    durability: 0,
                });
                let (_, equipment) = db.inventory().load(row.to_char).await?;
                db.inventory().replace(row.to_char, &items, &equipment).await?;
            }
        }
    }
    db.wal().mark_processed(high).await?;
    Ok(())
}
