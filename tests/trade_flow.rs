//! Trade flow: immediate deduction, cancel-on-disconnect restoration, and
//! the WAL-before-deposit commit.

mod common;

use common::Harness;
use runegated::game::{disconnect, trade};
use runegated::world::{ItemInstance, ADENA};

const POTION: u32 = 40010;

fn give(h: &mut Harness, char_id: u32, item_id: u32, count: u32) -> u32 {
    let obj_id = h.world.alloc_obj_id();
    let tables = h.env.tables.clone();
    let p = h.world.players.get_mut(&char_id).unwrap();
    p.inventory.add(
        ItemInstance {
            obj_id,
            item_id,
            count,
            enchant: 0,
            identified: true,
            durability: 0,
        },
        &tables,
    )
}

#[test]
fn adding_to_the_window_deducts_immediately() {
    let mut h = Harness::new(0);
    let (_c1, _s1) = h.join_player(1, 50, 50);
    let (_c2, _s2) = h.join_player(2, 51, 50);
    let sword = give(&mut h, 1, common::SWORD, 1);

    let trade_id = trade::open_trade(&mut h.world, &h.env, 1, 2).unwrap();
    trade::add_item(&mut h.world, &h.env, 1, sword, 1);

    assert!(h.world.players.get(&1).unwrap().inventory.get(sword).is_none());
    assert_eq!(h.world.trades.get(trade_id).unwrap().a_items.len(), 1);
}

#[test]
fn disconnect_cancels_and_restores_both_sides() {
    let mut h = Harness::new(0);
    let (_c1, s1) = h.join_player(1, 50, 50);
    let (_c2, _s2) = h.join_player(2, 51, 50);

    // P1 brings five potions (as stacks) and 10000 gold; P2 one item.
    let mut p1_items = Vec::new();
    for i in 0..5 {
        p1_items.push(give(&mut h, 1, POTION + i, 1));
    }
    give(&mut h, 1, ADENA, 20000);
    let p2_item = give(&mut h, 2, common::PLATE, 1);

    trade::open_trade(&mut h.world, &h.env, 1, 2).unwrap();
    for obj in &p1_items {
        trade::add_item(&mut h.world, &h.env, 1, *obj, 1);
    }
    trade::add_gold(&mut h.world, &h.env, 1, 10000);
    trade::add_item(&mut h.world, &h.env, 2, p2_item, 1);

    assert_eq!(h.world.players.get(&1).unwrap().inventory.adena(), 10000);

    // P1 drops carrier. Cleanup cancels the trade, restores P2, saves P1.
    disconnect::cleanup_session(&mut h.world, &h.env, s1);

    assert!(h.world.players.get(&1).is_none(), "p1 left the world");
    let p2 = h.world.players.get(&2).unwrap();
    assert!(p2.trade.is_none());
    assert!(p2.inventory.get(p2_item).is_some(), "p2 item restored");

    // No WAL row was ever written for a cancelled trade.
    let db = h.env.db.clone();
    let rows = h
        .env
        .rt
        .block_on(async { db.wal().load_unprocessed().await })
        .unwrap();
    assert!(rows.is_empty());

    // P1's restored goods went to disk with the disconnect save.
    let (items, _) = h
        .env
        .rt
        .block_on(async { h.env.db.inventory().load(1).await })
        .unwrap();
    assert_eq!(
        items.iter().find(|i| i.item_id == ADENA).map(|i| i.count),
        Some(20000),
        "deducted gold restored before the save"
    );
    assert_eq!(
        items.iter().filter(|i| i.item_id >= POTION && i.item_id < POTION + 5).count(),
        5
    );
}

#[test]
fn commit_moves_goods_and_writes_wal_first() {
    let mut h = Harness::new(0);
    let (_c1, _s1) = h.join_player(1, 50, 50);
    let (_c2, _s2) = h.join_player(2, 51, 50);
    let sword = give(&mut h, 1, common::SWORD, 1);
    give(&mut h, 2, ADENA, 5000);

    trade::open_trade(&mut h.world, &h.env, 1, 2).unwrap();
    trade::add_item(&mut h.world, &h.env, 1, sword, 1);
    trade::add_gold(&mut h.world, &h.env, 2, 5000);
    trade::set_ok(&mut h.world, &h.env, 1);
    trade::set_ok(&mut h.world, &h.env, 2);

    // Goods crossed.
    let p1 = h.world.players.get(&1).unwrap();
    let p2 = h.world.players.get(&2).unwrap();
    assert_eq!(p1.inventory.adena(), 5000);
    assert!(p2.inventory.items().iter().any(|i| i.item_id == common::SWORD));
    assert!(p1.trade.is_none() && p2.trade.is_none());

    // The WAL recorded both flows before any deposit became visible.
    let db = h.env.db.clone();
    let rows = h
        .env
        .rt
        .block_on(async { db.wal().load_unprocessed().await })
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().any(|r| r.item_id == common::SWORD && r.from_char == 1));
    assert!(rows.iter().any(|r| r.gold == 5000 && r.from_char == 2));
    assert!(h.world.wal_high_water > 0);
}

#[test]
fn window_changes_reset_both_ok_flags() {
    let mut h = Harness::new(0);
    let (_c1, _s1) = h.join_player(1, 50, 50);
    let (_c2, _s2) = h.join_player(2, 51, 50);
    give(&mut h, 1, ADENA, 1000);
    let trade_id = trade::open_trade(&mut h.world, &h.env, 1, 2).unwrap();

    trade::set_ok(&mut h.world, &h.env, 2);
    assert!(h.world.trades.get(trade_id).unwrap().b_ok);

    trade::add_gold(&mut h.world, &h.env, 1, 500);
    let t = h.world.trades.get(trade_id).unwrap();
    assert!(!t.a_ok && !t.b_ok, "any change un-confirms both sides");
}
