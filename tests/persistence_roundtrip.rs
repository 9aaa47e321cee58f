//! Save/restart/login round trip: stored rows hold base values, and
//! re-applying equipment and buffs on login lands on the same live stats.

mod common;

use common::Harness;
use runegated::data::EquipSlot;
use runegated::game::packets::load_and_enter_world;
use runegated::game::skills::effect::apply_buff_effect;
use runegated::game::{persist, Env};
use runegated::world::{ItemInstance, World};

fn equip_plate(h: &mut Harness, char_id: u32) -> u32 {
    let obj_id = h.world.alloc_obj_id();
    let tables = h.env.tables.clone();
    let template = tables.item(common::PLATE).unwrap().clone();
    let p = h.world.players.get_mut(&char_id).unwrap();
    p.inventory.add(
        ItemInstance {
            obj_id,
            item_id: common::PLATE,
            count: 1,
            enchant: 0,
            identified: true,
            durability: 0,
        },
        &tables,
    );
    // Worn-item bookkeeping the equip handler normally does.
    let deltas = runegated::script::StatDeltas {
        ac: -template.ac,
        str_: template.add_str as i32,
        max_hp: template.add_hp,
        ..Default::default()
    };
    p.inventory.set_equipped(EquipSlot::Armor, obj_id, deltas);
    p.apply_deltas(&deltas, 1);
    obj_id
}

fn stat_summary(world: &World, char_id: u32) -> (i32, i32, i32, i32, u16, u64) {
    let p = world.players.get(&char_id).unwrap();
    (p.str_, p.ac, p.max_hp, p.max_mp, p.level, p.exp)
}

#[test]
fn stat_summary_survives_a_restart() {
    let mut h = Harness::new(0);
    let (_c, _s) = h.join_player(7, 50, 50);
    let plate = equip_plate(&mut h, 7);
    apply_buff_effect(&mut h.world, &h.env, 7, 3, 10);

    let before = stat_summary(&h.world, 7);
    assert!(persist::save_player(&h.world, &h.env, 7));

    // The stored row holds base values: live minus equip minus buffs.
    let row = h
        .env
        .rt
        .block_on(async { h.env.db.characters().load(7).await })
        .unwrap();
    assert_eq!(row.base_str, before.0 - 2 - 5, "plate +2, shield buff +5");
    assert_eq!(row.base_max_hp, before.2 - 20 - 30);

    // "Restart": a fresh world, same database.
    let mut world2 = restart_world(&h.env);
    load_and_enter_world(&mut world2, &h.env, 999, "acc", 7).unwrap();

    let after = stat_summary(&world2, 7);
    assert_eq!(after, before, "base + equip + buffs lands exactly");

    let p = world2.players.get(&7).unwrap();
    assert!(p.inventory.is_equipped(plate));
    assert!(p.buffs.contains(3), "saved buff restored with its deltas");
}

#[test]
fn save_cycle_clears_the_dirty_flag() {
    let mut h = Harness::new(0);
    let (_c, _s) = h.join_player(8, 50, 50);
    h.world.players.get_mut(&8).unwrap().dirty = true;

    persist::save_players(&mut h.world, &h.env, true);
    assert!(
        !h.world.players.get(&8).unwrap().dirty,
        "clean after a successful cycle"
    );
}

fn restart_world(_env: &Env) -> World {
    let mut map_data = runegated::data::MapData::new();
    map_data.insert(runegated::data::MapGrid::new(common::MAP, 0, 0, 1000, 1000));
    World::new(map_data)
}
