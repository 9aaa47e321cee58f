//! Buff lifecycle: reversible deltas, speed replacement through
//! exclusions, expiry, and the four independent paralysis sources.

mod common;

use common::Harness;
use runegated::game::skills::effect::{
    apply_buff_effect, cure_poison, inflict_special_poison, remove_buff, BuffTickSystem,
};
use runegated::game::System;

#[test]
fn buff_apply_then_remove_restores_stats_exactly() {
    let mut h = Harness::new(0);
    let (_c, _s) = h.join_player(1, 50, 50);

    let before = {
        let p = h.world.players.get(&1).unwrap();
        (p.str_, p.ac, p.max_hp, p.cur_hp)
    };

    apply_buff_effect(&mut h.world, &h.env, 1, 3, 10);
    {
        let p = h.world.players.get(&1).unwrap();
        assert_eq!(p.str_, before.0 + 5);
        assert_eq!(p.ac, before.1 - 2);
        assert_eq!(p.max_hp, before.2 + 30);
    }

    remove_buff(&mut h.world, &h.env, 1, 3);
    let p = h.world.players.get(&1).unwrap();
    assert_eq!((p.str_, p.ac, p.max_hp), (before.0, before.1, before.2));
    assert!(p.cur_hp <= p.max_hp, "vitals stay clamped after the revert");
}

#[test]
fn reapplying_a_buff_reverts_the_old_instance_first() {
    let mut h = Harness::new(0);
    let (_c, _s) = h.join_player(1, 50, 50);
    let base_str = h.world.players.get(&1).unwrap().str_;

    apply_buff_effect(&mut h.world, &h.env, 1, 3, 10);
    apply_buff_effect(&mut h.world, &h.env, 1, 3, 10);
    apply_buff_effect(&mut h.world, &h.env, 1, 3, 10);

    // One stack's worth, never three.
    assert_eq!(h.world.players.get(&1).unwrap().str_, base_str + 5);

    remove_buff(&mut h.world, &h.env, 1, 3);
    assert_eq!(h.world.players.get(&1).unwrap().str_, base_str);
}

#[test]
fn haste_upgrade_replaces_and_expiry_returns_to_zero() {
    let mut h = Harness::new(0);
    let (_c, _s) = h.join_player(1, 50, 50);

    apply_buff_effect(&mut h.world, &h.env, 1, 43, 10);
    assert_eq!(h.world.players.get(&1).unwrap().move_speed, 1);

    // Greater haste excludes haste: the first buff is reverted before the
    // second applies, and the second governs.
    apply_buff_effect(&mut h.world, &h.env, 1, 54, 10);
    {
        let p = h.world.players.get(&1).unwrap();
        assert!(!p.buffs.contains(43));
        assert!(p.buffs.contains(54));
        assert_eq!(p.move_speed, 2);
    }

    // 20 seconds = 100 ticks; expiry drops speed back to zero.
    let mut ticker = BuffTickSystem;
    for _ in 0..100 {
        ticker.update(&mut h.world, &h.env);
    }
    let p = h.world.players.get(&1).unwrap();
    assert!(!p.buffs.contains(54));
    assert_eq!(p.move_speed, 0);
}

#[test]
fn paralysis_sources_stay_independent() {
    let mut h = Harness::new(0);
    let (_c, _s) = h.join_player(1, 50, 50);

    // Source one: paralyzing poison, stage 4 after enough ticks.
    inflict_special_poison(&mut h.world, &h.env, 1, true);
    let mut ticker = BuffTickSystem;
    for _ in 0..40 {
        ticker.update(&mut h.world, &h.env);
    }
    assert!(h.world.players.get(&1).unwrap().paralysis.from_poison);
    assert!(h.world.players.get(&1).unwrap().paralysis.held());

    // Source two: a freeze buff on top.
    apply_buff_effect(&mut h.world, &h.env, 1, 157, 10);
    assert!(h.world.players.get(&1).unwrap().paralysis.from_buff > 0);

    // Clearing the buff must not clear the poison hold.
    remove_buff(&mut h.world, &h.env, 1, 157);
    {
        let p = h.world.players.get(&1).unwrap();
        assert_eq!(p.paralysis.from_buff, 0);
        assert!(p.paralysis.from_poison, "poison hold survives buff removal");
        assert!(p.paralysis.held());
    }

    // Curing the poison finally releases.
    cure_poison(&mut h.world, &h.env, 1);
    assert!(!h.world.players.get(&1).unwrap().paralysis.held());
}

#[test]
fn buff_tick_is_inert_for_unbuffed_players() {
    let mut h = Harness::new(0);
    let (_c, _s) = h.join_player(1, 50, 50);
    let before = h.world.players.get(&1).unwrap().cur_hp;

    let mut ticker = BuffTickSystem;
    for _ in 0..200 {
        ticker.update(&mut h.world, &h.env);
    }
    assert_eq!(h.world.players.get(&1).unwrap().cur_hp, before);
}
