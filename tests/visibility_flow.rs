//! AOI diffing: one create on entry, one remove on exit, and idempotence
//! when nothing moves.

mod common;

use common::Harness;
use runegated::game::visibility::VisibilitySystem;
use runegated::game::System;
use runegate_proto::ServerOpcode;

/// Count create/remove packets that concern a given object id.
fn count_for(payloads: &[bytes::Bytes], obj_id: u32) -> (usize, usize) {
    let mut puts = 0;
    let mut removes = 0;
    for p in payloads {
        if p.is_empty() {
            continue;
        }
        if p[0] == ServerOpcode::PutObject as u8 {
            // Layout: opcode, kind byte, then the object id.
            let id = u32::from_le_bytes([p[2], p[3], p[4], p[5]]);
            if id == obj_id {
                puts += 1;
            }
        } else if p[0] == ServerOpcode::RemoveObject as u8 {
            let id = u32::from_le_bytes([p[1], p[2], p[3], p[4]]);
            if id == obj_id {
                removes += 1;
            }
        }
    }
    (puts, removes)
}

#[test]
fn walkthrough_emits_one_enter_and_one_exit() {
    let mut h = Harness::new(0);
    // A walks the x axis through B's view; radius is 20.
    let (_ca, _sa) = h.join_player(1, 30, 50);
    let (mut cb, _sb) = h.join_player(2, 60, 50);

    let mut vis = VisibilitySystem;
    let mut puts_total = 0;
    let mut removes_total = 0;

    for x in 30..=90 {
        h.world.relocate_player(1, common::MAP, x, 50);
        // Visibility runs on even ticks.
        h.world.tick += 2;
        vis.update(&mut h.world, &h.env);
        let (p, r) = count_for(&cb.drain_payloads(), 1);
        puts_total += p;
        removes_total += r;
    }

    assert_eq!(puts_total, 1, "B saw A enter exactly once");
    assert_eq!(removes_total, 1, "B saw A leave exactly once");

    // A ended out of range, so B's known set no longer holds A.
    assert!(!h
        .world
        .players
        .get(&2)
        .unwrap()
        .known
        .contains(runegated::world::ObjKind::Player, 1));
}

#[test]
fn viewer_tracks_the_other_for_the_contiguous_interval() {
    let mut h = Harness::new(0);
    let (_ca, _sa) = h.join_player(1, 30, 50);
    let (_cb, _sb) = h.join_player(2, 60, 50);

    let mut vis = VisibilitySystem;
    let mut known_spans = Vec::new();
    for x in 30..=90 {
        h.world.relocate_player(1, common::MAP, x, 50);
        h.world.tick += 2;
        vis.update(&mut h.world, &h.env);
        let knows = h
            .world
            .players
            .get(&1)
            .unwrap()
            .known
            .contains(runegated::world::ObjKind::Player, 2);
        known_spans.push(knows);
    }

    // One contiguous true interval, nothing flickering.
    let first = known_spans.iter().position(|&k| k).unwrap();
    let last = known_spans.iter().rposition(|&k| k).unwrap();
    assert!(known_spans[first..=last].iter().all(|&k| k));
    assert!(first > 0 && last < known_spans.len() - 1);
}

#[test]
fn second_pass_with_no_changes_is_silent() {
    let mut h = Harness::new(0);
    let (mut ca, _sa) = h.join_player(1, 50, 50);
    let (mut cb, _sb) = h.join_player(2, 55, 50);
    h.spawn_orc(52, 52);

    let mut vis = VisibilitySystem;
    h.world.tick += 2;
    vis.update(&mut h.world, &h.env);
    let first_a = ca.drain_payloads().len();
    let first_b = cb.drain_payloads().len();
    assert!(first_a > 0 && first_b > 0, "initial pass populates views");

    h.world.tick += 2;
    vis.update(&mut h.world, &h.env);
    assert_eq!(ca.drain_payloads().len(), 0, "idempotent with no movement");
    assert_eq!(cb.drain_payloads().len(), 0);
}

#[test]
fn corpses_stay_visible_until_deleted() {
    let mut h = Harness::new(20);
    let (mut c, s) = h.join_player(1, 100, 100);
    h.arm_player(1);
    let orc = h.spawn_orc(101, 101);

    let mut vis = VisibilitySystem;
    h.world.tick += 2;
    vis.update(&mut h.world, &h.env);
    c.drain_payloads();

    // Kill it; the next pass must NOT remove the corpse from view.
    h.world.queues.combat.push_back(runegated::world::CombatRequest {
        attacker: s,
        target: orc,
        ranged: false,
    });
    runegated::game::combat::CombatSystem.update(&mut h.world, &h.env);
    h.world.tick += 2;
    vis.update(&mut h.world, &h.env);
    let (_, removes) = count_for(&c.drain_payloads(), orc);
    assert_eq!(removes, 0, "corpse lingers through its delete timer");

    // Actual deletion finally emits the remove.
    h.world.remove_npc(orc);
    h.world.tick += 2;
    vis.update(&mut h.world, &h.env);
    let (_, removes) = count_for(&c.drain_payloads(), orc);
    assert_eq!(removes, 1);
}
