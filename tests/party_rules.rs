//! Party lifecycle: the breakup rule after leaves and kicks.

mod common;

use runegated::world::{LeaveOutcome, PartyManager};

#[test]
fn breakup_rule_holds_for_every_departure_shape() {
    let mut pm = PartyManager::new();

    // Leader leaves a three-member party: dissolve.
    let id = pm.create(1, 2);
    assert!(pm.join(id, 3, 8));
    assert!(matches!(pm.leave(id, 1), LeaveOutcome::Dissolved { .. }));
    assert!(pm.get(id).is_none());

    // Member leaves a two-member party: dissolve.
    let id = pm.create(1, 2);
    assert!(matches!(pm.leave(id, 2), LeaveOutcome::Dissolved { .. }));

    // Member leaves a three-member party: survives with two.
    let id = pm.create(1, 2);
    pm.join(id, 3, 8);
    match pm.leave(id, 3) {
        LeaveOutcome::Removed { remaining } => assert_eq!(remaining.len(), 2),
        other => panic!("unexpected outcome {other:?}"),
    }
    // And the next departure dissolves what is left.
    assert!(matches!(pm.leave(id, 2), LeaveOutcome::Dissolved { .. }));
    assert!(pm.get(id).is_none());
}

#[test]
fn kick_is_a_departure_for_the_rule() {
    let mut pm = PartyManager::new();
    let id = pm.create(10, 11);
    pm.join(id, 12, 8);
    pm.join(id, 13, 8);

    // Kicks route through the same leave path.
    assert!(matches!(pm.leave(id, 12), LeaveOutcome::Removed { .. }));
    assert!(matches!(pm.leave(id, 13), LeaveOutcome::Dissolved { .. }));
}

#[test]
fn membership_is_capped_and_unique() {
    let mut pm = PartyManager::new();
    let id = pm.create(1, 2);
    for m in 3..=8 {
        assert!(pm.join(id, m, 8));
    }
    assert!(!pm.join(id, 9, 8), "full at max size");
    assert!(!pm.join(id, 5, 8), "no duplicates");
}
