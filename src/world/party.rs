//! Parties and chat parties.
//!
//! Both share one shape: a leader, an ordered member list, and the breakup
//! rule: the party dissolves when the leader leaves or a departure would
//! leave fewer than two members.

use std::collections::HashMap;

/// One party.
#[derive(Debug)]
pub struct Party {
    pub id: u32,
    pub leader: u32,
    /// Ordered member char ids; the leader is always present.
    pub members: Vec<u32>,
}

impl Party {
    pub fn contains(&self, char_id: u32) -> bool {
        self.members.contains(&char_id)
    }
}

/// What a departure did to the party.
#[derive(Debug, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Member removed; party continues with these members.
    Removed { remaining: Vec<u32> },
    /// Breakup rule fired; these were the members at dissolution.
    Dissolved { members: Vec<u32> },
    /// The char was not in this party.
    NotAMember,
}

/// Party collection, used for both combat parties and chat parties.
#[derive(Debug, Default)]
pub struct PartyManager {
    parties: HashMap<u32, Party>,
    next_id: u32,
}

impl PartyManager {
    pub fn new() -> Self {
        Self {
            parties: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn get(&self, id: u32) -> Option<&Party> {
        self.parties.get(&id)
    }

    /// Create a party of leader + first member.
    pub fn create(&mut self, leader: u32, member: u32) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.parties.insert(
            id,
            Party {
                id,
                leader,
                members: vec![leader, member],
            },
        );
        id
    }

    /// Add to an existing party, capped by `max_size`.
    pub fn join(&mut self, id: u32, char_id: u32, max_size: usize) -> bool {
        match self.parties.get_mut(&id) {
            Some(p) if p.members.len() < max_size && !p.contains(char_id) => {
                p.members.push(char_id);
                true
            }
            _ => false,
        }
    }

    /// Remove a member (voluntary leave or kick), applying the breakup
    /// rule: leader leaves or exactly two members remain → dissolve.
    pub fn leave(&mut self, id: u32, char_id: u32) -> LeaveOutcome {
        let Some(p) = self.parties.get_mut(&id) else {
            return LeaveOutcome::NotAMember;
        };
        if !p.contains(char_id) {
            return LeaveOutcome::NotAMember;
        }
        if p.leader == char_id || p.members.len() <= 2 {
            let p = self.parties.remove(&id).expect("checked above");
            return LeaveOutcome::Dissolved { members: p.members };
        }
        p.members.retain(|&m| m != char_id);
        LeaveOutcome::Removed {
            remaining: p.members.clone(),
        }
    }

    /// Drop a whole party without ceremony (server shutdown paths).
    pub fn remove_party(&mut self, id: u32) -> Option<Party> {
        self.parties.remove(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leader_leave_dissolves() {
        let mut pm = PartyManager::new();
        let id = pm.create(1, 2);
        pm.join(id, 3, 8);
        match pm.leave(id, 1) {
            LeaveOutcome::Dissolved { members } => assert_eq!(members, vec![1, 2, 3]),
            other => panic!("expected dissolution, got {other:?}"),
        }
        assert!(pm.get(id).is_none());
    }

    #[test]
    fn two_member_party_dissolves_on_any_leave() {
        let mut pm = PartyManager::new();
        let id = pm.create(1, 2);
        assert!(matches!(
            pm.leave(id, 2),
            LeaveOutcome::Dissolved { .. }
        ));
        assert!(pm.get(id).is_none());
    }

    #[test]
    fn member_leave_from_larger_party_keeps_it() {
        let mut pm = PartyManager::new();
        let id = pm.create(1, 2);
        pm.join(id, 3, 8);
        match pm.leave(id, 3) {
            LeaveOutcome::Removed { remaining } => assert_eq!(remaining, vec![1, 2]),
            other => panic!("expected removal, got {other:?}"),
        }
        assert!(pm.get(id).is_some());
    }

    #[test]
    fn join_respects_cap() {
        let mut pm = PartyManager::new();
        let id = pm.create(1, 2);
        assert!(!pm.join(id, 3, 2));
        assert!(pm.join(id, 3, 3));
        assert!(!pm.join(id, 3, 8), "no duplicate membership");
    }
}
