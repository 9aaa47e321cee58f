//! Clans: membership, ranks, announcements, emblems, and the warehouse
//! lock.

use std::collections::HashMap;

/// Rank bytes. 10 is the prince (leader), 9 the guardian tier.
pub const RANK_PRINCE: u8 = 10;
pub const RANK_GUARDIAN: u8 = 9;

/// Announcement limit in bytes (legacy client field width).
pub const ANNOUNCEMENT_MAX: usize = 478;

/// Per-member note limit in bytes.
pub const NOTE_MAX: usize = 62;

/// Whether `granter_rank` may assign `target_rank`.
///
/// Prince (10) grants 7/8/9; guardian (9) grants 7/8. Nobody grants 10.
pub fn may_grant(granter_rank: u8, target_rank: u8) -> bool {
    match granter_rank {
        RANK_PRINCE => (7..=9).contains(&target_rank),
        RANK_GUARDIAN => (7..=8).contains(&target_rank),
        _ => false,
    }
}

/// One clan member row.
#[derive(Debug, Clone)]
pub struct ClanMember {
    pub char_id: u32,
    pub name: String,
    pub rank: u8,
    pub notes: String,
    pub online: bool,
}

/// One clan.
#[derive(Debug)]
pub struct Clan {
    pub clan_id: u32,
    pub name: String,
    pub leader: u32,
    pub announcement: String,
    /// Current emblem file id; 0 = none.
    pub emblem_id: u32,
    /// Single-use warehouse lock: char id holding it, 0 = free.
    pub warehouse_using: u32,
    pub members: HashMap<u32, ClanMember>,
}

impl Clan {
    pub fn member(&self, char_id: u32) -> Option<&ClanMember> {
        self.members.get(&char_id)
    }

    /// Online member char ids, for event broadcast.
    pub fn online_members(&self) -> Vec<u32> {
        self.members
            .values()
            .filter(|m| m.online)
            .map(|m| m.char_id)
            .collect()
    }

    /// Try to take the warehouse lock. Idempotent for the holder.
    pub fn lock_warehouse(&mut self, char_id: u32) -> bool {
        if self.warehouse_using == 0 || self.warehouse_using == char_id {
            self.warehouse_using = char_id;
            true
        } else {
            false
        }
    }

    /// Release the lock if held by this char (close, ESC, op complete,
    /// disconnect).
    pub fn release_warehouse(&mut self, char_id: u32) {
        if self.warehouse_using == char_id {
            self.warehouse_using = 0;
        }
    }
}

/// All clans, plus the emblem id counter.
#[derive(Debug, Default)]
pub struct ClanManager {
    clans: HashMap<u32, Clan>,
    next_clan_id: u32,
    next_emblem_id: u32,
}

impl ClanManager {
    pub fn new() -> Self {
        Self {
            clans: HashMap::new(),
            next_clan_id: 1,
            next_emblem_id: 1,
        }
    }

    pub fn get(&self, id: u32) -> Option<&Clan> {
        self.clans.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Clan> {
        self.clans.get_mut(&id)
    }

    /// Restore a clan loaded from the database.
    pub fn restore(&mut self, clan: Clan) {
        self.next_clan_id = self.next_clan_id.max(clan.clan_id + 1);
        self.next_emblem_id = self.next_emblem_id.max(clan.emblem_id + 1);
        self.clans.insert(clan.clan_id, clan);
    }

    pub fn create(&mut self, name: String, leader: u32, leader_name: String) -> u32 {
        let id = self.next_clan_id;
        self.next_clan_id += 1;
        let mut members = HashMap::new();
        members.insert(
            leader,
            ClanMember {
                char_id: leader,
                name: leader_name,
                rank: RANK_PRINCE,
                notes: String::new(),
                online: true,
            },
        );
        self.clans.insert(
            id,
            Clan {
                clan_id: id,
                name,
                leader,
                announcement: String::new(),
                emblem_id: 0,
                warehouse_using: 0,
                members,
            },
        );
        id
    }

    /// Allocate the next emblem file id.
    pub fn allocate_emblem_id(&mut self) -> u32 {
        let id = self.next_emblem_id;
        self.next_emblem_id += 1;
        id
    }

    pub fn iter(&self) -> impl Iterator<Item = &Clan> {
        self.clans.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_matrix() {
        assert!(may_grant(RANK_PRINCE, 9));
        assert!(may_grant(RANK_PRINCE, 7));
        assert!(!may_grant(RANK_PRINCE, 10));
        assert!(may_grant(RANK_GUARDIAN, 8));
        assert!(!may_grant(RANK_GUARDIAN, 9));
        assert!(!may_grant(5, 7));
    }

    #[test]
    fn warehouse_lock_is_single_use() {
        let mut cm = ClanManager::new();
        let id = cm.create("Wolves".into(), 1, "alpha".into());
        let clan = cm.get_mut(id).unwrap();
        assert!(clan.lock_warehouse(1));
        assert!(clan.lock_warehouse(1), "holder re-entry is fine");
        assert!(!clan.lock_warehouse(2));
        clan.release_warehouse(2);
        assert!(!clan.lock_warehouse(2), "stranger release is a no-op");
        clan.release_warehouse(1);
        assert!(clan.lock_warehouse(2));
    }
}
