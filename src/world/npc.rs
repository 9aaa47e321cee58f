//! NPC entities and hate accounting.

use std::collections::HashMap;

/// Damage-summed hate, keyed by session id. The top entry is the AI's
/// target; symbolic hate (debuffs, taunts) adds a token amount so the mob
/// retaliates without skewing the XP split.
#[derive(Debug, Default)]
pub struct HateList {
    entries: HashMap<u64, i64>,
}

/// Hate added for non-damage aggravation.
pub const SYMBOLIC_HATE: i64 = 1;

impl HateList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, session: u64, amount: i64) {
        *self.entries.entry(session).or_insert(0) += amount;
    }

    pub fn remove(&mut self, session: u64) {
        self.entries.remove(&session);
    }

    /// Session with the highest accumulated hate.
    pub fn top(&self) -> Option<u64> {
        self.entries
            .iter()
            .max_by_key(|(_, &d)| d)
            .map(|(&s, _)| s)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn total(&self) -> i64 {
        self.entries.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, i64)> + '_ {
        self.entries.iter().map(|(&s, &d)| (s, d))
    }
}

/// A debuff currently on an NPC.
#[derive(Debug, Clone, Copy)]
pub struct NpcDebuff {
    pub skill_id: u16,
    pub ticks_left: u32,
    /// Holds the NPC frozen while active.
    pub freezes: bool,
}

/// Periodic poison on an NPC; pulses every 15 ticks, floors at HP 1.
#[derive(Debug, Clone, Copy)]
pub struct NpcPoison {
    pub amount: i32,
    pub timer: u32,
    /// Session credited with the damage (hate recipient).
    pub attacker: u64,
}

/// A debuff scheduled to land later (mummy-curse escalation).
#[derive(Debug, Clone, Copy)]
pub struct PendingDebuff {
    pub skill_id: u16,
    pub ticks_left: u32,
}

/// A spawned NPC.
#[derive(Debug)]
pub struct Npc {
    pub obj_id: u32,
    pub template: u32,
    pub map: u32,
    pub x: i32,
    pub y: i32,
    pub heading: u8,
    pub spawn_x: i32,
    pub spawn_y: i32,

    pub cur_hp: i32,
    pub cur_mp: i32,
    pub dead: bool,
    /// Corpse lifetime once dead; deletion is deferred for the animation.
    pub delete_ticks: Option<u32>,

    pub hate: HateList,
    /// Session id of the current target; 0 = none. Invariant: either 0 or
    /// a key of the hate list.
    pub aggro_target: u64,

    pub attack_cd: u32,
    pub move_cd: u32,

    /// Frozen/paralyzed (earth barrier, freezing procs).
    pub paralyzed: bool,
    pub sleeping: bool,
    pub debuffs: HashMap<u16, NpcDebuff>,
    pub pending_debuffs: Vec<PendingDebuff>,
    pub poison: Option<NpcPoison>,
    /// Skin tint currently broadcast: 0 none, 1 green, 2 grey.
    pub poison_color: u8,
}

impl Npc {
    pub fn new(obj_id: u32, template: u32, map: u32, x: i32, y: i32, hp: i32, mp: i32) -> Self {
        Self {
            obj_id,
            template,
            map,
            x,
            y,
            heading: 0,
            spawn_x: x,
            spawn_y: y,
            cur_hp: hp,
            cur_mp: mp,
            dead: false,
            delete_ticks: None,
            hate: HateList::new(),
            aggro_target: 0,
            attack_cd: 0,
            move_cd: 0,
            paralyzed: false,
            sleeping: false,
            debuffs: HashMap::new(),
            pending_debuffs: Vec::new(),
            poison: None,
            poison_color: 0,
        }
    }

    pub fn distance_to(&self, x: i32, y: i32) -> i32 {
        (self.x - x).abs().max((self.y - y).abs())
    }

    pub fn spawn_distance(&self) -> i32 {
        self.distance_to(self.spawn_x, self.spawn_y)
    }

    /// HP as a 0-100 ratio for meter packets.
    pub fn hp_ratio(&self, max_hp: i32) -> u8 {
        if max_hp <= 0 {
            return 0;
        }
        ((self.cur_hp.max(0) as i64 * 100) / max_hp as i64) as u8
    }

    /// Wipe every debuff, poison, paralysis, and visual (cancel on NPC).
    pub fn clear_afflictions(&mut self) {
        self.debuffs.clear();
        self.pending_debuffs.clear();
        self.poison = None;
        self.paralyzed = false;
        self.sleeping = false;
        self.poison_color = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_hate_wins() {
        let mut h = HateList::new();
        h.add(1, 30);
        h.add(2, 10);
        h.add(2, 25);
        assert_eq!(h.top(), Some(2));
        h.remove(2);
        assert_eq!(h.top(), Some(1));
        h.clear();
        assert_eq!(h.top(), None);
    }

    #[test]
    fn clear_afflictions_resets_everything() {
        let mut n = Npc::new(1, 45001, 4, 10, 10, 80, 0);
        n.paralyzed = true;
        n.sleeping = true;
        n.poison_color = 2;
        n.poison = Some(NpcPoison {
            amount: 5,
            timer: 0,
            attacker: 9,
        });
        n.debuffs.insert(
            66,
            NpcDebuff {
                skill_id: 66,
                ticks_left: 50,
                freezes: false,
            },
        );
        n.clear_afflictions();
        assert!(!n.paralyzed && !n.sleeping);
        assert!(n.poison.is_none() && n.debuffs.is_empty());
        assert_eq!(n.poison_color, 0);
    }
}
