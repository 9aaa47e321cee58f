//! Player entities.

use super::buff::BuffMap;
use super::inventory::Inventory;
use crate::script::StatDeltas;
use std::collections::{HashMap, HashSet};

/// Cap on the sum of the six primary attributes.
pub const ATTRIBUTE_CAP: i32 = 210;

/// Object kinds tracked by per-viewer known sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjKind {
    Player,
    Npc,
    Summon,
    Doll,
    Follower,
    Pet,
    GroundItem,
    Door,
}

/// All known-set kinds, in diff order.
pub const OBJ_KINDS: [ObjKind; 8] = [
    ObjKind::Player,
    ObjKind::Npc,
    ObjKind::Summon,
    ObjKind::Doll,
    ObjKind::Follower,
    ObjKind::Pet,
    ObjKind::GroundItem,
    ObjKind::Door,
];

/// Per-viewer visibility state: object id to last-seen position, per kind.
#[derive(Debug, Default)]
pub struct Known {
    sets: HashMap<ObjKind, HashMap<u32, (i32, i32)>>,
}

impl Known {
    pub fn kind(&self, k: ObjKind) -> Option<&HashMap<u32, (i32, i32)>> {
        self.sets.get(&k)
    }

    pub fn kind_mut(&mut self, k: ObjKind) -> &mut HashMap<u32, (i32, i32)> {
        self.sets.entry(k).or_default()
    }

    pub fn contains(&self, k: ObjKind, id: u32) -> bool {
        self.sets.get(&k).is_some_and(|m| m.contains_key(&id))
    }

    pub fn forget(&mut self, k: ObjKind, id: u32) {
        if let Some(m) = self.sets.get_mut(&k) {
            m.remove(&id);
        }
    }

    pub fn clear(&mut self) {
        self.sets.clear();
    }
}

/// The four independent paralysis sources. Clearing one never clears the
/// others; the effective flag is their disjunction.
#[derive(Debug, Default, Clone, Copy)]
pub struct Paralysis {
    /// Buffs carrying the paralyzed set-flag (freeze family).
    pub from_buff: u8,
    /// Paralysis-poison at stage 4.
    pub from_poison: bool,
    /// Mummy curse at stage 2.
    pub from_curse: bool,
    /// Sleep, counted separately so sleep-break leaves the rest alone.
    pub sleep: u8,
}

impl Paralysis {
    pub fn held(&self) -> bool {
        self.from_buff > 0 || self.from_poison || self.from_curse
    }

    pub fn asleep(&self) -> bool {
        self.sleep > 0
    }

    /// Cannot act at all.
    pub fn incapacitated(&self) -> bool {
        self.held() || self.asleep()
    }
}

/// Poison families an entity can carry; one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoisonKind {
    /// Periodic damage credited to the inflicting session.
    Damage { amount: i32, attacker: u64 },
    /// Blocks casting while active.
    Silence,
    /// Escalates to paralysis at stage 4.
    Paralyzing { stage: u8 },
}

/// Active poison state.
#[derive(Debug, Clone, Copy)]
pub struct Poison {
    pub kind: PoisonKind,
    /// Ticks since infliction; drives damage pulses and stage advances.
    pub timer: u32,
}

/// Mummy-curse state; stage 2 paralyzes.
#[derive(Debug, Clone, Copy)]
pub struct Curse {
    pub stage: u8,
    pub timer: u32,
}

/// A stored teleport bookmark.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Bookmark {
    pub name: String,
    pub map: u32,
    pub x: i32,
    pub y: i32,
}

/// A yes/no question in flight; the answer packet carries the dialog id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingDialog {
    PartyInvite { from: u32 },
    ChatPartyInvite { from: u32 },
    ClanInvite { from: u32 },
    TradeRequest { from: u32 },
}

/// A connected, in-world character.
#[derive(Debug)]
pub struct Player {
    pub char_id: u32,
    pub session_id: u64,
    pub account: String,
    pub name: String,
    pub class: u8,

    pub map: u32,
    pub x: i32,
    pub y: i32,
    pub heading: u8,

    pub level: u16,
    pub exp: u64,
    pub lawful: i32,
    /// Unspent level-up attribute grants.
    pub attr_grants: u8,

    // Live stats: base + equipment deltas + buff deltas.
    pub str_: i32,
    pub dex: i32,
    pub con: i32,
    pub int: i32,
    pub wis: i32,
    pub cha: i32,
    pub max_hp: i32,
    pub max_mp: i32,
    pub cur_hp: i32,
    pub cur_mp: i32,
    pub ac: i32,
    pub mr: i32,
    pub sp: i32,
    pub hit_mod: i32,
    pub dmg_mod: i32,
    pub bow_hit: i32,
    pub bow_dmg: i32,
    pub dodge: i32,
    pub hpr: i32,
    pub mpr: i32,
    pub resist_stun: i32,
    pub resist_stone: i32,
    pub resist_sleep: i32,
    pub resist_freeze: i32,

    pub dead: bool,
    pub move_speed: u8,
    pub brave_speed: u8,
    /// Invisibility sources (buffs); visible when zero.
    pub invisible: u8,
    pub absolute_barrier: bool,
    pub paralysis: Paralysis,
    pub poison: Option<Poison>,
    pub curse: Option<Curse>,
    pub poly_id: Option<u16>,

    /// Global skill cooldown gate, world-clock milliseconds.
    pub skill_delay_until: u64,
    pub last_move_tick: u64,

    pub buffs: BuffMap,
    pub inventory: Inventory,
    pub known_skills: HashSet<u16>,
    pub bookmarks: Vec<Bookmark>,
    pub known: Known,

    pub party: Option<u32>,
    pub chat_party: Option<u32>,
    pub clan: Option<u32>,
    pub clan_rank: u8,
    pub trade: Option<u32>,
    pub companions: Vec<u32>,
    pub pending_dialog: Option<PendingDialog>,

    /// Accumulated seconds on timed maps.
    pub map_time_secs: u32,
    pub dirty: bool,
}

impl Player {
    /// Fresh in-world shell; the loader fills stats from the character row.
    pub fn new(char_id: u32, session_id: u64, account: String, name: String) -> Self {
        Self {
            char_id,
            session_id,
            account,
            name,
            class: 0,
            map: 0,
            x: 0,
            y: 0,
            heading: 0,
            level: 1,
            exp: 0,
            lawful: 0,
            attr_grants: 0,
            str_: 11,
            dex: 11,
            con: 11,
            int: 11,
            wis: 11,
            cha: 11,
            max_hp: 16,
            max_mp: 2,
            cur_hp: 16,
            cur_mp: 2,
            ac: 10,
            mr: 0,
            sp: 0,
            hit_mod: 0,
            dmg_mod: 0,
            bow_hit: 0,
            bow_dmg: 0,
            dodge: 0,
            hpr: 0,
            mpr: 0,
            resist_stun: 0,
            resist_stone: 0,
            resist_sleep: 0,
            resist_freeze: 0,
            dead: false,
            move_speed: 0,
            brave_speed: 0,
            invisible: 0,
            absolute_barrier: false,
            paralysis: Paralysis::default(),
            poison: None,
            curse: None,
            poly_id: None,
            skill_delay_until: 0,
            last_move_tick: 0,
            buffs: BuffMap::new(),
            inventory: Inventory::new(),
            known_skills: HashSet::new(),
            bookmarks: Vec::new(),
            known: Known::default(),
            party: None,
            chat_party: None,
            clan: None,
            clan_rank: 0,
            trade: None,
            companions: Vec::new(),
            pending_dialog: None,
            map_time_secs: 0,
            dirty: false,
        }
    }

    /// Apply a delta record with the given sign, then clamp HP/MP into
    /// `[0, max]`.
    pub fn apply_deltas(&mut self, d: &StatDeltas, sign: i32) {
        self.ac += d.ac * sign;
        self.str_ += d.str_ * sign;
        self.dex += d.dex * sign;
        self.con += d.con * sign;
        self.int += d.int * sign;
        self.wis += d.wis * sign;
        self.cha += d.cha * sign;
        self.max_hp += d.max_hp * sign;
        self.max_mp += d.max_mp * sign;
        self.hit_mod += d.hit_mod * sign;
        self.dmg_mod += d.dmg_mod * sign;
        self.sp += d.sp * sign;
        self.mr += d.mr * sign;
        self.hpr += d.hpr * sign;
        self.mpr += d.mpr * sign;
        self.bow_hit += d.bow_hit * sign;
        self.bow_dmg += d.bow_dmg * sign;
        self.dodge += d.dodge * sign;
        self.resist_stun += d.resist_stun * sign;
        self.resist_stone += d.resist_stone * sign;
        self.resist_sleep += d.resist_sleep * sign;
        self.resist_freeze += d.resist_freeze * sign;
        self.max_hp = self.max_hp.max(1);
        self.max_mp = self.max_mp.max(0);
        self.clamp_vitals();
    }

    /// Keep HP and MP inside `[0, max]`.
    pub fn clamp_vitals(&mut self) {
        self.cur_hp = self.cur_hp.clamp(0, self.max_hp);
        self.cur_mp = self.cur_mp.clamp(0, self.max_mp);
    }

    /// HP as a 0-100 ratio for meter packets.
    pub fn hp_ratio(&self) -> u8 {
        if self.max_hp <= 0 {
            return 0;
        }
        ((self.cur_hp.max(0) as i64 * 100) / self.max_hp as i64) as u8
    }

    /// Sum of the six primaries, checked against [`ATTRIBUTE_CAP`].
    pub fn attribute_total(&self) -> i32 {
        self.str_ + self.dex + self.con + self.int + self.wis + self.cha
    }

    /// Silenced by silence-poison; blocks casting.
    pub fn silenced(&self) -> bool {
        matches!(
            self.poison,
            Some(Poison {
                kind: PoisonKind::Silence,
                ..
            })
        )
    }

    /// Chebyshev distance to a tile on the same map.
    pub fn distance_to(&self, x: i32, y: i32) -> i32 {
        (self.x - x).abs().max((self.y - y).abs())
    }

    /// Skin tint byte for put-object packets.
    pub fn poison_color(&self) -> u8 {
        match (&self.poison, &self.curse) {
            (Some(p), _) if matches!(p.kind, PoisonKind::Damage { .. }) => 1,
            (Some(_), _) => 2,
            (None, Some(_)) => 2,
            (None, None) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_apply_and_revert_symmetrically() {
        let mut p = Player::new(1, 1, "acc".into(), "tester".into());
        p.max_hp = 100;
        p.cur_hp = 100;
        let before = (p.str_, p.max_hp, p.ac);

        let d = StatDeltas {
            str_: 5,
            max_hp: 30,
            ac: -3,
            ..Default::default()
        };
        p.apply_deltas(&d, 1);
        assert_eq!(p.str_, before.0 + 5);
        assert_eq!(p.max_hp, before.1 + 30);

        p.apply_deltas(&d, -1);
        assert_eq!((p.str_, p.max_hp, p.ac), before);
        // HP clamped down when the bonus max went away.
        assert!(p.cur_hp <= p.max_hp);
    }

    #[test]
    fn paralysis_sources_are_independent() {
        let mut par = Paralysis::default();
        par.from_buff = 1;
        par.from_poison = true;
        assert!(par.held());
        par.from_buff = 0;
        assert!(par.held(), "poison source must survive buff removal");
        par.from_poison = false;
        assert!(!par.held());
        par.sleep = 1;
        assert!(par.incapacitated());
        assert!(!par.held());
    }

    #[test]
    fn hp_ratio_saturates() {
        let mut p = Player::new(1, 1, "a".into(), "b".into());
        p.max_hp = 200;
        p.cur_hp = 50;
        assert_eq!(p.hp_ratio(), 25);
        p.cur_hp = 0;
        assert_eq!(p.hp_ratio(), 0);
    }
}
