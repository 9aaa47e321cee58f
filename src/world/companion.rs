//! Companion entities: summons, dolls, followers, and pets.

/// The four companion families. They share one AI but differ in lifecycle:
/// pets persist to the database, followers restore their source NPC on
/// dismissal, summons and dolls expire on a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanionKind {
    Summon,
    Doll,
    Follower,
    Pet,
}

/// Behaviour mode, set by the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanionStatus {
    /// Stand down, follow the master.
    Rest,
    /// Attack whatever the master fights, acquire on sight.
    Aggressive,
    /// Retaliate only.
    Defensive,
    /// Keep distance from the master.
    Extend,
    /// Hold position and defend it.
    Alert,
    /// Pet only: run to the master, then drop to Rest.
    Whistle,
}

impl CompanionStatus {
    /// Wire byte for companion packs.
    pub fn wire(self) -> u8 {
        match self {
            Self::Rest => 0,
            Self::Aggressive => 1,
            Self::Defensive => 2,
            Self::Extend => 3,
            Self::Alert => 4,
            Self::Whistle => 5,
        }
    }
}

/// Where a follower came from, so dismissal can put the NPC back.
#[derive(Debug, Clone, Copy)]
pub struct FollowerOrigin {
    pub npc_id: u32,
    pub map: u32,
    pub x: i32,
    pub y: i32,
}

/// An active companion in the world.
#[derive(Debug)]
pub struct Companion {
    pub obj_id: u32,
    pub kind: CompanionKind,
    /// NPC template providing combat stats and looks.
    pub template: u32,
    pub name: String,
    /// Owning character id.
    pub master: u32,

    pub map: u32,
    pub x: i32,
    pub y: i32,
    pub heading: u8,

    pub level: u16,
    pub cur_hp: i32,
    pub max_hp: i32,
    pub cur_mp: i32,
    pub max_mp: i32,
    /// Pet progression.
    pub exp: u64,
    pub lawful: i32,

    pub status: CompanionStatus,
    /// Current NPC target.
    pub target: Option<u32>,
    pub attack_cd: u32,
    pub move_cd: u32,

    /// Ticks until timer-expiry destruction (summons, dolls).
    pub expiry: Option<u32>,
    /// Collar item backing a pet; the persistence key.
    pub collar_obj_id: Option<u32>,
    /// Set for followers.
    pub origin: Option<FollowerOrigin>,
}

impl Companion {
    pub fn distance_to(&self, x: i32, y: i32) -> i32 {
        (self.x - x).abs().max((self.y - y).abs())
    }

    pub fn hp_ratio(&self) -> u8 {
        if self.max_hp <= 0 {
            return 0;
        }
        ((self.cur_hp.max(0) as i64 * 100) / self.max_hp as i64) as u8
    }

    /// Known-set kind this companion diffs under.
    pub fn obj_kind(&self) -> super::player::ObjKind {
        use super::player::ObjKind;
        match self.kind {
            CompanionKind::Summon => ObjKind::Summon,
            CompanionKind::Doll => ObjKind::Doll,
            CompanionKind::Follower => ObjKind::Follower,
            CompanionKind::Pet => ObjKind::Pet,
        }
    }
}
