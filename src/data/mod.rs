//! Static game data.
//!
//! Typed records for items, NPCs, skills, drops, spawns, polymorphs, and
//! weapon procs, plus the directional passability map object. The loaders
//! that fill these from game data files are external collaborators; records
//! derive `Deserialize` so any row-oriented loader can produce them, and
//! tests build them directly.

pub mod map;
mod tables;

pub use map::{MapData, MapGrid, SafetyZone};
pub use tables::{
    DataTables, DropEntry, EquipSlot, ItemKind, ItemTemplate, MobSkill, NpcTemplate,
    PolymorphRecord, SkillTarget, SkillTemplate, SpawnRecord, UseKind, WeaponProc,
};
