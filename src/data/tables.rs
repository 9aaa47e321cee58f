//! Table records and the lookup root.

use serde::Deserialize;
use std::collections::HashMap;

/// Broad item class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Weapon,
    Armor,
    #[default]
    Etc,
}

/// What using the item from the inventory does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UseKind {
    #[default]
    None,
    Potion,
    TeleportScroll,
    EnchantWeaponScroll,
    EnchantArmorScroll,
    PetCollar,
}

/// Equipment slot an item occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipSlot {
    Weapon,
    Helm,
    Armor,
    TShirt,
    Cloak,
    Shield,
    Gloves,
    Boots,
    RingLeft,
    RingRight,
    Amulet,
    Belt,
}

impl EquipSlot {
    /// Stable wire byte for the equipment-slot packet.
    pub fn wire(self) -> u8 {
        match self {
            Self::Weapon => 0,
            Self::Helm => 1,
            Self::Armor => 2,
            Self::TShirt => 3,
            Self::Cloak => 4,
            Self::Shield => 5,
            Self::Gloves => 6,
            Self::Boots => 7,
            Self::RingLeft => 8,
            Self::RingRight => 9,
            Self::Amulet => 10,
            Self::Belt => 11,
        }
    }
}

/// One item definition.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemTemplate {
    pub item_id: u32,
    pub name: String,
    #[serde(default)]
    pub kind: ItemKind,
    #[serde(default)]
    pub use_kind: UseKind,
    /// Weight units per piece.
    #[serde(default)]
    pub weight: u32,
    /// Weapon damage against small targets.
    #[serde(default)]
    pub dmg_small: i32,
    /// Weapon damage against large targets.
    #[serde(default)]
    pub dmg_large: i32,
    #[serde(default)]
    pub hit_mod: i32,
    #[serde(default)]
    pub dmg_mod: i32,
    /// AC contribution when worn (negative is better).
    #[serde(default)]
    pub ac: i32,
    #[serde(default)]
    pub two_handed: bool,
    /// Bow-class weapon.
    #[serde(default)]
    pub ranged: bool,
    /// Consumed by ranged attacks.
    #[serde(default)]
    pub arrow: bool,
    #[serde(default)]
    pub stackable: bool,
    #[serde(default)]
    pub slot: Option<EquipSlot>,
    #[serde(default)]
    pub max_durability: i32,
    /// Primary-stat bonuses while worn.
    #[serde(default)]
    pub add_str: i8,
    #[serde(default)]
    pub add_dex: i8,
    #[serde(default)]
    pub add_con: i8,
    #[serde(default)]
    pub add_int: i8,
    #[serde(default)]
    pub add_wis: i8,
    #[serde(default)]
    pub add_cha: i8,
    #[serde(default)]
    pub add_hp: i32,
    #[serde(default)]
    pub add_mp: i32,
    #[serde(default)]
    pub add_mr: i32,
    #[serde(default)]
    pub gfx: u16,
}

impl ItemTemplate {
    /// Whether this item can sit in an equipment slot.
    pub fn equippable(&self) -> bool {
        self.slot.is_some()
    }
}

/// A skill an NPC may use, as listed on its template.
#[derive(Debug, Clone, Deserialize)]
pub struct MobSkill {
    pub skill_id: u16,
    /// Roll chance per AI decision, percent.
    pub chance: u8,
    /// Action GFX played on use.
    pub act_id: u16,
    /// Projectile/effect GFX.
    pub gfx_id: u16,
    /// Area radius; 0 = single target.
    #[serde(default)]
    pub area: i32,
}

/// One NPC definition.
#[derive(Debug, Clone, Deserialize)]
pub struct NpcTemplate {
    pub npc_id: u32,
    pub name: String,
    pub gfx: u16,
    pub level: u16,
    pub hp: i32,
    pub mp: i32,
    pub ac: i32,
    pub mr: i32,
    #[serde(default)]
    pub str_: i32,
    #[serde(default)]
    pub dex: i32,
    pub exp: u64,
    #[serde(default)]
    pub lawful: i32,
    /// Attacks players on sight.
    #[serde(default)]
    pub aggro: bool,
    /// Attack reach in tiles; > 1 means a ranged attacker.
    #[serde(default = "default_reach")]
    pub ranged: i32,
    /// Ticks between attacks.
    #[serde(default = "default_atk_speed")]
    pub atk_speed_ticks: u32,
    /// Ticks between steps.
    #[serde(default = "default_move_speed")]
    pub move_speed_ticks: u32,
    /// Poison-attack class: 0 none, 1 damage, 2 silence, 3 paralysis.
    #[serde(default)]
    pub poison_atk: u8,
    #[serde(default)]
    pub is_guard: bool,
    #[serde(default)]
    pub undead: bool,
    /// Large body; takes large-weapon damage.
    #[serde(default)]
    pub big: bool,
    /// Maximum wander distance from spawn.
    #[serde(default = "default_wander")]
    pub wander_dist: i32,
    #[serde(default)]
    pub skills: Vec<MobSkill>,
    /// Elemental magic resistance. `None` until the NPC attribute system
    /// exists; weapon procs read it as 0.
    #[serde(default)]
    pub elemental_mr: Option<i32>,
    /// Seconds until respawn after the corpse is deleted.
    #[serde(default = "default_respawn")]
    pub respawn_delay_secs: u32,
}

fn default_reach() -> i32 {
    1
}

fn default_atk_speed() -> u32 {
    6
}

fn default_move_speed() -> u32 {
    3
}

fn default_wander() -> i32 {
    6
}

fn default_respawn() -> u32 {
    30
}

/// Where a skill aims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillTarget {
    Attack,
    Buff,
    #[serde(rename = "self")]
    SelfOnly,
}

/// One skill definition.
#[derive(Debug, Clone, Deserialize)]
pub struct SkillTemplate {
    pub skill_id: u16,
    pub name: String,
    pub target: SkillTarget,
    #[serde(default)]
    pub mp_cost: i32,
    #[serde(default)]
    pub hp_cost: i32,
    /// Consumed material item and count, if any.
    #[serde(default)]
    pub material: Option<(u32, u32)>,
    /// Cast range in tiles; -1 = self/adjacent.
    #[serde(default)]
    pub ranged: i32,
    /// Area radius; -1 = all nearby, 0 = single target.
    #[serde(default)]
    pub area: i32,
    /// Buff duration in seconds; 0 = instant.
    #[serde(default)]
    pub buff_duration: i32,
    /// Cooldown after a successful cast, in milliseconds.
    #[serde(default = "default_reuse")]
    pub reuse_delay_ms: u64,
    /// Damage/heal dice (`count`d`dice` + `value`).
    #[serde(default)]
    pub dice: i32,
    #[serde(default)]
    pub dice_count: i32,
    #[serde(default)]
    pub value: i32,
    /// Skill family byte from the data files; 16 marks healing.
    #[serde(default)]
    pub type_: u8,
    /// Action GFX on cast.
    #[serde(default)]
    pub act_id: u16,
    /// Projectile/effect GFX.
    #[serde(default)]
    pub gfx_id: u16,
    /// Counts as magic for the use-type byte (projectile vs swing).
    #[serde(default)]
    pub magic: bool,
}

fn default_reuse() -> u64 {
    1000
}

impl SkillTemplate {
    /// Healing skills are type 16 or carry heal dice.
    pub fn is_heal(&self) -> bool {
        self.type_ == 16 || (self.dice > 0 && self.target == SkillTarget::Buff)
    }
}

/// One drop-table row.
#[derive(Debug, Clone, Deserialize)]
pub struct DropEntry {
    pub item_id: u32,
    pub min: u32,
    pub max: u32,
    /// Chance per million.
    pub chance: u32,
}

/// One spawn-table row.
#[derive(Debug, Clone, Deserialize)]
pub struct SpawnRecord {
    pub npc_id: u32,
    pub map: u32,
    pub x: i32,
    pub y: i32,
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

/// One polymorph form.
#[derive(Debug, Clone, Deserialize)]
pub struct PolymorphRecord {
    pub poly_id: u16,
    pub name: String,
    pub gfx: u16,
    /// Form forbids casting.
    #[serde(default)]
    pub no_cast: bool,
}

/// Generic weapon-proc row, keyed by weapon item id.
#[derive(Debug, Clone, Deserialize)]
pub struct WeaponProc {
    pub weapon_id: u32,
    /// Roll chance, percent.
    pub chance: u8,
    /// Debuff applied on proc, if any.
    #[serde(default)]
    pub debuff_skill: Option<u16>,
    /// Projectile/effect GFX broadcast on proc, if any.
    #[serde(default)]
    pub gfx: Option<u16>,
    /// Fixed damage component.
    #[serde(default)]
    pub fix_damage: i32,
    /// Random damage component upper bound.
    #[serde(default)]
    pub random_damage: i32,
    /// Area radius; 0 = primary target only.
    #[serde(default)]
    pub area: i32,
    /// Magic-hit value feeding the MR-reduction divisor.
    #[serde(default)]
    pub magic_hit: i32,
}

/// The lookup root handed to systems.
#[derive(Debug, Default)]
pub struct DataTables {
    items: HashMap<u32, ItemTemplate>,
    npcs: HashMap<u32, NpcTemplate>,
    skills: HashMap<u16, SkillTemplate>,
    drops: HashMap<u32, Vec<DropEntry>>,
    spawns: Vec<SpawnRecord>,
    polymorphs: HashMap<u16, PolymorphRecord>,
    procs: HashMap<u32, WeaponProc>,
}

impl DataTables {
    /// Empty tables; loaders and tests fill them with the `insert_*` calls.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_item(&mut self, t: ItemTemplate) {
        self.items.insert(t.item_id, t);
    }

    pub fn insert_npc(&mut self, t: NpcTemplate) {
        self.npcs.insert(t.npc_id, t);
    }

    pub fn insert_skill(&mut self, t: SkillTemplate) {
        self.skills.insert(t.skill_id, t);
    }

    pub fn insert_drops(&mut self, npc_id: u32, rows: Vec<DropEntry>) {
        self.drops.insert(npc_id, rows);
    }

    pub fn insert_spawn(&mut self, s: SpawnRecord) {
        self.spawns.push(s);
    }

    pub fn insert_polymorph(&mut self, p: PolymorphRecord) {
        self.polymorphs.insert(p.poly_id, p);
    }

    pub fn insert_proc(&mut self, p: WeaponProc) {
        self.procs.insert(p.weapon_id, p);
    }

    pub fn item(&self, id: u32) -> Option<&ItemTemplate> {
        self.items.get(&id)
    }

    pub fn npc(&self, id: u32) -> Option<&NpcTemplate> {
        self.npcs.get(&id)
    }

    pub fn skill(&self, id: u16) -> Option<&SkillTemplate> {
        self.skills.get(&id)
    }

    pub fn drops(&self, npc_id: u32) -> &[DropEntry] {
        self.drops.get(&npc_id).map_or(&[], Vec::as_slice)
    }

    pub fn spawns(&self) -> &[SpawnRecord] {
        &self.spawns
    }

    pub fn polymorph(&self, id: u16) -> Option<&PolymorphRecord> {
        self.polymorphs.get(&id)
    }

    pub fn weapon_proc(&self, weapon_id: u32) -> Option<&WeaponProc> {
        self.procs.get(&weapon_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_round_trip() {
        let mut t = DataTables::new();
        t.insert_npc(NpcTemplate {
            npc_id: 45001,
            name: "orc".into(),
            gfx: 61,
            level: 8,
            hp: 80,
            mp: 0,
            ac: 6,
            mr: 10,
            str_: 12,
            dex: 10,
            exp: 35,
            lawful: -80,
            aggro: true,
            ranged: 1,
            atk_speed_ticks: 6,
            move_speed_ticks: 3,
            poison_atk: 0,
            is_guard: false,
            undead: false,
            big: false,
            wander_dist: 6,
            skills: vec![],
            elemental_mr: None,
            respawn_delay_secs: 30,
        });
        assert_eq!(t.npc(45001).unwrap().name, "orc");
        assert!(t.npc(1).is_none());
        assert!(t.drops(45001).is_empty());
    }

    #[test]
    fn heal_classification() {
        let mut s = SkillTemplate {
            skill_id: 1,
            name: "heal".into(),
            target: SkillTarget::Buff,
            mp_cost: 2,
            hp_cost: 0,
            material: None,
            ranged: 3,
            area: 0,
            buff_duration: 0,
            reuse_delay_ms: 1000,
            dice: 4,
            dice_count: 1,
            value: 1,
            type_: 16,
            act_id: 0,
            gfx_id: 0,
            magic: true,
        };
        assert!(s.is_heal());
        s.type_ = 0;
        assert!(s.is_heal());
        s.dice = 0;
        assert!(!s.is_heal());
    }
}
