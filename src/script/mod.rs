//! The formula scripting boundary.
//!
//! Combat math, regen curves, level tables, buff payloads, enchant
//! outcomes, and NPC decision lists all cross this trait. Context goes in
//! by value, flat result records come out, and implementations never yield
//! back into the simulation; the tick thread calls straight through.
//!
//! [`stock::StockFormulas`] ships the built-in curves so the server runs
//! and tests pass without an embedded language; an external runtime plugs
//! in by implementing [`FormulaEngine`].

pub mod stock;

/// Reversible stat deltas carried by a buff or computed for equipment.
///
/// Every field a buff writes lives here, so removal is a mechanical
/// subtraction rather than per-skill case analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatDeltas {
    pub ac: i32,
    pub str_: i32,
    pub dex: i32,
    pub con: i32,
    pub int: i32,
    pub wis: i32,
    pub cha: i32,
    pub max_hp: i32,
    pub max_mp: i32,
    pub hit_mod: i32,
    pub dmg_mod: i32,
    pub sp: i32,
    pub mr: i32,
    pub hpr: i32,
    pub mpr: i32,
    pub bow_hit: i32,
    pub bow_dmg: i32,
    pub dodge: i32,
    pub resist_stun: i32,
    pub resist_stone: i32,
    pub resist_sleep: i32,
    pub resist_freeze: i32,
}

impl StatDeltas {
    /// True when no field is set.
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Whether any primary attribute is touched (triggers a status resend).
    pub fn touches_primaries(&self) -> bool {
        self.str_ != 0
            || self.dex != 0
            || self.con != 0
            || self.int != 0
            || self.wis != 0
            || self.cha != 0
    }
}

/// Set-flags a buff can impose while active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuffFlags {
    /// Move-speed level this buff sets (1 haste, 2 greater haste).
    pub move_speed: Option<u8>,
    /// Brave-speed level this buff sets.
    pub brave_speed: Option<u8>,
    pub invisible: bool,
    pub paralyzed: bool,
    pub sleeped: bool,
    pub absolute_barrier: bool,
}

/// The full payload of a buff skill at a given caster level.
#[derive(Debug, Clone, Default)]
pub struct BuffEffect {
    /// Seconds the buff lasts; `<= 0` means no buff is registered.
    pub duration_secs: i32,
    pub deltas: StatDeltas,
    pub flags: BuffFlags,
    /// Skills removed before this buff applies.
    pub exclusions: Vec<u16>,
    /// Polymorph form for the polymorph buff.
    pub poly_id: Option<u16>,
    /// Survives cancel-all (but not death).
    pub non_cancellable: bool,
}

/// Context for melee and ranged swings, PC or NPC attacker alike.
#[derive(Debug, Clone, Copy)]
pub struct MeleeContext {
    pub attacker_level: u16,
    pub str_: i32,
    pub dex: i32,
    pub weapon_small: i32,
    pub weapon_large: i32,
    pub enchant: i32,
    pub hit_mod: i32,
    pub dmg_mod: i32,
    pub target_ac: i32,
    pub target_level: u16,
    pub target_mr: i32,
    pub target_big: bool,
}

/// Outcome of one swing.
#[derive(Debug, Clone, Copy)]
pub struct AttackOutcome {
    pub damage: i32,
    pub hit: bool,
}

/// Context for attack-skill damage.
#[derive(Debug, Clone, Copy)]
pub struct SkillDamageContext {
    pub skill_id: u16,
    pub caster_level: u16,
    pub int: i32,
    pub sp: i32,
    pub dice: i32,
    pub dice_count: i32,
    pub value: i32,
    pub target_level: u16,
    pub target_mr: i32,
}

/// Outcome of an attack skill against one target.
#[derive(Debug, Clone, Copy)]
pub struct SkillDamageOutcome {
    pub damage: i32,
    /// Per-hit loop count (multi-arrow skills).
    pub hit_count: i32,
    /// MP drained from the target and granted to the caster.
    pub drain_mp: i32,
}

/// HP/MP gained on level-up.
#[derive(Debug, Clone, Copy)]
pub struct LevelUpGain {
    pub hp: i32,
    pub mp: i32,
}

/// What drinking a potion does.
#[derive(Debug, Clone, Copy)]
pub struct PotionEffect {
    pub kind: PotionKind,
    pub value: i32,
    pub duration_secs: i32,
}

/// Potion families the item-use handler understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PotionKind {
    Heal,
    Mana,
    Haste,
    Brave,
    CurePoison,
}

/// Resurrection strength.
#[derive(Debug, Clone, Copy)]
pub struct ResurrectEffect {
    /// HP restored as a percentage of max.
    pub hp_ratio_pct: i32,
}

/// Context for an enchant-scroll application.
#[derive(Debug, Clone, Copy)]
pub struct EnchantContext {
    pub item_id: u32,
    pub current: i32,
    pub blessed: bool,
    pub is_weapon: bool,
}

/// Enchant resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnchantOutcome {
    /// New enchant level.
    Success(i32),
    /// No change.
    Fail,
    /// Item destroyed.
    Destroy,
}

/// One NPC skill as presented to the AI.
#[derive(Debug, Clone, Copy)]
pub struct AiSkill {
    pub skill_id: u16,
    pub chance: u8,
    pub act_id: u16,
    pub gfx_id: u16,
    pub area: i32,
}

/// Everything the monster AI sees for one decision.
#[derive(Debug, Clone)]
pub struct AiContext {
    pub npc_level: u16,
    pub hp_ratio_pct: i32,
    pub can_attack: bool,
    pub can_move: bool,
    /// Attack reach; > 1 means ranged.
    pub reach: i32,
    pub target_id: u32,
    pub target_x: i32,
    pub target_y: i32,
    pub target_dist: i32,
    pub target_ac: i32,
    pub target_level: u16,
    pub skills: Vec<AiSkill>,
    pub wander_dist: i32,
    pub spawn_dist: i32,
}

/// Ordered commands returned by the AI; executed in list order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiCommand {
    Attack,
    RangedAttack,
    Skill {
        skill_id: u16,
        act_id: u16,
        gfx_id: u16,
    },
    MoveToward,
    Wander {
        dir: u8,
    },
    LoseAggro,
}

/// The scripting runtime surface.
pub trait FormulaEngine: Send + Sync {
    fn calc_melee_attack(&self, ctx: MeleeContext) -> AttackOutcome;
    fn calc_ranged_attack(&self, ctx: MeleeContext) -> AttackOutcome;
    fn calc_skill_damage(&self, ctx: SkillDamageContext) -> SkillDamageOutcome;
    fn calc_heal(&self, value: i32, dice: i32, count: i32, int: i32, sp: i32) -> i32;
    fn calc_level_up(&self, class: u8, con: i32, wis: i32) -> LevelUpGain;
    fn level_from_exp(&self, exp: u64) -> u16;
    fn exp_for_level(&self, level: u16) -> u64;
    fn calc_death_exp_penalty(&self, level: u16, exp: u64) -> u64;
    fn potion_effect(&self, item_id: u32) -> Option<PotionEffect>;
    fn buff_effect(&self, skill_id: u16, level: u16) -> BuffEffect;
    fn resurrect_effect(&self, skill_id: u16) -> ResurrectEffect;
    fn is_non_cancellable(&self, skill_id: u16) -> bool;
    fn respawn_location(&self, map: u32) -> (u32, i32, i32);
    fn run_npc_ai(&self, ctx: &AiContext) -> Vec<AiCommand>;
    fn calc_enchant(&self, ctx: EnchantContext) -> EnchantOutcome;
    fn pk_lawful_penalty(&self, victim_lawful: i32) -> i32;
    fn pk_item_drop(&self, lawful: i32) -> u32;
    fn hp_regen_amount(&self, level: u16, con: i32) -> i32;
    fn mp_regen_amount(&self, level: u16, wis: i32) -> i32;
    fn turn_undead_chance(&self, caster_level: u16, target_level: u16) -> i32;
}
