//! Built-in formula curves.
//!
//! These are the shipped numbers; a production deployment replaces the
//! whole engine at the [`FormulaEngine`] seam without touching the
//! simulation.

use super::*;
use rand::Rng;

/// The built-in engine.
#[derive(Debug, Default)]
pub struct StockFormulas;

/// Exp required at each level follows a cubic curve anchored so level 1 = 0.
fn exp_curve(level: u16) -> u64 {
    let l = level as u64;
    l.saturating_sub(1).pow(3) * 30
}

fn roll_dice(count: i32, dice: i32) -> i32 {
    if count <= 0 || dice <= 0 {
        return 0;
    }
    let mut rng = rand::thread_rng();
    (0..count).map(|_| rng.gen_range(1..=dice)).sum()
}

impl StockFormulas {
    fn swing(&self, ctx: MeleeContext, ranged: bool) -> AttackOutcome {
        let mut rng = rand::thread_rng();

        let attr = if ranged { ctx.dex } else { ctx.str_ };
        let to_hit =
            ctx.attacker_level as i32 + attr / 2 + ctx.hit_mod + ctx.target_ac / 2 + rng.gen_range(1..=20);
        let hit = to_hit >= 10 + ctx.target_level as i32 / 2;
        if !hit {
            return AttackOutcome { damage: 0, hit: false };
        }

        let base = if ctx.target_big {
            ctx.weapon_large
        } else {
            ctx.weapon_small
        };
        let roll = if base > 0 { rng.gen_range(1..=base) } else { 1 };
        let damage = (roll + ctx.enchant + ctx.dmg_mod + attr / 4).max(1);
        AttackOutcome { damage, hit: true }
    }
}

impl FormulaEngine for StockFormulas {
    fn calc_melee_attack(&self, ctx: MeleeContext) -> AttackOutcome {
        self.swing(ctx, false)
    }

    fn calc_ranged_attack(&self, ctx: MeleeContext) -> AttackOutcome {
        self.swing(ctx, true)
    }

    fn calc_skill_damage(&self, ctx: SkillDamageContext) -> SkillDamageOutcome {
        let raw = roll_dice(ctx.dice_count, ctx.dice) + ctx.value + ctx.sp + ctx.int / 3;
        // MR shaves a percentage, never below half.
        let kept = 100 - (ctx.target_mr / 2).clamp(0, 50);
        let damage = (raw * kept / 100).max(0);
        let hit_count = if ctx.skill_id == 132 { 3 } else { 1 };
        let drain_mp = if ctx.skill_id == 39 {
            (ctx.caster_level as i32 / 8 + 3).min(damage.max(1))
        } else {
            0
        };
        SkillDamageOutcome {
            damage,
            hit_count,
            drain_mp,
        }
    }

    fn calc_heal(&self, value: i32, dice: i32, count: i32, int: i32, sp: i32) -> i32 {
        (roll_dice(count, dice) + value + sp + int / 4).max(0)
    }

    fn calc_level_up(&self, class: u8, con: i32, wis: i32) -> LevelUpGain {
        // Class bytes: 0 royal, 1 knight, 2 elf, 3 mage, 4 dark elf.
        let (hp_base, mp_base) = match class {
            1 => (16, 1),
            2 => (11, 4),
            3 => (6, 6),
            4 => (10, 3),
            _ => (12, 2),
        };
        LevelUpGain {
            hp: hp_base + con / 4,
            mp: mp_base + wis / 6,
        }
    }

    fn level_from_exp(&self, exp: u64) -> u16 {
        let mut level = 1u16;
        while level < 99 && exp >= exp_curve(level + 1) {
            level += 1;
        }
        level
    }

    fn exp_for_level(&self, level: u16) -> u64 {
        exp_curve(level)
    }

    fn calc_death_exp_penalty(&self, level: u16, exp: u64) -> u64 {
        // 5% of the current level's span, never dropping below the level floor.
        let floor = exp_curve(level);
        let span = exp_curve(level + 1).saturating_sub(floor);
        exp.saturating_sub(span / 20).max(floor)
    }

    fn potion_effect(&self, item_id: u32) -> Option<PotionEffect> {
        let (kind, value, duration_secs) = match item_id {
            40010 => (PotionKind::Heal, 15, 0),
            40011 => (PotionKind::Heal, 45, 0),
            40012 => (PotionKind::Heal, 75, 0),
            40015 => (PotionKind::Mana, 25, 0),
            40013 => (PotionKind::Haste, 0, 300),
            40014 => (PotionKind::Brave, 0, 300),
            40016 => (PotionKind::CurePoison, 0, 0),
            _ => return None,
        };
        Some(PotionEffect {
            kind,
            value,
            duration_secs,
        })
    }

    fn buff_effect(&self, skill_id: u16, level: u16) -> BuffEffect {
        let lvl = level as i32;
        let mut e = BuffEffect::default();
        match skill_id {
            // Shield
            3 => {
                e.duration_secs = 1800;
                e.deltas.ac = -2;
            }
            // Holy weapon
            12 => {
                e.duration_secs = 1800;
                e.deltas.hit_mod = 1;
                e.deltas.dmg_mod = 1;
            }
            // Blessed armor
            42 => {
                e.duration_secs = 1800;
                e.deltas.ac = -3;
            }
            // Haste
            43 => {
                e.duration_secs = 600;
                e.flags.move_speed = Some(1);
                e.exclusions = vec![54];
            }
            // Greater haste
            54 => {
                e.duration_secs = 300;
                e.flags.move_speed = Some(2);
                e.exclusions = vec![43];
            }
            // Physical enchant: STR
            48 => {
                e.duration_secs = 600;
                e.deltas.str_ = 5;
            }
            // Physical enchant: DEX
            52 => {
                e.duration_secs = 600;
                e.deltas.dex = 5;
            }
            // Bless weapon
            89 => {
                e.duration_secs = 1200;
                e.deltas.hit_mod = 2;
                e.deltas.dmg_mod = 2;
            }
            // Absolute barrier
            90 => {
                e.duration_secs = 16 + lvl;
                e.flags.absolute_barrier = true;
            }
            // Counter barrier
            91 => {
                e.duration_secs = 300;
            }
            // Invisibility
            60 => {
                e.duration_secs = 600;
                e.flags.invisible = true;
            }
            // Storm walk (brave family)
            172 => {
                e.duration_secs = 300;
                e.flags.brave_speed = Some(4);
            }
            // Polymorph
            67 => {
                e.duration_secs = 1800;
                e.poly_id = Some(1);
            }
            // Freeze-family debuffs carry only the paralyzed flag; duration
            // is set by the caller.
            157 | 50 | 80 => {
                e.duration_secs = 10;
                e.flags.paralyzed = true;
                e.non_cancellable = true;
            }
            // Sleep mist
            66 => {
                e.duration_secs = 10 + lvl;
                e.flags.sleeped = true;
            }
            // Curse paralyze
            33 => {
                e.duration_secs = 20;
            }
            // Slow family
            29 | 76 | 152 => {
                e.duration_secs = 60;
                e.deltas.dodge = -2;
            }
            // Weakness
            47 => {
                e.duration_secs = 60;
                e.deltas.dmg_mod = -5;
                e.deltas.hit_mod = -1;
            }
            // Disease
            56 => {
                e.duration_secs = 60;
                e.deltas.dmg_mod = -6;
                e.deltas.ac = 12;
            }
            // Darkness
            20 | 40 | 103 => {
                e.duration_secs = 120;
                e.deltas.hit_mod = -6;
            }
            // Poison debuff marker
            11 => {
                e.duration_secs = 30;
            }
            // Mummy's curse second stage
            4001 => {
                e.duration_secs = 30;
                e.flags.paralyzed = true;
                e.non_cancellable = true;
            }
            _ => {
                e.duration_secs = 0;
            }
        }
        e
    }

    fn resurrect_effect(&self, skill_id: u16) -> ResurrectEffect {
        ResurrectEffect {
            hp_ratio_pct: if skill_id == 160 { 100 } else { 10 },
        }
    }

    fn is_non_cancellable(&self, skill_id: u16) -> bool {
        matches!(skill_id, 50 | 80 | 157 | 4001 | 67)
    }

    fn respawn_location(&self, map: u32) -> (u32, i32, i32) {
        // Town gate per continent; unknown maps fall back to the capital.
        match map {
            4 => (4, 33080, 33390),
            _ => (4, 33080, 33390),
        }
    }

    fn run_npc_ai(&self, ctx: &AiContext) -> Vec<AiCommand> {
        let mut rng = rand::thread_rng();
        let mut cmds = Vec::new();

        if ctx.target_id == 0 {
            // No target: wander inside the leash, drift home beyond it.
            if ctx.can_move && rng.gen_range(0..100) < 25 {
                if ctx.spawn_dist > ctx.wander_dist {
                    cmds.push(AiCommand::LoseAggro);
                } else {
                    cmds.push(AiCommand::Wander {
                        dir: rng.gen_range(0..8),
                    });
                }
            }
            return cmds;
        }

        // Skills fire before plain swings.
        if ctx.can_attack {
            for s in &ctx.skills {
                if ctx.target_dist <= s.area.max(ctx.reach)
                    && rng.gen_range(0..100) < s.chance as i32
                {
                    cmds.push(AiCommand::Skill {
                        skill_id: s.skill_id,
                        act_id: s.act_id,
                        gfx_id: s.gfx_id,
                    });
                    return cmds;
                }
            }
        }

        if ctx.target_dist <= ctx.reach.max(1) {
            if ctx.can_attack {
                cmds.push(if ctx.reach > 1 {
                    AiCommand::RangedAttack
                } else {
                    AiCommand::Attack
                });
            }
        } else if ctx.can_move {
            cmds.push(AiCommand::MoveToward);
        }
        cmds
    }

    fn calc_enchant(&self, ctx: EnchantContext) -> EnchantOutcome {
        let mut rng = rand::thread_rng();
        let safe = if ctx.is_weapon { 6 } else { 4 };
        if ctx.current < safe {
            return EnchantOutcome::Success(ctx.current + 1);
        }
        let chance = (100 / (ctx.current - safe + 2)).max(10);
        if rng.gen_range(0..100) < chance {
            EnchantOutcome::Success(ctx.current + 1)
        } else if ctx.blessed {
            EnchantOutcome::Fail
        } else {
            EnchantOutcome::Destroy
        }
    }

    fn pk_lawful_penalty(&self, victim_lawful: i32) -> i32 {
        if victim_lawful >= 0 {
            -1000
        } else {
            0
        }
    }

    fn pk_item_drop(&self, lawful: i32) -> u32 {
        match lawful {
            l if l <= -30000 => 3,
            l if l <= -10000 => 2,
            l if l < 0 => 1,
            _ => 0,
        }
    }

    fn hp_regen_amount(&self, level: u16, con: i32) -> i32 {
        (level as i32 / 8 + (con - 11).max(0) / 2 + 1).max(1)
    }

    fn mp_regen_amount(&self, level: u16, wis: i32) -> i32 {
        (level as i32 / 12 + (wis - 11).max(0) / 2 + 1).max(1)
    }

    fn turn_undead_chance(&self, caster_level: u16, target_level: u16) -> i32 {
        // Magic level derived as level/4; simplified until a formulae
        // document supersedes it.
        let magic_level = caster_level as i32 / 4;
        (magic_level * 10 - target_level as i32 * 3).clamp(0, 90)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exp_curve_is_monotonic() {
        let e = StockFormulas;
        let mut prev = 0;
        for lvl in 1..60 {
            let need = e.exp_for_level(lvl);
            assert!(need >= prev);
            prev = need;
        }
        assert_eq!(e.level_from_exp(0), 1);
        assert_eq!(e.level_from_exp(e.exp_for_level(10)), 10);
    }

    #[test]
    fn death_penalty_never_drops_a_level() {
        let e = StockFormulas;
        let exp = e.exp_for_level(20) + 5;
        let after = e.calc_death_exp_penalty(20, exp);
        assert!(after >= e.exp_for_level(20));
        assert!(after <= exp);
    }

    #[test]
    fn haste_and_greater_haste_exclude_each_other() {
        let e = StockFormulas;
        assert!(e.buff_effect(43, 10).exclusions.contains(&54));
        assert!(e.buff_effect(54, 10).exclusions.contains(&43));
    }

    #[test]
    fn freeze_buffs_are_non_cancellable() {
        let e = StockFormulas;
        for id in [50, 80, 157, 4001] {
            assert!(e.buff_effect(id, 10).non_cancellable);
            assert!(e.is_non_cancellable(id));
        }
    }

    #[test]
    fn ai_idles_without_a_target() {
        let e = StockFormulas;
        let ctx = AiContext {
            npc_level: 10,
            hp_ratio_pct: 100,
            can_attack: true,
            can_move: false,
            reach: 1,
            target_id: 0,
            target_x: 0,
            target_y: 0,
            target_dist: 0,
            target_ac: 0,
            target_level: 0,
            skills: vec![],
            wander_dist: 6,
            spawn_dist: 0,
        };
        // can_move is false, so even the wander roll yields nothing.
        assert!(e.run_npc_ai(&ctx).is_empty());
    }

    #[test]
    fn pk_drop_scales_with_lawful() {
        let e = StockFormulas;
        assert_eq!(e.pk_item_drop(100), 0);
        assert_eq!(e.pk_item_drop(-5000), 1);
        assert_eq!(e.pk_item_drop(-35000), 3);
    }
}
