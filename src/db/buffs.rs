//! Active-buff repository.
//!
//! Each row carries the complete delta record (as JSON) and set-flags, so
//! login restores the buff exactly as it was, with the seconds it had left.

use super::DbError;
use crate::script::{BuffFlags, StatDeltas};
use sqlx::{Row, SqlitePool};

/// One stored buff row.
#[derive(Debug, Clone)]
pub struct BuffRow {
    pub skill_id: u16,
    pub remaining_secs: u32,
    pub deltas: StatDeltas,
    pub flags: BuffFlags,
    pub poly_id: Option<u16>,
}

#[derive(serde::Serialize, serde::Deserialize, Default)]
struct DeltasJson {
    #[serde(default)]
    ac: i32,
    #[serde(default, rename = "str")]
    str_: i32,
    #[serde(default)]
    dex: i32,
    #[serde(default)]
    con: i32,
    #[serde(default)]
    int: i32,
    #[serde(default)]
    wis: i32,
    #[serde(default)]
    cha: i32,
    #[serde(default)]
    max_hp: i32,
    #[serde(default)]
    max_mp: i32,
    #[serde(default)]
    hit_mod: i32,
    #[serde(default)]
    dmg_mod: i32,
    #[serde(default)]
    sp: i32,
    #[serde(default)]
    mr: i32,
    #[serde(default)]
    hpr: i32,
    #[serde(default)]
    mpr: i32,
    #[serde(default)]
    bow_hit: i32,
    #[serde(default)]
    bow_dmg: i32,
    #[serde(default)]
    dodge: i32,
    #[serde(default)]
    resist_stun: i32,
    #[serde(default)]
    resist_stone: i32,
    #[serde(default)]
    resist_sleep: i32,
    #[serde(default)]
    resist_freeze: i32,
}

impl From<&StatDeltas> for DeltasJson {
    fn from(d: &StatDeltas) -> Self {
        Self {
            ac: d.ac,
            str_: d.str_,
            dex: d.dex,
            con: d.con,
            int: d.int,
            wis: d.wis,
            cha: d.cha,
            max_hp: d.max_hp,
            max_mp: d.max_mp,
            hit_mod: d.hit_mod,
            dmg_mod: d.dmg_mod,
            sp: d.sp,
            mr: d.mr,
            hpr: d.hpr,
            mpr: d.mpr,
            bow_hit: d.bow_hit,
            bow_dmg: d.bow_dmg,
            dodge: d.dodge,
            resist_stun: d.resist_stun,
            resist_stone: d.resist_stone,
            resist_sleep: d.resist_sleep,
            resist_freeze: d.resist_freeze,
        }
    }
}

impl From<DeltasJson> for StatDeltas {
    fn from(j: DeltasJson) -> Self {
        Self {
            ac: j.ac,
            str_: j.str_,
            dex: j.dex,
            con: j.con,
            int: j.int,
            wis: j.wis,
            cha: j.cha,
            max_hp: j.max_hp,
            max_mp: j.max_mp,
            hit_mod: j.hit_mod,
            dmg_mod: j.dmg_mod,
            sp: j.sp,
            mr: j.mr,
            hpr: j.hpr,
            mpr: j.mpr,
            bow_hit: j.bow_hit,
            bow_dmg: j.bow_dmg,
            dodge: j.dodge,
            resist_stun: j.resist_stun,
            resist_stone: j.resist_stone,
            resist_sleep: j.resist_sleep,
            resist_freeze: j.resist_freeze,
        }
    }
}

/// Repository for buff persistence.
pub struct BuffRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> BuffRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Replace a character's stored buffs.
    pub async fn replace(&self, char_id: u32, buffs: &[BuffRow]) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM buffs WHERE char_id = ?")
            .bind(char_id as i64)
            .execute(&mut *tx)
            .await?;
        for b in buffs {
            let deltas = serde_json::to_string(&DeltasJson::from(&b.deltas))?;
            sqlx::query(
                r#"
                INSERT INTO buffs (char_id, skill_id, remaining_secs, deltas,
                                   move_speed, brave_speed, invisible, paralyzed,
                                   sleeped, barrier, poly_id)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(char_id as i64)
            .bind(b.skill_id as i64)
            .bind(b.remaining_secs as i64)
            .bind(deltas)
            .bind(b.flags.move_speed.map(|v| v as i64))
            .bind(b.flags.brave_speed.map(|v| v as i64))
            .bind(b.flags.invisible)
            .bind(b.flags.paralyzed)
            .bind(b.flags.sleeped)
            .bind(b.flags.absolute_barrier)
            .bind(b.poly_id.map(|v| v as i64))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn load(&self, char_id: u32) -> Result<Vec<BuffRow>, DbError> {
        let rows = sqlx::query("SELECT * FROM buffs WHERE char_id = ?")
            .bind(char_id as i64)
            .fetch_all(self.pool)
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for r in &rows {
            let deltas: DeltasJson = serde_json::from_str(r.get::<String, _>("deltas").as_str())?;
            out.push(BuffRow {
                skill_id: r.get::<i64, _>("skill_id") as u16,
                remaining_secs: r.get::<i64, _>("remaining_secs") as u32,
                deltas: deltas.into(),
                flags: BuffFlags {
                    move_speed: r.get::<Option<i64>, _>("move_speed").map(|v| v as u8),
                    brave_speed: r.get::<Option<i64>, _>("brave_speed").map(|v| v as u8),
                    invisible: r.get::<bool, _>("invisible"),
                    paralyzed: r.get::<bool, _>("paralyzed"),
                    sleeped: r.get::<bool, _>("sleeped"),
                    absolute_barrier: r.get::<bool, _>("barrier"),
                },
                poly_id: r.get::<Option<i64>, _>("poly_id").map(|v| v as u16),
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn buff_rows_round_trip_with_deltas() {
        let db = Database::new(":memory:").await.unwrap();
        let row = BuffRow {
            skill_id: 43,
            remaining_secs: 120,
            deltas: StatDeltas {
                str_: 5,
                max_hp: 30,
                ..Default::default()
            },
            flags: BuffFlags {
                move_speed: Some(1),
                ..Default::default()
            },
            poly_id: None,
        };
        db.buffs().replace(1, &[row]).await.unwrap();

        let loaded = db.buffs().load(1).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].skill_id, 43);
        assert_eq!(loaded[0].deltas.str_, 5);
        assert_eq!(loaded[0].deltas.max_hp, 30);
        assert_eq!(loaded[0].flags.move_speed, Some(1));

        // Replace drops what is gone.
        db.buffs().replace(1, &[]).await.unwrap();
        assert!(db.buffs().load(1).await.unwrap().is_empty());
    }
}
