//! Character repository.
//!
//! The character row stores *base* values: primary stats and MaxHP/MaxMP
//! with equipment and buff contributions subtracted. Login re-applies both
//! additively, so nothing double counts across a restart.

use super::DbError;
use crate::world::Bookmark;
use sqlx::{Row, SqlitePool};

/// One character row as stored.
#[derive(Debug, Clone)]
pub struct CharacterRow {
    pub char_id: u32,
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
    pub attr_grants: u8,
    pub base_str: i32,
    pub base_dex: i32,
    pub base_con: i32,
    pub base_int: i32,
    pub base_wis: i32,
    pub base_cha: i32,
    pub base_max_hp: i32,
    pub base_max_mp: i32,
    pub cur_hp: i32,
    pub cur_mp: i32,
    pub bookmarks: Vec<Bookmark>,
    pub map_time_secs: u32,
}

/// Repository for character operations.
pub struct CharacterRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CharacterRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Load one character.
    pub async fn load(&self, char_id: u32) -> Result<CharacterRow, DbError> {
        let row = sqlx::query("SELECT * FROM characters WHERE char_id = ?")
            .bind(char_id as i64)
            .fetch_optional(self.pool)
            .await?
            .ok_or(DbError::CharacterNotFound(char_id))?;

        let bookmarks: Vec<Bookmark> =
            serde_json::from_str(row.get::<String, _>("bookmarks").as_str())?;

        Ok(CharacterRow {
            char_id: row.get::<i64, _>("char_id") as u32,
            account: row.get("account"),
            name: row.get("name"),
            class: row.get::<i64, _>("class") as u8,
            map: row.get::<i64, _>("map") as u32,
            x: row.get::<i64, _>("x") as i32,
            y: row.get::<i64, _>("y") as i32,
            heading: row.get::<i64, _>("heading") as u8,
            level: row.get::<i64, _>("level") as u16,
            exp: row.get::<i64, _>("exp") as u64,
            lawful: row.get::<i64, _>("lawful") as i32,
            attr_grants: row.get::<i64, _>("attr_grants") as u8,
            base_str: row.get::<i64, _>("base_str") as i32,
            base_dex: row.get::<i64, _>("base_dex") as i32,
            base_con: row.get::<i64, _>("base_con") as i32,
            base_int: row.get::<i64, _>("base_int") as i32,
            base_wis: row.get::<i64, _>("base_wis") as i32,
            base_cha: row.get::<i64, _>("base_cha") as i32,
            base_max_hp: row.get::<i64, _>("base_max_hp") as i32,
            base_max_mp: row.get::<i64, _>("base_max_mp") as i32,
            cur_hp: row.get::<i64, _>("cur_hp") as i32,
            cur_mp: row.get::<i64, _>("cur_mp") as i32,
            bookmarks,
            map_time_secs: row.get::<i64, _>("map_time_secs") as u32,
        })
    }

    /// Upsert one character row.
    pub async fn save(&self, c: &CharacterRow) -> Result<(), DbError> {
        let bookmarks = serde_json::to_string(&c.bookmarks)?;
        sqlx::query(
            r#"
            INSERT INTO characters (char_id, account, name, class, map, x, y, heading,
                                    level, exp, lawful, attr_grants,
                                    base_str, base_dex, base_con, base_int, base_wis, base_cha,
                                    base_max_hp, base_max_mp, cur_hp, cur_mp,
                                    bookmarks, map_time_secs)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(char_id) DO UPDATE SET
                account = excluded.account,
                name = excluded.name,
                class = excluded.class,
                map = excluded.map,
                x = excluded.x,
                y = excluded.y,
                heading = excluded.heading,
                level = excluded.level,
                exp = excluded.exp,
                lawful = excluded.lawful,
                attr_grants = excluded.attr_grants,
                base_str = excluded.base_str,
                base_dex = excluded.base_dex,
                base_con = excluded.base_con,
                base_int = excluded.base_int,
                base_wis = excluded.base_wis,
                base_cha = excluded.base_cha,
                base_max_hp = excluded.base_max_hp,
                base_max_mp = excluded.base_max_mp,
                cur_hp = excluded.cur_hp,
                cur_mp = excluded.cur_mp,
                bookmarks = excluded.bookmarks,
                map_time_secs = excluded.map_time_secs
            "#,
        )
        .bind(c.char_id as i64)
        .bind(&c.account)
        .bind(&c.name)
        .bind(c.class as i64)
        .bind(c.map as i64)
        .bind(c.x as i64)
        .bind(c.y as i64)
        .bind(c.heading as i64)
        .bind(c.level as i64)
        .bind(c.exp as i64)
        .bind(c.lawful as i64)
        .bind(c.attr_grants as i64)
        .bind(c.base_str as i64)
        .bind(c.base_dex as i64)
        .bind(c.base_con as i64)
        .bind(c.base_int as i64)
        .bind(c.base_wis as i64)
        .bind(c.base_cha as i64)
        .bind(c.base_max_hp as i64)
        .bind(c.base_max_mp as i64)
        .bind(c.cur_hp as i64)
        .bind(c.cur_mp as i64)
        .bind(bookmarks)
        .bind(c.map_time_secs as i64)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Replace a character's known spell ids.
    pub async fn save_known_spells(&self, char_id: u32, spells: &[u16]) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM known_spells WHERE char_id = ?")
            .bind(char_id as i64)
            .execute(&mut *tx)
            .await?;
        for &skill_id in spells {
            sqlx::query("INSERT INTO known_spells (char_id, skill_id) VALUES (?, ?)")
                .bind(char_id as i64)
                .bind(skill_id as i64)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn load_known_spells(&self, char_id: u32) -> Result<Vec<u16>, DbError> {
        let rows = sqlx::query("SELECT skill_id FROM known_spells WHERE char_id = ?")
            .bind(char_id as i64)
            .fetch_all(self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| r.get::<i64, _>("skill_id") as u16)
            .collect())
    }

    /// Replace a character's timed-map accumulators.
    pub async fn save_map_timers(
        &self,
        char_id: u32,
        timers: &[(u32, u32)],
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM map_timers WHERE char_id = ?")
            .bind(char_id as i64)
            .execute(&mut *tx)
            .await?;
        for &(map, secs) in timers {
            sqlx::query("INSERT INTO map_timers (char_id, map, secs) VALUES (?, ?, ?)")
                .bind(char_id as i64)
                .bind(map as i64)
                .bind(secs as i64)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Top characters by (level, exp) for the ranking recompute.
    pub async fn top_by_exp(&self, limit: u32) -> Result<Vec<(String, u16, u64)>, DbError> {
        let rows =
            sqlx::query("SELECT name, level, exp FROM characters ORDER BY level DESC, exp DESC LIMIT ?")
                .bind(limit as i64)
                .fetch_all(self.pool)
                .await?;
        Ok(rows
            .iter()
            .map(|r| {
                (
                    r.get::<String, _>("name"),
                    r.get::<i64, _>("level") as u16,
                    r.get::<i64, _>("exp") as u64,
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn row() -> CharacterRow {
        CharacterRow {
            char_id: 7,
            account: "acc".into(),
            name: "tester".into(),
            class: 1,
            map: 4,
            x: 100,
            y: 200,
            heading: 2,
            level: 12,
            exp: 5000,
            lawful: -100,
            attr_grants: 1,
            base_str: 16,
            base_dex: 12,
            base_con: 14,
            base_int: 10,
            base_wis: 11,
            base_cha: 9,
            base_max_hp: 140,
            base_max_mp: 30,
            cur_hp: 90,
            cur_mp: 12,
            bookmarks: vec![Bookmark {
                name: "home".into(),
                map: 4,
                x: 50,
                y: 60,
            }],
            map_time_secs: 42,
        }
    }

    #[tokio::test]
    async fn save_load_round_trip() {
        let db = Database::new(":memory:").await.unwrap();
        db.characters().save(&row()).await.unwrap();
        let loaded = db.characters().load(7).await.unwrap();
        assert_eq!(loaded.name, "tester");
        assert_eq!(loaded.base_max_hp, 140);
        assert_eq!(loaded.bookmarks.len(), 1);
        assert_eq!(loaded.bookmarks[0].map, 4);
    }

    #[tokio::test]
    async fn missing_character_is_an_error() {
        let db = Database::new(":memory:").await.unwrap();
        assert!(matches!(
            db.characters().load(999).await,
            Err(DbError::CharacterNotFound(999))
        ));
    }

    #[tokio::test]
    async fn known_spells_replace() {
        let db = Database::new(":memory:").await.unwrap();
        let repo = db.characters();
        repo.save_known_spells(7, &[1, 2, 3]).await.unwrap();
        repo.save_known_spells(7, &[4]).await.unwrap();
        assert_eq!(repo.load_known_spells(7).await.unwrap(), vec![4]);
    }
}
