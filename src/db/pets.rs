//! Pet repository, keyed by the collar item's object id.

use super::DbError;
use sqlx::{Row, SqlitePool};

/// One stored pet.
#[derive(Debug, Clone)]
pub struct PetRow {
    pub collar_obj_id: u32,
    pub npc_template: u32,
    pub name: String,
    pub level: u16,
    pub cur_hp: i32,
    pub cur_mp: i32,
    pub exp: u64,
    pub lawful: i32,
}

/// Repository for pet persistence.
pub struct PetRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PetRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn save(&self, pet: &PetRow) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO pets (collar_obj_id, npc_template, name, level, cur_hp, cur_mp, exp, lawful)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(collar_obj_id) DO UPDATE SET
                npc_template = excluded.npc_template,
                name = excluded.name,
                level = excluded.level,
                cur_hp = excluded.cur_hp,
                cur_mp = excluded.cur_mp,
                exp = excluded.exp,
                lawful = excluded.lawful
            "#,
        )
        .bind(pet.collar_obj_id as i64)
        .bind(pet.npc_template as i64)
        .bind(&pet.name)
        .bind(pet.level as i64)
        .bind(pet.cur_hp as i64)
        .bind(pet.cur_mp as i64)
        .bind(pet.exp as i64)
        .bind(pet.lawful as i64)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn load(&self, collar_obj_id: u32) -> Result<Option<PetRow>, DbError> {
        let row = sqlx::query("SELECT * FROM pets WHERE collar_obj_id = ?")
            .bind(collar_obj_id as i64)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(|r| PetRow {
            collar_obj_id: r.get::<i64, _>("collar_obj_id") as u32,
            npc_template: r.get::<i64, _>("npc_template") as u32,
            name: r.get("name"),
            level: r.get::<i64, _>("level") as u16,
            cur_hp: r.get::<i64, _>("cur_hp") as i32,
            cur_mp: r.get::<i64, _>("cur_mp") as i32,
            exp: r.get::<i64, _>("exp") as u64,
            lawful: r.get::<i64, _>("lawful") as i32,
        }))
    }

    pub async fn delete(&self, collar_obj_id: u32) -> Result<(), DbError> {
        sqlx::query("DELETE FROM pets WHERE collar_obj_id = ?")
            .bind(collar_obj_id as i64)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn pet_round_trip_by_collar() {
        let db = Database::new(":memory:").await.unwrap();
        let pet = PetRow {
            collar_obj_id: 501,
            npc_template: 45313,
            name: "Rex".into(),
            level: 14,
            cur_hp: 120,
            cur_mp: 5,
            exp: 900,
            lawful: 0,
        };
        db.pets().save(&pet).await.unwrap();
        let loaded = db.pets().load(501).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Rex");
        assert_eq!(loaded.level, 14);

        db.pets().delete(501).await.unwrap();
        assert!(db.pets().load(501).await.unwrap().is_none());
    }
}
