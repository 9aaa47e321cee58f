//! Clan repository.

use super::DbError;
use sqlx::{Row, SqlitePool};

/// One clan row.
#[derive(Debug, Clone)]
pub struct ClanRow {
    pub clan_id: u32,
    pub name: String,
    pub leader: u32,
    pub announcement: String,
    pub emblem_id: u32,
}

/// One clan member row.
#[derive(Debug, Clone)]
pub struct ClanMemberRow {
    pub clan_id: u32,
    pub char_id: u32,
    pub name: String,
    pub rank: u8,
    pub notes: String,
}

/// Repository for clan operations.
pub struct ClanRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ClanRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn save(&self, clan: &ClanRow, members: &[ClanMemberRow]) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO clans (clan_id, name, leader, announcement, emblem_id)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(clan_id) DO UPDATE SET
                name = excluded.name,
                leader = excluded.leader,
                announcement = excluded.announcement,
                emblem_id = excluded.emblem_id
            "#,
        )
        .bind(clan.clan_id as i64)
        .bind(&clan.name)
        .bind(clan.leader as i64)
        .bind(&clan.announcement)
        .bind(clan.emblem_id as i64)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM clan_members WHERE clan_id = ?")
            .bind(clan.clan_id as i64)
            .execute(&mut *tx)
            .await?;
        for m in members {
            sqlx::query(
                "INSERT INTO clan_members (clan_id, char_id, name, rank, notes) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(m.clan_id as i64)
            .bind(m.char_id as i64)
            .bind(&m.name)
            .bind(m.rank as i64)
            .bind(&m.notes)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn delete(&self, clan_id: u32) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM clan_members WHERE clan_id = ?")
            .bind(clan_id as i64)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM clans WHERE clan_id = ?")
            .bind(clan_id as i64)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn load_all(&self) -> Result<Vec<(ClanRow, Vec<ClanMemberRow>)>, DbError> {
        let clan_rows = sqlx::query("SELECT * FROM clans")
            .fetch_all(self.pool)
            .await?;
        let mut out = Vec::with_capacity(clan_rows.len());
        for r in &clan_rows {
            let clan = ClanRow {
                clan_id: r.get::<i64, _>("clan_id") as u32,
                name: r.get("name"),
                leader: r.get::<i64, _>("leader") as u32,
                announcement: r.get("announcement"),
                emblem_id: r.get::<i64, _>("emblem_id") as u32,
            };
            let member_rows = sqlx::query("SELECT * FROM clan_members WHERE clan_id = ?")
                .bind(clan.clan_id as i64)
                .fetch_all(self.pool)
                .await?;
            let members = member_rows
                .iter()
                .map(|m| ClanMemberRow {
                    clan_id: m.get::<i64, _>("clan_id") as u32,
                    char_id: m.get::<i64, _>("char_id") as u32,
                    name: m.get("name"),
                    rank: m.get::<i64, _>("rank") as u8,
                    notes: m.get("notes"),
                })
                .collect();
            out.push((clan, members));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn clan_save_load_round_trip() {
        let db = Database::new(":memory:").await.unwrap();
        let clan = ClanRow {
            clan_id: 3,
            name: "Wolves".into(),
            leader: 7,
            announcement: "hunt tonight".into(),
            emblem_id: 2,
        };
        let members = vec![ClanMemberRow {
            clan_id: 3,
            char_id: 7,
            name: "alpha".into(),
            rank: 10,
            notes: String::new(),
        }];
        db.clans().save(&clan, &members).await.unwrap();

        let all = db.clans().load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].0.name, "Wolves");
        assert_eq!(all[0].1[0].rank, 10);

        db.clans().delete(3).await.unwrap();
        assert!(db.clans().load_all().await.unwrap().is_empty());
    }
}
