//! Warehouse repository.
//!
//! Four warehouse families share one table, keyed by kind + owner string
//! (account name, character id, or clan id). Row deltas mirror the memory
//! cache deltas for any completed operation.

use super::inventory::ItemRow;
use super::DbError;
use sqlx::{Row, SqlitePool};

/// Which warehouse family a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WarehouseKind {
    Personal = 0,
    Elven = 1,
    Character = 2,
    Clan = 3,
}

/// Repository for warehouse operations.
pub struct WarehouseRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> WarehouseRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn load(&self, kind: WarehouseKind, owner: &str) -> Result<Vec<ItemRow>, DbError> {
        let rows = sqlx::query("SELECT * FROM warehouse WHERE kind = ? AND owner = ?")
            .bind(kind as u8 as i64)
            .bind(owner)
            .fetch_all(self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| ItemRow {
                obj_id: r.get::<i64, _>("obj_id") as u32,
                item_id: r.get::<i64, _>("item_id") as u32,
                count: r.get::<i64, _>("count") as u32,
                enchant: r.get::<i64, _>("enchant") as i32,
                identified: true,
                durability: 0,
            })
            .collect())
    }

    pub async fn insert(
        &self,
        kind: WarehouseKind,
        owner: &str,
        item: &ItemRow,
    ) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO warehouse (kind, owner, obj_id, item_id, count, enchant)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(kind as u8 as i64)
        .bind(owner)
        .bind(item.obj_id as i64)
        .bind(item.item_id as i64)
        .bind(item.count as i64)
        .bind(item.enchant as i64)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove(
        &self,
        kind: WarehouseKind,
        owner: &str,
        obj_id: u32,
    ) -> Result<(), DbError> {
        sqlx::query("DELETE FROM warehouse WHERE kind = ? AND owner = ? AND obj_id = ?")
            .bind(kind as u8 as i64)
            .bind(owner)
            .bind(obj_id as i64)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Row count for an owner; invariant checks compare this against the
    /// memory cache.
    pub async fn count(&self, kind: WarehouseKind, owner: &str) -> Result<u32, DbError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM warehouse WHERE kind = ? AND owner = ?")
            .bind(kind as u8 as i64)
            .bind(owner)
            .fetch_one(self.pool)
            .await?;
        Ok(n as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn deposit_withdraw_row_deltas() {
        let db = Database::new(":memory:").await.unwrap();
        let wh = db.warehouses();
        let item = ItemRow {
            obj_id: 900,
            item_id: 40308,
            count: 1000,
            enchant: 0,
            identified: true,
            durability: 0,
        };
        wh.insert(WarehouseKind::Personal, "acc", &item).await.unwrap();
        assert_eq!(wh.count(WarehouseKind::Personal, "acc").await.unwrap(), 1);
        // Kinds are isolated.
        assert_eq!(wh.count(WarehouseKind::Clan, "acc").await.unwrap(), 0);

        let rows = wh.load(WarehouseKind::Personal, "acc").await.unwrap();
        assert_eq!(rows[0].count, 1000);

        wh.remove(WarehouseKind::Personal, "acc", 900).await.unwrap();
        assert_eq!(wh.count(WarehouseKind::Personal, "acc").await.unwrap(), 0);
    }
}
