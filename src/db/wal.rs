//! The economic write-ahead log.
//!
//! Flows are written *before* their memory effects become visible to a
//! commit. Crash recovery scans unprocessed entries and replays their
//! memory effects; the persistence cycle marks entries processed once the
//! involved players have been saved.

use super::DbError;
use sqlx::{Row, SqlitePool};

/// One flow to record: an item or gold moving between characters.
#[derive(Debug, Clone)]
pub struct WalEntry {
    /// Transaction family: "trade", "warehouse", "kill".
    pub tx_type: &'static str,
    pub from_char: u32,
    pub to_char: u32,
    pub item_id: u32,
    pub count: u32,
    pub enchant: i32,
    pub gold: u32,
}

/// A stored WAL row.
#[derive(Debug, Clone)]
pub struct WalRow {
    pub id: i64,
    pub tx_type: String,
    pub from_char: u32,
    pub to_char: u32,
    pub item_id: u32,
    pub count: u32,
    pub enchant: i32,
    pub gold: u32,
}

/// Repository for WAL operations.
pub struct WalRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> WalRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Write a batch of entries in one transaction. Returns the highest
    /// row id written; a failure writes nothing.
    pub async fn write(&self, entries: &[WalEntry]) -> Result<i64, DbError> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        let mut last_id = 0i64;
        for e in entries {
            let result = sqlx::query(
                r#"
                INSERT INTO wal (tx_type, from_char, to_char, item_id, count, enchant, gold, created_at, processed)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0)
                "#,
            )
            .bind(e.tx_type)
            .bind(e.from_char as i64)
            .bind(e.to_char as i64)
            .bind(e.item_id as i64)
            .bind(e.count as i64)
            .bind(e.enchant as i64)
            .bind(e.gold as i64)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            last_id = result.last_insert_rowid();
        }
        tx.commit().await?;
        crate::metrics::WAL_WRITES.inc();
        Ok(last_id)
    }

    /// Mark every entry up to and including `high_water` as processed.
    pub async fn mark_processed(&self, high_water: i64) -> Result<(), DbError> {
        sqlx::query("UPDATE wal SET processed = 1 WHERE id <= ? AND processed = 0")
            .bind(high_water)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Unprocessed entries in write order, for crash recovery.
    pub async fn load_unprocessed(&self) -> Result<Vec<WalRow>, DbError> {
        let rows = sqlx::query("SELECT * FROM wal WHERE processed = 0 ORDER BY id")
            .fetch_all(self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| WalRow {
                id: r.get::<i64, _>("id"),
                tx_type: r.get("tx_type"),
                from_char: r.get::<i64, _>("from_char") as u32,
                to_char: r.get::<i64, _>("to_char") as u32,
                item_id: r.get::<i64, _>("item_id") as u32,
                count: r.get::<i64, _>("count") as u32,
                enchant: r.get::<i64, _>("enchant") as i32,
                gold: r.get::<i64, _>("gold") as u32,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn write_then_mark_processed() {
        let db = Database::new(":memory:").await.unwrap();
        let wal = db.wal();
        let high = wal
            .write(&[
                WalEntry {
                    tx_type: "trade",
                    from_char: 1,
                    to_char: 2,
                    item_id: 5,
                    count: 1,
                    enchant: 0,
                    gold: 0,
                },
                WalEntry {
                    tx_type: "trade",
                    from_char: 2,
                    to_char: 1,
                    item_id: 0,
                    count: 0,
                    enchant: 0,
                    gold: 10000,
                },
            ])
            .await
            .unwrap();

        assert_eq!(wal.load_unprocessed().await.unwrap().len(), 2);
        wal.mark_processed(high).await.unwrap();
        assert!(wal.load_unprocessed().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unprocessed_preserves_write_order() {
        let db = Database::new(":memory:").await.unwrap();
        let wal = db.wal();
        for i in 0..3u32 {
            wal.write(&[WalEntry {
                tx_type: "warehouse",
                from_char: i,
                to_char: 0,
                item_id: 0,
                count: 0,
                enchant: 0,
                gold: 100,
            }])
            .await
            .unwrap();
        }
        let rows = wal.load_unprocessed().await.unwrap();
        let order: Vec<u32> = rows.iter().map(|r| r.from_char).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }
}
