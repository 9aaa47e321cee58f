//! Inventory and equipment repository.
//!
//! Two writes with referential integrity between them: equipment rows
//! reference item object ids, so replacement always clears equipment
//! first and writes it last, inside one transaction.

use super::DbError;
use sqlx::{Row, SqlitePool};

/// One stored item row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRow {
    pub obj_id: u32,
    pub item_id: u32,
    pub count: u32,
    pub enchant: i32,
    pub identified: bool,
    pub durability: i32,
}

/// One stored equipment assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EquipmentRow {
    pub slot: u8,
    pub obj_id: u32,
}

/// Repository for inventory operations.
pub struct InventoryRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> InventoryRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Replace a character's items and equipment atomically.
    pub async fn replace(
        &self,
        char_id: u32,
        items: &[ItemRow],
        equipment: &[EquipmentRow],
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM equipment WHERE char_id = ?")
            .bind(char_id as i64)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM items WHERE char_id = ?")
            .bind(char_id as i64)
            .execute(&mut *tx)
            .await?;

        for item in items {
            sqlx::query(
                "INSERT INTO items (obj_id, char_id, item_id, count, enchant, identified, durability)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(item.obj_id as i64)
            .bind(char_id as i64)
            .bind(item.item_id as i64)
            .bind(item.count as i64)
            .bind(item.enchant as i64)
            .bind(item.identified)
            .bind(item.durability as i64)
            .execute(&mut *tx)
            .await?;
        }

        for eq in equipment {
            sqlx::query("INSERT INTO equipment (char_id, slot, obj_id) VALUES (?, ?, ?)")
                .bind(char_id as i64)
                .bind(eq.slot as i64)
                .bind(eq.obj_id as i64)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn load(&self, char_id: u32) -> Result<(Vec<ItemRow>, Vec<EquipmentRow>), DbError> {
        let rows = sqlx::query("SELECT * FROM items WHERE char_id = ?")
            .bind(char_id as i64)
            .fetch_all(self.pool)
            .await?;
        let items = rows
            .iter()
            .map(|r| ItemRow {
                obj_id: r.get::<i64, _>("obj_id") as u32,
                item_id: r.get::<i64, _>("item_id") as u32,
                count: r.get::<i64, _>("count") as u32,
                enchant: r.get::<i64, _>("enchant") as i32,
                identified: r.get::<bool, _>("identified"),
                durability: r.get::<i64, _>("durability") as i32,
            })
            .collect();

        let rows = sqlx::query("SELECT slot, obj_id FROM equipment WHERE char_id = ?")
            .bind(char_id as i64)
            .fetch_all(self.pool)
            .await?;
        let equipment = rows
            .iter()
            .map(|r| EquipmentRow {
                slot: r.get::<i64, _>("slot") as u8,
                obj_id: r.get::<i64, _>("obj_id") as u32,
            })
            .collect();

        Ok((items, equipment))
    }

    /// Largest stored item object id, so the allocator can resume above it.
    pub async fn max_obj_id(&self) -> Result<u32, DbError> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(obj_id) FROM items")
            .fetch_one(self.pool)
            .await?;
        Ok(max.unwrap_or(0) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn replace_and_load_keep_equipment_references() {
        let db = Database::new(":memory:").await.unwrap();
        let items = vec![
            ItemRow {
                obj_id: 10,
                item_id: 5,
                count: 1,
                enchant: 6,
                identified: true,
                durability: 0,
            },
            ItemRow {
                obj_id: 11,
                item_id: 40308,
                count: 500,
                enchant: 0,
                identified: true,
                durability: 0,
            },
        ];
        let equipment = vec![EquipmentRow { slot: 0, obj_id: 10 }];
        db.inventory().replace(1, &items, &equipment).await.unwrap();

        let (loaded_items, loaded_eq) = db.inventory().load(1).await.unwrap();
        assert_eq!(loaded_items.len(), 2);
        assert_eq!(loaded_eq, equipment);
        // Every equipment row must reference a loaded item.
        for eq in &loaded_eq {
            assert!(loaded_items.iter().any(|i| i.obj_id == eq.obj_id));
        }

        // Replacement drops the old set entirely.
        db.inventory().replace(1, &items[1..], &[]).await.unwrap();
        let (loaded_items, loaded_eq) = db.inventory().load(1).await.unwrap();
        assert_eq!(loaded_items.len(), 1);
        assert!(loaded_eq.is_empty());
    }
}
