//! Database module for persistent storage.
//!
//! Provides async SQLite database access using SQLx for:
//! - Character rows, inventory and equipment (two writes with referential
//!   integrity between them)
//! - Active buffs, known spells, bookmarks, map timers
//! - Pets keyed by collar object id
//! - Warehouses (personal, elven, character, clan)
//! - Clans and member rows
//! - The economic write-ahead log

mod buffs;
mod characters;
mod clans;
mod inventory;
mod pets;
mod wal;
mod warehouse;

pub use buffs::{BuffRepository, BuffRow};
pub use characters::{CharacterRepository, CharacterRow};
pub use clans::{ClanMemberRow, ClanRepository, ClanRow};
pub use inventory::{EquipmentRow, InventoryRepository, ItemRow};
pub use pets::{PetRepository, PetRow};
pub use wal::{WalEntry, WalRepository, WalRow};
pub use warehouse::{WarehouseKind, WarehouseRepository};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("character not found: {0}")]
    CharacterNotFound(u32),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Database handle with connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connection acquire timeout - prevents connection storms from blocking indefinitely.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum time a connection can remain idle before being closed.
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Create a new database connection, running migrations if needed.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let pool = if path == ":memory:" {
            // In-memory database with shared cache for pool compatibility.
            let options = SqliteConnectOptions::new()
                .filename("file::memory:")
                .shared_cache(true)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        tracing::warn!(path = %parent.display(), error = %e, "Failed to create database directory");
                    }
                }
            }

            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        };

        info!(path = %path, "Database connected");

        Self::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    /// Get reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run embedded migrations.
    /// Checks for each table and runs the full migration if any are missing.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
        async fn table_exists(pool: &SqlitePool, table: &str) -> bool {
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?)",
            )
            .bind(table)
            .fetch_one(pool)
            .await
            .unwrap_or(false)
        }

        let core_tables = [
            "characters",
            "known_spells",
            "items",
            "equipment",
            "buffs",
            "pets",
            "warehouse",
            "clans",
            "clan_members",
            "wal",
            "map_timers",
        ];
        let mut core_ok = true;
        for t in core_tables {
            if !table_exists(pool, t).await {
                core_ok = false;
                break;
            }
        }

        if core_ok {
            info!("Database already initialized");
        } else {
            Self::run_migration_file(pool, include_str!("../../migrations/001_init.sql")).await;
            info!("Database migrations applied (001_init)");
        }

        Ok(())
    }

    /// Run a single migration file, executing each statement.
    async fn run_migration_file(pool: &SqlitePool, migration: &str) {
        for statement in migration.split(';') {
            let mut sql_lines: Vec<&str> = Vec::new();
            for line in statement.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with("--") {
                    continue;
                }
                sql_lines.push(line);
            }

            if sql_lines.is_empty() {
                continue;
            }

            let sql = sql_lines.join(" ");
            if let Err(e) = sqlx::query(&sql).execute(pool).await {
                tracing::warn!(error = %e, sql = %sql, "Migration statement failed");
            }
        }
    }

    pub fn characters(&self) -> CharacterRepository<'_> {
        CharacterRepository::new(&self.pool)
    }

    pub fn inventory(&self) -> InventoryRepository<'_> {
        InventoryRepository::new(&self.pool)
    }

    pub fn buffs(&self) -> BuffRepository<'_> {
        BuffRepository::new(&self.pool)
    }

    pub fn pets(&self) -> PetRepository<'_> {
        PetRepository::new(&self.pool)
    }

    pub fn warehouses(&self) -> WarehouseRepository<'_> {
        WarehouseRepository::new(&self.pool)
    }

    pub fn clans(&self) -> ClanRepository<'_> {
        ClanRepository::new(&self.pool)
    }

    pub fn wal(&self) -> WalRepository<'_> {
        WalRepository::new(&self.pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = Database::new(":memory:").await.unwrap();
        // Running again against the live pool must not fail.
        Database::run_migrations(db.pool()).await.unwrap();
    }

    #[tokio::test]
    async fn file_backed_database_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/world.db");
        let db = Database::new(path.to_str().unwrap()).await.unwrap();
        sqlx::query("SELECT COUNT(*) FROM characters")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert!(path.exists());
    }
}
