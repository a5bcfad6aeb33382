//! Schema creation for the six curbfare tables.
//!
//! All statements are `IF NOT EXISTS`, so `curb init` is idempotent. Truck
//! and food names carry a NOCASE collation on their unique index: two feed
//! records differing only in case resolve to the same row.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes on an already-open pool. Split out from
/// [`run_migrations`] so tests can run against an in-memory database.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Location ids come from the feed, not AUTOINCREMENT.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS locations (
            id INTEGER PRIMARY KEY,
            address TEXT,
            description TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER
        )
        "#,
    )
    .execute(pool)
    .await
    .context("failed to create locations table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trucks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL COLLATE NOCASE UNIQUE,
            food_items TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER
        )
        "#,
    )
    .execute(pool)
    .await
    .context("failed to create trucks table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trucks_locations (
            truck_id INTEGER NOT NULL REFERENCES trucks(id),
            location_id INTEGER NOT NULL REFERENCES locations(id),
            status TEXT,
            UNIQUE(truck_id, location_id)
        )
        "#,
    )
    .execute(pool)
    .await
    .context("failed to create trucks_locations table")?;

    // The embedding column stays NULL until the backfill pass fills it with
    // little-endian f32 bytes.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS foods (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL COLLATE NOCASE UNIQUE,
            embedding BLOB DEFAULT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER
        )
        "#,
    )
    .execute(pool)
    .await
    .context("failed to create foods table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trucks_foods (
            truck_id INTEGER NOT NULL REFERENCES trucks(id),
            food_id INTEGER NOT NULL REFERENCES foods(id),
            UNIQUE(truck_id, food_id)
        )
        "#,
    )
    .execute(pool)
    .await
    .context("failed to create trucks_foods table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schedules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            truck_id INTEGER NOT NULL REFERENCES trucks(id),
            location_id INTEGER NOT NULL REFERENCES locations(id),
            day_order INTEGER,
            day_of_week TEXT,
            start_time TEXT,
            end_time TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER,
            UNIQUE(truck_id, location_id, day_order)
        )
        "#,
    )
    .execute(pool)
    .await
    .context("failed to create schedules table")?;

    // Secondary indexes on the join and filter columns
    for stmt in [
        "CREATE INDEX IF NOT EXISTS idx_trucks_locations_truck_id ON trucks_locations(truck_id)",
        "CREATE INDEX IF NOT EXISTS idx_trucks_locations_location_id ON trucks_locations(location_id)",
        "CREATE INDEX IF NOT EXISTS idx_trucks_locations_status ON trucks_locations(status)",
        "CREATE INDEX IF NOT EXISTS idx_trucks_foods_truck_id ON trucks_foods(truck_id)",
        "CREATE INDEX IF NOT EXISTS idx_trucks_foods_food_id ON trucks_foods(food_id)",
        "CREATE INDEX IF NOT EXISTS idx_schedules_truck_id ON schedules(truck_id)",
        "CREATE INDEX IF NOT EXISTS idx_schedules_location_id ON schedules(location_id)",
    ] {
        sqlx::query(stmt)
            .execute(pool)
            .await
            .context("failed to create index")?;
    }

    Ok(())
}
