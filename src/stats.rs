//! Database statistics overview.
//!
//! A quick summary of what's imported: row counts per table and embedding
//! coverage over foods. Used by `curb stats` to give confidence that imports
//! and the embedding backfill are working as expected.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let locations = count(&pool, "locations").await?;
    let trucks = count(&pool, "trucks").await?;
    let truck_locations = count(&pool, "trucks_locations").await?;
    let foods = count(&pool, "foods").await?;
    let truck_foods = count(&pool, "trucks_foods").await?;
    let schedules = count(&pool, "schedules").await?;

    let embedded: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM foods WHERE embedding IS NOT NULL")
            .fetch_one(&pool)
            .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Curbfare Database Stats");
    println!("=======================");
    println!();
    println!("  Database:        {}", config.db.path.display());
    println!("  Size:            {}", format_bytes(db_size));
    println!();
    println!("  Locations:       {}", locations);
    println!("  Trucks:          {}", trucks);
    println!("  Truck/location:  {}", truck_locations);
    println!("  Foods:           {}", foods);
    println!("  Truck/food:      {}", truck_foods);
    println!("  Schedules:       {}", schedules);
    println!(
        "  Embedded:        {} / {} ({}%)",
        embedded,
        foods,
        if foods > 0 { (embedded * 100) / foods } else { 0 }
    );
    println!();

    pool.close().await;
    Ok(())
}

async fn count(pool: &SqlitePool, table: &str) -> Result<i64> {
    let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await?;
    Ok(n)
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
