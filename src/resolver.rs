//! Entity resolution: mapping raw feed values onto stable row identities.
//!
//! Every function here is an idempotent upsert keyed by a natural key;
//! external location id, case-insensitive truck or food name, or a
//! composite pair. Re-invoking with the same key updates mutable fields and
//! never mints a new identity. The resolver is the only writer in the crate;
//! retrieval is read-only.

use std::collections::HashMap;

use sqlx::{Row, SqlitePool};

use crate::error::ResolveError;

/// Food tokens at or beyond this length are junk (sentences, disclaimers)
/// and are rejected before they can hit the foods table.
pub const MAX_FOOD_NAME_LEN: usize = 32;

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Upsert a location keyed by its feed-supplied id.
pub async fn upsert_location(
    pool: &SqlitePool,
    id: i64,
    address: &str,
    description: &str,
) -> Result<(), ResolveError> {
    let now = now_ts();
    sqlx::query(
        r#"
        INSERT INTO locations (id, address, description, created_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            address = excluded.address,
            description = excluded.description,
            updated_at = excluded.created_at
        "#,
    )
    .bind(id)
    .bind(address)
    .bind(description)
    .bind(now)
    .execute(pool)
    .await
    .map_err(ResolveError::storage("location", id.to_string()))?;

    Ok(())
}

/// Upsert a truck by case-insensitive name, returning its id. A re-import of
/// an existing name refreshes the menu descriptor and keeps the id.
pub async fn upsert_truck(
    pool: &SqlitePool,
    name: &str,
    food_items: &str,
) -> Result<i64, ResolveError> {
    let now = now_ts();
    let row = sqlx::query(
        r#"
        INSERT INTO trucks (name, food_items, created_at)
        VALUES (?, ?, ?)
        ON CONFLICT(name) DO UPDATE SET
            food_items = excluded.food_items,
            updated_at = excluded.created_at
        RETURNING id
        "#,
    )
    .bind(name)
    .bind(food_items)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(ResolveError::storage("truck", name))?;

    Ok(row.get("id"))
}

/// Upsert a food by case-insensitive name, returning its id. The same food
/// name across many trucks is one row. Empty and overlong tokens are
/// rejected here as a last line of defense; the ingestion pass filters them
/// before calling.
pub async fn upsert_food(pool: &SqlitePool, name: &str) -> Result<i64, ResolveError> {
    if name.trim().is_empty() || name.chars().count() >= MAX_FOOD_NAME_LEN {
        return Err(ResolveError::InvalidFood(name.to_string()));
    }

    let now = now_ts();
    let row = sqlx::query(
        r#"
        INSERT INTO foods (name, created_at)
        VALUES (?, ?)
        ON CONFLICT(name) DO UPDATE SET
            updated_at = excluded.created_at
        RETURNING id
        "#,
    )
    .bind(name)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(ResolveError::storage("food", name))?;

    Ok(row.get("id"))
}

/// Associate a truck with a location. No-op if the pair already exists; the
/// status recorded on first sight wins.
pub async fn link_truck_location(
    pool: &SqlitePool,
    truck_id: i64,
    location_id: i64,
    status: &str,
) -> Result<(), ResolveError> {
    sqlx::query(
        r#"
        INSERT INTO trucks_locations (truck_id, location_id, status)
        VALUES (?, ?, ?)
        ON CONFLICT(truck_id, location_id) DO NOTHING
        "#,
    )
    .bind(truck_id)
    .bind(location_id)
    .bind(status)
    .execute(pool)
    .await
    .map_err(ResolveError::storage(
        "truck_location",
        format!("{}/{}", truck_id, location_id),
    ))?;

    Ok(())
}

/// Associate a truck with a food. No-op if the pair already exists.
pub async fn link_truck_food(
    pool: &SqlitePool,
    truck_id: i64,
    food_id: i64,
) -> Result<(), ResolveError> {
    sqlx::query(
        r#"
        INSERT INTO trucks_foods (truck_id, food_id)
        VALUES (?, ?)
        ON CONFLICT(truck_id, food_id) DO NOTHING
        "#,
    )
    .bind(truck_id)
    .bind(food_id)
    .execute(pool)
    .await
    .map_err(ResolveError::storage(
        "truck_food",
        format!("{}/{}", truck_id, food_id),
    ))?;

    Ok(())
}

/// Upsert a schedule entry keyed by (truck, location, day ordinal).
/// Re-import updates the day label and times.
pub async fn upsert_schedule(
    pool: &SqlitePool,
    truck_id: i64,
    location_id: i64,
    day_order: i64,
    day_of_week: &str,
    start_time: &str,
    end_time: &str,
) -> Result<(), ResolveError> {
    let now = now_ts();
    sqlx::query(
        r#"
        INSERT INTO schedules (truck_id, location_id, day_order, day_of_week, start_time, end_time, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(truck_id, location_id, day_order) DO UPDATE SET
            day_of_week = excluded.day_of_week,
            start_time = excluded.start_time,
            end_time = excluded.end_time,
            updated_at = excluded.created_at
        "#,
    )
    .bind(truck_id)
    .bind(location_id)
    .bind(day_order)
    .bind(day_of_week)
    .bind(start_time)
    .bind(end_time)
    .bind(now)
    .execute(pool)
    .await
    .map_err(ResolveError::storage(
        "schedule",
        format!("{}/{}/{}", truck_id, location_id, day_order),
    ))?;

    Ok(())
}

/// Build the truck name → id lookup table used by the foods and schedules
/// passes. Keys are lowercased so lookups match the NOCASE uniqueness of the
/// trucks table.
pub async fn trucks_by_name(pool: &SqlitePool) -> Result<HashMap<String, i64>, sqlx::Error> {
    let rows = sqlx::query("SELECT id, name FROM trucks ORDER BY name")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let name: String = row.get("name");
            let id: i64 = row.get("id");
            (name.to_lowercase(), id)
        })
        .collect())
}
