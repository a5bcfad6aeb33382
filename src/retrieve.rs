//! Hybrid retrieval: vector similarity over menu items fused with relational
//! expansion into a truck → location → schedule tree.
//!
//! The engine is read-only and stateless per call. Similarity ranking scans
//! the stored food vectors and keeps the top-K by cosine similarity; the
//! winners are expanded through the association tables, keeping only
//! APPROVED truck/location pairs, and folded into a nested result. Dedup at
//! every nesting level is by ordered map keyed on entity id (day-of-week
//! label at the schedule level), so correctness does not depend on the join
//! rows arriving in any particular order.

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

use crate::embedding::{self, EmbeddingProvider};
use crate::models::{FoodHit, LocationMatch, ScheduleMatch, TruckMatch};

/// Retrieval outcome. `NoMatches` is a valid terminal state, distinct from
/// an empty tree; callers must branch on it explicitly.
#[derive(Debug)]
pub enum Retrieval {
    Matches(Vec<TruckMatch>),
    NoMatches,
}

pub async fn retrieve(
    pool: &SqlitePool,
    provider: &dyn EmbeddingProvider,
    top_k: i64,
    query: &str,
) -> Result<Retrieval> {
    let query_vec = provider
        .embed(query)
        .await
        .with_context(|| format!("failed to generate embedding for query {:?}", query))?;

    let foods = rank_foods(pool, &query_vec, top_k).await?;
    if foods.is_empty() {
        return Ok(Retrieval::NoMatches);
    }

    let rows = expand_foods(pool, &foods).await?;
    let trucks = assemble(rows);

    if trucks.is_empty() {
        Ok(Retrieval::NoMatches)
    } else {
        Ok(Retrieval::Matches(trucks))
    }
}

/// Rank all embedded foods by cosine similarity against the query vector,
/// descending, and keep the top K. Rows without an embedding never match.
async fn rank_foods(pool: &SqlitePool, query_vec: &[f32], top_k: i64) -> Result<Vec<FoodHit>> {
    let rows = sqlx::query("SELECT id, name, embedding FROM foods WHERE embedding IS NOT NULL")
        .fetch_all(pool)
        .await
        .context("failed to load food embeddings")?;

    let mut hits: Vec<FoodHit> = rows
        .iter()
        .map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            let vec = embedding::blob_to_vec(&blob);
            FoodHit {
                id: row.get("id"),
                name: row.get("name"),
                similarity: embedding::cosine_similarity(query_vec, &vec),
            }
        })
        .collect();

    hits.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(top_k as usize);

    Ok(hits)
}

/// One flat row of the relational expansion join.
#[derive(Debug, Clone)]
pub struct JoinRow {
    pub truck_id: i64,
    pub truck_name: String,
    pub food_items: String,
    pub location_id: i64,
    pub address: String,
    pub status: String,
    pub day_of_week: String,
    pub start_time: String,
    pub end_time: String,
}

/// Expand the matched food ids through trucks_foods → trucks →
/// trucks_locations (APPROVED only) → locations → schedules.
async fn expand_foods(pool: &SqlitePool, foods: &[FoodHit]) -> Result<Vec<JoinRow>> {
    let placeholders = vec!["?"; foods.len()].join(", ");
    let sql = format!(
        r#"
        SELECT
            t.id AS truck_id,
            t.name AS truck_name,
            t.food_items AS food_items,
            l.id AS location_id,
            l.address AS address,
            tl.status AS status,
            s.day_of_week,
            s.start_time,
            s.end_time
        FROM trucks t
        INNER JOIN trucks_foods tf ON t.id = tf.truck_id
        INNER JOIN trucks_locations tl ON t.id = tl.truck_id AND UPPER(tl.status) = 'APPROVED'
        INNER JOIN locations l ON tl.location_id = l.id
        INNER JOIN schedules s ON t.id = s.truck_id AND tl.location_id = s.location_id
        WHERE tf.food_id IN ({})
        ORDER BY truck_id, location_id, s.day_of_week, s.start_time
        "#,
        placeholders
    );

    let mut query = sqlx::query(&sql);
    for food in foods {
        query = query.bind(food.id);
    }

    let rows = query
        .fetch_all(pool)
        .await
        .context("failed to expand food matches")?;

    Ok(rows
        .iter()
        .map(|row| JoinRow {
            truck_id: row.get("truck_id"),
            truck_name: row.get("truck_name"),
            food_items: row.get::<Option<String>, _>("food_items").unwrap_or_default(),
            location_id: row.get("location_id"),
            address: row.get::<Option<String>, _>("address").unwrap_or_default(),
            status: row.get::<Option<String>, _>("status").unwrap_or_default(),
            day_of_week: row.get::<Option<String>, _>("day_of_week").unwrap_or_default(),
            start_time: row.get::<Option<String>, _>("start_time").unwrap_or_default(),
            end_time: row.get::<Option<String>, _>("end_time").unwrap_or_default(),
        })
        .collect())
}

/// Fold flat join rows into the nested tree. Uniqueness is enforced with an
/// ordered map per nesting level: trucks by id, locations by id within their
/// truck, schedules by day-of-week label within their location. The first
/// row seen for a key wins; output order is ascending by key at every level.
pub fn assemble(rows: Vec<JoinRow>) -> Vec<TruckMatch> {
    struct TruckAcc {
        name: String,
        food_items: String,
        locations: BTreeMap<i64, LocationAcc>,
    }
    struct LocationAcc {
        address: String,
        status: String,
        schedules: BTreeMap<String, ScheduleMatch>,
    }

    let mut trucks: BTreeMap<i64, TruckAcc> = BTreeMap::new();

    for row in rows {
        let truck = trucks.entry(row.truck_id).or_insert_with(|| TruckAcc {
            name: row.truck_name.clone(),
            food_items: row.food_items.clone(),
            locations: BTreeMap::new(),
        });

        let location = truck
            .locations
            .entry(row.location_id)
            .or_insert_with(|| LocationAcc {
                address: row.address.clone(),
                status: row.status.clone(),
                schedules: BTreeMap::new(),
            });

        location
            .schedules
            .entry(row.day_of_week.clone())
            .or_insert(ScheduleMatch {
                day_of_week: row.day_of_week,
                start_time: row.start_time,
                end_time: row.end_time,
            });
    }

    trucks
        .into_iter()
        .map(|(truck_id, truck)| TruckMatch {
            id: truck_id,
            name: truck.name,
            food_items: truck.food_items,
            locations: truck
                .locations
                .into_iter()
                .map(|(location_id, location)| LocationMatch {
                    id: location_id,
                    address: location.address,
                    status: location.status,
                    schedules: location.schedules.into_values().collect(),
                })
                .collect(),
        })
        .collect()
}
