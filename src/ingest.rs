//! Ingestion pipeline: four ordered passes over the two CSV feeds.
//!
//! Pass order is a correctness invariant, not a preference: locations first
//! (trucks link to them), then trucks, and only then foods and schedules,
//! both of which need the truck name → id table that pass 2 populates.
//! Every write is an idempotent upsert, so a failed run can simply be
//! re-run from the top. A single bad record aborts its pass with the
//! offending natural key, with no silent partial success.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::collections::HashSet;

use crate::config::Config;
use crate::db;
use crate::error::ResolveError;
use crate::feed;
use crate::models::{ScheduleRecord, TruckRecord};
use crate::resolver;

#[derive(Debug)]
pub struct ImportStats {
    pub locations: u64,
    pub trucks: u64,
    pub foods: u64,
    pub food_links: u64,
    pub schedules: u64,
}

pub async fn run_import(
    config: &Config,
    trucks_override: Option<String>,
    schedules_override: Option<String>,
) -> Result<()> {
    let trucks_source = trucks_override.unwrap_or_else(|| config.sources.trucks.clone());
    let schedules_source = schedules_override.unwrap_or_else(|| config.sources.schedules.clone());
    let timeout = config.sources.fetch_timeout_secs;

    println!("fetching feeds...");
    let trucks_csv = feed::fetch("trucks", &trucks_source, timeout).await?;
    let schedules_csv = feed::fetch("schedules", &schedules_source, timeout).await?;

    let pool = db::connect(config).await?;
    let stats = import_all(&pool, &trucks_csv, &schedules_csv).await?;
    pool.close().await;

    println!("import");
    println!("  locations upserted: {}", stats.locations);
    println!("  trucks upserted: {}", stats.trucks);
    println!("  foods upserted: {}", stats.foods);
    println!("  food links upserted: {}", stats.food_links);
    println!("  schedules upserted: {}", stats.schedules);
    println!("ok");

    Ok(())
}

/// Run all four passes against an open pool. Exposed separately so tests can
/// drive an in-memory database.
pub async fn import_all(
    pool: &SqlitePool,
    trucks_csv: &str,
    schedules_csv: &str,
) -> Result<ImportStats> {
    println!("importing locations...");
    let locations = import_locations(pool, trucks_csv).await?;

    println!("importing trucks...");
    let trucks = import_trucks(pool, trucks_csv).await?;

    println!("importing foods...");
    let (foods, food_links) = import_foods(pool, trucks_csv).await?;

    println!("importing schedules...");
    let schedules = import_schedules(pool, schedules_csv).await?;

    Ok(ImportStats {
        locations,
        trucks,
        foods,
        food_links,
        schedules,
    })
}

fn reader(data: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(data.as_bytes())
}

/// Pass 1: upsert a location per record, keyed by the feed's external id.
async fn import_locations(pool: &SqlitePool, data: &str) -> Result<u64> {
    let mut count = 0u64;
    for record in reader(data).deserialize::<TruckRecord>() {
        let record = record.context("failed to parse trucks feed record")?;
        let location_id = parse_location_id(&record.location_id)
            .with_context(|| format!("failed to import location {:?}", record.location_id))?;

        resolver::upsert_location(pool, location_id, &record.address, &record.location_description)
            .await
            .context("failed to import locations")?;
        count += 1;
    }
    Ok(count)
}

/// Pass 2: upsert each truck by name, then link it to the record's location
/// with the record's permit status.
async fn import_trucks(pool: &SqlitePool, data: &str) -> Result<u64> {
    let mut count = 0u64;
    for record in reader(data).deserialize::<TruckRecord>() {
        let record = record.context("failed to parse trucks feed record")?;
        let location_id = parse_location_id(&record.location_id)
            .with_context(|| format!("failed to import truck {:?}", record.applicant))?;

        let truck_id = resolver::upsert_truck(pool, &record.applicant, &record.food_items)
            .await
            .context("failed to import trucks")?;
        resolver::link_truck_location(pool, truck_id, location_id, &record.status)
            .await
            .context("failed to import trucks")?;
        count += 1;
    }
    Ok(count)
}

/// Pass 3: split each record's menu descriptor into food tokens, upsert the
/// survivors, and link them to the truck. Requires the truck table from
/// pass 2. Returns distinct foods touched and link upserts; the same food on
/// several trucks counts once but links once per truck.
async fn import_foods(pool: &SqlitePool, data: &str) -> Result<(u64, u64)> {
    let trucks = resolver::trucks_by_name(pool)
        .await
        .context("failed to retrieve trucks")?;

    let mut food_ids = HashSet::new();
    let mut links = 0u64;
    for record in reader(data).deserialize::<TruckRecord>() {
        let record = record.context("failed to parse trucks feed record")?;
        let truck_id = *trucks
            .get(&record.applicant.to_lowercase())
            .ok_or(ResolveError::UnknownTruck(record.applicant.clone()))?;

        for item in split_food_items(&record.food_items) {
            let food_id = resolver::upsert_food(pool, item)
                .await
                .with_context(|| format!("failed to import food {:?}", item))?;
            resolver::link_truck_food(pool, truck_id, food_id)
                .await
                .with_context(|| format!("failed to import food {:?}", item))?;
            food_ids.insert(food_id);
            links += 1;
        }
    }
    Ok((food_ids.len() as u64, links))
}

/// Pass 4: upsert schedules keyed by (truck, location, day ordinal).
/// Requires the truck table from pass 2; a schedules record naming a truck
/// the trucks feed never declared is an error, not a skip.
async fn import_schedules(pool: &SqlitePool, data: &str) -> Result<u64> {
    let trucks = resolver::trucks_by_name(pool)
        .await
        .context("failed to retrieve trucks")?;

    let mut count = 0u64;
    for record in reader(data).deserialize::<ScheduleRecord>() {
        let record = record.context("failed to parse schedules feed record")?;
        let truck_id = *trucks
            .get(&record.applicant.to_lowercase())
            .ok_or(ResolveError::UnknownTruck(record.applicant.clone()))?;
        let location_id = parse_location_id(&record.location_id)
            .with_context(|| format!("failed to import schedule for {:?}", record.applicant))?;

        resolver::upsert_schedule(
            pool,
            truck_id,
            location_id,
            record.day_order,
            &record.day_of_week,
            &record.start_time,
            &record.end_time,
        )
        .await
        .context("failed to import schedules")?;
        count += 1;
    }
    Ok(count)
}

fn parse_location_id(raw: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .with_context(|| format!("invalid location id: {:?}", raw))
}

/// Split a menu descriptor on `:`, trimming whitespace and dropping empty
/// and overlong tokens.
///
/// Example descriptor:
/// `Burgers: melts: hot dogs: burritos:sandwiches: fries: onion rings: drinks`
pub fn split_food_items(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(':')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter(|item| item.chars().count() < resolver::MAX_FOOD_NAME_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    const TRUCKS_CSV: &str = "\
locationid,Applicant,FoodItems,Status,Address,LocationDescription
1,Bob's Burgers,Burgers: melts: fries,APPROVED,1 Market St,NE corner
2,bob's burgers,Burgers: shakes,APPROVED,2 Mission St,SW corner
3,Taco Cart,Tacos: : ThisTokenIsDefinitelyLongerThanThirtyTwoCharacters:Burritos,REQUESTED,3 Valencia St,
";

    const SCHEDULES_CSV: &str = "\
Applicant,locationid,DayOrder,DayOfWeekStr,start24,end24
Bob's Burgers,1,1,Monday,10:00,14:00
Bob's Burgers,1,2,Tuesday,10:00,14:00
Taco Cart,3,1,Monday,11:00,15:00
";

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::migrate::apply_schema(&pool).await.unwrap();
        pool
    }

    async fn table_count(pool: &SqlitePool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[test]
    fn test_split_food_items_filters_tokens() {
        let raw = "Tacos: : ThisTokenIsDefinitelyLongerThanThirtyTwoCharacters:Burritos";
        let items: Vec<&str> = split_food_items(raw).collect();
        assert_eq!(items, vec!["Tacos", "Burritos"]);
    }

    #[test]
    fn test_split_food_items_length_limit_counts_chars() {
        // 29 characters but 33 bytes; accented names must survive the limit
        let multibyte = "Crêpes sucrées à la française";
        assert!(multibyte.len() >= 32 && multibyte.chars().count() < 32);

        let raw = format!("Tacos:{}", multibyte);
        let items: Vec<&str> = split_food_items(&raw).collect();
        assert_eq!(items, vec!["Tacos", multibyte]);
    }

    #[test]
    fn test_split_food_items_trims_whitespace() {
        let items: Vec<&str> = split_food_items("Burgers: melts : hot dogs ").collect();
        assert_eq!(items, vec!["Burgers", "melts", "hot dogs"]);
    }

    #[tokio::test]
    async fn test_import_resolves_case_insensitive_trucks() {
        let pool = test_pool().await;
        import_all(&pool, TRUCKS_CSV, SCHEDULES_CSV).await.unwrap();

        // "Bob's Burgers" and "bob's burgers" are one truck
        assert_eq!(table_count(&pool, "trucks").await, 2);
        assert_eq!(table_count(&pool, "locations").await, 3);
    }

    #[tokio::test]
    async fn test_import_filters_food_tokens() {
        let pool = test_pool().await;
        import_all(&pool, TRUCKS_CSV, SCHEDULES_CSV).await.unwrap();

        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM foods WHERE name IN ('Tacos', 'Burritos') ORDER BY name")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(names, vec!["Burritos".to_string(), "Tacos".to_string()]);

        let overlong: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM foods WHERE LENGTH(name) >= 32")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(overlong, 0);
    }

    #[tokio::test]
    async fn test_double_import_is_idempotent() {
        let pool = test_pool().await;
        import_all(&pool, TRUCKS_CSV, SCHEDULES_CSV).await.unwrap();

        let before: Vec<i64> = {
            let mut counts = Vec::new();
            for table in [
                "locations",
                "trucks",
                "trucks_locations",
                "foods",
                "trucks_foods",
                "schedules",
            ] {
                counts.push(table_count(&pool, table).await);
            }
            counts
        };

        import_all(&pool, TRUCKS_CSV, SCHEDULES_CSV).await.unwrap();

        for (i, table) in [
            "locations",
            "trucks",
            "trucks_locations",
            "foods",
            "trucks_foods",
            "schedules",
        ]
        .iter()
        .enumerate()
        {
            assert_eq!(
                table_count(&pool, table).await,
                before[i],
                "table {} gained rows on re-import",
                table
            );
        }
    }

    #[tokio::test]
    async fn test_import_stats_count_distinct_foods_but_all_links() {
        let pool = test_pool().await;
        let trucks = "\
locationid,Applicant,FoodItems,Status,Address,LocationDescription
1,Truck A,Tacos: Salsa,APPROVED,1 Market St,
2,Truck B,Tacos,APPROVED,2 Mission St,
";
        let schedules = "Applicant,locationid,DayOrder,DayOfWeekStr,start24,end24\n";

        let stats = import_all(&pool, trucks, schedules).await.unwrap();
        // Tacos is shared: one food row, two links
        assert_eq!(stats.foods, 2);
        assert_eq!(stats.food_links, 3);
    }

    #[tokio::test]
    async fn test_schedule_for_unknown_truck_aborts_pass() {
        let pool = test_pool().await;
        let schedules = "\
Applicant,locationid,DayOrder,DayOfWeekStr,start24,end24
Nobody's Truck,1,1,Monday,10:00,14:00
";
        let err = import_all(&pool, TRUCKS_CSV, schedules).await.unwrap_err();
        assert!(err.to_string().contains("Nobody's Truck"));
    }

    #[tokio::test]
    async fn test_malformed_location_id_aborts_pass() {
        let pool = test_pool().await;
        let trucks = "\
locationid,Applicant,FoodItems,Status,Address,LocationDescription
not-a-number,Bad Truck,Tacos,APPROVED,1 Market St,
";
        let err = import_all(&pool, trucks, SCHEDULES_CSV).await.unwrap_err();
        assert!(format!("{:#}", err).contains("not-a-number"));
    }
}
