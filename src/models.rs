//! Core data types that flow through the ingestion and retrieval pipeline.
//!
//! The `*Record` structs mirror the column headers of the two DataSF CSV
//! feeds; the `*Match` structs form the nested truck → location → schedule
//! tree that retrieval hands to the answer synthesizer.

use serde::{Deserialize, Serialize};

/// One row of the mobile-food-permit feed (trucks, locations, menus).
#[derive(Debug, Clone, Deserialize)]
pub struct TruckRecord {
    #[serde(rename = "locationid")]
    pub location_id: String,
    #[serde(rename = "Applicant")]
    pub applicant: String,
    #[serde(rename = "FoodItems", default)]
    pub food_items: String,
    #[serde(rename = "Status", default)]
    pub status: String,
    #[serde(rename = "Address", default)]
    pub address: String,
    #[serde(rename = "LocationDescription", default)]
    pub location_description: String,
}

/// One row of the mobile-food-schedule feed.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleRecord {
    #[serde(rename = "Applicant")]
    pub applicant: String,
    #[serde(rename = "locationid")]
    pub location_id: String,
    #[serde(rename = "DayOrder")]
    pub day_order: i64,
    #[serde(rename = "DayOfWeekStr", default)]
    pub day_of_week: String,
    #[serde(rename = "start24", default)]
    pub start_time: String,
    #[serde(rename = "end24", default)]
    pub end_time: String,
}

/// A food row ranked by cosine similarity against the query embedding.
#[derive(Debug, Clone)]
pub struct FoodHit {
    pub id: i64,
    pub name: String,
    pub similarity: f32,
}

/// Root node of the retrieval result tree, unique by truck id.
#[derive(Debug, Clone, Serialize)]
pub struct TruckMatch {
    pub id: i64,
    pub name: String,
    pub food_items: String,
    pub locations: Vec<LocationMatch>,
}

/// Location node, unique by location id within its truck.
#[derive(Debug, Clone, Serialize)]
pub struct LocationMatch {
    pub id: i64,
    pub address: String,
    pub status: String,
    pub schedules: Vec<ScheduleMatch>,
}

/// Schedule node, unique by day-of-week label within its location.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleMatch {
    pub day_of_week: String,
    pub start_time: String,
    pub end_time: String,
}
