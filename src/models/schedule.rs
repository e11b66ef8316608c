use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One bookable time-slot offering for a department on a work date,
/// as pushed by an external hospital system.
///
/// `(hoscode, hos_schedule_id)` is the natural key used for upsert and
/// withdrawal; `id` is the surrogate assigned on first insert.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub hoscode: String,
    pub hos_schedule_id: String,
    pub depcode: String,
    pub work_date: String,
    pub reserved_number: i64,
    pub available_number: i64,
    pub status: i64,
    pub is_deleted: bool,
    pub create_time: String,
    pub update_time: String,
}

/// Validated ingestion payload, coerced from the loose key/value map
/// the hospital systems submit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSchedule {
    pub hoscode: String,
    pub hos_schedule_id: String,
    pub depcode: String,
    pub work_date: String,
    pub reserved_number: i64,
    pub available_number: i64,
}

/// Sparse filter template for the administrative listing. Non-empty
/// fields match by case-insensitive substring.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleFilter {
    pub hoscode: Option<String>,
    pub depcode: Option<String>,
    pub work_date: Option<String>,
}

/// A schedule row decorated with read-time display fields. The `extra`
/// map (`hosname`, `depname`, `dayOfWeek`) is computed per query and
/// never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleDetail {
    #[serde(flatten)]
    pub schedule: Schedule,
    pub extra: HashMap<String, String>,
}
