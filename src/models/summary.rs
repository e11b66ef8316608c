use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One grouped row per distinct work date within a hospital/department
/// scope. Derived by aggregation, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    pub work_date: String,
    /// Number of underlying slot records sharing this work date.
    pub slot_count: i64,
    /// Sum of reserved_number over the group.
    pub reserved_number: i64,
    /// Sum of available_number over the group.
    pub available_number: i64,
    /// Localized weekday label, stamped by the service after the store
    /// query (the store leaves it empty).
    #[sqlx(default)]
    pub day_of_week: String,
}

/// Paged summary result: the grouped rows, the total distinct group
/// count, and a side-channel map of contextual names (`hosname`).
#[derive(Debug, Clone, Serialize)]
pub struct SummaryPage {
    pub rows: Vec<DaySummary>,
    pub total: i64,
    pub context: HashMap<String, String>,
}

/// Page of the administrative listing plus its total count.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulePage {
    pub records: Vec<super::Schedule>,
    pub total: i64,
}
