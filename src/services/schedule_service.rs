use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::db::repository;
use crate::error::AppError;
use crate::models::{NewSchedule, ScheduleDetail, ScheduleFilter, SchedulePage, SummaryPage};
use crate::naming::{NameResolver, ResolveError, UNKNOWN_NAME};
use crate::services::calendar::{self, DEFAULT_WEEKDAY_LABELS};

/// Orchestrates schedule ingestion and the two query shapes, owning the
/// enrichment and weekday policies.
pub struct ScheduleService {
    db: SqlitePool,
    resolver: Arc<dyn NameResolver>,
}

impl ScheduleService {
    pub fn new(db: SqlitePool, resolver: Arc<dyn NameResolver>) -> Self {
        Self { db, resolver }
    }

    /// Coerces one loosely-typed payload from an external hospital system
    /// and upserts it by natural key. Unknown keys are ignored; missing or
    /// untypeable required keys are rejected before any store mutation.
    pub async fn ingest(&self, payload: &Map<String, Value>) -> Result<(), AppError> {
        let new = coerce_payload(payload)?;
        let schedule = repository::upsert_schedule(&self.db, &new).await?;
        debug!(
            "ingested schedule {}/{} for {} {}",
            schedule.hoscode, schedule.hos_schedule_id, schedule.depcode, schedule.work_date
        );
        Ok(())
    }

    /// Removes a schedule by natural key. Withdrawing an absent key is a
    /// successful no-op.
    pub async fn withdraw(&self, hoscode: &str, hos_schedule_id: &str) -> Result<(), AppError> {
        let removed = repository::delete_schedule(&self.db, hoscode, hos_schedule_id).await?;
        if removed {
            info!("withdrew schedule {}/{}", hoscode, hos_schedule_id);
        } else {
            debug!("withdraw {}/{}: nothing to remove", hoscode, hos_schedule_id);
        }
        Ok(())
    }

    /// Paged, grouped summary of bookable days for one hospital/department
    /// scope. `page` is 1-based at this boundary.
    pub async fn summary(
        &self,
        hoscode: &str,
        depcode: &str,
        page: i64,
        limit: i64,
    ) -> Result<SummaryPage, AppError> {
        validate_page(page, limit)?;
        let offset = (page - 1) * limit;

        let (mut rows, total) =
            repository::group_by_work_date(&self.db, hoscode, depcode, offset, limit).await?;

        for row in &mut rows {
            row.day_of_week = calendar::day_of_week_label(&row.work_date, &DEFAULT_WEEKDAY_LABELS);
        }

        let hosname = self.hospital_name_or_sentinel(hoscode).await;
        let mut context = HashMap::new();
        context.insert("hosname".to_string(), hosname);

        Ok(SummaryPage { rows, total, context })
    }

    /// Full slot detail for one day, each record decorated with hospital
    /// name, department name and weekday label. An empty list is a valid
    /// result.
    pub async fn detail(
        &self,
        hoscode: &str,
        depcode: &str,
        work_date: &str,
    ) -> Result<Vec<ScheduleDetail>, AppError> {
        let records = repository::find_by_scope(&self.db, hoscode, depcode, work_date).await?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        // One scope shares one hospital and one department, so the two
        // lookups are issued once, concurrently, and fanned out per row.
        let (hosname, depname) = tokio::join!(
            self.hospital_name_or_sentinel(hoscode),
            self.department_name_or_sentinel(hoscode, depcode),
        );
        let day_of_week = calendar::day_of_week_label(work_date, &DEFAULT_WEEKDAY_LABELS);

        let details = records
            .into_iter()
            .map(|schedule| {
                let mut extra = HashMap::new();
                extra.insert("hosname".to_string(), hosname.clone());
                extra.insert("depname".to_string(), depname.clone());
                extra.insert("dayOfWeek".to_string(), day_of_week.clone());
                ScheduleDetail { schedule, extra }
            })
            .collect();
        Ok(details)
    }

    /// Administrative listing over a sparse filter template. `page` is
    /// 1-based at this boundary.
    pub async fn page(
        &self,
        page: i64,
        limit: i64,
        filter: &ScheduleFilter,
    ) -> Result<SchedulePage, AppError> {
        validate_page(page, limit)?;
        let offset = (page - 1) * limit;
        let (records, total) = repository::page_schedules(&self.db, offset, limit, filter).await?;
        Ok(SchedulePage { records, total })
    }

    async fn hospital_name_or_sentinel(&self, hoscode: &str) -> String {
        match self.resolver.resolve_hospital_name(hoscode).await {
            Ok(name) => name,
            Err(e) => {
                log_degradation("hospital", hoscode, &e);
                UNKNOWN_NAME.to_string()
            }
        }
    }

    async fn department_name_or_sentinel(&self, hoscode: &str, depcode: &str) -> String {
        match self.resolver.resolve_department_name(hoscode, depcode).await {
            Ok(name) => name,
            Err(e) => {
                log_degradation("department", &format!("{}/{}", hoscode, depcode), &e);
                UNKNOWN_NAME.to_string()
            }
        }
    }
}

fn log_degradation(kind: &str, key: &str, err: &ResolveError) {
    match err {
        ResolveError::NotFound => debug!("{} name for {} not found", kind, key),
        ResolveError::Transport(msg) => {
            warn!("degraded {} name for {}: {}", kind, key, msg)
        }
    }
}

fn validate_page(page: i64, limit: i64) -> Result<(), AppError> {
    if page <= 0 {
        return Err(AppError::InvalidPage(format!("page must be positive, got {}", page)));
    }
    if limit <= 0 {
        return Err(AppError::InvalidPage(format!("limit must be positive, got {}", limit)));
    }
    Ok(())
}

fn coerce_payload(payload: &Map<String, Value>) -> Result<NewSchedule, AppError> {
    let work_date = require_string(payload, "workDate")?;
    if !calendar::is_valid_work_date(&work_date) {
        return Err(AppError::MalformedPayload(format!(
            "workDate is not a calendar date: {}",
            work_date
        )));
    }

    Ok(NewSchedule {
        hoscode: require_string(payload, "hoscode")?,
        hos_schedule_id: require_string(payload, "hosScheduleId")?,
        depcode: require_string(payload, "depcode")?,
        work_date,
        reserved_number: require_integer(payload, "reservedNumber")?,
        available_number: require_integer(payload, "availableNumber")?,
    })
}

fn require_string(payload: &Map<String, Value>, key: &str) -> Result<String, AppError> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::MalformedPayload(format!("missing or invalid field: {}", key)))
}

/// Accepts JSON numbers and numeric strings; the external systems are
/// not consistent about which they send.
fn require_integer(payload: &Map<String, Value>, key: &str) -> Result<i64, AppError> {
    let value = payload
        .get(key)
        .ok_or_else(|| AppError::MalformedPayload(format!("missing field: {}", key)))?;
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| AppError::MalformedPayload(format!("field is not an integer: {}", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        value.as_object().expect("payload must be an object").clone()
    }

    #[test]
    fn test_coerce_payload_accepts_numeric_strings() {
        let payload = as_map(json!({
            "hoscode": "H1",
            "hosScheduleId": "S1",
            "depcode": "D1",
            "workDate": "2024-01-01",
            "reservedNumber": "10",
            "availableNumber": 5,
            "somethingElse": true,
        }));

        let new = coerce_payload(&payload).expect("payload should coerce");
        assert_eq!(new.reserved_number, 10);
        assert_eq!(new.available_number, 5);
        assert_eq!(new.work_date, "2024-01-01");
    }

    #[test]
    fn test_coerce_payload_rejects_missing_key() {
        let payload = as_map(json!({
            "hoscode": "H1",
            "depcode": "D1",
            "workDate": "2024-01-01",
            "reservedNumber": 10,
            "availableNumber": 5,
        }));

        let err = coerce_payload(&payload).unwrap_err();
        assert!(matches!(err, AppError::MalformedPayload(_)));
    }

    #[test]
    fn test_coerce_payload_rejects_bad_date() {
        let payload = as_map(json!({
            "hoscode": "H1",
            "hosScheduleId": "S1",
            "depcode": "D1",
            "workDate": "January 1st",
            "reservedNumber": 10,
            "availableNumber": 5,
        }));

        let err = coerce_payload(&payload).unwrap_err();
        assert!(matches!(err, AppError::MalformedPayload(_)));
    }

    #[test]
    fn test_coerce_payload_rejects_untypeable_number() {
        let payload = as_map(json!({
            "hoscode": "H1",
            "hosScheduleId": "S1",
            "depcode": "D1",
            "workDate": "2024-01-01",
            "reservedNumber": "many",
            "availableNumber": 5,
        }));

        let err = coerce_payload(&payload).unwrap_err();
        assert!(matches!(err, AppError::MalformedPayload(_)));
    }

    #[test]
    fn test_validate_page_bounds() {
        assert!(validate_page(1, 10).is_ok());
        assert!(matches!(validate_page(0, 10), Err(AppError::InvalidPage(_))));
        assert!(matches!(validate_page(1, 0), Err(AppError::InvalidPage(_))));
        assert!(matches!(validate_page(-3, -1), Err(AppError::InvalidPage(_))));
    }
}
