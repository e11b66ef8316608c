use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use sqlx::SqlitePool;

use schedule_service::models::ScheduleFilter;
use schedule_service::naming::{NameResolver, ResolveError, StaticNameResolver};
use schedule_service::services::ScheduleService;

async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to create database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

fn resolver_with_names() -> Arc<StaticNameResolver> {
    Arc::new(
        StaticNameResolver::new()
            .with_hospital("H1", "中心醫院")
            .with_department("H1", "D1", "內科"),
    )
}

/// Resolver that always fails at the transport level, for exercising the
/// degraded-enrichment policy.
struct FailingResolver;

#[async_trait]
impl NameResolver for FailingResolver {
    async fn resolve_hospital_name(&self, _hoscode: &str) -> Result<String, ResolveError> {
        Err(ResolveError::Transport("connection refused".to_string()))
    }

    async fn resolve_department_name(
        &self,
        _hoscode: &str,
        _depcode: &str,
    ) -> Result<String, ResolveError> {
        Err(ResolveError::Transport("connection refused".to_string()))
    }
}

fn payload(
    hos_schedule_id: &str,
    work_date: &str,
    reserved: i64,
    available: i64,
) -> Map<String, Value> {
    json!({
        "hoscode": "H1",
        "hosScheduleId": hos_schedule_id,
        "depcode": "D1",
        "workDate": work_date,
        "reservedNumber": reserved,
        "availableNumber": available,
    })
    .as_object()
    .expect("payload must be an object")
    .clone()
}

#[tokio::test]
async fn test_summary_example_scenario() {
    let pool = setup_test_db().await;
    let service = ScheduleService::new(pool, resolver_with_names());

    service.ingest(&payload("S1", "2024-01-01", 10, 5)).await.unwrap();
    service.ingest(&payload("S2", "2024-01-01", 20, 8)).await.unwrap();
    service.ingest(&payload("S3", "2024-01-02", 15, 15)).await.unwrap();

    let page = service.summary("H1", "D1", 1, 10).await.expect("summary failed");

    assert_eq!(page.total, 2);
    assert_eq!(page.rows.len(), 2);

    // Newest work date first.
    assert_eq!(page.rows[0].work_date, "2024-01-02");
    assert_eq!(page.rows[0].slot_count, 1);
    assert_eq!(page.rows[0].reserved_number, 15);
    assert_eq!(page.rows[0].available_number, 15);

    assert_eq!(page.rows[1].work_date, "2024-01-01");
    assert_eq!(page.rows[1].slot_count, 2);
    assert_eq!(page.rows[1].reserved_number, 30);
    assert_eq!(page.rows[1].available_number, 13);

    // 2024-01-02 is a Tuesday, 2024-01-01 a Monday.
    assert_eq!(page.rows[0].day_of_week, "週二");
    assert_eq!(page.rows[1].day_of_week, "週一");

    assert_eq!(page.context.get("hosname").map(String::as_str), Some("中心醫院"));
}

#[tokio::test]
async fn test_summary_page_past_end_keeps_total() {
    let pool = setup_test_db().await;
    let service = ScheduleService::new(pool, resolver_with_names());

    service.ingest(&payload("S1", "2024-01-01", 10, 5)).await.unwrap();
    service.ingest(&payload("S2", "2024-01-02", 20, 8)).await.unwrap();

    let first = service.summary("H1", "D1", 1, 10).await.unwrap();
    let beyond = service.summary("H1", "D1", 99, 10).await.unwrap();

    assert!(beyond.rows.is_empty());
    assert_eq!(beyond.total, first.total);
}

#[tokio::test]
async fn test_summary_rejects_invalid_page() {
    let pool = setup_test_db().await;
    let service = ScheduleService::new(pool, resolver_with_names());

    assert!(service.summary("H1", "D1", 0, 10).await.is_err());
    assert!(service.summary("H1", "D1", 1, 0).await.is_err());
    assert!(service.summary("H1", "D1", -1, -5).await.is_err());
}

#[tokio::test]
async fn test_summary_empty_scope_is_not_an_error() {
    let pool = setup_test_db().await;
    let service = ScheduleService::new(pool, resolver_with_names());

    let page = service.summary("H9", "D9", 1, 10).await.expect("summary failed");
    assert!(page.rows.is_empty());
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_ingest_same_key_keeps_first_capacity() {
    let pool = setup_test_db().await;
    let service = ScheduleService::new(pool, resolver_with_names());

    service.ingest(&payload("S1", "2024-01-01", 10, 5)).await.unwrap();
    service.ingest(&payload("S1", "2024-01-01", 99, 99)).await.unwrap();

    let page = service.summary("H1", "D1", 1, 10).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.rows[0].slot_count, 1);
    // Capacity stays as first written; only bookkeeping fields refresh.
    assert_eq!(page.rows[0].reserved_number, 10);
    assert_eq!(page.rows[0].available_number, 5);
}

#[tokio::test]
async fn test_ingest_rejects_malformed_payload_without_writing() {
    let pool = setup_test_db().await;
    let service = ScheduleService::new(pool, resolver_with_names());

    let mut missing_key = payload("S1", "2024-01-01", 10, 5);
    missing_key.remove("hosScheduleId");
    assert!(service.ingest(&missing_key).await.is_err());

    let bad_date = payload("S2", "someday", 10, 5);
    assert!(service.ingest(&bad_date).await.is_err());

    let page = service.page(1, 10, &ScheduleFilter::default()).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_withdraw_is_idempotent() {
    let pool = setup_test_db().await;
    let service = ScheduleService::new(pool, resolver_with_names());

    service.ingest(&payload("S1", "2024-01-01", 10, 5)).await.unwrap();

    service.withdraw("H1", "S1").await.expect("withdraw failed");
    service.withdraw("H1", "S1").await.expect("second withdraw failed");
    service.withdraw("H1", "never-seen").await.expect("withdraw of absent key failed");

    let page = service.page(1, 10, &ScheduleFilter::default()).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_detail_enriches_each_record() {
    let pool = setup_test_db().await;
    let service = ScheduleService::new(pool, resolver_with_names());

    service.ingest(&payload("S1", "2024-01-01", 10, 5)).await.unwrap();
    service.ingest(&payload("S2", "2024-01-01", 20, 8)).await.unwrap();
    service.ingest(&payload("S3", "2024-01-02", 15, 15)).await.unwrap();

    let details = service.detail("H1", "D1", "2024-01-01").await.expect("detail failed");
    assert_eq!(details.len(), 2);

    for detail in &details {
        assert_eq!(detail.schedule.work_date, "2024-01-01");
        assert_eq!(detail.extra.get("hosname").map(String::as_str), Some("中心醫院"));
        assert_eq!(detail.extra.get("depname").map(String::as_str), Some("內科"));
        assert_eq!(detail.extra.get("dayOfWeek").map(String::as_str), Some("週一"));
    }
}

#[tokio::test]
async fn test_detail_empty_scope_returns_empty_list() {
    let pool = setup_test_db().await;
    let service = ScheduleService::new(pool, resolver_with_names());

    let details = service.detail("H1", "D1", "2030-12-31").await.expect("detail failed");
    assert!(details.is_empty());
}

#[tokio::test]
async fn test_failing_resolver_degrades_to_sentinel() {
    let pool = setup_test_db().await;
    let service = ScheduleService::new(pool, Arc::new(FailingResolver));

    service.ingest(&payload("S1", "2024-01-01", 10, 5)).await.unwrap();

    let page = service.summary("H1", "D1", 1, 10).await.expect("summary failed");
    assert_eq!(page.total, 1);
    assert_eq!(page.context.get("hosname").map(String::as_str), Some("unknown"));

    let details = service.detail("H1", "D1", "2024-01-01").await.expect("detail failed");
    assert_eq!(details.len(), 1);
    assert_eq!(details[0].extra.get("hosname").map(String::as_str), Some("unknown"));
    assert_eq!(details[0].extra.get("depname").map(String::as_str), Some("unknown"));
    // The weekday label is computed locally and survives resolver failure.
    assert_eq!(details[0].extra.get("dayOfWeek").map(String::as_str), Some("週一"));
}

#[tokio::test]
async fn test_admin_listing_filters_and_pages() {
    let pool = setup_test_db().await;
    let service = ScheduleService::new(pool, resolver_with_names());

    service.ingest(&payload("S1", "2024-01-01", 10, 5)).await.unwrap();
    service.ingest(&payload("S2", "2024-01-02", 20, 8)).await.unwrap();

    let other = json!({
        "hoscode": "H2",
        "hosScheduleId": "X1",
        "depcode": "D5",
        "workDate": "2024-01-03",
        "reservedNumber": 3,
        "availableNumber": 3,
    })
    .as_object()
    .unwrap()
    .clone();
    service.ingest(&other).await.unwrap();

    let all = service.page(1, 10, &ScheduleFilter::default()).await.unwrap();
    assert_eq!(all.total, 3);

    let filter = ScheduleFilter {
        hoscode: Some("H1".to_string()),
        ..Default::default()
    };
    let filtered = service.page(1, 10, &filter).await.unwrap();
    assert_eq!(filtered.total, 2);
    assert!(filtered.records.iter().all(|r| r.hoscode == "H1"));

    let small = service.page(1, 1, &filter).await.unwrap();
    assert_eq!(small.records.len(), 1);
    assert_eq!(small.total, 2);
}
