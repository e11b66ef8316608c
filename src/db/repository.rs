use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::models::{DaySummary, NewSchedule, Schedule, ScheduleFilter};

const SCHEDULE_COLUMNS: &str = "id, hoscode, hos_schedule_id, depcode, work_date, \
     reserved_number, available_number, status, is_deleted, create_time, update_time";

/// Upserts one schedule by its natural key `(hoscode, hos_schedule_id)`.
///
/// On conflict only the bookkeeping fields are refreshed: `update_time`
/// advances and the row is reactivated (`is_deleted = 0`, `status = 1`).
/// Capacity and date fields keep their first-written values — this pins
/// the upstream system's observed update policy, flagged for product
/// clarification rather than silently changed.
///
/// The single INSERT .. ON CONFLICT statement is atomic, so concurrent
/// ingestions racing on the same natural key cannot lose updates.
pub async fn upsert_schedule(db: &SqlitePool, new: &NewSchedule) -> Result<Schedule, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO schedules
            (id, hoscode, hos_schedule_id, depcode, work_date,
            reserved_number, available_number, status, is_deleted,
            create_time, update_time)
        VALUES (?, ?, ?, ?, ?, ?, ?, 1, 0, ?, ?)
        ON CONFLICT (hoscode, hos_schedule_id) DO UPDATE SET
            update_time = excluded.update_time,
            is_deleted = 0,
            status = 1
        "#,
    )
    .bind(&id)
    .bind(&new.hoscode)
    .bind(&new.hos_schedule_id)
    .bind(&new.depcode)
    .bind(&new.work_date)
    .bind(new.reserved_number)
    .bind(new.available_number)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    find_by_natural_key(db, &new.hoscode, &new.hos_schedule_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

pub async fn find_by_natural_key(
    db: &SqlitePool,
    hoscode: &str,
    hos_schedule_id: &str,
) -> Result<Option<Schedule>, sqlx::Error> {
    sqlx::query_as::<_, Schedule>(&format!(
        "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE hoscode = ? AND hos_schedule_id = ?"
    ))
    .bind(hoscode)
    .bind(hos_schedule_id)
    .fetch_optional(db)
    .await
}

/// Removes a schedule by natural key. Returns whether a row was removed;
/// a missing key is a no-op, not an error.
pub async fn delete_schedule(
    db: &SqlitePool,
    hoscode: &str,
    hos_schedule_id: &str,
) -> Result<bool, sqlx::Error> {
    let removed = match find_by_natural_key(db, hoscode, hos_schedule_id).await? {
        Some(existing) => {
            sqlx::query("DELETE FROM schedules WHERE id = ?")
                .bind(&existing.id)
                .execute(db)
                .await?
                .rows_affected()
        }
        None => 0,
    };
    Ok(removed > 0)
}

/// Exact-match lookup over one hospital/department/date scope,
/// restricted to active, non-deleted rows.
pub async fn find_by_scope(
    db: &SqlitePool,
    hoscode: &str,
    depcode: &str,
    work_date: &str,
) -> Result<Vec<Schedule>, sqlx::Error> {
    sqlx::query_as::<_, Schedule>(&format!(
        r#"
        SELECT {SCHEDULE_COLUMNS}
        FROM schedules
        WHERE hoscode = ? AND depcode = ? AND work_date = ?
            AND is_deleted = 0 AND status = 1
        ORDER BY hos_schedule_id
        "#
    ))
    .bind(hoscode)
    .bind(depcode)
    .bind(work_date)
    .fetch_all(db)
    .await
}

/// Groups the scope's schedules by work date with per-group count and
/// capacity sums, newest date first, returning one page plus the total
/// distinct group count.
///
/// The count query repeats the page query's WHERE clause so both passes
/// observe the same filter.
pub async fn group_by_work_date(
    db: &SqlitePool,
    hoscode: &str,
    depcode: &str,
    offset: i64,
    limit: i64,
) -> Result<(Vec<DaySummary>, i64), sqlx::Error> {
    let rows = sqlx::query_as::<_, DaySummary>(
        r#"
        SELECT
            work_date,
            COUNT(*) AS slot_count,
            SUM(reserved_number) AS reserved_number,
            SUM(available_number) AS available_number
        FROM schedules
        WHERE hoscode = ? AND depcode = ? AND is_deleted = 0 AND status = 1
        GROUP BY work_date
        ORDER BY work_date DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(hoscode)
    .bind(depcode)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM (
            SELECT work_date
            FROM schedules
            WHERE hoscode = ? AND depcode = ? AND is_deleted = 0 AND status = 1
            GROUP BY work_date
        )
        "#,
    )
    .bind(hoscode)
    .bind(depcode)
    .fetch_one(db)
    .await?;

    Ok((rows, total))
}

/// Administrative listing: pages active, non-deleted schedules matching
/// every non-empty filter field by case-insensitive substring.
pub async fn page_schedules(
    db: &SqlitePool,
    offset: i64,
    limit: i64,
    filter: &ScheduleFilter,
) -> Result<(Vec<Schedule>, i64), sqlx::Error> {
    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {SCHEDULE_COLUMNS} FROM schedules"
    ));
    push_filter(&mut query, filter);
    query.push(" ORDER BY update_time DESC LIMIT ");
    query.push_bind(limit);
    query.push(" OFFSET ");
    query.push_bind(offset);

    let records = query
        .build_query_as::<Schedule>()
        .fetch_all(db)
        .await?;

    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM schedules");
    push_filter(&mut count, filter);
    let total: i64 = count.build_query_scalar().fetch_one(db).await?;

    Ok((records, total))
}

fn push_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &ScheduleFilter) {
    query.push(" WHERE is_deleted = 0 AND status = 1");
    for (column, value) in [
        ("hoscode", &filter.hoscode),
        ("depcode", &filter.depcode),
        ("work_date", &filter.work_date),
    ] {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            query.push(format!(" AND LOWER({column}) LIKE "));
            query.push_bind(format!("%{}%", value.to_lowercase()));
        }
    }
}
