//! `cam_tracking` access. One row per (tower, year, month); `year` is the
//! calendar year of `month`, `quarter` the fiscal quarter it belongs to.

use serde_json::Value;
use sqlx::{postgres::PgRow, PgPool, Postgres, QueryBuilder, Row};

use crate::{
    error::AppError,
    services::cam_model::{CamStatus, TowerRecord},
};

const SELECT_ROWS: &str = "SELECT row_to_json(t) AS row FROM cam_tracking t WHERE ";

/// Values written by a CAM entry save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CamEntryWrite {
    pub tower: String,
    pub year: i32,
    pub month: u32,
    pub quarter: u32,
    pub paid_flats: i64,
    pub pending_flats: i64,
    pub dues_cleared_from_previous: i64,
    pub advance_payments: i64,
    pub cam_recon_flats: Option<i64>,
    pub notes: Option<String>,
    pub document_url: Option<String>,
}

/// Approved rows that can feed the quarter summary of `fiscal_year`.
pub async fn fetch_approved_for_fiscal_year(
    pool: &PgPool,
    fiscal_year: i32,
) -> Result<Vec<TowerRecord>, AppError> {
    let mut query = QueryBuilder::<Postgres>::new(SELECT_ROWS);
    query
        .push("t.status = 'approved' AND t.year IN (")
        .push_bind(fiscal_year)
        .push(", ")
        .push_bind(fiscal_year.saturating_add(1))
        .push(") ORDER BY t.year, t.month, t.tower");

    let rows = query.build().fetch_all(pool).await.map_err(map_db_error)?;
    Ok(read_records(rows))
}

/// Every row, any status, dated in `fiscal_year` or the calendar year after.
pub async fn fetch_fiscal_year(
    pool: &PgPool,
    fiscal_year: i32,
) -> Result<Vec<TowerRecord>, AppError> {
    let mut query = QueryBuilder::<Postgres>::new(SELECT_ROWS);
    query
        .push("t.year IN (")
        .push_bind(fiscal_year)
        .push(", ")
        .push_bind(fiscal_year.saturating_add(1))
        .push(") ORDER BY t.year, t.month, t.tower");

    let rows = query.build().fetch_all(pool).await.map_err(map_db_error)?;
    Ok(read_records(rows))
}

pub async fn fetch_calendar_months(
    pool: &PgPool,
    year: i32,
    months: &[u32],
) -> Result<Vec<TowerRecord>, AppError> {
    let months = months.iter().map(|month| *month as i32).collect::<Vec<_>>();
    let mut query = QueryBuilder::<Postgres>::new(SELECT_ROWS);
    query
        .push("t.year = ")
        .push_bind(year)
        .push(" AND t.month = ANY(")
        .push_bind(months)
        .push(") ORDER BY t.month, t.tower");

    let rows = query.build().fetch_all(pool).await.map_err(map_db_error)?;
    Ok(read_records(rows))
}

/// One tower's rows for explicit (year, month) pairs.
pub async fn fetch_tower_months(
    pool: &PgPool,
    tower: &str,
    periods: &[(i32, u32)],
) -> Result<Vec<TowerRecord>, AppError> {
    if periods.is_empty() {
        return Ok(Vec::new());
    }
    let years = periods.iter().map(|(year, _)| *year).collect::<Vec<_>>();
    let months = periods.iter().map(|(_, month)| *month as i32).collect::<Vec<_>>();

    let mut query = QueryBuilder::<Postgres>::new(SELECT_ROWS);
    query
        .push("t.tower = ")
        .push_bind(tower.to_string())
        .push(" AND (t.year, t.month) IN (SELECT * FROM UNNEST(")
        .push_bind(years)
        .push("::int[], ")
        .push_bind(months)
        .push("::int[])) ORDER BY t.year, t.month");

    let rows = query.build().fetch_all(pool).await.map_err(map_db_error)?;
    Ok(read_records(rows))
}

/// Insert or overwrite entries in one transaction. Existing rows are only
/// overwritten while editable; if any row is not, nothing is written.
pub async fn upsert_entries(pool: &PgPool, entries: &[CamEntryWrite]) -> Result<u64, AppError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::Dependency(format!("txn begin: {e}")))?;

    let mut written = 0;
    for entry in entries {
        let result = sqlx::query(
            "INSERT INTO cam_tracking (
                 tower, year, month, quarter, paid_flats, pending_flats, total_flats,
                 dues_cleared_from_previous, advance_payments, cam_recon_flats,
                 notes, document_url, status, is_locked
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 'draft', false)
             ON CONFLICT (tower, year, month) DO UPDATE
             SET quarter = EXCLUDED.quarter,
                 paid_flats = EXCLUDED.paid_flats,
                 pending_flats = EXCLUDED.pending_flats,
                 total_flats = EXCLUDED.total_flats,
                 dues_cleared_from_previous = EXCLUDED.dues_cleared_from_previous,
                 advance_payments = EXCLUDED.advance_payments,
                 cam_recon_flats = EXCLUDED.cam_recon_flats,
                 notes = EXCLUDED.notes,
                 document_url = COALESCE(EXCLUDED.document_url, cam_tracking.document_url),
                 updated_at = now()
             WHERE cam_tracking.status IN ('draft', 'correction_approved')",
        )
        .bind(&entry.tower)
        .bind(entry.year)
        .bind(entry.month as i32)
        .bind(entry.quarter as i32)
        .bind(entry.paid_flats)
        .bind(entry.pending_flats)
        .bind(entry.paid_flats + entry.pending_flats)
        .bind(entry.dues_cleared_from_previous)
        .bind(entry.advance_payments)
        .bind(entry.cam_recon_flats)
        .bind(entry.notes.as_deref())
        .bind(entry.document_url.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            // Dropping `tx` rolls back the rows written so far.
            return Err(AppError::Conflict(format!(
                "CAM data for tower {} ({}/{}) is locked and cannot be edited.",
                entry.tower, entry.month, entry.year
            )));
        }
        written += result.rows_affected();
    }

    tx.commit()
        .await
        .map_err(|e| AppError::Dependency(format!("txn commit: {e}")))?;
    Ok(written)
}

/// Move one tower's rows for `periods` to `target`, touching only rows
/// currently in one of `from`. A `note` replaces the rows' notes. Returns the
/// number of rows moved.
pub async fn transition_status(
    pool: &PgPool,
    tower: &str,
    periods: &[(i32, u32)],
    from: &[CamStatus],
    target: CamStatus,
    lock: bool,
    note: Option<&str>,
) -> Result<u64, AppError> {
    if periods.is_empty() || from.is_empty() {
        return Ok(0);
    }
    let years = periods.iter().map(|(year, _)| *year).collect::<Vec<_>>();
    let months = periods.iter().map(|(_, month)| *month as i32).collect::<Vec<_>>();
    let from = from
        .iter()
        .map(|status| status.as_str().to_string())
        .collect::<Vec<_>>();

    let mut query = QueryBuilder::<Postgres>::new("UPDATE cam_tracking SET status = ");
    query
        .push_bind(target.as_str())
        .push(", is_locked = ")
        .push_bind(lock)
        .push(", notes = COALESCE(")
        .push_bind(note.map(str::to_string))
        .push(", notes), updated_at = now() WHERE tower = ")
        .push_bind(tower.to_string())
        .push(" AND status = ANY(")
        .push_bind(from)
        .push(") AND (year, month) IN (SELECT * FROM UNNEST(")
        .push_bind(years)
        .push("::int[], ")
        .push_bind(months)
        .push("::int[]))");

    let result = query.build().execute(pool).await.map_err(map_db_error)?;
    Ok(result.rows_affected())
}

fn read_records(rows: Vec<PgRow>) -> Vec<TowerRecord> {
    rows.into_iter()
        .filter_map(|row| row.try_get::<Option<Value>, _>("row").ok().flatten())
        .filter_map(|value| match serde_json::from_value::<TowerRecord>(value) {
            Ok(record) => Some(record),
            Err(error) => {
                tracing::warn!(error = %error, "Skipping malformed cam_tracking row");
                None
            }
        })
        .collect()
}

fn map_db_error(error: sqlx::Error) -> AppError {
    let message = error.to_string();
    tracing::error!(db_error = %message, "Database query failed");

    if message.contains("23505")
        || message
            .to_ascii_lowercase()
            .contains("duplicate key value violates unique constraint")
    {
        return AppError::Conflict("Duplicate value violates a unique constraint.".to_string());
    }
    AppError::Dependency("Database operation failed.".to_string())
}

#[cfg(test)]
mod tests {
    use super::map_db_error;
    use crate::error::AppError;

    #[test]
    fn unexpected_database_errors_become_dependency_failures() {
        let mapped = map_db_error(sqlx::Error::RowNotFound);
        assert!(matches!(mapped, AppError::Dependency(_)));
    }

    #[test]
    fn protocol_errors_mentioning_unique_violations_are_conflicts() {
        let mapped = map_db_error(sqlx::Error::Protocol(
            "duplicate key value violates unique constraint \"cam_tracking_tower_year_month\""
                .to_string(),
        ));
        assert!(matches!(mapped, AppError::Conflict(_)));
    }
}
