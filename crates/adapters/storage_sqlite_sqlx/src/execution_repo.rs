//! `SQLite` implementation of [`ExecutionRepository`].

use std::collections::HashMap;
use std::future::Future;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use areaflow_app::ports::ExecutionRepository;
use areaflow_domain::error::AreaFlowError;
use areaflow_domain::execution::{ExecutionRecord, ExecutionStatus};
use areaflow_domain::id::{AreaId, ExecutionId};
use areaflow_domain::time::Timestamp;

use crate::codec::{decode_id, decode_opt_ts, decode_ts, encode_ts};
use crate::error::StorageError;

/// Wrapper for converting database rows into domain [`ExecutionRecord`].
struct Wrapper(ExecutionRecord);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<ExecutionRecord> {
        value.map(|w| w.0)
    }

    fn all(values: Vec<Self>) -> Vec<ExecutionRecord> {
        values.into_iter().map(|w| w.0).collect()
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let area_id: String = row.try_get("area_id")?;
        let status: String = row.try_get("status")?;
        let trigger_data: String = row.try_get("trigger_data")?;
        let execution_result: Option<String> = row.try_get("execution_result")?;
        let started_at: Option<String> = row.try_get("started_at")?;
        let completed_at: Option<String> = row.try_get("completed_at")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        let status: ExecutionStatus = decode_id(&status)?;
        let trigger_data = serde_json::from_str(&trigger_data)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let execution_result = execution_result
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(ExecutionRecord {
            id: decode_id(&id)?,
            area_id: decode_id(&area_id)?,
            status,
            trigger_data,
            execution_result,
            error_message: row.try_get("error_message")?,
            started_at: decode_opt_ts(started_at)?,
            completed_at: decode_opt_ts(completed_at)?,
            execution_time_ms: row.try_get("execution_time_ms")?,
            created_at: decode_ts(&created_at)?,
            updated_at: decode_ts(&updated_at)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO executions (
        id, area_id, status, trigger_data, execution_result, error_message,
        started_at, completed_at, execution_time_ms, created_at, updated_at
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";

const UPDATE: &str = r"
    UPDATE executions
    SET status = ?, trigger_data = ?, execution_result = ?, error_message = ?,
        started_at = ?, completed_at = ?, execution_time_ms = ?, updated_at = ?
    WHERE id = ?
";

const SELECT_BY_ID: &str = "SELECT * FROM executions WHERE id = ?";
const DELETE_BY_ID: &str = "DELETE FROM executions WHERE id = ?";
const DELETE_BY_AREA: &str = "DELETE FROM executions WHERE area_id = ?";

// `rowid` breaks ties between records created within the same nanosecond.
const SELECT_BY_AREA: &str =
    "SELECT * FROM executions WHERE area_id = ? ORDER BY created_at DESC, rowid DESC";
const SELECT_BY_STATUS: &str =
    "SELECT * FROM executions WHERE status = ? ORDER BY created_at DESC, rowid DESC";
const SELECT_RECENT: &str =
    "SELECT * FROM executions ORDER BY created_at DESC, rowid DESC LIMIT ?";

const SELECT_RUNNING_STARTED_BEFORE: &str = r"
    SELECT * FROM executions
    WHERE status = 'RUNNING' AND started_at IS NOT NULL AND started_at < ?
    ORDER BY started_at ASC
";

const SELECT_FAILED: &str = r"
    SELECT * FROM executions
    WHERE status = 'FAILED' AND (?1 IS NULL OR area_id = ?1)
    ORDER BY created_at DESC, rowid DESC
";

const DELETE_TERMINAL_COMPLETED_BEFORE: &str = r"
    DELETE FROM executions
    WHERE status IN ('SUCCESS', 'FAILED', 'CANCELLED', 'SKIPPED')
      AND completed_at IS NOT NULL
      AND completed_at < ?
";

const COUNT_BY_STATUS: &str = r"
    SELECT status, COUNT(*) AS count FROM executions
    WHERE ?1 IS NULL OR area_id = ?1
    GROUP BY status
";

const AVERAGE_DURATION: &str = r"
    SELECT AVG(execution_time_ms) AS average FROM executions
    WHERE execution_time_ms IS NOT NULL AND (?1 IS NULL OR area_id = ?1)
";

/// `SQLite`-backed execution record store.
pub struct SqliteExecutionRepository {
    pool: SqlitePool,
}

impl SqliteExecutionRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn encode_json(value: &serde_json::Value) -> Result<String, StorageError> {
    Ok(serde_json::to_string(value)?)
}

impl ExecutionRepository for SqliteExecutionRepository {
    fn create(
        &self,
        record: ExecutionRecord,
    ) -> impl Future<Output = Result<ExecutionRecord, AreaFlowError>> + Send {
        let pool = self.pool.clone();
        async move {
            let trigger_data = encode_json(&record.trigger_data)?;
            let execution_result = record
                .execution_result
                .as_ref()
                .map(encode_json)
                .transpose()?;

            sqlx::query(INSERT)
                .bind(record.id.to_string())
                .bind(record.area_id.to_string())
                .bind(record.status.as_str())
                .bind(trigger_data)
                .bind(execution_result)
                .bind(&record.error_message)
                .bind(record.started_at.map(encode_ts))
                .bind(record.completed_at.map(encode_ts))
                .bind(record.execution_time_ms)
                .bind(encode_ts(record.created_at))
                .bind(encode_ts(record.updated_at))
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(record)
        }
    }

    fn get_by_id(
        &self,
        id: ExecutionId,
    ) -> impl Future<Output = Result<Option<ExecutionRecord>, AreaFlowError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn update(
        &self,
        record: ExecutionRecord,
    ) -> impl Future<Output = Result<Option<ExecutionRecord>, AreaFlowError>> + Send {
        let pool = self.pool.clone();
        async move {
            let trigger_data = encode_json(&record.trigger_data)?;
            let execution_result = record
                .execution_result
                .as_ref()
                .map(encode_json)
                .transpose()?;

            let result = sqlx::query(UPDATE)
                .bind(record.status.as_str())
                .bind(trigger_data)
                .bind(execution_result)
                .bind(&record.error_message)
                .bind(record.started_at.map(encode_ts))
                .bind(record.completed_at.map(encode_ts))
                .bind(record.execution_time_ms)
                .bind(encode_ts(record.updated_at))
                .bind(record.id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok((result.rows_affected() > 0).then_some(record))
        }
    }

    fn delete(&self, id: ExecutionId) -> impl Future<Output = Result<bool, AreaFlowError>> + Send {
        let pool = self.pool.clone();
        async move {
            let result = sqlx::query(DELETE_BY_ID)
                .bind(id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(result.rows_affected() > 0)
        }
    }

    fn delete_by_area(
        &self,
        area_id: AreaId,
    ) -> impl Future<Output = Result<u64, AreaFlowError>> + Send {
        let pool = self.pool.clone();
        async move {
            let result = sqlx::query(DELETE_BY_AREA)
                .bind(area_id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(result.rows_affected())
        }
    }

    fn find_by_area(
        &self,
        area_id: AreaId,
    ) -> impl Future<Output = Result<Vec<ExecutionRecord>, AreaFlowError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_AREA)
                .bind(area_id.to_string())
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::all(rows))
        }
    }

    fn find_by_status(
        &self,
        status: ExecutionStatus,
    ) -> impl Future<Output = Result<Vec<ExecutionRecord>, AreaFlowError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_STATUS)
                .bind(status.as_str())
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::all(rows))
        }
    }

    fn find_recent(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ExecutionRecord>, AreaFlowError>> + Send {
        let pool = self.pool.clone();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_RECENT)
                .bind(limit)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::all(rows))
        }
    }

    fn find_running_started_before(
        &self,
        cutoff: Timestamp,
    ) -> impl Future<Output = Result<Vec<ExecutionRecord>, AreaFlowError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_RUNNING_STARTED_BEFORE)
                .bind(encode_ts(cutoff))
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::all(rows))
        }
    }

    fn find_failed(
        &self,
        area_id: Option<AreaId>,
    ) -> impl Future<Output = Result<Vec<ExecutionRecord>, AreaFlowError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_FAILED)
                .bind(area_id.map(|id| id.to_string()))
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::all(rows))
        }
    }

    fn delete_terminal_completed_before(
        &self,
        cutoff: Timestamp,
    ) -> impl Future<Output = Result<Option<u64>, AreaFlowError>> + Send {
        let pool = self.pool.clone();
        async move {
            let result = sqlx::query(DELETE_TERMINAL_COMPLETED_BEFORE)
                .bind(encode_ts(cutoff))
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Some(result.rows_affected()))
        }
    }

    fn count_by_status(
        &self,
        area_id: Option<AreaId>,
    ) -> impl Future<Output = Result<HashMap<ExecutionStatus, u64>, AreaFlowError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<(String, i64)> = sqlx::query_as(COUNT_BY_STATUS)
                .bind(area_id.map(|id| id.to_string()))
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            let mut counts = HashMap::with_capacity(rows.len());
            for (status, count) in rows {
                let status: ExecutionStatus = decode_id(&status).map_err(StorageError::from)?;
                counts.insert(status, u64::try_from(count).unwrap_or(0));
            }
            Ok(counts)
        }
    }

    fn average_duration_ms(
        &self,
        area_id: Option<AreaId>,
    ) -> impl Future<Output = Result<Option<f64>, AreaFlowError>> + Send {
        let pool = self.pool.clone();
        async move {
            let average: Option<f64> = sqlx::query_scalar(AVERAGE_DURATION)
                .bind(area_id.map(|id| id.to_string()))
                .fetch_one(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(average)
        }
    }
}
