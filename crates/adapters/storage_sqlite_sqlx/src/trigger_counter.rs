//! `SQLite` implementation of [`AreaTriggerCounter`].

use std::future::Future;

use sqlx::SqlitePool;

use areaflow_app::ports::AreaTriggerCounter;
use areaflow_domain::error::{AreaFlowError, NotFoundError};
use areaflow_domain::id::AreaId;
use areaflow_domain::time::now;

use crate::codec::encode_ts;
use crate::error::StorageError;

const INCREMENT: &str = r"
    UPDATE areas
    SET trigger_count = trigger_count + 1, last_triggered_at = ?
    WHERE id = ?
";

/// Bumps `areas.trigger_count` in place.
pub struct SqliteAreaTriggerCounter {
    pool: SqlitePool,
}

impl SqliteAreaTriggerCounter {
    /// Create a new counter using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl AreaTriggerCounter for SqliteAreaTriggerCounter {
    fn increment(&self, area_id: AreaId) -> impl Future<Output = Result<(), AreaFlowError>> + Send {
        let pool = self.pool.clone();
        async move {
            let result = sqlx::query(INCREMENT)
                .bind(encode_ts(now()))
                .bind(area_id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            if result.rows_affected() == 0 {
                return Err(NotFoundError {
                    entity: "Area",
                    id: area_id.to_string(),
                }
                .into());
            }
            Ok(())
        }
    }
}
