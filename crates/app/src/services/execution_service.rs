//! Execution service — lifecycle of AREA execution records.
//!
//! Transitions are permissive: any status can be written over any other.
//! The only failure of a transition is an unknown record id.

use std::sync::Arc;

use areaflow_domain::error::{AreaFlowError, NotFoundError};
use areaflow_domain::execution::{ExecutionRecord, ExecutionStatus, ExecutionUpdate, NewExecution};
use areaflow_domain::id::{AreaId, ExecutionId};
use areaflow_domain::time::{days_before, minutes_before, now};

use crate::ports::{AreaTriggerCounter, ExecutionRepository};

/// Records returned by [`ExecutionService::find_recent_executions`] when no
/// limit is given.
pub const DEFAULT_RECENT_LIMIT: usize = 50;

/// Age after which a `RUNNING` record counts as long-running.
pub const DEFAULT_LONG_RUNNING_MINUTES: u32 = 30;

/// Age after which terminal records are removed by
/// [`ExecutionService::cleanup`].
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Application service for execution records.
pub struct ExecutionService<R, C> {
    repo: R,
    counter: Arc<C>,
}

impl<R, C> ExecutionService<R, C>
where
    R: ExecutionRepository,
    C: AreaTriggerCounter + Send + Sync + 'static,
{
    /// Create a new service backed by the given repository and counter.
    pub fn new(repo: R, counter: Arc<C>) -> Self {
        Self { repo, counter }
    }

    /// Record a new execution and bump the area's trigger counter.
    ///
    /// The counter update runs on a detached task once the record is stored:
    /// it is not awaited, and its failure is logged without affecting the
    /// record.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the record cannot be written.
    #[tracing::instrument(skip(self, request), fields(area_id = %request.area_id))]
    pub async fn create(&self, request: NewExecution) -> Result<ExecutionRecord, AreaFlowError> {
        let record = self.repo.create(ExecutionRecord::new(request, now())).await?;
        tracing::debug!(execution_id = %record.id, status = %record.status, "execution created");

        let counter = Arc::clone(&self.counter);
        let area_id = record.area_id;
        tokio::spawn(async move {
            if let Err(err) = counter.increment(area_id).await {
                tracing::warn!(%area_id, error = %err, "failed to increment area trigger count");
            }
        });

        Ok(record)
    }

    /// Move an execution to `RUNNING`.
    ///
    /// # Errors
    ///
    /// Returns [`AreaFlowError::NotFound`] if the execution does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn start_execution(&self, id: ExecutionId) -> Result<ExecutionRecord, AreaFlowError> {
        self.transition(id, |record| record.start(now())).await
    }

    /// Move an execution to `SUCCESS` with an optional result payload.
    ///
    /// # Errors
    ///
    /// Returns [`AreaFlowError::NotFound`] if the execution does not exist.
    #[tracing::instrument(skip(self, result))]
    pub async fn complete_execution(
        &self,
        id: ExecutionId,
        result: Option<serde_json::Value>,
    ) -> Result<ExecutionRecord, AreaFlowError> {
        self.transition(id, |record| record.complete(result, now()))
            .await
    }

    /// Move an execution to `FAILED` with an error message.
    ///
    /// # Errors
    ///
    /// Returns [`AreaFlowError::NotFound`] if the execution does not exist.
    #[tracing::instrument(skip(self, error_message))]
    pub async fn fail_execution(
        &self,
        id: ExecutionId,
        error_message: impl Into<String>,
    ) -> Result<ExecutionRecord, AreaFlowError> {
        let error_message = error_message.into();
        self.transition(id, |record| record.fail(error_message, now()))
            .await
    }

    /// Move an execution to `CANCELLED`.
    ///
    /// # Errors
    ///
    /// Returns [`AreaFlowError::NotFound`] if the execution does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_execution(
        &self,
        id: ExecutionId,
    ) -> Result<ExecutionRecord, AreaFlowError> {
        self.transition(id, |record| record.cancel(now())).await
    }

    /// Move an execution to `SKIPPED`.
    ///
    /// # Errors
    ///
    /// Returns [`AreaFlowError::NotFound`] if the execution does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn skip_execution(&self, id: ExecutionId) -> Result<ExecutionRecord, AreaFlowError> {
        self.transition(id, |record| record.skip(now())).await
    }

    /// Overwrite the fields present in `update`.
    ///
    /// # Errors
    ///
    /// Returns [`AreaFlowError::NotFound`] if the execution does not exist.
    #[tracing::instrument(skip(self, update))]
    pub async fn update(
        &self,
        id: ExecutionId,
        update: ExecutionUpdate,
    ) -> Result<ExecutionRecord, AreaFlowError> {
        self.transition(id, |record| record.apply(update, now()))
            .await
    }

    /// Get an execution by id.
    ///
    /// # Errors
    ///
    /// Returns [`AreaFlowError::NotFound`] if the execution does not exist.
    pub async fn find_one(&self, id: ExecutionId) -> Result<ExecutionRecord, AreaFlowError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| execution_not_found(id).into())
    }

    /// Executions of an area, newest-first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub async fn find_by_area_id(
        &self,
        area_id: AreaId,
    ) -> Result<Vec<ExecutionRecord>, AreaFlowError> {
        self.repo.find_by_area(area_id).await
    }

    /// Executions in a status, newest-first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub async fn find_by_status(
        &self,
        status: ExecutionStatus,
    ) -> Result<Vec<ExecutionRecord>, AreaFlowError> {
        self.repo.find_by_status(status).await
    }

    /// The most recently created executions, newest-first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub async fn find_recent_executions(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<ExecutionRecord>, AreaFlowError> {
        self.repo
            .find_recent(limit.unwrap_or(DEFAULT_RECENT_LIMIT))
            .await
    }

    /// `RUNNING` executions started more than `threshold_minutes` ago.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub async fn find_long_running_executions(
        &self,
        threshold_minutes: Option<u32>,
    ) -> Result<Vec<ExecutionRecord>, AreaFlowError> {
        let threshold = threshold_minutes.unwrap_or(DEFAULT_LONG_RUNNING_MINUTES);
        self.repo
            .find_running_started_before(minutes_before(now(), threshold))
            .await
    }

    /// `FAILED` executions, optionally restricted to one area.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub async fn find_failed_executions(
        &self,
        area_id: Option<AreaId>,
    ) -> Result<Vec<ExecutionRecord>, AreaFlowError> {
        self.repo.find_failed(area_id).await
    }

    /// Delete an execution.
    ///
    /// # Errors
    ///
    /// Returns [`AreaFlowError::NotFound`] if the execution does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, id: ExecutionId) -> Result<(), AreaFlowError> {
        if !self.repo.delete(id).await? {
            return Err(execution_not_found(id).into());
        }
        Ok(())
    }

    /// Delete every execution of an area, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the delete fails.
    #[tracing::instrument(skip(self))]
    pub async fn remove_by_area_id(&self, area_id: AreaId) -> Result<u64, AreaFlowError> {
        self.repo.delete_by_area(area_id).await
    }

    /// Delete terminal executions completed more than `older_than_days` ago.
    ///
    /// Returns the number of removed records; 0 when the store does not
    /// report a count.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the delete fails.
    #[tracing::instrument(skip(self))]
    pub async fn cleanup(&self, older_than_days: Option<u32>) -> Result<u64, AreaFlowError> {
        let days = older_than_days.unwrap_or(DEFAULT_RETENTION_DAYS);
        let removed = self
            .repo
            .delete_terminal_completed_before(days_before(now(), days))
            .await?
            .unwrap_or(0);
        tracing::info!(removed, days, "old executions cleaned up");
        Ok(removed)
    }

    async fn transition(
        &self,
        id: ExecutionId,
        change: impl FnOnce(&mut ExecutionRecord),
    ) -> Result<ExecutionRecord, AreaFlowError> {
        let mut record = self.find_one(id).await?;
        change(&mut record);
        let record = self
            .repo
            .update(record)
            .await?
            .ok_or_else(|| execution_not_found(id))?;
        tracing::debug!(status = %record.status, "execution updated");
        Ok(record)
    }
}

fn execution_not_found(id: ExecutionId) -> NotFoundError {
    NotFoundError {
        entity: "Execution",
        id: id.to_string(),
    }
}
