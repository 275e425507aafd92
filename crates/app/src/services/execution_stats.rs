//! Execution stats — aggregate counts over execution records.

use areaflow_domain::error::AreaFlowError;
use areaflow_domain::execution_stats::ExecutionStats;
use areaflow_domain::id::AreaId;

use crate::ports::ExecutionRepository;

/// Read-only service computing [`ExecutionStats`].
pub struct ExecutionStatsAggregator<R> {
    repo: R,
}

impl<R: ExecutionRepository> ExecutionStatsAggregator<R> {
    /// Create a new aggregator backed by the given repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Counts per status and the mean duration, optionally for one area.
    ///
    /// # Errors
    ///
    /// Returns a storage error if either aggregate query fails.
    #[tracing::instrument(skip(self))]
    pub async fn get_execution_stats(
        &self,
        area_id: Option<AreaId>,
    ) -> Result<ExecutionStats, AreaFlowError> {
        let counts = self.repo.count_by_status(area_id).await?;
        let average = self.repo.average_duration_ms(area_id).await?;
        Ok(ExecutionStats::from_counts(&counts, average))
    }
}
