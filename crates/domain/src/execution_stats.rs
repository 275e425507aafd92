//! Aggregate view over execution records.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::execution::ExecutionStatus;

/// Counts per status plus the mean duration of finished runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub total: u64,
    pub pending: u64,
    pub running: u64,
    /// Records in `SUCCESS`.
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub skipped: u64,
    /// Mean `execution_time_ms` over records that have one; `None` when no
    /// record has a duration.
    pub avg_execution_time_ms: Option<f64>,
}

impl ExecutionStats {
    /// Fold per-status counts and an average into the stats shape.
    #[must_use]
    pub fn from_counts(
        counts: &HashMap<ExecutionStatus, u64>,
        avg_execution_time_ms: Option<f64>,
    ) -> Self {
        let count = |status| counts.get(&status).copied().unwrap_or(0);
        Self {
            total: counts.values().sum(),
            pending: count(ExecutionStatus::Pending),
            running: count(ExecutionStatus::Running),
            completed: count(ExecutionStatus::Success),
            failed: count(ExecutionStatus::Failed),
            cancelled: count(ExecutionStatus::Cancelled),
            skipped: count(ExecutionStatus::Skipped),
            avg_execution_time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_be_all_zero_without_counts() {
        let stats = ExecutionStats::from_counts(&HashMap::new(), None);
        assert_eq!(stats, ExecutionStats::default());
        assert!(stats.avg_execution_time_ms.is_none());
    }

    #[test]
    fn should_map_success_to_completed_and_sum_total() {
        let counts = HashMap::from([
            (ExecutionStatus::Success, 3),
            (ExecutionStatus::Failed, 1),
            (ExecutionStatus::Skipped, 2),
        ]);
        let stats = ExecutionStats::from_counts(&counts, Some(1500.0));
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.total, 6);
        assert_eq!(stats.avg_execution_time_ms, Some(1500.0));
    }
}
