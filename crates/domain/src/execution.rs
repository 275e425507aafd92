//! Execution record — one attempted run of an AREA's reaction.
//!
//! The lifecycle is intentionally permissive:
//!
//! ```text
//! PENDING ──► RUNNING ──► SUCCESS | FAILED | CANCELLED
//!    └──────► SKIPPED
//! ```
//!
//! No transition is rejected for being out of order. What *is* enforced is
//! the duration invariant: whenever a record is terminal and carries both
//! `started_at` and `completed_at`, `execution_time_ms` equals
//! [`execution_duration_ms`] of the two.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::id::{AreaId, ExecutionId};
use crate::time::Timestamp;

/// Status of an [`ExecutionRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
    Skipped,
}

impl ExecutionStatus {
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Running,
        Self::Success,
        Self::Failed,
        Self::Cancelled,
        Self::Skipped,
    ];

    /// Statuses after which no further transition is expected.
    pub const TERMINAL: [Self; 4] = [Self::Success, Self::Failed, Self::Cancelled, Self::Skipped];

    #[must_use]
    pub fn is_terminal(self) -> bool {
        Self::TERMINAL.contains(&self)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown status label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown execution status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for ExecutionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Duration between start and completion in whole milliseconds, clamped at 0.
///
/// Every write path computes `execution_time_ms` through this function.
#[must_use]
pub fn execution_duration_ms(started_at: Timestamp, completed_at: Timestamp) -> i64 {
    (completed_at - started_at).num_milliseconds().max(0)
}

/// A single run attempt of an AREA.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: ExecutionId,
    pub area_id: AreaId,
    pub status: ExecutionStatus,
    pub trigger_data: serde_json::Value,
    pub execution_result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub execution_time_ms: Option<i64>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ExecutionRecord {
    /// Materialize a record requested by the scheduler.
    ///
    /// Caller-supplied `status` and `started_at` are kept verbatim so that
    /// replays are deterministic; otherwise the record starts `PENDING` with
    /// `started_at = at`.
    #[must_use]
    pub fn new(request: NewExecution, at: Timestamp) -> Self {
        Self {
            id: ExecutionId::new(),
            area_id: request.area_id,
            status: request.status.unwrap_or(ExecutionStatus::Pending),
            trigger_data: request.trigger_data,
            execution_result: None,
            error_message: None,
            started_at: Some(request.started_at.unwrap_or(at)),
            completed_at: None,
            execution_time_ms: None,
            created_at: at,
            updated_at: at,
        }
    }

    /// Move to `RUNNING`. `started_at` keeps the value fixed at creation.
    pub fn start(&mut self, at: Timestamp) {
        self.status = ExecutionStatus::Running;
        self.updated_at = at;
    }

    /// Move to `SUCCESS`, recording the reaction's result.
    pub fn complete(&mut self, result: Option<serde_json::Value>, at: Timestamp) {
        self.execution_result = result;
        self.finish(ExecutionStatus::Success, at);
    }

    /// Move to `FAILED`, recording why.
    pub fn fail(&mut self, error_message: impl Into<String>, at: Timestamp) {
        self.error_message = Some(error_message.into());
        self.finish(ExecutionStatus::Failed, at);
    }

    pub fn cancel(&mut self, at: Timestamp) {
        self.finish(ExecutionStatus::Cancelled, at);
    }

    /// Move to `SKIPPED`: the trigger evaluated negative and nothing ran.
    pub fn skip(&mut self, at: Timestamp) {
        self.finish(ExecutionStatus::Skipped, at);
    }

    fn finish(&mut self, status: ExecutionStatus, at: Timestamp) {
        self.status = status;
        self.completed_at = Some(at);
        self.updated_at = at;
        self.execution_time_ms = self
            .started_at
            .map(|started_at| execution_duration_ms(started_at, at));
    }

    /// Overwrite the fields present in `update`.
    ///
    /// When the resulting record is terminal with both timestamps present the
    /// duration is recomputed, overriding any `execution_time_ms` in `update`.
    pub fn apply(&mut self, update: ExecutionUpdate, at: Timestamp) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(trigger_data) = update.trigger_data {
            self.trigger_data = trigger_data;
        }
        if let Some(execution_result) = update.execution_result {
            self.execution_result = execution_result;
        }
        if let Some(error_message) = update.error_message {
            self.error_message = error_message;
        }
        if let Some(started_at) = update.started_at {
            self.started_at = Some(started_at);
        }
        if let Some(completed_at) = update.completed_at {
            self.completed_at = Some(completed_at);
        }
        if let Some(execution_time_ms) = update.execution_time_ms {
            self.execution_time_ms = Some(execution_time_ms);
        }
        self.updated_at = at;

        if self.status.is_terminal()
            && let (Some(started_at), Some(completed_at)) = (self.started_at, self.completed_at)
        {
            self.execution_time_ms = Some(execution_duration_ms(started_at, completed_at));
        }
    }
}

/// Creation request issued by the (external) scheduler.
#[derive(Debug, Clone)]
pub struct NewExecution {
    pub area_id: AreaId,
    pub trigger_data: serde_json::Value,
    pub status: Option<ExecutionStatus>,
    pub started_at: Option<Timestamp>,
}

impl NewExecution {
    #[must_use]
    pub fn new(area_id: AreaId, trigger_data: serde_json::Value) -> Self {
        Self {
            area_id,
            trigger_data,
            status: None,
            started_at: None,
        }
    }

    #[must_use]
    pub fn status(mut self, status: ExecutionStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn started_at(mut self, started_at: Timestamp) -> Self {
        self.started_at = Some(started_at);
        self
    }
}

/// Partial overwrite applied by the generic update path.
///
/// Outer `None` leaves a field untouched; for nullable payload fields an
/// inner `None` clears the value. `completed_at` can be set but not cleared.
#[derive(Debug, Clone, Default)]
pub struct ExecutionUpdate {
    pub status: Option<ExecutionStatus>,
    pub trigger_data: Option<serde_json::Value>,
    pub execution_result: Option<Option<serde_json::Value>>,
    pub error_message: Option<Option<String>>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub execution_time_ms: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    fn record_started_at(started_at: &str) -> ExecutionRecord {
        ExecutionRecord::new(
            NewExecution::new(AreaId::new(), json!({"event": "push"})).started_at(ts(started_at)),
            ts(started_at),
        )
    }

    #[test]
    fn should_default_to_pending_and_now_when_not_supplied() {
        let at = ts("2024-01-01T12:00:00Z");
        let record = ExecutionRecord::new(NewExecution::new(AreaId::new(), json!({})), at);
        assert_eq!(record.status, ExecutionStatus::Pending);
        assert_eq!(record.started_at, Some(at));
        assert!(record.completed_at.is_none());
        assert!(record.execution_time_ms.is_none());
    }

    #[test]
    fn should_honor_supplied_status_and_started_at() {
        let started = ts("2023-06-01T08:00:00Z");
        let record = ExecutionRecord::new(
            NewExecution::new(AreaId::new(), json!({}))
                .status(ExecutionStatus::Running)
                .started_at(started),
            ts("2024-01-01T12:00:00Z"),
        );
        assert_eq!(record.status, ExecutionStatus::Running);
        assert_eq!(record.started_at, Some(started));
    }

    #[test]
    fn should_compute_duration_on_completion() {
        let mut record = record_started_at("2024-01-01T12:00:00Z");
        record.start(ts("2024-01-01T12:00:01Z"));
        record.complete(Some(json!({"ok": true})), ts("2024-01-01T12:01:30Z"));

        assert_eq!(record.status, ExecutionStatus::Success);
        assert_eq!(record.execution_time_ms, Some(90_000));
        assert_eq!(record.completed_at, Some(ts("2024-01-01T12:01:30Z")));
    }

    #[test]
    fn should_leave_duration_empty_without_started_at() {
        let mut record = record_started_at("2024-01-01T12:00:00Z");
        record.started_at = None;
        record.fail("boom", ts("2024-01-01T12:01:30Z"));

        assert_eq!(record.status, ExecutionStatus::Failed);
        assert_eq!(record.error_message.as_deref(), Some("boom"));
        assert!(record.execution_time_ms.is_none());
    }

    #[test]
    fn should_clamp_negative_duration_to_zero() {
        assert_eq!(
            execution_duration_ms(ts("2024-01-01T12:00:10Z"), ts("2024-01-01T12:00:00Z")),
            0
        );
    }

    #[test]
    fn should_allow_cancel_and_skip_from_any_state() {
        let mut record = record_started_at("2024-01-01T12:00:00Z");
        record.skip(ts("2024-01-01T12:00:05Z"));
        assert_eq!(record.status, ExecutionStatus::Skipped);
        assert_eq!(record.execution_time_ms, Some(5_000));

        record.cancel(ts("2024-01-01T12:00:07Z"));
        assert_eq!(record.status, ExecutionStatus::Cancelled);
        assert_eq!(record.execution_time_ms, Some(7_000));
    }

    #[test]
    fn should_recompute_duration_on_terminal_update() {
        let mut record = record_started_at("2024-01-01T12:00:00Z");
        record.apply(
            ExecutionUpdate {
                status: Some(ExecutionStatus::Success),
                completed_at: Some(ts("2024-01-01T12:01:30Z")),
                execution_time_ms: Some(1),
                ..ExecutionUpdate::default()
            },
            ts("2024-01-01T12:02:00Z"),
        );
        assert_eq!(record.execution_time_ms, Some(90_000));
    }

    #[test]
    fn should_keep_duration_untouched_on_non_terminal_update() {
        let mut record = record_started_at("2024-01-01T12:00:00Z");
        record.apply(
            ExecutionUpdate {
                status: Some(ExecutionStatus::Running),
                trigger_data: Some(json!({"replayed": true})),
                ..ExecutionUpdate::default()
            },
            ts("2024-01-01T12:00:01Z"),
        );
        assert_eq!(record.status, ExecutionStatus::Running);
        assert!(record.execution_time_ms.is_none());
        assert_eq!(record.trigger_data, json!({"replayed": true}));
    }

    #[test]
    fn should_parse_status_labels_case_insensitively() {
        assert_eq!(
            "failed".parse::<ExecutionStatus>().unwrap(),
            ExecutionStatus::Failed
        );
        assert_eq!(ExecutionStatus::Cancelled.to_string(), "CANCELLED");
        assert!("DONE".parse::<ExecutionStatus>().is_err());
    }

    #[test]
    fn should_classify_terminal_statuses() {
        assert!(!ExecutionStatus::Pending.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(ExecutionStatus::Skipped.is_terminal());
        assert!(ExecutionStatus::Success.is_terminal());
    }
}
