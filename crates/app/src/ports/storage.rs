//! Storage ports — repository traits for persistence.

use std::collections::HashMap;
use std::future::Future;

use areaflow_domain::account_link::ServiceAccountLink;
use areaflow_domain::error::AreaFlowError;
use areaflow_domain::execution::{ExecutionRecord, ExecutionStatus};
use areaflow_domain::id::{AreaId, ExecutionId, ServiceAccountId, ServiceId, UserId};
use areaflow_domain::time::Timestamp;

/// Persistence for [`ServiceAccountLink`]s, one per `(user, service)`.
pub trait ServiceAccountRepository {
    /// Get the link of a user for a service.
    fn get(
        &self,
        user_id: UserId,
        service_id: ServiceId,
    ) -> impl Future<Output = Result<Option<ServiceAccountLink>, AreaFlowError>> + Send;

    /// Get a link by its surrogate identifier.
    fn get_by_id(
        &self,
        id: ServiceAccountId,
    ) -> impl Future<Output = Result<Option<ServiceAccountLink>, AreaFlowError>> + Send;

    /// All links owned by a user.
    fn find_by_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<ServiceAccountLink>, AreaFlowError>> + Send;

    /// Insert a new link.
    ///
    /// Fails with [`AreaFlowError::Conflict`] when the pair is already linked.
    fn create(
        &self,
        link: ServiceAccountLink,
    ) -> impl Future<Output = Result<ServiceAccountLink, AreaFlowError>> + Send;

    /// Insert `link`, or when the pair is already linked overwrite only the
    /// token fields and `updated_at` of the stored row in one atomic write.
    ///
    /// Returns the stored row, which keeps its original id and `created_at`.
    fn upsert_tokens(
        &self,
        link: ServiceAccountLink,
    ) -> impl Future<Output = Result<ServiceAccountLink, AreaFlowError>> + Send;

    /// Overwrite the token fields and `updated_at` of an existing link.
    ///
    /// Returns `None` when the link no longer exists.
    fn update_tokens(
        &self,
        link: &ServiceAccountLink,
    ) -> impl Future<Output = Result<Option<ServiceAccountLink>, AreaFlowError>> + Send;

    /// Store `provider_account_id` and `email` of an existing link.
    fn update_profile(
        &self,
        link: &ServiceAccountLink,
    ) -> impl Future<Output = Result<(), AreaFlowError>> + Send;

    /// Delete a link. Returns whether a row was removed.
    fn delete(
        &self,
        user_id: UserId,
        service_id: ServiceId,
    ) -> impl Future<Output = Result<bool, AreaFlowError>> + Send;
}

/// Persistence and queries for [`ExecutionRecord`]s.
pub trait ExecutionRepository {
    /// Insert a new record.
    fn create(
        &self,
        record: ExecutionRecord,
    ) -> impl Future<Output = Result<ExecutionRecord, AreaFlowError>> + Send;

    /// Get a record by its unique identifier.
    fn get_by_id(
        &self,
        id: ExecutionId,
    ) -> impl Future<Output = Result<Option<ExecutionRecord>, AreaFlowError>> + Send;

    /// Overwrite every mutable field of an existing record.
    ///
    /// Returns `None` when the record no longer exists.
    fn update(
        &self,
        record: ExecutionRecord,
    ) -> impl Future<Output = Result<Option<ExecutionRecord>, AreaFlowError>> + Send;

    /// Delete a record. Returns whether a row was removed.
    fn delete(&self, id: ExecutionId) -> impl Future<Output = Result<bool, AreaFlowError>> + Send;

    /// Delete every record of an area, returning how many were removed.
    fn delete_by_area(
        &self,
        area_id: AreaId,
    ) -> impl Future<Output = Result<u64, AreaFlowError>> + Send;

    /// Records of an area, newest-first.
    fn find_by_area(
        &self,
        area_id: AreaId,
    ) -> impl Future<Output = Result<Vec<ExecutionRecord>, AreaFlowError>> + Send;

    /// Records in a status, newest-first.
    fn find_by_status(
        &self,
        status: ExecutionStatus,
    ) -> impl Future<Output = Result<Vec<ExecutionRecord>, AreaFlowError>> + Send;

    /// The `limit` most recently created records, newest-first.
    fn find_recent(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ExecutionRecord>, AreaFlowError>> + Send;

    /// `RUNNING` records whose `started_at` is strictly before `cutoff`.
    fn find_running_started_before(
        &self,
        cutoff: Timestamp,
    ) -> impl Future<Output = Result<Vec<ExecutionRecord>, AreaFlowError>> + Send;

    /// `FAILED` records, optionally restricted to one area, newest-first.
    fn find_failed(
        &self,
        area_id: Option<AreaId>,
    ) -> impl Future<Output = Result<Vec<ExecutionRecord>, AreaFlowError>> + Send;

    /// Delete terminal records whose `completed_at` is strictly before `cutoff`.
    ///
    /// Returns the affected row count when the backend reports one.
    fn delete_terminal_completed_before(
        &self,
        cutoff: Timestamp,
    ) -> impl Future<Output = Result<Option<u64>, AreaFlowError>> + Send;

    /// Number of records per status, optionally restricted to one area.
    /// Statuses without records may be absent from the map.
    fn count_by_status(
        &self,
        area_id: Option<AreaId>,
    ) -> impl Future<Output = Result<HashMap<ExecutionStatus, u64>, AreaFlowError>> + Send;

    /// Mean `execution_time_ms` over records that have one, optionally
    /// restricted to one area. `None` when no record has a duration.
    fn average_duration_ms(
        &self,
        area_id: Option<AreaId>,
    ) -> impl Future<Output = Result<Option<f64>, AreaFlowError>> + Send;
}
