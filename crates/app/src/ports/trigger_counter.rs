//! Area trigger counter port.

use std::future::Future;

use areaflow_domain::error::AreaFlowError;
use areaflow_domain::id::AreaId;

/// Increments the trigger counter an AREA keeps of its own firings.
///
/// Called once per created execution record from a detached task; callers
/// never wait on it and failures are only logged.
pub trait AreaTriggerCounter {
    fn increment(&self, area_id: AreaId) -> impl Future<Output = Result<(), AreaFlowError>> + Send;
}
