//! Catalog ports — read-only lookups of reference data owned elsewhere.

use std::future::Future;

use areaflow_domain::error::AreaFlowError;
use areaflow_domain::id::{ServiceId, UserId};
use areaflow_domain::service::Service;
use areaflow_domain::user::User;

/// Lookup of catalog [`Service`]s.
pub trait ServiceRepository {
    /// Get a service by its unique identifier.
    fn get_by_id(
        &self,
        id: ServiceId,
    ) -> impl Future<Output = Result<Option<Service>, AreaFlowError>> + Send;
}

/// Lookup of platform [`User`]s.
pub trait UserRepository {
    /// Get a user by its unique identifier.
    fn get_by_id(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<User>, AreaFlowError>> + Send;
}
