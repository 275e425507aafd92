//! Service — a catalog entry describing an external integration/provider.
//!
//! Services are reference data owned by the catalog. This crate only reads
//! them to decide whether an OAuth2 account may be linked and which provider
//! client handles it (selected by [`Service::name`]).

use serde::{Deserialize, Serialize};

use crate::error::{AreaFlowError, ValidationError};
use crate::id::ServiceId;

/// An external integration users can connect to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
    pub requires_auth: bool,
}

impl Service {
    /// Create a builder for constructing a [`Service`].
    #[must_use]
    pub fn builder() -> ServiceBuilder {
        ServiceBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AreaFlowError::Validation`] when `name` is empty.
    pub fn validate(&self) -> Result<(), AreaFlowError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }

    /// Non-secret summary embedded in read-side representations.
    #[must_use]
    pub fn summary(&self) -> ServiceSummary {
        ServiceSummary {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// Identity fields of a [`Service`] exposed next to a linked account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSummary {
    pub id: ServiceId,
    pub name: String,
}

/// Step-by-step builder for [`Service`].
#[derive(Debug, Default)]
pub struct ServiceBuilder {
    id: Option<ServiceId>,
    name: Option<String>,
    requires_auth: Option<bool>,
}

impl ServiceBuilder {
    #[must_use]
    pub fn id(mut self, id: ServiceId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn requires_auth(mut self, requires_auth: bool) -> Self {
        self.requires_auth = Some(requires_auth);
        self
    }

    /// Consume the builder, validate, and return a [`Service`].
    ///
    /// `requires_auth` defaults to `true`.
    ///
    /// # Errors
    ///
    /// Returns [`AreaFlowError::Validation`] if `name` is missing or empty.
    pub fn build(self) -> Result<Service, AreaFlowError> {
        let service = Service {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            requires_auth: self.requires_auth.unwrap_or(true),
        };
        service.validate()?;
        Ok(service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_build_service_requiring_auth_by_default() {
        let service = Service::builder().name("google").build().unwrap();
        assert_eq!(service.name, "google");
        assert!(service.requires_auth);
    }

    #[test]
    fn should_return_validation_error_when_name_is_empty() {
        let result = Service::builder().build();
        assert!(matches!(
            result,
            Err(AreaFlowError::Validation(ValidationError::EmptyName))
        ));
    }

    #[test]
    fn should_summarize_without_auth_flag() {
        let service = Service::builder()
            .name("timer")
            .requires_auth(false)
            .build()
            .unwrap();
        let summary = service.summary();
        assert_eq!(summary.id, service.id);
        assert_eq!(summary.name, "timer");
    }
}
