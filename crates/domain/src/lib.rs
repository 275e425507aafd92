//! # areaflow-domain
//!
//! Pure domain model for areaflow.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps, secrets
//! - Define **Services** and **Users** as consumed reference data
//! - Define **Service account links** (stored OAuth2 credentials) and their
//!   secret-free read representation
//! - Define **Token grants** normalized across OAuth2 providers
//! - Define **Execution records**, their permissive lifecycle and the single
//!   duration formula, plus **Execution stats**
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod secret;
pub mod time;

pub mod account_link;
pub mod execution;
pub mod execution_stats;
pub mod oauth;
pub mod service;
pub mod user;
