//! # areaflow-adapter-oauth-reqwest
//!
//! OAuth2 provider client using [reqwest](https://docs.rs/reqwest).
//!
//! ## Responsibilities
//! - Implement the `OAuth2Provider` port defined in `areaflow-app::ports::oauth`
//! - Speak the token endpoint dialect of each supported provider
//!   (see [`ProviderKind`]) and normalize responses into `TokenGrant`s
//! - Summarize provider and transport failures without leaking secrets
//!
//! ## Dependency rule
//! Depends on `areaflow-app` (for the port trait) and `areaflow-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod client;
pub mod config;
pub mod error;
mod responses;

pub use client::ReqwestOAuth2Client;
pub use config::{ProviderConfig, ProviderKind};
pub use error::OAuthError;
