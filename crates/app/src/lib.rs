//! # areaflow-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `ServiceAccountRepository` — one credential per (user, service)
//!   - `ExecutionRepository` — execution records and their aggregates
//!   - `ServiceRepository` / `UserRepository` — read-only catalog lookups
//!   - `OAuth2Provider` — code exchange, refresh, profile lookup
//!   - `AreaTriggerCounter` — fire-and-forget trigger counting
//! - Define **driving/inbound ports** as use-case structs:
//!   - `ServiceLinkService` — link, unlink, refresh, read views
//!   - `ExecutionService` — the execution lifecycle
//!   - `ExecutionStatsAggregator` — read-only statistics
//! - Orchestrate domain objects without knowing *how* persistence or IO works
//!
//! ## Dependency rule
//! Depends on `areaflow-domain` only (plus `tokio` for locks and detached tasks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod keyed_lock;
pub mod ports;
pub mod services;
