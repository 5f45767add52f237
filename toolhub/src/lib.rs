//! Policy-enforcing tool hub facade.
//!
//! Bundles the toolhub crates behind feature flags. Most embedders only need
//! [`kernel::Orchestrator`] together with a [`kernel::ManifestSource`].

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use hub_primitives as primitives;

/// Package loading, status, and the orchestrator (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use hub_kernel as kernel;

/// Configuration schema and loading (enabled by `config` feature).
#[cfg(feature = "config")]
pub use hub_config as config;

/// Exposure filtering and guardrails (enabled by `policy` feature).
#[cfg(feature = "policy")]
pub use hub_policy as policy;

/// Audit records and tracing bootstrap (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use hub_telemetry as telemetry;

/// Namespaced tool registry (enabled by `tools` feature).
#[cfg(feature = "tools")]
pub use hub_tools as tools;
