//! Observability utilities for toolhub.
//!
//! Invocation audit records and the sinks that persist them live here, along
//! with the tracing bootstrap used by binaries and the overall health levels
//! reported by the status surface.

#![warn(missing_docs, clippy::pedantic)]

pub mod health;
pub mod record;
pub mod sink;
pub mod tracing_support;

pub use health::HealthStatus;
pub use record::{InvocationRecord, Outcome};
pub use sink::{AuditError, AuditResult, AuditSink, FileAuditSink, MemoryAuditSink, TracingAuditSink};
pub use tracing_support::init_tracing;
