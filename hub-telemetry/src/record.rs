//! Invocation audit records.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result class of an invocation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The handler ran and returned a result.
    Allowed,
    /// A guardrail rejected the call before the handler ran.
    Denied,
    /// Arguments were invalid, or the handler failed, panicked, or timed out.
    Errored,
}

/// One line of the invocation log. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationRecord {
    ts: DateTime<Utc>,
    package: String,
    tool: String,
    duration_ms: u64,
    outcome: Outcome,
}

impl InvocationRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(
        package: impl Into<String>,
        tool: impl Into<String>,
        duration: Duration,
        outcome: Outcome,
    ) -> Self {
        Self {
            ts: Utc::now(),
            package: package.into(),
            tool: tool.into(),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            outcome,
        }
    }

    /// Returns the completion timestamp.
    #[must_use]
    pub fn ts(&self) -> DateTime<Utc> {
        self.ts
    }

    /// Returns the package config name.
    #[must_use]
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Returns the unqualified tool name.
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Returns the wall-clock duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Returns the outcome.
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }
}
