//! Policy decision types returned by guardrail checks.

use serde::{Deserialize, Serialize};

/// Describes the outcome of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// Call may proceed.
    Allow,
    /// Call is rejected before reaching the handler.
    Deny,
}

/// Structured decision emitted by a guardrail check.
///
/// A denial is a normal value, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    kind: DecisionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rejected_value: Option<String>,
}

impl PolicyDecision {
    /// Returns an allow decision with no additional context.
    #[must_use]
    pub fn allow() -> Self {
        Self {
            kind: DecisionKind::Allow,
            reason: None,
            rejected_value: None,
        }
    }

    /// Returns a deny decision with an explanatory reason.
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            kind: DecisionKind::Deny,
            reason: Some(reason.into()),
            rejected_value: None,
        }
    }

    /// Attaches the value that caused a denial.
    #[must_use]
    pub fn with_rejected_value(mut self, value: impl Into<String>) -> Self {
        self.rejected_value = Some(value.into());
        self
    }

    /// Returns the decision kind.
    #[must_use]
    pub fn kind(&self) -> DecisionKind {
        self.kind
    }

    /// Returns true when the decision allows the call to proceed.
    #[must_use]
    pub fn is_allow(&self) -> bool {
        self.kind == DecisionKind::Allow
    }

    /// Returns true when the decision denies the call.
    #[must_use]
    pub fn is_deny(&self) -> bool {
        self.kind == DecisionKind::Deny
    }

    /// Returns the optional reason associated with the decision.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Returns the rejected value, if the denial names one.
    #[must_use]
    pub fn rejected_value(&self) -> Option<&str> {
        self.rejected_value.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_helpers_work() {
        let allow = PolicyDecision::allow();
        assert!(allow.is_allow());
        assert!(!allow.is_deny());
        assert_eq!(allow.reason(), None);

        let deny = PolicyDecision::deny("blocked").with_rejected_value("evil");
        assert!(deny.is_deny());
        assert_eq!(deny.kind(), DecisionKind::Deny);
        assert_eq!(deny.reason(), Some("blocked"));
        assert_eq!(deny.rejected_value(), Some("evil"));
    }
}
