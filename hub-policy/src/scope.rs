//! Resource scoping of call arguments.

use hub_config::ResourceScope;
use serde_json::Value;

use crate::decision::PolicyDecision;

const MAX_ECHOED_VALUE_LEN: usize = 128;

/// Checks the scoped parameter of `args` against the package's allowlist.
///
/// Calls that do not carry the scoped parameter pass through. Denials name
/// the rejected value but never the allowed set.
#[must_use]
pub fn check_scope(scope: Option<&ResourceScope>, package: &str, args: &Value) -> PolicyDecision {
    let Some(scope) = scope else {
        return PolicyDecision::allow();
    };
    let Some(value) = args.get(&scope.param) else {
        return PolicyDecision::allow();
    };

    match scalar_text(value) {
        Some(text) if scope.permits(&text) => PolicyDecision::allow(),
        Some(text) => {
            let shown = truncate(&text);
            PolicyDecision::deny(format!(
                "Access denied: {} '{shown}' is not within the resource scope configured for package '{package}'",
                scope.param
            ))
            .with_rejected_value(shown)
        }
        None => {
            let shown = truncate(&value.to_string());
            PolicyDecision::deny(format!(
                "Access denied: {} must be a single scalar value, got {shown}",
                scope.param
            ))
            .with_rejected_value(shown)
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_ECHOED_VALUE_LEN {
        return text.to_owned();
    }
    let mut shown: String = text.chars().take(MAX_ECHOED_VALUE_LEN).collect();
    shown.push('…');
    shown
}
