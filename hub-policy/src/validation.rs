//! Argument validation against a tool's declared schema.

use std::fmt;
use std::sync::Arc;

use jsonschema::Validator;
use serde_json::Value;

const MAX_REPORTED_ERRORS: usize = 5;

/// Compiled parameter schema for one tool.
#[derive(Clone)]
pub struct ArgumentValidator {
    validator: Arc<Validator>,
}

impl fmt::Debug for ArgumentValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgumentValidator").finish_non_exhaustive()
    }
}

impl ArgumentValidator {
    /// Compiles a JSON schema.
    ///
    /// # Errors
    ///
    /// Returns the compiler's message when `schema` is not a usable schema.
    pub fn compile(schema: &Value) -> Result<Self, String> {
        let validator = jsonschema::validator_for(schema).map_err(|err| err.to_string())?;
        Ok(Self {
            validator: Arc::new(validator),
        })
    }

    /// Checks `args`, returning up to a handful of violation messages.
    ///
    /// # Errors
    ///
    /// Returns the violations when `args` does not conform.
    pub fn check(&self, args: &Value) -> Result<(), Vec<String>> {
        let problems: Vec<String> = self
            .validator
            .iter_errors(args)
            .take(MAX_REPORTED_ERRORS)
            .map(|err| err.to_string())
            .collect();

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "spreadsheet_id": { "type": "string" },
                "limit": { "type": "integer", "minimum": 1 }
            },
            "required": ["spreadsheet_id"]
        })
    }

    #[test]
    fn accepts_conforming_arguments() {
        let validator = ArgumentValidator::compile(&schema()).unwrap();
        assert!(validator.check(&json!({ "spreadsheet_id": "abc", "limit": 3 })).is_ok());
    }

    #[test]
    fn reports_violations() {
        let validator = ArgumentValidator::compile(&schema()).unwrap();
        let problems = validator
            .check(&json!({ "limit": 0 }))
            .expect_err("missing required field");
        assert!(!problems.is_empty());
        assert!(problems.len() <= MAX_REPORTED_ERRORS);
    }

    #[test]
    fn rejects_unusable_schema() {
        assert!(ArgumentValidator::compile(&json!({ "type": "no-such-type" })).is_err());
    }
}
