//! Tool declarations exposed by packages.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::error::{Error, Result};
use crate::ids::validate_identifier;

/// Errors raised by delegated tool handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Handler reported a failure.
    #[error("{reason}")]
    Failed {
        /// Human-readable error returned by the handler.
        reason: String,
    },

    /// Handler panicked while executing.
    #[error("handler panicked: {reason}")]
    Panicked {
        /// Panic payload rendered as text when available.
        reason: String,
    },

    /// Handler did not complete within the configured wait.
    #[error("handler did not complete within {seconds}s")]
    TimedOut {
        /// Configured bound in seconds.
        seconds: u64,
    },
}

impl HandlerError {
    /// Creates a failure from the supplied reason.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// Textual result returned to the caller of an exposed tool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    text: String,
    #[serde(default)]
    is_error: bool,
}

impl ToolOutput {
    /// Successful result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    /// Error result.
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }

    /// Returns the result text.
    #[must_use]
    pub fn as_text(&self) -> &str {
        &self.text
    }

    /// Returns true when the result represents a failure or denial.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.is_error
    }

    /// Consumes the output, returning the text.
    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }
}

/// Trait implemented by tool handlers.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Executes the tool with validated JSON arguments.
    async fn call(&self, args: Value) -> std::result::Result<String, HandlerError>;
}

#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Send + Sync + Fn(Value) -> Fut,
    Fut: Future<Output = std::result::Result<String, HandlerError>> + Send,
{
    async fn call(&self, args: Value) -> std::result::Result<String, HandlerError> {
        (self)(args).await
    }
}

/// Operation declared by a package.
#[derive(Clone)]
pub struct ToolDefinition {
    name: String,
    description: String,
    parameter_schema: Value,
    mutates: bool,
    handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("mutates", &self.mutates)
            .finish_non_exhaustive()
    }
}

impl ToolDefinition {
    /// Starts building a tool definition.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ToolDefinitionBuilder {
        ToolDefinitionBuilder {
            name: name.into(),
            description: String::new(),
            parameter_schema: None,
            mutates: None,
            handler: None,
        }
    }

    /// Returns the tool name, unqualified.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the JSON schema describing accepted arguments.
    #[must_use]
    pub fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    /// Returns true when the tool changes external state.
    #[must_use]
    pub fn mutates(&self) -> bool {
        self.mutates
    }

    /// Returns the handler.
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn ToolHandler> {
        &self.handler
    }
}

/// Builder for [`ToolDefinition`].
pub struct ToolDefinitionBuilder {
    name: String,
    description: String,
    parameter_schema: Option<Value>,
    mutates: Option<bool>,
    handler: Option<Arc<dyn ToolHandler>>,
}

impl ToolDefinitionBuilder {
    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the JSON schema for arguments. Defaults to an empty object schema.
    #[must_use]
    pub fn parameter_schema(mut self, schema: Value) -> Self {
        self.parameter_schema = Some(schema);
        self
    }

    /// Declares whether the tool mutates state. Required.
    #[must_use]
    pub fn mutates(mut self, mutates: bool) -> Self {
        self.mutates = Some(mutates);
        self
    }

    /// Sets the handler.
    #[must_use]
    pub fn handler<H>(mut self, handler: H) -> Self
    where
        H: ToolHandler + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Finalises the definition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTool`] when the name is invalid, the mutation
    /// classification was never declared, or no handler was supplied.
    pub fn build(self) -> Result<ToolDefinition> {
        validate_identifier(&self.name).map_err(|err| Error::InvalidTool {
            reason: err.to_string(),
        })?;

        let mutates = self.mutates.ok_or_else(|| Error::InvalidTool {
            reason: format!("tool `{}` must declare whether it mutates state", self.name),
        })?;

        let handler = self.handler.ok_or_else(|| Error::InvalidTool {
            reason: format!("tool `{}` has no handler", self.name),
        })?;

        Ok(ToolDefinition {
            name: self.name,
            description: self.description,
            parameter_schema: self
                .parameter_schema
                .unwrap_or_else(|| json!({ "type": "object" })),
            mutates,
            handler,
        })
    }
}
