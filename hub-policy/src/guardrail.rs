//! Per-call guardrail pipeline.
//!
//! Every exposed tool is wrapped in a [`GuardedTool`]. A call runs, in order:
//! argument validation, resource scoping, delegated execution, and audit.
//! Scoping strictly precedes execution, so a denied call never reaches the
//! handler. Handler failures, panics, and timeouts become error results and
//! never escape [`GuardedTool::invoke`].

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use hub_config::PackagePolicy;
use hub_primitives::{HandlerError, ToolDefinition, ToolOutput};
use hub_telemetry::{AuditSink, InvocationRecord, Outcome};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::scope::check_scope;
use crate::validation::ArgumentValidator;

/// Policy and audit context shared by every tool of one package.
///
/// Fixed at registration; concurrent calls observe the same policy.
pub struct GuardrailPipeline {
    package: String,
    policy: Arc<PackagePolicy>,
    audit: Option<Arc<dyn AuditSink>>,
    timeout: Option<Duration>,
}

impl fmt::Debug for GuardrailPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardrailPipeline")
            .field("package", &self.package)
            .field("allow_writes", &self.policy.allow_writes)
            .field("scoped", &self.policy.resource_scope.is_some())
            .field("audit", &self.audit.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GuardrailPipeline {
    /// Creates a pipeline for `package` with no audit sink and no timeout.
    #[must_use]
    pub fn new(package: impl Into<String>, policy: Arc<PackagePolicy>) -> Self {
        Self {
            package: package.into(),
            policy,
            audit: None,
            timeout: None,
        }
    }

    /// Records one audit entry per call into `sink`.
    #[must_use]
    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Bounds delegated handler execution.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the package config name.
    #[must_use]
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Returns the package policy.
    #[must_use]
    pub fn policy(&self) -> &PackagePolicy {
        &self.policy
    }

    async fn run(
        &self,
        tool: &ToolDefinition,
        validator: &ArgumentValidator,
        args: Value,
    ) -> (ToolOutput, Outcome) {
        let args = match args {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };

        if let Err(problems) = validator.check(&args) {
            debug!(package = %self.package, tool = tool.name(), "arguments rejected by schema");
            return (
                ToolOutput::error(format!(
                    "Invalid arguments for {}_{}: {}",
                    self.package,
                    tool.name(),
                    problems.join("; ")
                )),
                Outcome::Errored,
            );
        }

        let decision = check_scope(self.policy.resource_scope.as_ref(), &self.package, &args);
        if decision.is_deny() {
            warn!(
                package = %self.package,
                tool = tool.name(),
                value = decision.rejected_value().unwrap_or_default(),
                "resource scope denied call"
            );
            let reason = decision.reason().unwrap_or("Access denied").to_owned();
            return (ToolOutput::error(reason), Outcome::Denied);
        }

        match self.delegate(tool, args).await {
            Ok(text) => (ToolOutput::text(text), Outcome::Allowed),
            Err(err) => {
                warn!(package = %self.package, tool = tool.name(), error = %err, "tool handler failed");
                (ToolOutput::error(format!("Error: {err}")), Outcome::Errored)
            }
        }
    }

    async fn delegate(&self, tool: &ToolDefinition, args: Value) -> Result<String, HandlerError> {
        let call = AssertUnwindSafe(tool.handler().call(args)).catch_unwind();
        let joined = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| HandlerError::TimedOut {
                    seconds: limit.as_secs(),
                })?,
            None => call.await,
        };
        joined.unwrap_or_else(|payload| {
            Err(HandlerError::Panicked {
                reason: panic_message(payload.as_ref()),
            })
        })
    }

    async fn audit(&self, tool: &str, elapsed: Duration, outcome: Outcome) {
        let Some(sink) = &self.audit else {
            return;
        };
        let record = InvocationRecord::new(&self.package, tool, elapsed, outcome);
        if let Err(err) = sink.record(&record).await {
            warn!(package = %self.package, tool, error = %err, "failed to write audit record");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

/// Tool definition bound to its package pipeline and compiled schema.
#[derive(Clone)]
pub struct GuardedTool {
    definition: ToolDefinition,
    validator: ArgumentValidator,
    pipeline: Arc<GuardrailPipeline>,
}

impl fmt::Debug for GuardedTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedTool")
            .field("definition", &self.definition)
            .field("package", &self.pipeline.package)
            .finish_non_exhaustive()
    }
}

impl GuardedTool {
    /// Binds `definition` to `pipeline`, compiling its parameter schema.
    ///
    /// # Errors
    ///
    /// Returns the schema compiler's message when the declared schema is
    /// unusable.
    pub fn new(definition: ToolDefinition, pipeline: Arc<GuardrailPipeline>) -> Result<Self, String> {
        let validator = ArgumentValidator::compile(definition.parameter_schema())?;
        Ok(Self {
            definition,
            validator,
            pipeline,
        })
    }

    /// Returns the wrapped definition.
    #[must_use]
    pub fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    /// Returns the package pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Arc<GuardrailPipeline> {
        &self.pipeline
    }

    /// Runs the full guardrail pipeline for one call.
    pub async fn invoke(&self, args: Value) -> ToolOutput {
        let started = Instant::now();
        let (output, outcome) = self
            .pipeline
            .run(&self.definition, &self.validator, args)
            .await;
        self.pipeline
            .audit(self.definition.name(), started.elapsed(), outcome)
            .await;
        output
    }
}
