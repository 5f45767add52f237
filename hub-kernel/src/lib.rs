//! Orchestrator context for toolhub.
//!
//! [`Orchestrator::initialize`] loads every configured package, registers the
//! policy-filtered tools behind their guardrail pipelines, and binds the two
//! builtin operations (`toolhub_status`, `toolhub_health`). The resulting
//! context is immutable: calls share it without locking.

#![warn(missing_docs, clippy::pedantic)]

mod loader;
mod process;
mod static_source;
mod status;

use std::fmt;
use std::sync::Arc;

use hub_config::{ConfigStore, OrchestratorConfig, PackagePolicy, Settings};
use hub_policy::GuardrailPipeline;
use hub_primitives::{HandlerError, QualifiedName, ToolDefinition, ToolOutput};
use hub_telemetry::{AuditSink, FileAuditSink, TracingAuditSink};
use hub_tools::{RegistryError, ToolRegistry, ToolSummary};
use serde_json::{Value, json};
use tracing::{error, info, warn};

pub use loader::{
    DIST_DIR, DiagnosticLevel, ENTRY_POINT, LayoutValidation, LoadDiagnostic, LoadedPackage,
    ManifestSource, PackageLayout, PackageLoadError, PackageLoader, PackageState,
};
pub use process::ProcessSource;
pub use static_source::StaticSource;
pub use status::{
    ConfigSummary, ErrorView, HealthCheckView, HealthView, PackageHealth, ScopeSummary,
    SecuritySummary, StatusReporter,
};

/// Package key under which builtin operations are namespaced.
pub const BUILTIN_PACKAGE: &str = "toolhub";
/// Qualified name of the status operation.
pub const STATUS_TOOL: &str = "toolhub_status";
/// Qualified name of the health operation.
pub const HEALTH_TOOL: &str = "toolhub_health";

const BUILTIN_TOOLS: [&str; 2] = ["status", "health"];

/// Immutable runtime context shared by every call.
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<OrchestratorConfig>,
    registry: Arc<ToolRegistry>,
    reporter: Arc<StatusReporter>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("packages", &self.config.packages.len())
            .field("tools", &self.registry.len())
            .field("status", &self.reporter.overall())
            .finish()
    }
}

impl Orchestrator {
    /// Builds the context, deriving the audit sink from the settings.
    ///
    /// Never fails: configuration and package errors are recorded and
    /// surfaced through the status and health operations.
    pub async fn initialize(store: ConfigStore, source: Arc<dyn ManifestSource>) -> Self {
        let audit = audit_sink(&store.config().settings).await;
        Self::initialize_with_audit(store, source, audit).await
    }

    /// Builds the context with an explicit audit sink (`None` disables auditing).
    pub async fn initialize_with_audit(
        store: ConfigStore,
        source: Arc<dyn ManifestSource>,
        audit: Option<Arc<dyn AuditSink>>,
    ) -> Self {
        if let Some(err) = store.error() {
            warn!(kind = err.kind(), error = %err, "continuing with an empty package set");
        }

        let config = Arc::clone(store.config());
        let timeout = config.settings.handler_timeout();

        let mut registry = ToolRegistry::new();
        for tool in BUILTIN_TOOLS {
            if let Ok(name) = QualifiedName::new(BUILTIN_PACKAGE, tool) {
                registry.reserve(&name);
            }
        }

        let mut loader = PackageLoader::new(source);
        let loaded = loader.load_all(&config).await;

        let mut reporter = StatusReporter::new(ConfigSummary::from_store(&store));
        for package in loaded {
            let registered = match package.manifest() {
                Some(manifest) => {
                    let mut pipeline =
                        GuardrailPipeline::new(package.config_name(), Arc::clone(package.policy()))
                            .with_timeout(timeout);
                    if let Some(sink) = &audit {
                        pipeline = pipeline.with_audit(Arc::clone(sink));
                    }
                    registry
                        .register_package(package.config_name(), manifest, &Arc::new(pipeline))
                        .registered
                        .into_iter()
                        .map(String::from)
                        .collect()
                }
                None => Vec::new(),
            };
            reporter = reporter.with_package(package, registered);
        }

        let reporter = Arc::new(reporter.with_diagnostics(loader.into_diagnostics()));
        register_builtins(&mut registry, &reporter);

        info!(
            packages = config.packages.len(),
            enabled = config.enabled_packages().count(),
            tools = registry.len(),
            status = %reporter.overall(),
            "orchestrator initialised"
        );

        Self {
            config,
            registry: Arc::new(registry),
            reporter,
        }
    }

    /// Invokes a tool by qualified name. Unknown names yield an error output.
    pub async fn call(&self, name: &str, args: Value) -> ToolOutput {
        match self.registry.invoke(name, args).await {
            Ok(output) => output,
            Err(RegistryError::UnknownTool { name }) => {
                ToolOutput::error(format!("Unknown tool: {name}"))
            }
            Err(err) => ToolOutput::error(err.to_string()),
        }
    }

    /// Lists every exposed tool, builtins included.
    #[must_use]
    pub fn tools(&self) -> Vec<ToolSummary> {
        self.registry.list()
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Returns the configuration in effect.
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Returns the status reporter.
    #[must_use]
    pub fn reporter(&self) -> &StatusReporter {
        &self.reporter
    }

    /// Human-readable status.
    #[must_use]
    pub fn status_text(&self) -> String {
        self.reporter.status_text()
    }

    /// Machine-readable health, including package probes.
    pub async fn health(&self) -> HealthView {
        self.reporter.health().await
    }
}

/// Selects the audit sink described by `settings`.
///
/// Returns `None` when invocation logging is off. A log file that cannot be
/// opened falls back to the diagnostic stream.
pub async fn audit_sink(settings: &Settings) -> Option<Arc<dyn AuditSink>> {
    if !settings.log_invocations {
        return None;
    }
    let Some(path) = &settings.log_file else {
        return Some(Arc::new(TracingAuditSink));
    };
    match FileAuditSink::open(path).await {
        Ok(sink) => {
            info!(path = %path.display(), "writing invocation records to file");
            Some(Arc::new(sink))
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "cannot open invocation log; using stderr");
            Some(Arc::new(TracingAuditSink))
        }
    }
}

fn register_builtins(registry: &mut ToolRegistry, reporter: &Arc<StatusReporter>) {
    let pipeline = Arc::new(GuardrailPipeline::new(
        BUILTIN_PACKAGE,
        Arc::new(PackagePolicy::new("<builtin>")),
    ));

    let tools = builtin_tools(reporter);
    let tools = match tools {
        Ok(tools) => tools,
        Err(err) => {
            error!(error = %err, "failed to define builtin tools");
            return;
        }
    };

    for tool in &tools {
        if let Err(err) = registry.register_builtin(BUILTIN_PACKAGE, tool, &pipeline) {
            error!(tool = tool.name(), error = %err, "failed to register builtin tool");
        }
    }
}

fn builtin_tools(reporter: &Arc<StatusReporter>) -> hub_primitives::Result<Vec<ToolDefinition>> {
    let no_args = json!({ "type": "object", "properties": {}, "additionalProperties": false });

    let status_reporter = Arc::clone(reporter);
    let status = ToolDefinition::builder("status")
        .description("Show configured packages, their load state, and policy summary")
        .parameter_schema(no_args.clone())
        .mutates(false)
        .handler(move |_args: Value| {
            let reporter = Arc::clone(&status_reporter);
            async move { Ok(reporter.status_text()) }
        })
        .build()?;

    let health_reporter = Arc::clone(reporter);
    let health = ToolDefinition::builder("health")
        .description("Report overall and per-package health as JSON")
        .parameter_schema(no_args)
        .mutates(false)
        .handler(move |_args: Value| {
            let reporter = Arc::clone(&health_reporter);
            async move {
                let view = reporter.health().await;
                serde_json::to_string_pretty(&view)
                    .map_err(|err| HandlerError::failed(format!("failed to encode health: {err}")))
            }
        })
        .build()?;

    Ok(vec![status, health])
}
