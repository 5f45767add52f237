//! Read-only status and health views over the loaded package set.
//!
//! Neither view exposes resource-scope values: the scope is reported as the
//! parameter name and a count only.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::join_all;
use hub_config::{ConfigStore, PackagePolicy};
use hub_primitives::{HealthCheck, HealthReport};
use hub_telemetry::HealthStatus;
use serde::Serialize;
use tracing::warn;

use crate::loader::{
    DiagnosticLevel, LayoutValidation, LoadDiagnostic, LoadedPackage, PackageState,
};

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Classified error as shown in the views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorView {
    /// Stable error class label.
    pub kind: String,
    /// Rendered message.
    pub message: String,
}

/// Configuration facts captured at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigSummary {
    /// Whether a configuration file was loaded.
    pub loaded: bool,
    /// Path the configuration was read from, if any.
    pub path: Option<PathBuf>,
    /// Declared schema version when loaded.
    pub schema_version: Option<String>,
    /// Load error when not loaded.
    pub error: Option<ErrorView>,
}

impl ConfigSummary {
    /// Captures the facts from a [`ConfigStore`].
    #[must_use]
    pub fn from_store(store: &ConfigStore) -> Self {
        Self {
            loaded: store.is_loaded(),
            path: store.path().map(PathBuf::from),
            schema_version: store
                .is_loaded()
                .then(|| store.config().schema_version.clone()),
            error: store.error().map(|err| ErrorView {
                kind: err.kind().to_owned(),
                message: err.to_string(),
            }),
        }
    }
}

/// Redacted policy summary for one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecuritySummary {
    /// Whether mutating tools may be exposed.
    pub allow_writes: bool,
    /// Size of the tool allowlist, when one is configured.
    pub allowed_tools: Option<usize>,
    /// Scoped parameter and number of permitted values.
    pub resource_scope: Option<ScopeSummary>,
}

/// Scope summary without the permitted values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeSummary {
    /// Scoped parameter name.
    pub param: String,
    /// Number of permitted values.
    pub allowed_count: usize,
}

impl SecuritySummary {
    fn of(policy: &PackagePolicy) -> Self {
        Self {
            allow_writes: policy.allow_writes,
            allowed_tools: policy.allowed_tools.as_ref().map(|tools| tools.len()),
            resource_scope: policy.resource_scope.as_ref().map(|scope| ScopeSummary {
                param: scope.param.clone(),
                allowed_count: scope.allowed.len(),
            }),
        }
    }
}

/// Result of a package's own health probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HealthCheckView {
    /// The probe returned a report.
    Report(HealthReport),
    /// The probe failed, panicked, or timed out.
    Failed {
        /// Failure message.
        error: String,
    },
}

/// Health entry for one configured package.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageHealth {
    /// Enabled in configuration.
    pub enabled: bool,
    /// Manifest loaded.
    pub loaded: bool,
    /// Manifest version when loaded.
    pub version: Option<String>,
    /// Number of tools registered for the package.
    pub tool_count: usize,
    /// Load error when loading failed.
    pub error: Option<ErrorView>,
    /// Filesystem layout checks.
    pub validation: LayoutValidation,
    /// Package health probe result, when the package declares one.
    pub health_check: Option<HealthCheckView>,
    /// Redacted policy.
    pub security: SecuritySummary,
}

/// Machine-readable health view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthView {
    /// Overall status.
    pub status: HealthStatus,
    /// When the view was produced.
    pub timestamp: DateTime<Utc>,
    /// Configuration facts.
    pub config: ConfigSummary,
    /// Per-package entries keyed by config name.
    pub packages: BTreeMap<String, PackageHealth>,
}

#[derive(Debug, Clone)]
struct PackageEntry {
    package: LoadedPackage,
    registered: Vec<String>,
}

/// Aggregates startup state into status text and health views.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    config: ConfigSummary,
    packages: Vec<PackageEntry>,
    diagnostics: Vec<LoadDiagnostic>,
}

impl StatusReporter {
    /// Creates a reporter for the given configuration facts.
    #[must_use]
    pub fn new(config: ConfigSummary) -> Self {
        Self {
            config,
            packages: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Adds one package together with the names registered for it.
    #[must_use]
    pub fn with_package(mut self, package: LoadedPackage, registered: Vec<String>) -> Self {
        self.packages.push(PackageEntry {
            package,
            registered,
        });
        self
    }

    /// Attaches loader diagnostics.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Vec<LoadDiagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Overall status derived from configuration and package state.
    #[must_use]
    pub fn overall(&self) -> HealthStatus {
        let enabled_failed = self.packages.iter().any(|entry| {
            matches!(
                entry.package.state(),
                PackageState::Failed | PackageState::EnabledButNotLoaded
            )
        });
        HealthStatus::derive(self.config.loaded, enabled_failed)
    }

    /// Renders the human-readable status.
    #[must_use]
    pub fn status_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "toolhub status: {}", self.overall());

        match (&self.config.path, &self.config.error) {
            (_, Some(err)) => {
                let _ = writeln!(out, "config: not loaded ({}: {})", err.kind, err.message);
            }
            (Some(path), None) => {
                let _ = writeln!(
                    out,
                    "config: {} (schema {})",
                    path.display(),
                    self.config.schema_version.as_deref().unwrap_or("?")
                );
            }
            (None, None) => {
                let _ = writeln!(
                    out,
                    "config: in memory (schema {})",
                    self.config.schema_version.as_deref().unwrap_or("?")
                );
            }
        }

        if self.packages.is_empty() {
            let _ = writeln!(out, "packages: none configured");
        } else {
            let _ = writeln!(out, "packages:");
        }

        for entry in &self.packages {
            let package = &entry.package;
            let policy = package.policy();
            let _ = writeln!(out, "  {}: {}", package.config_name(), state_line(entry));
            let _ = writeln!(out, "    path: {}", policy.path.display());
            if let Some(err) = package.load_error() {
                let _ = writeln!(out, "    hint: {}", err.hint());
            }
            if !policy.enabled {
                continue;
            }
            let _ = writeln!(
                out,
                "    writes: {}",
                if policy.allow_writes { "allowed" } else { "blocked" }
            );
            if let Some(tools) = &policy.allowed_tools {
                let _ = writeln!(out, "    allowlist: {} tools", tools.len());
            }
            if let Some(scope) = &policy.resource_scope {
                let _ = writeln!(
                    out,
                    "    resource scope: {} ({} allowed values)",
                    scope.param,
                    scope.allowed.len()
                );
            }
        }

        let warnings: Vec<&LoadDiagnostic> = self
            .diagnostics
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Warn)
            .collect();
        if !warnings.is_empty() {
            let _ = writeln!(out, "diagnostics:");
            for diagnostic in warnings {
                let _ = writeln!(out, "  {}: {}", diagnostic.package, diagnostic.message);
            }
        }

        out
    }

    /// Builds the machine-readable health view. Health checks and layout
    /// checks for all packages run concurrently.
    pub async fn health(&self) -> HealthView {
        let entries = join_all(self.packages.iter().map(package_health)).await;
        let packages = self
            .packages
            .iter()
            .map(|entry| entry.package.config_name().to_owned())
            .zip(entries)
            .collect();

        HealthView {
            status: self.overall(),
            timestamp: Utc::now(),
            config: self.config.clone(),
            packages,
        }
    }
}

async fn package_health(entry: &PackageEntry) -> PackageHealth {
    let package = &entry.package;
    let manifest = package.manifest();
    let health_check = match manifest.and_then(|m| m.health_check()) {
        Some(check) => Some(run_health_check(package.config_name(), check.as_ref()).await),
        None => None,
    };

    PackageHealth {
        enabled: package.policy().enabled,
        loaded: manifest.is_some(),
        version: manifest.map(|m| m.version().to_owned()),
        tool_count: entry.registered.len(),
        error: package.load_error().map(|err| ErrorView {
            kind: err.kind().to_owned(),
            message: err.to_string(),
        }),
        validation: package.layout().validate().await,
        health_check,
        security: SecuritySummary::of(package.policy()),
    }
}

async fn run_health_check(package: &str, check: &dyn HealthCheck) -> HealthCheckView {
    let call = AssertUnwindSafe(check.check()).catch_unwind();
    let result = match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, call).await {
        Ok(Ok(Ok(report))) => return HealthCheckView::Report(report),
        Ok(Ok(Err(err))) => err.to_string(),
        Ok(Err(_)) => "health check panicked".to_owned(),
        Err(_) => format!(
            "health check timed out after {}s",
            HEALTH_CHECK_TIMEOUT.as_secs()
        ),
    };
    warn!(package, error = %result, "package health check failed");
    HealthCheckView::Failed { error: result }
}

fn state_line(entry: &PackageEntry) -> String {
    let package = &entry.package;
    match package.state() {
        PackageState::Disabled => "disabled".to_owned(),
        PackageState::Loaded => {
            let version = package.manifest().map_or("?", |m| m.version());
            format!("loaded v{version} ({} tools)", entry.registered.len())
        }
        PackageState::Failed => match package.load_error() {
            Some(err) => format!("failed: {}: {err}", err.kind()),
            None => "failed".to_owned(),
        },
        PackageState::EnabledButNotLoaded => "enabled but not loaded".to_owned(),
    }
}
