//! Package discovery with per-package failure isolation.
//!
//! [`PackageLoader`] turns every configured package into exactly one
//! [`LoadedPackage`], whatever happens while loading it. Failures are
//! classified and recorded; they never stop the next package from loading.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use hub_config::{OrchestratorConfig, PackagePolicy};
use hub_primitives::PackageManifest;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

/// Build directory inside a package root.
pub const DIST_DIR: &str = "dist";
/// Manifest file inside the build directory.
pub const ENTRY_POINT: &str = "manifest.json";

/// Classified reasons a package failed to load.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PackageLoadError {
    /// The package root exists but its build output does not.
    #[error("package is not built: {} is missing", dist.display())]
    NotBuilt {
        /// Build artefact that was expected.
        dist: PathBuf,
    },
    /// The configured path does not exist.
    #[error("package path not found: {}", path.display())]
    PathNotFound {
        /// Configured path.
        path: PathBuf,
    },
    /// The manifest was found but does not match the contract.
    #[error("malformed manifest: {reason}")]
    MalformedManifest {
        /// What was wrong with it.
        reason: String,
    },
    /// Anything else.
    #[error("load failure: {reason}")]
    LoadFailure {
        /// Raw message from the failing operation.
        reason: String,
    },
}

impl PackageLoadError {
    /// Stable machine-readable label for the error class.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotBuilt { .. } => "not_built",
            Self::PathNotFound { .. } => "path_not_found",
            Self::MalformedManifest { .. } => "malformed_manifest",
            Self::LoadFailure { .. } => "load_failure",
        }
    }

    /// Operator-facing suggestion for fixing the failure.
    #[must_use]
    pub fn hint(&self) -> &'static str {
        match self {
            Self::NotBuilt { .. } => "build the package so that dist/manifest.json exists",
            Self::PathNotFound { .. } => "check the package path in the configuration",
            Self::MalformedManifest { .. } => "fix the package manifest so it declares its tools",
            Self::LoadFailure { .. } => "inspect the logs for the underlying error",
        }
    }

    /// Creates a malformed-manifest error.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedManifest {
            reason: reason.into(),
        }
    }

    /// Creates a generic load failure.
    #[must_use]
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::LoadFailure {
            reason: reason.into(),
        }
    }
}

/// Filesystem layout expected under a package path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageLayout {
    root: PathBuf,
    dist: PathBuf,
    entry_point: PathBuf,
}

/// Existence checks over a [`PackageLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayoutValidation {
    /// The configured path exists.
    pub path_exists: bool,
    /// The build directory exists.
    pub dist_exists: bool,
    /// The manifest file exists.
    pub entry_point_exists: bool,
}

impl PackageLayout {
    /// Derives the layout for a package rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let dist = root.join(DIST_DIR);
        let entry_point = dist.join(ENTRY_POINT);
        Self {
            root,
            dist,
            entry_point,
        }
    }

    /// Returns the package root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the build directory.
    #[must_use]
    pub fn dist(&self) -> &Path {
        &self.dist
    }

    /// Returns the manifest file path.
    #[must_use]
    pub fn entry_point(&self) -> &Path {
        &self.entry_point
    }

    /// Checks the filesystem without blocking the runtime.
    pub async fn validate(&self) -> LayoutValidation {
        let (root, dist, entry_point) = tokio::join!(
            tokio::fs::metadata(&self.root),
            tokio::fs::metadata(&self.dist),
            tokio::fs::metadata(&self.entry_point),
        );
        LayoutValidation {
            path_exists: root.is_ok(),
            dist_exists: dist.is_ok_and(|meta| meta.is_dir()),
            entry_point_exists: entry_point.is_ok_and(|meta| meta.is_file()),
        }
    }

    /// Classifies a missing layout component, if any.
    ///
    /// # Errors
    ///
    /// Returns [`PackageLoadError::PathNotFound`] when the root is missing and
    /// [`PackageLoadError::NotBuilt`] when the build output is missing.
    pub async fn ensure_built(&self) -> Result<(), PackageLoadError> {
        let validation = self.validate().await;
        if !validation.path_exists {
            return Err(PackageLoadError::PathNotFound {
                path: self.root.clone(),
            });
        }
        if !validation.dist_exists {
            return Err(PackageLoadError::NotBuilt {
                dist: self.dist.clone(),
            });
        }
        if !validation.entry_point_exists {
            return Err(PackageLoadError::NotBuilt {
                dist: self.entry_point.clone(),
            });
        }
        Ok(())
    }
}

/// Capability loader behind the fixed manifest contract.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Produces the manifest for the package configured as `name`.
    async fn load(&self, name: &str, layout: &PackageLayout)
    -> Result<PackageManifest, PackageLoadError>;
}

/// Load state of one configured package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageState {
    /// Disabled in configuration; never loaded.
    Disabled,
    /// Manifest loaded.
    Loaded,
    /// Loading failed with a classified error.
    Failed,
    /// Enabled, but no load was attempted or completed.
    EnabledButNotLoaded,
}

/// Outcome of processing one configured package.
#[derive(Clone)]
pub struct LoadedPackage {
    config_name: String,
    policy: Arc<PackagePolicy>,
    layout: PackageLayout,
    manifest: Option<PackageManifest>,
    load_error: Option<PackageLoadError>,
}

impl fmt::Debug for LoadedPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedPackage")
            .field("config_name", &self.config_name)
            .field("state", &self.state())
            .field("load_error", &self.load_error)
            .finish_non_exhaustive()
    }
}

impl LoadedPackage {
    /// Record for a package that was never loaded.
    #[must_use]
    pub fn not_loaded(config_name: impl Into<String>, policy: Arc<PackagePolicy>) -> Self {
        let layout = PackageLayout::new(&policy.path);
        Self {
            config_name: config_name.into(),
            policy,
            layout,
            manifest: None,
            load_error: None,
        }
    }

    /// Returns the package's configuration key.
    #[must_use]
    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    /// Returns the package policy.
    #[must_use]
    pub fn policy(&self) -> &Arc<PackagePolicy> {
        &self.policy
    }

    /// Returns the on-disk layout derived from the configured path.
    #[must_use]
    pub fn layout(&self) -> &PackageLayout {
        &self.layout
    }

    /// Returns the manifest when loading succeeded.
    #[must_use]
    pub fn manifest(&self) -> Option<&PackageManifest> {
        self.manifest.as_ref()
    }

    /// Returns the classified error when loading failed.
    #[must_use]
    pub fn load_error(&self) -> Option<&PackageLoadError> {
        self.load_error.as_ref()
    }

    /// Summarises the load state.
    #[must_use]
    pub fn state(&self) -> PackageState {
        if !self.policy.enabled {
            PackageState::Disabled
        } else if self.manifest.is_some() {
            PackageState::Loaded
        } else if self.load_error.is_some() {
            PackageState::Failed
        } else {
            PackageState::EnabledButNotLoaded
        }
    }
}

/// Severity of a [`LoadDiagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticLevel {
    /// Informational.
    Info,
    /// Recoverable failure.
    Warn,
}

/// Message recorded while processing one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadDiagnostic {
    /// Package config name.
    pub package: String,
    /// Severity.
    pub level: DiagnosticLevel,
    /// Rendered message.
    pub message: String,
}

/// Loads packages through a [`ManifestSource`], isolating failures.
pub struct PackageLoader {
    source: Arc<dyn ManifestSource>,
    diagnostics: Vec<LoadDiagnostic>,
}

impl fmt::Debug for PackageLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageLoader")
            .field("diagnostics", &self.diagnostics.len())
            .finish_non_exhaustive()
    }
}

impl PackageLoader {
    /// Creates a loader over `source`.
    #[must_use]
    pub fn new(source: Arc<dyn ManifestSource>) -> Self {
        Self {
            source,
            diagnostics: Vec::new(),
        }
    }

    /// Loads one package. Never fails; errors are captured in the result.
    pub async fn load(&mut self, name: &str, policy: Arc<PackagePolicy>) -> LoadedPackage {
        let mut package = LoadedPackage::not_loaded(name, policy);

        if !package.policy.enabled {
            self.note(name, DiagnosticLevel::Info, "disabled in configuration".to_owned());
            return package;
        }

        let attempt = AssertUnwindSafe(self.source.load(name, &package.layout))
            .catch_unwind()
            .await;
        let result = attempt.unwrap_or_else(|_| {
            Err(PackageLoadError::failure("manifest source panicked"))
        });

        match result {
            Ok(manifest) => {
                info!(
                    package = name,
                    version = manifest.version(),
                    tools = manifest.tools().len(),
                    "package loaded"
                );
                self.note(
                    name,
                    DiagnosticLevel::Info,
                    format!(
                        "loaded {} v{} ({} tools declared)",
                        manifest.name(),
                        manifest.version(),
                        manifest.tools().len()
                    ),
                );
                package.manifest = Some(manifest);
            }
            Err(err) => {
                warn!(package = name, kind = err.kind(), error = %err, "package failed to load");
                self.note(name, DiagnosticLevel::Warn, format!("{err} ({})", err.hint()));
                package.load_error = Some(err);
            }
        }

        package
    }

    /// Loads every configured package in name order.
    pub async fn load_all(&mut self, config: &OrchestratorConfig) -> Vec<LoadedPackage> {
        let mut loaded = Vec::with_capacity(config.packages.len());
        for (name, policy) in &config.packages {
            loaded.push(self.load(name, Arc::new(policy.clone())).await);
        }
        loaded
    }

    /// Returns the diagnostics recorded so far.
    #[must_use]
    pub fn diagnostics(&self) -> &[LoadDiagnostic] {
        &self.diagnostics
    }

    /// Consumes the loader, returning its diagnostics.
    #[must_use]
    pub fn into_diagnostics(self) -> Vec<LoadDiagnostic> {
        self.diagnostics
    }

    fn note(&mut self, package: &str, level: DiagnosticLevel, message: String) {
        self.diagnostics.push(LoadDiagnostic {
            package: package.to_owned(),
            level,
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use hub_primitives::ToolDefinition;
    use serde_json::Value;

    struct ScriptedSource;

    #[async_trait]
    impl ManifestSource for ScriptedSource {
        async fn load(
            &self,
            name: &str,
            _layout: &PackageLayout,
        ) -> Result<PackageManifest, PackageLoadError> {
            match name {
                "good" => Ok(PackageManifest::builder()
                    .name("good")
                    .and_then(|b| b.version("0.3.0"))
                    .map(|b| {
                        b.tool(
                            ToolDefinition::builder("ping")
                                .mutates(false)
                                .handler(|_args: Value| async move { Ok("pong".to_owned()) })
                                .build()
                                .unwrap(),
                        )
                    })
                    .and_then(hub_primitives::PackageManifestBuilder::build)
                    .unwrap()),
                "broken" => Err(PackageLoadError::malformed("missing field `tools`")),
                _ => panic!("source exploded"),
            }
        }
    }

    fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            schema_version: "1".into(),
            ..OrchestratorConfig::empty()
        }
        .with_package("good", PackagePolicy::new("/opt/good"))
        .with_package("broken", PackagePolicy::new("/opt/broken"))
        .with_package("explodes", PackagePolicy::new("/opt/explodes"))
        .with_package("off", PackagePolicy::new("/opt/off").with_enabled(false))
    }

    #[tokio::test]
    async fn failures_are_isolated_per_package() {
        let mut loader = PackageLoader::new(Arc::new(ScriptedSource));
        let loaded = loader.load_all(&config()).await;

        assert_eq!(loaded.len(), 4);
        let by_name = |name: &str| loaded.iter().find(|p| p.config_name() == name).unwrap();

        assert_eq!(by_name("good").state(), PackageState::Loaded);
        assert_eq!(by_name("good").manifest().unwrap().version(), "0.3.0");

        assert_eq!(by_name("broken").state(), PackageState::Failed);
        assert_eq!(by_name("broken").load_error().unwrap().kind(), "malformed_manifest");

        assert_eq!(by_name("explodes").state(), PackageState::Failed);
        assert_eq!(by_name("explodes").load_error().unwrap().kind(), "load_failure");

        assert_eq!(by_name("off").state(), PackageState::Disabled);
        assert!(by_name("off").load_error().is_none());

        assert_eq!(loader.diagnostics().len(), 4);
        assert_eq!(
            loader
                .diagnostics()
                .iter()
                .filter(|d| d.level == DiagnosticLevel::Warn)
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn layout_classifies_missing_parts() {
        let dir = tempfile::tempdir().unwrap();
        let missing = PackageLayout::new(dir.path().join("nope"));
        assert!(matches!(
            missing.ensure_built().await,
            Err(PackageLoadError::PathNotFound { .. })
        ));

        let layout = PackageLayout::new(dir.path());
        assert!(matches!(layout.ensure_built().await, Err(PackageLoadError::NotBuilt { .. })));

        std::fs::create_dir(layout.dist()).unwrap();
        assert!(matches!(layout.ensure_built().await, Err(PackageLoadError::NotBuilt { .. })));

        std::fs::write(layout.entry_point(), "{}").unwrap();
        assert!(layout.ensure_built().await.is_ok());
        assert_eq!(
            layout.validate().await,
            LayoutValidation {
                path_exists: true,
                dist_exists: true,
                entry_point_exists: true,
            }
        );
    }

    #[tokio::test]
    async fn directory_entry_point_is_not_built() {
        let dir = tempfile::tempdir().unwrap();
        let layout = PackageLayout::new(dir.path());
        std::fs::create_dir_all(layout.entry_point()).unwrap();

        assert_eq!(
            layout.validate().await,
            LayoutValidation {
                path_exists: true,
                dist_exists: true,
                entry_point_exists: false,
            }
        );
        assert!(matches!(layout.ensure_built().await, Err(PackageLoadError::NotBuilt { .. })));
    }
}
