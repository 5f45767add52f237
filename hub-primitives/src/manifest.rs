//! Package metadata produced by a package at load time.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tool::{HandlerError, ToolDefinition};

/// Result of a package-provided health probe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Whether the package considers itself healthy.
    pub ok: bool,
    /// Free-form details supplied by the package.
    #[serde(default)]
    pub details: Value,
}

/// Health probe declared by a package.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Runs the probe.
    async fn check(&self) -> Result<HealthReport, HandlerError>;
}

#[async_trait]
impl<F, Fut> HealthCheck for F
where
    F: Send + Sync + Fn() -> Fut,
    Fut: Future<Output = Result<HealthReport, HandlerError>> + Send,
{
    async fn check(&self) -> Result<HealthReport, HandlerError> {
        (self)().await
    }
}

/// Declared set of operations plus metadata for one package.
#[derive(Clone)]
pub struct PackageManifest {
    name: String,
    version: String,
    tools: Vec<ToolDefinition>,
    health_check: Option<Arc<dyn HealthCheck>>,
}

impl fmt::Debug for PackageManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageManifest")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("tools", &self.tools)
            .field("health_check", &self.health_check.is_some())
            .finish()
    }
}

impl PackageManifest {
    /// Starts building a [`PackageManifest`].
    #[must_use]
    pub fn builder() -> PackageManifestBuilder {
        PackageManifestBuilder {
            name: None,
            version: None,
            tools: Vec::new(),
            health_check: None,
        }
    }

    /// Returns the package's self-declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the package version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the declared tools in declaration order.
    #[must_use]
    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    /// Returns the optional health probe.
    #[must_use]
    pub fn health_check(&self) -> Option<&Arc<dyn HealthCheck>> {
        self.health_check.as_ref()
    }
}

/// Builder for [`PackageManifest`].
pub struct PackageManifestBuilder {
    name: Option<String>,
    version: Option<String>,
    tools: Vec<ToolDefinition>,
    health_check: Option<Arc<dyn HealthCheck>>,
}

impl PackageManifestBuilder {
    /// Sets the package name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidManifest`] when the name is empty.
    pub fn name(mut self, name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(crate::Error::InvalidManifest {
                reason: "manifest name cannot be empty".into(),
            });
        }
        self.name = Some(name);
        Ok(self)
    }

    /// Sets the version string.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidManifest`] when the version is empty.
    pub fn version(mut self, version: impl Into<String>) -> crate::Result<Self> {
        let version = version.into();
        if version.trim().is_empty() {
            return Err(crate::Error::InvalidManifest {
                reason: "manifest version cannot be empty".into(),
            });
        }
        self.version = Some(version);
        Ok(self)
    }

    /// Appends a tool.
    #[must_use]
    pub fn tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.push(tool);
        self
    }

    /// Replaces the tool list.
    #[must_use]
    pub fn tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Installs a health probe.
    #[must_use]
    pub fn health_check<H>(mut self, check: H) -> Self
    where
        H: HealthCheck + 'static,
    {
        self.health_check = Some(Arc::new(check));
        self
    }

    /// Consumes the builder and returns the manifest.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidManifest`] if the name or version is
    /// missing.
    pub fn build(self) -> crate::Result<PackageManifest> {
        let name = self.name.ok_or_else(|| crate::Error::InvalidManifest {
            reason: "manifest name must be provided".into(),
        })?;
        let version = self
            .version
            .ok_or_else(|| crate::Error::InvalidManifest {
                reason: "manifest version must be provided".into(),
            })?;

        Ok(PackageManifest {
            name,
            version,
            tools: self.tools,
            health_check: self.health_check,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(name: &str, mutates: bool) -> ToolDefinition {
        ToolDefinition::builder(name)
            .mutates(mutates)
            .handler(|_args: Value| async move { Ok(String::new()) })
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn builds_manifest() {
        let manifest = PackageManifest::builder()
            .name("briefing")
            .unwrap()
            .version("1.2.0")
            .unwrap()
            .tool(tool("run_weekly_digest", false))
            .tool(tool("save_for_later", true))
            .health_check(|| async {
                Ok(HealthReport {
                    ok: true,
                    details: json!({ "feeds": 3 }),
                })
            })
            .build()
            .unwrap();

        assert_eq!(manifest.name(), "briefing");
        assert_eq!(manifest.version(), "1.2.0");
        assert_eq!(manifest.tools().len(), 2);

        let report = manifest.health_check().unwrap().check().await.unwrap();
        assert!(report.ok);
    }

    #[test]
    fn version_is_required() {
        let result = PackageManifest::builder().name("x").unwrap().build();
        assert!(result.is_err());
    }
}
