//! In-process packages registered at build time.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use hub_primitives::PackageManifest;

use crate::loader::{ManifestSource, PackageLayout, PackageLoadError};

type ManifestFactory = Arc<dyn Fn() -> hub_primitives::Result<PackageManifest> + Send + Sync>;

/// Manifest source backed by factories keyed by package config name.
#[derive(Clone, Default)]
pub struct StaticSource {
    factories: HashMap<String, ManifestFactory>,
}

impl fmt::Debug for StaticSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("StaticSource").field("packages", &names).finish()
    }
}

impl StaticSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the factory for the package configured as `name`.
    #[must_use]
    pub fn with_package<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> hub_primitives::Result<PackageManifest> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// Registers a prebuilt manifest, cloned on every load.
    #[must_use]
    pub fn with_manifest(self, name: impl Into<String>, manifest: PackageManifest) -> Self {
        self.with_package(name, move || Ok(manifest.clone()))
    }
}

#[async_trait]
impl ManifestSource for StaticSource {
    async fn load(
        &self,
        name: &str,
        layout: &PackageLayout,
    ) -> Result<PackageManifest, PackageLoadError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| PackageLoadError::PathNotFound {
                path: layout.root().to_path_buf(),
            })?;
        factory().map_err(|err| PackageLoadError::malformed(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use hub_primitives::{Error, ToolDefinition};
    use serde_json::Value;

    fn manifest() -> PackageManifest {
        PackageManifest::builder()
            .name("notes")
            .and_then(|b| b.version("2.0.0"))
            .unwrap()
            .tool(
                ToolDefinition::builder("read")
                    .mutates(false)
                    .handler(|_args: Value| async move { Ok(String::new()) })
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn resolves_registered_factories() {
        let source = StaticSource::new()
            .with_manifest("notes", manifest())
            .with_package("bad", || {
                Err(Error::InvalidManifest {
                    reason: "no version".into(),
                })
            });
        let layout = PackageLayout::new("/virtual");

        let loaded = source.load("notes", &layout).await.unwrap();
        assert_eq!(loaded.tools().len(), 1);

        let err = source.load("bad", &layout).await.unwrap_err();
        assert_eq!(err.kind(), "malformed_manifest");

        let err = source.load("missing", &layout).await.unwrap_err();
        assert_eq!(err.kind(), "path_not_found");
    }
}
