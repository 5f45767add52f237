//! Registry of exposed tools keyed by qualified name.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use hub_config::PackagePolicy;
use hub_policy::{Exposure, GuardedTool, GuardrailPipeline, classify};
use hub_primitives::{PackageManifest, QualifiedName, ToolDefinition, ToolOutput};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors produced by tool registration and lookup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Qualified name is already taken; the later registration is dropped.
    #[error("tool `{name}` is already registered")]
    Collision {
        /// Name of the offending tool.
        name: String,
    },

    /// Package key or tool name cannot form a qualified name.
    #[error("cannot expose `{name}`: {reason}")]
    InvalidName {
        /// Package and tool as declared.
        name: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Declared parameter schema does not compile.
    #[error("tool `{name}` declares an unusable parameter schema: {reason}")]
    InvalidSchema {
        /// Qualified name of the tool.
        name: String,
        /// Compiler message.
        reason: String,
    },

    /// Requested tool does not exist.
    #[error("tool `{name}` is not registered")]
    UnknownTool {
        /// Name of the missing tool.
        name: String,
    },
}

/// One bound, guarded tool.
#[derive(Debug, Clone)]
pub struct RegisteredTool {
    full_name: QualifiedName,
    package: String,
    guarded: GuardedTool,
}

impl RegisteredTool {
    /// Returns the qualified name.
    #[must_use]
    pub fn full_name(&self) -> &QualifiedName {
        &self.full_name
    }

    /// Returns the owning package config name.
    #[must_use]
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Returns the underlying definition.
    #[must_use]
    pub fn definition(&self) -> &ToolDefinition {
        self.guarded.definition()
    }

    /// Returns the policy the tool was registered under.
    #[must_use]
    pub fn policy(&self) -> &PackagePolicy {
        self.guarded.pipeline().policy()
    }

    /// Invokes the tool through its guardrail pipeline.
    pub async fn invoke(&self, args: Value) -> ToolOutput {
        self.guarded.invoke(args).await
    }
}

/// Caller-facing description of an exposed tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSummary {
    /// Qualified name.
    pub name: String,
    /// Description declared by the package.
    pub description: String,
    /// Whether the tool changes external state.
    pub mutates: bool,
    /// JSON schema for arguments.
    pub parameter_schema: Value,
}

/// Outcome of registering one package.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PackageRegistration {
    /// Names bound in declaration order.
    pub registered: Vec<QualifiedName>,
    /// Declared tools that policy filtered out.
    pub excluded: Vec<(String, Exposure)>,
    /// Exposed tools that could not be bound.
    pub rejected: Vec<RegistryError>,
}

/// Registry that stores guarded tools keyed by qualified name.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
    reserved: BTreeSet<String>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a qualified name for a later [`ToolRegistry::register_builtin`].
    /// Package tools resolving to it are rejected as collisions.
    pub fn reserve(&mut self, name: &QualifiedName) {
        self.reserved.insert(name.as_str().to_owned());
    }

    /// Registers the exposed subset of `manifest` under `package`.
    ///
    /// Never fails as a whole: tools that collide or cannot be bound are
    /// logged, skipped, and reported in the returned summary.
    pub fn register_package(
        &mut self,
        package: &str,
        manifest: &PackageManifest,
        pipeline: &Arc<GuardrailPipeline>,
    ) -> PackageRegistration {
        let mut summary = PackageRegistration::default();

        for tool in manifest.tools() {
            let exposure = classify(tool, pipeline.policy());
            if !exposure.is_exposed() {
                debug!(package, tool = tool.name(), reason = exposure.label(), "tool not exposed");
                summary.excluded.push((tool.name().to_owned(), exposure));
                continue;
            }

            match self.bind(package, tool, pipeline) {
                Ok(name) => {
                    info!(package, tool = %name, mutates = tool.mutates(), "tool registered");
                    summary.registered.push(name);
                }
                Err(err) => {
                    warn!(package, error = %err, "tool registration skipped");
                    summary.rejected.push(err);
                }
            }
        }

        summary
    }

    /// Binds a reserved builtin tool.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Collision`] if the name is already bound, or
    /// any naming or schema error from binding.
    pub fn register_builtin(
        &mut self,
        package: &str,
        tool: &ToolDefinition,
        pipeline: &Arc<GuardrailPipeline>,
    ) -> RegistryResult<QualifiedName> {
        let name = qualify(package, tool)?;
        self.reserved.remove(name.as_str());
        self.bind(package, tool, pipeline)
    }

    fn bind(
        &mut self,
        package: &str,
        tool: &ToolDefinition,
        pipeline: &Arc<GuardrailPipeline>,
    ) -> RegistryResult<QualifiedName> {
        let name = qualify(package, tool)?;
        if self.tools.contains_key(name.as_str()) || self.reserved.contains(name.as_str()) {
            return Err(RegistryError::Collision {
                name: name.into(),
            });
        }

        let guarded = GuardedTool::new(tool.clone(), Arc::clone(pipeline)).map_err(|reason| {
            RegistryError::InvalidSchema {
                name: name.to_string(),
                reason,
            }
        })?;

        self.tools.insert(
            name.to_string(),
            RegisteredTool {
                full_name: name.clone(),
                package: package.to_owned(),
                guarded,
            },
        );
        Ok(name)
    }

    /// Returns the tool matching the supplied qualified name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    /// Invokes a registered tool.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownTool`] when the name is not bound.
    /// Handler failures are reported inside the returned [`ToolOutput`].
    pub async fn invoke(&self, name: &str, args: Value) -> RegistryResult<ToolOutput> {
        let tool = self.get(name).ok_or_else(|| RegistryError::UnknownTool {
            name: name.to_owned(),
        })?;
        Ok(tool.invoke(args).await)
    }

    /// Lists every bound tool in name order.
    #[must_use]
    pub fn list(&self) -> Vec<ToolSummary> {
        self.tools
            .values()
            .map(|tool| ToolSummary {
                name: tool.full_name.to_string(),
                description: tool.definition().description().to_owned(),
                mutates: tool.definition().mutates(),
                parameter_schema: tool.definition().parameter_schema().clone(),
            })
            .collect()
    }

    /// Returns the qualified names registered for `package`.
    #[must_use]
    pub fn names_for(&self, package: &str) -> Vec<&str> {
        self.tools
            .values()
            .filter(|tool| tool.package == package)
            .map(|tool| tool.full_name.as_str())
            .collect()
    }

    /// Number of bound tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns true when nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn qualify(package: &str, tool: &ToolDefinition) -> RegistryResult<QualifiedName> {
    QualifiedName::new(package, tool.name()).map_err(|err| RegistryError::InvalidName {
        name: format!("{package}/{}", tool.name()),
        reason: err.to_string(),
    })
}
