//! Strongly typed configuration schema.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

use hub_primitives::validate_identifier;
use serde::{Deserialize, Serialize};

use crate::loader::{ConfigError, ConfigResult};

const DEFAULT_HANDLER_TIMEOUT_SECS: u64 = 120;

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Schema version declared by the document.
    pub schema_version: String,
    /// Package policies keyed by package config name.
    #[serde(default)]
    pub packages: BTreeMap<String, PackagePolicy>,
    /// Process-wide settings.
    #[serde(default)]
    pub settings: Settings,
}

impl OrchestratorConfig {
    /// Configuration with no packages, used when loading fails.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            schema_version: String::new(),
            packages: BTreeMap::new(),
            settings: Settings::default(),
        }
    }

    /// Adds a package policy, returning the updated config.
    #[must_use]
    pub fn with_package(mut self, name: impl Into<String>, policy: PackagePolicy) -> Self {
        self.packages.insert(name.into(), policy);
        self
    }

    /// Iterates over enabled packages in name order.
    pub fn enabled_packages(&self) -> impl Iterator<Item = (&str, &PackagePolicy)> {
        self.packages
            .iter()
            .filter(|(_, policy)| policy.enabled)
            .map(|(name, policy)| (name.as_str(), policy))
    }

    /// Validates structural constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] listing every violation found.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut problems = Vec::new();

        if self.schema_version.trim().is_empty() {
            problems.push("schema_version cannot be empty".to_owned());
        }

        for (name, policy) in &self.packages {
            if let Err(err) = validate_identifier(name) {
                problems.push(format!("package key: {err}"));
            }
            policy.collect_problems(name, &mut problems);
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation {
                reason: problems.join("; "),
            })
        }
    }
}

/// Policy governing a single package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackagePolicy {
    /// On-disk location of the package.
    pub path: PathBuf,
    /// Whether the package is loaded at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Whether tools classified as mutating are exposed.
    #[serde(default)]
    pub allow_writes: bool,
    /// Closed allowlist of tool names. `None` means every declared tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_tools: Option<BTreeSet<String>>,
    /// Restriction on the value of one call parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_scope: Option<ResourceScope>,
}

fn default_enabled() -> bool {
    true
}

impl PackagePolicy {
    /// Enabled, read-only policy for the supplied path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            enabled: true,
            allow_writes: false,
            allowed_tools: None,
            resource_scope: None,
        }
    }

    /// Sets the enabled flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the write gate.
    #[must_use]
    pub fn with_writes(mut self, allow_writes: bool) -> Self {
        self.allow_writes = allow_writes;
        self
    }

    /// Sets the tool allowlist.
    #[must_use]
    pub fn with_allowed_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tools = Some(tools.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the resource scope.
    #[must_use]
    pub fn with_resource_scope(mut self, scope: ResourceScope) -> Self {
        self.resource_scope = Some(scope);
        self
    }

    fn collect_problems(&self, name: &str, problems: &mut Vec<String>) {
        if self.path.as_os_str().is_empty() {
            problems.push(format!("packages.{name}.path cannot be empty"));
        }

        if let Some(tools) = &self.allowed_tools {
            for tool in tools {
                if let Err(err) = validate_identifier(tool) {
                    problems.push(format!("packages.{name}.allowed_tools: {err}"));
                }
            }
        }

        if let Some(scope) = &self.resource_scope {
            if scope.param.trim().is_empty() {
                problems.push(format!("packages.{name}.resource_scope.param cannot be empty"));
            }
            if scope.allowed.is_empty() {
                problems.push(format!(
                    "packages.{name}.resource_scope.allowed must list at least one value"
                ));
            }
            if scope.allowed.iter().any(|value| value.is_empty()) {
                problems.push(format!(
                    "packages.{name}.resource_scope.allowed cannot contain empty values"
                ));
            }
        }
    }
}

/// Finite allowlist of values for one named call parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceScope {
    /// Parameter name checked on every call.
    pub param: String,
    /// Permitted values.
    pub allowed: BTreeSet<String>,
}

impl ResourceScope {
    /// Creates a scope for the supplied parameter and values.
    #[must_use]
    pub fn new<I, S>(param: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            param: param.into(),
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true when `value` is an exact member of the allowlist.
    #[must_use]
    pub fn permits(&self, value: &str) -> bool {
        self.allowed.contains(value)
    }
}

/// Process-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Emit one audit record per invocation.
    #[serde(default)]
    pub log_invocations: bool,
    /// Append audit records to this file instead of the diagnostic stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    /// Upper bound on a delegated handler call, in seconds. `0` disables it.
    #[serde(default = "default_handler_timeout_secs")]
    pub handler_timeout_secs: u64,
}

fn default_handler_timeout_secs() -> u64 {
    DEFAULT_HANDLER_TIMEOUT_SECS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_invocations: false,
            log_file: None,
            handler_timeout_secs: DEFAULT_HANDLER_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    /// Returns the handler wait bound, if any.
    #[must_use]
    pub fn handler_timeout(&self) -> Option<Duration> {
        (self.handler_timeout_secs > 0).then(|| Duration::from_secs(self.handler_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> OrchestratorConfig {
        OrchestratorConfig {
            schema_version: "1".into(),
            ..OrchestratorConfig::empty()
        }
    }

    #[test]
    fn defaults_are_conservative() {
        let policy: PackagePolicy = serde_yaml::from_str("path: /opt/sheets").unwrap();
        assert!(policy.enabled);
        assert!(!policy.allow_writes);
        assert!(policy.allowed_tools.is_none());
        assert!(policy.resource_scope.is_none());

        let settings = Settings::default();
        assert!(!settings.log_invocations);
        assert_eq!(settings.handler_timeout(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn zero_timeout_disables_bound() {
        let settings = Settings {
            handler_timeout_secs: 0,
            ..Settings::default()
        };
        assert_eq!(settings.handler_timeout(), None);
    }

    #[test]
    fn validation_reports_every_problem() {
        let config = base()
            .with_package("bad-name", PackagePolicy::new("/x"))
            .with_package(
                "sheets",
                PackagePolicy::new("")
                    .with_resource_scope(ResourceScope::new("spreadsheet_id", Vec::<String>::new())),
            );

        let err = config.validate().expect_err("invalid config");
        let ConfigError::Validation { reason } = err else {
            panic!("expected validation error");
        };
        assert!(reason.contains("package key"));
        assert!(reason.contains("packages.sheets.path"));
        assert!(reason.contains("resource_scope.allowed"));
    }

    #[test]
    fn enabled_packages_skips_disabled() {
        let config = base()
            .with_package("a", PackagePolicy::new("/a"))
            .with_package("b", PackagePolicy::new("/b").with_enabled(false));

        let names: Vec<_> = config.enabled_packages().map(|(name, _)| name).collect();
        assert_eq!(names, ["a"]);
    }

    #[test]
    fn scope_membership_is_exact() {
        let scope = ResourceScope::new("spreadsheet_id", ["abc123"]);
        assert!(scope.permits("abc123"));
        assert!(!scope.permits("abc1234"));
        assert!(!scope.permits("ABC123"));
    }
}
