//! Configuration management for toolhub.
//!
//! The configuration is loaded once at startup and never mutated. A missing or
//! invalid file degrades to an empty package set rather than aborting.

#![warn(missing_docs, clippy::pedantic)]

pub mod loader;
pub mod schema;

pub use loader::{ConfigError, ConfigResult, ConfigStore, default_config_path, expand_tilde};
pub use schema::{OrchestratorConfig, PackagePolicy, ResourceScope, Settings};
