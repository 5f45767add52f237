//! Tool registration for loaded packages.
//!
//! Each package's exposed set is computed once from its manifest and policy,
//! bound under `<package>_<tool>`, and wrapped in the guardrail pipeline.
//! The registry is built during startup and only read afterwards.

#![warn(missing_docs, clippy::pedantic)]

pub mod registry;

pub use registry::{
    PackageRegistration, RegisteredTool, RegistryError, RegistryResult, ToolRegistry, ToolSummary,
};
