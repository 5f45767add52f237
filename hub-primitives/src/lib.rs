//! Core shared types and traits for toolhub packages.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod ids;
mod manifest;
mod tool;

/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Identifier validation and namespaced tool names.
pub use ids::{QualifiedName, validate_identifier};
/// Package metadata and health probes consumed at load time.
pub use manifest::{HealthCheck, HealthReport, PackageManifest, PackageManifestBuilder};
/// Tool declarations and their handlers.
pub use tool::{HandlerError, ToolDefinition, ToolDefinitionBuilder, ToolHandler, ToolOutput};
