//! Governance policy evaluation for package tools.
//!
//! Exposure (allowlist and write gate) is decided once per package at
//! registration. Scoping, argument validation, and audit run on every call
//! inside [`GuardrailPipeline`].

#![warn(missing_docs, clippy::pedantic)]

pub mod decision;
pub mod engine;
pub mod guardrail;
pub mod scope;
pub mod validation;

pub use decision::{DecisionKind, PolicyDecision};
pub use engine::{Exposure, classify};
pub use guardrail::{GuardedTool, GuardrailPipeline};
pub use scope::check_scope;
pub use validation::ArgumentValidator;
