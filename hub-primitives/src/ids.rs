//! Identifier rules and namespaced tool names.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MAX_ID_LEN: usize = 64;

/// Validates a package key or tool name.
///
/// Exposed names are built by joining the two with an underscore, so both
/// halves are restricted to ASCII letters, digits, and underscores.
///
/// # Errors
///
/// Returns [`Error::InvalidIdentifier`] if the identifier is empty, too long,
/// or contains unsupported characters.
pub fn validate_identifier(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidIdentifier {
            id: String::new(),
            reason: "identifier cannot be empty".into(),
        });
    }

    if id.len() > MAX_ID_LEN {
        return Err(Error::InvalidIdentifier {
            id: id.into(),
            reason: format!("identifier length must be <= {MAX_ID_LEN}"),
        });
    }

    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::InvalidIdentifier {
            id: id.into(),
            reason: "identifier must contain only ASCII letters, digits, or underscore".into(),
        });
    }

    Ok(())
}

/// Exposed tool name of the form `<package>_<tool>`.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualifiedName(String);

impl QualifiedName {
    /// Joins a package key and a tool name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentifier`] if either half fails
    /// [`validate_identifier`].
    pub fn new(package: &str, tool: &str) -> Result<Self> {
        validate_identifier(package)?;
        validate_identifier(tool)?;
        Ok(Self(format!("{package}_{tool}")))
    }

    /// Returns the qualified name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for QualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<QualifiedName> for String {
    fn from(value: QualifiedName) -> Self {
        value.0
    }
}
