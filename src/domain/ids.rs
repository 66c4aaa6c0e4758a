//! Domain identifier types with validation
//!
//! Newtype wrappers for the names that end up in file paths, object keys and
//! SQL text. Validating them once at the edge keeps the rest of the pipeline
//! free of ad-hoc string checks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Billing system name
///
/// A system name is used as a directory name, as a file name component and as
/// a key into the processor registry, so it may not contain path separators.
///
/// # Examples
///
/// ```
/// use billing_aggregator::domain::ids::SystemName;
/// use std::str::FromStr;
///
/// let system = SystemName::from_str("tripica").unwrap();
/// assert_eq!(system.as_str(), "tripica");
/// assert!(SystemName::from_str("../etc").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SystemName(String);

impl SystemName {
    /// Creates a new SystemName from a string
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err("System name cannot be empty".to_string());
        }
        if trimmed.contains(['/', '\\']) || trimmed == "." || trimmed == ".." {
            return Err(format!(
                "System name '{trimmed}' must not contain path separators"
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the system name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the result table this system's scripts populate
    ///
    /// Fails when the system name does not form a plain SQL identifier.
    pub fn result_table(&self) -> Result<TableName, String> {
        TableName::new(format!("{}_results", self.0))
    }
}

impl fmt::Display for SystemName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SystemName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for SystemName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Table name, optionally schema-qualified
///
/// Table names are interpolated into `SELECT * FROM ...`, so only plain SQL
/// identifiers (`[A-Za-z_][A-Za-z0-9_]*`) joined by at most one `.` are accepted.
///
/// # Examples
///
/// ```
/// use billing_aggregator::domain::ids::TableName;
/// use std::str::FromStr;
///
/// assert!(TableName::from_str("billing.tripica_results").is_ok());
/// assert!(TableName::from_str("results; DROP TABLE x").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableName(String);

impl TableName {
    /// Creates a new TableName from a string
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        let parts: Vec<&str> = name.split('.').collect();
        if parts.len() > 2 || !parts.iter().all(|p| is_identifier(p)) {
            return Err(format!("Invalid table name '{name}'"));
        }
        Ok(Self(name))
    }

    /// Returns the table name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TableName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
