//! Script domain types
//!
//! A [`ScriptFile`] is a discovered `.sql` file; a [`SystemScriptSet`] groups
//! the scripts of one phase directory by the billing system that owns them.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A discovered SQL script
///
/// Immutable once discovered. Ordering between scripts is the lexical order of
/// their full path strings, which keeps numeric prefixes such as `001_` and
/// `002_` in author order regardless of how the filesystem lists directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFile {
    path: PathBuf,
    system: String,
    sort_key: String,
}

impl ScriptFile {
    /// Creates a script file owned by `system`
    pub fn new(path: impl Into<PathBuf>, system: impl Into<String>) -> Self {
        let path = path.into();
        let sort_key = path.to_string_lossy().into_owned();
        Self {
            path,
            system: system.into(),
            sort_key,
        }
    }

    /// Full path of the script
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Owning system namespace
    pub fn system(&self) -> &str {
        &self.system
    }

    /// Sort key (the full path string)
    pub fn sort_key(&self) -> &str {
        &self.sort_key
    }
}

impl PartialOrd for ScriptFile {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScriptFile {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key
            .cmp(&other.sort_key)
            .then_with(|| self.system.cmp(&other.system))
    }
}

impl fmt::Display for ScriptFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Scripts of one phase directory, grouped by system
///
/// Systems iterate in name order; scripts within a system in path order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemScriptSet {
    systems: BTreeMap<String, Vec<ScriptFile>>,
}

impl SystemScriptSet {
    /// Creates an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the scripts of `system`, sorting them by path
    pub fn insert(&mut self, system: impl Into<String>, mut scripts: Vec<ScriptFile>) {
        scripts.sort();
        self.systems.insert(system.into(), scripts);
    }

    /// Ordered scripts of a single system
    pub fn scripts_for(&self, system: &str) -> Option<&[ScriptFile]> {
        self.systems.get(system).map(Vec::as_slice)
    }

    /// Iterates systems in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ScriptFile])> {
        self.systems
            .iter()
            .map(|(name, scripts)| (name.as_str(), scripts.as_slice()))
    }

    /// Names of all systems in the set
    pub fn system_names(&self) -> Vec<&str> {
        self.systems.keys().map(String::as_str).collect()
    }

    /// Number of systems
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Whether the set holds no systems
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Total number of scripts across all systems
    pub fn script_count(&self) -> usize {
        self.systems.values().map(Vec::len).sum()
    }
}
