//! Script discovery
//!
//! A phase directory holds one subdirectory per billing system:
//!
//! ```text
//! {phase_dir}/
//!   tripica/
//!     001_create.sql
//!     002_fill/
//!       001_accounts.sql
//!     NOEXEC_draft.sql      <- never executed
//!   bookkeeper/
//!     001_ledger.sql
//! ```
//!
//! Each system's tree is walked recursively and every `.sql` file not carrying
//! the [`SKIP_MARKER`] prefix becomes a [`ScriptFile`]. Symbolic links are not
//! followed. Ordering is by full path string and never depends on the order
//! the filesystem lists entries in.

use crate::domain::{AggregatorError, Result, ScriptFile, SystemScriptSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File name prefix that excludes a script from execution
pub const SKIP_MARKER: &str = "NOEXEC_";

/// Extension of executable scripts
pub const SCRIPT_EXTENSION: &str = ".sql";

/// Discovers the scripts of every system under `phase_dir`
///
/// Files directly inside `phase_dir` are ignored, and systems without any
/// executable script are omitted. A missing `phase_dir` yields an empty set.
///
/// # Errors
///
/// Returns [`AggregatorError::Discovery`] for any filesystem error other than
/// a missing phase directory.
pub fn discover_scripts(phase_dir: &Path) -> Result<SystemScriptSet> {
    let mut set = SystemScriptSet::new();

    let entries = match fs::read_dir(phase_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::info!(
                directory = %phase_dir.display(),
                "Directory does not exist, skipping"
            );
            return Ok(set);
        }
        Err(e) => return Err(discovery_error(phase_dir, e)),
    };

    for entry in entries {
        let entry = entry.map_err(|e| discovery_error(phase_dir, e))?;
        let file_type = entry.file_type().map_err(|e| discovery_error(phase_dir, e))?;
        if !file_type.is_dir() {
            continue;
        }

        let system = entry.file_name().to_string_lossy().into_owned();
        let system_dir = entry.path();
        let scripts = collect_scripts(&system_dir, &system)?;
        if !scripts.is_empty() {
            set.insert(system, scripts);
        }
    }

    tracing::debug!(
        directory = %phase_dir.display(),
        systems = set.len(),
        scripts = set.script_count(),
        "Scripts discovered"
    );

    Ok(set)
}

/// Discovers the scripts of a single system directory
///
/// Used for per-system directories such as `{scripts_root}/{system}/init`.
/// A missing directory yields an empty list.
///
/// # Errors
///
/// Returns [`AggregatorError::Discovery`] for any other filesystem error.
pub fn discover_system_scripts(system: &str, dir: &Path) -> Result<Vec<ScriptFile>> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(AggregatorError::Discovery {
                dir: dir.to_path_buf(),
                message: "not a directory".to_string(),
            })
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::info!(
                system,
                directory = %dir.display(),
                "Directory does not exist, skipping"
            );
            return Ok(Vec::new());
        }
        Err(e) => return Err(discovery_error(dir, e)),
    }

    let mut scripts = collect_scripts(dir, system)?;
    scripts.sort();
    Ok(scripts)
}

/// Whether a file name denotes an executable script
pub fn is_executable_script(file_name: &str) -> bool {
    file_name.ends_with(SCRIPT_EXTENSION) && !file_name.starts_with(SKIP_MARKER)
}

fn collect_scripts(root: &Path, system: &str) -> Result<Vec<ScriptFile>> {
    let mut paths: Vec<PathBuf> = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = fs::read_dir(&dir).map_err(|e| discovery_error(&dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| discovery_error(&dir, e))?;
            let file_type = entry.file_type().map_err(|e| discovery_error(&dir, e))?;
            let path = entry.path();

            if file_type.is_dir() {
                pending.push(path);
                continue;
            }

            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(SKIP_MARKER) {
                tracing::debug!(file = %path.display(), "Skipping NOEXEC file");
                continue;
            }
            if is_executable_script(&name) {
                paths.push(path);
            }
        }
    }

    let mut scripts: Vec<ScriptFile> = paths
        .into_iter()
        .map(|path| ScriptFile::new(path, system))
        .collect();
    scripts.sort();
    Ok(scripts)
}

fn discovery_error(dir: &Path, error: io::Error) -> AggregatorError {
    AggregatorError::Discovery {
        dir: dir.to_path_buf(),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use test_case::test_case;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "SELECT 1;").unwrap();
    }

    #[test_case("001_a.sql", true ; "plain script")]
    #[test_case("NOEXEC_001_a.sql", false ; "skip marker")]
    #[test_case("readme.md", false ; "other extension")]
    #[test_case("001_a.sql.bak", false ; "suffix after extension")]
    #[test_case("noexec_a.sql", true ; "marker is case sensitive")]
    fn test_is_executable_script(name: &str, expected: bool) {
        assert_eq!(is_executable_script(name), expected);
    }

    #[test]
    fn test_missing_phase_dir_is_empty() {
        let temp = TempDir::new().unwrap();
        let set = discover_scripts(&temp.path().join("init")).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_groups_by_first_level_directory() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "tripica/002_b.sql");
        touch(temp.path(), "tripica/001_a.sql");
        touch(temp.path(), "tripica/003_nested/001_x.sql");
        touch(temp.path(), "bookkeeper/001_a.sql");
        touch(temp.path(), "top_level.sql");
        touch(temp.path(), "empty/notes.txt");

        let set = discover_scripts(temp.path()).unwrap();
        assert_eq!(set.system_names(), vec!["bookkeeper", "tripica"]);

        let tripica: Vec<PathBuf> = set
            .scripts_for("tripica")
            .unwrap()
            .iter()
            .map(|s| s.path().strip_prefix(temp.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            tripica,
            vec![
                PathBuf::from("tripica/001_a.sql"),
                PathBuf::from("tripica/002_b.sql"),
                PathBuf::from("tripica/003_nested/001_x.sql"),
            ]
        );
    }

    #[test]
    fn test_skip_marker_at_any_depth() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "tripica/NOEXEC_001.sql");
        touch(temp.path(), "tripica/deep/er/NOEXEC_002.sql");
        touch(temp.path(), "tripica/deep/er/003.sql");

        let set = discover_scripts(temp.path()).unwrap();
        let scripts = set.scripts_for("tripica").unwrap();
        assert_eq!(scripts.len(), 1);
        assert!(scripts[0].path().ends_with("deep/er/003.sql"));
    }

    #[test]
    fn test_system_with_only_skipped_scripts_is_omitted() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "tripica/NOEXEC_001.sql");
        let set = discover_scripts(temp.path()).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_discover_system_scripts() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "tripica/init/002.sql");
        touch(temp.path(), "tripica/init/001.sql");

        let scripts =
            discover_system_scripts("tripica", &temp.path().join("tripica/init")).unwrap();
        assert_eq!(scripts.len(), 2);
        assert!(scripts[0].path().ends_with("001.sql"));
        assert_eq!(scripts[0].system(), "tripica");

        let missing =
            discover_system_scripts("bookkeeper", &temp.path().join("bookkeeper/init")).unwrap();
        assert!(missing.is_empty());
    }

    #[test]
    fn test_phase_dir_that_is_a_file_fails() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("init");
        fs::write(&file, "").unwrap();
        let err = discover_scripts(&file).unwrap_err();
        assert!(matches!(err, AggregatorError::Discovery { .. }));
    }
}
