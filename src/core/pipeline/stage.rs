//! Pipeline stages

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stages of a run, in the only order they can occur
///
/// `Init → PerSystemProcessing → Export → Upload → Archive → Done`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Init phase scripts
    Init,
    /// Processors of the configured systems
    PerSystemProcessing,
    /// Result tables to CSV
    Export,
    /// CSV files to object storage
    Upload,
    /// Archive phase scripts
    Archive,
    /// Terminal success
    Done,
}

impl Stage {
    /// Every stage in execution order
    pub const ALL: [Stage; 6] = [
        Stage::Init,
        Stage::PerSystemProcessing,
        Stage::Export,
        Stage::Upload,
        Stage::Archive,
        Stage::Done,
    ];

    /// The stage that follows, `None` after `Done`
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Init => Some(Stage::PerSystemProcessing),
            Stage::PerSystemProcessing => Some(Stage::Export),
            Stage::Export => Some(Stage::Upload),
            Stage::Upload => Some(Stage::Archive),
            Stage::Archive => Some(Stage::Done),
            Stage::Done => None,
        }
    }

    /// Whether a failure in this stage ends the run
    ///
    /// Export failures are recovered per table; every other stage is fatal.
    pub fn is_failure_fatal(self) -> bool {
        !matches!(self, Stage::Export | Stage::Done)
    }

    /// Snake-case name used in logs and errors
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::PerSystemProcessing => "per_system_processing",
            Stage::Export => "export",
            Stage::Upload => "upload",
            Stage::Archive => "archive",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stages_are_linear() {
        let mut walked = vec![Stage::Init];
        while let Some(next) = walked.last().and_then(|s| s.next()) {
            walked.push(next);
        }
        assert_eq!(walked, Stage::ALL.to_vec());
    }

    #[test]
    fn test_only_export_is_recoverable() {
        let recoverable: Vec<Stage> = Stage::ALL
            .into_iter()
            .filter(|s| *s != Stage::Done && !s.is_failure_fatal())
            .collect();
        assert_eq!(recoverable, vec![Stage::Export]);
    }

    #[test]
    fn test_serialized_names() {
        assert_eq!(
            serde_json::to_string(&Stage::PerSystemProcessing).unwrap(),
            "\"per_system_processing\""
        );
        assert_eq!(Stage::Upload.to_string(), "upload");
    }
}
