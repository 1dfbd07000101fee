//! Schedules saved as JSON
//!
//! ```json
//! {
//!   "escape": "hex",
//!   "actions": [
//!     { "hold": "0s", "data": "41 54 0d" },
//!     { "hold": "1.5s", "data": "41 54 49 0d" }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};

use rig_engine::{Session, Transport, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleFileError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("bad escape in {path}: {source}")]
    Escape {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },

    #[error("entry {index} in {path}: {source}")]
    Entry {
        path: PathBuf,
        index: usize,
        #[source]
        source: ValidationError,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleFile {
    /// Escape scheme name; the session's current scheme when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escape: Option<String>,
    #[serde(default)]
    pub actions: Vec<FileAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileAction {
    pub hold: String,
    #[serde(default)]
    pub data: String,
}

impl ScheduleFile {
    pub fn load(path: &Path) -> Result<Self, ScheduleFileError> {
        let text = std::fs::read_to_string(path).map_err(|source| ScheduleFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ScheduleFileError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Append every action to the session's schedule
    ///
    /// The escape scheme (if named) is selected first so entries are
    /// validated against it. Stops at the first rejected entry.
    pub fn apply<T: Transport>(
        &self,
        path: &Path,
        session: &mut Session<T>,
    ) -> Result<usize, ScheduleFileError> {
        let entry_error = |index, source| ScheduleFileError::Entry {
            path: path.to_path_buf(),
            index,
            source,
        };

        if let Some(name) = &self.escape {
            session
                .select_scheme(name)
                .map_err(|source| ScheduleFileError::Escape {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        for (index, action) in self.actions.iter().enumerate() {
            session
                .add_action(&action.hold, &action.data)
                .map_err(|e| entry_error(index, e))?;
        }
        Ok(self.actions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rig_engine::{EscapeScheme, MemorySink};
    use rig_sim::LoopbackTransport;
    use std::sync::Arc;
    use std::time::Duration;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("schedule.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"{"escape": "C-style", "actions": [{"hold": "250ms", "data": "AT\\r"}, {"hold": "1s"}]}"#,
        );

        let file = ScheduleFile::load(&path).unwrap();
        assert_eq!(file.escape.as_deref(), Some("C-style"));
        assert_eq!(file.actions.len(), 2);
        assert_eq!(file.actions[0].data, "AT\\r");
        assert_eq!(file.actions[1].data, "");
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ScheduleFile::load(&dir.path().join("missing.json")),
            Err(ScheduleFileError::Io { .. })
        ));

        let path = write(&dir, "[1, 2");
        assert!(matches!(
            ScheduleFile::load(&path),
            Err(ScheduleFileError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn test_apply_to_session() {
        let (device, _probe) = LoopbackTransport::silent();
        let mut session = Session::open("loop0", device, Arc::new(MemorySink::new()));

        let file = ScheduleFile {
            escape: Some("hex".to_string()),
            actions: vec![
                FileAction {
                    hold: "0s".to_string(),
                    data: "41".to_string(),
                },
                FileAction {
                    hold: "2s".to_string(),
                    data: "42 43".to_string(),
                },
            ],
        };
        assert_eq!(file.apply(Path::new("s.json"), &mut session).unwrap(), 2);
        assert_eq!(session.scheme(), EscapeScheme::Hex);
        assert_eq!(session.schedule().entries()[1].hold, Duration::from_secs(2));

        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_apply_reports_bad_entry() {
        let (device, _probe) = LoopbackTransport::silent();
        let mut session = Session::open("loop0", device, Arc::new(MemorySink::new()));

        let file = ScheduleFile {
            escape: Some("binary".to_string()),
            actions: vec![
                FileAction {
                    hold: "0s".to_string(),
                    data: "01000001".to_string(),
                },
                FileAction {
                    hold: "0s".to_string(),
                    data: "012".to_string(),
                },
            ],
        };
        let err = file.apply(Path::new("s.json"), &mut session).unwrap_err();
        assert!(matches!(err, ScheduleFileError::Entry { index: 1, .. }));
        assert_eq!(session.schedule().len(), 1);

        session.close().await.unwrap();
    }
}
