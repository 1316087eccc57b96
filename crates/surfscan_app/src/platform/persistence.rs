//! Session and result log on disk.
//!
//! Each file is replaced whole: content goes to a temp file in the same
//! directory, is synced, then renamed over the old file. A crash leaves either
//! the previous file or the new one, plus at most a stray temp file that
//! `load` never looks at.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use surfscan_core::{SessionState, StoredResult};
use surfscan_logging::{scan_debug, scan_info, scan_warn};
use tempfile::NamedTempFile;
use thiserror::Error;

const SESSION_FILENAME: &str = "session.ron";
// The record is flattened into each entry, which RON cannot read back.
const RESULTS_FILENAME: &str = "results.json";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state directory {path:?} is unusable: {source}")]
    StateDir { path: PathBuf, source: io::Error },
    #[error("cannot write {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("cannot encode {file}: {message}")]
    Encode { file: &'static str, message: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Persisted {
    pub session: SessionState,
    pub results: Vec<StoredResult>,
}

#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the state directory if needed; fails when the path is a file.
    pub fn prepare(&self) -> Result<(), PersistError> {
        fs::create_dir_all(&self.dir).map_err(|source| PersistError::StateDir {
            path: self.dir.clone(),
            source,
        })
    }

    /// Reads both files. Missing or unreadable files yield defaults.
    pub fn load(&self) -> Persisted {
        let session = self
            .read(SESSION_FILENAME, |text| {
                ron::from_str::<SessionState>(text).map_err(|err| err.to_string())
            })
            .unwrap_or_default();
        let results = self
            .read(RESULTS_FILENAME, |text| {
                serde_json::from_str::<Vec<StoredResult>>(text).map_err(|err| err.to_string())
            })
            .unwrap_or_default();

        scan_info!(
            "Loaded state from {:?}: auto_scan={} phase={} results={}",
            self.dir,
            session.auto_scan_enabled,
            session.current_phase.as_str(),
            results.len()
        );
        Persisted { session, results }
    }

    pub fn save_session(&self, session: &SessionState) -> Result<(), PersistError> {
        let content = ron::ser::to_string_pretty(session, ron::ser::PrettyConfig::new())
            .map_err(|err| PersistError::Encode {
                file: SESSION_FILENAME,
                message: err.to_string(),
            })?;
        self.replace(SESSION_FILENAME, &content)
    }

    pub fn save_results(&self, results: &[StoredResult]) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(results).map_err(|err| PersistError::Encode {
            file: RESULTS_FILENAME,
            message: err.to_string(),
        })?;
        self.replace(RESULTS_FILENAME, &content)?;
        scan_debug!("Persisted {} results", results.len());
        Ok(())
    }

    fn read<T>(&self, filename: &str, parse: impl FnOnce(&str) -> Result<T, String>) -> Option<T> {
        let path = self.dir.join(filename);
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                scan_warn!("Failed to read persisted state from {:?}: {}", path, err);
                return None;
            }
        };
        match parse(&content) {
            Ok(value) => Some(value),
            Err(err) => {
                scan_warn!("Failed to parse persisted state from {:?}: {}", path, err);
                None
            }
        }
    }

    fn replace(&self, filename: &str, content: &str) -> Result<(), PersistError> {
        self.prepare()?;
        let target = self.dir.join(filename);
        let write_error = |source| PersistError::Write {
            path: target.clone(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(write_error)?;
        tmp.write_all(content.as_bytes()).map_err(write_error)?;
        tmp.as_file().sync_all().map_err(write_error)?;
        tmp.persist(&target)
            .map_err(|err| write_error(err.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surfscan_core::{BackendStatus, Phase, ScanRecord, ScanSource};
    use tempfile::TempDir;

    fn stored(title: &str) -> StoredResult {
        StoredResult {
            record: ScanRecord {
                title: title.into(),
                url: "https://example.com".into(),
                ..ScanRecord::default()
            },
            timestamp: "2025-10-09T00:00:00Z".into(),
            tab_url: Some("https://example.com".into()),
            backend_status: BackendStatus::Failed,
            backend_error: Some("Server responded with 500".into()),
            source: Some(ScanSource::Auto),
        }
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn empty_dir_loads_defaults() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path().to_path_buf());
        assert_eq!(store.load(), Persisted::default());
    }

    #[test]
    fn saved_state_loads_back_from_a_fresh_dir() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path().join("nested"));
        let session = SessionState {
            auto_scan_enabled: true,
            current_phase: Phase::AutoScan,
        };
        store.save_session(&session).unwrap();
        store.save_results(&[stored("one"), stored("two")]).unwrap();

        let loaded = StateStore::new(store.dir().to_path_buf()).load();
        assert_eq!(loaded.session, session);
        assert_eq!(loaded.results, vec![stored("one"), stored("two")]);
    }

    #[test]
    fn results_file_uses_extension_keys() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path().to_path_buf());
        store.save_results(&[stored("one")]).unwrap();
        let text = fs::read_to_string(temp.path().join(RESULTS_FILENAME)).unwrap();
        assert!(text.contains("\"tabUrl\""));
        assert!(text.contains("\"backendStatus\": \"failed\""));
        assert!(text.contains("\"title\": \"one\""));
    }

    #[test]
    fn replacing_results_leaves_only_the_state_files() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path().to_path_buf());
        store.save_results(&[stored("old")]).unwrap();
        store.save_results(&[stored("old"), stored("new")]).unwrap();
        store.save_session(&SessionState::default()).unwrap();

        assert_eq!(
            file_names(temp.path()),
            vec![RESULTS_FILENAME.to_string(), SESSION_FILENAME.to_string()]
        );
        assert_eq!(store.load().results.len(), 2);
    }

    #[test]
    fn interrupted_write_keeps_previous_results() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path().to_path_buf());
        store.save_results(&[stored("kept")]).unwrap();
        // What a crash between temp write and rename leaves behind.
        fs::write(temp.path().join(".tmpA1b2C3"), "[{\"title\": \"half").unwrap();

        assert_eq!(store.load().results, vec![stored("kept")]);
    }

    #[test]
    fn corrupt_files_fall_back_to_defaults() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(SESSION_FILENAME), "(autoScanEnabled: maybe").unwrap();
        fs::write(temp.path().join(RESULTS_FILENAME), "{not json").unwrap();
        let store = StateStore::new(temp.path().to_path_buf());
        assert_eq!(store.load(), Persisted::default());
    }

    #[test]
    fn state_dir_that_is_a_file_is_reported() {
        let temp = TempDir::new().unwrap();
        let not_a_dir = temp.path().join("state");
        fs::write(&not_a_dir, "x").unwrap();
        let store = StateStore::new(not_a_dir.clone());

        assert!(matches!(
            store.prepare(),
            Err(PersistError::StateDir { .. })
        ));
        assert!(store.save_results(&[stored("lost")]).is_err());
        assert_eq!(fs::read_to_string(&not_a_dir).unwrap(), "x");
    }
}
