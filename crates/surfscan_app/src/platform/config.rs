//! Command line and config-file settings for the relay host.
//!
//! Precedence: CLI flag, then config file, then built-in default.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use serde::Deserialize;
use surfscan_engine::{BackendSettings, SubmitPolicy};
use surfscan_logging::LogDestination;
use thiserror::Error;

use super::stdio_tabs::DEFAULT_SCAN_TIMEOUT;

const LOG_FILENAME: &str = "surfscan.log";

#[derive(Debug, Parser)]
#[command(
    name = "surfscan-relay",
    version,
    about = "Relay host for the SurfScan browser extension"
)]
pub struct Cli {
    /// Directory holding session.ron and results.json.
    #[arg(long, env = "SURFSCAN_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Backend base URL, e.g. http://localhost:8000/api.
    #[arg(long, env = "SURFSCAN_ENDPOINT")]
    pub endpoint: Option<String>,

    /// How records are checked before submission.
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Optional RON config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Where log output goes; stdout is never used.
    #[arg(long, value_enum, default_value_t = LogArg::Terminal)]
    pub log: LogArg,

    /// Log at debug level.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// POST /scan with "null" for absent fields.
    Normalize,
    /// POST /process; title and url are mandatory.
    RequireFields,
}

impl From<PolicyArg> for SubmitPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Normalize => SubmitPolicy::Normalize,
            PolicyArg::RequireFields => SubmitPolicy::RequireFields,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogArg {
    File,
    Terminal,
    Both,
}

impl From<LogArg> for LogDestination {
    fn from(arg: LogArg) -> Self {
        match arg {
            LogArg::File => LogDestination::File,
            LogArg::Terminal => LogDestination::Terminal,
            LogArg::Both => LogDestination::Both,
        }
    }
}

/// On-disk config; every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub endpoint: Option<String>,
    pub policy: Option<SubmitPolicy>,
    pub state_dir: Option<PathBuf>,
    pub extension_version: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub scan_timeout_secs: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &text)
    }

    fn parse(path: &Path, text: &str) -> Result<Self, ConfigError> {
        ron::from_str(text).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub backend: BackendSettings,
    pub state_dir: PathBuf,
    pub scan_timeout: Duration,
    pub log_destination: LogDestination,
    pub log_level: LevelFilter,
    pub log_path: PathBuf,
}

impl RelayConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Ok(Self::merge(cli, file))
    }

    fn merge(cli: &Cli, file: FileConfig) -> Self {
        let mut backend = BackendSettings::default();
        if let Some(endpoint) = cli.endpoint.clone().or(file.endpoint) {
            backend.endpoint = endpoint;
        }
        if let Some(policy) = cli.policy.map(SubmitPolicy::from).or(file.policy) {
            backend.policy = policy;
        }
        if let Some(version) = file.extension_version {
            backend.extension_version = version;
        }
        if let Some(secs) = file.request_timeout_secs {
            backend.request_timeout = Duration::from_secs(secs);
        }

        let state_dir = cli
            .state_dir
            .clone()
            .or(file.state_dir)
            .unwrap_or_else(default_state_dir);
        let scan_timeout = file
            .scan_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SCAN_TIMEOUT);

        Self {
            backend,
            log_path: state_dir.join(LOG_FILENAME),
            state_dir,
            scan_timeout,
            log_destination: cli.log.into(),
            log_level: if cli.verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            },
        }
    }
}

fn default_state_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("surfscan"))
        .unwrap_or_else(|| PathBuf::from(".surfscan"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["surfscan-relay"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect("valid args")
    }

    #[test]
    fn defaults_without_flags_or_file() {
        let config = RelayConfig::merge(&cli(&["--state-dir", "/tmp/s"]), FileConfig::default());
        assert_eq!(config.backend.endpoint, "http://localhost:8000/api");
        assert_eq!(config.backend.policy, SubmitPolicy::Normalize);
        assert_eq!(config.state_dir, PathBuf::from("/tmp/s"));
        assert_eq!(config.log_path, PathBuf::from("/tmp/s/surfscan.log"));
        assert_eq!(config.scan_timeout, DEFAULT_SCAN_TIMEOUT);
        assert_eq!(config.log_level, LevelFilter::Info);
    }

    #[test]
    fn file_config_parses_ron() {
        let file = FileConfig::parse(
            Path::new("relay.ron"),
            r#"(
                endpoint: Some("http://backend:9000/api"),
                policy: Some(require_fields),
                scan_timeout_secs: Some(3),
            )"#,
        )
        .unwrap();
        assert_eq!(file.endpoint.as_deref(), Some("http://backend:9000/api"));
        assert_eq!(file.policy, Some(SubmitPolicy::RequireFields));
        assert_eq!(file.scan_timeout_secs, Some(3));
    }

    #[test]
    fn cli_flags_override_file() {
        let file = FileConfig {
            endpoint: Some("http://file/api".into()),
            policy: Some(SubmitPolicy::RequireFields),
            state_dir: Some(PathBuf::from("/from/file")),
            ..FileConfig::default()
        };
        let config = RelayConfig::merge(
            &cli(&["--endpoint", "http://cli/api", "--policy", "normalize", "-v"]),
            file,
        );
        assert_eq!(config.backend.endpoint, "http://cli/api");
        assert_eq!(config.backend.policy, SubmitPolicy::Normalize);
        assert_eq!(config.state_dir, PathBuf::from("/from/file"));
        assert_eq!(config.log_level, LevelFilter::Debug);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = FileConfig::parse(Path::new("relay.ron"), "(endpoit: None)").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
