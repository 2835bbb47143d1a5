use clap::Parser;
use outpost::feed::FeedConfig;
use outpost::history::DEFAULT_RETENTION;
use serde::Deserialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_HUB: &str = "tcp://localhost:7441";
pub const DEFAULT_HISTORY_FILE: &str = "outpost-history.jsonl";
pub const DEFAULT_FPS: u64 = 10;

/// Environment variable read by the log filter.
pub const LOG_ENV: &str = "OUTPOST_LOG";

/// Hub connection options shared by every tool.
#[derive(Parser, Debug, Clone, Default)]
pub struct SiteOpts {
    /// Hub realtime address (e.g. tcp://localhost:7441)
    #[arg(short = 'u', long = "hub", help = "Hub realtime address")]
    pub hub: Option<String>,

    /// Hub HTTP API base for identity and backfill (e.g. http://localhost:8000)
    #[arg(short = 'a', long = "api", help = "Hub HTTP API base")]
    pub api: Option<String>,

    /// YAML file carrying any of these settings; flags win over the file
    #[arg(short = 'c', long = "config", help = "Config file path")]
    pub config: Option<PathBuf>,

    /// Where received telemetry is stored
    #[arg(long = "history-file", help = "History store path")]
    pub history_file: Option<PathBuf>,

    /// History retention cap, in records
    #[arg(long = "retention", help = "History retention, in records")]
    pub retention: Option<usize>,
}

/// Optional settings file; any subset of the CLI settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub hub: Option<String>,
    pub api: Option<String>,
    pub history_file: Option<PathBuf>,
    pub retention: Option<usize>,
    pub fps: Option<u64>,
    pub log_file: Option<PathBuf>,
}

/// Fully-resolved settings: flags over config file over defaults.
#[derive(Debug, Clone)]
pub struct Site {
    pub hub: String,
    pub api: Option<String>,
    pub history_file: PathBuf,
    pub retention: usize,
    pub fps: u64,
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {err}")]
    Read {
        path: PathBuf,
        #[source]
        err: io::Error,
    },
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("cannot open log file {path}: {err}")]
    LogFile {
        path: PathBuf,
        #[source]
        err: io::Error,
    },
}

impl SiteOpts {
    pub fn resolve(&self) -> Result<Site, ConfigError> {
        let config: SiteConfig = match &self.config {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|err| ConfigError::Read {
                    path: path.clone(),
                    err,
                })?;
                serde_yaml::from_str(&raw)?
            }
            None => SiteConfig::default(),
        };
        Ok(Site {
            hub: self
                .hub
                .clone()
                .or(config.hub)
                .unwrap_or_else(|| DEFAULT_HUB.to_string()),
            api: self.api.clone().or(config.api),
            history_file: self
                .history_file
                .clone()
                .or(config.history_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_FILE)),
            retention: self.retention.or(config.retention).unwrap_or(DEFAULT_RETENTION),
            fps: config.fps.unwrap_or(DEFAULT_FPS),
            log_file: config.log_file,
        })
    }
}

impl Site {
    /// Identity endpoint, when an API base is configured.
    pub fn whoami_url(&self) -> Option<String> {
        self.api.as_deref().map(|base| join_api(base, "/api/whoami"))
    }

    /// Batch telemetry endpoint, when an API base is configured.
    pub fn records_url(&self) -> Option<String> {
        self.api
            .as_deref()
            .map(|base| join_api(base, "/api/sensor-data"))
    }

    pub fn feed_config(&self) -> FeedConfig {
        let mut config = FeedConfig::new(&self.hub);
        config.whoami_url = self.whoami_url();
        config
    }
}

fn join_api(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Env-filtered logging to stderr, for the line tools.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(io::stderr)
        .init();
}

/// The dash owns the terminal, so its log output goes to a file, or
/// nowhere when no path is configured.
pub fn init_file_logging(path: Option<&PathBuf>) -> Result<(), ConfigError> {
    let path = match path {
        Some(path) => path,
        None => return Ok(()),
    };
    let file = File::create(path).map_err(|err| ConfigError::LogFile {
        path: path.clone(),
        err,
    })?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn opts() -> SiteOpts {
        SiteOpts::default()
    }

    #[test]
    fn defaults_without_flags_or_file() {
        let site = opts().resolve().unwrap();
        assert_eq!(site.hub, DEFAULT_HUB);
        assert_eq!(site.api, None);
        assert_eq!(site.retention, DEFAULT_RETENTION);
        assert_eq!(site.history_file, PathBuf::from(DEFAULT_HISTORY_FILE));
        assert_eq!(site.fps, DEFAULT_FPS);
    }

    #[test]
    fn flags_win_over_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.yaml");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "hub: tcp://fileside:7441").unwrap();
        writeln!(file, "retention: 250").unwrap();
        writeln!(file, "fps: 2").unwrap();

        let mut opts = opts();
        opts.config = Some(path);
        opts.hub = Some("tcp://flagside:7441".to_string());
        let site = opts.resolve().unwrap();
        assert_eq!(site.hub, "tcp://flagside:7441");
        assert_eq!(site.retention, 250);
        assert_eq!(site.fps, 2);
    }

    #[test]
    fn api_urls_join_cleanly() {
        let mut opts = opts();
        opts.api = Some("http://hub.example:8000/".to_string());
        let site = opts.resolve().unwrap();
        assert_eq!(
            site.whoami_url().unwrap(),
            "http://hub.example:8000/api/whoami"
        );
        assert_eq!(
            site.records_url().unwrap(),
            "http://hub.example:8000/api/sensor-data"
        );
        let config = site.feed_config();
        assert!(config.whoami_url.is_some());
    }

    #[test]
    fn bad_config_paths_and_yaml_surface() {
        let mut opts = opts();
        opts.config = Some(PathBuf::from("/nonexistent/site.yaml"));
        assert!(matches!(
            opts.resolve(),
            Err(ConfigError::Read { .. })
        ));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "retention: [not a number").unwrap();
        let mut opts = SiteOpts::default();
        opts.config = Some(path);
        assert!(matches!(opts.resolve(), Err(ConfigError::Parse(_))));
    }
}
