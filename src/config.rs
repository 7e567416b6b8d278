//! Runtime configuration for the trial pipeline.
//!
//! The same struct is parsed from the command line (clap) and from an
//! optional JSON file. Values given on the command line win over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::checkpoint::{Checkpoint, CheckpointStore, DEFAULT_STATE_FILE};
use crate::source::{Order, Plan, Source};
use crate::worker::{RunSettings, DEFAULT_TIMEOUT, DEFAULT_WORKERS};

/// Credential trial runner
#[derive(Parser, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[command(author, version, about, long_about = None)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Single identity to try
    #[arg(short = 'u', long)]
    #[serde(alias = "singleUser", skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,

    /// File with one identity per line
    #[arg(short = 'U', long)]
    #[serde(alias = "userList", skip_serializing_if = "Option::is_none")]
    pub identity_list: Option<PathBuf>,

    /// Single secret to try (empty string tries "no secret")
    #[arg(short = 'p', long)]
    #[serde(alias = "singlePass", skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// File with one secret per line
    #[arg(short = 'P', long)]
    #[serde(alias = "passList", skip_serializing_if = "Option::is_none")]
    pub secret_list: Option<PathBuf>,

    /// Maximum concurrent trials (default: 10)
    #[arg(short = 'w', long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Stop after the first success
    #[arg(short = 'f', long)]
    pub first_only: bool,

    /// Try every secret for one identity before moving to the next
    #[arg(long)]
    #[serde(alias = "userFirst")]
    pub identity_first: bool,

    /// Continue after the pair recorded in the state file
    #[arg(short = 'r', long)]
    pub resume: bool,

    /// Checkpoint file (default: state.json)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,

    /// Per-trial timeout in seconds (default: 10)
    #[arg(short = 't', long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// JSON configuration file
    #[arg(short = 'c', long)]
    #[serde(skip)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Loads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Merges in the file named by `--config`, if any. Command-line values win.
    pub fn with_file(self) -> Result<Self, ConfigError> {
        match &self.config {
            Some(path) => {
                let file = Self::from_file(path)?;
                Ok(self.merge(file))
            }
            None => Ok(self),
        }
    }

    /// Fills every unset field of `self` from `other`.
    pub fn merge(self, other: Config) -> Self {
        Self {
            identity: self.identity.or(other.identity),
            identity_list: self.identity_list.or(other.identity_list),
            secret: self.secret.or(other.secret),
            secret_list: self.secret_list.or(other.secret_list),
            workers: self.workers.or(other.workers),
            first_only: self.first_only || other.first_only,
            identity_first: self.identity_first || other.identity_first,
            resume: self.resume || other.resume,
            state_file: self.state_file.or(other.state_file),
            timeout: self.timeout.or(other.timeout),
            verbose: self.verbose || other.verbose,
            config: self.config,
        }
    }

    /// Writes an example configuration file.
    pub fn write_sample(path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let sample = Config {
            identity: Some("admin".into()),
            identity_list: Some("users.txt".into()),
            secret: None,
            secret_list: Some("pass.txt".into()),
            workers: Some(DEFAULT_WORKERS),
            first_only: false,
            identity_first: false,
            resume: false,
            state_file: Some(DEFAULT_STATE_FILE.into()),
            timeout: Some(DEFAULT_TIMEOUT.as_secs()),
            verbose: true,
            config: None,
        };
        let json = serde_json::to_string_pretty(&sample).map_err(ConfigError::Encode)?;
        std::fs::write(path, json).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity.is_none() && self.identity_list.is_none() {
            return Err(ConfigError::MissingIdentity);
        }

        if let Some(identity) = &self.identity {
            if identity.trim().is_empty() {
                return Err(ConfigError::MissingIdentity);
            }
        }

        if self.worker_count() == 0 {
            return Err(ConfigError::InvalidWorkers(0));
        }

        if self.timeout == Some(0) {
            return Err(ConfigError::InvalidTimeout);
        }

        Ok(())
    }

    /// Returns the number of workers, defaulting to 10
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or(DEFAULT_WORKERS)
    }

    pub fn order(&self) -> Order {
        if self.identity_first {
            Order::IdentityMajor
        } else {
            Order::SecretMajor
        }
    }

    pub fn trial_timeout(&self) -> Duration {
        self.timeout
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| DEFAULT_STATE_FILE.into())
    }

    /// Builds the immutable settings a run is started with.
    pub fn settings(&self) -> RunSettings {
        RunSettings {
            workers: self.worker_count(),
            first_only: self.first_only,
            order: self.order(),
            trial_timeout: self.trial_timeout(),
        }
    }

    /// Resolves both sources. With `--resume`, file sources continue after the
    /// pair stored in `checkpoints`.
    ///
    /// A literal wins over a list on the same axis. With no secret at all, the
    /// empty secret is tried.
    pub fn plan(&self, checkpoints: &dyn CheckpointStore) -> Result<Plan, ConfigError> {
        self.validate()?;

        let checkpoint = if self.resume {
            match checkpoints.load() {
                Ok(checkpoint) => checkpoint,
                Err(e) => {
                    warn!("{}; starting from the beginning", e);
                    Checkpoint::default()
                }
            }
        } else {
            Checkpoint::default()
        };
        if self.resume {
            debug!(
                "Resuming after identity {:?}, secret {:?}",
                checkpoint.last_identity, checkpoint.last_secret
            );
        }

        let identities = match (&self.identity, &self.identity_list) {
            (Some(identity), _) => Source::literal(identity.as_str()),
            (None, Some(path)) if self.resume => {
                Source::resume(path, checkpoint.last_identity.as_str())
            }
            (None, Some(path)) => Source::file(path),
            (None, None) => return Err(ConfigError::MissingIdentity),
        };

        let secrets = match (&self.secret, &self.secret_list) {
            (Some(secret), _) => Source::literal(secret.as_str()),
            (None, Some(path)) if self.resume => {
                Source::resume(path, checkpoint.last_secret.as_str())
            }
            (None, Some(path)) => Source::file(path),
            (None, None) => Source::literal(""),
        };

        Ok(Plan::new(identities, secrets))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Either an identity or an identity list is required")]
    MissingIdentity,

    #[error("Invalid worker count: {0}. Must be at least 1")]
    InvalidWorkers(usize),

    #[error("Timeout must be at least one second")]
    InvalidTimeout,

    #[error("Cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot write config file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot encode config: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}
