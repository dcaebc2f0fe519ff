//! Typed run configuration
//!
//! Deserialized from the merged layers; see [`super::EffectiveConfig`].

use kci_protocol::{BuildQuery, DefconfigSelector};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::effective::ConfigError;
use crate::callback::{CallbackType, CliCallback, Dataset};
use crate::fetch::{BuildSource, RetryPolicy};

/// LAVA job priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build API polling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    pub attempts: u32,
    pub delay_seconds: u64,
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.attempts,
            delay: Duration::from_secs(self.delay_seconds),
        }
    }
}

/// Everything one run needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobgenConfig {
    /// Lab the jobs are generated for
    pub lab: String,

    /// Kernel tree
    pub tree: String,

    pub branch: String,

    /// Kernel `git describe`
    pub describe: String,

    /// Test plans to generate jobs for
    pub plans: Vec<String>,

    pub arch: String,

    /// Device types to restrict jobs to (empty: all)
    #[serde(default)]
    pub targets: Vec<String>,

    pub priority: Priority,

    /// Storage root the build artifacts are served from
    #[serde(default)]
    pub storage: Option<String>,

    /// Build API root
    #[serde(default)]
    pub api: Option<String>,

    /// Build API token
    #[serde(default)]
    pub token: Option<String>,

    /// Local builds file, used instead of the API
    #[serde(default)]
    pub builds: Option<PathBuf>,

    /// Output directory (default: the lab name)
    #[serde(default)]
    pub jobs: Option<PathBuf>,

    /// Catalog file
    pub test_configs: PathBuf,

    /// Template directory
    pub templates: PathBuf,

    /// Command-line callback token
    #[serde(default)]
    pub callback: Option<String>,

    /// Command-line callback URL (default: the API root)
    #[serde(default)]
    pub callback_url: Option<String>,

    pub callback_type: CallbackType,

    pub callback_dataset: Dataset,

    /// Callback file
    #[serde(default)]
    pub callback_config_file: Option<PathBuf>,

    /// Number of builds expected from the API
    pub defconfigs: usize,

    /// Only this defconfig
    #[serde(default)]
    pub defconfig_full: Option<String>,

    pub retry: RetrySettings,
}

impl JobgenConfig {
    /// Check required values and their domains.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("lab", &self.lab),
            ("tree", &self.tree),
            ("branch", &self.branch),
            ("describe", &self.describe),
            ("arch", &self.arch),
        ] {
            if value.is_empty() {
                return Err(ConfigError::Validation(format!("{} must not be empty", field)));
            }
        }
        if self.plans.is_empty() || self.plans.iter().any(String::is_empty) {
            return Err(ConfigError::Validation(
                "at least one test plan is required".to_string(),
            ));
        }
        if self.retry.attempts == 0 {
            return Err(ConfigError::Validation(
                "retry.attempts must be at least 1".to_string(),
            ));
        }
        self.storage_url()?;
        self.build_source()?;
        Ok(())
    }

    /// Storage root as a URL.
    pub fn storage_url(&self) -> Result<Url, ConfigError> {
        let storage = non_empty(&self.storage).ok_or_else(|| {
            ConfigError::Validation("No KernelCI storage URL provided".to_string())
        })?;
        parse_url("storage", storage)
    }

    /// Local file when `builds` is set, the API otherwise.
    pub fn build_source(&self) -> Result<BuildSource, ConfigError> {
        if let Some(ref builds) = self.builds {
            return Ok(BuildSource::Local(builds.clone()));
        }
        let token = non_empty(&self.token).ok_or_else(|| {
            ConfigError::Validation("No KernelCI API token provided".to_string())
        })?;
        let api = non_empty(&self.api)
            .ok_or_else(|| ConfigError::Validation("No KernelCI API URL provided".to_string()))?;
        Ok(BuildSource::Remote {
            api: parse_url("api", api)?,
            token: token.to_string(),
        })
    }

    /// Build API query for this run.
    pub fn build_query(&self) -> BuildQuery {
        let selector = match non_empty(&self.defconfig_full) {
            Some(defconfig) => DefconfigSelector::Full(defconfig.to_string()),
            None => DefconfigSelector::Count(self.defconfigs),
        };
        BuildQuery {
            job: self.tree.clone(),
            kernel: self.describe.clone(),
            git_branch: self.branch.clone(),
            arch: self.arch.clone(),
            selector,
        }
    }

    /// Directory the job files are written to.
    pub fn output_dir(&self) -> PathBuf {
        self.jobs
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.lab))
    }

    /// Callback built from command-line flags, present when a token is set.
    pub fn cli_callback(&self) -> Option<CliCallback> {
        let token = non_empty(&self.callback)?;
        Some(CliCallback {
            token: token.to_string(),
            url: non_empty(&self.callback_url)
                .or_else(|| non_empty(&self.api))
                .map(str::to_string),
            kind: self.callback_type,
            dataset: self.callback_dataset,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn parse_url(field: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value)
        .map_err(|e| ConfigError::Validation(format!("invalid {} URL '{}': {}", field, value, e)))
}
