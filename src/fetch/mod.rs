//! Build record sources
//!
//! Builds come either from a local pre-fetched JSON file or from the
//! KernelCI build API, polled until enough builds are available.

mod local;
mod remote;

pub use local::load_local;
pub use remote::HttpBuildApi;

use kci_protocol::{BuildQuery, BuildRecord};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// Where build records come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildSource {
    /// Flat JSON array of builds on disk
    Local(PathBuf),
    /// Build API root and its token
    Remote { api: reqwest::Url, token: String },
}

/// Fetch errors
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to read builds file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid builds in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: kci_protocol::ParseError,
    },

    #[error("invalid build API URL '{url}': {reason}")]
    Url { url: String, reason: String },

    #[error("build API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid build API response: {0}")]
    Response(#[from] kci_protocol::ParseError),
}

/// Queries builds from the API.
pub trait BuildApi {
    /// One request; any HTTP error status is returned as an error.
    fn get_builds(&self, query: &BuildQuery) -> Result<Vec<BuildRecord>, FetchError>;
}

/// Bounded polling of the build API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_secs(30),
        }
    }
}

/// Builds obtained from a source.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub builds: Vec<BuildRecord>,
    /// Requests made (0 for a local file)
    pub attempts: u32,
    /// Builds the query asked for
    pub expected: usize,
}

impl FetchOutcome {
    /// Whether at least the expected number of builds arrived
    pub fn is_complete(&self) -> bool {
        self.builds.len() >= self.expected
    }
}

/// Poll the API until `query.expected_count()` builds are returned.
///
/// Running out of attempts is not an error: the last result set is
/// returned and the shortfall logged. HTTP errors abort immediately.
pub fn fetch_with_retry(
    api: &dyn BuildApi,
    query: &BuildQuery,
    policy: &RetryPolicy,
) -> Result<FetchOutcome, FetchError> {
    let expected = query.expected_count();
    let mut outcome = FetchOutcome {
        builds: Vec::new(),
        attempts: 0,
        expected,
    };

    for attempt in 1..=policy.attempts {
        outcome.builds = api.get_builds(query)?;
        outcome.attempts = attempt;
        if outcome.is_complete() {
            break;
        }
        warn!(
            attempt,
            attempts = policy.attempts,
            found = outcome.builds.len(),
            expected,
            "fewer builds than expected"
        );
        if attempt < policy.attempts && !policy.delay.is_zero() {
            info!(seconds = policy.delay.as_secs(), "waiting before retrying");
            thread::sleep(policy.delay);
        }
    }

    if !outcome.is_complete() {
        warn!(
            found = outcome.builds.len(),
            expected, "giving up waiting for builds, continuing with what was found"
        );
    }
    Ok(outcome)
}

/// Fetch builds from either source.
pub fn fetch_builds(
    source: &BuildSource,
    query: &BuildQuery,
    policy: &RetryPolicy,
) -> Result<FetchOutcome, FetchError> {
    match source {
        BuildSource::Local(path) => {
            info!(path = %path.display(), "loading builds from file");
            let builds = load_local(path)?;
            Ok(FetchOutcome {
                builds,
                attempts: 0,
                expected: query.expected_count(),
            })
        }
        BuildSource::Remote { api, token } => {
            info!(api = %api, tree = %query.job, kernel = %query.kernel, "querying build API");
            let client = HttpBuildApi::new(api.clone(), token.clone())?;
            fetch_with_retry(&client, query, policy)
        }
    }
}
