//! Build API query parameters.

use serde::{Deserialize, Serialize};

/// How many builds a query expects back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefconfigSelector {
    /// Only the build for this full defconfig (expects exactly one)
    Full(String),
    /// Any defconfig; the caller expects at least this many builds
    Count(usize),
}

/// Query against `GET <api>/build`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildQuery {
    /// Tree name (`job` on the wire)
    pub job: String,
    /// Kernel `git describe`
    pub kernel: String,
    pub git_branch: String,
    pub arch: String,
    pub selector: DefconfigSelector,
}

impl BuildQuery {
    /// Number of builds that counts as a complete result.
    pub fn expected_count(&self) -> usize {
        match self.selector {
            DefconfigSelector::Full(_) => 1,
            DefconfigSelector::Count(n) => n,
        }
    }

    /// Query string pairs in wire order.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![
            ("job", self.job.as_str()),
            ("kernel", self.kernel.as_str()),
            ("git_branch", self.git_branch.as_str()),
            ("arch", self.arch.as_str()),
        ];
        if let DefconfigSelector::Full(ref defconfig) = self.selector {
            pairs.push(("defconfig_full", defconfig.as_str()));
        }
        pairs
    }
}
