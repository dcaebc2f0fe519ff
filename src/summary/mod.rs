//! Run summary
//!
//! Counts of what a run fetched, matched, skipped and wrote, plus the
//! process exit code derived from them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::emit::{EmitFailure, EmitReport};
use crate::resolver::{Resolution, SkipCounts};

/// Schema identifier for the JSON summary
pub const RUN_SUMMARY_SCHEMA_ID: &str = "kci-lava-jobs/run_summary@1";

/// Stable process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitCode {
    /// Every resolved job was written
    Success = 0,
    /// Configuration, catalog or build API failure
    Fatal = 1,
    /// At least one job failed to render or write
    JobsFailed = 2,
}

impl ExitCode {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }
}

/// Summary of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub schema_id: String,
    pub created_at: DateTime<Utc>,
    pub lab: String,
    pub tree: String,
    pub branch: String,
    pub describe: String,
    pub arch: String,
    pub builds: usize,
    pub passing_builds: usize,
    /// Test configs in the catalog
    pub test_configs: usize,
    pub skipped: SkipCounts,
    pub jobs_resolved: usize,
    pub jobs_written: usize,
    pub jobs_failed: usize,
    pub failures: Vec<EmitFailure>,
    /// A callback file was given but every entry was dropped
    pub callback_file_empty: bool,
    /// Nothing was written
    pub dry_run: bool,
    pub exit_code: i32,
}

/// Identity of the kernel a run is for
#[derive(Debug, Clone, Default)]
pub struct RunIdentity {
    pub lab: String,
    pub tree: String,
    pub branch: String,
    pub describe: String,
    pub arch: String,
}

impl RunSummary {
    /// Summarize a run; `report` is None for a dry run.
    pub fn new(
        identity: RunIdentity,
        test_configs: usize,
        resolution: &Resolution,
        report: Option<&EmitReport>,
    ) -> Self {
        let (jobs_written, failures) = match report {
            Some(report) => (report.written.len(), report.failed.clone()),
            None => (0, Vec::new()),
        };
        let exit_code = if failures.is_empty() {
            ExitCode::Success
        } else {
            ExitCode::JobsFailed
        };
        Self {
            schema_id: RUN_SUMMARY_SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            lab: identity.lab,
            tree: identity.tree,
            branch: identity.branch,
            describe: identity.describe,
            arch: identity.arch,
            builds: resolution.builds,
            passing_builds: resolution.passing_builds,
            test_configs,
            skipped: resolution.skipped,
            jobs_resolved: resolution.jobs.len(),
            jobs_written,
            jobs_failed: failures.len(),
            failures,
            callback_file_empty: false,
            dry_run: report.is_none(),
            exit_code: exit_code.as_i32(),
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.jobs_failed == 0 {
            ExitCode::Success
        } else {
            ExitCode::JobsFailed
        }
    }

    /// One-line human summary
    pub fn human_summary(&self) -> String {
        let mut s = format!(
            "{} builds ({} passing), {} test configs, {} jobs",
            self.builds, self.passing_builds, self.test_configs, self.jobs_resolved
        );
        if self.dry_run {
            s.push_str(" (dry run)");
        } else if self.jobs_failed > 0 {
            s.push_str(&format!(", {} failed", self.jobs_failed));
        }
        s
    }

    pub fn log(&self) {
        info!(
            builds = self.builds,
            passing = self.passing_builds,
            test_configs = self.test_configs,
            jobs = self.jobs_resolved,
            written = self.jobs_written,
            failed = self.jobs_failed,
            "{}",
            self.human_summary()
        );
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
