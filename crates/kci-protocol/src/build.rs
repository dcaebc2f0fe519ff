//! Build records.

use serde::{Deserialize, Serialize};

use crate::FRAGMENT_SEPARATOR;

/// Errors raised while decoding build documents.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid build document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcome of a kernel build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BuildStatus {
    Pass,
    Fail,
    /// Any status the API reports that is neither PASS nor FAIL
    #[serde(other)]
    Unknown,
}

/// One compilation of a kernel tree at a commit for one arch/defconfig.
///
/// Field names follow the build API. The shorter `tree`/`branch`/`describe`
/// spellings are accepted for hand-written datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRecord {
    /// Kernel tree name
    #[serde(alias = "tree")]
    pub job: String,

    /// Git branch
    #[serde(alias = "branch")]
    pub git_branch: String,

    /// Output of `git describe` for the built commit
    #[serde(alias = "describe")]
    pub kernel: String,

    #[serde(default)]
    pub git_commit: Option<String>,

    #[serde(default)]
    pub git_url: Option<String>,

    #[serde(default)]
    pub arch: Option<String>,

    /// Base defconfig name
    #[serde(default)]
    pub defconfig: Option<String>,

    /// Defconfig with any `+`-joined config fragments
    #[serde(default)]
    pub defconfig_full: Option<String>,

    pub status: BuildStatus,

    /// Kernel image file name (absent for failed builds)
    #[serde(default)]
    pub kernel_image: Option<String>,

    /// Kernel modules archive file name
    #[serde(default)]
    pub modules: Option<String>,

    /// Compiler/toolchain tag
    #[serde(default)]
    pub build_environment: Option<String>,

    /// Storage-relative path of the build artifacts, when already resolved
    #[serde(default)]
    pub file_server_resource: Option<String>,

    /// Device tree blobs produced by the build, relative to `dtbs/`
    #[serde(default)]
    pub dtb_dir_data: Option<Vec<String>>,
}

impl BuildRecord {
    /// Whether this build participates in job generation.
    pub fn is_pass(&self) -> bool {
        self.status == BuildStatus::Pass
    }

    /// The full defconfig, falling back to the base defconfig.
    pub fn defconfig_full(&self) -> Option<&str> {
        self.defconfig_full
            .as_deref()
            .or(self.defconfig.as_deref())
            .filter(|d| !d.is_empty())
    }

    /// Device tree blobs produced by the build.
    pub fn dtbs(&self) -> &[String] {
        self.dtb_dir_data.as_deref().unwrap_or(&[])
    }

    /// Whether the build produced the given device tree blob.
    pub fn has_dtb(&self, dtb: &str) -> bool {
        self.dtbs().iter().any(|d| d == dtb)
    }

    /// Modules archive name, treating an empty string as absent.
    pub fn modules(&self) -> Option<&str> {
        self.modules.as_deref().filter(|m| !m.is_empty())
    }

    /// Storage path, treating an empty string as absent.
    pub fn file_server_resource(&self) -> Option<&str> {
        self.file_server_resource.as_deref().filter(|r| !r.is_empty())
    }

    /// Short label used in log lines.
    pub fn label(&self) -> String {
        match self.file_server_resource() {
            Some(resource) => resource.to_string(),
            None => format!(
                "{}/{}/{}/{}",
                self.job,
                self.git_branch,
                self.kernel,
                self.defconfig_full().unwrap_or("?")
            ),
        }
    }

    /// Parse a local dataset: a flat JSON array of build objects.
    pub fn parse_list(json: &str) -> Result<Vec<BuildRecord>, ParseError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Body of a `GET /build` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildResponse {
    #[serde(default)]
    pub result: Vec<BuildRecord>,
}

impl BuildResponse {
    pub fn parse(json: &str) -> Result<Self, ParseError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Strip config fragments from a defconfig name.
///
/// `multi_v7_defconfig+CONFIG_ARM_LPAE=y` becomes `multi_v7_defconfig`.
/// Applying it to its own output returns the same value.
pub fn defconfig_base(defconfig: &str) -> &str {
    defconfig
        .split(FRAGMENT_SEPARATOR)
        .next()
        .unwrap_or(defconfig)
}
