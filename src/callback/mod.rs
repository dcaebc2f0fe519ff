//! Job completion callbacks
//!
//! A job carries the command-line callback (if a token was given)
//! followed by the validated entries of an optional callback file.

mod validate;

pub use validate::{
    validate_callbacks, validate_entry, CallbackValidation, EntryOutcome, Rejection, Repair,
    RECOGNIZED_FIELDS,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Plan whose kernelci callback is named `lava/boot`
pub const BOOT_PLAN: &str = "boot";

/// Callback receiver kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackType {
    Kernelci,
    Custom,
}

impl CallbackType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "kernelci" => Some(Self::Kernelci),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kernelci => "kernelci",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for CallbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP method used to deliver the callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CallbackMethod {
    Get,
    Post,
}

impl CallbackMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            _ => None,
        }
    }
}

/// Portion of the results sent with the callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dataset {
    Minimal,
    Logs,
    Results,
    All,
}

impl Dataset {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "minimal" => Some(Self::Minimal),
            "logs" => Some(Self::Logs),
            "results" => Some(Self::Results),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

/// Payload encoding, any value ending in `json` or `urlencoded`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentType(String);

impl ContentType {
    pub fn parse(s: &str) -> Option<Self> {
        if s.ends_with("json") || s.ends_with("urlencoded") {
            Some(Self(s.to_string()))
        } else {
            None
        }
    }

    pub fn json() -> Self {
        Self("json".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One callback as handed to the job template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackSpec {
    #[serde(rename = "type")]
    pub kind: CallbackType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    pub url: String,

    pub dataset: Dataset,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<CallbackMethod>,

    #[serde(
        rename = "content-type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub content_type: Option<ContentType>,

    /// Set on command-line kernelci callbacks only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Callback given through command-line flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliCallback {
    pub token: String,
    /// Callback URL, falling back to the API URL
    pub url: Option<String>,
    pub kind: CallbackType,
    pub dataset: Dataset,
}

impl CliCallback {
    /// Callback for one plan, None without a URL.
    pub fn to_spec(&self, plan: &str) -> Option<CallbackSpec> {
        let url = self.url.clone().filter(|u| !u.is_empty())?;
        let name = match self.kind {
            CallbackType::Kernelci if plan == BOOT_PLAN => Some("lava/boot".to_string()),
            CallbackType::Kernelci => Some("lava/test".to_string()),
            CallbackType::Custom => None,
        };
        Some(CallbackSpec {
            kind: self.kind,
            token: Some(self.token.clone()),
            url,
            dataset: self.dataset,
            method: None,
            content_type: None,
            name,
        })
    }
}

/// Errors reading a callback file
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("failed to read callback file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid callback file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid callback file {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize)]
struct CallbackFile {
    #[serde(default)]
    callback: Vec<serde_json::Value>,
}

/// Read raw callback entries from a file.
///
/// `.json` files hold a flat array; anything else is TOML with
/// `[[callback]]` tables.
pub fn read_callback_file(path: &Path) -> Result<Vec<serde_json::Value>, CallbackError> {
    let contents = fs::read_to_string(path).map_err(|source| CallbackError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        serde_json::from_str(&contents).map_err(|source| CallbackError::Json {
            path: path.to_path_buf(),
            source,
        })
    } else {
        let file: CallbackFile = toml::from_str(&contents).map_err(|source| CallbackError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(file.callback)
    }
}

/// Load and validate a callback file.
///
/// Returns `Ok(None)` when the file does not exist.
pub fn load_callbacks(path: &Path) -> Result<Option<CallbackValidation>, CallbackError> {
    if !path.exists() {
        warn!(path = %path.display(), "callback file not found, ignoring it");
        return Ok(None);
    }
    let entries = read_callback_file(path)?;
    let validation = validate_callbacks(&entries);
    validation.log(path);
    Ok(Some(validation))
}

/// Produces the callback list for each plan.
#[derive(Debug, Clone, Default)]
pub struct CallbackAssembler {
    cli: Option<CliCallback>,
    external: Option<CallbackValidation>,
}

impl CallbackAssembler {
    pub fn new(cli: Option<CliCallback>, external: Option<CallbackValidation>) -> Self {
        if let Some(ref cli) = cli {
            if cli.url.as_deref().map(str::is_empty).unwrap_or(true) {
                warn!("command-line callback has no URL, dropping it");
            }
        }
        Self { cli, external }
    }

    /// Whether a callback file was supplied but yielded nothing usable
    pub fn external_empty(&self) -> bool {
        self.external
            .as_ref()
            .map(|v| !v.has_valid())
            .unwrap_or(false)
    }

    /// Command-line callback first, then the validated file entries.
    pub fn assemble(&self, plan: &str) -> Vec<CallbackSpec> {
        let mut callbacks = Vec::new();
        if let Some(spec) = self.cli.as_ref().and_then(|cli| cli.to_spec(plan)) {
            callbacks.push(spec);
        }
        if let Some(ref external) = self.external {
            callbacks.extend(external.callbacks.iter().cloned());
        }
        callbacks
    }
}

impl CallbackValidation {
    /// Log every repair and rejection against its entry index.
    pub fn log(&self, source: &Path) {
        for (index, repair) in &self.repairs {
            warn!(file = %source.display(), index, "callback repaired: {}", repair);
        }
        for (index, rejection) in &self.rejected {
            warn!(file = %source.display(), index, "callback dropped: {}", rejection);
        }
        if self.has_valid() {
            info!(
                file = %source.display(),
                count = self.callbacks.len(),
                "loaded callbacks"
            );
        } else {
            warn!(file = %source.display(), "no valid callbacks found");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn cli(kind: CallbackType, url: Option<&str>) -> CliCallback {
        CliCallback {
            token: "tok".to_string(),
            url: url.map(str::to_string),
            kind,
            dataset: Dataset::All,
        }
    }

    #[test]
    fn test_cli_kernelci_names() {
        let cb = cli(CallbackType::Kernelci, Some("https://api.kernelci.org"));

        assert_eq!(cb.to_spec("boot").unwrap().name.as_deref(), Some("lava/boot"));
        assert_eq!(cb.to_spec("simple").unwrap().name.as_deref(), Some("lava/test"));
    }

    #[test]
    fn test_cli_custom_has_no_name() {
        let cb = cli(CallbackType::Custom, Some("https://example.org/cb"));
        let spec = cb.to_spec("boot").unwrap();

        assert_eq!(spec.name, None);
        assert_eq!(spec.token.as_deref(), Some("tok"));
        assert_eq!(spec.dataset, Dataset::All);
    }

    #[test]
    fn test_cli_without_url_dropped() {
        assert!(cli(CallbackType::Kernelci, None).to_spec("boot").is_none());
        assert!(cli(CallbackType::Kernelci, Some("")).to_spec("boot").is_none());
    }

    #[test]
    fn test_spec_serialization() {
        let spec = cli(CallbackType::Kernelci, Some("https://api.kernelci.org"))
            .to_spec("boot")
            .unwrap();
        let value = serde_json::to_value(&spec).unwrap();

        assert_eq!(
            value,
            json!({
                "type": "kernelci",
                "token": "tok",
                "url": "https://api.kernelci.org",
                "dataset": "all",
                "name": "lava/boot"
            })
        );
    }

    #[test]
    fn test_assemble_order() {
        let external = validate_callbacks(&[json!({"url": "http://x"})]);
        let assembler = CallbackAssembler::new(
            Some(cli(CallbackType::Kernelci, Some("https://api.kernelci.org"))),
            Some(external),
        );

        let callbacks = assembler.assemble("simple");
        assert_eq!(callbacks.len(), 2);
        assert_eq!(callbacks[0].kind, CallbackType::Kernelci);
        assert_eq!(callbacks[1].url, "http://x");
        assert!(!assembler.external_empty());
    }

    #[test]
    fn test_assemble_nothing() {
        let assembler = CallbackAssembler::default();
        assert!(assembler.assemble("boot").is_empty());
        assert!(!assembler.external_empty());
    }

    #[test]
    fn test_external_empty_after_validation() {
        let external = validate_callbacks(&[json!({"type": "kernelci"})]);
        let assembler = CallbackAssembler::new(None, Some(external));

        assert!(assembler.external_empty());
        assert!(assembler.assemble("boot").is_empty());
    }

    #[test]
    fn test_load_json_file() {
        let mut temp = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            temp,
            r#"[{{"url": "http://x", "method": "put"}}, {{"type": "custom"}}]"#
        )
        .unwrap();

        let validation = load_callbacks(temp.path()).unwrap().unwrap();
        assert_eq!(validation.callbacks.len(), 1);
        assert_eq!(validation.callbacks[0].method, Some(CallbackMethod::Post));
        assert_eq!(validation.rejected.len(), 1);
    }

    #[test]
    fn test_load_toml_file() {
        let mut temp = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            temp,
            r#"
            [[callback]]
            url = "https://results.example.org/lava"
            type = "custom"
            dataset = "results"
            method = "get"
            content-type = "application/x-www-form-urlencoded"
            "#
        )
        .unwrap();

        let validation = load_callbacks(temp.path()).unwrap().unwrap();
        let cb = &validation.callbacks[0];
        assert_eq!(cb.dataset, Dataset::Results);
        assert_eq!(cb.method, Some(CallbackMethod::Get));
        assert_eq!(
            cb.content_type.as_ref().map(ContentType::as_str),
            Some("application/x-www-form-urlencoded")
        );
        assert!(validation.repairs.is_empty());
    }

    #[test]
    fn test_missing_file_ignored() {
        let result = load_callbacks(Path::new("/nonexistent/callbacks.json")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_unparseable_file_is_error() {
        let mut temp = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(temp, "{{not json").unwrap();

        let err = load_callbacks(temp.path()).unwrap_err();
        assert!(matches!(err, CallbackError::Json { .. }));
    }
}
