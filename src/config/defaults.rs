//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// LAVA job priority (default: "high")
    pub priority: String,

    /// Catalog file (default: "test-configs.toml")
    pub test_configs: String,

    /// Template directory (default: "templates")
    pub templates: String,

    /// Settings file section (default: "default")
    pub section: String,

    /// Command-line callback type (default: "kernelci")
    pub callback_type: String,

    /// Command-line callback dataset (default: "all")
    pub callback_dataset: String,

    /// Expected number of builds from the API (default: 0)
    pub defconfigs: u64,

    /// Build API attempts (default: 10)
    pub retry_attempts: u32,

    /// Delay between build API attempts (default: 30)
    pub retry_delay_seconds: u64,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            priority: "high".to_string(),
            test_configs: "test-configs.toml".to_string(),
            templates: "templates".to_string(),
            section: "default".to_string(),
            callback_type: "kernelci".to_string(),
            callback_dataset: "all".to_string(),
            defconfigs: 0,
            retry_attempts: 10,
            retry_delay_seconds: 30,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "priority": self.priority,
            "test_configs": self.test_configs,
            "templates": self.templates,
            "callback_type": self.callback_type,
            "callback_dataset": self.callback_dataset,
            "defconfigs": self.defconfigs,
            "retry": {
                "attempts": self.retry_attempts,
                "delay_seconds": self.retry_delay_seconds
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let defaults = BuiltinDefaults::default();
        assert_eq!(defaults.priority, "high");
        assert_eq!(defaults.test_configs, "test-configs.toml");
        assert_eq!(defaults.section, "default");
        assert_eq!(defaults.callback_type, "kernelci");
        assert_eq!(defaults.retry_attempts, 10);
        assert_eq!(defaults.retry_delay_seconds, 30);
    }

    #[test]
    fn test_to_value() {
        let value = BuiltinDefaults::default().to_value();

        assert_eq!(value["priority"], "high");
        assert_eq!(value["defconfigs"], 0);
        assert_eq!(value["retry"]["attempts"], 10);
        assert!(value.get("section").is_none());
    }
}
