//! Configuration schema

use crate::rules::{PreserveRule, Rule};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Embedded transformation rules
    #[serde(default, rename = "rule")]
    pub rules: Vec<Rule>,

    /// Embedded preservation entries
    #[serde(default)]
    pub preserve: Vec<PreserveRule>,
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Environment variable naming an extra rule file
    #[serde(default = "default_rules_env_var")]
    pub rules_env_var: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            rules_env_var: default_rules_env_var(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rules_env_var() -> String {
    crate::rules::RULES_ENV_VAR.to_string()
}
