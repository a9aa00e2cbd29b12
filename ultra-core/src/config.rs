//! Toolkit configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings shared by everything built against one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UltraConfig {
    /// Whether links use view transitions unless told otherwise.
    pub view_transitions: bool,

    /// Toggle channel used by activities that do not name one.
    pub activity_default: String,

    /// Prefix of generated scoped class names.
    pub style_prefix: String,

    /// Element substituted for markup that fails to parse.
    pub placeholder_tag: String,
}

impl Default for UltraConfig {
    fn default() -> Self {
        Self {
            view_transitions: false,
            activity_default: "display".to_string(),
            style_prefix: "u".to_string(),
            placeholder_tag: "div".to_string(),
        }
    }
}

impl UltraConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}
