use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Values that mean "no key was ever filled in".
pub const PLACEHOLDER_API_KEYS: &[&str] = &["", "YOUR_API_KEY", "YOUR_API_KEY_HERE", "changeme"];

/// User configuration from WasteSort Config.yaml
///
/// Contains oracle and logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(rename = "WasteSort_Settings", default)]
    pub settings: WasteSortSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WasteSortSettings {
    #[serde(rename = "Model", default = "default_model")]
    pub model: String,

    #[serde(rename = "API Endpoint", default = "default_endpoint")]
    pub endpoint: String,

    /// Name of the environment variable holding the API key.
    #[serde(rename = "API Key Env", default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(rename = "Request Timeout", default = "default_request_timeout")]
    pub request_timeout: u32,

    #[serde(rename = "Max Output Tokens", default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(rename = "Temperature", default = "default_temperature")]
    pub temperature: f32,

    /// Decoder allocation cap in megabytes; larger images fail as "too large".
    #[serde(rename = "Max Image MB", default = "default_max_image_mb")]
    pub max_image_mb: u64,

    #[serde(rename = "Default Location", default = "default_location")]
    pub default_location: String,

    #[serde(rename = "Log Directory", default = "default_log_dir")]
    pub log_dir: String,

    #[serde(rename = "Debug Mode", default)]
    pub debug_mode: bool,
}

impl Default for WasteSortSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            request_timeout: default_request_timeout(),
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
            max_image_mb: default_max_image_mb(),
            default_location: default_location(),
            log_dir: default_log_dir(),
            debug_mode: false,
        }
    }
}

fn default_model() -> String {
    "gemini-1.5-flash-latest".to_string()
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_request_timeout() -> u32 {
    30
}

fn default_max_output_tokens() -> u32 {
    256
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_image_mb() -> u64 {
    512
}

fn default_location() -> String {
    "fairfax".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

/// Per-location disposal rules from WasteSort Rules.yaml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RulesConfig {
    #[serde(rename = "Locations", default)]
    pub locations: IndexMap<String, RuleSet>,
}

/// Rules for one location.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RuleSet {
    /// Human-readable origin of the rules, e.g. "Fairfax County, VA".
    #[serde(rename = "Source")]
    pub source: String,

    #[serde(rename = "Rules", default)]
    pub rules: IndexMap<String, DisposalRule>,

    /// Shorthand term -> key in `rules`.
    #[serde(rename = "Aliases", default)]
    pub aliases: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisposalRule {
    #[serde(rename = "Category")]
    pub category: String,

    #[serde(rename = "Notes", default)]
    pub notes: String,
}

impl DisposalRule {
    pub fn new(category: &str, notes: &str) -> Self {
        Self {
            category: category.to_string(),
            notes: notes.to_string(),
        }
    }
}

impl RulesConfig {
    /// Get the rule set for a location (case-insensitive key match)
    pub fn get_location(&self, location: &str) -> Option<&RuleSet> {
        self.locations
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(location.trim()))
            .map(|(_, set)| set)
    }

    pub fn location_names(&self) -> Vec<&str> {
        self.locations.keys().map(String::as_str).collect()
    }
}
