use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variables scanned for the Gemini key pool, in rotation order.
pub const API_KEY_VARS: [&str; 5] = [
    "GOOGLE_GENERATIVE_AI_API_KEY",
    "GOOGLE_GENERATIVE_AI_API_KEY_2",
    "GOOGLE_GENERATIVE_AI_API_KEY_3",
    "GOOGLE_GENERATIVE_AI_API_KEY_4",
    "GOOGLE_GENERATIVE_AI_API_KEY_5",
];

/// Main application configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    /// HTTP server binding
    #[serde(default)]
    pub server: ServerConfig,
    /// LLM provider settings
    #[serde(default)]
    pub llm: LlmConfig,
    /// Upstream menu portal settings
    #[serde(default)]
    pub portal: PortalConfig,
    /// Menu summary sizing
    #[serde(default)]
    pub summary: SummaryConfig,
    /// Local persistent store
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Configuration for the LLM provider
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Provider name ("google" or "openai")
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier (e.g., "gemini-2.0-flash")
    #[serde(default = "default_model")]
    pub model: String,
    /// Temperature for generation (0.0-1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum tokens to generate when a call site does not say otherwise
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Base URL for API endpoint (for custom or proxy endpoints)
    pub base_url: Option<String>,
    /// Key pool used in round-robin order
    #[serde(default)]
    pub api_keys: Vec<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            base_url: None,
            api_keys: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PortalConfig {
    /// Replaces every hall's menu page URL (mirrors, tests)
    pub base_url: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: default_timeout(),
        }
    }
}

/// Limits applied to the menu summary before it goes into a prompt
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct SummaryConfig {
    /// Summaries longer than this are truncated
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// Item lines kept per category when truncating
    #[serde(default = "default_items_per_category")]
    pub items_per_category: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            items_per_category: default_items_per_category(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_provider() -> String {
    "google".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_timeout() -> u64 {
    30
}

fn default_max_chars() -> usize {
    8000
}

fn default_items_per_category() -> usize {
    5
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(".dining-assistant")
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables with DINING__ prefix
    /// 2. config.toml file in current directory
    /// 3. Default values
    ///
    /// Environment variable format: DINING__SERVER__PORT
    pub fn load() -> Result<Self, ConfigError> {
        load_config()
    }
}

/// Load configuration from file and environment variables, then append the
/// Gemini keys found in `GOOGLE_GENERATIVE_AI_API_KEY*` to the key pool.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let settings = Config::builder()
        // Optional config file (can be missing)
        .add_source(File::with_name("config").required(false))
        // Use double underscore for nested: DINING__LLM__MODEL
        .add_source(
            Environment::with_prefix("DINING")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let mut config: AppConfig = settings.try_deserialize()?;
    config
        .llm
        .api_keys
        .extend(collect_api_keys(|name| std::env::var(name).ok()));
    Ok(config)
}

/// Collect the non-empty keys from [`API_KEY_VARS`] using `lookup`.
pub fn collect_api_keys(lookup: impl Fn(&str) -> Option<String>) -> Vec<String> {
    API_KEY_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_values() {
        assert_eq!(default_provider(), "google");
        assert_eq!(default_model(), "gemini-2.0-flash");
        assert_eq!(default_temperature(), 0.7);
        assert_eq!(default_max_chars(), 8000);
        assert_eq!(default_items_per_category(), 5);
        assert_eq!(default_port(), 3000);
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.llm.provider, "google");
        assert!(config.llm.api_keys.is_empty());
        assert!(config.portal.base_url.is_none());
        assert_eq!(config.portal.timeout, 30);
        assert_eq!(config.summary.items_per_category, 5);
        assert_eq!(config.storage.dir, PathBuf::from(".dining-assistant"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings = Config::builder()
            .add_source(File::from_str(
                "[llm]\nmodel = \"gemini-1.5-pro\"\n[summary]\nitems_per_category = 3\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let config: AppConfig = settings.try_deserialize().unwrap();

        assert_eq!(config.llm.model, "gemini-1.5-pro");
        assert_eq!(config.llm.provider, "google");
        assert_eq!(config.summary.items_per_category, 3);
        assert_eq!(config.summary.max_chars, 8000);
    }

    #[test]
    fn test_collect_api_keys_skips_missing_and_empty() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("GOOGLE_GENERATIVE_AI_API_KEY", "key-one"),
            ("GOOGLE_GENERATIVE_AI_API_KEY_2", ""),
            ("GOOGLE_GENERATIVE_AI_API_KEY_4", "key-four"),
        ]);

        let keys = collect_api_keys(|name| env.get(name).map(|v| v.to_string()));
        assert_eq!(keys, vec!["key-one".to_string(), "key-four".to_string()]);
    }

    #[test]
    fn test_load_config_without_file() {
        if std::env::vars().any(|(name, _)| name.starts_with("DINING__")) {
            return;
        }
        let config = load_config().unwrap();
        assert_eq!(config.server.port, default_port());
        assert_eq!(config.llm.model, "gemini-2.0-flash");
        assert_eq!(config.summary.items_per_category, 5);
    }

    #[test]
    fn test_environment_overrides_defaults() {
        let env = HashMap::from([
            ("DINING__SERVER__PORT".to_string(), "8080".to_string()),
            ("DINING__LLM__PROVIDER".to_string(), "openai".to_string()),
        ]);
        let settings = Config::builder()
            .add_source(
                Environment::with_prefix("DINING")
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(env)),
            )
            .build()
            .unwrap();
        let config: AppConfig = settings.try_deserialize().unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.summary.max_chars, 8000);
    }
}
