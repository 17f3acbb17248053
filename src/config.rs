//! Configuration management
//!
//! All provider and gateway settings are loaded once from the environment
//! and passed explicitly into constructors; the core holds no ambient
//! globals.

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_BASE_URL: &str = "https://api.deepseek.com/v1/chat/completions";
const DEFAULT_MODEL_NAME: &str = "deepseek-reasoner";
const DEFAULT_PERSONA: &str =
    "You are Anna Yanami, a lazy but observant virtual persona living an ordinary day.";

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Chat provider API key (optional - cycles fail without one)
    pub api_key: Option<String>,

    /// OpenAI-compatible chat completions endpoint
    pub api_base_url: String,

    /// Model name sent to the provider
    pub model_name: String,

    /// Max tokens requested per completion
    pub max_tokens: usize,

    /// Persona description injected into every prompt
    pub persona: String,

    /// Directory holding the behaviour log
    pub data_dir: PathBuf,

    /// Timeout applied to every information-source lookup
    pub lookup_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("API_KEY").ok();

        let api_base_url = std::env::var("API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());

        let model_name =
            std::env::var("MODEL_NAME").unwrap_or_else(|_| DEFAULT_MODEL_NAME.to_string());

        let max_tokens = std::env::var("SOULTRACE_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1024);

        let persona =
            std::env::var("SOULTRACE_PERSONA").unwrap_or_else(|_| DEFAULT_PERSONA.to_string());

        let data_dir = std::env::var("SOULTRACE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));

        let lookup_timeout_secs = std::env::var("SOULTRACE_LOOKUP_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        Ok(Self {
            api_key,
            api_base_url,
            model_name,
            max_tokens,
            persona,
            data_dir,
            lookup_timeout: Duration::from_secs(lookup_timeout_secs),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            max_tokens: 1024,
            persona: DEFAULT_PERSONA.to_string(),
            data_dir: PathBuf::from("data"),
            lookup_timeout: Duration::from_secs(10),
        }
    }
}
