use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Lyra
///
/// Constructed once at startup and passed by reference into the context
/// assembler, the stream relay and the conversation store. Secrets are
/// never stored here; each section names the environment variable that
/// holds its credential.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream completion API configuration
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Web search collaborator configuration
    #[serde(default)]
    pub search: SearchConfig,
    /// Conversation memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:3000")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

/// Upstream completion API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_upstream_api_url")]
    pub api_url: String,
    /// Environment variable name for the API key
    #[serde(default = "default_upstream_api_key_env")]
    pub api_key_env: String,
    /// Model identifier
    #[serde(default = "default_upstream_model")]
    pub model: String,
    /// Sampling temperature
    #[serde(default = "default_upstream_temperature")]
    pub temperature: f32,
    /// Maximum output size in tokens
    #[serde(default = "default_upstream_max_tokens")]
    pub max_tokens: u32,
    /// Connection timeout in seconds; an open stream is never bounded
    #[serde(default = "default_upstream_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_url: default_upstream_api_url(),
            api_key_env: default_upstream_api_key_env(),
            model: default_upstream_model(),
            temperature: default_upstream_temperature(),
            max_tokens: default_upstream_max_tokens(),
            timeout_secs: default_upstream_timeout_secs(),
        }
    }
}

fn default_upstream_api_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_upstream_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_upstream_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_upstream_temperature() -> f32 {
    0.3
}

fn default_upstream_max_tokens() -> u32 {
    2048
}

fn default_upstream_timeout_secs() -> u64 {
    30
}

/// Web search collaborator configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Search API endpoint URL
    #[serde(default = "default_search_api_url")]
    pub api_url: String,
    /// Environment variable name for the search API key
    #[serde(default = "default_search_api_key_env")]
    pub api_key_env: String,
    /// Default number of results when the request does not specify one
    #[serde(default = "default_search_max_docs")]
    pub default_max_docs: usize,
    /// Request timeout in seconds
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_url: default_search_api_url(),
            api_key_env: default_search_api_key_env(),
            default_max_docs: default_search_max_docs(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

fn default_search_api_url() -> String {
    "https://google.serper.dev/search".to_string()
}

fn default_search_api_key_env() -> String {
    "SERPER_API_KEY".to_string()
}

fn default_search_max_docs() -> usize {
    3
}

fn default_search_timeout_secs() -> u64 {
    10
}

/// Conversation memory configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// Base directory for persisted data
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Maximum number of instructions retained on disk
    #[serde(default = "default_persisted_cap")]
    pub persisted_cap: usize,
    /// Number of trailing instructions sent upstream per request
    #[serde(default = "default_window")]
    pub window: usize,
}

impl MemoryConfig {
    /// Path of the conversation file inside the data directory
    pub fn memory_file(&self) -> PathBuf {
        self.data_dir.join("memoria.json")
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            persisted_cap: default_persisted_cap(),
            window: default_window(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".lyra"))
        .unwrap_or_else(|| PathBuf::from(".lyra"))
}

fn default_persisted_cap() -> usize {
    100
}

fn default_window() -> usize {
    8
}

impl Config {
    /// Apply environment overrides on top of the loaded file
    ///
    /// `GROQ_MODEL` replaces the configured model identifier when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(model) = std::env::var("GROQ_MODEL") {
            if !model.trim().is_empty() {
                self.upstream.model = model;
            }
        }
    }
}
