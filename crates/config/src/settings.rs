// Application settings
// Loaded from ~/.config/gridask/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// AI provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AIProvider {
    /// AI features disabled
    None,
    /// OpenAI API (default; tier 2 still needs a key)
    #[default]
    #[serde(rename = "openai")]
    OpenAI,
    /// OpenAI-compatible local server (Ollama, llama.cpp)
    Local,
}

impl AIProvider {
    /// Returns true if AI features are enabled
    pub fn is_enabled(&self) -> bool {
        !matches!(self, AIProvider::None)
    }

    /// Returns the default model for this provider
    pub fn default_model(&self) -> &'static str {
        match self {
            AIProvider::None => "",
            AIProvider::OpenAI => "gpt-4",
            AIProvider::Local => "llama3:8b",
        }
    }

    /// Default base URL of the chat-completions API
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            AIProvider::None => "",
            AIProvider::OpenAI => "https://api.openai.com/v1",
            AIProvider::Local => "http://localhost:11434/v1",
        }
    }

    pub fn needs_api_key(&self) -> bool {
        matches!(self, AIProvider::OpenAI)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AIProvider::None => "none",
            AIProvider::OpenAI => "openai",
            AIProvider::Local => "local",
        }
    }
}

/// AI-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AISettings {
    /// Selected AI provider
    pub provider: AIProvider,

    /// Model identifier (empty = provider default)
    pub model: String,

    /// Base URL override for the chat-completions API
    pub endpoint: Option<String>,

    /// Output token budget for code synthesis
    pub max_tokens: u32,

    /// Sampling temperature (low = deterministic code)
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Privacy mode: send schema only, no sample rows
    pub privacy_mode: bool,

    /// Minimum spacing between outbound calls, in milliseconds (0 = none)
    pub min_interval_ms: u64,
}

impl Default for AISettings {
    fn default() -> Self {
        Self {
            provider: AIProvider::default(),
            model: String::new(),
            endpoint: None,
            max_tokens: 2000,
            temperature: 0.1,
            timeout_secs: 60,
            privacy_mode: false,
            min_interval_ms: 0,
        }
    }
}

impl AISettings {
    /// Get the effective model (user-specified or provider default)
    pub fn effective_model(&self) -> &str {
        if self.model.is_empty() {
            self.provider.default_model()
        } else {
            &self.model
        }
    }

    /// Get the effective API base URL
    pub fn effective_endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.provider.default_endpoint())
    }
}

/// Data ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// Largest accepted upload, in bytes
    pub max_file_size: u64,

    /// Rows shown when rendering a table
    pub max_rows_display: usize,

    /// Encodings tried, in order, for delimited text files
    pub encodings: Vec<String>,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            max_file_size: 200 * 1024 * 1024,
            max_rows_display: 1000,
            encodings: ["utf-8", "latin-1", "iso-8859-1", "windows-1252"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Sandbox limits for generated code
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSettings {
    /// Wall-clock limit per execution, in milliseconds
    pub timeout_ms: u64,

    /// Memory cap for the script VM, in MiB
    pub memory_limit_mb: usize,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            memory_limit_mb: 64,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(rename = "ai")]
    pub ai: AISettings,

    #[serde(rename = "data")]
    pub data: DataSettings,

    #[serde(rename = "sandbox")]
    pub sandbox: SandboxSettings,
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gridask");
        config_dir.join("settings.json")
    }

    /// Load settings from the default location, falling back to defaults.
    /// Writes a commented default file on first run.
    pub fn load() -> Self {
        let path = Self::config_path();

        if !path.exists() {
            let settings = Self::default();
            settings.create_default_file(&path);
            return settings;
        }

        Self::load_from(&path)
    }

    /// Load settings from an explicit path, falling back to defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("Error parsing {}: {}", path.display(), e);
                    log::warn!("Using default settings");
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Error reading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse settings JSON. Lines starting with `//` are comments.
    pub fn parse(contents: &str) -> Result<Self, String> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");

        serde_json::from_str(&cleaned).map_err(|e| e.to_string())
    }

    /// Save current settings to disk
    pub fn save(&self) -> Result<(), String> {
        let path = Self::config_path();

        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;

        fs::write(&path, json).map_err(|e| e.to_string())
    }

    /// Create default settings file with comments
    fn create_default_file(&self, path: &Path) {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                log::warn!("Error creating config directory: {}", e);
                return;
            }
        }

        let default_config = r#"{
    // AI code synthesis (tier 2)
    // Provider options: "none", "openai", "local"
    // API keys are read from the system keychain or GRIDASK_OPENAI_KEY / OPENAI_API_KEY,
    // never from this file
    "ai": {
        "provider": "openai",
        "model": "",
        "max_tokens": 2000,
        "temperature": 0.1,
        "timeout_secs": 60,
        "privacy_mode": false,
        "min_interval_ms": 0
    },

    // Data loading
    "data": {
        "max_file_size": 209715200,
        "max_rows_display": 1000,
        "encodings": ["utf-8", "latin-1", "iso-8859-1", "windows-1252"]
    },

    // Limits for generated code
    "sandbox": {
        "timeout_ms": 5000,
        "memory_limit_mb": 64
    }
}
"#;

        if let Err(e) = fs::write(path, default_config) {
            log::warn!("Error writing default settings.json: {}", e);
        }
    }

    /// Get the config file path for display/opening
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }
}
