// AI configuration and secrets management
//
// API keys are looked up in:
// 1. System keychain (preferred)
// 2. Environment variables (GRIDASK_<PROVIDER>_KEY, then OPENAI_API_KEY)
//
// Keys are NEVER stored in settings.json

use std::env;

use crate::settings::{AIProvider, AISettings, Settings};

/// Service name for keychain storage
const KEYCHAIN_SERVICE: &str = "gridask";

/// Conventional variable honored for the OpenAI provider
const OPENAI_FALLBACK_VAR: &str = "OPENAI_API_KEY";

/// Source of an API key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// Key retrieved from system keychain
    Keychain,
    /// Key retrieved from environment variable
    Environment,
    /// No key found
    None,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Keychain => "keychain",
            KeySource::Environment => "environment",
            KeySource::None => "none",
        }
    }
}

/// Result of key lookup
#[derive(Debug, Clone)]
pub struct KeyLookup {
    pub key: Option<String>,
    pub source: KeySource,
}

/// Get the environment variable name for a provider
fn env_var_name(provider: &str) -> String {
    format!("GRIDASK_{}_KEY", provider.to_uppercase())
}

/// Get the keychain account name for a provider
#[cfg_attr(not(feature = "keychain"), allow(dead_code))]
fn keychain_account(provider: &str) -> String {
    format!("ai/{}", provider.to_lowercase())
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Get an API key for the specified provider
///
/// Checks in order:
/// 1. System keychain
/// 2. GRIDASK_<PROVIDER>_KEY
/// 3. OPENAI_API_KEY (openai only)
pub fn get_api_key(provider: &str) -> KeyLookup {
    #[cfg(feature = "keychain")]
    {
        if let Ok(entry) = keyring::Entry::new(KEYCHAIN_SERVICE, &keychain_account(provider)) {
            if let Ok(key) = entry.get_password() {
                return KeyLookup {
                    key: Some(key),
                    source: KeySource::Keychain,
                };
            }
        }
    }

    let fallback = provider
        .eq_ignore_ascii_case("openai")
        .then_some(OPENAI_FALLBACK_VAR);

    let found = non_empty_var(&env_var_name(provider))
        .or_else(|| fallback.and_then(non_empty_var));

    match found {
        Some(key) => KeyLookup {
            key: Some(key),
            source: KeySource::Environment,
        },
        None => KeyLookup {
            key: None,
            source: KeySource::None,
        },
    }
}

/// Store an API key in the system keychain
#[cfg(feature = "keychain")]
pub fn set_api_key(provider: &str, key: &str) -> Result<(), String> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, &keychain_account(provider))
        .map_err(|e| format!("Failed to create keychain entry: {}", e))?;

    entry
        .set_password(key)
        .map_err(|e| format!("Failed to store key in keychain: {}", e))
}

#[cfg(not(feature = "keychain"))]
pub fn set_api_key(_provider: &str, _key: &str) -> Result<(), String> {
    Err("Keychain support not enabled. Set GRIDASK_<PROVIDER>_KEY environment variable instead.".to_string())
}

/// Check if keychain support is available
pub fn keychain_available() -> bool {
    #[cfg(feature = "keychain")]
    {
        keyring::Entry::new(KEYCHAIN_SERVICE, "test").is_ok()
    }
    #[cfg(not(feature = "keychain"))]
    {
        false
    }
}

// ============================================================================
// Resolved AI Configuration
// ============================================================================

/// The effective AI configuration, fully resolved from settings, keychain and
/// environment. Read-only input to query resolution.
#[derive(Debug, Clone)]
pub struct ResolvedAIConfig {
    pub provider: AIProvider,
    /// Model (resolved from settings or provider default)
    pub model: String,
    /// Base URL of the chat-completions API
    pub endpoint: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub privacy_mode: bool,
    pub min_interval_ms: u64,
    /// API key (if available and provider needs one)
    pub api_key: Option<String>,
    pub key_source: KeySource,
    pub status: AIConfigStatus,
    /// Human-readable reason if not ready
    pub blocking_reason: Option<String>,
}

/// Status of the AI configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AIConfigStatus {
    /// AI is disabled (provider = None)
    Disabled,
    /// Tier 2 can run
    Ready,
    /// Provider is configured but API key is missing
    MissingKey,
}

impl AIConfigStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Ready => "ready",
            Self::MissingKey => "missing_key",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl ResolvedAIConfig {
    /// Resolve the effective AI configuration from settings.
    pub fn from_settings(settings: &AISettings) -> Self {
        Self::resolve_with(settings, get_api_key)
    }

    /// Resolution with an injectable key lookup.
    fn resolve_with(settings: &AISettings, lookup: impl Fn(&str) -> KeyLookup) -> Self {
        let provider = settings.provider;
        let mut config = Self {
            provider,
            model: settings.effective_model().to_string(),
            endpoint: settings.effective_endpoint().trim_end_matches('/').to_string(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            timeout_secs: settings.timeout_secs,
            privacy_mode: settings.privacy_mode,
            min_interval_ms: settings.min_interval_ms,
            api_key: None,
            key_source: KeySource::None,
            status: AIConfigStatus::Ready,
            blocking_reason: None,
        };

        if !provider.is_enabled() {
            config.model.clear();
            config.endpoint.clear();
            config.status = AIConfigStatus::Disabled;
            config.blocking_reason = Some("AI provider is set to none".to_string());
            return config;
        }

        if provider.needs_api_key() {
            let found = lookup(provider.name());
            match found.key {
                Some(key) => {
                    config.api_key = Some(key);
                    config.key_source = found.source;
                }
                None => {
                    log::warn!("no API key found for provider {}", provider.name());
                    config.status = AIConfigStatus::MissingKey;
                    config.blocking_reason = Some(format!(
                        "No API key found. Set via keychain, {} or {}",
                        env_var_name(provider.name()),
                        OPENAI_FALLBACK_VAR
                    ));
                }
            }
        }

        config
    }

    /// Load settings and resolve in one call
    pub fn load() -> Self {
        let settings = Settings::load();
        Self::from_settings(&settings.ai)
    }

    /// Context policy description based on privacy mode
    pub fn context_policy(&self) -> &'static str {
        if self.privacy_mode {
            "schema only"
        } else {
            "schema + sample rows"
        }
    }

    /// Provider display name
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }
}

// ============================================================================
// Diagnostics (for CLI doctor)
// ============================================================================

/// Diagnostic information about AI configuration
#[derive(Debug)]
pub struct AIDiagnostics {
    pub provider: String,
    pub model: String,
    pub status: AIConfigStatus,
    pub blocking_reason: Option<String>,
    pub key_present: bool,
    pub key_source: KeySource,
    pub keychain_available: bool,
    pub endpoint: String,
    pub privacy_mode: bool,
    pub context_policy: &'static str,
    pub config_path: String,
}

impl AIDiagnostics {
    pub fn from_resolved(config: &ResolvedAIConfig) -> Self {
        Self {
            provider: config.provider.name().to_string(),
            model: config.model.clone(),
            status: config.status,
            blocking_reason: config.blocking_reason.clone(),
            key_present: config.api_key.is_some(),
            key_source: config.key_source,
            keychain_available: keychain_available(),
            endpoint: config.endpoint.clone(),
            privacy_mode: config.privacy_mode,
            context_policy: config.context_policy(),
            config_path: Settings::config_path_display(),
        }
    }

    pub fn from_settings(settings: &AISettings) -> Self {
        Self::from_resolved(&ResolvedAIConfig::from_settings(settings))
    }
}

impl std::fmt::Display for AIDiagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "AI Configuration")?;
        writeln!(f, "──────────────────────────────")?;
        writeln!(f, "Settings file:     {}", self.config_path)?;
        writeln!(f, "Provider:          {}", self.provider)?;
        writeln!(f, "Status:            {}", self.status.as_str())?;
        if let Some(reason) = &self.blocking_reason {
            writeln!(f, "Reason:            {}", reason)?;
        }
        if !self.model.is_empty() {
            writeln!(f, "Model:             {}", self.model)?;
        }
        if !self.endpoint.is_empty() {
            writeln!(f, "Endpoint:          {}", self.endpoint)?;
        }
        writeln!(f, "Key present:       {}", if self.key_present { "yes" } else { "no" })?;
        writeln!(f, "Key source:        {}", self.key_source.as_str())?;
        writeln!(f, "Keychain available:{}", if self.keychain_available { "yes" } else { "no" })?;
        writeln!(f, "Privacy mode:      {}", if self.privacy_mode { "on" } else { "off" })?;
        writeln!(f, "Context sent:      {}", self.context_policy)?;
        writeln!(
            f,
            "Tier 2 (AI code):  {}",
            if self.status.is_ready() { "available" } else { "unavailable" }
        )?;
        Ok(())
    }
}
