// OpenAI-compatible chat completions client
//
// Blocking; call from a worker thread if the caller has a UI to keep alive.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use gridask_config::ai::ResolvedAIConfig;

use super::context::DatasetContext;
use super::{parse_synthesis, SynthError, Synthesis, Synthesizer};
use crate::sandbox::API_REFERENCE;

// ============================================================================
// OpenAI API types
// ============================================================================

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIError {
    error: OpenAIErrorDetail,
}

#[derive(Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}

// ============================================================================
// Client
// ============================================================================

/// Talks to `POST {base_url}/chat/completions`.
pub struct OpenAiSynthesizer {
    http: reqwest::blocking::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiSynthesizer {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SynthError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SynthError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            max_tokens: 2000,
            temperature: 0.1,
        })
    }

    /// Build from a resolved configuration.
    pub fn from_config(config: &ResolvedAIConfig) -> Result<Self, SynthError> {
        Ok(Self::new(
            config.endpoint.clone(),
            config.api_key.clone(),
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )?
        .with_sampling(config.max_tokens, config.temperature))
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

pub fn build_system_prompt() -> String {
    format!(
        r#"You are a data analysis expert. Generate data-analysis code operating on a pre-bound dataset reference named `df`.

CODE RULES:
- Write Lua expressions only, one statement per line.
- Each line is either an assignment (`name = expression`) or an expression.
- No functions, loops, conditionals, `return`, or semicolons.
- Store the final answer in `result`, or end with an expression that produces it.
- Only `df` and the helpers below are available. There is no string, math, table, io or os library.

{}
Wrap the code in a single ```lua fenced block. Keep any explanation short and outside the block."#,
        API_REFERENCE
    )
}

pub fn build_user_prompt(question: &str, context: &DatasetContext) -> String {
    let mut prompt = String::new();

    prompt.push_str(&context.to_prompt_text());
    prompt.push('\n');

    prompt.push_str("User Query: ");
    prompt.push_str(question);
    prompt.push('\n');

    prompt.push_str("\nProvide Lua code answering this query using `df`.");

    prompt
}

fn classify_transport(e: reqwest::Error) -> SynthError {
    if e.is_timeout() {
        SynthError::Timeout(e.to_string())
    } else {
        SynthError::Network(e.to_string())
    }
}

impl Synthesizer for OpenAiSynthesizer {
    fn synthesize(&self, context: &DatasetContext, query: &str) -> Result<Synthesis, SynthError> {
        let request = OpenAIRequest {
            model: self.model.clone(),
            messages: vec![
                OpenAIMessage { role: "system".to_string(), content: build_system_prompt() },
                OpenAIMessage { role: "user".to_string(), content: build_user_prompt(query, context) },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        log::info!("requesting code synthesis from {} ({})", self.base_url, self.model);

        let mut builder = self
            .http
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder.send().map_err(classify_transport)?;
        let status = response.status();
        let body = response.text().map_err(classify_transport)?;

        if !status.is_success() {
            let message = serde_json::from_str::<OpenAIError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(SynthError::Api { status: status.as_u16(), message });
        }

        let parsed: OpenAIResponse =
            serde_json::from_str(&body).map_err(|e| SynthError::Parse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| SynthError::InvalidResponse("No choices in response".to_string()))?
            .message
            .content
            .unwrap_or_default();

        log::debug!("synthesis response: {} chars", content.len());
        parse_synthesis(&content)
    }
}
