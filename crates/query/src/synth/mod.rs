//! Tier 2, part one: turn a question into candidate code.
//!
//! The [`Synthesizer`] trait is the seam between query resolution and the
//! text-generation service. [`OpenAiSynthesizer`] speaks the OpenAI chat
//! completions protocol; tests substitute their own implementations.

pub mod client;
pub mod context;

use std::fmt;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use regex::Regex;

pub use client::OpenAiSynthesizer;
pub use context::DatasetContext;

/// Candidate code plus whatever prose came with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub code: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SynthError {
    /// Service answered with a non-success status
    Api { status: u16, message: String },
    Network(String),
    Timeout(String),
    /// Response body was not the expected JSON
    Parse(String),
    /// JSON was well-formed but had nothing usable in it
    InvalidResponse(String),
    /// Response contained no executable code
    NoCode,
}

impl fmt::Display for SynthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthError::Api { status, message } => write!(f, "API error ({}): {}", status, message),
            SynthError::Network(msg) => write!(f, "Network error: {}", msg),
            SynthError::Timeout(msg) => write!(f, "Request timed out: {}", msg),
            SynthError::Parse(msg) => write!(f, "Failed to parse response: {}", msg),
            SynthError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            SynthError::NoCode => write!(f, "no executable code produced"),
        }
    }
}

impl std::error::Error for SynthError {}

pub trait Synthesizer: Send + Sync {
    /// Produce candidate code answering `query` against the described dataset.
    fn synthesize(&self, context: &DatasetContext, query: &str) -> Result<Synthesis, SynthError>;
}

impl<S: Synthesizer + ?Sized> Synthesizer for Box<S> {
    fn synthesize(&self, context: &DatasetContext, query: &str) -> Result<Synthesis, SynthError> {
        (**self).synthesize(context, query)
    }
}

/// Spaces out calls to an inner synthesizer by at least `min_interval`.
pub struct RateLimitedSynthesizer<S> {
    inner: S,
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl<S: Synthesizer> RateLimitedSynthesizer<S> {
    pub fn new(inner: S, min_interval: Duration) -> Self {
        Self { inner, min_interval, last_call: Mutex::new(None) }
    }

    fn wait_turn(&self) {
        let mut last = self.last_call.lock();
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                log::debug!("rate limit: waiting {:?} before next synthesis call", wait);
                std::thread::sleep(wait);
            }
        }
        *last = Some(Instant::now());
    }
}

impl<S: Synthesizer> Synthesizer for RateLimitedSynthesizer<S> {
    fn synthesize(&self, context: &DatasetContext, query: &str) -> Result<Synthesis, SynthError> {
        self.wait_turn();
        self.inner.synthesize(context, query)
    }
}

fn assignment_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\s*(local\s+)?[A-Za-z_][A-Za-z0-9_]*\s*=[^=]").ok())
        .as_ref()
}

fn is_fence(line: &str) -> Option<&'static str> {
    let t = line.trim_start();
    if t.starts_with("```") {
        Some("```")
    } else if t.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

/// Locate the first fenced block: (code, text outside the block).
fn fenced_block(text: &str) -> Option<(String, String)> {
    let lines: Vec<&str> = text.lines().collect();
    let open = lines.iter().position(|l| is_fence(l).is_some())?;
    let marker = is_fence(lines[open])?;
    let close = lines[open + 1..]
        .iter()
        .position(|l| l.trim_start().starts_with(marker))
        .map(|i| open + 1 + i)
        .unwrap_or(lines.len());

    let code = lines[open + 1..close].join("\n");
    let rest: Vec<&str> = lines[..open]
        .iter()
        .chain(lines.get(close + 1..).unwrap_or(&[]))
        .copied()
        .collect();
    Some((code.trim().to_string(), rest.join("\n").trim().to_string()))
}

fn looks_like_code(line: &str) -> bool {
    let t = line.trim();
    if t.is_empty() {
        return false;
    }
    t.contains("df:") || t.contains("df[") || t.contains("df.")
        || assignment_pattern().is_some_and(|re| re.is_match(t))
}

/// Pull one code fragment out of a model response.
///
/// Prefers the first fenced block (```` ``` ```` or `~~~`, any language
/// tag). Otherwise keeps lines that look like dataset operations or
/// assignments. `None` when neither yields anything.
pub fn extract_code(text: &str) -> Option<String> {
    if let Some((code, _)) = fenced_block(text) {
        if !code.is_empty() {
            return Some(code);
        }
    }
    let lines: Vec<&str> = text.lines().filter(|l| looks_like_code(l)).map(str::trim).collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Split a model response into code and explanation.
pub fn parse_synthesis(text: &str) -> Result<Synthesis, SynthError> {
    let code = extract_code(text).ok_or(SynthError::NoCode)?;
    let explanation = match fenced_block(text) {
        Some((_, rest)) if !rest.is_empty() => rest,
        _ => text.trim().to_string(),
    };
    Ok(Synthesis { code, explanation })
}
