//! The uniform result of resolving a query.

use std::fmt;

use serde::{Serialize, Serializer};

use gridask_engine::Dataset;

/// Payload of a successful resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResultData {
    /// A single formatted value
    Scalar(String),
    Table(Dataset),
    /// An ordered list of labels
    Sequence(Vec<String>),
}

impl ResultData {
    pub fn kind(&self) -> &'static str {
        match self {
            ResultData::Scalar(_) => "scalar",
            ResultData::Table(_) => "table",
            ResultData::Sequence(_) => "sequence",
        }
    }
}

/// Which tier produced a successful result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    PatternMatched,
    AiResolved,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::PatternMatched => "pattern_matched",
            Tier::AiResolved => "ai_resolved",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No rule matched. Internal to the matcher; never surfaced on its own.
    NoMatch,
    BackendUnavailable,
    SynthesisFailed,
    ExecutionFailed,
    UnsupportedOperation,
    IngestionFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NoMatch => "no_match",
            ErrorKind::BackendUnavailable => "backend_unavailable",
            ErrorKind::SynthesisFailed => "synthesis_failed",
            ErrorKind::ExecutionFailed => "execution_failed",
            ErrorKind::UnsupportedOperation => "unsupported_operation",
            ErrorKind::IngestionFailed => "ingestion_failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolution Outcome: exactly one of a result or an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Resolved {
        data: ResultData,
        explanation: String,
        /// Synthesized code; set only for tier-2 results
        generated_code: Option<String>,
        /// Code equivalent of what ran, for audit
        code: String,
        tier: Tier,
    },
    Failed {
        error_kind: ErrorKind,
        error_message: String,
    },
}

impl Outcome {
    pub fn pattern_matched(data: ResultData, explanation: impl Into<String>, code: impl Into<String>) -> Self {
        Outcome::Resolved {
            data,
            explanation: explanation.into(),
            generated_code: None,
            code: code.into(),
            tier: Tier::PatternMatched,
        }
    }

    pub fn ai_resolved(data: ResultData, explanation: impl Into<String>, code: impl Into<String>) -> Self {
        let code = code.into();
        Outcome::Resolved {
            data,
            explanation: explanation.into(),
            generated_code: Some(code.clone()),
            code,
            tier: Tier::AiResolved,
        }
    }

    pub fn failed(error_kind: ErrorKind, error_message: impl Into<String>) -> Self {
        Outcome::Failed { error_kind, error_message: error_message.into() }
    }

    /// Outcome for a file that could not be loaded.
    pub fn ingestion_failed(error: impl fmt::Display) -> Self {
        Self::failed(ErrorKind::IngestionFailed, error.to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Resolved { .. })
    }

    pub fn data(&self) -> Option<&ResultData> {
        match self {
            Outcome::Resolved { data, .. } => Some(data),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn explanation(&self) -> Option<&str> {
        match self {
            Outcome::Resolved { explanation, .. } => Some(explanation),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Outcome::Resolved { code, .. } => Some(code),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn generated_code(&self) -> Option<&str> {
        match self {
            Outcome::Resolved { generated_code, .. } => generated_code.as_deref(),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn tier(&self) -> Option<Tier> {
        match self {
            Outcome::Resolved { tier, .. } => Some(*tier),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Outcome::Resolved { .. } => None,
            Outcome::Failed { error_kind, .. } => Some(*error_kind),
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Outcome::Resolved { .. } => None,
            Outcome::Failed { error_message, .. } => Some(error_message),
        }
    }

    /// One-line description for logs and history.
    pub fn summary(&self) -> String {
        match self {
            Outcome::Resolved { data, tier, .. } => {
                let shape = match data {
                    ResultData::Scalar(s) => {
                        let short: String = s.chars().take(60).collect();
                        if short.len() < s.len() {
                            format!("{short}…")
                        } else {
                            short
                        }
                    }
                    ResultData::Table(ds) => format!("table {}x{}", ds.n_rows(), ds.n_cols()),
                    ResultData::Sequence(items) => format!("{} items", items.len()),
                };
                format!("ok [{}] {}", tier.as_str(), shape)
            }
            Outcome::Failed { error_kind, error_message } => {
                format!("error [{}] {}", error_kind, error_message)
            }
        }
    }
}

#[derive(Serialize)]
struct OutcomeWire<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a ResultData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    explanation: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generated_code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tier: Option<Tier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<&'a str>,
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        OutcomeWire {
            success: self.is_success(),
            data: self.data(),
            explanation: self.explanation(),
            code: self.code(),
            generated_code: self.generated_code(),
            tier: self.tier(),
            error_kind: self.error_kind(),
            error_message: self.error_message(),
        }
        .serialize(serializer)
    }
}
