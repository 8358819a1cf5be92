use std::fmt;

use gridask_engine::EngineError;

/// Why a file could not be turned into a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestError {
    /// Extension is not one of the supported tabular formats
    UnsupportedFormat(String),
    TooLarge { bytes: u64, limit: u64 },
    /// None of the configured encodings decoded the file cleanly
    Unreadable { tried: Vec<String> },
    /// File has no header row
    Empty,
    Io(String),
    Parse(String),
    Engine(EngineError),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::UnsupportedFormat(ext) if ext.is_empty() => {
                write!(f, "Unsupported file format (no extension). Use CSV, TSV or Excel files.")
            }
            IngestError::UnsupportedFormat(ext) => {
                write!(f, "Unsupported file format '.{}'. Use CSV, TSV or Excel files.", ext)
            }
            IngestError::TooLarge { bytes, limit } => write!(
                f,
                "File is too large ({:.1} MB, limit {:.1} MB)",
                *bytes as f64 / 1_048_576.0,
                *limit as f64 / 1_048_576.0
            ),
            IngestError::Unreadable { tried } => write!(
                f,
                "Could not decode file with any supported encoding (tried {})",
                tried.join(", ")
            ),
            IngestError::Empty => write!(f, "File contains no data"),
            IngestError::Io(msg) => write!(f, "Failed to read file: {}", msg),
            IngestError::Parse(msg) => write!(f, "Failed to parse file: {}", msg),
            IngestError::Engine(e) => write!(f, "Failed to build dataset: {}", e),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<std::io::Error> for IngestError {
    fn from(e: std::io::Error) -> Self {
        IngestError::Io(e.to_string())
    }
}

impl From<csv::Error> for IngestError {
    fn from(e: csv::Error) -> Self {
        IngestError::Parse(e.to_string())
    }
}

impl From<EngineError> for IngestError {
    fn from(e: EngineError) -> Self {
        IngestError::Engine(e)
    }
}
