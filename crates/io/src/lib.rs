//! File ingestion: delimited text and Excel workbooks into a [`Dataset`].

pub mod csv;
pub mod error;
pub mod infer;
pub mod xlsx;

use std::fs;
use std::path::Path;

use serde::Serialize;

use gridask_engine::Dataset;

pub use error::IngestError;

/// Accepted file extensions.
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["csv", "tsv", "txt", "xlsx", "xlsm", "xls"];

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Files larger than this many bytes are refused
    pub max_file_size: u64,
    /// Encoding labels tried in order for delimited text
    pub encodings: Vec<String>,
    /// Worksheet to read from Excel files (first sheet when unset)
    pub sheet: Option<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            max_file_size: 200 * 1024 * 1024,
            encodings: ["utf-8", "latin-1", "iso-8859-1", "windows-1252"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            sheet: None,
        }
    }
}

/// Where a dataset came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceInfo {
    pub file_name: String,
    /// Encoding label that decoded the file (`binary` for workbooks)
    pub encoding: String,
    /// BLAKE3 hex digest of the raw file bytes
    pub fingerprint: String,
    pub bytes: u64,
}

#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub dataset: Dataset,
    pub source: SourceInfo,
}

enum Format {
    Delimited { tab: bool },
    Excel,
}

fn detect_format(path: &Path) -> Result<Format, IngestError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" | "txt" => Ok(Format::Delimited { tab: false }),
        "tsv" => Ok(Format::Delimited { tab: true }),
        "xlsx" | "xlsm" | "xls" => Ok(Format::Excel),
        _ => Err(IngestError::UnsupportedFormat(ext)),
    }
}

/// Load a tabular file into a dataset.
///
/// Checks the extension and size first, then decodes delimited text with
/// the configured encodings (or reads the workbook), and types each column.
pub fn load_path(path: &Path, options: &LoadOptions) -> Result<LoadedDataset, IngestError> {
    let format = detect_format(path)?;

    let size = fs::metadata(path)?.len();
    if size > options.max_file_size {
        return Err(IngestError::TooLarge { bytes: size, limit: options.max_file_size });
    }

    let raw = fs::read(path)?;
    let fingerprint = blake3::hash(&raw).to_hex().to_string();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (dataset, encoding) = match format {
        Format::Delimited { tab } => {
            let (text, encoding) = csv::decode(&raw, &options.encodings)?;
            let delimiter = if tab { b'\t' } else { csv::sniff_delimiter(&text) };
            (csv::parse(&text, delimiter)?, encoding)
        }
        Format::Excel => (xlsx::import(path, options.sheet.as_deref())?, "binary".to_string()),
    };

    log::info!(
        "loaded {} ({} rows x {} columns, {})",
        file_name,
        dataset.n_rows(),
        dataset.n_cols(),
        encoding
    );

    Ok(LoadedDataset {
        dataset,
        source: SourceInfo { file_name, encoding, fingerprint, bytes: size },
    })
}
