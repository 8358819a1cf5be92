// Dataset context for code synthesis prompts
//
// Describes the dataset without sending it: counts, names, types and a short
// preview. Privacy mode drops the preview.

use gridask_engine::render::render_preview;
use gridask_engine::Dataset;

/// Maximum columns described in a prompt
pub const MAX_CONTEXT_COLS: usize = 40;

/// Rows included in the literal preview
pub const PREVIEW_ROWS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub name: String,
    pub dtype: String,
}

/// Bounded description of a dataset for the text-generation service.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetContext {
    pub row_count: usize,
    pub col_count: usize,
    /// At most `MAX_CONTEXT_COLS` entries
    pub columns: Vec<ColumnSummary>,
    /// Approximate in-memory size, in MiB
    pub memory_mb: f64,
    /// Tab-separated preview of the first rows (None in privacy mode)
    pub preview: Option<String>,
    pub privacy_mode: bool,
}

impl DatasetContext {
    pub fn from_dataset(ds: &Dataset, privacy_mode: bool) -> Self {
        let columns = ds
            .columns()
            .iter()
            .take(MAX_CONTEXT_COLS)
            .map(|c| ColumnSummary { name: c.name().to_string(), dtype: c.dtype().to_string() })
            .collect::<Vec<_>>();

        let bytes: usize = ds.columns().iter().map(|c| c.memory_estimate()).sum();

        let preview = if privacy_mode {
            None
        } else {
            let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
            // select() only fails on unknown names, and these come from the dataset
            let shown = ds.select(&names).unwrap_or_else(|_| ds.clone());
            Some(render_preview(&shown, PREVIEW_ROWS))
        };

        Self {
            row_count: ds.n_rows(),
            col_count: ds.n_cols(),
            columns,
            memory_mb: bytes as f64 / 1024.0 / 1024.0,
            preview,
            privacy_mode,
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.columns.len() < self.col_count
    }

    /// Format context as structured text for the prompt
    pub fn to_prompt_text(&self) -> String {
        let mut result = String::new();

        result.push_str("Dataset Information:\n");
        result.push_str(&format!("- Shape: {} rows, {} columns\n", self.row_count, self.col_count));
        let names: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        result.push_str(&format!("- Columns: {}\n", names.join(", ")));
        if self.is_truncated() {
            result.push_str(&format!(
                "  (showing first {} of {} columns)\n",
                self.columns.len(),
                self.col_count
            ));
        }
        result.push_str("- Data types:\n");
        for c in &self.columns {
            result.push_str(&format!("  {}: {}\n", c.name, c.dtype));
        }
        result.push_str(&format!("- Memory usage: {:.1} MB\n", self.memory_mb));

        if let Some(preview) = &self.preview {
            result.push_str(&format!("\nFirst {} rows:\n", PREVIEW_ROWS));
            result.push_str(preview);
            result.push('\n');
        }

        result
    }
}
