//! Plain-text rendering of datasets.

use crate::dataset::Dataset;
use crate::value::Value;

/// Cells wider than this are cut with an ellipsis.
const MAX_CELL_WIDTH: usize = 40;

/// `1234567` -> `"1,234,567"`
pub fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn cell_text(v: &Value) -> String {
    let s = v.to_string().replace(['\n', '\r', '\t'], " ");
    if s.chars().count() > MAX_CELL_WIDTH {
        let cut: String = s.chars().take(MAX_CELL_WIDTH - 1).collect();
        format!("{cut}…")
    } else {
        s
    }
}

/// Render up to `max_rows` rows as an aligned text grid with a row index.
///
/// Numeric columns are right-aligned, everything else left-aligned. A footer notes
/// how many rows were omitted.
pub fn render_table(ds: &Dataset, max_rows: usize) -> String {
    let shown = ds.n_rows().min(max_rows);
    let index_width = shown.saturating_sub(1).to_string().len();

    let grid: Vec<Vec<String>> = (0..shown)
        .map(|r| ds.columns().iter().map(|c| cell_text(&c.values()[r])).collect())
        .collect();
    let right: Vec<bool> = ds.columns().iter().map(|c| c.is_numeric()).collect();

    let widths: Vec<usize> = ds
        .columns()
        .iter()
        .enumerate()
        .map(|(j, c)| {
            grid.iter()
                .map(|row| row[j].chars().count())
                .chain(std::iter::once(c.name().chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let pad = |text: &str, w: usize, right: bool| {
        if right {
            format!("{text:>w$}")
        } else {
            format!("{text:<w$}")
        }
    };

    let mut out = String::new();
    let mut header = " ".repeat(index_width);
    for ((c, w), r) in ds.columns().iter().zip(&widths).zip(&right) {
        header.push_str("  ");
        header.push_str(&pad(c.name(), *w, *r));
    }
    out.push_str(header.trim_end());
    out.push('\n');

    for (i, row) in grid.iter().enumerate() {
        let mut line = format!("{:>w$}", i, w = index_width);
        for ((text, w), r) in row.iter().zip(&widths).zip(&right) {
            line.push_str("  ");
            line.push_str(&pad(text, *w, *r));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }

    if shown < ds.n_rows() {
        out.push_str(&format!(
            "... {} more rows ({} total)\n",
            group_thousands((ds.n_rows() - shown) as i64),
            group_thousands(ds.n_rows() as i64)
        ));
    }
    out.push_str(&format!("[{} rows x {} columns]", ds.n_rows(), ds.n_cols()));
    out
}

/// Compact, tab-separated preview of the first `n` rows, header included.
/// Used where a literal sample is needed (prompts, logs).
pub fn render_preview(ds: &Dataset, n: usize) -> String {
    let mut lines = Vec::with_capacity(n + 1);
    lines.push(ds.column_names().join("\t"));
    for r in 0..ds.n_rows().min(n) {
        let cells: Vec<String> = ds.columns().iter().map(|c| cell_text(&c.values()[r])).collect();
        lines.push(cells.join("\t"));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
        assert_eq!(group_thousands(-45000), "-45,000");
    }

    #[test]
    fn table_alignment_and_footer() {
        let ds = Dataset::from_columns(vec![
            ("name", vec!["ann".into(), "bob".into(), "cy".into()]),
            ("n", vec![Value::Int(5), Value::Int(120), Value::Int(7)]),
        ])
        .unwrap();
        let text = render_table(&ds, 2);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "   name    n");
        assert_eq!(lines[1], "0  ann     5");
        assert_eq!(lines[2], "1  bob   120");
        assert_eq!(lines[3], "... 1 more rows (3 total)");
        assert_eq!(lines[4], "[3 rows x 2 columns]");
    }

    #[test]
    fn preview_has_header() {
        let ds = Dataset::from_columns(vec![("a", vec![Value::Int(1), Value::Int(2)])]).unwrap();
        assert_eq!(render_preview(&ds, 1), "a\n1");
    }
}
