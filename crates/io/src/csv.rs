// CSV/TSV import

use encoding_rs::Encoding;

use gridask_engine::{Column, Dataset};

use crate::error::IngestError;
use crate::infer::{normalize_headers, type_column};

/// Decode raw bytes with the first encoding (by label) that accepts them
/// without replacement characters. Returns the text and the label that won.
pub fn decode(bytes: &[u8], encodings: &[String]) -> Result<(String, String), IngestError> {
    // A UTF-8 byte order mark is never data.
    let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    for label in encodings {
        let Some(encoding) = Encoding::for_label(label.trim().as_bytes()) else {
            log::warn!("ignoring unknown encoding label '{}'", label);
            continue;
        };
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(body) {
            if label != &encodings[0] {
                log::info!("decoded file as {} ({})", label, encoding.name());
            }
            return Ok((text.into_owned(), label.clone()));
        }
        log::debug!("file is not valid {}", label);
    }

    Err(IngestError::Unreadable { tried: encodings.to_vec() })
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
pub fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Must produce >1 field on the first line to be viable
        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // Lines agreeing with the header, weighted by field count
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Parse delimited text with a header row into a dataset.
pub fn parse(content: &str, delimiter: u8) -> Result<Dataset, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => record?,
        None => return Err(IngestError::Empty),
    };
    let headers = normalize_headers(header.iter().map(str::to_string).collect());
    let width = headers.len();

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); width];
    for (i, result) in records.enumerate() {
        let record = result?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        if record.len() > width {
            return Err(IngestError::Parse(format!(
                "line {} has {} fields, expected {}",
                i + 2,
                record.len(),
                width
            )));
        }
        for (j, col) in cells.iter_mut().enumerate() {
            col.push(record.get(j).map(str::to_string));
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, raw)| Column::new(name, type_column(&raw)))
        .collect();
    Ok(Dataset::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridask_engine::{DType, Value};

    fn labels() -> Vec<String> {
        ["utf-8", "latin-1", "iso-8859-1", "windows-1252"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_decode_utf8_strips_bom() {
        let (text, enc) = decode(b"\xEF\xBB\xBFa,b\n1,2\n", &labels()).unwrap();
        assert_eq!(enc, "utf-8");
        assert!(text.starts_with("a,b"));
    }

    #[test]
    fn test_decode_falls_back_to_latin1() {
        // "café" in Latin-1
        let (text, enc) = decode(b"name\ncaf\xE9\n", &labels()).unwrap();
        assert_eq!(enc, "latin-1");
        assert!(text.contains("café"));
    }

    #[test]
    fn test_decode_utf8_only_rejects_latin1() {
        let err = decode(b"caf\xE9", &["utf-8".to_string()]).unwrap_err();
        assert!(matches!(err, IngestError::Unreadable { .. }));
    }

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter("a;b;c\n1;2;3\n"), b';');
        assert_eq!(sniff_delimiter("a\tb\n1\t2\n"), b'\t');
        assert_eq!(sniff_delimiter("a,b\n1,2\n"), b',');
        assert_eq!(sniff_delimiter("a|b|c\n1|2|3\n"), b'|');
        assert_eq!(sniff_delimiter("single\n1\n"), b',');
    }

    #[test]
    fn test_sniff_ignores_comma_inside_semicolon_file() {
        assert_eq!(sniff_delimiter("name;price\nwidget;1,50\ngadget;2,75\n"), b';');
    }

    #[test]
    fn test_parse_types_and_padding() {
        let ds = parse("id,region,score\n1,north,2.5\n2,south\n3,north,NA\n", b',').unwrap();
        assert_eq!(ds.shape(), (3, 3));
        assert_eq!(ds.column("id").unwrap().dtype(), DType::Numeric);
        assert_eq!(ds.value(1, 2), Some(&Value::Null));
        assert_eq!(ds.value(2, 2), Some(&Value::Null));
        assert_eq!(ds.value(0, 2), Some(&Value::Float(2.5)));
    }

    #[test]
    fn test_parse_rejects_long_rows() {
        let err = parse("a,b\n1,2,3\n", b',').unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(parse("", b','), Err(IngestError::Empty));
    }

    #[test]
    fn test_header_only() {
        let ds = parse("a,b\n", b',').unwrap();
        assert_eq!(ds.shape(), (0, 2));
    }
}
