//! Loading the book catalog for the offline bulk load.

use anyhow::{Context, Result};
use std::path::Path;

use bookdb_core::Record;

/// Read records from a JSON array file, or from JSON lines when the file
/// does not start with `[`.
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_records(&raw).with_context(|| format!("parsing {}", path.display()))
}

pub fn parse_records(raw: &str) -> Result<Vec<Record>> {
    if raw.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(raw)?);
    }
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| serde_json::from_str(line).with_context(|| format!("line {}", n + 1)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_and_lines_are_both_accepted() {
        let array = r#"[{"_id":"b1","title":"The Pet","year":2001,"pages":120,"synopsis":"A pet story","authors":["X"]}]"#;
        let records = parse_records(array).unwrap();
        assert_eq!(records[0].id, "b1");
        assert_eq!(records[0].extra["authors"][0], "X");

        let lines = "{\"_id\":\"a\",\"title\":\"A\",\"year\":1,\"pages\":2}\n\n{\"_id\":\"b\",\"title\":\"B\",\"year\":3,\"pages\":4}\n";
        let records = parse_records(lines).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].synopsis.is_none());
    }

    #[test]
    fn bad_line_is_located() {
        let err = parse_records("{\"_id\":\"a\",\"title\":\"A\",\"year\":1,\"pages\":2}\nnot json\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }
}
