//! Parameter table codec
//!
//! Capture sets carry a small two-column table of session parameters:
//! a `Parameter,Value` header followed by one `key,value` pair per line.
//! The format is deliberately flat text with no quoting or escaping; a comma
//! in a value simply becomes part of the value (only the first comma splits).

use std::fmt::Write as _;

/// Header emitted on every rendered table.
pub const TABLE_HEADER: &str = "Parameter,Value";

/// An ordered mapping of parameter key to value.
///
/// Keys are unique; setting an existing key replaces its value in place so
/// row order stays stable across merges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterRecord {
    rows: Vec<(String, String)>,
}

impl ParameterRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key, replacing in place if it already exists.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(row) = self.rows.iter_mut().find(|(k, _)| *k == key) {
            row.1 = value;
        } else {
            self.rows.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.rows.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rows.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse a flat parameter table.
    ///
    /// A leading header line is detected heuristically: the first field of the
    /// first line case-insensitively equals "parameter" or contains "name".
    /// Blank lines are skipped; a line without a comma becomes a key with an
    /// empty value; duplicate keys keep the last value seen.
    pub fn parse(text: &str) -> Self {
        let mut record = Self::new();
        let mut first_data_line = true;

        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }

            let (key, value) = match line.split_once(',') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => (line.trim(), ""),
            };

            if first_data_line {
                first_data_line = false;
                if is_header_field(key) {
                    continue;
                }
            }

            if key.is_empty() {
                continue;
            }

            record.set(key, value);
        }

        record
    }

    /// Render as a table: header plus one row per pair, newline-terminated.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(32 + self.rows.len() * 24);
        out.push_str(TABLE_HEADER);
        out.push('\n');
        for (key, value) in &self.rows {
            let _ = writeln!(out, "{},{}", key, value);
        }
        out
    }
}

/// Header heuristic for the first field of the first non-blank line.
fn is_header_field(field: &str) -> bool {
    let lowered = field.trim().to_ascii_lowercase();
    lowered == "parameter" || lowered.contains("name")
}
