//! Parsing of CSV-style fixture text blocks.
//!
//! The dialect is fixed: comma delimiter, single-quote quoting, backslash
//! escaping, and surrounding-whitespace trimming for unquoted fields. A field
//! equal to the configured null token after quote stripping parses to a null
//! value instead of the literal text.

use crate::error::FixtureError;

const DELIMITER: char = ',';
const QUOTE: char = '\'';
const ESCAPE: char = '\\';

/// One parsed data row: column name paired with its value, in header order.
pub type CsvRow = Vec<(String, Option<String>)>;

/// Parser for header+rows text blocks.
pub struct CsvParser {
    null_token: String,
}

impl CsvParser {
    pub fn new(null_token: impl Into<String>) -> Self {
        Self {
            null_token: null_token.into(),
        }
    }

    /// Parses a text block whose first non-empty line is the header.
    ///
    /// Duplicate header names are rejected. Rows longer than the header drop
    /// the surplus fields; shorter rows bind only the leading columns.
    pub fn parse(&self, text: &str) -> Result<Vec<CsvRow>, FixtureError> {
        let mut lines = text.lines().filter(|line| !line.trim().is_empty());

        let header_line = lines.next().ok_or_else(|| {
            FixtureError::Declaration("a CSV block requires a header line".to_string())
        })?;
        let header = split_fields(header_line)?;
        for (i, name) in header.iter().enumerate() {
            if header[..i].contains(name) {
                return Err(FixtureError::Declaration(format!(
                    "duplicate column name '{name}' in CSV header"
                )));
            }
        }

        let mut rows = Vec::new();
        for line in lines {
            let fields = split_fields(line)?;
            let row = header
                .iter()
                .zip(fields)
                .map(|(name, field)| {
                    let value = if field == self.null_token {
                        None
                    } else {
                        Some(field)
                    };
                    (name.clone(), value)
                })
                .collect();
            rows.push(row);
        }
        Ok(rows)
    }
}

fn split_fields(line: &str) -> Result<Vec<String>, FixtureError> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
            chars.next();
        }

        if chars.peek() == Some(&QUOTE) {
            chars.next();
            let mut field = String::new();
            loop {
                match chars.next() {
                    Some(ESCAPE) => field.push(unescape(next_escaped(&mut chars)?)),
                    Some(QUOTE) => break,
                    Some(c) => field.push(c),
                    None => {
                        return Err(FixtureError::Declaration(
                            "unterminated quoted field in CSV line".to_string(),
                        ));
                    }
                }
            }
            // Only whitespace may sit between the closing quote and the
            // delimiter.
            while let Some(&c) = chars.peek() {
                if c == DELIMITER {
                    break;
                }
                chars.next();
                if !c.is_whitespace() {
                    return Err(FixtureError::Declaration(format!(
                        "unexpected character '{c}' after closing quote in CSV line"
                    )));
                }
            }
            fields.push(field);
        } else {
            let mut field = String::new();
            while let Some(&c) = chars.peek() {
                if c == DELIMITER {
                    break;
                }
                chars.next();
                if c == ESCAPE {
                    field.push(unescape(next_escaped(&mut chars)?));
                } else {
                    field.push(c);
                }
            }
            fields.push(field.trim_end().to_string());
        }

        match chars.next() {
            Some(DELIMITER) => continue,
            _ => break,
        }
    }
    Ok(fields)
}

fn next_escaped(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<char, FixtureError> {
    chars.next().ok_or_else(|| {
        FixtureError::Declaration("dangling escape at end of CSV line".to_string())
    })
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        other => other,
    }
}
