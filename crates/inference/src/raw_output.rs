//! Parser for the raw scoring output of a batch job.
//!
//! A job writes one row per scored file: `file, ABSENT score, PRESENT score`.
//! Two layouts are accepted:
//!
//! - a single list literal: `[['a.wav', 0.1, 0.9], ['b.wav', 0.7, 0.3]]`
//! - one row per line, fields separated by whitespace and/or commas, each line
//!   optionally wrapped in brackets: `a.wav 0.1 0.9` or `['a.wav', 0.1, 0.9]`
//!
//! Scalars are bare words or single/double quoted strings. Blank lines are
//! skipped and `\r` is ignored.

use thiserror::Error;

/// Number of fields in every prediction row.
pub const ROW_ARITY: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutputParseError {
    #[error("output is not valid UTF-8")]
    NotUtf8,

    #[error("no rows")]
    Empty,

    #[error("row {row}: {message}")]
    Malformed { row: usize, message: String },

    #[error("row {row}: expected 3 fields, found {found}")]
    WrongArity { row: usize, found: usize },

    #[error("row {row}: {column} score {value:?} is not a number")]
    InvalidScore {
        row: usize,
        column: &'static str,
        value: String,
    },
}

/// One scored file.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRow {
    pub file: String,
    pub absent: f64,
    pub present: f64,
}

/// Parsed output of one job, in output order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PredictionSeries {
    rows: Vec<PredictionRow>,
}

impl PredictionSeries {
    pub fn rows(&self) -> &[PredictionRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// PRESENT scores aligned to a table of `height` rows.
    ///
    /// Rows without a prediction are `None`; predictions past `height` are
    /// dropped.
    pub fn present_column(&self, height: usize) -> Vec<Option<f64>> {
        (0..height)
            .map(|idx| self.rows.get(idx).map(|r| r.present))
            .collect()
    }
}

/// Decode and parse raw job output.
pub fn parse_prediction_bytes(bytes: &[u8]) -> Result<PredictionSeries, OutputParseError> {
    let text = std::str::from_utf8(bytes).map_err(|_| OutputParseError::NotUtf8)?;
    parse_predictions(text)
}

/// Parse raw job output into prediction rows.
pub fn parse_predictions(text: &str) -> Result<PredictionSeries, OutputParseError> {
    let rows = parse_rows(text)?;
    if rows.is_empty() {
        return Err(OutputParseError::Empty);
    }

    let rows = rows
        .into_iter()
        .enumerate()
        .map(|(idx, fields)| prediction_row(idx + 1, fields))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(PredictionSeries { rows })
}

fn prediction_row(row: usize, fields: Vec<String>) -> Result<PredictionRow, OutputParseError> {
    let [file, absent, present]: [String; ROW_ARITY] =
        fields
            .try_into()
            .map_err(|fields: Vec<String>| OutputParseError::WrongArity {
                row,
                found: fields.len(),
            })?;

    Ok(PredictionRow {
        file,
        absent: score(row, "ABSENT", absent)?,
        present: score(row, "PRESENT", present)?,
    })
}

fn score(row: usize, column: &'static str, value: String) -> Result<f64, OutputParseError> {
    value
        .trim()
        .parse()
        .map_err(|_| OutputParseError::InvalidScore { row, column, value })
}

/// Split raw output into rows of scalar fields.
///
/// Returns an empty vector for blank input; callers decide whether that is
/// an error.
pub fn parse_rows(text: &str) -> Result<Vec<Vec<String>>, OutputParseError> {
    if is_literal(text) {
        let mut cursor = Cursor::new(text);
        cursor.literal()
    } else {
        let mut rows = Vec::new();
        for line in text.lines() {
            let mut cursor = Cursor::new(line);
            if let Some(fields) = cursor.line(rows.len() + 1)? {
                rows.push(fields);
            }
        }
        Ok(rows)
    }
}

/// `[[` (whitespace allowed in between) opens a list literal.
fn is_literal(text: &str) -> bool {
    let mut chars = text.chars().filter(|c| !c.is_whitespace());
    chars.next() == Some('[') && chars.next() == Some('[')
}

fn is_bare(c: char) -> bool {
    !matches!(c, ' ' | '\t' | '\r' | '\n' | ',' | '[' | ']' | '\'' | '"')
}

struct Cursor {
    chars: Vec<char>,
    pos: usize,
}

impl Cursor {
    fn new(src: &str) -> Self {
        Self {
            chars: src.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_blank(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\r')) {
            self.pos += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, row: usize, want: char) -> Result<(), OutputParseError> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            other => Err(unexpected(row, &format!("'{want}'"), other)),
        }
    }

    fn scalar(&mut self, row: usize) -> Result<String, OutputParseError> {
        match self.peek() {
            Some(quote @ ('\'' | '"')) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|c| c != quote) {
                    self.pos += 1;
                }
                if self.at_end() {
                    return Err(OutputParseError::Malformed {
                        row,
                        message: "unterminated quoted value".to_string(),
                    });
                }
                let value = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                Ok(value)
            }
            Some(c) if is_bare(c) => {
                let start = self.pos;
                while self.peek().is_some_and(is_bare) {
                    self.pos += 1;
                }
                Ok(self.chars[start..self.pos].iter().collect())
            }
            other => Err(unexpected(row, "a value", other)),
        }
    }

    /// `[[..], [..]]` spanning any number of lines.
    fn literal(&mut self) -> Result<Vec<Vec<String>>, OutputParseError> {
        let mut rows = Vec::new();
        self.skip_whitespace();
        self.expect(1, '[')?;

        loop {
            self.skip_whitespace();
            let row = rows.len() + 1;
            match self.peek() {
                Some(']') => {
                    self.pos += 1;
                    break;
                }
                Some('[') => {
                    rows.push(self.literal_row(row)?);
                    self.skip_whitespace();
                    match self.peek() {
                        Some(',') => self.pos += 1,
                        Some(']') => {}
                        other => return Err(unexpected(row, "',' or ']'", other)),
                    }
                }
                other => return Err(unexpected(row, "'[' or ']'", other)),
            }
        }

        self.skip_whitespace();
        if !self.at_end() {
            return Err(OutputParseError::Malformed {
                row: rows.len(),
                message: "trailing content after closing ']'".to_string(),
            });
        }
        Ok(rows)
    }

    fn literal_row(&mut self, row: usize) -> Result<Vec<String>, OutputParseError> {
        self.expect(row, '[')?;
        let mut fields = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(']') => {
                    self.pos += 1;
                    return Ok(fields);
                }
                None => return Err(unexpected(row, "']'", None)),
                Some(_) => {
                    fields.push(self.scalar(row)?);
                    self.skip_whitespace();
                    match self.peek() {
                        Some(',') => self.pos += 1,
                        Some(']') => {}
                        other => return Err(unexpected(row, "',' or ']'", other)),
                    }
                }
            }
        }
    }

    /// One line of line-mode output; `None` for a blank line.
    fn line(&mut self, row: usize) -> Result<Option<Vec<String>>, OutputParseError> {
        self.skip_blank();
        if self.at_end() {
            return Ok(None);
        }

        let bracketed = self.peek() == Some('[');
        if bracketed {
            self.pos += 1;
        }

        let mut fields = Vec::new();
        loop {
            self.skip_blank();
            match self.peek() {
                None => break,
                Some(']') => break,
                Some(',') if !fields.is_empty() => {
                    self.pos += 1;
                }
                Some(_) => fields.push(self.scalar(row)?),
            }
        }

        if self.peek() == Some(']') {
            if !bracketed {
                return Err(unexpected(row, "a value", Some(']')));
            }
            self.pos += 1;
            self.skip_blank();
            // tolerate the separator of a pasted list row
            if self.peek() == Some(',') {
                self.pos += 1;
                self.skip_blank();
            }
        } else if bracketed {
            return Err(unexpected(row, "']'", None));
        }

        if !self.at_end() {
            return Err(OutputParseError::Malformed {
                row,
                message: "trailing content after closing ']'".to_string(),
            });
        }
        Ok(Some(fields))
    }
}

fn unexpected(row: usize, expected: &str, found: Option<char>) -> OutputParseError {
    let message = match found {
        Some(c) => format!("expected {expected}, found {c:?}"),
        None => format!("expected {expected}, found end of input"),
    };
    OutputParseError::Malformed { row, message }
}
