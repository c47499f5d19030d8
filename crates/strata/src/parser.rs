//! Parses migration files that carry both forward and reverse SQL.
//!
//! A migration file is interpreted line by line. Lines whose trimmed
//! content starts with `-- +migrate` are directives; everything else is
//! SQL that accumulates into the statement list of the current direction.
//! Statements end at a `;` that sits outside any single-quoted,
//! double-quoted or dollar-quoted (`$tag$ ... $tag$`) region, so procedure
//! bodies with embedded semicolons survive intact. For bodies that cannot
//! be expressed that way, `StatementBegin`/`StatementEnd` wrap a free-form
//! block that becomes a single statement.
//!
//! ```sql
//! -- +migrate Up
//! CREATE TABLE people (id int);
//!
//! -- +migrate Down
//! DROP TABLE people;
//! ```

use thiserror::Error;

use crate::migration::Direction;

const DIRECTIVE_PREFIX: &str = "-- +migrate";

/// Error type for migration file syntax violations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// SQL text appeared before the first `Up` or `Down` directive.
    #[error("line {line}: statement before any Up/Down directive")]
    StatementBeforeDirection { line: usize },

    /// `NoTransaction` appeared before the first `Up` or `Down` directive.
    #[error("line {line}: NoTransaction before any Up/Down directive")]
    NoTransactionBeforeDirection { line: usize },

    /// A `-- +migrate` line that is not one of the known directives.
    #[error("line {line}: unrecognized migrate directive: {directive}")]
    UnknownDirective { line: usize, directive: String },

    /// `StatementBegin` while an earlier block is still open.
    #[error("line {line}: StatementBegin while the block from line {opened} is still open")]
    NestedStatementBlock { line: usize, opened: usize },

    /// `StatementEnd` without a matching `StatementBegin`.
    #[error("line {line}: StatementEnd without a matching StatementBegin")]
    UnexpectedStatementEnd { line: usize },

    /// A statement block was still open at end of file or at a direction
    /// switch.
    #[error("StatementBegin block from line {opened} is never closed")]
    UnclosedStatementBlock { opened: usize },

    /// A quoted region was still open at end of file.
    #[error("unterminated quoted region at end of file")]
    UnterminatedQuote,
}

/// The result of parsing one migration file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedMigration {
    pub up_statements: Vec<String>,
    pub down_statements: Vec<String>,
    pub disable_transaction_up: bool,
    pub disable_transaction_down: bool,
}

/// Parse the full text of one migration file.
pub fn parse_migration(content: &str) -> Result<ParsedMigration, ParseError> {
    let mut parser = Parser::default();
    for (idx, line) in content.lines().enumerate() {
        parser.line(idx + 1, line)?;
    }
    parser.finish()
}

/// Which quoted region, if any, the scanner is currently inside.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
enum QuoteState {
    #[default]
    None,
    Single,
    Double,
    /// Inside `$tag$ ... $tag$`; the tag may be empty.
    Dollar(String),
}

#[derive(Debug, Default)]
struct Parser {
    parsed: ParsedMigration,
    direction: Option<Direction>,
    buffer: String,
    /// True once the buffer holds something other than comments and
    /// whitespace. Only such buffers become statements.
    has_content: bool,
    quote: QuoteState,
    /// Line number of an open `StatementBegin`, if any.
    statement_block: Option<usize>,
}

impl Parser {
    fn line(&mut self, number: usize, line: &str) -> Result<(), ParseError> {
        let trimmed = line.trim();

        if self.statement_block.is_some() {
            // Free-form block: semicolons are literal, only directives are
            // recognized.
            if let Some(rest) = directive_rest(trimmed) {
                return self.directive(rest, number);
            }
            self.push_line(line);
            return Ok(());
        }

        if self.quote == QuoteState::None {
            if let Some(rest) = directive_rest(trimmed) {
                return self.directive(rest, number);
            }
            if trimmed.starts_with("--") {
                // Plain comments stick to the statement they precede but
                // never terminate it. Before the first direction directive
                // they are header material and dropped.
                if self.direction.is_some() {
                    self.push_line(line);
                }
                return Ok(());
            }
            if trimmed.is_empty() {
                if !self.buffer.is_empty() {
                    self.push_line(line);
                }
                return Ok(());
            }
            if self.direction.is_none() {
                return Err(ParseError::StatementBeforeDirection { line: number });
            }
        }

        self.scan(line);
        Ok(())
    }

    fn directive(&mut self, rest: &str, line: usize) -> Result<(), ParseError> {
        let mut tokens = rest.split_whitespace();
        let command = tokens.next().unwrap_or("");
        match command {
            "Up" | "Down" => {
                if let Some(opened) = self.statement_block {
                    return Err(ParseError::UnclosedStatementBlock { opened });
                }
                self.flush_pending();
                self.direction = Some(if command == "Up" {
                    Direction::Up
                } else {
                    Direction::Down
                });
                for option in tokens {
                    if option.eq_ignore_ascii_case("notransaction") {
                        self.disable_transaction();
                    } else {
                        return Err(ParseError::UnknownDirective {
                            line,
                            directive: format!("{command} {option}"),
                        });
                    }
                }
            }
            "StatementBegin" => {
                if self.direction.is_none() {
                    return Err(ParseError::StatementBeforeDirection { line });
                }
                if let Some(opened) = self.statement_block {
                    return Err(ParseError::NestedStatementBlock { line, opened });
                }
                self.statement_block = Some(line);
            }
            "StatementEnd" => {
                if self.statement_block.take().is_none() {
                    return Err(ParseError::UnexpectedStatementEnd { line });
                }
                self.finish_statement();
            }
            "NoTransaction" => {
                if self.direction.is_none() {
                    return Err(ParseError::NoTransactionBeforeDirection { line });
                }
                self.disable_transaction();
            }
            _ => {
                return Err(ParseError::UnknownDirective {
                    line,
                    directive: rest.trim().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Scan one line of SQL, tracking quote state and splitting at
    /// terminators. Quote state persists across lines, so a string literal
    /// opened on one line keeps semicolons on later lines literal.
    fn scan(&mut self, line: &str) {
        let bytes = line.as_bytes();
        let mut segment_start = 0;
        let mut i = 0;
        while i < bytes.len() {
            let c = bytes[i];
            match &self.quote {
                QuoteState::None => match c {
                    b'\'' => self.quote = QuoteState::Single,
                    b'"' => self.quote = QuoteState::Double,
                    b'$' => {
                        if let Some(end) = dollar_tag_end(bytes, i) {
                            self.quote = QuoteState::Dollar(line[i + 1..end].to_string());
                            i = end;
                        }
                    }
                    b';' => {
                        self.buffer.push_str(&line[segment_start..=i]);
                        self.has_content = true;
                        self.finish_statement();
                        segment_start = i + 1;
                    }
                    _ => {}
                },
                QuoteState::Single => {
                    if c == b'\'' {
                        // '' is an escaped quote, not a terminator
                        if bytes.get(i + 1) == Some(&b'\'') {
                            i += 1;
                        } else {
                            self.quote = QuoteState::None;
                        }
                    }
                }
                QuoteState::Double => {
                    if c == b'"' {
                        if bytes.get(i + 1) == Some(&b'"') {
                            i += 1;
                        } else {
                            self.quote = QuoteState::None;
                        }
                    }
                }
                QuoteState::Dollar(tag) => {
                    let closes = c == b'$'
                        && line[i + 1..].starts_with(tag.as_str())
                        && bytes.get(i + 1 + tag.len()) == Some(&b'$');
                    if closes {
                        i += tag.len() + 1;
                        self.quote = QuoteState::None;
                    }
                }
            }
            i += 1;
        }

        let rest = &line[segment_start..];
        if !rest.trim().is_empty() {
            self.has_content = true;
        }
        self.buffer.push_str(rest);
        self.buffer.push('\n');
    }

    fn push_line(&mut self, line: &str) {
        let trimmed = line.trim();
        if !trimmed.is_empty() && !trimmed.starts_with("--") {
            self.has_content = true;
        }
        self.buffer.push_str(line);
        self.buffer.push('\n');
    }

    /// Close out the buffered statement and file it under the current
    /// direction.
    fn finish_statement(&mut self) {
        let statement = self.buffer.trim();
        // a bare terminator is not a statement
        if !statement.trim_end_matches(';').trim().is_empty() {
            match self.direction {
                Some(Direction::Up) => self.parsed.up_statements.push(statement.to_string()),
                Some(Direction::Down) => self.parsed.down_statements.push(statement.to_string()),
                None => {}
            }
        }
        self.buffer.clear();
        self.has_content = false;
    }

    /// Flush a trailing statement that is missing its terminator; buffers
    /// holding only comments or whitespace are dropped.
    fn flush_pending(&mut self) {
        if self.has_content {
            self.finish_statement();
        } else {
            self.buffer.clear();
        }
    }

    fn disable_transaction(&mut self) {
        match self.direction {
            Some(Direction::Up) => self.parsed.disable_transaction_up = true,
            Some(Direction::Down) => self.parsed.disable_transaction_down = true,
            None => {}
        }
    }

    fn finish(mut self) -> Result<ParsedMigration, ParseError> {
        if let Some(opened) = self.statement_block {
            return Err(ParseError::UnclosedStatementBlock { opened });
        }
        if self.quote != QuoteState::None {
            return Err(ParseError::UnterminatedQuote);
        }
        self.flush_pending();
        Ok(self.parsed)
    }
}

/// `-- +migrate <rest>` detection on a trimmed line.
fn directive_rest(trimmed: &str) -> Option<&str> {
    let rest = trimmed.strip_prefix(DIRECTIVE_PREFIX)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}

/// If `bytes[at]` opens a dollar-quote delimiter (`$`, an optional
/// identifier tag, `$`), return the index of the closing `$`.
fn dollar_tag_end(bytes: &[u8], at: usize) -> Option<usize> {
    let mut i = at + 1;
    while let Some(&c) = bytes.get(i) {
        if c == b'$' {
            return Some(i);
        }
        if !(c.is_ascii_alphanumeric() || c == b'_') {
            return None;
        }
        i += 1;
    }
    None
}
