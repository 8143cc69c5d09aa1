//! Error types for xsift

use std::fmt;
use thiserror::Error;

/// Position in source text
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pos {
    pub offset: usize,
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

impl Pos {
    pub const fn new(offset: usize, line: u32, col: u32) -> Self {
        Self { offset, line, col }
    }
}

/// Span representing a range in source text
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub start: Pos,
    pub end: Pos,
}

impl Span {
    pub const fn new(start: Pos, end: Pos) -> Self {
        Self { start, end }
    }

    pub const fn at(pos: Pos) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    pub const fn empty() -> Self {
        Self {
            start: Pos::new(0, 0, 0),
            end: Pos::new(0, 0, 0),
        }
    }
}

/// How serious a single validator finding is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A single finding reported by DTD or XSD validation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub pos: Pos,
    pub message: String,
}

impl Diagnostic {
    pub fn error(pos: Pos, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            pos,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.severity, self.pos, self.message)
    }
}

/// Main error type for xsift
#[derive(Error, Clone, Debug, PartialEq)]
pub enum Error {
    /// A validation descriptor or filter spec was rejected before any
    /// parsing took place.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The input is not well-formed XML.
    #[error("malformed document at {}: {message}", .span.start)]
    Malformed { span: Span, message: String },

    /// The input is well-formed but violates the configured schema.
    #[error("validation failed: {}", format_diagnostics(.diagnostics))]
    Validation { diagnostics: Vec<Diagnostic> },

    /// The input stream could not be read to completion.
    #[error("io failure: {0}")]
    Io(String),
}

impl Error {
    pub fn malformed(span: Span, message: impl Into<String>) -> Self {
        Self::Malformed {
            span,
            message: message.into(),
        }
    }

    pub fn malformed_at(pos: Pos, message: impl Into<String>) -> Self {
        Self::malformed(Span::at(pos), message)
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn validation(diagnostics: Vec<Diagnostic>) -> Self {
        Self::Validation { diagnostics }
    }

    /// Diagnostics carried by a validation error, empty otherwise.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Validation { diagnostics } => diagnostics,
            _ => &[],
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(Diagnostic::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for xsift
pub type Result<T> = std::result::Result<T, Error>;
