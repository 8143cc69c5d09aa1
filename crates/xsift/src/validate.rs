//! Validation descriptor and dispatch

use std::io::Read;

use tracing::debug;

use crate::dtd::DtdSchema;
use crate::error::{Error, Result};
use crate::model::Document;
use crate::xsd::XsdSchema;

/// Which schema formalism is enforced during parsing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationKind {
    None,
    Dtd,
    Xsd,
}

/// Validation configuration: either nothing, or a schema parsed once at
/// construction time. Parse calls never re-read the schema source.
#[derive(Clone, Debug, Default)]
pub enum Validation {
    #[default]
    None,
    Dtd(DtdSchema),
    Xsd(XsdSchema),
}

impl Validation {
    /// Build a DTD validation from schema source text.
    pub fn dtd(source: &str) -> Result<Self> {
        Ok(Self::Dtd(DtdSchema::parse(source)?))
    }

    /// Build an XSD validation from schema source text.
    pub fn xsd(source: &str) -> Result<Self> {
        Ok(Self::Xsd(XsdSchema::parse(source)?))
    }

    /// Build a DTD validation by draining a schema stream. The stream is
    /// read exactly once, here; parse calls never re-read it. Read
    /// failures surface as [`Error::Io`](crate::Error::Io).
    pub fn dtd_from_reader(reader: impl Read) -> Result<Self> {
        Self::dtd(&read_schema(reader)?)
    }

    /// Build an XSD validation by draining a schema stream; see
    /// [`Validation::dtd_from_reader`].
    pub fn xsd_from_reader(reader: impl Read) -> Result<Self> {
        Self::xsd(&read_schema(reader)?)
    }

    /// Build from a kind and an optional schema source. The source must
    /// be present exactly when the kind is not `None`; a mismatch is an
    /// `InvalidConfig` error raised here, before any document is parsed.
    pub fn from_kind(kind: ValidationKind, source: Option<&str>) -> Result<Self> {
        match (kind, source) {
            (ValidationKind::None, None) => Ok(Self::None),
            (ValidationKind::None, Some(_)) => Err(Error::invalid_config(
                "schema source supplied but validation kind is none",
            )),
            (ValidationKind::Dtd, Some(source)) => Self::dtd(source),
            (ValidationKind::Xsd, Some(source)) => Self::xsd(source),
            (ValidationKind::Dtd | ValidationKind::Xsd, None) => Err(Error::invalid_config(
                "validation kind requires a schema source",
            )),
        }
    }

    /// The kind of this validation
    pub const fn kind(&self) -> ValidationKind {
        match self {
            Self::None => ValidationKind::None,
            Self::Dtd(_) => ValidationKind::Dtd,
            Self::Xsd(_) => ValidationKind::Xsd,
        }
    }

    /// Check a parsed document against the configured schema. All
    /// violations are collected into a single `Validation` error.
    pub fn check(&self, doc: &Document) -> Result<()> {
        let diagnostics = match self {
            Self::None => return Ok(()),
            Self::Dtd(schema) => schema.check(doc),
            Self::Xsd(schema) => schema.check(doc),
        };

        if diagnostics.is_empty() {
            Ok(())
        } else {
            debug!(count = diagnostics.len(), "validation failed");
            Err(Error::validation(diagnostics))
        }
    }
}

fn read_schema(mut reader: impl Read) -> Result<String> {
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|_| Error::invalid_config("schema source is not valid utf-8"))
}
