//! xsift - XML parsing with schema validation and entry filtering
//!
//! # Quick Start
//!
//! ```
//! use xsift::{from_str, FilterSpec};
//! # fn main() -> Result<(), xsift::Error> {
//! let doc = from_str(r#"<root><item kind="a">x</item><item kind="b">y</item></root>"#)?;
//! let spec = FilterSpec::new("item")?.with_attr("kind", "a");
//! let filtered = xsift::filter(&doc, &spec);
//! assert_eq!(filtered.root.elements().count(), 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

use std::io::Read;

use tracing::{debug, instrument};

pub mod error;
pub use error::{Diagnostic, Error, Pos, Result, Severity, Span};

pub mod cursor;
pub use cursor::Cursor;

pub mod model;
pub use model::{Content, Document, Element};

pub mod parser;
pub use parser::Parser;

pub mod writer;
pub use writer::write;

pub mod dtd;
pub use dtd::DtdSchema;

pub mod xsd;
pub use xsd::XsdSchema;

pub mod validate;
pub use validate::{Validation, ValidationKind};

pub mod filter;
pub use filter::{filter, FilterSpec};

/// Parse XML from string, without validation
pub fn from_str(s: &str) -> Result<Document> {
    let mut parser = Parser::new(s.as_bytes());
    parser.parse()
}

/// Parse XML from bytes, without validation
pub fn from_bytes(bytes: &[u8]) -> Result<Document> {
    let mut parser = Parser::new(bytes);
    parser.parse()
}

/// Drain a reader and parse its contents, without validation. The reader
/// is consumed fully and dropped on every path; read failures surface as
/// [`Error::Io`].
pub fn from_reader(mut reader: impl Read) -> Result<Document> {
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;
    from_bytes(&buffer)
}

/// XML parser with a fixed validation configuration.
///
/// The configuration is immutable after construction, so one instance may
/// be reused across calls and shared between threads; each call parses an
/// independent input and returns an independent tree.
#[derive(Clone, Debug, Default)]
pub struct XmlParser {
    validation: Validation,
}

impl XmlParser {
    /// Parser with no validation
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser validating every input against the given schema
    pub const fn with_validation(validation: Validation) -> Self {
        Self { validation }
    }

    /// The configured validation
    pub const fn validation(&self) -> &Validation {
        &self.validation
    }

    /// Parse an input, then check it against the configured schema.
    /// A failed parse or validation yields no document, never a partial
    /// tree.
    #[instrument(skip_all, fields(kind = ?self.validation.kind()))]
    pub fn parse(&self, input: &str) -> Result<Document> {
        let doc = from_str(input)?;
        self.validation.check(&doc)?;
        debug!("parsed document");
        Ok(doc)
    }

    /// Parse an input from a reader; see [`from_reader`]. Only a failed
    /// read is an [`Error::Io`]; bytes that are not valid XML text fail
    /// as malformed, same as the in-memory paths.
    pub fn parse_reader(&self, mut reader: impl Read) -> Result<Document> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        let doc = from_bytes(&buffer)?;
        self.validation.check(&doc)?;
        Ok(doc)
    }

    /// Parse and validate an input, then reduce it to the entries
    /// accepted by the spec. The spec is checked before parsing begins;
    /// parser and validation failures propagate unchanged.
    #[instrument(skip_all, fields(root = spec.root_name()))]
    pub fn parse_filtered(&self, input: &str, spec: &FilterSpec) -> Result<Document> {
        let doc = self.parse(input)?;
        Ok(filter(&doc, spec))
    }
}
