//! DTD schema parsing and validation
//!
//! Supports the declaration subset needed to validate document structure:
//! `<!ELEMENT>` content models (`EMPTY`, `ANY`, mixed, sequence and choice
//! groups with `?`/`*`/`+`) and `<!ATTLIST>` attribute declarations.
//! `<!ENTITY>` and `<!NOTATION>` declarations are skipped.

use indexmap::IndexMap;

use crate::cursor::Cursor;
use crate::error::{Diagnostic, Error, Result};
use crate::model::{Content, Document, Element};

/// Declared content of an element
#[derive(Clone, Debug, PartialEq)]
pub enum ContentModel {
    Empty,
    Any,
    /// `(#PCDATA)` or `(#PCDATA | a | b)*`: text plus the listed elements
    Mixed(Vec<String>),
    /// Element content: children must match the particle
    Children(Particle),
}

/// One node of a content-model expression
#[derive(Clone, Debug, PartialEq)]
pub enum Particle {
    Name(String),
    Seq(Vec<Particle>),
    Choice(Vec<Particle>),
    Optional(Box<Particle>),
    Star(Box<Particle>),
    Plus(Box<Particle>),
}

/// Default constraint of a declared attribute
#[derive(Clone, Debug, PartialEq)]
pub enum AttrDefault {
    Required,
    Implied,
    Fixed(String),
    Default(String),
}

/// A single `<!ATTLIST>` attribute declaration
#[derive(Clone, Debug, PartialEq)]
pub struct AttrDecl {
    pub name: String,
    pub default: AttrDefault,
}

/// A parsed DTD
#[derive(Clone, Debug, Default)]
pub struct DtdSchema {
    elements: IndexMap<String, ContentModel>,
    attlists: IndexMap<String, Vec<AttrDecl>>,
}

impl DtdSchema {
    /// Parse a DTD from its source text. Fails with `InvalidConfig` when
    /// the schema itself cannot be parsed.
    pub fn parse(source: &str) -> Result<Self> {
        DtdParser::new(source.as_bytes()).parse()
    }

    /// Content model declared for an element, if any
    pub fn element(&self, name: &str) -> Option<&ContentModel> {
        self.elements.get(name)
    }

    /// Validate a document, collecting every violation.
    pub fn check(&self, doc: &Document) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        self.check_element(&doc.root, &mut diagnostics);
        diagnostics
    }

    fn check_element(&self, element: &Element, diagnostics: &mut Vec<Diagnostic>) {
        match self.elements.get(&element.name) {
            None => {
                diagnostics.push(Diagnostic::error(
                    element.pos,
                    format!("element '{}' is not declared", element.name),
                ));
            }
            Some(model) => self.check_content(element, model, diagnostics),
        }

        if let Some(decls) = self.attlists.get(&element.name) {
            for decl in decls {
                match (&decl.default, element.attr(&decl.name)) {
                    (AttrDefault::Required, None) => {
                        diagnostics.push(Diagnostic::error(
                            element.pos,
                            format!(
                                "element '{}' is missing required attribute '{}'",
                                element.name, decl.name
                            ),
                        ));
                    }
                    (AttrDefault::Fixed(fixed), Some(actual)) if actual != fixed => {
                        diagnostics.push(Diagnostic::error(
                            element.pos,
                            format!(
                                "attribute '{}' on '{}' must have fixed value '{}'",
                                decl.name, element.name, fixed
                            ),
                        ));
                    }
                    _ => {}
                }
            }
        }

        for child in element.elements() {
            self.check_element(child, diagnostics);
        }
    }

    fn check_content(
        &self,
        element: &Element,
        model: &ContentModel,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let has_text = element
            .children
            .iter()
            .any(|c| matches!(c, Content::Text(t) if !t.trim().is_empty()));

        match model {
            ContentModel::Any => {}
            ContentModel::Empty => {
                if has_text || element.elements().next().is_some() {
                    diagnostics.push(Diagnostic::error(
                        element.pos,
                        format!("element '{}' is declared EMPTY but has content", element.name),
                    ));
                }
            }
            ContentModel::Mixed(allowed) => {
                for child in element.elements() {
                    if !allowed.contains(&child.name) {
                        diagnostics.push(Diagnostic::error(
                            child.pos,
                            format!(
                                "element '{}' is not allowed inside '{}'",
                                child.name, element.name
                            ),
                        ));
                    }
                }
            }
            ContentModel::Children(particle) => {
                if has_text {
                    diagnostics.push(Diagnostic::error(
                        element.pos,
                        format!(
                            "element '{}' has element content but contains text",
                            element.name
                        ),
                    ));
                }
                let names: Vec<&str> = element.elements().map(|e| e.name.as_str()).collect();
                if !particle_matches(particle, &names) {
                    diagnostics.push(Diagnostic::error(
                        element.pos,
                        format!(
                            "children of '{}' do not match its content model",
                            element.name
                        ),
                    ));
                }
            }
        }
    }
}

/// True when the child-name sequence is accepted by the particle.
fn particle_matches(particle: &Particle, names: &[&str]) -> bool {
    advance(particle, names, 0).contains(&names.len())
}

/// All positions the particle can reach when matching from `start`.
/// Content models in practice are tiny, so the full position set stays
/// small and no automaton construction is warranted.
fn advance(particle: &Particle, names: &[&str], start: usize) -> Vec<usize> {
    match particle {
        Particle::Name(name) => match names.get(start) {
            Some(n) if *n == name => vec![start + 1],
            _ => Vec::new(),
        },
        Particle::Seq(items) => {
            let mut positions = vec![start];
            for item in items {
                let mut next = Vec::new();
                for &pos in &positions {
                    for end in advance(item, names, pos) {
                        if !next.contains(&end) {
                            next.push(end);
                        }
                    }
                }
                positions = next;
                if positions.is_empty() {
                    break;
                }
            }
            positions
        }
        Particle::Choice(items) => {
            let mut positions = Vec::new();
            for item in items {
                for end in advance(item, names, start) {
                    if !positions.contains(&end) {
                        positions.push(end);
                    }
                }
            }
            positions
        }
        Particle::Optional(inner) => {
            let mut positions = vec![start];
            for end in advance(inner, names, start) {
                if !positions.contains(&end) {
                    positions.push(end);
                }
            }
            positions
        }
        Particle::Star(inner) => closure(inner, names, start),
        Particle::Plus(inner) => {
            let mut positions = Vec::new();
            for end in advance(inner, names, start) {
                for reach in closure(inner, names, end) {
                    if !positions.contains(&reach) {
                        positions.push(reach);
                    }
                }
            }
            positions
        }
    }
}

/// Positions reachable by zero or more repetitions of the particle.
fn closure(particle: &Particle, names: &[&str], start: usize) -> Vec<usize> {
    let mut positions = vec![start];
    let mut frontier = vec![start];
    while let Some(pos) = frontier.pop() {
        for end in advance(particle, names, pos) {
            if end > pos && !positions.contains(&end) {
                positions.push(end);
                frontier.push(end);
            }
        }
    }
    positions
}

struct DtdParser<'a> {
    cursor: Cursor<'a>,
}

impl<'a> DtdParser<'a> {
    const fn new(input: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(input),
        }
    }

    fn parse(mut self) -> Result<DtdSchema> {
        let mut schema = DtdSchema::default();

        loop {
            self.skip_misc()?;
            if self.cursor.is_eof() {
                return Ok(schema);
            }

            if !self.cursor.consume(b'<') || !self.cursor.consume(b'!') {
                return Err(self.error_here("expected markup declaration"));
            }
            let keyword = self.parse_name()?;
            match keyword.as_str() {
                "ELEMENT" => {
                    let (name, model) = self.parse_element_decl()?;
                    schema.elements.insert(name, model);
                }
                "ATTLIST" => {
                    let (name, decls) = self.parse_attlist_decl()?;
                    schema.attlists.entry(name).or_default().extend(decls);
                }
                "ENTITY" | "NOTATION" => self.skip_declaration()?,
                other => {
                    return Err(self.error_here(format!("unsupported declaration: <!{other}")));
                }
            }
        }
    }

    fn parse_element_decl(&mut self) -> Result<(String, ContentModel)> {
        self.cursor.skip_whitespace();
        let name = self.parse_name()?;
        self.cursor.skip_whitespace();

        let model = if self.cursor.current() == Some(b'(') {
            self.parse_group()?
        } else {
            match self.parse_name()?.as_str() {
                "EMPTY" => ContentModel::Empty,
                "ANY" => ContentModel::Any,
                other => {
                    return Err(self.error_here(format!("invalid content model: {other}")));
                }
            }
        };

        self.cursor.skip_whitespace();
        self.expect(b'>')?;
        Ok((name, model))
    }

    /// Parse a parenthesized content model, either mixed or element content.
    fn parse_group(&mut self) -> Result<ContentModel> {
        self.expect(b'(')?;
        self.cursor.skip_whitespace();

        if self.cursor.peek_bytes(7) == Some(b"#PCDATA") {
            self.cursor.advance_by(7);
            let mut allowed = Vec::new();
            loop {
                self.cursor.skip_whitespace();
                if self.cursor.consume(b')') {
                    break;
                }
                self.expect(b'|')?;
                self.cursor.skip_whitespace();
                allowed.push(self.parse_name()?);
            }
            // trailing '*' is required when alternatives are present
            if self.cursor.current() == Some(b'*') {
                self.cursor.advance();
            } else if !allowed.is_empty() {
                return Err(self.error_here("mixed content model must end with ')*'"));
            }
            return Ok(ContentModel::Mixed(allowed));
        }

        let particle = self.parse_particle_group()?;
        Ok(ContentModel::Children(particle))
    }

    /// Parse the body of a group whose '(' was already consumed.
    fn parse_particle_group(&mut self) -> Result<Particle> {
        let mut items = vec![self.parse_particle_item()?];
        let mut separator = None;

        loop {
            self.cursor.skip_whitespace();
            match self.cursor.current() {
                Some(b')') => {
                    self.cursor.advance();
                    break;
                }
                Some(sep @ (b',' | b'|')) => {
                    if separator.is_some_and(|existing| existing != sep) {
                        return Err(self.error_here("cannot mix ',' and '|' in one group"));
                    }
                    separator = Some(sep);
                    self.cursor.advance();
                    self.cursor.skip_whitespace();
                    items.push(self.parse_particle_item()?);
                }
                _ => return Err(self.error_here("expected ',', '|' or ')' in content model")),
            }
        }

        let group = if separator == Some(b'|') {
            Particle::Choice(items)
        } else if items.len() == 1 {
            items.remove(0)
        } else {
            Particle::Seq(items)
        };
        Ok(self.apply_occurrence(group))
    }

    fn parse_particle_item(&mut self) -> Result<Particle> {
        if self.cursor.consume(b'(') {
            self.cursor.skip_whitespace();
            self.parse_particle_group()
        } else {
            let name = self.parse_name()?;
            Ok(self.apply_occurrence(Particle::Name(name)))
        }
    }

    fn apply_occurrence(&mut self, particle: Particle) -> Particle {
        match self.cursor.current() {
            Some(b'?') => {
                self.cursor.advance();
                Particle::Optional(Box::new(particle))
            }
            Some(b'*') => {
                self.cursor.advance();
                Particle::Star(Box::new(particle))
            }
            Some(b'+') => {
                self.cursor.advance();
                Particle::Plus(Box::new(particle))
            }
            _ => particle,
        }
    }

    fn parse_attlist_decl(&mut self) -> Result<(String, Vec<AttrDecl>)> {
        self.cursor.skip_whitespace();
        let element = self.parse_name()?;
        let mut decls = Vec::new();

        loop {
            self.cursor.skip_whitespace();
            if self.cursor.consume(b'>') {
                break;
            }

            let name = self.parse_name()?;
            self.cursor.skip_whitespace();
            self.skip_attr_type()?;
            self.cursor.skip_whitespace();
            let default = self.parse_attr_default()?;
            decls.push(AttrDecl { name, default });
        }

        Ok((element, decls))
    }

    /// Skip an attribute type: a keyword like CDATA/ID/NMTOKEN or an
    /// enumeration group. The type itself is not enforced.
    fn skip_attr_type(&mut self) -> Result<()> {
        if self.cursor.consume(b'(') {
            while let Some(b) = self.cursor.current() {
                self.cursor.advance();
                if b == b')' {
                    return Ok(());
                }
            }
            return Err(self.error_here("unterminated enumeration"));
        }

        let keyword = self.parse_name()?;
        if keyword == "NOTATION" {
            self.cursor.skip_whitespace();
            self.expect(b'(')?;
            while let Some(b) = self.cursor.current() {
                self.cursor.advance();
                if b == b')' {
                    return Ok(());
                }
            }
            return Err(self.error_here("unterminated notation group"));
        }
        Ok(())
    }

    fn parse_attr_default(&mut self) -> Result<AttrDefault> {
        if self.cursor.consume(b'#') {
            let keyword = self.parse_name()?;
            return match keyword.as_str() {
                "REQUIRED" => Ok(AttrDefault::Required),
                "IMPLIED" => Ok(AttrDefault::Implied),
                "FIXED" => {
                    self.cursor.skip_whitespace();
                    Ok(AttrDefault::Fixed(self.parse_quoted()?))
                }
                other => Err(self.error_here(format!("invalid default declaration: #{other}"))),
            };
        }
        Ok(AttrDefault::Default(self.parse_quoted()?))
    }

    fn parse_quoted(&mut self) -> Result<String> {
        let quote = match self.cursor.current() {
            Some(b @ (b'"' | b'\'')) => b,
            _ => return Err(self.error_here("expected quoted value")),
        };
        self.cursor.advance();
        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b == quote {
                let raw = self.cursor.slice_from(start);
                self.cursor.advance();
                return String::from_utf8(raw.to_vec())
                    .map_err(|_| self.error_here("invalid utf-8 in value"));
            }
            self.cursor.advance();
        }
        Err(self.error_here("unterminated quoted value"))
    }

    fn parse_name(&mut self) -> Result<String> {
        let start = self.cursor.pos();
        let Some(first) = self.cursor.current() else {
            return Err(self.error_here("expected name"));
        };
        if !is_name_start(first) {
            return Err(self.error_here("expected name"));
        }
        self.cursor.advance();
        while let Some(b) = self.cursor.current() {
            if is_name_char(b) {
                self.cursor.advance();
            } else {
                break;
            }
        }
        String::from_utf8(self.cursor.slice_from(start).to_vec())
            .map_err(|_| self.error_here("invalid utf-8 in name"))
    }

    fn skip_misc(&mut self) -> Result<()> {
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.peek_bytes(4) == Some(b"<!--") {
                self.cursor.advance_by(4);
                self.skip_until(b"-->")?;
            } else if self.cursor.current() == Some(b'<') && self.cursor.peek(1) == Some(b'?') {
                self.cursor.advance_by(2);
                self.skip_until(b"?>")?;
            } else {
                return Ok(());
            }
        }
    }

    fn skip_declaration(&mut self) -> Result<()> {
        // quoted literals may contain '>'
        while let Some(b) = self.cursor.current() {
            match b {
                b'>' => {
                    self.cursor.advance();
                    return Ok(());
                }
                b'"' | b'\'' => {
                    self.parse_quoted()?;
                }
                _ => self.cursor.advance(),
            }
        }
        Err(self.error_here("unterminated declaration"))
    }

    fn skip_until(&mut self, pattern: &[u8]) -> Result<()> {
        while self.cursor.current().is_some() {
            if self.cursor.peek_bytes(pattern.len()) == Some(pattern) {
                self.cursor.advance_by(pattern.len());
                return Ok(());
            }
            self.cursor.advance();
        }
        Err(self.error_here("unterminated markup"))
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        if self.cursor.consume(expected) {
            Ok(())
        } else {
            Err(self.error_here(format!("expected '{}'", char::from(expected))))
        }
    }

    fn error_here(&self, message: impl Into<String>) -> Error {
        let pos = self.cursor.position();
        Error::invalid_config(format!("dtd error at {}: {}", pos, message.into()))
    }
}

fn is_name_start(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':')
}

fn is_name_char(b: u8) -> bool {
    is_name_start(b) || matches!(b, b'0'..=b'9' | b'-' | b'.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    const SCHEMA: &str = "\
        <!ELEMENT root (value)>\n\
        <!ELEMENT value (#PCDATA)>\n\
        <!ATTLIST value unit CDATA #REQUIRED>\n";

    fn parse_doc(input: &str) -> Document {
        Parser::new(input.as_bytes()).parse().unwrap()
    }

    #[test]
    fn test_parse_declarations() {
        let schema = DtdSchema::parse(SCHEMA).unwrap();
        assert_eq!(
            schema.element("root"),
            Some(&ContentModel::Children(Particle::Name("value".to_string())))
        );
        assert_eq!(schema.element("value"), Some(&ContentModel::Mixed(Vec::new())));
    }

    #[test]
    fn test_valid_document() {
        let schema = DtdSchema::parse(SCHEMA).unwrap();
        let doc = parse_doc("<root><value unit=\"m\">1</value></root>");
        assert!(schema.check(&doc).is_empty());
    }

    #[test]
    fn test_undeclared_element() {
        let schema = DtdSchema::parse(SCHEMA).unwrap();
        let doc = parse_doc("<root><other/></root>");
        let diagnostics = schema.check(&doc);
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("'other' is not declared")));
    }

    #[test]
    fn test_missing_required_attribute() {
        let schema = DtdSchema::parse(SCHEMA).unwrap();
        let doc = parse_doc("<root><value>1</value></root>");
        let diagnostics = schema.check(&doc);
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("missing required attribute 'unit'")));
    }

    #[test]
    fn test_content_model_violation() {
        let schema = DtdSchema::parse(SCHEMA).unwrap();
        let doc = parse_doc("<root/>");
        let diagnostics = schema.check(&doc);
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("do not match its content model")));
    }

    #[test]
    fn test_occurrence_operators() {
        let schema =
            DtdSchema::parse("<!ELEMENT list (item+, note?)>\n<!ELEMENT item (#PCDATA)>\n<!ELEMENT note (#PCDATA)>")
                .unwrap();

        let ok = parse_doc("<list><item>a</item><item>b</item><note>n</note></list>");
        assert!(schema.check(&ok).is_empty());

        let no_items = parse_doc("<list><note>n</note></list>");
        assert!(!schema.check(&no_items).is_empty());
    }

    #[test]
    fn test_choice_group() {
        let schema =
            DtdSchema::parse("<!ELEMENT pick (a | b)>\n<!ELEMENT a EMPTY>\n<!ELEMENT b EMPTY>")
                .unwrap();
        assert!(schema.check(&parse_doc("<pick><a/></pick>")).is_empty());
        assert!(schema.check(&parse_doc("<pick><b/></pick>")).is_empty());
        assert!(!schema.check(&parse_doc("<pick><a/><b/></pick>")).is_empty());
    }

    #[test]
    fn test_empty_element_with_content() {
        let schema = DtdSchema::parse("<!ELEMENT hr EMPTY>").unwrap();
        let diagnostics = schema.check(&parse_doc("<hr>text</hr>"));
        assert!(diagnostics.iter().any(|d| d.message.contains("EMPTY")));
    }

    #[test]
    fn test_fixed_attribute_value() {
        let schema =
            DtdSchema::parse("<!ELEMENT v (#PCDATA)>\n<!ATTLIST v version CDATA #FIXED \"1.0\">")
                .unwrap();
        assert!(schema.check(&parse_doc("<v version=\"1.0\">x</v>")).is_empty());
        assert!(!schema.check(&parse_doc("<v version=\"2.0\">x</v>")).is_empty());
    }

    #[test]
    fn test_malformed_schema_is_config_error() {
        let err = DtdSchema::parse("<!ELEMENT root").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_entity_declarations_skipped() {
        let schema = DtdSchema::parse(
            "<!ENTITY copy \"&#169;\">\n<!ELEMENT root ANY>\n",
        )
        .unwrap();
        assert_eq!(schema.element("root"), Some(&ContentModel::Any));
    }
}
