//! XML well-formedness parser

use indexmap::IndexMap;

use crate::cursor::Cursor;
use crate::error::{Error, Pos, Result};
use crate::model::{Content, Document, Element};

/// Entity references may nest through declared values; bound the
/// substitution depth so reference cycles fail instead of looping.
const MAX_ENTITY_DEPTH: u8 = 8;

/// XML parser over a byte buffer
#[derive(Debug)]
pub struct Parser<'a> {
    cursor: Cursor<'a>,
    /// General entities declared in the DOCTYPE internal subset
    entities: IndexMap<String, String>,
}

impl<'a> Parser<'a> {
    /// Create a new XML parser
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(input),
            entities: IndexMap::new(),
        }
    }

    /// Parse an XML document
    pub fn parse(&mut self) -> Result<Document> {
        self.skip_misc()?;

        if self.cursor.current() != Some(b'<') {
            return Err(self.error_here("expected root element"));
        }
        let root = self.parse_element()?;

        self.skip_misc()?;
        if !self.cursor.is_eof() {
            return Err(self.error_here("trailing content after root element"));
        }

        Ok(Document { root })
    }

    /// Skip whitespace, comments, processing instructions and a DOCTYPE
    /// declaration between markup, stopping at the next element tag.
    fn skip_misc(&mut self) -> Result<()> {
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.current() != Some(b'<') {
                return Ok(());
            }
            match self.cursor.peek(1) {
                Some(b'?') => {
                    self.cursor.advance_by(2);
                    self.skip_until(b"?>")?;
                }
                Some(b'!') => {
                    if self.cursor.peek_bytes(4) == Some(b"<!--") {
                        self.cursor.advance_by(4);
                        self.skip_until(b"-->")?;
                    } else {
                        self.parse_doctype()?;
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn parse_element(&mut self) -> Result<Element> {
        let open_pos = self.cursor.position();
        self.expect_byte(b'<')?;

        if self.cursor.current() == Some(b'/') {
            return Err(self.error_here("unexpected closing tag"));
        }

        let name = self.parse_name()?;
        let attributes = self.parse_attributes()?;

        if self.cursor.current() == Some(b'/') {
            self.cursor.advance();
            self.expect_byte(b'>')?;
            return Ok(Element {
                name,
                attributes,
                children: Vec::new(),
                pos: open_pos,
            });
        }

        self.expect_byte(b'>')?;

        let mut children = Vec::new();
        loop {
            if self.cursor.current() == Some(b'<') && self.cursor.peek(1) == Some(b'/') {
                self.cursor.advance_by(2);
                let close_pos = self.cursor.position();
                let close_name = self.parse_name()?;
                if close_name != name {
                    return Err(Error::malformed_at(
                        close_pos,
                        format!("mismatched closing tag: expected </{name}>, found </{close_name}>"),
                    ));
                }
                self.cursor.skip_whitespace();
                self.expect_byte(b'>')?;
                break;
            }

            if self.cursor.peek_bytes(9) == Some(b"<![CDATA[") {
                self.cursor.advance_by(9);
                let text = self.take_until(b"]]>")?;
                children.push(Content::Text(text));
                continue;
            }

            if self.cursor.peek_bytes(4) == Some(b"<!--") {
                self.cursor.advance_by(4);
                self.skip_until(b"-->")?;
                continue;
            }

            if self.cursor.current() == Some(b'<') && self.cursor.peek(1) == Some(b'?') {
                self.cursor.advance_by(2);
                self.skip_until(b"?>")?;
                continue;
            }

            if self.cursor.current() == Some(b'<') {
                let child = self.parse_element()?;
                children.push(Content::Element(child));
                continue;
            }

            if self.cursor.is_eof() {
                return Err(self.error_here("unterminated element"));
            }

            if let Some(text) = self.parse_text()? {
                children.push(Content::Text(text));
            }
        }

        Ok(Element {
            name,
            attributes,
            children,
            pos: open_pos,
        })
    }

    fn parse_attributes(&mut self) -> Result<IndexMap<String, String>> {
        let mut attrs = IndexMap::new();

        loop {
            self.cursor.skip_whitespace();
            match self.cursor.current() {
                Some(b'/') | Some(b'>') => break,
                Some(_) => {}
                None => return Err(self.error_here("unexpected end of input in tag")),
            }

            let name_pos = self.cursor.position();
            let name = self.parse_name()?;
            self.cursor.skip_whitespace();
            self.expect_byte(b'=')?;
            self.cursor.skip_whitespace();
            let value = self.parse_attribute_value()?;

            if attrs.contains_key(&name) {
                return Err(Error::malformed_at(
                    name_pos,
                    format!("duplicate attribute: {name}"),
                ));
            }
            attrs.insert(name, value);
        }

        Ok(attrs)
    }

    fn parse_attribute_value(&mut self) -> Result<String> {
        let quote = match self.cursor.current() {
            Some(b'"') => b'"',
            Some(b'\'') => b'\'',
            _ => return Err(self.error_here("expected quoted attribute value")),
        };
        self.cursor.advance();

        let value_pos = self.cursor.position();
        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b == quote {
                let raw = self.cursor.slice_from(start);
                self.cursor.advance();
                let text = bytes_to_string(raw, value_pos)?;
                return decode_entities(&text, &self.entities, value_pos, 0);
            }
            self.cursor.advance();
        }

        Err(self.error_here("unterminated attribute value"))
    }

    fn parse_text(&mut self) -> Result<Option<String>> {
        let text_pos = self.cursor.position();
        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b == b'<' {
                break;
            }
            self.cursor.advance();
        }

        let raw = self.cursor.slice_from(start);
        let text = bytes_to_string(raw, text_pos)?;
        let text = decode_entities(&text, &self.entities, text_pos, 0)?;

        if text.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }

    fn parse_name(&mut self) -> Result<String> {
        let start_pos = self.cursor.position();
        let start = self.cursor.pos();

        let Some(first) = self.cursor.current() else {
            return Err(self.error_here("expected name"));
        };
        if !is_name_start(first) {
            return Err(Error::malformed_at(start_pos, "invalid name"));
        }

        self.cursor.advance();
        while let Some(b) = self.cursor.current() {
            if is_name_char(b) {
                self.cursor.advance();
            } else {
                break;
            }
        }

        bytes_to_string(self.cursor.slice_from(start), start_pos)
    }

    /// Read a `<!DOCTYPE ..>` declaration. General entities declared in
    /// the internal subset are collected for reference resolution; the
    /// other declarations are skipped and only enforced under a
    /// configured validation.
    fn parse_doctype(&mut self) -> Result<()> {
        // cursor at "<!"
        self.cursor.advance_by(2);
        while let Some(b) = self.cursor.current() {
            match b {
                b'"' | b'\'' => {
                    self.parse_quoted()?;
                }
                b'[' => {
                    self.cursor.advance();
                    self.parse_internal_subset()?;
                }
                b'>' => {
                    self.cursor.advance();
                    return Ok(());
                }
                _ => self.cursor.advance(),
            }
        }
        Err(self.error_here("unterminated doctype declaration"))
    }

    /// Walk the internal subset up to its closing `]`, collecting
    /// `<!ENTITY name "value">` declarations.
    fn parse_internal_subset(&mut self) -> Result<()> {
        loop {
            self.cursor.skip_whitespace();
            match self.cursor.current() {
                Some(b']') => {
                    self.cursor.advance();
                    return Ok(());
                }
                Some(b'<') => {
                    if self.cursor.peek_bytes(4) == Some(b"<!--") {
                        self.cursor.advance_by(4);
                        self.skip_until(b"-->")?;
                    } else if self.cursor.peek(1) == Some(b'?') {
                        self.cursor.advance_by(2);
                        self.skip_until(b"?>")?;
                    } else if self.cursor.peek_bytes(8) == Some(b"<!ENTITY") {
                        self.parse_entity_decl()?;
                    } else {
                        self.cursor.advance();
                        self.skip_declaration_tail()?;
                    }
                }
                Some(_) => self.cursor.advance(),
                None => return Err(self.error_here("unterminated internal subset")),
            }
        }
    }

    fn parse_entity_decl(&mut self) -> Result<()> {
        // cursor at "<!ENTITY"
        self.cursor.advance_by(8);
        self.cursor.skip_whitespace();

        // parameter entities cannot be referenced from content
        if self.cursor.current() == Some(b'%') {
            return self.skip_declaration_tail();
        }

        let name = self.parse_name()?;
        self.cursor.skip_whitespace();

        // an external entity (SYSTEM/PUBLIC) is not fetched and stays
        // undeclared; only an internal value is recorded
        if matches!(self.cursor.current(), Some(b'"' | b'\'')) {
            let value = self.parse_quoted()?;
            // the first declaration of an entity is binding
            self.entities.entry(name).or_insert(value);
        }

        self.skip_declaration_tail()
    }

    /// Skip to the end of a markup declaration; quoted literals may
    /// contain `>` or `]`.
    fn skip_declaration_tail(&mut self) -> Result<()> {
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

    fn parse_quoted(&mut self) -> Result<String> {
        let quote = match self.cursor.current() {
            Some(b @ (b'"' | b'\'')) => b,
            _ => return Err(self.error_here("expected quoted value")),
        };
        self.cursor.advance();
        let value_pos = self.cursor.position();
        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b == quote {
                let raw = self.cursor.slice_from(start);
                self.cursor.advance();
                return bytes_to_string(raw, value_pos);
            }
            self.cursor.advance();
        }
        Err(self.error_here("unterminated quoted value"))
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

    /// Consume bytes up to `pattern`, returning them as text.
    fn take_until(&mut self, pattern: &[u8]) -> Result<String> {
        let text_pos = self.cursor.position();
        let start = self.cursor.pos();
        while self.cursor.current().is_some() {
            if self.cursor.peek_bytes(pattern.len()) == Some(pattern) {
                let raw = self.cursor.slice_from(start);
                self.cursor.advance_by(pattern.len());
                return bytes_to_string(raw, text_pos);
            }
            self.cursor.advance();
        }
        Err(self.error_here("unterminated markup"))
    }

    fn expect_byte(&mut self, expected: u8) -> Result<()> {
        if self.cursor.consume(expected) {
            Ok(())
        } else {
            Err(self.error_here(format!("expected '{}'", char::from(expected))))
        }
    }

    fn error_here(&self, message: impl Into<String>) -> Error {
        Error::malformed_at(self.cursor.position(), message)
    }
}

fn bytes_to_string(bytes: &[u8], pos: Pos) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(|s| s.to_string())
        .map_err(|_| Error::malformed_at(pos, "invalid utf-8"))
}

fn is_name_start(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':')
}

fn is_name_char(b: u8) -> bool {
    is_name_start(b) || matches!(b, b'0'..=b'9' | b'-' | b'.')
}

/// Decode the predefined and numeric entities, plus general entities
/// declared in the internal subset. Declared values are substituted as
/// character data and may themselves contain references, up to
/// `MAX_ENTITY_DEPTH`.
fn decode_entities(
    input: &str,
    entities: &IndexMap<String, String>,
    pos: Pos,
    depth: u8,
) -> Result<String> {
    if depth > MAX_ENTITY_DEPTH {
        return Err(Error::malformed_at(pos, "entity references nested too deeply"));
    }

    let mut result = String::new();
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '&' {
            result.push(ch);
            continue;
        }

        let mut entity = String::new();
        for next in chars.by_ref() {
            if next == ';' {
                break;
            }
            entity.push(next);
        }

        let decoded = match entity.as_str() {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => decode_numeric_entity(&entity),
        };

        match decoded {
            Some(ch) => result.push(ch),
            None => match entities.get(&entity) {
                Some(value) => {
                    result.push_str(&decode_entities(value, entities, pos, depth + 1)?);
                }
                None => {
                    return Err(Error::malformed_at(pos, format!("invalid entity: &{entity};")));
                }
            },
        }
    }

    Ok(result)
}

fn decode_numeric_entity(entity: &str) -> Option<char> {
    if let Some(hex) = entity.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
    } else if let Some(dec) = entity.strip_prefix('#') {
        dec.parse::<u32>().ok().and_then(char::from_u32)
    } else {
        None
    }
}
