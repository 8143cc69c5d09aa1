//! XSD schema parsing and validation
//!
//! The schema document is parsed with this crate's own parser. Supported
//! constructs: top-level and named `complexType` definitions, `sequence`
//! groups with `minOccurs`/`maxOccurs`, required attributes, and the
//! simple built-ins string/integer/int/long/decimal/boolean. Schema
//! elements are matched by local name, so any prefix works.

use indexmap::IndexMap;

use crate::error::{Diagnostic, Error, Result};
use crate::model::{Content, Document, Element};
use crate::parser::Parser;

/// The XML Schema namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Built-in simple types the validator understands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimpleType {
    String,
    Integer,
    Decimal,
    Boolean,
}

impl SimpleType {
    fn from_name(name: &str) -> Option<Self> {
        match local_name(name) {
            "string" => Some(Self::String),
            "integer" | "int" | "long" => Some(Self::Integer),
            "decimal" => Some(Self::Decimal),
            "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }

    /// Check a text value, after whitespace collapse.
    fn accepts(self, value: &str) -> bool {
        let value = value.trim();
        match self {
            Self::String => true,
            Self::Integer => {
                let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
                !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
            }
            Self::Decimal => {
                let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
                let mut seen_digit = false;
                let mut seen_dot = false;
                for b in digits.bytes() {
                    match b {
                        b'0'..=b'9' => seen_digit = true,
                        b'.' if !seen_dot => seen_dot = true,
                        _ => return false,
                    }
                }
                seen_digit
            }
            Self::Boolean => matches!(value, "true" | "false" | "1" | "0"),
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
        }
    }
}

/// Upper occurrence bound of a local element
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MaxOccurs {
    Bounded(u32),
    Unbounded,
}

impl MaxOccurs {
    fn allows(self, count: u32) -> bool {
        match self {
            Self::Bounded(max) => count < max,
            Self::Unbounded => true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum ElementType {
    /// No type given: anything is accepted
    Any,
    Simple(SimpleType),
    /// Reference to a named complex type
    Named(String),
    Inline(ComplexType),
}

#[derive(Clone, Debug, PartialEq)]
struct ElementDecl {
    name: String,
    ty: ElementType,
    min_occurs: u32,
    max_occurs: MaxOccurs,
}

#[derive(Clone, Debug, PartialEq)]
struct AttributeDecl {
    name: String,
    ty: SimpleType,
    required: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct ComplexType {
    sequence: Vec<ElementDecl>,
    attributes: Vec<AttributeDecl>,
}

/// A parsed XSD
#[derive(Clone, Debug)]
pub struct XsdSchema {
    elements: IndexMap<String, ElementDecl>,
    types: IndexMap<String, ComplexType>,
}

impl XsdSchema {
    /// Parse a schema from its source text. Fails with `InvalidConfig`
    /// when the schema is not well-formed or uses unsupported constructs.
    pub fn parse(source: &str) -> Result<Self> {
        let doc = Parser::new(source.as_bytes())
            .parse()
            .map_err(|e| Error::invalid_config(format!("xsd schema is not well-formed: {e}")))?;

        if local_name(&doc.root.name) != "schema" {
            return Err(Error::invalid_config(format!(
                "expected schema root element, found '{}'",
                doc.root.name
            )));
        }

        let mut schema = Self {
            elements: IndexMap::new(),
            types: IndexMap::new(),
        };

        for child in doc.root.elements() {
            match local_name(&child.name) {
                "element" => {
                    let decl = parse_element_decl(child)?;
                    schema.elements.insert(decl.name.clone(), decl);
                }
                "complexType" => {
                    let name = required_attr(child, "name")?;
                    let ty = parse_complex_type(child)?;
                    schema.types.insert(name, ty);
                }
                "annotation" | "import" | "include" => {}
                other => {
                    return Err(Error::invalid_config(format!(
                        "unsupported schema construct: {other}"
                    )));
                }
            }
        }

        Ok(schema)
    }

    /// Validate a document, collecting every violation.
    pub fn check(&self, doc: &Document) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        match self.elements.get(&doc.root.name) {
            None => diagnostics.push(Diagnostic::error(
                doc.root.pos,
                format!("no declaration for root element '{}'", doc.root.name),
            )),
            Some(decl) => self.check_element(&doc.root, &decl.ty, &mut diagnostics),
        }

        diagnostics
    }

    fn check_element(&self, element: &Element, ty: &ElementType, diagnostics: &mut Vec<Diagnostic>) {
        match ty {
            ElementType::Any => {}
            ElementType::Simple(simple) => {
                if element.elements().next().is_some() {
                    diagnostics.push(Diagnostic::error(
                        element.pos,
                        format!(
                            "element '{}' has simple type {} but contains child elements",
                            element.name,
                            simple.name()
                        ),
                    ));
                } else if !simple.accepts(&element.text()) {
                    diagnostics.push(Diagnostic::error(
                        element.pos,
                        format!(
                            "value '{}' of element '{}' is not a valid {}",
                            element.text().trim(),
                            element.name,
                            simple.name()
                        ),
                    ));
                }
            }
            ElementType::Named(name) => match self.types.get(name) {
                Some(complex) => self.check_complex(element, complex, diagnostics),
                None => diagnostics.push(Diagnostic::error(
                    element.pos,
                    format!("unknown type '{}' for element '{}'", name, element.name),
                )),
            },
            ElementType::Inline(complex) => self.check_complex(element, complex, diagnostics),
        }
    }

    fn check_complex(
        &self,
        element: &Element,
        complex: &ComplexType,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        for decl in &complex.attributes {
            match element.attr(&decl.name) {
                None if decl.required => diagnostics.push(Diagnostic::error(
                    element.pos,
                    format!(
                        "element '{}' is missing required attribute '{}'",
                        element.name, decl.name
                    ),
                )),
                Some(value) if !decl.ty.accepts(value) => diagnostics.push(Diagnostic::error(
                    element.pos,
                    format!(
                        "attribute '{}' of element '{}' is not a valid {}",
                        decl.name,
                        element.name,
                        decl.ty.name()
                    ),
                )),
                _ => {}
            }
        }

        let has_text = element
            .children
            .iter()
            .any(|c| matches!(c, Content::Text(t) if !t.trim().is_empty()));
        if has_text {
            diagnostics.push(Diagnostic::error(
                element.pos,
                format!("element '{}' has complex content but contains text", element.name),
            ));
        }

        let children: Vec<&Element> = element.elements().collect();
        let mut index = 0;
        for decl in &complex.sequence {
            let mut count: u32 = 0;
            while let Some(child) = children.get(index) {
                if child.name != decl.name || !decl.max_occurs.allows(count) {
                    break;
                }
                self.check_element(child, &decl.ty, diagnostics);
                count += 1;
                index += 1;
            }
            if count < decl.min_occurs {
                diagnostics.push(Diagnostic::error(
                    element.pos,
                    format!(
                        "expected at least {} occurrence(s) of '{}' in '{}', found {}",
                        decl.min_occurs, decl.name, element.name, count
                    ),
                ));
            }
        }
        for child in children.iter().skip(index) {
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

fn parse_element_decl(element: &Element) -> Result<ElementDecl> {
    let name = required_attr(element, "name")?;

    let min_occurs = match element.attr("minOccurs") {
        Some(value) => value
            .parse()
            .map_err(|_| Error::invalid_config(format!("invalid minOccurs on '{name}'")))?,
        None => 1,
    };
    let max_occurs = match element.attr("maxOccurs") {
        Some("unbounded") => MaxOccurs::Unbounded,
        Some(value) => MaxOccurs::Bounded(
            value
                .parse()
                .map_err(|_| Error::invalid_config(format!("invalid maxOccurs on '{name}'")))?,
        ),
        None => MaxOccurs::Bounded(1),
    };

    let ty = if let Some(type_name) = element.attr("type") {
        match SimpleType::from_name(type_name) {
            Some(simple) => ElementType::Simple(simple),
            None => ElementType::Named(local_name(type_name).to_string()),
        }
    } else if let Some(inline) = element
        .elements()
        .find(|child| local_name(&child.name) == "complexType")
    {
        ElementType::Inline(parse_complex_type(inline)?)
    } else {
        ElementType::Any
    };

    Ok(ElementDecl {
        name,
        ty,
        min_occurs,
        max_occurs,
    })
}

fn parse_complex_type(element: &Element) -> Result<ComplexType> {
    let mut complex = ComplexType::default();

    for child in element.elements() {
        match local_name(&child.name) {
            "sequence" => {
                for item in child.elements() {
                    match local_name(&item.name) {
                        "element" => complex.sequence.push(parse_element_decl(item)?),
                        "annotation" => {}
                        other => {
                            return Err(Error::invalid_config(format!(
                                "unsupported construct in sequence: {other}"
                            )));
                        }
                    }
                }
            }
            "attribute" => {
                let name = required_attr(child, "name")?;
                let ty = match child.attr("type") {
                    Some(type_name) => SimpleType::from_name(type_name).ok_or_else(|| {
                        Error::invalid_config(format!(
                            "unsupported attribute type '{type_name}' on '{name}'"
                        ))
                    })?,
                    None => SimpleType::String,
                };
                complex.attributes.push(AttributeDecl {
                    name,
                    ty,
                    required: child.attr("use") == Some("required"),
                });
            }
            "annotation" => {}
            other => {
                return Err(Error::invalid_config(format!(
                    "unsupported construct in complexType: {other}"
                )));
            }
        }
    }

    Ok(complex)
}

fn required_attr(element: &Element, name: &str) -> Result<String> {
    element
        .attr(name)
        .map(str::to_string)
        .ok_or_else(|| {
            Error::invalid_config(format!(
                "schema element '{}' is missing attribute '{}'",
                element.name, name
            ))
        })
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}
