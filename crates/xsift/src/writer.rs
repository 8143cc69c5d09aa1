//! XML serialization

use crate::model::{Content, Document, Element};

/// Serialize a document to XML text
pub fn write(doc: &Document) -> String {
    let mut output = String::new();
    write_element(&doc.root, &mut output);
    output
}

fn write_element(element: &Element, output: &mut String) {
    output.push('<');
    output.push_str(&element.name);

    for (key, value) in element.attributes.iter() {
        output.push(' ');
        output.push_str(key);
        output.push_str("=\"");
        output.push_str(&escape_attr(value));
        output.push('"');
    }

    if element.children.is_empty() {
        output.push_str("/>");
        return;
    }

    output.push('>');
    for child in &element.children {
        match child {
            Content::Element(child) => write_element(child, output),
            Content::Text(text) => output.push_str(&escape_text(text)),
        }
    }
    output.push_str("</");
    output.push_str(&element.name);
    output.push('>');
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn roundtrip(input: &str) -> String {
        let doc = Parser::new(input.as_bytes()).parse().unwrap();
        write(&doc)
    }

    #[test]
    fn test_write_simple() {
        assert_eq!(roundtrip("<root><child>x</child></root>"), "<root><child>x</child></root>");
    }

    #[test]
    fn test_write_self_closing() {
        assert_eq!(roundtrip("<root><a/><b></b></root>"), "<root><a/><b/></root>");
    }

    #[test]
    fn test_write_escapes() {
        let doc = Parser::new(b"<root attr=\"a&quot;b\">1 &lt; 2</root>")
            .parse()
            .unwrap();
        assert_eq!(write(&doc), "<root attr=\"a&quot;b\">1 &lt; 2</root>");
    }

    #[test]
    fn test_write_preserves_attribute_order() {
        assert_eq!(roundtrip("<r b=\"2\" a=\"1\"/>"), "<r b=\"2\" a=\"1\"/>");
    }
}
