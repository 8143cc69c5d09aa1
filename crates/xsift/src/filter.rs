//! Attribute-based entry filtering

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::model::{Content, Document, Element};

/// Which entries survive filtering: elements named `root_name` carrying
/// every attribute in `required` with exactly the given value.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterSpec {
    root_name: String,
    required: IndexMap<String, String>,
}

impl FilterSpec {
    /// Create a filter spec. An empty entry name is rejected here, before
    /// any parsing happens.
    pub fn new(root_name: impl Into<String>) -> Result<Self> {
        let root_name = root_name.into();
        if root_name.is_empty() {
            return Err(Error::invalid_config("filter root element name is empty"));
        }
        Ok(Self {
            root_name,
            required: IndexMap::new(),
        })
    }

    /// Require an attribute to carry exactly the given value.
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.required.insert(name.into(), value.into());
        self
    }

    /// Name identifying candidate entries
    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// True when the element is a surviving entry. Comparison is exact,
    /// case-sensitive string equality; extra attributes are ignored.
    pub fn matches(&self, element: &Element) -> bool {
        element.name == self.root_name
            && self
                .required
                .iter()
                .all(|(name, value)| element.attr(name) == Some(value.as_str()))
    }
}

/// Build a new document containing only the entries accepted by the spec.
///
/// Candidates are collected in depth-first pre-order, so surviving entries
/// keep their document order. Nested candidates are evaluated
/// independently: the walk descends into matched entries too, and an
/// inner match appears both inside the outer survivor's subtree and as
/// its own entry. The result's root reuses the source root's name and
/// attributes; its children are exactly the surviving entries. Zero
/// matches yields an empty root, not an error.
pub fn filter(doc: &Document, spec: &FilterSpec) -> Document {
    let mut survivors = Vec::new();
    collect(&doc.root, spec, &mut survivors);

    Document {
        root: Element {
            name: doc.root.name.clone(),
            attributes: doc.root.attributes.clone(),
            children: survivors.into_iter().map(Content::Element).collect(),
            pos: doc.root.pos,
        },
    }
}

fn collect(element: &Element, spec: &FilterSpec, survivors: &mut Vec<Element>) {
    if spec.matches(element) {
        survivors.push(element.clone());
    }
    for child in element.elements() {
        collect(child, spec, survivors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn parse_doc(input: &str) -> Document {
        Parser::new(input.as_bytes()).parse().unwrap()
    }

    #[test]
    fn test_empty_root_name_rejected() {
        let err = FilterSpec::new("").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_matching_entry_survives() {
        let doc = parse_doc(
            "<root><item id=\"1\" kind=\"a\">x</item><item id=\"2\" kind=\"b\">y</item></root>",
        );
        let spec = FilterSpec::new("item").unwrap().with_attr("kind", "a");
        let filtered = filter(&doc, &spec);

        assert_eq!(filtered.root.name, "root");
        let entries: Vec<&Element> = filtered.root.elements().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].attr("id"), Some("1"));
        assert_eq!(entries[0].text(), "x");
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        let doc = parse_doc(
            "<root><item id=\"1\" kind=\"a\">x</item><item id=\"2\" kind=\"b\">y</item></root>",
        );
        let spec = FilterSpec::new("item").unwrap().with_attr("kind", "c");
        let filtered = filter(&doc, &spec);
        assert!(filtered.root.children.is_empty());
    }

    #[test]
    fn test_comparison_is_exact_and_case_sensitive() {
        let doc = parse_doc("<root><item kind=\"A\"/><item kind=\"a \"/><item kind=\"a\"/></root>");
        let spec = FilterSpec::new("item").unwrap().with_attr("kind", "a");
        let filtered = filter(&doc, &spec);
        assert_eq!(filtered.root.elements().count(), 1);
    }

    #[test]
    fn test_extra_attributes_ignored() {
        let doc = parse_doc("<root><item kind=\"a\" extra=\"z\"/></root>");
        let spec = FilterSpec::new("item").unwrap().with_attr("kind", "a");
        assert_eq!(filter(&doc, &spec).root.elements().count(), 1);
    }

    #[test]
    fn test_subtree_retained_unmodified() {
        let doc = parse_doc("<root><item kind=\"a\"><deep attr=\"v\">t</deep></item></root>");
        let spec = FilterSpec::new("item").unwrap().with_attr("kind", "a");
        let filtered = filter(&doc, &spec);
        let entry = filtered.root.child("item").unwrap();
        let deep = entry.child("deep").unwrap();
        assert_eq!(deep.attr("attr"), Some("v"));
        assert_eq!(deep.text(), "t");
    }

    #[test]
    fn test_nested_candidates_evaluated_independently() {
        let doc = parse_doc(
            "<root><item kind=\"a\"><item kind=\"a\" inner=\"yes\"/></item><item kind=\"b\"><item kind=\"a\" inner=\"also\"/></item></root>",
        );
        let spec = FilterSpec::new("item").unwrap().with_attr("kind", "a");
        let filtered = filter(&doc, &spec);

        // outer match, its nested match, and the match inside the
        // discarded kind="b" entry
        let entries: Vec<&Element> = filtered.root.elements().collect();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].attr("inner"), Some("yes"));
        assert_eq!(entries[2].attr("inner"), Some("also"));
        // the outer survivor keeps its own subtree
        assert_eq!(entries[0].elements().count(), 1);
    }

    #[test]
    fn test_order_preserved() {
        let doc = parse_doc(
            "<root><item kind=\"a\" n=\"1\"/><group><item kind=\"a\" n=\"2\"/></group><item kind=\"a\" n=\"3\"/></root>",
        );
        let spec = FilterSpec::new("item").unwrap().with_attr("kind", "a");
        let filtered = filter(&doc, &spec);
        let order: Vec<&str> = filtered
            .root
            .elements()
            .filter_map(|e| e.attr("n"))
            .collect();
        assert_eq!(order, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_no_required_attrs_matches_by_name() {
        let doc = parse_doc("<root><item/><other/><item/></root>");
        let spec = FilterSpec::new("item").unwrap();
        assert_eq!(filter(&doc, &spec).root.elements().count(), 2);
    }

    #[test]
    fn test_source_document_untouched() {
        let doc = parse_doc("<root><item kind=\"a\"/><item kind=\"b\"/></root>");
        let before = doc.clone();
        let spec = FilterSpec::new("item").unwrap().with_attr("kind", "a");
        let _ = filter(&doc, &spec);
        assert_eq!(doc, before);
    }
}
