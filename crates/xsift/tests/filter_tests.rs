//! Filtering integration tests: entry selection by attribute criteria.

use xsift::{Error, FilterSpec, Validation, XmlParser};

const INPUT: &str = r#"<root><item id="1" kind="a">x</item><item id="2" kind="b">y</item></root>"#;

#[test]
fn test_single_matching_entry() {
    let parser = XmlParser::new();
    let spec = FilterSpec::new("item").unwrap().with_attr("kind", "a");
    let doc = parser.parse_filtered(INPUT, &spec).unwrap();

    let entries: Vec<_> = doc.root.elements().collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "item");
    assert_eq!(entries[0].attr("id"), Some("1"));
    assert_eq!(entries[0].text(), "x");
}

#[test]
fn test_zero_matching_entries() {
    let parser = XmlParser::new();
    let spec = FilterSpec::new("item").unwrap().with_attr("kind", "c");
    let doc = parser.parse_filtered(INPUT, &spec).unwrap();
    assert_eq!(doc.root.elements().count(), 0);
}

#[test]
fn test_filtered_root_reuses_original_root() {
    let parser = XmlParser::new();
    let spec = FilterSpec::new("item").unwrap().with_attr("kind", "a");
    let doc = parser
        .parse_filtered("<catalog version=\"2\"><item kind=\"a\"/></catalog>", &spec)
        .unwrap();
    assert_eq!(doc.root.name, "catalog");
    assert_eq!(doc.root.attr("version"), Some("2"));
}

#[test]
fn test_multiple_required_attributes_all_must_match() {
    let input = r#"<root>
        <item kind="a" lang="en"/>
        <item kind="a" lang="de"/>
        <item kind="b" lang="en"/>
        <item kind="a"/>
    </root>"#;
    let parser = XmlParser::new();
    let spec = FilterSpec::new("item")
        .unwrap()
        .with_attr("kind", "a")
        .with_attr("lang", "en");
    let doc = parser.parse_filtered(input, &spec).unwrap();

    let entries: Vec<_> = doc.root.elements().collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].attr("lang"), Some("en"));
}

#[test]
fn test_parse_failure_propagates_through_filtering() {
    let parser = XmlParser::new();
    let spec = FilterSpec::new("item").unwrap();
    let err = parser.parse_filtered("<root><item>", &spec).unwrap_err();
    assert!(matches!(err, Error::Malformed { .. }));
}

#[test]
fn test_validation_failure_propagates_through_filtering() {
    let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:element name="root">
        <xs:complexType>
            <xs:sequence>
                <xs:element name="item" type="xs:integer" maxOccurs="unbounded"/>
            </xs:sequence>
        </xs:complexType>
    </xs:element>
</xs:schema>"#;
    let parser = XmlParser::with_validation(Validation::xsd(schema).unwrap());
    let spec = FilterSpec::new("item").unwrap();
    let err = parser
        .parse_filtered("<root><item>abc</item></root>", &spec)
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
}

#[test]
fn test_filtered_output_serializes() {
    let parser = XmlParser::new();
    let spec = FilterSpec::new("item").unwrap().with_attr("kind", "a");
    let doc = parser.parse_filtered(INPUT, &spec).unwrap();
    assert_eq!(
        xsift::write(&doc),
        "<root><item id=\"1\" kind=\"a\">x</item></root>"
    );
}
