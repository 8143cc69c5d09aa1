//! Validation integration tests: the validation gate and the DTD/XSD
//! scenarios.

use xsift::{Error, Severity, Validation, ValidationKind, XmlParser};

const NUMERIC_XSD: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:element name="root">
        <xs:complexType>
            <xs:sequence>
                <xs:element name="value" type="xs:integer"/>
            </xs:sequence>
        </xs:complexType>
    </xs:element>
</xs:schema>"#;

const STRUCTURE_DTD: &str = "\
<!ELEMENT root (value)>\n\
<!ELEMENT value (#PCDATA)>\n";

#[test]
fn test_validation_gate() {
    // The same schema-invalid input passes with no validation and fails
    // with validation; a conforming input passes under the schema.
    let invalid = "<root><value>abc</value></root>";
    let valid = "<root><value>1</value></root>";

    let unchecked = XmlParser::new();
    assert!(unchecked.parse(invalid).is_ok());

    let checked = XmlParser::with_validation(Validation::xsd(NUMERIC_XSD).unwrap());
    let err = checked.parse(invalid).unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    let doc = checked.parse(valid).unwrap();
    assert_eq!(doc.root.child_text("value"), Some("1".to_string()));
}

#[test]
fn test_numeric_value_scenario() {
    let parser = XmlParser::with_validation(Validation::xsd(NUMERIC_XSD).unwrap());

    let err = parser.parse("<root><value>abc</value></root>").unwrap_err();
    let diagnostics = err.diagnostics();
    assert!(!diagnostics.is_empty());
    assert_eq!(diagnostics[0].severity, Severity::Error);
    assert!(diagnostics[0].message.contains("not a valid integer"));

    let doc = parser.parse("<root><value>1</value></root>").unwrap();
    assert_eq!(doc.root.child_text("value"), Some("1".to_string()));
}

#[test]
fn test_dtd_structure_scenario() {
    let parser = XmlParser::with_validation(Validation::dtd(STRUCTURE_DTD).unwrap());

    let doc = parser.parse("<root><value>1</value></root>").unwrap();
    assert_eq!(doc.root.child_text("value"), Some("1".to_string()));

    let err = parser.parse("<root><wrong>1</wrong></root>").unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
}

#[test]
fn test_diagnostics_carry_location() {
    let parser = XmlParser::with_validation(Validation::xsd(NUMERIC_XSD).unwrap());
    let err = parser
        .parse("<root>\n  <value>abc</value>\n</root>")
        .unwrap_err();
    let diagnostics = err.diagnostics();
    assert_eq!(diagnostics[0].pos.line, 2);
}

#[test]
fn test_all_violations_reported() {
    let parser = XmlParser::with_validation(Validation::xsd(NUMERIC_XSD).unwrap());
    let err = parser
        .parse("<root><value>abc</value><value>def</value></root>")
        .unwrap_err();
    // one bad value plus one sequence violation at minimum
    assert!(err.diagnostics().len() >= 2);
}

#[test]
fn test_malformed_beats_validation() {
    // A document that is not well-formed fails as malformed even when a
    // validation is configured.
    let parser = XmlParser::with_validation(Validation::xsd(NUMERIC_XSD).unwrap());
    let err = parser.parse("<root><value>1</root>").unwrap_err();
    assert!(matches!(err, Error::Malformed { .. }));
}

#[test]
fn test_descriptor_invariants() {
    assert!(Validation::from_kind(ValidationKind::Dtd, None).is_err());
    assert!(Validation::from_kind(ValidationKind::Xsd, None).is_err());
    assert!(Validation::from_kind(ValidationKind::None, Some(STRUCTURE_DTD)).is_err());
    assert!(Validation::from_kind(ValidationKind::None, None).is_ok());
    assert!(Validation::from_kind(ValidationKind::Dtd, Some(STRUCTURE_DTD)).is_ok());
    assert!(Validation::from_kind(ValidationKind::Xsd, Some(NUMERIC_XSD)).is_ok());
}

#[test]
fn test_bad_schema_fails_at_construction() {
    // Schema problems surface when the descriptor is built, not when a
    // document is later parsed.
    assert!(matches!(
        Validation::dtd("<!ELEMENT root").unwrap_err(),
        Error::InvalidConfig(_)
    ));
    assert!(matches!(
        Validation::xsd("<not-a-schema/>").unwrap_err(),
        Error::InvalidConfig(_)
    ));
}

#[test]
fn test_validating_parser_reusable() {
    let parser = XmlParser::with_validation(Validation::xsd(NUMERIC_XSD).unwrap());
    assert!(parser.parse("<root><value>1</value></root>").is_ok());
    assert!(parser.parse("<root><value>x</value></root>").is_err());
    assert!(parser.parse("<root><value>2</value></root>").is_ok());
}
