mod common;

use common::test_helpers::*;
use xml_validator::{SchemaCompiler, ValidationEngine, ValidationError, validate};

#[test]
fn test_include_next_to_the_only_selected_schema() {
    let ws = Workspace::new();
    let main = ws.write("d/main.xsd", MAIN_INCLUDING_COMMON_XSD);
    ws.write("d/common.xsd", COMMON_XSD);
    let good = ws.write("good.xml", "<order><quantity>5</quantity></order>");
    let bad = ws.write("bad.xml", "<order><quantity>500</quantity></order>");

    let compiled = SchemaCompiler::new().compile(&[main]).unwrap();
    let engine = ValidationEngine::new();

    assert!(engine.run(&compiled, &good).is_valid());
    let result = engine.run(&compiled, &bad);
    assert_eq!(result.diagnostics().len(), 1);
    assert!(result.diagnostics()[0].message.contains("500"));
}

#[test]
fn test_missing_include_fails_compilation() {
    let ws = Workspace::new();
    let main = ws.write("d/main.xsd", MAIN_INCLUDING_COMMON_XSD);
    let xml = ws.write("doc.xml", "<order><quantity>5</quantity></order>");

    let err = validate(&xml, &[main]).unwrap_err();

    match err {
        ValidationError::SchemaCompilation { details, .. } => {
            assert!(details.iter().any(|d| d.contains("common.xsd")));
        }
        other => panic!("Expected SchemaCompilation, got {:?}", other),
    }
}

#[test]
fn test_missing_import_fails_compilation() {
    let ws = Workspace::new();
    let main = ws.write(
        "d/main.xsd",
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:c="urn:common">
    <xs:import namespace="urn:common" schemaLocation="types.xsd"/>
    <xs:element name="root" type="c:Code"/>
</xs:schema>"#,
    );
    let xml = ws.write("doc.xml", "<root>x</root>");

    let err = validate(&xml, &[main]).unwrap_err();
    assert!(err.is_compilation_failure());
}

#[test]
fn test_references_resolve_against_first_selected_directory() {
    let ws = Workspace::new();
    let first = ws.write("first/first.xsd", &single_element_xsd(None, "first"));
    // `second.xsd` lives elsewhere, but its include is only satisfiable from
    // the first schema's directory.
    let second = ws.write(
        "second/second.xsd",
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:include schemaLocation="common.xsd"/>
    <xs:element name="order">
        <xs:complexType>
            <xs:sequence>
                <xs:element name="quantity" type="Quantity"/>
            </xs:sequence>
        </xs:complexType>
    </xs:element>
</xs:schema>"#,
    );
    ws.write("first/common.xsd", COMMON_XSD);

    let xml = ws.write("doc.xml", "<order><quantity>7</quantity></order>");

    let result = validate(&xml, &[first.clone(), second.clone()]).unwrap();
    assert!(result.is_valid(), "{:?}", result.diagnostics());

    // With the order swapped the first directory no longer has the file and
    // nothing next to `second.xsd` provides it either.
    let err = validate(&xml, &[second, first]).unwrap_err();
    assert!(err.is_compilation_failure());
}

#[test]
fn test_resolver_wins_over_declaring_directory() {
    let ws = Workspace::new();
    let first = ws.write("first/first.xsd", &single_element_xsd(None, "first"));
    let second = ws.write(
        "second/second.xsd",
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:include schemaLocation="common.xsd"/>
    <xs:element name="order">
        <xs:complexType>
            <xs:sequence>
                <xs:element name="quantity" type="Quantity"/>
            </xs:sequence>
        </xs:complexType>
    </xs:element>
</xs:schema>"#,
    );
    // Same name in both directories, different limits.
    ws.write("first/common.xsd", COMMON_XSD);
    ws.write(
        "second/common.xsd",
        &COMMON_XSD.replace("<xs:maxInclusive value=\"100\"/>", "<xs:maxInclusive value=\"5\"/>"),
    );

    let xml = ws.write("doc.xml", "<order><quantity>50</quantity></order>");

    let compiled = SchemaCompiler::new().compile(&[first, second]).unwrap();
    assert_eq!(compiled.resolved_references().len(), 1);
    assert!(ValidationEngine::new().run(&compiled, &xml).is_valid());
}

#[test]
fn test_declaring_directory_is_the_fallback() {
    let ws = Workspace::new();
    let first = ws.write("first/first.xsd", &single_element_xsd(None, "first"));
    let second = ws.write(
        "second/second.xsd",
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:include schemaLocation="common.xsd"/>
    <xs:element name="order">
        <xs:complexType>
            <xs:sequence>
                <xs:element name="quantity" type="Quantity"/>
            </xs:sequence>
        </xs:complexType>
    </xs:element>
</xs:schema>"#,
    );
    ws.write("second/common.xsd", COMMON_XSD);

    let xml = ws.write("doc.xml", "<order><quantity>1</quantity></order>");

    let compiled = SchemaCompiler::new().compile(&[first, second]).unwrap();
    assert!(compiled.resolved_references().is_empty());
    assert!(ValidationEngine::new().run(&compiled, &xml).is_valid());
}

#[test]
fn test_multiple_namespaces_compile_into_one_graph() {
    let ws = Workspace::new();
    let a = ws.write("a.xsd", &single_element_xsd(Some("urn:a"), "alpha"));
    let b = ws.write("b.xsd", &single_element_xsd(Some("urn:b"), "beta"));
    let plain = ws.write("plain.xsd", &single_element_xsd(None, "plain"));

    let compiled = SchemaCompiler::new()
        .compile(&[a.clone(), b.clone(), plain.clone()])
        .unwrap();
    assert_eq!(compiled.sources(), &[a, b, plain]);

    let engine = ValidationEngine::new();
    for (name, content) in [
        ("alpha.xml", r#"<alpha xmlns="urn:a">x</alpha>"#),
        ("beta.xml", r#"<beta xmlns="urn:b">x</beta>"#),
        ("plain.xml", "<plain>x</plain>"),
    ] {
        let xml = ws.write(name, content);
        let result = engine.run(&compiled, &xml);
        assert!(result.is_valid(), "{}: {:?}", name, result.diagnostics());
    }

    let wrong = ws.write("wrong.xml", r#"<alpha xmlns="urn:b">x</alpha>"#);
    assert!(!engine.run(&compiled, &wrong).is_valid());
}

#[test]
fn test_files_sharing_a_namespace_are_combined() {
    let ws = Workspace::new();
    let one = ws.write("one.xsd", &single_element_xsd(Some("urn:shared"), "first"));
    let two = ws.write("two.xsd", &single_element_xsd(Some("urn:shared"), "second"));

    let compiled = SchemaCompiler::new().compile(&[one, two]).unwrap();
    let engine = ValidationEngine::new();

    let first = ws.write("first.xml", r#"<first xmlns="urn:shared">x</first>"#);
    let second = ws.write("second.xml", r#"<second xmlns="urn:shared">x</second>"#);

    assert!(engine.run(&compiled, &first).is_valid());
    assert!(engine.run(&compiled, &second).is_valid());
}

#[test]
fn test_selected_order_does_not_change_verdicts_within_one_directory() {
    let ws = Workspace::new();
    let a = ws.write("a.xsd", &single_element_xsd(Some("urn:a"), "alpha"));
    let b = ws.write("b.xsd", &single_element_xsd(Some("urn:b"), "beta"));
    let xml = ws.write("doc.xml", r#"<beta xmlns="urn:b"><nested/></beta>"#);

    let forward = validate(&xml, &[a.clone(), b.clone()]).unwrap();
    let backward = validate(&xml, &[b, a]).unwrap();

    assert!(!forward.is_valid());
    assert_eq!(forward, backward);
}

#[test]
fn test_selected_file_reached_through_resolver_is_loaded_once() {
    let ws = Workspace::new();
    let common = ws.write("first/common.xsd", COMMON_XSD);
    let second = ws.write(
        "second/second.xsd",
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:include schemaLocation="common.xsd"/>
    <xs:element name="order">
        <xs:complexType>
            <xs:sequence>
                <xs:element name="quantity" type="Quantity"/>
            </xs:sequence>
        </xs:complexType>
    </xs:element>
</xs:schema>"#,
    );
    // A same-named file next to the includer that the resolver must not pick.
    ws.write(
        "second/common.xsd",
        &COMMON_XSD.replace("<xs:maxInclusive value=\"100\"/>", "<xs:maxInclusive value=\"5\"/>"),
    );

    let compiled = SchemaCompiler::new().compile(&[common, second]).unwrap();
    assert_eq!(compiled.resolved_references().len(), 1);

    let engine = ValidationEngine::new();
    let good = ws.write("good.xml", "<order><quantity>50</quantity></order>");
    let bad = ws.write("bad.xml", "<order><quantity>500</quantity></order>");
    assert!(engine.run(&compiled, &good).is_valid());
    assert_eq!(engine.run(&compiled, &bad).diagnostics().len(), 1);
}

#[test]
fn test_file_redirected_from_several_directories_is_loaded_once() {
    let ws = Workspace::new();
    let first = ws.write("first/first.xsd", &single_element_xsd(None, "first"));
    ws.write("first/common.xsd", COMMON_XSD);
    let includer = |element: &str| {
        format!(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:include schemaLocation="common.xsd"/>
    <xs:element name="{}" type="Quantity"/>
</xs:schema>"#,
            element
        )
    };
    let left = ws.write("left/left.xsd", &includer("left"));
    let right = ws.write("right/right.xsd", &includer("right"));

    let compiled = SchemaCompiler::new()
        .compile(&[first, left, right])
        .unwrap();
    assert_eq!(compiled.resolved_references().len(), 2);

    let engine = ValidationEngine::new();
    let xml = ws.write("doc.xml", "<right>7</right>");
    assert!(engine.run(&compiled, &xml).is_valid());
}

#[test]
fn test_percent_encoded_schema_location() {
    let ws = Workspace::new();
    let main = ws.write(
        "d/main.xsd",
        &MAIN_INCLUDING_COMMON_XSD.replace("common.xsd", "my%20common.xsd"),
    );
    ws.write("d/my common.xsd", COMMON_XSD);
    let xml = ws.write("doc.xml", "<order><quantity>5</quantity></order>");

    let result = validate(&xml, &[main]).unwrap();
    assert!(result.is_valid(), "{:?}", result.diagnostics());
}
