use std::collections::BTreeMap;

use graphjar_binary::{deserialize_with, read_indexes, DeserializeOptions, SourceSerializer};
use pretty_assertions::assert_eq;

use super::fixtures::{element_not_root, library, TwoSources, PARSER, SOURCE1};

#[test]
fn indexes_list_roots_other_elements_and_dependencies() {
    let mut model = TwoSources::new();
    let class = model.repo.kernel().class;
    // Reachable from A but not produced by a parser.
    let helper = element_not_root(&mut model.repo, SOURCE1, ("test::inner", "Helper"), class, 10);
    model.repo.add_value(model.a, "helper", helper);
    // Root of a second parser.
    let extra = element_not_root(&mut model.repo, SOURCE1, ("test", "Extra"), class, 20);
    model.source1.add_element("Other", extra);

    let serialization = model.serialize(&model.source1);
    // Parsers in name order, then the other elements.
    assert_eq!(
        serialization.result.defined_instances,
        vec![
            "test::Extra".to_owned(),
            "test::A".to_owned(),
            "test::inner::Helper".to_owned(),
        ]
    );

    let indexes = read_indexes(&serialization.bytes).unwrap();
    assert_eq!(indexes.definition.id, SOURCE1);
    assert_eq!(
        indexes.instances_by_parser,
        Some(BTreeMap::from([
            ("Other".to_owned(), vec!["test::Extra".to_owned()]),
            (PARSER.to_owned(), vec!["test::A".to_owned()]),
        ]))
    );
    assert_eq!(
        indexes.other_instances,
        Some(vec!["test::inner::Helper".to_owned()])
    );
    assert_eq!(indexes.external_references, Some(Vec::new()));
    assert_eq!(
        indexes.defined_instances(),
        Some(serialization.result.defined_instances)
    );
}

#[test]
fn dependencies_are_listed_once() {
    let mut model = TwoSources::new();
    let class = model.repo.kernel().class;
    let z = element_not_root(&mut model.repo, SOURCE1, ("test", "Z"), class, 30);
    let b = element_not_root(&mut model.repo, SOURCE1, ("test", "B"), class, 31);
    for target in [z, b, z, model.a] {
        model.repo.add_value(model.f, "uses", target);
    }

    let serialization = model.serialize(&model.source2);
    let indexes = read_indexes(&serialization.bytes).unwrap();
    // The wire index is in string table order, i.e. order of first use.
    assert_eq!(
        indexes.external_references,
        Some(vec![
            "test::A".to_owned(),
            "test::Z".to_owned(),
            "test::B".to_owned(),
        ])
    );
    assert_eq!(
        serialization
            .result
            .external_references
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>(),
        vec!["test::A", "test::B", "test::Z"]
    );
}

#[test]
fn skipped_indexes_are_not_materialized() {
    let model = TwoSources::new();
    let bytes = SourceSerializer::new(&model.repo, &library())
        .serialize(&model.source2)
        .unwrap()
        .bytes;

    let unit = deserialize_with(
        &bytes,
        &library(),
        DeserializeOptions {
            read_instances_by_parser: false,
            read_other_instances: true,
            read_external_references: false,
        },
    )
    .unwrap();
    let indexes = unit.indexes();
    assert_eq!(indexes.instances_by_parser, None);
    assert_eq!(indexes.other_instances, Some(Vec::new()));
    assert_eq!(indexes.external_references, None);
    // Skipping indexes does not change what is decoded.
    assert_eq!(unit.nodes().len(), 1);
}
