use std::collections::BTreeSet;

use graphjar_binary::{deserialize, SourceSerializer};
use graphjar_model::m3::properties;
use graphjar_model::{
    CompileStates, ImplementationKind, IntegerValue, ModelRepository, PrimitiveValue,
};
use pretty_assertions::assert_eq;

use super::fixtures::{
    compiled_source, element, library, load_all, span, TwoSources, PARSER, SOURCE1, SOURCE2,
};

#[test]
fn serialization_reports_defined_and_referenced_elements() {
    let model = TwoSources::new();

    let first = model.serialize(&model.source1);
    assert_eq!(first.result.source_id, SOURCE1);
    assert_eq!(first.result.defined_instances, vec!["test::A".to_owned()]);
    // `Integer` and the metamodel classes are kernel elements.
    assert!(first.result.external_references.is_empty());

    let second = model.serialize(&model.source2);
    assert_eq!(second.result.defined_instances, vec!["test::f".to_owned()]);
    assert_eq!(
        second.result.external_references,
        BTreeSet::from(["test::A".to_owned()])
    );
}

#[test]
fn loaded_graph_matches_the_serialized_one() {
    let model = TwoSources::new();
    let first = model.serialize(&model.source1).bytes;
    let second = model.serialize(&model.source2).bytes;

    let mut repo = ModelRepository::new();
    let report = load_all(&mut repo, &[&first, &second], Default::default());
    assert_eq!(report.sources, vec![SOURCE1.to_owned(), SOURCE2.to_owned()]);
    assert!(report.unresolved.is_empty());
    // `f.expression` waits one round for `A.properties`.
    assert_eq!(report.rounds, 2);

    let a = repo.get_by_user_path("test::A").unwrap();
    let node = repo.node(a);
    assert_eq!(node.classifier(), Some(repo.kernel().class));
    assert_eq!(node.kind(), ImplementationKind::Class);
    assert_eq!(node.source_information(), Some(&span(SOURCE1, 1)));
    assert_eq!(
        node.compile_states(),
        CompileStates::PROCESSED | CompileStates::VALIDATED
    );
    assert_eq!(repo.user_path(a), "test::A");

    let [version] = repo.values(a, properties::PROPERTIES) else {
        panic!("expected a single property on A");
    };
    let version = *version;
    assert_eq!(repo.node(version).name(), "version");
    assert_eq!(repo.node(version).kind(), ImplementationKind::Property);
    assert_eq!(repo.value(version, properties::OWNER), Some(a));
    assert_eq!(
        repo.value(version, "genericType"),
        Some(repo.kernel().integer)
    );
    let multiplicity = repo.value(version, "multiplicity").unwrap();
    assert!(graphjar_model::m3::is_anonymous_name(
        repo.node(multiplicity).name()
    ));
    let lower = repo.value(multiplicity, "lowerBound").unwrap();
    assert_eq!(
        repo.primitive_value(lower),
        Some(&PrimitiveValue::Integer(IntegerValue::Int(1)))
    );

    let f = repo.get_by_user_path("test::f").unwrap();
    assert_eq!(repo.node(f).kind(), ImplementationKind::Function);
    assert_eq!(repo.value(f, "returnType"), Some(a));
    assert_eq!(repo.value(f, "expression"), Some(version));
    let description = repo.value(f, "description").unwrap();
    assert_eq!(repo.string_value(description), Some("returns A"));
}

#[test]
fn units_load_in_any_order() {
    let model = TwoSources::new();
    let first = model.serialize(&model.source1).bytes;
    let second = model.serialize(&model.source2).bytes;

    let mut repo = ModelRepository::new();
    let report = load_all(&mut repo, &[&second, &first], Default::default());
    assert!(report.unresolved.is_empty());

    let a = repo.get_by_user_path("test::A").unwrap();
    let f = repo.get_by_user_path("test::f").unwrap();
    assert_eq!(repo.value(f, "returnType"), Some(a));
    assert_eq!(
        repo.value(f, "expression"),
        repo.values(a, properties::PROPERTIES).first().copied()
    );
}

#[test]
fn later_loads_link_to_elements_loaded_earlier() {
    let model = TwoSources::new();
    let first = model.serialize(&model.source1).bytes;
    let second = model.serialize(&model.source2).bytes;

    let mut repo = ModelRepository::new();
    load_all(&mut repo, &[&first], Default::default());
    let a = repo.get_by_user_path("test::A").unwrap();

    let report = load_all(&mut repo, &[&second], Default::default());
    assert_eq!(report.rounds, 1);
    let f = repo.get_by_user_path("test::f").unwrap();
    assert_eq!(repo.value(f, "returnType"), Some(a));
    assert_eq!(repo.get_by_user_path("test::A"), Some(a));
}

#[test]
fn reserializing_a_loaded_unit_gives_identical_bytes() {
    let model = TwoSources::new();
    let first = model.serialize(&model.source1).bytes;
    let second = model.serialize(&model.source2).bytes;

    let mut repo = ModelRepository::new();
    load_all(&mut repo, &[&first, &second], Default::default());

    let library = library();
    for bytes in [&first, &second] {
        let source = deserialize(bytes, &library).unwrap().to_source(&repo);
        let again = SourceSerializer::new(&repo, &library)
            .serialize(&source)
            .unwrap();
        assert_eq!(&again.bytes, bytes);
    }
}

#[test]
fn serialization_is_deterministic() {
    let model = TwoSources::new();
    let once = model.serialize(&model.source2);
    let twice = model.serialize(&model.source2);
    assert_eq!(once.bytes, twice.bytes);
    assert_eq!(once.result, twice.result);
}

#[test]
fn source_definition_survives() {
    let model = TwoSources::new();
    let source = model
        .source1
        .clone()
        .with_immutable(true)
        .with_in_memory(true);
    let bytes = SourceSerializer::new(&model.repo, &library())
        .serialize(&source)
        .unwrap()
        .bytes;

    let unit = deserialize(&bytes, &library()).unwrap();
    let definition = unit.definition();
    assert_eq!(definition.id, SOURCE1);
    assert!(definition.immutable);
    assert!(definition.in_memory);
    assert_eq!(definition.content.as_deref(), Some("// /test/source1.pure"));
    // A, version and its multiplicity.
    assert_eq!(unit.nodes().len(), 3);
}

#[test]
fn enumerations_and_top_level_elements_round_trip() {
    let mut repo = ModelRepository::new();
    let mut source = compiled_source(SOURCE1);
    let enumeration = repo.kernel().enumeration;
    let class = repo.kernel().class;

    let color = element(&mut repo, &mut source, ("test", "Color"), enumeration, 1);
    let red = repo.new_node("RED", color);
    repo.node_mut(red)
        .set_source_information(Some(span(SOURCE1, 2)));
    repo.add_value(color, properties::VALUES, red);

    let top = repo.new_node("MyTop", class);
    repo.node_mut(top)
        .set_source_information(Some(span(SOURCE1, 4)));
    repo.add_top_level(top).unwrap();
    source.add_element(PARSER, top);

    let serialized = SourceSerializer::new(&repo, &library())
        .serialize(&source)
        .unwrap();
    assert_eq!(
        serialized.result.defined_instances,
        vec!["test::Color".to_owned(), "MyTop".to_owned()]
    );

    let mut loaded = ModelRepository::new();
    let report = load_all(&mut loaded, &[&serialized.bytes], Default::default());
    assert!(report.unresolved.is_empty());

    let color = loaded.get_by_user_path("test::Color").unwrap();
    assert_eq!(loaded.node(color).kind(), ImplementationKind::Enumeration);
    assert_eq!(
        loaded.node(color).classifier(),
        Some(loaded.kernel().enumeration)
    );
    let [red] = loaded.values(color, properties::VALUES) else {
        panic!("expected a single value on Color");
    };
    let red = *red;
    assert_eq!(loaded.node(red).name(), "RED");
    assert_eq!(loaded.node(red).kind(), ImplementationKind::Enum);
    assert_eq!(loaded.node(red).classifier(), Some(color));
    assert!(loaded.is_enum(red));

    let top = loaded.top_level("MyTop").unwrap();
    assert_eq!(loaded.get_by_user_path("MyTop"), Some(top));
    assert_eq!(loaded.node(top).kind(), ImplementationKind::Class);
    assert_eq!(loaded.node(top).classifier(), Some(loaded.kernel().class));
    assert_eq!(
        loaded.node(top).source_information(),
        Some(&span(SOURCE1, 4))
    );
}
