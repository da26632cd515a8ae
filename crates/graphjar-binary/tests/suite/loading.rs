use graphjar_binary::{deserialize, load_source, DeserializeError, GraphLoader, SourceSerializer};
use graphjar_config::ResolutionConfig;
use graphjar_model::m3::properties;
use graphjar_model::{ImplementationKind, ModelRepository};
use pretty_assertions::assert_eq;

use super::fixtures::{
    compiled_source, element, lenient, library, load_all, property, TwoSources, SOURCE1, SOURCE2,
};

/// `test::A` (source1) and `test::B` (source2) each hold a property typed by
/// the other.
fn cyclic_units() -> (Vec<u8>, Vec<u8>) {
    let mut repo = ModelRepository::new();
    let mut source1 = compiled_source(SOURCE1);
    let mut source2 = compiled_source(SOURCE2);
    let class = repo.kernel().class;
    let a = element(&mut repo, &mut source1, ("test", "A"), class, 1);
    let b = element(&mut repo, &mut source2, ("test", "B"), class, 1);
    property(&mut repo, SOURCE1, a, "b", b, 2);
    property(&mut repo, SOURCE2, b, "a", a, 2);

    let library = library();
    let serializer = SourceSerializer::new(&repo, &library);
    (
        serializer.serialize(&source1).unwrap().bytes,
        serializer.serialize(&source2).unwrap().bytes,
    )
}

#[test]
fn mutually_referencing_units_load_together() {
    let (first, second) = cyclic_units();
    for order in [[&first, &second], [&second, &first]] {
        let mut repo = ModelRepository::new();
        let report = load_all(&mut repo, &order, Default::default());
        assert!(report.unresolved.is_empty());

        let a = repo.get_by_user_path("test::A").unwrap();
        let b = repo.get_by_user_path("test::B").unwrap();
        let a_b = repo.values(a, properties::PROPERTIES)[0];
        let b_a = repo.values(b, properties::PROPERTIES)[0];
        assert_eq!(repo.value(a_b, "genericType"), Some(b));
        assert_eq!(repo.value(b_a, "genericType"), Some(a));
    }
}

#[test]
fn missing_dependency_fails_strict_loads() {
    let (first, _) = cyclic_units();
    let mut repo = ModelRepository::new();
    let unit = deserialize(&first, &library()).unwrap();

    let err = load_source(&mut repo, unit, ResolutionConfig::default()).unwrap_err();
    let DeserializeError::UnresolvedReferences { references } = &err else {
        panic!("expected unresolved references, got {err}");
    };
    assert_eq!(references.len(), 1);
    let reference = &references[0];
    assert_eq!(reference.source_id, SOURCE1);
    assert_eq!(reference.property.as_deref(), Some("genericType"));
    assert_eq!(reference.reference, "element test::B");
}

#[test]
fn missing_dependency_is_reported_by_lenient_loads() {
    let (first, _) = cyclic_units();
    let mut repo = ModelRepository::new();
    let report = load_all(&mut repo, &[&first], lenient());
    assert_eq!(report.unresolved.len(), 1);

    // Only the incomplete property is held back.
    let a = repo.get_by_user_path("test::A").unwrap();
    let a_b = repo.values(a, properties::PROPERTIES)[0];
    assert_eq!(repo.value(a_b, "genericType"), None);
    assert_eq!(repo.value(a_b, properties::OWNER), Some(a));
}

#[test]
fn round_cap_stops_resolution() {
    let model = TwoSources::new();
    let first = model.serialize(&model.source1).bytes;
    let second = model.serialize(&model.source2).bytes;

    let library = library();
    let mut repo = ModelRepository::new();
    let mut loader = GraphLoader::new(
        &mut repo,
        ResolutionConfig {
            max_rounds: 1,
            ..ResolutionConfig::default()
        },
    );
    loader
        .add(deserialize(&first, &library).unwrap())
        .add(deserialize(&second, &library).unwrap());
    let err = loader.load().unwrap_err();
    assert!(
        matches!(
            err,
            DeserializeError::ResolutionDidNotConverge {
                rounds: 1,
                unresolved: 2
            }
        ),
        "{err}"
    );
}

#[test]
fn existing_elements_are_reused_and_merged() {
    let model = TwoSources::new();
    let first = model.serialize(&model.source1).bytes;

    let mut repo = ModelRepository::new();
    let class = repo.kernel().class;
    let property_class = repo.kernel().property;
    let a = repo.new_packaged_element("test", "A", class, None).unwrap();
    let extra = repo.new_node("extra", property_class);
    repo.add_value(a, properties::PROPERTIES, extra);

    load_all(&mut repo, &[&first], Default::default());
    assert_eq!(repo.get_by_user_path("test::A"), Some(a));
    let names: Vec<&str> = repo
        .values(a, properties::PROPERTIES)
        .iter()
        .map(|property| repo.node(*property).name())
        .collect();
    assert_eq!(names, vec!["version", "extra"]);
    assert!(repo.node(a).is_from(SOURCE1));
}

#[test]
fn conflicting_value_names_are_rejected() {
    let model = TwoSources::new();
    let first = model.serialize(&model.source1).bytes;

    let mut repo = ModelRepository::new();
    let class = repo.kernel().class;
    let property_class = repo.kernel().property;
    let a = repo.new_packaged_element("test", "A", class, None).unwrap();
    let stale = repo.new_node("version", property_class);
    repo.add_value(a, properties::PROPERTIES, stale);

    let unit = deserialize(&first, &library()).unwrap();
    let err = load_source(&mut repo, unit, ResolutionConfig::default()).unwrap_err();
    assert!(
        matches!(
            &err,
            DeserializeError::DuplicateValueName { property, name, .. }
                if property == "properties" && name == "version"
        ),
        "{err}"
    );
}

#[test]
fn existing_element_of_another_kind_is_a_type_mismatch() {
    let model = TwoSources::new();
    let first = model.serialize(&model.source1).bytes;

    let mut repo = ModelRepository::new();
    let enumeration = repo.kernel().enumeration;
    repo.new_packaged_element("test", "A", enumeration, None)
        .unwrap();

    let unit = deserialize(&first, &library()).unwrap();
    let err = load_source(&mut repo, unit, ResolutionConfig::default()).unwrap_err();
    assert!(
        matches!(
            &err,
            DeserializeError::TypeMismatch {
                path,
                expected: ImplementationKind::Class,
                found: ImplementationKind::Enumeration,
            } if path == "test::A"
        ),
        "{err}"
    );
}

#[test]
fn package_clash_is_reported_with_the_instance() {
    let model = TwoSources::new();
    let first = model.serialize(&model.source1).bytes;

    // `test` exists but is a class, not a package.
    let mut repo = ModelRepository::new();
    let class = repo.kernel().class;
    repo.new_packaged_element("Root", "test", class, None)
        .unwrap();

    let unit = deserialize(&first, &library()).unwrap();
    let err = load_source(&mut repo, unit, ResolutionConfig::default()).unwrap_err();
    let DeserializeError::Package { instance, .. } = &err else {
        panic!("expected a package error, got {err}");
    };
    assert!(instance.starts_with("instance 'A'"), "{instance}");
}
