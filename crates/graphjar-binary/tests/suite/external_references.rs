use std::collections::BTreeSet;

use graphjar_binary::{
    deserialize, DeserializationHelper, DeserializeError, ExternalReference,
    ExternalReferenceSerializer, ExternalReferenceSerializerLibrary, Reference, ResolveContext,
    SerializationHelper, SerializeError, SourceSerializer, UnresolvableReference,
};
use graphjar_model::m3::{paths, properties};
use graphjar_model::{ModelRepository, NodeId, Source};
use pretty_assertions::assert_eq;

use super::fixtures::{
    compiled_source, element, library, load_all, span, TwoSources, SOURCE1, SOURCE2,
};

const TAG: &str = "test::Tag";

/// Tags are referenced as (profile, tag name).
struct TagSerializer;

impl ExternalReferenceSerializer for TagSerializer {
    fn type_path(&self) -> &str {
        TAG
    }

    fn serialize(
        &self,
        instance: NodeId,
        helper: &mut dyn SerializationHelper,
    ) -> Result<(), SerializeError> {
        let repository = helper.repository();
        let profile = repository
            .value(instance, "profile")
            .ok_or_else(|| SerializeError::Custom("tag without profile".to_owned()))?;
        let name = repository.node(instance).name().to_owned();
        helper.write_element_reference(profile)?;
        helper.write_string(&name);
        Ok(())
    }

    fn deserialize(
        &self,
        helper: &mut dyn DeserializationHelper,
    ) -> Result<Reference, DeserializeError> {
        let profile = helper.read_element_reference()?;
        let name = helper.read_string()?;
        Ok(Reference::custom(TagReference { profile, name }))
    }
}

#[derive(Debug)]
struct TagReference {
    profile: Reference,
    name: String,
}

impl ExternalReference for TagReference {
    fn resolve(
        &mut self,
        cx: &mut ResolveContext<'_>,
    ) -> Result<Option<NodeId>, UnresolvableReference> {
        if !self.profile.resolve(cx)? {
            return Ok(None);
        }
        let Some(profile) = self.profile.resolved() else {
            return Ok(None);
        };
        let repository = &*cx.repository;
        Ok(repository
            .values(profile, "tags")
            .iter()
            .copied()
            .find(|tag| repository.node(*tag).name() == self.name))
    }

    fn describe(&self) -> String {
        format!("tag '{}' of {}", self.name, self.profile)
    }
}

struct Tagged {
    repo: ModelRepository,
    source1: Source,
    source2: Source,
}

/// source1 defines profile `test::doc` with tag `deprecated`; source2 defines
/// function `test::f` carrying that tag.
fn tagged() -> Tagged {
    let mut repo = ModelRepository::new();
    let mut source1 = compiled_source(SOURCE1);
    let mut source2 = compiled_source(SOURCE2);

    let class = repo.kernel().class;
    let profile_class = element(&mut repo, &mut source1, ("test", "Profile"), class, 1);
    let tag_class = element(&mut repo, &mut source1, ("test", "Tag"), class, 2);
    let doc = element(&mut repo, &mut source1, ("test", "doc"), profile_class, 3);
    let deprecated = repo.new_node("deprecated", tag_class);
    repo.node_mut(deprecated)
        .set_source_information(Some(span(SOURCE1, 4)));
    repo.add_value(deprecated, "profile", doc);
    repo.add_value(doc, "tags", deprecated);

    let function = repo.kernel().concrete_function_definition;
    let f = element(&mut repo, &mut source2, ("test", "f"), function, 1);
    repo.add_value(f, "stereotype", deprecated);

    Tagged {
        repo,
        source1,
        source2,
    }
}

fn tag_library() -> ExternalReferenceSerializerLibrary {
    let mut library = ExternalReferenceSerializerLibrary::with_builtin();
    library.register(TagSerializer);
    library
}

#[test]
fn registered_serializer_round_trips_references() {
    let model = tagged();
    let library = tag_library();
    let serializer = SourceSerializer::new(&model.repo, &library);
    let first = serializer.serialize(&model.source1).unwrap();
    let second = serializer.serialize(&model.source2).unwrap();
    assert!(second.result.external_references.contains("test::doc"));

    let mut repo = ModelRepository::new();
    let mut loader = graphjar_binary::GraphLoader::new(&mut repo, Default::default());
    loader
        .add(deserialize(&first.bytes, &library).unwrap())
        .add(deserialize(&second.bytes, &library).unwrap());
    let report = loader.load().unwrap();
    assert!(report.unresolved.is_empty());

    let doc = repo.get_by_user_path("test::doc").unwrap();
    let f = repo.get_by_user_path("test::f").unwrap();
    let deprecated = repo.values(doc, "tags")[0];
    assert_eq!(repo.value(f, "stereotype"), Some(deprecated));
    assert_eq!(
        repo.node(deprecated).classifier(),
        repo.get_by_user_path(TAG)
    );
}

#[test]
fn unregistered_type_cannot_be_referenced_from_another_source() {
    let model = tagged();
    let err = SourceSerializer::new(&model.repo, &ExternalReferenceSerializerLibrary::with_builtin())
        .serialize(&model.source2)
        .unwrap_err();

    let mut current = &err;
    while let SerializeError::Instance { source, .. } | SerializeError::Property { source, .. } =
        current
    {
        current = &**source;
    }
    let SerializeError::UnsupportedExternalReference {
        classifier,
        instance,
        source_information,
    } = current
    else {
        panic!("expected an unsupported external reference, got {err}");
    };
    assert_eq!(classifier, TAG);
    assert!(instance.starts_with("deprecated "), "{instance}");
    assert_eq!(source_information.as_ref(), Some(&span(SOURCE1, 4)));
}

#[test]
fn reading_requires_the_serializer_used_for_writing() {
    let model = tagged();
    let library = tag_library();
    let bytes = SourceSerializer::new(&model.repo, &library)
        .serialize(&model.source2)
        .unwrap()
        .bytes;

    let err = deserialize(&bytes, &ExternalReferenceSerializerLibrary::with_builtin()).unwrap_err();
    assert!(
        matches!(&err, DeserializeError::MissingSerializer { type_path } if type_path == TAG),
        "{err}"
    );
}

#[test]
fn property_references_use_the_builtin_serializer() {
    let model = TwoSources::new();
    let second = model.serialize(&model.source2).bytes;

    // Without the property serializer the reference cannot be decoded.
    let err = deserialize(&second, &ExternalReferenceSerializerLibrary::new()).unwrap_err();
    assert!(
        matches!(&err, DeserializeError::MissingSerializer { type_path }
            if type_path == graphjar_model::m3::paths::PROPERTY),
        "{err}"
    );

    let first = model.serialize(&model.source1).bytes;
    let mut repo = ModelRepository::new();
    load_all(&mut repo, &[&first, &second], Default::default());
    let a = repo.get_by_user_path("test::A").unwrap();
    let f = repo.get_by_user_path("test::f").unwrap();
    let version = repo
        .values(a, graphjar_model::m3::properties::PROPERTIES)[0];
    assert_eq!(repo.value(f, "expression"), Some(version));
    assert_eq!(repo.node(version).name(), model.repo.node(model.version).name());
}

/// Node named `name` owned by `owner` through `owner_property`, listed in the
/// owner's `collection`.
fn member(
    repo: &mut ModelRepository,
    name: &str,
    classifier: NodeId,
    (owner, owner_property, collection): (NodeId, &str, &str),
    line: i32,
) -> NodeId {
    let id = repo.new_node(name, classifier);
    repo.node_mut(id)
        .set_source_information(Some(span(SOURCE1, line)));
    repo.add_value(id, owner_property, owner);
    repo.add_value(owner, collection, id);
    id
}

/// source1 defines enumeration `test::Color { RED }`, class `test::A` with
/// qualified property `describe` and profile `test::doc` with tag `todo` and
/// stereotype `legacy`. source2 defines `test::f` using all four.
struct Members {
    repo: ModelRepository,
    source1: Source,
    source2: Source,
}

fn members() -> Members {
    let mut repo = ModelRepository::new();
    let mut source1 = compiled_source(SOURCE1);
    let mut source2 = compiled_source(SOURCE2);
    let kernel = repo.kernel().clone();

    let color = element(&mut repo, &mut source1, ("test", "Color"), kernel.enumeration, 1);
    let red = repo.new_node("RED", color);
    repo.node_mut(red)
        .set_source_information(Some(span(SOURCE1, 2)));
    repo.add_value(color, properties::VALUES, red);

    let a = element(&mut repo, &mut source1, ("test", "A"), kernel.class, 3);
    let describe = member(
        &mut repo,
        "describe",
        kernel.qualified_property,
        (a, properties::OWNER, properties::QUALIFIED_PROPERTIES),
        4,
    );

    let doc = element(&mut repo, &mut source1, ("test", "doc"), kernel.profile, 5);
    let todo = member(
        &mut repo,
        "todo",
        kernel.tag,
        (doc, properties::PROFILE, properties::P_TAGS),
        6,
    );
    let legacy = member(
        &mut repo,
        "legacy",
        kernel.stereotype,
        (doc, properties::PROFILE, properties::P_STEREOTYPES),
        7,
    );

    let f = element(
        &mut repo,
        &mut source2,
        ("test", "f"),
        kernel.concrete_function_definition,
        1,
    );
    repo.add_value(f, "expression", red);
    repo.add_value(f, "qualified", describe);
    repo.add_value(f, "taggedValue", todo);
    repo.add_value(f, "stereotypes", legacy);

    Members {
        repo,
        source1,
        source2,
    }
}

#[test]
fn builtin_serializers_cover_enums_qualified_properties_tags_and_stereotypes() {
    let model = members();
    let library = library();
    let serializer = SourceSerializer::new(&model.repo, &library);
    let first = serializer.serialize(&model.source1).unwrap();
    let second = serializer.serialize(&model.source2).unwrap();
    assert_eq!(
        second.result.external_references,
        BTreeSet::from([
            "test::A".to_owned(),
            "test::Color".to_owned(),
            "test::doc".to_owned(),
        ])
    );

    let mut repo = ModelRepository::new();
    let report = load_all(&mut repo, &[&first.bytes, &second.bytes], Default::default());
    assert!(report.unresolved.is_empty());

    let f = repo.get_by_user_path("test::f").unwrap();
    let color = repo.get_by_user_path("test::Color").unwrap();
    let red = repo.value(f, "expression").unwrap();
    assert_eq!(repo.node(red).name(), "RED");
    assert_eq!(repo.node(red).classifier(), Some(color));
    assert_eq!(repo.values(color, properties::VALUES), [red]);

    let a = repo.get_by_user_path("test::A").unwrap();
    let describe = repo.value(f, "qualified").unwrap();
    assert_eq!(repo.node(describe).name(), "describe");
    assert_eq!(repo.values(a, properties::QUALIFIED_PROPERTIES), [describe]);
    assert_eq!(
        repo.node(describe).classifier(),
        repo.get_by_user_path(paths::QUALIFIED_PROPERTY)
    );

    let doc = repo.get_by_user_path("test::doc").unwrap();
    let todo = repo.value(f, "taggedValue").unwrap();
    let legacy = repo.value(f, "stereotypes").unwrap();
    assert_eq!(repo.values(doc, properties::P_TAGS), [todo]);
    assert_eq!(repo.values(doc, properties::P_STEREOTYPES), [legacy]);
    assert_eq!(repo.value(legacy, properties::PROFILE), Some(doc));
    assert_eq!(repo.node(todo).classifier(), Some(repo.kernel().tag));
}

#[test]
fn enum_reference_waits_for_the_enumeration_values() {
    let model = members();
    let library = library();
    let serializer = SourceSerializer::new(&model.repo, &library);
    let first = serializer.serialize(&model.source1).unwrap().bytes;
    let second = serializer.serialize(&model.source2).unwrap().bytes;

    // Loading the referencing unit first still resolves once source1 lands.
    let mut repo = ModelRepository::new();
    let report = load_all(&mut repo, &[&second, &first], Default::default());
    assert!(report.unresolved.is_empty());
    assert!(report.rounds >= 2, "rounds = {}", report.rounds);

    let f = repo.get_by_user_path("test::f").unwrap();
    let red = repo.value(f, "expression").unwrap();
    assert!(repo.is_enum(red));
}
