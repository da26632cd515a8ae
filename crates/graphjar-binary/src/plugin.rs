//! Per-type codecs for external references that are not plain packageable
//! elements.
//!
//! A serializer is looked up by walking the referenced node's classifier
//! generalization order; the first registered type path wins. Its payload is
//! stored once per unit and referenced by position from property values.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use graphjar_model::m3::{paths, properties};
use graphjar_model::{ModelRepository, NodeId};

use crate::error::{DeserializeError, SerializeError, UnresolvableReference, WireError};
use crate::reference::{ExternalReference, Reference, ResolveContext};

/// Writing side handed to [`ExternalReferenceSerializer::serialize`].
///
/// Strings are interned in the unit's string table. Element references use
/// the same package/internal/external classification as property values.
pub trait SerializationHelper {
    fn repository(&self) -> &ModelRepository;
    fn write_byte(&mut self, value: u8);
    fn write_boolean(&mut self, value: bool);
    fn write_int(&mut self, value: i32);
    fn write_long(&mut self, value: i64);
    fn write_string(&mut self, value: &str);
    fn write_element_reference(&mut self, element: NodeId) -> Result<(), SerializeError>;
}

/// Reading side handed to [`ExternalReferenceSerializer::deserialize`].
pub trait DeserializationHelper {
    fn read_byte(&mut self) -> Result<u8, WireError>;
    fn read_boolean(&mut self) -> Result<bool, WireError>;
    fn read_int(&mut self) -> Result<i32, WireError>;
    fn read_long(&mut self) -> Result<i64, WireError>;
    fn read_string(&mut self) -> Result<String, WireError>;
    fn read_element_reference(&mut self) -> Result<Reference, DeserializeError>;
}

pub trait ExternalReferenceSerializer: Send + Sync {
    /// Path of the type whose instances this serializer handles.
    fn type_path(&self) -> &str;

    fn serialize(
        &self,
        instance: NodeId,
        helper: &mut dyn SerializationHelper,
    ) -> Result<(), SerializeError>;

    fn deserialize(
        &self,
        helper: &mut dyn DeserializationHelper,
    ) -> Result<Reference, DeserializeError>;
}

/// Registry of [`ExternalReferenceSerializer`]s keyed by type path.
#[derive(Clone, Default)]
pub struct ExternalReferenceSerializerLibrary {
    serializers: HashMap<String, Arc<dyn ExternalReferenceSerializer>>,
}

impl ExternalReferenceSerializerLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Library with the serializers every repository needs.
    pub fn with_builtin() -> Self {
        let mut library = Self::new();
        library.register(EnumExternalReferenceSerializer);
        library.register(PropertyExternalReferenceSerializer);
        library.register(QualifiedPropertyExternalReferenceSerializer);
        library.register(TagExternalReferenceSerializer);
        library.register(StereotypeExternalReferenceSerializer);
        library
    }

    /// Registers `serializer`, returning the one it replaces.
    pub fn register(
        &mut self,
        serializer: impl ExternalReferenceSerializer + 'static,
    ) -> Option<Arc<dyn ExternalReferenceSerializer>> {
        let serializer: Arc<dyn ExternalReferenceSerializer> = Arc::new(serializer);
        self.serializers
            .insert(serializer.type_path().to_owned(), serializer)
    }

    pub fn get(&self, type_path: &str) -> Option<&Arc<dyn ExternalReferenceSerializer>> {
        self.serializers.get(type_path)
    }

    pub fn len(&self) -> usize {
        self.serializers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.serializers.is_empty()
    }

    /// Serializer for `instance`, searching its classifier's generalizations
    /// in resolution order. Enum values fall back to the serializer for
    /// [`paths::ENUM`].
    pub fn find_for(
        &self,
        repository: &ModelRepository,
        instance: NodeId,
    ) -> Option<&Arc<dyn ExternalReferenceSerializer>> {
        let classifier = repository.node(instance).classifier()?;
        repository
            .generalization_order(classifier)
            .into_iter()
            .find_map(|type_node| self.get(&repository.user_path(type_node)))
            .or_else(|| {
                repository
                    .is_enum(instance)
                    .then(|| self.get(paths::ENUM))
                    .flatten()
            })
    }
}

impl fmt::Debug for ExternalReferenceSerializerLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut type_paths: Vec<&str> = self.serializers.keys().map(String::as_str).collect();
        type_paths.sort_unstable();
        f.debug_struct("ExternalReferenceSerializerLibrary")
            .field("type_paths", &type_paths)
            .finish()
    }
}

/// Owned nodes that are not packageable elements are referenced as (owner,
/// name) and resolved by name among the owner's values for `collection`.
#[derive(Debug)]
struct MemberReference {
    owner: Reference,
    name: String,
    collection: &'static str,
    label: &'static str,
}

impl ExternalReference for MemberReference {
    fn resolve(
        &mut self,
        cx: &mut ResolveContext<'_>,
    ) -> Result<Option<NodeId>, UnresolvableReference> {
        if !self.owner.resolve(cx)? {
            return Ok(None);
        }
        let Some(owner) = self.owner.resolved() else {
            return Ok(None);
        };
        let repository = &*cx.repository;
        Ok(repository
            .values(owner, self.collection)
            .iter()
            .copied()
            .find(|member| repository.node(*member).name() == self.name))
    }

    fn describe(&self) -> String {
        format!("{} '{}' of {}", self.label, self.name, self.owner)
    }
}

fn write_member(
    helper: &mut dyn SerializationHelper,
    instance: NodeId,
    owner_property: &str,
) -> Result<(), SerializeError> {
    let repository = helper.repository();
    let owner = repository.value(instance, owner_property).ok_or_else(|| {
        SerializeError::Custom(format!(
            "{} has no {owner_property}",
            repository.describe(instance)
        ))
    })?;
    let name = repository.node(instance).name().to_owned();
    helper.write_element_reference(owner)?;
    helper.write_string(&name);
    Ok(())
}

fn read_member(
    helper: &mut dyn DeserializationHelper,
    collection: &'static str,
    label: &'static str,
) -> Result<Reference, DeserializeError> {
    let owner = helper.read_element_reference()?;
    let name = helper.read_string()?;
    Ok(Reference::custom(MemberReference {
        owner,
        name,
        collection,
        label,
    }))
}

/// Properties are referenced as (owner, property name).
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyExternalReferenceSerializer;

impl ExternalReferenceSerializer for PropertyExternalReferenceSerializer {
    fn type_path(&self) -> &str {
        paths::PROPERTY
    }

    fn serialize(
        &self,
        instance: NodeId,
        helper: &mut dyn SerializationHelper,
    ) -> Result<(), SerializeError> {
        write_member(helper, instance, properties::OWNER)
    }

    fn deserialize(
        &self,
        helper: &mut dyn DeserializationHelper,
    ) -> Result<Reference, DeserializeError> {
        read_member(helper, properties::PROPERTIES, "property")
    }
}

/// Qualified properties are referenced as (owner, name) and found among the
/// owner's `qualifiedProperties`.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualifiedPropertyExternalReferenceSerializer;

impl ExternalReferenceSerializer for QualifiedPropertyExternalReferenceSerializer {
    fn type_path(&self) -> &str {
        paths::QUALIFIED_PROPERTY
    }

    fn serialize(
        &self,
        instance: NodeId,
        helper: &mut dyn SerializationHelper,
    ) -> Result<(), SerializeError> {
        write_member(helper, instance, properties::OWNER)
    }

    fn deserialize(
        &self,
        helper: &mut dyn DeserializationHelper,
    ) -> Result<Reference, DeserializeError> {
        read_member(helper, properties::QUALIFIED_PROPERTIES, "qualified property")
    }
}

/// Enum values are referenced as (enumeration, value name).
///
/// Values are classified by their enumeration, so this serializer is found
/// through [`ExternalReferenceSerializerLibrary::find_for`]'s enum fallback
/// rather than a generalization.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnumExternalReferenceSerializer;

impl ExternalReferenceSerializer for EnumExternalReferenceSerializer {
    fn type_path(&self) -> &str {
        paths::ENUM
    }

    fn serialize(
        &self,
        instance: NodeId,
        helper: &mut dyn SerializationHelper,
    ) -> Result<(), SerializeError> {
        let repository = helper.repository();
        let enumeration = repository.node(instance).classifier().ok_or_else(|| {
            SerializeError::Custom(format!(
                "enum {} has no enumeration",
                repository.describe(instance)
            ))
        })?;
        let name = repository.node(instance).name().to_owned();
        helper.write_element_reference(enumeration)?;
        helper.write_string(&name);
        Ok(())
    }

    fn deserialize(
        &self,
        helper: &mut dyn DeserializationHelper,
    ) -> Result<Reference, DeserializeError> {
        read_member(helper, properties::VALUES, "enum")
    }
}

/// Tags are referenced as (profile, tag value).
#[derive(Debug, Clone, Copy, Default)]
pub struct TagExternalReferenceSerializer;

impl ExternalReferenceSerializer for TagExternalReferenceSerializer {
    fn type_path(&self) -> &str {
        paths::TAG
    }

    fn serialize(
        &self,
        instance: NodeId,
        helper: &mut dyn SerializationHelper,
    ) -> Result<(), SerializeError> {
        write_member(helper, instance, properties::PROFILE)
    }

    fn deserialize(
        &self,
        helper: &mut dyn DeserializationHelper,
    ) -> Result<Reference, DeserializeError> {
        read_member(helper, properties::P_TAGS, "tag")
    }
}

/// Stereotypes are referenced as (profile, stereotype value).
#[derive(Debug, Clone, Copy, Default)]
pub struct StereotypeExternalReferenceSerializer;

impl ExternalReferenceSerializer for StereotypeExternalReferenceSerializer {
    fn type_path(&self) -> &str {
        paths::STEREOTYPE
    }

    fn serialize(
        &self,
        instance: NodeId,
        helper: &mut dyn SerializationHelper,
    ) -> Result<(), SerializeError> {
        write_member(helper, instance, properties::PROFILE)
    }

    fn deserialize(
        &self,
        helper: &mut dyn DeserializationHelper,
    ) -> Result<Reference, DeserializeError> {
        read_member(helper, properties::P_STEREOTYPES, "stereotype")
    }
}
