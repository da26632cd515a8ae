use std::collections::{BTreeMap, HashMap};
use std::ops::AddAssign;
use std::sync::Arc;

use graphjar_core::SourceInformation;
use graphjar_model::{CompileStates, ImplementationKind, ModelRepository, NodeId, RealKey, Source};

use crate::codec::BinaryReader;
use crate::error::{DeserializeError, UnresolvableReference, UnresolvedReference, WireError};
use crate::plugin::{DeserializationHelper, ExternalReferenceSerializerLibrary};
use crate::reference::{read_reference, read_tagged_reference, Reference, ReferenceKind, ResolveContext};
use crate::strings::StringTable;
use crate::tags::{InstanceKindTag, WireTag};
use crate::BINARY_TARGET;

/// Which optional indexes to materialize when reading a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeserializeOptions {
    pub read_instances_by_parser: bool,
    pub read_other_instances: bool,
    pub read_external_references: bool,
}

impl Default for DeserializeOptions {
    fn default() -> Self {
        Self {
            read_instances_by_parser: true,
            read_other_instances: true,
            read_external_references: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDefinition {
    pub id: String,
    pub immutable: bool,
    pub in_memory: bool,
    pub content: Option<String>,
}

/// Everything a unit says about itself without materializing any node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceIndexes {
    pub definition: SourceDefinition,
    /// Parser name -> element paths of the roots it produced.
    pub instances_by_parser: Option<BTreeMap<String, Vec<String>>>,
    /// Packaged or top-level elements written by the unit that no parser
    /// produced directly.
    pub other_instances: Option<Vec<String>>,
    /// Element paths of other units' packageable elements referenced by
    /// this one.
    pub external_references: Option<Vec<String>>,
}

impl SourceIndexes {
    /// Paths of every packaged or top-level element the unit defines, when
    /// both instance indexes were read.
    pub fn defined_instances(&self) -> Option<Vec<String>> {
        let by_parser = self.instances_by_parser.as_ref()?;
        let others = self.other_instances.as_ref()?;
        Some(
            by_parser
                .values()
                .flatten()
                .chain(others)
                .cloned()
                .collect(),
        )
    }
}

/// Reads the string table, the indexes and the source definition only.
pub fn read_indexes(bytes: &[u8]) -> Result<SourceIndexes, DeserializeError> {
    let mut reader = BinaryReader::new(bytes);
    let strings = read_string_table(&mut reader)?;
    Ok(read_index_section(&mut reader, &strings, DeserializeOptions::default())?)
}

pub fn deserialize(
    bytes: &[u8],
    serializers: &ExternalReferenceSerializerLibrary,
) -> Result<DeserializedSource, DeserializeError> {
    deserialize_with(bytes, serializers, DeserializeOptions::default())
}

/// Reads a whole unit into node shells. No node is created until the
/// shells are initialized by a [`crate::GraphLoader`].
pub fn deserialize_with(
    bytes: &[u8],
    serializers: &ExternalReferenceSerializerLibrary,
    options: DeserializeOptions,
) -> Result<DeserializedSource, DeserializeError> {
    let mut reader = BinaryReader::new(bytes);
    let strings = read_string_table(&mut reader)?;
    let indexes = read_index_section(&mut reader, &strings, options)?;

    let other_count = reader.read_len()?;
    let mut others = Vec::new();
    for _ in 0..other_count {
        let blob = reader.read_byte_array()?;
        others.push(read_other_external_reference(
            blob,
            &strings,
            serializers,
            other_count,
        )?);
    }

    let key_count = reader.read_len()?;
    let mut real_keys = Vec::new();
    for _ in 0..key_count {
        let segments = reader
            .read_int_array()?
            .into_iter()
            .map(|id| strings.get(id).map(str::to_owned))
            .collect::<Result<Vec<_>, _>>()?;
        real_keys.push(RealKey::new(segments));
    }

    let source_id: Arc<str> = Arc::from(indexes.definition.id.as_str());
    let instance_count = reader.read_len()?;
    let mut nodes = Vec::new();
    for _ in 0..instance_count {
        let blob = reader.read_byte_array()?;
        let mut cx = InstanceReader {
            reader: BinaryReader::new(blob),
            strings: &strings,
            real_keys: &real_keys,
            other_count,
            source_id: &source_id,
        };
        nodes.push(cx.read_instance()?);
    }

    tracing::debug!(
        target: BINARY_TARGET,
        source_id = %source_id,
        instances = nodes.len(),
        external_references = others.len(),
        "deserialized source"
    );
    Ok(DeserializedSource {
        indexes,
        nodes,
        others,
    })
}

fn read_string_table(reader: &mut BinaryReader<'_>) -> Result<StringTable, WireError> {
    let count = reader.read_len()?;
    let mut strings = Vec::new();
    for _ in 0..count {
        strings.push(reader.read_string()?);
    }
    Ok(StringTable::from_wire(strings))
}

fn read_paths(reader: &mut BinaryReader<'_>, strings: &StringTable) -> Result<Vec<String>, WireError> {
    reader
        .read_int_array()?
        .into_iter()
        .map(|id| strings.get(id).map(str::to_owned))
        .collect()
}

fn read_index_section(
    reader: &mut BinaryReader<'_>,
    strings: &StringTable,
    options: DeserializeOptions,
) -> Result<SourceIndexes, WireError> {
    let parser_count = reader.read_len()?;
    let instances_by_parser = if options.read_instances_by_parser {
        let mut by_parser = BTreeMap::new();
        for _ in 0..parser_count {
            let parser = strings.get(reader.read_i32()?)?.to_owned();
            by_parser.insert(parser, read_paths(reader, strings)?);
        }
        Some(by_parser)
    } else {
        for _ in 0..parser_count {
            reader.read_i32()?;
            reader.skip_int_array()?;
        }
        None
    };

    let other_instances = if options.read_other_instances {
        Some(read_paths(reader, strings)?)
    } else {
        reader.skip_int_array()?;
        None
    };

    let external_references = if options.read_external_references {
        Some(read_paths(reader, strings)?)
    } else {
        reader.skip_int_array()?;
        None
    };

    let definition = SourceDefinition {
        id: reader.read_string()?,
        immutable: reader.read_bool()?,
        in_memory: reader.read_bool()?,
        content: reader.read_optional_string()?,
    };

    Ok(SourceIndexes {
        definition,
        instances_by_parser,
        other_instances,
        external_references,
    })
}

fn read_other_external_reference(
    blob: &[u8],
    strings: &StringTable,
    serializers: &ExternalReferenceSerializerLibrary,
    other_count: usize,
) -> Result<Reference, DeserializeError> {
    let mut helper = BlobHelper {
        reader: BinaryReader::new(blob),
        strings,
        other_count,
    };
    let type_path = strings.get(helper.reader.read_i32()?)?;
    let serializer = serializers
        .get(type_path)
        .ok_or_else(|| DeserializeError::MissingSerializer {
            type_path: type_path.to_owned(),
        })?;
    serializer.deserialize(&mut helper)
}

fn check_other_id(reference: &Reference, other_count: usize) -> Result<(), WireError> {
    match reference.kind() {
        ReferenceKind::OtherExternal(id) if *id >= other_count => {
            Err(WireError::UnknownOtherReferenceId {
                id: *id,
                count: other_count,
            })
        }
        _ => Ok(()),
    }
}

struct BlobHelper<'b, 's> {
    reader: BinaryReader<'b>,
    strings: &'s StringTable,
    other_count: usize,
}

impl DeserializationHelper for BlobHelper<'_, '_> {
    fn read_byte(&mut self) -> Result<u8, WireError> {
        self.reader.read_u8()
    }

    fn read_boolean(&mut self) -> Result<bool, WireError> {
        self.reader.read_bool()
    }

    fn read_int(&mut self) -> Result<i32, WireError> {
        self.reader.read_i32()
    }

    fn read_long(&mut self) -> Result<i64, WireError> {
        self.reader.read_i64()
    }

    fn read_string(&mut self) -> Result<String, WireError> {
        let id = self.reader.read_i32()?;
        self.strings.get(id).map(str::to_owned)
    }

    fn read_element_reference(&mut self) -> Result<Reference, DeserializeError> {
        let tag = self.reader.read_u8()?;
        match WireTag::try_from(tag)? {
            wire_tag @ (WireTag::PackageReference
            | WireTag::InternalReference
            | WireTag::ExternalPackageableElementReference
            | WireTag::ExternalOtherReference) => {
                let reference = read_tagged_reference(wire_tag, &mut self.reader, self.strings)?;
                check_other_id(&reference, self.other_count)?;
                Ok(reference)
            }
            _ => Err(DeserializeError::UnsupportedElementReference { tag }),
        }
    }
}

struct InstanceReader<'r> {
    reader: BinaryReader<'r>,
    strings: &'r StringTable,
    real_keys: &'r [RealKey],
    other_count: usize,
    source_id: &'r Arc<str>,
}

impl InstanceReader<'_> {
    fn string(&mut self) -> Result<String, WireError> {
        let id = self.reader.read_i32()?;
        self.strings.get(id).map(str::to_owned)
    }

    fn reference(&mut self) -> Result<Reference, WireError> {
        let reference = read_reference(&mut self.reader, self.strings)?;
        check_other_id(&reference, self.other_count)?;
        Ok(reference)
    }

    fn read_instance(&mut self) -> Result<InternalNode, WireError> {
        let kind = InstanceKindTag::try_from(self.reader.read_u8()?)?;
        let (name, package) = match kind {
            InstanceKindTag::Anonymous => (None, None),
            InstanceKindTag::Packaged => {
                let name = self.string()?;
                let package = self.string()?;
                (Some(name), Some(Reference::package(package)))
            }
            InstanceKindTag::TopLevel | InstanceKindTag::Enum | InstanceKindTag::Other => {
                (Some(self.string()?), None)
            }
        };

        let classifier_path = self.string()?;
        let classifier = self.reference()?;

        let source_information = if self.reader.read_bool()? {
            Some(SourceInformation::new(
                Arc::clone(self.source_id),
                self.reader.read_i32()?,
                self.reader.read_i32()?,
                self.reader.read_i32()?,
                self.reader.read_i32()?,
                self.reader.read_i32()?,
                self.reader.read_i32()?,
            ))
        } else {
            None
        };
        let compile_states = CompileStates::from_persistent_bits(self.reader.read_i32()?);

        let property_count = self.reader.read_len()?;
        let mut properties = Vec::new();
        for _ in 0..property_count {
            let key_id = self.reader.read_i32()?;
            let real_key = usize::try_from(key_id)
                .ok()
                .and_then(|index| self.real_keys.get(index))
                .ok_or(WireError::UnknownRealKeyId {
                    id: key_id,
                    count: self.real_keys.len(),
                })?
                .clone();
            let value_count = self.reader.read_len()?;
            let mut values = Vec::new();
            for _ in 0..value_count {
                values.push(self.reference()?);
            }
            properties.push((real_key, values));
        }

        Ok(InternalNode {
            kind,
            name,
            package,
            classifier_path,
            classifier,
            source_information,
            compile_states,
            properties,
            instance: None,
        })
    }
}

/// Counts from one resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionResult {
    pub newly_resolved: usize,
    pub unresolved: usize,
}

impl AddAssign for ResolutionResult {
    fn add_assign(&mut self, rhs: Self) {
        self.newly_resolved += rhs.newly_resolved;
        self.unresolved += rhs.unresolved;
    }
}

/// A serialized instance waiting to be materialized and linked.
#[derive(Debug)]
pub struct InternalNode {
    kind: InstanceKindTag,
    name: Option<String>,
    package: Option<Reference>,
    classifier_path: String,
    classifier: Reference,
    source_information: Option<SourceInformation>,
    compile_states: CompileStates,
    // Properties not yet committed to the instance.
    properties: Vec<(RealKey, Vec<Reference>)>,
    instance: Option<NodeId>,
}

impl InternalNode {
    pub fn kind(&self) -> InstanceKindTag {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn classifier_path(&self) -> &str {
        &self.classifier_path
    }

    /// The repository node, once initialized.
    pub fn instance(&self) -> Option<NodeId> {
        self.instance
    }

    pub fn has_pending_properties(&self) -> bool {
        !self.properties.is_empty()
    }

    fn describe(&self) -> String {
        let mut description = match (&self.name, self.kind) {
            (Some(name), kind) if kind != InstanceKindTag::Anonymous => {
                format!("instance '{name}'")
            }
            _ => "anonymous instance".to_owned(),
        };
        description.push_str(" (classifier=");
        description.push_str(&self.classifier_path);
        if let Some(info) = &self.source_information {
            description.push_str(&format!(", source information={info}"));
        }
        description.push(')');
        description
    }

    /// Creates the node, or matches an existing top-level or packaged node
    /// of the same name.
    pub fn initialize_instance(
        &mut self,
        repository: &mut ModelRepository,
    ) -> Result<NodeId, DeserializeError> {
        let instance = match self.kind {
            InstanceKindTag::TopLevel => self.create_top_level(repository)?,
            InstanceKindTag::Packaged => self.create_packaged(repository)?,
            InstanceKindTag::Enum => {
                self.create_in_repository(repository, Some(ImplementationKind::Enum))
            }
            InstanceKindTag::Anonymous | InstanceKindTag::Other => {
                self.create_in_repository(repository, None)
            }
        };
        self.instance = Some(instance);
        Ok(instance)
    }

    fn create_in_repository(
        &self,
        repository: &mut ModelRepository,
        kind_hint: Option<ImplementationKind>,
    ) -> NodeId {
        let name = match &self.name {
            Some(name) => name.clone(),
            None => repository.next_anonymous_name(),
        };
        let kind = kind_hint
            .or_else(|| repository.implementations().kind_for(&self.classifier_path))
            .unwrap_or(ImplementationKind::Generic);
        let id = repository.new_node_with_kind(name, None, kind);
        self.update_existing(repository, id);
        id
    }

    fn update_existing(&self, repository: &mut ModelRepository, id: NodeId) {
        let node = repository.node_mut(id);
        node.set_source_information(self.source_information.clone());
        node.set_compile_states(self.compile_states);
    }

    fn check_kind(
        &self,
        repository: &ModelRepository,
        existing: NodeId,
    ) -> Result<(), DeserializeError> {
        let Some(expected) = repository.implementations().kind_for(&self.classifier_path) else {
            return Ok(());
        };
        let found = repository.node(existing).kind();
        if found != expected {
            return Err(DeserializeError::TypeMismatch {
                path: repository.user_path(existing),
                expected,
                found,
            });
        }
        Ok(())
    }

    fn create_top_level(&self, repository: &mut ModelRepository) -> Result<NodeId, DeserializeError> {
        let name = self.name.as_deref().unwrap_or_default();
        match repository.top_level(name) {
            Some(existing) => {
                self.check_kind(repository, existing)?;
                self.update_existing(repository, existing);
                Ok(existing)
            }
            None => {
                let id = self.create_in_repository(repository, None);
                repository.add_top_level(id)?;
                Ok(id)
            }
        }
    }

    fn create_packaged(
        &mut self,
        repository: &mut ModelRepository,
    ) -> Result<NodeId, DeserializeError> {
        let outcome = match self.package.as_mut() {
            Some(package) => {
                let mut cx = ResolveContext::new(repository, &[], &[]);
                match package.resolve(&mut cx) {
                    Ok(true) => package
                        .resolved()
                        .ok_or_else(|| UnresolvableReference::new(format!("{package} not found"))),
                    Ok(false) => Err(UnresolvableReference::new(format!("{package} not found"))),
                    Err(err) => Err(err),
                }
            }
            None => Err(UnresolvableReference::new("no package recorded")),
        };
        let parent = outcome.map_err(|source| DeserializeError::Package {
            instance: self.describe(),
            source,
        })?;

        let name = self.name.as_deref().unwrap_or_default();
        match repository.find_in_package(parent, name) {
            Some(existing) => {
                self.check_kind(repository, existing)?;
                self.update_existing(repository, existing);
                Ok(existing)
            }
            None => {
                let child = self.create_in_repository(repository, None);
                repository.link_child(parent, child);
                Ok(child)
            }
        }
    }

    /// Resolves the classifier (for nodes that lack one) and every pending
    /// property value.
    pub fn resolve_references(
        &mut self,
        cx: &mut ResolveContext<'_>,
    ) -> Result<ResolutionResult, DeserializeError> {
        let mut result = ResolutionResult::default();
        let Some(instance) = self.instance else {
            return Ok(result);
        };

        if cx.repository.node(instance).classifier().is_none() {
            match self.classifier.resolve(cx) {
                Ok(true) => {
                    if let Some(classifier) = self.classifier.resolved() {
                        cx.repository.node_mut(instance).set_classifier(classifier);
                    }
                    result.newly_resolved += 1;
                }
                Ok(false) => result.unresolved += 1,
                Err(source) => {
                    return Err(DeserializeError::Classifier {
                        classifier_path: self.classifier_path.clone(),
                        instance: self.describe(),
                        source,
                    })
                }
            }
        }

        let mut failure = None;
        'properties: for (real_key, values) in &mut self.properties {
            for (index, reference) in values.iter_mut().enumerate() {
                if reference.is_resolved() {
                    continue;
                }
                match reference.resolve(cx) {
                    Ok(true) => result.newly_resolved += 1,
                    Ok(false) => result.unresolved += 1,
                    Err(source) => {
                        failure = Some((index, real_key.name().to_owned(), source));
                        break 'properties;
                    }
                }
            }
        }
        if let Some((index, property, source)) = failure {
            return Err(DeserializeError::PropertyValue {
                index,
                property,
                instance: self.describe(),
                source,
            });
        }
        Ok(result)
    }

    /// Commits every property whose values are all resolved, merging with
    /// values the node already has.
    pub fn populate_resolved_properties(
        &mut self,
        repository: &mut ModelRepository,
    ) -> Result<(), DeserializeError> {
        let Some(instance) = self.instance else {
            return Ok(());
        };
        let mut pending = Vec::new();
        for (real_key, references) in std::mem::take(&mut self.properties) {
            if !references.iter().all(Reference::is_resolved) {
                pending.push((real_key, references));
                continue;
            }
            let serialized: Vec<NodeId> = references.iter().filter_map(Reference::resolved).collect();
            let existing = repository.values(instance, real_key.name()).to_vec();
            if existing.is_empty() {
                repository.set_values(instance, real_key, serialized);
                continue;
            }

            let mut by_name: HashMap<String, NodeId> = serialized
                .iter()
                .map(|value| (repository.node(*value).name().to_owned(), *value))
                .collect();
            let mut all = serialized;
            for value in existing {
                let name = repository.node(value).name().to_owned();
                match by_name.insert(name.clone(), value) {
                    None => all.push(value),
                    Some(other) if other != value => {
                        return Err(DeserializeError::DuplicateValueName {
                            property: real_key.name().to_owned(),
                            instance: repository.describe(instance),
                            name,
                        });
                    }
                    Some(_) => {}
                }
            }
            repository.set_values(instance, real_key, all);
        }
        self.properties = pending;
        Ok(())
    }

    pub fn collect_unresolved(
        &self,
        repository: &ModelRepository,
        source_id: &str,
        target: &mut Vec<UnresolvedReference>,
    ) {
        let needs_classifier = match self.instance {
            Some(instance) => repository.node(instance).classifier().is_none(),
            None => true,
        };
        if needs_classifier && !self.classifier.is_resolved() {
            target.push(UnresolvedReference {
                source_id: source_id.to_owned(),
                instance: self.describe(),
                property: None,
                index: 0,
                reference: self.classifier.to_string(),
            });
        }
        for (real_key, values) in &self.properties {
            for (index, reference) in values.iter().enumerate() {
                if !reference.is_resolved() {
                    target.push(UnresolvedReference {
                        source_id: source_id.to_owned(),
                        instance: self.describe(),
                        property: Some(real_key.name().to_owned()),
                        index,
                        reference: reference.to_string(),
                    });
                }
            }
        }
    }
}

/// A unit read back from bytes: its indexes, the instance shells by
/// position and its external reference table.
#[derive(Debug)]
pub struct DeserializedSource {
    indexes: SourceIndexes,
    nodes: Vec<InternalNode>,
    others: Vec<Reference>,
}

impl DeserializedSource {
    pub fn source_id(&self) -> &str {
        &self.indexes.definition.id
    }

    pub fn definition(&self) -> &SourceDefinition {
        &self.indexes.definition
    }

    pub fn indexes(&self) -> &SourceIndexes {
        &self.indexes
    }

    pub fn nodes(&self) -> &[InternalNode] {
        &self.nodes
    }

    /// The unit as a [`Source`], with parser roots looked up by path in
    /// `repository`. Roots that cannot be found are left out.
    pub fn to_source(&self, repository: &ModelRepository) -> Source {
        let definition = &self.indexes.definition;
        let mut source = Source::new(definition.id.clone(), definition.content.clone())
            .with_immutable(definition.immutable)
            .with_in_memory(definition.in_memory);
        if let Some(by_parser) = &self.indexes.instances_by_parser {
            for (parser, paths) in by_parser {
                for element in paths.iter().filter_map(|path| repository.get_by_user_path(path)) {
                    source.add_element(parser.as_str(), element);
                }
            }
        }
        source.set_compiled(true);
        source
    }

    /// Initialized repository nodes, by position.
    pub fn instances(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().filter_map(InternalNode::instance)
    }

    pub fn initialize(&mut self, repository: &mut ModelRepository) -> Result<(), DeserializeError> {
        for node in &mut self.nodes {
            if node.instance.is_none() {
                node.initialize_instance(repository)?;
            }
        }
        Ok(())
    }

    /// One resolution pass over the external reference table and every
    /// shell.
    pub fn resolve_references(
        &mut self,
        repository: &mut ModelRepository,
    ) -> Result<ResolutionResult, DeserializeError> {
        let internal: Vec<Option<NodeId>> = self.nodes.iter().map(InternalNode::instance).collect();
        let mut others: Vec<Option<NodeId>> = self.others.iter().map(Reference::resolved).collect();
        let mut result = ResolutionResult::default();

        for (id, other) in self.others.iter_mut().enumerate() {
            if other.is_resolved() {
                continue;
            }
            let mut cx = ResolveContext::new(repository, &internal, &others);
            let resolved = other
                .resolve(&mut cx)
                .map_err(|source| DeserializeError::ExternalReference {
                    id,
                    reference: other.to_string(),
                    source,
                })?;
            if resolved {
                others[id] = other.resolved();
                result.newly_resolved += 1;
            } else {
                result.unresolved += 1;
            }
        }

        let mut cx = ResolveContext::new(repository, &internal, &others);
        for node in &mut self.nodes {
            result += node.resolve_references(&mut cx)?;
        }
        Ok(result)
    }

    pub fn populate_resolved_properties(
        &mut self,
        repository: &mut ModelRepository,
    ) -> Result<(), DeserializeError> {
        for node in &mut self.nodes {
            node.populate_resolved_properties(repository)?;
        }
        Ok(())
    }

    pub fn collect_unresolved(&self, repository: &ModelRepository) -> Vec<UnresolvedReference> {
        let mut unresolved = Vec::new();
        for node in &self.nodes {
            node.collect_unresolved(repository, self.source_id(), &mut unresolved);
        }
        unresolved
    }
}
