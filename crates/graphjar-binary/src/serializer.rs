use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use graphjar_config::SerializationConfig;
use graphjar_model::m3::{self, properties};
use graphjar_model::{
    M3StubResolver, ModelRepository, NodeId, RealKey, Source, StubKind, StubResolver,
};
use indexmap::IndexSet;

use crate::codec::BinaryWriter;
use crate::error::SerializeError;
use crate::plugin::{
    ExternalReferenceSerializer, ExternalReferenceSerializerLibrary, SerializationHelper,
};
use crate::reference::write_primitive;
use crate::strings::StringTable;
use crate::tags::{InstanceKindTag, WireTag};
use crate::BINARY_TARGET;

/// What one serialized unit defines and references, by element path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSerializationResult {
    pub source_id: String,
    /// Roots in parser order, followed by other packaged or top-level
    /// elements written by the unit.
    pub defined_instances: Vec<String>,
    /// Packageable elements of other units referenced by path. Kernel
    /// elements are omitted: every repository has them.
    pub external_references: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct SourceSerialization {
    pub bytes: Vec<u8>,
    pub result: SourceSerializationResult,
}

/// Writes the nodes of one source unit.
///
/// The repository is only read. Stubs met on the way are resolved with the
/// configured [`StubResolver`] and their targets are written as if recorded
/// on the stub.
pub struct SourceSerializer<'a> {
    repository: &'a ModelRepository,
    serializers: &'a ExternalReferenceSerializerLibrary,
    stubs: &'a dyn StubResolver,
    config: SerializationConfig,
}

impl<'a> SourceSerializer<'a> {
    pub fn new(
        repository: &'a ModelRepository,
        serializers: &'a ExternalReferenceSerializerLibrary,
    ) -> Self {
        Self {
            repository,
            serializers,
            stubs: &M3StubResolver,
            config: SerializationConfig::default(),
        }
    }

    pub fn with_stub_resolver(mut self, stubs: &'a dyn StubResolver) -> Self {
        self.stubs = stubs;
        self
    }

    pub fn with_config(mut self, config: SerializationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn serialize(&self, source: &Source) -> Result<SourceSerialization, SerializeError> {
        if !source.is_compiled() {
            return Err(SerializeError::SourceNotCompiled {
                source_id: source.id().to_owned(),
            });
        }
        let mut session = Session::new(self, source.id());
        session.serialize_instances(source)?;
        let indexes = session.prepare_main_indexes(source)?;
        let bytes = session.write(source, &indexes)?;

        tracing::debug!(
            target: BINARY_TARGET,
            source_id = source.id(),
            instances = session.internal.len(),
            strings = session.strings.len(),
            bytes = bytes.len(),
            "serialized source"
        );
        Ok(SourceSerialization {
            bytes,
            result: SourceSerializationResult {
                source_id: source.id().to_owned(),
                defined_instances: indexes.defined_instances,
                external_references: session.external_paths,
            },
        })
    }
}

struct MainIndexes {
    parsers: Vec<(i32, Vec<i32>)>,
    other_instances: Vec<i32>,
    defined_instances: Vec<String>,
}

/// State of one `serialize` call.
struct Session<'s, 'a> {
    serializer: &'s SourceSerializer<'a>,
    source_id: &'s str,
    strings: StringTable,

    // Position ids are indexes into `internal`.
    internal: IndexSet<NodeId>,
    instance_bytes: HashMap<NodeId, Vec<u8>>,
    queue: VecDeque<NodeId>,
    serialized: HashSet<NodeId>,
    packaged_or_top_level: Vec<NodeId>,

    external_elements: HashMap<NodeId, i32>,
    external_index: BTreeSet<i32>,
    external_paths: BTreeSet<String>,

    others: IndexSet<NodeId>,
    other_bytes: Vec<Vec<u8>>,

    real_keys: IndexSet<RealKey>,
    resolved_stubs: HashMap<NodeId, NodeId>,
}

impl<'s, 'a> Session<'s, 'a> {
    fn new(serializer: &'s SourceSerializer<'a>, source_id: &'s str) -> Self {
        Self {
            serializer,
            source_id,
            strings: StringTable::new(),
            internal: IndexSet::new(),
            instance_bytes: HashMap::new(),
            queue: VecDeque::new(),
            serialized: HashSet::new(),
            packaged_or_top_level: Vec::new(),
            external_elements: HashMap::new(),
            external_index: BTreeSet::new(),
            external_paths: BTreeSet::new(),
            others: IndexSet::new(),
            other_bytes: Vec::new(),
            real_keys: IndexSet::new(),
            resolved_stubs: HashMap::new(),
        }
    }

    fn repository(&self) -> &'a ModelRepository {
        self.serializer.repository
    }

    fn serializers(&self) -> &'a ExternalReferenceSerializerLibrary {
        self.serializer.serializers
    }

    fn is_from_this_source(&self, node: NodeId) -> bool {
        self.repository().node(node).is_from(self.source_id)
    }

    fn is_from_another_source(&self, node: NodeId) -> bool {
        self.repository()
            .node(node)
            .source_information()
            .is_some_and(|info| info.source_id() != self.source_id)
    }

    fn should_serialize(&self, node: NodeId) -> bool {
        !self.repository().is_package(node) || self.is_from_this_source(node)
    }

    // ---------------------------------------------------------------------
    // Instances

    fn serialize_instances(&mut self, source: &Source) -> Result<(), SerializeError> {
        let repository = self.repository();
        self.queue.extend(source.roots());
        self.queue
            .extend(repository.import_groups_for_source(source.id()));

        while let Some(node) = self.queue.pop_front() {
            if !self.should_serialize(node) || !self.serialized.insert(node) {
                continue;
            }
            self.internal.insert(node);
            let bytes = self
                .serialize_instance(node)
                .map_err(|source| SerializeError::Instance {
                    instance: repository.describe(node),
                    source_information: repository.node(node).source_information().cloned(),
                    source: Box::new(source),
                })?;
            self.instance_bytes.insert(node, bytes);
        }
        Ok(())
    }

    fn serialize_instance(&mut self, node: NodeId) -> Result<Vec<u8>, SerializeError> {
        let repository = self.repository();
        let instance = repository.node(node);
        let mut w = BinaryWriter::new();

        if repository.is_top_level(node) {
            w.write_u8(InstanceKindTag::TopLevel as u8);
            w.write_i32(self.strings.register(instance.name()));
            self.packaged_or_top_level.push(node);
        } else if let Some(package) = repository
            .value(node, properties::PACKAGE)
            .filter(|_| repository.is_packageable_element(node))
        {
            w.write_u8(InstanceKindTag::Packaged as u8);
            w.write_i32(self.strings.register(instance.name()));
            w.write_i32(self.strings.register(&repository.user_path(package)));
            self.packaged_or_top_level.push(node);
        } else if m3::is_anonymous_name(instance.name()) {
            w.write_u8(InstanceKindTag::Anonymous as u8);
        } else if repository.is_enum(node) {
            w.write_u8(InstanceKindTag::Enum as u8);
            w.write_i32(self.strings.register(instance.name()));
        } else {
            w.write_u8(InstanceKindTag::Other as u8);
            w.write_i32(self.strings.register(instance.name()));
        }

        let classifier = instance
            .classifier()
            .ok_or_else(|| SerializeError::MissingClassifier {
                instance: repository.describe(node),
            })?;
        w.write_i32(self.strings.register(&repository.user_path(classifier)));
        self.serialize_reference(&mut w, classifier)?;

        match instance.source_information() {
            Some(info) => {
                w.write_bool(true);
                w.write_i32(info.start_line);
                w.write_i32(info.start_column);
                w.write_i32(info.line);
                w.write_i32(info.column);
                w.write_i32(info.end_line);
                w.write_i32(info.end_column);
            }
            None => w.write_bool(false),
        }

        w.write_i32(instance.compile_states().to_persistent_bits());

        let properties = self.properties_to_write(node);
        w.write_len(properties.len());
        for (real_key, values) in properties {
            self.serialize_property(&mut w, &real_key, &values)
                .map_err(|source| SerializeError::Property {
                    property: real_key.to_string(),
                    source: Box::new(source),
                })?;
        }
        Ok(w.into_vec())
    }

    /// Properties in name order, without back references, with `children`
    /// restricted to this source and stub targets resolved during this call.
    fn properties_to_write(&self, node: NodeId) -> Vec<(RealKey, Vec<NodeId>)> {
        let repository = self.repository();
        let instance = repository.node(node);
        let config = &self.serializer.config;
        let mut written: Vec<(RealKey, Vec<NodeId>)> = instance
            .properties()
            .filter(|property| !config.is_back_reference(property.real_key.name()))
            .map(|property| {
                let values = if property.real_key.name() == properties::CHILDREN {
                    property
                        .values
                        .iter()
                        .copied()
                        .filter(|child| self.is_from_this_source(*child))
                        .collect()
                } else {
                    property.values.clone()
                };
                (property.real_key.clone(), values)
            })
            .collect();

        if let (Some(kind), Some(target)) =
            (repository.stub_kind(node), self.resolved_stubs.get(&node))
        {
            let name = kind.resolved_property();
            if instance.property(name).is_none() {
                written.push((repository.real_key_for(node, name), vec![*target]));
                written.sort_by(|(a, _), (b, _)| a.name().cmp(b.name()));
            }
        }
        written
    }

    fn serialize_property(
        &mut self,
        w: &mut BinaryWriter,
        real_key: &RealKey,
        values: &[NodeId],
    ) -> Result<(), SerializeError> {
        let (id, added) = self.real_keys.insert_full(real_key.clone());
        if added {
            for segment in real_key.segments() {
                self.strings.register(segment);
            }
        }
        w.write_len(id);
        w.write_len(values.len());
        for value in values {
            self.serialize_value(w, *value)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // References

    fn serialize_value(&mut self, w: &mut BinaryWriter, node: NodeId) -> Result<(), SerializeError> {
        let repository = self.repository();
        if let Some(value) = repository.primitive_value(node) {
            write_primitive(w, &mut self.strings, value);
            return Ok(());
        }
        let is_literal_type = repository
            .node(node)
            .classifier()
            .is_some_and(|classifier| repository.kernel().is_literal_type(classifier));
        if is_literal_type {
            return Err(SerializeError::MissingPrimitiveValue {
                instance: repository.describe(node),
            });
        }
        self.serialize_reference(w, node)
    }

    fn serialize_reference(
        &mut self,
        w: &mut BinaryWriter,
        node: NodeId,
    ) -> Result<(), SerializeError> {
        let repository = self.repository();
        if repository.is_package(node) {
            if self.is_from_this_source(node) {
                self.write_internal_reference(w, node);
            } else {
                self.write_package_reference(w, node);
            }
            return Ok(());
        }

        if let Some(kind) = repository.stub_kind(node) {
            self.process_stub(node, kind)?;
        }
        if self.is_from_another_source(node) {
            self.write_external_reference(w, node)
        } else {
            self.write_internal_reference(w, node);
            Ok(())
        }
    }

    /// Nested reference written on behalf of an external reference
    /// serializer.
    fn write_element_reference(
        &mut self,
        w: &mut BinaryWriter,
        node: NodeId,
    ) -> Result<(), SerializeError> {
        if self.repository().is_package(node) {
            self.write_package_reference(w, node);
            Ok(())
        } else if self.is_from_this_source(node) {
            self.write_internal_reference(w, node);
            Ok(())
        } else if self.is_from_another_source(node) {
            self.write_external_reference(w, node)
        } else {
            Err(SerializeError::UndeterminedSource {
                instance: self.repository().describe(node),
            })
        }
    }

    fn process_stub(&mut self, stub: NodeId, kind: StubKind) -> Result<(), SerializeError> {
        let repository = self.repository();
        if repository.resolved_stub_target(stub, kind).is_some()
            || self.resolved_stubs.contains_key(&stub)
        {
            return Ok(());
        }
        let target = self.serializer.stubs.resolve_stub(repository, stub, kind)?;
        tracing::trace!(
            target: BINARY_TARGET,
            stub = %stub,
            target_path = %repository.user_path(target),
            "resolved stub"
        );
        self.resolved_stubs.insert(stub, target);
        Ok(())
    }

    fn write_package_reference(&mut self, w: &mut BinaryWriter, package: NodeId) {
        let path = self.repository().user_path(package);
        w.write_u8(WireTag::PackageReference as u8);
        w.write_i32(self.strings.register(&path));
    }

    fn write_internal_reference(&mut self, w: &mut BinaryWriter, node: NodeId) {
        let (id, _) = self.internal.insert_full(node);
        w.write_u8(WireTag::InternalReference as u8);
        w.write_len(id);
        if !self.serialized.contains(&node) {
            self.queue.push_back(node);
        }
    }

    fn write_external_reference(
        &mut self,
        w: &mut BinaryWriter,
        node: NodeId,
    ) -> Result<(), SerializeError> {
        if let Some(id) = self.external_elements.get(&node) {
            w.write_u8(WireTag::ExternalPackageableElementReference as u8);
            w.write_i32(*id);
            return Ok(());
        }
        if let Some(id) = self.others.get_index_of(&node) {
            w.write_u8(WireTag::ExternalOtherReference as u8);
            w.write_len(id);
            return Ok(());
        }

        let repository = self.repository();
        match self.serializers().find_for(repository, node) {
            Some(serializer) => self.write_other_external_reference(w, node, serializer.as_ref()),
            None if repository.is_packageable_element(node) => {
                self.write_external_element_reference(w, node);
                Ok(())
            }
            None => {
                let classifier = repository
                    .node(node)
                    .classifier()
                    .map(|classifier| repository.user_path(classifier))
                    .unwrap_or_default();
                Err(SerializeError::UnsupportedExternalReference {
                    classifier,
                    instance: repository.describe(node),
                    source_information: repository.node(node).source_information().cloned(),
                })
            }
        }
    }

    fn write_external_element_reference(&mut self, w: &mut BinaryWriter, node: NodeId) {
        let repository = self.repository();
        let path = repository.user_path(node);
        let id = self.strings.register(&path);
        self.external_elements.insert(node, id);
        if !repository.node(node).is_from(m3::KERNEL_SOURCE_ID) {
            self.external_index.insert(id);
            self.external_paths.insert(path);
        }
        w.write_u8(WireTag::ExternalPackageableElementReference as u8);
        w.write_i32(id);
    }

    fn write_other_external_reference(
        &mut self,
        w: &mut BinaryWriter,
        node: NodeId,
        serializer: &dyn ExternalReferenceSerializer,
    ) -> Result<(), SerializeError> {
        let (id, added) = self.others.insert_full(node);
        w.write_u8(WireTag::ExternalOtherReference as u8);
        w.write_len(id);
        if !added {
            return Ok(());
        }

        // Reserve the slot first: the payload may register further
        // references, each with a higher id.
        self.other_bytes.push(Vec::new());
        let mut blob = BinaryWriter::new();
        blob.write_i32(self.strings.register(serializer.type_path()));
        let mut helper = Helper {
            session: &mut *self,
            writer: &mut blob,
        };
        serializer.serialize(node, &mut helper).map_err(|source| {
            let repository = self.repository();
            SerializeError::ExternalSerializer {
                instance: repository.describe(node),
                type_path: serializer.type_path().to_owned(),
                source_information: repository.node(node).source_information().cloned(),
                source: Box::new(source),
            }
        })?;
        self.other_bytes[id] = blob.into_vec();
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Output

    fn prepare_main_indexes(&mut self, source: &Source) -> Result<MainIndexes, SerializeError> {
        let repository = self.repository();
        let mut parsers = Vec::new();
        let mut roots = HashSet::new();
        let mut defined_instances = Vec::new();

        for (parser, elements) in source.elements_by_parser() {
            let parser_id = self.strings.register(parser);
            let mut path_ids = Vec::with_capacity(elements.len());
            for element in elements {
                let path = repository.user_path(*element);
                if !self.serialized.contains(element) {
                    return Err(SerializeError::RootNotSerialized { path });
                }
                path_ids.push(self.strings.register(&path));
                if roots.insert(*element) {
                    defined_instances.push(path);
                }
            }
            parsers.push((parser_id, path_ids));
        }

        let mut other_instances = Vec::new();
        for node in &self.packaged_or_top_level {
            if roots.contains(node) {
                continue;
            }
            let path = repository.user_path(*node);
            other_instances.push(self.strings.register(&path));
            defined_instances.push(path);
        }
        other_instances.sort_unstable();

        Ok(MainIndexes {
            parsers,
            other_instances,
            defined_instances,
        })
    }

    fn write(&mut self, source: &Source, indexes: &MainIndexes) -> Result<Vec<u8>, SerializeError> {
        // Every string must be registered before the table is written.
        let real_keys: Vec<Vec<i32>> = self
            .real_keys
            .iter()
            .map(|real_key| {
                real_key
                    .segments()
                    .iter()
                    .map(|segment| self.strings.register(segment))
                    .collect()
            })
            .collect();

        let mut w = BinaryWriter::new();
        w.write_len(self.strings.len());
        for string in self.strings.iter() {
            w.write_string(string);
        }

        w.write_len(indexes.parsers.len());
        for (parser_id, path_ids) in &indexes.parsers {
            w.write_i32(*parser_id);
            w.write_int_array(path_ids);
        }
        w.write_int_array(&indexes.other_instances);

        let external: Vec<i32> = self.external_index.iter().copied().collect();
        w.write_int_array(&external);

        w.write_string(source.id());
        w.write_bool(source.is_immutable());
        w.write_bool(source.is_in_memory());
        w.write_optional_string(source.content());

        w.write_len(self.other_bytes.len());
        for blob in &self.other_bytes {
            w.write_byte_array(blob);
        }

        w.write_len(real_keys.len());
        for ids in &real_keys {
            w.write_int_array(ids);
        }

        w.write_len(self.internal.len());
        for node in &self.internal {
            let bytes = self.instance_bytes.get(node).ok_or_else(|| {
                SerializeError::RootNotSerialized {
                    path: self.repository().describe(*node),
                }
            })?;
            w.write_byte_array(bytes);
        }
        Ok(w.into_vec())
    }
}

struct Helper<'h, 's, 'a> {
    session: &'h mut Session<'s, 'a>,
    writer: &'h mut BinaryWriter,
}

impl SerializationHelper for Helper<'_, '_, '_> {
    fn repository(&self) -> &ModelRepository {
        self.session.repository()
    }

    fn write_byte(&mut self, value: u8) {
        self.writer.write_u8(value);
    }

    fn write_boolean(&mut self, value: bool) {
        self.writer.write_bool(value);
    }

    fn write_int(&mut self, value: i32) {
        self.writer.write_i32(value);
    }

    fn write_long(&mut self, value: i64) {
        self.writer.write_i64(value);
    }

    fn write_string(&mut self, value: &str) {
        let id = self.session.strings.register(value);
        self.writer.write_i32(id);
    }

    fn write_element_reference(&mut self, element: NodeId) -> Result<(), SerializeError> {
        self.session.write_element_reference(self.writer, element)
    }
}
