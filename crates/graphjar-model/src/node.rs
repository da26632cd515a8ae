use std::collections::BTreeMap;
use std::fmt;

use graphjar_core::SourceInformation;

use crate::compile_state::CompileStates;
use crate::primitive::PrimitiveValue;

/// Handle to a node stored in a [`crate::ModelRepository`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn from_index(index: usize) -> Self {
        // The arena never grows past `u32::MAX` nodes.
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Implementation kind of a node.
///
/// This is the type hint the instance factory registry keys on: loading a
/// serialized top-level or packaged element that already exists in the
/// repository checks that the existing node has the kind expected for the
/// serialized classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImplementationKind {
    Generic,
    Package,
    Class,
    PrimitiveType,
    Enumeration,
    Enum,
    Property,
    Function,
    ImportGroup,
    ImportStub,
    PropertyStub,
    EnumStub,
    Primitive,
}

/// Fully qualified key of a property: the owning type's path segments
/// followed by the property name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RealKey(Vec<String>);

impl RealKey {
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Real key of property `name` declared on the type at `owner_path`.
    pub fn for_property(owner_path: &str, name: &str) -> Self {
        let mut segments = vec![crate::m3::paths::ROOT.to_owned()];
        segments.extend(
            graphjar_core::split_user_path(owner_path)
                .into_iter()
                .map(str::to_owned),
        );
        segments.push(crate::m3::properties::PROPERTIES.to_owned());
        segments.push(name.to_owned());
        Self(segments)
    }

    /// Property name: the last segment of the key.
    pub fn name(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for RealKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub real_key: RealKey,
    pub values: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) classifier: Option<NodeId>,
    pub(crate) kind: ImplementationKind,
    pub(crate) source_information: Option<SourceInformation>,
    pub(crate) compile_states: CompileStates,
    pub(crate) primitive: Option<PrimitiveValue>,
    // Keyed by property name so iteration is in name order.
    pub(crate) properties: BTreeMap<String, Property>,
}

impl Node {
    pub(crate) fn new(name: String, classifier: Option<NodeId>, kind: ImplementationKind) -> Self {
        Self {
            name,
            classifier,
            kind,
            source_information: None,
            compile_states: CompileStates::empty(),
            primitive: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn classifier(&self) -> Option<NodeId> {
        self.classifier
    }

    pub fn set_classifier(&mut self, classifier: NodeId) {
        self.classifier = Some(classifier);
    }

    pub fn kind(&self) -> ImplementationKind {
        self.kind
    }

    pub fn source_information(&self) -> Option<&SourceInformation> {
        self.source_information.as_ref()
    }

    pub fn set_source_information(&mut self, source_information: Option<SourceInformation>) {
        self.source_information = source_information;
    }

    pub fn is_from(&self, source_id: &str) -> bool {
        self.source_information
            .as_ref()
            .is_some_and(|info| info.is_from(source_id))
    }

    pub fn compile_states(&self) -> CompileStates {
        self.compile_states
    }

    pub fn set_compile_states(&mut self, states: CompileStates) {
        self.compile_states = states;
    }

    pub fn primitive(&self) -> Option<&PrimitiveValue> {
        self.primitive.as_ref()
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Properties in name order.
    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn values(&self, name: &str) -> &[NodeId] {
        self.properties
            .get(name)
            .map(|property| property.values.as_slice())
            .unwrap_or_default()
    }

    pub fn value(&self, name: &str) -> Option<NodeId> {
        self.values(name).first().copied()
    }
}
