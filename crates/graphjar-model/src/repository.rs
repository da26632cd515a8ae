use std::collections::{HashMap, HashSet, VecDeque};

use graphjar_core::SourceInformation;
use indexmap::IndexMap;

use crate::error::{ModelError, Result};
use crate::kernel::{self, ImplementationRegistry, Kernel};
use crate::m3::{self, paths, properties};
use crate::node::{ImplementationKind, Node, NodeId, Property, RealKey};
use crate::primitive::{IntegerValue, PrimitiveValue};

const MODEL_TARGET: &str = "graphjar.model";

/// Arena holding every node of a compiled model.
///
/// Nodes are addressed by [`NodeId`]; ids handed out by one repository are
/// only meaningful for that repository.
#[derive(Debug, Clone)]
pub struct ModelRepository {
    nodes: Vec<Node>,
    top_levels: IndexMap<String, NodeId>,
    strings: HashMap<String, NodeId>,
    booleans: [Option<NodeId>; 2],
    anonymous_count: u64,
    kernel: Kernel,
    implementations: ImplementationRegistry,
}

impl Default for ModelRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelRepository {
    /// Creates a repository holding the kernel metamodel.
    pub fn new() -> Self {
        let mut repo = Self {
            nodes: Vec::new(),
            top_levels: IndexMap::new(),
            strings: HashMap::new(),
            booleans: [None, None],
            anonymous_count: 0,
            kernel: Kernel::default(),
            implementations: ImplementationRegistry::default(),
        };
        repo.kernel = kernel::bootstrap(&mut repo);
        repo
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub(crate) fn kernel_mut(&mut self) -> &mut Kernel {
        &mut self.kernel
    }

    pub fn implementations(&self) -> &ImplementationRegistry {
        &self.implementations
    }

    pub fn implementations_mut(&mut self) -> &mut ImplementationRegistry {
        &mut self.implementations
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// # Panics
    ///
    /// Panics if `id` was not handed out by this repository.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub(crate) fn push_node(&mut self, node: Node) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(node);
        id
    }

    // ---------------------------------------------------------------------
    // Node creation

    /// Creates a node with an explicit implementation kind. The classifier
    /// may be filled in later.
    pub fn new_node_with_kind(
        &mut self,
        name: impl Into<String>,
        classifier: Option<NodeId>,
        kind: ImplementationKind,
    ) -> NodeId {
        self.push_node(Node::new(name.into(), classifier, kind))
    }

    /// Creates a node whose kind is derived from its classifier.
    pub fn new_node(&mut self, name: impl Into<String>, classifier: NodeId) -> NodeId {
        let kind = self.kind_for_classifier(classifier);
        self.new_node_with_kind(name, Some(classifier), kind)
    }

    pub fn new_anonymous(&mut self, classifier: NodeId) -> NodeId {
        let name = self.next_anonymous_name();
        self.new_node(name, classifier)
    }

    pub fn next_anonymous_name(&mut self) -> String {
        self.anonymous_count += 1;
        format!("{}{}", m3::ANONYMOUS_NAME_PREFIX, self.anonymous_count)
    }

    fn kind_for_classifier(&self, classifier: NodeId) -> ImplementationKind {
        if classifier == self.kernel.enumeration {
            return ImplementationKind::Enumeration;
        }
        if self.node(classifier).classifier() == Some(self.kernel.enumeration) {
            return ImplementationKind::Enum;
        }
        self.implementations
            .kind_for(&self.user_path(classifier))
            .unwrap_or(ImplementationKind::Generic)
    }

    // ---------------------------------------------------------------------
    // Top levels

    pub fn top_level(&self, name: &str) -> Option<NodeId> {
        self.top_levels.get(name).copied()
    }

    pub fn is_top_level(&self, id: NodeId) -> bool {
        self.top_levels.get(self.node(id).name()) == Some(&id)
    }

    pub fn top_levels(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.top_levels.values().copied()
    }

    pub fn add_top_level(&mut self, id: NodeId) -> Result<()> {
        let name = self.node(id).name().to_owned();
        match self.top_levels.get(&name) {
            Some(existing) if *existing != id => Err(ModelError::DuplicateTopLevel { name }),
            Some(_) => Ok(()),
            None => {
                self.top_levels.insert(name, id);
                Ok(())
            }
        }
    }

    pub(crate) fn insert_top_level(&mut self, name: &str, id: NodeId) {
        self.top_levels.insert(name.to_owned(), id);
    }

    // ---------------------------------------------------------------------
    // Primitive values

    /// Node holding `value`. Strings and booleans are shared; other literals
    /// get a fresh node.
    pub fn new_primitive(&mut self, value: PrimitiveValue) -> NodeId {
        match &value {
            PrimitiveValue::String(text) => {
                if let Some(id) = self.strings.get(text) {
                    return *id;
                }
            }
            PrimitiveValue::Boolean(flag) => {
                if let Some(id) = self.booleans[usize::from(*flag)] {
                    return id;
                }
            }
            _ => {}
        }

        let classifier = self.kernel.primitive_type_of(&value);
        let id = self.new_node_with_kind(
            value.literal(),
            Some(classifier),
            ImplementationKind::Primitive,
        );
        match &value {
            PrimitiveValue::String(text) => {
                self.strings.insert(text.clone(), id);
            }
            PrimitiveValue::Boolean(flag) => self.booleans[usize::from(*flag)] = Some(id),
            _ => {}
        }
        self.node_mut(id).primitive = Some(value);
        id
    }

    pub fn new_string(&mut self, value: &str) -> NodeId {
        self.new_primitive(PrimitiveValue::String(value.to_owned()))
    }

    pub fn new_boolean(&mut self, value: bool) -> NodeId {
        self.new_primitive(PrimitiveValue::Boolean(value))
    }

    pub fn new_integer(&mut self, value: impl Into<IntegerValue>) -> NodeId {
        self.new_primitive(PrimitiveValue::Integer(value.into()))
    }

    pub fn primitive_value(&self, id: NodeId) -> Option<&PrimitiveValue> {
        self.node(id).primitive()
    }

    pub fn string_value(&self, id: NodeId) -> Option<&str> {
        match self.node(id).primitive() {
            Some(PrimitiveValue::String(text)) => Some(text),
            _ => None,
        }
    }

    // ---------------------------------------------------------------------
    // Properties

    /// Real key for property `name` on `owner`, derived from the owner's
    /// classifier.
    pub fn real_key_for(&self, owner: NodeId, name: &str) -> RealKey {
        match self.node(owner).classifier() {
            Some(classifier) => RealKey::for_property(&self.user_path(classifier), name),
            None => RealKey::new(vec![paths::ROOT.to_owned(), name.to_owned()]),
        }
    }

    pub fn values(&self, owner: NodeId, name: &str) -> &[NodeId] {
        self.node(owner).values(name)
    }

    pub fn value(&self, owner: NodeId, name: &str) -> Option<NodeId> {
        self.node(owner).value(name)
    }

    /// Replaces all values of the property identified by `real_key`.
    pub fn set_values(&mut self, owner: NodeId, real_key: RealKey, values: Vec<NodeId>) {
        let name = real_key.name().to_owned();
        self.node_mut(owner)
            .properties
            .insert(name, Property { real_key, values });
    }

    pub fn add_value(&mut self, owner: NodeId, name: &str, value: NodeId) {
        if let Some(property) = self.node_mut(owner).properties.get_mut(name) {
            property.values.push(value);
            return;
        }
        let real_key = self.real_key_for(owner, name);
        self.set_values(owner, real_key, vec![value]);
    }

    pub fn remove_property(&mut self, owner: NodeId, name: &str) -> Option<Property> {
        self.node_mut(owner).properties.remove(name)
    }

    // ---------------------------------------------------------------------
    // Packages and paths

    pub fn is_package(&self, id: NodeId) -> bool {
        self.node(id).classifier() == Some(self.kernel.package)
    }

    /// Element path of a node: `Root`, a top-level name, or the `::` joined
    /// names from the root package down to the node.
    pub fn user_path(&self, id: NodeId) -> String {
        if id == self.kernel.root || self.is_top_level(id) {
            return self.node(id).name().to_owned();
        }
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.kernel.root || segments.len() > self.nodes.len() {
                break;
            }
            segments.push(self.node(node).name());
            current = self.value(node, properties::PACKAGE);
        }
        segments.reverse();
        graphjar_core::join_user_path(&segments)
    }

    pub fn find_in_package(&self, package: NodeId, name: &str) -> Option<NodeId> {
        self.values(package, properties::CHILDREN)
            .iter()
            .copied()
            .find(|child| self.node(*child).name() == name)
    }

    /// Resolves an element path: `Root`, a top-level name, or a package
    /// path from the root.
    pub fn get_by_user_path(&self, path: &str) -> Option<NodeId> {
        if path == paths::ROOT || path == graphjar_core::PATH_SEPARATOR {
            return Some(self.kernel.root);
        }
        let segments = graphjar_core::split_user_path(path);
        if segments.len() == 1 {
            if let Some(top_level) = self.top_level(path) {
                return Some(top_level);
            }
        }
        if segments.is_empty() {
            return None;
        }
        let mut current = self.kernel.root;
        for segment in segments {
            current = self.find_in_package(current, segment)?;
        }
        Some(current)
    }

    /// Returns the package at `path`, creating missing packages on the way.
    pub fn find_or_create_package(&mut self, path: &str) -> Result<NodeId> {
        if path == paths::ROOT || path == graphjar_core::PATH_SEPARATOR || path.is_empty() {
            return Ok(self.kernel.root);
        }
        let segments: Vec<String> = graphjar_core::split_user_path(path)
            .into_iter()
            .map(str::to_owned)
            .collect();
        let mut current = self.kernel.root;
        for segment in &segments {
            if let Some(existing) = self.find_in_package(current, segment) {
                if !self.is_package(existing) {
                    return Err(ModelError::NotAPackage {
                        path: self.user_path(existing),
                    });
                }
            }
            current = self.child_package(current, segment);
        }
        Ok(current)
    }

    /// Child package `name` of `parent`, created if missing.
    pub(crate) fn child_package(&mut self, parent: NodeId, name: &str) -> NodeId {
        if let Some(existing) = self.find_in_package(parent, name) {
            if self.node(existing).kind() == ImplementationKind::Package {
                return existing;
            }
        }
        let package = self.kernel.package;
        let id = self.new_node_with_kind(name, Some(package), ImplementationKind::Package);
        self.link_child(parent, id);
        tracing::trace!(target: MODEL_TARGET, path = %self.user_path(id), "created package");
        id
    }

    /// Links `child` into `parent`: sets the child's `package` and `name`
    /// and appends it to the parent's `children`.
    pub fn link_child(&mut self, parent: NodeId, child: NodeId) {
        self.add_value(child, properties::PACKAGE, parent);
        let name = self.node(child).name().to_owned();
        let name = self.new_string(&name);
        if self.value(child, properties::NAME).is_none() {
            self.add_value(child, properties::NAME, name);
        }
        self.add_value(parent, properties::CHILDREN, child);
    }

    /// Creates element `name` in the package at `package_path` (created if
    /// missing).
    pub fn new_packaged_element(
        &mut self,
        package_path: &str,
        name: &str,
        classifier: NodeId,
        source_information: Option<SourceInformation>,
    ) -> Result<NodeId> {
        let package = self.find_or_create_package(package_path)?;
        if self.find_in_package(package, name).is_some() {
            return Err(ModelError::DuplicateChild {
                package: self.user_path(package),
                path: name.to_owned(),
            });
        }
        let id = self.new_node(name, classifier);
        self.node_mut(id).set_source_information(source_information);
        self.link_child(package, id);
        Ok(id)
    }

    // ---------------------------------------------------------------------
    // Types

    /// `type_node` followed by its generalizations, breadth first, without
    /// duplicates.
    pub fn generalization_order(&self, type_node: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([type_node]);
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            order.push(next);
            queue.extend(self.values(next, properties::GENERALIZATIONS).iter().copied());
        }
        order
    }

    pub fn is_instance_of(&self, id: NodeId, type_node: NodeId) -> bool {
        match self.node(id).classifier() {
            Some(classifier) => self.generalization_order(classifier).contains(&type_node),
            None => false,
        }
    }

    pub fn is_packageable_element(&self, id: NodeId) -> bool {
        self.is_instance_of(id, self.kernel.packageable_element)
    }

    /// Whether `id` is a value of an enumeration.
    pub fn is_enum(&self, id: NodeId) -> bool {
        self.node(id)
            .classifier()
            .and_then(|classifier| self.node(classifier).classifier())
            == Some(self.kernel.enumeration)
    }

    /// Import groups declared by `source_id`.
    pub fn import_groups_for_source(&self, source_id: &str) -> Vec<NodeId> {
        let Some(imports) = self.get_by_user_path(paths::IMPORTS_PACKAGE) else {
            return Vec::new();
        };
        self.values(imports, properties::CHILDREN)
            .iter()
            .copied()
            .filter(|group| {
                let node = self.node(*group);
                node.classifier() == Some(self.kernel.import_group) && node.is_from(source_id)
            })
            .collect()
    }

    /// Short description used in error messages.
    pub fn describe(&self, id: NodeId) -> String {
        let node = self.node(id);
        let classifier = node
            .classifier()
            .map(|classifier| self.user_path(classifier))
            .unwrap_or_else(|| "?".to_owned());
        format!("{} ({id}) instanceOf {classifier}", node.name())
    }
}
