use std::collections::HashMap;

use graphjar_core::SourceInformation;

use crate::compile_state::CompileStates;
use crate::m3::{paths, properties, KERNEL_SOURCE_ID};
use crate::node::{ImplementationKind, Node, NodeId};
use crate::primitive::PrimitiveValue;
use crate::repository::ModelRepository;

/// Handles to the metamodel nodes every repository starts with.
#[derive(Debug, Clone, Default)]
pub struct Kernel {
    pub root: NodeId,
    pub package: NodeId,
    pub any: NodeId,
    pub packageable_element: NodeId,
    pub class: NodeId,
    pub primitive_type: NodeId,
    pub enumeration: NodeId,
    pub enum_: NodeId,
    pub property: NodeId,
    pub qualified_property: NodeId,
    pub profile: NodeId,
    pub tag: NodeId,
    pub stereotype: NodeId,
    pub concrete_function_definition: NodeId,
    pub import_group: NodeId,
    pub import: NodeId,
    pub import_stub: NodeId,
    pub property_stub: NodeId,
    pub enum_stub: NodeId,

    pub boolean: NodeId,
    pub date: NodeId,
    pub strict_date: NodeId,
    pub date_time: NodeId,
    pub latest_date: NodeId,
    pub float: NodeId,
    pub decimal: NodeId,
    pub integer: NodeId,
    pub number: NodeId,
    pub string: NodeId,
}

impl Kernel {
    /// Primitive type classifying `value`.
    pub fn primitive_type_of(&self, value: &PrimitiveValue) -> NodeId {
        match value {
            PrimitiveValue::Boolean(_) => self.boolean,
            PrimitiveValue::Integer(_) => self.integer,
            PrimitiveValue::Float(_) => self.float,
            PrimitiveValue::Decimal(_) => self.decimal,
            PrimitiveValue::Date(_) => self.date,
            PrimitiveValue::StrictDate(_) => self.strict_date,
            PrimitiveValue::DateTime(_) => self.date_time,
            PrimitiveValue::LatestDate => self.latest_date,
            PrimitiveValue::String(_) => self.string,
        }
    }

    /// Whether `classifier` is one of the primitive types with a literal
    /// wire form.
    pub fn is_literal_type(&self, classifier: NodeId) -> bool {
        [
            self.boolean,
            self.date,
            self.strict_date,
            self.date_time,
            self.latest_date,
            self.float,
            self.decimal,
            self.integer,
            self.string,
        ]
        .contains(&classifier)
    }
}

/// Maps classifier paths to the implementation kind their instances must
/// have.
#[derive(Debug, Clone)]
pub struct ImplementationRegistry {
    kinds: HashMap<String, ImplementationKind>,
}

impl ImplementationRegistry {
    pub fn empty() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    pub fn register(&mut self, classifier_path: impl Into<String>, kind: ImplementationKind) {
        self.kinds.insert(classifier_path.into(), kind);
    }

    pub fn kind_for(&self, classifier_path: &str) -> Option<ImplementationKind> {
        self.kinds.get(classifier_path).copied()
    }
}

impl Default for ImplementationRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(paths::PACKAGE, ImplementationKind::Package);
        registry.register(paths::CLASS, ImplementationKind::Class);
        registry.register(paths::PRIMITIVE_TYPE, ImplementationKind::PrimitiveType);
        registry.register(paths::ENUMERATION, ImplementationKind::Enumeration);
        registry.register(paths::PROPERTY, ImplementationKind::Property);
        registry.register(
            paths::CONCRETE_FUNCTION_DEFINITION,
            ImplementationKind::Function,
        );
        registry.register(paths::IMPORT_GROUP, ImplementationKind::ImportGroup);
        registry.register(paths::IMPORT_STUB, ImplementationKind::ImportStub);
        registry.register(paths::PROPERTY_STUB, ImplementationKind::PropertyStub);
        registry.register(paths::ENUM_STUB, ImplementationKind::EnumStub);
        for primitive in paths::TOP_LEVEL_PRIMITIVES {
            registry.register(primitive, ImplementationKind::Primitive);
        }
        registry
    }
}

struct Bootstrap<'a> {
    repo: &'a mut ModelRepository,
    line: i32,
}

impl Bootstrap<'_> {
    fn next_span(&mut self) -> SourceInformation {
        self.line += 1;
        SourceInformation::span(KERNEL_SOURCE_ID, self.line, 1, self.line, 1)
    }

    fn mark_kernel(&mut self, id: NodeId) {
        let span = self.next_span();
        let node = self.repo.node_mut(id);
        node.set_source_information(Some(span));
        node.set_compile_states(CompileStates::PROCESSED | CompileStates::VALIDATED);
    }

    /// Creates a packaged kernel class. `classifier == None` makes the class
    /// its own classifier.
    fn class(&mut self, path: &str, classifier: Option<NodeId>) -> NodeId {
        let segments = graphjar_core::split_user_path(path);
        let (name, package_segments) = match segments.split_last() {
            Some((name, rest)) => (*name, rest),
            None => (path, &[][..]),
        };
        let mut parent = self.repo.kernel().root;
        for segment in package_segments {
            parent = self.repo.child_package(parent, segment);
        }
        let id = self
            .repo
            .push_node(Node::new(name.to_owned(), classifier, ImplementationKind::Class));
        if classifier.is_none() {
            self.repo.node_mut(id).set_classifier(id);
        }
        self.repo.link_child(parent, id);
        self.mark_kernel(id);
        id
    }

    fn top_level(&mut self, name: &str, classifier: Option<NodeId>, kind: ImplementationKind) -> NodeId {
        let id = self.repo.push_node(Node::new(name.to_owned(), classifier, kind));
        self.repo.insert_top_level(name, id);
        id
    }

    fn primitive(&mut self, name: &str) -> NodeId {
        let id = self.top_level(name, None, ImplementationKind::PrimitiveType);
        self.mark_kernel(id);
        id
    }

    fn generalize(&mut self, specific: NodeId, general: NodeId) {
        self.repo
            .add_value(specific, properties::GENERALIZATIONS, general);
    }
}

/// Creates the kernel metamodel in an empty repository.
pub(crate) fn bootstrap(repo: &mut ModelRepository) -> Kernel {
    let mut boot = Bootstrap { repo, line: 0 };

    let root = boot.top_level(paths::ROOT, None, ImplementationKind::Package);
    let package = boot.top_level(paths::PACKAGE, None, ImplementationKind::Class);
    boot.repo.kernel_mut().root = root;
    boot.repo.kernel_mut().package = package;
    boot.repo.node_mut(root).set_classifier(package);

    // Primitive types come first: linking packaged classes creates string
    // values, which need the `String` type. Their classifier is set once
    // `PrimitiveType` exists.
    let primitives = paths::TOP_LEVEL_PRIMITIVES.map(|name| boot.primitive(name));
    {
        let [boolean, date, strict_date, date_time, latest_date, float, decimal, integer, number, string] =
            primitives;
        let kernel = boot.repo.kernel_mut();
        kernel.boolean = boolean;
        kernel.date = date;
        kernel.strict_date = strict_date;
        kernel.date_time = date_time;
        kernel.latest_date = latest_date;
        kernel.float = float;
        kernel.decimal = decimal;
        kernel.integer = integer;
        kernel.number = number;
        kernel.string = string;
    }

    let class = boot.class(paths::CLASS, None);
    boot.repo.node_mut(package).set_classifier(class);
    boot.mark_kernel(root);
    boot.mark_kernel(package);

    let any = boot.class(paths::ANY, Some(class));
    let packageable_element = boot.class(paths::PACKAGEABLE_ELEMENT, Some(class));
    let primitive_type = boot.class(paths::PRIMITIVE_TYPE, Some(class));
    let enumeration = boot.class(paths::ENUMERATION, Some(class));
    let enum_ = boot.class(paths::ENUM, Some(class));
    let property = boot.class(paths::PROPERTY, Some(class));
    let qualified_property = boot.class(paths::QUALIFIED_PROPERTY, Some(class));
    let profile = boot.class(paths::PROFILE, Some(class));
    let tag = boot.class(paths::TAG, Some(class));
    let stereotype = boot.class(paths::STEREOTYPE, Some(class));
    let concrete_function_definition = boot.class(paths::CONCRETE_FUNCTION_DEFINITION, Some(class));
    let import_group = boot.class(paths::IMPORT_GROUP, Some(class));
    let import = boot.class(paths::IMPORT, Some(class));
    let import_stub = boot.class(paths::IMPORT_STUB, Some(class));
    let property_stub = boot.class(paths::PROPERTY_STUB, Some(class));
    let enum_stub = boot.class(paths::ENUM_STUB, Some(class));

    for primitive in primitives {
        boot.repo.node_mut(primitive).set_classifier(primitive_type);
    }

    {
        let kernel = boot.repo.kernel_mut();
        kernel.class = class;
        kernel.any = any;
        kernel.packageable_element = packageable_element;
        kernel.primitive_type = primitive_type;
        kernel.enumeration = enumeration;
        kernel.enum_ = enum_;
        kernel.property = property;
        kernel.qualified_property = qualified_property;
        kernel.profile = profile;
        kernel.tag = tag;
        kernel.stereotype = stereotype;
        kernel.concrete_function_definition = concrete_function_definition;
        kernel.import_group = import_group;
        kernel.import = import;
        kernel.import_stub = import_stub;
        kernel.property_stub = property_stub;
        kernel.enum_stub = enum_stub;
    }
    let kernel = boot.repo.kernel().clone();

    for element in [
        package,
        class,
        primitive_type,
        enumeration,
        profile,
        concrete_function_definition,
        import_group,
    ] {
        boot.generalize(element, packageable_element);
    }
    for element in [
        packageable_element,
        enum_,
        property,
        qualified_property,
        tag,
        stereotype,
        import,
        import_stub,
        property_stub,
        enum_stub,
        kernel.number,
        kernel.boolean,
        kernel.date,
        kernel.string,
    ] {
        boot.generalize(element, any);
    }
    for number in [kernel.integer, kernel.float, kernel.decimal] {
        boot.generalize(number, kernel.number);
    }
    for date in [kernel.strict_date, kernel.date_time, kernel.latest_date] {
        boot.generalize(date, kernel.date);
    }

    kernel
}
