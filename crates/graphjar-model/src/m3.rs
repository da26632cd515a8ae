//! Well-known element paths and property names of the kernel metamodel.

pub mod paths {
    pub const ROOT: &str = "Root";
    pub const PACKAGE: &str = "Package";

    pub const BOOLEAN: &str = "Boolean";
    pub const DATE: &str = "Date";
    pub const STRICT_DATE: &str = "StrictDate";
    pub const DATE_TIME: &str = "DateTime";
    pub const LATEST_DATE: &str = "LatestDate";
    pub const FLOAT: &str = "Float";
    pub const DECIMAL: &str = "Decimal";
    pub const INTEGER: &str = "Integer";
    pub const NUMBER: &str = "Number";
    pub const STRING: &str = "String";

    pub const ANY: &str = "meta::pure::metamodel::type::Any";
    pub const PACKAGEABLE_ELEMENT: &str = "meta::pure::metamodel::PackageableElement";
    pub const CLASS: &str = "meta::pure::metamodel::type::Class";
    pub const PRIMITIVE_TYPE: &str = "meta::pure::metamodel::type::PrimitiveType";
    pub const ENUMERATION: &str = "meta::pure::metamodel::type::Enumeration";
    pub const ENUM: &str = "meta::pure::metamodel::type::Enum";
    pub const PROPERTY: &str = "meta::pure::metamodel::function::property::Property";
    pub const QUALIFIED_PROPERTY: &str =
        "meta::pure::metamodel::function::property::QualifiedProperty";
    pub const CONCRETE_FUNCTION_DEFINITION: &str =
        "meta::pure::metamodel::function::ConcreteFunctionDefinition";
    pub const PROFILE: &str = "meta::pure::metamodel::extension::Profile";
    pub const TAG: &str = "meta::pure::metamodel::extension::Tag";
    pub const STEREOTYPE: &str = "meta::pure::metamodel::extension::Stereotype";
    pub const IMPORT_GROUP: &str = "meta::pure::metamodel::import::ImportGroup";
    pub const IMPORT: &str = "meta::pure::metamodel::import::Import";
    pub const IMPORT_STUB: &str = "meta::pure::metamodel::import::ImportStub";
    pub const PROPERTY_STUB: &str = "meta::pure::metamodel::import::PropertyStub";
    pub const ENUM_STUB: &str = "meta::pure::metamodel::import::EnumStub";

    /// Package holding the import groups of every source.
    pub const IMPORTS_PACKAGE: &str = "system::imports";

    /// Primitive types that live at the top level rather than in a package.
    pub const TOP_LEVEL_PRIMITIVES: [&str; 10] = [
        BOOLEAN,
        DATE,
        STRICT_DATE,
        DATE_TIME,
        LATEST_DATE,
        FLOAT,
        DECIMAL,
        INTEGER,
        NUMBER,
        STRING,
    ];
}

pub mod properties {
    pub const PACKAGE: &str = "package";
    pub const CHILDREN: &str = "children";
    pub const NAME: &str = "name";
    pub const PROPERTIES: &str = "properties";
    pub const OWNER: &str = "owner";
    pub const GENERALIZATIONS: &str = "generalizations";
    pub const VALUES: &str = "values";
    pub const QUALIFIED_PROPERTIES: &str = "qualifiedProperties";
    pub const PROFILE: &str = "profile";
    pub const P_TAGS: &str = "p_tags";
    pub const P_STEREOTYPES: &str = "p_stereotypes";

    pub const IMPORT_GROUP: &str = "importGroup";
    pub const IMPORTS: &str = "imports";
    pub const PATH: &str = "path";
    pub const ID_OR_PATH: &str = "idOrPath";
    pub const PROPERTY_NAME: &str = "propertyName";
    pub const ENUMERATION: &str = "enumeration";
    pub const ENUM_NAME: &str = "enumName";

    pub const RESOLVED_NODE: &str = "resolvedNode";
    pub const RESOLVED_PROPERTY: &str = "resolvedProperty";
    pub const RESOLVED_ENUM: &str = "resolvedEnum";
}

/// Source id of the kernel metamodel.
pub const KERNEL_SOURCE_ID: &str = "/platform/pure/m3.pure";

/// Prefix of synthesized names given to anonymous nodes.
pub const ANONYMOUS_NAME_PREFIX: &str = "@_";

pub fn is_anonymous_name(name: &str) -> bool {
    name.starts_with(ANONYMOUS_NAME_PREFIX)
}
