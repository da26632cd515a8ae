//! Binary serialization of compiled source units.
//!
//! A unit is written as a self-contained blob: a string table, the indexes
//! an archive needs to build its manifest (elements by parser, other defined
//! elements, referenced external elements), the source definition, the
//! payloads of plugin-encoded external references, the property keys and
//! finally one blob per instance.
//!
//! Every value reference is classified as a literal, a package, an instance
//! of the same unit (by position), a packageable element of another unit
//! (by path) or some other external node (by position in the unit's table of
//! plugin-encoded references).
//!
//! Reading is split in two. [`deserialize`] decodes a blob into node shells
//! without touching any repository; [`GraphLoader`] then creates the nodes of
//! a batch of units and links them together in resolve/populate rounds, so
//! units that reference each other can be loaded in any order.

mod codec;
mod deserializer;
mod error;
mod loader;
mod plugin;
mod reference;
mod serializer;
mod strings;
mod tags;

pub use codec::{BinaryReader, BinaryWriter};
pub use deserializer::{
    deserialize, deserialize_with, read_indexes, DeserializeOptions, DeserializedSource,
    InternalNode, ResolutionResult, SourceDefinition, SourceIndexes,
};
pub use error::{
    DeserializeError, SerializeError, UnresolvableReference, UnresolvedReference, WireError,
};
pub use loader::{load_source, GraphLoader, LoadReport};
pub use plugin::{
    DeserializationHelper, EnumExternalReferenceSerializer, ExternalReferenceSerializer,
    ExternalReferenceSerializerLibrary, PropertyExternalReferenceSerializer,
    QualifiedPropertyExternalReferenceSerializer, SerializationHelper,
    StereotypeExternalReferenceSerializer, TagExternalReferenceSerializer,
};
pub use reference::{ExternalReference, Reference, ReferenceKind, ResolveContext};
pub use serializer::{SourceSerialization, SourceSerializationResult, SourceSerializer};
pub use strings::StringTable;
pub use tags::{InstanceKindTag, WireTag};

/// Tracing target for serialization and loading events.
pub const BINARY_TARGET: &str = "graphjar.binary";
