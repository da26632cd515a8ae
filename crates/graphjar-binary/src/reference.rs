//! Value references and their wire encoding.
//!
//! A [`Reference`] is either resolved (it holds the node) or carries exactly
//! what is needed to find the node later. Resolution is monotonic: once a
//! reference resolves it keeps its node.

use std::fmt;

use graphjar_model::{IntegerValue, ModelRepository, NodeId, PrimitiveValue};

use crate::codec::{BinaryReader, BinaryWriter};
use crate::error::{UnresolvableReference, WireError};
use crate::strings::StringTable;
use crate::tags::WireTag;

/// A reference whose shape is owned by an external-reference serializer.
pub trait ExternalReference: fmt::Debug + Send {
    /// `Ok(None)` means "not yet": the target may appear once more of the
    /// graph is loaded.
    fn resolve(
        &mut self,
        cx: &mut ResolveContext<'_>,
    ) -> Result<Option<NodeId>, UnresolvableReference>;

    fn describe(&self) -> String;
}

#[derive(Debug)]
pub enum ReferenceKind {
    Primitive(PrimitiveValue),
    /// Package by element path; missing packages are created.
    Package(String),
    /// Packageable element defined by another unit, by element path.
    PackagedElement(String),
    /// Position in the current unit's instance table.
    Internal(usize),
    /// Position in the current unit's external reference table.
    OtherExternal(usize),
    Custom(Box<dyn ExternalReference>),
}

#[derive(Debug)]
pub struct Reference {
    kind: ReferenceKind,
    resolved: Option<NodeId>,
}

/// What a reference can see while resolving: the target repository and the
/// nodes already materialized for the unit being loaded.
pub struct ResolveContext<'a> {
    pub repository: &'a mut ModelRepository,
    internal: &'a [Option<NodeId>],
    others: &'a [Option<NodeId>],
}

impl<'a> ResolveContext<'a> {
    pub fn new(
        repository: &'a mut ModelRepository,
        internal: &'a [Option<NodeId>],
        others: &'a [Option<NodeId>],
    ) -> Self {
        Self {
            repository,
            internal,
            others,
        }
    }

    pub fn internal(&self, id: usize) -> Option<NodeId> {
        self.internal.get(id).copied().flatten()
    }

    pub fn other(&self, id: usize) -> Option<NodeId> {
        self.others.get(id).copied().flatten()
    }
}

impl Reference {
    pub fn new(kind: ReferenceKind) -> Self {
        Self {
            kind,
            resolved: None,
        }
    }

    pub fn primitive(value: PrimitiveValue) -> Self {
        Self::new(ReferenceKind::Primitive(value))
    }

    pub fn package(path: impl Into<String>) -> Self {
        Self::new(ReferenceKind::Package(path.into()))
    }

    pub fn element(path: impl Into<String>) -> Self {
        Self::new(ReferenceKind::PackagedElement(path.into()))
    }

    pub fn internal(id: usize) -> Self {
        Self::new(ReferenceKind::Internal(id))
    }

    pub fn other_external(id: usize) -> Self {
        Self::new(ReferenceKind::OtherExternal(id))
    }

    pub fn custom(reference: impl ExternalReference + 'static) -> Self {
        Self::new(ReferenceKind::Custom(Box::new(reference)))
    }

    pub fn kind(&self) -> &ReferenceKind {
        &self.kind
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    pub fn resolved(&self) -> Option<NodeId> {
        self.resolved
    }

    /// Attempts resolution. Returns whether the reference is now resolved.
    pub fn resolve(&mut self, cx: &mut ResolveContext<'_>) -> Result<bool, UnresolvableReference> {
        if self.resolved.is_some() {
            return Ok(true);
        }
        let node = match &mut self.kind {
            ReferenceKind::Primitive(value) => Some(cx.repository.new_primitive(value.clone())),
            ReferenceKind::Package(path) => Some(cx.repository.find_or_create_package(path)?),
            ReferenceKind::PackagedElement(path) => cx.repository.get_by_user_path(path),
            ReferenceKind::Internal(id) => cx.internal(*id),
            ReferenceKind::OtherExternal(id) => cx.other(*id),
            ReferenceKind::Custom(reference) => reference.resolve(cx)?,
        };
        self.resolved = node;
        Ok(node.is_some())
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ReferenceKind::Primitive(value) => write!(f, "literal {}", value.literal()),
            ReferenceKind::Package(path) => write!(f, "package {path}"),
            ReferenceKind::PackagedElement(path) => write!(f, "element {path}"),
            ReferenceKind::Internal(id) => write!(f, "internal instance {id}"),
            ReferenceKind::OtherExternal(id) => write!(f, "external reference {id}"),
            ReferenceKind::Custom(reference) => f.write_str(&reference.describe()),
        }
    }
}

/// Writes a primitive literal, interning its text in `strings`.
pub(crate) fn write_primitive(
    writer: &mut BinaryWriter,
    strings: &mut StringTable,
    value: &PrimitiveValue,
) {
    match value {
        PrimitiveValue::Boolean(flag) => {
            writer.write_u8(WireTag::Boolean as u8);
            writer.write_bool(*flag);
        }
        PrimitiveValue::Date(text) => write_tagged_string(writer, strings, WireTag::Date, text),
        PrimitiveValue::StrictDate(text) => {
            write_tagged_string(writer, strings, WireTag::StrictDate, text)
        }
        PrimitiveValue::DateTime(text) => {
            write_tagged_string(writer, strings, WireTag::DateTime, text)
        }
        PrimitiveValue::LatestDate => writer.write_u8(WireTag::LatestDate as u8),
        PrimitiveValue::Float(text) => write_tagged_string(writer, strings, WireTag::Float, text),
        PrimitiveValue::Decimal(text) => {
            write_tagged_string(writer, strings, WireTag::Decimal, text)
        }
        PrimitiveValue::Integer(IntegerValue::Int(v)) => {
            writer.write_u8(WireTag::IntegerInt as u8);
            writer.write_i32(*v);
        }
        PrimitiveValue::Integer(IntegerValue::Long(v)) => {
            writer.write_u8(WireTag::IntegerLong as u8);
            writer.write_i64(*v);
        }
        PrimitiveValue::Integer(IntegerValue::Big(text)) => {
            write_tagged_string(writer, strings, WireTag::IntegerBig, text)
        }
        PrimitiveValue::String(text) => write_tagged_string(writer, strings, WireTag::String, text),
    }
}

fn write_tagged_string(
    writer: &mut BinaryWriter,
    strings: &mut StringTable,
    tag: WireTag,
    text: &str,
) {
    writer.write_u8(tag as u8);
    writer.write_i32(strings.register(text));
}

/// Reads one value reference.
pub(crate) fn read_reference(
    reader: &mut BinaryReader<'_>,
    strings: &StringTable,
) -> Result<Reference, WireError> {
    let tag = WireTag::try_from(reader.read_u8()?)?;
    read_tagged_reference(tag, reader, strings)
}

pub(crate) fn read_tagged_reference(
    tag: WireTag,
    reader: &mut BinaryReader<'_>,
    strings: &StringTable,
) -> Result<Reference, WireError> {
    let string = |reader: &mut BinaryReader<'_>| -> Result<String, WireError> {
        let id = reader.read_i32()?;
        strings.get(id).map(str::to_owned)
    };
    let reference = match tag {
        WireTag::Boolean => Reference::primitive(PrimitiveValue::Boolean(reader.read_bool()?)),
        WireTag::Date => Reference::primitive(PrimitiveValue::Date(string(reader)?)),
        WireTag::StrictDate => Reference::primitive(PrimitiveValue::StrictDate(string(reader)?)),
        WireTag::DateTime => Reference::primitive(PrimitiveValue::DateTime(string(reader)?)),
        WireTag::LatestDate => Reference::primitive(PrimitiveValue::LatestDate),
        WireTag::Float => Reference::primitive(PrimitiveValue::Float(string(reader)?)),
        WireTag::Decimal => Reference::primitive(PrimitiveValue::Decimal(string(reader)?)),
        WireTag::IntegerInt => Reference::primitive(PrimitiveValue::Integer(IntegerValue::Int(
            reader.read_i32()?,
        ))),
        WireTag::IntegerLong => Reference::primitive(PrimitiveValue::Integer(
            IntegerValue::Long(reader.read_i64()?),
        )),
        WireTag::IntegerBig => Reference::primitive(PrimitiveValue::Integer(IntegerValue::Big(
            string(reader)?,
        ))),
        WireTag::String => Reference::primitive(PrimitiveValue::String(string(reader)?)),
        WireTag::PackageReference => Reference::package(string(reader)?),
        WireTag::InternalReference => Reference::internal(read_position(reader)?),
        WireTag::ExternalPackageableElementReference => Reference::element(string(reader)?),
        WireTag::ExternalOtherReference => Reference::other_external(read_position(reader)?),
    };
    Ok(reference)
}

fn read_position(reader: &mut BinaryReader<'_>) -> Result<usize, WireError> {
    reader.read_len()
}
