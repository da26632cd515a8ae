//! Discriminator bytes of the wire format.

use crate::error::WireError;

/// Leading byte of every serialized value reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireTag {
    Boolean = 1,
    Date = 2,
    StrictDate = 3,
    DateTime = 4,
    LatestDate = 5,
    Float = 6,
    Decimal = 7,
    IntegerInt = 8,
    IntegerLong = 9,
    IntegerBig = 10,
    String = 11,
    PackageReference = 12,
    InternalReference = 13,
    ExternalPackageableElementReference = 14,
    ExternalOtherReference = 15,
}

impl TryFrom<u8> for WireTag {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => WireTag::Boolean,
            2 => WireTag::Date,
            3 => WireTag::StrictDate,
            4 => WireTag::DateTime,
            5 => WireTag::LatestDate,
            6 => WireTag::Float,
            7 => WireTag::Decimal,
            8 => WireTag::IntegerInt,
            9 => WireTag::IntegerLong,
            10 => WireTag::IntegerBig,
            11 => WireTag::String,
            12 => WireTag::PackageReference,
            13 => WireTag::InternalReference,
            14 => WireTag::ExternalPackageableElementReference,
            15 => WireTag::ExternalOtherReference,
            other => return Err(WireError::UnknownReferenceTag(other)),
        })
    }
}

/// Leading byte of every instance record: how the node is reconstructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InstanceKindTag {
    TopLevel = 16,
    Packaged = 17,
    Anonymous = 18,
    Enum = 19,
    Other = 20,
}

impl TryFrom<u8> for InstanceKindTag {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            16 => InstanceKindTag::TopLevel,
            17 => InstanceKindTag::Packaged,
            18 => InstanceKindTag::Anonymous,
            19 => InstanceKindTag::Enum,
            20 => InstanceKindTag::Other,
            other => return Err(WireError::UnknownInstanceTag(other)),
        })
    }
}
