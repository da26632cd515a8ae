use std::fmt;

/// Integer literal, kept at the narrowest width that holds it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IntegerValue {
    Int(i32),
    Long(i64),
    /// Arbitrary precision, as a decimal string.
    Big(String),
}

impl IntegerValue {
    /// Parse a decimal literal, choosing the narrowest width.
    pub fn parse(text: &str) -> Self {
        if let Ok(value) = text.parse::<i32>() {
            IntegerValue::Int(value)
        } else if let Ok(value) = text.parse::<i64>() {
            IntegerValue::Long(value)
        } else {
            IntegerValue::Big(text.to_owned())
        }
    }
}

impl From<i32> for IntegerValue {
    fn from(value: i32) -> Self {
        IntegerValue::Int(value)
    }
}

impl From<i64> for IntegerValue {
    fn from(value: i64) -> Self {
        match i32::try_from(value) {
            Ok(narrow) => IntegerValue::Int(narrow),
            Err(_) => IntegerValue::Long(value),
        }
    }
}

impl fmt::Display for IntegerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegerValue::Int(value) => write!(f, "{value}"),
            IntegerValue::Long(value) => write!(f, "{value}"),
            IntegerValue::Big(value) => f.write_str(value),
        }
    }
}

/// Literal carried by a primitive value node.
///
/// Floats, decimals and dates keep their textual form so they survive a
/// round trip exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrimitiveValue {
    Boolean(bool),
    Integer(IntegerValue),
    Float(String),
    Decimal(String),
    Date(String),
    StrictDate(String),
    DateTime(String),
    LatestDate,
    String(String),
}

impl PrimitiveValue {
    /// Name given to the node holding this value.
    pub fn literal(&self) -> String {
        match self {
            PrimitiveValue::Boolean(value) => value.to_string(),
            PrimitiveValue::Integer(value) => value.to_string(),
            PrimitiveValue::Float(text)
            | PrimitiveValue::Decimal(text)
            | PrimitiveValue::Date(text)
            | PrimitiveValue::StrictDate(text)
            | PrimitiveValue::DateTime(text)
            | PrimitiveValue::String(text) => text.clone(),
            PrimitiveValue::LatestDate => "%latest".to_owned(),
        }
    }

    /// Path of the primitive type classifying this value.
    pub fn type_path(&self) -> &'static str {
        use crate::m3::paths;
        match self {
            PrimitiveValue::Boolean(_) => paths::BOOLEAN,
            PrimitiveValue::Integer(_) => paths::INTEGER,
            PrimitiveValue::Float(_) => paths::FLOAT,
            PrimitiveValue::Decimal(_) => paths::DECIMAL,
            PrimitiveValue::Date(_) => paths::DATE,
            PrimitiveValue::StrictDate(_) => paths::STRICT_DATE,
            PrimitiveValue::DateTime(_) => paths::DATE_TIME,
            PrimitiveValue::LatestDate => paths::LATEST_DATE,
            PrimitiveValue::String(_) => paths::STRING,
        }
    }
}
