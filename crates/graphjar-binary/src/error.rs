use std::fmt;

use graphjar_core::SourceInformation;
use graphjar_model::{ImplementationKind, ModelError};
use thiserror::Error;

/// Malformed or truncated binary data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("buffer underflow: need {needed} bytes at {position}, have {available}")]
    Truncated {
        needed: usize,
        position: usize,
        available: usize,
    },
    #[error("negative length {length} at {position}")]
    NegativeLength { length: i32, position: usize },
    #[error("invalid utf-8 string at {position}")]
    InvalidUtf8 { position: usize },
    #[error("unknown reference type {0}")]
    UnknownReferenceTag(u8),
    #[error("unknown instance type {0}")]
    UnknownInstanceTag(u8),
    #[error("unknown string id {id} (string table has {count} entries)")]
    UnknownStringId { id: i32, count: usize },
    #[error("unknown property key id {id} ({count} keys)")]
    UnknownRealKeyId { id: i32, count: usize },
    #[error("unknown external reference id {id} ({count} references)")]
    UnknownOtherReferenceId { id: usize, count: usize },
}

/// Error raised while turning a source unit into bytes.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("cannot serialize {source_id}: source not compiled")]
    SourceNotCompiled { source_id: String },

    #[error("failed to serialize {path}")]
    RootNotSerialized { path: String },

    #[error("cannot serialize an instance with no classifier: {instance}")]
    MissingClassifier { instance: String },

    #[error("{instance} is classified by a primitive type but holds no literal")]
    MissingPrimitiveValue { instance: String },

    #[error(
        "external reference cannot be created for instance of {classifier}: {instance}{}",
        source_suffix(.source_information.as_ref())
    )]
    UnsupportedExternalReference {
        classifier: String,
        instance: String,
        source_information: Option<SourceInformation>,
    },

    #[error("could not determine source for element to serialize reference: {instance}")]
    UndeterminedSource { instance: String },

    #[error("error serializing {instance}{}", source_suffix(.source_information.as_ref()))]
    Instance {
        instance: String,
        source_information: Option<SourceInformation>,
        #[source]
        source: Box<SerializeError>,
    },

    #[error("error serializing values for property {property}")]
    Property {
        property: String,
        #[source]
        source: Box<SerializeError>,
    },

    #[error(
        "error serializing {instance} with serializer for type {type_path}{}",
        source_suffix(.source_information.as_ref())
    )]
    ExternalSerializer {
        instance: String,
        type_path: String,
        source_information: Option<SourceInformation>,
        #[source]
        source: Box<SerializeError>,
    },

    #[error("{0}")]
    Custom(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// A reference lookup that failed outright, as opposed to one that may
/// succeed once more of the graph is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct UnresolvableReference {
    pub message: String,
}

impl UnresolvableReference {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<ModelError> for UnresolvableReference {
    fn from(value: ModelError) -> Self {
        Self::new(value.to_string())
    }
}

/// A reference that was still unresolved when loading stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    pub source_id: String,
    pub instance: String,
    /// `None` for the classifier reference.
    pub property: Option<String>,
    pub index: usize,
    pub reference: String,
}

impl fmt::Display for UnresolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.property {
            Some(property) => write!(
                f,
                "{}: value {} of property '{property}' for {}: {}",
                self.source_id, self.index, self.instance, self.reference
            ),
            None => write!(
                f,
                "{}: classifier of {}: {}",
                self.source_id, self.instance, self.reference
            ),
        }
    }
}

/// Error raised while reading a source unit back into a repository.
#[derive(Debug, Error)]
pub enum DeserializeError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("cannot find serializer for type: {type_path}")]
    MissingSerializer { type_path: String },

    #[error("error resolving external reference {id}: {reference}")]
    ExternalReference {
        id: usize,
        reference: String,
        #[source]
        source: UnresolvableReference,
    },

    #[error("unhandled reference type in external reference: {tag}")]
    UnsupportedElementReference { tag: u8 },

    #[error("could not resolve package reference for {instance}")]
    Package {
        instance: String,
        #[source]
        source: UnresolvableReference,
    },

    #[error("instance {path} is not of the expected kind; expected {expected:?}, found {found:?}")]
    TypeMismatch {
        path: String,
        expected: ImplementationKind,
        found: ImplementationKind,
    },

    #[error("error resolving reference to classifier {classifier_path} for {instance}")]
    Classifier {
        classifier_path: String,
        instance: String,
        #[source]
        source: UnresolvableReference,
    },

    #[error("error resolving reference to value {index} for property '{property}' for {instance}")]
    PropertyValue {
        index: usize,
        property: String,
        instance: String,
        #[source]
        source: UnresolvableReference,
    },

    #[error("error populating property '{property}' for {instance}: multiple values named '{name}'")]
    DuplicateValueName {
        property: String,
        instance: String,
        name: String,
    },

    #[error("reference resolution did not converge after {rounds} rounds ({unresolved} references unresolved)")]
    ResolutionDidNotConverge { rounds: usize, unresolved: usize },

    #[error("{} unresolved references{}", .references.len(), first_unresolved(.references))]
    UnresolvedReferences { references: Vec<UnresolvedReference> },

    #[error(transparent)]
    Model(#[from] ModelError),
}

fn source_suffix(info: Option<&SourceInformation>) -> String {
    match info {
        Some(info) => format!(" (source information: {info})"),
        None => String::new(),
    }
}

fn first_unresolved(references: &[UnresolvedReference]) -> String {
    match references.first() {
        Some(first) => format!("; first: {first}"),
        None => String::new(),
    }
}
