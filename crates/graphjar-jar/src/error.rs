use graphjar_binary::{DeserializeError, SerializeError};

pub type Result<T> = std::result::Result<T, JarError>;

/// Errors produced while writing, opening or querying repository jars.
#[derive(Debug, thiserror::Error)]
pub enum JarError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("walkdir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("invalid json in {entry}: {source}")]
    Json {
        entry: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("error reading jar {location}")]
    Archive {
        location: String,
        #[source]
        source: Box<JarError>,
    },

    #[error("unsupported jar URL {url}")]
    UnsupportedUrl { url: String },

    #[error("jar is missing required entry {entry}")]
    MissingEntry { entry: &'static str },

    #[error("invalid manifest: {message}")]
    InvalidManifest { message: String },

    #[error("invalid path for repository '{repository}': {path}")]
    InvalidPath { repository: String, path: String },

    #[error("file {path} added more than once")]
    DuplicateFile { path: String },

    #[error("multiple Pure repository jars for {repository}")]
    DuplicateRepository { repository: String },

    #[error("multiple definition files for {instance}: {first} and {second}")]
    DuplicateDefinition {
        instance: String,
        first: String,
        second: String,
    },

    #[error("multiple external reference indexes for {path}")]
    DuplicateReferenceIndex { path: String },

    #[error("could not find external references for: {path}")]
    MissingFileDependencies { path: String },

    #[error("cannot find definition for: {instance} (referenced from {referenced_from})")]
    MissingDefinition {
        instance: String,
        referenced_from: String,
    },

    #[error("cannot find file for instance: {instance}")]
    UnknownInstance { instance: String },

    #[error("unknown file: {path}")]
    UnknownFile { path: String },

    #[error(
        "platform version mismatch: cannot load a jar for {} into a system at version {}",
        version_or_unknown(.found.as_deref()),
        version_or_unknown(.expected.as_deref())
    )]
    PlatformVersionMismatch {
        expected: Option<String>,
        found: Option<String>,
    },

    #[error("platform version mismatch: {}", .versions.join(", "))]
    ConflictingPlatformVersions { versions: Vec<String> },

    #[error("model version mismatch: {}", .versions.join(", "))]
    ConflictingModelVersions { versions: Vec<String> },

    #[error("failed to serialize {source_id}")]
    Serialize {
        source_id: String,
        #[source]
        source: SerializeError,
    },

    #[error("failed to deserialize {path}")]
    Deserialize {
        path: String,
        #[source]
        source: DeserializeError,
    },

    #[error("failed to load files")]
    Load(#[source] DeserializeError),
}

impl JarError {
    pub(crate) fn in_archive(self, location: impl Into<String>) -> Self {
        JarError::Archive {
            location: location.into(),
            source: Box::new(self),
        }
    }

    pub(crate) fn json(entry: &str, source: serde_json::Error) -> Self {
        JarError::Json {
            entry: entry.to_owned(),
            source,
        }
    }
}

fn version_or_unknown(version: Option<&str>) -> &str {
    version.unwrap_or("<unknown>")
}
