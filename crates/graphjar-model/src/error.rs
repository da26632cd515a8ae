use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("top level element {name} already exists")]
    DuplicateTopLevel { name: String },

    #[error("{path} is not a package")]
    NotAPackage { path: String },

    #[error("element {path} already exists in package {package}")]
    DuplicateChild { package: String, path: String },

    #[error("{kind} {stub} cannot be resolved: {message}")]
    UnresolvedStub {
        kind: &'static str,
        stub: String,
        message: String,
    },

    #[error("{id_or_path} has been found more than one time in the imports: {candidates:?}")]
    AmbiguousImport {
        id_or_path: String,
        candidates: Vec<String>,
    },
}

pub type Result<T, E = ModelError> = std::result::Result<T, E>;
