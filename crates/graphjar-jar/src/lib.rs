//! Repository jars: archives holding the serialized sources of one
//! repository, and libraries answering queries over a set of them.
//!
//! A jar holds one entry per serialized source (`repo/dir/file.pc`) plus
//! three metadata entries: a manifest naming the repository and the platform
//! and model versions, a definition index (instance path to defining file)
//! and a reference index (file to the instance paths it references from
//! other files).
//!
//! A [`RepositoryJarLibrary`] merges the indexes of its jars and answers
//! dependency queries over files. [`LibraryLoader`] uses them to load
//! instances into a model repository with everything they need.

mod error;
mod index;
mod jar;
mod library;
mod loading;
mod metadata;
mod writer;

pub use error::{JarError, Result};
pub use index::LibraryIndex;
pub use jar::RepositoryJar;
pub use library::{
    open_library, CachedJarLibrary, FileContents, RepositoryJarLibrary, SimpleJarLibrary,
};
pub use loading::{LibraryLoadReport, LibraryLoader};
pub use metadata::{
    is_metadata_entry, validate_path, DefinitionIndex, JarManifest, ReferenceIndex,
    RepositoryJarMetadata, DEFINITION_INDEX_NAME, MANIFEST_NAME, REFERENCE_INDEX_NAME,
};
pub use writer::RepositoryJarWriter;

/// Tracing target for jar and library events.
pub const JAR_TARGET: &str = "graphjar.jar";
