//! Core shared types for graphjar.
//!
//! This crate is intentionally small and dependency-free: source spans and the
//! path conventions shared by the model, the binary codec and the archives.

mod paths;
mod source_info;

pub use paths::{
    binary_path_to_source_path, file_repository, is_binary_path, join_user_path,
    source_path_to_binary_path, split_user_path, BINARY_EXTENSION, PATH_SEPARATOR,
    ROOT_REPOSITORY, SOURCE_EXTENSION,
};
pub use source_info::SourceInformation;

/// Version of the running platform.
///
/// Archives record the platform version they were written with; a jar library
/// refuses to load archives written by a different platform version.
pub const PLATFORM_VERSION: &str = env!("CARGO_PKG_VERSION");
