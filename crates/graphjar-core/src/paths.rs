/// Separator between the segments of an element path (`meta::pure::Class`).
pub const PATH_SEPARATOR: &str = "::";

/// Repository name used for files that are not nested under a repository
/// directory.
pub const ROOT_REPOSITORY: &str = "root";

pub const SOURCE_EXTENSION: &str = ".pure";
pub const BINARY_EXTENSION: &str = ".pc";

/// Split an element path into its segments.
///
/// An empty path yields no segments.
pub fn split_user_path(path: &str) -> Vec<&str> {
    if path.is_empty() {
        return Vec::new();
    }
    path.split(PATH_SEPARATOR).collect()
}

pub fn join_user_path<S: AsRef<str>>(segments: &[S]) -> String {
    let mut out = String::new();
    for (idx, segment) in segments.iter().enumerate() {
        if idx > 0 {
            out.push_str(PATH_SEPARATOR);
        }
        out.push_str(segment.as_ref());
    }
    out
}

/// Map a source id (`/platform/pure/m3.pure`) to the archive entry holding its
/// serialized form (`platform/pure/m3.pc`).
///
/// Source ids without the source extension get the binary extension appended.
pub fn source_path_to_binary_path(source_id: &str) -> String {
    let relative = source_id.strip_prefix('/').unwrap_or(source_id);
    let stem = relative.strip_suffix(SOURCE_EXTENSION).unwrap_or(relative);
    format!("{stem}{BINARY_EXTENSION}")
}

/// Inverse of [`source_path_to_binary_path`] for paths produced by it.
pub fn binary_path_to_source_path(binary_path: &str) -> String {
    let relative = binary_path.strip_prefix('/').unwrap_or(binary_path);
    let stem = relative.strip_suffix(BINARY_EXTENSION).unwrap_or(relative);
    format!("/{stem}{SOURCE_EXTENSION}")
}

pub fn is_binary_path(path: &str) -> bool {
    path.ends_with(BINARY_EXTENSION)
}

/// Repository a file belongs to: its first directory segment, or
/// [`ROOT_REPOSITORY`] for files at the top of the tree.
pub fn file_repository(path: &str) -> &str {
    let relative = path.strip_prefix('/').unwrap_or(path);
    match relative.find('/') {
        Some(idx) => &relative[..idx],
        None => ROOT_REPOSITORY,
    }
}
