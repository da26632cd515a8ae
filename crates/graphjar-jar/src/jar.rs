use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use url::Url;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{JarError, Result};
use crate::metadata::{
    is_metadata_entry, RepositoryJarMetadata, DEFINITION_INDEX_NAME, MANIFEST_NAME,
    REFERENCE_INDEX_NAME,
};
use crate::JAR_TARGET;

#[derive(Clone)]
enum Backing {
    Bytes(Arc<[u8]>),
    Zip(PathBuf),
    Directory(PathBuf),
}

/// One repository's serialized files plus their metadata.
///
/// A jar is either a zip archive (in memory or on disk) or an unpacked
/// directory with the same layout. Metadata is read when the jar is opened;
/// file contents are read on demand and never cached here.
#[derive(Clone)]
pub struct RepositoryJar {
    location: String,
    backing: Backing,
    metadata: RepositoryJarMetadata,
}

impl fmt::Debug for RepositoryJar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryJar")
            .field("location", &self.location)
            .field("repository", &self.metadata.repository_name())
            .finish()
    }
}

impl RepositoryJar {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes: Arc<[u8]> = bytes.into().into();
        let location = format!("<{} bytes>", bytes.len());
        Self::with_backing(location, Backing::Bytes(bytes))
    }

    /// Opens a jar file, or an unpacked jar if `path` is a directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let location = path.display().to_string();
        let backing = if path.is_dir() {
            Backing::Directory(path.to_path_buf())
        } else {
            Backing::Zip(path.to_path_buf())
        };
        Self::with_backing(location, backing)
    }

    /// Opens a jar from a `file:` URL.
    pub fn from_url(url: &Url) -> Result<Self> {
        if url.scheme() != "file" {
            return Err(JarError::UnsupportedUrl {
                url: url.to_string(),
            });
        }
        let path = url.to_file_path().map_err(|()| JarError::UnsupportedUrl {
            url: url.to_string(),
        })?;
        Self::open(path)
    }

    fn with_backing(location: String, backing: Backing) -> Result<Self> {
        let metadata = read_metadata(&backing).map_err(|err| err.in_archive(location.clone()))?;
        tracing::debug!(
            target: JAR_TARGET,
            location = %location,
            repository = metadata.repository_name(),
            files = metadata.reference_index().len(),
            "opened repository jar"
        );
        Ok(Self {
            location,
            backing,
            metadata,
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn metadata(&self) -> &RepositoryJarMetadata {
        &self.metadata
    }

    pub fn repository_name(&self) -> &str {
        self.metadata.repository_name()
    }

    /// Returns `Ok(None)` when the jar has no such file.
    pub fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
        read_entry(&self.backing, path).map_err(|err| err.in_archive(self.location.clone()))
    }

    /// Reads the requested files in one pass over the jar. Missing files are
    /// absent from the result.
    pub fn read_files<'p>(
        &self,
        paths: impl IntoIterator<Item = &'p str>,
    ) -> Result<BTreeMap<String, Vec<u8>>> {
        let wanted: BTreeSet<&str> = paths.into_iter().collect();
        if wanted.is_empty() {
            return Ok(BTreeMap::new());
        }
        self.scan(&|name| wanted.contains(name))
    }

    /// Reads every serialized file, keyed by path. Metadata entries are
    /// skipped.
    pub fn read_all_files(&self) -> Result<BTreeMap<String, Vec<u8>>> {
        let location = self.location.as_str();
        self.scan(&|name| {
            if graphjar_core::is_binary_path(name) {
                return true;
            }
            if !is_metadata_entry(name) {
                tracing::warn!(
                    target: JAR_TARGET,
                    location,
                    entry = name,
                    "ignoring unexpected jar entry"
                );
            }
            false
        })
    }

    fn scan(&self, wanted: &dyn Fn(&str) -> bool) -> Result<BTreeMap<String, Vec<u8>>> {
        let result = match &self.backing {
            Backing::Bytes(bytes) => {
                ZipArchive::new(Cursor::new(&bytes[..]))
                    .map_err(JarError::from)
                    .and_then(|mut archive| scan_zip(&mut archive, wanted))
            }
            Backing::Zip(path) => File::open(path)
                .map_err(JarError::from)
                .and_then(|file| Ok(ZipArchive::new(file)?))
                .and_then(|mut archive| scan_zip(&mut archive, wanted)),
            Backing::Directory(root) => scan_directory(root, wanted),
        };
        result.map_err(|err| err.in_archive(self.location.clone()))
    }
}

fn read_metadata(backing: &Backing) -> Result<RepositoryJarMetadata> {
    let manifest = read_entry(backing, MANIFEST_NAME)?.ok_or(JarError::MissingEntry {
        entry: MANIFEST_NAME,
    })?;
    let definitions = read_entry(backing, DEFINITION_INDEX_NAME)?.ok_or(JarError::MissingEntry {
        entry: DEFINITION_INDEX_NAME,
    })?;
    let references = read_entry(backing, REFERENCE_INDEX_NAME)?.ok_or(JarError::MissingEntry {
        entry: REFERENCE_INDEX_NAME,
    })?;
    RepositoryJarMetadata::from_entries(&manifest, &definitions, &references)
}

fn read_entry(backing: &Backing, name: &str) -> Result<Option<Vec<u8>>> {
    match backing {
        Backing::Bytes(bytes) => {
            let mut archive = ZipArchive::new(Cursor::new(&bytes[..]))?;
            read_zip_entry(&mut archive, name)
        }
        Backing::Zip(path) => {
            let mut archive = ZipArchive::new(File::open(path)?)?;
            read_zip_entry(&mut archive, name)
        }
        Backing::Directory(root) => {
            let Some(candidate) = directory_entry(root, name) else {
                return Ok(None);
            };
            if !candidate.is_file() {
                return Ok(None);
            }
            Ok(Some(std::fs::read(candidate)?))
        }
    }
}

fn read_zip_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>> {
    match archive.by_name(name) {
        Ok(mut entry) => {
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut bytes)?;
            Ok(Some(bytes))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn scan_zip<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    wanted: &dyn Fn(&str) -> bool,
) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut files = BTreeMap::new();
    for idx in 0..archive.len() {
        let mut entry = archive.by_index(idx)?;
        if entry.is_dir() || !wanted(entry.name()) {
            continue;
        }
        let name = entry.name().to_owned();
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        files.insert(name, bytes);
    }
    Ok(files)
}

fn scan_directory(root: &Path, wanted: &dyn Fn(&str) -> bool) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut files = BTreeMap::new();
    for entry in walkdir::WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry_name(root, entry.path()) else {
            continue;
        };
        if wanted(&name) {
            let bytes = std::fs::read(entry.path())?;
            files.insert(name, bytes);
        }
    }
    Ok(files)
}

/// Maps a `/`-separated entry name to a file below `root`. Names escaping
/// `root` map to nothing.
fn directory_entry(root: &Path, name: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in name.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            segment => path.push(segment),
        }
    }
    Some(path)
}

fn entry_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_str()?),
            _ => return None,
        }
    }
    Some(segments.join("/"))
}
