use std::collections::{BTreeMap, BTreeSet};

use graphjar_config::{LibraryConfig, LibraryMode};

use crate::error::{JarError, Result};
use crate::index::LibraryIndex;
use crate::jar::RepositoryJar;
use crate::JAR_TARGET;

/// Files by path.
pub type FileContents = BTreeMap<String, Vec<u8>>;

/// A set of repository jars queried as one.
///
/// Implementations only decide how file contents are read; every query over
/// files and instances goes through the merged [`LibraryIndex`].
pub trait RepositoryJarLibrary {
    fn index(&self) -> &LibraryIndex;

    fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    fn read_files(&self, paths: &[&str]) -> Result<FileContents>;

    /// Unknown repositories contribute nothing.
    fn read_repository_files(&self, repositories: &[&str]) -> Result<FileContents>;

    fn read_all_files(&self) -> Result<FileContents>;

    fn platform_version(&self) -> Option<&str> {
        self.index().platform_version()
    }

    fn model_version(&self) -> Option<&str> {
        self.index().model_version()
    }

    fn is_known_repository(&self, repository: &str) -> bool {
        self.index().is_known_repository(repository)
    }

    fn is_known_file(&self, path: &str) -> bool {
        self.index().is_known_file(path)
    }

    fn is_known_instance(&self, instance: &str) -> bool {
        self.index().is_known_instance(instance)
    }

    fn all_files(&self) -> Vec<String> {
        self.index().files().map(str::to_owned).collect()
    }

    fn repository_files(&self, repository: &str) -> Vec<String> {
        self.index()
            .files()
            .filter(|file| graphjar_core::file_repository(file) == repository)
            .map(str::to_owned)
            .collect()
    }

    /// Files below `directory`. Leading and trailing slashes are optional;
    /// the empty path and `/` name the root. A directory in an unknown
    /// repository is empty.
    fn directory_files(&self, directory: &str) -> Vec<String> {
        let relative = directory.strip_prefix('/').unwrap_or(directory);
        if relative.is_empty() {
            return self.all_files();
        }
        let repository = relative.split('/').next().unwrap_or(relative);
        if !self.is_known_repository(repository) {
            return Vec::new();
        }
        let prefix = if relative.ends_with('/') {
            relative.to_owned()
        } else {
            format!("{relative}/")
        };
        self.repository_files(repository)
            .into_iter()
            .filter(|file| file.starts_with(&prefix))
            .collect()
    }

    fn file_dependencies(&self, paths: &[&str]) -> Result<BTreeSet<String>> {
        self.index().file_dependencies(paths.iter().copied())
    }

    fn dependent_files(&self, paths: &[&str]) -> BTreeSet<String> {
        self.index().dependent_files(paths.iter().copied())
    }

    fn required_files(&self, instance: &str) -> Result<BTreeSet<String>> {
        self.index().required_files([instance])
    }

    fn required_files_for(&self, instances: &[&str]) -> Result<BTreeSet<String>> {
        self.index().required_files(instances.iter().copied())
    }
}

/// Reads files from the jars on demand.
#[derive(Debug)]
pub struct SimpleJarLibrary {
    jars: BTreeMap<String, RepositoryJar>,
    index: LibraryIndex,
}

impl SimpleJarLibrary {
    pub fn new(jars: impl IntoIterator<Item = RepositoryJar>) -> Result<Self> {
        Self::with_platform_version(jars, Some(graphjar_core::PLATFORM_VERSION))
    }

    pub fn with_platform_version(
        jars: impl IntoIterator<Item = RepositoryJar>,
        platform_version: Option<&str>,
    ) -> Result<Self> {
        let jars: Vec<RepositoryJar> = jars.into_iter().collect();
        let index = LibraryIndex::build(jars.iter().map(RepositoryJar::metadata), platform_version)?;
        let jars = jars
            .into_iter()
            .map(|jar| (jar.repository_name().to_owned(), jar))
            .collect();
        Ok(Self { jars, index })
    }

    fn jar_for(&self, path: &str) -> Result<&RepositoryJar> {
        if !self.index.is_known_file(path) {
            return Err(unknown_file(path));
        }
        self.jars
            .get(graphjar_core::file_repository(path))
            .ok_or_else(|| unknown_file(path))
    }
}

impl RepositoryJarLibrary for SimpleJarLibrary {
    fn index(&self) -> &LibraryIndex {
        &self.index
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.jar_for(path)?
            .read_file(path)?
            .ok_or_else(|| unknown_file(path))
    }

    fn read_files(&self, paths: &[&str]) -> Result<FileContents> {
        let mut by_repository: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for path in paths {
            let jar = self.jar_for(path)?;
            by_repository
                .entry(jar.repository_name())
                .or_default()
                .push(*path);
        }

        let mut files = FileContents::new();
        for (repository, paths) in by_repository {
            let Some(jar) = self.jars.get(repository) else {
                continue;
            };
            let mut read = jar.read_files(paths.iter().copied())?;
            if let Some(missing) = paths.iter().find(|path| !read.contains_key(**path)) {
                return Err(unknown_file(missing));
            }
            files.append(&mut read);
        }
        Ok(files)
    }

    fn read_repository_files(&self, repositories: &[&str]) -> Result<FileContents> {
        let mut files = FileContents::new();
        for repository in repositories {
            if let Some(jar) = self.jars.get(*repository) {
                files.append(&mut jar.read_all_files()?);
            }
        }
        Ok(files)
    }

    fn read_all_files(&self) -> Result<FileContents> {
        let mut files = FileContents::new();
        for jar in self.jars.values() {
            files.append(&mut jar.read_all_files()?);
        }
        Ok(files)
    }
}

/// Reads every file of every jar up front and serves reads from memory.
#[derive(Debug)]
pub struct CachedJarLibrary {
    files: FileContents,
    index: LibraryIndex,
}

impl CachedJarLibrary {
    pub fn new(jars: impl IntoIterator<Item = RepositoryJar>) -> Result<Self> {
        Self::with_platform_version(jars, Some(graphjar_core::PLATFORM_VERSION))
    }

    pub fn with_platform_version(
        jars: impl IntoIterator<Item = RepositoryJar>,
        platform_version: Option<&str>,
    ) -> Result<Self> {
        let jars: Vec<RepositoryJar> = jars.into_iter().collect();
        let index = LibraryIndex::build(jars.iter().map(RepositoryJar::metadata), platform_version)?;
        let mut files = FileContents::new();
        for jar in &jars {
            files.append(&mut jar.read_all_files()?);
        }
        tracing::debug!(
            target: JAR_TARGET,
            jars = jars.len(),
            files = files.len(),
            bytes = files.values().map(Vec::len).sum::<usize>(),
            "cached jar contents"
        );
        Ok(Self { files, index })
    }

    fn cached(&self, path: &str) -> Result<&Vec<u8>> {
        self.files.get(path).ok_or_else(|| unknown_file(path))
    }
}

impl RepositoryJarLibrary for CachedJarLibrary {
    fn index(&self) -> &LibraryIndex {
        &self.index
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.cached(path).cloned()
    }

    fn read_files(&self, paths: &[&str]) -> Result<FileContents> {
        let mut files = FileContents::new();
        for path in paths {
            files.insert((*path).to_owned(), self.cached(path)?.clone());
        }
        Ok(files)
    }

    fn read_repository_files(&self, repositories: &[&str]) -> Result<FileContents> {
        Ok(self
            .files
            .iter()
            .filter(|(path, _)| repositories.contains(&graphjar_core::file_repository(path)))
            .map(|(path, bytes)| (path.clone(), bytes.clone()))
            .collect())
    }

    fn read_all_files(&self) -> Result<FileContents> {
        Ok(self.files.clone())
    }
}

/// Builds the library kind selected by `config`.
pub fn open_library(
    jars: impl IntoIterator<Item = RepositoryJar>,
    config: &LibraryConfig,
) -> Result<Box<dyn RepositoryJarLibrary>> {
    let platform_version = config.effective_platform_version();
    Ok(match config.mode {
        LibraryMode::Simple => Box::new(SimpleJarLibrary::with_platform_version(
            jars,
            platform_version,
        )?),
        LibraryMode::Cached => Box::new(CachedJarLibrary::with_platform_version(
            jars,
            platform_version,
        )?),
    })
}

fn unknown_file(path: &str) -> JarError {
    JarError::UnknownFile {
        path: path.to_owned(),
    }
}
