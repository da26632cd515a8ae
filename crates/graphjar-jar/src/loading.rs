use std::collections::BTreeSet;

use graphjar_binary::{deserialize, ExternalReferenceSerializerLibrary, GraphLoader, LoadReport};
use graphjar_config::ResolutionConfig;
use graphjar_model::ModelRepository;

use crate::error::{JarError, Result};
use crate::library::RepositoryJarLibrary;
use crate::JAR_TARGET;

/// Outcome of loading files from a jar library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryLoadReport {
    /// Files read in this load, sorted by path.
    pub files: Vec<String>,
    pub report: LoadReport,
}

/// Loads instances from a jar library into a repository, together with
/// every file they depend on.
pub struct LibraryLoader<'l> {
    library: &'l dyn RepositoryJarLibrary,
    serializers: &'l ExternalReferenceSerializerLibrary,
    options: ResolutionConfig,
    loaded: BTreeSet<String>,
}

impl<'l> LibraryLoader<'l> {
    pub fn new(
        library: &'l dyn RepositoryJarLibrary,
        serializers: &'l ExternalReferenceSerializerLibrary,
    ) -> Self {
        Self {
            library,
            serializers,
            options: ResolutionConfig::default(),
            loaded: BTreeSet::new(),
        }
    }

    pub fn with_options(mut self, options: ResolutionConfig) -> Self {
        self.options = options;
        self
    }

    /// Files already in the target repository. They are never read again.
    pub fn loaded_files(&self) -> &BTreeSet<String> {
        &self.loaded
    }

    pub fn load_instances(
        &mut self,
        repository: &mut ModelRepository,
        instances: &[&str],
    ) -> Result<LibraryLoadReport> {
        let files = self.library.required_files_for(instances)?;
        self.load_closure(repository, files)
    }

    /// Loads `files` and their dependencies.
    pub fn load_files(
        &mut self,
        repository: &mut ModelRepository,
        files: &[&str],
    ) -> Result<LibraryLoadReport> {
        let files = self.library.file_dependencies(files)?;
        self.load_closure(repository, files)
    }

    pub fn load_all(&mut self, repository: &mut ModelRepository) -> Result<LibraryLoadReport> {
        let files = self.library.all_files();
        let files: Vec<&str> = files.iter().map(String::as_str).collect();
        self.load_files(repository, &files)
    }

    fn load_closure(
        &mut self,
        repository: &mut ModelRepository,
        files: BTreeSet<String>,
    ) -> Result<LibraryLoadReport> {
        let files: Vec<String> = files
            .into_iter()
            .filter(|file| !self.loaded.contains(file))
            .collect();
        let paths: Vec<&str> = files.iter().map(String::as_str).collect();
        let contents = self.library.read_files(&paths)?;

        let mut loader = GraphLoader::new(repository, self.options);
        for (path, bytes) in &contents {
            let unit = deserialize(bytes, self.serializers).map_err(|source| {
                JarError::Deserialize {
                    path: path.clone(),
                    source,
                }
            })?;
            loader.add(unit);
        }
        let report = loader.load().map_err(JarError::Load)?;

        tracing::debug!(
            target: JAR_TARGET,
            files = files.len(),
            instances = report.instances,
            rounds = report.rounds,
            "loaded files from jar library"
        );
        self.loaded.extend(files.iter().cloned());
        Ok(LibraryLoadReport { files, report })
    }
}
