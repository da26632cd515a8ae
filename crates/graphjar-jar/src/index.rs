use std::collections::{BTreeMap, BTreeSet};

use crate::error::{JarError, Result};
use crate::metadata::RepositoryJarMetadata;
use crate::JAR_TARGET;

/// Merged definition and reference indexes of a set of jars.
///
/// All traversals run over files: a file depends on the files defining the
/// instances it references.
#[derive(Debug, Clone, Default)]
pub struct LibraryIndex {
    platform_version: Option<String>,
    model_version: Option<String>,
    repositories: BTreeSet<String>,
    definitions: BTreeMap<String, String>,
    definitions_by_file: BTreeMap<String, BTreeSet<String>>,
    references_by_file: BTreeMap<String, BTreeSet<String>>,
    files_by_reference: BTreeMap<String, BTreeSet<String>>,
}

impl LibraryIndex {
    /// Validates the jars against each other and against the running
    /// platform version, then merges their indexes.
    pub fn build<'m>(
        jars: impl IntoIterator<Item = &'m RepositoryJarMetadata>,
        platform_version: Option<&str>,
    ) -> Result<Self> {
        let jars: Vec<&RepositoryJarMetadata> = jars.into_iter().collect();
        let mut index = Self {
            platform_version: platform_version.map(str::to_owned),
            ..Self::default()
        };
        index.model_version = index.validate(&jars)?;

        for jar in &jars {
            for (instance, file) in jar.definition_index().iter() {
                if let Some(first) = index.definitions.get(instance) {
                    return Err(JarError::DuplicateDefinition {
                        instance: instance.to_owned(),
                        first: first.clone(),
                        second: file.to_owned(),
                    });
                }
                index
                    .definitions
                    .insert(instance.to_owned(), file.to_owned());
                index
                    .definitions_by_file
                    .entry(file.to_owned())
                    .or_default()
                    .insert(instance.to_owned());
            }
            for (file, references) in jar.reference_index().iter() {
                if index.references_by_file.contains_key(file) {
                    return Err(JarError::DuplicateReferenceIndex {
                        path: file.to_owned(),
                    });
                }
                for reference in references {
                    index
                        .files_by_reference
                        .entry(reference.clone())
                        .or_default()
                        .insert(file.to_owned());
                }
                index
                    .references_by_file
                    .insert(file.to_owned(), references.clone());
            }
        }

        tracing::debug!(
            target: JAR_TARGET,
            jars = jars.len(),
            files = index.references_by_file.len(),
            instances = index.definitions.len(),
            "built jar library index"
        );
        Ok(index)
    }

    /// Returns the model version shared by the jars.
    fn validate(&mut self, jars: &[&RepositoryJarMetadata]) -> Result<Option<String>> {
        let mut platform_versions = BTreeSet::new();
        let mut model_versions = BTreeSet::new();
        for jar in jars {
            let repository = jar.repository_name();
            if !self.repositories.insert(repository.to_owned()) {
                return Err(JarError::DuplicateRepository {
                    repository: repository.to_owned(),
                });
            }
            if let Some(version) = jar.platform_version() {
                platform_versions.insert(version.to_owned());
            }
            if let Some(version) = jar.model_version() {
                model_versions.insert(version.to_owned());
            }
        }

        match platform_versions.len() {
            0 => {
                if !jars.is_empty() && self.platform_version.is_some() {
                    return Err(JarError::PlatformVersionMismatch {
                        expected: self.platform_version.clone(),
                        found: None,
                    });
                }
            }
            1 => {
                let found = platform_versions.into_iter().next();
                if found != self.platform_version {
                    return Err(JarError::PlatformVersionMismatch {
                        expected: self.platform_version.clone(),
                        found,
                    });
                }
            }
            _ => {
                return Err(JarError::ConflictingPlatformVersions {
                    versions: platform_versions.into_iter().collect(),
                })
            }
        }

        if model_versions.len() > 1 {
            return Err(JarError::ConflictingModelVersions {
                versions: model_versions.into_iter().collect(),
            });
        }
        Ok(model_versions.into_iter().next())
    }

    pub fn platform_version(&self) -> Option<&str> {
        self.platform_version.as_deref()
    }

    pub fn model_version(&self) -> Option<&str> {
        self.model_version.as_deref()
    }

    pub fn is_known_repository(&self, repository: &str) -> bool {
        self.repositories.contains(repository)
    }

    pub fn is_known_file(&self, file: &str) -> bool {
        self.references_by_file.contains_key(file)
    }

    pub fn is_known_instance(&self, instance: &str) -> bool {
        self.definitions.contains_key(instance)
    }

    pub fn repositories(&self) -> impl Iterator<Item = &str> {
        self.repositories.iter().map(String::as_str)
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.references_by_file.keys().map(String::as_str)
    }

    pub fn definition_file(&self, instance: &str) -> Option<&str> {
        self.definitions.get(instance).map(String::as_str)
    }

    pub fn instances_defined_in(&self, file: &str) -> impl Iterator<Item = &str> {
        self.definitions_by_file
            .get(file)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    pub fn references_in(&self, file: &str) -> Option<&BTreeSet<String>> {
        self.references_by_file.get(file)
    }

    /// Files referencing `instance` without defining it.
    pub fn files_referencing(&self, instance: &str) -> impl Iterator<Item = &str> {
        self.files_by_reference
            .get(instance)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// The seeds plus every file they transitively depend on.
    pub fn file_dependencies<'a>(
        &self,
        files: impl IntoIterator<Item = &'a str>,
    ) -> Result<BTreeSet<String>> {
        let mut stack: Vec<String> = files.into_iter().map(str::to_owned).collect();
        let mut results = BTreeSet::new();
        while let Some(file) = stack.pop() {
            if results.contains(&file) {
                continue;
            }
            let references =
                self.references_by_file
                    .get(&file)
                    .ok_or_else(|| JarError::MissingFileDependencies { path: file.clone() })?;
            for reference in references {
                let definition =
                    self.definitions
                        .get(reference)
                        .ok_or_else(|| JarError::MissingDefinition {
                            instance: reference.clone(),
                            referenced_from: file.clone(),
                        })?;
                stack.push(definition.clone());
            }
            results.insert(file);
        }
        Ok(results)
    }

    /// The seeds plus every file that transitively depends on one of them.
    pub fn dependent_files<'a>(&self, files: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
        let mut stack: Vec<String> = files.into_iter().map(str::to_owned).collect();
        let mut results = BTreeSet::new();
        while let Some(file) = stack.pop() {
            if results.contains(&file) {
                continue;
            }
            for instance in self.instances_defined_in(&file) {
                stack.extend(self.files_referencing(instance).map(str::to_owned));
            }
            results.insert(file);
        }
        results
    }

    /// Files needed to load the given instances.
    pub fn required_files<'a>(
        &self,
        instances: impl IntoIterator<Item = &'a str>,
    ) -> Result<BTreeSet<String>> {
        let mut seeds = Vec::new();
        for instance in instances {
            let file = self
                .definition_file(instance)
                .ok_or_else(|| JarError::UnknownInstance {
                    instance: instance.to_owned(),
                })?;
            seeds.push(file);
        }
        self.file_dependencies(seeds)
    }
}
