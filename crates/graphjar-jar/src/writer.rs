use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{Cursor, Seek, Write};
use std::path::Path;

use graphjar_binary::{
    ExternalReferenceSerializerLibrary, SourceSerialization, SourceSerializationResult,
    SourceSerializer,
};
use graphjar_config::SerializationConfig;
use graphjar_model::{ModelRepository, Source};
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::error::{JarError, Result};
use crate::metadata::{
    validate_path, DefinitionIndex, JarManifest, ReferenceIndex, DEFINITION_INDEX_NAME,
    MANIFEST_NAME, REFERENCE_INDEX_NAME,
};
use crate::JAR_TARGET;

/// Collects the serialized files of one repository and writes them as a jar.
///
/// Entries are written in a fixed order (manifest, definition index,
/// reference index, then files sorted by path) with a fixed timestamp, so the
/// same inputs always give the same bytes.
#[derive(Debug, Clone)]
pub struct RepositoryJarWriter {
    repository: String,
    platform_version: Option<String>,
    model_version: Option<String>,
    files: BTreeMap<String, Vec<u8>>,
    definitions: DefinitionIndex,
    references: ReferenceIndex,
}

impl RepositoryJarWriter {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            platform_version: Some(graphjar_core::PLATFORM_VERSION.to_owned()),
            model_version: None,
            files: BTreeMap::new(),
            definitions: DefinitionIndex::default(),
            references: ReferenceIndex::default(),
        }
    }

    pub fn with_platform_version(mut self, version: Option<String>) -> Self {
        self.platform_version = version;
        self
    }

    pub fn with_model_version(mut self, version: Option<String>) -> Self {
        self.model_version = version;
        self
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn definition_index(&self) -> &DefinitionIndex {
        &self.definitions
    }

    pub fn reference_index(&self) -> &ReferenceIndex {
        &self.references
    }

    pub fn add_serialization(&mut self, serialization: SourceSerialization) -> Result<()> {
        self.add_file(&serialization.result, serialization.bytes)
    }

    /// Adds the serialized form of one source. Nothing is recorded if the
    /// file is rejected.
    pub fn add_file(&mut self, result: &SourceSerializationResult, bytes: Vec<u8>) -> Result<()> {
        let path = graphjar_core::source_path_to_binary_path(&result.source_id);
        validate_path(&self.repository, &path)?;
        if self.files.contains_key(&path) {
            return Err(JarError::DuplicateFile { path });
        }
        let mut seen = BTreeSet::new();
        for instance in &result.defined_instances {
            if let Some(first) = self.definitions.get(instance) {
                return Err(JarError::DuplicateDefinition {
                    instance: instance.clone(),
                    first: first.to_owned(),
                    second: path,
                });
            }
            if !seen.insert(instance.as_str()) {
                return Err(JarError::DuplicateDefinition {
                    instance: instance.clone(),
                    first: path.clone(),
                    second: path,
                });
            }
        }

        for instance in &result.defined_instances {
            self.definitions.insert(instance.clone(), path.clone());
        }
        self.references
            .insert(path.clone(), result.external_references.clone());
        tracing::trace!(
            target: JAR_TARGET,
            path = %path,
            defined = result.defined_instances.len(),
            referenced = result.external_references.len(),
            "added file to jar"
        );
        self.files.insert(path, bytes);
        Ok(())
    }

    /// Serializes and adds every source of this repository. In-memory
    /// sources and sources of other repositories are skipped.
    pub fn add_sources<'s>(
        &mut self,
        repository: &ModelRepository,
        serializers: &ExternalReferenceSerializerLibrary,
        config: &SerializationConfig,
        sources: impl IntoIterator<Item = &'s Source>,
    ) -> Result<usize> {
        let serializer = SourceSerializer::new(repository, serializers).with_config(config.clone());
        let mut added = 0;
        for source in sources {
            if source.is_in_memory()
                || graphjar_core::file_repository(source.id()) != self.repository
            {
                continue;
            }
            let serialization =
                serializer
                    .serialize(source)
                    .map_err(|source_err| JarError::Serialize {
                        source_id: source.id().to_owned(),
                        source: source_err,
                    })?;
            self.add_serialization(serialization)?;
            added += 1;
        }
        Ok(added)
    }

    fn manifest(&self) -> JarManifest {
        JarManifest {
            repository_name: self.repository.clone(),
            platform_version: self.platform_version.clone(),
            model_version: self.model_version.clone(),
        }
    }

    fn metadata_entries(&self) -> Result<[(&'static str, Vec<u8>); 3]> {
        let definitions = serde_json::to_vec(&self.definitions)
            .map_err(|err| JarError::json(DEFINITION_INDEX_NAME, err))?;
        let references = serde_json::to_vec(&self.references)
            .map_err(|err| JarError::json(REFERENCE_INDEX_NAME, err))?;
        Ok([
            (MANIFEST_NAME, self.manifest().to_string().into_bytes()),
            (DEFINITION_INDEX_NAME, definitions),
            (REFERENCE_INDEX_NAME, references),
        ])
    }

    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<W> {
        let mut zip = ZipWriter::new(writer);
        let options = FileOptions::<()>::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644);

        for (name, bytes) in self.metadata_entries()? {
            zip.start_file(name, options)?;
            zip.write_all(&bytes)?;
        }
        for (path, bytes) in &self.files {
            zip.start_file(path.as_str(), options)?;
            zip.write_all(bytes)?;
        }
        let writer = zip.finish()?;
        tracing::debug!(
            target: JAR_TARGET,
            repository = %self.repository,
            files = self.files.len(),
            definitions = self.definitions.len(),
            "wrote repository jar"
        );
        Ok(writer)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.write_to(Cursor::new(Vec::new()))?.into_inner())
    }

    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        self.write_to(file)?;
        Ok(())
    }

    /// Writes the jar's entries as an unpacked directory tree.
    pub fn unpack_to(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        let metadata = self.metadata_entries()?;
        let entries = metadata
            .iter()
            .map(|(name, bytes)| (*name, bytes.as_slice()))
            .chain(
                self.files
                    .iter()
                    .map(|(path, bytes)| (path.as_str(), bytes.as_slice())),
            );
        for (name, bytes) in entries {
            let target = name
                .split('/')
                .fold(dir.to_path_buf(), |path, segment| path.join(segment));
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&target, bytes)?;
        }
        Ok(())
    }
}
