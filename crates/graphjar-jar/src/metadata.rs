//! Jar metadata: the manifest and the two JSON side indexes.
//!
//! ```text
//! META-INF/MANIFEST.MF              repository name, platform and model versions
//! META-INF/definition-index.json    { "<instance path>": "<file>" }
//! META-INF/reference-index.json     { "<file>": ["<instance path>", ...] }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{JarError, Result};

pub const MANIFEST_NAME: &str = "META-INF/MANIFEST.MF";
pub const DEFINITION_INDEX_NAME: &str = "META-INF/definition-index.json";
pub const REFERENCE_INDEX_NAME: &str = "META-INF/reference-index.json";

const MANIFEST_VERSION: &str = "Manifest-Version";
const REPOSITORY_NAME: &str = "Repository-Name";
const PLATFORM_VERSION: &str = "Platform-Version";
const MODEL_VERSION: &str = "Model-Version";

pub fn is_metadata_entry(name: &str) -> bool {
    name.starts_with("META-INF/")
}

/// Instance path to the file defining it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefinitionIndex(BTreeMap<String, String>);

impl DefinitionIndex {
    pub fn get(&self, instance: &str) -> Option<&str> {
        self.0.get(instance).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the previous defining file if `instance` was already present.
    pub(crate) fn insert(&mut self, instance: String, file: String) -> Option<String> {
        self.0.insert(instance, file)
    }
}

/// File to the instance paths it references without defining them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceIndex(BTreeMap<String, BTreeSet<String>>);

impl ReferenceIndex {
    pub fn get(&self, file: &str) -> Option<&BTreeSet<String>> {
        self.0.get(file)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn contains_file(&self, file: &str) -> bool {
        self.0.contains_key(file)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn insert(
        &mut self,
        file: String,
        references: BTreeSet<String>,
    ) -> Option<BTreeSet<String>> {
        self.0.insert(file, references)
    }
}

/// Attributes stored in the jar manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JarManifest {
    pub repository_name: String,
    pub platform_version: Option<String>,
    pub model_version: Option<String>,
}

impl JarManifest {
    pub fn parse(text: &str) -> Result<Self> {
        let mut attributes: Vec<(String, String)> = Vec::new();
        for line in text.lines() {
            if let Some(continuation) = line.strip_prefix(' ') {
                match attributes.last_mut() {
                    Some((_, value)) => value.push_str(continuation),
                    None => {
                        return Err(JarError::InvalidManifest {
                            message: "continuation line before any attribute".to_owned(),
                        })
                    }
                }
                continue;
            }
            if line.is_empty() {
                continue;
            }
            let Some((name, value)) = line.split_once(':') else {
                return Err(JarError::InvalidManifest {
                    message: format!("malformed line: {line}"),
                });
            };
            attributes.push((name.trim().to_owned(), value.trim_start().to_owned()));
        }

        let attribute = |name: &str| {
            attributes
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.clone())
                .filter(|value| !value.is_empty())
        };
        let repository_name =
            attribute(REPOSITORY_NAME).ok_or_else(|| JarError::InvalidManifest {
                message: format!("missing {REPOSITORY_NAME}"),
            })?;
        Ok(Self {
            repository_name,
            platform_version: attribute(PLATFORM_VERSION),
            model_version: attribute(MODEL_VERSION),
        })
    }
}

/// Renders the manifest with CRLF line endings.
impl fmt::Display for JarManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{MANIFEST_VERSION}: 1.0\r\n")?;
        write!(f, "{REPOSITORY_NAME}: {}\r\n", self.repository_name)?;
        if let Some(version) = &self.platform_version {
            write!(f, "{PLATFORM_VERSION}: {version}\r\n")?;
        }
        if let Some(version) = &self.model_version {
            write!(f, "{MODEL_VERSION}: {version}\r\n")?;
        }
        f.write_str("\r\n")
    }
}

/// Everything a jar says about itself, read once when the jar is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryJarMetadata {
    manifest: JarManifest,
    definition_index: DefinitionIndex,
    reference_index: ReferenceIndex,
}

impl RepositoryJarMetadata {
    /// Checks that every indexed file belongs to the manifest's repository.
    pub fn new(
        manifest: JarManifest,
        definition_index: DefinitionIndex,
        reference_index: ReferenceIndex,
    ) -> Result<Self> {
        let repository = manifest.repository_name.as_str();
        for (_, file) in definition_index.iter() {
            validate_path(repository, file)?;
        }
        for file in reference_index.files() {
            validate_path(repository, file)?;
        }
        Ok(Self {
            manifest,
            definition_index,
            reference_index,
        })
    }

    /// Builds the metadata from the raw contents of the three metadata entries.
    pub fn from_entries(manifest: &[u8], definitions: &[u8], references: &[u8]) -> Result<Self> {
        let manifest = std::str::from_utf8(manifest).map_err(|_| JarError::InvalidManifest {
            message: "manifest is not valid utf-8".to_owned(),
        })?;
        let manifest = JarManifest::parse(manifest)?;
        let definition_index = serde_json::from_slice(definitions)
            .map_err(|err| JarError::json(DEFINITION_INDEX_NAME, err))?;
        let reference_index = serde_json::from_slice(references)
            .map_err(|err| JarError::json(REFERENCE_INDEX_NAME, err))?;
        Self::new(manifest, definition_index, reference_index)
    }

    pub fn repository_name(&self) -> &str {
        &self.manifest.repository_name
    }

    pub fn platform_version(&self) -> Option<&str> {
        self.manifest.platform_version.as_deref()
    }

    pub fn model_version(&self) -> Option<&str> {
        self.manifest.model_version.as_deref()
    }

    pub fn manifest(&self) -> &JarManifest {
        &self.manifest
    }

    pub fn definition_index(&self) -> &DefinitionIndex {
        &self.definition_index
    }

    pub fn reference_index(&self) -> &ReferenceIndex {
        &self.reference_index
    }
}

/// Rejects `path` unless it belongs to `repository`.
pub fn validate_path(repository: &str, path: &str) -> Result<()> {
    if graphjar_core::file_repository(path) == repository {
        Ok(())
    } else {
        Err(JarError::InvalidPath {
            repository: repository.to_owned(),
            path: path.to_owned(),
        })
    }
}
