use graphjar_config::ResolutionConfig;
use graphjar_model::ModelRepository;

use crate::deserializer::{DeserializedSource, ResolutionResult};
use crate::error::{DeserializeError, UnresolvedReference};
use crate::BINARY_TARGET;

/// Outcome of [`GraphLoader::load`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub sources: Vec<String>,
    pub instances: usize,
    pub rounds: usize,
    /// References still unresolved when resolution stopped making progress.
    pub unresolved: Vec<UnresolvedReference>,
}

/// Loads a batch of deserialized units into a repository.
///
/// All units are initialized before any reference is resolved, so units may
/// refer to each other in any order. Resolution then runs in rounds: every
/// unit resolves what it can, then commits the properties whose values are
/// all known. Rounds stop once everything is resolved or a round makes no
/// progress.
pub struct GraphLoader<'r> {
    repository: &'r mut ModelRepository,
    options: ResolutionConfig,
    units: Vec<DeserializedSource>,
}

impl<'r> GraphLoader<'r> {
    pub fn new(repository: &'r mut ModelRepository, options: ResolutionConfig) -> Self {
        Self {
            repository,
            options,
            units: Vec::new(),
        }
    }

    pub fn add(&mut self, unit: DeserializedSource) -> &mut Self {
        self.units.push(unit);
        self
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn load(mut self) -> Result<LoadReport, DeserializeError> {
        let mut instances = 0;
        for unit in &mut self.units {
            unit.initialize(self.repository)?;
            instances += unit.instances().count();
        }

        let mut rounds = 0;
        loop {
            rounds += 1;
            let result = self.round()?;
            tracing::trace!(
                target: BINARY_TARGET,
                round = rounds,
                newly_resolved = result.newly_resolved,
                unresolved = result.unresolved,
                "resolution round"
            );
            if result.unresolved == 0 || result.newly_resolved == 0 {
                break;
            }
            if rounds >= self.options.max_rounds {
                return Err(DeserializeError::ResolutionDidNotConverge {
                    rounds,
                    unresolved: result.unresolved,
                });
            }
        }

        let unresolved: Vec<UnresolvedReference> = self
            .units
            .iter()
            .flat_map(|unit| unit.collect_unresolved(self.repository))
            .collect();
        if !unresolved.is_empty() {
            if self.options.fail_on_unresolved {
                return Err(DeserializeError::UnresolvedReferences {
                    references: unresolved,
                });
            }
            for reference in &unresolved {
                tracing::warn!(target: BINARY_TARGET, %reference, "unresolved reference");
            }
        }

        let sources: Vec<String> = self
            .units
            .iter()
            .map(|unit| unit.source_id().to_owned())
            .collect();
        tracing::debug!(
            target: BINARY_TARGET,
            sources = sources.len(),
            instances,
            rounds,
            unresolved = unresolved.len(),
            "loaded sources"
        );
        Ok(LoadReport {
            sources,
            instances,
            rounds,
            unresolved,
        })
    }

    fn round(&mut self) -> Result<ResolutionResult, DeserializeError> {
        let mut result = ResolutionResult::default();
        for unit in &mut self.units {
            result += unit.resolve_references(self.repository)?;
        }
        for unit in &mut self.units {
            unit.populate_resolved_properties(self.repository)?;
        }
        Ok(result)
    }
}

/// Loads a single unit.
pub fn load_source(
    repository: &mut ModelRepository,
    unit: DeserializedSource,
    options: ResolutionConfig,
) -> Result<LoadReport, DeserializeError> {
    let mut loader = GraphLoader::new(repository, options);
    loader.add(unit);
    loader.load()
}
