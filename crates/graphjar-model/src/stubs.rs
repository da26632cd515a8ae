use std::collections::BTreeSet;

use crate::error::{ModelError, Result};
use crate::m3::properties;
use crate::node::NodeId;
use crate::repository::ModelRepository;

/// Placeholder node kinds standing in for an element referenced by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StubKind {
    Import,
    Property,
    Enum,
}

impl StubKind {
    /// Property holding the stub's target once resolved.
    pub fn resolved_property(self) -> &'static str {
        match self {
            StubKind::Import => properties::RESOLVED_NODE,
            StubKind::Property => properties::RESOLVED_PROPERTY,
            StubKind::Enum => properties::RESOLVED_ENUM,
        }
    }

    fn label(self) -> &'static str {
        match self {
            StubKind::Import => "import stub",
            StubKind::Property => "property stub",
            StubKind::Enum => "enum stub",
        }
    }
}

impl ModelRepository {
    pub fn stub_kind(&self, id: NodeId) -> Option<StubKind> {
        let classifier = self.node(id).classifier()?;
        let kernel = self.kernel();
        if classifier == kernel.import_stub {
            Some(StubKind::Import)
        } else if classifier == kernel.property_stub {
            Some(StubKind::Property)
        } else if classifier == kernel.enum_stub {
            Some(StubKind::Enum)
        } else {
            None
        }
    }

    /// Target already recorded on a stub, if any.
    pub fn resolved_stub_target(&self, stub: NodeId, kind: StubKind) -> Option<NodeId> {
        self.value(stub, kind.resolved_property())
    }
}

/// Finds the element a stub stands for.
///
/// Implementations must not mutate the repository; callers record the
/// returned target under [`StubKind::resolved_property`].
pub trait StubResolver {
    fn resolve_stub(&self, repository: &ModelRepository, stub: NodeId, kind: StubKind)
        -> Result<NodeId>;
}

/// Resolves stubs the way the compiler does: element paths and imported
/// packages for import stubs, property lookup through generalizations for
/// property stubs, and enumeration values for enum stubs.
#[derive(Debug, Clone, Copy, Default)]
pub struct M3StubResolver;

impl M3StubResolver {
    fn target(&self, repository: &ModelRepository, id: NodeId) -> Result<NodeId> {
        match repository.stub_kind(id) {
            Some(kind) => match repository.resolved_stub_target(id, kind) {
                Some(target) => Ok(target),
                None => self.resolve_stub(repository, id, kind),
            },
            None => Ok(id),
        }
    }

    fn string_property(
        repository: &ModelRepository,
        stub: NodeId,
        kind: StubKind,
        name: &str,
    ) -> Result<String> {
        repository
            .value(stub, name)
            .and_then(|value| repository.string_value(value))
            .map(str::to_owned)
            .ok_or_else(|| unresolved(repository, stub, kind, format!("missing '{name}'")))
    }

    fn resolve_import(&self, repository: &ModelRepository, stub: NodeId) -> Result<NodeId> {
        let kind = StubKind::Import;
        let id_or_path = Self::string_property(repository, stub, kind, properties::ID_OR_PATH)?;
        if id_or_path.contains(graphjar_core::PATH_SEPARATOR) {
            return repository.get_by_user_path(&id_or_path).ok_or_else(|| {
                unresolved(repository, stub, kind, format!("{id_or_path} has not been defined"))
            });
        }

        let mut found = BTreeSet::new();
        if let Some(group) = repository.value(stub, properties::IMPORT_GROUP) {
            for import in repository.values(group, properties::IMPORTS) {
                let package = repository
                    .value(*import, properties::PATH)
                    .and_then(|path| repository.string_value(path))
                    .and_then(|path| repository.get_by_user_path(path));
                if let Some(element) =
                    package.and_then(|package| repository.find_in_package(package, &id_or_path))
                {
                    found.insert(element);
                }
            }
        }

        if found.len() > 1 {
            let mut candidates: Vec<String> = found
                .into_iter()
                .map(|element| repository.user_path(element))
                .collect();
            candidates.sort();
            return Err(ModelError::AmbiguousImport {
                id_or_path,
                candidates,
            });
        }
        match found.into_iter().next() {
            Some(element) => Ok(element),
            None => repository.get_by_user_path(&id_or_path).ok_or_else(|| {
                unresolved(repository, stub, kind, format!("{id_or_path} has not been defined"))
            }),
        }
    }

    fn resolve_property(&self, repository: &ModelRepository, stub: NodeId) -> Result<NodeId> {
        let kind = StubKind::Property;
        let owner = repository
            .value(stub, properties::OWNER)
            .ok_or_else(|| unresolved(repository, stub, kind, "missing 'owner'".to_owned()))?;
        let owner = self.target(repository, owner)?;
        let name = Self::string_property(repository, stub, kind, properties::PROPERTY_NAME)?;
        repository
            .generalization_order(owner)
            .into_iter()
            .flat_map(|type_node| repository.values(type_node, properties::PROPERTIES).iter())
            .copied()
            .find(|property| repository.node(*property).name() == name)
            .ok_or_else(|| {
                unresolved(
                    repository,
                    stub,
                    kind,
                    format!(
                        "the property '{name}' can't be found in the type '{}' (or any supertype)",
                        repository.node(owner).name()
                    ),
                )
            })
    }

    fn resolve_enum(&self, repository: &ModelRepository, stub: NodeId) -> Result<NodeId> {
        let kind = StubKind::Enum;
        let enumeration = repository
            .value(stub, properties::ENUMERATION)
            .ok_or_else(|| unresolved(repository, stub, kind, "missing 'enumeration'".to_owned()))?;
        let enumeration = self.target(repository, enumeration)?;
        let name = Self::string_property(repository, stub, kind, properties::ENUM_NAME)?;
        repository
            .values(enumeration, properties::VALUES)
            .iter()
            .copied()
            .find(|value| repository.node(*value).name() == name)
            .ok_or_else(|| {
                unresolved(
                    repository,
                    stub,
                    kind,
                    format!(
                        "the enum value '{name}' can't be found in the enumeration {}",
                        repository.user_path(enumeration)
                    ),
                )
            })
    }
}

impl StubResolver for M3StubResolver {
    fn resolve_stub(
        &self,
        repository: &ModelRepository,
        stub: NodeId,
        kind: StubKind,
    ) -> Result<NodeId> {
        match kind {
            StubKind::Import => self.resolve_import(repository, stub),
            StubKind::Property => self.resolve_property(repository, stub),
            StubKind::Enum => self.resolve_enum(repository, stub),
        }
    }
}

fn unresolved(
    repository: &ModelRepository,
    stub: NodeId,
    kind: StubKind,
    message: String,
) -> ModelError {
    ModelError::UnresolvedStub {
        kind: kind.label(),
        stub: repository.describe(stub),
        message,
    }
}
