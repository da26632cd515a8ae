use std::collections::BTreeMap;

use crate::node::NodeId;

/// One compilation input and the root nodes its parsers produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    id: String,
    content: Option<String>,
    immutable: bool,
    in_memory: bool,
    compiled: bool,
    // Parser name -> roots, iterated in parser name order.
    elements_by_parser: BTreeMap<String, Vec<NodeId>>,
}

impl Source {
    pub fn new(id: impl Into<String>, content: Option<String>) -> Self {
        Self {
            id: id.into(),
            content,
            immutable: false,
            in_memory: false,
            compiled: false,
            elements_by_parser: BTreeMap::new(),
        }
    }

    pub fn with_immutable(mut self, immutable: bool) -> Self {
        self.immutable = immutable;
        self
    }

    pub fn with_in_memory(mut self, in_memory: bool) -> Self {
        self.in_memory = in_memory;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    pub fn set_compiled(&mut self, compiled: bool) {
        self.compiled = compiled;
    }

    pub fn add_element(&mut self, parser: impl Into<String>, element: NodeId) {
        self.elements_by_parser
            .entry(parser.into())
            .or_default()
            .push(element);
    }

    pub fn elements_by_parser(&self) -> &BTreeMap<String, Vec<NodeId>> {
        &self.elements_by_parser
    }

    /// Root nodes in parser-name order.
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.elements_by_parser.values().flatten().copied()
    }
}
