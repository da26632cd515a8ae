use std::collections::HashMap;

use crate::error::WireError;

/// Deduplicated strings of one serialized unit.
///
/// Ids are dense and assigned in registration order, so the table written
/// to the wire is a plain array.
#[derive(Debug, Default, Clone)]
pub struct StringTable {
    strings: Vec<String>,
    ids: HashMap<String, i32>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table read back from the wire.
    pub fn from_wire(strings: Vec<String>) -> Self {
        let ids = strings
            .iter()
            .enumerate()
            .map(|(id, s)| (s.clone(), id as i32))
            .collect();
        Self { strings, ids }
    }

    /// Returns the id of `s`, adding it if it is new.
    pub fn register(&mut self, s: &str) -> i32 {
        if let Some(id) = self.ids.get(s) {
            return *id;
        }
        let id = self.strings.len() as i32;
        self.strings.push(s.to_owned());
        self.ids.insert(s.to_owned(), id);
        id
    }

    pub fn id_of(&self, s: &str) -> Option<i32> {
        self.ids.get(s).copied()
    }

    pub fn get(&self, id: i32) -> Result<&str, WireError> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.strings.get(index))
            .map(String::as_str)
            .ok_or(WireError::UnknownStringId {
                id,
                count: self.strings.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }
}
