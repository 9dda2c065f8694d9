use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Numeric concept identifier.
pub type ConceptId = i64;

/// Relationship type representing subsumption ("is a") references.
pub const IS_A: ConceptId = 116680003;

/// Synthetic attribute key holding the union of every typed attribute
/// value set on a semantic index row.
pub const ATTRIBUTE_TYPE_WILDCARD: &str = "all";

/// The two parallel views of the reference graph: authored content versus
/// the post-classification closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Form {
    Stated,
    Inferred,
}

impl Form {
    pub fn from_stated_flag(stated: bool) -> Self {
        if stated {
            Form::Stated
        } else {
            Form::Inferred
        }
    }

    pub fn is_stated(&self) -> bool {
        matches!(self, Form::Stated)
    }

    /// Suffix used in semantic index row keys.
    pub fn key_suffix(&self) -> &'static str {
        match self {
            Form::Stated => "_s",
            Form::Inferred => "_i",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

impl PageRequest {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    pub fn of_size(limit: usize) -> Self {
        Self { offset: 0, limit }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 1000,
        }
    }
}

/// One page of concept references, partitioned by relationship type.
///
/// `total_rows` counts matching index rows, not relationship-type buckets;
/// see the pagination note on the semantic index query.
#[derive(Debug, Clone, Serialize)]
pub struct ConceptReferencesPage {
    pub reference_types: HashMap<ConceptId, HashSet<ConceptId>>,
    pub total_rows: u64,
    pub page: PageRequest,
}

impl ConceptReferencesPage {
    pub fn is_empty(&self) -> bool {
        self.reference_types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_key_suffix() {
        assert_eq!(Form::Stated.key_suffix(), "_s");
        assert_eq!(Form::Inferred.key_suffix(), "_i");
        assert!(Form::from_stated_flag(true).is_stated());
        assert!(!Form::from_stated_flag(false).is_stated());
    }
}
