use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::ConceptId;

/// Shared contract of every tracked entity type.
///
/// A component with no effective time is unreleased. Releasing stamps the
/// effective time permanently; the branch-scoped validity interval of each
/// document version is owned by the store layer, not the component itself.
pub trait VersionedComponent: Clone + Send + Sync + 'static {
    /// Stable identifier, used for deterministic scan ordering.
    fn component_id(&self) -> &str;

    fn module_id(&self) -> ConceptId;

    fn is_active(&self) -> bool;

    fn effective_time(&self) -> Option<u32>;

    fn is_released(&self) -> bool {
        self.effective_time().is_some()
    }

    /// Stamp the component as permanently published at the given date.
    fn release(&mut self, effective_time: u32);

    fn mark_changed(&mut self);

    /// Type label used in logs.
    fn type_name() -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub concept_id: String,
    pub module_id: ConceptId,
    pub active: bool,
    pub effective_time: Option<u32>,
    pub definition_status_id: ConceptId,
    #[serde(skip)]
    pub changed: bool,
}

impl Concept {
    pub fn new(concept_id: impl Into<String>, module_id: ConceptId) -> Self {
        Self {
            concept_id: concept_id.into(),
            module_id,
            active: true,
            effective_time: None,
            definition_status_id: 900000000000074008,
            changed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Description {
    pub description_id: String,
    /// Store-level document identifier. Unique per document version and
    /// used as the stable sort key for cross-branch scans.
    pub internal_id: String,
    pub concept_id: String,
    pub term: String,
    /// Search-folded form of `term`, maintained by the bulk maintenance
    /// pipeline when folding configuration changes.
    pub term_folded: String,
    pub language_code: String,
    pub type_id: ConceptId,
    pub module_id: ConceptId,
    pub active: bool,
    pub effective_time: Option<u32>,
    #[serde(skip)]
    pub changed: bool,
}

impl Description {
    pub fn new(
        description_id: impl Into<String>,
        concept_id: impl Into<String>,
        term: impl Into<String>,
        language_code: impl Into<String>,
        module_id: ConceptId,
    ) -> Self {
        let term = term.into();
        Self {
            description_id: description_id.into(),
            internal_id: Uuid::new_v4().to_string(),
            concept_id: concept_id.into(),
            term_folded: term.to_lowercase(),
            term,
            language_code: language_code.into(),
            type_id: 900000000000013009,
            module_id,
            active: true,
            effective_time: None,
            changed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub relationship_id: String,
    pub source_id: String,
    pub destination_id: String,
    pub type_id: ConceptId,
    pub relationship_group: i32,
    pub module_id: ConceptId,
    pub active: bool,
    pub effective_time: Option<u32>,
    #[serde(skip)]
    pub changed: bool,
}

impl Relationship {
    pub fn new(
        relationship_id: impl Into<String>,
        source_id: impl Into<String>,
        destination_id: impl Into<String>,
        type_id: ConceptId,
        module_id: ConceptId,
    ) -> Self {
        Self {
            relationship_id: relationship_id.into(),
            source_id: source_id.into(),
            destination_id: destination_id.into(),
            type_id,
            relationship_group: 0,
            module_id,
            active: true,
            effective_time: None,
            changed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSetMember {
    pub member_id: String,
    pub refset_id: ConceptId,
    pub referenced_component_id: String,
    pub module_id: ConceptId,
    pub active: bool,
    pub effective_time: Option<u32>,
    #[serde(skip)]
    pub changed: bool,
}

impl ReferenceSetMember {
    pub fn new(refset_id: ConceptId, referenced_component_id: impl Into<String>, module_id: ConceptId) -> Self {
        Self {
            member_id: Uuid::new_v4().to_string(),
            refset_id,
            referenced_component_id: referenced_component_id.into(),
            module_id,
            active: true,
            effective_time: None,
            changed: false,
        }
    }
}

macro_rules! impl_versioned_component {
    ($ty:ty, $id_field:ident, $name:literal) => {
        impl VersionedComponent for $ty {
            fn component_id(&self) -> &str {
                &self.$id_field
            }

            fn module_id(&self) -> ConceptId {
                self.module_id
            }

            fn is_active(&self) -> bool {
                self.active
            }

            fn effective_time(&self) -> Option<u32> {
                self.effective_time
            }

            fn release(&mut self, effective_time: u32) {
                self.effective_time = Some(effective_time);
            }

            fn mark_changed(&mut self) {
                self.changed = true;
            }

            fn type_name() -> &'static str {
                $name
            }
        }
    };
}

impl_versioned_component!(Concept, concept_id, "concept");
impl_versioned_component!(Description, description_id, "description");
impl_versioned_component!(Relationship, relationship_id, "relationship");
impl_versioned_component!(ReferenceSetMember, member_id, "reference set member");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_stamps_effective_time() {
        let mut concept = Concept::new("100001", 900000000000207008);
        assert!(!concept.is_released());

        concept.release(20240101);
        concept.mark_changed();
        assert_eq!(concept.effective_time, Some(20240101));
        assert!(concept.is_released());
        assert!(concept.changed);
    }

    #[test]
    fn changed_flag_is_not_serialized() {
        let mut description = Description::new("101", "100001", "Heart", "en", 1);
        description.mark_changed();

        let json = serde_json::to_string(&description).unwrap();
        assert!(!json.contains("changed"));

        let parsed: Description = serde_json::from_str(&json).unwrap();
        assert!(!parsed.changed);
    }

    #[test]
    fn new_description_starts_with_lowercase_folded_term() {
        let description = Description::new("101", "100001", "Heart structure", "en", 1);
        assert_eq!(description.term_folded, "heart structure");
    }
}
