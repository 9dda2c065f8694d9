use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::model::{ConceptId, Form, ATTRIBUTE_TYPE_WILDCARD};

/// Materialized transitive-closure row for one concept on one branch
/// version and form.
///
/// Invariants:
/// - `ancestors` is a superset of `parents`.
/// - the wildcard attribute set is the union of every typed value set.
/// - exactly one row exists per (concept, branch-visible version, form).
///
/// Rows are derived data, rebuilt by an external process whenever the graph
/// they summarize changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConcept {
    /// Row key: `"{conceptId}{form suffix}"`.
    pub concept_id_form: String,
    pub concept_id: ConceptId,
    pub parents: HashSet<ConceptId>,
    pub ancestors: HashSet<ConceptId>,
    pub stated: bool,
    /// Typed attribute value sets keyed by attribute type id, plus the
    /// synthetic wildcard key.
    pub attr: HashMap<String, HashSet<ConceptId>>,
}

impl QueryConcept {
    pub fn new(
        concept_id: ConceptId,
        parents: HashSet<ConceptId>,
        ancestors: HashSet<ConceptId>,
        stated: bool,
    ) -> Self {
        let mut attr = HashMap::new();
        attr.insert(ATTRIBUTE_TYPE_WILDCARD.to_string(), HashSet::new());
        Self {
            concept_id_form: Self::to_concept_id_form(concept_id, stated),
            concept_id,
            parents,
            ancestors,
            stated,
            attr,
        }
    }

    pub fn to_concept_id_form(concept_id: ConceptId, stated: bool) -> String {
        format!("{}{}", concept_id, Form::from_stated_flag(stated).key_suffix())
    }

    /// Record a typed attribute target, keeping the wildcard union in step.
    pub fn add_attribute(&mut self, attribute_type: ConceptId, value: ConceptId) {
        self.attr
            .entry(attribute_type.to_string())
            .or_default()
            .insert(value);
        self.attr
            .entry(ATTRIBUTE_TYPE_WILDCARD.to_string())
            .or_default()
            .insert(value);
    }

    pub fn wildcard_values(&self) -> Option<&HashSet<ConceptId>> {
        self.attr.get(ATTRIBUTE_TYPE_WILDCARD)
    }

    pub fn form(&self) -> Form {
        Form::from_stated_flag(self.stated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> QueryConcept {
        QueryConcept::new(
            100001,
            HashSet::from([100002]),
            HashSet::from([100002, 100003]),
            false,
        )
    }

    #[test]
    fn row_key_includes_form_suffix() {
        assert_eq!(row().concept_id_form, "100001_i");
        assert_eq!(QueryConcept::to_concept_id_form(100001, true), "100001_s");
    }

    #[test]
    fn ancestors_contain_parents() {
        let row = row();
        assert!(row.parents.is_subset(&row.ancestors));
    }

    #[test]
    fn wildcard_tracks_union_of_typed_values() {
        let mut row = row();
        row.add_attribute(363698007, 39057004);
        row.add_attribute(363698007, 53085002);
        row.add_attribute(116676008, 415582006);

        let mut union = HashSet::new();
        for (key, values) in &row.attr {
            if key != ATTRIBUTE_TYPE_WILDCARD {
                union.extend(values.iter().copied());
            }
        }
        assert_eq!(row.wildcard_values(), Some(&union));
        assert_eq!(union.len(), 3);
    }

    #[test]
    fn new_row_has_empty_wildcard() {
        assert_eq!(row().wildcard_values(), Some(&HashSet::new()));
    }
}
