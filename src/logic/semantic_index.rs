use log::debug;
use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::model::{
    ConceptId, ConceptReferencesPage, PageRequest, QueryConcept, ATTRIBUTE_TYPE_WILDCARD, IS_A,
};
use crate::store::Store;

pub struct SemanticIndex;

impl SemanticIndex {
    /// Find the concepts which reference `concept_id` on a branch, in the
    /// stated or inferred form, partitioned by relationship type.
    ///
    /// A referencing concept lands in the synthetic [`IS_A`] bucket when
    /// the target is one of its ancestors, otherwise under each attribute
    /// type whose value set contains the target. An empty result is an
    /// empty mapping, not an error.
    ///
    /// Pagination works on the underlying index rows, not on the grouped
    /// result: when true matches exceed the page size a single page can
    /// present an incomplete set of relationship-type buckets.
    pub async fn find_concept_references<S: Store>(
        store: &S,
        branch: &str,
        concept_id: ConceptId,
        stated: bool,
        page: &PageRequest,
    ) -> Result<ConceptReferencesPage> {
        let criteria = store.branch_visibility(branch).await?;
        let (rows, total_rows) = store
            .search_references(&criteria, concept_id, stated, page)
            .await?;
        debug!(
            "Concept reference query for {} on '{}' matched {} rows.",
            concept_id, branch, total_rows
        );

        let reference_types = collect_reference_types(&rows, concept_id)?;
        Ok(ConceptReferencesPage {
            reference_types,
            total_rows,
            page: *page,
        })
    }
}

/// Partition matching index rows into relationship-type buckets.
fn collect_reference_types(
    rows: &[QueryConcept],
    concept_id: ConceptId,
) -> Result<HashMap<ConceptId, HashSet<ConceptId>>> {
    let mut reference_types: HashMap<ConceptId, HashSet<ConceptId>> = HashMap::new();
    for row in rows {
        if row.ancestors.contains(&concept_id) {
            reference_types
                .entry(IS_A)
                .or_default()
                .insert(row.concept_id);
        } else {
            for (attribute_type, values) in &row.attr {
                if attribute_type == ATTRIBUTE_TYPE_WILDCARD {
                    continue;
                }
                if values.contains(&concept_id) {
                    let type_id: ConceptId = attribute_type.parse().map_err(|_| {
                        Error::CorruptIndex(format!(
                            "attribute type '{}' on concept {} is not numeric",
                            attribute_type, row.concept_id
                        ))
                    })?;
                    reference_types
                        .entry(type_id)
                        .or_default()
                        .insert(row.concept_id);
                }
            }
        }
    }
    Ok(reference_types)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const FINDING_SITE: ConceptId = 363698007;

    fn row(concept_id: ConceptId) -> QueryConcept {
        QueryConcept::new(concept_id, HashSet::new(), HashSet::new(), false)
    }

    #[test]
    fn ancestor_match_lands_in_is_a_bucket() {
        let mut referencing = row(100002);
        referencing.ancestors.insert(100001);

        let buckets = collect_reference_types(&[referencing], 100001).unwrap();
        assert_eq!(buckets[&IS_A], HashSet::from([100002]));
        assert_eq!(buckets.len(), 1);
    }

    #[test]
    fn attribute_match_lands_in_typed_bucket() {
        let mut referencing = row(100002);
        referencing.add_attribute(FINDING_SITE, 100001);

        let buckets = collect_reference_types(&[referencing], 100001).unwrap();
        assert_eq!(buckets[&FINDING_SITE], HashSet::from([100002]));
        assert!(!buckets.contains_key(&IS_A));
    }

    #[test]
    fn ancestor_match_shadows_attribute_match_for_same_row() {
        // A row referencing the target both ways is only an is-a reference.
        let mut referencing = row(100002);
        referencing.ancestors.insert(100001);
        referencing.add_attribute(FINDING_SITE, 100001);

        let buckets = collect_reference_types(&[referencing], 100001).unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[&IS_A], HashSet::from([100002]));
    }

    #[test]
    fn self_referencing_rows_pass_through() {
        let mut referencing = row(100001);
        referencing.ancestors.insert(100001);

        let buckets = collect_reference_types(&[referencing], 100001).unwrap();
        assert_eq!(buckets[&IS_A], HashSet::from([100001]));
    }

    #[test]
    fn no_rows_is_an_empty_mapping() {
        assert!(collect_reference_types(&[], 100001).unwrap().is_empty());
    }

    #[test]
    fn non_numeric_attribute_key_is_fatal() {
        let mut referencing = row(100002);
        referencing
            .attr
            .insert("finding-site".to_string(), HashSet::from([100001]));

        match collect_reference_types(&[referencing], 100001) {
            Err(Error::CorruptIndex(message)) => assert!(message.contains("finding-site")),
            other => panic!("expected corrupt index error, got {:?}", other),
        }
    }
}
