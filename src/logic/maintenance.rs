use log::{error, info};
use serde::Serialize;
use std::collections::HashMap;

use crate::config::SearchLanguagesConfig;
use crate::error::Result;
use crate::logic::batch::{Batcher, DEFAULT_BATCH_SIZE, SCROLL_PAGE_SIZE};
use crate::store::{Store, TermFoldedUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReindexResult {
    pub documents_scanned: u64,
    pub documents_updated: u64,
}

/// Cross-branch bulk corrections of derived fields.
///
/// Unlike the versioning pipeline this work is not commit-scoped: batches
/// flushed before a failure remain applied, and concurrent branch-local
/// commits may interleave with the scan. Any future bulk job should reuse
/// this shape - bounded streaming cursor, fixed batch size, per-batch
/// flush - rather than materializing the full result set.
pub struct BulkMaintenance;

impl BulkMaintenance {
    /// Recompute the search-folded form of every description with the
    /// given language code, on all branches, persisting only documents
    /// whose folded value changed.
    ///
    /// The first unrecoverable storage failure aborts the remaining scan
    /// and surfaces the error; the description read view is refreshed on
    /// success and failure alike so reads observe every applied batch.
    pub async fn reindex_for_language<S: Store>(
        store: &S,
        search_config: &SearchLanguagesConfig,
        language_code: &str,
    ) -> Result<ReindexResult> {
        let empty = HashMap::new();
        let fold_rules = search_config.fold_rules(language_code).unwrap_or(&empty);
        info!(
            "Reindexing all description documents in version control with language code '{}' using {} fold rules.",
            language_code,
            fold_rules.len()
        );

        let mut scanned: u64 = 0;
        let mut updated: u64 = 0;
        let scan_result =
            Self::scan_and_update(store, fold_rules, language_code, &mut scanned, &mut updated)
                .await;
        let refresh_result = store.refresh_description_index().await;

        match scan_result {
            Ok(()) => {
                refresh_result?;
                info!(
                    "Completed reindexing of description documents with language code '{}'. \
                     Of the {} documents found {} were updated due to a character folding change.",
                    language_code, scanned, updated
                );
                Ok(ReindexResult {
                    documents_scanned: scanned,
                    documents_updated: updated,
                })
            }
            Err(scan_error) => {
                error!(
                    "Aborted reindexing of description documents with language code '{}' after \
                     scanning {} documents ({} staged updates): {}",
                    language_code, scanned, updated, scan_error
                );
                Err(scan_error)
            }
        }
    }

    async fn scan_and_update<S: Store>(
        store: &S,
        fold_rules: &HashMap<char, char>,
        language_code: &str,
        scanned: &mut u64,
        updated: &mut u64,
    ) -> Result<()> {
        let mut cursor = store
            .scroll_descriptions(language_code, SCROLL_PAGE_SIZE)
            .await?;
        let mut batcher = Batcher::new(DEFAULT_BATCH_SIZE);
        while let Some(page) = cursor.next_batch().await? {
            for description in page {
                *scanned += 1;
                let folded = fold_term(&description.term, fold_rules);
                if folded != description.term_folded {
                    *updated += 1;
                    let staged = TermFoldedUpdate {
                        internal_id: description.internal_id,
                        term_folded: folded,
                    };
                    if let Some(batch) = batcher.push(staged) {
                        info!("Bulk update {}", updated);
                        store.bulk_update_term_folded(&batch).await?;
                    }
                }
            }
        }
        if let Some(batch) = batcher.take_remaining() {
            info!("Bulk update {}", updated);
            store.bulk_update_term_folded(&batch).await?;
        }
        Ok(())
    }
}

/// Lower-case the term and apply the per-character fold table.
pub fn fold_term(term: &str, fold_rules: &HashMap<char, char>) -> String {
    term.to_lowercase()
        .chars()
        .map(|c| fold_rules.get(&c).copied().unwrap_or(c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_term_applies_rules_after_lowercasing() {
        let rules = HashMap::from([('é', 'e')]);
        assert_eq!(fold_term("café", &rules), "cafe");
        assert_eq!(fold_term("CAFÉ", &rules), "cafe");
    }

    #[test]
    fn fold_term_without_rules_only_lowercases() {
        let rules = HashMap::new();
        assert_eq!(fold_term("Heart Attack", &rules), "heart attack");
        assert_eq!(fold_term("café", &rules), "café");
    }
}
