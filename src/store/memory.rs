use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{
    Branch, CodeSystem, CodeSystemVersion, Concept, ConceptId, Description, MetadataValue,
    PageRequest, QueryConcept, ReferenceSetMember, Relationship, VersionedComponent,
};
use crate::store::traits::{
    BranchCriteria, CodeSystemStore, Commit, ComponentStore, DescriptionCursor,
    DescriptionIndexStore, QueryConceptStore, Store, TermFoldedUpdate, VersionedStore,
};

/// One stored version of a document, valid on `path` from `start` until
/// `end` (open-ended while `end` is `None`).
#[derive(Debug, Clone)]
struct VersionedDoc<T> {
    path: String,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    doc: T,
}

/// Identity used to supersede the previous visible version on commit.
trait DocId {
    fn doc_id(&self) -> &str;
}

impl<T: VersionedComponent> DocId for T {
    fn doc_id(&self) -> &str {
        self.component_id()
    }
}

impl DocId for QueryConcept {
    fn doc_id(&self) -> &str {
        &self.concept_id_form
    }
}

#[derive(Debug, Default)]
struct StagedWrites {
    concepts: Vec<Concept>,
    descriptions: Vec<Description>,
    relationships: Vec<Relationship>,
    refset_members: Vec<ReferenceSetMember>,
    query_concepts: Vec<QueryConcept>,
}

#[derive(Default)]
struct Inner {
    branches: HashMap<String, Branch>,
    /// Branch path -> id of the commit currently holding the branch lock.
    open_commits: HashMap<String, Uuid>,
    staged: HashMap<Uuid, StagedWrites>,
    concepts: Vec<VersionedDoc<Concept>>,
    descriptions: Vec<VersionedDoc<Description>>,
    relationships: Vec<VersionedDoc<Relationship>>,
    refset_members: Vec<VersionedDoc<ReferenceSetMember>>,
    query_concepts: Vec<VersionedDoc<QueryConcept>>,
    code_systems: HashMap<String, CodeSystem>,
    versions: BTreeMap<(String, u32), CodeSystemVersion>,
    description_refreshes: u64,
    bulk_update_calls: usize,
    fail_bulk_updates_after: Option<usize>,
}

/// In-memory implementation of every store trait.
///
/// Stands in for the external version control engine and document store:
/// branch-local visibility via validity intervals stamped with commit
/// timestamps, per-branch commit locks and a staging area so that writes
/// under an unmarked commit are discarded. Visibility inheritance from
/// parent branches is not modelled.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of forced description read-view refreshes so far.
    pub fn description_refresh_count(&self) -> u64 {
        self.inner.read().description_refreshes
    }

    /// Test support: let the given number of bulk update calls succeed,
    /// then fail every subsequent call with a storage error.
    pub fn fail_bulk_updates_after(&self, successful_calls: usize) {
        self.inner.write().fail_bulk_updates_after = Some(successful_calls);
    }

    fn promote<T: DocId + Clone>(
        docs: &mut Vec<VersionedDoc<T>>,
        staged: Vec<T>,
        path: &str,
        timestamp: DateTime<Utc>,
    ) {
        for item in staged {
            for existing in docs.iter_mut() {
                if existing.path == path
                    && existing.end.is_none()
                    && existing.doc.doc_id() == item.doc_id()
                {
                    existing.end = Some(timestamp);
                }
            }
            docs.push(VersionedDoc {
                path: path.to_string(),
                start: timestamp,
                end: None,
                doc: item,
            });
        }
    }

    fn staged_mut<'a>(inner: &'a mut Inner, commit: &Commit) -> Result<&'a mut StagedWrites> {
        inner
            .staged
            .get_mut(&commit.id())
            .ok_or_else(|| Error::Storage(format!("commit on '{}' is not open", commit.branch_path())))
    }
}

#[async_trait]
impl VersionedStore for InMemoryStore {
    async fn open_commit(&self, branch_path: &str) -> Result<Commit> {
        let mut inner = self.inner.write();
        let head = inner
            .branches
            .get(branch_path)
            .ok_or_else(|| Error::NotFound(format!("branch '{}'", branch_path)))?
            .head;
        if inner.open_commits.contains_key(branch_path) {
            return Err(Error::BranchLocked(branch_path.to_string()));
        }

        // Commit timestamps advance strictly beyond the branch head.
        let mut timestamp = Utc::now();
        if timestamp <= head {
            timestamp = head + Duration::microseconds(1);
        }

        let commit = Commit::new(branch_path, timestamp);
        inner.open_commits.insert(branch_path.to_string(), commit.id());
        inner.staged.insert(commit.id(), StagedWrites::default());
        Ok(commit)
    }

    async fn mark_successful(&self, commit: Commit) -> Result<()> {
        let mut inner = self.inner.write();
        let staged = inner
            .staged
            .remove(&commit.id())
            .ok_or_else(|| Error::Storage(format!("commit on '{}' is not open", commit.branch_path())))?;

        let path = commit.branch_path();
        let timestamp = commit.timestamp();
        Self::promote(&mut inner.concepts, staged.concepts, path, timestamp);
        Self::promote(&mut inner.descriptions, staged.descriptions, path, timestamp);
        Self::promote(&mut inner.relationships, staged.relationships, path, timestamp);
        Self::promote(&mut inner.refset_members, staged.refset_members, path, timestamp);
        Self::promote(&mut inner.query_concepts, staged.query_concepts, path, timestamp);

        if let Some(branch) = inner.branches.get_mut(path) {
            branch.head = timestamp;
        }
        inner.open_commits.remove(path);
        Ok(())
    }

    async fn abort_commit(&self, commit: Commit) -> Result<()> {
        let mut inner = self.inner.write();
        inner.staged.remove(&commit.id());
        inner.open_commits.remove(commit.branch_path());
        Ok(())
    }

    async fn branch_visibility(&self, branch_path: &str) -> Result<BranchCriteria> {
        let inner = self.inner.read();
        let branch = inner
            .branches
            .get(branch_path)
            .ok_or_else(|| Error::NotFound(format!("branch '{}'", branch_path)))?;
        Ok(BranchCriteria {
            branch_path: branch.path.clone(),
            head: branch.head,
        })
    }

    async fn create_branch(&self, path: &str) -> Result<Branch> {
        let mut inner = self.inner.write();
        if inner.branches.contains_key(path) {
            return Err(Error::InvalidArgument(format!(
                "branch '{}' already exists",
                path
            )));
        }
        let branch = Branch::new(path);
        inner.branches.insert(path.to_string(), branch.clone());
        Ok(branch)
    }

    async fn get_branch(&self, path: &str) -> Result<Option<Branch>> {
        Ok(self.inner.read().branches.get(path).cloned())
    }

    async fn update_branch_metadata(
        &self,
        path: &str,
        metadata: HashMap<String, MetadataValue>,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        let branch = inner
            .branches
            .get_mut(path)
            .ok_or_else(|| Error::NotFound(format!("branch '{}'", path)))?;
        branch.metadata.extend(metadata);
        Ok(())
    }
}

macro_rules! impl_component_store {
    ($ty:ty, $docs:ident, $staged:ident) => {
        #[async_trait]
        impl ComponentStore<$ty> for InMemoryStore {
            async fn next_unreleased_page(
                &self,
                criteria: &BranchCriteria,
                after: Option<&str>,
                page_size: usize,
            ) -> Result<Vec<$ty>> {
                let inner = self.inner.read();
                Ok(inner
                    .$docs
                    .iter()
                    .filter(|doc| criteria.matches(&doc.path, doc.start, doc.end))
                    .filter(|doc| doc.doc.effective_time().is_none())
                    .filter(|doc| after.map_or(true, |after| doc.doc.component_id() > after))
                    .sorted_by(|a, b| a.doc.component_id().cmp(b.doc.component_id()))
                    .take(page_size)
                    .map(|doc| doc.doc.clone())
                    .collect())
            }

            async fn save_batch(&self, commit: &Commit, batch: Vec<$ty>) -> Result<()> {
                let mut inner = self.inner.write();
                Self::staged_mut(&mut inner, commit)?.$staged.extend(batch);
                Ok(())
            }
        }
    };
}

impl_component_store!(Concept, concepts, concepts);
impl_component_store!(Description, descriptions, descriptions);
impl_component_store!(Relationship, relationships, relationships);
impl_component_store!(ReferenceSetMember, refset_members, refset_members);

#[async_trait]
impl QueryConceptStore for InMemoryStore {
    async fn search_references(
        &self,
        criteria: &BranchCriteria,
        concept_id: ConceptId,
        stated: bool,
        page: &PageRequest,
    ) -> Result<(Vec<QueryConcept>, u64)> {
        let inner = self.inner.read();
        let matches: Vec<&QueryConcept> = inner
            .query_concepts
            .iter()
            .filter(|doc| criteria.matches(&doc.path, doc.start, doc.end))
            .map(|doc| &doc.doc)
            .filter(|row| row.stated == stated)
            .filter(|row| {
                row.ancestors.contains(&concept_id)
                    || row
                        .wildcard_values()
                        .map_or(false, |values| values.contains(&concept_id))
            })
            .sorted_by(|a, b| a.concept_id_form.cmp(&b.concept_id_form))
            .collect();

        let total = matches.len() as u64;
        let rows = matches
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect();
        Ok((rows, total))
    }

    async fn save_query_concepts(&self, commit: &Commit, rows: Vec<QueryConcept>) -> Result<()> {
        let mut inner = self.inner.write();
        Self::staged_mut(&mut inner, commit)?.query_concepts.extend(rows);
        Ok(())
    }
}

/// Snapshot cursor over descriptions in internal-id order. The page backlog
/// is taken at scroll time, matching server-side scroll semantics.
struct MemoryDescriptionCursor {
    pages: std::vec::IntoIter<Vec<Description>>,
}

#[async_trait]
impl DescriptionCursor for MemoryDescriptionCursor {
    async fn next_batch(&mut self) -> Result<Option<Vec<Description>>> {
        Ok(self.pages.next())
    }
}

#[async_trait]
impl DescriptionIndexStore for InMemoryStore {
    async fn scroll_descriptions(
        &self,
        language_code: &str,
        page_size: usize,
    ) -> Result<Box<dyn DescriptionCursor>> {
        let inner = self.inner.read();
        let ordered: Vec<Description> = inner
            .descriptions
            .iter()
            .map(|doc| &doc.doc)
            .filter(|description| description.language_code == language_code)
            .sorted_by(|a, b| a.internal_id.cmp(&b.internal_id))
            .cloned()
            .collect();

        let chunks = ordered.into_iter().chunks(page_size);
        let pages: Vec<Vec<Description>> = chunks.into_iter().map(|chunk| chunk.collect()).collect();
        Ok(Box::new(MemoryDescriptionCursor {
            pages: pages.into_iter(),
        }))
    }

    async fn bulk_update_term_folded(&self, updates: &[TermFoldedUpdate]) -> Result<()> {
        let mut inner = self.inner.write();
        if let Some(limit) = inner.fail_bulk_updates_after {
            if inner.bulk_update_calls >= limit {
                return Err(Error::Storage("bulk update failed".to_string()));
            }
        }
        inner.bulk_update_calls += 1;
        for update in updates {
            for doc in inner.descriptions.iter_mut() {
                if doc.doc.internal_id == update.internal_id {
                    doc.doc.term_folded = update.term_folded.clone();
                }
            }
        }
        Ok(())
    }

    async fn refresh_description_index(&self) -> Result<()> {
        self.inner.write().description_refreshes += 1;
        Ok(())
    }
}

#[async_trait]
impl CodeSystemStore for InMemoryStore {
    async fn get_code_system(&self, short_name: &str) -> Result<Option<CodeSystem>> {
        Ok(self.inner.read().code_systems.get(short_name).cloned())
    }

    async fn upsert_code_system(&self, code_system: CodeSystem) -> Result<()> {
        let mut inner = self.inner.write();
        inner
            .code_systems
            .insert(code_system.short_name.clone(), code_system);
        Ok(())
    }

    async fn get_code_system_version(
        &self,
        short_name: &str,
        effective_date: u32,
    ) -> Result<Option<CodeSystemVersion>> {
        Ok(self
            .inner
            .read()
            .versions
            .get(&(short_name.to_string(), effective_date))
            .cloned())
    }

    async fn save_code_system_version(&self, version: CodeSystemVersion) -> Result<()> {
        let mut inner = self.inner.write();
        inner
            .versions
            .insert((version.short_name.clone(), version.effective_date), version);
        Ok(())
    }

    async fn list_code_system_versions(&self, short_name: &str) -> Result<Vec<CodeSystemVersion>> {
        Ok(self
            .inner
            .read()
            .versions
            .values()
            .filter(|version| version.short_name == short_name)
            .cloned()
            .collect())
    }
}

impl Store for InMemoryStore {}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_main() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.create_branch("MAIN").await.unwrap();
        store
    }

    #[tokio::test]
    async fn only_one_commit_may_be_open_per_branch() {
        let store = store_with_main().await;
        let commit = store.open_commit("MAIN").await.unwrap();

        match store.open_commit("MAIN").await {
            Err(Error::BranchLocked(path)) => assert_eq!(path, "MAIN"),
            other => panic!("expected branch locked, got {:?}", other.map(|_| ())),
        }

        // Releasing the branch makes it lockable again.
        store.abort_commit(commit).await.unwrap();
        store.open_commit("MAIN").await.unwrap();
    }

    #[tokio::test]
    async fn writes_become_visible_only_on_successful_commit() {
        let store = store_with_main().await;
        let commit = store.open_commit("MAIN").await.unwrap();
        store
            .save_batch(&commit, vec![Concept::new("100001", 1)])
            .await
            .unwrap();

        let criteria = store.branch_visibility("MAIN").await.unwrap();
        let visible: Vec<Concept> = store
            .next_unreleased_page(&criteria, None, 10)
            .await
            .unwrap();
        assert!(visible.is_empty(), "uncommitted writes must be invisible");

        store.mark_successful(commit).await.unwrap();
        let criteria = store.branch_visibility("MAIN").await.unwrap();
        let visible: Vec<Concept> = store
            .next_unreleased_page(&criteria, None, 10)
            .await
            .unwrap();
        assert_eq!(visible.len(), 1);
    }

    #[tokio::test]
    async fn aborted_commit_discards_writes() {
        let store = store_with_main().await;
        let head_before = store.get_branch("MAIN").await.unwrap().unwrap().head;

        let commit = store.open_commit("MAIN").await.unwrap();
        store
            .save_batch(&commit, vec![Concept::new("100001", 1)])
            .await
            .unwrap();
        store.abort_commit(commit).await.unwrap();

        let criteria = store.branch_visibility("MAIN").await.unwrap();
        let visible: Vec<Concept> = store
            .next_unreleased_page(&criteria, None, 10)
            .await
            .unwrap();
        assert!(visible.is_empty());
        assert_eq!(
            store.get_branch("MAIN").await.unwrap().unwrap().head,
            head_before,
            "aborted commit must not advance the head"
        );
    }

    #[tokio::test]
    async fn commit_supersedes_previous_document_version() {
        let store = store_with_main().await;

        let commit = store.open_commit("MAIN").await.unwrap();
        let mut concept = Concept::new("100001", 1);
        store.save_batch(&commit, vec![concept.clone()]).await.unwrap();
        store.mark_successful(commit).await.unwrap();

        concept.active = false;
        let commit = store.open_commit("MAIN").await.unwrap();
        store.save_batch(&commit, vec![concept]).await.unwrap();
        store.mark_successful(commit).await.unwrap();

        let criteria = store.branch_visibility("MAIN").await.unwrap();
        let visible: Vec<Concept> = store
            .next_unreleased_page(&criteria, None, 10)
            .await
            .unwrap();
        assert_eq!(visible.len(), 1, "one visible version per document");
        assert!(!visible[0].active);
    }

    #[tokio::test]
    async fn unreleased_page_is_ordered_and_keyed() {
        let store = store_with_main().await;
        let commit = store.open_commit("MAIN").await.unwrap();
        store
            .save_batch(
                &commit,
                vec![
                    Concept::new("300", 1),
                    Concept::new("100", 1),
                    Concept::new("200", 1),
                ],
            )
            .await
            .unwrap();
        store.mark_successful(commit).await.unwrap();

        let criteria = store.branch_visibility("MAIN").await.unwrap();
        let first: Vec<Concept> = store
            .next_unreleased_page(&criteria, None, 2)
            .await
            .unwrap();
        assert_eq!(first[0].concept_id, "100");
        assert_eq!(first[1].concept_id, "200");

        let rest: Vec<Concept> = store
            .next_unreleased_page(&criteria, Some("200"), 2)
            .await
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].concept_id, "300");
    }
}
