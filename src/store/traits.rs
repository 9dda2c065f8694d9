use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{
    Branch, CodeSystem, CodeSystemVersion, Concept, ConceptId, Description, MetadataValue,
    PageRequest, QueryConcept, ReferenceSetMember, Relationship, VersionedComponent,
};

/// Exclusive write scope bound to one branch.
///
/// Every write staged under the commit shares its timestamp. At most one
/// commit may be open per branch; writes under a commit that is never
/// marked successful are discarded.
#[derive(Debug, Clone)]
pub struct Commit {
    id: Uuid,
    branch_path: String,
    timestamp: DateTime<Utc>,
}

impl Commit {
    pub fn new(branch_path: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            branch_path: branch_path.into(),
            timestamp,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn branch_path(&self) -> &str {
        &self.branch_path
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Visibility predicate for one branch's current head.
#[derive(Debug, Clone)]
pub struct BranchCriteria {
    pub branch_path: String,
    pub head: DateTime<Utc>,
}

impl BranchCriteria {
    /// Whether a document version with the given validity interval is
    /// visible under this criteria.
    pub fn matches(&self, path: &str, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> bool {
        path == self.branch_path && start <= self.head && end.map_or(true, |end| end > self.head)
    }
}

/// Branch and commit operations supplied by the version control engine.
#[async_trait]
pub trait VersionedStore: Send + Sync {
    /// Open an exclusive commit on a branch. Fails with
    /// [`crate::Error::BranchLocked`] while another commit is open.
    async fn open_commit(&self, branch_path: &str) -> Result<Commit>;

    /// Promote all writes staged under the commit and advance the branch
    /// head to the commit timestamp.
    async fn mark_successful(&self, commit: Commit) -> Result<()>;

    /// Discard all writes staged under the commit and release the branch.
    async fn abort_commit(&self, commit: Commit) -> Result<()>;

    async fn branch_visibility(&self, branch_path: &str) -> Result<BranchCriteria>;

    async fn create_branch(&self, path: &str) -> Result<Branch>;

    async fn get_branch(&self, path: &str) -> Result<Option<Branch>>;

    async fn update_branch_metadata(
        &self,
        path: &str,
        metadata: HashMap<String, MetadataValue>,
    ) -> Result<()>;
}

/// Per-type component access, implemented once per tracked entity type.
#[async_trait]
pub trait ComponentStore<T: VersionedComponent>: Send + Sync {
    /// One page of branch-visible unreleased components with ids greater
    /// than `after`, in stable id order. An empty page ends the scan.
    async fn next_unreleased_page(
        &self,
        criteria: &BranchCriteria,
        after: Option<&str>,
        page_size: usize,
    ) -> Result<Vec<T>>;

    /// Stage a batch of components under an open commit.
    async fn save_batch(&self, commit: &Commit, batch: Vec<T>) -> Result<()>;
}

/// Semantic index row access.
#[async_trait]
pub trait QueryConceptStore: Send + Sync {
    /// Rows of the requested form where `concept_id` appears in the
    /// ancestors or in the wildcard attribute set, paginated over rows in
    /// stable row-key order, with the total matching row count.
    async fn search_references(
        &self,
        criteria: &BranchCriteria,
        concept_id: ConceptId,
        stated: bool,
        page: &PageRequest,
    ) -> Result<(Vec<QueryConcept>, u64)>;

    async fn save_query_concepts(&self, commit: &Commit, rows: Vec<QueryConcept>) -> Result<()>;
}

/// Partial-field patch applied to one description document.
#[derive(Debug, Clone, PartialEq)]
pub struct TermFoldedUpdate {
    pub internal_id: String,
    pub term_folded: String,
}

/// Scoped scrolling cursor over description documents. Released on drop on
/// every exit path.
#[async_trait]
pub trait DescriptionCursor: Send {
    /// Next page in `internal_id` order; `None` at end of stream.
    async fn next_batch(&mut self) -> Result<Option<Vec<Description>>>;
}

/// Cross-branch document store operations, outside commit scope.
#[async_trait]
pub trait DescriptionIndexStore: Send + Sync {
    /// Stream every description document with the given language code,
    /// across all branches, ordered by internal id.
    async fn scroll_descriptions(
        &self,
        language_code: &str,
        page_size: usize,
    ) -> Result<Box<dyn DescriptionCursor>>;

    /// Apply partial-field patches in bulk, keyed by internal id.
    async fn bulk_update_term_folded(&self, updates: &[TermFoldedUpdate]) -> Result<()>;

    /// Force the description read view to observe all applied updates.
    async fn refresh_description_index(&self) -> Result<()>;
}

#[async_trait]
pub trait CodeSystemStore: Send + Sync {
    async fn get_code_system(&self, short_name: &str) -> Result<Option<CodeSystem>>;

    async fn upsert_code_system(&self, code_system: CodeSystem) -> Result<()>;

    async fn get_code_system_version(
        &self,
        short_name: &str,
        effective_date: u32,
    ) -> Result<Option<CodeSystemVersion>>;

    async fn save_code_system_version(&self, version: CodeSystemVersion) -> Result<()>;

    /// All versions of a code system, oldest effective date first.
    async fn list_code_system_versions(&self, short_name: &str) -> Result<Vec<CodeSystemVersion>>;
}

pub trait Store:
    VersionedStore
    + QueryConceptStore
    + DescriptionIndexStore
    + CodeSystemStore
    + ComponentStore<Concept>
    + ComponentStore<Description>
    + ComponentStore<Relationship>
    + ComponentStore<ReferenceSetMember>
    + Send
    + Sync
{
}
