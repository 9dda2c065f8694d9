pub mod batch;
pub mod maintenance;
pub mod semantic_index;
pub mod versioning;

pub use batch::{Batcher, DEFAULT_BATCH_SIZE, SCROLL_PAGE_SIZE};
pub use maintenance::{fold_term, BulkMaintenance, ReindexResult};
pub use semantic_index::SemanticIndex;
pub use versioning::ReleaseVersioning;
