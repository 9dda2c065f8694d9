pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod store;

pub use config::{AppConfig, SearchLanguagesConfig};
pub use error::{Error, Result};
pub use logic::{BulkMaintenance, ReindexResult, ReleaseVersioning, SemanticIndex};
pub use model::*;
pub use store::{InMemoryStore, Store};
