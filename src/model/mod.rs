pub mod branch;
pub mod code_system;
pub mod common;
pub mod component;
pub mod query_concept;

pub use branch::*;
pub use code_system::*;
pub use common::*;
pub use component::*;
pub use query_concept::*;
