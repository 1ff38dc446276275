//! Data models

pub mod schema;
pub mod record;
pub mod prediction;

pub use schema::*;
pub use record::*;
pub use prediction::*;
