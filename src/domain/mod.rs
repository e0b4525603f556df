//! Rich domain entities - behavior lives WITH data

pub mod models;
pub mod raw;
pub mod stats;
pub mod validation;

pub use raw::ExternalId;
pub use validation::Validate;
