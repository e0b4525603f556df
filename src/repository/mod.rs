pub mod sqlite;

pub use sqlite::{ImportStore, UpsertOutcome};
