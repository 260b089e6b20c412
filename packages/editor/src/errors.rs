//! Error types for the editing engine
//!
//! Note the deliberate asymmetry with the not-found case: operating on an id
//! that no longer exists is a silent no-op (see the store contract), so these
//! variants only cover structural violations that must reject a mutation.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Unknown parent: {0}")]
    UnknownParent(String),

    #[error("Moving {0} would create a cycle")]
    WouldCycle(String),
}
