//! High-level database API.
//!
//! [`Database`] owns the collections and the histogram store, compiles
//! filters into ranked plans and renders explain documents.

mod api;
mod explain;

pub use api::{Database, DatabaseConfig, DatabaseError, DatabaseResult, FindOptions, ModeOverride};
pub use explain::{explain_document, Verbosity};
