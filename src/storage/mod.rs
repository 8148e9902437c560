//! storage layer for docrank
//!
//! Collections hold JSON documents in memory, addressed by `RecordId`.
//! Secondary indexes keep ordered `(key, record id)` entries that index
//! scans walk range by range.
//!
//! ```text
//! Collection ──► documents: Vec<Value>      (RecordId = position)
//!            └─► indexes:   Vec<Index>      (BTreeSet<(key, RecordId)>)
//! ```

mod collection;
mod error;
mod index;
mod types;

pub use collection::Collection;
pub use error::{StorageError, StorageResult};
pub use index::{Index, IndexDescriptor, IndexEntry, IndexKey, KeyRange};
pub use types::{CollectionName, InvalidNameError, RecordId};
