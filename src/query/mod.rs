//! Query predicates for docrank.
//!
//! Filter documents are parsed into an immutable `Predicate` tree. Leaf
//! predicates convert to interval lists over the canonical `KeyValue`
//! ordering, which index bounds and histogram estimation share.

mod ast;
mod error;
mod interval;
mod parser;
mod value;

pub use ast::{ComparisonOp, Predicate};
pub use error::{ParseError, ParseResult};
pub use interval::{is_sargable, leaf_intervals, Interval, IntervalList};
pub use parser::Parser;
pub use value::{get_path, KeyValue, TypeBracket};
