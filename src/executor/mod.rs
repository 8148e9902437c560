//! Query execution engine for docrank.
//!
//! Plans are executed by a tree of stages that each perform one unit of
//! work per call, so partial executions can be compared by how much they
//! produced for the work they did.

mod error;
mod eval;
mod executor;
mod operators;
mod result;

pub use error::{ExecuteError, ExecuteResult};
pub use eval::matches;
pub use executor::PlanExecutor;
pub use operators::{StageState, StageStats, WorkingMember};
pub use result::{ExecutionStats, ResultSet};
