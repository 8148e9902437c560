//! Query planning.
//!
//! This module enumerates the candidate physical plans for a filter:
//! index scans with bounds derived from the predicate, `$or` unions of
//! per-branch index scans and, when nothing indexed applies, a collection
//! scan. Choosing among the candidates is the ranker's job.

mod bounds;
mod error;
mod physical;
mod planner;

pub use bounds::IndexBounds;
pub use error::{PlanError, PlanResult};
pub use physical::{NodeId, PlanNode, QuerySolution, Stage};
pub use planner::{QueryPlanner, DEFAULT_MAX_OR_SOLUTIONS};
