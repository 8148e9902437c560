//! Physical query plan representation.
//!
//! A `QuerySolution` is an arena of plan nodes addressed by `NodeId`.
//! Estimates and execution statistics are kept outside the arena, keyed by
//! the same ids, so a solution is never mutated once built.

use std::fmt;

use super::bounds::IndexBounds;
use crate::query::Predicate;
use crate::storage::IndexDescriptor;

/// Index of a node inside its solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

/// Physical execution stages.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Full collection scan.
    CollScan,

    /// Ordered index scan over the key ranges of `bounds`.
    IndexScan {
        index: IndexDescriptor,
        bounds: IndexBounds,
    },

    /// Load the documents of the record ids produced by the child.
    Fetch,

    /// Drop documents not matching the predicate.
    Filter { predicate: Predicate },

    /// Union of the children, deduplicated by record id.
    Or,
}

impl Stage {
    /// Stage name as reported by explain.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::CollScan => "COLLSCAN",
            Stage::IndexScan { .. } => "IXSCAN",
            Stage::Fetch => "FETCH",
            Stage::Filter { .. } => "FILTER",
            Stage::Or => "OR",
        }
    }
}

/// A node of a solution.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanNode {
    pub stage: Stage,
    pub children: Vec<NodeId>,
}

/// A candidate plan.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySolution {
    nodes: Vec<PlanNode>,
    root: NodeId,
}

impl Default for QuerySolution {
    fn default() -> Self {
        Self::new()
    }
}

impl QuerySolution {
    /// An empty solution. Its root must be set with [`QuerySolution::set_root`]
    /// once nodes are added.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: NodeId(0),
        }
    }

    /// Add a node and return its id.
    pub fn add(&mut self, stage: Stage, children: Vec<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(PlanNode { stage, children });
        id
    }

    pub fn collscan(&mut self) -> NodeId {
        self.add(Stage::CollScan, Vec::new())
    }

    pub fn ixscan(&mut self, index: IndexDescriptor, bounds: IndexBounds) -> NodeId {
        self.add(Stage::IndexScan { index, bounds }, Vec::new())
    }

    pub fn fetch(&mut self, child: NodeId) -> NodeId {
        self.add(Stage::Fetch, vec![child])
    }

    /// Wrap `child` in a filter, or return it unchanged for a trivial
    /// predicate.
    pub fn filter(&mut self, predicate: Predicate, child: NodeId) -> NodeId {
        if predicate.is_trivially_true() {
            child
        } else {
            self.add(Stage::Filter { predicate }, vec![child])
        }
    }

    pub fn or(&mut self, children: Vec<NodeId>) -> NodeId {
        self.add(Stage::Or, children)
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = root;
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &PlanNode {
        &self.nodes[id.0]
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Copy every node of `other` into this arena and return the id of
    /// its root here, along with the old-to-new id mapping.
    pub fn append(&mut self, other: &QuerySolution) -> (NodeId, Vec<NodeId>) {
        let offset = self.nodes.len();
        let mapping: Vec<NodeId> = (0..other.nodes.len()).map(|i| NodeId(offset + i)).collect();
        for node in &other.nodes {
            self.nodes.push(PlanNode {
                stage: node.stage.clone(),
                children: node.children.iter().map(|c| mapping[c.0]).collect(),
            });
        }
        (mapping[other.root.0], mapping)
    }

    /// Node ids reachable from the root, children before parents.
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        self.visit(self.root, &mut order);
        order
    }

    fn visit(&self, id: NodeId, order: &mut Vec<NodeId>) {
        for child in &self.node(id).children {
            self.visit(*child, order);
        }
        order.push(id);
    }

    /// Names of the indexes the solution scans, in plan order.
    pub fn index_names(&self) -> Vec<&str> {
        self.post_order()
            .into_iter()
            .filter_map(|id| match &self.node(id).stage {
                Stage::IndexScan { index, .. } => Some(index.name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// One-line shape, e.g. `FETCH(IXSCAN a_1_b_1)`.
    pub fn summary(&self) -> String {
        self.summarize(self.root)
    }

    fn summarize(&self, id: NodeId) -> String {
        let node = self.node(id);
        let head = match &node.stage {
            Stage::IndexScan { index, .. } => format!("IXSCAN {}", index.name),
            other => other.name().to_string(),
        };
        if node.children.is_empty() {
            return head;
        }
        let children: Vec<String> = node.children.iter().map(|c| self.summarize(*c)).collect();
        format!("{}({})", head, children.join(", "))
    }

    fn format_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        let node = self.node(id);

        match &node.stage {
            Stage::IndexScan { index, bounds } => {
                writeln!(f, "{}IXSCAN {} {}: {}", pad, index.name, index, bounds)?;
            }
            Stage::Filter { predicate } => {
                writeln!(f, "{}FILTER {}", pad, predicate)?;
            }
            other => writeln!(f, "{}{}", pad, other.name())?,
        }

        for child in &node.children {
            self.format_node(f, *child, indent + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for QuerySolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nodes.is_empty() {
            return writeln!(f, "<empty>");
        }
        self.format_node(f, self.root, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::IntervalList;

    fn ixscan(solution: &mut QuerySolution, field: &str) -> NodeId {
        let index = IndexDescriptor::new(vec![field.to_string()]);
        let bounds = IndexBounds::new(vec![(field.to_string(), IntervalList::full())]);
        solution.ixscan(index, bounds)
    }

    #[test]
    fn test_build_and_traverse() {
        let mut solution = QuerySolution::new();
        let scan = ixscan(&mut solution, "a");
        let fetch = solution.fetch(scan);
        let root = solution.filter(Predicate::always_true(), fetch);
        solution.set_root(root);

        assert_eq!(root, fetch);
        assert_eq!(solution.post_order(), vec![scan, fetch]);
        assert_eq!(solution.summary(), "FETCH(IXSCAN a_1)");
    }

    #[test]
    fn test_append_remaps_children() {
        let mut branch = QuerySolution::new();
        let scan = ixscan(&mut branch, "b");
        let fetch = branch.fetch(scan);
        branch.set_root(fetch);

        let mut composite = QuerySolution::new();
        let first = ixscan(&mut composite, "a");
        let (grafted, mapping) = composite.append(&branch);
        let or = composite.or(vec![first, grafted]);
        composite.set_root(or);

        assert_eq!(mapping, vec![NodeId(1), NodeId(2)]);
        assert_eq!(composite.node(grafted).children, vec![NodeId(1)]);
        assert_eq!(composite.summary(), "OR(IXSCAN a_1, FETCH(IXSCAN b_1))");
        assert_eq!(composite.index_names(), vec!["a_1", "b_1"]);
    }
}
