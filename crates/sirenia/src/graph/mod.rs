use crate::error::{Error, Result};
use rustc_hash::{FxHashMap, FxHashSet};

/// Caller-side description of the hierarchy to lay out.
///
/// Exactly one node must have no parent; it becomes the single member of the root graph.
#[derive(Debug, Clone, Default)]
pub struct LayoutGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl LayoutGraph {
    pub fn validate(&self) -> Result<()> {
        let mut node_exists: FxHashSet<&str> = FxHashSet::default();
        for n in &self.nodes {
            if !node_exists.insert(n.id.as_str()) {
                return Err(Error::DuplicateNode {
                    node_id: n.id.clone(),
                });
            }
        }
        for n in &self.nodes {
            if let Some(parent) = n.parent.as_deref() {
                if !node_exists.contains(parent) {
                    return Err(Error::MissingParent {
                        node_id: n.id.clone(),
                        parent_id: parent.to_string(),
                    });
                }
            }
        }
        for e in &self.edges {
            if !node_exists.contains(e.source.as_str()) || !node_exists.contains(e.target.as_str())
            {
                return Err(Error::MissingEndpoint {
                    edge_id: e.id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Children per parent id, in input order.
    pub fn children_by_parent(&self) -> FxHashMap<&str, Vec<usize>> {
        let mut out: FxHashMap<&str, Vec<usize>> = FxHashMap::default();
        for (idx, n) in self.nodes.iter().enumerate() {
            if let Some(p) = n.parent.as_deref() {
                out.entry(p).or_default().push(idx);
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    /// Id of the enclosing node; `None` for the root.
    pub parent: Option<String>,
    /// Extent along x.
    pub width: f64,
    /// Extent along the second ground-plane axis ("depth").
    pub height: f64,
    /// Initial center position.
    pub x: f64,
    pub y: f64,
    /// Passed through to the resulting placement.
    pub rotation: f64,
}

impl Node {
    pub fn leaf(id: impl Into<String>, parent: Option<&str>, width: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            parent: parent.map(str::to_string),
            width,
            height,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{source}->{target}"),
            source,
            target,
        }
    }
}

/// A subtree whose internal arrangement was computed elsewhere and must stay rigid.
#[derive(Debug, Clone)]
pub struct Sublayout {
    pub root: String,
    /// Frozen members. Empty means every descendant of `root`.
    pub members: Vec<String>,
}

impl Sublayout {
    pub fn whole_subtree(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            members: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Center, relative to the center of the whole layout.
    pub position: Point,
    pub size: Size,
    pub rotation: f64,
}

/// How the (last) simulation run ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Termination {
    /// No simulation ran (single node, or a root that is itself a sublayout).
    #[default]
    Skipped,
    Converged,
    IterationCapReached,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LayoutStats {
    /// Number of multilevel levels that were simulated (1 for a classic run).
    pub levels: usize,
    /// Iterations summed over all levels and parameter-search rounds.
    pub iterations: usize,
    pub termination: Termination,
    /// Parameter-search rounds (1 unless iterative parameter calculation is enabled).
    pub rounds: usize,
    pub edge_length: f64,
    pub repulsion_strength: f64,
}

#[derive(Debug, Clone)]
pub struct LayoutResult {
    pub placements: std::collections::BTreeMap<String, Placement>,
    pub stats: LayoutStats,
}
