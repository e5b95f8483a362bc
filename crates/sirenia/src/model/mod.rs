//! Arena-based compound graph: graphs own nodes, compound nodes own one child graph.
//!
//! Nodes, graphs and edges are addressed by their index into the manager's vectors. Nothing is
//! ever removed from an arena during a layout call.

mod bounds;
mod build;
mod hierarchy;

use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::sublayout::SublayoutCompositor;
use indexmap::IndexSet;
use nalgebra::Vector2;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Plain,
    /// Contraction of one or two nodes of the next finer level.
    Coarsened {
        weight: usize,
        pred1: usize,
        pred2: Option<usize>,
        /// Own center when the node was created; predecessors follow its displacement since.
        origin: Vector2<f64>,
    },
}

impl NodeKind {
    pub fn weight(&self) -> usize {
        match self {
            NodeKind::Plain => 1,
            NodeKind::Coarsened { weight, .. } => *weight,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CNode {
    /// Caller id; coarse nodes have none.
    pub key: Option<String>,
    pub kind: NodeKind,
    pub rect: Rect,
    pub rotation: f64,
    pub owner: usize,
    pub child: Option<usize>,
    /// Set for nodes that had children in the input, whether or not a child graph exists.
    pub compound: bool,
    pub edges: Vec<usize>,

    pub spring_fx: f64,
    pub spring_fy: f64,
    pub repulsion_fx: f64,
    pub repulsion_fy: f64,
    pub gravity_fx: f64,
    pub gravity_fy: f64,
    pub displacement_x: f64,
    pub displacement_y: f64,

    pub depth: usize,
    pub estimated_size: f64,
    pub leaf_count: usize,

    pub surrounding: Vec<usize>,
    pub grid_start_x: i32,
    pub grid_finish_x: i32,
    pub grid_start_y: i32,
    pub grid_finish_y: i32,
}

impl CNode {
    pub fn new(key: Option<String>, owner: usize, rect: Rect) -> Self {
        Self {
            key,
            kind: NodeKind::Plain,
            rect,
            rotation: 0.0,
            owner,
            child: None,
            compound: false,
            edges: Vec::new(),
            spring_fx: 0.0,
            spring_fy: 0.0,
            repulsion_fx: 0.0,
            repulsion_fy: 0.0,
            gravity_fx: 0.0,
            gravity_fy: 0.0,
            displacement_x: 0.0,
            displacement_y: 0.0,
            depth: 1,
            estimated_size: 0.0,
            leaf_count: 1,
            surrounding: Vec::new(),
            grid_start_x: 0,
            grid_finish_x: 0,
            grid_start_y: 0,
            grid_finish_y: 0,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.rect.center_x(), self.rect.center_y())
    }

    pub fn set_center(&mut self, x: f64, y: f64) {
        self.rect = Rect::from_center(x, y, self.rect.width, self.rect.height);
    }

    pub fn move_by(&mut self, dx: f64, dy: f64) {
        self.rect = self.rect.translated(dx, dy);
    }

    pub fn reset_forces(&mut self) {
        self.spring_fx = 0.0;
        self.spring_fy = 0.0;
        self.repulsion_fx = 0.0;
        self.repulsion_fy = 0.0;
        self.gravity_fx = 0.0;
        self.gravity_fy = 0.0;
        self.displacement_x = 0.0;
        self.displacement_y = 0.0;
    }

    pub fn total_force(&self) -> (f64, f64) {
        (
            self.spring_fx + self.repulsion_fx + self.gravity_fx,
            self.spring_fy + self.repulsion_fy + self.gravity_fy,
        )
    }
}

#[derive(Debug, Clone)]
pub struct CGraph {
    pub nodes: Vec<usize>,
    /// Owning compound node; `None` for the root graph.
    pub parent: Option<usize>,
    /// Intra-graph edges.
    pub edges: Vec<usize>,
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub connected: bool,
    pub estimated_size: f64,
}

impl CGraph {
    fn new(parent: Option<usize>) -> Self {
        Self {
            nodes: Vec::new(),
            parent,
            edges: Vec::new(),
            left: 0.0,
            top: 0.0,
            right: 0.0,
            bottom: 0.0,
            connected: true,
            estimated_size: 0.0,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.left + self.right) / 2.0, (self.top + self.bottom) / 2.0)
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

#[derive(Debug, Clone)]
pub struct CEdge {
    pub source: usize,
    pub target: usize,
    pub ideal_length: f64,
    pub inter_graph: bool,
    pub lca: Option<usize>,
    pub source_in_lca: usize,
    pub target_in_lca: usize,
    pub length: f64,
    pub length_x: f64,
    pub length_y: f64,
}

#[derive(Debug, Clone)]
pub struct GraphManager {
    pub nodes: Vec<CNode>,
    pub graphs: Vec<CGraph>,
    pub edges: Vec<CEdge>,
    pub root: usize,
    pub inter_graph_edges: Vec<usize>,
    /// Members of graphs that are not connected; only these feel gravity.
    pub gravity_nodes: Vec<usize>,
    pub sublayouts: SublayoutCompositor,
}

impl Default for GraphManager {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphManager {
    /// An empty manager holding only the root graph.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            graphs: vec![CGraph::new(None)],
            edges: Vec::new(),
            root: 0,
            inter_graph_edges: Vec::new(),
            gravity_nodes: Vec::new(),
            sublayouts: SublayoutCompositor::default(),
        }
    }

    pub fn add_graph(&mut self, parent: usize) -> usize {
        let idx = self.graphs.len();
        self.graphs.push(CGraph::new(Some(parent)));
        self.nodes[parent].child = Some(idx);
        self.nodes[parent].compound = true;
        idx
    }

    pub fn add_node(&mut self, graph: usize, mut node: CNode) -> usize {
        let idx = self.nodes.len();
        node.owner = graph;
        self.nodes.push(node);
        self.graphs[graph].nodes.push(idx);
        idx
    }

    /// Adds an edge, filing it as intra-graph when both ends share an owner.
    pub fn add_edge(&mut self, source: usize, target: usize) -> usize {
        let idx = self.edges.len();
        let inter_graph = self.nodes[source].owner != self.nodes[target].owner;
        self.edges.push(CEdge {
            source,
            target,
            ideal_length: 0.0,
            inter_graph,
            lca: None,
            source_in_lca: source,
            target_in_lca: target,
            length: 0.0,
            length_x: 0.0,
            length_y: 0.0,
        });
        if inter_graph {
            self.inter_graph_edges.push(idx);
        } else {
            let owner = self.nodes[source].owner;
            self.graphs[owner].edges.push(idx);
        }
        self.nodes[source].edges.push(idx);
        if target != source {
            self.nodes[target].edges.push(idx);
        }
        idx
    }

    pub fn child_graph(&self, node: usize) -> Result<usize> {
        self.nodes[node]
            .child
            .ok_or(Error::MissingChildGraph { node })
    }

    /// Leaves and compounds with an empty child graph move themselves.
    pub fn moves_itself(&self, node: usize) -> bool {
        match self.nodes[node].child {
            None => true,
            Some(g) => self.graphs[g].nodes.is_empty(),
        }
    }

    pub fn is_leaf(&self, node: usize) -> bool {
        self.nodes[node].child.is_none()
    }

    pub fn other_end(&self, edge: usize, node: usize) -> Result<usize> {
        let e = &self.edges[edge];
        if e.source == node {
            Ok(e.target)
        } else if e.target == node {
            Ok(e.source)
        } else {
            Err(Error::IncidentMismatch { edge, node })
        }
    }

    /// The other end of `edge`, or its ancestor that is a member of `graph`.
    pub fn other_end_in_graph(
        &self,
        edge: usize,
        node: usize,
        graph: usize,
    ) -> Result<Option<usize>> {
        let mut other = self.other_end(edge, node)?;
        loop {
            let owner = self.nodes[other].owner;
            if owner == graph {
                return Ok(Some(other));
            }
            match self.graphs[owner].parent {
                Some(p) => other = p,
                None => return Ok(None),
            }
        }
    }

    pub fn neighbors(&self, node: usize) -> Result<IndexSet<usize>> {
        let mut out = IndexSet::new();
        for &e in &self.nodes[node].edges {
            out.insert(self.other_end(e, node)?);
        }
        Ok(out)
    }

    /// `node` followed by all of its descendants, depth first.
    pub fn with_descendants(&self, node: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            out.push(n);
            if let Some(g) = self.nodes[n].child {
                stack.extend(self.graphs[g].nodes.iter().rev().copied());
            }
        }
        out
    }

    /// Whether `ancestor` strictly encloses `node`.
    pub fn is_ancestor(&self, ancestor: usize, node: usize) -> bool {
        let mut cur = node;
        while let Some(p) = self.graphs[self.nodes[cur].owner].parent {
            if p == ancestor {
                return true;
            }
            cur = p;
        }
        false
    }

    pub fn leaves(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.nodes.len()).filter(|&n| self.is_leaf(n))
    }

    pub fn root_rect(&self) -> Rect {
        let g = &self.graphs[self.root];
        Rect::new(g.left, g.top, g.width(), g.height())
    }
}

#[cfg(test)]
mod tests {
    use super::{CNode, GraphManager};
    use crate::error::Error;
    use crate::geometry::Rect;

    fn leaf(cx: f64, cy: f64) -> CNode {
        CNode::new(None, 0, Rect::from_center(cx, cy, 10.0, 10.0))
    }

    #[test]
    fn edges_file_as_intra_or_inter_graph() {
        let mut gm = GraphManager::new();
        let r = gm.add_node(0, leaf(0.0, 0.0));
        let g = gm.add_graph(r);
        let a = gm.add_node(g, leaf(0.0, 0.0));
        let b = gm.add_node(g, leaf(20.0, 0.0));
        let c = gm.add_graph(b);
        let d = gm.add_node(c, leaf(20.0, 0.0));

        let ab = gm.add_edge(a, b);
        let ad = gm.add_edge(a, d);
        assert_eq!(gm.graphs[g].edges, vec![ab]);
        assert_eq!(gm.inter_graph_edges, vec![ad]);
        assert!(gm.is_ancestor(b, d));
        assert!(gm.is_ancestor(r, d));
        assert!(!gm.is_ancestor(a, d));
        assert_eq!(gm.other_end_in_graph(ad, a, g).unwrap(), Some(b));
        assert_eq!(gm.with_descendants(r), vec![r, a, b, d]);
    }

    #[test]
    fn querying_a_foreign_edge_is_an_incident_mismatch() {
        let mut gm = GraphManager::new();
        let a = gm.add_node(0, leaf(0.0, 0.0));
        let b = gm.add_node(0, leaf(1.0, 0.0));
        let c = gm.add_node(0, leaf(2.0, 0.0));
        let e = gm.add_edge(a, b);
        assert!(matches!(
            gm.other_end(e, c),
            Err(Error::IncidentMismatch { edge, node }) if edge == e && node == c
        ));
        assert!(matches!(
            gm.child_graph(a),
            Err(Error::MissingChildGraph { node }) if node == a
        ));
    }
}
