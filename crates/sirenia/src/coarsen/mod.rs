//! Multilevel coarsening.
//!
//! A [`CoarseningGraph`] is the flat matching view of one level: its leaves, plus edges between
//! leaves that share an owner graph. Each pass matches nodes pairwise and contracts every pair into
//! one coarser node.

mod multilevel;

pub use multilevel::{build_tower, coarsen_level, level_edge_lengths, multilevel_run, uncoarsen};

use crate::model::GraphManager;
use indexmap::IndexSet;

#[derive(Debug, Clone, PartialEq)]
pub struct CoarseningNode {
    pub weight: usize,
    pub neighbors: IndexSet<usize>,
    /// Node of the [`GraphManager`] level this node stands for (first-pass graphs only).
    pub reference: Option<usize>,
    /// Nodes of the previous pass contracted into this one.
    pub pred1: usize,
    pub pred2: Option<usize>,
    /// Frozen nodes are never matched.
    pub frozen: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoarseningGraph {
    pub nodes: Vec<CoarseningNode>,
}

impl CoarseningGraph {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add_node(&mut self, weight: usize, reference: Option<usize>, frozen: bool) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(CoarseningNode {
            weight,
            neighbors: IndexSet::new(),
            reference,
            pred1: idx,
            pred2: None,
            frozen,
        });
        idx
    }

    /// Undirected; duplicates and self-loops are ignored.
    pub fn add_edge(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.nodes[a].neighbors.insert(b);
        self.nodes[b].neighbors.insert(a);
    }

    pub fn total_weight(&self) -> usize {
        self.nodes.iter().map(|n| n.weight).sum()
    }

    /// The matching view of `gm`: one node per leaf, in arena order.
    pub fn from_level(gm: &GraphManager) -> Self {
        let mut cg = Self::default();
        let mut index: Vec<Option<usize>> = vec![None; gm.nodes.len()];
        for leaf in gm.leaves() {
            let frozen = gm.sublayouts.is_frozen(leaf);
            index[leaf] = Some(cg.add_node(gm.nodes[leaf].kind.weight(), Some(leaf), frozen));
        }
        for e in &gm.edges {
            if gm.nodes[e.source].owner != gm.nodes[e.target].owner {
                continue;
            }
            if let (Some(a), Some(b)) = (index[e.source], index[e.target]) {
                cg.add_edge(a, b);
            }
        }
        cg
    }

    /// One matching pass.
    ///
    /// Nodes are visited by ascending id; an unmatched node pairs with its unmatched neighbor of
    /// lowest weight (lowest id on ties). Unmatched leftovers carry over on their own.
    pub fn coarsen(&self) -> Self {
        let mut image: Vec<Option<usize>> = vec![None; self.nodes.len()];
        let mut out = Self::default();

        for v in 0..self.nodes.len() {
            if image[v].is_some() {
                continue;
            }
            let node = &self.nodes[v];
            let partner = if node.frozen {
                None
            } else {
                node.neighbors
                    .iter()
                    .copied()
                    .filter(|&u| image[u].is_none() && !self.nodes[u].frozen)
                    .min_by_key(|&u| (self.nodes[u].weight, u))
            };

            let weight = node.weight + partner.map_or(0, |u| self.nodes[u].weight);
            let id = out.add_node(weight, None, node.frozen);
            out.nodes[id].pred1 = v;
            out.nodes[id].pred2 = partner;
            image[v] = Some(id);
            if let Some(u) = partner {
                image[u] = Some(id);
            }
        }

        for (v, node) in self.nodes.iter().enumerate() {
            for &u in &node.neighbors {
                if let (Some(a), Some(b)) = (image[v], image[u]) {
                    out.add_edge(a, b);
                }
            }
        }
        out
    }

    /// For every node of the previous pass, the node it was contracted into.
    pub fn predecessor_image(&self, previous_len: usize) -> Vec<Option<usize>> {
        let mut image = vec![None; previous_len];
        for (id, n) in self.nodes.iter().enumerate() {
            image[n.pred1] = Some(id);
            if let Some(p) = n.pred2 {
                image[p] = Some(id);
            }
        }
        image
    }
}

#[cfg(test)]
mod tests {
    use super::CoarseningGraph;

    fn path(n: usize) -> CoarseningGraph {
        let mut g = CoarseningGraph::default();
        for _ in 0..n {
            g.add_node(1, None, false);
        }
        for i in 1..n {
            g.add_edge(i - 1, i);
        }
        g
    }

    #[test]
    fn path_of_four_halves() {
        let g = path(4);
        let c = g.coarsen();
        assert_eq!(c.len(), 2);
        assert!(c.nodes.iter().all(|n| n.weight == 2));
        assert_eq!((c.nodes[0].pred1, c.nodes[0].pred2), (0, Some(1)));
        assert_eq!((c.nodes[1].pred1, c.nodes[1].pred2), (2, Some(3)));
        assert!(c.nodes[0].neighbors.contains(&1));
    }

    #[test]
    fn lightest_neighbor_wins() {
        let mut g = CoarseningGraph::default();
        let hub = g.add_node(1, None, false);
        let heavy = g.add_node(5, None, false);
        let light = g.add_node(2, None, false);
        g.add_edge(hub, heavy);
        g.add_edge(hub, light);
        let c = g.coarsen();
        assert_eq!(c.nodes[0].pred2, Some(light));
        assert_eq!(c.nodes[1].pred1, heavy);
        assert_eq!(c.nodes[1].pred2, None);
        assert_eq!(c.total_weight(), g.total_weight());
    }

    #[test]
    fn frozen_nodes_stay_single() {
        let mut g = path(3);
        g.nodes[1].frozen = true;
        let c = g.coarsen();
        assert_eq!(c.len(), 3);
        assert!(c.nodes[1].frozen);
    }

    #[test]
    fn no_edges_means_no_progress() {
        let mut g = CoarseningGraph::default();
        g.add_node(1, None, false);
        g.add_node(1, None, false);
        assert_eq!(g.coarsen().len(), 2);
    }

    #[test]
    fn predecessor_image_inverts_the_matching() {
        let g = path(5);
        let c = g.coarsen();
        assert_eq!(
            c.predecessor_image(g.len()),
            vec![Some(0), Some(0), Some(1), Some(1), Some(2)]
        );
    }
}
