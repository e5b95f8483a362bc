use super::{CNode, GraphManager};
use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::graph::{LayoutGraph, Node, Sublayout};
use crate::settings::CoseSettings;
use rustc_hash::FxHashMap;

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

fn node_from_input(n: &Node) -> CNode {
    let w = finite_or_zero(n.width).max(0.0);
    let h = finite_or_zero(n.height).max(0.0);
    let rect = Rect::from_center(finite_or_zero(n.x), finite_or_zero(n.y), w, h);
    let mut node = CNode::new(Some(n.id.clone()), 0, rect);
    node.rotation = finite_or_zero(n.rotation);
    node
}

impl GraphManager {
    /// Builds the compound model for one layout call.
    ///
    /// Self-edges and edges between a node and one of its ancestors are dropped. Sublayout members
    /// are frozen relative to their root at their input positions.
    pub fn build(
        input: &LayoutGraph,
        sublayouts: &[Sublayout],
        settings: &CoseSettings,
    ) -> Result<Self> {
        input.validate()?;

        let roots: Vec<usize> = input
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.parent.is_none())
            .map(|(i, _)| i)
            .collect();
        let &[root_input] = &roots[..] else {
            return Err(Error::InvalidGraphShape { roots: roots.len() });
        };

        let children = input.children_by_parent();
        let mut gm = GraphManager::new();
        let mut id_to_idx: FxHashMap<&str, usize> = FxHashMap::default();

        let mut stack = vec![(root_input, gm.root)];
        while let Some((i, graph)) = stack.pop() {
            let n = &input.nodes[i];
            let idx = gm.add_node(graph, node_from_input(n));
            id_to_idx.insert(n.id.as_str(), idx);
            if let Some(kids) = children.get(n.id.as_str()) {
                let child = gm.add_graph(idx);
                stack.extend(kids.iter().rev().map(|&k| (k, child)));
            }
        }
        if id_to_idx.len() != input.nodes.len() {
            return Err(Error::DetachedNodes {
                unreachable: input.nodes.len() - id_to_idx.len(),
            });
        }

        for e in &input.edges {
            let lookup = |id: &str| {
                id_to_idx
                    .get(id)
                    .copied()
                    .ok_or_else(|| Error::MissingEndpoint {
                        edge_id: e.id.clone(),
                    })
            };
            let s = lookup(&e.source)?;
            let t = lookup(&e.target)?;
            if s == t || gm.is_ancestor(s, t) || gm.is_ancestor(t, s) {
                continue;
            }
            gm.add_edge(s, t);
        }

        gm.freeze_sublayouts(sublayouts, &id_to_idx)?;
        gm.update_bounds(settings);
        Ok(gm)
    }

    fn freeze_sublayouts(
        &mut self,
        sublayouts: &[Sublayout],
        id_to_idx: &FxHashMap<&str, usize>,
    ) -> Result<()> {
        let mut resolved: Vec<(usize, Vec<usize>)> = Vec::with_capacity(sublayouts.len());
        for s in sublayouts {
            let invalid = |reason: &str| Error::InvalidSublayout {
                root_id: s.root.clone(),
                reason: reason.to_string(),
            };
            let root = *id_to_idx
                .get(s.root.as_str())
                .ok_or_else(|| invalid("unknown root node"))?;
            if !self.nodes[root].compound {
                return Err(invalid("root node has no children"));
            }
            let members = if s.members.is_empty() {
                self.with_descendants(root).into_iter().skip(1).collect()
            } else {
                let mut out = Vec::with_capacity(s.members.len());
                for m in &s.members {
                    let idx = *id_to_idx
                        .get(m.as_str())
                        .ok_or_else(|| invalid(&format!("unknown member {m}")))?;
                    if !self.is_ancestor(root, idx) {
                        return Err(invalid(&format!("{m} is not a descendant of the root")));
                    }
                    out.push(idx);
                }
                out
            };
            resolved.push((root, members));
        }

        // Outer units first, so nested ones fold into them.
        resolved.sort_by_key(|(root, _)| self.nesting_depth(*root));
        for (root, members) in resolved {
            self.sublayouts.freeze(&self.nodes, root, &members);
        }
        Ok(())
    }
}
