use super::GraphManager;
use crate::error::Result;
use crate::settings::CoseSettings;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

impl GraphManager {
    /// Number of compound nodes strictly enclosing `node`.
    pub fn nesting_depth(&self, node: usize) -> usize {
        let mut depth = 0;
        let mut cur = node;
        while let Some(p) = self.graphs[self.nodes[cur].owner].parent {
            depth += 1;
            cur = p;
        }
        depth
    }

    /// `(graph, member)` pairs from `node`'s owner up to the root graph, where `member` is the
    /// node itself or the ancestor that belongs to `graph`.
    fn projections(&self, node: usize) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        let mut cur = node;
        loop {
            let owner = self.nodes[cur].owner;
            out.push((owner, cur));
            match self.graphs[owner].parent {
                Some(p) => cur = p,
                None => return out,
            }
        }
    }

    /// Caches, per edge, the lowest graph containing both endpoints and the members of that graph
    /// on each endpoint's branch.
    pub fn compute_lcas(&mut self) {
        for e in 0..self.edges.len() {
            let source = self.projections(self.edges[e].source);
            let target = self.projections(self.edges[e].target);
            let lca = source.iter().find_map(|&(graph, s)| {
                target
                    .iter()
                    .find(|&&(other, _)| other == graph)
                    .map(|&(_, t)| (graph, s, t))
            });
            // Both chains end at the root graph, so a common graph always exists.
            if let Some((graph, s, t)) = lca {
                let edge = &mut self.edges[e];
                edge.lca = Some(graph);
                edge.source_in_lca = s;
                edge.target_in_lca = t;
            }
        }
    }

    /// Flags every graph as connected or not and collects the nodes that need gravity.
    pub fn update_connectivity(&mut self) -> Result<()> {
        for g in 0..self.graphs.len() {
            self.graphs[g].connected = self.is_connected(g)?;
        }
        let mut gravity_nodes = Vec::new();
        for g in &self.graphs {
            if g.connected {
                continue;
            }
            gravity_nodes.extend(
                g.nodes
                    .iter()
                    .copied()
                    .filter(|&n| !self.sublayouts.is_member(n)),
            );
        }
        gravity_nodes.sort_unstable();
        self.gravity_nodes = gravity_nodes;
        Ok(())
    }

    fn is_connected(&self, graph: usize) -> Result<bool> {
        let members = &self.graphs[graph].nodes;
        let Some(&first) = members.first() else {
            return Ok(true);
        };

        let mut visited: FxHashSet<usize> = FxHashSet::default();
        let mut queue: VecDeque<usize> = VecDeque::new();
        for n in self.with_descendants(first) {
            if visited.insert(n) {
                queue.push_back(n);
            }
        }
        while let Some(cur) = queue.pop_front() {
            for &e in &self.nodes[cur].edges {
                let Some(other) = self.other_end_in_graph(e, cur, graph)? else {
                    continue;
                };
                if visited.contains(&other) {
                    continue;
                }
                for n in self.with_descendants(other) {
                    if visited.insert(n) {
                        queue.push_back(n);
                    }
                }
            }
        }
        Ok(members.iter().all(|n| visited.contains(n)))
    }

    /// Ideal lengths for every edge; requires LCAs, depths and estimated sizes.
    pub fn calc_ideal_edge_lengths(&mut self, edge_length: f64, settings: &CoseSettings) {
        for e in 0..self.edges.len() {
            let edge = &self.edges[e];
            let mut ideal = edge_length;
            if edge.inter_graph {
                if settings.use_smart_ideal_edge_length {
                    let s = self.nodes[edge.source_in_lca].estimated_size.round();
                    let t = self.nodes[edge.target_in_lca].estimated_size.round();
                    ideal += s + t - 2.0 * settings.simple_node_size;
                }
                let lca_depth = self.graph_depth(edge.lca.unwrap_or(self.root)) as f64;
                let crossed = (self.nodes[edge.source].depth + self.nodes[edge.target].depth) as f64
                    - 2.0 * lca_depth;
                ideal += edge_length * settings.per_level_ideal_edge_length_factor * crossed;
            }
            self.edges[e].ideal_length = ideal.max(1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::geometry::Rect;
    use crate::model::{CNode, GraphManager};
    use crate::settings::CoseSettings;

    fn leaf(cx: f64, w: f64) -> CNode {
        CNode::new(None, 0, Rect::from_center(cx, 0.0, w, w))
    }

    /// root { a { a1, a2 }, b { b1 }, c }
    fn sample() -> (GraphManager, [usize; 7]) {
        let mut gm = GraphManager::new();
        let root = gm.add_node(0, leaf(0.0, 1.0));
        let g = gm.add_graph(root);
        let a = gm.add_node(g, leaf(0.0, 1.0));
        let b = gm.add_node(g, leaf(100.0, 1.0));
        let c = gm.add_node(g, leaf(200.0, 40.0));
        let ga = gm.add_graph(a);
        let a1 = gm.add_node(ga, leaf(0.0, 40.0));
        let a2 = gm.add_node(ga, leaf(60.0, 40.0));
        let gb = gm.add_graph(b);
        let b1 = gm.add_node(gb, leaf(100.0, 40.0));
        (gm, [root, a, b, c, a1, a2, b1])
    }

    #[test]
    fn lca_projects_endpoints_into_the_common_graph() {
        let (mut gm, [_, a, b, _, a1, a2, b1]) = sample();
        let cross = gm.add_edge(a1, b1);
        let local = gm.add_edge(a1, a2);
        gm.compute_lcas();

        let e = &gm.edges[cross];
        assert!(e.inter_graph);
        assert_eq!(e.lca, Some(gm.nodes[a].owner));
        assert_eq!((e.source_in_lca, e.target_in_lca), (a, b));

        let e = &gm.edges[local];
        assert_eq!(e.lca, Some(gm.nodes[a1].owner));
        assert_eq!((e.source_in_lca, e.target_in_lca), (a1, a2));
    }

    #[test]
    fn connectivity_follows_projected_edges() {
        let (mut gm, [_, a, _, c, a1, _, b1]) = sample();
        gm.add_edge(a1, b1);
        gm.update_connectivity().unwrap();
        let g = gm.nodes[a].owner;
        // a and b are linked through a1-b1, c is isolated.
        assert!(!gm.graphs[g].connected);
        assert!(gm.gravity_nodes.contains(&c));
        // a's child graph has no edge between a1 and a2.
        assert!(!gm.graphs[gm.nodes[a1].owner].connected);

        gm.add_edge(c, a1);
        gm.update_connectivity().unwrap();
        assert!(gm.graphs[g].connected);
        assert!(!gm.gravity_nodes.contains(&c));
    }

    #[test]
    fn inter_graph_edges_grow_with_depth_and_subtree_size() {
        let s = CoseSettings::default();
        let (mut gm, [_, _, _, c, a1, a2, b1]) = sample();
        let cross = gm.add_edge(a1, b1);
        let local = gm.add_edge(a1, a2);
        let shallow = gm.add_edge(a2, c);
        gm.compute_lcas();
        gm.calc_inclusion_tree_depths();
        gm.calc_estimated_sizes(&s);
        gm.calc_ideal_edge_lengths(50.0, &s);

        assert_eq!(gm.edges[local].ideal_length, 50.0);
        // a's estimate: (40 + 40) / sqrt(2); b's: 40. Depth 3 + 3 - 2 * 1.
        let est_a = (80.0 / 2f64.sqrt()).round();
        let expected = 50.0 + est_a + 40.0 - 80.0 + 50.0 * 0.1 * 4.0;
        assert!((gm.edges[cross].ideal_length - expected).abs() < 1e-9);
        // c sits one level above a2: 3 + 2 - 2 * 1.
        let expected = 50.0 + est_a + 40.0 - 80.0 + 50.0 * 0.1 * 3.0;
        assert!((gm.edges[shallow].ideal_length - expected).abs() < 1e-9);
    }
}
