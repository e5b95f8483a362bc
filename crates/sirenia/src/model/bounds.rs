use super::GraphManager;
use crate::geometry::Rect;
use crate::settings::CoseSettings;

impl GraphManager {
    /// Re-attaches sublayout members, then recomputes every graph box child graphs first.
    pub fn update_bounds(&mut self, settings: &CoseSettings) {
        self.sublayouts.set_origin(&mut self.nodes);
        self.update_graph_bounds(self.root, settings);
    }

    fn update_graph_bounds(&mut self, graph: usize, settings: &CoseSettings) {
        for i in 0..self.graphs[graph].nodes.len() {
            let n = self.graphs[graph].nodes[i];
            let Some(child) = self.nodes[n].child else {
                continue;
            };
            self.update_graph_bounds(child, settings);
            if self.sublayouts.is_frozen(n) || self.graphs[child].nodes.is_empty() {
                continue;
            }
            let g = &self.graphs[child];
            let (cx, cy) = g.center();
            let m = 2.0 * settings.compound_node_margin;
            self.nodes[n].rect = Rect::from_center(cx, cy, g.width() + m, g.height() + m);
        }

        let g = &self.graphs[graph];
        let (left, top, right, bottom) = if g.nodes.is_empty() {
            match g.parent {
                Some(p) => {
                    let r = self.nodes[p].rect;
                    (r.left, r.top, r.right(), r.bottom())
                }
                None => (0.0, 0.0, 0.0, 0.0),
            }
        } else {
            let mut left = f64::INFINITY;
            let mut top = f64::INFINITY;
            let mut right = f64::NEG_INFINITY;
            let mut bottom = f64::NEG_INFINITY;
            for &n in &g.nodes {
                let r = &self.nodes[n].rect;
                left = left.min(r.left);
                top = top.min(r.top);
                right = right.max(r.right());
                bottom = bottom.max(r.bottom());
            }
            let m = settings.graph_margin;
            (left - m, top - m, right + m, bottom + m)
        };

        let g = &mut self.graphs[graph];
        g.left = left;
        g.top = top;
        g.right = right;
        g.bottom = bottom;
    }

    /// Leaves estimate `(width + height) / 2`; compounds take their child graph's estimate.
    pub fn calc_estimated_sizes(&mut self, settings: &CoseSettings) {
        self.graph_estimated_size(self.root, settings);
    }

    fn graph_estimated_size(&mut self, graph: usize, settings: &CoseSettings) -> f64 {
        let count = self.graphs[graph].nodes.len();
        let mut sum = 0.0;
        for i in 0..count {
            let n = self.graphs[graph].nodes[i];
            let est = match self.nodes[n].child {
                Some(child) => self.graph_estimated_size(child, settings),
                None => (self.nodes[n].rect.width + self.nodes[n].rect.height) / 2.0,
            };
            self.nodes[n].estimated_size = est;
            sum += est;
        }
        let est = if sum == 0.0 {
            settings.empty_compound_size
        } else {
            sum / (count as f64).sqrt()
        };
        self.graphs[graph].estimated_size = est;
        est
    }

    /// Number of leaves below each node (1 for leaves and empty compounds).
    pub fn calc_leaf_counts(&mut self) {
        for i in 0..self.graphs[self.root].nodes.len() {
            let n = self.graphs[self.root].nodes[i];
            self.node_leaf_count(n);
        }
    }

    fn node_leaf_count(&mut self, node: usize) -> usize {
        let count = match self.nodes[node].child {
            None => 1,
            Some(g) => {
                let mut sum = 0;
                for i in 0..self.graphs[g].nodes.len() {
                    let c = self.graphs[g].nodes[i];
                    sum += self.node_leaf_count(c);
                }
                sum.max(1)
            }
        };
        self.nodes[node].leaf_count = count;
        count
    }

    /// Root-graph members have depth 1; every level of nesting adds one.
    pub fn calc_inclusion_tree_depths(&mut self) {
        self.assign_depth(self.root, 1);
    }

    fn assign_depth(&mut self, graph: usize, depth: usize) {
        for i in 0..self.graphs[graph].nodes.len() {
            let n = self.graphs[graph].nodes[i];
            self.nodes[n].depth = depth;
            if let Some(child) = self.nodes[n].child {
                self.assign_depth(child, depth + 1);
            }
        }
    }

    /// A graph sits at its owner's depth; the root graph at 1.
    pub fn graph_depth(&self, graph: usize) -> usize {
        match self.graphs[graph].parent {
            Some(p) => self.nodes[p].depth,
            None => 1,
        }
    }
}
