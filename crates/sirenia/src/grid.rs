//! FR-grid spatial partitioning for repulsion candidates.
//!
//! Cells are at least as wide as the repulsion range, so every partner within range of a node lives
//! in a cell at most one step away from the node's own cells. On widely spread drawings cells grow
//! so the grid never holds more than a few cells per participant. Surrounding lists are cached on
//! the nodes and reused until the next rebuild.

use crate::geometry::Rect;
use crate::model::CNode;

/// Upper bound on cells per participating node.
const CELLS_PER_PARTICIPANT: f64 = 16.0;

#[derive(Debug, Clone)]
pub struct SpatialGrid {
    left: f64,
    top: f64,
    size_x: i32,
    size_y: i32,
    range: f64,
    cell_size: f64,
    // Flat grid: cells[x * size_y + y] contains node indices.
    cells: Vec<Vec<usize>>,
    /// Scratch marks for `refresh_surrounding`; all false between calls.
    seen: Vec<bool>,
}

impl SpatialGrid {
    /// Covers `bounds` with cells of at least `range` and files every node in `participants` into
    /// the cells its box touches. Returns `None` for a degenerate range or bounds.
    pub fn build(
        bounds: Rect,
        range: f64,
        nodes: &mut [CNode],
        participants: &[usize],
    ) -> Option<Self> {
        if !range.is_finite() || range <= 0.0 {
            return None;
        }
        if !(bounds.left.is_finite()
            && bounds.top.is_finite()
            && bounds.width.is_finite()
            && bounds.height.is_finite())
        {
            return None;
        }

        let extent = bounds.width.max(bounds.height).max(1.0);
        let budget = (CELLS_PER_PARTICIPANT * participants.len().max(1) as f64).sqrt();
        let cell_size = range.max(extent / budget);
        let size_x = ((bounds.width.max(1.0) / cell_size).ceil() as i32).max(1);
        let size_y = ((bounds.height.max(1.0) / cell_size).ceil() as i32).max(1);
        let mut grid = Self {
            left: bounds.left,
            top: bounds.top,
            size_x,
            size_y,
            range,
            cell_size,
            cells: vec![Vec::new(); (size_x as usize) * (size_y as usize)],
            seen: vec![false; nodes.len()],
        };

        for &idx in participants {
            let (start_x, finish_x, start_y, finish_y) = grid.cell_span(&nodes[idx].rect);
            for gx in start_x..=finish_x {
                for gy in start_y..=finish_y {
                    let cell = grid.idx(gx, gy);
                    grid.cells[cell].push(idx);
                }
            }
            let n = &mut nodes[idx];
            n.grid_start_x = start_x;
            n.grid_finish_x = finish_x;
            n.grid_start_y = start_y;
            n.grid_finish_y = finish_y;
        }
        Some(grid)
    }

    fn idx(&self, x: i32, y: i32) -> usize {
        (x as usize) * (self.size_y as usize) + (y as usize)
    }

    pub fn dimensions(&self) -> (i32, i32) {
        (self.size_x, self.size_y)
    }

    fn cell_span(&self, r: &Rect) -> (i32, i32, i32, i32) {
        let cell = |v: f64, origin: f64, size: i32| {
            (((v - origin) / self.cell_size).floor() as i32).clamp(0, size - 1)
        };
        (
            cell(r.left, self.left, self.size_x),
            cell(r.right(), self.left, self.size_x),
            cell(r.top, self.top, self.size_y),
            cell(r.bottom(), self.top, self.size_y),
        )
    }

    /// Recomputes `node`'s cached partners: same owner, not yet processed in this pass, and
    /// within range on both axes.
    pub fn refresh_surrounding(&mut self, node: usize, nodes: &mut [CNode], processed: &[bool]) {
        let (start_x, finish_x, start_y, finish_y) = {
            let n = &nodes[node];
            (n.grid_start_x, n.grid_finish_x, n.grid_start_y, n.grid_finish_y)
        };
        let owner = nodes[node].owner;
        let rect = nodes[node].rect;

        let mut visited: Vec<usize> = Vec::new();
        let mut surrounding: Vec<usize> = Vec::new();
        for gx in (start_x - 1)..=(finish_x + 1) {
            if gx < 0 || gx >= self.size_x {
                continue;
            }
            for gy in (start_y - 1)..=(finish_y + 1) {
                if gy < 0 || gy >= self.size_y {
                    continue;
                }
                let cell = self.idx(gx, gy);
                for &other in &self.cells[cell] {
                    if other == node || processed[other] || nodes[other].owner != owner {
                        continue;
                    }
                    if self.seen[other] {
                        continue;
                    }
                    self.seen[other] = true;
                    visited.push(other);
                    let o = &nodes[other].rect;
                    let dx = (rect.center_x() - o.center_x()).abs() - (rect.half_w() + o.half_w());
                    let dy = (rect.center_y() - o.center_y()).abs() - (rect.half_h() + o.half_h());
                    if dx <= self.range && dy <= self.range {
                        surrounding.push(other);
                    }
                }
            }
        }
        for other in visited {
            self.seen[other] = false;
        }
        surrounding.sort_unstable();
        nodes[node].surrounding = surrounding;
    }
}

#[cfg(test)]
mod tests {
    use super::SpatialGrid;
    use crate::geometry::Rect;
    use crate::model::CNode;

/// Upper bound on cells per participating node.
const CELLS_PER_PARTICIPANT: f64 = 16.0;

    fn node_at(left: f64, top: f64, w: f64, h: f64, owner: usize) -> CNode {
        CNode::new(None, owner, Rect::new(left, top, w, h))
    }

    fn bounds(nodes: &[CNode]) -> Rect {
        let left = nodes.iter().map(|n| n.rect.left).fold(f64::INFINITY, f64::min);
        let top = nodes.iter().map(|n| n.rect.top).fold(f64::INFINITY, f64::min);
        let right = nodes.iter().map(|n| n.rect.right()).fold(f64::NEG_INFINITY, f64::max);
        let bottom = nodes.iter().map(|n| n.rect.bottom()).fold(f64::NEG_INFINITY, f64::max);
        Rect::new(left, top, right - left, bottom - top)
    }

    #[test]
    fn surrounding_excludes_processed_nodes() {
        // node0 and node1 are exactly within range, node2 is far outside it.
        let range = 10.0;
        let mut nodes = vec![
            node_at(0.0, 0.0, 10.0, 10.0, 0),
            node_at(20.0, 0.0, 10.0, 10.0, 0),
            node_at(200.0, 0.0, 10.0, 10.0, 0),
        ];
        let b = bounds(&nodes);
        let mut grid = SpatialGrid::build(b, range, &mut nodes, &[0, 1, 2]).expect("grid");

        let mut processed = vec![false; nodes.len()];
        grid.refresh_surrounding(0, &mut nodes, &processed);
        assert_eq!(nodes[0].surrounding, vec![1]);

        processed[0] = true;
        grid.refresh_surrounding(1, &mut nodes, &processed);
        assert!(
            !nodes[1].surrounding.contains(&0),
            "node1 should not include already-processed node0"
        );
    }

    #[test]
    fn surrounding_is_restricted_to_the_same_owner() {
        let mut nodes = vec![
            node_at(0.0, 0.0, 10.0, 10.0, 1),
            node_at(12.0, 0.0, 10.0, 10.0, 2),
            node_at(0.0, 12.0, 10.0, 10.0, 1),
        ];
        let b = bounds(&nodes);
        let mut grid = SpatialGrid::build(b, 50.0, &mut nodes, &[0, 1, 2]).expect("grid");
        grid.refresh_surrounding(0, &mut nodes, &[false; 3]);
        assert_eq!(nodes[0].surrounding, vec![2]);
    }

    #[test]
    fn cells_are_sized_to_the_range() {
        let mut nodes = vec![
            node_at(0.0, 0.0, 10.0, 10.0, 0),
            node_at(95.0, 35.0, 5.0, 5.0, 0),
        ];
        let b = bounds(&nodes);
        let grid = SpatialGrid::build(b, 20.0, &mut nodes, &[0, 1]).expect("grid");
        assert_eq!(grid.dimensions(), (5, 2));
        assert_eq!((nodes[1].grid_start_x, nodes[1].grid_finish_x), (4, 4));
        assert!(SpatialGrid::build(b, 0.0, &mut nodes, &[0, 1]).is_none());
    }

    #[test]
    fn far_apart_nodes_keep_the_grid_small() {
        let mut nodes = vec![
            node_at(0.0, 0.0, 10.0, 10.0, 0),
            node_at(1e6, 1e6, 10.0, 10.0, 0),
            node_at(1e6 - 40.0, 1e6, 10.0, 10.0, 0),
        ];
        let b = bounds(&nodes);
        let mut grid = SpatialGrid::build(b, 100.0, &mut nodes, &[0, 1, 2]).expect("grid");
        let (x, y) = grid.dimensions();
        assert!((x as usize) * (y as usize) <= 64, "grid is {x}x{y}");

        // Neighbors within range are still found, far ones are not.
        grid.refresh_surrounding(1, &mut nodes, &[false; 3]);
        assert_eq!(nodes[1].surrounding, vec![2]);
    }

    #[test]
    fn node_spanning_several_cells_is_listed_once() {
        let mut nodes = vec![
            node_at(0.0, 0.0, 10.0, 10.0, 0),
            node_at(12.0, 0.0, 45.0, 45.0, 0),
            node_at(200.0, 200.0, 10.0, 10.0, 0),
        ];
        let b = bounds(&nodes);
        let mut grid = SpatialGrid::build(b, 10.0, &mut nodes, &[0, 1, 2]).expect("grid");
        assert!(nodes[1].grid_finish_x > nodes[1].grid_start_x);
        grid.refresh_surrounding(0, &mut nodes, &[false; 3]);
        assert_eq!(nodes[0].surrounding, vec![1]);
        // Marks are cleared, so a second refresh sees the same partner.
        grid.refresh_surrounding(0, &mut nodes, &[false; 3]);
        assert_eq!(nodes[0].surrounding, vec![1]);
    }
}
