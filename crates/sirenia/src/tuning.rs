//! Parameter calculation: a one-shot heuristic for edge length and repulsion, and a small grid
//! search that reruns the layout while nodes still overlap.

use crate::error::Result;
use crate::graph::{LayoutGraph, LayoutResult, Sublayout};
use crate::measure;
use crate::settings::CoseSettings;
use rustc_hash::{FxHashMap, FxHashSet};

/// Repulsion grows by this much per search step.
const REPULSION_STEP: f64 = 5.0;
const REPULSION_STEPS: usize = 3;
const EDGE_LENGTH_STEP: f64 = 5.0;
const EDGE_LENGTH_STEPS: usize = 3;

/// Shape figures of an input graph. Sublayout members count only through their root.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphProfile {
    pub nodes: usize,
    pub leaves: usize,
    /// Deepest nesting of any leaf; children of the root sit at depth 1.
    pub max_depth: usize,
    /// Edges whose both ends have children.
    pub compound_edges: usize,
    pub edges: usize,
    /// Mean of `(width + height) / 2` over the leaves.
    pub mean_leaf_extent: f64,
}

impl GraphProfile {
    pub fn of(graph: &LayoutGraph, sublayouts: &[Sublayout]) -> Self {
        let children = graph.children_by_parent();
        let parents: FxHashMap<&str, &str> = graph
            .nodes
            .iter()
            .filter_map(|n| n.parent.as_deref().map(|p| (n.id.as_str(), p)))
            .collect();

        let mut frozen: FxHashSet<&str> = FxHashSet::default();
        for s in sublayouts {
            if s.members.is_empty() {
                let mut stack = vec![s.root.as_str()];
                while let Some(id) = stack.pop() {
                    for &k in children.get(id).map(Vec::as_slice).unwrap_or_default() {
                        frozen.insert(graph.nodes[k].id.as_str());
                        stack.push(graph.nodes[k].id.as_str());
                    }
                }
            } else {
                frozen.extend(s.members.iter().map(String::as_str));
            }
        }

        let depth_of = |id: &str| {
            let mut depth = 0;
            let mut cur = id;
            while let Some(&p) = parents.get(cur) {
                depth += 1;
                cur = p;
            }
            depth
        };

        let mut nodes = 0;
        let mut leaves = 0;
        let mut max_depth = 0;
        let mut extent = 0.0;
        for n in &graph.nodes {
            if frozen.contains(n.id.as_str()) {
                continue;
            }
            nodes += 1;
            if children.contains_key(n.id.as_str()) {
                continue;
            }
            leaves += 1;
            max_depth = max_depth.max(depth_of(&n.id));
            let (w, h) = (n.width.max(0.0), n.height.max(0.0));
            if w.is_finite() && h.is_finite() {
                extent += (w + h) / 2.0;
            }
        }

        let compound_edges = graph
            .edges
            .iter()
            .filter(|e| {
                children.contains_key(e.source.as_str()) && children.contains_key(e.target.as_str())
            })
            .count();

        Self {
            nodes,
            leaves,
            max_depth,
            compound_edges,
            edges: graph.edges.len(),
            mean_leaf_extent: if leaves == 0 {
                0.0
            } else {
                extent / leaves as f64
            },
        }
    }

    /// Edge length scaled to the leaves, stretched for deep hierarchies and for graphs where many
    /// edges run between compound nodes.
    pub fn edge_length(&self) -> f64 {
        if self.mean_leaf_extent <= 0.0 {
            return CoseSettings::DEFAULT_EDGE_LENGTH;
        }
        let compound_share = if self.edges == 0 {
            0.0
        } else {
            self.compound_edges as f64 / self.edges as f64
        };
        let depth = 1.0 + 0.1 * self.max_depth as f64;
        (self.mean_leaf_extent * depth * (1.0 + compound_share))
            .round()
            .clamp(10.0, 500.0)
    }

    pub fn repulsion_strength(&self, edge_length: f64) -> f64 {
        (1.8 * edge_length * edge_length * (1.0 + 0.1 * self.max_depth as f64)).round()
    }
}

/// `settings` with edge length and repulsion strength derived from `graph`.
pub fn automatic_parameters(
    graph: &LayoutGraph,
    sublayouts: &[Sublayout],
    settings: &CoseSettings,
) -> CoseSettings {
    let profile = GraphProfile::of(graph, sublayouts);
    let edge_length = profile.edge_length();
    let repulsion_strength = profile.repulsion_strength(edge_length);
    tracing::debug!(?profile, edge_length, repulsion_strength, "automatic parameters");
    CoseSettings {
        edge_length,
        repulsion_strength,
        ..settings.clone()
    }
}

/// Reruns `layout` from the input positions while the result has overlapping nodes.
///
/// Repulsion steps up first; once its range is exhausted it resets and the edge length steps up.
/// The last result is returned when the whole range still overlaps.
pub fn iterate<F>(
    graph: &LayoutGraph,
    settings: &CoseSettings,
    mut layout: F,
) -> Result<LayoutResult>
where
    F: FnMut(&CoseSettings) -> Result<LayoutResult>,
{
    let base_repulsion = settings.repulsion_strength;
    let mut current = settings.clone();
    let mut iterations = 0;
    let mut rounds = 0;
    let mut repulsion_step = 0;
    let mut edge_step = 0;

    loop {
        let mut result = layout(&current)?;
        rounds += 1;
        iterations += result.stats.iterations;
        let overlaps = measure::overlapping_nodes(graph, &result);
        tracing::debug!(
            round = rounds,
            edge_length = current.edge_length,
            repulsion_strength = current.repulsion_strength,
            overlaps,
            "parameter search round"
        );

        let done = if overlaps == 0 {
            true
        } else if repulsion_step < REPULSION_STEPS {
            repulsion_step += 1;
            false
        } else if edge_step < EDGE_LENGTH_STEPS {
            edge_step += 1;
            repulsion_step = 0;
            false
        } else {
            true
        };
        if done {
            result.stats.rounds = rounds;
            result.stats.iterations = iterations;
            return Ok(result);
        }

        current.repulsion_strength = base_repulsion + REPULSION_STEP * repulsion_step as f64;
        current.edge_length = settings.edge_length + EDGE_LENGTH_STEP * edge_step as f64;
    }
}

#[cfg(test)]
mod tests {
    use super::{GraphProfile, automatic_parameters, iterate};
    use crate::graph::{Edge, LayoutGraph, LayoutResult, LayoutStats, Node, Sublayout};
    use crate::settings::CoseSettings;

    fn graph() -> LayoutGraph {
        LayoutGraph {
            nodes: vec![
                Node::leaf("root", None, 0.0, 0.0),
                Node::leaf("a", Some("root"), 0.0, 0.0),
                Node::leaf("b", Some("root"), 0.0, 0.0),
                Node::leaf("a1", Some("a"), 20.0, 40.0),
                Node::leaf("a2", Some("a"), 20.0, 40.0),
                Node::leaf("b1", Some("b"), 60.0, 60.0),
            ],
            edges: vec![Edge::new("a", "b"), Edge::new("a1", "a2")],
        }
    }

    #[test]
    fn profile_counts_leaves_depth_and_compound_edges() {
        let p = GraphProfile::of(&graph(), &[]);
        assert_eq!(p.nodes, 6);
        assert_eq!(p.leaves, 3);
        assert_eq!(p.max_depth, 2);
        assert_eq!(p.compound_edges, 1);
        assert!((p.mean_leaf_extent - 40.0).abs() < 1e-12);
        // 40 * 1.2 * 1.5
        assert_eq!(p.edge_length(), 72.0);
    }

    #[test]
    fn sublayout_members_are_left_out() {
        let p = GraphProfile::of(&graph(), &[Sublayout::whole_subtree("a")]);
        assert_eq!(p.nodes, 4);
        assert_eq!(p.leaves, 1);
        assert_eq!(p.mean_leaf_extent, 60.0);
    }

    #[test]
    fn automatic_parameters_only_touch_length_and_repulsion() {
        let base = CoseSettings {
            gravity_strength: 0.9,
            ..Default::default()
        };
        let s = automatic_parameters(&graph(), &[], &base);
        assert_eq!(s.edge_length, 72.0);
        assert_eq!(s.repulsion_strength, (1.8 * 72.0 * 72.0 * 1.2f64).round());
        assert_eq!(s.gravity_strength, 0.9);
    }

    #[test]
    fn search_walks_repulsion_then_edge_length_and_gives_up() {
        let g = graph();
        let mut seen = Vec::new();
        let base = CoseSettings::default();
        // Every round reports the same overlapping placement.
        let result = iterate(&g, &base, |s| {
            seen.push((s.edge_length, s.repulsion_strength));
            let mut placements = std::collections::BTreeMap::new();
            for id in ["a1", "a2"] {
                placements.insert(
                    id.to_string(),
                    crate::graph::Placement {
                        position: crate::graph::Point { x: 0.0, y: 0.0 },
                        size: crate::graph::Size {
                            width: 10.0,
                            height: 10.0,
                        },
                        rotation: 0.0,
                    },
                );
            }
            Ok(LayoutResult {
                placements,
                stats: LayoutStats {
                    iterations: 10,
                    ..Default::default()
                },
            })
        })
        .unwrap();

        // 1 initial round, 3 repulsion steps, then 3 edge steps each with 3 repulsion steps.
        assert_eq!(seen.len(), 1 + 3 + 3 * 4);
        assert_eq!(seen[1], (50.0, 4505.0));
        assert_eq!(seen[4], (55.0, 4500.0));
        assert_eq!(seen.last().copied(), Some((65.0, 4515.0)));
        assert_eq!(result.stats.rounds, seen.len());
        assert_eq!(result.stats.iterations, 10 * seen.len());
    }

    #[test]
    fn search_stops_at_the_first_clean_layout() {
        let g = graph();
        let mut calls = 0;
        let result = iterate(&g, &CoseSettings::default(), |_| {
            calls += 1;
            Ok(LayoutResult {
                placements: Default::default(),
                stats: LayoutStats::default(),
            })
        })
        .unwrap();
        assert_eq!(calls, 1);
        assert_eq!(result.stats.rounds, 1);
    }
}
