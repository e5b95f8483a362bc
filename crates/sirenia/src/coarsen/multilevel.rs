use super::CoarseningGraph;
use crate::error::Result;
use crate::graph::LayoutStats;
use crate::model::{CNode, GraphManager, NodeKind};
use crate::settings::CoseSettings;
use crate::sim::{ForceSimulation, RunConfig};
use nalgebra::Vector2;
use rustc_hash::FxHashSet;

fn center_of(node: &CNode) -> Vector2<f64> {
    let (x, y) = node.center();
    Vector2::new(x, y)
}

/// Builds the next coarser level of `fine`, or `None` when matching makes no progress.
///
/// Compound nodes are copied one to one. Matched leaf pairs become one coarse leaf that starts
/// where its first predecessor is. Edges are carried over between images, dropping self-loops and
/// duplicates; sublayout units follow their root's image.
pub fn coarsen_level(fine: &GraphManager, settings: &CoseSettings) -> Option<GraphManager> {
    let cg = CoarseningGraph::from_level(fine);
    let coarse = cg.coarsen();
    if coarse.len() >= cg.len() {
        return None;
    }

    let cg_image = coarse.predecessor_image(cg.len());
    let mut group_of: Vec<Option<usize>> = vec![None; fine.nodes.len()];
    for (i, n) in cg.nodes.iter().enumerate() {
        if let Some(r) = n.reference {
            group_of[r] = cg_image[i];
        }
    }

    let mut out = GraphManager::new();
    let mut image: Vec<Option<usize>> = vec![None; fine.nodes.len()];
    let mut group_node: Vec<Option<usize>> = vec![None; coarse.len()];

    let mut stack: Vec<(usize, usize)> = fine.graphs[fine.root]
        .nodes
        .iter()
        .rev()
        .map(|&n| (n, out.root))
        .collect();
    while let Some((n, graph)) = stack.pop() {
        let node = &fine.nodes[n];
        if let Some(child) = node.child {
            let mut copy = CNode::new(None, graph, node.rect);
            copy.rotation = node.rotation;
            copy.kind = NodeKind::Coarsened {
                weight: node.kind.weight(),
                pred1: n,
                pred2: None,
                origin: center_of(node),
            };
            let idx = out.add_node(graph, copy);
            image[n] = Some(idx);
            let g = out.add_graph(idx);
            stack.extend(fine.graphs[child].nodes.iter().rev().map(|&c| (c, g)));
            continue;
        }

        let Some(group) = group_of[n] else {
            continue;
        };
        if let Some(idx) = group_node[group] {
            image[n] = Some(idx);
            continue;
        }
        let c = &coarse.nodes[group];
        let Some(pred1) = cg.nodes[c.pred1].reference else {
            continue;
        };
        let pred2 = c.pred2.and_then(|p| cg.nodes[p].reference);
        let first = &fine.nodes[pred1];
        let mut leaf = CNode::new(None, graph, first.rect);
        leaf.kind = NodeKind::Coarsened {
            weight: c.weight,
            pred1,
            pred2,
            origin: center_of(first),
        };
        let idx = out.add_node(graph, leaf);
        group_node[group] = Some(idx);
        image[n] = Some(idx);
    }

    let mut seen: FxHashSet<(usize, usize)> = FxHashSet::default();
    for e in &fine.edges {
        let (Some(s), Some(t)) = (image[e.source], image[e.target]) else {
            continue;
        };
        if s == t || !seen.insert((s.min(t), s.max(t))) {
            continue;
        }
        out.add_edge(s, t);
    }

    out.sublayouts = fine.sublayouts.remap(|n| image[n]);
    out.update_bounds(settings);
    Some(out)
}

/// Level 0 is `gm` itself; every further entry is one matching pass coarser.
///
/// Coarsening stops once a pass no longer shrinks the leaf count. A level that would be left
/// with a single leaf is not kept.
pub fn build_tower(gm: GraphManager, settings: &CoseSettings) -> Vec<GraphManager> {
    let mut tower = vec![gm];
    while let Some(fine) = tower.last() {
        let Some(coarse) = coarsen_level(fine, settings) else {
            break;
        };
        if coarse.leaves().count() <= 1 {
            break;
        }
        tower.push(coarse);
    }
    tower
}

/// Projects the positions of `coarse` back onto `fine`.
///
/// Each predecessor moves by its coarse node's displacement since contraction, so an untouched
/// level projects back exactly. A second predecessor that sat on top of the first is placed
/// `edge_length` right and below the coarse node instead.
pub fn uncoarsen(
    coarse: &GraphManager,
    fine: &mut GraphManager,
    edge_length: f64,
    settings: &CoseSettings,
) {
    for node in &coarse.nodes {
        let NodeKind::Coarsened {
            pred1,
            pred2,
            origin,
            ..
        } = node.kind
        else {
            continue;
        };
        let now = center_of(node);
        let d = now - origin;
        let stacked =
            pred2.is_some_and(|p2| center_of(&fine.nodes[p2]) == center_of(&fine.nodes[pred1]));

        fine.nodes[pred1].move_by(d.x, d.y);
        if let Some(p2) = pred2 {
            if stacked {
                fine.nodes[p2].set_center(now.x + edge_length, now.y + edge_length);
            } else {
                fine.nodes[p2].move_by(d.x, d.y);
            }
        }
    }
    fine.update_bounds(settings);
}

/// Edge length per level, finest first. With smart scaling each coarser level shrinks the
/// previous length by `sqrt(4/7)`, never below 1.
pub fn level_edge_lengths(settings: &CoseSettings, levels: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(levels);
    let mut len = settings.edge_length;
    for _ in 0..levels {
        out.push(len);
        if settings.use_smart_multilevel_scaling {
            len = (len * (4.0f64 / 7.0).sqrt()).floor().max(1.0);
        }
    }
    out
}

/// Lays out the coarsest level from scratch, then every finer level incrementally from the
/// projected positions. Returns the finest level.
pub fn multilevel_run(
    mut tower: Vec<GraphManager>,
    settings: &CoseSettings,
) -> Result<(GraphManager, LayoutStats)> {
    let levels = tower.len();
    let lengths = level_edge_lengths(settings, levels);
    let mut stats = LayoutStats {
        levels,
        rounds: 1,
        edge_length: settings.edge_length,
        repulsion_strength: settings.repulsion_strength,
        ..Default::default()
    };

    let Some(mut current) = tower.pop() else {
        return Ok((GraphManager::new(), stats));
    };
    let mut level = levels - 1;
    loop {
        let config = RunConfig {
            level,
            incremental: level + 1 != levels,
            edge_length: lengths[level],
        };
        let run = ForceSimulation::new(&mut current, settings, config).run()?;
        stats.iterations += run.iterations;
        stats.termination = run.state.into();
        tracing::debug!(
            level,
            nodes = current.nodes.len(),
            iterations = run.iterations,
            "multilevel level done"
        );

        let Some(mut finer) = tower.pop() else {
            return Ok((current, stats));
        };
        uncoarsen(&current, &mut finer, lengths[level], settings);
        current = finer;
        level -= 1;
    }
}
