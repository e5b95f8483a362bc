use crate::coarsen;
use crate::error::Result;
use crate::graph::{LayoutGraph, LayoutResult, LayoutStats, Placement, Point, Size, Sublayout};
use crate::model::GraphManager;
use crate::settings::CoseSettings;
use crate::sim::{ForceSimulation, RunConfig};
use crate::sublayout::SublayoutRole;
use crate::tuning;
use std::collections::BTreeMap;

pub(crate) fn compute(
    graph: &LayoutGraph,
    sublayouts: &[Sublayout],
    settings: &CoseSettings,
) -> Result<LayoutResult> {
    let _span = tracing::debug_span!(
        "compute_layout",
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        sublayouts = sublayouts.len()
    )
    .entered();

    let mut settings = settings.validated();
    if settings.automatic_parameter_calculation || settings.iterative_parameter_calculation {
        settings = tuning::automatic_parameters(graph, sublayouts, &settings);
    }
    if settings.iterative_parameter_calculation {
        return tuning::iterate(graph, &settings, |s| layout_once(graph, sublayouts, s));
    }
    layout_once(graph, sublayouts, &settings)
}

fn layout_once(
    graph: &LayoutGraph,
    sublayouts: &[Sublayout],
    settings: &CoseSettings,
) -> Result<LayoutResult> {
    let gm = GraphManager::build(graph, sublayouts, settings)?;
    let (gm, stats) = simulate(gm, settings)?;
    Ok(LayoutResult {
        placements: placements(&gm),
        stats,
    })
}

fn simulate(mut gm: GraphManager, settings: &CoseSettings) -> Result<(GraphManager, LayoutStats)> {
    let skipped = LayoutStats {
        rounds: 1,
        edge_length: settings.edge_length,
        repulsion_strength: settings.repulsion_strength,
        ..Default::default()
    };

    // A root that is itself a rigid unit has nothing left to arrange.
    let frozen_root = gm.graphs[gm.root]
        .nodes
        .first()
        .is_some_and(|&r| gm.sublayouts.is_root(r));
    if gm.nodes.len() <= 1 || frozen_root {
        tracing::debug!(nodes = gm.nodes.len(), frozen_root, "simulation skipped");
        return Ok((gm, skipped));
    }

    if settings.use_multilevel_scaling {
        let tower = coarsen::build_tower(gm, settings);
        tracing::debug!(levels = tower.len(), "coarsening tower built");
        return coarsen::multilevel_run(tower, settings);
    }

    let config = RunConfig {
        level: 0,
        incremental: true,
        edge_length: settings.edge_length,
    };
    let run = ForceSimulation::new(&mut gm, settings, config).run()?;
    let stats = LayoutStats {
        levels: 1,
        iterations: run.iterations,
        termination: run.state.into(),
        ..skipped
    };
    Ok((gm, stats))
}

/// Centers and sizes of every input node, relative to the center of the root graph's box.
///
/// Members of a sublayout nested below the top node are placed unrotated; their unit's
/// arrangement already accounts for orientation.
fn placements(gm: &GraphManager) -> BTreeMap<String, Placement> {
    let (ox, oy) = gm.graphs[gm.root].center();
    let top = gm.graphs[gm.root].nodes.first().copied();
    let nested_member = |n: usize| match gm.sublayouts.role(n) {
        Some(SublayoutRole::Member(unit)) => Some(gm.sublayouts.units()[unit].root) != top,
        _ => false,
    };
    gm.nodes
        .iter()
        .enumerate()
        .filter_map(|(i, n)| {
            let key = n.key.clone()?;
            let (cx, cy) = n.center();
            let placement = Placement {
                position: Point {
                    x: cx - ox,
                    y: cy - oy,
                },
                size: Size {
                    width: n.rect.width,
                    height: n.rect.height,
                },
                rotation: if nested_member(i) { 0.0 } else { n.rotation },
            };
            Some((key, placement))
        })
        .collect()
}
