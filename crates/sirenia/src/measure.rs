//! Quality figures for a finished layout: overlaps, crossings, extent and edge lengths.

use crate::geometry::{Rect, segments_intersect};
use crate::graph::{LayoutGraph, LayoutResult, Placement};
use rustc_hash::FxHashMap;
use serde::Serialize;

const CROSSING_EPSILON: f64 = 1e-5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeLengthStats {
    pub min: f64,
    pub max: f64,
    pub total: f64,
    pub mean: f64,
    pub variance: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurements {
    /// Pairs of overlapping nodes where neither contains the other in the hierarchy.
    pub overlapping_nodes: usize,
    /// Pairs of straight center-to-center edges that cross.
    pub edge_crossings: usize,
    pub width: f64,
    pub height: f64,
    pub area: f64,
    pub edge_lengths: EdgeLengthStats,
}

impl Measurements {
    pub fn of(graph: &LayoutGraph, result: &LayoutResult) -> Self {
        let placements = &result.placements;
        let (width, height) = extent(placements.values());
        Self {
            overlapping_nodes: overlapping_nodes(graph, result),
            edge_crossings: edge_crossings(graph, result),
            width,
            height,
            area: width * height,
            edge_lengths: edge_lengths(graph, result),
        }
    }
}

fn rect_of(p: &Placement) -> Rect {
    Rect::from_center(p.position.x, p.position.y, p.size.width, p.size.height)
}

fn extent<'a>(placements: impl Iterator<Item = &'a Placement>) -> (f64, f64) {
    let mut left = f64::INFINITY;
    let mut top = f64::INFINITY;
    let mut right = f64::NEG_INFINITY;
    let mut bottom = f64::NEG_INFINITY;
    for p in placements {
        let r = rect_of(p);
        left = left.min(r.left);
        top = top.min(r.top);
        right = right.max(r.right());
        bottom = bottom.max(r.bottom());
    }
    if left > right {
        return (0.0, 0.0);
    }
    (right - left, bottom - top)
}

fn is_nested(parents: &FxHashMap<&str, &str>, a: &str, b: &str) -> bool {
    let encloses = |outer: &str, inner: &str| {
        let mut cur = inner;
        while let Some(&p) = parents.get(cur) {
            if p == outer {
                return true;
            }
            cur = p;
        }
        false
    };
    encloses(a, b) || encloses(b, a)
}

pub fn overlapping_nodes(graph: &LayoutGraph, result: &LayoutResult) -> usize {
    let parents: FxHashMap<&str, &str> = graph
        .nodes
        .iter()
        .filter_map(|n| n.parent.as_deref().map(|p| (n.id.as_str(), p)))
        .collect();
    let boxes: Vec<(&str, Rect)> = result
        .placements
        .iter()
        .map(|(id, p)| (id.as_str(), rect_of(p)))
        .collect();

    let mut count = 0;
    for (i, (a, ra)) in boxes.iter().enumerate() {
        for (b, rb) in &boxes[i + 1..] {
            if ra.overlaps(rb) && !is_nested(&parents, a, b) {
                count += 1;
            }
        }
    }
    count
}

fn edge_segments(graph: &LayoutGraph, result: &LayoutResult) -> Vec<((f64, f64), (f64, f64))> {
    let center = |id: &str| {
        result
            .placements
            .get(id)
            .map(|p| (p.position.x, p.position.y))
    };
    graph
        .edges
        .iter()
        .filter_map(|e| Some((center(&e.source)?, center(&e.target)?)))
        .collect()
}

pub fn edge_crossings(graph: &LayoutGraph, result: &LayoutResult) -> usize {
    let segments = edge_segments(graph, result);
    let mut count = 0;
    for (i, &(p1, p2)) in segments.iter().enumerate() {
        for &(q1, q2) in &segments[i + 1..] {
            if segments_intersect(p1, p2, q1, q2, CROSSING_EPSILON) {
                count += 1;
            }
        }
    }
    count
}

pub fn edge_lengths(graph: &LayoutGraph, result: &LayoutResult) -> EdgeLengthStats {
    let lengths: Vec<f64> = edge_segments(graph, result)
        .into_iter()
        .map(|(a, b)| ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt())
        .collect();
    if lengths.is_empty() {
        return EdgeLengthStats::default();
    }
    let total: f64 = lengths.iter().sum();
    let mean = total / lengths.len() as f64;
    let variance = lengths.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / lengths.len() as f64;
    EdgeLengthStats {
        min: lengths.iter().copied().fold(f64::INFINITY, f64::min),
        max: lengths.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        total,
        mean,
        variance,
        std_dev: variance.sqrt(),
    }
}
