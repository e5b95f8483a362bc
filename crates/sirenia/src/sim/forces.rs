//! Pairwise force kernels. All of them are pure: the engine decides which nodes receive the
//! returned vectors.

use crate::geometry::{Rect, intersect, nudge_coincident, separation_amount};
use crate::settings::CoseSettings;

/// Spring vector acting on the source end; the target receives its negation.
///
/// Returns `None` when the edge contributes nothing this iteration (overlapping ends are left to
/// repulsion). Also returns the measured length components `(length, lx, ly)`.
pub(crate) fn spring_force(
    source: &Rect,
    target: &Rect,
    ideal_length: f64,
    spring_strength: f64,
    center_to_center: bool,
) -> Option<((f64, f64), (f64, f64, f64))> {
    let (lx, ly) = if center_to_center {
        (
            target.center_x() - source.center_x(),
            target.center_y() - source.center_y(),
        )
    } else {
        let clip = intersect(source, target);
        if clip.overlapping {
            return None;
        }
        (clip.clip_b.0 - clip.clip_a.0, clip.clip_b.1 - clip.clip_a.1)
    };

    let mut length = (lx * lx + ly * ly).sqrt();
    if length == 0.0 {
        length = 0.1;
    }
    let dl = length - ideal_length;
    if dl == 0.0 {
        return Some(((0.0, 0.0), (length, lx, ly)));
    }
    let f = spring_strength * dl;
    Some(((f * lx / length, f * ly / length), (length, lx, ly)))
}

/// Knobs shared by every repulsion pair within one run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RepulsionParams {
    pub strength: f64,
    pub min_dist: f64,
    pub separation_buffer: f64,
}

/// Repulsion vector acting on `b`; `a` receives its negation.
///
/// `na`/`nb` are the leaf counts of the two nodes.
pub(crate) fn repulsion_force(
    a: &Rect,
    b: &Rect,
    na: f64,
    nb: f64,
    center_to_center: bool,
    p: RepulsionParams,
) -> (f64, f64) {
    let a = nudge_coincident(*a, b, CoseSettings::COINCIDENT_NUDGE);

    if let Some((sx, sy)) = separation_amount(&a, b, p.separation_buffer) {
        let c = (na * nb) / (na + nb);
        return (c * 2.0 * sx, c * 2.0 * sy);
    }

    let (mut dx, mut dy) = if center_to_center {
        (b.center_x() - a.center_x(), b.center_y() - a.center_y())
    } else {
        let clip = intersect(&a, b);
        (clip.clip_b.0 - clip.clip_a.0, clip.clip_b.1 - clip.clip_a.1)
    };
    if dx.abs() < p.min_dist {
        dx = p.min_dist.copysign(dx);
    }
    if dy.abs() < p.min_dist {
        dy = p.min_dist.copysign(dy);
    }

    let d2 = dx * dx + dy * dy;
    let d = d2.sqrt();
    let f = p.strength * na * nb / d2;
    (f * dx / d, f * dy / d)
}

/// Pull of a graph's center on one of its members, or nothing while the member is in range.
pub(crate) fn gravity_force(
    member: &Rect,
    graph_center: (f64, f64),
    range: f64,
    strength: f64,
) -> Option<(f64, f64)> {
    let dx = member.center_x() - graph_center.0;
    let dy = member.center_y() - graph_center.1;
    if dx.abs() + member.half_w() > range || dy.abs() + member.half_h() > range {
        Some((-strength * dx, -strength * dy))
    } else {
        None
    }
}
