//! Axis-aligned rectangle math used by the force computations.
//!
//! Coordinates grow to the right and downwards: `top` is the smaller y value.

/// Axis-aligned box anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn from_center(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self::new(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    pub fn center_x(&self) -> f64 {
        self.left + self.width / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.top + self.height / 2.0
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn half_w(&self) -> f64 {
        self.width / 2.0
    }

    pub fn half_h(&self) -> f64 {
        self.height / 2.0
    }

    pub fn translated(self, dx: f64, dy: f64) -> Self {
        Self {
            left: self.left + dx,
            top: self.top + dy,
            ..self
        }
    }

    /// Strict overlap: boxes that only touch do not overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.left < other.right()
            && self.right() > other.left
            && self.top < other.bottom()
            && self.bottom() > other.top
    }

    pub fn overlap_area(&self, other: &Rect) -> f64 {
        let w = self.right().min(other.right()) - self.left.max(other.left);
        let h = self.bottom().min(other.bottom()) - self.top.max(other.top);
        if w > 0.0 && h > 0.0 { w * h } else { 0.0 }
    }
}

/// Result of [`intersect`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    pub overlapping: bool,
    /// Where the center-to-center line leaves `a` (its center when overlapping).
    pub clip_a: (f64, f64),
    /// Where the center-to-center line leaves `b` (its center when overlapping).
    pub clip_b: (f64, f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

impl Side {
    /// Clockwise neighbor.
    fn next(self) -> Self {
        match self {
            Side::Top => Side::Right,
            Side::Right => Side::Bottom,
            Side::Bottom => Side::Left,
            Side::Left => Side::Top,
        }
    }

    /// `line` if the diagonal is steeper than the center line, its clockwise neighbor otherwise.
    fn pick(diagonal_slope: f64, center_slope: f64, line: Side) -> Side {
        if diagonal_slope > center_slope {
            line
        } else {
            line.next()
        }
    }
}

fn clip_on_side(r: &Rect, side: Side, slope: f64) -> (f64, f64) {
    let (cx, cy) = (r.center_x(), r.center_y());
    match side {
        Side::Top => (cx - r.half_h() / slope, r.top),
        Side::Right => (r.right(), cy + r.half_w() * slope),
        Side::Bottom => (cx + r.half_h() / slope, r.bottom()),
        Side::Left => (r.left, cy - r.half_w() * slope),
    }
}

/// Clipping points of the line joining the two centers.
///
/// Overlapping boxes clip at their centers. Boxes with coincident centers that do not overlap
/// (zero-sized boxes) also report their centers.
pub fn intersect(a: &Rect, b: &Rect) -> Intersection {
    let (p1x, p1y) = (a.center_x(), a.center_y());
    let (p2x, p2y) = (b.center_x(), b.center_y());
    let centers = Intersection {
        overlapping: false,
        clip_a: (p1x, p1y),
        clip_b: (p2x, p2y),
    };

    if a.overlaps(b) {
        return Intersection {
            overlapping: true,
            ..centers
        };
    }

    if p1x == p2x {
        if p1y > p2y {
            return Intersection {
                clip_a: (p1x, a.top),
                clip_b: (p2x, b.bottom()),
                ..centers
            };
        }
        if p1y < p2y {
            return Intersection {
                clip_a: (p1x, a.bottom()),
                clip_b: (p2x, b.top),
                ..centers
            };
        }
        return centers;
    }
    if p1y == p2y {
        if p1x > p2x {
            return Intersection {
                clip_a: (a.left, p1y),
                clip_b: (b.right(), p2y),
                ..centers
            };
        }
        return Intersection {
            clip_a: (a.right(), p1y),
            clip_b: (b.left, p2y),
            ..centers
        };
    }

    let slope_a = a.height / a.width;
    let slope_b = b.height / b.width;
    let slope = (p2y - p1y) / (p2x - p1x);

    // Exact corner hits.
    let mut clip_a = None;
    if -slope_a == slope {
        clip_a = Some(if p1x > p2x {
            (a.left, a.bottom())
        } else {
            (a.right(), a.top)
        });
    } else if slope_a == slope {
        clip_a = Some(if p1x > p2x {
            (a.left, a.top)
        } else {
            (a.right(), a.bottom())
        });
    }
    let mut clip_b = None;
    if -slope_b == slope {
        clip_b = Some(if p2x > p1x {
            (b.left, b.bottom())
        } else {
            (b.right(), b.top)
        });
    } else if slope_b == slope {
        clip_b = Some(if p2x > p1x {
            (b.left, b.top)
        } else {
            (b.right(), b.bottom())
        });
    }

    let (side_a, side_b) = if p1x > p2x {
        if p1y > p2y {
            (
                Side::pick(slope_a, slope, Side::Left),
                Side::pick(slope_b, slope, Side::Right),
            )
        } else {
            (
                Side::pick(-slope_a, slope, Side::Bottom),
                Side::pick(-slope_b, slope, Side::Top),
            )
        }
    } else if p1y > p2y {
        (
            Side::pick(-slope_a, slope, Side::Top),
            Side::pick(-slope_b, slope, Side::Bottom),
        )
    } else {
        (
            Side::pick(slope_a, slope, Side::Right),
            Side::pick(slope_b, slope, Side::Left),
        )
    };

    Intersection {
        overlapping: false,
        clip_a: clip_a.unwrap_or_else(|| clip_on_side(a, side_a, slope)),
        clip_b: clip_b.unwrap_or_else(|| clip_on_side(b, side_b, slope)),
    }
}

/// Push-apart directions: `-1` on an axis where `a`'s center comes first, `1` otherwise.
fn separation_directions(a: &Rect, b: &Rect) -> (f64, f64) {
    let dir_x = if a.center_x() < b.center_x() {
        -1.0
    } else {
        1.0
    };
    let dir_y = if a.center_y() < b.center_y() {
        -1.0
    } else {
        1.0
    };
    (dir_x, dir_y)
}

/// Overlap of the intervals `a` and `b` on one axis.
///
/// When one interval contains the other, the distance from the inner one to the nearer end of
/// the outer one is added, so a push by the result clears the containment too.
fn axis_overlap(a: (f64, f64), b: (f64, f64)) -> f64 {
    let raw = a.1.min(b.1) - a.0.max(b.0);
    let (outer, inner) = if a.0 <= b.0 && a.1 >= b.1 {
        (a, b)
    } else if b.0 <= a.0 && b.1 >= a.1 {
        (b, a)
    } else {
        return raw;
    };
    raw + (inner.0 - outer.0).min(outer.1 - inner.1)
}

/// Half of the translation that separates two overlapping boxes, plus `buffer` per axis.
///
/// The push follows the line between the centers: whichever axis clears with the shorter push
/// takes its full overlap, the other axis the proportional share. Moving `a` by `-amount` and
/// `b` by `+amount` resolves the overlap. Returns `None` when the boxes do not overlap.
pub fn separation_amount(a: &Rect, b: &Rect, buffer: f64) -> Option<(f64, f64)> {
    if !a.overlaps(b) {
        return None;
    }

    let (dir_x, dir_y) = separation_directions(a, b);
    let overlap_x = axis_overlap((a.left, a.right()), (b.left, b.right()));
    let overlap_y = axis_overlap((a.top, a.bottom()), (b.top, b.bottom()));

    let dx = b.center_x() - a.center_x();
    let dy = b.center_y() - a.center_y();
    let slope = if dx == 0.0 && dy == 0.0 {
        1.0
    } else {
        (dy / dx).abs()
    };
    let (push_x, push_y) = if overlap_x < overlap_y / slope {
        (overlap_x, slope * overlap_x)
    } else {
        (overlap_y / slope, overlap_y)
    };

    Some((
        -dir_x * (push_x / 2.0 + buffer),
        -dir_y * (push_y / 2.0 + buffer),
    ))
}

/// Nudges `a` off `b` when their centers coincide exactly, so that a direction exists.
pub fn nudge_coincident(a: Rect, b: &Rect, epsilon: f64) -> Rect {
    if a.center_x() == b.center_x() && a.center_y() == b.center_y() {
        a.translated(0.0, epsilon)
    } else {
        a
    }
}

/// Segment intersection test with a tolerance, used for crossing counts.
pub fn segments_intersect(
    p1: (f64, f64),
    p2: (f64, f64),
    q1: (f64, f64),
    q2: (f64, f64),
    epsilon: f64,
) -> bool {
    let cross = |o: (f64, f64), a: (f64, f64), b: (f64, f64)| {
        (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
    };
    let d1 = cross(q1, q2, p1);
    let d2 = cross(q1, q2, p2);
    let d3 = cross(p1, p2, q1);
    let d4 = cross(p1, p2, q2);
    ((d1 > epsilon && d2 < -epsilon) || (d1 < -epsilon && d2 > epsilon))
        && ((d3 > epsilon && d4 < -epsilon) || (d3 < -epsilon && d4 > epsilon))
}

#[cfg(test)]
mod tests {
    use super::{
        Rect, axis_overlap, intersect, nudge_coincident, segments_intersect, separation_amount,
    };

    fn approx(a: (f64, f64), b: (f64, f64)) -> bool {
        (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9
    }

    #[test]
    fn overlapping_boxes_clip_at_centers() {
        let a = Rect::from_center(0.0, 0.0, 10.0, 10.0);
        let b = Rect::from_center(4.0, 3.0, 10.0, 10.0);
        let i = intersect(&a, &b);
        assert!(i.overlapping);
        assert_eq!(i.clip_a, (0.0, 0.0));
        assert_eq!(i.clip_b, (4.0, 3.0));
    }

    #[test]
    fn horizontal_and_vertical_lines_clip_on_facing_sides() {
        let a = Rect::from_center(0.0, 0.0, 10.0, 20.0);
        let b = Rect::from_center(50.0, 0.0, 4.0, 4.0);
        let i = intersect(&a, &b);
        assert!(!i.overlapping);
        assert_eq!(i.clip_a, (5.0, 0.0));
        assert_eq!(i.clip_b, (48.0, 0.0));

        let b = Rect::from_center(0.0, -50.0, 4.0, 4.0);
        let i = intersect(&a, &b);
        assert_eq!(i.clip_a, (0.0, -10.0));
        assert_eq!(i.clip_b, (0.0, -48.0));
    }

    #[test]
    fn diagonal_through_corners() {
        // Center slope 1 equals both diagonals' slope.
        let a = Rect::from_center(0.0, 0.0, 10.0, 10.0);
        let b = Rect::from_center(40.0, 40.0, 20.0, 20.0);
        let i = intersect(&a, &b);
        assert!(approx(i.clip_a, (5.0, 5.0)), "clip_a: {:?}", i.clip_a);
        assert!(approx(i.clip_b, (30.0, 30.0)), "clip_b: {:?}", i.clip_b);
    }

    #[test]
    fn shallow_and_steep_lines_clip_on_the_right_sides() {
        let a = Rect::from_center(0.0, 0.0, 10.0, 10.0);
        // Shallow: leaves a through its right side, enters b through its left side.
        let b = Rect::from_center(40.0, 10.0, 10.0, 10.0);
        let i = intersect(&a, &b);
        assert!(approx(i.clip_a, (5.0, 1.25)), "clip_a: {:?}", i.clip_a);
        assert!(approx(i.clip_b, (35.0, 8.75)), "clip_b: {:?}", i.clip_b);

        // Steep, b above-left of a: leaves a through its top side.
        let b = Rect::from_center(-10.0, -40.0, 10.0, 10.0);
        let i = intersect(&a, &b);
        assert!(approx(i.clip_a, (-1.25, -5.0)), "clip_a: {:?}", i.clip_a);
        assert!(approx(i.clip_b, (-8.75, -35.0)), "clip_b: {:?}", i.clip_b);
    }

    #[test]
    fn co_located_boxes_separate_after_one_pass() {
        let a = Rect::from_center(0.0, 0.0, 10.0, 10.0);
        let b = Rect::from_center(0.0, 0.0, 10.0, 10.0);
        let a = nudge_coincident(a, &b, 0.001);
        let (dx, dy) = separation_amount(&a, &b, 1.0).expect("boxes overlap");
        let a2 = a.translated(-dx, -dy);
        let b2 = b.translated(dx, dy);
        assert!(!a2.overlaps(&b2), "a: {a2:?}, b: {b2:?}");
        assert_eq!(a2.overlap_area(&b2), 0.0);
    }

    #[test]
    fn containment_is_fully_resolved() {
        let outer = Rect::new(0.0, 0.0, 10.0, 10.0);
        let inner = Rect::new(4.0, 3.0, 2.0, 2.0);
        let (dx, dy) = separation_amount(&inner, &outer, 0.5).expect("boxes overlap");
        let a2 = inner.translated(-dx, -dy);
        let b2 = outer.translated(dx, dy);
        assert_eq!(a2.overlap_area(&b2), 0.0, "a: {a2:?}, b: {b2:?}");
    }

    #[test]
    fn axis_overlap_covers_containment() {
        assert_eq!(axis_overlap((0.0, 10.0), (6.0, 14.0)), 4.0);
        // Inner interval is 2 away from the outer left end, 5 from its right end.
        assert_eq!(axis_overlap((0.0, 10.0), (2.0, 5.0)), 5.0);
        assert_eq!(axis_overlap((2.0, 5.0), (0.0, 10.0)), 5.0);
    }

    #[test]
    fn pushes_along_the_center_line() {
        // Centers share a row: only x moves.
        let a = Rect::from_center(0.0, 0.0, 10.0, 10.0);
        let b = Rect::from_center(6.0, 0.0, 10.0, 10.0);
        let (dx, dy) = separation_amount(&a, &b, 0.0).expect("boxes overlap");
        assert_eq!((dx, dy), (2.0, 0.0));
    }

    #[test]
    fn separation_of_disjoint_boxes_is_none() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 10.0, 10.0);
        assert!(separation_amount(&a, &b, 0.0).is_none());
    }

    #[test]
    fn crossing_segments() {
        assert!(segments_intersect(
            (0.0, 0.0),
            (10.0, 10.0),
            (0.0, 10.0),
            (10.0, 0.0),
            1e-5
        ));
        // Shared endpoint does not count.
        assert!(!segments_intersect(
            (0.0, 0.0),
            (10.0, 10.0),
            (10.0, 10.0),
            (20.0, 0.0),
            1e-5
        ));
    }
}
