//! Directional (arrow-key) navigation between rendered elements
//!
//! Picks the next element in a direction from a source box using the
//! projection rules below. The DOM-aware filtering (containment, per-direction
//! blocking classes, label substitution) lives in the runtime; this module only
//! sees boxes.

use super::geometry::{Direction, Rect};

/// Where a candidate sits relative to the source, measured for one direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Gap along the movement axis; negative when the candidate is behind
    pub directional: f64,
    /// Offset between anchor points on the cross axis
    pub perpendicular: f64,
    /// Offset from the exact source center on the cross axis (0 when aligned)
    pub center_perpendicular: f64,
}

impl Projection {
    pub fn distance_squared(&self) -> f64 {
        self.directional * self.directional + self.perpendicular * self.perpendicular
    }

    pub fn is_aligned(&self) -> bool {
        self.perpendicular == 0.0
    }
}

/// Anchor points on one axis for source span `a` and candidate span `b`.
///
/// Overlap with the source center line snaps both anchors to the center,
/// otherwise the nearest edges are used.
fn axis_anchors(a_lo: f64, a_hi: f64, a_center: f64, b_lo: f64, b_hi: f64) -> (f64, f64) {
    if b_lo <= a_center && b_hi >= a_center {
        (a_center, a_center)
    } else if b_lo >= a_lo && b_hi <= a_hi {
        (b_hi, b_hi)
    } else if a_lo <= b_hi && a_lo >= b_lo {
        (b_hi, b_hi)
    } else if a_hi >= b_lo && a_hi <= b_hi {
        (b_lo, b_lo)
    } else if b_hi < a_lo {
        (a_lo, b_hi)
    } else {
        (a_hi, b_lo)
    }
}

/// Project `candidate` onto the movement and cross axes of `direction`
pub fn project(source: &Rect, candidate: &Rect, direction: Direction) -> Projection {
    let (ax, mut bx) = axis_anchors(
        source.left(),
        source.right(),
        source.center_x(),
        candidate.left(),
        candidate.right(),
    );
    let (ay, mut by) = axis_anchors(
        source.top(),
        source.bottom(),
        source.center_y(),
        candidate.top(),
        candidate.bottom(),
    );

    let directional = match direction {
        Direction::Up => {
            by = candidate.bottom();
            ay - by
        }
        Direction::Down => {
            by = candidate.top();
            by - ay
        }
        Direction::Left => {
            bx = candidate.right();
            ax - bx
        }
        Direction::Right => {
            bx = candidate.left();
            bx - ax
        }
    };

    let (perpendicular, center_perpendicular) = if direction.is_vertical() {
        let perpendicular = (ax - bx).abs();
        let center = if perpendicular != 0.0 { (source.center_x() - bx).abs() } else { 0.0 };
        (perpendicular, center)
    } else {
        let perpendicular = (ay - by).abs();
        let center = if perpendicular != 0.0 { (source.center_y() - by).abs() } else { 0.0 };
        (perpendicular, center)
    };

    Projection {
        directional,
        perpendicular,
        center_perpendicular,
    }
}

/// Running best picks while scanning candidates
struct Best<T> {
    straight: Option<(T, f64)>,
    any: Option<(T, f64)>,
    furthest_straight: Option<(T, f64)>,
}

impl<T: Copy> Best<T> {
    fn new() -> Self {
        Self {
            straight: None,
            any: None,
            furthest_straight: None,
        }
    }

    fn consider(&mut self, item: T, projection: &Projection) {
        let distance = projection.distance_squared();

        if projection.directional < 0.0 {
            if projection.is_aligned()
                && self.furthest_straight.map_or(true, |(_, best)| distance > best)
            {
                self.furthest_straight = Some((item, distance));
            }
            return;
        }

        if projection.is_aligned() && self.straight.map_or(true, |(_, best)| distance < best) {
            self.straight = Some((item, distance));
        }

        if self.any.map_or(true, |(_, best)| distance < best) {
            self.any = Some((item, distance));
        }
    }

    fn pick(self) -> Option<T> {
        self.straight
            .or(self.any)
            .or(self.furthest_straight)
            .map(|(item, _)| item)
    }
}

/// Choose the next element from `source` in `direction`.
///
/// Candidates too far off-axis for their distance (cross-axis offset from the
/// source center, scaled by the source's height/width ratio, larger than the
/// directional gap) are dropped. Among the rest: the nearest aligned candidate
/// in front wins, then the nearest candidate in front, then the furthest
/// aligned candidate behind (wrap-around).
pub fn find_next<T, I>(source: Rect, candidates: I, direction: Direction) -> Option<T>
where
    T: Copy,
    I: IntoIterator<Item = (T, Rect)>,
{
    let ratio = source.height / source.width;
    let mut best = Best::new();

    for (item, rect) in candidates {
        let projection = project(&source, &rect, direction);
        if projection.center_perpendicular * ratio > projection.directional.abs() {
            continue;
        }
        best.consider(item, &projection);
    }

    best.pick()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Rect {
        Rect::new(x, y, w, h)
    }

    #[test]
    fn test_aligned_beats_off_axis() {
        let source = rect(0.0, 0.0, 10.0, 10.0);
        let candidates = vec![
            ('a', rect(0.0, 20.0, 10.0, 10.0)),
            ('b', rect(30.0, 15.0, 10.0, 10.0)),
        ];
        assert_eq!(find_next(source, candidates, Direction::Down), Some('a'));
    }

    #[test]
    fn test_corner_cutting_rejected() {
        let source = rect(0.0, 0.0, 10.0, 10.0);
        let candidates = vec![('b', rect(30.0, 15.0, 10.0, 10.0))];
        assert_eq!(find_next(source, candidates, Direction::Down), None);
    }

    #[test]
    fn test_nearest_straight_wins() {
        let source = rect(0.0, 0.0, 10.0, 10.0);
        let candidates = vec![
            ("far", rect(0.0, 60.0, 10.0, 10.0)),
            ("near", rect(0.0, 20.0, 10.0, 10.0)),
        ];
        assert_eq!(find_next(source, candidates, Direction::Down), Some("near"));
    }

    #[test]
    fn test_partial_overlap_counts_as_in_front() {
        // Overlaps the source horizontally but not its center line
        let source = rect(0.0, 0.0, 10.0, 10.0);
        let candidates = vec![('x', rect(7.0, 20.0, 10.0, 10.0))];
        assert_eq!(find_next(source, candidates, Direction::Down), Some('x'));
    }

    #[test]
    fn test_wraps_to_furthest_straight_behind() {
        let source = rect(0.0, 50.0, 10.0, 10.0);
        let candidates = vec![
            ("top", rect(0.0, 0.0, 10.0, 10.0)),
            ("mid", rect(0.0, 25.0, 10.0, 10.0)),
        ];
        assert_eq!(find_next(source, candidates, Direction::Down), Some("top"));
    }

    #[test]
    fn test_horizontal_navigation() {
        let source = rect(50.0, 0.0, 10.0, 10.0);
        let candidates = vec![
            ("left", rect(20.0, 0.0, 10.0, 10.0)),
            ("right", rect(80.0, 0.0, 10.0, 10.0)),
        ];
        assert_eq!(find_next(source, candidates.clone(), Direction::Left), Some("left"));
        assert_eq!(find_next(source, candidates, Direction::Right), Some("right"));
    }

    #[test]
    fn test_projection_down() {
        let source = rect(0.0, 0.0, 10.0, 10.0);
        let projection = project(&source, &rect(0.0, 20.0, 10.0, 10.0), Direction::Down);
        assert_eq!(projection.directional, 10.0);
        assert_eq!(projection.perpendicular, 0.0);
        assert!(projection.is_aligned());
    }

    #[test]
    fn test_empty_candidates() {
        let source = rect(0.0, 0.0, 10.0, 10.0);
        let none: Vec<(u8, Rect)> = Vec::new();
        assert_eq!(find_next(source, none, Direction::Up), None);
    }
}
