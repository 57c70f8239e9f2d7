//! Leader Geometry: the polyline from an anchor to its note.

use crate::utils::{
    EPSILON, Point, Rect, approx_eq, clamp_to_rect, closest_on_segment, distance_2,
    rect_center, rotated_corners,
};

/// Vertical offset above which the leader gets an elbow.
pub const LEADER_ELBOW_MIN_DY: f64 = 4.0;

/// Closest point of the note outline to `pt`.
fn closest_on_outline(pt: Point, note_rect: Rect, rotation: f64) -> Point {
    let corners = rotated_corners(note_rect, rotation);
    (0..4)
        .map(|i| closest_on_segment(pt, corners[i], corners[(i + 1) % 4]))
        .min_by(|a, b| distance_2(pt, *a).total_cmp(&distance_2(pt, *b)))
        .unwrap_or(corners[0])
}

/// Computes the leader polyline from the anchor to the note box.
///
/// Returns an empty polyline when `draw` is false. With a non-zero
/// `rotation` (degrees, clockwise) the note endpoint lies on the rotated
/// outline rather than the axis-aligned box.
pub fn leader(anchor_rect: Rect, note_rect: Rect, rotation: f64, draw: bool) -> Vec<Point> {
    if !draw {
        return Vec::new();
    }
    let from = clamp_to_rect(rect_center(note_rect), anchor_rect);
    let to = closest_on_outline(from, note_rect, rotation);

    let beside = note_rect.2 <= anchor_rect.0 + EPSILON || note_rect.0 >= anchor_rect.2 - EPSILON;
    let dy = to.1 - from.1;
    let upright = approx_eq(rotation.rem_euclid(360.0), 0.0, EPSILON);
    if beside && upright && dy.abs() > LEADER_ELBOW_MIN_DY {
        // leave the anchor horizontally, then run straight to the note edge
        let elbow_x = from.0 + (to.0 - from.0) / 2.0;
        return vec![from, (elbow_x, from.1), (elbow_x, to.1), to];
    }
    vec![from, to]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_leader_is_empty() {
        assert!(leader((0.0, 0.0, 1.0, 1.0), (5.0, 0.0, 6.0, 1.0), 0.0, false).is_empty());
    }

    #[test]
    fn straight_leader_between_facing_edges() {
        let pts = leader((100.0, 100.0, 200.0, 110.0), (10.0, 95.0, 80.0, 115.0), 0.0, true);
        assert_eq!(pts, vec![(100.0, 105.0), (80.0, 105.0)]);
    }

    #[test]
    fn elbow_when_vertically_offset() {
        let pts = leader((100.0, 100.0, 200.0, 110.0), (10.0, 140.0, 80.0, 160.0), 0.0, true);
        assert_eq!(pts.len(), 4);
        assert_eq!(pts[0], (100.0, 110.0));
        assert_eq!(pts[1].1, pts[0].1);
        assert_eq!(pts[3], (80.0, 140.0));
    }

    #[test]
    fn rotated_note_uses_rotated_corner() {
        // a square rotated 45 degrees presents a corner to the anchor
        let note = (0.0, 0.0, 20.0, 20.0);
        let anchor = (40.0, 5.0, 60.0, 15.0);
        let pts = leader(anchor, note, 45.0, true);
        let end = *pts.last().unwrap();
        let half_diag = (200.0f64).sqrt();
        assert!((end.0 - (10.0 + half_diag)).abs() < 1e-6);
        assert!((end.1 - 10.0).abs() < 1e-6);
    }
}
