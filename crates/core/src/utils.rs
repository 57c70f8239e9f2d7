//! Geometry routines shared by the locator and the planner.
//!
//! Provides:
//! - Geometric types (Point, Rect, Matrix) in page points, origin top-left
//! - Rectangle algebra (union, overlap, inflation, containment)
//! - Rotation matrices for rotated note outlines
//! - Plane spatial index structure for overlap queries

use geo_index::rtree::sort::HilbertSort;
use geo_index::rtree::{RTree as GeoRTree, RTreeBuilder, RTreeIndex};
use rstar::{AABB, RTree, RTreeObject};

/// Small epsilon for floating-point comparisons.
pub const EPSILON: f64 = 1e-9;

/// A 2D point (x, y).
pub type Point = (f64, f64);

/// A rectangle defined by (x0, y0, x1, y1) where (x0, y0) is the top-left
/// corner and (x1, y1) the bottom-right one.
pub type Rect = (f64, f64, f64, f64);

/// A 6-element affine transformation matrix (a, b, c, d, e, f).
/// Transforms point (x, y) to (ax + cy + e, bx + dy + f).
pub type Matrix = (f64, f64, f64, f64, f64, f64);

/// Compares two floats for approximate equality.
#[inline]
pub fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

/// Applies a matrix to a point.
pub fn apply_matrix_pt(m: Matrix, v: Point) -> Point {
    let (a, b, c, d, e, f) = m;
    let (x, y) = v;
    (a * x + c * y + e, b * x + d * y + f)
}

/// Rotation by `degrees` about `center`.
///
/// Positive angles turn clockwise on screen because the y axis points down.
pub fn rotation_about(center: Point, degrees: f64) -> Matrix {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let (cx, cy) = center;
    (
        cos,
        sin,
        -sin,
        cos,
        cx - cos * cx + sin * cy,
        cy - sin * cx - cos * cy,
    )
}

/// Corners of `rect` rotated by `degrees` about its center, clockwise from
/// the top-left corner.
pub fn rotated_corners(rect: Rect, degrees: f64) -> [Point; 4] {
    let (x0, y0, x1, y1) = rect;
    let corners = [(x0, y0), (x1, y0), (x1, y1), (x0, y1)];
    if approx_eq(degrees.rem_euclid(360.0), 0.0, EPSILON) {
        return corners;
    }
    let m = rotation_about(rect_center(rect), degrees);
    corners.map(|pt| apply_matrix_pt(m, pt))
}

/// Trait for objects that have a bounding box.
pub trait HasBBox {
    fn x0(&self) -> f64;
    fn y0(&self) -> f64;
    fn x1(&self) -> f64;
    fn y1(&self) -> f64;

    fn bbox(&self) -> Rect {
        (self.x0(), self.y0(), self.x1(), self.y1())
    }

    fn width(&self) -> f64 {
        self.x1() - self.x0()
    }

    fn height(&self) -> f64 {
        self.y1() - self.y0()
    }
}

impl HasBBox for Rect {
    fn x0(&self) -> f64 {
        self.0
    }
    fn y0(&self) -> f64 {
        self.1
    }
    fn x1(&self) -> f64 {
        self.2
    }
    fn y1(&self) -> f64 {
        self.3
    }
}

#[inline]
pub fn rect_width(r: Rect) -> f64 {
    r.2 - r.0
}

#[inline]
pub fn rect_height(r: Rect) -> f64 {
    r.3 - r.1
}

#[inline]
pub fn rect_area(r: Rect) -> f64 {
    rect_width(r).max(0.0) * rect_height(r).max(0.0)
}

#[inline]
pub fn rect_center(r: Rect) -> Point {
    ((r.0 + r.2) / 2.0, (r.1 + r.3) / 2.0)
}

/// Smallest rectangle covering both inputs.
pub fn union_rect(a: Rect, b: Rect) -> Rect {
    (a.0.min(b.0), a.1.min(b.1), a.2.max(b.2), a.3.max(b.3))
}

/// Strict overlap test: rectangles that only share an edge do not overlap.
#[inline]
pub fn rects_overlap(a: Rect, b: Rect) -> bool {
    !(a.2 <= b.0 || b.2 <= a.0 || a.3 <= b.1 || b.3 <= a.1)
}

/// Area of the intersection of two rectangles (0.0 when disjoint).
pub fn intersection_area(a: Rect, b: Rect) -> f64 {
    if !rects_overlap(a, b) {
        return 0.0;
    }
    let w = a.2.min(b.2) - a.0.max(b.0);
    let h = a.3.min(b.3) - a.1.max(b.1);
    w * h
}

/// Grows a rectangle by `pad` on every side.
#[inline]
pub fn inflate(r: Rect, pad: f64) -> Rect {
    (r.0 - pad, r.1 - pad, r.2 + pad, r.3 + pad)
}

/// True if `outer` fully contains `inner` (within EPSILON).
pub fn contains_rect(outer: Rect, inner: Rect) -> bool {
    inner.0 >= outer.0 - EPSILON
        && inner.1 >= outer.1 - EPSILON
        && inner.2 <= outer.2 + EPSILON
        && inner.3 <= outer.3 + EPSILON
}

/// Closest point of `rect` to `pt` (the point itself when inside).
///
/// An inverted rect collapses onto its far edge instead of panicking.
pub fn clamp_to_rect(pt: Point, rect: Rect) -> Point {
    (pt.0.max(rect.0).min(rect.2), pt.1.max(rect.1).min(rect.3))
}

/// Closest point to `pt` on the segment `a`-`b`.
pub fn closest_on_segment(pt: Point, a: Point, b: Point) -> Point {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len2 = dx * dx + dy * dy;
    if len2 <= EPSILON {
        return a;
    }
    let t = (((pt.0 - a.0) * dx + (pt.1 - a.1) * dy) / len2).clamp(0.0, 1.0);
    (a.0 + t * dx, a.1 + t * dy)
}

#[inline]
pub fn distance_2(a: Point, b: Point) -> f64 {
    (a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)
}

/// Union bounding box of a set of rectangles, `None` when empty.
pub fn bound_rects<'a, I: IntoIterator<Item = &'a Rect>>(rects: I) -> Option<Rect> {
    rects.into_iter().copied().reduce(union_rect)
}

/// Rounds to 0.01pt, the precision of every coordinate that feeds a hash.
#[inline]
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[derive(Clone)]
struct PlaneNode {
    id: usize,
    bbox: Rect,
}

impl PartialEq for PlaneNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl RTreeObject for PlaneNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.bbox.0, self.bbox.1], [self.bbox.2, self.bbox.3])
    }
}

/// A set-like data structure for objects placed on a plane.
///
/// Uses a static geo-index R-tree for the initial bulk-loaded items (body
/// text obstacles) and a dynamic rstar R-tree for incremental inserts
/// (notes as they get placed). Items are stored in insertion order and ids
/// are stable (id == seq index).
pub struct Plane<T> {
    /// Items in insertion order (id == index)
    seq: Vec<T>,
    /// Cached bbox per item
    bboxes: Vec<Rect>,
    /// Static spatial index for bulk-loaded items
    static_tree: Option<GeoRTree<f64>>,
    /// Count of items in the static tree (ids 0..static_count)
    static_count: usize,
    /// Dynamic spatial index (id + bbox only)
    dynamic_tree: RTree<PlaneNode>,
}

impl<T: HasBBox> Default for Plane<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: HasBBox> Plane<T> {
    pub fn new() -> Self {
        Self {
            seq: Vec::new(),
            bboxes: Vec::new(),
            static_tree: None,
            static_count: 0,
            dynamic_tree: RTree::new(),
        }
    }

    /// Adds multiple objects to the plane and builds the R-tree index.
    pub fn extend(&mut self, objs: impl IntoIterator<Item = T>) {
        let items: Vec<T> = objs.into_iter().collect();
        if items.is_empty() {
            return;
        }

        let start_idx = self.seq.len();
        self.seq.reserve(items.len());
        self.bboxes.reserve(items.len());

        let mut nodes = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            let id = start_idx + i;
            let bbox = item.bbox();
            self.seq.push(item);
            self.bboxes.push(bbox);
            nodes.push((id, bbox));
        }

        // Build static tree only if this is the initial bulk load.
        if start_idx == 0 && self.static_tree.is_none() && self.dynamic_tree.size() == 0 {
            let mut builder: RTreeBuilder<f64> = RTreeBuilder::new(nodes.len() as u32);
            for (_id, bbox) in &nodes {
                builder.add(bbox.0, bbox.1, bbox.2, bbox.3);
            }
            self.static_tree = Some(builder.finish::<HilbertSort>());
            self.static_count = nodes.len();
        } else {
            for (id, bbox) in nodes {
                self.dynamic_tree.insert(PlaneNode { id, bbox });
            }
        }
    }

    /// Adds an object to the plane (indexed immediately).
    pub fn add(&mut self, obj: T) {
        let id = self.seq.len();
        let bbox = obj.bbox();
        self.seq.push(obj);
        self.bboxes.push(bbox);
        self.dynamic_tree.insert(PlaneNode { id, bbox });
    }

    /// Finds objects that strictly overlap the given bounding box, in id order.
    pub fn find(&self, bbox: Rect) -> Vec<&T> {
        self.find_with_indices(bbox)
            .into_iter()
            .map(|(_, obj)| obj)
            .collect()
    }

    /// Finds objects that strictly overlap the given bounding box, returning
    /// (index, object) pairs sorted by index.
    pub fn find_with_indices(&self, bbox: Rect) -> Vec<(usize, &T)> {
        let (x0, y0, x1, y1) = bbox;
        let mut result = Vec::with_capacity(16);
        let env = AABB::from_corners([x0, y0], [x1, y1]);

        if let Some(tree) = &self.static_tree {
            for id in tree.search(x0, y0, x1, y1) {
                let id = id as usize;
                if id >= self.static_count {
                    continue;
                }
                if rects_overlap(self.bboxes[id], bbox) {
                    result.push((id, &self.seq[id]));
                }
            }
        }

        for node in self.dynamic_tree.locate_in_envelope_intersecting(&env) {
            if rects_overlap(self.bboxes[node.id], bbox) {
                result.push((node.id, &self.seq[node.id]));
            }
        }

        // Tree traversal order is unspecified; ids keep results deterministic.
        result.sort_by_key(|(id, _)| *id);
        result
    }

    /// True if any object strictly overlaps the given bounding box.
    pub fn any_overlap(&self, bbox: Rect) -> bool {
        !self.find_with_indices(bbox).is_empty()
    }

    /// Returns the number of objects in the plane.
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    /// Returns true if the plane is empty.
    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// Returns an iterator over all objects in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.seq.iter()
    }
}
