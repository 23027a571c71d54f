//! Spatial hit-testing and boundary intersection.
//!
//! Every entity and edge exposes a [`CollisionBox`]: an ordered list of
//! primitive [`CollisionShape`]s tested as a union. The box answers the
//! three geometric questions the editor asks:
//!
//! - [`CollisionBox::contains_point`] - mouse hit-testing
//! - [`CollisionBox::hit_by_rect`] - rectangle selection under the
//!   [`SelectionPolicy::Intersect`] / [`SelectionPolicy::Contain`] policies
//! - [`CollisionBox::intersection_with_line`] - clipping a rendered edge
//!   endpoint to the border of its connected entity's box instead of the
//!   geometric center
//!
//! Edge boxes are routing-mode dependent ([`EdgeRouting`]) and drag-state
//! dependent: an edge being interactively shifted becomes a two-segment
//! polyline through the drag midpoint, and a self-loop degrades to a circle
//! sized from the entity's own box.

use serde::Deserialize;

use crate::{
    geometry::{Bounds, Point, Size},
    model::{Entity, EntityKind},
};

/// Distance within which a thin shape (segment, curve border) counts as hit.
const HIT_TOLERANCE: f32 = 4.0;

/// Number of line segments a symmetric curve is flattened into for tests.
const CURVE_FLATTEN_STEPS: usize = 16;

/// Extra radius added to a self-loop circle beyond the entity's half-extent.
const SELF_LOOP_MARGIN: f32 = 12.0;

/// How edges are routed between entity borders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeRouting {
    /// A single straight segment.
    #[default]
    Straight,
    /// A symmetric cubic curve along the entities' boundary normals.
    Bezier,
    /// An orthogonal polyline with a horizontal run at mid-height.
    Vertical,
}

/// Rectangle-selection semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Any overlap selects.
    Intersect,
    /// Only full containment selects.
    Contain,
}

/// A single hit-testable primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum CollisionShape {
    Rectangle(Bounds),
    Circle {
        center: Point,
        radius: f32,
    },
    Segment {
        start: Point,
        end: Point,
    },
    /// A symmetric cubic curve used for bezier-routed edges.
    SymmetricCurve {
        start: Point,
        control_start: Point,
        control_end: Point,
        end: Point,
    },
}

impl CollisionShape {
    /// Returns true if the point hits this shape. Thin shapes use a small
    /// tolerance band so they stay clickable.
    pub fn contains_point(&self, p: Point) -> bool {
        match self {
            CollisionShape::Rectangle(bounds) => bounds.contains_point(p),
            CollisionShape::Circle { center, radius } => center.distance_to(p) <= *radius,
            CollisionShape::Segment { start, end } => {
                point_segment_distance(p, *start, *end) <= HIT_TOLERANCE
            }
            CollisionShape::SymmetricCurve { .. } => self
                .flattened()
                .windows(2)
                .any(|pair| point_segment_distance(p, pair[0], pair[1]) <= HIT_TOLERANCE),
        }
    }

    /// Tight axis-aligned bounds of this shape.
    ///
    /// For curves this is the bounds of the control polygon, which always
    /// contains the curve itself.
    pub fn bounding(&self) -> Bounds {
        match self {
            CollisionShape::Rectangle(bounds) => *bounds,
            CollisionShape::Circle { center, radius } => {
                Bounds::new_from_center(*center, Size::new(radius * 2.0, radius * 2.0))
            }
            CollisionShape::Segment { start, end } => segment_bounds(*start, *end),
            CollisionShape::SymmetricCurve {
                start,
                control_start,
                control_end,
                end,
            } => segment_bounds(*start, *end)
                .merge(&segment_bounds(*control_start, *control_end)),
        }
    }

    /// Returns true if this shape overlaps the given rectangle.
    pub fn intersects_rect(&self, rect: Bounds) -> bool {
        match self {
            CollisionShape::Rectangle(bounds) => bounds.intersects(rect),
            CollisionShape::Circle { center, radius } => {
                // Distance from the center to the closest point of the rect.
                let closest = Point::new(
                    center.x().clamp(rect.min_x(), rect.max_x()),
                    center.y().clamp(rect.min_y(), rect.max_y()),
                );
                center.distance_to(closest) <= *radius
            }
            CollisionShape::Segment { start, end } => segment_intersects_rect(*start, *end, rect),
            CollisionShape::SymmetricCurve { .. } => self
                .flattened()
                .windows(2)
                .any(|pair| segment_intersects_rect(pair[0], pair[1], rect)),
        }
    }

    fn flattened(&self) -> Vec<Point> {
        match self {
            CollisionShape::SymmetricCurve {
                start,
                control_start,
                control_end,
                end,
            } => (0..=CURVE_FLATTEN_STEPS)
                .map(|step| {
                    let t = step as f32 / CURVE_FLATTEN_STEPS as f32;
                    cubic_point(t, *start, *control_start, *control_end, *end)
                })
                .collect(),
            CollisionShape::Segment { start, end } => vec![*start, *end],
            _ => Vec::new(),
        }
    }
}

/// The hit-testable geometry of one entity or edge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionBox {
    shapes: Vec<CollisionShape>,
}

impl CollisionBox {
    pub fn new(shapes: Vec<CollisionShape>) -> Self {
        Self { shapes }
    }

    pub fn from_bounds(bounds: Bounds) -> Self {
        Self {
            shapes: vec![CollisionShape::Rectangle(bounds)],
        }
    }

    pub fn shapes(&self) -> &[CollisionShape] {
        &self.shapes
    }

    /// Returns true if any constituent shape contains the point.
    pub fn contains_point(&self, p: Point) -> bool {
        self.shapes.iter().any(|shape| shape.contains_point(p))
    }

    /// Tight axis-aligned bounds over all constituent shapes.
    pub fn bounding_rectangle(&self) -> Bounds {
        let mut shapes = self.shapes.iter();
        let Some(first) = shapes.next() else {
            return Bounds::default();
        };
        shapes.fold(first.bounding(), |acc, shape| acc.merge(&shape.bounding()))
    }

    /// Rectangle-selection test under the given policy.
    pub fn hit_by_rect(&self, rect: Bounds, policy: SelectionPolicy) -> bool {
        match policy {
            SelectionPolicy::Intersect => {
                self.shapes.iter().any(|shape| shape.intersects_rect(rect))
            }
            SelectionPolicy::Contain => {
                !self.shapes.is_empty() && rect.contains_bounds(self.bounding_rectangle())
            }
        }
    }

    /// Finds the point where the ray `from -> to` leaves this box.
    ///
    /// Used to clip an edge's rendered endpoint to the border of its
    /// connected entity's box. Falls back to `to` when the ray does not
    /// cross a border (degenerate shapes, coincident points).
    pub fn intersection_with_line(&self, from: Point, to: Point) -> Point {
        for shape in &self.shapes {
            match shape {
                CollisionShape::Rectangle(bounds) => {
                    if let Some(hit) = ray_rectangle_intersection(from, to, *bounds) {
                        return hit;
                    }
                }
                CollisionShape::Circle { center, radius } => {
                    if let Some(direction) = to.sub_point(*center).normalized() {
                        return center.add_point(direction.scale(*radius));
                    }
                }
                CollisionShape::Segment { .. } | CollisionShape::SymmetricCurve { .. } => {}
            }
        }
        to
    }
}

/// Builds the collision box for one entity from its location and size.
pub fn entity_collision_box(entity: &Entity) -> CollisionBox {
    match &entity.kind {
        EntityKind::ConnectPoint => CollisionBox::new(vec![CollisionShape::Circle {
            center: entity.location,
            radius: HIT_TOLERANCE,
        }]),
        EntityKind::PenStroke { points, .. } => CollisionBox::new(
            points
                .windows(2)
                .map(|pair| CollisionShape::Segment {
                    start: pair[0],
                    end: pair[1],
                })
                .collect(),
        ),
        _ => CollisionBox::from_bounds(entity.location.to_bounds(entity.size())),
    }
}

/// Builds the collision box for an edge between two distinct entities.
///
/// `shift_midpoint` is the drag midpoint of an edge being interactively
/// shifted; while set, it overrides the routing mode with a two-segment
/// polyline. For self-loop edges use [`self_loop_collision_box`].
pub fn edge_collision_box(
    source_box: &CollisionBox,
    target_box: &CollisionBox,
    routing: EdgeRouting,
    shift_midpoint: Option<Point>,
    max_curve_radius: f32,
) -> CollisionBox {
    let source_center = source_box.bounding_rectangle().center();
    let target_center = target_box.bounding_rectangle().center();

    let start = source_box.intersection_with_line(source_center, target_center);
    let end = target_box.intersection_with_line(target_center, source_center);

    if let Some(midpoint) = shift_midpoint {
        return CollisionBox::new(vec![
            CollisionShape::Segment {
                start,
                end: midpoint,
            },
            CollisionShape::Segment {
                start: midpoint,
                end,
            },
        ]);
    }

    match routing {
        EdgeRouting::Straight => {
            CollisionBox::new(vec![CollisionShape::Segment { start, end }])
        }
        EdgeRouting::Vertical => {
            let mid_y = (start.y() + end.y()) / 2.0;
            let first_corner = start.with_y(mid_y);
            let second_corner = end.with_y(mid_y);
            CollisionBox::new(vec![
                CollisionShape::Segment {
                    start,
                    end: first_corner,
                },
                CollisionShape::Segment {
                    start: first_corner,
                    end: second_corner,
                },
                CollisionShape::Segment {
                    start: second_corner,
                    end,
                },
            ])
        }
        EdgeRouting::Bezier => {
            // Control tangents follow the boundary normals at the connection
            // points; curvature is capped so far-apart nodes do not produce
            // runaway bulge.
            let curvature = (start.distance_to(end) / 2.0).min(max_curve_radius);
            let start_normal = start
                .sub_point(source_center)
                .normalized()
                .unwrap_or(Point::new(1.0, 0.0));
            let end_normal = end
                .sub_point(target_center)
                .normalized()
                .unwrap_or(Point::new(-1.0, 0.0));
            CollisionBox::new(vec![CollisionShape::SymmetricCurve {
                start,
                control_start: start.add_point(start_normal.scale(curvature)),
                control_end: end.add_point(end_normal.scale(curvature)),
                end,
            }])
        }
    }
}

/// Builds the collision box for a self-loop edge: a circle sized from the
/// entity's own box.
pub fn self_loop_collision_box(entity_box: &CollisionBox) -> CollisionBox {
    let bounds = entity_box.bounding_rectangle();
    let radius = (bounds.width().max(bounds.height())) / 2.0 + SELF_LOOP_MARGIN;
    CollisionBox::new(vec![CollisionShape::Circle {
        center: bounds.center(),
        radius,
    }])
}

/// Shortest distance from a point to a line segment.
fn point_segment_distance(p: Point, a: Point, b: Point) -> f32 {
    let ab = b.sub_point(a);
    let length_squared = ab.x() * ab.x() + ab.y() * ab.y();
    if length_squared <= f32::EPSILON {
        return p.distance_to(a);
    }
    let ap = p.sub_point(a);
    let t = ((ap.x() * ab.x() + ap.y() * ab.y()) / length_squared).clamp(0.0, 1.0);
    p.distance_to(a.add_point(ab.scale(t)))
}

fn segment_bounds(a: Point, b: Point) -> Bounds {
    Bounds::new_from_top_left(
        Point::new(a.x().min(b.x()), a.y().min(b.y())),
        Size::new((a.x() - b.x()).abs(), (a.y() - b.y()).abs()),
    )
}

fn segment_intersects_rect(a: Point, b: Point, rect: Bounds) -> bool {
    if rect.contains_point(a) || rect.contains_point(b) {
        return true;
    }
    let corners = [
        Point::new(rect.min_x(), rect.min_y()),
        Point::new(rect.max_x(), rect.min_y()),
        Point::new(rect.max_x(), rect.max_y()),
        Point::new(rect.min_x(), rect.max_y()),
    ];
    (0..4).any(|i| segments_intersect(a, b, corners[i], corners[(i + 1) % 4]))
}

fn segments_intersect(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    fn orientation(p: Point, q: Point, r: Point) -> f32 {
        (q.y() - p.y()) * (r.x() - q.x()) - (q.x() - p.x()) * (r.y() - q.y())
    }
    let o1 = orientation(a1, a2, b1);
    let o2 = orientation(a1, a2, b2);
    let o3 = orientation(b1, b2, a1);
    let o4 = orientation(b1, b2, a2);
    (o1 * o2 <= 0.0) && (o3 * o4 <= 0.0)
}

fn cubic_point(t: f32, p0: Point, c0: Point, c1: Point, p1: Point) -> Point {
    let u = 1.0 - t;
    let a = u * u * u;
    let b = 3.0 * u * u * t;
    let c = 3.0 * u * t * t;
    let d = t * t * t;
    Point::new(
        a * p0.x() + b * c0.x() + c * c1.x() + d * p1.x(),
        a * p0.y() + b * c0.y() + c * c1.y() + d * p1.y(),
    )
}

/// Finds where the ray `from -> to` first crosses the rectangle border.
///
/// Returns `None` when the two points coincide, the direction is degenerate
/// or no border lies along the ray.
fn ray_rectangle_intersection(from: Point, to: Point, bounds: Bounds) -> Option<Point> {
    let dist = to.sub_point(from);
    let length = dist.hypot();
    if length < 1e-3 {
        return None;
    }

    let dx_norm = dist.x() / length;
    let dy_norm = dist.y() / length;

    // How far along the ray each of the four border lines is hit.
    let t_top = (bounds.min_y() - from.y()) / dy_norm;
    let t_bottom = (bounds.max_y() - from.y()) / dy_norm;
    let t_left = (bounds.min_x() - from.x()) / dx_norm;
    let t_right = (bounds.max_x() - from.x()) / dx_norm;

    let mut t = f32::MAX;

    if t_top.is_finite() && t_top > 0.0 {
        let x = dx_norm.mul_add(t_top, from.x());
        if x >= bounds.min_x() && x <= bounds.max_x() {
            t = t_top;
        }
    }

    if t_bottom.is_finite() && t_bottom > 0.0 && t_bottom < t {
        let x = dx_norm.mul_add(t_bottom, from.x());
        if x >= bounds.min_x() && x <= bounds.max_x() {
            t = t_bottom;
        }
    }

    if t_left.is_finite() && t_left > 0.0 && t_left < t {
        let y = dy_norm.mul_add(t_left, from.y());
        if y >= bounds.min_y() && y <= bounds.max_y() {
            t = t_left;
        }
    }

    if t_right.is_finite() && t_right > 0.0 && t_right < t {
        let y = dy_norm.mul_add(t_right, from.y());
        if y >= bounds.min_y() && y <= bounds.max_y() {
            t = t_right;
        }
    }

    if t == f32::MAX || !t.is_finite() {
        return None;
    }

    Some(Point::new(
        dx_norm.mul_add(t, from.x()),
        dy_norm.mul_add(t, from.y()),
    ))
}


#[cfg(test)]
mod proptest_tests {
    use proptest::prelude::*;

    use super::*;

    // ===================
    // Strategies
    // ===================

    fn point_strategy() -> impl Strategy<Value = Point> {
        (-1000.0f32..1000.0, -1000.0f32..1000.0).prop_map(|(x, y)| Point::new(x, y))
    }

    fn size_strategy() -> impl Strategy<Value = Size> {
        (1.0f32..500.0, 1.0f32..500.0).prop_map(|(w, h)| Size::new(w, h))
    }

    // ===================
    // Property Test Functions
    // ===================

    /// Clipping a ray from the box center always yields finite coordinates.
    fn check_border_clip_is_finite(
        center: Point,
        to: Point,
        size: Size,
    ) -> Result<(), TestCaseError> {
        let entity = CollisionBox::from_bounds(Bounds::new_from_center(center, size));
        let result = entity.intersection_with_line(center, to);

        prop_assert!(result.x().is_finite());
        prop_assert!(result.y().is_finite());
        Ok(())
    }

    /// A curve's bounding rectangle contains every flattened sample of it.
    fn check_curve_bounding_contains_samples(
        start: Point,
        control_start: Point,
        control_end: Point,
        end: Point,
    ) -> Result<(), TestCaseError> {
        let curve = CollisionShape::SymmetricCurve {
            start,
            control_start,
            control_end,
            end,
        };
        let bounds = curve.bounding();

        for step in 0..=16 {
            let t = step as f32 / 16.0;
            let sample = super::cubic_point(t, start, control_start, control_end, end);
            prop_assert!(
                bounds.contains_point(sample),
                "sample {sample:?} at t={t} escapes bounds {bounds:?}"
            );
        }
        Ok(())
    }

    /// Any point inside a rectangle box also hits the box.
    fn check_rect_box_contains_center(center: Point, size: Size) -> Result<(), TestCaseError> {
        let entity = CollisionBox::from_bounds(Bounds::new_from_center(center, size));
        prop_assert!(entity.contains_point(center));
        Ok(())
    }

    // ===================
    // Proptest Wrappers
    // ===================

    proptest! {
        #[test]
        fn border_clip_is_finite(center in point_strategy(), to in point_strategy(), size in size_strategy()) {
            check_border_clip_is_finite(center, to, size)?;
        }

        #[test]
        fn curve_bounding_contains_samples(
            start in point_strategy(),
            control_start in point_strategy(),
            control_end in point_strategy(),
            end in point_strategy(),
        ) {
            check_curve_bounding_contains_samples(start, control_start, control_end, end)?;
        }

        #[test]
        fn rect_box_contains_center(center in point_strategy(), size in size_strategy()) {
            check_rect_box_contains_center(center, size)?;
        }
    }
}
