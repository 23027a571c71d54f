//! Geometric primitives for the stage coordinate space.
//!
//! This module provides the fundamental geometric types used throughout the
//! document engine for positions, sizes, bounding boxes and padding.
//!
//! # Overview
//!
//! - [`Point`] - A 2D coordinate in stage space
//! - [`Size`] - Width and height dimensions
//! - [`Bounds`] - A rectangular bounding box defined by minimum and maximum coordinates
//! - [`Insets`] - Padding values for four sides
//!
//! # Coordinate System
//!
//! The origin is the top-left corner, X increases rightward and Y increases
//! downward, matching screen coordinate systems. Points and sizes serialize
//! as flat two-element arrays (`[x, y]` / `[w, h]`) in the document format.

use serde::{Deserialize, Serialize};

/// A 2D point representing a position in stage coordinate space.
///
/// Points use `f32` coordinates and provide operations for basic vector math.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct Point {
    x: f32,
    y: f32,
}

impl From<[f32; 2]> for Point {
    fn from([x, y]: [f32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f32; 2] {
    fn from(point: Point) -> Self {
        [point.x, point.y]
    }
}

impl Point {
    /// Creates a new point with the specified coordinates
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Returns the x-coordinate of the point
    pub fn x(self) -> f32 {
        self.x
    }

    /// Returns the y-coordinate of the point
    pub fn y(self) -> f32 {
        self.y
    }

    /// Creates a new point with the specified x-coordinate
    pub fn with_x(mut self, x: f32) -> Self {
        self.x = x;
        self
    }

    /// Creates a new point with the specified y-coordinate
    pub fn with_y(mut self, y: f32) -> Self {
        self.y = y;
        self
    }

    /// Adds another point to this point, returning a new point
    pub fn add_point(self, other: Point) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    /// Subtracts another point from this point, returning a new point
    pub fn sub_point(self, other: Point) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    /// Calculates the midpoint between this point and another point
    pub fn midpoint(self, other: Point) -> Self {
        Self {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
        }
    }

    /// Calculates the hypotenuse (Euclidean distance from origin)
    pub fn hypot(self) -> f32 {
        self.x.hypot(self.y)
    }

    /// Euclidean distance between this point and another point
    pub fn distance_to(self, other: Point) -> f32 {
        self.sub_point(other).hypot()
    }

    /// Multiplies both coordinates by the given factor
    pub fn scale(self, factor: f32) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
        }
    }

    /// Returns this point normalized to unit length, or `None` for a
    /// near-zero vector where the direction is undefined.
    pub fn normalized(self) -> Option<Point> {
        let length = self.hypot();
        if length < 1e-3 {
            None
        } else {
            Some(self.scale(1.0 / length))
        }
    }

    /// Converts a point and size into a bounds rectangle with this point
    /// as the top-left corner.
    pub fn to_bounds(self, size: Size) -> Bounds {
        Bounds::new_from_top_left(self, size)
    }
}

/// Represents the dimensions of an element with width and height
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct Size {
    width: f32,
    height: f32,
}

impl From<[f32; 2]> for Size {
    fn from([width, height]: [f32; 2]) -> Self {
        Self { width, height }
    }
}

impl From<Size> for [f32; 2] {
    fn from(size: Size) -> Self {
        [size.width, size.height]
    }
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Returns the width dimension of this size
    pub fn width(self) -> f32 {
        self.width
    }

    /// Returns the height dimension of this size
    pub fn height(self) -> f32 {
        self.height
    }

    /// Returns a new Size with the maximum width and height between this size and another
    pub fn max(self, other: Size) -> Self {
        Self {
            width: self.width.max(other.width),
            height: self.height.max(other.height),
        }
    }

    /// Returns a new Size with padding added to both width and height
    pub fn add_padding(self, insets: Insets) -> Self {
        Self {
            width: self.width + insets.horizontal_sum(),
            height: self.height + insets.vertical_sum(),
        }
    }

    /// Returns true if both width and height are zero
    pub fn is_zero(self) -> bool {
        self.width == 0.0 && self.height == 0.0
    }
}

/// Represents a rectangular bounding box with minimum and maximum coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
}

impl Bounds {
    /// Creates a new bounds from a center point and a size
    pub fn new_from_center(center: Point, size: Size) -> Self {
        let half_width = size.width / 2.0;
        let half_height = size.height / 2.0;
        Self {
            min_x: center.x - half_width,
            min_y: center.y - half_height,
            max_x: center.x + half_width,
            max_y: center.y + half_height,
        }
    }

    /// Creates a new bounds from a top-left point and a size
    pub fn new_from_top_left(top_left: Point, size: Size) -> Self {
        Self {
            min_x: top_left.x,
            min_y: top_left.y,
            max_x: top_left.x + size.width,
            max_y: top_left.y + size.height,
        }
    }

    /// Returns the minimum x-coordinate of the bounds
    pub fn min_x(self) -> f32 {
        self.min_x
    }

    /// Returns the minimum y-coordinate of the bounds
    pub fn min_y(self) -> f32 {
        self.min_y
    }

    /// Returns the maximum x-coordinate of the bounds
    pub fn max_x(self) -> f32 {
        self.max_x
    }

    /// Returns the maximum y-coordinate of the bounds
    pub fn max_y(self) -> f32 {
        self.max_y
    }

    /// Returns the center point of the bounds
    pub fn center(self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Returns the width of the bounds
    pub fn width(self) -> f32 {
        self.max_x - self.min_x
    }

    /// Returns the height of the bounds
    pub fn height(self) -> f32 {
        self.max_y - self.min_y
    }

    /// Returns the top-left corner as a Point
    pub fn min_point(self) -> Point {
        Point {
            x: self.min_x,
            y: self.min_y,
        }
    }

    /// Converts bounds to a Size object
    pub fn to_size(self) -> Size {
        Size {
            width: self.width(),
            height: self.height(),
        }
    }

    /// Merges two bounds to create a larger bounds that contains both.
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Expands the bounds by adding insets on every side.
    pub fn add_padding(&self, insets: Insets) -> Self {
        Self {
            min_x: self.min_x - insets.left(),
            min_y: self.min_y - insets.top(),
            max_x: self.max_x + insets.right(),
            max_y: self.max_y + insets.bottom(),
        }
    }

    /// Returns true if the point lies inside the bounds (borders included).
    pub fn contains_point(self, p: Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    /// Returns true if this bounds fully contains another bounds.
    pub fn contains_bounds(self, other: Bounds) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// Returns true if this bounds overlaps another bounds (borders included).
    pub fn intersects(self, other: Bounds) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }
}

/// Represents spacing around an element with potentially different values
/// for each side.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Insets {
    top: f32,
    right: f32,
    bottom: f32,
    left: f32,
}

impl Insets {
    /// Creates new insets with specified values for each side
    pub fn new(top: f32, right: f32, bottom: f32, left: f32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    /// Creates uniform insets with the same value for all sides
    pub fn uniform(value: f32) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }

    /// Returns the top inset value
    pub fn top(self) -> f32 {
        self.top
    }

    /// Returns the right inset value
    pub fn right(self) -> f32 {
        self.right
    }

    /// Returns the bottom inset value
    pub fn bottom(self) -> f32 {
        self.bottom
    }

    /// Returns the left inset value
    pub fn left(self) -> f32 {
        self.left
    }

    /// Returns the sum of left and right insets
    pub fn horizontal_sum(self) -> f32 {
        self.left + self.right
    }

    /// Returns the sum of top and bottom insets
    pub fn vertical_sum(self) -> f32 {
        self.top + self.bottom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_vector_math() {
        let p1 = Point::new(5.0, 8.0);
        let p2 = Point::new(2.0, 3.0);

        let sum = p1.add_point(p2);
        assert_eq!(sum.x(), 7.0);
        assert_eq!(sum.y(), 11.0);

        let diff = p1.sub_point(p2);
        assert_eq!(diff.x(), 3.0);
        assert_eq!(diff.y(), 5.0);

        let mid = p1.midpoint(p2);
        assert_eq!(mid.x(), 3.5);
        assert_eq!(mid.y(), 5.5);
    }

    #[test]
    fn test_point_hypot_and_distance() {
        let point = Point::new(3.0, 4.0);
        assert_eq!(point.hypot(), 5.0);
        assert_eq!(Point::new(0.0, 0.0).distance_to(point), 5.0);
    }

    #[test]
    fn test_point_normalized() {
        let n = Point::new(3.0, 4.0).normalized().unwrap();
        assert!((n.hypot() - 1.0).abs() < f32::EPSILON);

        assert!(Point::new(0.0, 0.0).normalized().is_none());
    }

    #[test]
    fn test_point_serializes_as_array() {
        let point = Point::new(1.5, -2.0);
        let json = serde_json::to_string(&point).unwrap();
        assert_eq!(json, "[1.5,-2.0]");

        let back: Point = serde_json::from_str(&json).unwrap();
        assert_eq!(back, point);
    }

    #[test]
    fn test_size_serializes_as_array() {
        let size = Size::new(10.0, 20.0);
        let json = serde_json::to_string(&size).unwrap();
        assert_eq!(json, "[10.0,20.0]");

        let back: Size = serde_json::from_str(&json).unwrap();
        assert_eq!(back, size);
    }

    #[test]
    fn test_bounds_from_center() {
        let bounds = Bounds::new_from_center(Point::new(50.0, 60.0), Size::new(20.0, 30.0));

        assert_eq!(bounds.min_x(), 40.0);
        assert_eq!(bounds.min_y(), 45.0);
        assert_eq!(bounds.max_x(), 60.0);
        assert_eq!(bounds.max_y(), 75.0);
        assert_eq!(bounds.center(), Point::new(50.0, 60.0));
    }

    #[test]
    fn test_bounds_from_top_left() {
        let bounds = Bounds::new_from_top_left(Point::new(10.0, 20.0), Size::new(30.0, 40.0));

        assert_eq!(bounds.min_x(), 10.0);
        assert_eq!(bounds.min_y(), 20.0);
        assert_eq!(bounds.max_x(), 40.0);
        assert_eq!(bounds.max_y(), 60.0);
        assert_eq!(bounds.to_size(), Size::new(30.0, 40.0));
    }

    #[test]
    fn test_bounds_merge() {
        let b1 = Bounds::new_from_top_left(Point::new(1.0, 2.0), Size::new(4.0, 4.0));
        let b2 = Bounds::new_from_top_left(Point::new(3.0, 0.0), Size::new(5.0, 4.0));

        let merged = b1.merge(&b2);
        assert_eq!(merged.min_x(), 1.0);
        assert_eq!(merged.min_y(), 0.0);
        assert_eq!(merged.max_x(), 8.0);
        assert_eq!(merged.max_y(), 6.0);
    }

    #[test]
    fn test_bounds_contains_point() {
        let bounds = Bounds::new_from_top_left(Point::new(0.0, 0.0), Size::new(10.0, 10.0));

        assert!(bounds.contains_point(Point::new(5.0, 5.0)));
        assert!(bounds.contains_point(Point::new(0.0, 0.0))); // border counts
        assert!(bounds.contains_point(Point::new(10.0, 10.0)));
        assert!(!bounds.contains_point(Point::new(10.1, 5.0)));
        assert!(!bounds.contains_point(Point::new(5.0, -0.1)));
    }

    #[test]
    fn test_bounds_intersects_and_contains() {
        let outer = Bounds::new_from_top_left(Point::new(0.0, 0.0), Size::new(10.0, 10.0));
        let inner = Bounds::new_from_top_left(Point::new(2.0, 2.0), Size::new(3.0, 3.0));
        let overlapping = Bounds::new_from_top_left(Point::new(8.0, 8.0), Size::new(5.0, 5.0));
        let disjoint = Bounds::new_from_top_left(Point::new(20.0, 20.0), Size::new(2.0, 2.0));

        assert!(outer.contains_bounds(inner));
        assert!(!outer.contains_bounds(overlapping));
        assert!(outer.intersects(inner));
        assert!(outer.intersects(overlapping));
        assert!(!outer.intersects(disjoint));
    }

    #[test]
    fn test_bounds_add_padding() {
        let bounds = Bounds::new_from_top_left(Point::new(2.0, 3.0), Size::new(4.0, 5.0));
        let padded = bounds.add_padding(Insets::uniform(1.0));

        assert_eq!(padded.min_x(), 1.0);
        assert_eq!(padded.min_y(), 2.0);
        assert_eq!(padded.max_x(), 7.0);
        assert_eq!(padded.max_y(), 9.0);
    }

    #[test]
    fn test_insets_sums() {
        let insets = Insets::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(insets.horizontal_sum(), 6.0);
        assert_eq!(insets.vertical_sum(), 4.0);
    }

    #[test]
    fn test_size_add_padding() {
        let padded = Size::new(10.0, 20.0).add_padding(Insets::uniform(5.0));
        assert_eq!(padded.width(), 20.0);
        assert_eq!(padded.height(), 30.0);
    }
}
