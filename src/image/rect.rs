//! Rectangle types.
//!
//! Used throughout the crate for image views, detections, and regions of interest. Coordinates
//! are `f32` pixels; the Y axis points down, rotations are clockwise.

use std::{fmt, ops::RangeInclusive};

use super::AspectRatio;

fn rotate_cw([x, y]: [f32; 2], radians: f32) -> [f32; 2] {
    let (sin, cos) = radians.sin_cos();
    [x * cos + y * sin, -x * sin + y * cos]
}

fn rotate_ccw([x, y]: [f32; 2], radians: f32) -> [f32; 2] {
    let (sin, cos) = radians.sin_cos();
    [x * cos - y * sin, x * sin + y * cos]
}

/// An axis-aligned rectangle.
///
/// Zero width and/or height is allowed, negative dimensions are not.
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    x_center: f32,
    y_center: f32,
    width: f32,
    height: f32,
}

impl Rect {
    /// Creates a rectangle centered on `(x_center, y_center)`.
    #[inline]
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self {
            x_center,
            y_center,
            width,
            height,
        }
    }

    /// Creates a rectangle from its top-left corner and size.
    #[inline]
    pub fn from_top_left(top_left_x: f32, top_left_y: f32, width: f32, height: f32) -> Self {
        Self::from_center(
            top_left_x + width * 0.5,
            top_left_y + height * 0.5,
            width,
            height,
        )
    }

    /// Creates the rectangle spanning the given X and Y coordinate ranges.
    pub fn from_ranges(x: RangeInclusive<f32>, y: RangeInclusive<f32>) -> Self {
        Self::span_inner(*x.start(), *y.start(), *x.end(), *y.end())
    }

    /// Computes the smallest axis-aligned rectangle containing all of `points`.
    ///
    /// Returns [`None`] for an empty iterator.
    pub fn bounding<I: IntoIterator<Item = [f32; 2]>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();

        let [mut min_x, mut min_y] = iter.next()?;
        let [mut max_x, mut max_y] = [min_x, min_y];

        for [x, y] in iter {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        Some(Self::span_inner(min_x, min_y, max_x, max_y))
    }

    fn span_inner(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        assert!(x_min <= x_max, "x_min={}, x_max={}", x_min, x_max);
        assert!(y_min <= y_max, "y_min={}, y_max={}", y_min, y_max);
        Self::from_top_left(x_min, y_min, x_max - x_min, y_max - y_min)
    }

    /// Scales width and height by `scale`, keeping the center fixed.
    #[must_use]
    pub fn scale(&self, scale: f32) -> Self {
        Self {
            width: self.width * scale,
            height: self.height * scale,
            ..*self
        }
    }

    /// Adds a margin of `amount` times the width/height to each side of the rectangle.
    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        Self {
            width: self.width + self.width * amount * 2.0,
            height: self.height + self.height * amount * 2.0,
            ..*self
        }
    }

    /// Symmetrically widens or heightens `self` until it has the given aspect ratio.
    #[must_use]
    pub fn grow_to_fit_aspect(&self, target_aspect: AspectRatio) -> Self {
        let mut res = *self;
        let target_width = self.height * target_aspect.as_f32();
        if target_width >= self.width {
            res.width = target_width;
        } else {
            res.height = self.width / target_aspect.as_f32();
        }

        res
    }

    /// Re-centers the rectangle on `(x_center, y_center)`, growing it as needed so that it
    /// still covers its original area.
    #[must_use]
    pub fn grow_move_center(&self, x_center: f32, y_center: f32) -> Self {
        let w = f32::max(
            (x_center - self.x()).abs(),
            (x_center - (self.x() + self.width())).abs(),
        ) * 2.0;
        let h = f32::max(
            (y_center - self.y()).abs(),
            (y_center - (self.y() + self.height())).abs(),
        ) * 2.0;

        Self::from_center(x_center, y_center, w, h)
    }

    /// Returns the X coordinate of the rectangle's left edge.
    #[inline]
    pub fn x(&self) -> f32 {
        self.x_center - self.width * 0.5
    }

    /// Returns the Y coordinate of the rectangle's top edge.
    #[inline]
    pub fn y(&self) -> f32 {
        self.y_center - self.height * 0.5
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.height
    }

    #[inline]
    pub fn x_center(&self) -> f32 {
        self.x_center
    }

    #[inline]
    pub fn y_center(&self) -> f32 {
        self.y_center
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.x_center, self.y_center)
    }

    /// Returns the area covered by `self`, in square pixels.
    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    #[must_use]
    pub fn move_by(&self, x: f32, y: f32) -> Rect {
        Rect {
            x_center: self.x_center + x,
            y_center: self.y_center + y,
            ..*self
        }
    }

    #[must_use]
    pub fn move_to(&self, x: f32, y: f32) -> Rect {
        Rect::from_top_left(x, y, self.width, self.height)
    }

    /// Computes the overlap of `self` and `other`.
    ///
    /// Returns [`None`] when the rectangles don't overlap at all.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x_min = self.x().max(other.x());
        let y_min = self.y().max(other.y());
        let x_max = (self.x() + self.width()).min(other.x() + other.width());
        let y_max = (self.y() + self.height()).min(other.y() + other.height());
        if x_min > x_max || y_min > y_max {
            return None;
        }

        Some(Rect::span_inner(x_min, y_min, x_max, y_max))
    }

    fn intersection_area(&self, other: &Self) -> f32 {
        self.intersection(other).map_or(0.0, |rect| rect.area())
    }

    fn union_area(&self, other: &Self) -> f32 {
        self.area() + other.area() - self.intersection_area(other)
    }

    /// Computes the Intersection over Union (IOU) of `self` and `other`.
    pub fn iou(&self, other: &Self) -> f32 {
        self.intersection_area(other) / self.union_area(other)
    }

    pub fn contains_point(&self, [x, y]: [f32; 2]) -> bool {
        self.x() <= x
            && self.y() <= y
            && self.x() + self.width() >= x
            && self.y() + self.height() >= y
    }

    /// Returns the corners in order: top-left, top-right, bottom-right, bottom-left.
    pub fn corners(&self) -> [[f32; 2]; 4] {
        let [x, y] = [self.x(), self.y()];
        let [w, h] = [self.width, self.height];
        [[x, y], [x + w, y], [x + w, y + h], [x, y + h]]
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect @ ({},{})/{}x{}",
            self.x_center, self.y_center, self.width, self.height
        )
    }
}

/// A [`Rect`], rotated around its center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    rect: Rect,
    radians: f32,
}

impl RotatedRect {
    /// Wraps `rect`, rotated clockwise by `radians` around its center.
    #[inline]
    pub fn new(rect: Rect, radians: f32) -> Self {
        Self { rect, radians }
    }

    /// Computes a rectangle with the given rotation that contains all of `points`.
    ///
    /// Returns [`None`] for an empty iterator.
    pub fn bounding<I: IntoIterator<Item = [f32; 2]>>(radians: f32, points: I) -> Option<Self> {
        // Rotate all points into the rectangle's frame, take the axis-aligned bounds there, then
        // rotate the computed center back out. Since the center is mapped back before use, the
        // pivot of the rotation does not matter and the origin is used.
        let mut min = [f32::MAX; 2];
        let mut max = [f32::MIN; 2];
        let mut empty = true;
        for point in points {
            empty = false;
            let [x, y] = rotate_cw(point, radians);
            min = [min[0].min(x), min[1].min(y)];
            max = [max[0].max(x), max[1].max(y)];
        }

        if empty {
            return None;
        }

        // Center in the rotated frame, then mapped back to original coordinates.
        let center = rotate_ccw(
            [(min[0] + max[0]) * 0.5, (min[1] + max[1]) * 0.5],
            radians,
        );

        Some(Self::new(
            Rect::from_center(center[0], center[1], max[0] - min[0], max[1] - min[1]),
            radians,
        ))
    }

    /// Returns the clockwise rotation in radians.
    #[inline]
    pub fn rotation_radians(&self) -> f32 {
        self.radians
    }

    /// Returns the underlying non-rotated rectangle.
    #[inline]
    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    /// Transforms the underlying non-rotated [`Rect`] with `f`, keeping the rotation.
    #[must_use]
    pub fn map(mut self, f: impl FnOnce(Rect) -> Rect) -> Self {
        self.rect = f(self.rect);
        self
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        self.rect.center()
    }

    /// Adds a margin of `amount` times the width/height to each side of the rectangle.
    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        self.map(|rect| rect.grow_rel(amount))
    }

    /// Symmetrically widens or heightens the rectangle until it has the given aspect ratio.
    #[must_use]
    pub fn grow_to_fit_aspect(&self, target_aspect: AspectRatio) -> Self {
        self.map(|rect| rect.grow_to_fit_aspect(target_aspect))
    }

    /// Returns the corners in the parent coordinate system, with the rotation applied.
    ///
    /// The order matches [`Rect::corners`] as seen from the non-rotated rectangle; the rotation
    /// moves the corners but keeps the order.
    pub fn rotated_corners(&self) -> [[f32; 2]; 4] {
        let (cx, cy) = self.rect.center();
        self.rect.corners().map(|[x, y]| {
            let [rx, ry] = rotate_ccw([x - cx, y - cy], self.radians);
            [cx + rx, cy + ry]
        })
    }

    pub fn contains_point(&self, point: [f32; 2]) -> bool {
        let pt = self.transform_in(point[0], point[1]);

        // The rect offset was already compensated for by the transform.
        self.rect.move_to(0.0, 0.0).contains_point(pt)
    }

    /// Maps a point from the parent coordinate system into the rectangle's own system, whose
    /// origin sits at the rectangle's top left corner.
    pub fn transform_in(&self, x: f32, y: f32) -> [f32; 2] {
        let [cx, cy] = [self.rect.width() * 0.5, self.rect.height() * 0.5];
        let [x, y] = rotate_cw(
            [x - self.rect.x() - cx, y - self.rect.y() - cy],
            self.radians,
        );
        [x + cx, y + cy]
    }

    /// Maps a point from the rectangle's own coordinate system back into the parent system.
    pub fn transform_out(&self, x: f32, y: f32) -> [f32; 2] {
        let [cx, cy] = [self.rect.width() * 0.5, self.rect.height() * 0.5];
        let [x, y] = rotate_ccw([x - cx, y - cy], self.radians);
        [x + cx + self.rect.x(), y + cy + self.rect.y()]
    }
}

impl From<Rect> for RotatedRect {
    fn from(rect: Rect) -> Self {
        Self::new(rect, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::TAU;

    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_contains_point() {
        let rect = Rect::from_top_left(-5.0, 5.0, 10.0, 5.0);
        assert!(rect.contains_point([-5.0, 5.0]));
        assert!(rect.contains_point([-5.0 + 9.0, 5.0 + 4.0]));
        assert!(!rect.contains_point([-5.0 + 11.0, 5.0 + 4.0]));
        assert!(!rect.contains_point([-5.0 + 9.0, 5.0 + 5.0 + 1.0]));

        let empty = Rect::from_center(0.0, 0.0, 0.0, 0.0);
        assert!(!empty.contains_point([0.0025, 0.0]));
        assert!(!empty.contains_point([0.0, 1.0]));
        assert!(!empty.contains_point([0.0, -1.0]));
    }

    #[test]
    fn test_intersection() {
        assert_eq!(
            Rect::from_ranges(0.0..=10.0, 0.0..=10.0)
                .intersection(&Rect::from_ranges(5.0..=5.0, 5.0..=5.0)),
            Some(Rect::from_ranges(5.0..=5.0, 5.0..=5.0))
        );
        assert_eq!(
            Rect::from_ranges(5.0..=5.0, 5.0..=5.0)
                .intersection(&Rect::from_ranges(0.0..=10.0, 0.0..=10.0)),
            Some(Rect::from_ranges(5.0..=5.0, 5.0..=5.0))
        );
        assert_eq!(
            Rect::from_ranges(5.0..=5.0, 5.0..=5.0)
                .intersection_area(&Rect::from_ranges(6.0..=10.0, 0.0..=10.0)),
            0.0,
        );
    }

    #[test]
    fn test_iou() {
        // Two rects with the same center point, but different sizes.
        let smaller = Rect::from_center(9.0, 9.0, 1.0, 1.0);
        let bigger = Rect::from_center(9.0, 9.0, 2.0, 2.0);

        assert_eq!(smaller.area(), 1.0);
        assert_eq!(bigger.area(), 4.0);

        let intersection = smaller.intersection(&bigger).unwrap();
        assert_eq!(intersection.center(), smaller.center());

        assert_eq!(
            smaller.intersection_area(&bigger),
            bigger.intersection_area(&smaller),
        );
        assert_eq!(smaller.intersection_area(&bigger), 1.0);
        assert_eq!(smaller.union_area(&bigger), bigger.union_area(&smaller));
        assert_eq!(smaller.union_area(&bigger), 4.0);

        assert_eq!(smaller.iou(&bigger), 1.0 / 4.0);
        assert_eq!(bigger.iou(&smaller), 1.0 / 4.0);
    }

    #[test]
    fn test_bounding() {
        assert_eq!(
            Rect::bounding([[0.0, 0.0], [1.0, 1.0], [-1.0, -1.0]]).unwrap(),
            Rect::from_center(0.0, 0.0, 2.0, 2.0),
        );
        assert_eq!(
            Rect::bounding([[1.0, 1.0], [2.0, 2.0]]).unwrap(),
            Rect::from_center(1.5, 1.5, 1.0, 1.0),
        );
        assert_eq!(
            Rect::bounding([[0.0, 0.0], [10.0, 0.0]]).unwrap(),
            Rect::from_center(5.0, 0.0, 10.0, 0.0),
        );
        assert_eq!(Rect::bounding([]), None);
    }

    #[test]
    fn test_fit_aspect() {
        assert_eq!(
            Rect::from_center(10.0, 10.0, 50.0, 100.0).grow_to_fit_aspect(AspectRatio::SQUARE),
            Rect::from_center(10.0, 10.0, 100.0, 100.0),
        );
        assert_eq!(
            Rect::from_center(10.0, 10.0, 100.0, 50.0).grow_to_fit_aspect(AspectRatio::SQUARE),
            Rect::from_center(10.0, 10.0, 100.0, 100.0),
        );
    }

    #[test]
    fn test_grow_move_center() {
        let orig = Rect::from_top_left(0.0, 0.0, 0.0, 0.0);
        assert_eq!(orig.grow_move_center(0.0, 0.0), orig);
        assert_eq!(
            orig.grow_move_center(1.0, 0.0),
            Rect::from_top_left(0.0, 0.0, 2.0, 0.0)
        );
    }

    #[test]
    fn test_rotated_rect_transform() {
        // Not actually rotated
        let null = RotatedRect::new(Rect::from_top_left(0.0, 0.0, 1.0, 1.0), 0.0);
        assert_eq!(null.transform_in(0.0, 0.0), [0.0, 0.0]);
        assert_eq!(null.transform_out(0.0, 0.0), [0.0, 0.0]);
        assert_eq!(null.transform_in(1.0, -1.0), [1.0, -1.0]);
        assert_eq!(null.transform_out(1.0, -1.0), [1.0, -1.0]);

        let offset = RotatedRect::new(Rect::from_top_left(10.0, 20.0, 1.0, 1.0), 0.0);
        assert_eq!(offset.transform_in(0.0, 0.0), [-10.0, -20.0]);
        assert_eq!(offset.transform_in(10.0, 20.0), [0.0, 0.0]);

        // Rotated clockwise by 90°
        let right = RotatedRect::new(Rect::from_top_left(0.0, 0.0, 1.0, 1.0), TAU / 4.0);
        assert_eq!(right.transform_in(0.5, 0.5), [0.5, 0.5]);
        assert_eq!(right.transform_out(0.5, 0.5), [0.5, 0.5]);
        let [x, y] = right.transform_in(0.0, 0.0);
        assert_relative_eq!(x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(y, 1.0, epsilon = 1e-6);
        let [x, y] = right.transform_out(0.0, 0.0);
        assert_relative_eq!(x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(y, 0.0, epsilon = 1e-6);

        // Offset, rotated by 180°
        let rect = RotatedRect::new(Rect::from_top_left(10.0, 20.0, 1.0, 1.0), TAU / 2.0);
        let [x, y] = rect.transform_in(10.0, 20.0);
        assert_relative_eq!(x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(y, 1.0, epsilon = 1e-5);
        let [x, y] = rect.transform_out(0.0, 0.0);
        assert_relative_eq!(x, 11.0, epsilon = 1e-5);
        assert_relative_eq!(y, 21.0, epsilon = 1e-5);
    }

    #[test]
    fn test_rotated_rect_contains_point() {
        // 1x1 rect at origin
        let rect = RotatedRect::new(Rect::from_top_left(0.0, 0.0, 1.0, 1.0), 1.0);
        assert!(rect.contains_point([0.5, 0.5]));
        assert!(!rect.contains_point([0.0, 1.5]));
        assert!(!rect.contains_point([1.0, 1.0]));
        assert!(!rect.contains_point([0.0, -1.0]));

        // Wide rect, rotated 90°
        let rect = RotatedRect::new(Rect::from_center(0.0, 0.0, 51.0, 1.0), TAU / 4.0);
        assert!(rect.contains_point([0.0, 0.0]));
        assert!(rect.contains_point([0.0, 25.0]));
        assert!(!rect.contains_point([0.0, 26.0]));
        assert!(rect.contains_point([0.0, -25.0]));
        assert!(!rect.contains_point([0.0, -26.0]));
        assert!(!rect.contains_point([1.0, 0.0]));
    }

    #[test]
    fn test_rotated_rect_bounding() {
        assert!(RotatedRect::bounding(0.0, []).is_none());

        assert_eq!(
            RotatedRect::bounding(0.0, [[0.0, 0.0], [1.0, 1.0]]).unwrap(),
            Rect::from_top_left(0.0, 0.0, 1.0, 1.0).into(),
        );
        let quarter = RotatedRect::bounding(TAU / 4.0, [[0.0, 0.0], [9.0, 9.0]]).unwrap();
        let (cx, cy) = quarter.center();
        assert_relative_eq!(cx, 4.5, epsilon = 1e-4);
        assert_relative_eq!(cy, 4.5, epsilon = 1e-4);
        assert_relative_eq!(quarter.rect().width(), 9.0, epsilon = 1e-4);
        assert_relative_eq!(quarter.rect().height(), 9.0, epsilon = 1e-4);
    }

    #[test]
    fn corners() {
        let rect = Rect::from_center(1.0, 1.0, 4.0, 2.0);
        assert_eq!(
            rect.corners(),
            [[-1.0, 0.0], [3.0, 0.0], [3.0, 2.0], [-1.0, 2.0]]
        );
    }
}
