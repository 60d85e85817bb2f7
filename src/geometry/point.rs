//! 2D point and bounding-box types with a generic scalar abstraction.
//!
//! Coordinates are generic over a floating-point scalar so the same kernel
//! works in single and double precision. The `CoordinateScalar` trait
//! consolidates the bounds required throughout the crate; `f32` and `f64`
//! are the intended instantiations.

use num_traits::Float;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt::{Debug, Display};

/// Scalar type usable as a vertex coordinate.
///
/// This is a trait alias consolidating the bounds required by the geometric
/// predicates and the triangulation kernel: floating-point arithmetic,
/// copyability, formatting, and serde support.
///
/// # Examples
///
/// ```
/// use cdt2d::geometry::point::CoordinateScalar;
///
/// fn midpoint<T: CoordinateScalar>(a: T, b: T) -> T {
///     (a + b) / (T::one() + T::one())
/// }
///
/// assert_eq!(midpoint(1.0_f64, 3.0_f64), 2.0);
/// assert_eq!(midpoint(1.0_f32, 3.0_f32), 2.0);
/// ```
pub trait CoordinateScalar:
    Float + Copy + Default + Debug + Display + Serialize + DeserializeOwned + 'static
{
}

impl CoordinateScalar for f32 {}
impl CoordinateScalar for f64 {}

/// A 2D point (vertex position).
///
/// Plain data: both coordinates are public, and the type is `Copy`.
///
/// # Examples
///
/// ```
/// use cdt2d::geometry::point::Point2;
///
/// let p = Point2::new(1.0, 2.0);
/// assert_eq!(p.x, 1.0);
/// assert_eq!(p.y, 2.0);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2<T> {
    /// X-coordinate.
    pub x: T,
    /// Y-coordinate.
    pub y: T,
}

impl<T: CoordinateScalar> Point2<T> {
    /// Creates a point from its coordinates.
    #[inline]
    pub const fn new(x: T, y: T) -> Self {
        Self { x, y }
    }

    /// Returns `true` when both coordinates are finite (neither NaN nor
    /// infinite).
    ///
    /// # Examples
    ///
    /// ```
    /// use cdt2d::geometry::point::Point2;
    ///
    /// assert!(Point2::new(0.0, 1.0).is_finite());
    /// assert!(!Point2::new(f64::NAN, 1.0).is_finite());
    /// assert!(!Point2::new(0.0, f64::INFINITY).is_finite());
    /// ```
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Squared Euclidean distance to another point.
    #[inline]
    #[must_use]
    pub fn distance_squared(&self, other: &Self) -> T {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// An axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Box2<T> {
    /// Corner with the smallest coordinates.
    pub min: Point2<T>,
    /// Corner with the largest coordinates.
    pub max: Point2<T>,
}

impl<T: CoordinateScalar> Box2<T> {
    /// Computes the bounding box enveloping the given points.
    ///
    /// Returns `None` for an empty input.
    ///
    /// # Examples
    ///
    /// ```
    /// use cdt2d::geometry::point::{Box2, Point2};
    ///
    /// let points = [Point2::new(1.0, -2.0), Point2::new(-3.0, 4.0)];
    /// let b = Box2::envelop_points(points.iter().copied()).unwrap();
    /// assert_eq!(b.min, Point2::new(-3.0, -2.0));
    /// assert_eq!(b.max, Point2::new(1.0, 4.0));
    /// ```
    #[must_use]
    pub fn envelop_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Point2<T>>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut envelope = Self {
            min: first,
            max: first,
        };
        for p in iter {
            envelope.min.x = envelope.min.x.min(p.x);
            envelope.min.y = envelope.min.y.min(p.y);
            envelope.max.x = envelope.max.x.max(p.x);
            envelope.max.y = envelope.max.y.max(p.y);
        }
        Some(envelope)
    }

    /// Center of the box.
    #[inline]
    #[must_use]
    pub fn center(&self) -> Point2<T> {
        let two = T::one() + T::one();
        Point2::new(
            (self.min.x + self.max.x) / two,
            (self.min.y + self.max.y) / two,
        )
    }

    /// Box width (extent along x).
    #[inline]
    #[must_use]
    pub fn width(&self) -> T {
        self.max.x - self.min.x
    }

    /// Box height (extent along y).
    #[inline]
    #[must_use]
    pub fn height(&self) -> T {
        self.max.y - self.min.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_is_plain_data() {
        fn assert_auto_traits<U: Send + Sync + Unpin + Copy>() {}
        assert_auto_traits::<Point2<f64>>();
        assert_auto_traits::<Box2<f32>>();
    }

    #[test]
    fn envelop_of_empty_input_is_none() {
        let empty: [Point2<f64>; 0] = [];
        assert!(Box2::envelop_points(empty.iter().copied()).is_none());
    }

    #[test]
    fn envelop_of_single_point_is_degenerate() {
        let b = Box2::envelop_points([Point2::new(2.0_f64, 3.0)].iter().copied()).unwrap();
        assert_eq!(b.min, b.max);
        assert_eq!(b.width(), 0.0);
        assert_eq!(b.height(), 0.0);
    }

    #[test]
    fn box_center_and_extents() {
        let b = Box2 {
            min: Point2::new(-1.0_f64, 0.0),
            max: Point2::new(3.0, 6.0),
        };
        assert_eq!(b.center(), Point2::new(1.0, 3.0));
        assert_eq!(b.width(), 4.0);
        assert_eq!(b.height(), 6.0);
    }

    #[test]
    fn distance_squared_is_symmetric() {
        let a = Point2::new(0.0_f64, 0.0);
        let b = Point2::new(3.0, 4.0);
        assert_eq!(a.distance_squared(&b), 25.0);
        assert_eq!(b.distance_squared(&a), 25.0);
    }
}
