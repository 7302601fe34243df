//! Mathematical structs and functions.

use cgmath::Point2;
pub use cubic::CubicFn;

mod cubic;

/// A 2D point
pub type Point2d = Point2<f64>;
