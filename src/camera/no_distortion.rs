//! Identity distortion for ideal pinhole lenses.

use crate::camera::Distortion;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// The identity distortion: `distort` and `undistort` return their input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NoDistortion;

impl Distortion for NoDistortion {
    const NAME: &'static str = "NoDistortion";

    fn distort(&self, point: &Vector2<f64>) -> Vector2<f64> {
        *point
    }

    fn undistort_with_status(&self, point: &Vector2<f64>) -> (Vector2<f64>, bool) {
        (*point, true)
    }

    fn coefficients(&self) -> Vec<f64> {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_distortion_is_identity() {
        let distortion = NoDistortion;
        let points = [
            Vector2::new(0.0, 0.0),
            Vector2::new(0.3, -0.7),
            Vector2::new(-12.5, 4.25),
        ];
        for point in &points {
            assert_eq!(distortion.distort(point), *point);
            assert_eq!(distortion.undistort(point), *point);
            assert_eq!(distortion.try_undistort(point).unwrap(), *point);
        }
        assert!(distortion.coefficients().is_empty());
    }
}
