//! Implements the single-parameter FOV (atan) distortion of Devernay and Faugeras.
//!
//! `r_d = atan(2 r tan(w / 2)) / w`, with a closed-form inverse
//! `r = tan(r_d w) / (2 tan(w / 2))`.

use crate::camera::Distortion;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

const SMALL_RADIUS: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtanDistortion {
    /// Field-of-view parameter `w` in radians.
    pub w: f64,
}

impl AtanDistortion {
    pub fn new(w: f64) -> Self {
        AtanDistortion { w }
    }

    fn is_identity(&self) -> bool {
        self.w == 0.0
    }

    fn tan_w_half_x2(&self) -> f64 {
        2.0 * (self.w / 2.0).tan()
    }
}

impl Distortion for AtanDistortion {
    const NAME: &'static str = "Atan";

    fn distort(&self, point: &Vector2<f64>) -> Vector2<f64> {
        if self.is_identity() {
            return *point;
        }
        let r = point.norm();
        let tan_w_half_x2 = self.tan_w_half_x2();
        // first-order limit near the center
        let factor = if r < SMALL_RADIUS {
            tan_w_half_x2 / self.w
        } else {
            (r * tan_w_half_x2).atan() / (self.w * r)
        };
        point * factor
    }

    fn undistort_with_status(&self, point: &Vector2<f64>) -> (Vector2<f64>, bool) {
        if self.is_identity() {
            return (*point, true);
        }
        let r_d = point.norm();
        let tan_w_half_x2 = self.tan_w_half_x2();
        let factor = if r_d < SMALL_RADIUS {
            self.w / tan_w_half_x2
        } else {
            (r_d * self.w).tan() / (tan_w_half_x2 * r_d)
        };
        (point * factor, true)
    }

    fn coefficients(&self) -> Vec<f64> {
        vec![self.w]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_atan_formula() {
        let w = 0.9;
        let distortion = AtanDistortion::new(w);
        let point = Vector2::new(0.6, 0.0);
        let distorted = distortion.distort(&point);
        let expected = (2.0 * 0.6 * (w / 2.0f64).tan()).atan() / w;
        assert_abs_diff_eq!(distorted.x, expected, epsilon = 1e-12);
        assert_abs_diff_eq!(distorted.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_atan_undistort_inverts_distort() {
        let distortion = AtanDistortion::new(0.93);
        for &(x, y) in &[(0.0, 0.0), (0.2, -0.1), (-0.7, 0.5), (1.2, 0.9)] {
            let point = Vector2::new(x, y);
            let recovered = distortion.undistort(&distortion.distort(&point));
            assert_abs_diff_eq!(recovered.x, point.x, epsilon = 1e-6);
            assert_abs_diff_eq!(recovered.y, point.y, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_atan_near_center_uses_limit_scale() {
        let w = 0.93;
        let distortion = AtanDistortion::new(w);
        let point = Vector2::new(1e-9, 0.0);
        let distorted = distortion.distort(&point);
        assert_abs_diff_eq!(distorted.x, 1e-9 * 2.0 * (w / 2.0f64).tan() / w, epsilon = 1e-20);
        let recovered = distortion.undistort(&distorted);
        assert_abs_diff_eq!(recovered.x, point.x, epsilon = 1e-20);
    }

    #[test]
    fn test_atan_continuous_across_center_threshold() {
        let distortion = AtanDistortion::new(0.93);
        let inside = Vector2::new(SMALL_RADIUS * (1.0 - 1e-6), 0.0);
        let outside = Vector2::new(SMALL_RADIUS * (1.0 + 1e-6), 0.0);

        let scale_inside = distortion.distort(&inside).x / inside.x;
        let scale_outside = distortion.distort(&outside).x / outside.x;
        assert_abs_diff_eq!(scale_inside, scale_outside, epsilon = 1e-12);

        let unscale_inside = distortion.undistort(&inside).x / inside.x;
        let unscale_outside = distortion.undistort(&outside).x / outside.x;
        assert_abs_diff_eq!(unscale_inside, unscale_outside, epsilon = 1e-12);
    }

    #[test]
    fn test_atan_zero_parameter_is_identity() {
        let distortion = AtanDistortion::new(0.0);
        let point = Vector2::new(0.3, 0.4);
        assert_eq!(distortion.distort(&point), point);
        assert_eq!(distortion.undistort(&point), point);
    }
}
