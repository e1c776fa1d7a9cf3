//! Implements the equidistant (Kannala-Brandt) fisheye distortion.
//!
//! The distortion acts on the incidence angle `θ = atan(r)`:
//! `θ_d = θ (1 + k1 θ² + k2 θ⁴ + k3 θ⁶ + k4 θ⁸)`, and the distorted point is
//! the undistorted one scaled by `θ_d / r`. The inverse needs the root of the
//! degree-9 polynomial, found with Newton's method.

use crate::camera::{
    Distortion, UNDISTORT_CONVERGENCE_THRESHOLD, UNDISTORT_MAX_ITERATIONS,
};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

const SMALL_RADIUS: f64 = 1e-8;
// past 90 degrees the ray no longer hits the image plane
const MAX_THETA: f64 = FRAC_PI_2 - 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquidistantDistortion {
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    pub k4: f64,
}

impl EquidistantDistortion {
    pub fn new(k1: f64, k2: f64, k3: f64, k4: f64) -> Self {
        EquidistantDistortion { k1, k2, k3, k4 }
    }

    fn theta_d(&self, theta: f64) -> f64 {
        let theta2 = theta * theta;
        theta
            * (1.0
                + theta2 * (self.k1 + theta2 * (self.k2 + theta2 * (self.k3 + theta2 * self.k4))))
    }

    fn theta_d_derivative(&self, theta: f64) -> f64 {
        let theta2 = theta * theta;
        1.0 + theta2
            * (3.0 * self.k1
                + theta2 * (5.0 * self.k2 + theta2 * (7.0 * self.k3 + theta2 * 9.0 * self.k4)))
    }
}

impl Distortion for EquidistantDistortion {
    const NAME: &'static str = "Equidistant";

    fn distort(&self, point: &Vector2<f64>) -> Vector2<f64> {
        let r = point.norm();
        if r < SMALL_RADIUS {
            return *point;
        }
        let theta = r.atan();
        point * (self.theta_d(theta) / r)
    }

    /// Newton iteration on `θ`. Only roots in `[0, π/2)` count as converged;
    /// otherwise the in-range `θ` with the smallest residual is returned,
    /// starting from the angle of the distorted point itself.
    fn undistort_with_status(&self, point: &Vector2<f64>) -> (Vector2<f64>, bool) {
        let theta_d = point.norm();
        if theta_d < SMALL_RADIUS {
            return (*point, true);
        }

        let residual = |theta: f64| (self.theta_d(theta) - theta_d).abs();
        let initial = theta_d.atan();
        let mut best = (initial, residual(initial));

        let mut theta = theta_d.min(MAX_THETA);
        for _ in 0..UNDISTORT_MAX_ITERATIONS {
            if (0.0..=MAX_THETA).contains(&theta) && residual(theta) < best.1 {
                best = (theta, residual(theta));
            }
            let derivative = self.theta_d_derivative(theta);
            if derivative.abs() < f64::EPSILON {
                break;
            }
            let step = (self.theta_d(theta) - theta_d) / derivative;
            theta -= step;
            if !theta.is_finite() || step.abs() < UNDISTORT_CONVERGENCE_THRESHOLD {
                break;
            }
        }
        if (0.0..=MAX_THETA).contains(&theta) && residual(theta) < best.1 {
            best = (theta, residual(theta));
        }

        let (theta, error) = best;
        let r = theta.tan();
        (point * (r / theta_d), error < UNDISTORT_CONVERGENCE_THRESHOLD.sqrt())
    }

    fn coefficients(&self) -> Vec<f64> {
        vec![self.k1, self.k2, self.k3, self.k4]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraModelError;
    use approx::assert_abs_diff_eq;

    fn fisheye() -> EquidistantDistortion {
        EquidistantDistortion::new(-0.0135, -0.0036, 0.0008, -0.0002)
    }

    #[test]
    fn test_equidistant_zero_coefficients_is_atan_scaling() {
        let distortion = EquidistantDistortion::new(0.0, 0.0, 0.0, 0.0);
        let point = Vector2::new(1.0, 0.0);
        let distorted = distortion.distort(&point);
        assert_abs_diff_eq!(distorted.x, 1.0f64.atan(), epsilon = 1e-12);
        assert_abs_diff_eq!(distorted.y, 0.0, epsilon = 1e-12);

        let recovered = distortion.undistort(&distorted);
        assert_abs_diff_eq!(recovered.x, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_equidistant_undistort_inverts_distort() {
        let distortion = fisheye();
        for &(x, y) in &[
            (0.0, 0.0),
            (0.1, 0.05),
            (-0.8, 0.6),
            (1.5, -1.2),
            (-2.0, -0.5),
        ] {
            let point = Vector2::new(x, y);
            let distorted = distortion.distort(&point);
            let recovered = distortion.try_undistort(&distorted).unwrap();
            assert_abs_diff_eq!(recovered.x, point.x, epsilon = 1e-6);
            assert_abs_diff_eq!(recovered.y, point.y, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_equidistant_center_is_fixed_point() {
        let distortion = fisheye();
        let center = Vector2::new(0.0, 0.0);
        assert_eq!(distortion.distort(&center), center);
        assert_eq!(distortion.undistort(&center), center);
    }

    #[test]
    fn test_equidistant_coefficients_order() {
        assert_eq!(
            fisheye().coefficients(),
            vec![-0.0135, -0.0036, 0.0008, -0.0002]
        );
    }

    #[test]
    fn test_equidistant_unreachable_radius_does_not_converge() {
        // θ - 0.3 θ³ never exceeds about 0.703 on [0, π/2)
        let distortion = EquidistantDistortion::new(-0.3, 0.0, 0.0, 0.0);
        for &radius in &[1.2, 2.5] {
            let point = Vector2::new(radius, 0.0);

            assert!(matches!(
                distortion.try_undistort(&point),
                Err(CameraModelError::NumericNonConvergence(_))
            ));

            let (estimate, converged) = distortion.undistort_with_status(&point);
            assert!(!converged);
            assert!(estimate.iter().all(|v| v.is_finite()));
            assert!(estimate.x > 0.0);
            let input_residual = (distortion.distort(&point) - point).norm();
            let residual = (distortion.distort(&estimate) - point).norm();
            assert!(residual <= input_residual + 1e-12, "{} > {}", residual, input_residual);
        }
    }
}
