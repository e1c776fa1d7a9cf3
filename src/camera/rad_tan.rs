//! Implements the Radial-Tangential (RadTan) distortion model.
//!
//! This module provides [`RadialTangentialDistortion`], the 4-parameter
//! plumb-bob model with two radial terms on `r²` and `r⁴` and two tangential
//! terms. There is no closed-form inverse, so [`Distortion::undistort`] runs
//! Newton's method on the forward model.

use crate::camera::{
    Distortion, UNDISTORT_CONVERGENCE_THRESHOLD, UNDISTORT_MAX_ITERATIONS,
};
use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Radial-tangential lens distortion.
///
/// The coefficients map onto the configuration keys as:
/// *   `k1` (`cam_d0`), `k2` (`cam_d1`): radial coefficients.
/// *   `p1` (`cam_d2`), `p2` (`cam_d3`): tangential coefficients.
///
/// # Examples
///
/// ```rust
/// use nalgebra::Vector2;
/// use vikit_cameras::camera::{Distortion, RadialTangentialDistortion};
///
/// let distortion = RadialTangentialDistortion::new(-0.28, 0.07, 0.0002, 0.00002);
/// let point = Vector2::new(0.2, -0.1);
/// let recovered = distortion.undistort(&distortion.distort(&point));
/// assert!((recovered - point).norm() < 1e-9);
/// ```
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadialTangentialDistortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
}

impl RadialTangentialDistortion {
    pub fn new(k1: f64, k2: f64, p1: f64, p2: f64) -> Self {
        RadialTangentialDistortion { k1, k2, p1, p2 }
    }

    /// True when every coefficient is exactly zero, i.e. the model is the identity.
    pub fn is_degenerate(&self) -> bool {
        self.k1 == 0.0 && self.k2 == 0.0 && self.p1 == 0.0 && self.p2 == 0.0
    }

    /// Forward model together with its Jacobian w.r.t. the undistorted point.
    fn distort_with_jacobian(&self, point: &Vector2<f64>) -> (Vector2<f64>, Matrix2<f64>) {
        let (k1, k2, p1, p2) = (self.k1, self.k2, self.p1, self.p2);
        let x = point.x;
        let y = point.y;
        let r2 = x * x + y * y;
        let r4 = r2 * r2;

        let radial = 1.0 + k1 * r2 + k2 * r4;
        let distorted = Vector2::new(
            x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x),
            y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y,
        );

        // d(radial)/dx = (k1 + 2 k2 r²) * 2x, and likewise for y
        let d_radial = k1 + 2.0 * k2 * r2;
        let d_radial_dx = d_radial * 2.0 * x;
        let d_radial_dy = d_radial * 2.0 * y;

        let j00 = radial + x * d_radial_dx + 2.0 * p1 * y + 6.0 * p2 * x;
        let j01 = x * d_radial_dy + 2.0 * p1 * x + 2.0 * p2 * y;
        let j10 = y * d_radial_dx + 2.0 * p1 * x + 2.0 * p2 * y;
        let j11 = radial + y * d_radial_dy + 6.0 * p1 * y + 2.0 * p2 * x;

        (distorted, Matrix2::new(j00, j01, j10, j11))
    }
}

impl fmt::Debug for RadialTangentialDistortion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RadialTangentialDistortion [k1: {} k2: {} p1: {} p2: {}]",
            self.k1, self.k2, self.p1, self.p2
        )
    }
}

impl Distortion for RadialTangentialDistortion {
    const NAME: &'static str = "RadialTangential";

    fn distort(&self, point: &Vector2<f64>) -> Vector2<f64> {
        self.distort_with_jacobian(point).0
    }

    /// Newton iteration starting from the distorted point itself.
    ///
    /// When the iteration does not converge, the iterate with the smallest
    /// residual is returned, the starting point included.
    fn undistort_with_status(&self, point: &Vector2<f64>) -> (Vector2<f64>, bool) {
        if self.is_degenerate() {
            return (*point, true);
        }

        let target = *point;
        let mut estimate = target;
        let mut best = (estimate, f64::INFINITY);

        for _ in 0..UNDISTORT_MAX_ITERATIONS {
            let (distorted, jacobian) = self.distort_with_jacobian(&estimate);
            let error = distorted - target;
            let residual = error.norm();
            if residual < best.1 {
                best = (estimate, residual);
            }

            let Some(inv_jacobian) = jacobian.try_inverse() else {
                // singular near extreme distortion
                break;
            };
            let delta = inv_jacobian * error;
            estimate -= delta;

            if !estimate.iter().all(|v| v.is_finite()) {
                break;
            }
            if delta.norm() < UNDISTORT_CONVERGENCE_THRESHOLD {
                return (estimate, true);
            }
        }

        let residual = (self.distort(&estimate) - target).norm();
        if residual < best.1 {
            best = (estimate, residual);
        }
        (best.0, best.1 < UNDISTORT_CONVERGENCE_THRESHOLD.sqrt())
    }

    fn coefficients(&self) -> Vec<f64> {
        vec![self.k1, self.k2, self.p1, self.p2]
    }
}
