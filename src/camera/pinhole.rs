//! Implements the pinhole projection.
//!
//! This module provides the [`PinholeProjection`] struct, which combines the
//! focal lengths and principal point of a camera with one of the
//! [`Distortion`] models defined in the parent `camera` module
//! ([`crate::camera`]).

use crate::camera::{validation, CameraModelError, Distortion, Intrinsics, Projection};
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Pinhole projection with lens distortion `D`.
///
/// # Examples
///
/// ```rust
/// use nalgebra::Vector3;
/// use vikit_cameras::camera::{NoDistortion, PinholeProjection, Projection};
///
/// let projection = PinholeProjection::new(500.0, 500.0, 320.0, 240.0, NoDistortion).unwrap();
/// let pixel = projection.project(&Vector3::new(0.1, 0.2, 1.0)).unwrap();
/// // u = 500 * 0.1 + 320, v = 500 * 0.2 + 240
/// assert!((pixel.x - 370.0).abs() < 1e-9);
/// assert!((pixel.y - 340.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinholeProjection<D> {
    /// The intrinsic parameters of the camera, [`Intrinsics`] (fx, fy, cx, cy).
    pub intrinsics: Intrinsics,
    /// The lens distortion applied on the normalized image plane.
    pub distortion: D,
}

impl<D: Distortion> PinholeProjection<D> {
    /// Creates a new [`PinholeProjection`].
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::FocalLengthMustBePositive`]
    /// * [`CameraModelError::PrincipalPointMustBeFinite`]
    /// * [`CameraModelError::InvalidParams`] if a distortion coefficient is not finite.
    pub fn new(
        fx: f64,
        fy: f64,
        cx: f64,
        cy: f64,
        distortion: D,
    ) -> Result<Self, CameraModelError> {
        let projection = PinholeProjection {
            intrinsics: Intrinsics { fx, fy, cx, cy },
            distortion,
        };
        projection.validate_params()?;
        Ok(projection)
    }

    pub fn validate_params(&self) -> Result<(), CameraModelError> {
        validation::validate_intrinsics(&self.intrinsics)?;
        validation::validate_coefficients(&self.distortion.coefficients())?;
        Ok(())
    }

    /// Maps distorted normalized coordinates to pixels.
    fn to_pixel(&self, normalized: &Vector2<f64>) -> Vector2<f64> {
        Vector2::new(
            self.intrinsics.fx * normalized.x + self.intrinsics.cx,
            self.intrinsics.fy * normalized.y + self.intrinsics.cy,
        )
    }

    /// Maps pixels to distorted normalized coordinates.
    fn from_pixel(&self, pixel: &Vector2<f64>) -> Vector2<f64> {
        Vector2::new(
            (pixel.x - self.intrinsics.cx) / self.intrinsics.fx,
            (pixel.y - self.intrinsics.cy) / self.intrinsics.fy,
        )
    }
}

impl<D: Distortion> Projection for PinholeProjection<D> {
    /// Projects a 3D point from camera coordinates to pixel coordinates.
    ///
    /// The point is normalized by its depth, distorted, and then mapped through
    /// the intrinsics: `u = fx * x' + cx`, `v = fy * y' + cy`.
    ///
    /// Pixels outside the image are not rejected here; check them against
    /// the camera bounds where that matters.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::PointBehindCamera`]: if `z <= 0` (or is NaN).
    fn project(&self, point_3d: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError> {
        if point_3d.z.is_nan() || point_3d.z <= 0.0 {
            return Err(CameraModelError::PointBehindCamera(point_3d.z));
        }
        let normalized = Vector2::new(point_3d.x / point_3d.z, point_3d.y / point_3d.z);
        Ok(self.to_pixel(&self.distortion.distort(&normalized)))
    }

    /// Back-projects a pixel to the ray `(x, y, 1)` through it.
    fn back_project(&self, pixel: &Vector2<f64>) -> Vector3<f64> {
        let undistorted = self.distortion.undistort(&self.from_pixel(pixel));
        Vector3::new(undistorted.x, undistorted.y, 1.0)
    }

    fn intrinsics(&self) -> Intrinsics {
        self.intrinsics
    }

    fn distortion(&self) -> Vec<f64> {
        self.distortion.coefficients()
    }

    fn model_type(&self) -> String {
        format!("Pinhole{}", D::NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{
        AtanDistortion, EquidistantDistortion, NoDistortion, RadialTangentialDistortion,
    };
    use approx::assert_abs_diff_eq;

    fn sample_points() -> Vec<Vector3<f64>> {
        vec![
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(0.5, 0.0, 1.0),
            Vector3::new(-0.5, 0.0, 1.0),
            Vector3::new(0.0, 0.5, 1.0),
            Vector3::new(0.3, -0.4, 1.0),
            Vector3::new(-0.3, 0.4, 1.0),
            Vector3::new(1.0, 1.0, 5.0),
            Vector3::new(0.1, 0.1, 2.0),
        ]
    }

    fn check_round_trip<D: Distortion>(projection: &PinholeProjection<D>) {
        for point in sample_points() {
            let pixel = projection.project(&point).unwrap();
            let ray = projection.back_project(&pixel);
            assert_abs_diff_eq!(ray.z, 1.0);
            let ray = ray.normalize();
            let expected = point.normalize();
            assert_abs_diff_eq!(ray.x, expected.x, epsilon = 1e-6);
            assert_abs_diff_eq!(ray.y, expected.y, epsilon = 1e-6);
            assert_abs_diff_eq!(ray.z, expected.z, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_pinhole_project_center() {
        let projection = PinholeProjection::new(300.0, 300.0, 320.0, 240.0, NoDistortion).unwrap();
        let pixel = projection.project(&Vector3::new(0.0, 0.0, 1.0)).unwrap();
        assert_eq!(pixel, Vector2::new(320.0, 240.0));
    }

    #[test]
    fn test_pinhole_back_project_is_unnormalized() {
        let projection = PinholeProjection::new(500.0, 500.0, 320.0, 240.0, NoDistortion).unwrap();
        let ray = projection.back_project(&Vector2::new(370.0, 340.0));
        assert_abs_diff_eq!(ray.x, 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(ray.y, 0.2, epsilon = 1e-12);
        assert_eq!(ray.z, 1.0);
    }

    #[test]
    fn test_pinhole_rejects_points_behind_camera() {
        let projection = PinholeProjection::new(300.0, 300.0, 320.0, 240.0, NoDistortion).unwrap();
        for z in [0.0, -1.0, f64::NAN] {
            let result = projection.project(&Vector3::new(0.1, 0.1, z));
            assert!(matches!(result, Err(CameraModelError::PointBehindCamera(_))));
        }
    }

    #[test]
    fn test_pinhole_rejects_invalid_intrinsics() {
        assert!(matches!(
            PinholeProjection::new(-1.0, 300.0, 320.0, 240.0, NoDistortion),
            Err(CameraModelError::FocalLengthMustBePositive)
        ));
        assert!(matches!(
            PinholeProjection::new(300.0, 300.0, f64::NAN, 240.0, NoDistortion),
            Err(CameraModelError::PrincipalPointMustBeFinite)
        ));
        assert!(matches!(
            PinholeProjection::new(300.0, 300.0, 320.0, 240.0, AtanDistortion::new(f64::NAN)),
            Err(CameraModelError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_pinhole_round_trip_all_distortions() {
        check_round_trip(
            &PinholeProjection::new(461.629, 460.152, 362.680, 246.049, NoDistortion).unwrap(),
        );
        check_round_trip(
            &PinholeProjection::new(
                461.629,
                460.152,
                362.680,
                246.049,
                RadialTangentialDistortion::new(
                    -0.28340811,
                    0.07395907,
                    0.00019359,
                    1.76187114e-05,
                ),
            )
            .unwrap(),
        );
        check_round_trip(
            &PinholeProjection::new(
                190.97,
                190.97,
                254.93,
                256.89,
                EquidistantDistortion::new(0.0034, 0.0007, -0.0020, 0.0002),
            )
            .unwrap(),
        );
        check_round_trip(
            &PinholeProjection::new(280.0, 280.0, 376.0, 240.0, AtanDistortion::new(0.93)).unwrap(),
        );
    }

    #[test]
    fn test_pinhole_model_type() {
        let projection = PinholeProjection::new(1.0, 1.0, 0.0, 0.0, NoDistortion).unwrap();
        assert_eq!(projection.model_type(), "PinholeNoDistortion");
        let fisheye = EquidistantDistortion::new(0.0, 0.0, 0.0, 0.0);
        let projection = PinholeProjection::new(1.0, 1.0, 0.0, 0.0, fisheye).unwrap();
        assert_eq!(projection.model_type(), "PinholeEquidistant");
        assert_eq!(projection.distortion(), vec![0.0; 4]);
    }
}
