//! Camera geometry: distortion functions, pinhole projection and the
//! polymorphic camera handle.
//!
//! The layering is strictly by value: a [`geometry::CameraGeometry`] owns one
//! [`Projection`], and a [`pinhole::PinholeProjection`] owns one
//! [`Distortion`]. Downstream code only ever talks to the object-safe
//! [`CameraGeometryBase`] trait through a [`CameraPtr`].

use nalgebra::{Isometry3, Matrix2xX, Matrix3xX, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub mod atan;
pub mod equidistant;
pub mod geometry;
pub mod no_distortion;
pub mod pinhole;
pub mod rad_tan;

pub use atan::AtanDistortion;
pub use equidistant::EquidistantDistortion;
pub use geometry::{
    CameraGeometry, PinholeAtanGeometry, PinholeEquidistantGeometry, PinholeGeometry,
    PinholeRadTanGeometry,
};
pub use no_distortion::NoDistortion;
pub use pinhole::PinholeProjection;
pub use rad_tan::RadialTangentialDistortion;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

#[derive(thiserror::Error, Debug)]
pub enum CameraModelError {
    #[error("Point is behind the camera (z = {0})")]
    PointBehindCamera(f64),
    #[error("Focal length must be positive")]
    FocalLengthMustBePositive,
    #[error("Principal point must be finite")]
    PrincipalPointMustBeFinite,
    #[error("Image resolution must be positive, got {width}x{height}")]
    InvalidResolution { width: i64, height: i64 },
    #[error("Invalid camera parameters: {0}")]
    InvalidParams(String),
    #[error("Could not load camera from file: {0}")]
    ConfigNotFound(String),
    #[error("Camera with name '{camera}' does not exist in file: {origin}")]
    CameraNotFound { camera: String, origin: String },
    #[error("Camera '{camera}': missing or invalid field '{field}'")]
    MissingField { camera: String, field: String },
    #[error("Camera model '{model}' is not supported: {reason}")]
    UnsupportedModel { model: String, reason: String },
    #[error("Camera model '{0}' doesn't exist")]
    UnknownModel(String),
    #[error("Undistortion did not converge after {0} iterations")]
    NumericNonConvergence(usize),
    #[error("Failed to load YAML: {0}")]
    YamlError(String),
    #[error("IO Error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for CameraModelError {
    fn from(err: std::io::Error) -> Self {
        CameraModelError::IOError(err.to_string())
    }
}

impl From<yaml_rust::ScanError> for CameraModelError {
    fn from(err: yaml_rust::ScanError) -> Self {
        CameraModelError::YamlError(err.to_string())
    }
}

/// A lens distortion acting on normalized image coordinates.
///
/// `undistort` is the approximate inverse of `distort`. Variants without a
/// closed-form inverse solve it iteratively with a bounded number of steps
/// and hand back their best estimate when the bound is hit.
pub trait Distortion: fmt::Debug + Clone + Send + Sync {
    /// Suffix appended to `"Pinhole"` to form the model name, e.g. `"Atan"`.
    const NAME: &'static str;

    /// Applies the forward distortion model.
    fn distort(&self, point: &Vector2<f64>) -> Vector2<f64>;

    /// Inverts the distortion, also reporting whether the solve converged.
    fn undistort_with_status(&self, point: &Vector2<f64>) -> (Vector2<f64>, bool);

    /// Coefficients in configuration order (`cam_d0`, `cam_d1`, ...).
    fn coefficients(&self) -> Vec<f64>;

    /// Inverts the distortion, returning the best estimate even when the
    /// iterative solve did not converge.
    fn undistort(&self, point: &Vector2<f64>) -> Vector2<f64> {
        let (undistorted, converged) = self.undistort_with_status(point);
        if !converged {
            log::debug!(
                "{} undistortion of ({}, {}) did not converge, using best estimate",
                Self::NAME,
                point.x,
                point.y
            );
        }
        undistorted
    }

    /// Inverts the distortion, surfacing non-convergence as an error.
    fn try_undistort(&self, point: &Vector2<f64>) -> Result<Vector2<f64>, CameraModelError> {
        match self.undistort_with_status(point) {
            (undistorted, true) => Ok(undistorted),
            (_, false) => Err(CameraModelError::NumericNonConvergence(
                UNDISTORT_MAX_ITERATIONS,
            )),
        }
    }
}

/// Iteration bound shared by the iterative inverse-distortion solvers.
pub const UNDISTORT_MAX_ITERATIONS: usize = 20;
/// Step size below which an iterative inverse is considered converged.
pub const UNDISTORT_CONVERGENCE_THRESHOLD: f64 = 1e-12;

/// Maps between camera-frame points and pixels.
pub trait Projection: fmt::Debug + Send + Sync {
    /// Projects a camera-frame point to a pixel.
    ///
    /// # Errors
    ///
    /// [`CameraModelError::PointBehindCamera`] when `z <= 0`.
    fn project(&self, point_3d: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError>;

    /// Back-projects a pixel to a ray `(x, y, 1)` in the camera frame. The ray is
    /// not normalized to unit length.
    fn back_project(&self, pixel: &Vector2<f64>) -> Vector3<f64>;

    fn intrinsics(&self) -> Intrinsics;

    fn distortion(&self) -> Vec<f64>;

    /// Model name as used in calibration files, e.g. `"PinholeEquidistant"`.
    fn model_type(&self) -> String;
}

/// Uniform capability set every camera exposes, regardless of the concrete
/// projection and distortion it wraps.
#[allow(non_snake_case)]
pub trait CameraGeometryBase: fmt::Debug + fmt::Display + Send + Sync {
    fn project(&self, point_3d: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError>;

    fn back_project(&self, pixel: &Vector2<f64>) -> Vector3<f64>;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn name(&self) -> &str;

    /// Pose of the camera expressed in the body frame.
    fn T_body_cam(&self) -> &Isometry3<f64>;

    fn model_type(&self) -> String;

    fn intrinsics(&self) -> Intrinsics;

    fn distortion(&self) -> Vec<f64>;

    fn resolution(&self) -> Resolution {
        Resolution {
            width: self.width(),
            height: self.height(),
        }
    }

    /// Pose of the body expressed in the camera frame.
    fn T_cam_body(&self) -> Isometry3<f64> {
        self.T_body_cam().inverse()
    }

    /// True when `pixel` lies inside the image with `margin` pixels of border.
    fn is_keypoint_visible(&self, pixel: &Vector2<f64>, margin: f64) -> bool {
        pixel.x >= margin
            && pixel.y >= margin
            && pixel.x < self.width() as f64 - margin
            && pixel.y < self.height() as f64 - margin
    }

    /// Scale converting an error on the unit plane into pixels.
    fn error_multiplier(&self) -> f64 {
        self.intrinsics().fx.abs()
    }

    /// Angle subtended by a pixel error of `img_err`.
    fn angle_error(&self, img_err: f64) -> f64 {
        let intrinsics = self.intrinsics();
        (img_err / (2.0 * intrinsics.fx)).atan() + (img_err / (2.0 * intrinsics.fy)).atan()
    }

    /// Projects every column of `points_3d`. Columns that cannot be projected
    /// come back as `None`.
    fn project_batch(&self, points_3d: &Matrix3xX<f64>) -> Vec<Option<Vector2<f64>>> {
        points_3d
            .column_iter()
            .map(|column| self.project(&column.into_owned()).ok())
            .collect()
    }

    /// Back-projects every column of `pixels` into a bearing matrix.
    fn back_project_batch(&self, pixels: &Matrix2xX<f64>) -> Matrix3xX<f64> {
        let mut rays = Matrix3xX::zeros(pixels.ncols());
        for (i, column) in pixels.column_iter().enumerate() {
            rays.set_column(i, &self.back_project(&column.into_owned()));
        }
        rays
    }
}

/// Shared, read-only handle to a constructed camera.
pub type CameraPtr = Arc<dyn CameraGeometryBase>;

/// Common validation functions for camera parameters
pub mod validation {
    use super::*;

    pub fn validate_intrinsics(intrinsics: &Intrinsics) -> Result<(), CameraModelError> {
        if !(intrinsics.fx > 0.0 && intrinsics.fy > 0.0) {
            return Err(CameraModelError::FocalLengthMustBePositive);
        }
        if !intrinsics.cx.is_finite() || !intrinsics.cy.is_finite() {
            return Err(CameraModelError::PrincipalPointMustBeFinite);
        }
        Ok(())
    }

    pub fn validate_resolution(width: i64, height: i64) -> Result<Resolution, CameraModelError> {
        if width <= 0 || height <= 0 || width > u32::MAX as i64 || height > u32::MAX as i64 {
            return Err(CameraModelError::InvalidResolution { width, height });
        }
        Ok(Resolution {
            width: width as u32,
            height: height as u32,
        })
    }

    pub fn validate_coefficients(coefficients: &[f64]) -> Result<(), CameraModelError> {
        if let Some(i) = coefficients.iter().position(|d| !d.is_finite()) {
            return Err(CameraModelError::InvalidParams(format!(
                "Distortion coefficient d{} is not finite",
                i
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::validation::*;
    use super::*;

    #[test]
    fn test_validate_intrinsics() {
        let good = Intrinsics {
            fx: 300.0,
            fy: 300.0,
            cx: 320.0,
            cy: 240.0,
        };
        assert!(validate_intrinsics(&good).is_ok());

        let zero_focal = Intrinsics { fx: 0.0, ..good };
        assert!(matches!(
            validate_intrinsics(&zero_focal),
            Err(CameraModelError::FocalLengthMustBePositive)
        ));

        let nan_focal = Intrinsics { fy: f64::NAN, ..good };
        assert!(validate_intrinsics(&nan_focal).is_err());

        let bad_center = Intrinsics {
            cx: f64::INFINITY,
            ..good
        };
        assert!(matches!(
            validate_intrinsics(&bad_center),
            Err(CameraModelError::PrincipalPointMustBeFinite)
        ));
    }

    #[test]
    fn test_validate_resolution() {
        let resolution = validate_resolution(640, 480).unwrap();
        assert_eq!(resolution.width, 640);
        assert_eq!(resolution.height, 480);
        assert!(validate_resolution(0, 480).is_err());
        assert!(validate_resolution(640, -1).is_err());
    }

    #[test]
    fn test_validate_coefficients() {
        assert!(validate_coefficients(&[0.1, -0.2, 0.0, 0.0]).is_ok());
        assert!(validate_coefficients(&[0.1, f64::NAN]).is_err());
    }
}
