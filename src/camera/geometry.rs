//! The concrete camera type wrapping a projection with image size, name and
//! extrinsics.

use crate::camera::{
    validation, AtanDistortion, CameraGeometryBase, CameraModelError, EquidistantDistortion,
    Intrinsics, NoDistortion, PinholeProjection, Projection, RadialTangentialDistortion,
    Resolution,
};
use nalgebra::{Isometry3, Vector2, Vector3};
use std::fmt;

/// A calibrated camera: projection `P`, image resolution, name and the pose
/// `T_body_cam` of the camera in the sensor body frame.
#[allow(non_snake_case)]
#[derive(Debug, Clone)]
pub struct CameraGeometry<P> {
    pub resolution: Resolution,
    pub name: String,
    pub T_body_cam: Isometry3<f64>,
    pub projection: P,
}

pub type PinholeGeometry = CameraGeometry<PinholeProjection<NoDistortion>>;
pub type PinholeRadTanGeometry = CameraGeometry<PinholeProjection<RadialTangentialDistortion>>;
pub type PinholeEquidistantGeometry = CameraGeometry<PinholeProjection<EquidistantDistortion>>;
pub type PinholeAtanGeometry = CameraGeometry<PinholeProjection<AtanDistortion>>;

impl<P: Projection> CameraGeometry<P> {
    /// # Errors
    ///
    /// [`CameraModelError::InvalidResolution`] if `width` or `height` is zero.
    #[allow(non_snake_case)]
    pub fn new(
        width: u32,
        height: u32,
        name: impl Into<String>,
        T_body_cam: Isometry3<f64>,
        projection: P,
    ) -> Result<Self, CameraModelError> {
        let resolution = validation::validate_resolution(width as i64, height as i64)?;
        Ok(CameraGeometry {
            resolution,
            name: name.into(),
            T_body_cam,
            projection,
        })
    }
}

impl<P: Projection> CameraGeometryBase for CameraGeometry<P> {
    fn project(&self, point_3d: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError> {
        self.projection.project(point_3d)
    }

    fn back_project(&self, pixel: &Vector2<f64>) -> Vector3<f64> {
        self.projection.back_project(pixel)
    }

    fn width(&self) -> u32 {
        self.resolution.width
    }

    fn height(&self) -> u32 {
        self.resolution.height
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn T_body_cam(&self) -> &Isometry3<f64> {
        &self.T_body_cam
    }

    fn model_type(&self) -> String {
        self.projection.model_type()
    }

    fn intrinsics(&self) -> Intrinsics {
        self.projection.intrinsics()
    }

    fn distortion(&self) -> Vec<f64> {
        self.projection.distortion()
    }
}

impl<P: Projection> fmt::Display for CameraGeometry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let intrinsics = self.projection.intrinsics();
        let rotation = self.T_body_cam.rotation.quaternion();
        let translation = self.T_body_cam.translation.vector;
        writeln!(f, "Camera: {}", self.name)?;
        writeln!(f, "  model = {}", self.projection.model_type())?;
        writeln!(
            f,
            "  resolution = {}x{}",
            self.resolution.width, self.resolution.height
        )?;
        writeln!(
            f,
            "  focal length = ({}, {})",
            intrinsics.fx, intrinsics.fy
        )?;
        writeln!(
            f,
            "  principal point = ({}, {})",
            intrinsics.cx, intrinsics.cy
        )?;
        writeln!(f, "  distortion = {:?}", self.projection.distortion())?;
        writeln!(
            f,
            "  T_body_cam q = [w: {}, x: {}, y: {}, z: {}]",
            rotation.w, rotation.i, rotation.j, rotation.k
        )?;
        write!(
            f,
            "  T_body_cam t = [{}, {}, {}]",
            translation.x, translation.y, translation.z
        )
    }
}
