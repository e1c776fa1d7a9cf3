//! Vikit Cameras Library
//!
//! Camera geometry for visual odometry and SLAM pipelines. A camera maps 3D
//! points in its own frame to pixels and back, through a pinhole projection
//! combined with one of these lens distortions:
//! - No distortion
//! - Radial-Tangential
//! - Equidistant (fisheye)
//! - Atan (FOV)
//!
//! Cameras are built from YAML calibration files by the [`factory`] and used
//! through the [`CameraGeometryBase`] trait, so tracking and pose estimation
//! code never depends on the concrete model. The [`robust_cost`] module holds
//! the M-estimators used by optimizers working on reprojection errors.

pub mod camera;
pub mod factory;
pub mod geometry;
pub mod robust_cost;

// Re-export commonly used types
pub use camera::{
    AtanDistortion, CameraGeometry, CameraGeometryBase, CameraModelError, CameraPtr, Distortion,
    EquidistantDistortion, Intrinsics, NoDistortion, PinholeProjection, Projection,
    RadialTangentialDistortion, Resolution,
};

pub use factory::{load_all_from_yaml, load_from_yaml, make_pinhole_camera, save_to_yaml};
pub use geometry::Pose;
