//! Rigid-transform helpers and pixel sampling shared by the factory, the demo
//! and the tests.

use crate::camera::CameraGeometryBase;
use nalgebra::{
    Isometry3, Matrix2xX, Matrix3xX, Quaternion, Translation3, UnitQuaternion, Vector2,
};

/// Rigid body transform used for camera extrinsics.
pub type Pose = Isometry3<f64>;

/// Builds a pose from a (not necessarily normalized) quaternion and a translation.
///
/// The quaternion is normalized, so the rotation part is always orthonormal.
/// Returns `None` when the quaternion has zero or non-finite norm, or the
/// translation is not finite.
pub fn pose_from_quaternion_translation(
    qw: f64,
    qx: f64,
    qy: f64,
    qz: f64,
    tx: f64,
    ty: f64,
    tz: f64,
) -> Option<Pose> {
    let quaternion = Quaternion::new(qw, qx, qy, qz);
    let norm = quaternion.norm();
    if !norm.is_finite() || norm < f64::EPSILON {
        return None;
    }
    let translation = Translation3::new(tx, ty, tz);
    if !translation.vector.iter().all(|v| v.is_finite()) {
        return None;
    }
    let rotation = UnitQuaternion::from_quaternion(quaternion);
    Some(Isometry3::from_parts(translation, rotation))
}

/// Splits a pose into `[qw, qx, qy, qz]` and `[tx, ty, tz]`.
pub fn pose_to_quaternion_translation(pose: &Pose) -> ([f64; 4], [f64; 3]) {
    let q = pose.rotation.quaternion();
    let t = pose.translation.vector;
    ([q.w, q.i, q.j, q.k], [t.x, t.y, t.z])
}

/// Generate a grid of sample pixels evenly distributed across the image of
/// `camera`, together with their back-projected rays.
///
/// # Arguments
///
/// * `camera` - The camera whose image is sampled
/// * `n` - The approximate number of points to generate
///
/// # Returns
///
/// * A tuple of a Matrix2xX of pixel coordinates and a Matrix3xX of the
///   corresponding unnormalized rays `(x, y, 1)`.
pub fn sample_points<T>(camera: &T, n: usize) -> (Matrix2xX<f64>, Matrix3xX<f64>)
where
    T: ?Sized + CameraGeometryBase,
{
    let width = camera.width() as f64;
    let height = camera.height() as f64;

    // Calculate the number of cells in each dimension
    let num_cells_x = ((n as f64 * (width / height)).sqrt().round() as usize).max(1);
    let num_cells_y = ((n as f64 * (height / width)).sqrt().round() as usize).max(1);

    let cell_width = width / num_cells_x as f64;
    let cell_height = height / num_cells_y as f64;

    let mut pixels = Matrix2xX::zeros(num_cells_x * num_cells_y);

    // Generate a point at the center of each cell
    let mut idx = 0;
    for i in 0..num_cells_y {
        for j in 0..num_cells_x {
            let x = (j as f64 + 0.5) * cell_width;
            let y = (i as f64 + 0.5) * cell_height;
            pixels.set_column(idx, &Vector2::new(x, y));
            idx += 1;
        }
    }

    let rays = camera.back_project_batch(&pixels);
    (pixels, rays)
}
