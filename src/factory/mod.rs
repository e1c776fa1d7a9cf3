//! Builds cameras from calibration data.
//!
//! A calibration file is a YAML mapping of named camera blocks:
//!
//! ```yaml
//! cam0:
//!   cam_model: PinholeRadialTangential
//!   cam_width: 752
//!   cam_height: 480
//!   cam_fx: 458.654
//!   cam_fy: 457.296
//!   cam_cx: 367.215
//!   cam_cy: 248.375
//!   cam_d0: -0.28340811
//!   cam_d1: 0.07395907
//!   cam_d2: 0.00019359
//!   cam_d3: 1.76187114e-05
//!   T_body_cam: {qw: 1.0, qx: 0.0, qy: 0.0, qz: 0.0, tx: 0.0, ty: 0.0, tz: 0.0}
//! ```
//!
//! Extrinsics are read from `T_body_cam` when present, otherwise `T_cam_body`
//! is read and inverted, otherwise they default to identity. When a block
//! carries both, `T_body_cam` wins and a warning is logged.
//!
//! A `PinholeRadialTangential` block whose four coefficients are all zero is
//! loaded as `PinholeNoDistortion`.
//!
//! Every failure is logged with the file and camera name and returned as a
//! [`CameraModelError`]; nothing here panics on bad input.

use crate::camera::{
    validation, AtanDistortion, CameraGeometry, CameraGeometryBase, CameraModelError, CameraPtr,
    Distortion, EquidistantDistortion, NoDistortion, PinholeProjection,
    RadialTangentialDistortion,
};
use crate::geometry::{pose_from_quaternion_translation, pose_to_quaternion_translation, Pose};
use log::{debug, error, info, warn};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::sync::Arc;
use yaml_rust::{Yaml, YamlLoader};

pub const PINHOLE_NO_DISTORTION: &str = "PinholeNoDistortion";
pub const PINHOLE_RADIAL_TANGENTIAL: &str = "PinholeRadialTangential";
pub const PINHOLE_EQUIDISTANT: &str = "PinholeEquidistant";
pub const PINHOLE_ATAN: &str = "PinholeAtan";

const IN_MEMORY_ORIGIN: &str = "<memory>";
const DISTORTION_KEYS: [&str; 4] = ["cam_d0", "cam_d1", "cam_d2", "cam_d3"];
const POSE_KEYS: [&str; 7] = ["qw", "qx", "qy", "qz", "tx", "ty", "tz"];

/// Creates an undistorted pinhole camera named `"camera"` with identity extrinsics.
///
/// # Examples
///
/// ```rust
/// use nalgebra::Vector3;
/// use vikit_cameras::factory::make_pinhole_camera;
///
/// let camera = make_pinhole_camera(640, 480, 300.0, 300.0, 320.0, 240.0).unwrap();
/// let pixel = camera.project(&Vector3::new(0.0, 0.0, 1.0)).unwrap();
/// assert_eq!((pixel.x, pixel.y), (320.0, 240.0));
/// ```
pub fn make_pinhole_camera(
    width: u32,
    height: u32,
    fx: f64,
    fy: f64,
    cx: f64,
    cy: f64,
) -> Result<CameraPtr, CameraModelError> {
    let camera = CameraGeometry::new(
        width,
        height,
        "camera",
        Pose::identity(),
        PinholeProjection::new(fx, fy, cx, cy, NoDistortion)?,
    )?;
    Ok(Arc::new(camera))
}

/// Loads the camera block `cam_name` from the YAML file at `path`.
///
/// # Errors
///
/// * [`CameraModelError::ConfigNotFound`]: the file does not exist or holds no document.
/// * [`CameraModelError::CameraNotFound`]: the file has no block named `cam_name`.
/// * [`CameraModelError::MissingField`]: a required key is absent or has the wrong type.
/// * [`CameraModelError::UnsupportedModel`] / [`CameraModelError::UnknownModel`]:
///   `cam_model` names no constructible model.
/// * Validation errors for non-positive focal lengths or image sizes.
pub fn load_from_yaml<P: AsRef<Path>>(
    path: P,
    cam_name: &str,
) -> Result<CameraPtr, CameraModelError> {
    let origin = path.as_ref().display().to_string();
    let result = read_document(path.as_ref())
        .and_then(|doc| camera_from_document(&doc, cam_name, &origin));
    report(result, &origin, cam_name)
}

/// Same as [`load_from_yaml`], reading the YAML from a string.
pub fn load_from_yaml_str(contents: &str, cam_name: &str) -> Result<CameraPtr, CameraModelError> {
    let result = parse_document(contents, IN_MEMORY_ORIGIN)
        .and_then(|doc| camera_from_document(&doc, cam_name, IN_MEMORY_ORIGIN));
    report(result, IN_MEMORY_ORIGIN, cam_name)
}

/// Loads every camera block in the file at `path`.
///
/// Blocks that fail to load are logged and skipped, so the result may be
/// shorter than the number of blocks in the file.
pub fn load_all_from_yaml<P: AsRef<Path>>(path: P) -> Result<Vec<CameraPtr>, CameraModelError> {
    let origin = path.as_ref().display().to_string();
    let doc = report(read_document(path.as_ref()), &origin, "*")?;

    let blocks = doc.as_hash().ok_or_else(|| {
        let err =
            CameraModelError::ConfigNotFound(format!("{} is not a mapping of cameras", origin));
        error!("Camera Factory: {}", err);
        err
    })?;

    let cameras = blocks
        .keys()
        .filter_map(Yaml::as_str)
        .filter_map(|cam_name| {
            report(camera_from_document(&doc, cam_name, &origin), &origin, cam_name).ok()
        })
        .collect::<Vec<_>>();
    info!(
        "Camera Factory: loaded {} of {} cameras from {}",
        cameras.len(),
        blocks.len(),
        origin
    );
    Ok(cameras)
}

/// Serializes `camera` as a camera block named after the camera.
pub fn to_yaml_string(camera: &dyn CameraGeometryBase) -> Result<String, CameraModelError> {
    use serde_yaml::{Mapping, Value};

    let intrinsics = camera.intrinsics();
    let (q, t) = pose_to_quaternion_translation(camera.T_body_cam());

    let mut block = Mapping::new();
    block.insert("cam_model".into(), Value::String(camera.model_type()));
    block.insert("cam_width".into(), camera.width().into());
    block.insert("cam_height".into(), camera.height().into());
    block.insert("cam_fx".into(), intrinsics.fx.into());
    block.insert("cam_fy".into(), intrinsics.fy.into());
    block.insert("cam_cx".into(), intrinsics.cx.into());
    block.insert("cam_cy".into(), intrinsics.cy.into());
    for (key, value) in DISTORTION_KEYS.iter().zip(camera.distortion()) {
        block.insert((*key).into(), value.into());
    }
    let pose = Mapping::from_iter(
        POSE_KEYS
            .iter()
            .zip(q.iter().chain(t.iter()))
            .map(|(key, value)| (Value::from(*key), Value::from(*value))),
    );
    block.insert("T_body_cam".into(), Value::Mapping(pose));

    let yaml = Mapping::from_iter([(
        Value::String(camera.name().to_string()),
        Value::Mapping(block),
    )]);
    serde_yaml::to_string(&yaml).map_err(|e| CameraModelError::YamlError(e.to_string()))
}

/// Saves `camera` to a YAML file that [`load_from_yaml`] reads back.
pub fn save_to_yaml<P: AsRef<Path>>(
    camera: &dyn CameraGeometryBase,
    path: P,
) -> Result<(), CameraModelError> {
    let yaml_string = to_yaml_string(camera)?;
    let mut file = fs::File::create(path.as_ref())?;
    file.write_all(yaml_string.as_bytes())?;
    info!(
        "Camera Factory: saved '{}' to {}",
        camera.name(),
        path.as_ref().display()
    );
    Ok(())
}

fn report<T>(
    result: Result<T, CameraModelError>,
    origin: &str,
    cam_name: &str,
) -> Result<T, CameraModelError> {
    if let Err(err) = &result {
        error!(
            "Camera Factory: {} [file: {}, camera: {}]",
            err, origin, cam_name
        );
    }
    result
}

fn read_document(path: &Path) -> Result<Yaml, CameraModelError> {
    let origin = path.display().to_string();
    let contents = fs::read_to_string(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => CameraModelError::ConfigNotFound(origin.clone()),
        _ => CameraModelError::from(err),
    })?;
    parse_document(&contents, &origin)
}

fn parse_document(contents: &str, origin: &str) -> Result<Yaml, CameraModelError> {
    let docs = YamlLoader::load_from_str(contents)?;
    match docs.into_iter().next() {
        Some(doc) if !doc.is_null() && !doc.is_badvalue() => Ok(doc),
        _ => Err(CameraModelError::ConfigNotFound(origin.to_string())),
    }
}

/// Selects the block `cam_name` and builds the camera it describes.
#[allow(non_snake_case)]
fn camera_from_document(
    doc: &Yaml,
    cam_name: &str,
    origin: &str,
) -> Result<CameraPtr, CameraModelError> {
    let data = &doc[cam_name];
    if data.is_badvalue() || data.is_null() {
        return Err(CameraModelError::CameraNotFound {
            camera: cam_name.to_string(),
            origin: origin.to_string(),
        });
    }
    let block = CameraBlock { data, cam_name };

    let T_body_cam = block.extrinsics()?;

    let model = block.required_str("cam_model")?;
    let camera = match model {
        PINHOLE_NO_DISTORTION => block.build(T_body_cam, NoDistortion)?,
        PINHOLE_RADIAL_TANGENTIAL => {
            let [d0, d1, d2, d3] = block.coefficients()?;
            let distortion = RadialTangentialDistortion::new(d0, d1, d2, d3);
            if distortion.is_degenerate() {
                debug!(
                    "Camera Factory: '{}' has zero distortion, using {}",
                    cam_name, PINHOLE_NO_DISTORTION
                );
                block.build(T_body_cam, NoDistortion)?
            } else {
                block.build(T_body_cam, distortion)?
            }
        }
        PINHOLE_EQUIDISTANT => {
            let [d0, d1, d2, d3] = block.coefficients()?;
            block.build(T_body_cam, EquidistantDistortion::new(d0, d1, d2, d3))?
        }
        PINHOLE_ATAN => {
            let [d0, ..] = block.coefficients()?;
            block.build(T_body_cam, AtanDistortion::new(d0))?
        }
        "Pinhole" => {
            return Err(CameraModelError::UnsupportedModel {
                model: model.to_string(),
                reason: format!(
                    "select between '{}' and '{}'",
                    PINHOLE_NO_DISTORTION, PINHOLE_RADIAL_TANGENTIAL
                ),
            })
        }
        "OCam" => {
            return Err(CameraModelError::UnsupportedModel {
                model: model.to_string(),
                reason: "OCam model not yet implemented".to_string(),
            })
        }
        _ => return Err(CameraModelError::UnknownModel(model.to_string())),
    };

    info!(
        "Camera Factory: loaded '{}' ({}) from {}",
        cam_name,
        camera.model_type(),
        origin
    );
    Ok(camera)
}

/// Typed access to the keys of one camera block.
struct CameraBlock<'a> {
    data: &'a Yaml,
    cam_name: &'a str,
}

impl<'a> CameraBlock<'a> {
    fn missing(&self, field: &str) -> CameraModelError {
        CameraModelError::MissingField {
            camera: self.cam_name.to_string(),
            field: field.to_string(),
        }
    }

    fn required_str(&self, key: &str) -> Result<&'a str, CameraModelError> {
        self.data[key].as_str().ok_or_else(|| self.missing(key))
    }

    fn required_i64(&self, key: &str) -> Result<i64, CameraModelError> {
        self.data[key].as_i64().ok_or_else(|| self.missing(key))
    }

    fn required_f64(&self, key: &str) -> Result<f64, CameraModelError> {
        self.optional_f64(key)?.ok_or_else(|| self.missing(key))
    }

    /// `Ok(None)` when the key is absent, an error when it holds a non-number.
    fn optional_f64(&self, key: &str) -> Result<Option<f64>, CameraModelError> {
        float_value(&self.data[key], key).map_err(|field| self.missing(&field))
    }

    /// `cam_d0..cam_d3`, each defaulting to zero when absent.
    fn coefficients(&self) -> Result<[f64; 4], CameraModelError> {
        let mut coefficients = [0.0; 4];
        for (coefficient, key) in coefficients.iter_mut().zip(DISTORTION_KEYS) {
            *coefficient = self.optional_f64(key)?.unwrap_or(0.0);
        }
        Ok(coefficients)
    }

    #[allow(non_snake_case)]
    fn extrinsics(&self) -> Result<Pose, CameraModelError> {
        let T_body_cam = self.pose("T_body_cam")?;
        let T_cam_body = self.pose("T_cam_body")?;
        match (T_body_cam, T_cam_body) {
            (Some(T_body_cam), Some(_)) => {
                warn!(
                    "Camera Factory: '{}' defines both T_body_cam and T_cam_body, \
                     ignoring T_cam_body",
                    self.cam_name
                );
                Ok(T_body_cam)
            }
            (Some(T_body_cam), None) => Ok(T_body_cam),
            (None, Some(T_cam_body)) => Ok(T_cam_body.inverse()),
            (None, None) => Ok(Pose::identity()),
        }
    }

    fn pose(&self, key: &str) -> Result<Option<Pose>, CameraModelError> {
        let node = &self.data[key];
        if node.is_badvalue() || node.is_null() {
            return Ok(None);
        }
        let mut values = [0.0; 7];
        for (value, component) in values.iter_mut().zip(POSE_KEYS) {
            *value = float_value(&node[component], component)
                .ok()
                .flatten()
                .ok_or_else(|| self.missing(&format!("{}.{}", key, component)))?;
        }
        let [qw, qx, qy, qz, tx, ty, tz] = values;
        pose_from_quaternion_translation(qw, qx, qy, qz, tx, ty, tz)
            .map(Some)
            .ok_or_else(|| {
                CameraModelError::InvalidParams(format!(
                    "'{}': {} is not a valid rigid transform",
                    self.cam_name, key
                ))
            })
    }

    #[allow(non_snake_case)]
    fn build<D: Distortion + 'static>(
        &self,
        T_body_cam: Pose,
        distortion: D,
    ) -> Result<CameraPtr, CameraModelError> {
        let resolution = validation::validate_resolution(
            self.required_i64("cam_width")?,
            self.required_i64("cam_height")?,
        )?;
        let projection = PinholeProjection::new(
            self.required_f64("cam_fx")?,
            self.required_f64("cam_fy")?,
            self.required_f64("cam_cx")?,
            self.required_f64("cam_cy")?,
            distortion,
        )?;
        let camera = CameraGeometry::new(
            resolution.width,
            resolution.height,
            self.cam_name,
            T_body_cam,
            projection,
        )?;
        Ok(Arc::new(camera))
    }
}

/// Reads a YAML scalar as a float, accepting integers. Absent keys give `Ok(None)`.
fn float_value(node: &Yaml, key: &str) -> Result<Option<f64>, String> {
    match node {
        Yaml::BadValue | Yaml::Null => Ok(None),
        Yaml::Integer(value) => Ok(Some(*value as f64)),
        Yaml::Real(_) => node.as_f64().map(Some).ok_or_else(|| key.to_string()),
        _ => Err(key.to_string()),
    }
}
