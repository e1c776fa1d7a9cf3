//! Camera Calibration Inspector
//!
//! Loads one camera block from a calibration file, prints its parameters and
//! checks that projecting and back-projecting a grid of pixels is consistent.
//!
//! Usage:
//! ```bash
//! cargo run --example camera_info -- \
//!   --calib samples/cameras.yaml \
//!   --camera euroc_cam0
//! ```

use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use vikit_cameras::geometry;
use vikit_cameras::{load_all_from_yaml, load_from_yaml, CameraGeometryBase};

/// Camera calibration inspection tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the calibration YAML file
    #[arg(short = 'c', long)]
    calib: PathBuf,

    /// Name of the camera block to load; all blocks when omitted
    #[arg(short = 'n', long)]
    camera: Option<String>,

    /// Number of sample pixels used for the consistency check (default: 100)
    #[arg(short = 'p', long, default_value = "100")]
    num_points: usize,
}

fn inspect(camera: &dyn CameraGeometryBase, num_points: usize) {
    println!("{}", camera);

    let (pixels, rays) = geometry::sample_points(camera, num_points);
    let mut max_error: f64 = 0.0;
    let mut failures = 0;
    for (pixel, ray) in pixels.column_iter().zip(rays.column_iter()) {
        let pixel = pixel.into_owned();
        match camera.project(&ray.into_owned()) {
            Ok(reprojected) => max_error = max_error.max((reprojected - pixel).norm()),
            Err(e) => {
                warn!("Reprojection of {:?} failed: {}", pixel, e);
                failures += 1;
            }
        }
    }

    println!(
        "  round trip over {} pixels: max error {:.3e} px, {} failures\n",
        pixels.ncols(),
        max_error,
        failures
    );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let cli = Cli::parse();
    info!("Reading calibration from {:?}", cli.calib);

    match &cli.camera {
        Some(name) => {
            let camera = load_from_yaml(&cli.calib, name)?;
            inspect(camera.as_ref(), cli.num_points);
        }
        None => {
            for camera in load_all_from_yaml(&cli.calib)? {
                inspect(camera.as_ref(), cli.num_points);
            }
        }
    }

    Ok(())
}
