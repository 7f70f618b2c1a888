use std::io::BufReader;
use std::path::Path;

use image::io::Reader as ImageReader;
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use base::defs::{Error, ErrorKind::*, IntoResult, Result};
use base::util::fs;

use crate::{Matrix3, Matrix4, Point3, Vector2};

/// A calibrated, posed photograph of the scanned surface.
///
/// The intrinsic matrix maps camera coordinates to pixel coordinates,
/// the extrinsic matrix maps world coordinates to camera coordinates
/// (camera looks along +Z, depth grows away from the sensor).
#[derive(Debug)]
pub struct TextureView {
    pub image: RgbImage,
    pub intrinsic: Matrix3,
    pub world_to_camera: Matrix4,
}

#[derive(Clone, Copy)]
pub struct ProjectedPoint {
    pub pixel: Vector2,
    pub depth: f64,
}

impl TextureView {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn project(&self, point: &Point3) -> ProjectedPoint {
        let cam = self.world_to_camera * point.to_homogeneous();
        let hom = self.intrinsic * cam.xyz();
        ProjectedPoint {
            pixel: Vector2::new(hom[0] / hom[2], hom[1] / hom[2]),
            depth: cam[2],
        }
    }

    pub fn camera_position(&self) -> Point3 {
        let rot = self.world_to_camera.fixed_slice::<3, 3>(0, 0);
        let trans = self.world_to_camera.fixed_slice::<3, 1>(0, 3);
        Point3::from(-(rot.transpose() * trans))
    }

    pub fn contains_pixel(&self, pixel: Vector2, margin: f64) -> bool {
        pixel[0] >= margin
            && pixel[0] <= self.width() as f64 - 1.0 - margin
            && pixel[1] >= margin
            && pixel[1] <= self.height() as f64 - 1.0 - margin
    }
}

#[derive(Deserialize, Serialize)]
struct ViewDescription {
    image: String,
    intrinsic: [f64; 9],
    extrinsic: [f64; 16],
}

#[derive(Deserialize, Serialize)]
struct SceneDescription {
    views: Vec<ViewDescription>,
}

/// Loads a scene description file referencing per-view images
/// relative to its own directory.
pub fn load_scene<P: AsRef<Path>>(path: P) -> Result<Vec<TextureView>> {
    let path = path.as_ref();
    let file = fs::open_file(path)?;
    let desc: SceneDescription = serde_json::from_reader(BufReader::new(file))
        .res(|| format!("failed to parse scene file '{}'", path.display()))?;

    if desc.views.is_empty() {
        let desc = format!("scene '{}' contains no views", path.display());
        return Err(Error::new(InconsistentState, desc));
    }

    let scene_dir = path.parent().unwrap_or_else(|| ".".as_ref());

    let mut views = Vec::with_capacity(desc.views.len());
    for view in &desc.views {
        let image_path = scene_dir.join(&view.image);
        let image = ImageReader::open(&image_path)
            .res(|| {
                format!("failed to open image '{}'", image_path.display())
            })?
            .decode()
            .res(|| {
                format!("failed to decode image '{}'", image_path.display())
            })?
            .into_rgb8();
        views.push(TextureView {
            image,
            intrinsic: Matrix3::from_row_slice(&view.intrinsic),
            world_to_camera: Matrix4::from_row_slice(&view.extrinsic),
        });
    }

    Ok(views)
}

/// Builds views from raw RGB buffers and calibration arrays,
/// all images sharing the same dimensions.
pub fn views_from_buffers(
    width: u32,
    height: u32,
    images_data: &[Vec<u8>],
    intrinsics: &[[f32; 9]],
    extrinsics: &[[f32; 16]],
) -> Result<Vec<TextureView>> {
    if images_data.len() != intrinsics.len()
        || images_data.len() != extrinsics.len()
    {
        let desc = format!(
            "got {} images for {} intrinsic and {} extrinsic arrays",
            images_data.len(),
            intrinsics.len(),
            extrinsics.len()
        );
        return Err(Error::new(InconsistentState, desc));
    }
    if images_data.is_empty() {
        let desc = "no views provided".to_string();
        return Err(Error::new(InconsistentState, desc));
    }

    let mut views = Vec::with_capacity(images_data.len());
    for (i, data) in images_data.iter().enumerate() {
        let image = RgbImage::from_raw(width, height, data.clone())
            .ok_or_else(|| {
                let desc = format!(
                    "image {} holds {} bytes for {}x{} RGB pixels",
                    i,
                    data.len(),
                    width,
                    height
                );
                Error::new(InconsistentState, desc)
            })?;
        let intrinsic: Vec<f64> =
            intrinsics[i].iter().map(|&v| v as f64).collect();
        let extrinsic: Vec<f64> =
            extrinsics[i].iter().map(|&v| v as f64).collect();
        views.push(TextureView {
            image,
            intrinsic: Matrix3::from_row_slice(&intrinsic),
            world_to_camera: Matrix4::from_row_slice(&extrinsic),
        });
    }

    Ok(views)
}

/// Replaces every view raster with a flat color unique to the view,
/// so a rebuilt model shows which view textured which face.
pub fn generate_debug_embeddings(views: &mut [TextureView]) {
    for (i, view) in views.iter_mut().enumerate() {
        let color = debug_embedding_color(i);
        view.image =
            RgbImage::from_pixel(view.width(), view.height(), color);
    }
}

fn debug_embedding_color(view_idx: usize) -> Rgb<u8> {
    Rgb([
        (view_idx * 157 % 224 + 32) as u8,
        (view_idx * 101 % 224 + 32) as u8,
        (view_idx * 61 % 224 + 32) as u8,
    ])
}
