// Shared fixtures for the unit tests of the texturing stages.

use image::{Rgb, RgbImage};

use crate::scene::TextureView;
use crate::{Matrix3, Matrix4};

/// Two synthetic calibrated views looking at the origin from the
/// opposite ends of the Z axis, each with a flat distinctive color.
pub fn two_opposing_views(width: u32, height: u32) -> Vec<TextureView> {
    let focal = width as f64 / 2.0;
    let intrinsic = Matrix3::new(
        focal,
        0.0,
        width as f64 / 2.0,
        0.0,
        focal,
        height as f64 / 2.0,
        0.0,
        0.0,
        1.0,
    );

    // Camera at (0.3, 0.2, -5) looking along +Z. Slightly off-axis
    // so that no two tetrahedron vertices share a projection.
    #[rustfmt::skip]
    let front = Matrix4::new(
        1.0, 0.0, 0.0, -0.3,
        0.0, 1.0, 0.0, -0.2,
        0.0, 0.0, 1.0, 5.0,
        0.0, 0.0, 0.0, 1.0,
    );

    // Camera at (0.3, 0.2, 5) looking along -Z.
    #[rustfmt::skip]
    let back = Matrix4::new(
        1.0, 0.0, 0.0, -0.3,
        0.0, -1.0, 0.0, 0.2,
        0.0, 0.0, -1.0, 5.0,
        0.0, 0.0, 0.0, 1.0,
    );

    vec![
        TextureView {
            image: RgbImage::from_pixel(width, height, Rgb([200, 100, 50])),
            intrinsic,
            world_to_camera: front,
        },
        TextureView {
            image: RgbImage::from_pixel(width, height, Rgb([50, 100, 200])),
            intrinsic,
            world_to_camera: back,
        },
    ]
}
