// Embedding surface: the whole pipeline behind a single call that
// deals in raw buffers instead of files.

use std::result::Result as StdResult;

use base::defs::{Error, ErrorKind::*, Result};

use crate::mesh::Mesh;
use crate::model::ModelBuffers;
use crate::pipeline::{texture_mesh, MemorySink, Settings};
use crate::scene::views_from_buffers;

/// Textures the given mesh from raw RGB images with per-view
/// calibration and returns the consolidated model buffers.
///
/// All images share the given dimensions; `intrinsics` holds one
/// row-major 3x3 matrix and `extrinsics` one row-major 4x4
/// world-to-camera matrix per view. When `normals` is empty, vertex
/// normals are derived from the face geometry.
///
/// On failure a non-empty description of the problem is returned
/// and nothing is written anywhere.
#[allow(clippy::too_many_arguments)]
pub fn reconstruct_texture(
    width: u32,
    height: u32,
    images_data: &[Vec<u8>],
    intrinsics: &[[f32; 9]],
    extrinsics: &[[f32; 16]],
    points: &[[f32; 3]],
    normals: &[[f32; 3]],
    triangles: &[[u32; 3]],
) -> StdResult<ModelBuffers, String> {
    let run = || -> Result<ModelBuffers> {
        let mesh = Mesh::from_buffers(points, normals, triangles)?;
        let mut views = views_from_buffers(
            width,
            height,
            images_data,
            intrinsics,
            extrinsics,
        )?;

        let settings = Settings::default();
        let mut sink = MemorySink::default();
        texture_mesh(&mesh, &mut views, &settings, &mut sink)?;

        sink.buffers.take().ok_or_else(|| {
            let desc = "pipeline delivered no model".to_string();
            Error::new(InconsistentState, desc)
        })
    };

    run().map_err(|err| {
        let message = err.to_string();
        if message.is_empty() {
            "texture reconstruction failed".to_string()
        } else {
            message
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tetrahedron_buffers(
    ) -> (Vec<[f32; 3]>, Vec<[f32; 3]>, Vec<[u32; 3]>) {
        let points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        let triangles =
            vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]];
        (points, Vec::new(), triangles)
    }

    fn view_buffers() -> (Vec<Vec<u8>>, Vec<[f32; 9]>, Vec<[f32; 16]>) {
        let images = vec![
            vec![128u8; 64 * 64 * 3],
            vec![200u8; 64 * 64 * 3],
        ];
        let intrinsic =
            [32.0, 0.0, 32.0, 0.0, 32.0, 32.0, 0.0, 0.0, 1.0];
        #[rustfmt::skip]
        let front = [
            1.0, 0.0, 0.0, -0.3,
            0.0, 1.0, 0.0, -0.2,
            0.0, 0.0, 1.0, 5.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        #[rustfmt::skip]
        let back = [
            1.0, 0.0, 0.0, -0.3,
            0.0, -1.0, 0.0, 0.2,
            0.0, 0.0, -1.0, 5.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        (images, vec![intrinsic, intrinsic], vec![front, back])
    }

    #[test]
    fn test_reconstruct_texture() {
        let (points, normals, triangles) = tetrahedron_buffers();
        let (images, intrinsics, extrinsics) = view_buffers();

        let buffers = reconstruct_texture(
            64,
            64,
            &images,
            &intrinsics,
            &extrinsics,
            &points,
            &normals,
            &triangles,
        )
        .unwrap();

        assert_eq!(buffers.points.len(), buffers.normals.len());
        assert_eq!(buffers.points.len(), buffers.tex_coords.len());
        assert!(!buffers.triangles.is_empty());
        for triangle in &buffers.triangles {
            for &idx in triangle {
                assert!((idx as usize) < buffers.points.len());
            }
        }
        assert_eq!(
            buffers.texture_data.len(),
            (buffers.texture_width * buffers.texture_height * 3) as usize
        );
    }

    #[test]
    fn test_reconstruct_texture_reports_errors() {
        let (points, normals, triangles) = tetrahedron_buffers();
        let message = reconstruct_texture(
            64,
            64,
            &[],
            &[],
            &[],
            &points,
            &normals,
            &triangles,
        )
        .unwrap_err();
        assert!(!message.is_empty());
    }
}
