use std::path::Path;

use kiddo::distance::squared_euclidean;
use kiddo::KdTree;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use base::defs::{Error, ErrorKind::*, Result};
use base::util::fs;

use crate::mesh::Mesh;
use crate::progress::ProgressCounter;
use crate::scene::{ProjectedPoint, TextureView};
use crate::Vector2;

/// Pixels a projected corner must keep from the image border.
const BOUNDS_MARGIN: f64 = 1.0;

/// Sparse face-by-view cost table. Faces a view cannot see
/// carry no entry; smaller cost means a better source view.
#[derive(Debug, Deserialize, Serialize)]
pub struct DataCosts {
    num_views: usize,
    rows: Vec<Vec<(u32, f32)>>,
}

impl DataCosts {
    pub fn new(num_faces: usize, num_views: usize) -> DataCosts {
        DataCosts {
            num_views,
            rows: vec![Vec::new(); num_faces],
        }
    }

    pub fn num_faces(&self) -> usize {
        self.rows.len()
    }

    pub fn num_views(&self) -> usize {
        self.num_views
    }

    /// Per-face entries sorted by view index.
    pub fn row(&self, face_idx: usize) -> &[(u32, f32)] {
        &self.rows[face_idx]
    }

    pub fn set(&mut self, face_idx: usize, view_idx: usize, cost: f32) {
        let row = &mut self.rows[face_idx];
        match row.binary_search_by_key(&(view_idx as u32), |&(v, _)| v) {
            Ok(pos) => row[pos].1 = cost,
            Err(pos) => row.insert(pos, (view_idx as u32, cost)),
        }
    }

    pub fn get(&self, face_idx: usize, view_idx: usize) -> Option<f32> {
        self.rows[face_idx]
            .iter()
            .find(|&&(view, _)| view as usize == view_idx)
            .map(|&(_, cost)| cost)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write_json_gz(path, self)
    }

    pub fn load_from_file<P: AsRef<Path>>(
        path: P,
        num_faces: usize,
        num_views: usize,
    ) -> Result<DataCosts> {
        let path = path.as_ref();
        let costs: DataCosts = fs::read_json_gz(path)?;
        if costs.num_faces() != num_faces || costs.num_views() != num_views {
            let desc = format!(
                "data cost file '{}' covers {} faces and {} views, \
                 expected {} and {}",
                path.display(),
                costs.num_faces(),
                costs.num_views(),
                num_faces,
                num_views
            );
            return Err(Error::new(InconsistentState, desc));
        }
        Ok(costs)
    }
}

/// Projects the mesh into every view and derives per-face costs
/// from the viewing angle, rejecting out-of-bounds, back-facing
/// and occluded faces.
pub fn calculate_data_costs(
    mesh: &Mesh,
    views: &[TextureView],
) -> DataCosts {
    let counter =
        ProgressCounter::new("calculating data costs", views.len());

    let per_view: Vec<Vec<Option<f64>>> = views
        .par_iter()
        .map(|view| {
            let costs = face_costs_for_view(mesh, view);
            counter.inc();
            costs
        })
        .collect();

    let mut data_costs = DataCosts::new(mesh.faces.len(), views.len());
    for (view_idx, costs) in per_view.iter().enumerate() {
        for (face_idx, cost) in costs.iter().enumerate() {
            if let Some(cost) = cost {
                data_costs.rows[face_idx]
                    .push((view_idx as u32, *cost as f32));
            }
        }
    }
    data_costs
}

fn face_costs_for_view(mesh: &Mesh, view: &TextureView) -> Vec<Option<f64>> {
    let vertices_proj: Vec<ProjectedPoint> = mesh
        .vertices
        .iter()
        .map(|vertex| view.project(vertex))
        .collect();
    let occlusions = compute_occlusion_for_all_vertices(&vertices_proj, mesh);
    let camera = view.camera_position();

    mesh.faces
        .iter()
        .enumerate()
        .map(|(face_idx, &[v0, v1, v2])| {
            for &v in &[v0, v1, v2] {
                let projected = &vertices_proj[v];
                if projected.depth <= 0.0
                    || occlusions[v]
                    || !view.contains_pixel(projected.pixel, BOUNDS_MARGIN)
                {
                    return None;
                }
            }
            let direction =
                (camera - mesh.face_centroid(face_idx)).normalize();
            let dot_product = mesh.face_normal(face_idx).dot(&direction);
            if dot_product > 0.0 {
                Some(1.0 / dot_product)
            } else {
                None
            }
        })
        .collect()
}

fn orientation(v0: Vector2, v1: Vector2, v2: Vector2) -> f64 {
    (v1[0] * v2[1] - v1[1] * v2[0])
        + (v2[0] * v0[1] - v2[1] * v0[0])
        + (v0[0] * v1[1] - v0[1] * v1[0])
}

fn containment_check(v: Vector2, f: [Vector2; 3]) -> bool {
    let [v0, v1, v2] = f;
    if v == v0 || v == v1 || v == v2 {
        return false;
    }
    let s0 = orientation(v, v1, v2);
    let s1 = orientation(v0, v, v2);
    let s2 = orientation(v0, v1, v);
    (s0 > 0.0 && s1 > 0.0 && s2 > 0.0)
        || (s0 < 0.0 && s1 < 0.0 && s2 < 0.0)
}

fn max(a: [f64; 3]) -> f64 {
    *a.iter().max_by(|p, q| p.partial_cmp(q).unwrap()).unwrap()
}

fn compute_occlusion_for_all_vertices(
    vertices_proj: &[ProjectedPoint],
    mesh: &Mesh,
) -> Vec<bool> {
    // Build a 2d kdtree of all projected vertices.
    let mut kdtree = KdTree::new();
    for (i, v) in vertices_proj.iter().enumerate() {
        kdtree.add(v.pixel.as_ref(), i).unwrap();
    }

    // Set all vertices to visible initially.
    let mut occluded = vec![false; vertices_proj.len()];

    // For each triangle, occlude vertices behind it.
    for face in &mesh.faces {
        let ProjectedPoint {
            pixel: v0,
            depth: d0,
        } = vertices_proj[face[0]];
        let ProjectedPoint {
            pixel: v1,
            depth: d1,
        } = vertices_proj[face[1]];
        let ProjectedPoint {
            pixel: v2,
            depth: d2,
        } = vertices_proj[face[2]];
        if d0 < 0.0 && d1 < 0.0 && d2 < 0.0 {
            continue;
        }
        let v = (v0 + v1 + v2) / 3.0;
        let radius = 1.1
            * max([
                (v0 - v).norm_squared(),
                (v1 - v).norm_squared(),
                (v2 - v).norm_squared(),
            ]);
        for (_dist, &i) in kdtree
            .within_unsorted(v.as_ref(), radius, &squared_euclidean)
            .unwrap()
        {
            let ProjectedPoint {
                pixel: vi,
                depth: di,
            } = &vertices_proj[i];
            if d0 < *di
                && d1 < *di
                && d2 < *di
                && containment_check(*vi, [v0, v1, v2])
            {
                occluded[i] = true;
            }
        }
    }

    occluded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::tetrahedron;
    use crate::scene::TextureView;
    use crate::{Matrix3, Matrix4};
    use image::{Rgb, RgbImage};

    fn view_looking_along_z() -> TextureView {
        // Camera at (0, 0, -5) looking along +Z.
        let mut world_to_camera = Matrix4::identity();
        world_to_camera[(2, 3)] = 5.0;
        TextureView {
            image: RgbImage::from_pixel(64, 64, Rgb([200, 100, 50])),
            intrinsic: Matrix3::new(
                32.0, 0.0, 32.0, 0.0, 32.0, 32.0, 0.0, 0.0, 1.0,
            ),
            world_to_camera,
        }
    }

    #[test]
    fn test_calculate_data_costs_visibility() {
        let mesh = tetrahedron();
        let views = vec![view_looking_along_z()];
        let costs = calculate_data_costs(&mesh, &views);

        assert_eq!(costs.num_faces(), 4);
        assert_eq!(costs.num_views(), 1);

        // Face 0 looks straight at the camera.
        let front = costs.get(0, 0).unwrap();
        assert!(front >= 1.0);

        // Face 1 lies edge-on to the camera.
        assert!(costs.get(1, 0).is_none());
    }

    #[test]
    fn test_save_load_equivalence() {
        let mesh = tetrahedron();
        let views = vec![view_looking_along_z()];
        let costs = calculate_data_costs(&mesh, &views);

        let path = std::env::temp_dir().join("texturer_data_costs_test.gz");
        costs.save_to_file(&path).unwrap();
        let loaded = DataCosts::load_from_file(&path, 4, 1).unwrap();
        std::fs::remove_file(&path).ok();

        for face_idx in 0..4 {
            assert_eq!(costs.row(face_idx), loaded.row(face_idx));
        }
    }

    #[test]
    fn test_load_shape_mismatch() {
        let costs = DataCosts::new(4, 1);
        let path = std::env::temp_dir().join("texturer_cost_mismatch.gz");
        costs.save_to_file(&path).unwrap();
        let err = DataCosts::load_from_file(&path, 5, 1).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert_eq!(err.kind, InconsistentState);
    }
}
