// Seam leveling reduces visible color discontinuities where patches
// from different views meet on the surface.

use crate::mesh::Mesh;
use crate::misc::{get_pixel_as_vector3, sample_pixel, set_pixel_as_vector3};
use crate::patch::TexturePatch;
use crate::{Matrix3, Vector3};

type CooMatrix = nalgebra_sparse::coo::CooMatrix<f64>;
type CsrMatrix = nalgebra_sparse::csr::CsrMatrix<f64>;
type DVector = nalgebra::DVector<f64>;

const MINIMUM_TOLERATED_SIN_FOR_COTAN: f64 = 1e-12;

/// Conjugate-gradient iterations for the leveling system.
const COLOR_LEVELING_STEPS: usize = 30;

const LOCAL_LEVELING_PASSES: usize = 3;

fn face_vertex_cotan(
    vertex_idx: usize,
    other_idxs: [usize; 2],
    mesh: &Mesh,
) -> f64 {
    let p = mesh.vertices[vertex_idx];
    let q1 = mesh.vertices[other_idxs[0]];
    let q2 = mesh.vertices[other_idxs[1]];
    let u = p - q1;
    let v = p - q2;
    let sin = u.cross(&v).norm();

    // Avoid division by zero (rare).
    let sin1 = f64::max(sin, MINIMUM_TOLERATED_SIN_FOR_COTAN);

    let cos = u.dot(&v).abs();
    cos / sin1
}

fn add_eq_to_minor(a: &mut Matrix3, i: usize, j: usize, s: f64) {
    a[(i, i)] += s;
    a[(i, j)] -= s;
    a[(j, i)] -= s;
    a[(j, j)] += s;
}

fn face_laplacian(face_idx: usize, mesh: &Mesh) -> Matrix3 {
    let [v0, v1, v2] = mesh.faces[face_idx];
    let mut a = Matrix3::zeros();
    add_eq_to_minor(&mut a, 0, 1, face_vertex_cotan(v2, [v0, v1], mesh));
    add_eq_to_minor(&mut a, 0, 2, face_vertex_cotan(v1, [v0, v2], mesh));
    add_eq_to_minor(&mut a, 1, 2, face_vertex_cotan(v0, [v1, v2], mesh));
    a
}

fn build_discontinuous_laplacian(mesh: &Mesh) -> CsrMatrix {
    let n = mesh.faces.len();
    let mut coo = CooMatrix::new(n * 3, n * 3);
    for face_idx in 0..n {
        coo.push_matrix(
            face_idx * 3,
            face_idx * 3,
            &face_laplacian(face_idx, mesh),
        );
    }
    CsrMatrix::from(&coo)
}

fn build_face_vertex_to_vertex_correspondence(mesh: &Mesh) -> CsrMatrix {
    let mut coo = CooMatrix::new(mesh.faces.len() * 3, mesh.vertices.len());
    for (face_idx, face) in mesh.faces.iter().enumerate() {
        for (local_idx, &vertex_idx) in face.iter().enumerate() {
            coo.push(face_idx * 3 + local_idx, vertex_idx, 1.0);
        }
    }
    CsrMatrix::from(&coo)
}

fn build_initial_guess(
    mesh: &Mesh,
    chosen: &[bool],
    color_samples: &[[Vector3; 3]],
    color_idx: usize,
) -> DVector {
    let mut sums = vec![(0.0, 0usize); mesh.vertices.len()];
    for (face_idx, face) in mesh.faces.iter().enumerate() {
        if !chosen[face_idx] {
            continue;
        }
        for (local_idx, &vertex_idx) in face.iter().enumerate() {
            sums[vertex_idx].0 +=
                color_samples[face_idx][local_idx][color_idx];
            sums[vertex_idx].1 += 1;
        }
    }
    DVector::from_vec(
        sums.iter()
            .map(|&(sum, count)| {
                if count > 0 {
                    sum / count as f64
                } else {
                    0.0
                }
            })
            .collect(),
    )
}

fn conjugate_gradients_solve(
    a: &CsrMatrix,
    b: DVector,
    x0: DVector,
    steps: usize,
) -> DVector {
    // Solve the system ax = b, where a is a sparse positive
    // semi-definite matrix with b in its range.
    assert!(
        a.nrows() == a.ncols()
            && a.nrows() == b.nrows()
            && a.nrows() == x0.nrows()
    );

    let mut x = x0;
    let mut r = b - a * &x;
    let mut p = r.clone();
    let mut rsold = r.dot(&r);

    for _ in 0..steps {
        if rsold < 1e-24 {
            break;
        }
        let ap = a * &p;
        let alpha = rsold / (p.dot(&ap));
        x += alpha * p.clone();
        r -= alpha * ap;
        let rsnew = r.dot(&r);
        p = r.clone() + (rsnew / rsold) * p;
        rsold = rsnew;
    }

    x
}

/// Levels patch colors jointly across the whole mesh.
///
/// Sampled corner colors form a discontinuous field over the
/// surface; the smooth per-vertex field minimizing the Dirichlet
/// energy is recovered with conjugate gradients and the difference
/// becomes a per-corner adjustment applied to every patch.
pub fn global_seam_leveling(mesh: &Mesh, patches: &mut [TexturePatch]) {
    // Locate every labeled face inside its patch.
    let mut location = vec![None; mesh.faces.len()];
    for (patch_idx, patch) in patches.iter().enumerate() {
        for (local_idx, &face_idx) in patch.faces.iter().enumerate() {
            location[face_idx] = Some((patch_idx, local_idx));
        }
    }
    let chosen: Vec<bool> = location.iter().map(Option::is_some).collect();

    let color_samples: Vec<[Vector3; 3]> = (0..mesh.faces.len())
        .map(|face_idx| {
            if let Some((patch_idx, local_idx)) = location[face_idx] {
                let patch = &patches[patch_idx];
                let f = |k: usize| {
                    sample_pixel(patch.texcoords[local_idx][k], &patch.image)
                };
                [f(0), f(1), f(2)]
            } else {
                [Vector3::zeros(); 3]
            }
        })
        .collect();

    // Formulate a system of linear equations to minimize the surface
    // integral of the squared norm of the correction gradient.
    let discontinuous_laplacian = build_discontinuous_laplacian(mesh);
    let face_vertex_to_vertex =
        build_face_vertex_to_vertex_correspondence(mesh);
    let continuous_laplacian = &face_vertex_to_vertex.transpose()
        * &discontinuous_laplacian
        * &face_vertex_to_vertex;

    let mut face_vertex_color_offsets =
        vec![[Vector3::zeros(); 3]; mesh.faces.len()];
    for color_idx in 0..3 {
        let discontinuous_pre_rhs = DVector::from_vec(
            color_samples
                .iter()
                .flat_map(|f| f.map(|c| c[color_idx]))
                .collect(),
        );
        let discontinuous_rhs =
            &discontinuous_laplacian * discontinuous_pre_rhs;
        let continuous_rhs =
            face_vertex_to_vertex.transpose() * discontinuous_rhs;
        let x0 = build_initial_guess(mesh, &chosen, &color_samples, color_idx);
        let continuous_lhs = conjugate_gradients_solve(
            &continuous_laplacian,
            continuous_rhs,
            x0,
            COLOR_LEVELING_STEPS,
        );
        let discontinuous_lhs = &face_vertex_to_vertex * continuous_lhs;

        for face_idx in 0..mesh.faces.len() {
            for local_idx in 0..3 {
                face_vertex_color_offsets[face_idx][local_idx][color_idx] =
                    discontinuous_lhs[face_idx * 3 + local_idx]
                        - color_samples[face_idx][local_idx][color_idx];
            }
        }
    }

    // Apply the per-corner offsets patch by patch; this also
    // establishes the validity masks.
    for patch in patches.iter_mut() {
        let mut adjustments = Vec::with_capacity(patch.faces.len() * 3);
        for &face_idx in &patch.faces {
            for local_idx in 0..3 {
                adjustments
                    .push(face_vertex_color_offsets[face_idx][local_idx]);
            }
        }
        patch.adjust_colors(&adjustments);
    }
}

/// Corrects each patch independently by relaxing the pixels on the
/// border of its validity mask toward their valid neighbours.
pub fn local_seam_leveling(patches: &mut [TexturePatch]) {
    for patch in patches.iter_mut() {
        relax_patch_borders(patch);
    }
}

fn relax_patch_borders(patch: &mut TexturePatch) {
    let (width, height) = patch.image.dimensions();
    if width == 0 || height == 0 || patch.validity_mask.is_empty() {
        return;
    }

    let valid = |x: i64, y: i64| {
        x >= 0
            && (x as u32) < width
            && y >= 0
            && (y as u32) < height
            && patch.validity_mask[y as usize][x as usize]
    };

    for _ in 0..LOCAL_LEVELING_PASSES {
        let snapshot = patch.image.clone();
        for y in 0..height as i64 {
            for x in 0..width as i64 {
                if !valid(x, y) {
                    continue;
                }
                let neighbours =
                    [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)];
                if neighbours.iter().all(|&(nx, ny)| valid(nx, ny)) {
                    continue; // Interior pixel, not on a seam.
                }
                let mut sum =
                    get_pixel_as_vector3(x as u32, y as u32, &snapshot);
                let mut count = 1;
                for &(nx, ny) in &neighbours {
                    if valid(nx, ny) {
                        sum += get_pixel_as_vector3(
                            nx as u32, ny as u32, &snapshot,
                        );
                        count += 1;
                    }
                }
                set_pixel_as_vector3(
                    x as u32,
                    y as u32,
                    sum / count as f64,
                    &mut patch.image,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_adjacency_graph;
    use crate::labeling::apply_labeling;
    use crate::mesh::tetrahedron;
    use crate::patch::generate_texture_patches;
    use crate::test_fixtures::two_opposing_views;
    use crate::Vector2;
    use image::{Rgb, RgbImage};

    fn mean_channel(patch: &TexturePatch, channel: usize) -> f64 {
        let mut sum = 0.0;
        let mut count = 0;
        for (y, row) in patch.validity_mask.iter().enumerate() {
            for (x, &valid) in row.iter().enumerate() {
                if valid {
                    sum += get_pixel_as_vector3(
                        x as u32,
                        y as u32,
                        &patch.image,
                    )[channel];
                    count += 1;
                }
            }
        }
        sum / count as f64
    }

    #[test]
    fn test_global_seam_leveling_pulls_colors_together() {
        let mesh = tetrahedron();
        let mut graph = build_adjacency_graph(&mesh);
        apply_labeling(&[1, 1, 2, 2], 2, &mut graph).unwrap();
        let views = two_opposing_views(64, 64);
        let mut patches =
            generate_texture_patches(&graph, &mesh, &views).unwrap();

        global_seam_leveling(&mesh, &mut patches);

        // View colors are (200, 100, 50) and (50, 100, 200); the
        // leveled patches must have moved toward each other in red.
        let red0 = mean_channel(&patches[0], 0);
        let red1 = mean_channel(&patches[1], 0);
        assert!(red0 < 200.0);
        assert!(red1 > 50.0);
        assert!((red0 - red1).abs() < 150.0);

        for patch in &patches {
            assert!(patch
                .validity_mask
                .iter()
                .flatten()
                .any(|&valid| valid));
        }
    }

    #[test]
    fn test_local_seam_leveling_blends_borders() {
        let mut image = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        for y in 0..4 {
            for x in 2..4 {
                image.put_pixel(x, y, Rgb([240, 240, 240]));
            }
        }
        let mut mask = vec![vec![false; 4]; 4];
        for y in 1..3 {
            for x in 1..3 {
                mask[y][x] = true;
            }
        }
        let mut patches = vec![TexturePatch {
            label: 1,
            faces: vec![0],
            texcoords: vec![[Vector2::zeros(); 3]],
            image,
            validity_mask: mask,
        }];

        local_seam_leveling(&mut patches);

        let dark = get_pixel_as_vector3(1, 1, &patches[0].image);
        let bright = get_pixel_as_vector3(2, 1, &patches[0].image);
        assert!(dark[0] > 0.0);
        assert!(bright[0] < 240.0);
    }
}
