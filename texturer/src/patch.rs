use std::collections::HashMap;

use image::RgbImage;
use petgraph::unionfind::UnionFind;
use rayon::prelude::*;

use base::defs::{Error, ErrorKind::*, Result};

use crate::graph::Graph;
use crate::mesh::Mesh;
use crate::misc::{
    all_nonneg, get_pixel_as_vector3, set_pixel_as_vector3,
    BarycentricCoordinateSystem, Rectangle,
};
use crate::progress::ProgressCounter;
use crate::scene::TextureView;
use crate::{Vector2, Vector3};

/// Pixels kept around a patch crop for filtering and gutters.
const PATCH_BORDER: f64 = 2.0;

/// Rectangular, crop-shaped grid of pixels covered by patch faces.
pub type ValidityMask = Vec<Vec<bool>>;

/// A connected set of same-labeled faces with a raster crop from
/// the source view.
pub struct TexturePatch {
    pub label: usize,
    pub faces: Vec<usize>,
    /// Crop-local pixel coordinates, one triple per face.
    pub texcoords: Vec<[Vector2; 3]>,
    pub image: RgbImage,
    pub validity_mask: ValidityMask,
}

impl TexturePatch {
    /// Applies one color adjustment per triangle corner instance
    /// and records which crop pixels are covered by patch faces.
    ///
    /// The adjustment vector holds 3 entries per face; corners are
    /// not shared across patches.
    pub fn adjust_colors(&mut self, adjustments: &[Vector3]) {
        assert_eq!(adjustments.len(), self.faces.len() * 3);

        let (width, height) = self.image.dimensions();
        let mut mask = vec![vec![false; width as usize]; height as usize];

        for (local_idx, &uvs) in self.texcoords.iter().enumerate() {
            let bcs = match BarycentricCoordinateSystem::new(uvs) {
                Some(bcs) => bcs,
                None => continue,
            };
            let adj = &adjustments[local_idx * 3..local_idx * 3 + 3];

            let rect = Rectangle::bounding(&[
                [uvs[0][0], uvs[0][1]],
                [uvs[1][0], uvs[1][1]],
                [uvs[2][0], uvs[2][1]],
            ]);
            let x0 = rect.pos[0].floor().max(0.0) as u32;
            let y0 = rect.pos[1].floor().max(0.0) as u32;
            let x1 = ((rect.pos[0] + rect.size[0]).ceil() as u32)
                .min(width.saturating_sub(1));
            let y1 = ((rect.pos[1] + rect.size[1]).ceil() as u32)
                .min(height.saturating_sub(1));

            for y in y0..=y1 {
                for x in x0..=x1 {
                    let bary =
                        bcs.infer(Vector2::new(x as f64, y as f64));
                    if !all_nonneg(bary) {
                        continue;
                    }
                    let adjustment = bary[0] * adj[0]
                        + bary[1] * adj[1]
                        + bary[2] * adj[2];
                    let color =
                        get_pixel_as_vector3(x, y, &self.image) + adjustment;
                    set_pixel_as_vector3(x, y, color, &mut self.image);
                    mask[y as usize][x as usize] = true;
                }
            }
        }

        self.validity_mask = mask;
    }
}

/// Splits labeled faces into connected same-label components and
/// crops each component's footprint from its source view.
pub fn generate_texture_patches(
    graph: &Graph,
    mesh: &Mesh,
    views: &[TextureView],
) -> Result<Vec<TexturePatch>> {
    let mut partition = UnionFind::new(graph.num_nodes());
    for node in 0..graph.num_nodes() {
        if graph.label(node) == 0 {
            continue;
        }
        for &other in graph.adjacent(node) {
            if graph.label(other) == graph.label(node) {
                partition.union(node, other);
            }
        }
    }

    let mut components: HashMap<usize, Vec<usize>> = HashMap::new();
    for node in 0..graph.num_nodes() {
        if graph.label(node) != 0 {
            components
                .entry(partition.find(node))
                .or_insert_with(Vec::new)
                .push(node);
        }
    }

    let mut roots: Vec<usize> = components.keys().cloned().collect();
    roots.sort_unstable();

    let mut patches = Vec::with_capacity(roots.len());
    for root in roots {
        let faces = &components[&root];
        let label = graph.label(faces[0]);
        let view = views.get(label - 1).ok_or_else(|| {
            let desc = format!(
                "face label {} references a view beyond the {} loaded",
                label,
                views.len()
            );
            Error::new(InconsistentState, desc)
        })?;
        patches.push(extract_patch(faces, label, mesh, view));
    }

    Ok(patches)
}

fn extract_patch(
    faces: &[usize],
    label: usize,
    mesh: &Mesh,
    view: &TextureView,
) -> TexturePatch {
    let (width, height) = view.image.dimensions();
    let clamp = |pixel: Vector2| {
        Vector2::new(
            pixel[0].clamp(0.0, (width - 1) as f64),
            pixel[1].clamp(0.0, (height - 1) as f64),
        )
    };

    let projections: Vec<[Vector2; 3]> = faces
        .iter()
        .map(|&face_idx| {
            let [v0, v1, v2] = mesh.faces[face_idx];
            let f = |v: usize| clamp(view.project(&mesh.vertices[v]).pixel);
            [f(v0), f(v1), f(v2)]
        })
        .collect();

    let corners: Vec<[f64; 2]> = projections
        .iter()
        .flatten()
        .map(|pixel| [pixel[0], pixel[1]])
        .collect();
    let rect = Rectangle::bounding(&corners);

    let x0 = (rect.pos[0] - PATCH_BORDER).floor().max(0.0) as u32;
    let y0 = (rect.pos[1] - PATCH_BORDER).floor().max(0.0) as u32;
    let x1 = ((rect.pos[0] + rect.size[0] + PATCH_BORDER).ceil() as u32)
        .min(width - 1);
    let y1 = ((rect.pos[1] + rect.size[1] + PATCH_BORDER).ceil() as u32)
        .min(height - 1);
    let (crop_width, crop_height) = (x1 - x0 + 1, y1 - y0 + 1);

    let image = RgbImage::from_fn(crop_width, crop_height, |x, y| {
        *view.image.get_pixel(x0 + x, y0 + y)
    });

    let origin = Vector2::new(x0 as f64, y0 as f64);
    let texcoords = projections
        .iter()
        .map(|&[p0, p1, p2]| [p0 - origin, p1 - origin, p2 - origin])
        .collect();

    TexturePatch {
        label,
        faces: faces.to_vec(),
        texcoords,
        image,
        validity_mask: vec![
            vec![false; crop_width as usize];
            crop_height as usize
        ],
    }
}

/// Establishes validity masks for every patch by applying a zero
/// per-corner color adjustment, one worker per patch.
///
/// Patches never share data, so the only state crossing workers is
/// the progress counter. The result does not depend on scheduling
/// order or worker count.
pub fn compute_validity_masks(patches: &mut [TexturePatch]) {
    let counter = ProgressCounter::new(
        "calculating validity masks for texture patches",
        patches.len(),
    );
    patches.par_iter_mut().for_each(|patch| {
        let adjustments = vec![Vector3::zeros(); patch.faces.len() * 3];
        patch.adjust_colors(&adjustments);
        counter.inc();
    });
}
