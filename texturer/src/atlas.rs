use std::collections::hash_map::Entry::Vacant;
use std::collections::{BTreeMap, HashMap};

use image::RgbImage;
use rectangle_pack::{
    contains_smallest_box, pack_rects, volume_heuristic,
    GroupedRectsToPlace, RectToInsert, TargetBin,
};

use base::defs::{Error, ErrorKind::*, Result};

use crate::patch::TexturePatch;
use crate::Vector2;

/// Hard cap on the page side; beyond it packing spills into
/// additional atlas pages.
pub const MAX_ATLAS_SIZE: u32 = 4096;

const MIN_ATLAS_SIZE: u32 = 64;

/// Gutter pixels kept between packed patches.
const PATCH_SPACING: u32 = 2;

/// A packed texture page combining one or more patches.
///
/// Texcoords are atlas-local and normalized to [0,1]x[0,1];
/// `texcoord_ids` holds 3 indices into `texcoords` per entry of
/// `faces`, which itself indexes the original mesh faces.
pub struct TextureAtlas {
    pub image: RgbImage,
    pub texcoords: Vec<Vector2>,
    pub faces: Vec<usize>,
    pub texcoord_ids: Vec<usize>,
}

/// Packs patches into as few atlas pages as possible, growing the
/// page size up to the cap before spilling into further pages.
pub fn generate_texture_atlases(
    patches: &[TexturePatch],
) -> Result<Vec<TextureAtlas>> {
    if patches.is_empty() {
        return Ok(Vec::new());
    }

    let padded: Vec<[u32; 2]> = patches
        .iter()
        .map(|patch| {
            let (width, height) = patch.image.dimensions();
            [width + 2 * PATCH_SPACING, height + 2 * PATCH_SPACING]
        })
        .collect();

    let largest = padded.iter().flatten().cloned().max().unwrap();
    if largest > MAX_ATLAS_SIZE {
        let desc = format!(
            "a texture patch spans {} pixels, more than the {} an \
             atlas page fits",
            largest, MAX_ATLAS_SIZE
        );
        return Err(Error::new(UnsupportedFeature, desc));
    }

    let mut page_size = MIN_ATLAS_SIZE;
    while page_size < largest {
        page_size *= 2;
    }

    let mut num_pages = 1;
    let placements = loop {
        if let Some(placements) =
            try_pack_patches(&padded, page_size, num_pages)
        {
            break placements;
        }
        if page_size < MAX_ATLAS_SIZE {
            page_size *= 2;
        } else {
            // Each patch fits a page alone, so this terminates.
            num_pages += 1;
        }
    };

    Ok(assemble_pages(patches, &placements, page_size))
}

fn try_pack_patches(
    padded_sizes: &[[u32; 2]],
    page_size: u32,
    num_pages: usize,
) -> Option<Vec<(usize, u32, u32)>> {
    let mut rects_to_place = GroupedRectsToPlace::<usize, ()>::new();
    for (i, size) in padded_sizes.iter().enumerate() {
        rects_to_place.push_rect(
            i,
            None,
            RectToInsert::new(size[0], size[1], 1),
        );
    }

    let mut target_bins = BTreeMap::new();
    for page in 0..num_pages {
        target_bins.insert(page, TargetBin::new(page_size, page_size, 1));
    }

    let rectangle_placements = pack_rects(
        &rects_to_place,
        &mut target_bins,
        &volume_heuristic,
        &contains_smallest_box,
    )
    .ok()?;
    let packed_locations = rectangle_placements.packed_locations();

    let placements = (0..padded_sizes.len())
        .map(|i| {
            let (page, location) = &packed_locations[&i];
            (*page, location.x(), location.y())
        })
        .collect();

    Some(placements)
}

fn assemble_pages(
    patches: &[TexturePatch],
    placements: &[(usize, u32, u32)],
    page_size: u32,
) -> Vec<TextureAtlas> {
    let num_pages =
        placements.iter().map(|&(page, _, _)| page + 1).max().unwrap();

    let mut pages: Vec<(RgbImage, Vec<[Vector2; 3]>, Vec<usize>)> = (0
        ..num_pages)
        .map(|_| {
            (RgbImage::new(page_size, page_size), Vec::new(), Vec::new())
        })
        .collect();

    for (patch, &(page, x, y)) in patches.iter().zip(placements.iter()) {
        let (image, corners, faces) = &mut pages[page];
        let (x0, y0) = (x + PATCH_SPACING, y + PATCH_SPACING);

        for (px, py, pixel) in patch.image.enumerate_pixels() {
            image.put_pixel(x0 + px, y0 + py, *pixel);
        }

        let offset = Vector2::new(x0 as f64, y0 as f64);
        let normalize =
            |uv: Vector2| (uv + offset) / page_size as f64;
        for (&face_idx, &uvs) in
            patch.faces.iter().zip(patch.texcoords.iter())
        {
            corners.push([
                normalize(uvs[0]),
                normalize(uvs[1]),
                normalize(uvs[2]),
            ]);
            faces.push(face_idx);
        }
    }

    pages
        .into_iter()
        .filter(|(_, corners, _)| !corners.is_empty())
        .map(|(image, corners, faces)| {
            let (texcoords, uv_idxs) = compress_uv_coords(&corners);
            TextureAtlas {
                image,
                texcoords,
                faces,
                texcoord_ids: uv_idxs.into_iter().flatten().collect(),
            }
        })
        .collect()
}

/// Merges per-corner texcoords that coincide (up to rounding) into
/// a shared texcoord array with per-corner indices.
pub fn compress_uv_coords(
    uv_coords: &[[Vector2; 3]],
) -> (Vec<Vector2>, Vec<[usize; 3]>) {
    const EPS: f64 = 1e-6; // Round coordinates to this size, then merge.
    let up0 = |x: f64| (x / EPS).round() as u64;
    let up1 = |uv: Vector2| [up0(uv[0]), up0(uv[1])];
    let down0 = |x| x as f64 * EPS;
    let down1 = |uv: [u64; 2]| Vector2::new(down0(uv[0]), down0(uv[1]));

    let mut uv_unique: HashMap<[u64; 2], usize> = HashMap::new();
    let mut uv_ordered: Vec<Vector2> = vec![];
    let mut uv_idxs: Vec<[usize; 3]> = vec![];

    for uvs in uv_coords {
        let mut idxs = [0, 0, 0];
        for j in 0..3 {
            let uv = up1(uvs[j]);
            if let Vacant(e) = uv_unique.entry(uv) {
                e.insert(uv_ordered.len());
                uv_ordered.push(down1(uv));
            }
            idxs[j] = uv_unique[&uv];
        }
        uv_idxs.push(idxs);
    }

    (uv_ordered, uv_idxs)
}
