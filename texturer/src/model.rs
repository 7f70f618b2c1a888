use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::RgbImage;

use base::defs::{Error, ErrorKind::*, IntoResult, Result};
use base::util::fs;

use crate::atlas::TextureAtlas;
use crate::mesh::Mesh;
use crate::{Point3, Vector2, Vector3};

/// The consolidated output surface: one vertex per unique atlas
/// texcoord, so a mesh vertex sitting on a UV seam appears once per
/// texture coordinate it carries. `points`, `normals` and
/// `tex_coords` are index-aligned; triangles index into them.
pub struct Model {
    pub points: Vec<Point3>,
    pub normals: Vec<Vector3>,
    pub tex_coords: Vec<Vector2>,
    pub triangles: Vec<[usize; 3]>,
    pub texture: RgbImage,
}

/// Merges atlas-local data into one deduplicated model.
///
/// Only the first atlas page contributes; packing may emit further
/// pages but the consolidated output does not merge them. An empty
/// atlas set produces an empty model.
pub fn build_model(mesh: &Mesh, atlases: &[TextureAtlas]) -> Model {
    let mut model = Model {
        points: Vec::new(),
        normals: Vec::new(),
        tex_coords: Vec::new(),
        triangles: Vec::new(),
        texture: RgbImage::new(0, 0),
    };

    let atlas = match atlases.first() {
        Some(atlas) => atlas,
        None => return model,
    };

    model.texture = atlas.image.clone();

    // The atlas texcoord array fixes the output vertex count.
    model.tex_coords = atlas.texcoords.clone();

    // A texcoord index is unique per atlas while an original vertex
    // may back several texcoord indices, so this maps many-to-one.
    let mut vertex_of_texcoord = vec![0usize; atlas.texcoords.len()];
    for (i, &face_idx) in atlas.faces.iter().enumerate() {
        let corners = mesh.faces[face_idx];
        let ids = [
            atlas.texcoord_ids[i * 3],
            atlas.texcoord_ids[i * 3 + 1],
            atlas.texcoord_ids[i * 3 + 2],
        ];
        for j in 0..3 {
            vertex_of_texcoord[ids[j]] = corners[j];
        }
        model.triangles.push(ids);
    }

    model.points = vertex_of_texcoord
        .iter()
        .map(|&vertex_idx| mesh.vertices[vertex_idx])
        .collect();
    model.normals = vertex_of_texcoord
        .iter()
        .map(|&vertex_idx| mesh.normals[vertex_idx])
        .collect();

    model
}

impl Model {
    /// Writes the mesh/material/texture file triple under the given
    /// path prefix.
    pub fn save<P: AsRef<Path>>(&self, prefix: P) -> Result<()> {
        let prefix = prefix.as_ref();
        let obj_path = PathBuf::from(format!("{}.obj", prefix.display()));
        let mtl_path = PathBuf::from(format!("{}.mtl", prefix.display()));
        let tex_path = PathBuf::from(format!("{}.png", prefix.display()));

        let local = |path: &Path| -> Result<String> {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(str::to_string)
                .ok_or_else(|| {
                    let desc = format!(
                        "output prefix '{}' has no file name",
                        prefix.display()
                    );
                    Error::new(InconsistentState, desc)
                })
        };
        let mtl_local = local(&mtl_path)?;
        let tex_local = local(&tex_path)?;

        let has_texture = self.texture.width() > 0;

        // Write MTL.
        let file = fs::create_file(&mtl_path)?;
        let mut writer = BufWriter::new(file);
        let mtl_res =
            || format!("failed to write file '{}'", mtl_path.display());
        writeln!(&mut writer, "newmtl Textured").res(mtl_res)?;
        writeln!(&mut writer, "Ka 1.000000 1.000000 1.000000").res(mtl_res)?;
        writeln!(&mut writer, "Kd 0.800000 0.800000 0.800000").res(mtl_res)?;
        writeln!(&mut writer, "Ks 0.000000 0.000000 0.000000").res(mtl_res)?;
        writeln!(&mut writer, "d 1.000000").res(mtl_res)?;
        writeln!(&mut writer, "illum 2").res(mtl_res)?;
        if has_texture {
            writeln!(&mut writer, "map_Kd {}", tex_local).res(mtl_res)?;
        }

        // Write OBJ.
        let file = fs::create_file(&obj_path)?;
        let mut writer = BufWriter::new(file);
        let obj_res =
            || format!("failed to write file '{}'", obj_path.display());
        writeln!(&mut writer, "mtllib {}", mtl_local).res(obj_res)?;
        for v in &self.points {
            writeln!(&mut writer, "v {:.6} {:.6} {:.6}", v[0], v[1], v[2])
                .res(obj_res)?;
        }
        for vt in &self.tex_coords {
            writeln!(
                &mut writer,
                "vt {:.6} {:.6}",
                // Flip the vertical axis for image-space coordinates.
                vt[0],
                1.0 - vt[1]
            )
            .res(obj_res)?;
        }
        for vn in &self.normals {
            writeln!(
                &mut writer,
                "vn {:.4} {:.4} {:.4}",
                vn[0], vn[1], vn[2]
            )
            .res(obj_res)?;
        }
        writeln!(&mut writer, "usemtl Textured\ns 1").res(obj_res)?;
        for t in &self.triangles {
            writeln!(
                &mut writer,
                // All attribute arrays are index-aligned, and OBJ
                // indexing starts at 1.
                "f {}/{}/{} {}/{}/{} {}/{}/{}",
                t[0] + 1,
                t[0] + 1,
                t[0] + 1,
                t[1] + 1,
                t[1] + 1,
                t[1] + 1,
                t[2] + 1,
                t[2] + 1,
                t[2] + 1,
            )
            .res(obj_res)?;
        }

        // Write PNG.
        if has_texture {
            self.texture.save(&tex_path).res(|| {
                format!("failed to write file '{}'", tex_path.display())
            })?;
        }

        Ok(())
    }

    pub fn to_buffers(&self) -> ModelBuffers {
        ModelBuffers {
            points: self
                .points
                .iter()
                .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
                .collect(),
            normals: self
                .normals
                .iter()
                .map(|n| [n[0] as f32, n[1] as f32, n[2] as f32])
                .collect(),
            tex_coords: self
                .tex_coords
                .iter()
                .map(|uv| [uv[0] as f32, uv[1] as f32])
                .collect(),
            triangles: self
                .triangles
                .iter()
                .map(|t| [t[0] as u32, t[1] as u32, t[2] as u32])
                .collect(),
            texture_width: self.texture.width(),
            texture_height: self.texture.height(),
            texture_data: self.texture.as_raw().clone(),
        }
    }
}

/// Flat buffers handed back to embedding callers.
#[derive(Debug)]
pub struct ModelBuffers {
    pub points: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tex_coords: Vec<[f32; 2]>,
    pub triangles: Vec<[u32; 3]>,
    pub texture_width: u32,
    pub texture_height: u32,
    /// RGB, 3 bytes per pixel, row-major.
    pub texture_data: Vec<u8>,
}
