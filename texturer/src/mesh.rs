use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use base::defs::{Error, ErrorKind::*, Result};
use base::util::fs;

use crate::{Point3, Vector3};

const MAX_NUM_FACE_VERTICES: usize = 10;

#[derive(Clone, Default, Debug)]
pub struct Mesh {
    pub vertices: Vec<Point3>,
    pub normals: Vec<Vector3>,
    pub faces: Vec<[usize; 3]>,
}

impl Mesh {
    pub fn from_buffers(
        points: &[[f32; 3]],
        normals: &[[f32; 3]],
        triangles: &[[u32; 3]],
    ) -> Result<Mesh> {
        let mut mesh = Mesh {
            vertices: points
                .iter()
                .map(|p| Point3::new(p[0] as f64, p[1] as f64, p[2] as f64))
                .collect(),
            normals: normals
                .iter()
                .map(|n| Vector3::new(n[0] as f64, n[1] as f64, n[2] as f64))
                .collect(),
            faces: triangles
                .iter()
                .map(|t| [t[0] as usize, t[1] as usize, t[2] as usize])
                .collect(),
        };

        for &[v0, v1, v2] in &mesh.faces {
            let num_vertices = mesh.vertices.len();
            if v0 >= num_vertices || v1 >= num_vertices || v2 >= num_vertices {
                let desc = format!(
                    "triangle references vertex beyond the {} provided",
                    num_vertices
                );
                return Err(Error::new(InconsistentState, desc));
            }
        }

        if mesh.normals.len() != mesh.vertices.len() {
            mesh.compute_vertex_normals();
        }

        Ok(mesh)
    }

    /// Area-weighted vertex normals from face geometry.
    pub fn compute_vertex_normals(&mut self) {
        let mut normals = vec![Vector3::zeros(); self.vertices.len()];
        for &[v0, v1, v2] in &self.faces {
            let diff1 = self.vertices[v1] - self.vertices[v0];
            let diff2 = self.vertices[v2] - self.vertices[v0];
            let weighted = diff1.cross(&diff2);
            normals[v0] += weighted;
            normals[v1] += weighted;
            normals[v2] += weighted;
        }
        for normal in normals.iter_mut() {
            let norm = normal.norm();
            if norm > 0.0 {
                *normal /= norm;
            }
        }
        self.normals = normals;
    }

    pub fn face_normal(&self, face_idx: usize) -> Vector3 {
        let [v0, v1, v2] = self.faces[face_idx];
        let diff1 = self.vertices[v1] - self.vertices[v0];
        let diff2 = self.vertices[v2] - self.vertices[v0];
        let normal = diff1.cross(&diff2);
        let norm = normal.norm();
        if norm > 0.0 {
            normal / norm
        } else {
            normal
        }
    }

    pub fn face_centroid(&self, face_idx: usize) -> Point3 {
        let [v0, v1, v2] = self.faces[face_idx];
        Point3::from(
            (self.vertices[v0].coords
                + self.vertices[v1].coords
                + self.vertices[v2].coords)
                / 3.0,
        )
    }
}

pub fn load_mesh<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .unwrap_or_default()
        .to_str()
        .unwrap_or_default()
        .to_lowercase();
    if ext != "obj" {
        let desc = format!(
            "unsupported mesh file extension '{}', expected .obj",
            ext
        );
        return Err(Error::new(UnsupportedFeature, desc));
    }
    read_obj_mesh(fs::open_file(path)?)
}

pub fn read_obj_mesh<R: Read>(reader: R) -> Result<Mesh> {
    let mut state = ObjState::default();

    for line_res in BufReader::new(reader).lines() {
        if let Ok(line) = line_res {
            state.line += 1;

            let parts: Vec<&str> = line.trim().split_whitespace().collect();
            if !parts.is_empty() {
                match parts[0] {
                    "f" => read_f(&mut state, &parts)?,
                    "v" => read_v(&mut state, &parts)?,
                    "vn" => read_vn(&mut state, &parts)?,
                    _ => (),
                }
            }
        }
    }

    let mut mesh = Mesh {
        vertices: state.vertices,
        normals: Vec::new(),
        faces: state.faces,
    };
    mesh.compute_vertex_normals();

    Ok(mesh)
}

#[derive(Default)]
struct ObjState {
    line: usize,
    vertices: Vec<Point3>,
    faces: Vec<[usize; 3]>,
}

fn read_f(state: &mut ObjState, parts: &[&str]) -> Result<()> {
    let num_vertices_err_res = |kind, prop| {
        let msg = "number of vertices in f-statement at line";
        Err(Error::new(kind, format!("{} {} {}", prop, msg, state.line)))
    };
    if parts.len() < 4 {
        return num_vertices_err_res(MalformedData, "bad");
    } else if parts.len() > MAX_NUM_FACE_VERTICES {
        return num_vertices_err_res(UnsupportedFeature, "unsupported");
    }

    let mut face_vertices = [0; MAX_NUM_FACE_VERTICES];

    for (i, part) in parts[1..].iter().enumerate() {
        let vertex_ref = part.split('/').next().unwrap_or_default();
        let num = vertex_ref.parse::<usize>().unwrap_or_default();
        if num == 0 || num > state.vertices.len() {
            let desc = format!(
                "malformed vertex {} in f-statement at line {}",
                i + 1,
                state.line
            );
            return Err(Error::new(MalformedData, desc));
        }
        face_vertices[i] = num - 1;
    }

    // Fan-triangulate polygonal faces.
    let len = parts.len() - 1;
    for i in 1..len - 1 {
        state.faces.push([
            face_vertices[0],
            face_vertices[i],
            face_vertices[i + 1],
        ]);
    }

    Ok(())
}

fn read_v(state: &mut ObjState, parts: &[&str]) -> Result<()> {
    if parts.len() < 4 || parts.len() > 5 {
        return Err(Error::new(
            MalformedData,
            format!("malformed v-statement at line {}", state.line),
        ));
    }

    let x = parse_coord("x-coordinate of v-statement", state.line, parts[1])?;
    let y = parse_coord("y-coordinate of v-statement", state.line, parts[2])?;
    let z = parse_coord("z-coordinate of v-statement", state.line, parts[3])?;

    state.vertices.push(Point3::new(x, y, z));

    Ok(())
}

fn read_vn(state: &mut ObjState, parts: &[&str]) -> Result<()> {
    // Normals are recomputed from face geometry, but validate the input.
    if parts.len() != 4 {
        return Err(Error::new(
            MalformedData,
            format!("malformed vn-statement at line {}", state.line),
        ));
    }
    Ok(())
}

fn parse_coord(what: &str, line: usize, str: &str) -> Result<f64> {
    match str.parse::<f64>() {
        Ok(val) => Ok(val),
        Err(_) => Err(Error::new(
            MalformedData,
            format!("failed to parse {} at line {}", what, line),
        )),
    }
}

/// A regular tetrahedron over the unit corner, used by tests
/// and as the smallest closed fixture mesh.
#[cfg(test)]
pub fn tetrahedron() -> Mesh {
    let mut mesh = Mesh {
        vertices: vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ],
        normals: Vec::new(),
        faces: vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
    };
    mesh.compute_vertex_normals();
    mesh
}
