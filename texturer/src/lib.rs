// This file makes `texturer` into a rust library crate.

// It allows the texturing pipeline to be embedded into a host
// application via `api::reconstruct_texture`.

// The file `main.rs` still exists to make `texturer` into an executable.

pub mod api;
pub mod atlas;
pub mod cost;
pub mod graph;
pub mod labeling;
pub mod mesh;
pub mod misc;
pub mod model;
pub mod patch;
pub mod pipeline;
pub mod progress;
pub mod scene;
pub mod seam;
pub mod timer;

#[cfg(test)]
mod test_fixtures;

pub use base;
pub use base::defs;

pub type Vector2 = nalgebra::Vector2<f64>;
pub type Vector3 = nalgebra::Vector3<f64>;
pub type Point3 = nalgebra::Point3<f64>;
pub type Matrix2 = nalgebra::Matrix2<f64>;
pub type Matrix3 = nalgebra::Matrix3<f64>;
pub type Matrix4 = nalgebra::Matrix4<f64>;
