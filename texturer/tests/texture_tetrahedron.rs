// End-to-end runs of the texturing pipeline over a tetrahedron
// observed by two synthetic calibrated views.

use std::fs;
use std::path::PathBuf;

use image::{Rgb, RgbImage};

use texturer::base::util::fs::write_json_gz;
use texturer::defs::ErrorKind;
use texturer::mesh::Mesh;
use texturer::pipeline::{
    texture_mesh, texture_with_params, MemorySink, Settings, TextureParams,
};
use texturer::scene::TextureView;
use texturer::{Matrix3, Matrix4};

fn tetrahedron_mesh() -> Mesh {
    let points = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
    ];
    let triangles = [[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]];
    Mesh::from_buffers(&points, &[], &triangles).unwrap()
}

fn intrinsic() -> Matrix3 {
    Matrix3::new(32.0, 0.0, 32.0, 0.0, 32.0, 32.0, 0.0, 0.0, 1.0)
}

fn opposing_views() -> Vec<TextureView> {
    // One camera on each side of the mesh, both at distance 5 and
    // slightly off the Z axis so every vertex projects to its own
    // pixel.
    #[rustfmt::skip]
    let front = Matrix4::new(
        1.0, 0.0, 0.0, -0.3,
        0.0, 1.0, 0.0, -0.2,
        0.0, 0.0, 1.0, 5.0,
        0.0, 0.0, 0.0, 1.0,
    );

    #[rustfmt::skip]
    let back = Matrix4::new(
        1.0, 0.0, 0.0, -0.3,
        0.0, -1.0, 0.0, 0.2,
        0.0, 0.0, -1.0, 5.0,
        0.0, 0.0, 0.0, 1.0,
    );

    vec![
        TextureView {
            image: RgbImage::from_pixel(64, 64, Rgb([200, 100, 50])),
            intrinsic: intrinsic(),
            world_to_camera: front,
        },
        TextureView {
            image: RgbImage::from_pixel(64, 64, Rgb([50, 100, 200])),
            intrinsic: intrinsic(),
            world_to_camera: back,
        },
    ]
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(name);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_supplied_labeling_end_to_end() {
    let dir = temp_dir("texturer_e2e_labeling");
    let labeling_path = dir.join("labeling.json.gz");
    write_json_gz(&labeling_path, &vec![1usize, 1, 2, 2]).unwrap();

    let mesh = tetrahedron_mesh();
    let mut views = opposing_views();
    let settings = Settings {
        labeling_file: Some(labeling_path.clone()),
        ..Settings::default()
    };
    let mut sink = MemorySink::default();
    texture_mesh(&mesh, &mut views, &settings, &mut sink).unwrap();
    fs::remove_file(&labeling_path).ok();

    let buffers = sink.buffers.unwrap();
    assert_eq!(buffers.triangles.len(), 4);

    // Each of the two patches covers two faces sharing an edge, so
    // it carries 4 distinct corner texcoords; corners are not shared
    // across patches.
    assert_eq!(buffers.points.len(), 8);
    assert_eq!(buffers.normals.len(), 8);
    assert_eq!(buffers.tex_coords.len(), 8);

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
fn test_mismatched_labeling_aborts() {
    let dir = temp_dir("texturer_e2e_mismatch");
    let labeling_path = dir.join("labeling.json.gz");
    write_json_gz(&labeling_path, &vec![1usize, 1, 2]).unwrap();

    let mesh = tetrahedron_mesh();
    let mut views = opposing_views();
    let settings = Settings {
        labeling_file: Some(labeling_path.clone()),
        ..Settings::default()
    };
    let mut sink = MemorySink::default();
    let err =
        texture_mesh(&mesh, &mut views, &settings, &mut sink).unwrap_err();
    fs::remove_file(&labeling_path).ok();

    assert_eq!(err.kind, ErrorKind::LabelingMismatch);
    assert!(sink.buffers.is_none());
}

#[test]
fn test_view_selection_debug_model() {
    let dir = temp_dir("texturer_e2e_debug");
    let labeling_path = dir.join("labeling.json.gz");
    write_json_gz(&labeling_path, &vec![1usize, 1, 2, 2]).unwrap();

    let mesh = tetrahedron_mesh();
    let mut views = opposing_views();
    let settings = Settings {
        labeling_file: Some(labeling_path.clone()),
        write_view_selection_model: true,
        ..Settings::default()
    };
    let mut sink = MemorySink::default();
    texture_mesh(&mesh, &mut views, &settings, &mut sink).unwrap();
    fs::remove_file(&labeling_path).ok();

    let buffers = sink.buffers.unwrap();
    let debug = sink.view_selection_buffers.unwrap();

    // The debug pass rebuilds its own atlases and must not disturb
    // the primary model's shape.
    assert_eq!(buffers.triangles.len(), 4);
    assert_eq!(debug.triangles.len(), 4);
    assert_eq!(debug.points.len(), buffers.points.len());
}

#[test]
fn test_cli_file_mode() {
    let dir = temp_dir("texturer_e2e_cli");

    let obj_path = dir.join("mesh.obj");
    fs::write(
        &obj_path,
        "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 0 0 1\n\
         f 1 3 2\nf 1 2 4\nf 1 4 3\nf 2 3 4\n",
    )
    .unwrap();

    let front_image = dir.join("front.png");
    let back_image = dir.join("back.png");
    RgbImage::from_pixel(64, 64, Rgb([200, 100, 50]))
        .save(&front_image)
        .unwrap();
    RgbImage::from_pixel(64, 64, Rgb([50, 100, 200]))
        .save(&back_image)
        .unwrap();

    let scene = serde_json::json!({
        "views": [
            {
                "image": "front.png",
                "intrinsic": [
                    32.0, 0.0, 32.0,
                    0.0, 32.0, 32.0,
                    0.0, 0.0, 1.0
                ],
                "extrinsic": [
                    1.0, 0.0, 0.0, -0.3,
                    0.0, 1.0, 0.0, -0.2,
                    0.0, 0.0, 1.0, 5.0,
                    0.0, 0.0, 0.0, 1.0
                ]
            },
            {
                "image": "back.png",
                "intrinsic": [
                    32.0, 0.0, 32.0,
                    0.0, 32.0, 32.0,
                    0.0, 0.0, 1.0
                ],
                "extrinsic": [
                    1.0, 0.0, 0.0, -0.3,
                    0.0, -1.0, 0.0, 0.2,
                    0.0, 0.0, -1.0, 5.0,
                    0.0, 0.0, 0.0, 1.0
                ]
            }
        ]
    });
    let scene_path = dir.join("scene.json");
    fs::write(&scene_path, scene.to_string()).unwrap();

    let params = TextureParams {
        in_mesh: obj_path,
        in_scene: scene_path,
        out_prefix: dir.join("out"),
        global_seam_leveling: false,
        skip_local_seam_leveling: false,
        data_cost_file: None,
        labeling_file: None,
        write_intermediate_results: true,
        write_timings: true,
        write_view_selection_model: false,
    };
    texture_with_params(&params).unwrap();

    for name in [
        "out.obj",
        "out.mtl",
        "out.png",
        "out_labeling.json.gz",
        "out_timings.csv",
    ] {
        assert!(dir.join(name).is_file(), "missing {}", name);
    }

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_missing_destination_directory() {
    let params = TextureParams {
        in_mesh: PathBuf::from("mesh.obj"),
        in_scene: PathBuf::from("scene.json"),
        out_prefix: PathBuf::from("/nonexistent-texturer-dir/out"),
        global_seam_leveling: false,
        skip_local_seam_leveling: false,
        data_cost_file: None,
        labeling_file: None,
        write_intermediate_results: false,
        write_timings: false,
        write_view_selection_model: false,
    };
    let err = texture_with_params(&params).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InconsistentState);
}
