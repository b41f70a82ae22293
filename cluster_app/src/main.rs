//! Clustered forward demo
//!
//! Renders a grid of cubes lit by a ring of colored point lights while the
//! camera orbits the scene. Settings are read from `cluster.toml` when it
//! exists.

use cluster_engine::foundation::logging;
use cluster_engine::foundation::math::{look_at, perspective};
use cluster_engine::prelude::*;

const CONFIG_PATH: &str = "cluster.toml";
const GRID: i32 = 5;
const SPACING: f32 = 2.5;
const LIGHT_COUNT: usize = 12;

/// Cube corners with outward normals, one face at a time
fn cube_vertices() -> Vec<[f32; 6]> {
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
    ];

    let mut vertices = Vec::with_capacity(24);
    for (normal, u, v) in faces {
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let p = [0, 1, 2].map(|i| 0.5 * (normal[i] + su * u[i] + sv * v[i]));
            vertices.push([p[0], p[1], p[2], normal[0], normal[1], normal[2]]);
        }
    }
    vertices
}

fn cube_indices() -> Vec<u32> {
    (0..6u32)
        .flat_map(|face| [0, 1, 2, 2, 3, 0].map(|i| face * 4 + i))
        .collect()
}

/// One cube mesh shared by a grid of objects, one meshlet each
fn cube_grid() -> (SceneGeometry, Vec<ObjectRecord>, u32) {
    let geometry = SceneGeometry::from_vertices(&cube_vertices(), cube_indices());
    let half = (GRID - 1) as f32 * SPACING * 0.5;

    let objects: Vec<ObjectRecord> = (0..GRID)
        .flat_map(|x| (0..GRID).map(move |z| (x, z)))
        .enumerate()
        .map(|(i, (x, z))| {
            let position = [x as f32 * SPACING - half, 0.0, z as f32 * SPACING - half];
            ObjectRecord::new(position, 0.87, i as u32, 1)
        })
        .collect();
    let meshlets = objects.len() as u32;
    (geometry, objects, meshlets)
}

fn light_color(i: usize) -> [f32; 3] {
    match i % 3 {
        0 => [1.0, 0.45, 0.3],
        1 => [0.35, 1.0, 0.5],
        _ => [0.4, 0.55, 1.0],
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_with_filter("cluster_engine=info,cluster_app=info");

    let config = RendererConfig::load_or_default(CONFIG_PATH)?.with_window_size(1280, 720);
    let mut renderer = RenderContext::init_with_config(&config);

    let (geometry, objects, meshlets) = cube_grid();
    log::info!("Scene: {} objects, {} meshlets", objects.len(), meshlets);
    renderer.set_scene(geometry, objects, meshlets);

    for i in 0..LIGHT_COUNT {
        let angle = i as f32 / LIGHT_COUNT as f32 * std::f32::consts::TAU;
        let radius = 6.0;
        renderer.add_light([radius * angle.cos(), 1.5, radius * angle.sin()], light_color(i));
    }
    log::info!("Lights: {} (capacity {})", renderer.lights().len(), renderer.light_capacity());

    let aspect = config.window_width as f32 / config.window_height as f32;
    let projection = perspective(60f32.to_radians(), aspect, 0.1, 100.0);

    while !renderer.window().should_close() {
        renderer.window_mut().poll_events();

        let t = renderer.window().time() as f32 * 0.3;
        let eye = [14.0 * t.cos(), 7.0, 14.0 * t.sin()];
        renderer.set_camera(projection, look_at(eye, [0.0, 0.0, 0.0], [0.0, 1.0, 0.0]));

        let report = renderer.draw_frame();
        if report.frame % 600 == 0 {
            log::info!("Frame {} on slot {}", report.frame, report.slot.index());
        }
    }

    renderer.shutdown();
    Ok(())
}
