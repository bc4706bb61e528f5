// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh analytics and statistics

use super::Mesh;
use ahash::AHashMap;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Mesh statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshStats {
    /// Enclosed volume in cubic units
    pub volume: f64,
    /// Total surface area in square units
    pub surface_area: f64,
    /// Bounding box [min_x, min_y, min_z, max_x, max_y, max_z]
    pub bbox: [f64; 6],
    /// Area-weighted surface centroid [x, y, z]
    pub centroid: [f64; 3],
    pub vertex_count: usize,
    pub triangle_count: usize,
    /// Every edge, after welding coincident positions, is shared by exactly two triangles
    pub is_watertight: bool,
}

impl MeshStats {
    pub fn empty() -> Self {
        Self {
            volume: 0.0,
            surface_area: 0.0,
            bbox: [0.0; 6],
            centroid: [0.0; 3],
            vertex_count: 0,
            triangle_count: 0,
            is_watertight: false,
        }
    }
}

/// Analyze a mesh and compute statistics
pub fn analyze(mesh: &Mesh) -> MeshStats {
    let vertex_count = mesh.vertices.len();
    let triangle_count = mesh.triangles.len();

    if vertex_count == 0 || triangle_count == 0 {
        return MeshStats {
            vertex_count,
            triangle_count,
            ..MeshStats::empty()
        };
    }

    let mut volume = 0.0f64;
    let mut surface_area = 0.0f64;
    let mut weighted = [0.0f64; 3];

    for triangle in &mesh.triangles {
        let [p0, p1, p2] = corners(mesh, triangle.indices);

        // Signed volume of the tetrahedron spanned with the origin
        volume += (p0.coords.dot(&p1.coords.cross(&p2.coords)) / 6.0) as f64;

        let area = (mesh.face_normal(triangle).norm() / 2.0) as f64;
        surface_area += area;

        let center = (p0.coords + p1.coords + p2.coords) / 3.0;
        for axis in 0..3 {
            weighted[axis] += center[axis] as f64 * area;
        }
    }

    let centroid = if surface_area > 0.0 {
        weighted.map(|w| w / surface_area)
    } else {
        [0.0; 3]
    };

    MeshStats {
        volume: volume.abs(),
        surface_area,
        bbox: bounding_box(mesh),
        centroid,
        vertex_count,
        triangle_count,
        is_watertight: check_watertight(mesh),
    }
}

fn corners(mesh: &Mesh, indices: [usize; 3]) -> [Point3<f32>; 3] {
    indices.map(|i| mesh.vertices[i].position)
}

/// Bounds of the vertices referenced by triangles; orphans left behind by
/// normal splitting do not widen it.
fn bounding_box(mesh: &Mesh) -> [f64; 6] {
    let mut min = [f64::MAX; 3];
    let mut max = [f64::MIN; 3];

    for triangle in &mesh.triangles {
        for point in corners(mesh, triangle.indices) {
            for axis in 0..3 {
                min[axis] = min[axis].min(point[axis] as f64);
                max[axis] = max[axis].max(point[axis] as f64);
            }
        }
    }

    [min[0], min[1], min[2], max[0], max[1], max[2]]
}

/// Edge-sharing check over welded positions, so meshes whose vertices were
/// split for sharp normals still count as closed.
fn check_watertight(mesh: &Mesh) -> bool {
    let mut welded: AHashMap<[u32; 3], usize> = AHashMap::with_capacity(mesh.vertices.len());
    let canonical: Vec<usize> = mesh
        .vertices
        .iter()
        .map(|vertex| {
            let p = vertex.position;
            let key = [weld_bits(p.x), weld_bits(p.y), weld_bits(p.z)];
            let next = welded.len();
            *welded.entry(key).or_insert(next)
        })
        .collect();

    let mut edge_count: AHashMap<(usize, usize), usize> = AHashMap::new();

    for triangle in &mesh.triangles {
        let indices = triangle.indices.map(|i| canonical[i]);
        for i in 0..3 {
            let (a, b) = (indices[i], indices[(i + 1) % 3]);
            let edge = if a < b { (a, b) } else { (b, a) };
            *edge_count.entry(edge).or_insert(0) += 1;
        }
    }

    edge_count.values().all(|&count| count == 2)
}

/// Bit pattern for welding; both zeros share one key
fn weld_bits(value: f32) -> u32 {
    if value == 0.0 {
        0
    } else {
        value.to_bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::mesh::tests::shared_cube;

    #[test]
    fn test_analyze_unit_cube() {
        let stats = analyze(&shared_cube());

        assert!((stats.volume - 1.0).abs() < 1e-6);
        assert!((stats.surface_area - 6.0).abs() < 1e-6);
        assert_eq!(stats.bbox, [0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        for axis in 0..3 {
            assert!((stats.centroid[axis] - 0.5).abs() < 1e-6);
        }
        assert_eq!(stats.vertex_count, 8);
        assert_eq!(stats.triangle_count, 12);
        assert!(stats.is_watertight);
    }

    #[test]
    fn test_split_cube_stays_watertight() {
        let mut mesh = shared_cube();
        mesh.recalculate_normals(30.0);

        let stats = analyze(&mesh);
        assert_eq!(stats.vertex_count, 44);
        assert!(stats.is_watertight);
        assert!((stats.volume - 1.0).abs() < 1e-6);
        assert_eq!(stats.bbox, [0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_signed_zeros_weld_together() {
        let mut mesh = shared_cube();
        mesh.recalculate_normals(30.0);

        // Copies on the zero faces now carry -0.0
        for vertex in &mut mesh.vertices[8..] {
            for axis in 0..3 {
                if vertex.position[axis] == 0.0 {
                    vertex.position[axis] = -0.0;
                }
            }
        }
        assert!(mesh.vertices.iter().any(|v| v.position.x.is_sign_negative()));
        assert!(analyze(&mesh).is_watertight);
    }

    #[test]
    fn test_open_mesh_is_not_watertight() {
        let mut mesh = shared_cube();
        mesh.triangles.pop();
        assert!(!analyze(&mesh).is_watertight);
    }

    #[test]
    fn test_empty_mesh() {
        let stats = analyze(&Mesh::new());
        assert_eq!(stats, MeshStats::empty());
    }
}
