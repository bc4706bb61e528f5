// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh representation and utilities

use super::normals;
use crate::utils::math::triangle_normal;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Polygonizer output: positions plus index triples into them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMesh {
    pub vertices: Vec<Point3<f32>>,
    pub triangles: Vec<[u32; 3]>,
}

impl RawMesh {
    pub fn new(vertices: Vec<Point3<f32>>, triangles: Vec<[u32; 3]>) -> Self {
        Self {
            vertices,
            triangles,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Every triangle index refers to an existing vertex
    pub fn is_valid(&self) -> bool {
        let count = self.vertices.len();
        self.triangles
            .iter()
            .all(|tri| tri.iter().all(|&i| (i as usize) < count))
    }

    /// Convert to a renderable mesh with naive (unsplit) vertex normals
    pub fn into_mesh(self) -> Mesh {
        let mut mesh = Mesh::with_capacity(self.vertices.len(), self.triangles.len());
        for position in self.vertices {
            mesh.add_vertex(Vertex::new(position, Vector3::zeros()));
        }
        for [a, b, c] in self.triangles {
            mesh.add_triangle(Triangle::new([a as usize, b as usize, c as usize]));
        }
        mesh.recompute_normals();
        mesh
    }
}

/// Vertex with position and normal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
}

impl Vertex {
    pub fn new(position: Point3<f32>, normal: Vector3<f32>) -> Self {
        Self { position, normal }
    }
}

/// Triangle defined by three vertex indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triangle {
    pub indices: [usize; 3],
}

impl Triangle {
    pub fn new(indices: [usize; 3]) -> Self {
        Self { indices }
    }
}

/// Triangular mesh
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(vertex_count: usize, triangle_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            triangles: Vec::with_capacity(triangle_count),
        }
    }

    /// Add a vertex and return its index
    pub fn add_vertex(&mut self, vertex: Vertex) -> usize {
        let index = self.vertices.len();
        self.vertices.push(vertex);
        index
    }

    pub fn add_triangle(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Unnormalized face normal; its length is twice the triangle area
    pub fn face_normal(&self, triangle: &Triangle) -> Vector3<f32> {
        let [a, b, c] = triangle.indices;
        triangle_normal(
            &self.vertices[a].position,
            &self.vertices[b].position,
            &self.vertices[c].position,
        )
    }

    /// Recompute vertex normals from triangle geometry.
    /// Face normals are accumulated unnormalized, so larger faces weigh more.
    pub fn recompute_normals(&mut self) {
        let mut normal_sums: Vec<Vector3<f32>> = vec![Vector3::zeros(); self.vertices.len()];

        for triangle in &self.triangles {
            let face_normal = self.face_normal(triangle);
            if face_normal.norm_squared() > 1e-24 {
                for &idx in &triangle.indices {
                    normal_sums[idx] += face_normal;
                }
            }
        }

        for (vertex, sum) in self.vertices.iter_mut().zip(normal_sums) {
            // Unreferenced or fully degenerate vertices keep a zero normal
            vertex.normal = sum.try_normalize(1e-12).unwrap_or_else(Vector3::zeros);
        }
    }

    /// Recompute normals, then split vertices along creases sharper than
    /// `splitting_angle` degrees. Returns the number of vertices added.
    pub fn recalculate_normals(&mut self, splitting_angle: f32) -> usize {
        normals::split_normals(self, splitting_angle)
    }
}

impl From<RawMesh> for Mesh {
    fn from(raw: RawMesh) -> Self {
        raw.into_mesh()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Closed axis-aligned cube with 8 shared corners and 12 triangles,
    /// wound counter-clockwise seen from outside.
    pub(crate) fn shared_cube() -> Mesh {
        let corners = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
            [0.0, 1.0, 1.0],
        ];
        let faces: [[usize; 3]; 12] = [
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [2, 3, 7],
            [2, 7, 6],
            [1, 2, 6],
            [1, 6, 5],
            [0, 4, 7],
            [0, 7, 3],
        ];
        let raw = RawMesh::new(
            corners
                .iter()
                .map(|c| Point3::new(c[0], c[1], c[2]))
                .collect(),
            faces
                .iter()
                .map(|f| [f[0] as u32, f[1] as u32, f[2] as u32])
                .collect(),
        );
        raw.into_mesh()
    }

    #[test]
    fn test_recompute_normals_point_outward() {
        let mesh = shared_cube();
        let center = Point3::new(0.5, 0.5, 0.5);

        for vertex in &mesh.vertices {
            let outward = vertex.position - center;
            assert!(vertex.normal.dot(&outward) > 0.0);
            assert!((vertex.normal.norm() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_raw_mesh_validity() {
        let mut raw = RawMesh::new(
            vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
            vec![[0, 1, 2]],
        );
        assert!(raw.is_valid());
        raw.triangles.push([0, 1, 3]);
        assert!(!raw.is_valid());
    }

    #[test]
    fn test_unreferenced_vertex_has_zero_normal() {
        let raw = RawMesh::new(
            vec![
                Point3::origin(),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(5.0, 5.0, 5.0),
            ],
            vec![[0, 1, 2]],
        );
        let mesh = raw.into_mesh();
        assert_eq!(mesh.vertices[0].normal, Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(mesh.vertices[3].normal, Vector3::zeros());
    }
}
