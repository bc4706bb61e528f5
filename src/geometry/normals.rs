// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Sharp-edge normal splitting
//!
//! Shared vertices that straddle a crease get averaged normals, which makes
//! hard edges look soft. The splitter gives each triangle corner whose face
//! normal strays too far from the averaged vertex normal its own copy of
//! that vertex, then recomputes normals on the result.
//!
//! The per-corner test reads only immutable mesh data and writes one flag
//! triple per triangle, so it fans out with rayon. Duplication runs as a
//! single sequential pass so new vertex indices are stable.

use super::{Mesh, Vertex};
use crate::utils::math::angle_between;
use rayon::prelude::*;

/// Splitting angle at or above which nothing is split
pub const NO_SPLITTING: f32 = 180.0;

/// Whether `splitting_angle` can ever split a corner.
/// NaN is treated like an angle of 180° or more.
pub fn splitting_enabled(splitting_angle: f32) -> bool {
    splitting_angle < NO_SPLITTING
}

/// Decide, per triangle corner, whether the corner needs its own vertex.
///
/// A corner is split when the angle between the triangle's face normal and
/// the current vertex normal exceeds `splitting_angle` degrees.
pub fn corner_splits(mesh: &Mesh, splitting_angle: f32) -> Vec<[bool; 3]> {
    mesh.triangles
        .par_iter()
        .map(|triangle| {
            let face_normal = mesh.face_normal(triangle);
            triangle.indices.map(|idx| {
                angle_between(&mesh.vertices[idx].normal, &face_normal) > splitting_angle
            })
        })
        .collect()
}

/// Append a copy of each flagged corner's vertex and point the corner at it.
/// Returns the number of vertices added.
pub fn duplicate_corners(mesh: &mut Mesh, splits: &[[bool; 3]]) -> usize {
    let original = mesh.vertices.len();

    for (triangle, flags) in mesh.triangles.iter_mut().zip(splits) {
        for (corner, &split) in flags.iter().enumerate() {
            if split {
                let source = triangle.indices[corner];
                let position = mesh.vertices[source].position;
                mesh.vertices.push(Vertex::new(position, mesh.vertices[source].normal));
                triangle.indices[corner] = mesh.vertices.len() - 1;
            }
        }
    }

    mesh.vertices.len() - original
}

/// Recompute naive normals and, when `splitting_angle` is below 180°,
/// split vertices along sharp creases and recompute again.
/// Returns the number of vertices added.
pub fn split_normals(mesh: &mut Mesh, splitting_angle: f32) -> usize {
    mesh.recompute_normals();

    if !splitting_enabled(splitting_angle) || mesh.vertices.is_empty() || mesh.triangles.is_empty()
    {
        return 0;
    }

    let splits = corner_splits(mesh, splitting_angle);
    let added = duplicate_corners(mesh, &splits);
    mesh.recompute_normals();

    tracing::debug!(
        splitting_angle,
        added,
        vertices = mesh.vertices.len(),
        "split vertex normals"
    );
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::mesh::tests::shared_cube;
    use crate::geometry::{RawMesh, Triangle};
    use nalgebra::Point3;

    #[test]
    fn test_no_splitting_at_180() {
        let mut mesh = shared_cube();
        let before: Vec<Triangle> = mesh.triangles.clone();

        assert_eq!(split_normals(&mut mesh, 180.0), 0);
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.triangles, before);

        assert_eq!(split_normals(&mut mesh, 270.0), 0);
        assert_eq!(split_normals(&mut mesh, f32::NAN), 0);
    }

    #[test]
    fn test_zero_threshold_splits_every_bent_corner() {
        let mut mesh = shared_cube();
        let added = split_normals(&mut mesh, 0.0);

        // No cube corner normal lines up with any adjacent face
        assert_eq!(added, 36);
        assert_eq!(mesh.vertex_count(), 8 + 36);

        // Every referenced vertex now carries its face's normal
        for triangle in &mesh.triangles {
            let face = mesh.face_normal(triangle).normalize();
            for &idx in &triangle.indices {
                assert!((mesh.vertices[idx].normal - face).norm() < 1e-5);
            }
        }
    }

    #[test]
    fn test_moderate_threshold_keeps_soft_corners() {
        // Corner normals sit between 35° and 71° away from adjacent faces
        let mut mesh = shared_cube();
        assert_eq!(split_normals(&mut mesh, 75.0), 0);

        let mut mesh = shared_cube();
        assert_eq!(split_normals(&mut mesh, 30.0), 36);
    }

    #[test]
    fn test_flat_fan_never_splits() {
        let raw = RawMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        );
        let mut mesh = raw.into_mesh();
        assert_eq!(split_normals(&mut mesh, 0.0), 0);
        assert_eq!(mesh.vertex_count(), 4);
    }

    #[test]
    fn test_duplicate_corners_rewrites_indices_in_order() {
        let mut mesh = shared_cube();
        let mut splits = vec![[false; 3]; mesh.triangle_count()];
        splits[0] = [true, false, true];
        splits[3] = [false, true, false];

        let original = mesh.triangles.clone();
        assert_eq!(duplicate_corners(&mut mesh, &splits), 3);

        assert_eq!(mesh.triangles[0].indices, [8, original[0].indices[1], 9]);
        assert_eq!(mesh.triangles[3].indices[1], 10);
        assert_eq!(
            mesh.vertices[8].position,
            mesh.vertices[original[0].indices[0]].position
        );
        assert_eq!(
            mesh.vertices[10].position,
            mesh.vertices[original[3].indices[1]].position
        );
    }
}
