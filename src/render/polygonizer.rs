// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Isosurface extraction
//!
//! [`Polygonizer`] is the seam between expression trees and meshes. The
//! built-in [`SurfaceNets`] samples the field on a regular lattice and hands
//! it to `fast-surface-nets`.

use crate::error::{FrepError, Result};
use crate::geometry::{RawMesh, Region};
use crate::tree::Expr;
use crate::utils::math::triangle_normal;
use fast_surface_nets::ndshape::Shape;
use fast_surface_nets::{surface_nets, SurfaceNetsBuffer};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use std::time::Instant;

/// Converts an implicit surface inside a region into triangles.
///
/// `resolution` is a sampling density in samples per unit length.
/// `Ok(None)` means the region holds no surface; that is not an error.
pub trait Polygonizer: Send + Sync {
    fn polygonize(&self, expr: &Expr, region: &Region, resolution: f32)
        -> Result<Option<RawMesh>>;
}

/// Reject resolutions that cannot produce a finite lattice
pub fn check_resolution(resolution: f32) -> Result<()> {
    if resolution.is_finite() && resolution > 0.0 {
        Ok(())
    } else {
        Err(FrepError::InvalidResolution(resolution))
    }
}

/// Row-major lattice layout, x fastest
#[derive(Debug, Clone, Copy)]
struct GridShape {
    nx: u32,
    ny: u32,
    nz: u32,
}

impl Shape<3> for GridShape {
    type Coord = u32;

    #[inline]
    fn as_array(&self) -> [Self::Coord; 3] {
        [self.nx, self.ny, self.nz]
    }

    fn size(&self) -> Self::Coord {
        self.nx * self.ny * self.nz
    }

    fn usize(&self) -> usize {
        self.size() as usize
    }

    fn linearize(&self, coords: [Self::Coord; 3]) -> u32 {
        let [x, y, z] = coords;
        (z * self.ny + y) * self.nx + x
    }

    fn delinearize(&self, i: u32) -> [Self::Coord; 3] {
        let x = i % self.nx;
        let yz = i / self.nx;
        [x, yz % self.ny, yz / self.ny]
    }
}

/// Sampling lattice covering a region, with one extra padding layer
#[derive(Debug, Clone, Copy)]
struct Lattice {
    shape: GridShape,
    origin: Point3<f32>,
    step: Vector3<f32>,
    cells: [u32; 3],
}

impl Lattice {
    fn new(region: &Region, resolution: f32, max_cells: u32) -> Self {
        let max_cells = max_cells.clamp(1, SurfaceNets::CELL_LIMIT);
        let size = region.size();
        let target = 1.0 / resolution;

        let mut cells = [1u32; 3];
        for axis in 0..3 {
            let wanted = (size[axis] / target).ceil().max(1.0);
            if wanted > max_cells as f32 {
                tracing::warn!(
                    axis,
                    wanted,
                    max_cells,
                    "clamping lattice resolution"
                );
            }
            cells[axis] = (wanted.min(max_cells as f32) as u32).max(1);
        }

        let step = Vector3::new(
            size.x / cells[0] as f32,
            size.y / cells[1] as f32,
            size.z / cells[2] as f32,
        );

        // cells + 1 samples span the region, one more on each side pads it
        let shape = GridShape {
            nx: cells[0] + 3,
            ny: cells[1] + 3,
            nz: cells[2] + 3,
        };

        Self {
            shape,
            origin: region.min - step,
            step,
            cells,
        }
    }

    fn is_padding(&self, [x, y, z]: [u32; 3]) -> bool {
        x == 0
            || y == 0
            || z == 0
            || x == self.shape.nx - 1
            || y == self.shape.ny - 1
            || z == self.shape.nz - 1
    }

    fn to_world(&self, lattice: [f32; 3]) -> Point3<f32> {
        Point3::new(
            self.origin.x + lattice[0] * self.step.x,
            self.origin.y + lattice[1] * self.step.y,
            self.origin.z + lattice[2] * self.step.z,
        )
    }

    fn sample(&self, expr: &Expr) -> Vec<f32> {
        // Positive padding closes shapes cut by the region boundary
        let outside = self.step.max();

        (0..self.shape.size())
            .into_par_iter()
            .map(|i| {
                let coords = self.shape.delinearize(i);
                if self.is_padding(coords) {
                    return outside;
                }
                let point = self.to_world(coords.map(|c| c as f32));
                let value = expr.eval(&point);
                if value.is_nan() {
                    outside
                } else {
                    value.clamp(-f32::MAX, f32::MAX)
                }
            })
            .collect()
    }
}

/// Built-in polygonizer backed by `fast-surface-nets`
#[derive(Debug, Clone, Copy)]
pub struct SurfaceNets {
    /// Upper bound on lattice cells along any axis
    pub max_cells_per_axis: u32,
}

impl SurfaceNets {
    pub const DEFAULT_MAX_CELLS: u32 = 256;

    /// Largest per-axis cell count whose padded lattice, `(n + 3)^3`
    /// samples, still fits the `u32` index space
    pub const CELL_LIMIT: u32 = 1622;

    pub fn new(max_cells_per_axis: u32) -> Self {
        if max_cells_per_axis > Self::CELL_LIMIT {
            tracing::warn!(
                requested = max_cells_per_axis,
                limit = Self::CELL_LIMIT,
                "clamping max cells per axis"
            );
        }
        Self {
            max_cells_per_axis: max_cells_per_axis.clamp(1, Self::CELL_LIMIT),
        }
    }
}

impl Default for SurfaceNets {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_CELLS)
    }
}

impl Polygonizer for SurfaceNets {
    fn polygonize(
        &self,
        expr: &Expr,
        region: &Region,
        resolution: f32,
    ) -> Result<Option<RawMesh>> {
        region.validate()?;
        check_resolution(resolution)?;

        let start = Instant::now();
        let lattice = Lattice::new(region, resolution, self.max_cells_per_axis);
        let field = lattice.sample(expr);
        let sampled = start.elapsed();

        let mut buffer = SurfaceNetsBuffer::default();
        let [nx, ny, nz] = lattice.shape.as_array();
        surface_nets(&field, &lattice.shape, [0; 3], [nx - 1, ny - 1, nz - 1], &mut buffer);

        if buffer.indices.is_empty() {
            tracing::debug!(cells = ?lattice.cells, ?sampled, "polygonized empty surface");
            return Ok(None);
        }

        let vertices: Vec<Point3<f32>> = buffer
            .positions
            .iter()
            .map(|&p| {
                let world = lattice.to_world(p);
                // Surfaces closed by the padding layer land on the region faces
                world.sup(&region.min).inf(&region.max)
            })
            .collect();

        let mut triangles: Vec<[u32; 3]> = buffer
            .indices
            .chunks_exact(3)
            .map(|tri| [tri[0], tri[1], tri[2]])
            .collect();

        if faces_inward(expr, &vertices, &triangles, &lattice.step) {
            for tri in &mut triangles {
                tri.swap(1, 2);
            }
        }

        tracing::debug!(
            cells = ?lattice.cells,
            vertices = vertices.len(),
            triangles = triangles.len(),
            ?sampled,
            total = ?start.elapsed(),
            "polygonized surface"
        );

        Ok(Some(RawMesh::new(vertices, triangles)))
    }
}

/// Whether most sampled face normals disagree with the field gradient,
/// which points from inside to outside.
fn faces_inward(
    expr: &Expr,
    vertices: &[Point3<f32>],
    triangles: &[[u32; 3]],
    step: &Vector3<f32>,
) -> bool {
    const SAMPLES: usize = 64;
    let stride = (triangles.len() / SAMPLES).max(1);
    let h = step.min() * 0.5;

    let votes: i64 = triangles
        .par_iter()
        .step_by(stride)
        .map(|&[a, b, c]| {
            let (p0, p1, p2) = (
                &vertices[a as usize],
                &vertices[b as usize],
                &vertices[c as usize],
            );
            let normal = triangle_normal(p0, p1, p2);
            let center = Point3::from((p0.coords + p1.coords + p2.coords) / 3.0);
            let dot = normal.dot(&gradient(expr, &center, h));
            if dot > 0.0 {
                1
            } else if dot < 0.0 {
                -1
            } else {
                0
            }
        })
        .sum();

    votes < 0
}

/// Central-difference gradient of the field
fn gradient(expr: &Expr, point: &Point3<f32>, h: f32) -> Vector3<f32> {
    let mut grad = Vector3::zeros();
    for axis in 0..3 {
        let mut ahead = *point;
        let mut behind = *point;
        ahead[axis] += h;
        behind[axis] -= h;
        grad[axis] = expr.eval(&ahead) - expr.eval(&behind);
    }
    grad
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csg::{cuboid, sphere_at_origin};
    use crate::geometry::analyze;
    use crate::tree::Context;

    #[test]
    fn test_grid_shape_roundtrip() {
        let shape = GridShape { nx: 4, ny: 5, nz: 6 };
        assert_eq!(shape.linearize([3, 4, 5]), shape.size() - 1);
        assert_eq!(shape.delinearize(shape.linearize([1, 2, 3])), [1, 2, 3]);
    }

    #[test]
    fn test_lattice_cells_follow_resolution() {
        let lattice = Lattice::new(&Region::cube(1.55), 15.0, 256);
        // 3.1 units at 15 samples per unit
        assert_eq!(lattice.cells, [47, 47, 47]);
        assert_eq!(lattice.shape.nx, 50);

        let clamped = Lattice::new(&Region::cube(1.55), 1000.0, 32);
        assert_eq!(clamped.cells, [32, 32, 32]);
    }

    #[test]
    fn test_cell_limit_keeps_lattice_indexable() {
        let limit = SurfaceNets::CELL_LIMIT;
        assert_eq!(SurfaceNets::new(1700).max_cells_per_axis, limit);
        assert_eq!(SurfaceNets::new(u32::MAX).max_cells_per_axis, limit);
        assert_eq!(SurfaceNets::new(0).max_cells_per_axis, 1);

        // The public field bypasses `new`; the lattice clamps again
        let lattice = Lattice::new(&Region::cube(1.0), 1e6, u32::MAX);
        assert_eq!(lattice.cells, [limit; 3]);
        let side = (limit + 3) as u64;
        assert_eq!(lattice.shape.usize() as u64, side * side * side);
        assert!(side.pow(3) <= u32::MAX as u64);
        assert!((side + 1).pow(3) > u32::MAX as u64);
    }

    #[test]
    fn test_sphere_mesh_is_closed_and_outward() -> Result<()> {
        let ctx = Context::new();
        let expr = ctx.expr(sphere_at_origin(&ctx, 1.0)?)?;

        let raw = SurfaceNets::default()
            .polygonize(&expr, &Region::cube(1.5), 16.0)?
            .expect("sphere inside region");
        assert!(raw.is_valid());

        let stats = analyze(&raw.clone().into_mesh());
        assert!(stats.is_watertight);
        let expected = 4.0 / 3.0 * std::f64::consts::PI;
        assert!((stats.volume - expected).abs() < expected * 0.05);

        // Outward winding: positive signed volume
        let signed: f32 = raw
            .triangles
            .iter()
            .map(|&[a, b, c]| {
                let (p0, p1, p2) = (
                    raw.vertices[a as usize].coords,
                    raw.vertices[b as usize].coords,
                    raw.vertices[c as usize].coords,
                );
                p0.dot(&p1.cross(&p2)) / 6.0
            })
            .sum();
        assert!(signed > 0.0);
        Ok(())
    }

    #[test]
    fn test_empty_region_yields_none() -> Result<()> {
        let ctx = Context::new();
        let expr = ctx.expr(sphere_at_origin(&ctx, 0.5)?)?;
        let far = Region::from_center_size(Point3::new(10.0, 10.0, 10.0), Vector3::repeat(1.0));

        assert!(SurfaceNets::default().polygonize(&expr, &far, 8.0)?.is_none());
        Ok(())
    }

    #[test]
    fn test_clipped_shape_stays_inside_region() -> Result<()> {
        let ctx = Context::new();
        let big = cuboid(&ctx, Point3::new(-5.0, -5.0, -5.0), Point3::new(5.0, 5.0, 5.0))?;
        let region = Region::cube(1.0);

        let raw = SurfaceNets::default()
            .polygonize(&ctx.expr(big)?, &region, 4.0)?
            .expect("region filled by the shape");
        assert!(raw.vertices.iter().all(|p| region.contains(p)));
        Ok(())
    }

    #[test]
    fn test_rejects_bad_inputs() -> Result<()> {
        let ctx = Context::new();
        let expr = ctx.expr(sphere_at_origin(&ctx, 1.0)?)?;
        let nets = SurfaceNets::default();

        assert!(matches!(
            nets.polygonize(&expr, &Region::cube(1.0), 0.0),
            Err(FrepError::InvalidResolution(_))
        ));
        assert!(matches!(
            nets.polygonize(&expr, &Region::cube(1.0), f32::NAN),
            Err(FrepError::InvalidResolution(_))
        ));
        assert!(matches!(
            nets.polygonize(&expr, &Region::empty(), 8.0),
            Err(FrepError::InvalidRegion { .. })
        ));
        Ok(())
    }
}
