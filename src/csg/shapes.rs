// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Primitive shapes

use super::translate;
use crate::error::Result;
use crate::tree::{Context, Tree};
use nalgebra::{Point3, Vector3};

/// `coord - offset`
fn offset_axis(ctx: &Context, coord: Tree, offset: f32) -> Result<Tree> {
    ctx.sub(coord, ctx.constant(offset))
}

/// Euclidean distance from the query point to `center`
fn distance_to(ctx: &Context, center: &Point3<f32>) -> Result<Tree> {
    let dx = ctx.square(offset_axis(ctx, ctx.x(), center.x)?)?;
    let dy = ctx.square(offset_axis(ctx, ctx.y(), center.y)?)?;
    let dz = ctx.square(offset_axis(ctx, ctx.z(), center.z)?)?;
    let sum = ctx.add(ctx.add(dx, dy)?, dz)?;
    ctx.sqrt(sum)
}

/// Disc of `radius` on the xy plane, unbounded along z
pub fn circle(ctx: &Context, radius: f32) -> Result<Tree> {
    let sum = ctx.add(ctx.square(ctx.x())?, ctx.square(ctx.y())?)?;
    ctx.sub(ctx.sqrt(sum)?, ctx.constant(radius))
}

pub fn sphere(ctx: &Context, radius: f32, center: Point3<f32>) -> Result<Tree> {
    ctx.sub(distance_to(ctx, &center)?, ctx.constant(radius))
}

pub fn sphere_at_origin(ctx: &Context, radius: f32) -> Result<Tree> {
    sphere(ctx, radius, Point3::origin())
}

/// Points whose summed distance to both foci is below `radius`
pub fn ellipsoid(
    ctx: &Context,
    radius: f32,
    focus_a: Point3<f32>,
    focus_b: Point3<f32>,
) -> Result<Tree> {
    let sum = ctx.add(distance_to(ctx, &focus_a)?, distance_to(ctx, &focus_b)?)?;
    ctx.sub(sum, ctx.constant(radius))
}

/// Axis-aligned box with corners at `lower` and `upper`.
///
/// The field is the largest per-axis slab distance, which is exact inside
/// and along face normals but not at edges or corners. Only the sign
/// matters to the polygonizer.
pub fn cuboid(ctx: &Context, lower: Point3<f32>, upper: Point3<f32>) -> Result<Tree> {
    let slab = |coord: Tree, lo: f32, hi: f32| -> Result<Tree> {
        let below = ctx.sub(ctx.constant(lo), coord)?;
        let above = ctx.sub(coord, ctx.constant(hi))?;
        ctx.max(below, above)
    };

    let xs = slab(ctx.x(), lower.x, upper.x)?;
    let ys = slab(ctx.y(), lower.y, upper.y)?;
    let zs = slab(ctx.z(), lower.z, upper.z)?;
    ctx.max(ctx.max(xs, ys)?, zs)
}

/// Clip a 2D xy-plane shape to the slab `lower_z <= z <= upper_z`
pub fn extrude(ctx: &Context, shape: Tree, lower_z: f32, upper_z: f32) -> Result<Tree> {
    let z = ctx.z();
    let below = ctx.sub(ctx.constant(lower_z), z)?;
    let above = ctx.sub(z, ctx.constant(upper_z))?;
    ctx.max(shape, ctx.max(below, above)?)
}

/// Upright cylinder standing on `base`
pub fn cylinder(ctx: &Context, radius: f32, height: f32, base: Point3<f32>) -> Result<Tree> {
    let disc = translate(ctx, circle(ctx, radius)?, Vector3::new(base.x, base.y, base.z))?;
    extrude(ctx, disc, base.z, base.z + height)
}

/// Hollow band of half-thickness `offset` around the surface of `shape`
pub fn shell(ctx: &Context, shape: Tree, offset: f32) -> Result<Tree> {
    ctx.sub(ctx.abs(shape)?, ctx.constant(offset))
}
