// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Coordinate transforms
//!
//! Each transform is a single `remap` of the shape's coordinate variables.
//! The substituted expressions map a world-space query point back into the
//! shape's own frame, so moving a shape by `t` substitutes `x - t`.

use crate::error::{FrepError, Result};
use crate::tree::{Context, Tree};
use nalgebra::{Matrix4, Vector3};

/// Move `shape` by `offset`
pub fn translate(ctx: &Context, shape: Tree, offset: Vector3<f32>) -> Result<Tree> {
    let x = ctx.sub(ctx.x(), ctx.constant(offset.x))?;
    let y = ctx.sub(ctx.y(), ctx.constant(offset.y))?;
    let z = ctx.sub(ctx.z(), ctx.constant(offset.z))?;
    ctx.remap(shape, x, y, z)
}

/// `2 * offset - axis`
fn mirror(ctx: &Context, axis: Tree, offset: f32) -> Result<Tree> {
    ctx.sub(ctx.constant(2.0 * offset), axis)
}

/// Mirror across the plane `x = offset`
pub fn reflect_x(ctx: &Context, shape: Tree, offset: f32) -> Result<Tree> {
    let x = mirror(ctx, ctx.x(), offset)?;
    ctx.remap(shape, x, ctx.y(), ctx.z())
}

/// Mirror across the plane `y = offset`
pub fn reflect_y(ctx: &Context, shape: Tree, offset: f32) -> Result<Tree> {
    let y = mirror(ctx, ctx.y(), offset)?;
    ctx.remap(shape, ctx.x(), y, ctx.z())
}

/// Mirror across the plane `z = offset`
pub fn reflect_z(ctx: &Context, shape: Tree, offset: f32) -> Result<Tree> {
    let z = mirror(ctx, ctx.z(), offset)?;
    ctx.remap(shape, ctx.x(), ctx.y(), z)
}

/// Reflect across the plane `x = y` by swapping the two coordinates
pub fn reflect_xy(ctx: &Context, shape: Tree) -> Result<Tree> {
    ctx.remap(shape, ctx.y(), ctx.x(), ctx.z())
}

/// Reflect across the plane `y = z`
pub fn reflect_yz(ctx: &Context, shape: Tree) -> Result<Tree> {
    ctx.remap(shape, ctx.x(), ctx.z(), ctx.y())
}

/// Reflect across the plane `x = z`
pub fn reflect_xz(ctx: &Context, shape: Tree) -> Result<Tree> {
    ctx.remap(shape, ctx.z(), ctx.y(), ctx.x())
}

/// Keep the `x >= 0` half and mirror it onto the negative side
pub fn symmetric_x(ctx: &Context, shape: Tree) -> Result<Tree> {
    let x = ctx.abs(ctx.x())?;
    ctx.remap(shape, x, ctx.y(), ctx.z())
}

pub fn symmetric_y(ctx: &Context, shape: Tree) -> Result<Tree> {
    let y = ctx.abs(ctx.y())?;
    ctx.remap(shape, ctx.x(), y, ctx.z())
}

pub fn symmetric_z(ctx: &Context, shape: Tree) -> Result<Tree> {
    let z = ctx.abs(ctx.z())?;
    ctx.remap(shape, ctx.x(), ctx.y(), z)
}

/// Apply an affine transform given in object-to-world form.
///
/// The shape is remapped through the inverse matrix; a singular matrix is
/// rejected with [`FrepError::SingularTransform`]. The projective row is
/// ignored.
pub fn transform(ctx: &Context, shape: Tree, matrix: &Matrix4<f32>) -> Result<Tree> {
    let inverse = matrix.try_inverse().ok_or(FrepError::SingularTransform)?;

    let row = |r: usize| -> Result<Tree> {
        let sx = ctx.mul(ctx.constant(inverse[(r, 0)]), ctx.x())?;
        let sy = ctx.mul(ctx.constant(inverse[(r, 1)]), ctx.y())?;
        let sz = ctx.mul(ctx.constant(inverse[(r, 2)]), ctx.z())?;
        let linear = ctx.add(ctx.add(sx, sy)?, sz)?;
        ctx.add(linear, ctx.constant(inverse[(r, 3)]))
    };

    let (x, y, z) = (row(0)?, row(1)?, row(2)?);
    ctx.remap(shape, x, y, z)
}
