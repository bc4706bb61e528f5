// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! CSG combinators

use crate::error::{FrepError, Result};
use crate::tree::{Context, Tree};

/// Blend amount used when callers have no preference
pub const DEFAULT_BLEND: f32 = 0.5;

fn split_operands<'a>(op: &'static str, shapes: &'a [Tree]) -> Result<(Tree, &'a [Tree])> {
    shapes
        .split_first()
        .map(|(first, rest)| (*first, rest))
        .ok_or(FrepError::EmptyOperands { op })
}

/// Fold `shapes` with `min`. A single shape is returned unchanged.
pub fn union(ctx: &Context, shapes: &[Tree]) -> Result<Tree> {
    let (first, rest) = split_operands("union", shapes)?;
    rest.iter().try_fold(first, |acc, &shape| ctx.min(acc, shape))
}

/// Fold `shapes` with `max`. A single shape is returned unchanged.
pub fn intersection(ctx: &Context, shapes: &[Tree]) -> Result<Tree> {
    let (first, rest) = split_operands("intersection", shapes)?;
    rest.iter().try_fold(first, |acc, &shape| ctx.max(acc, shape))
}

/// Swap inside and outside
pub fn inverse(ctx: &Context, shape: Tree) -> Result<Tree> {
    ctx.neg(shape)
}

/// Subtract the union of every trailing shape from the first one.
///
/// With a single shape the same handle comes back, without new nodes.
pub fn difference(ctx: &Context, shapes: &[Tree]) -> Result<Tree> {
    let (first, rest) = split_operands("difference", shapes)?;
    if rest.is_empty() {
        return Ok(first);
    }

    let cutter = inverse(ctx, union(ctx, rest)?)?;
    intersection(ctx, &[first, cutter])
}

/// Union of `a` and `b` with a rounding term `sqrt|a| + sqrt|b| - amount`
/// that fills in the crease where they meet.
pub fn blend(ctx: &Context, a: Tree, b: Tree, amount: f32) -> Result<Tree> {
    let root_a = ctx.sqrt(ctx.abs(a)?)?;
    let root_b = ctx.sqrt(ctx.abs(b)?)?;
    let rounding = ctx.sub(ctx.add(root_a, root_b)?, ctx.constant(amount))?;
    union(ctx, &[a, b, rounding])
}

/// Pairwise [`blend`] folded left to right
pub fn blend_all(ctx: &Context, amount: f32, shapes: &[Tree]) -> Result<Tree> {
    let (first, rest) = split_operands("blend", shapes)?;
    rest.iter()
        .try_fold(first, |acc, &shape| blend(ctx, acc, shape, amount))
}
