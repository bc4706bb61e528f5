// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Constructive solid geometry over F-rep expressions
//!
//! Shapes, combinators and transforms are plain functions that build new
//! trees in a [`Context`](crate::tree::Context). Nothing here evaluates a
//! field; every function only rewrites expressions, so whichever scope is
//! active owns the intermediate nodes as well as the result.
//!
//! Negative values are inside, positive values outside.

mod ops;
mod shapes;
mod transforms;

pub use ops::{blend, blend_all, difference, intersection, inverse, union, DEFAULT_BLEND};
pub use shapes::{circle, cuboid, cylinder, ellipsoid, extrude, shell, sphere, sphere_at_origin};
pub use transforms::{
    reflect_x, reflect_xy, reflect_xz, reflect_y, reflect_yz, reflect_z, symmetric_x,
    symmetric_y, symmetric_z, transform, translate,
};
