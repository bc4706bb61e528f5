// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! frepkit
//!
//! Implicit-surface (F-rep) modelling: build shape expressions with CSG
//! combinators and coordinate transforms, keep their lifetime in check with
//! scopes, polygonize them into meshes and split vertex normals along
//! sharp creases.
//!
//! ```
//! use frepkit::csg;
//! use frepkit::geometry::Region;
//! use frepkit::tree::Context;
//! use nalgebra::Point3;
//!
//! # fn main() -> frepkit::Result<()> {
//! let ctx = Context::new();
//! let scope = ctx.scope();
//!
//! let ball = csg::sphere_at_origin(&ctx, 1.0)?;
//! let bar = csg::cylinder(&ctx, 0.4, 2.0, Point3::new(0.0, 0.0, -1.0))?;
//! let shape = csg::difference(&ctx, &[ball, bar])?;
//! assert!(ctx.eval(shape, &Point3::new(0.0, 0.0, 0.0))? > 0.0);
//!
//! let mesh = frepkit::render(&ctx, shape, &Region::cube(1.2), 8.0)?;
//! assert!(!mesh.is_empty());
//!
//! scope.dispose();
//! assert!(!ctx.is_live(shape));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod csg;
pub mod error;
pub mod geometry;
pub mod io;
pub mod render;
pub mod tree;
pub mod utils;

pub use config::FrepConfig;
pub use error::{FrepError, Result};
pub use geometry::{Mesh, RawMesh, Region};
pub use io::{export_stl, to_ascii_stl, try_export_stl, StlFormat};
pub use render::{Polygonizer, RenderHandle, RenderQueue, RenderSettings, Renderer, SurfaceNets};
pub use tree::{Context, Scope, Tree};

/// Render `tree` with the built-in polygonizer and naive normals
pub fn render(ctx: &Context, tree: Tree, region: &Region, resolution: f32) -> Result<Mesh> {
    Renderer::default()
        .with_settings(RenderSettings {
            resolution,
            ..RenderSettings::default()
        })
        .render(ctx, tree, region)
}
