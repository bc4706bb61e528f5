// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry module - mesh representation, normals and statistics

pub mod analytics;
pub(crate) mod mesh;
pub mod normals;
mod region;

pub use analytics::{analyze, MeshStats};
pub use mesh::{Mesh, RawMesh, Triangle, Vertex};
pub use region::Region;
