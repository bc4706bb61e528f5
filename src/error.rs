// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Error types for expression construction and rendering

use crate::tree::{ScopeId, Tree};
use thiserror::Error;

/// Errors raised by the expression, CSG and render layers.
///
/// Every variant except `Io` is a contract violation on the caller's side;
/// an empty polygonization is never an error.
#[derive(Debug, Error)]
pub enum FrepError {
    /// The handle's node was released (scope disposal or explicit release)
    #[error("expression {0} has already been released")]
    ReleasedTree(Tree),

    /// The handle was created by another context
    #[error("expression {0} belongs to a different context")]
    ForeignTree(Tree),

    /// A variadic combinator was called without shapes
    #[error("{op} requires at least one shape")]
    EmptyOperands { op: &'static str },

    /// `Scope::adopt` only takes trees that have no owner
    #[error("expression {tree} is already owned by {owner}")]
    OwnedTree { tree: Tree, owner: ScopeId },

    /// The scope was already disposed
    #[error("{0} has already been disposed")]
    ScopeDisposed(ScopeId),

    /// Affine transforms are applied through their inverse
    #[error("transform matrix is not invertible")]
    SingularTransform,

    /// Render region is empty, inverted or non-finite
    #[error("invalid render region: {message}")]
    InvalidRegion { message: String },

    /// Resolution must be a positive, finite density
    #[error("invalid resolution {0}: expected a positive number of samples per unit")]
    InvalidResolution(f32),

    /// The polygonizer broke the mesh invariant
    #[error("polygonizer returned {triangles} triangles indexing past {vertices} vertices")]
    InvalidMesh { vertices: usize, triangles: usize },

    /// The render worker went away before writing the job result
    #[error("render worker disconnected before completing the job")]
    WorkerDisconnected,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrepError {
    /// Creates an invalid region error.
    pub fn invalid_region(message: impl Into<String>) -> Self {
        Self::InvalidRegion {
            message: message.into(),
        }
    }
}

/// Result alias used throughout the library core
pub type Result<T> = std::result::Result<T, FrepError>;
