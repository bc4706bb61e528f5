// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Expression tree module
//!
//! Immutable F-rep expression nodes, the context that stores them and the
//! scopes that own them.

mod context;
mod node;
mod scope;

pub use context::{Context, Tree};
pub use node::{BinaryOp, Expr, Node, NodeKind, UnaryOp, VarId, Vars};
pub use scope::{Detached, Scope, ScopeId};
