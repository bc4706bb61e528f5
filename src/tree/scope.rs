// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Scopes: caller-managed owners of expression nodes
//!
//! Scopes form a stack through predecessor links captured at activation.
//! Disposing a scope releases every node it still tracks and restores the
//! predecessor it recorded, or that predecessor's nearest live ancestor.

use super::context::{Context, Store};
use super::Tree;
use crate::error::{FrepError, Result};
use std::fmt;

/// Identity of a scope within its context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId {
    index: u32,
    generation: u32,
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}.{}", self.index, self.generation)
    }
}

pub(super) struct ScopeState {
    pub(super) tracked: Vec<Tree>,
    predecessor: Option<ScopeId>,
}

pub(super) struct ScopeSlot {
    generation: u32,
    state: Option<ScopeState>,
}

impl Store {
    pub(super) fn create_scope(&mut self) -> ScopeId {
        let state = ScopeState {
            tracked: Vec::new(),
            predecessor: None,
        };

        match self.free_scopes.pop() {
            Some(index) => {
                let slot = &mut self.scopes[index as usize];
                slot.state = Some(state);
                ScopeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.scopes.len() as u32;
                self.scopes.push(ScopeSlot {
                    generation: 0,
                    state: Some(state),
                });
                ScopeId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    pub(super) fn scope(&self, id: ScopeId) -> Option<&ScopeState> {
        self.scopes
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.state.as_ref())
    }

    pub(super) fn scope_mut(&mut self, id: ScopeId) -> Option<&mut ScopeState> {
        self.scopes
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.state.as_mut())
    }

    /// Follow `candidate` through disposed scopes to the first live one
    fn nearest_live(&self, mut candidate: Option<ScopeId>) -> Option<ScopeId> {
        // Re-activation can link two scopes to each other
        let mut steps = self.retired.len();
        while let Some(id) = candidate {
            if self.scope(id).is_some() {
                return Some(id);
            }
            if steps == 0 {
                return None;
            }
            steps -= 1;
            candidate = self.retired.get(&id).copied().flatten();
        }
        None
    }

    /// Forget disposed scopes no live predecessor chain passes through
    fn prune_retired(&mut self) {
        let mut reachable = Vec::new();
        for slot in &self.scopes {
            let mut candidate = slot.state.as_ref().and_then(|state| state.predecessor);
            while let Some(id) = candidate {
                if reachable.contains(&id) || !self.retired.contains_key(&id) {
                    break;
                }
                reachable.push(id);
                candidate = self.retired.get(&id).copied().flatten();
            }
        }
        self.retired.retain(|id, _| reachable.contains(id));
    }

    pub(super) fn activate(&mut self, id: ScopeId) -> Result<()> {
        if self.scope(id).is_none() {
            return Err(FrepError::ScopeDisposed(id));
        }
        if self.active == Some(id) {
            return Ok(());
        }

        let previous = self.active;
        if let Some(state) = self.scope_mut(id) {
            state.predecessor = previous;
        }
        self.active = Some(id);
        Ok(())
    }

    pub(super) fn untrack(&mut self, id: ScopeId, tree: Tree) -> bool {
        match self.entry_mut(tree) {
            Ok(entry) if entry.owner == Some(id) => entry.owner = None,
            _ => return false,
        }
        if let Some(state) = self.scope_mut(id) {
            state.tracked.retain(|tracked| *tracked != tree);
        }
        true
    }

    pub(super) fn adopt(&mut self, id: ScopeId, tree: Tree) -> Result<()> {
        if self.scope(id).is_none() {
            return Err(FrepError::ScopeDisposed(id));
        }
        match self.entry(tree)?.owner {
            Some(owner) if owner == id => return Ok(()),
            Some(owner) => return Err(FrepError::OwnedTree { tree, owner }),
            None => {}
        }

        self.entry_mut(tree)?.owner = Some(id);
        if let Some(state) = self.scope_mut(id) {
            state.tracked.push(tree);
        }
        Ok(())
    }

    pub(super) fn tracked_len(&self, id: ScopeId) -> usize {
        self.scope(id)
            .map(|state| {
                state
                    .tracked
                    .iter()
                    .filter(|tree| self.owned_by(**tree, id))
                    .count()
            })
            .unwrap_or(0)
    }

    fn owned_by(&self, tree: Tree, id: ScopeId) -> bool {
        matches!(self.entry(tree), Ok(entry) if entry.owner == Some(id))
    }

    /// Release everything the scope still owns, then restore its predecessor
    pub(super) fn dispose(&mut self, id: ScopeId) -> Result<usize> {
        let slot = self
            .scopes
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .ok_or(FrepError::ScopeDisposed(id))?;
        let state = slot.state.take().ok_or(FrepError::ScopeDisposed(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_scopes.push(id.index);

        let mut released = 0;
        for tree in state.tracked {
            // Skip nodes released individually or handed to another owner
            if self.owned_by(tree, id) && self.release(tree) {
                released += 1;
            }
        }

        self.retired.insert(id, state.predecessor);
        self.active = self.nearest_live(state.predecessor);
        self.prune_retired();

        tracing::trace!(scope = %id, released, "disposed scope");
        Ok(released)
    }
}

/// A scope guard. Nodes constructed while it is active belong to it and are
/// released when it is disposed or dropped.
///
/// ```
/// use frepkit::tree::Context;
///
/// let ctx = Context::new();
/// let scope = ctx.scope();
/// let x = ctx.x();
/// assert_eq!(ctx.owner(x), Some(scope.id()));
/// drop(scope);
/// assert!(!ctx.is_live(x));
/// ```
pub struct Scope<'c> {
    ctx: &'c Context,
    id: ScopeId,
    disposed: bool,
}

impl<'c> Scope<'c> {
    pub(super) fn new(ctx: &'c Context, id: ScopeId) -> Self {
        Self {
            ctx,
            id,
            disposed: false,
        }
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Make this the active scope, remembering the previously active one
    pub fn activate(&self) {
        // Only fails once disposed, which the guard rules out
        let _ = self.ctx.store.borrow_mut().activate(self.id);
    }

    pub fn is_active(&self) -> bool {
        self.ctx.active_scope() == Some(self.id)
    }

    /// Stop tracking `tree` without releasing it. The caller now owns it.
    pub fn untrack(&self, tree: Tree) -> bool {
        self.ctx.store.borrow_mut().untrack(self.id, tree)
    }

    /// Track a node that currently has no owner.
    ///
    /// Fails with [`FrepError::OwnedTree`] if another scope owns it; untrack
    /// or detach it there first.
    pub fn adopt(&self, tree: Tree) -> Result<()> {
        self.ctx.store.borrow_mut().adopt(self.id, tree)
    }

    /// Number of live nodes this scope will release
    pub fn tracked_len(&self) -> usize {
        self.ctx.store.borrow().tracked_len(self.id)
    }

    /// Release all tracked nodes now; returns how many were released
    pub fn dispose(mut self) -> usize {
        self.disposed = true;
        self.ctx.store.borrow_mut().dispose(self.id).unwrap_or(0)
    }
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        if self.disposed {
            return;
        }
        if let Ok(mut store) = self.ctx.store.try_borrow_mut() {
            let _ = store.dispose(self.id);
        }
    }
}

impl fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").field("id", &self.id).finish()
    }
}

/// Exclusive owner of a node taken out of scope tracking.
///
/// Releases the node exactly once when dropped, unless handed on with
/// [`Detached::adopt`] or [`Detached::into_tree`].
pub struct Detached<'c> {
    ctx: &'c Context,
    tree: Tree,
    armed: bool,
}

impl<'c> Detached<'c> {
    pub(super) fn new(ctx: &'c Context, tree: Tree) -> Self {
        Self {
            ctx,
            tree,
            armed: true,
        }
    }

    pub fn tree(&self) -> Tree {
        self.tree
    }

    /// Hand the node to `scope`. If that fails the node is released.
    pub fn adopt(mut self, scope: &Scope<'_>) -> Result<Tree> {
        if !std::ptr::eq(self.ctx, scope.ctx) {
            return Err(FrepError::ForeignTree(self.tree));
        }
        scope.adopt(self.tree)?;
        self.armed = false;
        Ok(self.tree)
    }

    /// Give up ownership; the caller must release the node itself
    pub fn into_tree(mut self) -> Tree {
        self.armed = false;
        self.tree
    }
}

impl Drop for Detached<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Ok(mut store) = self.ctx.store.try_borrow_mut() {
                store.release(self.tree);
            }
        }
    }
}

impl fmt::Debug for Detached<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Detached").field("tree", &self.tree).finish()
    }
}
