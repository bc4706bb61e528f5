// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Expression store and construction context
//!
//! A [`Context`] owns every node built through it. Callers hold [`Tree`]
//! handles, which are plain identities; ownership lives with the scope that
//! was active when the node was constructed (see [`super::Scope`]).

use super::node::{BinaryOp, Expr, Node, NodeKind, UnaryOp, VarId};
use super::scope::{Detached, Scope, ScopeId, ScopeSlot};
use crate::error::{FrepError, Result};
use ahash::AHashMap;
use nalgebra::Point3;
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

static NEXT_CONTEXT: AtomicU32 = AtomicU32::new(1);

/// Handle to an expression node.
///
/// Equality is identity: two handles are equal only if they name the same
/// constructed node. The handle does not own the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tree {
    context: u32,
    index: u32,
    generation: u32,
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tree#{}.{}", self.index, self.generation)
    }
}

pub(super) struct Entry {
    pub(super) node: Arc<Node>,
    pub(super) owner: Option<ScopeId>,
}

struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// Slot storage for nodes and scopes, plus the active scope pointer
pub(super) struct Store {
    context: u32,
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    pub(super) scopes: Vec<ScopeSlot>,
    pub(super) free_scopes: Vec<u32>,
    pub(super) active: Option<ScopeId>,
    /// Predecessors of disposed scopes still reachable from a live chain
    pub(super) retired: AHashMap<ScopeId, Option<ScopeId>>,
    live: usize,
}

impl Store {
    fn new(context: u32) -> Self {
        Self {
            context,
            slots: Vec::new(),
            free_slots: Vec::new(),
            scopes: Vec::new(),
            free_scopes: Vec::new(),
            active: None,
            retired: AHashMap::new(),
            live: 0,
        }
    }

    /// Allocate a node and hand it to the active scope in one step
    fn insert(&mut self, node: Arc<Node>) -> Tree {
        let owner = self.active.filter(|id| self.scope(*id).is_some());
        let entry = Entry { node, owner };

        let (index, generation) = match self.free_slots.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some(entry);
                (index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                (index, 0)
            }
        };
        self.live += 1;

        let tree = Tree {
            context: self.context,
            index,
            generation,
        };
        if let Some(scope) = owner.and_then(|id| self.scope_mut(id)) {
            scope.tracked.push(tree);
        }
        tree
    }

    pub(super) fn entry(&self, tree: Tree) -> Result<&Entry> {
        if tree.context != self.context {
            return Err(FrepError::ForeignTree(tree));
        }
        self.slots
            .get(tree.index as usize)
            .filter(|slot| slot.generation == tree.generation)
            .and_then(|slot| slot.entry.as_ref())
            .ok_or(FrepError::ReleasedTree(tree))
    }

    pub(super) fn entry_mut(&mut self, tree: Tree) -> Result<&mut Entry> {
        if tree.context != self.context {
            return Err(FrepError::ForeignTree(tree));
        }
        self.slots
            .get_mut(tree.index as usize)
            .filter(|slot| slot.generation == tree.generation)
            .and_then(|slot| slot.entry.as_mut())
            .ok_or(FrepError::ReleasedTree(tree))
    }

    fn node(&self, tree: Tree) -> Result<Arc<Node>> {
        self.entry(tree).map(|entry| Arc::clone(&entry.node))
    }

    /// Drop the store's reference to a node. Stale handles are a no-op.
    pub(super) fn release(&mut self, tree: Tree) -> bool {
        if tree.context != self.context {
            return false;
        }
        let Some(slot) = self.slots.get_mut(tree.index as usize) else {
            return false;
        };
        if slot.generation != tree.generation || slot.entry.is_none() {
            return false;
        }

        slot.entry = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_slots.push(tree.index);
        self.live -= 1;
        true
    }
}

/// Construction context for expression trees.
///
/// Single-threaded by construction (`!Sync`): scope activation and node
/// construction must be serialized by the caller. Resolved [`Expr`] values
/// can be shared across threads.
pub struct Context {
    id: u32,
    pub(super) store: RefCell<Store>,
}

impl Context {
    pub fn new() -> Self {
        let id = NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed);
        Self {
            id,
            store: RefCell::new(Store::new(id)),
        }
    }

    /// Create a scope and make it the active one
    pub fn scope(&self) -> Scope<'_> {
        let scope = self.new_scope();
        scope.activate();
        scope
    }

    /// Create a scope without activating it
    pub fn new_scope(&self) -> Scope<'_> {
        let id = self.store.borrow_mut().create_scope();
        Scope::new(self, id)
    }

    /// The scope new nodes are currently registered with
    pub fn active_scope(&self) -> Option<ScopeId> {
        self.store.borrow().active
    }

    fn insert(&self, kind: NodeKind) -> Tree {
        self.store.borrow_mut().insert(Arc::new(Node::new(kind)))
    }

    pub fn constant(&self, value: f32) -> Tree {
        self.insert(NodeKind::Constant(value))
    }

    pub fn x(&self) -> Tree {
        self.insert(NodeKind::X)
    }

    pub fn y(&self) -> Tree {
        self.insert(NodeKind::Y)
    }

    pub fn z(&self) -> Tree {
        self.insert(NodeKind::Z)
    }

    /// A new free variable, distinct from every other one
    pub fn free_var(&self) -> Tree {
        self.insert(NodeKind::FreeVar(VarId::fresh()))
    }

    /// A new variable that is held constant (not reported as free)
    pub fn const_var(&self) -> Tree {
        self.insert(NodeKind::ConstVar(VarId::fresh()))
    }

    pub fn unary(&self, op: UnaryOp, a: Tree) -> Result<Tree> {
        let mut store = self.store.borrow_mut();
        let a = store.node(a)?;
        Ok(store.insert(Arc::new(Node::new(NodeKind::Unary(op, a)))))
    }

    pub fn binary(&self, op: BinaryOp, a: Tree, b: Tree) -> Result<Tree> {
        let mut store = self.store.borrow_mut();
        let a = store.node(a)?;
        let b = store.node(b)?;
        Ok(store.insert(Arc::new(Node::new(NodeKind::Binary(op, a, b)))))
    }

    /// Evaluate `tree` with its coordinates replaced by `x`, `y` and `z`
    pub fn remap(&self, tree: Tree, x: Tree, y: Tree, z: Tree) -> Result<Tree> {
        let mut store = self.store.borrow_mut();
        let kind = NodeKind::Remap {
            base: store.node(tree)?,
            x: store.node(x)?,
            y: store.node(y)?,
            z: store.node(z)?,
        };
        Ok(store.insert(Arc::new(Node::new(kind))))
    }

    pub fn neg(&self, a: Tree) -> Result<Tree> {
        self.unary(UnaryOp::Neg, a)
    }

    pub fn abs(&self, a: Tree) -> Result<Tree> {
        self.unary(UnaryOp::Abs, a)
    }

    pub fn sqrt(&self, a: Tree) -> Result<Tree> {
        self.unary(UnaryOp::Sqrt, a)
    }

    pub fn square(&self, a: Tree) -> Result<Tree> {
        self.unary(UnaryOp::Square, a)
    }

    pub fn recip(&self, a: Tree) -> Result<Tree> {
        self.unary(UnaryOp::Recip, a)
    }

    pub fn sin(&self, a: Tree) -> Result<Tree> {
        self.unary(UnaryOp::Sin, a)
    }

    pub fn cos(&self, a: Tree) -> Result<Tree> {
        self.unary(UnaryOp::Cos, a)
    }

    pub fn tan(&self, a: Tree) -> Result<Tree> {
        self.unary(UnaryOp::Tan, a)
    }

    pub fn asin(&self, a: Tree) -> Result<Tree> {
        self.unary(UnaryOp::Asin, a)
    }

    pub fn acos(&self, a: Tree) -> Result<Tree> {
        self.unary(UnaryOp::Acos, a)
    }

    pub fn atan(&self, a: Tree) -> Result<Tree> {
        self.unary(UnaryOp::Atan, a)
    }

    pub fn exp(&self, a: Tree) -> Result<Tree> {
        self.unary(UnaryOp::Exp, a)
    }

    /// Natural logarithm
    pub fn log(&self, a: Tree) -> Result<Tree> {
        self.unary(UnaryOp::Log, a)
    }

    pub fn add(&self, a: Tree, b: Tree) -> Result<Tree> {
        self.binary(BinaryOp::Add, a, b)
    }

    pub fn sub(&self, a: Tree, b: Tree) -> Result<Tree> {
        self.binary(BinaryOp::Sub, a, b)
    }

    pub fn mul(&self, a: Tree, b: Tree) -> Result<Tree> {
        self.binary(BinaryOp::Mul, a, b)
    }

    pub fn div(&self, a: Tree, b: Tree) -> Result<Tree> {
        self.binary(BinaryOp::Div, a, b)
    }

    pub fn modulo(&self, a: Tree, b: Tree) -> Result<Tree> {
        self.binary(BinaryOp::Mod, a, b)
    }

    pub fn min(&self, a: Tree, b: Tree) -> Result<Tree> {
        self.binary(BinaryOp::Min, a, b)
    }

    pub fn max(&self, a: Tree, b: Tree) -> Result<Tree> {
        self.binary(BinaryOp::Max, a, b)
    }

    pub fn pow(&self, a: Tree, b: Tree) -> Result<Tree> {
        self.binary(BinaryOp::Pow, a, b)
    }

    pub fn nth_root(&self, a: Tree, b: Tree) -> Result<Tree> {
        self.binary(BinaryOp::NthRoot, a, b)
    }

    pub fn atan2(&self, a: Tree, b: Tree) -> Result<Tree> {
        self.binary(BinaryOp::Atan2, a, b)
    }

    /// `b` wherever `a` is NaN
    pub fn nan_fill(&self, a: Tree, b: Tree) -> Result<Tree> {
        self.binary(BinaryOp::NanFill, a, b)
    }

    pub fn compare(&self, a: Tree, b: Tree) -> Result<Tree> {
        self.binary(BinaryOp::Compare, a, b)
    }

    /// Resolve a handle into an evaluable expression
    pub fn expr(&self, tree: Tree) -> Result<Expr> {
        self.store.borrow().node(tree).map(Expr::new)
    }

    pub fn eval(&self, tree: Tree, point: &Point3<f32>) -> Result<f32> {
        Ok(self.expr(tree)?.eval(point))
    }

    /// Identity of the underlying node, stable while it is alive
    pub fn id(&self, tree: Tree) -> Result<usize> {
        let store = self.store.borrow();
        let entry = store.entry(tree)?;
        Ok(Arc::as_ptr(&entry.node) as usize)
    }

    /// Release a node now. Returns false if it was already released.
    pub fn release(&self, tree: Tree) -> bool {
        self.store.borrow_mut().release(tree)
    }

    pub fn is_live(&self, tree: Tree) -> bool {
        self.store.borrow().entry(tree).is_ok()
    }

    /// Scope currently responsible for releasing `tree`
    pub fn owner(&self, tree: Tree) -> Option<ScopeId> {
        self.store
            .borrow()
            .entry(tree)
            .ok()
            .and_then(|entry| entry.owner)
    }

    /// Take `tree` away from its scope; the returned guard releases it on drop
    pub fn detach(&self, tree: Tree) -> Result<Detached<'_>> {
        let mut store = self.store.borrow_mut();
        let owner = store.entry(tree)?.owner;
        if let Some(owner) = owner {
            store.untrack(owner, tree);
        }
        Ok(Detached::new(self, tree))
    }

    /// Number of nodes currently held
    pub fn live_count(&self) -> usize {
        self.store.borrow().live
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let store = self.store.borrow();
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("live", &store.live)
            .field("active", &store.active)
            .finish()
    }
}
