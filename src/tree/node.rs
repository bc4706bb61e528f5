// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Expression node definitions and point evaluation

use ahash::AHashMap;
use nalgebra::Point3;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identity of a free or const variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u64);

static NEXT_VAR: AtomicU64 = AtomicU64::new(0);

impl VarId {
    pub(crate) fn fresh() -> Self {
        Self(NEXT_VAR.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Variable bindings used during evaluation; unbound variables read as 0
pub type Vars = AHashMap<VarId, f32>;

/// Single-argument operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Abs,
    Sqrt,
    Square,
    Recip,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Exp,
    Log,
}

impl UnaryOp {
    pub fn apply(self, a: f32) -> f32 {
        match self {
            UnaryOp::Neg => -a,
            UnaryOp::Abs => a.abs(),
            UnaryOp::Sqrt => a.sqrt(),
            UnaryOp::Square => a * a,
            UnaryOp::Recip => 1.0 / a,
            UnaryOp::Sin => a.sin(),
            UnaryOp::Cos => a.cos(),
            UnaryOp::Tan => a.tan(),
            UnaryOp::Asin => a.asin(),
            UnaryOp::Acos => a.acos(),
            UnaryOp::Atan => a.atan(),
            UnaryOp::Exp => a.exp(),
            UnaryOp::Log => a.ln(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Neg => "neg",
            UnaryOp::Abs => "abs",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Square => "square",
            UnaryOp::Recip => "recip",
            UnaryOp::Sin => "sin",
            UnaryOp::Cos => "cos",
            UnaryOp::Tan => "tan",
            UnaryOp::Asin => "asin",
            UnaryOp::Acos => "acos",
            UnaryOp::Atan => "atan",
            UnaryOp::Exp => "exp",
            UnaryOp::Log => "log",
        }
    }
}

/// Two-argument operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Min,
    Max,
    Pow,
    NthRoot,
    Atan2,
    NanFill,
    Compare,
}

impl BinaryOp {
    pub fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            // Result lies in [0, |b|) regardless of the sign of a
            BinaryOp::Mod => a.rem_euclid(b),
            BinaryOp::Min => a.min(b),
            BinaryOp::Max => a.max(b),
            BinaryOp::Pow => a.powf(b),
            BinaryOp::NthRoot => a.powf(1.0 / b),
            BinaryOp::Atan2 => a.atan2(b),
            BinaryOp::NanFill => {
                if a.is_nan() {
                    b
                } else {
                    a
                }
            }
            BinaryOp::Compare => {
                if a < b {
                    -1.0
                } else if a > b {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "mod",
            BinaryOp::Min => "min",
            BinaryOp::Max => "max",
            BinaryOp::Pow => "pow",
            BinaryOp::NthRoot => "nth-root",
            BinaryOp::Atan2 => "atan2",
            BinaryOp::NanFill => "nanfill",
            BinaryOp::Compare => "compare",
        }
    }
}

/// Kinds of expression nodes
#[derive(Debug, Clone)]
pub enum NodeKind {
    Constant(f32),
    X,
    Y,
    Z,
    FreeVar(VarId),
    ConstVar(VarId),
    Unary(UnaryOp, Arc<Node>),
    Binary(BinaryOp, Arc<Node>, Arc<Node>),
    /// `base` evaluated at the point `(x, y, z)`
    Remap {
        base: Arc<Node>,
        x: Arc<Node>,
        y: Arc<Node>,
        z: Arc<Node>,
    },
}

/// Immutable expression node; children are shared, never mutated
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self { kind }
    }

    /// Evaluate at a point; `vars` supplies free/const variable values
    pub fn eval(&self, point: &Point3<f32>, vars: Option<&Vars>) -> f32 {
        match &self.kind {
            NodeKind::Constant(value) => *value,
            NodeKind::X => point.x,
            NodeKind::Y => point.y,
            NodeKind::Z => point.z,
            NodeKind::FreeVar(id) | NodeKind::ConstVar(id) => vars
                .and_then(|vars| vars.get(id).copied())
                .unwrap_or(0.0),
            NodeKind::Unary(op, a) => op.apply(a.eval(point, vars)),
            NodeKind::Binary(op, a, b) => op.apply(a.eval(point, vars), b.eval(point, vars)),
            NodeKind::Remap { base, x, y, z } => {
                let remapped = Point3::new(
                    x.eval(point, vars),
                    y.eval(point, vars),
                    z.eval(point, vars),
                );
                base.eval(&remapped, vars)
            }
        }
    }

    /// Get child nodes, in operand order
    pub fn children(&self) -> Vec<&Arc<Node>> {
        match &self.kind {
            NodeKind::Unary(_, a) => vec![a],
            NodeKind::Binary(_, a, b) => vec![a, b],
            NodeKind::Remap { base, x, y, z } => vec![base, x, y, z],
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Constant(value) => write!(f, "{}", value),
            NodeKind::X => write!(f, "x"),
            NodeKind::Y => write!(f, "y"),
            NodeKind::Z => write!(f, "z"),
            NodeKind::FreeVar(id) => write!(f, "(var-free {})", id),
            NodeKind::ConstVar(id) => write!(f, "(const-var {})", id),
            NodeKind::Unary(op, a) => write!(f, "({} {})", op.as_str(), a),
            NodeKind::Binary(op, a, b) => write!(f, "({} {} {})", op.as_str(), a, b),
            NodeKind::Remap { base, x, y, z } => {
                write!(f, "(remap {} {} {} {})", base, x, y, z)
            }
        }
    }
}

/// A resolved expression, detached from any handle bookkeeping.
///
/// Cheap to clone and safe to send to render workers.
#[derive(Debug, Clone)]
pub struct Expr(Arc<Node>);

impl Expr {
    pub fn new(node: Arc<Node>) -> Self {
        Self(node)
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.0
    }

    pub fn eval(&self, point: &Point3<f32>) -> f32 {
        self.0.eval(point, None)
    }

    pub fn eval_with(&self, point: &Point3<f32>, vars: &Vars) -> f32 {
        self.0.eval(point, Some(vars))
    }

    /// Free variables reachable from this expression, sorted and deduplicated.
    /// Const variables are not reported.
    pub fn free_vars(&self) -> Vec<VarId> {
        let mut found = Vec::new();
        let mut stack = vec![&self.0];
        let mut seen = ahash::AHashSet::new();

        while let Some(node) = stack.pop() {
            if !seen.insert(Arc::as_ptr(node)) {
                continue;
            }
            if let NodeKind::FreeVar(id) = node.kind {
                found.push(id);
            }
            stack.extend(node.children());
        }

        found.sort();
        found.dedup();
        found
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(kind: NodeKind) -> Arc<Node> {
        Arc::new(Node::new(kind))
    }

    #[test]
    fn test_binary_ops() {
        assert_eq!(BinaryOp::Mod.apply(-1.0, 3.0), 2.0);
        assert_eq!(BinaryOp::Mod.apply(7.0, 3.0), 1.0);
        assert_eq!(BinaryOp::Compare.apply(1.0, 2.0), -1.0);
        assert_eq!(BinaryOp::Compare.apply(2.0, 1.0), 1.0);
        assert_eq!(BinaryOp::Compare.apply(2.0, 2.0), 0.0);
        assert_eq!(BinaryOp::NanFill.apply(f32::NAN, 4.0), 4.0);
        assert_eq!(BinaryOp::NanFill.apply(3.0, 4.0), 3.0);
        assert!((BinaryOp::NthRoot.apply(27.0, 3.0) - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_remap_evaluates_in_new_frame() {
        // x evaluated at (y, x, z) reads the y coordinate
        let remapped = Node::new(NodeKind::Remap {
            base: leaf(NodeKind::X),
            x: leaf(NodeKind::Y),
            y: leaf(NodeKind::X),
            z: leaf(NodeKind::Z),
        });
        assert_eq!(remapped.eval(&Point3::new(1.0, 2.0, 3.0), None), 2.0);
    }

    #[test]
    fn test_free_vars_and_bindings() {
        let a = VarId::fresh();
        let c = VarId::fresh();
        let expr = Expr::new(Arc::new(Node::new(NodeKind::Binary(
            BinaryOp::Add,
            leaf(NodeKind::FreeVar(a)),
            leaf(NodeKind::ConstVar(c)),
        ))));

        assert_eq!(expr.free_vars(), vec![a]);
        assert_eq!(expr.eval(&Point3::origin()), 0.0);

        let mut vars = Vars::default();
        vars.insert(a, 2.0);
        vars.insert(c, 0.5);
        assert_eq!(expr.eval_with(&Point3::origin(), &vars), 2.5);
    }

    #[test]
    fn test_display_sexpr() {
        let node = Node::new(NodeKind::Binary(
            BinaryOp::Sub,
            leaf(NodeKind::Unary(UnaryOp::Sqrt, leaf(NodeKind::X))),
            leaf(NodeKind::Constant(1.5)),
        ));
        assert_eq!(node.to_string(), "(- (sqrt x) 1.5)");
    }
}
