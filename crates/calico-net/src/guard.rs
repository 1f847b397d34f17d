//! Compiled transition guards.

use crate::arc::ParamColor;
use crate::binding::Binding;

/// Comparison operator between two resolved colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    #[inline]
    pub fn apply(self, lhs: u32, rhs: u32) -> bool {
        match self {
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
        }
    }
}

/// A guard expression over binding variables, evaluated per candidate
/// binding. Comparison operands are [`ParamColor`]s without `All` bases;
/// the builder rejects `All` in guard position.
#[derive(Debug, Clone)]
pub enum CompiledGuard {
    True,
    And(Vec<CompiledGuard>),
    Or(Vec<CompiledGuard>),
    Not(Box<CompiledGuard>),
    Compare {
        op: CmpOp,
        lhs: ParamColor,
        rhs: ParamColor,
    },
}

impl CompiledGuard {
    pub fn eval(&self, binding: &Binding) -> bool {
        match self {
            CompiledGuard::True => true,
            CompiledGuard::And(children) => children.iter().all(|g| g.eval(binding)),
            CompiledGuard::Or(children) => children.iter().any(|g| g.eval(binding)),
            CompiledGuard::Not(inner) => !inner.eval(binding),
            CompiledGuard::Compare { op, lhs, rhs } => {
                op.apply(lhs.resolve(binding), rhs.resolve(binding))
            }
        }
    }
}
