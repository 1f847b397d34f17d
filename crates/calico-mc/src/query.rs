//! Reachability queries: the user-facing AST, the compiled state
//! predicate, and its distance heuristic.
//!
//! Queries are written against place and transition names and wrapped in
//! exactly one reachability quantifier. Compilation resolves names to
//! indices and rejects anything outside the supported fragment.

use std::sync::Arc;

use calico_net::{CmpOp, ColoredPetriNet, Marking, PlaceId, TransitionId};

use crate::error::CheckError;
use crate::successor::ColoredSuccessorGenerator;

/// Name-based query expression as posed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryExpr {
    /// EF: some reachable state satisfies the condition.
    ExistsFinally(Box<QueryExpr>),
    /// AG: every reachable state satisfies the condition.
    AlwaysGlobally(Box<QueryExpr>),
    And(Vec<QueryExpr>),
    Or(Vec<QueryExpr>),
    Not(Box<QueryExpr>),
    Compare {
        op: CmpOp,
        lhs: CountExpr,
        rhs: CountExpr,
    },
    Deadlock,
    Fireable(String),
}

/// A token-count operand: a place's total count or a literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountExpr {
    Place(String),
    Constant(u64),
}

/// The reachability quantifier stripped off the query root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    ExistsFinally,
    AlwaysGlobally,
}

/// A compiled state predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GammaQuery {
    And(Vec<GammaQuery>),
    Or(Vec<GammaQuery>),
    Not(Box<GammaQuery>),
    Compare {
        op: CmpOp,
        lhs: CountValue,
        rhs: CountValue,
    },
    Deadlock,
    Fireable(TransitionId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountValue {
    Place(PlaceId),
    Constant(u64),
}

impl CountValue {
    fn get(&self, marking: &Marking) -> u64 {
        match *self {
            CountValue::Place(place) => u64::from(marking.place(place).total()),
            CountValue::Constant(count) => count,
        }
    }
}

/// A query ready to check: quantifier plus compiled condition.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub quantifier: Quantifier,
    pub condition: Arc<GammaQuery>,
}

/// Strip the quantifier and compile the condition against `net`.
pub fn compile_reachability(
    query: &QueryExpr,
    net: &ColoredPetriNet,
) -> Result<CompiledQuery, CheckError> {
    let (quantifier, inner) = match query {
        QueryExpr::ExistsFinally(inner) => (Quantifier::ExistsFinally, inner.as_ref()),
        QueryExpr::AlwaysGlobally(inner) => (Quantifier::AlwaysGlobally, inner.as_ref()),
        _ => {
            return Err(CheckError::UnsupportedQuery(
                "query must be wrapped in EF or AG".to_string(),
            ))
        }
    };
    let condition = compile_condition(inner, net)?;
    Ok(CompiledQuery {
        quantifier,
        condition: Arc::new(condition),
    })
}

fn compile_condition(expr: &QueryExpr, net: &ColoredPetriNet) -> Result<GammaQuery, CheckError> {
    match expr {
        QueryExpr::ExistsFinally(_) | QueryExpr::AlwaysGlobally(_) => Err(
            CheckError::UnsupportedQuery("nested reachability quantifier".to_string()),
        ),
        QueryExpr::And(children) => Ok(GammaQuery::And(
            children
                .iter()
                .map(|c| compile_condition(c, net))
                .collect::<Result<_, _>>()?,
        )),
        QueryExpr::Or(children) => Ok(GammaQuery::Or(
            children
                .iter()
                .map(|c| compile_condition(c, net))
                .collect::<Result<_, _>>()?,
        )),
        QueryExpr::Not(inner) => Ok(GammaQuery::Not(Box::new(compile_condition(inner, net)?))),
        QueryExpr::Compare { op, lhs, rhs } => Ok(GammaQuery::Compare {
            op: *op,
            lhs: compile_count(lhs, net)?,
            rhs: compile_count(rhs, net)?,
        }),
        QueryExpr::Deadlock => Ok(GammaQuery::Deadlock),
        QueryExpr::Fireable(name) => net
            .transition_named(name)
            .map(GammaQuery::Fireable)
            .ok_or_else(|| CheckError::UnknownTransition(name.clone())),
    }
}

fn compile_count(expr: &CountExpr, net: &ColoredPetriNet) -> Result<CountValue, CheckError> {
    match expr {
        CountExpr::Place(name) => net
            .place_named(name)
            .map(CountValue::Place)
            .ok_or_else(|| CheckError::UnknownPlace(name.clone())),
        CountExpr::Constant(count) => Ok(CountValue::Constant(*count)),
    }
}

impl GammaQuery {
    /// Evaluate the predicate in `marking`. Fireability and deadlock
    /// atoms go through the successor generator, so it can reuse its
    /// narrowing cache for the state at hand.
    pub fn eval(
        &self,
        generator: &mut ColoredSuccessorGenerator<'_>,
        marking: &Marking,
        state_id: u64,
    ) -> bool {
        match self {
            GammaQuery::And(children) => children
                .iter()
                .all(|c| c.eval(generator, marking, state_id)),
            GammaQuery::Or(children) => children
                .iter()
                .any(|c| c.eval(generator, marking, state_id)),
            GammaQuery::Not(inner) => !inner.eval(generator, marking, state_id),
            GammaQuery::Compare { op, lhs, rhs } => {
                compare(*op, lhs.get(marking), rhs.get(marking))
            }
            GammaQuery::Deadlock => generator.has_deadlock(marking, state_id),
            GammaQuery::Fireable(transition) => generator.can_fire(marking, *transition, state_id),
        }
    }

    /// Heuristic distance from `marking` to a state satisfying the
    /// predicate (or its negation when `negated`). Zero does not imply
    /// satisfaction; fireability and deadlock atoms report no distance.
    pub fn distance(&self, marking: &Marking, negated: bool) -> u64 {
        match self {
            GammaQuery::And(children) => {
                if negated {
                    min_short_circuit(children, marking, true)
                } else {
                    children.iter().map(|c| c.distance(marking, false)).sum()
                }
            }
            GammaQuery::Or(children) => {
                if negated {
                    children.iter().map(|c| c.distance(marking, true)).sum()
                } else {
                    min_short_circuit(children, marking, false)
                }
            }
            GammaQuery::Not(inner) => inner.distance(marking, !negated),
            GammaQuery::Compare { op, lhs, rhs } => {
                compare_distance(*op, lhs.get(marking), rhs.get(marking), negated)
            }
            GammaQuery::Deadlock | GammaQuery::Fireable(_) => 0,
        }
    }
}

fn compare(op: CmpOp, lhs: u64, rhs: u64) -> bool {
    match op {
        CmpOp::Eq => lhs == rhs,
        CmpOp::Ne => lhs != rhs,
        CmpOp::Lt => lhs < rhs,
        CmpOp::Le => lhs <= rhs,
        CmpOp::Gt => lhs > rhs,
        CmpOp::Ge => lhs >= rhs,
    }
}

fn compare_distance(op: CmpOp, lhs: u64, rhs: u64, negated: bool) -> u64 {
    let op = if negated { negate(op) } else { op };
    match op {
        CmpOp::Lt => {
            if lhs < rhs {
                0
            } else {
                lhs - rhs + 1
            }
        }
        CmpOp::Le => {
            if lhs <= rhs {
                0
            } else {
                lhs - rhs
            }
        }
        CmpOp::Gt => {
            if lhs > rhs {
                0
            } else {
                rhs - lhs + 1
            }
        }
        CmpOp::Ge => {
            if lhs >= rhs {
                0
            } else {
                rhs - lhs
            }
        }
        CmpOp::Eq => lhs.abs_diff(rhs),
        CmpOp::Ne => {
            if lhs != rhs {
                0
            } else {
                1
            }
        }
    }
}

fn negate(op: CmpOp) -> CmpOp {
    match op {
        CmpOp::Eq => CmpOp::Ne,
        CmpOp::Ne => CmpOp::Eq,
        CmpOp::Lt => CmpOp::Ge,
        CmpOp::Le => CmpOp::Gt,
        CmpOp::Gt => CmpOp::Le,
        CmpOp::Ge => CmpOp::Lt,
    }
}

fn min_short_circuit(children: &[GammaQuery], marking: &Marking, negated: bool) -> u64 {
    let mut min = u64::MAX;
    for child in children {
        let dist = child.distance(marking, negated);
        if dist == 0 {
            return 0;
        }
        min = min.min(dist);
    }
    min
}
