//! Arithmetic expression trees used by the unit tests.

use super::types::{GpProblem, Program};
use crate::error::{EvalError, OperatorError};
use crate::recursion;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    Number,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Const(f64),
    Var(String),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub(crate) fn var(name: &str) -> Self {
        Expr::Var(name.to_string())
    }

    pub(crate) fn add(a: Expr, b: Expr) -> Self {
        Expr::Add(Box::new(a), Box::new(b))
    }

    pub(crate) fn mul(a: Expr, b: Expr) -> Self {
        Expr::Mul(Box::new(a), Box::new(b))
    }

    pub(crate) fn div(a: Expr, b: Expr) -> Self {
        Expr::Div(Box::new(a), Box::new(b))
    }

    /// A tree of exactly `size` nodes: `size - 1` negations over a constant.
    pub(crate) fn chain(size: usize, value: f64) -> Self {
        (1..size.max(1)).fold(Expr::Const(value), |e, _| Expr::Neg(Box::new(e)))
    }

    fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Const(_) | Expr::Var(_) => vec![],
            Expr::Neg(a) => vec![&**a],
            Expr::Add(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => vec![&**a, &**b],
        }
    }

    /// Preorder subtree lookup.
    fn nth(&self, index: usize) -> Option<&Expr> {
        if index == 0 {
            return Some(self);
        }
        let mut offset = 1;
        for child in self.children() {
            let size = child.size();
            if index < offset + size {
                return child.nth(index - offset);
            }
            offset += size;
        }
        None
    }

    /// Replaces the preorder subtree at `index`.
    fn replace(&mut self, index: usize, with: Expr) {
        if index == 0 {
            *self = with;
            return;
        }
        let mut offset = 1;
        let children: Vec<&mut Box<Expr>> = match self {
            Expr::Const(_) | Expr::Var(_) => vec![],
            Expr::Neg(a) => vec![a],
            Expr::Add(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => vec![a, b],
        };
        for child in children {
            let size = child.size();
            if index < offset + size {
                child.replace(index - offset, with);
                return;
            }
            offset += size;
        }
    }
}

impl Program for Expr {
    type Kind = Kind;
    type Value = f64;

    fn kind(&self) -> Kind {
        Kind::Number
    }

    fn size(&self) -> usize {
        1 + self.children().iter().map(|c| c.size()).sum::<usize>()
    }

    fn depth(&self) -> usize {
        1 + self.children().iter().map(|c| c.depth()).max().unwrap_or(0)
    }

    fn contains_input(&self, name: &str) -> bool {
        match self {
            Expr::Var(v) => v == name,
            _ => self.children().iter().any(|c| c.contains_input(name)),
        }
    }

    fn evaluate(&self) -> Result<f64, EvalError> {
        match self {
            Expr::Const(v) => Ok(*v),
            Expr::Var(name) => match name.as_str() {
                "x" => Ok(2.0),
                "y" => Ok(3.0),
                other => Err(EvalError::new(format!("unbound input {other}"))),
            },
            Expr::Neg(a) => Ok(-a.evaluate()?),
            Expr::Add(a, b) => Ok(a.evaluate()? + b.evaluate()?),
            Expr::Mul(a, b) => Ok(a.evaluate()? * b.evaluate()?),
            Expr::Div(a, b) => {
                let d = b.evaluate()?;
                if d == 0.0 {
                    Err(EvalError::new("division by zero"))
                } else {
                    Ok(a.evaluate()? / d)
                }
            }
        }
    }
}

/// Random expression generator with switchable operator faults.
#[derive(Debug, Default)]
pub(crate) struct ExprProblem {
    pub(crate) max_depth: usize,
    pub(crate) inputs: Vec<&'static str>,
    pub(crate) fail_crossover: bool,
    pub(crate) fail_mutation: bool,
    pub(crate) builds: AtomicUsize,
    pub(crate) crossovers: AtomicUsize,
    pub(crate) mutations: AtomicUsize,
}

impl ExprProblem {
    pub(crate) fn new() -> Self {
        Self {
            max_depth: 4,
            inputs: vec!["x", "y"],
            ..Self::default()
        }
    }

    pub(crate) fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::Relaxed)
    }

    fn random_expr<R: Rng + ?Sized>(&self, depth: usize, rng: &mut R) -> Result<Expr, OperatorError> {
        recursion::check_depth(depth)?;
        if depth >= self.max_depth || rng.random_bool(0.3) {
            let terminal = rng.random_range(0..self.inputs.len() + 1);
            return Ok(match self.inputs.get(terminal) {
                Some(name) => Expr::var(name),
                None => Expr::Const(rng.random_range(-5..=5) as f64),
            });
        }
        let a = self.random_expr(depth + 1, rng)?;
        let b = self.random_expr(depth + 1, rng)?;
        Ok(match rng.random_range(0..3) {
            0 => Expr::add(a, b),
            1 => Expr::mul(a, b),
            _ => Expr::div(a, b),
        })
    }
}

impl GpProblem for ExprProblem {
    type Tree = Expr;

    fn build_tree<R: Rng + ?Sized>(&self, kind: &Kind, rng: &mut R) -> Result<Expr, OperatorError> {
        self.builds.fetch_add(1, Ordering::Relaxed);
        match kind {
            Kind::Number => self.random_expr(1, rng),
            Kind::Text => Err(OperatorError::Unsatisfiable("no text primitives".into())),
        }
    }

    fn crossover<R: Rng + ?Sized>(
        &self,
        mut parent1: Expr,
        parent2: Expr,
        rng: &mut R,
    ) -> Result<Expr, OperatorError> {
        if self.fail_crossover {
            return Err(OperatorError::Constraint("crossover disabled".into()));
        }
        let donor_index = rng.random_range(0..parent2.size());
        let donor = parent2
            .nth(donor_index)
            .cloned()
            .ok_or_else(|| OperatorError::Constraint("bad donor index".into()))?;
        let target = rng.random_range(0..parent1.size());
        parent1.replace(target, donor);
        self.crossovers.fetch_add(1, Ordering::Relaxed);
        Ok(parent1)
    }

    fn mutate<R: Rng + ?Sized>(&self, mut tree: Expr, rng: &mut R) -> Result<Expr, OperatorError> {
        if self.fail_mutation {
            return Err(OperatorError::Constraint("mutation disabled".into()));
        }
        let target = rng.random_range(0..tree.size());
        let fresh = self.random_expr(self.max_depth.saturating_sub(1), rng)?;
        tree.replace(target, fresh);
        self.mutations.fetch_add(1, Ordering::Relaxed);
        Ok(tree)
    }
}
