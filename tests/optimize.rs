//! End-to-end runs of the optimizer on a small typed expression language.

use rand::{Rng, RngCore};
use std::cell::Cell;
use u_gpsearch::error::{EvalError, GpError, OperatorError, Result};
use u_gpsearch::gp::{
    minimize, population_scoring, pre_evaluate, require, scoring, Evolution, EvolutionConfig,
    GenerationStep, GpProblem, Objective, Observer, OptimizeConfig, Optimizer, Program,
    RequirementBuilder, Score, Scoring, TournamentConfig, TournamentSelector, TreeBuilder,
};
use u_gpsearch::recursion;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ===========================================================================
// Typed expression trees: numbers and booleans
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Float,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Value {
    Float(f64),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Const(f64),
    Input(&'static str),
    Add(Box<Node>, Box<Node>),
    Sub(Box<Node>, Box<Node>),
    Mul(Box<Node>, Box<Node>),
    Less(Box<Node>, Box<Node>),
    Select(Box<Node>, Box<Node>, Box<Node>),
}

impl Node {
    fn children(&self) -> Vec<&Node> {
        match self {
            Node::Const(_) | Node::Input(_) => vec![],
            Node::Add(a, b) | Node::Sub(a, b) | Node::Mul(a, b) | Node::Less(a, b) => vec![&**a, &**b],
            Node::Select(c, a, b) => vec![&**c, &**a, &**b],
        }
    }

    fn children_mut(&mut self) -> Vec<&mut Node> {
        match self {
            Node::Const(_) | Node::Input(_) => vec![],
            Node::Add(a, b) | Node::Sub(a, b) | Node::Mul(a, b) | Node::Less(a, b) => {
                vec![&mut **a, &mut **b]
            }
            Node::Select(c, a, b) => vec![&mut **c, &mut **a, &mut **b],
        }
    }

    /// Kinds of every subtree, in preorder.
    fn kinds(&self, out: &mut Vec<Kind>) {
        out.push(self.kind());
        for child in self.children() {
            child.kinds(out);
        }
    }

    fn nth(&self, index: usize) -> Option<&Node> {
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

    fn nth_mut(&mut self, index: usize) -> Option<&mut Node> {
        if index == 0 {
            return Some(self);
        }
        let mut offset = 1;
        for child in self.children_mut() {
            let size = child.size();
            if index < offset + size {
                return child.nth_mut(index - offset);
            }
            offset += size;
        }
        None
    }

    fn eval(&self, x: Option<f64>) -> std::result::Result<Value, EvalError> {
        Ok(match self {
            Node::Const(v) => Value::Float(*v),
            Node::Input(name) => match x {
                Some(v) if *name == "x" => Value::Float(v),
                _ => return Err(EvalError::new(format!("unbound input {name}"))),
            },
            Node::Add(a, b) => Value::Float(a.float(x)? + b.float(x)?),
            Node::Sub(a, b) => Value::Float(a.float(x)? - b.float(x)?),
            Node::Mul(a, b) => Value::Float(a.float(x)? * b.float(x)?),
            Node::Less(a, b) => Value::Bool(a.float(x)? < b.float(x)?),
            Node::Select(c, a, b) => match c.eval(x)? {
                Value::Bool(true) => a.eval(x)?,
                Value::Bool(false) => b.eval(x)?,
                Value::Float(_) => return Err(EvalError::new("condition is not boolean")),
            },
        })
    }

    fn float(&self, x: Option<f64>) -> std::result::Result<f64, EvalError> {
        match self.eval(x)? {
            Value::Float(v) => Ok(v),
            Value::Bool(_) => Err(EvalError::new("expected a number")),
        }
    }
}

impl Program for Node {
    type Kind = Kind;
    type Value = Value;

    fn kind(&self) -> Kind {
        match self {
            Node::Less(..) => Kind::Bool,
            _ => Kind::Float,
        }
    }

    fn size(&self) -> usize {
        1 + self.children().iter().map(|c| c.size()).sum::<usize>()
    }

    fn depth(&self) -> usize {
        1 + self.children().iter().map(|c| c.depth()).max().unwrap_or(0)
    }

    fn contains_input(&self, name: &str) -> bool {
        match self {
            Node::Input(n) => *n == name,
            _ => self.children().iter().any(|c| c.contains_input(name)),
        }
    }

    fn evaluate(&self) -> std::result::Result<Value, EvalError> {
        self.eval(None)
    }
}

struct Arithmetic {
    max_depth: usize,
}

impl Arithmetic {
    fn grow<R: Rng + ?Sized>(
        &self,
        kind: Kind,
        depth: usize,
        rng: &mut R,
    ) -> std::result::Result<Node, OperatorError> {
        recursion::check_depth(depth)?;
        let leaf = depth >= self.max_depth || rng.random_bool(0.3);
        Ok(match kind {
            Kind::Bool => Node::Less(
                Box::new(self.grow(Kind::Float, depth + 1, rng)?),
                Box::new(self.grow(Kind::Float, depth + 1, rng)?),
            ),
            Kind::Float if leaf => {
                if rng.random_bool(0.4) {
                    Node::Input("x")
                } else {
                    Node::Const(rng.random_range(-3..=3) as f64)
                }
            }
            Kind::Float => {
                let a = Box::new(self.grow(Kind::Float, depth + 1, rng)?);
                let b = Box::new(self.grow(Kind::Float, depth + 1, rng)?);
                match rng.random_range(0..4) {
                    0 => Node::Add(a, b),
                    1 => Node::Sub(a, b),
                    2 => Node::Mul(a, b),
                    _ => Node::Select(Box::new(self.grow(Kind::Bool, depth + 1, rng)?), a, b),
                }
            }
        })
    }

    fn check(&self, tree: Node) -> std::result::Result<Node, OperatorError> {
        if tree.depth() > 2 * self.max_depth {
            return Err(OperatorError::Constraint("tree too deep".into()));
        }
        Ok(tree)
    }
}

impl GpProblem for Arithmetic {
    type Tree = Node;

    fn build_tree<R: Rng + ?Sized>(
        &self,
        kind: &Kind,
        rng: &mut R,
    ) -> std::result::Result<Node, OperatorError> {
        self.grow(*kind, 1, rng)
    }

    fn crossover<R: Rng + ?Sized>(
        &self,
        mut parent1: Node,
        parent2: Node,
        rng: &mut R,
    ) -> std::result::Result<Node, OperatorError> {
        let mut kinds = Vec::new();
        parent1.kinds(&mut kinds);
        let target = rng.random_range(0..kinds.len());

        let mut donor_kinds = Vec::new();
        parent2.kinds(&mut donor_kinds);
        let donors: Vec<usize> = (0..donor_kinds.len())
            .filter(|&i| donor_kinds[i] == kinds[target])
            .collect();
        if donors.is_empty() {
            return Err(OperatorError::Constraint("no donor of matching kind".into()));
        }
        let donor = parent2
            .nth(donors[rng.random_range(0..donors.len())])
            .cloned()
            .ok_or_else(|| OperatorError::Constraint("bad donor index".into()))?;

        if let Some(slot) = parent1.nth_mut(target) {
            *slot = donor;
        }
        self.check(parent1)
    }

    fn mutate<R: Rng + ?Sized>(
        &self,
        mut tree: Node,
        rng: &mut R,
    ) -> std::result::Result<Node, OperatorError> {
        let mut kinds = Vec::new();
        tree.kinds(&mut kinds);
        let target = rng.random_range(0..kinds.len());
        let fresh = self.grow(kinds[target], self.max_depth.saturating_sub(2), rng)?;
        if let Some(slot) = tree.nth_mut(target) {
            *slot = fresh;
        }
        self.check(tree)
    }
}

fn problem() -> Arithmetic {
    Arithmetic { max_depth: 5 }
}

/// Squared error against `x^2 + x` over a few sample points.
fn regression_error(tree: &Node) -> Score {
    let mut error = 0.0;
    for i in -4..=4 {
        let x = i as f64 * 0.5;
        match tree.eval(Some(x)) {
            Ok(Value::Float(y)) => error += (y - (x * x + x)).powi(2),
            _ => return Score::Disqualified,
        }
    }
    Score::Valid(error)
}

fn tree_size(tree: &Node) -> f64 {
    tree.size() as f64
}

// ===========================================================================
// Tests
// ===========================================================================

#[test]
fn small_run_returns_declared_kind() {
    init_logging();
    let config = OptimizeConfig::default()
        .with_population_size(10)
        .with_iterations(3)
        .with_seed(1);

    let float = Optimizer::run(&problem(), &scoring(Kind::Float, tree_size), &config)
        .expect("float trees are always constructible");
    assert_eq!(float.best.kind(), Kind::Float);
    assert_eq!(float.history.len(), 3);

    let boolean = Optimizer::run(&problem(), &scoring(Kind::Bool, tree_size), &config)
        .expect("bool trees are always constructible");
    assert_eq!(boolean.best.kind(), Kind::Bool);
}

#[test]
fn symbolic_regression_improves() {
    init_logging();
    let objective = require(["x"], minimize(scoring(Kind::Float, regression_error)));
    let config = OptimizeConfig::default()
        .with_population_size(60)
        .with_iterations(10)
        .with_seed(42);

    let result = Optimizer::run(&problem(), &objective, &config).expect("run succeeds");

    assert!(result.best.contains_input("x"));
    assert_eq!(result.best_score, objective.score(&result.best));
    let first = result.history[0].best_score;
    assert!(
        result.best_score >= first,
        "final {} is worse than initial {}",
        result.best_score,
        first
    );
}

#[test]
fn evaluation_faults_disqualify() {
    init_logging();
    // `evaluate` leaves x unbound, so only input-free trees can score.
    let objective = minimize(pre_evaluate(Kind::Float, |v: Value| match v {
        Value::Float(v) => Score::Valid((v - 7.0).abs()),
        Value::Bool(_) => Score::Disqualified,
    }));
    let config = OptimizeConfig::default()
        .with_population_size(40)
        .with_iterations(5)
        .with_seed(3);

    let result = Optimizer::run(&problem(), &objective, &config).expect("run succeeds");
    if !result.best_score.is_disqualified() {
        assert!(!result.best.contains_input("x"));
    }
}

#[test]
fn seeded_runs_are_reproducible() {
    let objective = require(["x"], minimize(scoring(Kind::Float, regression_error)));
    let config = OptimizeConfig::default()
        .with_population_size(20)
        .with_iterations(4)
        .with_show_scores(false)
        .with_seed(99);

    let a = Optimizer::run(&problem(), &objective, &config).expect("run a");
    let b = Optimizer::run(&problem(), &objective, &config).expect("run b");
    assert_eq!(a.best, b.best);
    assert_eq!(a.history, b.history);
}

#[test]
fn unreachable_input_is_fatal() {
    init_logging();
    let objective = require(["w"], scoring(Kind::Float, tree_size));
    let config = OptimizeConfig::default()
        .with_population_size(5)
        .with_iterations(1)
        .with_seed(0);
    let builder = RequirementBuilder::default().with_max_attempts(100);

    let err = Optimizer::run_with(
        &problem(),
        &objective,
        &config,
        &builder,
        &Evolution::<TournamentSelector>::default(),
    )
    .expect_err("w is never generated");
    match err {
        GpError::Unsatisfiable(msg) => assert!(msg.contains("found only 0"), "{msg}"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn signature_must_name_one_type() {
    let objective = Scoring::with_signature(Vec::<Kind>::new(), tree_size);
    let config = OptimizeConfig::default().with_population_size(5);
    let err = Optimizer::run(&problem(), &objective, &config).expect_err("no return type");
    assert_eq!(err, GpError::InvalidSignature { found: 0 });
}

/// Seeds every individual with the same tree.
struct Fixed(Node);

impl<O: Objective<Node>> TreeBuilder<Arithmetic, O> for Fixed {
    fn build(&self, _: &Arithmetic, _: &O, _: &mut dyn RngCore) -> Result<Node> {
        Ok(self.0.clone())
    }
}

/// Forwards to an inner step and counts generations.
struct Counting<S> {
    inner: S,
    calls: Cell<usize>,
}

impl<P, O, S> GenerationStep<P, O> for Counting<S>
where
    P: GpProblem,
    O: Objective<P::Tree>,
    S: GenerationStep<P, O>,
{
    fn next_generation(
        &self,
        population: &[P::Tree],
        problem: &P,
        objective: &O,
        rng: &mut dyn RngCore,
        observer: Option<Observer<'_, P::Tree>>,
    ) -> Result<Vec<P::Tree>> {
        self.calls.set(self.calls.get() + 1);
        self.inner
            .next_generation(population, problem, objective, rng, observer)
    }
}

#[test]
fn builder_and_step_overrides() {
    init_logging();
    let seed_tree = Node::Add(Box::new(Node::Input("x")), Box::new(Node::Const(1.0)));
    let objective = require(["x"], minimize(scoring(Kind::Float, regression_error)));
    let step = Counting {
        inner: Evolution::new(
            TournamentSelector::new(TournamentConfig::default().with_tournament_size(5)),
            EvolutionConfig::default().with_mutation_rate(0.1),
        ),
        calls: Cell::new(0),
    };
    let config = OptimizeConfig::default()
        .with_population_size(15)
        .with_iterations(4)
        .with_seed(11);

    let result = Optimizer::run_with(&problem(), &objective, &config, &Fixed(seed_tree.clone()), &step)
        .expect("run succeeds");

    assert_eq!(step.calls.get(), 4);
    assert_eq!(result.history.len(), 4);
    // Every initial tree is the seed, so the first round is uniform.
    assert_eq!(result.history[0].best_score, objective.score(&seed_tree));
    assert!(result.best_score >= objective.score(&seed_tree));
}

#[test]
fn population_objective_returns_improved_tree() {
    init_logging();
    // Error relative to the best tree in view: a lone tree always scores 0.
    let objective = population_scoring(Kind::Float, |population: &[Node]| {
        let best = population
            .iter()
            .filter_map(|t| regression_error(t).value())
            .fold(f64::INFINITY, f64::min);
        move |t: &Node| regression_error(t).map(|e| best - e)
    });
    let seed_tree = Node::Const(50.0);
    let step = Evolution::new(
        TournamentSelector::new(TournamentConfig::default().with_tournament_size(5)),
        EvolutionConfig::default()
            .with_crossover_rate(0.5)
            .with_mutation_rate(0.3),
    );
    let config = OptimizeConfig::default()
        .with_population_size(30)
        .with_iterations(5)
        .with_seed(8);

    let result = Optimizer::run_with(&problem(), &objective, &config, &Fixed(seed_tree.clone()), &step)
        .expect("run succeeds");

    let found = regression_error(&result.best);
    assert!(!found.is_disqualified());
    assert!(
        found < regression_error(&seed_tree),
        "seed tree returned although mutants improved on it"
    );
}
