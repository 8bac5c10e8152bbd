//! Abstraction over SMT solver backends.
//!
//! `SolverBackend` is the only seam that knows how constraints reach a
//! solver. Everything above it builds plain [`Term`]s and asks the backend
//! to declare variables, hold assertions in scopes, check, and read model
//! values back. Connectives have default implementations over `Term` so a
//! backend only overrides them when it keeps its own term representation.

use symcps_smtlib::{Sort, Term};

use crate::config::SolverKind;
use crate::error::SolverError;
use crate::result::SolverResult;
use crate::solver::CliSolver;
use crate::value::Value;

/// A stateful solver session.
pub trait SolverBackend {
    /// Declare a new variable. Names must be unique within the session.
    fn fresh_variable(&mut self, name: &str, sort: Sort) -> Result<Term, SolverError>;

    /// A constant of the given sort.
    fn constant(&self, value: &Value, sort: Sort) -> Result<Term, SolverError> {
        value.to_term(sort)
    }

    /// Evaluate a clause-producing predicate over an environment.
    fn clauses_from<E, F, Err>(&self, predicate: F, env: &E) -> Result<Vec<Term>, Err>
    where
        Self: Sized,
        E: ?Sized,
        F: Fn(&E) -> Result<Vec<Term>, Err>,
    {
        predicate(env)
    }

    fn and(&self, terms: Vec<Term>) -> Term {
        Term::and(terms)
    }

    fn or(&self, terms: Vec<Term>) -> Term {
        Term::or(terms)
    }

    fn not(&self, term: Term) -> Term {
        !term
    }

    fn implies(&self, antecedent: Term, consequent: Term) -> Term {
        antecedent.implies(consequent)
    }

    fn equal(&self, lhs: Term, rhs: Term) -> Term {
        lhs.equals(rhs)
    }

    fn ge(&self, lhs: Term, rhs: Term) -> Term {
        lhs.ge(rhs)
    }

    fn gt(&self, lhs: Term, rhs: Term) -> Term {
        lhs.gt(rhs)
    }

    /// Assert every clause in the current scope.
    fn assert_all(&mut self, clauses: Vec<Term>);

    fn assert(&mut self, clause: Term) {
        self.assert_all(vec![clause]);
    }

    /// Open an assertion scope.
    fn push(&mut self);

    /// Drop every assertion made since the matching `push`.
    /// Declarations survive.
    fn pop(&mut self) -> Result<(), SolverError>;

    /// Check the current assertions.
    fn check(&mut self) -> Result<SolverResult, SolverError>;

    /// Per-check timeout in milliseconds (0 = none).
    fn set_timeout(&mut self, timeout_ms: u64);

    fn timeout(&self) -> u64;

    /// Value of a term in the model of the last satisfiable check.
    fn model_value(&self, term: &Term) -> Result<Value, SolverError>;
}

impl<B: SolverBackend + ?Sized> SolverBackend for Box<B> {
    fn fresh_variable(&mut self, name: &str, sort: Sort) -> Result<Term, SolverError> {
        (**self).fresh_variable(name, sort)
    }

    fn constant(&self, value: &Value, sort: Sort) -> Result<Term, SolverError> {
        (**self).constant(value, sort)
    }

    fn and(&self, terms: Vec<Term>) -> Term {
        (**self).and(terms)
    }

    fn or(&self, terms: Vec<Term>) -> Term {
        (**self).or(terms)
    }

    fn not(&self, term: Term) -> Term {
        (**self).not(term)
    }

    fn implies(&self, antecedent: Term, consequent: Term) -> Term {
        (**self).implies(antecedent, consequent)
    }

    fn equal(&self, lhs: Term, rhs: Term) -> Term {
        (**self).equal(lhs, rhs)
    }

    fn ge(&self, lhs: Term, rhs: Term) -> Term {
        (**self).ge(lhs, rhs)
    }

    fn gt(&self, lhs: Term, rhs: Term) -> Term {
        (**self).gt(lhs, rhs)
    }

    fn assert_all(&mut self, clauses: Vec<Term>) {
        (**self).assert_all(clauses)
    }

    fn push(&mut self) {
        (**self).push()
    }

    fn pop(&mut self) -> Result<(), SolverError> {
        (**self).pop()
    }

    fn check(&mut self) -> Result<SolverResult, SolverError> {
        (**self).check()
    }

    fn set_timeout(&mut self, timeout_ms: u64) {
        (**self).set_timeout(timeout_ms)
    }

    fn timeout(&self) -> u64 {
        (**self).timeout()
    }

    fn model_value(&self, term: &Term) -> Result<Value, SolverError> {
        (**self).model_value(term)
    }
}

/// Create a solver backend for the specified solver kind.
pub fn create_backend(kind: SolverKind) -> Result<Box<dyn SolverBackend>, SolverError> {
    tracing::debug!("Using {kind} subprocess backend");
    let solver = CliSolver::with_default_config_for(kind)?;
    Ok(Box::new(solver))
}

/// Create a backend from `SYMCPS_SOLVER*` environment settings, defaulting
/// to an auto-detected Z3.
pub fn create_default_backend() -> Result<Box<dyn SolverBackend>, SolverError> {
    let config = crate::config::SolverConfig::from_env()?;
    tracing::debug!("Using {} subprocess backend at {}", config.kind, config.solver_path.display());
    Ok(Box::new(CliSolver::new(config)))
}
