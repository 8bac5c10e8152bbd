//! Objective to maximize and the incremental optimization settings.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use symcps_smtlib::Term;
use symcps_solver::SolverBackend;

use crate::candidate::Candidate;
use crate::error::ContractError;

/// Reads the objective's value out of the backend's last model.
pub type Evaluator = Box<dyn Fn(&dyn SolverBackend) -> Result<f64, ContractError>>;

/// Expression maximized by `solve_optimize`.
pub struct Objective {
    pub(crate) expr: Term,
    pub(crate) lower_bound: f64,
    evaluator: Option<Evaluator>,
}

impl Objective {
    pub(crate) fn new(expr: Term, lower_bound: f64, evaluator: Option<Evaluator>) -> Self {
        Self {
            expr,
            lower_bound,
            evaluator,
        }
    }

    pub fn expr(&self) -> &Term {
        &self.expr
    }

    pub fn lower_bound(&self) -> f64 {
        self.lower_bound
    }

    /// Value under the last model: the custom evaluator if one was given,
    /// otherwise the expression evaluated directly.
    pub fn evaluate(&self, backend: &dyn SolverBackend) -> Result<f64, ContractError> {
        match &self.evaluator {
            Some(evaluate) => evaluate(backend),
            None => {
                let value = backend.model_value(&self.expr)?;
                value
                    .as_f64()
                    .ok_or_else(|| ContractError::ObjectiveValue(value.to_string()))
            }
        }
    }
}

impl fmt::Debug for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Objective")
            .field("expr", &self.expr.to_string())
            .field("lower_bound", &self.lower_bound)
            .field("custom_evaluator", &self.evaluator.is_some())
            .finish()
    }
}

/// Settings for the incremental optimization loop.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeConfig {
    /// Tightening rounds after the first satisfiable check.
    pub max_iter: usize,
    /// Wall-clock budget for the whole loop. Each check gets what remains.
    pub timeout: Option<Duration>,
    /// Required improvement per round.
    pub epsilon: f64,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            max_iter: 10,
            timeout: None,
            epsilon: 1.0,
        }
    }
}

impl OptimizeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ContractError> {
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(ContractError::InvalidNumber {
                what: "epsilon".to_string(),
                value: self.epsilon,
            });
        }
        Ok(())
    }
}

/// Chosen candidate per selectable instance.
pub type Selection = BTreeMap<String, Candidate>;

/// A satisfying selection together with its objective value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub selection: Selection,
    pub objective: f64,
}

impl Solution {
    /// Candidate id per instance.
    pub fn selected_ids(&self) -> BTreeMap<&str, &str> {
        self.selection
            .iter()
            .map(|(inst, cand)| (inst.as_str(), cand.id.as_str()))
            .collect()
    }
}

/// Why the optimization loop stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The iteration limit was reached.
    MaxIterations,
    /// No selection beats the last one (or none exists at all).
    Exhausted,
    /// The wall-clock budget ran out.
    Timeout,
    /// The solver gave up for another reason.
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Best solution found; `None` if no check was ever satisfiable.
    pub best: Option<Solution>,
    /// Objective value of every satisfiable round, in order.
    pub history: Vec<f64>,
    /// Number of solver checks performed.
    pub checks: usize,
    pub stop_reason: StopReason,
}

impl OptimizationResult {
    pub fn is_feasible(&self) -> bool {
        self.best.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = OptimizeConfig::default();
        assert_eq!(config.max_iter, 10);
        assert_eq!(config.timeout, None);
        assert_eq!(config.epsilon, 1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn epsilon_must_be_positive() {
        for eps in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(OptimizeConfig::new().with_epsilon(eps).validate().is_err());
        }
    }

    #[test]
    fn solution_ids_and_json() {
        let mut selection = Selection::new();
        selection.insert("prop_0".to_string(), Candidate::new("P1").with("C_t", 0.12));
        let solution = Solution {
            selection,
            objective: 3.5,
        };
        assert_eq!(solution.selected_ids().get("prop_0"), Some(&"P1"));

        let json = serde_json::to_string(&solution).unwrap();
        let back: Solution = serde_json::from_str(&json).unwrap();
        assert_eq!(back, solution);
    }
}
