use crate::model::Model;

/// Result of one satisfiability check.
#[derive(Debug, Clone, PartialEq)]
pub enum SolverResult {
    /// Satisfiable, with the model when the solver printed one.
    Sat(Option<Model>),
    /// Unsatisfiable.
    Unsat,
    /// Solver couldn't determine (timeout, resource limit, incompleteness).
    Unknown(String),
}

impl SolverResult {
    /// Returns `true` if the result is `Sat`.
    pub fn is_sat(&self) -> bool {
        matches!(self, SolverResult::Sat(_))
    }

    /// Returns `true` if the result is `Unsat`.
    pub fn is_unsat(&self) -> bool {
        matches!(self, SolverResult::Unsat)
    }

    /// Returns `true` if the result is `Unknown`.
    pub fn is_unknown(&self) -> bool {
        matches!(self, SolverResult::Unknown(_))
    }

    /// Returns `true` if the check stopped because its time budget ran out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SolverResult::Unknown(reason) if reason == "timeout")
    }

    /// Returns the model if the result is `Sat` with a model.
    pub fn model(&self) -> Option<&Model> {
        match self {
            SolverResult::Sat(Some(model)) => Some(model),
            _ => None,
        }
    }
}
