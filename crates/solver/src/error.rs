use std::path::PathBuf;

use symcps_smtlib::Sort;

use crate::config::SolverKind;

/// Errors from solver interaction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolverError {
    /// Solver binary not found at the specified path.
    #[error("{0} binary not found at: {path}", path = .1.display())]
    NotFound(SolverKind, PathBuf),
    /// Process failed to start or crashed.
    #[error("Solver process error: {0}")]
    ProcessError(String),
    /// Failed to parse solver output.
    #[error("Failed to parse solver output: {0}")]
    ParseError(String),
    /// Timeout exceeded.
    #[error("Solver timeout exceeded")]
    Timeout,
    /// A model was requested but the last check was not SAT.
    #[error("No model available: the last check did not return SAT")]
    NoModel,
    /// A variable was requested that the backend never declared.
    #[error("Unknown solver variable: {0}")]
    UnknownVariable(String),
    /// A fresh variable was requested under a name that is already declared.
    #[error("Solver variable declared twice: {0}")]
    DuplicateSymbol(String),
    /// A term could not be evaluated against the model.
    #[error("Cannot evaluate term against the model: {0}")]
    Unevaluable(String),
    /// The name contains `|` or `\`, which no SMT-LIB symbol can hold.
    #[error("Invalid solver symbol: {0}")]
    InvalidSymbol(String),
    /// `pop` without a matching `push`.
    #[error("Cannot pop: no open assertion scope")]
    NoScope,
    /// A constant could not be represented in the requested sort.
    #[error("Value {value} cannot be used as a constant of sort {sort}")]
    UnsupportedValue { value: String, sort: Sort },
}
