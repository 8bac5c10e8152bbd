//! Errors raised by contract construction and system queries.
//!
//! Configuration mistakes fail immediately. Infeasibility is not an error:
//! it comes back as an `Outcome`/`Verdict` value.

use symcps_smtlib::Sort;
use symcps_solver::SolverError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractError {
    /// A port or property name appears twice in one template.
    #[error("duplicate field '{field}' in contract template '{template}'")]
    DuplicateField { template: String, field: String },

    #[error("duplicate contract instance '{0}'")]
    DuplicateInstance(String),

    #[error("unknown contract instance '{0}'")]
    UnknownInstance(String),

    #[error("'{field}' is not a port of instance '{instance}'")]
    UndeclaredPort { instance: String, field: String },

    #[error("'{field}' is not a property of instance '{instance}'")]
    UndeclaredProperty { instance: String, field: String },

    #[error("'{field}' is neither a port nor a property of instance '{instance}'")]
    UndeclaredField { instance: String, field: String },

    /// Variables are only created once the instance joins a system.
    #[error("instance '{0}' has no variables yet; add it to a contract system first")]
    NotMaterialized(String),

    #[error("component '{candidate}' has no value for property '{property}'")]
    MissingProperty { candidate: String, property: String },

    #[error("component '{candidate}' property '{property}' cannot be used as {sort}")]
    PropertyKind {
        candidate: String,
        property: String,
        sort: Sort,
    },

    #[error("instance '{0}' is fixed to a component and cannot be selected")]
    FixedInstance(String),

    #[error("instance '{0}' already has a selection group")]
    SelectionExists(String),

    #[error("empty candidate list for instance '{0}'")]
    EmptyCatalog(String),

    #[error("candidate '{candidate}' offered twice for instance '{instance}'")]
    DuplicateCandidate { instance: String, candidate: String },

    /// Candidate ids become part of solver symbols.
    #[error("candidate id '{candidate}' for instance '{instance}' contains '|' or '\\'")]
    InvalidCandidateId { instance: String, candidate: String },

    #[error("cannot connect {lhs} ({lhs_sort}) to {rhs} ({rhs_sort})")]
    SortMismatch {
        lhs: String,
        lhs_sort: Sort,
        rhs: String,
        rhs_sort: Sort,
    },

    #[error("{what} must be a finite number, got {value}")]
    InvalidNumber { what: String, value: f64 },

    #[error("no objective has been set")]
    NoObjective,

    #[error("objective did not evaluate to a number: {0}")]
    ObjectiveValue(String),

    /// Zero or several decision variables of one group are true in a model.
    #[error("selection for '{instance}' is inconsistent: {selected} candidates selected")]
    SelectionInconsistent { instance: String, selected: usize },

    #[error(transparent)]
    Solver(#[from] SolverError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_messages() {
        let err = ContractError::MissingProperty {
            candidate: "apc_10x4".to_string(),
            property: "C_t".to_string(),
        };
        assert_eq!(err.to_string(), "component 'apc_10x4' has no value for property 'C_t'");

        let err = ContractError::SortMismatch {
            lhs: "prop.thrust".to_string(),
            lhs_sort: Sort::Real,
            rhs: "ctrl.enabled".to_string(),
            rhs_sort: Sort::Bool,
        };
        assert_eq!(err.to_string(), "cannot connect prop.thrust (Real) to ctrl.enabled (Bool)");
    }

    #[test]
    fn solver_errors_convert() {
        let err: ContractError = SolverError::NoModel.into();
        assert_eq!(err, ContractError::Solver(SolverError::NoModel));
        assert_eq!(err.to_string(), SolverError::NoModel.to_string());
    }
}
