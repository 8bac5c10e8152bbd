use std::path::PathBuf;

use symcps_contract::ContractError;
use thiserror::Error;

use crate::library::ComponentKind;

#[derive(Debug, Error)]
pub enum UavError {
    #[error("no component '{0}' in the library")]
    UnknownComponent(String),

    #[error("library component '{component}' has no '{field}' entry")]
    MissingField { component: String, field: String },

    #[error("library component '{component}' is a {actual}, expected a {expected}")]
    WrongKind {
        component: String,
        expected: ComponentKind,
        actual: ComponentKind,
    },

    #[error("library has no {0} components")]
    NoCandidates(ComponentKind),

    #[error("invalid topology: {0}")]
    Topology(String),

    /// A concrete design lists a different number of parts than the topology.
    #[error("design has {actual} {kind} entries, topology needs {expected}")]
    CountMismatch {
        kind: ComponentKind,
        expected: usize,
        actual: usize,
    },

    /// Refinement needs the aggregate as a query-level contract.
    #[error("powertrain was built for search; rebuild it for verification")]
    NotVerifiable,

    #[error("invalid component library: {0}")]
    Library(#[from] serde_json::Error),

    #[error("cannot read component library {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl From<symcps_solver::SolverError> for UavError {
    fn from(err: symcps_solver::SolverError) -> Self {
        UavError::Contract(ContractError::from(err))
    }
}
