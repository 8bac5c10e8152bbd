//! # symcps-solver
//!
//! Solver sessions for contract queries.
//!
//! [`SolverBackend`] is a stateful session: declare variables, assert
//! constraints inside push/pop scopes, check, and read model values back.
//! [`CliSolver`] implements it by replaying the session as SMT-LIB2 text to
//! a Z3, CVC5 or Yices subprocess.
//!
//! ## Usage
//!
//! ```no_run
//! use symcps_smtlib::{Sort, Term};
//! use symcps_solver::{CliSolver, SolverBackend, SolverResult};
//!
//! let mut solver = CliSolver::with_default_config().unwrap();
//! let x = solver.fresh_variable("x", Sort::Real).unwrap();
//! solver.assert(x.clone().gt(0.0));
//! solver.assert(x.clone().lt(10.0));
//!
//! match solver.check().unwrap() {
//!     SolverResult::Sat(_) => println!("x = {}", solver.model_value(&x).unwrap()),
//!     SolverResult::Unsat => println!("infeasible"),
//!     SolverResult::Unknown(reason) => println!("unknown: {reason}"),
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod model;
mod parser;
pub mod result;
pub mod solver;
pub mod value;

pub use backend::{SolverBackend, create_backend, create_default_backend};
pub use config::{SolverConfig, SolverKind};
pub use error::SolverError;
pub use model::Model;
pub use result::SolverResult;
pub use solver::CliSolver;
pub use value::Value;
