use symcps_smtlib::{Sort, Term};
use symcps_solver::{SolverBackend, Value};

use crate::error::ContractError;

/// A named, sorted port or property of a contract template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Interface {
    pub name: String,
    pub sort: Sort,
}

impl Interface {
    pub fn new(name: impl Into<String>, sort: Sort) -> Self {
        Self {
            name: name.into(),
            sort,
        }
    }

    pub fn real(name: impl Into<String>) -> Self {
        Self::new(name, Sort::Real)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, Sort::Int)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, Sort::Bool)
    }

    /// Declare a solver variable of this interface's sort.
    pub fn fresh<B: SolverBackend + ?Sized>(
        &self,
        backend: &mut B,
        var_name: &str,
    ) -> Result<Term, ContractError> {
        Ok(backend.fresh_variable(var_name, self.sort)?)
    }

    /// A constant of this interface's sort.
    pub fn constant<B: SolverBackend + ?Sized>(
        &self,
        backend: &B,
        value: &Value,
    ) -> Result<Term, ContractError> {
        Ok(backend.constant(value, self.sort)?)
    }
}

/// Real-valued interfaces from a list of names.
pub fn reals<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<Interface> {
    names.into_iter().map(Interface::real).collect()
}
