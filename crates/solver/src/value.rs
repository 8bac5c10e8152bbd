//! Concrete values exchanged with a backend: constants going in, model
//! values coming out.

use std::fmt;

use symcps_smtlib::{Sort, Term};

use crate::error::SolverError;

/// A concrete value of one of the supported sorts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i128),
    /// Exact rational reduced to floating form.
    Real(f64),
    BitVec(u128),
}

impl Value {
    /// Numeric view of the value. Booleans are not numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::BitVec(v) => Some(*v as f64),
            Value::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Build the literal term for this value in the given sort.
    pub fn to_term(&self, sort: Sort) -> Result<Term, SolverError> {
        let unsupported = || SolverError::UnsupportedValue {
            value: self.to_string(),
            sort,
        };
        match (*self, sort) {
            (Value::Bool(b), Sort::Bool) => Ok(Term::BoolLit(b)),
            (Value::Int(i), Sort::Int) => Ok(Term::IntLit(i)),
            (Value::Int(i), Sort::Real) => Ok(Term::RealLit(i as f64)),
            (Value::Real(r), Sort::Real) if r.is_finite() => Ok(Term::RealLit(r)),
            (Value::Real(r), Sort::Int) if r.is_finite() && r.fract() == 0.0 => {
                Ok(Term::IntLit(r as i128))
            }
            (Value::BitVec(v), Sort::BitVec(width)) if width >= 128 || v < (1u128 << width) => {
                Ok(Term::BitVecLit(v as i128, width))
            }
            (Value::Int(i), Sort::BitVec(width))
                if i >= 0 && (width >= 128 || (i as u128) < (1u128 << width)) =>
            {
                Ok(Term::BitVecLit(i, width))
            }
            _ => Err(unsupported()),
        }
    }

    /// Read the value of a literal term back.
    pub fn from_literal(term: &Term) -> Option<Value> {
        match term {
            Term::BoolLit(b) => Some(Value::Bool(*b)),
            Term::IntLit(i) => Some(Value::Int(*i)),
            Term::RealLit(r) => Some(Value::Real(*r)),
            Term::BitVecLit(v, _) => Some(Value::BitVec(*v as u128)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::BitVec(v) => write!(f, "#x{v:x}"),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}
