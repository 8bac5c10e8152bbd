use symcps_smtlib::Term;

use crate::error::SolverError;
use crate::parser::{SExp, parse_sexp};
use crate::value::Value;

/// A satisfying assignment returned by the solver.
///
/// Values are kept as the solver printed them and decoded on access.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Model {
    /// Variable assignments: `(name, value_string)` pairs.
    pub assignments: Vec<(String, String)>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_assignments(assignments: Vec<(String, String)>) -> Self {
        Self { assignments }
    }

    /// Raw solver text for a variable.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.assignments
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Decoded value of a variable, `None` if the model does not mention it.
    pub fn value(&self, name: &str) -> Result<Option<Value>, SolverError> {
        self.get(name).map(decode_value).transpose()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Evaluate a term under this model.
    ///
    /// Arithmetic is carried out in `f64`; comparisons of reals use exact
    /// `f64` equality, matching how the values were decoded.
    pub fn evaluate(&self, term: &Term) -> Result<Value, SolverError> {
        let num = |t: &Term| -> Result<f64, SolverError> {
            self.evaluate(t)?
                .as_f64()
                .ok_or_else(|| SolverError::Unevaluable(t.to_string()))
        };
        let boolean = |t: &Term| -> Result<bool, SolverError> {
            self.evaluate(t)?
                .as_bool()
                .ok_or_else(|| SolverError::Unevaluable(t.to_string()))
        };

        let value = match term {
            Term::BoolLit(_) | Term::IntLit(_) | Term::RealLit(_) | Term::BitVecLit(..) => {
                Value::from_literal(term).ok_or_else(|| SolverError::Unevaluable(term.to_string()))?
            }
            Term::Const(name) => self
                .value(name)?
                .ok_or_else(|| SolverError::UnknownVariable(name.clone()))?,

            Term::Not(a) => Value::Bool(!boolean(a)?),
            Term::And(ts) => Value::Bool(all(ts, &boolean)?),
            Term::Or(ts) => Value::Bool(any(ts, &boolean)?),
            Term::Implies(a, b) => Value::Bool(!boolean(a)? || boolean(b)?),
            Term::Eq(a, b) => Value::Bool(values_equal(self.evaluate(a)?, self.evaluate(b)?)),
            Term::Distinct(ts) => {
                let values = ts
                    .iter()
                    .map(|t| self.evaluate(t))
                    .collect::<Result<Vec<_>, _>>()?;
                let distinct = values.iter().enumerate().all(|(i, a)| {
                    values[i + 1..].iter().all(|b| !values_equal(*a, *b))
                });
                Value::Bool(distinct)
            }
            Term::Ite(c, t, e) => {
                if boolean(c)? {
                    self.evaluate(t)?
                } else {
                    self.evaluate(e)?
                }
            }

            Term::Add(ts) => Value::Real(ts.iter().map(num).sum::<Result<f64, _>>()?),
            Term::Mul(ts) => Value::Real(ts.iter().map(num).product::<Result<f64, _>>()?),
            Term::Sub(a, b) => Value::Real(num(a)? - num(b)?),
            Term::Div(a, b) => Value::Real(num(a)? / num(b)?),
            Term::Neg(a) => Value::Real(-num(a)?),
            Term::ToReal(a) => Value::Real(num(a)?),
            Term::Lt(a, b) => Value::Bool(num(a)? < num(b)?),
            Term::Le(a, b) => Value::Bool(num(a)? <= num(b)?),
            Term::Gt(a, b) => Value::Bool(num(a)? > num(b)?),
            Term::Ge(a, b) => Value::Bool(num(a)? >= num(b)?),

            Term::BvAdd(..)
            | Term::BvSub(..)
            | Term::BvMul(..)
            | Term::BvULt(..)
            | Term::BvULe(..)
            | Term::BvUGt(..)
            | Term::BvUGe(..) => return Err(SolverError::Unevaluable(term.to_string())),
        };
        Ok(value)
    }
}

fn all(ts: &[Term], f: &impl Fn(&Term) -> Result<bool, SolverError>) -> Result<bool, SolverError> {
    for t in ts {
        if !f(t)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn any(ts: &[Term], f: &impl Fn(&Term) -> Result<bool, SolverError>) -> Result<bool, SolverError> {
    for t in ts {
        if f(t)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn values_equal(a: Value, b: Value) -> bool {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::BitVec(x), Value::BitVec(y)) => x == y,
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

/// Decode one value as printed by a solver.
///
/// Handles booleans, integers, decimals (including Z3's `1.4142?`
/// approximations under `pp.decimal`), `(- x)`, `(/ a b)`, `+`/`*` of
/// numerals, `#x`/`#b` and `(_ bvN w)` bitvectors. Algebraic `root-obj`
/// values are rejected: enable decimal output to read them.
pub fn decode_value(text: &str) -> Result<Value, SolverError> {
    eval_sexp(&parse_sexp(text)?)
}

fn eval_sexp(sexp: &SExp) -> Result<Value, SolverError> {
    let bad = || SolverError::ParseError(format!("unsupported model value: {sexp}"));

    match sexp {
        SExp::Atom(atom) => decode_atom(atom).ok_or_else(bad),
        SExp::List(items) => {
            let Some(head) = items.first().and_then(SExp::atom) else {
                return Err(bad());
            };
            let args = &items[1..];
            let numbers = || -> Result<Vec<f64>, SolverError> {
                args.iter()
                    .map(|a| eval_sexp(a)?.as_f64().ok_or_else(bad))
                    .collect()
            };
            match (head, args.len()) {
                ("-", 1) => match eval_sexp(&args[0])? {
                    Value::Int(i) => Ok(Value::Int(-i)),
                    Value::Real(r) => Ok(Value::Real(-r)),
                    _ => Err(bad()),
                },
                ("-", n) if n > 1 => {
                    let ns = numbers()?;
                    Ok(Value::Real(ns[1..].iter().fold(ns[0], |acc, x| acc - x)))
                }
                ("/", 2) => {
                    let ns = numbers()?;
                    Ok(Value::Real(ns[0] / ns[1]))
                }
                ("+", _) => Ok(Value::Real(numbers()?.iter().sum())),
                ("*", _) => Ok(Value::Real(numbers()?.iter().product())),
                ("to_real", 1) => Ok(Value::Real(numbers()?[0])),
                ("_", 2) => {
                    let digits = args[0].atom().and_then(|a| a.strip_prefix("bv")).ok_or_else(bad)?;
                    digits.parse().map(Value::BitVec).map_err(|_| bad())
                }
                _ => Err(bad()),
            }
        }
    }
}

fn decode_atom(atom: &str) -> Option<Value> {
    match atom {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        _ => {}
    }
    if let Some(hex) = atom.strip_prefix("#x") {
        return u128::from_str_radix(hex, 16).ok().map(Value::BitVec);
    }
    if let Some(bin) = atom.strip_prefix("#b") {
        return u128::from_str_radix(bin, 2).ok().map(Value::BitVec);
    }
    let numeral = atom.strip_suffix('?').unwrap_or(atom);
    if !numeral.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    if numeral.contains('.') {
        numeral.parse().ok().map(Value::Real)
    } else {
        numeral.parse().ok().map(Value::Int)
    }
}
