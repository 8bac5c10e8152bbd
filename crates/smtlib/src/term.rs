use std::ops;

/// SMT-LIB term (expression) representation.
///
/// Arithmetic variants are sort-polymorphic in SMT-LIB (`+` works on both
/// `Int` and `Real`), so there is a single family for both sorts. Contract
/// predicates usually build terms through the operator overloads and the
/// comparison helpers below rather than through the variants directly:
///
/// ```
/// use symcps_smtlib::term::Term;
///
/// let thrust = Term::var("thrust");
/// let weight = Term::var("weight");
/// let margin = thrust.clone() - weight.clone();
/// assert_eq!(margin.ge(0.0).to_string(), "(>= (- thrust weight) 0.0)");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    // === Literals ===
    /// Boolean literal
    BoolLit(bool),
    /// Integer literal (unbounded)
    IntLit(i128),
    /// Real literal, written as an exact SMT-LIB decimal
    RealLit(f64),
    /// Bitvector literal with value and width
    BitVecLit(i128, u32),

    // === Variables ===
    /// Named constant/variable reference
    Const(String),

    // === Boolean operations ===
    /// Logical NOT
    Not(Box<Term>),
    /// Logical AND (n-ary)
    And(Vec<Term>),
    /// Logical OR (n-ary)
    Or(Vec<Term>),
    /// Logical implication: `(=> a b)`
    Implies(Box<Term>, Box<Term>),

    // === Core ===
    /// Equality: `(= a b)`
    Eq(Box<Term>, Box<Term>),
    /// Distinct: `(distinct a b ...)`
    Distinct(Vec<Term>),
    /// If-then-else: `(ite cond then else)`
    Ite(Box<Term>, Box<Term>, Box<Term>),

    // === Arithmetic (Int and Real) ===
    /// `(+ a b ...)`
    Add(Vec<Term>),
    /// `(- a b)`
    Sub(Box<Term>, Box<Term>),
    /// `(* a b ...)`
    Mul(Vec<Term>),
    /// `(/ a b)`: real division
    Div(Box<Term>, Box<Term>),
    /// `(- a)`
    Neg(Box<Term>),
    /// `(to_real a)`
    ToReal(Box<Term>),
    /// `(< a b)`
    Lt(Box<Term>, Box<Term>),
    /// `(<= a b)`
    Le(Box<Term>, Box<Term>),
    /// `(> a b)`
    Gt(Box<Term>, Box<Term>),
    /// `(>= a b)`
    Ge(Box<Term>, Box<Term>),

    // === Bitvector ===
    /// `(bvadd a b)`
    BvAdd(Box<Term>, Box<Term>),
    /// `(bvsub a b)`
    BvSub(Box<Term>, Box<Term>),
    /// `(bvmul a b)`
    BvMul(Box<Term>, Box<Term>),
    /// `(bvult a b)`: unsigned less-than
    BvULt(Box<Term>, Box<Term>),
    /// `(bvule a b)`: unsigned less-or-equal
    BvULe(Box<Term>, Box<Term>),
    /// `(bvugt a b)`: unsigned greater-than
    BvUGt(Box<Term>, Box<Term>),
    /// `(bvuge a b)`: unsigned greater-or-equal
    BvUGe(Box<Term>, Box<Term>),
}

impl Term {
    /// Reference a declared constant by name.
    pub fn var(name: impl Into<String>) -> Self {
        Term::Const(name.into())
    }

    /// Real literal. Callers are expected to pass finite values.
    pub fn real(value: f64) -> Self {
        Term::RealLit(value)
    }

    pub fn int(value: i128) -> Self {
        Term::IntLit(value)
    }

    pub fn bool(value: bool) -> Self {
        Term::BoolLit(value)
    }

    /// Conjunction. A single conjunct is returned unwrapped.
    pub fn and(mut terms: Vec<Term>) -> Self {
        if terms.len() == 1 {
            return terms.remove(0);
        }
        Term::And(terms)
    }

    /// Disjunction. A single disjunct is returned unwrapped.
    pub fn or(mut terms: Vec<Term>) -> Self {
        if terms.len() == 1 {
            return terms.remove(0);
        }
        Term::Or(terms)
    }

    /// Sum of the given terms; the empty sum is `0.0`.
    pub fn sum(terms: impl IntoIterator<Item = Term>) -> Self {
        let mut terms: Vec<Term> = terms.into_iter().collect();
        match terms.len() {
            0 => Term::RealLit(0.0),
            1 => terms.remove(0),
            _ => Term::Add(terms),
        }
    }

    /// `self` raised to a small constant power, expanded into a product.
    pub fn pow(self, exponent: u32) -> Self {
        match exponent {
            0 => Term::RealLit(1.0),
            1 => self,
            n => Term::Mul((0..n).map(|_| self.clone()).collect()),
        }
    }

    pub fn implies(self, consequent: impl Into<Term>) -> Self {
        Term::Implies(Box::new(self), Box::new(consequent.into()))
    }

    /// Equality (`PartialEq::eq` is taken by structural comparison).
    pub fn equals(self, rhs: impl Into<Term>) -> Self {
        Term::Eq(Box::new(self), Box::new(rhs.into()))
    }

    pub fn lt(self, rhs: impl Into<Term>) -> Self {
        Term::Lt(Box::new(self), Box::new(rhs.into()))
    }

    pub fn le(self, rhs: impl Into<Term>) -> Self {
        Term::Le(Box::new(self), Box::new(rhs.into()))
    }

    pub fn gt(self, rhs: impl Into<Term>) -> Self {
        Term::Gt(Box::new(self), Box::new(rhs.into()))
    }

    pub fn ge(self, rhs: impl Into<Term>) -> Self {
        Term::Ge(Box::new(self), Box::new(rhs.into()))
    }

    /// Name of the referenced constant, if this is a variable.
    pub fn as_const(&self) -> Option<&str> {
        match self {
            Term::Const(name) => Some(name),
            _ => None,
        }
    }

    /// Returns `true` for literal terms (no free variables, no operators).
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Term::BoolLit(_) | Term::IntLit(_) | Term::RealLit(_) | Term::BitVecLit(_, _)
        )
    }
}

impl From<f64> for Term {
    fn from(value: f64) -> Self {
        Term::RealLit(value)
    }
}

impl From<bool> for Term {
    fn from(value: bool) -> Self {
        Term::BoolLit(value)
    }
}

impl From<&Term> for Term {
    fn from(term: &Term) -> Self {
        term.clone()
    }
}

impl ops::Add for Term {
    type Output = Term;

    fn add(self, rhs: Term) -> Term {
        match self {
            Term::Add(mut terms) => {
                terms.push(rhs);
                Term::Add(terms)
            }
            lhs => Term::Add(vec![lhs, rhs]),
        }
    }
}

impl ops::Add<f64> for Term {
    type Output = Term;

    fn add(self, rhs: f64) -> Term {
        self + Term::RealLit(rhs)
    }
}

impl ops::Sub for Term {
    type Output = Term;

    fn sub(self, rhs: Term) -> Term {
        Term::Sub(Box::new(self), Box::new(rhs))
    }
}

impl ops::Sub<f64> for Term {
    type Output = Term;

    fn sub(self, rhs: f64) -> Term {
        self - Term::RealLit(rhs)
    }
}

impl ops::Mul for Term {
    type Output = Term;

    fn mul(self, rhs: Term) -> Term {
        match self {
            Term::Mul(mut terms) => {
                terms.push(rhs);
                Term::Mul(terms)
            }
            lhs => Term::Mul(vec![lhs, rhs]),
        }
    }
}

impl ops::Mul<f64> for Term {
    type Output = Term;

    fn mul(self, rhs: f64) -> Term {
        self * Term::RealLit(rhs)
    }
}

impl ops::Mul<Term> for f64 {
    type Output = Term;

    fn mul(self, rhs: Term) -> Term {
        Term::RealLit(self) * rhs
    }
}

impl ops::Div for Term {
    type Output = Term;

    fn div(self, rhs: Term) -> Term {
        Term::Div(Box::new(self), Box::new(rhs))
    }
}

impl ops::Div<f64> for Term {
    type Output = Term;

    fn div(self, rhs: f64) -> Term {
        self / Term::RealLit(rhs)
    }
}

impl ops::Neg for Term {
    type Output = Term;

    fn neg(self) -> Term {
        Term::Neg(Box::new(self))
    }
}

impl ops::Not for Term {
    type Output = Term;

    fn not(self) -> Term {
        Term::Not(Box::new(self))
    }
}
