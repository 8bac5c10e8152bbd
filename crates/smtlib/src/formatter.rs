//! SMT-LIB2 text formatting for AST types.
//!
//! Implements `Display` for [`Sort`], [`Term`], [`Command`], and [`Script`],
//! producing SMT-LIB2 output accepted by Z3, CVC5 and Yices.

use std::fmt;

use crate::command::Command;
use crate::script::Script;
use crate::sort::Sort;
use crate::term::Term;

// ---------------------------------------------------------------------------
// Sort
// ---------------------------------------------------------------------------

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Bool => write!(f, "Bool"),
            Sort::Int => write!(f, "Int"),
            Sort::Real => write!(f, "Real"),
            Sort::BitVec(width) => write!(f, "(_ BitVec {width})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Symbols and literals
// ---------------------------------------------------------------------------

const SYMBOL_PUNCTUATION: &str = "~!@$%^&*_-+=<>.?/";

/// Returns `true` if `name` can be written as an unquoted SMT-LIB symbol.
pub fn is_simple_symbol(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        None => false,
        Some(first) if first.is_ascii_digit() => false,
        Some(first) => std::iter::once(first)
            .chain(chars)
            .all(|c| c.is_ascii_alphanumeric() || SYMBOL_PUNCTUATION.contains(c)),
    }
}

/// Write a symbol, quoting it as `|...|` when it is not a simple symbol.
/// `|` and `\` cannot appear inside a quoted symbol and are dropped;
/// backends refuse to declare such names.
fn fmt_symbol(name: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if is_simple_symbol(name) {
        write!(f, "{name}")
    } else {
        let cleaned: String = name.chars().filter(|c| *c != '|' && *c != '\\').collect();
        write!(f, "|{cleaned}|")
    }
}

/// Render a finite `f64` as an SMT-LIB decimal. `Display` for `f64` never
/// uses exponent notation, so the result is the exact shortest decimal.
pub fn real_literal(value: f64) -> String {
    let magnitude = value.abs().to_string();
    let decimal = if magnitude.contains('.') {
        magnitude
    } else {
        format!("{magnitude}.0")
    };
    if value.is_sign_negative() {
        format!("(- {decimal})")
    } else {
        decimal
    }
}

/// Format a bitvector literal. Negative values are converted to their
/// two's-complement unsigned representation for the given bit-width.
fn fmt_bv_lit(value: i128, width: u32, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let unsigned = if value < 0 {
        let mask = if width >= 128 { u128::MAX } else { (1u128 << width) - 1 };
        (value as u128) & mask
    } else {
        value as u128
    };
    write!(f, "(_ bv{unsigned} {width})")
}

// ---------------------------------------------------------------------------
// Term
// ---------------------------------------------------------------------------

fn fmt_binop(op: &str, lhs: &Term, rhs: &Term, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "({op} {lhs} {rhs})")
}

fn fmt_unop(op: &str, arg: &Term, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "({op} {arg})")
}

/// Write an n-ary application, or `empty` when there are no operands.
fn fmt_nary(op: &str, terms: &[Term], empty: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if terms.is_empty() {
        return write!(f, "{empty}");
    }
    write!(f, "({op}")?;
    for t in terms {
        write!(f, " {t}")?;
    }
    write!(f, ")")
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // --- Literals ---
            Term::BoolLit(true) => write!(f, "true"),
            Term::BoolLit(false) => write!(f, "false"),
            Term::IntLit(n) => {
                if *n < 0 {
                    // SMT-LIB represents negative integers as `(- N)`
                    write!(f, "(- {})", n.unsigned_abs())
                } else {
                    write!(f, "{n}")
                }
            }
            Term::RealLit(value) => write!(f, "{}", real_literal(*value)),
            Term::BitVecLit(value, width) => fmt_bv_lit(*value, *width, f),

            Term::Const(name) => fmt_symbol(name, f),

            // --- Boolean operations ---
            Term::Not(inner) => fmt_unop("not", inner, f),
            Term::And(terms) => fmt_nary("and", terms, "true", f),
            Term::Or(terms) => fmt_nary("or", terms, "false", f),
            Term::Implies(lhs, rhs) => fmt_binop("=>", lhs, rhs, f),

            // --- Core ---
            Term::Eq(lhs, rhs) => fmt_binop("=", lhs, rhs, f),
            Term::Distinct(terms) => fmt_nary("distinct", terms, "true", f),
            Term::Ite(cond, then_branch, else_branch) => {
                write!(f, "(ite {cond} {then_branch} {else_branch})")
            }

            // --- Arithmetic ---
            Term::Add(terms) => fmt_nary("+", terms, "0.0", f),
            Term::Sub(a, b) => fmt_binop("-", a, b, f),
            Term::Mul(terms) => fmt_nary("*", terms, "1.0", f),
            Term::Div(a, b) => fmt_binop("/", a, b, f),
            Term::Neg(a) => fmt_unop("-", a, f),
            Term::ToReal(a) => fmt_unop("to_real", a, f),
            Term::Lt(a, b) => fmt_binop("<", a, b, f),
            Term::Le(a, b) => fmt_binop("<=", a, b, f),
            Term::Gt(a, b) => fmt_binop(">", a, b, f),
            Term::Ge(a, b) => fmt_binop(">=", a, b, f),

            // --- Bitvector ---
            Term::BvAdd(a, b) => fmt_binop("bvadd", a, b, f),
            Term::BvSub(a, b) => fmt_binop("bvsub", a, b, f),
            Term::BvMul(a, b) => fmt_binop("bvmul", a, b, f),
            Term::BvULt(a, b) => fmt_binop("bvult", a, b, f),
            Term::BvULe(a, b) => fmt_binop("bvule", a, b, f),
            Term::BvUGt(a, b) => fmt_binop("bvugt", a, b, f),
            Term::BvUGe(a, b) => fmt_binop("bvuge", a, b, f),
        }
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetLogic(logic) => write!(f, "(set-logic {logic})"),
            Command::SetOption(key, value) => write!(f, "(set-option :{key} {value})"),
            Command::DeclareConst(name, sort) => {
                write!(f, "(declare-const ")?;
                fmt_symbol(name, f)?;
                write!(f, " {sort})")
            }
            Command::Assert(term) => write!(f, "(assert {term})"),
            Command::CheckSat => write!(f, "(check-sat)"),
            Command::GetValue(terms) => {
                write!(f, "(get-value (")?;
                for (i, t) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, "))")
            }
            Command::Exit => write!(f, "(exit)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cmd in self.commands() {
            writeln!(f, "{cmd}")?;
        }
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
