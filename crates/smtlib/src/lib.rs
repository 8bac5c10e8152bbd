//! # symcps-smtlib
//!
//! Solver-agnostic SMT-LIB2 abstract syntax used by the contract engine.
//!
//! Contract predicates produce [`term::Term`] values; backends format them
//! with the `Display` implementations in [`formatter`] (or translate them to a
//! native API) and never leak solver-specific handles upward.

pub mod command;
pub mod formatter;
pub mod script;
pub mod sort;
pub mod term;

pub use command::Command;
pub use script::Script;
pub use sort::Sort;
pub use term::Term;
