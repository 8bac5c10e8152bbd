//! # symcps-contract
//!
//! Assume/guarantee contracts over named ports and properties, composed into
//! a system and checked with an SMT backend.
//!
//! A [`ContractTemplate`] describes one kind of subsystem. Each physical
//! occurrence is a [`ContractInstance`], either fixed to a catalog
//! [`Candidate`] or left selectable. A [`ContractSystem`] owns the instances
//! and the backend, equates ports between instances, encodes "pick exactly
//! one candidate" groups, and answers refinement, behavior and optimization
//! queries.

pub mod candidate;
pub mod error;
pub mod instance;
pub mod interface;
pub mod objective;
pub mod report;
pub mod system;
pub mod template;

pub use candidate::{Candidate, PropertyValue};
pub use error::ContractError;
pub use instance::{ContractInstance, VarEnv};
pub use interface::Interface;
pub use objective::{
    Evaluator, Objective, OptimizationResult, OptimizeConfig, Selection, Solution, StopReason,
};
pub use report::{InstanceReport, Report};
pub use system::{ConnectionMap, ContractSystem, Outcome, Verdict};
pub use template::{ContractTemplate, Predicate};
