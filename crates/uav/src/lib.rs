//! # symcps-uav
//!
//! Multirotor powertrain contracts on top of `symcps-contract`: propeller,
//! motor, battery, battery controller and airframe templates, conversion of
//! datasheet records into catalog candidates, and the wiring used to check
//! a concrete design or search a catalog for the best one.

pub mod contracts;
pub mod error;
pub mod library;
pub mod powertrain;
pub mod topology;

pub use error::UavError;
pub use library::{ComponentKind, Library, LibraryComponent};
pub use powertrain::{
    Catalogs, Design, Part, Parts, Powertrain, Selected, check_selection, improve, select, verify,
};
pub use topology::Topology;
