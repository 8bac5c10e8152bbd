//! Component library records and their conversion into catalog candidates.
//!
//! Records carry datasheet figures in datasheet units (millimetres,
//! milliohms, rpm per volt, milliamp-hours). Conversion rescales them to
//! the SI quantities the contracts are written in. Propeller records carry
//! the power and thrust coefficients already looked up at the operating
//! point (`C_P`, `C_T`).

use std::collections::BTreeMap;
use std::f64::consts::TAU;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use symcps_contract::Candidate;

use crate::error::UavError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentKind {
    Propeller,
    Motor,
    Battery,
    BatteryController,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentKind::Propeller => "Propeller",
            ComponentKind::Motor => "Motor",
            ComponentKind::Battery => "Battery",
            ComponentKind::BatteryController => "BatteryController",
        };
        f.write_str(name)
    }
}

/// One datasheet entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryComponent {
    pub id: String,
    pub kind: ComponentKind,
    #[serde(default)]
    pub properties: BTreeMap<String, f64>,
}

impl LibraryComponent {
    pub fn new(id: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            id: id.into(),
            kind,
            properties: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    fn field(&self, name: &str) -> Result<f64, UavError> {
        self.properties
            .get(name)
            .copied()
            .ok_or_else(|| UavError::MissingField {
                component: self.id.clone(),
                field: name.to_string(),
            })
    }

    /// Contract-level candidate. `num_batteries` scales battery capacity
    /// and weight for a pack of identical cells.
    pub fn to_candidate(&self, num_batteries: usize) -> Result<Candidate, UavError> {
        let candidate = Candidate::new(self.id.clone());
        let candidate = match self.kind {
            ComponentKind::Propeller => candidate
                .with("C_p", self.field("C_P")?)
                .with("C_t", self.field("C_T")?)
                .with("diameter", self.field("DIAMETER")? / 1000.0)
                .with("shaft_prop", self.field("SHAFT_DIAMETER")?)
                .with("W_prop", self.field("WEIGHT")?),
            ComponentKind::Motor => candidate
                .with("R_w", self.field("INTERNAL_RESISTANCE")? / 1000.0)
                .with("K_t", self.field("KT")?)
                .with("K_v", self.field("KV")? * TAU / 60.0)
                .with("I_idle", self.field("IO_IDLE_CURRENT_10V")?)
                .with("W_motor", self.field("WEIGHT")?)
                .with("I_max_motor", self.field("MAX_CURRENT")?)
                .with("P_max_motor", self.field("MAX_POWER")?)
                .with("shaft_motor", self.field("SHAFT_DIAMETER")?),
            ComponentKind::Battery => {
                let cells = num_batteries as f64;
                let capacity = self.field("CAPACITY")? * cells / 1000.0;
                candidate
                    .with("capacity", capacity)
                    .with("W_batt", self.field("WEIGHT")? * cells)
                    .with("V_battery", self.field("VOLTAGE")?)
                    .with("I_max", self.field("CONT_DISCHARGE_RATE")? * capacity)
            }
            ComponentKind::BatteryController => candidate,
        };
        Ok(candidate)
    }

    /// Like `to_candidate`, failing unless the record is of `kind`.
    pub fn to_candidate_of(&self, kind: ComponentKind, num_batteries: usize) -> Result<Candidate, UavError> {
        if self.kind != kind {
            return Err(UavError::WrongKind {
                component: self.id.clone(),
                expected: kind,
                actual: self.kind,
            });
        }
        self.to_candidate(num_batteries)
    }
}

/// A set of library records, in file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Library {
    pub components: Vec<LibraryComponent>,
}

impl Library {
    pub fn new(components: Vec<LibraryComponent>) -> Self {
        Self { components }
    }

    /// Parse a JSON array of records.
    pub fn from_json(text: &str) -> Result<Self, UavError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, UavError> {
        let text = std::fs::read_to_string(path).map_err(|source| UavError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let library = Self::from_json(&text)?;
        tracing::debug!(path = %path.display(), components = library.components.len(), "loaded component library");
        Ok(library)
    }

    pub fn get(&self, id: &str) -> Option<&LibraryComponent> {
        self.components.iter().find(|c| c.id == id)
    }

    pub fn of_kind(&self, kind: ComponentKind) -> impl Iterator<Item = &LibraryComponent> {
        self.components.iter().filter(move |c| c.kind == kind)
    }

    /// Every record of `kind`, converted. Fails on an empty result.
    pub fn candidates(&self, kind: ComponentKind, num_batteries: usize) -> Result<Vec<Candidate>, UavError> {
        let candidates = self
            .of_kind(kind)
            .map(|c| c.to_candidate(num_batteries))
            .collect::<Result<Vec<_>, _>>()?;
        if candidates.is_empty() {
            return Err(UavError::NoCandidates(kind));
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn motor() -> LibraryComponent {
        LibraryComponent::new("M1", ComponentKind::Motor)
            .with("INTERNAL_RESISTANCE", 50.0)
            .with("KT", 0.02)
            .with("KV", 600.0)
            .with("IO_IDLE_CURRENT_10V", 0.5)
            .with("WEIGHT", 1.0)
            .with("MAX_CURRENT", 30.0)
            .with("MAX_POWER", 500.0)
            .with("SHAFT_DIAMETER", 5.0)
    }

    fn battery(capacity: f64) -> LibraryComponent {
        LibraryComponent::new("B1", ComponentKind::Battery)
            .with("CAPACITY", capacity)
            .with("WEIGHT", 2.0)
            .with("VOLTAGE", 11.1)
            .with("CONT_DISCHARGE_RATE", 20.0)
    }

    #[test]
    fn motor_units() {
        let c = motor().to_candidate(1).unwrap();
        assert_eq!(c.real("R_w"), Some(0.05));
        assert!((c.real("K_v").unwrap() - 20.0 * std::f64::consts::PI).abs() < 1e-12);
        assert_eq!(c.real("shaft_motor"), Some(5.0));
        assert_eq!(c.properties.len(), 8);
    }

    #[test]
    fn propeller_units() {
        let prop = LibraryComponent::new("P1", ComponentKind::Propeller)
            .with("C_P", 0.06)
            .with("C_T", 0.12)
            .with("DIAMETER", 300.0)
            .with("SHAFT_DIAMETER", 6.0)
            .with("WEIGHT", 1.0);
        let c = prop.to_candidate(1).unwrap();
        assert_eq!(c.real("diameter"), Some(0.3));
        assert_eq!(c.real("C_t"), Some(0.12));
    }

    #[test]
    fn battery_pack_scaling() {
        let c = battery(5000.0).to_candidate(2).unwrap();
        assert_eq!(c.real("capacity"), Some(10.0));
        assert_eq!(c.real("W_batt"), Some(4.0));
        assert_eq!(c.real("I_max"), Some(200.0));
        assert_eq!(c.real("V_battery"), Some(11.1));
    }

    #[test]
    fn missing_field_is_named() {
        let err = LibraryComponent::new("M0", ComponentKind::Motor).to_candidate(1).unwrap_err();
        assert!(matches!(err, UavError::MissingField { ref field, .. } if field == "INTERNAL_RESISTANCE"));
    }

    #[test]
    fn kind_checked_conversion() {
        let err = motor().to_candidate_of(ComponentKind::Battery, 1).unwrap_err();
        assert!(matches!(
            err,
            UavError::WrongKind { expected: ComponentKind::Battery, actual: ComponentKind::Motor, .. }
        ));
    }

    #[test]
    fn library_json() {
        let library = Library::from_json(
            r#"[
                {"id": "B1", "kind": "Battery",
                 "properties": {"CAPACITY": 1000, "WEIGHT": 2, "VOLTAGE": 11.1, "CONT_DISCHARGE_RATE": 20}},
                {"id": "ESC", "kind": "BatteryController"}
            ]"#,
        )
        .unwrap();
        assert_eq!(library.components.len(), 2);
        assert_eq!(library.get("ESC").map(|c| c.kind), Some(ComponentKind::BatteryController));
        let batteries = library.candidates(ComponentKind::Battery, 1).unwrap();
        assert_eq!(batteries[0].real("I_max"), Some(20.0));
        assert!(matches!(
            library.candidates(ComponentKind::Motor, 1),
            Err(UavError::NoCandidates(ComponentKind::Motor))
        ));
        assert!(Library::from_json("{").is_err());
    }

    proptest! {
        #[test]
        fn pack_capacity_scales_with_cells(capacity in 100.0f64..20000.0, cells in 1usize..8) {
            let single = battery(capacity).to_candidate(1).unwrap();
            let pack = battery(capacity).to_candidate(cells).unwrap();
            let n = cells as f64;
            let scaled = single.real("capacity").unwrap() * n;
            prop_assert!((pack.real("capacity").unwrap() - scaled).abs() <= 1e-9 * scaled);
            prop_assert!((pack.real("I_max").unwrap() - 20.0 * scaled).abs() <= 1e-9 * scaled * 20.0);
        }
    }
}
