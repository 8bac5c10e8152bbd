use serde::{Deserialize, Serialize};

use crate::error::UavError;

/// Part counts and airframe figures of one design.
///
/// Each rotor is one motor driving one propeller. All batteries are wired
/// as a single pack behind one controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub num_motors: usize,
    pub num_batteries: usize,
    /// Per-rotor thrust weighting; `ratio[i] * thrust[i]` is equal across
    /// rotors.
    pub motor_ratio: Vec<f64>,
    #[serde(default)]
    pub body_weight: f64,
}

impl Topology {
    /// Balanced rotors, weightless body.
    pub fn new(num_motors: usize, num_batteries: usize) -> Self {
        Self {
            num_motors,
            num_batteries,
            motor_ratio: vec![1.0; num_motors],
            body_weight: 0.0,
        }
    }

    pub fn with_body_weight(mut self, body_weight: f64) -> Self {
        self.body_weight = body_weight;
        self
    }

    pub fn with_motor_ratio(mut self, motor_ratio: Vec<f64>) -> Self {
        self.motor_ratio = motor_ratio;
        self
    }

    pub fn validate(&self) -> Result<(), UavError> {
        if self.num_motors == 0 {
            return Err(UavError::Topology("at least one rotor is required".to_string()));
        }
        if self.num_batteries == 0 {
            return Err(UavError::Topology("at least one battery is required".to_string()));
        }
        if self.motor_ratio.len() != self.num_motors {
            return Err(UavError::Topology(format!(
                "{} motor ratios for {} rotors",
                self.motor_ratio.len(),
                self.num_motors
            )));
        }
        if let Some(r) = self.motor_ratio.iter().find(|r| !r.is_finite() || **r <= 0.0) {
            return Err(UavError::Topology(format!("motor ratio {r} is not positive")));
        }
        if !self.body_weight.is_finite() || self.body_weight < 0.0 {
            return Err(UavError::Topology(format!(
                "body weight {} is not a non-negative number",
                self.body_weight
            )));
        }
        Ok(())
    }
}
