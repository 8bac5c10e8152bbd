//! Powertrain physics as contract templates.
//!
//! Lengths are metres, speeds radians per second, torques newton-metres,
//! currents amperes, voltages volts and capacities ampere-hours. Thrust
//! comes out in newtons. Weights are taken as the library lists them, so
//! the lift clause compares them with thrust without any conversion.

use std::f64::consts::TAU;

use symcps_contract::interface::reals;
use symcps_contract::{ContractError, ContractTemplate, Interface, VarEnv};
use symcps_smtlib::Term;

/// Fraction of battery current delivered to the motors.
pub const CONTROLLER_EFFICIENCY: f64 = 0.95;
/// Sea-level air density, kg/m³.
pub const AIR_DENSITY: f64 = 1.225;
/// Battery current drawn by the system, as a multiple of capacity in Ah.
pub const DISCHARGE_PER_AH: f64 = 3600.0 / 400.0;

/// Torque and thrust of a fixed-pitch propeller.
///
/// `upward_ratio` is the share of thrust pointing up (1.0 for a rotor
/// facing straight up).
pub fn propeller(upward_ratio: f64) -> Result<ContractTemplate, ContractError> {
    if !upward_ratio.is_finite() {
        return Err(ContractError::InvalidNumber {
            what: "propeller upward ratio".to_string(),
            value: upward_ratio,
        });
    }
    ContractTemplate::new(
        "Propeller",
        reals(["rho", "omega_prop", "torque_prop", "thrust", "shaft_motor"]),
        reals(["C_p", "C_t", "diameter", "shaft_prop", "W_prop"]),
        |env| {
            Ok(vec![
                env.var("shaft_prop")?.ge(env.var("shaft_motor")?),
                env.var("C_p")?.ge(0.0),
            ])
        },
        move |env| {
            let rho = env.var("rho")?;
            let omega = env.var("omega_prop")?;
            let diameter = env.var("diameter")?;
            let torque = env.var("C_p")? * rho.clone() * omega.clone().pow(2) * diameter.clone().pow(5)
                / TAU.powi(3);
            let thrust = env.var("C_t")? * rho * omega.clone().pow(2) * diameter.pow(4) / TAU.powi(2)
                * upward_ratio;
            Ok(vec![
                env.var("torque_prop")?.equals(torque),
                env.var("thrust")?.equals(thrust),
                omega.ge(0.0),
            ])
        },
    )
}

/// Brushless DC motor: back-EMF and torque from the winding current.
pub fn motor() -> Result<ContractTemplate, ContractError> {
    ContractTemplate::new(
        "Motor",
        reals(["torque_motor", "omega_motor", "I_motor", "V_motor"]),
        reals([
            "I_max_motor",
            "P_max_motor",
            "K_t",
            "K_v",
            "W_motor",
            "R_w",
            "I_idle",
            "shaft_motor",
        ]),
        |env| {
            let current = env.var("I_motor")?;
            Ok(vec![
                (env.var("V_motor")? * current.clone()).lt(env.var("P_max_motor")?),
                current.lt(env.var("I_max_motor")?),
            ])
        },
        |env| {
            let voltage = env.var("V_motor")?;
            let r_w = env.var("R_w")?;
            let back_emf = env.var("omega_motor")? / env.var("K_v")?;
            let drive = voltage.clone() - r_w.clone() * env.var("I_idle")? - back_emf.clone();
            Ok(vec![
                (env.var("I_motor")? * r_w.clone()).equals(voltage - back_emf),
                env.var("torque_motor")?.equals(env.var("K_t")? / r_w * drive),
            ])
        },
    )
}

pub fn battery() -> Result<ContractTemplate, ContractError> {
    ContractTemplate::new(
        "Battery",
        reals(["I_batt"]),
        reals(["capacity", "W_batt", "I_max", "V_battery"]),
        |env| Ok(vec![env.var("I_batt")?.lt(env.var("I_max")?)]),
        |_| Ok(vec![]),
    )
}

/// Controller with one current/voltage port pair per rotor
/// (`I_motor_<i>`, `V_motor_<i>`).
pub fn battery_controller(num_motors: usize) -> Result<ContractTemplate, ContractError> {
    let mut ports = reals(["V_battery", "I_battery"]);
    ports.extend((0..num_motors).map(|i| Interface::real(format!("I_motor_{i}"))));
    ports.extend((0..num_motors).map(|i| Interface::real(format!("V_motor_{i}"))));
    ContractTemplate::new(
        "BatteryController",
        ports,
        vec![],
        move |env| {
            let supply = env.var("V_battery")?;
            (0..num_motors)
                .map(|i| Ok(env.var(&format!("V_motor_{i}"))?.le(supply.clone())))
                .collect()
        },
        move |env| {
            let drawn = Term::sum(indexed(env, "I_motor", num_motors)?);
            Ok(vec![drawn.equals(env.var("I_battery")? * CONTROLLER_EFFICIENCY)])
        },
    )
}

/// Controller feeding `num_motors` identical motors through one port pair.
pub fn battery_controller_simplified(num_motors: usize) -> Result<ContractTemplate, ContractError> {
    let motors = num_motors as f64;
    ContractTemplate::new(
        "BatteryController",
        reals(["V_battery", "I_battery", "V_motor", "I_motor"]),
        vec![],
        |env| Ok(vec![env.var("V_motor")?.le(env.var("V_battery")?)]),
        move |env| {
            Ok(vec![(env.var("I_motor")? * motors)
                .equals(env.var("I_battery")? * CONTROLLER_EFFICIENCY)])
        },
    )
}

/// Airframe aggregate: total thrust must carry total weight, rotors share
/// the load by `motor_ratio`.
///
/// Every relation is guaranteed, so the sums are pinned in any behavior.
/// This is the form used when searching for a selection.
pub fn system(num_motors: usize, motor_ratio: Vec<f64>, body_weight: f64) -> Result<ContractTemplate, ContractError> {
    ContractTemplate::new(
        "System",
        system_ports(num_motors),
        vec![],
        |env| Ok(vec![battery_draw(env)?]),
        move |env| {
            let mut clauses = airframe(env, num_motors, &motor_ratio, body_weight)?;
            clauses.push(lift(env)?);
            Ok(clauses)
        },
    )
}

/// The aggregate as a requirement on a composed design: the sums, the
/// rotor balance and the battery draw are assumed, only `thrust_sum >=
/// weight_sum` is promised.
pub fn system_requirement(
    num_motors: usize,
    motor_ratio: Vec<f64>,
    body_weight: f64,
) -> Result<ContractTemplate, ContractError> {
    ContractTemplate::new(
        "SystemRequirement",
        system_ports(num_motors),
        vec![],
        move |env| {
            let mut clauses = vec![battery_draw(env)?];
            clauses.extend(airframe(env, num_motors, &motor_ratio, body_weight)?);
            Ok(clauses)
        },
        |env| Ok(vec![lift(env)?]),
    )
}

fn system_ports(num_motors: usize) -> Vec<Interface> {
    let mut ports = reals(["rho", "thrust_sum", "weight_sum", "I_battery", "batt_capacity", "W_batt"]);
    for prefix in ["W_motor", "W_prop", "thrust_prop"] {
        ports.extend((0..num_motors).map(|i| Interface::real(format!("{prefix}_{i}"))));
    }
    ports
}

fn battery_draw(env: &VarEnv) -> Result<Term, ContractError> {
    Ok(env
        .var("I_battery")?
        .equals(env.var("batt_capacity")? * DISCHARGE_PER_AH))
}

fn lift(env: &VarEnv) -> Result<Term, ContractError> {
    Ok(env.var("thrust_sum")?.ge(env.var("weight_sum")?))
}

/// Balance between neighbouring rotors, then the thrust and weight sums
/// and the air density.
fn airframe(env: &VarEnv, num_motors: usize, motor_ratio: &[f64], body_weight: f64) -> Result<Vec<Term>, ContractError> {
    let thrusts = indexed(env, "thrust_prop", num_motors)?;
    let mut clauses: Vec<Term> = thrusts
        .windows(2)
        .zip(motor_ratio.windows(2))
        .map(|(t, r)| (t[0].clone() * r[0]).equals(t[1].clone() * r[1]))
        .collect();

    let weights = std::iter::once(env.var("W_batt")?)
        .chain(std::iter::once(Term::real(body_weight)))
        .chain(indexed(env, "W_prop", num_motors)?)
        .chain(indexed(env, "W_motor", num_motors)?);
    clauses.push(env.var("thrust_sum")?.equals(Term::sum(thrusts)));
    clauses.push(env.var("weight_sum")?.equals(Term::sum(weights)));
    clauses.push(env.var("rho")?.equals(AIR_DENSITY));
    Ok(clauses)
}

fn indexed(env: &VarEnv, prefix: &str, count: usize) -> Result<Vec<Term>, ContractError> {
    (0..count).map(|i| env.var(&format!("{prefix}_{i}"))).collect()
}
