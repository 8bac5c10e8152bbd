//! A complete powertrain wired from the domain contracts, and the
//! selection and verification entry points built on it.
//!
//! Each rotor `i` is a `propeller_<i>` driven by `motor_<i>`. All motors
//! draw from one `battery_controller` fed by one `battery`. The airframe
//! aggregate `system` sums thrust and weight over every part.

use serde::{Deserialize, Serialize};
use symcps_contract::report;
use symcps_contract::{
    Candidate, ConnectionMap, ContractError, ContractInstance, ContractSystem, ContractTemplate,
    OptimizationResult, OptimizeConfig, Outcome, Selection, Verdict,
};
use symcps_solver::SolverBackend;

use crate::contracts;
use crate::error::UavError;
use crate::library::{ComponentKind, Library};
use crate::topology::Topology;

pub const BATTERY: &str = "battery";
pub const CONTROLLER: &str = "battery_controller";
pub const SYSTEM: &str = "system";

pub fn propeller_name(rotor: usize) -> String {
    format!("propeller_{rotor}")
}

pub fn motor_name(rotor: usize) -> String {
    format!("motor_{rotor}")
}

/// Concrete parts of a design, one propeller and one motor per rotor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Design {
    pub propellers: Vec<Candidate>,
    pub motors: Vec<Candidate>,
    pub battery: Candidate,
}

impl Design {
    /// The same propeller and motor on every rotor.
    pub fn uniform(topology: &Topology, propeller: Candidate, motor: Candidate, battery: Candidate) -> Self {
        Self {
            propellers: vec![propeller; topology.num_motors],
            motors: vec![motor; topology.num_motors],
            battery,
        }
    }

    /// Look the parts up by id and convert them.
    pub fn from_library(
        library: &Library,
        topology: &Topology,
        propellers: &[&str],
        motors: &[&str],
        battery: &str,
    ) -> Result<Self, UavError> {
        let convert = |id: &str, kind: ComponentKind| -> Result<Candidate, UavError> {
            library
                .get(id)
                .ok_or_else(|| UavError::UnknownComponent(id.to_string()))?
                .to_candidate_of(kind, topology.num_batteries)
        };
        Ok(Self {
            propellers: propellers
                .iter()
                .map(|id| convert(id, ComponentKind::Propeller))
                .collect::<Result<_, _>>()?,
            motors: motors
                .iter()
                .map(|id| convert(id, ComponentKind::Motor))
                .collect::<Result<_, _>>()?,
            battery: convert(battery, ComponentKind::Battery)?,
        })
    }

    /// Propeller and motor ids of one rotor.
    pub fn rotor(&self, index: usize) -> Option<(&str, &str)> {
        let propeller = self.propellers.get(index)?;
        let motor = self.motors.get(index)?;
        Some((propeller.id.as_str(), motor.id.as_str()))
    }
}

/// Candidate lists offered for search. Every rotor gets the full
/// propeller and motor lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalogs {
    pub propellers: Vec<Candidate>,
    pub motors: Vec<Candidate>,
    pub batteries: Vec<Candidate>,
}

impl Catalogs {
    pub fn from_library(library: &Library, topology: &Topology) -> Result<Self, UavError> {
        let cells = topology.num_batteries;
        Ok(Self {
            propellers: library.candidates(ComponentKind::Propeller, cells)?,
            motors: library.candidates(ComponentKind::Motor, cells)?,
            batteries: library.candidates(ComponentKind::Battery, cells)?,
        })
    }
}

/// How one occurrence enters the system.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Fixed(Candidate),
    Select(Vec<Candidate>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parts {
    pub propellers: Vec<Part>,
    pub motors: Vec<Part>,
    pub battery: Part,
}

impl Parts {
    pub fn fixed(design: &Design) -> Self {
        Self {
            propellers: design.propellers.iter().cloned().map(Part::Fixed).collect(),
            motors: design.motors.iter().cloned().map(Part::Fixed).collect(),
            battery: Part::Fixed(design.battery.clone()),
        }
    }

    pub fn catalog(catalogs: &Catalogs, topology: &Topology) -> Self {
        Self {
            propellers: vec![Part::Select(catalogs.propellers.clone()); topology.num_motors],
            motors: vec![Part::Select(catalogs.motors.clone()); topology.num_motors],
            battery: Part::Select(catalogs.batteries.clone()),
        }
    }
}

enum Aggregate {
    /// `system` is a registered instance carrying the objective.
    Registered,
    /// `system` is checked against the subsystems per query.
    Query {
        instance: ContractInstance,
        connections: ConnectionMap,
    },
}

pub struct Powertrain<B: SolverBackend> {
    contracts: ContractSystem<B>,
    topology: Topology,
    aggregate: Aggregate,
    /// Print colored metrics to stderr after queries.
    verbose: bool,
}

impl<B: SolverBackend> Powertrain<B> {
    /// Register every part and the aggregate, and maximize
    /// `thrust_sum - weight_sum` from `lower_bound` up.
    pub fn for_search(backend: B, topology: &Topology, parts: Parts, lower_bound: f64) -> Result<Self, UavError> {
        let mut system = subsystems(backend, topology, parts)?;
        let aggregate = contracts::system(
            topology.num_motors,
            topology.motor_ratio.clone(),
            topology.body_weight,
        )?;
        system.add_instance(aggregate.instantiate(SYSTEM, None)?)?;
        for (instance, pairs) in aggregate_links(topology.num_motors).iter() {
            system.compose(SYSTEM, instance, pairs.iter().map(|(a, b)| (a.as_str(), b.as_str())))?;
        }

        let sys = system.instance(SYSTEM)?;
        let margin = sys.get_port_var("thrust_sum")?.clone() - sys.get_port_var("weight_sum")?.clone();
        system.set_objective(margin, lower_bound, None)?;

        Ok(Self {
            contracts: system,
            topology: topology.clone(),
            aggregate: Aggregate::Registered,
            verbose: false,
        })
    }

    /// Fix every part to `design` and keep the aggregate as a requirement
    /// for refinement checks.
    pub fn for_verification(backend: B, topology: &Topology, design: &Design) -> Result<Self, UavError> {
        let system = subsystems(backend, topology, Parts::fixed(design))?;
        let requirement = contracts::system_requirement(
            topology.num_motors,
            topology.motor_ratio.clone(),
            topology.body_weight,
        )?;
        Ok(Self {
            contracts: system,
            topology: topology.clone(),
            aggregate: Aggregate::Query {
                instance: requirement.instantiate(SYSTEM, None)?,
                connections: aggregate_links(topology.num_motors),
            },
            verbose: false,
        })
    }

    /// Print per-instance metrics of satisfying and violating models, and
    /// optimization summaries.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn contracts(&self) -> &ContractSystem<B> {
        &self.contracts
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Is there a behavior meeting every contract?
    pub fn find_behavior(&mut self) -> Result<Outcome, UavError> {
        let outcome = match &mut self.aggregate {
            Aggregate::Registered => self.contracts.solve()?,
            Aggregate::Query {
                instance,
                connections,
            } => self.contracts.find_behavior(instance, connections)?,
        };
        if self.verbose && outcome.is_sat() {
            report::print_report(&self.contracts.report()?);
        }
        Ok(outcome)
    }

    /// Does the composed design meet the airframe requirement?
    pub fn verify(&mut self) -> Result<Verdict, UavError> {
        let verdict = match &mut self.aggregate {
            Aggregate::Registered => return Err(UavError::NotVerifiable),
            Aggregate::Query {
                instance,
                connections,
            } => self.contracts.check_refinement(instance, connections)?,
        };
        if let Verdict::Violated(report) = &verdict {
            tracing::debug!("counterexample:\n{report}");
            if self.verbose {
                report::print_report(report);
            }
        }
        Ok(verdict)
    }

    pub fn optimize(&mut self, config: &OptimizeConfig) -> Result<OptimizationResult, UavError> {
        let result = self.contracts.solve_optimize(config)?;
        if self.verbose {
            report::print_optimization(&result);
        }
        Ok(result)
    }

    /// `thrust_sum - weight_sum` in the last model.
    pub fn objective_value(&self) -> Result<f64, UavError> {
        Ok(self.contracts.objective_value()?)
    }

    /// Per-rotor parts: fixed candidates as built, selectable ones from
    /// `selection`.
    pub fn design(&self, selection: &Selection) -> Result<Design, UavError> {
        let pick = |name: &str| -> Result<Candidate, UavError> {
            let instance = self.contracts.instance(name)?;
            instance
                .fixed_candidate()
                .or_else(|| selection.get(name))
                .cloned()
                .ok_or_else(|| {
                    UavError::from(ContractError::SelectionInconsistent {
                        instance: name.to_string(),
                        selected: 0,
                    })
                })
        };
        let rotors = 0..self.topology.num_motors;
        Ok(Design {
            propellers: rotors
                .clone()
                .map(|i| pick(&propeller_name(i)))
                .collect::<Result<_, _>>()?,
            motors: rotors.map(|i| pick(&motor_name(i))).collect::<Result<_, _>>()?,
            battery: pick(BATTERY)?,
        })
    }
}

/// Objective of a concrete design, `None` when it cannot fly.
pub fn check_selection<B: SolverBackend>(
    backend: B,
    topology: &Topology,
    design: &Design,
) -> Result<Option<f64>, UavError> {
    let mut powertrain = Powertrain::for_search(backend, topology, Parts::fixed(design), 0.0)?;
    match powertrain.find_behavior()? {
        Outcome::Sat => {
            let objective = powertrain.objective_value()?;
            tracing::info!(objective, "design is feasible");
            Ok(Some(objective))
        }
        Outcome::Unsat => {
            tracing::info!("design is infeasible");
            Ok(None)
        }
        Outcome::Unknown(reason) => {
            tracing::warn!(%reason, "design check inconclusive");
            Ok(None)
        }
    }
}

/// Refinement verdict of a concrete design against the airframe
/// requirement.
pub fn verify<B: SolverBackend>(backend: B, topology: &Topology, design: &Design) -> Result<Verdict, UavError> {
    Powertrain::for_verification(backend, topology, design)?.verify()
}

/// Result of a catalog search.
#[derive(Debug, Clone, PartialEq)]
pub struct Selected {
    pub result: OptimizationResult,
    /// Parts of the best solution, if any.
    pub design: Option<Design>,
}

/// Search the catalogs for the design with the largest thrust margin, at
/// least `lower_bound`.
pub fn select<B: SolverBackend>(
    backend: B,
    topology: &Topology,
    catalogs: &Catalogs,
    lower_bound: f64,
    config: &OptimizeConfig,
) -> Result<Selected, UavError> {
    let mut powertrain = Powertrain::for_search(backend, topology, Parts::catalog(catalogs, topology), lower_bound)?;
    let result = powertrain.optimize(config)?;
    let design = result
        .best
        .as_ref()
        .map(|best| powertrain.design(&best.selection))
        .transpose()?;
    if let Some(design) = &design {
        for (i, (propeller, motor)) in design.propellers.iter().zip(&design.motors).enumerate() {
            tracing::debug!(rotor = i, propeller = %propeller.id, motor = %motor.id, "selected rotor");
        }
        tracing::debug!(battery = %design.battery.id, "selected battery");
    }
    Ok(Selected { result, design })
}

/// Search for a design at least as good as `current`. The current design
/// is checked first on its own backend; its margin seeds the search bound.
pub fn improve<B, F>(
    mut new_backend: F,
    topology: &Topology,
    catalogs: &Catalogs,
    current: &Design,
    config: &OptimizeConfig,
) -> Result<Selected, UavError>
where
    B: SolverBackend,
    F: FnMut() -> B,
{
    let baseline = check_selection(new_backend(), topology, current)?;
    tracing::info!(?baseline, "current design");
    select(new_backend(), topology, catalogs, baseline.unwrap_or(0.0), config)
}

fn subsystems<B: SolverBackend>(backend: B, topology: &Topology, parts: Parts) -> Result<ContractSystem<B>, UavError> {
    topology.validate()?;
    for (kind, actual) in [
        (ComponentKind::Propeller, parts.propellers.len()),
        (ComponentKind::Motor, parts.motors.len()),
    ] {
        if actual != topology.num_motors {
            return Err(UavError::CountMismatch {
                kind,
                expected: topology.num_motors,
                actual,
            });
        }
    }

    let mut system = ContractSystem::new(backend);
    let propeller = contracts::propeller(1.0)?;
    let motor = contracts::motor()?;
    for (i, (prop_part, motor_part)) in parts.propellers.into_iter().zip(parts.motors).enumerate() {
        let (prop_name, motor_name) = (propeller_name(i), motor_name(i));
        add_part(&mut system, &propeller, &prop_name, prop_part)?;
        add_part(&mut system, &motor, &motor_name, motor_part)?;
        system.compose(
            &prop_name,
            &motor_name,
            [
                ("torque_prop", "torque_motor"),
                ("omega_prop", "omega_motor"),
                ("shaft_motor", "shaft_motor"),
            ],
        )?;
    }

    add_part(&mut system, &contracts::battery()?, BATTERY, parts.battery)?;
    let controller = contracts::battery_controller(topology.num_motors)?;
    system.add_instance(controller.instantiate(CONTROLLER, Some(Candidate::new("BatteryController")))?)?;

    for i in 0..topology.num_motors {
        system.compose(
            &motor_name(i),
            CONTROLLER,
            [
                ("I_motor".to_string(), format!("I_motor_{i}")),
                ("V_motor".to_string(), format!("V_motor_{i}")),
            ],
        )?;
    }
    system.compose(BATTERY, CONTROLLER, [("I_batt", "I_battery"), ("V_battery", "V_battery")])?;

    tracing::debug!(
        rotors = topology.num_motors,
        batteries = topology.num_batteries,
        concrete = system.is_concrete(),
        "built powertrain"
    );
    Ok(system)
}

fn add_part<B: SolverBackend>(
    system: &mut ContractSystem<B>,
    template: &ContractTemplate,
    name: &str,
    part: Part,
) -> Result<(), UavError> {
    match part {
        Part::Fixed(candidate) => system.add_instance(template.instantiate(name, Some(candidate))?)?,
        Part::Select(candidates) => {
            system.add_instance(template.instantiate(name, None)?)?;
            system.set_selection(name, &candidates)?;
        }
    }
    Ok(())
}

/// `(aggregate field, part field)` links from `system` to every part.
fn aggregate_links(num_motors: usize) -> ConnectionMap {
    let mut links = ConnectionMap::new();
    for i in 0..num_motors {
        links.add(
            propeller_name(i),
            [
                (format!("W_prop_{i}"), "W_prop".to_string()),
                (format!("thrust_prop_{i}"), "thrust".to_string()),
                ("rho".to_string(), "rho".to_string()),
            ],
        );
        links.add(motor_name(i), [(format!("W_motor_{i}"), "W_motor")]);
    }
    links.add(
        BATTERY,
        [
            ("W_batt", "W_batt"),
            ("I_battery", "I_batt"),
            ("batt_capacity", "capacity"),
        ],
    );
    links
}
