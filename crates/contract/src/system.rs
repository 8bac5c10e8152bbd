//! A composed design: contract instances, the connections between them,
//! selection groups, and the queries run against one solver session.
//!
//! Every query opens a solver scope, asserts the clauses it needs, checks
//! and pops. Declarations, composition equalities, selection encodings,
//! environment constraints and the objective's lower bound are permanent.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use symcps_smtlib::{Sort, Term};
use symcps_solver::{SolverBackend, SolverResult, Value};

use crate::candidate::Candidate;
use crate::error::ContractError;
use crate::instance::ContractInstance;
use crate::interface::Interface;
use crate::objective::{
    Evaluator, Objective, OptimizationResult, OptimizeConfig, Selection, Solution, StopReason,
};
use crate::report::{InstanceReport, Report};

/// Result of a satisfiability query.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Sat,
    Unsat,
    /// The solver gave up; the reason is `"timeout"` when the budget ran out.
    Unknown(String),
}

impl Outcome {
    /// Returns `true` if a consistent behavior was found.
    pub fn is_sat(&self) -> bool {
        matches!(self, Outcome::Sat)
    }

    /// Returns `true` if no behavior exists.
    pub fn is_unsat(&self) -> bool {
        matches!(self, Outcome::Unsat)
    }

    fn from_result(result: &SolverResult) -> Self {
        match result {
            SolverResult::Sat(_) => Outcome::Sat,
            SolverResult::Unsat => Outcome::Unsat,
            SolverResult::Unknown(reason) => Outcome::Unknown(reason.clone()),
        }
    }
}

/// Result of a refinement check.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// No behavior of the composition violates the system contract.
    Holds,
    /// A counterexample exists; the report shows its values.
    Violated(Report),
    /// The solver could not decide, e.g. on timeout.
    Unknown(String),
}

impl Verdict {
    /// Returns `true` only for a proven refinement.
    pub fn holds(&self) -> bool {
        matches!(self, Verdict::Holds)
    }
}

/// Port pairs linking a system-level instance to the subsystem instances.
///
/// Each entry maps one registered instance to `(system port, instance port)`
/// pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionMap {
    links: Vec<(String, Vec<(String, String)>)>,
}

impl ConnectionMap {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`ConnectionMap::add`].
    pub fn connect<I, A, B>(mut self, instance: impl Into<String>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        self.add(instance, pairs);
        self
    }

    /// Link `instance` with `(system field, instance field)` pairs.
    pub fn add<I, A, B>(&mut self, instance: impl Into<String>, pairs: I)
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        let pairs = pairs.into_iter().map(|(a, b)| (a.into(), b.into())).collect();
        self.links.push((instance.into(), pairs));
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[(String, String)])> {
        self.links.iter().map(|(i, p)| (i.as_str(), p.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

#[derive(Debug)]
struct SelectionGroup {
    instance: String,
    options: Vec<(Term, Candidate)>,
}

/// Instances composed into one design, checked with one owned backend.
pub struct ContractSystem<B: SolverBackend> {
    backend: B,
    instances: Vec<ContractInstance>,
    by_name: HashMap<String, usize>,
    /// Composition equalities and selection encodings.
    structural: Vec<Term>,
    environment: Vec<Term>,
    selections: Vec<SelectionGroup>,
    objective: Option<Objective>,
}

impl<B: SolverBackend> ContractSystem<B> {
    /// An empty system that takes ownership of `backend`.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            instances: Vec::new(),
            by_name: HashMap::new(),
            structural: Vec::new(),
            environment: Vec::new(),
            selections: Vec::new(),
            objective: None,
        }
    }

    /// The backend, for reading model values directly.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Give the backend back, ending the system.
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Register an instance and declare its variables.
    pub fn add_instance(&mut self, mut instance: ContractInstance) -> Result<(), ContractError> {
        if self.by_name.contains_key(instance.name()) {
            return Err(ContractError::DuplicateInstance(instance.name().to_string()));
        }
        instance.build_clauses(&mut self.backend)?;
        tracing::debug!(
            instance = %instance.name(),
            template = %instance.template_name(),
            selectable = instance.is_selectable(),
            "added instance"
        );
        self.by_name
            .insert(instance.name().to_string(), self.instances.len());
        self.instances.push(instance);
        Ok(())
    }

    /// A registered instance by name.
    pub fn instance(&self, name: &str) -> Result<&ContractInstance, ContractError> {
        self.by_name
            .get(name)
            .map(|&i| &self.instances[i])
            .ok_or_else(|| ContractError::UnknownInstance(name.to_string()))
    }

    /// Registered instances in registration order.
    pub fn instances(&self) -> impl Iterator<Item = &ContractInstance> {
        self.instances.iter()
    }

    /// Connect fields of two registered instances: one equality per pair.
    ///
    /// Properties link like ports, so a fixed instance's constants can feed
    /// an aggregate.
    pub fn compose<I, P, Q>(&mut self, a: &str, b: &str, port_pairs: I) -> Result<(), ContractError>
    where
        I: IntoIterator<Item = (P, Q)>,
        P: AsRef<str>,
        Q: AsRef<str>,
    {
        let equalities = port_equalities(&self.backend, self.instance(a)?, self.instance(b)?, port_pairs)?;
        tracing::debug!(a, b, links = equalities.len(), "composed instances");
        self.structural.extend(equalities);
        Ok(())
    }

    /// An extra clause asserted in every query.
    pub fn add_environment_constraint(&mut self, clause: Term) {
        self.environment.push(clause);
    }

    /// Offer `candidates` to a selectable instance: exactly one will be
    /// chosen in every model.
    pub fn set_selection(&mut self, instance: &str, candidates: &[Candidate]) -> Result<(), ContractError> {
        let inst = self.instance(instance)?;
        if !inst.is_selectable() {
            return Err(ContractError::FixedInstance(instance.to_string()));
        }
        if self.selections.iter().any(|g| g.instance == instance) {
            return Err(ContractError::SelectionExists(instance.to_string()));
        }
        if candidates.is_empty() {
            return Err(ContractError::EmptyCatalog(instance.to_string()));
        }
        let mut ids = HashSet::new();
        for candidate in candidates {
            if candidate.id.contains(['|', '\\']) {
                return Err(ContractError::InvalidCandidateId {
                    instance: instance.to_string(),
                    candidate: candidate.id.clone(),
                });
            }
            if !ids.insert(candidate.id.as_str()) {
                return Err(ContractError::DuplicateCandidate {
                    instance: instance.to_string(),
                    candidate: candidate.id.clone(),
                });
            }
        }

        let properties = inst.template().properties();
        let mut bindings = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let mut equalities = Vec::with_capacity(properties.len());
            for (property, value) in candidate.values(properties)? {
                let var = inst.get_property_var(&property.name)?.clone();
                let constant = property.constant(&self.backend, &value)?;
                equalities.push(self.backend.equal(var, constant));
            }
            bindings.push(equalities);
        }

        let mut options = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let decision = self
                .backend
                .fresh_variable(&format!("{instance}_use_{}", candidate.id), Sort::Bool)?;
            options.push((decision, candidate.clone()));
        }

        let mut clauses = Vec::new();
        for ((decision, _), equalities) in options.iter().zip(bindings) {
            let assignment = self.backend.and(equalities);
            clauses.push(self.backend.implies(decision.clone(), assignment));
        }
        for (i, (decision, _)) in options.iter().enumerate() {
            let others: Vec<Term> = options
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, (other, _))| self.backend.not(other.clone()))
                .collect();
            if !others.is_empty() {
                let exclusive = self.backend.and(others);
                clauses.push(self.backend.implies(decision.clone(), exclusive));
            }
        }
        let decisions = options.iter().map(|(d, _)| d.clone()).collect();
        clauses.push(self.backend.or(decisions));

        tracing::debug!(instance, candidates = options.len(), "registered selection group");
        self.structural.extend(clauses);
        self.selections.push(SelectionGroup {
            instance: instance.to_string(),
            options,
        });
        Ok(())
    }

    /// Record the expression to maximize and assert `expr >= lower_bound`.
    ///
    /// Without an evaluator the objective value is `expr` evaluated in the
    /// last model.
    pub fn set_objective(
        &mut self,
        expr: Term,
        lower_bound: f64,
        evaluator: Option<Evaluator>,
    ) -> Result<(), ContractError> {
        if !lower_bound.is_finite() {
            return Err(ContractError::InvalidNumber {
                what: "objective lower bound".to_string(),
                value: lower_bound,
            });
        }
        let bound = self.backend.ge(expr.clone(), Term::real(lower_bound));
        self.backend.assert(bound);
        self.objective = Some(Objective::new(expr, lower_bound, evaluator));
        Ok(())
    }

    /// The objective set by [`ContractSystem::set_objective`], if any.
    pub fn objective(&self) -> Option<&Objective> {
        self.objective.as_ref()
    }

    /// Objective value in the last model.
    pub fn objective_value(&self) -> Result<f64, ContractError> {
        let objective = self.objective.as_ref().ok_or(ContractError::NoObjective)?;
        objective.evaluate(&self.backend)
    }

    /// Is there a behavior satisfying every registered contract?
    pub fn solve(&mut self) -> Result<Outcome, ContractError> {
        let clauses = self.behavior_clauses(None);
        let result = self.scoped_check(clauses)?;
        let outcome = Outcome::from_result(&result);
        log_outcome("solve", &outcome);
        Ok(outcome)
    }

    /// Like `solve`, with a system-level contract connected to the
    /// registered instances.
    pub fn find_behavior(
        &mut self,
        system: &mut ContractInstance,
        connections: &ConnectionMap,
    ) -> Result<Outcome, ContractError> {
        self.attach(system)?;
        let mut clauses = self.behavior_clauses(Some(&*system));
        clauses.extend(self.connection_clauses(system, connections)?);
        let result = self.scoped_check(clauses)?;
        let outcome = Outcome::from_result(&result);
        log_outcome("find_behavior", &outcome);
        Ok(outcome)
    }

    /// Do the composed subsystems refine `system`?
    ///
    /// Searches for a behavior where the system assumptions and every
    /// subsystem guarantee hold but some subsystem assumption or system
    /// guarantee fails. None exists exactly when refinement holds.
    pub fn check_refinement(
        &mut self,
        system: &mut ContractInstance,
        connections: &ConnectionMap,
    ) -> Result<Verdict, ContractError> {
        self.attach(system)?;

        let mut clauses: Vec<Term> = system.assumption_clauses().to_vec();
        let mut obligations = Vec::new();
        for inst in &self.instances {
            clauses.extend(inst.guarantee_clauses().iter().cloned());
            obligations.extend(inst.assumption_clauses().iter().cloned());
        }
        obligations.extend(system.guarantee_clauses().iter().cloned());
        clauses.extend(self.structural.iter().cloned());
        clauses.extend(self.environment.iter().cloned());
        clauses.extend(self.connection_clauses(system, connections)?);
        let all_obligations = self.backend.and(obligations);
        clauses.push(self.backend.not(all_obligations));

        let result = self.scoped_check(clauses)?;
        let verdict = match result {
            SolverResult::Unsat => Verdict::Holds,
            SolverResult::Sat(_) => {
                let mut report = self.report()?;
                report.instances.push(self.instance_report(system)?);
                Verdict::Violated(report)
            }
            SolverResult::Unknown(reason) => Verdict::Unknown(reason),
        };
        match &verdict {
            Verdict::Holds => tracing::info!("refinement holds"),
            Verdict::Violated(_) => tracing::info!("refinement violated"),
            Verdict::Unknown(reason) => tracing::warn!(%reason, "refinement check inconclusive"),
        }
        Ok(verdict)
    }

    /// Maximize the objective by repeatedly demanding an improvement of
    /// `epsilon` over the last achieved value.
    ///
    /// Runs at most `max_iter + 1` checks. Stops early on UNSAT, on an
    /// unknown answer, or when the wall-clock budget is spent.
    pub fn solve_optimize(&mut self, config: &OptimizeConfig) -> Result<OptimizationResult, ContractError> {
        config.validate()?;
        if self.objective.is_none() {
            return Err(ContractError::NoObjective);
        }

        let saved_timeout = self.backend.timeout();
        let clauses = self.behavior_clauses(None);
        self.backend.push();
        self.backend.assert_all(clauses);
        let run = self.optimize_in_scope(config);
        self.backend.set_timeout(saved_timeout);
        self.backend.pop()?;
        let result = run?;

        match &result.best {
            Some(best) => tracing::info!(
                objective = best.objective,
                checks = result.checks,
                stop = ?result.stop_reason,
                "optimization finished"
            ),
            None => tracing::info!(checks = result.checks, stop = ?result.stop_reason, "no feasible selection"),
        }
        Ok(result)
    }

    fn optimize_in_scope(&mut self, config: &OptimizeConfig) -> Result<OptimizationResult, ContractError> {
        let start = Instant::now();
        let base_timeout = self.backend.timeout();
        let mut best = None;
        let mut history = Vec::new();
        let mut checks = 0;

        let stop_reason = loop {
            if let Some(budget) = config.timeout {
                let remaining = budget.saturating_sub(start.elapsed());
                if remaining.is_zero() {
                    break StopReason::Timeout;
                }
                self.backend.set_timeout(check_timeout(base_timeout, remaining));
            }

            let result = self.backend.check()?;
            checks += 1;
            match result {
                SolverResult::Sat(_) => {
                    let selection = self.get_component_selection()?;
                    let objective = self.objective_value()?;
                    tracing::info!(round = checks, objective, "improved selection");
                    history.push(objective);
                    best = Some(Solution {
                        selection,
                        objective,
                    });
                    if checks > config.max_iter {
                        break StopReason::MaxIterations;
                    }
                    let expr = self
                        .objective
                        .as_ref()
                        .ok_or(ContractError::NoObjective)?
                        .expr
                        .clone();
                    let tighter = self.backend.ge(expr, Term::real(objective + config.epsilon));
                    self.backend.assert(tighter);
                }
                SolverResult::Unsat => break StopReason::Exhausted,
                SolverResult::Unknown(reason) if result_timed_out(&reason, config, start) => {
                    tracing::warn!("optimization budget exhausted");
                    break StopReason::Timeout;
                }
                SolverResult::Unknown(reason) => {
                    tracing::warn!(%reason, "solver returned unknown");
                    break StopReason::Unknown(reason);
                }
            }
        };

        Ok(OptimizationResult {
            best,
            history,
            checks,
            stop_reason,
        })
    }

    /// Chosen candidate per selection group in the last model.
    pub fn get_component_selection(&self) -> Result<Selection, ContractError> {
        let mut selection = Selection::new();
        for group in &self.selections {
            let mut chosen = Vec::new();
            for (decision, candidate) in &group.options {
                if self.backend.model_value(decision)? == Value::Bool(true) {
                    chosen.push(candidate);
                }
            }
            match chosen.as_slice() {
                [candidate] => {
                    selection.insert(group.instance.clone(), (*candidate).clone());
                }
                _ => {
                    return Err(ContractError::SelectionInconsistent {
                        instance: group.instance.clone(),
                        selected: chosen.len(),
                    });
                }
            }
        }
        Ok(selection)
    }

    /// True when no registered instance is left for selection.
    pub fn is_concrete(&self) -> bool {
        self.instances.iter().all(|i| !i.is_selectable())
    }

    /// True when every selectable instance has a selection group.
    pub fn check_candidates_valid(&self) -> bool {
        let mut valid = true;
        for inst in self.instances.iter().filter(|i| i.is_selectable()) {
            if !self.selections.iter().any(|g| g.instance == inst.name()) {
                tracing::warn!(instance = %inst.name(), "selectable instance has no candidates");
                valid = false;
            }
        }
        valid
    }

    /// Value of one field of a registered instance in the last model.
    pub fn metric(&self, instance: &str, field: &str) -> Result<Value, ContractError> {
        let var = self.instance(instance)?.get_var(field)?;
        Ok(self.backend.model_value(var)?)
    }

    /// Model values of every port and property of one instance.
    pub fn instance_metrics(&self, instance: &str) -> Result<InstanceReport, ContractError> {
        self.instance_report(self.instance(instance)?)
    }

    /// Model values of every registered instance.
    pub fn report(&self) -> Result<Report, ContractError> {
        let instances = self
            .instances
            .iter()
            .map(|inst| self.instance_report(inst))
            .collect::<Result<_, _>>()?;
        Ok(Report { instances })
    }

    fn instance_report(&self, inst: &ContractInstance) -> Result<InstanceReport, ContractError> {
        let read = |fields: &[Interface]| -> Result<Vec<(String, Value)>, ContractError> {
            fields
                .iter()
                .map(|f| {
                    let var = inst.get_var(&f.name)?;
                    Ok((f.name.clone(), self.backend.model_value(var)?))
                })
                .collect()
        };
        Ok(InstanceReport {
            instance: inst.name().to_string(),
            template: inst.template_name().to_string(),
            ports: read(inst.template().ports())?,
            properties: read(inst.template().properties())?,
        })
    }

    /// Materialize a system-level instance that is not registered here.
    fn attach(&mut self, system: &mut ContractInstance) -> Result<(), ContractError> {
        if self.by_name.contains_key(system.name()) {
            return Err(ContractError::DuplicateInstance(system.name().to_string()));
        }
        if !system.is_materialized() {
            system.build_clauses(&mut self.backend)?;
        }
        Ok(())
    }

    fn behavior_clauses(&self, system: Option<&ContractInstance>) -> Vec<Term> {
        let mut clauses = Vec::new();
        for inst in self.instances.iter().chain(system) {
            clauses.extend(inst.assumption_clauses().iter().cloned());
            clauses.extend(inst.guarantee_clauses().iter().cloned());
        }
        clauses.extend(self.structural.iter().cloned());
        clauses.extend(self.environment.iter().cloned());
        clauses
    }

    fn connection_clauses(
        &self,
        system: &ContractInstance,
        connections: &ConnectionMap,
    ) -> Result<Vec<Term>, ContractError> {
        let mut clauses = Vec::new();
        for (name, pairs) in connections.iter() {
            let target = self.instance(name)?;
            let pairs = pairs.iter().map(|(a, b)| (a.as_str(), b.as_str()));
            clauses.extend(port_equalities(&self.backend, system, target, pairs)?);
        }
        Ok(clauses)
    }

    fn scoped_check(&mut self, clauses: Vec<Term>) -> Result<SolverResult, ContractError> {
        self.backend.push();
        self.backend.assert_all(clauses);
        let result = self.backend.check();
        self.backend.pop()?;
        Ok(result?)
    }
}

fn port_equalities<B, I, P, Q>(
    backend: &B,
    a: &ContractInstance,
    b: &ContractInstance,
    port_pairs: I,
) -> Result<Vec<Term>, ContractError>
where
    B: SolverBackend,
    I: IntoIterator<Item = (P, Q)>,
    P: AsRef<str>,
    Q: AsRef<str>,
{
    let mut equalities = Vec::new();
    for (pa, pb) in port_pairs {
        let (pa, pb) = (pa.as_ref(), pb.as_ref());
        let va = a.get_var(pa)?.clone();
        let vb = b.get_var(pb)?.clone();
        let (sa, sb) = (a.field_sort(pa), b.field_sort(pb));
        if sa != sb {
            return Err(ContractError::SortMismatch {
                lhs: format!("{}.{pa}", a.name()),
                lhs_sort: sa.unwrap_or(Sort::Bool),
                rhs: format!("{}.{pb}", b.name()),
                rhs_sort: sb.unwrap_or(Sort::Bool),
            });
        }
        equalities.push(backend.equal(va, vb));
    }
    Ok(equalities)
}

/// Per-check timeout: what remains of the budget, capped by any timeout
/// already configured on the backend, and never 0 (which means no limit).
fn check_timeout(base_ms: u64, remaining: Duration) -> u64 {
    let remaining_ms = u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX).max(1);
    if base_ms == 0 {
        remaining_ms
    } else {
        remaining_ms.min(base_ms)
    }
}

fn result_timed_out(reason: &str, config: &OptimizeConfig, start: Instant) -> bool {
    reason == "timeout" || config.timeout.is_some_and(|budget| start.elapsed() >= budget)
}

fn log_outcome(query: &str, outcome: &Outcome) {
    match outcome {
        Outcome::Sat => tracing::info!(query, "SAT"),
        Outcome::Unsat => tracing::info!(query, "UNSAT"),
        Outcome::Unknown(reason) => tracing::warn!(query, %reason, "solver returned unknown"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::PathBuf;

    use symcps_solver::{CliSolver, Model, SolverConfig, SolverError, SolverKind};

    use super::*;
    use crate::interface::reals;
    use crate::template::ContractTemplate;

    fn offline() -> ContractSystem<CliSolver> {
        ContractSystem::new(CliSolver::new(SolverConfig::new(
            SolverKind::Z3,
            PathBuf::from("/nonexistent/z3"),
        )))
    }

    fn propeller() -> ContractTemplate {
        ContractTemplate::new(
            "Propeller",
            reals(["thrust", "omega"]),
            reals(["C_t"]),
            |_| Ok(vec![]),
            |env| Ok(vec![env.var("thrust")?.equals(env.var("C_t")? * env.var("omega")?)]),
        )
        .unwrap()
    }

    fn switch() -> ContractTemplate {
        ContractTemplate::new(
            "Switch",
            vec![Interface::boolean("on")],
            vec![],
            |_| Ok(vec![]),
            |_| Ok(vec![]),
        )
        .unwrap()
    }

    fn catalog() -> Vec<Candidate> {
        vec![
            Candidate::new("P1").with("C_t", 0.12),
            Candidate::new("P2").with("C_t", 0.10),
        ]
    }

    #[test]
    fn duplicate_instance_rejected() {
        let mut system = offline();
        let t = propeller();
        system.add_instance(t.instantiate("prop", None).unwrap()).unwrap();
        let err = system.add_instance(t.instantiate("prop", None).unwrap()).unwrap_err();
        assert_eq!(err, ContractError::DuplicateInstance("prop".to_string()));
    }

    #[test]
    fn compose_checks_names_and_sorts() {
        let mut system = offline();
        let t = propeller();
        system.add_instance(t.instantiate("a", None).unwrap()).unwrap();
        system.add_instance(t.instantiate("b", None).unwrap()).unwrap();
        system.add_instance(switch().instantiate("s", None).unwrap()).unwrap();

        system.compose("a", "b", [("omega", "omega")]).unwrap();
        assert_eq!(
            system.structural[0].to_string(),
            "(= Propeller_0_a_omega Propeller_1_b_omega)"
        );

        assert!(matches!(
            system.compose("a", "zz", [("omega", "omega")]),
            Err(ContractError::UnknownInstance(_))
        ));
        assert!(matches!(
            system.compose("a", "b", [("rpm", "omega")]),
            Err(ContractError::UndeclaredField { .. })
        ));
        assert!(matches!(
            system.compose("a", "s", [("omega", "on")]),
            Err(ContractError::SortMismatch { lhs_sort: Sort::Real, rhs_sort: Sort::Bool, .. })
        ));
    }

    #[test]
    fn selection_encoding_shape() {
        let mut system = offline();
        system.add_instance(propeller().instantiate("prop", None).unwrap()).unwrap();
        system.set_selection("prop", &catalog()).unwrap();

        let text: Vec<String> = system.structural.iter().map(|t| t.to_string()).collect();
        assert_eq!(
            text,
            vec![
                "(=> prop_use_P1 (= Propeller_0_prop_C_t 0.12))",
                "(=> prop_use_P2 (= Propeller_0_prop_C_t 0.1))",
                "(=> prop_use_P1 (not prop_use_P2))",
                "(=> prop_use_P2 (not prop_use_P1))",
                "(or prop_use_P1 prop_use_P2)",
            ]
        );
        assert!(system.check_candidates_valid());
    }

    #[test]
    fn selection_errors() {
        let mut system = offline();
        let t = propeller();
        system.add_instance(t.instantiate("free", None).unwrap()).unwrap();
        let fixed = t.instantiate("fixed", Some(Candidate::new("P1").with("C_t", 0.12))).unwrap();
        system.add_instance(fixed).unwrap();

        assert_eq!(
            system.set_selection("ghost", &catalog()),
            Err(ContractError::UnknownInstance("ghost".to_string()))
        );
        assert_eq!(
            system.set_selection("fixed", &catalog()),
            Err(ContractError::FixedInstance("fixed".to_string()))
        );
        assert_eq!(
            system.set_selection("free", &[]),
            Err(ContractError::EmptyCatalog("free".to_string()))
        );
        let twice = vec![Candidate::new("P1").with("C_t", 0.1), Candidate::new("P1").with("C_t", 0.2)];
        assert!(matches!(
            system.set_selection("free", &twice),
            Err(ContractError::DuplicateCandidate { .. })
        ));
        assert!(matches!(
            system.set_selection("free", &[Candidate::new("bare")]),
            Err(ContractError::MissingProperty { .. })
        ));
        let piped = vec![Candidate::new("A|B").with("C_t", 0.1), Candidate::new("AB").with("C_t", 0.2)];
        assert_eq!(
            system.set_selection("free", &piped),
            Err(ContractError::InvalidCandidateId {
                instance: "free".to_string(),
                candidate: "A|B".to_string()
            })
        );
        assert!(!system.check_candidates_valid());

        system.set_selection("free", &catalog()).unwrap();
        assert_eq!(
            system.set_selection("free", &catalog()),
            Err(ContractError::SelectionExists("free".to_string()))
        );
    }

    #[test]
    fn single_candidate_group_has_no_exclusion() {
        let mut system = offline();
        system.add_instance(propeller().instantiate("prop", None).unwrap()).unwrap();
        system.set_selection("prop", &catalog()[..1]).unwrap();
        let text: Vec<String> = system.structural.iter().map(|t| t.to_string()).collect();
        assert_eq!(
            text,
            vec!["(=> prop_use_P1 (= Propeller_0_prop_C_t 0.12))", "prop_use_P1"]
        );
    }

    #[test]
    fn concreteness() {
        let mut system = offline();
        let t = propeller();
        let fixed = t.instantiate("fixed", Some(Candidate::new("P1").with("C_t", 0.12))).unwrap();
        system.add_instance(fixed).unwrap();
        assert!(system.is_concrete());
        system.add_instance(t.instantiate("free", None).unwrap()).unwrap();
        assert!(!system.is_concrete());
    }

    #[test]
    fn objective_requires_finite_bound() {
        let mut system = offline();
        system.add_instance(propeller().instantiate("prop", None).unwrap()).unwrap();
        let thrust = system.instance("prop").unwrap().get_port_var("thrust").unwrap().clone();
        assert!(matches!(
            system.set_objective(thrust.clone(), f64::NAN, None),
            Err(ContractError::InvalidNumber { .. })
        ));
        assert!(matches!(system.objective_value(), Err(ContractError::NoObjective)));
        system.set_objective(thrust, 0.0, None).unwrap();
        assert_eq!(system.objective().map(|o| o.lower_bound()), Some(0.0));
    }

    #[test]
    fn optimize_without_objective_is_an_error() {
        let mut system = offline();
        assert_eq!(
            system.solve_optimize(&OptimizeConfig::default()),
            Err(ContractError::NoObjective)
        );
    }

    #[test]
    fn system_instance_must_not_be_registered() {
        let mut system = offline();
        let t = propeller();
        system.add_instance(t.instantiate("sys", None).unwrap()).unwrap();
        let mut sys = t.instantiate("sys", None).unwrap();
        assert!(matches!(
            system.find_behavior(&mut sys, &ConnectionMap::new()),
            Err(ContractError::DuplicateInstance(_))
        ));
    }

    #[test]
    fn per_check_timeout() {
        assert_eq!(check_timeout(0, Duration::from_millis(1500)), 1500);
        assert_eq!(check_timeout(200, Duration::from_millis(1500)), 200);
        assert_eq!(check_timeout(0, Duration::from_micros(10)), 1);
    }

    /// Backend answering each check from a queue. A `Sat` answer's model
    /// becomes the one `model_value` reads. Every assertion is logged,
    /// including those later popped.
    #[derive(Default)]
    struct Scripted {
        answers: VecDeque<SolverResult>,
        model: Option<Model>,
        log: Vec<String>,
        scopes: usize,
        checks: usize,
        timeout: u64,
    }

    impl Scripted {
        fn new(answers: impl IntoIterator<Item = SolverResult>) -> Self {
            Self {
                answers: answers.into_iter().collect(),
                ..Self::default()
            }
        }
    }

    impl SolverBackend for Scripted {
        fn fresh_variable(&mut self, name: &str, _sort: Sort) -> Result<Term, SolverError> {
            Ok(Term::var(name))
        }

        fn assert_all(&mut self, clauses: Vec<Term>) {
            self.log.extend(clauses.iter().map(|c| c.to_string()));
        }

        fn push(&mut self) {
            self.scopes += 1;
        }

        fn pop(&mut self) -> Result<(), SolverError> {
            self.scopes = self.scopes.checked_sub(1).ok_or(SolverError::NoScope)?;
            Ok(())
        }

        fn check(&mut self) -> Result<SolverResult, SolverError> {
            self.checks += 1;
            let answer = self
                .answers
                .pop_front()
                .unwrap_or_else(|| SolverResult::Unknown("script exhausted".to_string()));
            self.model = answer.model().cloned();
            Ok(answer)
        }

        fn set_timeout(&mut self, timeout_ms: u64) {
            self.timeout = timeout_ms;
        }

        fn timeout(&self) -> u64 {
            self.timeout
        }

        fn model_value(&self, term: &Term) -> Result<Value, SolverError> {
            self.model.as_ref().ok_or(SolverError::NoModel)?.evaluate(term)
        }
    }

    /// A model picking `chosen` from the two-propeller catalog with the given
    /// thrust.
    fn pick(chosen: &[&str], thrust: f64) -> SolverResult {
        let mut assignments: Vec<(String, String)> = ["P1", "P2"]
            .iter()
            .map(|id| (format!("prop_use_{id}"), chosen.contains(id).to_string()))
            .collect();
        assignments.push(("Propeller_0_prop_thrust".to_string(), format!("{thrust:?}")));
        SolverResult::Sat(Some(Model::with_assignments(assignments)))
    }

    fn scripted(answers: impl IntoIterator<Item = SolverResult>) -> ContractSystem<Scripted> {
        let mut system = ContractSystem::new(Scripted::new(answers));
        system.add_instance(propeller().instantiate("prop", None).unwrap()).unwrap();
        system.set_selection("prop", &catalog()).unwrap();
        let thrust = system.instance("prop").unwrap().get_port_var("thrust").unwrap().clone();
        system.set_objective(thrust, 0.0, None).unwrap();
        system
    }

    #[test]
    fn optimization_tightens_by_epsilon() {
        let mut system = scripted([pick(&["P1"], 3.0), pick(&["P2"], 5.0), SolverResult::Unsat]);
        let config = OptimizeConfig::new().with_epsilon(0.5);
        let result = system.solve_optimize(&config).unwrap();

        assert_eq!(result.stop_reason, StopReason::Exhausted);
        assert_eq!(result.checks, 3);
        assert_eq!(result.history, vec![3.0, 5.0]);
        assert!(result.history.windows(2).all(|w| w[0] < w[1]));
        let best = result.best.unwrap();
        assert_eq!(best.objective, 5.0);
        assert_eq!(best.selection["prop"].id, "P2");

        let log = &system.backend().log;
        assert!(log.contains(&"(>= Propeller_0_prop_thrust 0.0)".to_string()));
        assert!(log.contains(&"(>= Propeller_0_prop_thrust 3.5)".to_string()));
        assert!(log.contains(&"(>= Propeller_0_prop_thrust 5.5)".to_string()));
        assert_eq!(system.backend().scopes, 0);
    }

    #[test]
    fn optimization_stops_at_iteration_limit() {
        let mut system = scripted([pick(&["P1"], 1.0), pick(&["P2"], 2.0), pick(&["P2"], 9.0)]);
        let result = system.solve_optimize(&OptimizeConfig::new().with_max_iter(1)).unwrap();
        assert_eq!(result.stop_reason, StopReason::MaxIterations);
        assert_eq!(result.checks, 2);
        assert_eq!(result.best.map(|b| b.objective), Some(2.0));
    }

    #[test]
    fn optimization_keeps_best_on_unknown() {
        let mut system = scripted([pick(&["P1"], 4.0), SolverResult::Unknown("timeout".to_string())]);
        let result = system.solve_optimize(&OptimizeConfig::default()).unwrap();
        assert_eq!(result.stop_reason, StopReason::Timeout);
        assert_eq!(result.best.map(|b| b.objective), Some(4.0));

        let mut system = scripted([SolverResult::Unknown("incomplete".to_string())]);
        let result = system.solve_optimize(&OptimizeConfig::default()).unwrap();
        assert_eq!(result.stop_reason, StopReason::Unknown("incomplete".to_string()));
        assert!(!result.is_feasible());
        assert_eq!(system.backend().scopes, 0);
    }

    #[test]
    fn optimization_restores_backend_timeout() {
        let mut system = scripted([SolverResult::Unsat]);
        system.backend.set_timeout(750);
        let config = OptimizeConfig::new().with_timeout(Duration::from_secs(60));
        let result = system.solve_optimize(&config).unwrap();
        assert_eq!(result.stop_reason, StopReason::Exhausted);
        assert_eq!(system.backend().timeout(), 750);
    }

    #[test]
    fn inconsistent_decisions_are_rejected() {
        let mut system = scripted([pick(&["P1", "P2"], 1.0), pick(&[], 1.0)]);
        assert_eq!(system.solve().unwrap(), Outcome::Sat);
        assert_eq!(
            system.get_component_selection(),
            Err(ContractError::SelectionInconsistent {
                instance: "prop".to_string(),
                selected: 2
            })
        );
        assert_eq!(system.solve().unwrap(), Outcome::Sat);
        assert_eq!(
            system.get_component_selection(),
            Err(ContractError::SelectionInconsistent {
                instance: "prop".to_string(),
                selected: 0
            })
        );
    }

    #[test]
    fn optimization_fails_on_inconsistent_model() {
        let mut system = scripted([pick(&["P1", "P2"], 1.0)]);
        assert!(matches!(
            system.solve_optimize(&OptimizeConfig::default()),
            Err(ContractError::SelectionInconsistent { selected: 2, .. })
        ));
        assert_eq!(system.backend().scopes, 0);
    }

    #[test]
    fn unknown_answers_stay_distinct() {
        let reason = || SolverResult::Unknown("timeout".to_string());
        let mut system = scripted([reason(), reason(), reason()]);
        assert_eq!(system.solve().unwrap(), Outcome::Unknown("timeout".to_string()));

        let mut sys = propeller().instantiate("sys", None).unwrap();
        let links = ConnectionMap::new().connect("prop", [("thrust", "thrust")]);
        assert_eq!(
            system.find_behavior(&mut sys, &links).unwrap(),
            Outcome::Unknown("timeout".to_string())
        );
        assert_eq!(
            system.check_refinement(&mut sys, &links).unwrap(),
            Verdict::Unknown("timeout".to_string())
        );
        assert_eq!(system.backend().checks, 3);
        assert_eq!(system.backend().scopes, 0);
    }

    #[test]
    fn refinement_negates_obligations() {
        let mut system = ContractSystem::new(Scripted::new([SolverResult::Unsat]));
        system.add_instance(propeller().instantiate("prop", None).unwrap()).unwrap();
        let mut sys = propeller().instantiate("sys", None).unwrap();
        let links = ConnectionMap::new().connect("prop", [("omega", "omega")]);
        assert_eq!(system.check_refinement(&mut sys, &links).unwrap(), Verdict::Holds);

        let log = &system.backend().log;
        assert!(log.contains(&"(= Propeller_0_sys_omega Propeller_0_prop_omega)".to_string()));
        assert_eq!(
            log.last().map(String::as_str),
            Some("(not (= Propeller_0_sys_thrust (* Propeller_0_sys_C_t Propeller_0_sys_omega)))")
        );
    }

    #[test]
    fn connection_map_builder() {
        let map = ConnectionMap::new()
            .connect("prop_0", [("thrust_0", "thrust")])
            .connect("batt", vec![("W_batt".to_string(), "W_batt".to_string())]);
        let entries: Vec<_> = map.iter().map(|(i, p)| (i.to_string(), p.len())).collect();
        assert_eq!(entries, vec![("prop_0".to_string(), 1), ("batt".to_string(), 1)]);
        assert!(!map.is_empty());
    }
}
