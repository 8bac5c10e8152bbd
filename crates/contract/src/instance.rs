use std::collections::BTreeMap;

use symcps_smtlib::{Sort, Term};
use symcps_solver::SolverBackend;

use crate::candidate::Candidate;
use crate::error::ContractError;
use crate::template::ContractTemplate;

/// Variables of one instance, keyed by declared port/property name.
#[derive(Debug, Clone, Default)]
pub struct VarEnv {
    owner: String,
    vars: BTreeMap<String, Term>,
}

impl VarEnv {
    fn new(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            vars: BTreeMap::new(),
        }
    }

    /// The term bound to `name`. Predicates use this with `?`.
    pub fn var(&self, name: &str) -> Result<Term, ContractError> {
        self.get(name)
            .cloned()
            .ok_or_else(|| ContractError::UndeclaredField {
                instance: self.owner.clone(),
                field: name.to_string(),
            })
    }

    pub fn get(&self, name: &str) -> Option<&Term> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Term)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn insert(&mut self, name: &str, term: Term) {
        self.vars.insert(name.to_string(), term);
    }
}

/// One occurrence of a template in a design.
///
/// Variables and clauses exist only after `build_clauses`, which a
/// `ContractSystem` runs when the instance is added.
#[derive(Debug, Clone)]
pub struct ContractInstance {
    template: ContractTemplate,
    name: String,
    index: usize,
    fixed: Option<Candidate>,
    env: Option<VarEnv>,
    assumption_clauses: Vec<Term>,
    guarantee_clauses: Vec<Term>,
}

impl ContractInstance {
    pub(crate) fn new(
        template: ContractTemplate,
        name: String,
        index: usize,
        fixed: Option<Candidate>,
    ) -> Self {
        Self {
            template,
            name,
            index,
            fixed,
            env: None,
            assumption_clauses: Vec::new(),
            guarantee_clauses: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &ContractTemplate {
        &self.template
    }

    pub fn template_name(&self) -> &str {
        self.template.name()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// True when no candidate was supplied at instantiation.
    pub fn is_selectable(&self) -> bool {
        self.fixed.is_none()
    }

    pub fn fixed_candidate(&self) -> Option<&Candidate> {
        self.fixed.as_ref()
    }

    pub fn is_materialized(&self) -> bool {
        self.env.is_some()
    }

    /// Solver-level name of a field of this instance.
    pub fn variable_name(&self, field: &str) -> String {
        format!(
            "{}_{}_{}_{}",
            self.template.name(),
            self.index,
            self.name,
            field
        )
    }

    pub fn assumption_clauses(&self) -> &[Term] {
        &self.assumption_clauses
    }

    pub fn guarantee_clauses(&self) -> &[Term] {
        &self.guarantee_clauses
    }

    pub fn reset_clauses(&mut self) {
        self.env = None;
        self.assumption_clauses.clear();
        self.guarantee_clauses.clear();
    }

    /// Declare this instance's variables in `backend` and evaluate both
    /// predicates. Ports are always fresh; properties are constants when
    /// the instance is fixed.
    pub fn build_clauses<B: SolverBackend>(&mut self, backend: &mut B) -> Result<(), ContractError> {
        self.reset_clauses();

        let mut env = VarEnv::new(&self.name);
        for port in self.template.ports() {
            let var = port.fresh(backend, &self.variable_name(&port.name))?;
            env.insert(&port.name, var);
        }
        match &self.fixed {
            Some(candidate) => {
                for (property, value) in candidate.values(self.template.properties())? {
                    let constant = property.constant(backend, &value)?;
                    env.insert(&property.name, constant);
                }
            }
            None => {
                for property in self.template.properties() {
                    let var = property.fresh(backend, &self.variable_name(&property.name))?;
                    env.insert(&property.name, var);
                }
            }
        }

        self.assumption_clauses = backend.clauses_from(&**self.template.assumption(), &env)?;
        self.guarantee_clauses = backend.clauses_from(&**self.template.guarantee(), &env)?;
        tracing::debug!(
            instance = %self.name,
            assumptions = self.assumption_clauses.len(),
            guarantees = self.guarantee_clauses.len(),
            "built contract clauses"
        );
        self.env = Some(env);
        Ok(())
    }

    /// Evaluate an extra predicate over this instance's variables.
    pub fn instantiate_clauses<B, F>(&self, backend: &B, predicate: F) -> Result<Vec<Term>, ContractError>
    where
        B: SolverBackend,
        F: Fn(&VarEnv) -> Result<Vec<Term>, ContractError>,
    {
        backend.clauses_from(predicate, self.env()?)
    }

    pub fn env(&self) -> Result<&VarEnv, ContractError> {
        self.env
            .as_ref()
            .ok_or_else(|| ContractError::NotMaterialized(self.name.clone()))
    }

    pub fn get_port_var(&self, name: &str) -> Result<&Term, ContractError> {
        if !self.template.is_port(name) {
            return Err(ContractError::UndeclaredPort {
                instance: self.name.clone(),
                field: name.to_string(),
            });
        }
        self.lookup(name)
    }

    pub fn get_property_var(&self, name: &str) -> Result<&Term, ContractError> {
        if !self.template.is_property(name) {
            return Err(ContractError::UndeclaredProperty {
                instance: self.name.clone(),
                field: name.to_string(),
            });
        }
        self.lookup(name)
    }

    /// Port or property variable.
    pub fn get_var(&self, name: &str) -> Result<&Term, ContractError> {
        if self.template.descriptor(name).is_none() {
            return Err(ContractError::UndeclaredField {
                instance: self.name.clone(),
                field: name.to_string(),
            });
        }
        self.lookup(name)
    }

    pub fn field_sort(&self, name: &str) -> Option<Sort> {
        self.template.descriptor(name).map(|d| d.sort)
    }

    fn lookup(&self, name: &str) -> Result<&Term, ContractError> {
        self.env()?
            .get(name)
            .ok_or_else(|| ContractError::UndeclaredField {
                instance: self.name.clone(),
                field: name.to_string(),
            })
    }
}
