use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use symcps_smtlib::Term;

use crate::candidate::Candidate;
use crate::error::ContractError;
use crate::instance::{ContractInstance, VarEnv};
use crate::interface::Interface;

/// An assumption or guarantee: constraint terms over an instance's variables.
pub type Predicate = Rc<dyn Fn(&VarEnv) -> Result<Vec<Term>, ContractError>>;

/// A reusable contract shape: ports, properties and the two predicates.
///
/// Cloning is cheap and shares the instance counter, so every instance of
/// one template gets a distinct index no matter which clone issued it.
#[derive(Clone)]
pub struct ContractTemplate {
    inner: Rc<TemplateInner>,
}

struct TemplateInner {
    name: String,
    ports: Vec<Interface>,
    properties: Vec<Interface>,
    assumption: Predicate,
    guarantee: Predicate,
    count: Cell<usize>,
    instance_names: RefCell<Vec<String>>,
}

impl ContractTemplate {
    pub fn new<A, G>(
        name: impl Into<String>,
        ports: Vec<Interface>,
        properties: Vec<Interface>,
        assumption: A,
        guarantee: G,
    ) -> Result<Self, ContractError>
    where
        A: Fn(&VarEnv) -> Result<Vec<Term>, ContractError> + 'static,
        G: Fn(&VarEnv) -> Result<Vec<Term>, ContractError> + 'static,
    {
        let name = name.into();
        let mut seen = HashSet::new();
        for field in ports.iter().chain(&properties) {
            if !seen.insert(field.name.as_str()) {
                return Err(ContractError::DuplicateField {
                    template: name,
                    field: field.name.clone(),
                });
            }
        }

        Ok(Self {
            inner: Rc::new(TemplateInner {
                name,
                ports,
                properties,
                assumption: Rc::new(assumption),
                guarantee: Rc::new(guarantee),
                count: Cell::new(0),
                instance_names: RefCell::new(Vec::new()),
            }),
        })
    }

    /// Create an instance. With `fixed` the properties become the
    /// candidate's constants; without it they are left for selection.
    pub fn instantiate(
        &self,
        instance_name: impl Into<String>,
        fixed: Option<Candidate>,
    ) -> Result<ContractInstance, ContractError> {
        if let Some(candidate) = &fixed {
            candidate.validate(&self.inner.properties)?;
        }

        let instance_name = instance_name.into();
        let index = self.inner.count.get();
        self.inner.count.set(index + 1);
        self.inner
            .instance_names
            .borrow_mut()
            .push(instance_name.clone());

        tracing::debug!(
            template = %self.inner.name,
            instance = %instance_name,
            index,
            fixed = ?fixed.as_ref().map(|c| &c.id),
            "instantiated contract"
        );
        Ok(ContractInstance::new(self.clone(), instance_name, index, fixed))
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn ports(&self) -> &[Interface] {
        &self.inner.ports
    }

    pub fn properties(&self) -> &[Interface] {
        &self.inner.properties
    }

    pub fn is_port(&self, name: &str) -> bool {
        self.inner.ports.iter().any(|p| p.name == name)
    }

    pub fn is_property(&self, name: &str) -> bool {
        self.inner.properties.iter().any(|p| p.name == name)
    }

    /// Port or property descriptor by name.
    pub fn descriptor(&self, name: &str) -> Option<&Interface> {
        self.inner
            .ports
            .iter()
            .chain(&self.inner.properties)
            .find(|i| i.name == name)
    }

    pub fn instance_count(&self) -> usize {
        self.inner.count.get()
    }

    pub fn instance_names(&self) -> Vec<String> {
        self.inner.instance_names.borrow().clone()
    }

    pub fn assumption(&self) -> &Predicate {
        &self.inner.assumption
    }

    pub fn guarantee(&self) -> &Predicate {
        &self.inner.guarantee
    }
}

impl fmt::Debug for ContractTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractTemplate")
            .field("name", &self.inner.name)
            .field("ports", &self.inner.ports)
            .field("properties", &self.inner.properties)
            .field("instances", &self.inner.count.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::reals;

    fn battery() -> ContractTemplate {
        ContractTemplate::new(
            "Battery",
            reals(["I_batt"]),
            reals(["capacity", "I_max"]),
            |env| Ok(vec![env.var("I_batt")?.le(env.var("I_max")?)]),
            |_| Ok(vec![]),
        )
        .unwrap()
    }

    #[test]
    fn duplicate_fields_rejected() {
        let err = ContractTemplate::new(
            "Motor",
            reals(["omega", "torque"]),
            reals(["K_t", "torque"]),
            |_| Ok(vec![]),
            |_| Ok(vec![]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ContractError::DuplicateField {
                template: "Motor".to_string(),
                field: "torque".to_string(),
            }
        );
    }

    #[test]
    fn indices_are_allocated_in_order() {
        let t = battery();
        let a = t.instantiate("a", None).unwrap();
        let shared = t.clone();
        let b = shared.instantiate("b", None).unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(t.instance_count(), 2);
        assert_eq!(t.instance_names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn fixed_candidate_must_cover_properties() {
        let t = battery();
        let partial = Candidate::new("LiPo").with("capacity", 5.0);
        let err = t.instantiate("batt", Some(partial)).unwrap_err();
        assert!(matches!(err, ContractError::MissingProperty { property, .. } if property == "I_max"));
        assert_eq!(t.instance_count(), 0);

        let full = Candidate::new("LiPo").with("capacity", 5.0).with("I_max", 125.0);
        let inst = t.instantiate("batt", Some(full)).unwrap();
        assert!(!inst.is_selectable());
    }

    #[test]
    fn descriptors() {
        let t = battery();
        assert!(t.is_port("I_batt"));
        assert!(t.is_property("I_max"));
        assert!(!t.is_port("I_max"));
        assert_eq!(t.descriptor("capacity"), Some(&Interface::real("capacity")));
        assert_eq!(t.descriptor("voltage"), None);
    }
}
