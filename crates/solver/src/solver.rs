use std::collections::HashSet;
use std::io::Write;
use std::process::{Command as Process, Stdio};
use std::time::Instant;

use symcps_smtlib::{Command, Script, Sort, Term};

use crate::backend::SolverBackend;
use crate::config::{SolverConfig, SolverKind};
use crate::error::SolverError;
use crate::model::Model;
use crate::parser::parse_solver_output;
use crate::result::SolverResult;
use crate::value::Value;

/// SMT solver driven over its SMT-LIB2 text interface.
///
/// The session state (declarations and scoped assertions) lives here. Each
/// `check` renders it to one script, pipes it to a fresh solver process and
/// reads the verdict plus `(get-value ...)` for every declared variable.
#[derive(Debug)]
pub struct CliSolver {
    config: SolverConfig,
    declarations: Vec<(String, Sort)>,
    declared: HashSet<String>,
    /// Assertion frames; the first is the base scope and is never popped.
    frames: Vec<Vec<Term>>,
    last_model: Option<Model>,
}

impl CliSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            declarations: Vec::new(),
            declared: HashSet::new(),
            frames: vec![Vec::new()],
            last_model: None,
        }
    }

    /// Auto-detected Z3 with default settings.
    pub fn with_default_config() -> Result<Self, SolverError> {
        Self::with_default_config_for(SolverKind::Z3)
    }

    pub fn with_default_config_for(kind: SolverKind) -> Result<Self, SolverError> {
        Ok(Self::new(SolverConfig::auto_detect_for(kind)?))
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Number of open scopes above the base scope.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// The script `check` would send for the current state.
    pub fn script(&self) -> Script {
        let mut script = Script::with_commands(self.config.preamble());
        script.extend(
            self.declarations
                .iter()
                .map(|(name, sort)| Command::DeclareConst(name.clone(), *sort)),
        );
        script.extend(self.frames.iter().flatten().cloned().map(Command::Assert));
        script.push(Command::CheckSat);
        if !self.declarations.is_empty() {
            script.push(Command::GetValue(
                self.declarations
                    .iter()
                    .map(|(name, _)| Term::var(name.clone()))
                    .collect(),
            ));
        }
        script.push(Command::Exit);
        script
    }

    /// Run a hand-written SMT-LIB2 script through the configured solver.
    pub fn check_sat_raw(&self, smtlib: &str) -> Result<SolverResult, SolverError> {
        self.config.validate()?;

        let args = self.config.build_args();
        let solver = self.config.kind;

        let mut child = Process::new(&self.config.solver_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SolverError::ProcessError(format!("Failed to start {solver}: {e}")))?;

        {
            let stdin = child.stdin.as_mut().ok_or_else(|| {
                SolverError::ProcessError(format!("Failed to open {solver} stdin"))
            })?;
            stdin.write_all(smtlib.as_bytes()).map_err(|e| {
                SolverError::ProcessError(format!("Failed to write to {solver} stdin: {e}"))
            })?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| SolverError::ProcessError(format!("Failed to wait for {solver}: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if stderr.contains("timeout") || stdout.trim() == "timeout" {
            return Ok(SolverResult::Unknown("timeout".to_string()));
        }

        parse_solver_output(&stdout, &stderr)
    }
}

impl SolverBackend for CliSolver {
    fn fresh_variable(&mut self, name: &str, sort: Sort) -> Result<Term, SolverError> {
        if name.contains(['|', '\\']) {
            return Err(SolverError::InvalidSymbol(name.to_string()));
        }
        if !self.declared.insert(name.to_string()) {
            return Err(SolverError::DuplicateSymbol(name.to_string()));
        }
        self.declarations.push((name.to_string(), sort));
        Ok(Term::var(name))
    }

    fn assert_all(&mut self, clauses: Vec<Term>) {
        if let Some(frame) = self.frames.last_mut() {
            frame.extend(clauses);
        }
    }

    fn push(&mut self) {
        self.frames.push(Vec::new());
    }

    fn pop(&mut self) -> Result<(), SolverError> {
        if self.frames.len() <= 1 {
            return Err(SolverError::NoScope);
        }
        self.frames.pop();
        Ok(())
    }

    fn check(&mut self) -> Result<SolverResult, SolverError> {
        let script = self.script();
        let text = script.to_string();
        tracing::debug!(
            solver = %self.config.kind,
            declarations = self.declarations.len(),
            assertions = script.assertion_count(),
            "checking"
        );

        let start = Instant::now();
        let mut result = self.check_sat_raw(&text)?;
        let elapsed = start.elapsed();

        // An unknown that used up the whole budget is a timeout.
        if let SolverResult::Unknown(reason) = &mut result
            && self.config.timeout_ms > 0
            && elapsed.as_millis() >= u128::from(self.config.timeout_ms)
        {
            *reason = "timeout".to_string();
        }

        tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, ?result, "check finished");
        self.last_model = match &result {
            SolverResult::Sat(model) => Some(model.clone().unwrap_or_default()),
            _ => None,
        };
        Ok(result)
    }

    fn set_timeout(&mut self, timeout_ms: u64) {
        self.config.timeout_ms = timeout_ms;
    }

    fn timeout(&self) -> u64 {
        self.config.timeout_ms
    }

    fn model_value(&self, term: &Term) -> Result<Value, SolverError> {
        if let Some(value) = Value::from_literal(term) {
            return Ok(value);
        }
        if let Some(name) = term.as_const()
            && !self.declared.contains(name)
        {
            return Err(SolverError::UnknownVariable(name.to_string()));
        }
        self.last_model
            .as_ref()
            .ok_or(SolverError::NoModel)?
            .evaluate(term)
    }
}
