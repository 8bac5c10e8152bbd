use std::fmt;
use std::path::PathBuf;

use symcps_smtlib::Command;

use crate::error::SolverError;

/// Environment variable selecting the solver kind (`z3`, `cvc5`, `yices`).
pub const ENV_SOLVER: &str = "SYMCPS_SOLVER";
/// Environment variable overriding the solver binary path.
pub const ENV_SOLVER_PATH: &str = "SYMCPS_SOLVER_PATH";
/// Environment variable setting the per-check timeout in milliseconds.
pub const ENV_SOLVER_TIMEOUT_MS: &str = "SYMCPS_SOLVER_TIMEOUT_MS";

/// Supported SMT solver backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolverKind {
    /// Z3 from Microsoft Research.
    Z3,
    /// CVC5 from Stanford/Iowa.
    Cvc5,
    /// Yices2 from SRI International.
    Yices,
}

impl SolverKind {
    /// Binary name used for PATH lookup.
    pub fn binary_name(&self) -> &'static str {
        match self {
            SolverKind::Z3 => "z3",
            SolverKind::Cvc5 => "cvc5",
            SolverKind::Yices => "yices-smt2",
        }
    }

    /// Common installation paths to check when PATH lookup fails.
    fn common_paths(&self) -> &'static [&'static str] {
        match self {
            SolverKind::Z3 => &["/opt/homebrew/bin/z3", "/usr/local/bin/z3", "/usr/bin/z3"],
            SolverKind::Cvc5 => &[
                "/opt/homebrew/bin/cvc5",
                "/usr/local/bin/cvc5",
                "/usr/bin/cvc5",
            ],
            SolverKind::Yices => &[
                "/opt/homebrew/bin/yices-smt2",
                "/usr/local/bin/yices-smt2",
                "/usr/bin/yices-smt2",
            ],
        }
    }

    /// Solver-specific CLI arguments for reading a script from stdin.
    pub fn stdin_args(&self) -> Vec<String> {
        match self {
            SolverKind::Z3 => vec!["-in".to_string()],
            SolverKind::Cvc5 => vec![
                "--lang".to_string(),
                "smt2".to_string(),
                "--produce-models".to_string(),
                "--incremental".to_string(),
            ],
            SolverKind::Yices => vec!["--incremental".to_string()],
        }
    }

    /// Solver-specific timeout argument, if supported.
    pub fn timeout_arg(&self, timeout_ms: u64) -> Option<String> {
        if timeout_ms == 0 {
            return None;
        }
        match self {
            SolverKind::Z3 => Some(format!("-t:{timeout_ms}")),
            SolverKind::Cvc5 => Some(format!("--tlimit-per={timeout_ms}")),
            SolverKind::Yices => Some(format!("--timeout={}", timeout_ms.div_ceil(1000))),
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverKind::Z3 => write!(f, "Z3"),
            SolverKind::Cvc5 => write!(f, "CVC5"),
            SolverKind::Yices => write!(f, "Yices"),
        }
    }
}

impl std::str::FromStr for SolverKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "z3" => Ok(SolverKind::Z3),
            "cvc5" => Ok(SolverKind::Cvc5),
            "yices" | "yices2" | "yices-smt2" => Ok(SolverKind::Yices),
            _ => Err(format!(
                "Unknown solver: {s}. Valid options: z3, cvc5, yices"
            )),
        }
    }
}

/// Solver configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    /// Which solver to use.
    pub kind: SolverKind,
    /// Path to the solver binary.
    pub solver_path: PathBuf,
    /// Per-check timeout in milliseconds (0 = no timeout).
    pub timeout_ms: u64,
    /// Optional `(set-logic ...)`; `None` lets the solver pick.
    pub logic: Option<String>,
    /// Digits Z3 prints for irrational model values (`pp.decimal_precision`).
    /// `None` keeps exact `(/ n d)` output, which cannot express algebraic
    /// numbers produced by nonlinear constraints.
    pub decimal_precision: Option<u32>,
    /// Additional solver arguments.
    pub extra_args: Vec<String>,
}

impl SolverConfig {
    /// Create a new config with the given solver kind and path.
    pub fn new(kind: SolverKind, solver_path: PathBuf) -> Self {
        Self {
            kind,
            solver_path,
            timeout_ms: 0,
            logic: None,
            decimal_precision: Some(17),
            extra_args: Vec::new(),
        }
    }

    /// Create config with a specific timeout (in milliseconds).
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_logic(mut self, logic: impl Into<String>) -> Self {
        self.logic = Some(logic.into());
        self
    }

    pub fn with_decimal_precision(mut self, digits: Option<u32>) -> Self {
        self.decimal_precision = digits;
        self
    }

    /// Add extra arguments for the solver.
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    /// Auto-detect solver location for the given kind.
    ///
    /// Tries `which <binary>` first, then checks common installation paths.
    pub fn auto_detect_for(kind: SolverKind) -> Result<Self, SolverError> {
        let binary = kind.binary_name();

        if let Some(path) = which(binary) {
            return Ok(Self::new(kind, path));
        }

        for candidate in kind.common_paths() {
            let path = PathBuf::from(candidate);
            if path.exists() {
                return Ok(Self::new(kind, path));
            }
        }

        Err(SolverError::NotFound(kind, PathBuf::from(binary)))
    }

    /// Auto-detect Z3.
    pub fn auto_detect() -> Result<Self, SolverError> {
        Self::auto_detect_for(SolverKind::Z3)
    }

    /// Build a config from `SYMCPS_SOLVER`, `SYMCPS_SOLVER_PATH` and
    /// `SYMCPS_SOLVER_TIMEOUT_MS`, auto-detecting whatever is not set.
    pub fn from_env() -> Result<Self, SolverError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SolverError> {
        let kind = match lookup(ENV_SOLVER) {
            Some(name) => name.parse::<SolverKind>().map_err(SolverError::ProcessError)?,
            None => SolverKind::Z3,
        };

        let mut config = match lookup(ENV_SOLVER_PATH) {
            Some(path) => Self::new(kind, PathBuf::from(path)),
            None => Self::auto_detect_for(kind)?,
        };

        if let Some(raw) = lookup(ENV_SOLVER_TIMEOUT_MS) {
            config.timeout_ms = raw.trim().parse().map_err(|_| {
                SolverError::ProcessError(format!("{ENV_SOLVER_TIMEOUT_MS} is not a number: {raw}"))
            })?;
        }

        Ok(config)
    }

    /// Build the argument list for one solver invocation.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = self.kind.stdin_args();

        if let Some(timeout_arg) = self.kind.timeout_arg(self.timeout_ms) {
            args.push(timeout_arg);
        }

        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Options emitted at the top of every script.
    pub fn preamble(&self) -> Vec<Command> {
        let mut commands = vec![Command::SetOption(
            "produce-models".to_string(),
            "true".to_string(),
        )];
        if self.kind == SolverKind::Z3
            && let Some(digits) = self.decimal_precision
        {
            commands.push(Command::SetOption("pp.decimal".to_string(), "true".to_string()));
            commands.push(Command::SetOption(
                "pp.decimal_precision".to_string(),
                digits.to_string(),
            ));
        }
        if let Some(logic) = &self.logic {
            commands.push(Command::SetLogic(logic.clone()));
        }
        commands
    }

    /// Validate that the configured solver binary exists.
    pub fn validate(&self) -> Result<(), SolverError> {
        if !self.solver_path.exists() {
            return Err(SolverError::NotFound(self.kind, self.solver_path.clone()));
        }
        Ok(())
    }
}

fn which(binary: &str) -> Option<PathBuf> {
    let output = std::process::Command::new("which").arg(binary).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let path_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let path = PathBuf::from(path_str);
    (!path.as_os_str().is_empty() && path.exists()).then_some(path)
}
