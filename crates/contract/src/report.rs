//! Diagnostic rendering of model values and selections.
//!
//! `Display` gives plain text; the `write_*` functions render the colored
//! form and the `print_*` ones send it to stderr:
//! ```text
//! Instance: propeller_0 (Propeller)
//!     rho: 1.225
//!     thrust: 14.2
//! ```
use std::fmt;
use std::io::{self, Write};

use colored::Colorize;
use symcps_solver::Value;

use crate::objective::{OptimizationResult, Selection, StopReason};

/// Model values of one instance's ports and properties.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceReport {
    pub instance: String,
    pub template: String,
    pub ports: Vec<(String, Value)>,
    pub properties: Vec<(String, Value)>,
}

impl InstanceReport {
    pub fn value(&self, field: &str) -> Option<Value> {
        self.ports
            .iter()
            .chain(&self.properties)
            .find(|(name, _)| name == field)
            .map(|(_, v)| *v)
    }
}

impl fmt::Display for InstanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Instance: {} ({})", self.instance, self.template)?;
        for (name, value) in self.ports.iter().chain(&self.properties) {
            writeln!(f, "    {name}: {value}")?;
        }
        Ok(())
    }
}

/// Model values across a whole system.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Report {
    pub instances: Vec<InstanceReport>,
}

impl Report {
    pub fn instance(&self, name: &str) -> Option<&InstanceReport> {
        self.instances.iter().find(|i| i.instance == name)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instance in &self.instances {
            write!(f, "{instance}")?;
        }
        Ok(())
    }
}

/// Colored per-instance listing of a report.
pub fn write_report(out: &mut impl Write, report: &Report) -> io::Result<()> {
    writeln!(out, "{}", "Component metrics".bold())?;
    for instance in &report.instances {
        write_instance(out, instance)?;
    }
    Ok(())
}

/// Ports in plain text, properties dimmed.
pub fn write_instance(out: &mut impl Write, instance: &InstanceReport) -> io::Result<()> {
    writeln!(
        out,
        "  {} {} {}",
        "Instance:".bold(),
        instance.instance.cyan(),
        format!("({})", instance.template).dimmed()
    )?;
    for (name, value) in &instance.ports {
        writeln!(out, "      {name}: {value}")?;
    }
    for (name, value) in &instance.properties {
        writeln!(out, "      {}: {value}", name.dimmed())?;
    }
    Ok(())
}

pub fn write_selection(out: &mut impl Write, selection: &Selection) -> io::Result<()> {
    writeln!(out, "{}", "Component selection".bold())?;
    for (instance, candidate) in selection {
        writeln!(out, "  {}: {}", instance, candidate.id.green())?;
    }
    Ok(())
}

/// Summary line of an optimization run, followed by the best selection.
pub fn write_optimization(out: &mut impl Write, result: &OptimizationResult) -> io::Result<()> {
    let status = match (&result.best, &result.stop_reason) {
        (None, StopReason::Timeout) => "[TIMEOUT]".yellow().bold(),
        (None, StopReason::Unknown(_)) => "[UNKNOWN]".yellow().bold(),
        (None, _) => "[INFEASIBLE]".red().bold(),
        (Some(_), _) => "[OK]".green().bold(),
    };
    match &result.best {
        Some(best) => {
            writeln!(
                out,
                "  {status}  objective {} after {} checks ({:?})",
                best.objective, result.checks, result.stop_reason
            )?;
            write_selection(out, &best.selection)
        }
        None => writeln!(
            out,
            "  {status}  no selection after {} checks ({:?})",
            result.checks, result.stop_reason
        ),
    }
}

pub fn print_report(report: &Report) {
    if let Err(err) = write_report(&mut io::stderr().lock(), report) {
        tracing::warn!(%err, "cannot write report");
    }
}

pub fn print_optimization(result: &OptimizationResult) {
    if let Err(err) = write_optimization(&mut io::stderr().lock(), result) {
        tracing::warn!(%err, "cannot write optimization summary");
    }
}
