//! Driver options: defaults, JSON parameter files and command-line overrides
//!
//! Options resolve in three layers: built-in defaults, then the JSON
//! parameter file named by `-i` (if any), then explicitly set command-line
//! arguments. `-o` writes the effective options back out, and
//! `Options -> JSON -> Options` is the identity for every recognised field.

use crate::error::{CliError, CliResult};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Effective simulation options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Total number of cells in the model
    pub cells: u64,
    /// Incoming synapses per cell (random network)
    pub synapses_per_cell: usize,
    /// Synapse mechanism: `expsyn` or `exp2syn`
    pub syn_type: String,
    /// Compartments per dendrite segment
    pub compartments_per_segment: u32,
    /// Simulated time (ms)
    pub tfinal: f64,
    /// Integration step (ms)
    pub dt: f64,
    /// Complete-graph network
    pub all_to_all: bool,
    /// Ring network (mutually exclusive with `all_to_all`)
    pub ring: bool,
    /// Cells per cell group
    pub group_size: u64,
    /// Fraction of cells carrying voltage probes
    pub probe_ratio: f64,
    /// Probe somata only, not dendrites
    pub probe_soma_only: bool,
    /// Prefix of trace output files
    pub trace_prefix: String,
    /// Only trace probes on cells up to and including this gid
    pub trace_max_gid: Option<u64>,
    /// Write spikes to file
    pub spike_file_output: bool,
    /// One spike file per rank instead of a single global file
    pub single_file_per_rank: bool,
    /// Overwrite existing spike files
    pub over_write: bool,
    /// Directory spike files are written to
    pub output_path: String,
    /// Spike file base name
    pub file_name: String,
    /// Spike file extension
    pub file_extension: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            cells: 1000,
            synapses_per_cell: 500,
            syn_type: "expsyn".into(),
            compartments_per_segment: 100,
            tfinal: 100.0,
            dt: 0.025,
            all_to_all: false,
            ring: false,
            group_size: 1,
            probe_ratio: 0.0,
            probe_soma_only: false,
            trace_prefix: "trace_".into(),
            trace_max_gid: None,
            spike_file_output: false,
            single_file_per_rank: false,
            over_write: true,
            output_path: "./".into(),
            file_name: "spikes".into(),
            file_extension: "gdf".into(),
        }
    }
}

impl Options {
    /// Check option consistency; violations are usage errors.
    pub fn validate(&self) -> CliResult<()> {
        if self.all_to_all && self.ring {
            return Err(CliError::usage(
                "can specify at most one of --ring and --all-to-all",
            ));
        }
        if self.group_size < 1 {
            return Err(CliError::usage("minimum of one cell per group"));
        }
        if !(0.0..=1.0).contains(&self.probe_ratio) {
            return Err(CliError::usage(format!(
                "probe_ratio {} must lie in [0, 1]",
                self.probe_ratio
            )));
        }
        if self.syn_type != "expsyn" && self.syn_type != "exp2syn" {
            return Err(CliError::usage(format!(
                "unknown synapse type {}; expected expsyn or exp2syn",
                self.syn_type
            )));
        }
        if !(self.dt > 0.0) {
            return Err(CliError::usage(format!("dt {} must be positive", self.dt)));
        }
        if !(self.tfinal > 0.0) {
            return Err(CliError::usage(format!(
                "tfinal {} must be positive",
                self.tfinal
            )));
        }
        Ok(())
    }

    /// Read options from a JSON parameter file.
    pub fn load(path: &std::path::Path) -> CliResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CliError::usage(format!(
                "unable to open model parameter file {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write the effective options to a JSON parameter file.
    pub fn save(&self, path: &std::path::Path) -> CliResult<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|e| {
            CliError::usage(format!(
                "unable to write to model parameter file {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(())
    }
}

impl fmt::Display for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "simulation options:")?;
        writeln!(f, "  cells                : {}", self.cells)?;
        writeln!(
            f,
            "  compartments/segment : {}",
            self.compartments_per_segment
        )?;
        writeln!(f, "  synapses/cell        : {}", self.synapses_per_cell)?;
        writeln!(f, "  simulation time      : {}", self.tfinal)?;
        writeln!(f, "  dt                   : {}", self.dt)?;
        writeln!(
            f,
            "  all to all network   : {}",
            if self.all_to_all { "yes" } else { "no" }
        )?;
        writeln!(
            f,
            "  ring network         : {}",
            if self.ring { "yes" } else { "no" }
        )?;
        writeln!(f, "  group size           : {}", self.group_size)?;
        writeln!(f, "  probe ratio          : {}", self.probe_ratio)?;
        writeln!(
            f,
            "  probe soma only      : {}",
            if self.probe_soma_only { "yes" } else { "no" }
        )?;
        writeln!(f, "  trace prefix         : {}", self.trace_prefix)?;
        write!(f, "  trace max gid        : ")?;
        if let Some(gid) = self.trace_max_gid {
            write!(f, "{}", gid)?;
        }
        writeln!(f)
    }
}

/// Command-line interface of the driver.
#[derive(Parser, Debug)]
#[command(
    name = "cabletree",
    version,
    about = "Multicompartment cable-neuron network simulator",
    long_about = "Builds a benchmark network of biophysically detailed cells \
                  (ring, all-to-all or random), advances it with the epoch-based \
                  engine and optionally exports spikes and voltage traces."
)]
pub struct Cli {
    /// Read parameters from a JSON file
    #[arg(short = 'i', long, value_name = "FILE")]
    pub ifile: Option<PathBuf>,

    /// Save effective parameters to a JSON file
    #[arg(short = 'o', long, value_name = "FILE")]
    pub ofile: Option<PathBuf>,

    /// Total number of cells in the model
    #[arg(short = 'n', long)]
    pub cells: Option<u64>,

    /// Number of synapses per cell
    #[arg(short = 's', long)]
    pub synapses: Option<usize>,

    /// Synapse type: expsyn or exp2syn
    #[arg(short = 'S', long)]
    pub syn_type: Option<String>,

    /// Number of compartments per segment
    #[arg(short = 'c', long)]
    pub compartments: Option<u32>,

    /// Run simulation to this time (ms)
    #[arg(short = 't', long)]
    pub tfinal: Option<f64>,

    /// Integration time step (ms)
    #[arg(short = 'd', long)]
    pub dt: Option<f64>,

    /// All-to-all network
    #[arg(short = 'm', long)]
    pub all_to_all: bool,

    /// Ring network
    #[arg(short = 'r', long)]
    pub ring: bool,

    /// Number of cells per cell group
    #[arg(short = 'g', long)]
    pub group_size: Option<u64>,

    /// Proportion of cells to probe, between 0 and 1
    #[arg(short = 'p', long)]
    pub probe_ratio: Option<f64>,

    /// Only probe cell somata, not dendrites
    #[arg(short = 'X', long)]
    pub probe_soma_only: bool,

    /// Write traces to files with this prefix
    #[arg(short = 'P', long)]
    pub trace_prefix: Option<String>,

    /// Only trace probes on cells up to and including this gid
    #[arg(short = 'T', long)]
    pub trace_max_gid: Option<u64>,

    /// Save spikes to file
    #[arg(short = 'f', long)]
    pub spike_file_output: bool,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve effective options: defaults, then the parameter file, then
    /// the explicitly set command-line arguments.
    pub fn resolve_options(&self) -> CliResult<Options> {
        let mut options = match &self.ifile {
            Some(path) => Options::load(path)?,
            None => Options::default(),
        };

        if let Some(v) = self.cells {
            options.cells = v;
        }
        if let Some(v) = self.synapses {
            options.synapses_per_cell = v;
        }
        if let Some(v) = &self.syn_type {
            options.syn_type = v.clone();
        }
        if let Some(v) = self.compartments {
            options.compartments_per_segment = v;
        }
        if let Some(v) = self.tfinal {
            options.tfinal = v;
        }
        if let Some(v) = self.dt {
            options.dt = v;
        }
        if self.all_to_all {
            options.all_to_all = true;
        }
        if self.ring {
            options.ring = true;
        }
        if let Some(v) = self.group_size {
            options.group_size = v;
        }
        if let Some(v) = self.probe_ratio {
            options.probe_ratio = v;
        }
        if self.probe_soma_only {
            options.probe_soma_only = true;
        }
        if let Some(v) = &self.trace_prefix {
            options.trace_prefix = v.clone();
        }
        if let Some(v) = self.trace_max_gid {
            options.trace_max_gid = Some(v);
        }
        if self.spike_file_output {
            options.spike_file_output = true;
        }

        options.validate()?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Options::default().validate().is_ok());
        assert_eq!(Options::default().group_size, 1);
    }

    #[test]
    fn ring_and_all_to_all_are_exclusive() {
        let options = Options {
            ring: true,
            all_to_all: true,
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(CliError::Usage(_))));
    }

    #[test]
    fn group_size_zero_is_rejected() {
        let options = Options {
            group_size: 0,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn probe_ratio_outside_unit_interval_is_rejected() {
        let options = Options {
            probe_ratio: 1.5,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn unknown_synapse_type_is_rejected() {
        let options = Options {
            syn_type: "nmda".into(),
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn cli_overrides_defaults() {
        let cli = Cli::parse_from(["cabletree", "-n", "16", "--ring", "-d", "0.05"]);
        let options = cli.resolve_options().unwrap();
        assert_eq!(options.cells, 16);
        assert!(options.ring);
        assert_eq!(options.dt, 0.05);
        // untouched fields keep their defaults
        assert_eq!(options.synapses_per_cell, 500);
    }
}
