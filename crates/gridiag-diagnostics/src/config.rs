//! Diagnostics configuration.
//!
//! [`DiagnosticsOptions`] is the raw, user-facing form: every field has a
//! default and nothing is checked. [`DiagnosticsConfig`] is the validated
//! form; the only ways to get one ([`DiagnosticsConfig::new`],
//! `TryFrom`, and deserialization) all run the same checks, so an invalid
//! document never yields a config value.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use gridiag_monitor::TIME_DIM;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ── OutputFormat ───────────────────────────────────────────────────

/// Storage backend selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// Streaming chunked store, one chunk per rank per timestep.
    #[default]
    Zarr,
    /// Batched store, one gathered file per `time_chunk_size` timesteps.
    Netcdf,
}

impl OutputFormat {
    /// The configuration spelling of this format.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zarr => "zarr",
            Self::Netcdf => "netcdf",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zarr" => Ok(Self::Zarr),
            "netcdf" => Ok(Self::Netcdf),
            other => Err(ConfigError::UnknownOutputFormat {
                found: other.to_string(),
            }),
        }
    }
}

// ── DiagnosticsOptions ─────────────────────────────────────────────

/// Unvalidated diagnostics options, as written in a configuration file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiagnosticsOptions {
    /// Output directory. `None` disables diagnostics.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// `"zarr"` or `"netcdf"`.
    #[serde(default = "default_output_format")]
    pub output_format: String,
    /// Timesteps per file for the `netcdf` backend.
    #[serde(default = "default_time_chunk_size")]
    pub time_chunk_size: usize,
    /// Raw state variables to store, in order.
    #[serde(default)]
    pub names: Vec<String>,
    /// Derived variables to compute and store, in order.
    #[serde(default)]
    pub derived_names: Vec<String>,
}

impl Default for DiagnosticsOptions {
    fn default() -> Self {
        Self {
            path: None,
            output_format: default_output_format(),
            time_chunk_size: default_time_chunk_size(),
            names: Vec::new(),
            derived_names: Vec::new(),
        }
    }
}

fn default_output_format() -> String {
    OutputFormat::default().as_str().to_string()
}

fn default_time_chunk_size() -> usize {
    1
}

// ── DiagnosticsConfig ──────────────────────────────────────────────

/// Validated, immutable diagnostics configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DiagnosticsOptions", into = "DiagnosticsOptions")]
pub struct DiagnosticsConfig {
    path: Option<PathBuf>,
    output_format: OutputFormat,
    time_chunk_size: usize,
    names: Vec<String>,
    derived_names: Vec<String>,
}

impl DiagnosticsConfig {
    /// Validate `options`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingPath`] if names are requested without a path.
    /// - [`ConfigError::UnknownOutputFormat`] for an unrecognized format.
    /// - [`ConfigError::ZeroTimeChunkSize`] if `time_chunk_size` is 0.
    /// - [`ConfigError::DuplicateName`] if a list repeats a name.
    /// - [`ConfigError::NameCollision`] if a name is both raw and derived.
    /// - [`ConfigError::ReservedName`] for a variable named `time`.
    /// - [`ConfigError::InvalidName`] for a name that is empty, starts
    ///   with `.` or contains a path separator.
    pub fn new(options: DiagnosticsOptions) -> Result<Self, ConfigError> {
        let DiagnosticsOptions {
            path,
            output_format,
            time_chunk_size,
            names,
            derived_names,
        } = options;

        if path.is_none() && (!names.is_empty() || !derived_names.is_empty()) {
            return Err(ConfigError::MissingPath);
        }
        let output_format = output_format.parse::<OutputFormat>()?;
        if time_chunk_size == 0 {
            return Err(ConfigError::ZeroTimeChunkSize);
        }
        check_unique(&names)?;
        check_unique(&derived_names)?;
        if let Some(name) = derived_names.iter().find(|d| names.contains(d)) {
            return Err(ConfigError::NameCollision { name: name.clone() });
        }
        names.iter().chain(&derived_names).try_for_each(|n| check_name(n))?;

        Ok(Self {
            path,
            output_format,
            time_chunk_size,
            names,
            derived_names,
        })
    }

    /// A configuration with diagnostics disabled.
    pub fn disabled() -> Self {
        Self {
            path: None,
            output_format: OutputFormat::default(),
            time_chunk_size: default_time_chunk_size(),
            names: Vec::new(),
            derived_names: Vec::new(),
        }
    }

    /// Output directory, if diagnostics are enabled.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Selected backend.
    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    /// Timesteps per file for the batched backend.
    pub fn time_chunk_size(&self) -> usize {
        self.time_chunk_size
    }

    /// Raw variable names, in order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Derived variable names, in order.
    pub fn derived_names(&self) -> &[String] {
        &self.derived_names
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

fn check_unique(names: &[String]) -> Result<(), ConfigError> {
    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(ConfigError::DuplicateName { name: name.clone() });
        }
    }
    Ok(())
}

/// Names become array names in the store and keys next to `time` in
/// every record.
fn check_name(name: &str) -> Result<(), ConfigError> {
    if name == TIME_DIM {
        return Err(ConfigError::ReservedName {
            name: name.to_string(),
        });
    }
    let reason = if name.is_empty() {
        "empty"
    } else if name.starts_with('.') {
        "starts with '.'"
    } else if name.contains(['/', '\\']) {
        "contains a path separator"
    } else {
        return Ok(());
    };
    Err(ConfigError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

impl TryFrom<DiagnosticsOptions> for DiagnosticsConfig {
    type Error = ConfigError;

    fn try_from(options: DiagnosticsOptions) -> Result<Self, Self::Error> {
        Self::new(options)
    }
}

impl From<DiagnosticsConfig> for DiagnosticsOptions {
    fn from(config: DiagnosticsConfig) -> Self {
        Self {
            path: config.path,
            output_format: config.output_format.as_str().to_string(),
            time_chunk_size: config.time_chunk_size,
            names: config.names,
            derived_names: config.derived_names,
        }
    }
}
