use crate::error::{Error, Result};
use crate::synth::DEFAULT_PORT_THRESHOLD;
use serde::Deserialize;
use std::fs;
use std::path::Path;

const DEFAULT_RECORD_COUNT: u64 = 100;

/// Run configuration. Every field is optional in the file.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub synthesis: SynthesisConfig,
    pub output: OutputConfig,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SynthesisConfig {
    /// Number of draws. The port filter usually emits fewer records.
    pub records: u64,
    /// Seed of the random generator. Taken from the OS when absent.
    pub seed: Option<u64>,
    /// Records whose ports are both above this value are dropped
    pub port_threshold: u16,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        SynthesisConfig {
            records: DEFAULT_RECORD_COUNT,
            seed: None,
            port_threshold: DEFAULT_PORT_THRESHOLD,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Print the records on the standard output
    pub console: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig { console: true }
    }
}

impl RunConfig {
    /// Command line values take precedence over the file
    pub fn with_overrides(
        mut self,
        records: Option<u64>,
        seed: Option<u64>,
        port_threshold: Option<u16>,
        quiet: bool,
    ) -> Self {
        if let Some(records) = records {
            self.synthesis.records = records;
        }
        if seed.is_some() {
            self.synthesis.seed = seed;
        }
        if let Some(t) = port_threshold {
            self.synthesis.port_threshold = t;
        }
        if quiet {
            self.output.console = false;
        }
        self
    }
}

/// Parse a TOML configuration
pub fn import_config(config: &str) -> Result<RunConfig> {
    let config: RunConfig = toml::from_str(config)?;
    log::trace!("Configuration: {config:?}");
    Ok(config)
}

/// Read and parse a TOML configuration file
pub fn load_config(path: impl AsRef<Path>) -> Result<RunConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| Error::ConfigUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let config = import_config(&content)?;
    log::info!("Configuration {} loaded", path.display());
    Ok(config)
}
