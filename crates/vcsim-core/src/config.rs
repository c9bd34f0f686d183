//! Simulation configuration
//!
//! [`SimulationConfig`] bundles what the outer driver supplies for one run:
//! parameters, topology and algorithm selector, plus pacing [`RunSettings`]
//! that can also come from a TOML file.

use crate::algorithm::Algorithm;
use crate::errors::{ErrorCollector, Result, ResultExt, SimError};
use crate::log::MergeOrder;
use crate::params::{ParameterFile, SimulationParams, Topology};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Pacing and ordering knobs for one run
///
/// Every field has a default, so a settings file only needs the keys it
/// changes:
///
/// ```toml
/// seed = 7
/// stop_grace_ms = 200
/// merge_order = "logical"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSettings {
    /// Seed for every process RNG; `None` draws from OS entropy
    pub seed: Option<u64>,
    /// Length of one delay unit in microseconds (λ is expressed in these)
    pub time_unit_us: u64,
    /// Per-process wait before deciding its mailbox has drained
    pub drain_grace_ms: u64,
    /// How often the coordinator polls send progress
    pub poll_interval_ms: u64,
    /// Wait between quota satisfaction and the stop broadcast
    pub stop_grace_ms: u64,
    /// Ordering of the merged log
    pub merge_order: MergeOrder,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            seed: None,
            time_unit_us: 1_000,
            drain_grace_ms: 50,
            poll_interval_ms: 50,
            stop_grace_ms: 500,
            merge_order: MergeOrder::WallClock,
        }
    }
}

impl RunSettings {
    /// Settings tuned for tests: short waits, logical ordering
    pub fn fast(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            time_unit_us: 100,
            drain_grace_ms: 5,
            poll_interval_ms: 5,
            stop_grace_ms: 20,
            merge_order: MergeOrder::Logical,
        }
    }

    /// Parse settings from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .io_context(&format!("reading {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    /// Duration of one delay unit
    pub fn time_unit(&self) -> Duration {
        Duration::from_micros(self.time_unit_us)
    }

    /// Per-process drain grace
    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }

    /// Coordinator poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Coordinator grace before stop
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    fn check(&self, errors: &mut ErrorCollector) {
        if self.poll_interval_ms == 0 {
            errors.parameter("poll_interval_ms", "must be at least 1");
        }
    }
}

/// Everything needed to run one simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Scalar parameters
    pub params: SimulationParams,
    /// Adjacency list
    pub topology: Topology,
    /// Clock algorithm used by every process
    pub algorithm: Algorithm,
    /// Pacing and ordering
    pub settings: RunSettings,
}

impl SimulationConfig {
    /// Config from a loaded parameter file
    pub fn from_parameter_file(file: ParameterFile, algorithm: Algorithm) -> Self {
        Self {
            params: file.params,
            topology: file.topology,
            algorithm,
            settings: RunSettings::default(),
        }
    }

    /// Start a builder for `n` processes on a fully connected topology
    pub fn builder(n: usize) -> ConfigBuilder {
        ConfigBuilder::new(n)
    }

    /// Check every precondition before any process starts
    pub fn validate(&self) -> Result<()> {
        let mut errors = ErrorCollector::new();
        self.params.check(&mut errors);
        self.topology.check(self.params.n, &mut errors);
        self.settings.check(&mut errors);
        errors.into_result(())
    }
}

/// Type-safe builder for simulation configuration
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: SimulationConfig,
}

impl ConfigBuilder {
    /// Defaults: λ = 0, α = 0, m = 1, VC, fully connected
    pub fn new(n: usize) -> Self {
        Self {
            config: SimulationConfig {
                params: SimulationParams {
                    n,
                    lambda: 0.0,
                    alpha: 0.0,
                    m: 1,
                },
                topology: Topology::fully_connected(n),
                algorithm: Algorithm::Vc,
                settings: RunSettings::default(),
            },
        }
    }

    /// Set the mean inter-event delay
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.config.params.lambda = lambda;
        self
    }

    /// Set the internal-event factor
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.config.params.alpha = alpha;
        self
    }

    /// Set the per-process send quota
    pub fn with_messages(mut self, m: u64) -> Self {
        self.config.params.m = m;
        self
    }

    /// Replace the topology
    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.config.topology = topology;
        self
    }

    /// Select the clock algorithm
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.config.algorithm = algorithm;
        self
    }

    /// Replace all run settings
    pub fn with_settings(mut self, settings: RunSettings) -> Self {
        self.config.settings = settings;
        self
    }

    /// Set the random seed for deterministic event choices
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.settings.seed = Some(seed);
        self
    }

    /// Set the coordinator's grace before stop
    pub fn with_stop_grace_ms(mut self, stop_grace_ms: u64) -> Self {
        self.config.settings.stop_grace_ms = stop_grace_ms;
        self
    }

    /// Set the merged log ordering
    pub fn with_merge_order(mut self, order: MergeOrder) -> Self {
        self.config.settings.merge_order = order;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<SimulationConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl TryFrom<(&str, ParameterFile)> for SimulationConfig {
    type Error = SimError;

    fn try_from((algorithm, file): (&str, ParameterFile)) -> Result<Self> {
        let config = Self::from_parameter_file(file, algorithm.parse()?);
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::parse_params;

    #[test]
    fn test_settings_defaults_fill_missing_keys() {
        let settings = RunSettings::from_toml_str("seed = 7\nmerge_order = \"logical\"\n").unwrap();
        assert_eq!(settings.seed, Some(7));
        assert_eq!(settings.merge_order, MergeOrder::Logical);
        assert_eq!(settings.stop_grace_ms, 500);
        assert_eq!(settings.time_unit(), Duration::from_millis(1));
    }

    #[test]
    fn test_settings_reject_unknown_keys() {
        let err = RunSettings::from_toml_str("sed = 7\n").unwrap_err();
        assert!(matches!(err, SimError::Config { .. }));
    }

    #[test]
    fn test_builder_validates() {
        let config = SimulationConfig::builder(3)
            .with_messages(2)
            .with_algorithm(Algorithm::Sk)
            .with_seed(11)
            .build()
            .unwrap();
        assert_eq!(config.params.m, 2);
        assert_eq!(config.settings.seed, Some(11));

        let err = SimulationConfig::builder(3)
            .with_topology(Topology::fully_connected(2))
            .build()
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidTopology { .. }));
    }

    #[test]
    fn test_zero_processes_rejected() {
        let err = SimulationConfig::builder(0).build().unwrap_err();
        assert!(matches!(err, SimError::InvalidParameters { .. }));
    }

    #[test]
    fn test_unknown_algorithm_rejected_before_run() {
        let file = parse_params("2 0 0 1\n2\n1\n").unwrap();
        let err = SimulationConfig::try_from(("VX", file.clone())).unwrap_err();
        assert!(matches!(err, SimError::UnknownAlgorithm { .. }));

        let config = SimulationConfig::try_from(("sk", file)).unwrap();
        assert_eq!(config.algorithm, Algorithm::Sk);
    }
}
