//! Error type for simulation setup and execution
//!
//! A run either completes or is aborted before any process starts. There are
//! no retryable conditions, so every variant here is fatal for the run that
//! produced it.

use std::fmt::Display;

/// Unified error type for all simulation operations
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Missing or malformed run parameters (n, λ, α, m)
    #[error("Invalid parameters: {message}")]
    InvalidParameters {
        /// Description of the offending parameter
        message: String,
    },

    /// Adjacency list does not match the process count or names bad ids
    #[error("Invalid topology: {message}")]
    InvalidTopology {
        /// Description of the topology problem
        message: String,
    },

    /// Algorithm selector did not name a known clock algorithm
    #[error("Unknown algorithm '{name}', expected VC or SK")]
    UnknownAlgorithm {
        /// The name that was supplied
        name: String,
    },

    /// Run settings could not be loaded or are inconsistent
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Filesystem failure while reading input or writing the merged log
    #[error("IO error in {context}: {source}")]
    Io {
        /// What was being done when the failure happened
        context: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Report could not be serialized
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the serialization failure
        message: String,
    },

    /// A process worker ended abnormally
    #[error("Process {pid} failed: {message}")]
    ProcessFailed {
        /// 0-based id of the failed process
        pid: usize,
        /// Reason reported by the runtime
        message: String,
    },
}

impl SimError {
    /// Create an invalid parameters error
    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        Self::InvalidParameters {
            message: message.into(),
        }
    }

    /// Create an invalid topology error
    pub fn invalid_topology(message: impl Into<String>) -> Self {
        Self::InvalidTopology {
            message: message.into(),
        }
    }

    /// Create an unknown algorithm error
    pub fn unknown_algorithm(name: impl Into<String>) -> Self {
        Self::UnknownAlgorithm { name: name.into() }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a process failure error
    pub fn process_failed(pid: usize, message: impl Into<String>) -> Self {
        Self::ProcessFailed {
            pid,
            message: message.into(),
        }
    }

    /// True for errors raised before any process was started
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::InvalidParameters { .. }
                | Self::InvalidTopology { .. }
                | Self::UnknownAlgorithm { .. }
                | Self::Config { .. }
        )
    }
}

/// Standard Result type for simulation operations
pub type Result<T> = std::result::Result<T, SimError>;

impl From<toml::de::Error> for SimError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(err.to_string())
    }
}

impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

/// Result mapper attaching context to foreign errors
pub trait ResultExt<T> {
    /// Map an IO error, recording what was being attempted
    fn io_context(self, context: &str) -> Result<T>;
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn io_context(self, context: &str) -> Result<T> {
        self.map_err(|e| SimError::io(context, e))
    }
}

/// Which validation bucket a collected problem belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemKind {
    /// Scalar run parameters
    Parameters,
    /// Adjacency list
    Topology,
}

/// Collects every validation problem before failing
///
/// Precondition checks report all issues at once instead of stopping at the
/// first one.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    problems: Vec<(ProblemKind, String)>,
}

impl ErrorCollector {
    /// Create a new error collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a parameter problem
    pub fn parameter(&mut self, field: &str, message: impl Display) {
        self.problems
            .push((ProblemKind::Parameters, format!("{field}: {message}")));
    }

    /// Record a topology problem
    pub fn topology(&mut self, message: impl Display) {
        self.problems
            .push((ProblemKind::Topology, message.to_string()));
    }

    /// Check if there are any problems
    pub fn has_errors(&self) -> bool {
        !self.problems.is_empty()
    }

    /// Get the number of problems
    pub fn error_count(&self) -> usize {
        self.problems.len()
    }

    /// Ok if nothing was collected, otherwise one combined error
    ///
    /// The variant follows the first problem recorded; the message lists
    /// all of them.
    pub fn into_result<T>(self, success_value: T) -> Result<T> {
        let Some((kind, _)) = self.problems.first() else {
            return Ok(success_value);
        };
        let kind = *kind;
        let combined = self
            .problems
            .into_iter()
            .map(|(_, message)| message)
            .collect::<Vec<_>>()
            .join("; ");
        Err(match kind {
            ProblemKind::Parameters => SimError::invalid_parameters(combined),
            ProblemKind::Topology => SimError::invalid_topology(combined),
        })
    }
}
