//! Vector Clock Simulation Engine
//!
//! This crate simulates `n` concurrent processes that exchange messages over a
//! static topology and track causality with vector clocks. Two payload
//! encodings are compared:
//! - **VC**: every message carries the sender's full vector
//! - **SK**: every message carries only the entries the recipient is believed
//!   not to have seen, chosen from per-neighbor shadow state
//!
//! Each process runs as its own tokio task with a single-consumer mailbox.
//! A termination coordinator broadcasts stop once every process has met its
//! send quota, and the per-process logs are merged into one ordered log whose
//! send lines carry a `sent_entries=<k>` token.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use vcsim_core::{Algorithm, SimulationConfig, Simulation};
//!
//! let config = SimulationConfig::builder(3)
//!     .with_messages(2)
//!     .with_algorithm(Algorithm::Sk)
//!     .with_seed(42)
//!     .build()?;
//!
//! let report = Simulation::new(config)?.run().await?;
//! report.write_log("common_log_SK.txt".as_ref())?;
//! println!("{:.2} entries per message", report.statistics.average_entries());
//! ```

pub mod algorithm;
pub mod clock;
pub mod config;
pub mod errors;
pub mod experiment;
pub mod log;
pub mod mailbox;
pub mod message;
pub mod params;
pub mod process;
pub mod simulation;
pub mod stats;
pub mod termination;

// Re-export the main surface
pub use algorithm::{Algorithm, ClockStrategy, ShadowRow, ShadowState};
pub use clock::{CausalOrder, ProcessId, VectorClock};
pub use config::{ConfigBuilder, RunSettings, SimulationConfig};
pub use errors::{ErrorCollector, Result, SimError};
pub use experiment::{render_table, run_experiment, ComparisonRow, ExperimentPlan};
pub use log::{EventId, EventKind, EventRecord, LogEntry, MergeOrder, MergedLog, OrderingKey};
pub use mailbox::{Mailbox, MailboxRegistry};
pub use message::{Message, MessageId, Payload};
pub use params::{parse_params, render_params, ParameterFile, SimulationParams, Topology};
pub use process::{LogicalProcess, ProcessCounters, ProcessReport, StepOutcome};
pub use simulation::{run_simulation, ProcessSummary, RunReport, RunSummary, Simulation};
pub use stats::{parse_sent_entries, RunStatistics, TrialSummary};
pub use termination::{ProgressBoard, StopHandle, StopSignal, TerminationCoordinator};
