//! Run orchestration
//!
//! A [`Simulation`] owns one validated configuration. Each call to
//! [`Simulation::run`] builds a fresh mailbox registry, progress board and
//! stop signal, so repeated trials never share state.

use crate::algorithm::Algorithm;
use crate::clock::{ProcessId, VectorClock};
use crate::config::SimulationConfig;
use crate::errors::{Result, SimError};
use crate::log::{MergedLog, Sequencer};
use crate::mailbox::MailboxRegistry;
use crate::params::SimulationParams;
use crate::process::{LogicalProcess, ProcessContext, ProcessCounters, ProcessReport};
use crate::stats::RunStatistics;
use crate::termination::{ProgressBoard, StopHandle, TerminationCoordinator};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Final state of one process, without its log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSummary {
    /// Process id
    pub id: ProcessId,
    /// Clock at exit
    pub clock: VectorClock,
    /// Counters at exit
    pub counters: ProcessCounters,
}

/// Everything a completed run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Algorithm used by every process
    pub algorithm: Algorithm,
    /// Parameters of the run
    pub params: SimulationParams,
    /// Merged event log
    pub log: MergedLog,
    /// Per-process final state, indexed by process id
    pub processes: Vec<ProcessSummary>,
    /// Entries-per-message totals
    pub statistics: RunStatistics,
    /// Wall time from start to the last process exit
    pub elapsed: Duration,
}

impl RunReport {
    /// Write the merged log to `path`
    pub fn write_log(&self, path: &Path) -> Result<()> {
        self.log.write_to(path)
    }

    /// Serializable digest of the run
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            algorithm: self.algorithm,
            n: self.params.n,
            m: self.params.m,
            events: self.log.len(),
            messages: self.statistics.messages,
            total_entries: self.statistics.total_entries,
            average_entries: self.statistics.average_entries(),
            elapsed_ms: self.elapsed.as_millis() as u64,
            processes: self.processes.clone(),
        }
    }
}

/// JSON-friendly digest of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Algorithm
    pub algorithm: Algorithm,
    /// Process count
    pub n: usize,
    /// Send quota per process
    pub m: u64,
    /// Merged log lines
    pub events: usize,
    /// Messages sent
    pub messages: u64,
    /// Entries sent
    pub total_entries: u64,
    /// Average entries per message
    pub average_entries: f64,
    /// Run duration in milliseconds
    pub elapsed_ms: u64,
    /// Final per-process state
    pub processes: Vec<ProcessSummary>,
}

impl RunSummary {
    /// Pretty-printed JSON form
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One configured simulation, runnable any number of times
#[derive(Debug, Clone)]
pub struct Simulation {
    config: SimulationConfig,
}

impl Simulation {
    /// Validate the configuration; fails before any process starts
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration of this simulation
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run every process to completion and merge their logs
    pub async fn run(&self) -> Result<RunReport> {
        let config = &self.config;
        let n = config.params.n;
        let started = Instant::now();
        info!(
            n,
            algorithm = %config.algorithm,
            lambda = config.params.lambda,
            alpha = config.params.alpha,
            m = config.params.m,
            seed = ?config.settings.seed,
            "starting simulation"
        );

        let (registry, mailboxes) = MailboxRegistry::new(n);
        let registry = Arc::new(registry);
        let board = Arc::new(ProgressBoard::new(n));
        let (stop, signal) = StopHandle::new();
        let sequencer = Sequencer::new();

        let workers: Vec<_> = mailboxes
            .into_iter()
            .map(|mailbox| {
                let neighbors = config.topology.neighbors(mailbox.owner()).to_vec();
                let process = LogicalProcess::new(
                    mailbox,
                    neighbors,
                    config.algorithm,
                    config.params,
                    &config.settings,
                    ProcessContext {
                        registry: registry.clone(),
                        board: board.clone(),
                        sequencer: sequencer.clone(),
                        stop: signal.clone(),
                    },
                );
                tokio::spawn(process.run())
            })
            .collect();

        let coordinator = tokio::spawn(
            TerminationCoordinator::new(
                board.clone(),
                config.params.m,
                config.settings.poll_interval(),
                config.settings.stop_grace(),
                stop.clone(),
            )
            .run(),
        );

        let mut reports: Vec<ProcessReport> = Vec::with_capacity(n);
        let mut failure = None;
        for (index, worker) in workers.into_iter().enumerate() {
            match worker.await {
                Ok(report) => reports.push(report),
                Err(err) => {
                    error!(pid = index + 1, error = %err, "process worker failed");
                    // Release the remaining workers; the coordinator may
                    // never see this process reach its quota.
                    stop.stop();
                    if failure.is_none() {
                        failure = Some(SimError::process_failed(index, err.to_string()));
                    }
                }
            }
        }

        if let Some(err) = failure {
            coordinator.abort();
            return Err(err);
        }
        coordinator
            .await
            .map_err(|err| SimError::process_failed(n, format!("coordinator: {err}")))?;

        let elapsed = started.elapsed();
        let processes: Vec<ProcessSummary> = reports
            .iter()
            .map(|report| ProcessSummary {
                id: report.id,
                clock: report.clock.clone(),
                counters: report.counters,
            })
            .collect();
        let log = MergedLog::merge(
            reports.into_iter().map(|report| report.log),
            config.settings.merge_order,
        );
        let statistics = RunStatistics::from_records(log.records());

        debug!(events = log.len(), "merged process logs");
        info!(
            algorithm = %config.algorithm,
            messages = statistics.messages,
            average_entries = statistics.average_entries(),
            elapsed_ms = elapsed.as_millis() as u64,
            "simulation complete"
        );

        Ok(RunReport {
            algorithm: config.algorithm,
            params: config.params,
            log,
            processes,
            statistics,
            elapsed,
        })
    }
}

/// Validate, run once and return the report
pub async fn run_simulation(config: SimulationConfig) -> Result<RunReport> {
    Simulation::new(config)?.run().await
}
