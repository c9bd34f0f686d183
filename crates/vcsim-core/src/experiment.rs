//! Repeated VC/SK comparison over a range of process counts
//!
//! For every `n` in the plan, both algorithms run `trials` times on a fully
//! connected topology and their per-run averages are reduced to one
//! [`ComparisonRow`].

use crate::algorithm::Algorithm;
use crate::config::{RunSettings, SimulationConfig};
use crate::errors::{ErrorCollector, Result};
use crate::params::{SimulationParams, Topology};
use crate::simulation::Simulation;
use crate::stats::TrialSummary;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::ops::RangeInclusive;
use tracing::info;

/// Header line of the comparison table
pub const TABLE_HEADER: &str = "n, VC (avg), SK (avg), Reduction %";

/// What to run in a comparison experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentPlan {
    /// Process counts to compare
    pub process_counts: RangeInclusive<usize>,
    /// Runs per `(n, algorithm)` pair
    pub trials: usize,
    /// Mean inter-event delay
    pub lambda: f64,
    /// Internal-event factor
    pub alpha: f64,
    /// Send quota per process
    pub m: u64,
    /// Base seed; trial `t` of size `n` uses a seed derived from both
    pub seed: Option<u64>,
    /// Pacing shared by every run
    pub settings: RunSettings,
}

impl Default for ExperimentPlan {
    fn default() -> Self {
        Self {
            process_counts: 10..=15,
            trials: 3,
            lambda: 2.0,
            alpha: 0.2,
            m: 50,
            seed: None,
            settings: RunSettings::default(),
        }
    }
}

impl ExperimentPlan {
    /// Check the plan before running anything
    pub fn validate(&self) -> Result<()> {
        let mut errors = ErrorCollector::new();
        if self.process_counts.is_empty() {
            errors.parameter(
                "process_counts",
                format!(
                    "range {}..={} is empty",
                    self.process_counts.start(),
                    self.process_counts.end()
                ),
            );
        }
        if *self.process_counts.start() == 0 {
            errors.parameter("process_counts", "must start at 1 or more");
        }
        if self.trials == 0 {
            errors.parameter("trials", "must be at least 1");
        }
        errors.into_result(())
    }

    /// Configuration of one trial; both algorithms share the seed
    pub fn trial_config(&self, n: usize, trial: usize, algorithm: Algorithm) -> SimulationConfig {
        let mut settings = self.settings.clone();
        settings.seed = self.seed.map(|base| {
            base.wrapping_mul(1_000_003)
                .wrapping_add((n as u64) << 16)
                .wrapping_add(trial as u64)
        });
        SimulationConfig {
            params: SimulationParams {
                n,
                lambda: self.lambda,
                alpha: self.alpha,
                m: self.m,
            },
            topology: Topology::fully_connected(n),
            algorithm,
            settings,
        }
    }
}

/// Averages of both algorithms for one process count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    /// Process count
    pub n: usize,
    /// Mean entries per message under VC
    pub vc_average: f64,
    /// Mean entries per message under SK
    pub sk_average: f64,
    /// `(vc - sk) / vc * 100`, zero when VC sent nothing
    pub reduction_percent: f64,
}

impl ComparisonRow {
    /// Row from the trial summaries of both algorithms
    pub fn from_summaries(vc: &TrialSummary, sk: &TrialSummary) -> Self {
        let vc_average = vc.mean();
        let sk_average = sk.mean();
        let reduction_percent = if vc_average > 0.0 {
            (vc_average - sk_average) / vc_average * 100.0
        } else {
            0.0
        };
        Self {
            n: vc.n,
            vc_average,
            sk_average,
            reduction_percent,
        }
    }
}

/// Run every trial of `plan` and return one row per process count
pub async fn run_experiment(plan: &ExperimentPlan) -> Result<Vec<ComparisonRow>> {
    plan.validate()?;
    let mut rows = Vec::new();

    for n in plan.process_counts.clone() {
        let mut vc = TrialSummary::new(n, Algorithm::Vc);
        let mut sk = TrialSummary::new(n, Algorithm::Sk);

        for trial in 0..plan.trials {
            for algorithm in Algorithm::ALL {
                let report = Simulation::new(plan.trial_config(n, trial, algorithm))?
                    .run()
                    .await?;
                let summary = match algorithm {
                    Algorithm::Vc => &mut vc,
                    Algorithm::Sk => &mut sk,
                };
                summary.push(&report.statistics);
            }
        }

        let row = ComparisonRow::from_summaries(&vc, &sk);
        info!(
            n,
            vc = row.vc_average,
            sk = row.sk_average,
            reduction = row.reduction_percent,
            "process count compared"
        );
        rows.push(row);
    }

    Ok(rows)
}

/// Render rows as the comparison table, two decimals per figure
pub fn render_table(rows: &[ComparisonRow]) -> String {
    let mut out = String::from(TABLE_HEADER);
    out.push('\n');
    for row in rows {
        let _ = writeln!(
            out,
            "{}, {:.2}, {:.2}, {:.2}",
            row.n, row.vc_average, row.sk_average, row.reduction_percent
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::RunStatistics;

    #[test]
    fn test_default_plan() {
        let plan = ExperimentPlan::default();
        assert_eq!(plan.process_counts, 10..=15);
        assert_eq!(plan.trials, 3);
        assert_eq!(plan.m, 50);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_empty_plan_rejected() {
        let plan = ExperimentPlan {
            process_counts: 0..=0,
            trials: 0,
            ..ExperimentPlan::default()
        };
        let err = plan.validate().unwrap_err();
        assert!(err.to_string().contains("trials"));
        assert!(err.to_string().contains("process_counts"));
    }

    #[test]
    fn test_trial_seeds_shared_across_algorithms() {
        let plan = ExperimentPlan {
            seed: Some(4),
            ..ExperimentPlan::default()
        };
        let vc = plan.trial_config(10, 1, Algorithm::Vc);
        let sk = plan.trial_config(10, 1, Algorithm::Sk);
        assert_eq!(vc.settings.seed, sk.settings.seed);
        assert_ne!(vc.settings.seed, plan.trial_config(10, 2, Algorithm::Vc).settings.seed);
    }

    #[test]
    fn test_reduction_and_table() {
        let mut vc = TrialSummary::new(4, Algorithm::Vc);
        let mut sk = TrialSummary::new(4, Algorithm::Sk);
        vc.push(&RunStatistics {
            messages: 2,
            total_entries: 8,
        });
        sk.push(&RunStatistics {
            messages: 2,
            total_entries: 6,
        });

        let row = ComparisonRow::from_summaries(&vc, &sk);
        assert_eq!(row.reduction_percent, 25.0);
        assert_eq!(
            render_table(&[row]),
            "n, VC (avg), SK (avg), Reduction %\n4, 4.00, 3.00, 25.00\n"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_small_experiment() {
        let plan = ExperimentPlan {
            process_counts: 2..=3,
            trials: 1,
            lambda: 0.0,
            alpha: 0.0,
            m: 4,
            seed: Some(8),
            settings: RunSettings::fast(0),
        };
        let rows = run_experiment(&plan).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].n, 2);
        assert_eq!(rows[0].vc_average, 2.0);
        assert_eq!(rows[1].vc_average, 3.0);
        for row in &rows {
            assert!(row.sk_average >= 1.0);
            assert!(row.sk_average <= row.vc_average);
        }
    }
}
