//! `vcsim compare`: VC versus SK over a range of process counts

use super::load_settings;
use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use vcsim_core::{render_table, run_experiment, ComparisonRow, ExperimentPlan};

/// Arguments of `vcsim compare`
#[derive(Debug, Clone, Args)]
pub struct CompareArgs {
    /// Smallest process count
    #[arg(long, default_value_t = 10)]
    pub min_n: usize,

    /// Largest process count
    #[arg(long, default_value_t = 15)]
    pub max_n: usize,

    /// Runs per process count and algorithm
    #[arg(long, default_value_t = 3)]
    pub trials: usize,

    /// Messages each process must send
    #[arg(short, long, default_value_t = 50)]
    pub messages: u64,

    /// Mean inter-event delay
    #[arg(long, default_value_t = 2.0)]
    pub lambda: f64,

    /// Internal-event factor
    #[arg(long, default_value_t = 0.2)]
    pub alpha: f64,

    /// Base seed for reproducible trials
    #[arg(long)]
    pub seed: Option<u64>,

    /// Also write the table to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print rows as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

impl CompareArgs {
    fn plan(&self, config: Option<&Path>) -> Result<ExperimentPlan> {
        let settings = load_settings(config)?;
        Ok(ExperimentPlan {
            process_counts: self.min_n..=self.max_n,
            trials: self.trials,
            lambda: self.lambda,
            alpha: self.alpha,
            m: self.messages,
            seed: self.seed.or(settings.seed),
            settings,
        })
    }
}

/// Run the comparison and print its table
pub async fn handle_compare(args: CompareArgs, config: Option<&Path>) -> Result<()> {
    let rows = execute(&args, config).await?;
    let table = render_table(&rows);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print!("{table}");
    }
    if let Some(path) = &args.output {
        std::fs::write(path, &table)
            .with_context(|| format!("writing comparison table to {}", path.display()))?;
    }
    Ok(())
}

async fn execute(args: &CompareArgs, config: Option<&Path>) -> Result<Vec<ComparisonRow>> {
    let plan = args.plan(config)?;
    Ok(run_experiment(&plan).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> CompareArgs {
        CompareArgs {
            min_n: 2,
            max_n: 3,
            trials: 1,
            messages: 3,
            lambda: 0.0,
            alpha: 0.0,
            seed: Some(12),
            output: None,
            json: false,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_compare_writes_table() {
        let dir = tempfile::tempdir().unwrap();
        let settings = dir.path().join("settings.toml");
        std::fs::write(&settings, "stop_grace_ms = 20\npoll_interval_ms = 5\ndrain_grace_ms = 5\n")
            .unwrap();
        let mut compare_args = args();
        compare_args.output = Some(dir.path().join("table.txt"));

        handle_compare(compare_args, Some(&settings)).await.unwrap();

        let table = std::fs::read_to_string(dir.path().join("table.txt")).unwrap();
        let mut lines = table.lines();
        assert_eq!(lines.next(), Some("n, VC (avg), SK (avg), Reduction %"));
        assert!(lines.next().is_some_and(|line| line.starts_with("2, 2.00, ")));
        assert!(lines.next().is_some_and(|line| line.starts_with("3, 3.00, ")));
    }

    #[test]
    fn test_seed_flag_overrides_settings() {
        let dir = tempfile::tempdir().unwrap();
        let settings = dir.path().join("settings.toml");
        std::fs::write(&settings, "seed = 5\n").unwrap();

        assert_eq!(args().plan(Some(&settings)).unwrap().seed, Some(12));
        let mut unseeded = args();
        unseeded.seed = None;
        assert_eq!(unseeded.plan(Some(&settings)).unwrap().seed, Some(5));
    }

    #[tokio::test]
    async fn test_empty_range_rejected() {
        let mut bad = args();
        bad.min_n = 4;
        bad.max_n = 3;
        assert!(execute(&bad, None).await.is_err());
    }
}
