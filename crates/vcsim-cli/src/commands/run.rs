//! `vcsim run`: one simulation from a parameter file

use super::load_settings;
use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use tracing::info;
use vcsim_core::{Algorithm, ParameterFile, RunSummary, Simulation, SimulationConfig};

/// Arguments of `vcsim run`
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Clock algorithm: VC or SK
    pub algorithm: String,

    /// Parameter file (`n λ α m` followed by one adjacency row per process)
    #[arg(default_value = "inp-params.txt")]
    pub params: PathBuf,

    /// Merged log destination [default: common_log_<ALGORITHM>.txt]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Seed for reproducible event choices
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run one simulation, write its log and print a summary
pub async fn handle_run(args: RunArgs, config: Option<&Path>) -> Result<()> {
    let summary = execute(&args, config).await?;

    if args.json {
        println!("{}", summary.to_json()?);
    } else {
        println!("Algorithm: {}", summary.algorithm);
        println!("Processes: {}", summary.n);
        println!("Messages sent: {}", summary.messages);
        println!("Entries sent: {}", summary.total_entries);
        println!("Average entries per message: {:.2}", summary.average_entries);
        println!("Logged events: {}", summary.events);
    }
    Ok(())
}

async fn execute(args: &RunArgs, config: Option<&Path>) -> Result<RunSummary> {
    let algorithm: Algorithm = args.algorithm.parse()?;
    let mut settings = load_settings(config)?;
    if args.seed.is_some() {
        settings.seed = args.seed;
    }

    let file = ParameterFile::load(&args.params)
        .with_context(|| format!("invalid parameter file {}", args.params.display()))?;
    let mut sim_config = SimulationConfig::from_parameter_file(file, algorithm);
    sim_config.settings = settings;

    let report = Simulation::new(sim_config)?.run().await?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(algorithm.default_log_name()));
    report
        .write_log(&output)
        .with_context(|| format!("writing merged log to {}", output.display()))?;
    info!(path = %output.display(), lines = report.log.len(), "merged log written");

    Ok(report.summary())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(dir: &Path, algorithm: &str) -> RunArgs {
        let params = dir.join("inp-params.txt");
        std::fs::write(&params, "3 0 0 2\n2 3\n1 3\n1 2\n").unwrap();
        RunArgs {
            algorithm: algorithm.to_string(),
            params,
            output: Some(dir.join("out.txt")),
            seed: Some(1),
            json: false,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_writes_log() {
        let dir = tempfile::tempdir().unwrap();
        let settings = dir.path().join("settings.toml");
        std::fs::write(&settings, "stop_grace_ms = 20\npoll_interval_ms = 5\ndrain_grace_ms = 5\n")
            .unwrap();

        let summary = execute(&args(dir.path(), "SK"), Some(&settings)).await.unwrap();

        assert_eq!(summary.messages, 6);
        let log = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(log.lines().count(), summary.events);
        assert!(log.contains("sends optimized message"));
    }

    #[tokio::test]
    async fn test_unknown_algorithm_fails_before_run() {
        let dir = tempfile::tempdir().unwrap();
        let err = execute(&args(dir.path(), "LAMPORT"), None).await.unwrap_err();

        assert!(err.to_string().contains("Unknown algorithm"));
        assert!(!dir.path().join("out.txt").exists());
    }

    #[tokio::test]
    async fn test_malformed_parameters_fail_before_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut run_args = args(dir.path(), "VC");
        std::fs::write(&run_args.params, "3 0 0\n").unwrap();
        run_args.output = Some(dir.path().join("never.txt"));

        assert!(execute(&run_args, None).await.is_err());
        assert!(!dir.path().join("never.txt").exists());
    }
}
