//! `vcsim gen-params`: write a parameter file

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use vcsim_core::{render_params, SimulationParams, Topology};

/// Generated topology shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TopologyKind {
    /// Every process connected to every other
    Full,
    /// Each process connected to its two ring neighbors
    Ring,
}

/// Arguments of `vcsim gen-params`
#[derive(Debug, Clone, Args)]
pub struct GenParamsArgs {
    /// Number of processes
    #[arg(short = 'n', long)]
    pub processes: usize,

    /// Mean inter-event delay
    #[arg(long, default_value_t = 2.0)]
    pub lambda: f64,

    /// Internal-event factor
    #[arg(long, default_value_t = 0.2)]
    pub alpha: f64,

    /// Messages each process must send
    #[arg(short, long, default_value_t = 50)]
    pub messages: u64,

    /// Topology shape
    #[arg(short, long, value_enum, default_value_t = TopologyKind::Full)]
    pub topology: TopologyKind,

    /// Destination file; stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Render the parameter file and write or print it
pub fn handle_gen_params(args: GenParamsArgs) -> Result<()> {
    let text = generate(&args)?;
    match &args.output {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("writing parameter file {}", path.display()))?,
        None => print!("{text}"),
    }
    Ok(())
}

fn generate(args: &GenParamsArgs) -> Result<String> {
    let params = SimulationParams {
        n: args.processes,
        lambda: args.lambda,
        alpha: args.alpha,
        m: args.messages,
    };
    params.validate()?;

    let topology = match args.topology {
        TopologyKind::Full => Topology::fully_connected(args.processes),
        TopologyKind::Ring => Topology::ring(args.processes),
    };
    Ok(render_params(&params, &topology))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vcsim_core::ParameterFile;

    fn args(processes: usize, topology: TopologyKind) -> GenParamsArgs {
        GenParamsArgs {
            processes,
            lambda: 2.0,
            alpha: 0.2,
            messages: 50,
            topology,
            output: None,
        }
    }

    #[test]
    fn test_generated_file_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inp-params.txt");
        let mut gen_args = args(5, TopologyKind::Ring);
        gen_args.output = Some(path.clone());

        handle_gen_params(gen_args).unwrap();
        let file = ParameterFile::load(&path).unwrap();

        assert_eq!(file.params.n, 5);
        assert_eq!(file.topology, Topology::ring(5));
    }

    #[test]
    fn test_full_topology_text() {
        let text = generate(&args(3, TopologyKind::Full)).unwrap();
        assert_eq!(text, "3 2 0.2 50\n2 3\n1 3\n1 2\n");
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let mut bad = args(0, TopologyKind::Full);
        bad.alpha = -1.0;
        assert!(generate(&bad).is_err());
    }
}
