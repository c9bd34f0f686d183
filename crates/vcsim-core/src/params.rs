//! Run parameters and communication topology
//!
//! The external parameter file (`inp-params.txt`) looks like:
//!
//! ```text
//! 3 5 1.5 40
//! 2 3
//! 1 3
//! 1 2
//! ```
//!
//! Line one is `n λ α m`; the next `n` lines list each process's outbound
//! neighbors using 1-based ids. Ids are converted to 0-based on load and back
//! to 1-based on render.

use crate::clock::ProcessId;
use crate::errors::{ErrorCollector, Result, ResultExt, SimError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

/// Largest process count a run accepts; each process is its own task
pub const MAX_PROCESSES: usize = 4096;

/// Scalar run parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Number of processes
    pub n: usize,
    /// Mean inter-event delay, in time units
    pub lambda: f64,
    /// Internal-event factor; internal probability is `α / (α + 1)`
    pub alpha: f64,
    /// Messages each process must send before the run may stop
    pub m: u64,
}

impl SimulationParams {
    /// Probability that a generated event is internal
    pub fn internal_probability(&self) -> f64 {
        self.alpha / (self.alpha + 1.0)
    }

    /// Record every problem with these parameters in `errors`
    pub fn check(&self, errors: &mut ErrorCollector) {
        if self.n == 0 {
            errors.parameter("n", "must be at least 1");
        }
        if self.n > MAX_PROCESSES {
            errors.parameter(
                "n",
                format!("must be at most {MAX_PROCESSES}, got {}", self.n),
            );
        }
        if !self.lambda.is_finite() || self.lambda < 0.0 {
            errors.parameter("lambda", format!("must be finite and >= 0, got {}", self.lambda));
        }
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            errors.parameter("alpha", format!("must be finite and >= 0, got {}", self.alpha));
        }
    }

    /// Validate on their own
    pub fn validate(&self) -> Result<()> {
        let mut errors = ErrorCollector::new();
        self.check(&mut errors);
        errors.into_result(())
    }
}

/// Static adjacency list, 0-based
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    neighbors: Vec<Vec<ProcessId>>,
}

impl Topology {
    /// Topology from 0-based neighbor rows
    pub fn from_rows(rows: Vec<Vec<usize>>) -> Self {
        Self {
            neighbors: rows
                .into_iter()
                .map(|row| row.into_iter().map(ProcessId).collect())
                .collect(),
        }
    }

    /// Every process connected to every other
    pub fn fully_connected(n: usize) -> Self {
        Self::from_rows(
            (0..n)
                .map(|i| (0..n).filter(|j| *j != i).collect())
                .collect(),
        )
    }

    /// Bidirectional ring `0 ↔ 1 ↔ … ↔ n-1 ↔ 0`
    pub fn ring(n: usize) -> Self {
        Self::from_rows(
            (0..n)
                .map(|i| {
                    let next = (i + 1) % n;
                    let prev = (i + n - 1) % n;
                    let mut row: Vec<usize> = [prev, next]
                        .into_iter()
                        .filter(|j| *j != i)
                        .collect();
                    row.sort_unstable();
                    row.dedup();
                    row
                })
                .collect(),
        )
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    /// True when there are no rows
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    /// Outbound neighbors of `process`
    pub fn neighbors(&self, process: ProcessId) -> &[ProcessId] {
        self.neighbors
            .get(process.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Record every problem with this topology for `n` processes
    pub fn check(&self, n: usize, errors: &mut ErrorCollector) {
        if self.neighbors.len() != n {
            errors.topology(format!(
                "expected {n} adjacency rows, got {}",
                self.neighbors.len()
            ));
        }
        for (row, neighbors) in self.neighbors.iter().enumerate() {
            let owner = ProcessId(row);
            let mut seen = BTreeSet::new();
            for neighbor in neighbors {
                if neighbor.index() >= n {
                    errors.topology(format!(
                        "{owner} lists unknown neighbor {}",
                        neighbor.external()
                    ));
                } else if *neighbor == owner {
                    errors.topology(format!("{owner} lists itself as a neighbor"));
                } else if !seen.insert(*neighbor) {
                    errors.topology(format!("{owner} lists {neighbor} more than once"));
                }
            }
        }
    }
}

/// Parameters plus topology, as read from one parameter file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterFile {
    /// Scalar parameters
    pub params: SimulationParams,
    /// Adjacency list
    pub topology: Topology,
}

impl ParameterFile {
    /// Load and validate a parameter file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .io_context(&format!("reading {}", path.display()))?;
        parse_params(&text)
    }

    /// Render and write a parameter file
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, render_params(&self.params, &self.topology))
            .io_context(&format!("writing {}", path.display()))
    }
}

/// Parse the text form of a parameter file
///
/// Rows after the header are read in order; an empty row is an isolated
/// process. Missing trailing rows are treated as empty.
pub fn parse_params(text: &str) -> Result<ParameterFile> {
    let mut lines = text.lines();
    let header = lines
        .by_ref()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| SimError::invalid_parameters("parameter file is empty"))?;

    let fields: Vec<&str> = header.split_whitespace().collect();
    if fields.len() != 4 {
        return Err(SimError::invalid_parameters(format!(
            "header must be `n lambda alpha m`, got {} fields",
            fields.len()
        )));
    }

    let mut errors = ErrorCollector::new();
    let n = fields[0].parse::<usize>().unwrap_or_else(|e| {
        errors.parameter("n", format!("'{}' is not a count: {e}", fields[0]));
        0
    });
    let lambda = fields[1].parse::<f64>().unwrap_or_else(|e| {
        errors.parameter("lambda", format!("'{}' is not a number: {e}", fields[1]));
        f64::NAN
    });
    let alpha = fields[2].parse::<f64>().unwrap_or_else(|e| {
        errors.parameter("alpha", format!("'{}' is not a number: {e}", fields[2]));
        f64::NAN
    });
    let m = fields[3].parse::<u64>().unwrap_or_else(|e| {
        errors.parameter("m", format!("'{}' is not a count: {e}", fields[3]));
        0
    });
    if errors.has_errors() {
        return errors.into_result(ParameterFile {
            params: SimulationParams {
                n,
                lambda,
                alpha,
                m,
            },
            topology: Topology::from_rows(Vec::new()),
        });
    }

    let params = SimulationParams {
        n,
        lambda,
        alpha,
        m,
    };
    params.check(&mut errors);
    if errors.has_errors() {
        return errors.into_result(ParameterFile {
            params,
            topology: Topology::from_rows(Vec::new()),
        });
    }

    let mut rows = Vec::new();
    for (row, line) in lines.by_ref().take(n).enumerate() {
        let mut neighbors = Vec::new();
        for token in line.split_whitespace() {
            match token.parse::<usize>().ok().and_then(ProcessId::from_external) {
                Some(neighbor) => neighbors.push(neighbor.index()),
                None => errors.topology(format!(
                    "{} lists invalid neighbor id '{token}'",
                    ProcessId(row)
                )),
            }
        }
        rows.push(neighbors);
    }
    rows.resize_with(n, Vec::new);
    for (extra, line) in lines.enumerate() {
        if !line.trim().is_empty() {
            errors.topology(format!(
                "unexpected adjacency row {} after {n} processes: '{}'",
                n + extra + 1,
                line.trim()
            ));
        }
    }

    let topology = Topology::from_rows(rows);
    topology.check(n, &mut errors);
    errors.into_result(ParameterFile { params, topology })
}

/// Render parameters and topology in the parameter file format
pub fn render_params(params: &SimulationParams, topology: &Topology) -> String {
    let mut out = format!("{} {} {} {}\n", params.n, params.lambda, params.alpha, params.m);
    for row in &topology.neighbors {
        let ids: Vec<String> = row.iter().map(|p| p.external().to_string()).collect();
        let _ = writeln!(out, "{}", ids.join(" "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fully_connected_triangle() {
        let file = parse_params("3 0 0 2\n2 3\n1 3\n1 2\n").unwrap();

        assert_eq!(file.params.n, 3);
        assert_eq!(file.params.m, 2);
        assert_eq!(file.params.internal_probability(), 0.0);
        assert_eq!(file.topology, Topology::fully_connected(3));
        assert_eq!(
            file.topology.neighbors(ProcessId(0)),
            &[ProcessId(1), ProcessId(2)]
        );
    }

    #[test]
    fn test_empty_and_missing_rows_are_isolated_processes() {
        let file = parse_params("3 2.0 0.2 5\n2\n\n").unwrap();
        assert_eq!(file.topology.neighbors(ProcessId(0)), &[ProcessId(1)]);
        assert!(file.topology.neighbors(ProcessId(1)).is_empty());
        assert!(file.topology.neighbors(ProcessId(2)).is_empty());
    }

    #[test]
    fn test_bad_header_is_a_precondition_failure() {
        let err = parse_params("3 2.0 5\n").unwrap_err();
        assert!(matches!(err, SimError::InvalidParameters { .. }));

        let err = parse_params("three 2.0 0.2 5\n").unwrap_err();
        assert!(err.to_string().contains("not a count"));

        assert!(parse_params("").is_err());
    }

    #[test]
    fn test_negative_rates_rejected() {
        let err = parse_params("2 -1 -0.5 3\n2\n1\n").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("lambda"));
        assert!(message.contains("alpha"));
    }

    #[test]
    fn test_topology_problems_are_collected() {
        let err = parse_params("2 1 1 1\n2 2 1\n7 x\n").unwrap_err();
        assert!(err.is_precondition());
        let message = err.to_string();
        assert!(message.contains("more than once"));
        assert!(message.contains("itself"));
        assert!(message.contains("invalid neighbor id '7'") || message.contains("unknown neighbor 7"));
        assert!(message.contains("'x'"));
    }

    #[test]
    fn test_oversized_process_count_rejected_before_rows() {
        let err = parse_params("100000000000000 1 1 1\n").unwrap_err();
        assert!(matches!(err, SimError::InvalidParameters { .. }));
        assert!(err.to_string().contains("at most"));

        let over = format!("{} 0 0 1\n", MAX_PROCESSES + 1);
        assert!(parse_params(&over).is_err());
    }

    #[test]
    fn test_extra_adjacency_rows_rejected() {
        let err = parse_params("2 0 0 1\n2\n1\n1 2\n\n").unwrap_err();
        assert!(matches!(err, SimError::InvalidTopology { .. }));
        assert!(err.to_string().contains("unexpected adjacency row 3"));

        // Trailing blank lines are not rows
        assert!(parse_params("2 0 0 1\n2\n1\n\n\n").is_ok());
    }

    #[test]
    fn test_render_round_trips_generated_topologies() {
        let params = SimulationParams {
            n: 4,
            lambda: 2.0,
            alpha: 0.2,
            m: 50,
        };
        let topology = Topology::ring(4);
        let text = render_params(&params, &topology);

        assert!(text.starts_with("4 2 0.2 50\n2 4\n1 3\n"));
        assert_eq!(parse_params(&text).unwrap().topology, topology);
    }

    #[test]
    fn test_small_rings() {
        assert!(Topology::ring(1).neighbors(ProcessId(0)).is_empty());
        assert_eq!(Topology::ring(2).neighbors(ProcessId(0)), &[ProcessId(1)]);
    }

    #[test]
    fn test_load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inp-params.txt");
        let file = ParameterFile {
            params: SimulationParams {
                n: 3,
                lambda: 1.5,
                alpha: 0.5,
                m: 4,
            },
            topology: Topology::fully_connected(3),
        };

        file.save(&path).unwrap();
        assert_eq!(ParameterFile::load(&path).unwrap(), file);

        let missing = ParameterFile::load(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(missing, SimError::Io { .. }));
    }
}
