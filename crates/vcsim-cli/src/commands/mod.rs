//! Subcommand handlers

pub mod compare;
pub mod gen_params;
pub mod run;

use anyhow::{Context, Result};
use std::path::Path;
use vcsim_core::RunSettings;

/// Settings from `path`, or the defaults when no file was given
pub fn load_settings(path: Option<&Path>) -> Result<RunSettings> {
    match path {
        Some(path) => RunSettings::load(path)
            .with_context(|| format!("loading run settings from {}", path.display())),
        None => Ok(RunSettings::default()),
    }
}
