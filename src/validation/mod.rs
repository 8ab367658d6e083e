// src/validation/mod.rs

//! Staged deck validation.
//!
//! | Level | Checks | Needs LAMMPS |
//! |---|---|---|
//! | L0 | unresolved template placeholders | no |
//! | L1 | required commands, delimiters, timestep and temperature ranges | no |
//! | L2 | the engine accepts the deck with zero steps | yes |
//! | L3 | a short run stays numerically sane | yes |
//!
//! [`validate_deck`] always runs every requested level in order. A missing
//! engine skips L2 and L3 without failing them.

pub mod engine;
pub mod execution;
pub mod outcome;
pub mod placeholders;
pub mod syntax;
pub mod thermo;
pub mod workdir;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use serde::Serialize;

use crate::error::Result;
use crate::tools::lammps::EngineSearch;

pub use engine::{DEFAULT_L2_TIMEOUT, validate_l2};
pub use execution::{DEFAULT_L3_STEPS, DEFAULT_L3_TIMEOUT, validate_l3};
pub use outcome::{AggregateValidation, L0Outcome, L1Outcome, L2Outcome, L3Outcome, ThermoSample};
pub use placeholders::validate_l0;
pub use syntax::validate_l1;
pub use workdir::{WorkingDirectory, cleanup_working_directory, setup_working_directory};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Serialize)]
pub enum Level {
    #[value(name = "L0", alias = "l0")]
    L0,
    #[value(name = "L1", alias = "l1")]
    L1,
    #[value(name = "L2", alias = "l2")]
    L2,
    #[default]
    #[value(name = "L3", alias = "l3")]
    L3,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::L0 => "L0",
            Self::L1 => "L1",
            Self::L2 => "L2",
            Self::L3 => "L3",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ValidationOptions {
    pub search: EngineSearch,
    /// Files copied next to the deck for L2 and L3.
    pub context_files: Vec<PathBuf>,
    pub l2_timeout: Duration,
    pub l3_timeout: Duration,
    pub l3_steps: u32,
    /// Levels above this one are reported as not run.
    pub max_level: Level,
}

impl ValidationOptions {
    pub fn new(search: EngineSearch) -> Self {
        Self {
            search,
            context_files: Vec::new(),
            l2_timeout: DEFAULT_L2_TIMEOUT,
            l3_timeout: DEFAULT_L3_TIMEOUT,
            l3_steps: DEFAULT_L3_STEPS,
            max_level: Level::L3,
        }
    }

    pub fn with_context_files(mut self, files: Vec<PathBuf>) -> Self {
        self.context_files = files;
        self
    }

    pub fn with_max_level(mut self, level: Level) -> Self {
        self.max_level = level;
        self
    }
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self::new(EngineSearch::none())
    }
}

fn not_requested(level: Level, max_level: Level) -> String {
    format!("{level} not run (validation limited to {max_level})")
}

/// Runs L0 through L3 on `content`. Blocks while LAMMPS runs.
pub fn validate_deck(content: &str, options: &ValidationOptions) -> AggregateValidation {
    let max = options.max_level;

    let l0 = validate_l0(content);

    let l1 = if max >= Level::L1 {
        validate_l1(content)
    } else {
        L1Outcome {
            passed: true,
            details: vec![not_requested(Level::L1, max)],
            ..L1Outcome::default()
        }
    };

    let l2 = if max >= Level::L2 {
        validate_l2(content, &options.search, options.l2_timeout, &options.context_files)
    } else {
        L2Outcome {
            passed: true,
            return_code: -1,
            details: vec![not_requested(Level::L2, max)],
            ..L2Outcome::default()
        }
    };

    let l3 = if max >= Level::L3 {
        validate_l3(
            content,
            &options.search,
            options.l3_steps,
            options.l3_timeout,
            &options.context_files,
        )
    } else {
        L3Outcome {
            passed: true,
            return_code: -1,
            details: vec![not_requested(Level::L3, max)],
            ..L3Outcome::default()
        }
    };

    let mut issues = Vec::new();
    if !l0.passed {
        issues.push(format!(
            "L0: {} unresolved placeholder(s) found",
            l0.unresolved_count
        ));
    }
    if !l1.passed {
        issues.push(format!(
            "L1: {} syntax error(s), {} critical physics error(s)",
            l1.syntax_errors.len(),
            l1.critical_physics_count()
        ));
    }
    if !l2.passed {
        issues.push("L2: engine acceptance failed".to_string());
    }
    if !l3.passed {
        issues.push("L3: minimal execution failed".to_string());
    }

    AggregateValidation {
        l0,
        l1,
        l2,
        l3,
        issues,
    }
}

/// [`validate_deck`] on the blocking pool, for async callers.
pub async fn validate_deck_blocking(
    content: String,
    options: ValidationOptions,
) -> Result<AggregateValidation> {
    let validation =
        tokio::task::spawn_blocking(move || validate_deck(&content, &options)).await?;
    Ok(validation)
}
