// src/validation/engine.rs

//! L2: does LAMMPS accept the deck at all?
//!
//! Every `run` becomes `run 0` and every `minimize` a zero-iteration
//! minimize, so the engine parses the deck, builds the system and sets up
//! the force field without advancing time.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::deck::parse_command;
use crate::error::{ReaperError, Result};
use crate::tools::lammps::{EngineRun, EngineSearch, run_engine};
use crate::validation::outcome::{L2Outcome, MAX_ENGINE_OUTPUT_CHARS, truncate_chars};
use crate::validation::workdir::{DECK_FILENAME, WorkingDirectory};

pub const DEFAULT_L2_TIMEOUT: Duration = Duration::from_secs(30);

/// Substrings that mark a line of engine output as an error.
pub const ERROR_PATTERNS: [&str; 8] = [
    "ERROR:",
    "ERROR on proc",
    "Illegal",
    "Unknown",
    "Cannot",
    "Invalid",
    "Missing",
    "Expected",
];

pub const WARNING_PATTERNS: [&str; 2] = ["WARNING:", "Warning:"];

/// Rewrites a deck line by line, appending `fallback_run` if it has no `run`.
pub(crate) fn rewrite_deck(
    content: &str,
    fallback_run: &str,
    mut rewrite: impl FnMut(&str, &str) -> Option<String>,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut run_found = false;

    for line in content.split('\n') {
        let replaced = parse_command(line).and_then(|(command, _)| {
            if command == "run" {
                run_found = true;
            }
            rewrite(command.as_str(), line)
        });
        lines.push(replaced.unwrap_or_else(|| line.to_string()));
    }

    if !run_found {
        lines.push(fallback_run.to_string());
    }
    lines
}

pub fn create_zero_step_deck(content: &str) -> String {
    rewrite_deck(content, "run 0", |command, _| match command {
        "run" => Some("run 0".to_string()),
        "minimize" => Some("minimize 0 0 0 0".to_string()),
        _ => None,
    })
    .join("\n")
}

/// Turns raw engine output into `LAMMPS Error:` / `LAMMPS Warning:` details.
///
/// A line can produce one error and one warning. When the process failed
/// without any recognisable error line, a generic exit-code detail is added.
pub fn classify_engine_output(output: &str, return_code: i32, extra_errors: &[&str]) -> Vec<String> {
    let mut issues = Vec::new();

    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if ERROR_PATTERNS
            .iter()
            .chain(extra_errors)
            .any(|pattern| line.contains(pattern))
        {
            issues.push(format!("LAMMPS Error: {line}"));
        }
        if WARNING_PATTERNS.iter().any(|pattern| line.contains(pattern)) {
            issues.push(format!("LAMMPS Warning: {line}"));
        }
    }

    if return_code != 0 && !has_error(&issues) {
        issues.push(format!("LAMMPS exited with return code {return_code}"));
    }
    issues
}

pub(crate) fn has_error(issues: &[String]) -> bool {
    issues.iter().any(|issue| issue.contains("Error"))
}

/// Materialises a scratch directory, runs the engine, releases the directory.
pub(crate) fn execute(
    binary: &Path,
    deck: &str,
    context_files: &[PathBuf],
    timeout: Duration,
    prefix: &str,
) -> Result<EngineRun> {
    let workdir = WorkingDirectory::create(prefix)?;
    let deck_path = workdir.materialize(deck, context_files)?;
    let deck_name = deck_path
        .file_name()
        .and_then(OsStr::to_str)
        .unwrap_or(DECK_FILENAME);
    run_engine(binary, deck_name, workdir.path(), timeout)
}

/// Detail text and reported duration for a run that never finished.
pub(crate) fn execution_failure(err: &ReaperError) -> (String, f64) {
    match err {
        ReaperError::EngineTimedOut { timeout } => (err.to_string(), timeout.as_secs_f64()),
        other => (format!("Error running LAMMPS: {other}"), 0.0),
    }
}

pub fn validate_l2(
    content: &str,
    search: &EngineSearch,
    timeout: Duration,
    context_files: &[PathBuf],
) -> L2Outcome {
    let Some(binary) = search.resolve() else {
        return L2Outcome::skipped();
    };

    let deck = create_zero_step_deck(content);
    let run = match execute(&binary, &deck, context_files, timeout, "lammps_l2_") {
        Ok(run) => run,
        Err(err) => {
            let (detail, elapsed) = execution_failure(&err);
            return L2Outcome::failure(detail, elapsed);
        }
    };

    let issues = classify_engine_output(&run.output, run.return_code, &[]);
    let passed = run.return_code == 0 && !has_error(&issues);
    let details = if issues.is_empty() {
        vec!["LAMMPS validation passed".to_string()]
    } else {
        issues
    };

    L2Outcome {
        passed,
        engine_output: truncate_chars(&run.output, MAX_ENGINE_OUTPUT_CHARS),
        return_code: run.return_code,
        execution_time: run.elapsed.as_secs_f64(),
        details,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{classify_engine_output, create_zero_step_deck, validate_l2};
    use crate::tools::lammps::EngineSearch;

    #[test]
    fn runs_and_minimizes_become_zero_step() {
        let deck = "units lj\nminimize 1e-4 1e-6 100 1000\nRun 5000 # production\n# run 10\n";
        let rewritten = create_zero_step_deck(deck);
        assert_eq!(
            rewritten,
            "units lj\nminimize 0 0 0 0\nrun 0\n# run 10\n"
        );
    }

    #[test]
    fn missing_run_is_appended() {
        let rewritten = create_zero_step_deck("units lj\natom_style atomic");
        assert_eq!(rewritten, "units lj\natom_style atomic\nrun 0");
    }

    #[test]
    fn error_and_warning_lines_are_classified() {
        let output = "LAMMPS (2 Aug 2023)\nWARNING: Using 'neigh_modify every 1'\nERROR: Unknown pair style lj/cutt (src/force.cpp:275)\n";
        let issues = classify_engine_output(output, 1, &[]);
        assert_eq!(
            issues,
            vec![
                "LAMMPS Warning: WARNING: Using 'neigh_modify every 1'",
                "LAMMPS Error: ERROR: Unknown pair style lj/cutt (src/force.cpp:275)",
            ]
        );
    }

    #[test]
    fn silent_failure_reports_exit_code() {
        let issues = classify_engine_output("Segmentation fault\n", 139, &[]);
        assert_eq!(issues, vec!["LAMMPS exited with return code 139"]);
        assert!(classify_engine_output("all good\n", 0, &[]).is_empty());
    }

    #[test]
    fn extra_patterns_extend_the_error_set() {
        let issues = classify_engine_output("ERROR: Lost atoms: original 4000 current 3998", 1, &["Lost atoms"]);
        assert_eq!(issues.len(), 1);
        let issues = classify_engine_output("Bond atom missing at step 10", 0, &["Bond atom"]);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn absent_engine_skips_and_passes() {
        let outcome = validate_l2("units lj\n", &EngineSearch::none(), Duration::from_secs(1), &[]);
        assert!(outcome.passed);
        assert_eq!(outcome.return_code, -1);
        assert!(outcome.details[0].contains("skipped"));
    }
}
