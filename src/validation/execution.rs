// src/validation/execution.rs

//! L3: a short real run.
//!
//! The deck runs for a handful of steps with frequent thermo output. The
//! run fails on engine-reported particle loss, on dangerous neighbor list
//! builds and on a thermo series that blows up.

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::deck::parse_command;
use crate::tools::lammps::EngineSearch;
use crate::validation::engine::{classify_engine_output, execute, execution_failure, rewrite_deck};
use crate::validation::outcome::{L3Outcome, MAX_ENGINE_OUTPUT_CHARS, truncate_chars};
use crate::validation::thermo::{check_thermo_sanity, parse_thermo_output};

pub const DEFAULT_L3_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_L3_STEPS: u32 = 20;
pub const THERMO_FREQUENCY: u32 = 5;

pub const THERMO_STYLE: &str = "thermo_style custom step temp press pe ke etotal";

/// Output that means particles escaped or the integrator failed.
pub const EXPLOSION_PATTERNS: [&str; 3] = ["Lost atoms", "Atom lost", "Out of range"];

/// Errors that only show up once the system actually moves.
pub const RUNTIME_ERROR_PATTERNS: [&str; 5] = ["Lost atoms", "Atom lost", "Out of range", "Bond atom", "Shake"];

pub const COMPLETION_MARKERS: [&str; 2] = ["Total wall time", "Loop time"];

static DANGEROUS_BUILDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Dangerous builds\s*=\s*(\d+)").expect("dangerous builds regex"));

pub fn create_minimal_step_deck(content: &str, steps: u32) -> String {
    let mut thermo_found = false;
    let mut lines = rewrite_deck(content, &format!("run {steps}"), |command, _| match command {
        "run" => Some(format!("run {steps}")),
        "minimize" => Some(format!("minimize 1e-4 1e-6 {steps} {}", steps * 10)),
        "thermo" => {
            thermo_found = true;
            Some(format!("thermo {THERMO_FREQUENCY}"))
        }
        _ => None,
    });

    if !thermo_found {
        let insert_at = lines
            .iter()
            .position(|line| {
                parse_command(line).is_some_and(|(command, _)| command == "run" || command == "fix")
            })
            .unwrap_or(lines.len());
        lines.insert(insert_at, format!("thermo {THERMO_FREQUENCY}"));
        lines.insert(insert_at, THERMO_STYLE.to_string());
    }

    lines.join("\n")
}

/// Particle loss or a non-zero dangerous build count anywhere in the output.
pub fn detect_explosion(output: &str) -> bool {
    EXPLOSION_PATTERNS.iter().any(|pattern| output.contains(pattern))
        || DANGEROUS_BUILDS
            .captures(output)
            .and_then(|caps| caps[1].parse::<u64>().ok())
            .is_some_and(|count| count > 0)
}

pub fn validate_l3(
    content: &str,
    search: &EngineSearch,
    steps: u32,
    timeout: Duration,
    context_files: &[PathBuf],
) -> L3Outcome {
    let Some(binary) = search.resolve() else {
        return L3Outcome::skipped();
    };

    let deck = create_minimal_step_deck(content, steps);
    let run = match execute(&binary, &deck, context_files, timeout, "lammps_l3_") {
        Ok(run) => run,
        Err(err) => {
            let (detail, elapsed) = execution_failure(&err);
            return L3Outcome::failure(detail, elapsed);
        }
    };

    let issues = classify_engine_output(&run.output, run.return_code, &RUNTIME_ERROR_PATTERNS);
    let thermo_data = parse_thermo_output(&run.output);
    let sanity = check_thermo_sanity(&thermo_data);

    let completed = run.return_code == 0
        || COMPLETION_MARKERS
            .iter()
            .any(|marker| run.output.contains(marker));
    let exploded = detect_explosion(&run.output);

    let mut details = issues;
    if completed && !exploded {
        details.push(format!("LAMMPS execution completed ({steps} steps)"));
    }
    if exploded {
        details.push("Simulation explosion detected in LAMMPS output".to_string());
    }
    if !thermo_data.is_empty() {
        details.push(format!("Parsed {} thermo data points", thermo_data.len()));
    }

    L3Outcome {
        passed: completed && !exploded && sanity.passed,
        engine_output: truncate_chars(&run.output, MAX_ENGINE_OUTPUT_CHARS),
        return_code: run.return_code,
        execution_time: run.elapsed.as_secs_f64(),
        steps_run: steps,
        thermo_data,
        thermo_warnings: sanity.warnings,
        details,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{DEFAULT_L3_STEPS, create_minimal_step_deck, detect_explosion, validate_l3};
    use crate::tools::lammps::EngineSearch;

    #[test]
    fn thermo_pair_goes_before_first_fix() {
        let deck = "units lj\nvelocity all create 1.0 1\nfix 1 all nve\nrun 1000\n";
        let rewritten = create_minimal_step_deck(deck, 20);
        assert_eq!(
            rewritten,
            "units lj\nvelocity all create 1.0 1\nthermo_style custom step temp press pe ke etotal\nthermo 5\nfix 1 all nve\nrun 20\n"
        );
    }

    #[test]
    fn existing_thermo_frequency_is_forced() {
        let deck = "thermo_style one\nthermo 1000\nminimize 1e-8 1e-8 5000 50000\n";
        let rewritten = create_minimal_step_deck(deck, 10);
        assert_eq!(
            rewritten,
            "thermo_style one\nthermo 5\nminimize 1e-4 1e-6 10 100\n\nrun 10"
        );
    }

    #[test]
    fn thermo_lands_at_end_without_run_or_fix() {
        let rewritten = create_minimal_step_deck("units lj", 20);
        assert_eq!(
            rewritten,
            "units lj\nthermo_style custom step temp press pe ke etotal\nthermo 5\nrun 20"
        );
    }

    #[test]
    fn explosion_markers_are_detected() {
        assert!(detect_explosion("ERROR: Lost atoms: original 32000 current 31998"));
        assert!(detect_explosion("Neighbor list builds = 3\nDangerous builds = 2\n"));
        assert!(!detect_explosion("Neighbor list builds = 3\nDangerous builds = 0\n"));
        assert!(!detect_explosion("Loop time of 0.1 on 1 procs"));
    }

    #[test]
    fn absent_engine_skips_with_zero_steps() {
        let outcome = validate_l3(
            "units lj\n",
            &EngineSearch::none(),
            DEFAULT_L3_STEPS,
            Duration::from_secs(1),
            &[],
        );
        assert!(outcome.passed);
        assert_eq!(outcome.steps_run, 0);
        assert!(outcome.details[0].contains("skipped"));
    }
}
