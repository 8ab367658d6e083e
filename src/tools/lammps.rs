// src/tools/lammps.rs

//! The LAMMPS executable: where to find it and how to run it.

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::error::{ReaperError, Result};

/// Environment variable naming an engine binary.
pub const BINARY_ENV: &str = "LAMMPS_BINARY";

/// Common install locations, checked in order.
pub const DEFAULT_INSTALL_PATHS: [&str; 7] = [
    "/usr/local/bin/lmp",
    "/usr/bin/lmp",
    "/usr/local/bin/lmp_serial",
    "/usr/bin/lmp_serial",
    "/usr/local/bin/lmp_mpi",
    "/usr/bin/lmp_mpi",
    "/opt/lammps/bin/lmp",
];

/// Executable names looked up on `PATH` after the fixed locations.
pub const PATH_BINARY_NAMES: [&str; 3] = ["lmp", "lmp_serial", "lmp_mpi"];

const STDOUT_FILE: &str = "engine.stdout";
const STDERR_FILE: &str = "engine.stderr";

/// Ordered engine lookup: explicit path, then the environment override,
/// then the candidate list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineSearch {
    pub explicit: Option<PathBuf>,
    pub env_override: Option<PathBuf>,
    pub candidates: Vec<PathBuf>,
}

impl EngineSearch {
    /// A search that never finds anything. Engine levels are skipped.
    pub fn none() -> Self {
        Self::default()
    }

    /// A search that only considers `path`.
    pub fn exact(path: impl Into<PathBuf>) -> Self {
        Self {
            explicit: Some(path.into()),
            ..Self::default()
        }
    }

    /// Snapshots the environment and the default install list.
    pub fn from_env(explicit: Option<PathBuf>) -> Self {
        let env_override = std::env::var_os(BINARY_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        let home = std::env::var_os("HOME").map(PathBuf::from);
        Self {
            explicit,
            env_override,
            candidates: default_candidates(home.as_deref()),
        }
    }

    pub fn resolve(&self) -> Option<PathBuf> {
        self.explicit
            .iter()
            .chain(self.env_override.iter())
            .chain(self.candidates.iter())
            .find(|path| path.is_file())
            .cloned()
    }
}

fn default_candidates(home: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = DEFAULT_INSTALL_PATHS.iter().map(PathBuf::from).collect();
    if let Some(home) = home {
        candidates.push(home.join("lammps/build/lmp"));
        candidates.push(home.join("lammps/src/lmp_serial"));
    }
    candidates.extend(
        PATH_BINARY_NAMES
            .iter()
            .filter_map(|name| which::which(name).ok()),
    );
    candidates
}

/// Output of one finished engine process.
#[derive(Debug, Clone)]
pub struct EngineRun {
    /// Stdout, a newline, then stderr.
    pub output: String,
    pub return_code: i32,
    pub elapsed: Duration,
}

/// Runs `<binary> -in <deck_filename>` inside `working_dir`.
///
/// Both streams go to files in the working directory so a chatty engine
/// cannot fill a pipe and stall. On timeout the child is killed and
/// [`ReaperError::EngineTimedOut`] is returned.
pub fn run_engine(
    binary: &Path,
    deck_filename: &str,
    working_dir: &Path,
    timeout: Duration,
) -> Result<EngineRun> {
    let stdout_path = working_dir.join(STDOUT_FILE);
    let stderr_path = working_dir.join(STDERR_FILE);

    debug!(
        binary = %binary.display(),
        dir = %working_dir.display(),
        timeout_secs = timeout.as_secs_f64(),
        "running LAMMPS"
    );

    let started = Instant::now();
    let mut child = Command::new(binary)
        .arg("-in")
        .arg(deck_filename)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(File::create(&stdout_path)?))
        .stderr(Stdio::from(File::create(&stderr_path)?))
        .spawn()?;

    let status = match child.wait_timeout(timeout)? {
        Some(status) => status,
        None => {
            warn!(binary = %binary.display(), timeout_secs = timeout.as_secs_f64(), "LAMMPS timed out, killing");
            // InvalidInput means the child exited between the wait and the kill.
            if let Err(err) = child.kill()
                && err.kind() != ErrorKind::InvalidInput
            {
                return Err(err.into());
            }
            let _ = child.wait();
            return Err(ReaperError::EngineTimedOut { timeout });
        }
    };
    let elapsed = started.elapsed();

    let stdout = String::from_utf8_lossy(&std::fs::read(&stdout_path)?).into_owned();
    let stderr = String::from_utf8_lossy(&std::fs::read(&stderr_path)?).into_owned();
    let return_code = status.code().unwrap_or(-1);

    debug!(return_code, elapsed_secs = elapsed.as_secs_f64(), "LAMMPS finished");

    Ok(EngineRun {
        output: format!("{stdout}\n{stderr}"),
        return_code,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::{EngineSearch, default_candidates};

    #[test]
    fn empty_search_finds_nothing() {
        assert_eq!(EngineSearch::none().resolve(), None);
    }

    #[test]
    fn explicit_path_wins_over_everything() {
        let dir = tempfile::tempdir().expect("tempdir");
        let explicit = dir.path().join("lmp_custom");
        let fallback = dir.path().join("lmp_fallback");
        std::fs::write(&explicit, "").expect("explicit");
        std::fs::write(&fallback, "").expect("fallback");

        let search = EngineSearch {
            explicit: Some(explicit.clone()),
            env_override: Some(fallback.clone()),
            candidates: vec![fallback],
        };
        assert_eq!(search.resolve(), Some(explicit));
    }

    #[test]
    fn missing_paths_fall_through_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let candidate = dir.path().join("lmp");
        std::fs::write(&candidate, "").expect("candidate");

        let search = EngineSearch {
            explicit: Some(dir.path().join("absent")),
            env_override: Some(dir.path().to_path_buf()),
            candidates: vec![PathBuf::from("/nonexistent/lmp"), candidate.clone()],
        };
        assert_eq!(search.resolve(), Some(candidate));
    }

    #[test]
    fn home_install_locations_follow_system_paths() {
        let candidates = default_candidates(Some(Path::new("/home/md")));
        assert_eq!(candidates[0], PathBuf::from("/usr/local/bin/lmp"));
        assert_eq!(candidates[7], PathBuf::from("/home/md/lammps/build/lmp"));
        assert_eq!(candidates[8], PathBuf::from("/home/md/lammps/src/lmp_serial"));
    }
}
