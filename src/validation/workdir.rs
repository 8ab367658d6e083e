// src/validation/workdir.rs

//! Isolated working directories for engine runs.
//!
//! A working directory holds the deck under [`DECK_FILENAME`] plus every
//! file it references that could be found among the context files.
//! [`WorkingDirectory`] owns one such directory and tears it down on drop,
//! so every exit path of an engine run releases it.

use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::deck::parse_file_references;
use crate::error::Result;

pub const DECK_FILENAME: &str = "input.lammps";

/// Locates a referenced file among the context files.
///
/// Context files are matched first, by exact base name and then by trailing
/// path components. After that the reference is tried inside each context
/// file's parent directory and each extra search directory, both as given
/// and by base name.
pub fn find_file_in_context(
    reference: &str,
    context_files: &[PathBuf],
    search_dirs: &[PathBuf],
) -> Option<PathBuf> {
    let reference_path = Path::new(reference);
    let reference_name = reference_path.file_name()?;

    let existing = || context_files.iter().filter(|candidate| candidate.exists());
    let direct = existing()
        .find(|candidate| candidate.file_name() == Some(reference_name))
        .or_else(|| existing().find(|candidate| candidate.ends_with(reference_path)));
    if let Some(found) = direct {
        return Some(found.clone());
    }

    let mut dirs: Vec<&Path> = Vec::new();
    let parents = context_files
        .iter()
        .filter(|cf| cf.exists())
        .filter_map(|cf| cf.parent());
    for dir in parents.chain(search_dirs.iter().map(PathBuf::as_path)) {
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }

    dirs.into_iter().find_map(|dir| {
        [dir.join(reference_path), dir.join(reference_name)]
            .into_iter()
            .find(|candidate| candidate.exists())
    })
}

/// Where a reference lands inside the working directory.
///
/// Plain relative references keep their layout. Absolute references and
/// anything that would climb out of the directory keep only the file name.
fn destination_for(reference: &str) -> Option<PathBuf> {
    let path = Path::new(reference);
    let contained = path
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    if contained {
        Some(path.to_path_buf())
    } else {
        path.file_name().map(PathBuf::from)
    }
}

/// Copies contents, permissions and modification time. Never overwrites.
fn copy_preserving(source: &Path, destination: &Path) -> Result<bool> {
    if destination.exists() {
        debug!(destination = %destination.display(), "destination exists, not overwriting");
        return Ok(false);
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(source, destination)?;
    let modified = fs::metadata(source)?.modified()?;
    File::options()
        .write(true)
        .open(destination)?
        .set_modified(modified)?;
    debug!(source = %source.display(), destination = %destination.display(), "copied context file");
    Ok(true)
}

/// Writes the deck into `working_dir` and copies in everything it needs.
///
/// Referenced files are resolved with [`find_file_in_context`]. Every
/// remaining context file is then copied by base name as well, which covers
/// files reached through variables or nested includes. Returns the deck path.
pub fn setup_working_directory(
    deck_content: &str,
    context_files: &[PathBuf],
    working_dir: &Path,
    deck_filename: &str,
) -> Result<PathBuf> {
    fs::create_dir_all(working_dir)?;

    let deck_path = working_dir.join(deck_filename);
    fs::write(&deck_path, deck_content)?;

    for reference in parse_file_references(deck_content) {
        let Some(source) = find_file_in_context(&reference, context_files, &[]) else {
            debug!(%reference, "referenced file not found among context files");
            continue;
        };
        let Some(relative) = destination_for(&reference) else {
            continue;
        };
        let destination = working_dir.join(relative);
        if source != destination {
            copy_preserving(&source, &destination)?;
        }
    }

    for context_file in context_files.iter().filter(|cf| cf.is_file()) {
        if let Some(name) = context_file.file_name() {
            copy_preserving(context_file, &working_dir.join(name))?;
        }
    }

    Ok(deck_path)
}

fn is_input_file(name: &str) -> bool {
    name.ends_with(".lammps") || name.starts_with("input.")
}

/// Removes a working directory.
///
/// With `keep_outputs` only the deck and other input files are removed and
/// engine logs and dumps stay for inspection. A missing directory is a no-op.
pub fn cleanup_working_directory(working_dir: &Path, keep_outputs: bool) {
    if !working_dir.exists() {
        return;
    }

    if !keep_outputs {
        if let Err(err) = fs::remove_dir_all(working_dir) {
            debug!(dir = %working_dir.display(), %err, "failed to remove working directory");
        }
        return;
    }

    let Ok(entries) = fs::read_dir(working_dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        if path.is_file()
            && is_input_file(&name.to_string_lossy())
            && let Err(err) = fs::remove_file(&path)
        {
            debug!(file = %path.display(), %err, "failed to remove input file");
        }
    }
}

/// A fresh temporary directory released when dropped.
#[derive(Debug)]
pub struct WorkingDirectory {
    path: PathBuf,
    keep_outputs: bool,
}

impl WorkingDirectory {
    pub fn create(prefix: &str) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        Ok(Self {
            path: dir.keep(),
            keep_outputs: false,
        })
    }

    /// Leave engine outputs behind when the guard is dropped.
    pub fn keep_outputs(mut self, keep: bool) -> Self {
        self.keep_outputs = keep;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the deck, plus its dependencies when context files are given.
    pub fn materialize(&self, deck_content: &str, context_files: &[PathBuf]) -> Result<PathBuf> {
        if context_files.is_empty() {
            let deck_path = self.path.join(DECK_FILENAME);
            fs::write(&deck_path, deck_content)?;
            Ok(deck_path)
        } else {
            setup_working_directory(deck_content, context_files, &self.path, DECK_FILENAME)
        }
    }
}

impl Drop for WorkingDirectory {
    fn drop(&mut self) {
        cleanup_working_directory(&self.path, self.keep_outputs);
    }
}
