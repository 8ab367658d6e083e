// src/context/discovery.rs

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{ReaperError, Result};

const DATA_EXTENSIONS: [&str; 2] = ["data", "dat"];
const INPUT_EXTENSIONS: [&str; 4] = ["in", "lmp", "lammps", "inp"];
const POTENTIAL_EXTENSIONS: [&str; 13] = [
    "eam", "fs", "alloy", "tersoff", "sw", "meam", "library", "reax", "ffield", "comb", "comb3",
    "table", "txt",
];
const RESTART_EXTENSIONS: [&str; 2] = ["restart", "rst"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Data,
    Input,
    Potential,
    Restart,
    Other,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Data => "data",
            Self::Input => "input",
            Self::Potential => "potential",
            Self::Restart => "restart",
            Self::Other => "other",
        })
    }
}

/// Classifies by extension. Compound `.eam.*` names are potentials.
pub fn classify_file(path: &Path) -> FileKind {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if name.contains(".eam.") {
        return FileKind::Potential;
    }

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let extension = extension.as_str();

    if DATA_EXTENSIONS.contains(&extension) {
        FileKind::Data
    } else if INPUT_EXTENSIONS.contains(&extension) {
        FileKind::Input
    } else if POTENTIAL_EXTENSIONS.contains(&extension) {
        FileKind::Potential
    } else if RESTART_EXTENSIONS.contains(&extension) {
        FileKind::Restart
    } else {
        FileKind::Other
    }
}

/// LAMMPS-related files found in one directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveredFiles {
    pub directory: PathBuf,
    pub data_files: Vec<PathBuf>,
    pub input_files: Vec<PathBuf>,
    pub potential_files: Vec<PathBuf>,
    pub restart_files: Vec<PathBuf>,
}

impl DiscoveredFiles {
    /// The first data file by name.
    pub fn primary_data_file(&self) -> Option<&Path> {
        self.data_files.first().map(PathBuf::as_path)
    }

    pub fn all_files(&self) -> Vec<PathBuf> {
        self.data_files
            .iter()
            .chain(&self.input_files)
            .chain(&self.potential_files)
            .chain(&self.restart_files)
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.data_files.is_empty()
            && self.input_files.is_empty()
            && self.potential_files.is_empty()
            && self.restart_files.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![format!("Directory: {}", self.directory.display())];

        let groups = [
            ("Data files", &self.data_files),
            ("Input scripts", &self.input_files),
            ("Potential files", &self.potential_files),
            ("Restart files", &self.restart_files),
        ];
        for (label, files) in groups {
            if files.is_empty() {
                continue;
            }
            lines.push(format!("  {label} ({}):", files.len()));
            for file in files {
                let name = file.file_name().unwrap_or_default().to_string_lossy();
                lines.push(format!("    - {name}"));
            }
        }

        if self.is_empty() {
            lines.push("  No LAMMPS files found".to_string());
        }
        lines.join("\n")
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}

fn collect_files(dir: &Path, recursive: bool, include_hidden: bool, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !include_hidden && is_hidden(&path) {
            continue;
        }
        if path.is_dir() {
            if recursive {
                collect_files(&path, recursive, include_hidden, out)?;
            }
        } else {
            out.push(path);
        }
    }
    Ok(())
}

fn sort_by_name(files: &mut [PathBuf]) {
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
}

/// Finds and classifies LAMMPS files under `directory`.
///
/// Hidden files are skipped unless `include_hidden` is set; recursion also
/// skips hidden directories then. Unclassified files are dropped.
pub fn discover_files(directory: &Path, recursive: bool, include_hidden: bool) -> Result<DiscoveredFiles> {
    if !directory.exists() {
        return Err(ReaperError::MissingPath {
            path: directory.to_path_buf(),
        });
    }
    if !directory.is_dir() {
        return Err(ReaperError::NotADirectory {
            path: directory.to_path_buf(),
        });
    }
    let directory = directory.canonicalize()?;

    let mut paths = Vec::new();
    collect_files(&directory, recursive, include_hidden, &mut paths)?;

    let mut found = DiscoveredFiles {
        directory,
        ..DiscoveredFiles::default()
    };
    for path in paths {
        match classify_file(&path) {
            FileKind::Data => found.data_files.push(path),
            FileKind::Input => found.input_files.push(path),
            FileKind::Potential => found.potential_files.push(path),
            FileKind::Restart => found.restart_files.push(path),
            FileKind::Other => {}
        }
    }

    sort_by_name(&mut found.data_files);
    sort_by_name(&mut found.input_files);
    sort_by_name(&mut found.potential_files);
    sort_by_name(&mut found.restart_files);
    Ok(found)
}

/// `prefix.in`, or the first free `prefix_N.in`.
pub fn generate_output_filename(directory: &Path, prefix: &str) -> PathBuf {
    let mut candidate = directory.join(format!("{prefix}.in"));
    let mut counter = 1;
    while candidate.exists() {
        candidate = directory.join(format!("{prefix}_{counter}.in"));
        counter += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::{FileKind, classify_file, discover_files, generate_output_filename};
    use crate::error::ReaperError;

    fn touch(dir: &Path, name: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, "").expect("touch");
    }

    #[test]
    fn classification_follows_extensions() {
        assert_eq!(classify_file(Path::new("water.data")), FileKind::Data);
        assert_eq!(classify_file(Path::new("in.LAMMPS")), FileKind::Input);
        assert_eq!(classify_file(Path::new("melt.in")), FileKind::Input);
        assert_eq!(classify_file(Path::new("Cu_zhou.eam.alloy")), FileKind::Potential);
        assert_eq!(classify_file(Path::new("Ni.eam.fs")), FileKind::Potential);
        assert_eq!(classify_file(Path::new("SiC.tersoff")), FileKind::Potential);
        assert_eq!(classify_file(Path::new("equil.restart")), FileKind::Restart);
        assert_eq!(classify_file(Path::new("notes.md")), FileKind::Other);
        assert_eq!(classify_file(Path::new("Makefile")), FileKind::Other);
    }

    #[test]
    fn discovery_sorts_and_skips_hidden_and_other() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["b.data", "a.data", "run.in", "Cu.eam", ".hidden.data", "README.md"] {
            touch(dir.path(), name);
        }
        touch(dir.path(), "sub/deep.data");

        let found = discover_files(dir.path(), false, false).expect("discover");
        let names: Vec<_> = found
            .data_files
            .iter()
            .map(|p| p.file_name().expect("name").to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.data", "b.data"]);
        assert_eq!(found.input_files.len(), 1);
        assert_eq!(found.potential_files.len(), 1);
        assert_eq!(
            found.primary_data_file().and_then(|p| p.file_name()),
            Some(std::ffi::OsStr::new("a.data"))
        );
        assert_eq!(found.all_files().len(), 4);
    }

    #[test]
    fn recursive_and_hidden_options_widen_the_scan() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), ".hidden.data");
        touch(dir.path(), "sub/deep.data");

        assert!(discover_files(dir.path(), false, false).expect("flat").is_empty());
        let wide = discover_files(dir.path(), true, true).expect("wide");
        assert_eq!(wide.data_files.len(), 2);
    }

    #[test]
    fn missing_and_non_directories_are_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = discover_files(&dir.path().join("nope"), false, false);
        assert!(matches!(missing, Err(ReaperError::MissingPath { .. })));

        touch(dir.path(), "file.data");
        let not_dir = discover_files(&dir.path().join("file.data"), false, false);
        assert!(matches!(not_dir, Err(ReaperError::NotADirectory { .. })));
    }

    #[test]
    fn summary_groups_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "system.data");
        let summary = discover_files(dir.path(), false, false)
            .expect("discover")
            .summary();
        assert!(summary.contains("Data files (1):\n    - system.data"));

        let empty = tempfile::tempdir().expect("tempdir");
        let summary = discover_files(empty.path(), false, false)
            .expect("discover")
            .summary();
        assert!(summary.ends_with("No LAMMPS files found"));
    }

    #[test]
    fn output_filename_avoids_existing_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(generate_output_filename(dir.path(), "generated"), dir.path().join("generated.in"));
        touch(dir.path(), "generated.in");
        touch(dir.path(), "generated_1.in");
        assert_eq!(
            generate_output_filename(dir.path(), "generated"),
            dir.path().join("generated_2.in")
        );
    }
}
