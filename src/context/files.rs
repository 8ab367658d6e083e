// src/context/files.rs

//! Turns caller-supplied files into prompt context.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

/// Files longer than this are cut before they reach the prompt.
pub const MAX_FILE_LINES: usize = 1000;

const SNIFF_LINES: usize = 20;
const ANALYSIS_LINES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    DataFile,
    InputFile,
    EamPotential,
    TersoffPotential,
    SwPotential,
    MeamPotential,
    ReaxPotential,
    ShellScript,
    PotentialFile,
    ParameterFile,
    Unknown,
}

impl FileType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DataFile => "data_file",
            Self::InputFile => "input_file",
            Self::EamPotential => "eam_potential",
            Self::TersoffPotential => "tersoff_potential",
            Self::SwPotential => "sw_potential",
            Self::MeamPotential => "meam_potential",
            Self::ReaxPotential => "reax_potential",
            Self::ShellScript => "shell_script",
            Self::PotentialFile => "potential_file",
            Self::ParameterFile => "parameter_file",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extension first, then hints in the file name, then the first lines.
pub fn detect_file_type(path: &Path, content: &str) -> FileType {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if name.contains(".eam.") {
        return FileType::EamPotential;
    }
    match extension.as_str() {
        "data" | "dat" => return FileType::DataFile,
        "in" | "lmp" | "lammps" | "inp" => return FileType::InputFile,
        "eam" | "fs" | "alloy" => return FileType::EamPotential,
        "tersoff" => return FileType::TersoffPotential,
        "sw" => return FileType::SwPotential,
        "meam" | "library" => return FileType::MeamPotential,
        "reax" => return FileType::ReaxPotential,
        "sh" => return FileType::ShellScript,
        _ => {}
    }

    if name.contains("potential") || name.contains("pot") {
        return FileType::PotentialFile;
    }
    if name.contains("param") {
        return FileType::ParameterFile;
    }

    let head = content
        .lines()
        .take(SNIFF_LINES)
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase();
    let any = |keywords: &[&str]| keywords.iter().any(|kw| head.contains(kw));

    if any(&["atoms", "atom types", "bonds", "masses", "xlo xhi"]) {
        FileType::DataFile
    } else if any(&["units", "atom_style", "pair_style", "read_data"]) {
        FileType::InputFile
    } else if head.contains("nrho") && head.contains("drho") {
        FileType::EamPotential
    } else {
        FileType::Unknown
    }
}

/// Topology and charge hints read from a data file header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DataFileAnalysis {
    pub has_bonds: bool,
    pub has_angles: bool,
    pub has_dihedrals: bool,
    pub has_impropers: bool,
    pub has_charges: bool,
    pub atom_types: u64,
    pub bond_types: u64,
    pub angle_types: u64,
    pub dihedral_types: u64,
    pub improper_types: u64,
    pub units_hint: Option<String>,
}

fn leading_count(line: &str) -> Option<u64> {
    line.split_whitespace().next()?.parse().ok()
}

pub fn analyze_data_file(content: &str) -> DataFileAnalysis {
    let mut info = DataFileAnalysis::default();

    for line in content.lines().take(ANALYSIS_LINES) {
        let line = line.trim().to_lowercase();
        let count = leading_count(&line);

        let topology = [
            ("bonds", "bond types", &mut info.has_bonds),
            ("angles", "angle types", &mut info.has_angles),
            ("dihedrals", "dihedral types", &mut info.has_dihedrals),
            ("impropers", "improper types", &mut info.has_impropers),
        ];
        for (keyword, types_keyword, flag) in topology {
            if line.contains(keyword) && !line.contains(types_keyword) && count.is_some_and(|n| n > 0) {
                *flag = true;
            }
        }

        let type_counts = [
            ("atom types", &mut info.atom_types),
            ("bond types", &mut info.bond_types),
            ("angle types", &mut info.angle_types),
            ("dihedral types", &mut info.dihedral_types),
            ("improper types", &mut info.improper_types),
        ];
        for (keyword, slot) in type_counts {
            if line.contains(keyword)
                && let Some(n) = count
            {
                *slot = n;
            }
        }

        if line.contains("units = real") || line.contains("units=real") {
            info.units_hint = Some("real".to_string());
        } else if line.contains("units = metal") {
            info.units_hint = Some("metal".to_string());
        } else if line.contains("units = lj") {
            info.units_hint = Some("lj".to_string());
        }

        if line.contains("atoms # full") || line.contains("atoms # charge") {
            info.has_charges = true;
        }
    }

    if content.to_lowercase().contains("pair coeffs # lj/cut/coul") {
        info.has_charges = true;
    }

    info
}

impl DataFileAnalysis {
    /// Style declarations the deck will need, one line each.
    pub fn requirements(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.has_bonds {
            lines.push(format!("- Contains bonds ({} types) - REQUIRES bond_style", self.bond_types));
        }
        if self.has_angles {
            lines.push(format!("- Contains angles ({} types) - REQUIRES angle_style", self.angle_types));
        }
        if self.has_dihedrals {
            lines.push(format!(
                "- Contains dihedrals ({} types) - REQUIRES dihedral_style",
                self.dihedral_types
            ));
        }
        if self.has_impropers {
            lines.push(format!(
                "- Contains impropers ({} types) - REQUIRES improper_style",
                self.improper_types
            ));
        }
        if self.has_charges {
            lines.push("- Contains charges - REQUIRES kspace_style (pppm or ewald)".to_string());
        }
        if let Some(units) = &self.units_hint {
            lines.push(format!("- Units hint from file: {units}"));
        }
        lines
    }
}

fn truncate_lines(content: &str) -> String {
    let lines: Vec<&str> = content.split('\n').collect();
    if lines.len() <= MAX_FILE_LINES {
        return content.to_string();
    }
    format!(
        "{}\n\n[... truncated, {} more lines ...]",
        lines[..MAX_FILE_LINES].join("\n"),
        lines.len() - MAX_FILE_LINES
    )
}

struct FileContext {
    path: PathBuf,
    content: String,
    file_type: FileType,
}

/// Formats readable files for the prompt.
///
/// Missing or unreadable files are skipped. The analysis is that of the
/// last data file seen.
pub fn build_file_context(files: &[PathBuf]) -> (String, Option<DataFileAnalysis>) {
    let mut contexts = Vec::new();
    let mut analysis = None;

    for path in files {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                debug!(path = %path.display(), %err, "skipping unreadable context file");
                continue;
            }
        };

        let file_type = detect_file_type(path, &content);
        if file_type == FileType::DataFile {
            analysis = Some(analyze_data_file(&content));
        }

        contexts.push(FileContext {
            path: path.clone(),
            content: truncate_lines(&content),
            file_type,
        });
    }

    if contexts.is_empty() {
        return (String::new(), None);
    }

    let mut parts = vec!["=== PROVIDED FILES ===\n".to_string()];
    for fc in &contexts {
        let name = fc.path.file_name().unwrap_or_default().to_string_lossy();
        parts.push(format!("--- FILE: {name} ---"));
        parts.push(format!("Type: {}", fc.file_type));
        parts.push(format!("Path: {}", fc.path.display()));
        parts.push("Content:".to_string());
        parts.push(fc.content.clone());
        parts.push(String::new());
    }

    if let Some(analysis) = &analysis {
        parts.push("--- DATA FILE ANALYSIS ---".to_string());
        parts.extend(analysis.requirements());
        parts.push(String::new());
    }

    (parts.join("\n"), analysis)
}
