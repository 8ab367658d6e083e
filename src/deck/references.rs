// src/deck/references.rs

use std::collections::BTreeSet;

use crate::deck::{is_comment, parse_command};

/// File extensions commonly read by LAMMPS commands.
pub const SIMULATION_FILE_EXTENSIONS: [&str; 19] = [
    ".data", ".dat", ".restart", ".rst", ".lammps", ".in", ".inp", ".eam", ".fs", ".alloy",
    ".tersoff", ".sw", ".meam", ".comb", ".comb3", ".reax", ".ffield", ".txt", ".table",
];

fn has_simulation_extension(token: &str) -> bool {
    SIMULATION_FILE_EXTENSIONS.iter().any(|ext| token.ends_with(ext))
}

fn looks_like_path(token: &str) -> bool {
    (token.contains('/') || token.contains('.')) && !token.starts_with('-')
}

/// Extracts the files a deck reads from disk.
///
/// Pure text analysis: nothing is resolved against the filesystem.
pub fn parse_file_references(content: &str) -> BTreeSet<String> {
    let mut referenced = BTreeSet::new();

    for line in content.lines() {
        if is_comment(line) {
            continue;
        }
        let Some((command, args)) = parse_command(line) else {
            continue;
        };

        match command.as_str() {
            "read_data" | "read_restart" | "include" | "read_dump" => {
                if let Some(path) = args.first() {
                    referenced.insert((*path).to_string());
                }
            }
            "molecule" => {
                if let Some(path) = args.get(1) {
                    referenced.insert((*path).to_string());
                }
            }
            "pair_coeff" => {
                for token in args {
                    if token == "*" || token == "NULL" || token.parse::<f64>().is_ok() {
                        continue;
                    }
                    if has_simulation_extension(token) || looks_like_path(token) {
                        referenced.insert(token.to_string());
                    }
                }
            }
            "bond_coeff" | "angle_coeff" | "dihedral_coeff" => {
                for token in args {
                    if has_simulation_extension(token) {
                        referenced.insert(token.to_string());
                    }
                }
            }
            _ => {}
        }
    }

    referenced
}
