// src/deck/mod.rs

//! Line-level view of a LAMMPS input deck.
//!
//! A deck is plain text with one command per line. `#` starts a comment,
//! either for the whole line or trailing a command. The first
//! whitespace-delimited token is the command name.

pub mod references;

pub use references::{SIMULATION_FILE_EXTENSIONS, parse_file_references};

/// A single parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command<'a> {
    pub line_number: usize,
    pub name: String,
    pub args: Vec<&'a str>,
}

/// Returns true for lines whose first non-blank character is `#`.
pub fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

/// Drops everything from the first `#` on and trims the rest.
pub fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => line[..idx].trim(),
        None => line.trim(),
    }
}

/// Splits a line into its lower-cased command name and raw arguments.
///
/// Returns `None` for blank and comment-only lines.
pub fn parse_command(line: &str) -> Option<(String, Vec<&str>)> {
    let mut parts = strip_comment(line).split_whitespace();
    let name = parts.next()?.to_lowercase();
    Some((name, parts.collect()))
}

/// Iterates the commands of a deck with 1-based line numbers.
pub fn commands(content: &str) -> impl Iterator<Item = Command<'_>> {
    content.lines().enumerate().filter_map(|(idx, line)| {
        parse_command(line).map(|(name, args)| Command {
            line_number: idx + 1,
            name,
            args,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::{commands, is_comment, parse_command, strip_comment};

    #[test]
    fn strip_comment_removes_inline_suffix() {
        assert_eq!(strip_comment("run 100   # production"), "run 100");
        assert_eq!(strip_comment("# whole line"), "");
        assert_eq!(strip_comment("  units real  "), "units real");
    }

    #[test]
    fn parse_command_lowercases_name_only() {
        let (name, args) = parse_command("Read_Data Data.LJ extra/atom/types 1").expect("command");
        assert_eq!(name, "read_data");
        assert_eq!(args, vec!["Data.LJ", "extra/atom/types", "1"]);
    }

    #[test]
    fn parse_command_skips_blank_and_comment_lines() {
        assert!(parse_command("").is_none());
        assert!(parse_command("    ").is_none());
        assert!(parse_command("# units lj").is_none());
        assert!(is_comment("   # indented comment"));
        assert!(!is_comment("units lj # trailing"));
    }

    #[test]
    fn commands_report_source_line_numbers() {
        let deck = "# header\nunits lj\n\natom_style atomic\n";
        let parsed: Vec<_> = commands(deck).map(|c| (c.line_number, c.name)).collect();
        assert_eq!(
            parsed,
            vec![(2, "units".to_string()), (4, "atom_style".to_string())]
        );
    }
}
