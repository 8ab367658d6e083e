// src/validation/syntax.rs

//! L1: structural syntax and physical parameter checks.
//!
//! Two passes over the deck. The structural pass looks for required
//! commands, validates a few closed vocabularies and checks delimiter
//! balance line by line. The physics pass compares the timestep and every
//! requested temperature against ranges that depend on the unit system.
//! Only structural errors and negative temperatures fail the level.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::deck::{commands, is_comment};
use crate::validation::outcome::L1Outcome;

pub const VALID_UNITS: [&str; 8] = ["lj", "real", "metal", "si", "cgs", "electron", "micro", "nano"];

pub const VALID_ATOM_STYLES: [&str; 25] = [
    "angle",
    "atomic",
    "body",
    "bond",
    "bpm/sphere",
    "charge",
    "dipole",
    "dpd",
    "edpd",
    "electron",
    "ellipsoid",
    "full",
    "hybrid",
    "line",
    "mdpd",
    "meso",
    "molecular",
    "peri",
    "smd",
    "sphere",
    "spin",
    "tdpd",
    "template",
    "tri",
    "wavepacket",
];

/// At least one of these must define the simulation box.
pub const STRUCTURE_COMMANDS: [&str; 4] = ["create_atoms", "create_box", "read_data", "read_restart"];

const CRITICAL_MARKER: &str = "Negative temperature";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitSystem {
    Lj,
    Real,
    Metal,
    Si,
    Cgs,
    Electron,
    Micro,
    Nano,
}

impl UnitSystem {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lj => "lj",
            Self::Real => "real",
            Self::Metal => "metal",
            Self::Si => "si",
            Self::Cgs => "cgs",
            Self::Electron => "electron",
            Self::Micro => "micro",
            Self::Nano => "nano",
        }
    }

    /// Sane timestep range in the unit system's native time unit.
    pub fn timestep_range(self) -> (f64, f64) {
        match self {
            Self::Lj => (0.0001, 0.01),
            Self::Real => (0.1, 10.0),
            Self::Metal => (0.0001, 0.01),
            Self::Si | Self::Cgs => (1e-18, 1e-14),
            Self::Electron => (0.0001, 0.01),
            Self::Micro => (0.1, 100.0),
            Self::Nano => (0.0001, 1.0),
        }
    }

    /// Typical temperature range: reduced units for `lj`, Kelvin otherwise.
    pub fn temperature_range(self) -> (f64, f64) {
        match self {
            Self::Lj => (0.01, 10.0),
            _ => (1.0, 10000.0),
        }
    }
}

impl FromStr for UnitSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lj" => Ok(Self::Lj),
            "real" => Ok(Self::Real),
            "metal" => Ok(Self::Metal),
            "si" => Ok(Self::Si),
            "cgs" => Ok(Self::Cgs),
            "electron" => Ok(Self::Electron),
            "micro" => Ok(Self::Micro),
            "nano" => Ok(Self::Nano),
            other => Err(format!(
                "Unknown unit system '{}' - valid options: {}",
                other,
                sorted(&VALID_UNITS).join(", ")
            )),
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn sorted<'a>(items: &[&'a str]) -> Vec<&'a str> {
    let mut items = items.to_vec();
    items.sort_unstable();
    items
}

/// Deck commands seen by the structural pass.
#[derive(Debug, Default)]
struct CommandIndex<'a> {
    seen: BTreeSet<String>,
    first_args: HashMap<String, Vec<&'a str>>,
}

impl<'a> CommandIndex<'a> {
    fn build(content: &'a str) -> Self {
        let mut index = Self::default();
        for command in commands(content) {
            index.seen.insert(command.name.clone());
            index.first_args.entry(command.name).or_insert(command.args);
        }
        index
    }

    fn has(&self, command: &str) -> bool {
        self.seen.contains(command)
    }

    fn first_args(&self, command: &str) -> Option<&[&'a str]> {
        self.first_args.get(command).map(Vec::as_slice)
    }
}

fn check_required_commands(index: &CommandIndex<'_>) -> Vec<String> {
    let mut errors = Vec::new();
    if !index.has("units") {
        errors.push("No 'units' command found - required for defining unit system".to_string());
    }
    if !index.has("atom_style") {
        errors.push(
            "No 'atom_style' command found - required for defining atom properties".to_string(),
        );
    }
    if !STRUCTURE_COMMANDS.iter().any(|cmd| index.has(cmd)) {
        errors.push(format!(
            "No structure command found - need one of: {}",
            STRUCTURE_COMMANDS.join(", ")
        ));
    }
    errors
}

fn check_pair_definitions(index: &CommandIndex<'_>) -> Option<String> {
    match (index.has("pair_style"), index.has("pair_coeff")) {
        (true, false) => Some("pair_style defined but no pair_coeff found".to_string()),
        (false, true) => Some("pair_coeff defined but no pair_style found".to_string()),
        _ => None,
    }
}

fn validate_units_args(args: &[&str]) -> Option<String> {
    match args.first() {
        None => Some("units command requires a unit system argument".to_string()),
        Some(unit) => unit.parse::<UnitSystem>().err(),
    }
}

fn validate_atom_style_args(args: &[&str]) -> Option<String> {
    let style = match args.first() {
        None => return Some("atom_style command requires a style argument".to_string()),
        Some(style) => style.to_lowercase(),
    };
    if VALID_ATOM_STYLES.contains(&style.as_str()) {
        None
    } else {
        Some(format!(
            "Unknown atom style '{style}' - check LAMMPS documentation for valid styles"
        ))
    }
}

fn balance_errors(line: &str) -> Vec<&'static str> {
    let count = |c: char| line.matches(c).count();
    let mut errors = Vec::new();
    if count('\'') % 2 != 0 {
        errors.push("Unbalanced single quotes");
    }
    if count('"') % 2 != 0 {
        errors.push("Unbalanced double quotes");
    }
    if count('(') != count(')') {
        errors.push("Unbalanced parentheses");
    }
    if count('[') != count(']') {
        errors.push("Unbalanced brackets");
    }
    if count('{') != count('}') {
        errors.push("Unbalanced braces");
    }
    errors
}

/// Per-line delimiter balance. Whole-line comments are skipped; inline
/// comments are counted with the command they follow.
pub fn check_delimiters(content: &str) -> Vec<(usize, &'static str)> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty() && !is_comment(line))
        .flat_map(|(idx, line)| {
            balance_errors(line.trim())
                .into_iter()
                .map(move |error| (idx + 1, error))
        })
        .collect()
}

static TIMESTEP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^timestep\s+([\d.eE+-]+)").expect("timestep regex"));
static THERMOSTAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(nvt|npt|langevin|temp/berendsen)\b").expect("thermostat regex")
});
static TEMP_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\btemp\s+([\d.eE+-]+)\s+([\d.eE+-]+)").expect("temp keyword regex")
});
static VELOCITY_CREATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)velocity\s+\S+\s+create\s+([\d.eE+-]+)").expect("velocity regex")
});

/// The first `timestep` value, if any. An unparseable value counts as absent.
pub fn parse_timestep(content: &str) -> Option<f64> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| TIMESTEP.captures(line))
        .and_then(|caps| caps[1].parse::<f64>().ok())
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureSetting {
    pub value: f64,
    pub line_number: usize,
    pub context: &'static str,
}

/// Every temperature requested by a thermostat fix or `velocity ... create`.
pub fn parse_temperatures(content: &str) -> Vec<TemperatureSetting> {
    let mut temperatures = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        let line_number = idx + 1;

        if THERMOSTAT.is_match(line)
            && let Some(caps) = TEMP_KEYWORD.captures(line)
            && let (Ok(start), Ok(end)) = (caps[1].parse::<f64>(), caps[2].parse::<f64>())
        {
            temperatures.push(TemperatureSetting {
                value: start,
                line_number,
                context: "fix temperature start",
            });
            temperatures.push(TemperatureSetting {
                value: end,
                line_number,
                context: "fix temperature end",
            });
        }

        if line.to_lowercase().starts_with("velocity")
            && let Some(caps) = VELOCITY_CREATE.captures(line)
            && let Ok(value) = caps[1].parse::<f64>()
        {
            temperatures.push(TemperatureSetting {
                value,
                line_number,
                context: "velocity create",
            });
        }
    }

    temperatures
}

pub fn check_timestep(timestep: f64, units: UnitSystem) -> Option<String> {
    let (min, max) = units.timestep_range();
    if timestep < min {
        Some(format!(
            "timestep {timestep:?} is too small for '{units}' units (recommended: {min:?} - {max:?}), may be slow"
        ))
    } else if timestep > max {
        Some(format!(
            "timestep {timestep:?} is too large for '{units}' units (recommended: {min:?} - {max:?}), may be unstable"
        ))
    } else {
        None
    }
}

/// Negative temperatures are reported whatever the unit system.
pub fn check_temperature(setting: &TemperatureSetting, units: Option<UnitSystem>) -> Option<String> {
    let TemperatureSetting {
        value,
        line_number,
        context,
    } = setting;

    if *value < 0.0 {
        return Some(format!(
            "Line {line_number}: {CRITICAL_MARKER} {value:?} in {context}. Temperature must be positive."
        ));
    }

    let (min, max) = units?.temperature_range();
    if *value < min {
        Some(format!(
            "Line {line_number}: Very low temperature {value:?} in {context} (typical range: {min:?} - {max:?})."
        ))
    } else if *value > max {
        Some(format!(
            "Line {line_number}: Very high temperature {value:?} in {context} (typical range: {min:?} - {max:?})."
        ))
    } else {
        None
    }
}

pub fn validate_l1(content: &str) -> L1Outcome {
    let mut syntax_errors = Vec::new();
    let mut physics_warnings = Vec::new();
    let mut line_numbers = Vec::new();
    let mut details = Vec::new();

    let index = CommandIndex::build(content);

    for error in check_required_commands(&index) {
        details.push(format!("Error: {error}"));
        syntax_errors.push(error);
    }

    if let Some(warning) = check_pair_definitions(&index) {
        details.push(format!("Warning: {warning}"));
    }

    let argument_errors = [
        index.first_args("units").and_then(validate_units_args),
        index.first_args("atom_style").and_then(validate_atom_style_args),
    ];
    for error in argument_errors.into_iter().flatten() {
        details.push(format!("Error: {error}"));
        syntax_errors.push(error);
    }

    for (line_number, error) in check_delimiters(content) {
        syntax_errors.push(format!("Line {line_number}: {error}"));
        line_numbers.push(line_number);
        details.push(format!("Syntax error at line {line_number}: {error}"));
    }

    // Unknown unit systems fall back to no range table; lj when units is absent.
    let units = match index.first_args("units").and_then(|args| args.first()) {
        Some(unit) => unit.parse::<UnitSystem>().ok(),
        None => Some(UnitSystem::Lj),
    };

    match parse_timestep(content) {
        Some(timestep) => {
            if let Some(warning) = units.and_then(|units| check_timestep(timestep, units)) {
                details.push(format!("Physics warning: {warning}"));
                physics_warnings.push(warning);
            }
        }
        None => details.push("No timestep command found, using LAMMPS default".to_string()),
    }

    for setting in parse_temperatures(content) {
        if let Some(warning) = check_temperature(&setting, units) {
            details.push(format!("Physics warning: {warning}"));
            physics_warnings.push(warning);
        }
    }

    let critical = physics_warnings
        .iter()
        .any(|warning| warning.contains(CRITICAL_MARKER));

    L1Outcome {
        passed: syntax_errors.is_empty() && !critical,
        syntax_errors,
        physics_warnings,
        line_numbers,
        details,
    }
}
