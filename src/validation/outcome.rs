// src/validation/outcome.rs

use serde::Serialize;
use serde::ser::SerializeStruct;

/// Captured engine output is truncated to this many characters.
pub const MAX_ENGINE_OUTPUT_CHARS: usize = 5000;

pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// L0: unresolved template placeholders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct L0Outcome {
    pub passed: bool,
    pub placeholders_found: Vec<String>,
    pub unresolved_count: usize,
    pub details: Vec<String>,
}

/// L1: structural syntax plus physical parameter sanity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct L1Outcome {
    pub passed: bool,
    pub syntax_errors: Vec<String>,
    pub physics_warnings: Vec<String>,
    pub line_numbers: Vec<usize>,
    pub details: Vec<String>,
}

impl L1Outcome {
    /// Physics warnings that fail validation on their own.
    pub fn critical_physics_count(&self) -> usize {
        self.physics_warnings
            .iter()
            .filter(|w| w.contains("Negative temperature"))
            .count()
    }
}

/// L2: zero-step engine acceptance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct L2Outcome {
    pub passed: bool,
    pub engine_output: String,
    pub return_code: i32,
    pub execution_time: f64,
    pub details: Vec<String>,
}

impl L2Outcome {
    pub fn skipped() -> Self {
        Self {
            passed: true,
            engine_output: String::new(),
            return_code: -1,
            execution_time: 0.0,
            details: vec!["LAMMPS binary not found - L2 validation skipped".into()],
        }
    }

    pub fn failure(detail: String, execution_time: f64) -> Self {
        Self {
            passed: false,
            engine_output: String::new(),
            return_code: -1,
            execution_time,
            details: vec![detail],
        }
    }
}

/// One row of the engine's thermodynamic output table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ThermoSample {
    pub step: i64,
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub potential_energy: Option<f64>,
    pub kinetic_energy: Option<f64>,
    pub total_energy: Option<f64>,
}

/// L3: short run with thermodynamic sanity checks.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct L3Outcome {
    pub passed: bool,
    pub engine_output: String,
    pub return_code: i32,
    pub execution_time: f64,
    pub steps_run: u32,
    pub thermo_data: Vec<ThermoSample>,
    pub thermo_warnings: Vec<String>,
    pub details: Vec<String>,
}

impl L3Outcome {
    pub fn skipped() -> Self {
        let note = "LAMMPS binary not found - L3 validation skipped".to_string();
        Self {
            passed: true,
            return_code: -1,
            thermo_warnings: vec![note.clone()],
            details: vec![note],
            ..Self::default()
        }
    }

    pub fn failure(detail: String, execution_time: f64) -> Self {
        Self {
            passed: false,
            return_code: -1,
            execution_time,
            thermo_warnings: vec![detail.clone()],
            details: vec![detail],
            ..Self::default()
        }
    }
}

/// Result of one full L0-L3 pass.
///
/// `overall_passed` is derived from the four levels on every call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateValidation {
    pub l0: L0Outcome,
    pub l1: L1Outcome,
    pub l2: L2Outcome,
    pub l3: L3Outcome,
    pub issues: Vec<String>,
}

impl AggregateValidation {
    pub fn overall_passed(&self) -> bool {
        self.l0.passed && self.l1.passed && self.l2.passed && self.l3.passed
    }
}

impl Serialize for AggregateValidation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("AggregateValidation", 6)?;
        state.serialize_field("overall_passed", &self.overall_passed())?;
        state.serialize_field("l0", &self.l0)?;
        state.serialize_field("l1", &self.l1)?;
        state.serialize_field("l2", &self.l2)?;
        state.serialize_field("l3", &self.l3)?;
        state.serialize_field("issues", &self.issues)?;
        state.end()
    }
}
