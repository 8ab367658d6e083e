// src/model/mod.rs

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::validation::AggregateValidation;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssumptionCategory {
    ForceField,
    Units,
    Parameters,
    Topology,
    Simulation,
    Output,
    #[default]
    Other,
}

impl AssumptionCategory {
    /// Unknown names map to [`AssumptionCategory::Other`].
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "force_field" => Self::ForceField,
            "units" => Self::Units,
            "parameters" => Self::Parameters,
            "topology" => Self::Topology,
            "simulation" => Self::Simulation,
            "output" => Self::Output,
            _ => Self::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ForceField => "force_field",
            Self::Units => "units",
            Self::Parameters => "parameters",
            Self::Topology => "topology",
            Self::Simulation => "simulation",
            Self::Output => "output",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for AssumptionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    #[default]
    Medium,
    High,
}

impl Confidence {
    /// Unknown levels map to [`Confidence::Medium`].
    pub fn parse(level: &str) -> Self {
        match level.trim().to_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            _ => Self::Medium,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

/// A default the model picked because the intent left it open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Assumption {
    pub category: AssumptionCategory,
    pub description: String,
    pub assumed_value: String,
    pub reasoning: String,
    pub confidence: Confidence,
}

/// What to generate and how hard to try.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub intent: String,
    pub files: Vec<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub engine_binary: Option<PathBuf>,
    pub max_retries: u32,
    pub enable_iterative_fixing: bool,
    pub max_output_tokens: u32,
}

impl GenerationRequest {
    pub fn new(intent: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            files: Vec::new(),
            output_path: None,
            engine_binary: None,
            max_retries: DEFAULT_MAX_RETRIES,
            enable_iterative_fixing: true,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }

    pub fn with_files(mut self, files: Vec<PathBuf>) -> Self {
        self.files = files;
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn with_engine_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.engine_binary = Some(path.into());
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_iterative_fixing(mut self, enabled: bool) -> Self {
        self.enable_iterative_fixing = enabled;
        self
    }

    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    /// One try without fixing, otherwise the first try plus every retry.
    pub fn max_attempts(&self) -> u32 {
        if self.enable_iterative_fixing {
            self.max_retries.saturating_add(1)
        } else {
            1
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationAttempt {
    pub attempt_number: u32,
    pub script_text: String,
    pub validation_passed: bool,
    pub errors: Vec<String>,
    pub fixes_applied: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationResult {
    pub success: bool,
    pub script_text: String,
    pub output_path: Option<PathBuf>,
    pub validation: Option<AggregateValidation>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub assumptions: Vec<Assumption>,
    pub attempts: Vec<GenerationAttempt>,
    pub total_attempts: u32,
}

impl GenerationResult {
    /// A result for a run that failed before any attempt was made.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            errors: vec![error.into()],
            ..Self::default()
        }
    }

    pub fn assumptions_summary(&self) -> String {
        if self.assumptions.is_empty() {
            return "No assumptions recorded.".to_string();
        }

        let mut lines = vec!["Assumptions made during generation:".to_string()];
        for assumption in &self.assumptions {
            lines.push(format!("  [{}] {}", assumption.category, assumption.description));
            lines.push(format!("    Value: {}", assumption.assumed_value));
            if !assumption.reasoning.is_empty() {
                lines.push(format!("    Reason: {}", assumption.reasoning));
            }
            lines.push(format!("    Confidence: {}", assumption.confidence));
        }
        lines.join("\n")
    }
}
