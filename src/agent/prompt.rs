// src/agent/prompt.rs

use crate::validation::AggregateValidation;

/// Line that opens the script part of a model response.
pub const SCRIPT_MARKER: &str = "# LAMMPS INPUT SCRIPT";

/// Engine output forwarded to a fix prompt, counted from the end.
pub const MAX_FIX_OUTPUT_CHARS: usize = 2000;

pub const SYSTEM_PROMPT: &str = r##"You are a LAMMPS simulation engineer with deep experience in molecular dynamics, materials science and computational physics.

You write complete, runnable LAMMPS input scripts (decks) from a user's description of a simulation.

RESPONSE FORMAT:
Reply in two parts, in this order.

1. Assumptions, as a fenced JSON block:
```json
{
  "assumptions": [
    {
      "category": "force_field|units|parameters|topology|simulation|output|other",
      "description": "What was left open",
      "assumed_value": "The value or setting you chose",
      "reasoning": "Why you chose it",
      "confidence": "low|medium|high"
    }
  ]
}
```

2. The script itself, as plain text starting with the line "# LAMMPS INPUT SCRIPT".
- No markdown code fences around the script
- No prose before or after it
- It must run as-is

WHEN TO ASSUME:
- Topology in a data file without style information: use harmonic bond and angle styles
- No unit system given: infer it from the data file, or use 'real' for molecular systems
- Missing force field parameters: pick them and list them as assumptions
- No run length given: choose a sensible default and list it

SCRIPT RULES:
1. Declare units explicitly
2. Choose an atom_style that fits the system
3. Set boundary conditions explicitly (p p p for periodic)
4. When the data file has bonds, angles, dihedrals or impropers, declare every matching *_style before read_data (harmonic for bonds and angles, cvff for impropers unless told otherwise)
5. Configure the neighbor list
6. Use a timestep suited to the unit system
7. Monitor the run with thermo and thermo_style
8. Charged systems need kspace_style (pppm or ewald)

ORDER OF SECTIONS:
1. Initialization: units, dimension, boundary, atom_style
2. Force field styles: pair_style, bond_style, angle_style, dihedral_style, improper_style
3. System definition: read_data
4. Long-range electrostatics: kspace_style, when charged
5. Settings: neighbor, neigh_modify, timestep
6. Fixes: time integration (nve, nvt, npt)
7. Output: thermo, dump
8. Run: minimize if needed, velocity, run"##;

const FIX_PROMPT_TEMPLATE: &str = r##"The previous LAMMPS script failed validation:

{errors}

LAMMPS output:
{engine_output}

Fix the script so these errors go away. Typical causes:
- "Unknown bond/angle/dihedral/improper style": declare the style before read_data
- "Cannot open file": the file name must match one of the provided files
- pair_coeff errors: set pair_style first and match coefficients to the atom types
- kspace errors: use pppm 1.0e-5 for charged systems

Reply in the same format:
1. The JSON assumptions block, updated if your assumptions changed
2. The corrected script starting with "# LAMMPS INPUT SCRIPT"
"##;

/// Initial user message: file context (if any), the intent, then output rules.
pub fn build_prompt(intent: &str, file_context: &str) -> String {
    let mut parts = Vec::new();
    if !file_context.is_empty() {
        parts.push(file_context.to_string());
        parts.push(String::new());
    }

    parts.push("=== SIMULATION REQUEST ===".to_string());
    parts.push(intent.to_string());
    parts.push(String::new());

    parts.push("=== OUTPUT INSTRUCTIONS ===".to_string());
    parts.push("1. First output a JSON block with your assumptions".to_string());
    parts.push(format!("2. Then output the LAMMPS script starting with '{SCRIPT_MARKER}'"));
    parts.push("Remember: Declare ALL required styles BEFORE read_data!".to_string());

    parts.join("\n")
}

/// One line per failed level, in level order.
pub fn format_validation_errors(validation: &AggregateValidation) -> String {
    let mut errors = Vec::new();

    if !validation.l0.passed {
        errors.push(format!("L0 (Placeholders): {}", validation.l0.details.join(", ")));
    }
    if !validation.l1.passed {
        if !validation.l1.syntax_errors.is_empty() {
            errors.push(format!("L1 (Syntax): {}", validation.l1.syntax_errors.join(", ")));
        }
        if !validation.l1.physics_warnings.is_empty() {
            errors.push(format!(
                "L1 (Physics): {}",
                validation.l1.physics_warnings.join(", ")
            ));
        }
    }
    if !validation.l2.passed {
        errors.push(format!("L2 (Engine): {}", validation.l2.details.join(", ")));
    }
    if !validation.l3.passed {
        errors.push(format!("L3 (Execution): {}", validation.l3.details.join(", ")));
    }

    errors.join("\n")
}

/// Tail of the engine output behind the failure, L2 before L3.
pub fn failing_engine_output(validation: &AggregateValidation) -> Option<String> {
    let output = if !validation.l2.passed {
        &validation.l2.engine_output
    } else if !validation.l3.passed {
        &validation.l3.engine_output
    } else {
        return None;
    };
    if output.is_empty() {
        return None;
    }

    let total = output.chars().count();
    Some(
        output
            .chars()
            .skip(total.saturating_sub(MAX_FIX_OUTPUT_CHARS))
            .collect(),
    )
}

pub fn build_fix_prompt(validation: &AggregateValidation) -> String {
    let engine_output = failing_engine_output(validation)
        .unwrap_or_else(|| "No LAMMPS output available".to_string());
    FIX_PROMPT_TEMPLATE
        .replace("{errors}", &format_validation_errors(validation))
        .replace("{engine_output}", &engine_output)
}
