// src/validation/thermo.rs

use std::sync::LazyLock;

use regex::Regex;

use crate::validation::outcome::ThermoSample;

/// Temperature above this means the run blew up.
pub const MAX_REASONABLE_TEMPERATURE: f64 = 1e6;
/// Absolute total energy above this means the run blew up.
pub const MAX_REASONABLE_ENERGY: f64 = 1e12;
/// Last/first temperature ratio that earns an instability warning.
pub const MAX_TEMPERATURE_RATIO: f64 = 10.0;
/// Relative first-to-last total energy drift that earns a warning.
pub const MAX_ENERGY_DRIFT: f64 = 0.1;

pub const SANITY_PASSED: &str = "Thermodynamic sanity checks passed";

static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Step\s+").expect("thermo header regex"));
static DATA_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d+)\s+([-+]?(?:nan|inf|[\d.eE+-]+))").expect("thermo row regex")
});

fn parse_value(token: &str) -> Option<f64> {
    token.parse::<f64>().ok()
}

/// Parses the thermo table of the first run in the engine output.
///
/// Columns are mapped by the header; unknown columns are ignored. Parsing
/// ends at the first `Loop time` line.
pub fn parse_thermo_output(output: &str) -> Vec<ThermoSample> {
    let mut samples = Vec::new();
    let mut columns: Option<Vec<String>> = None;

    for line in output.lines() {
        let line = line.trim();

        if HEADER.is_match(line) {
            columns = Some(line.split_whitespace().map(str::to_lowercase).collect());
            continue;
        }

        if let Some(columns) = columns.as_ref()
            && DATA_ROW.is_match(line)
        {
            let mut sample = ThermoSample::default();
            for (column, token) in columns.iter().zip(line.split_whitespace()) {
                let Some(value) = parse_value(token) else {
                    continue;
                };
                match column.as_str() {
                    "step" => sample.step = value as i64,
                    "temp" => sample.temperature = Some(value),
                    "press" => sample.pressure = Some(value),
                    "pe" | "poteng" => sample.potential_energy = Some(value),
                    "ke" | "kineng" => sample.kinetic_energy = Some(value),
                    "etotal" | "toteng" => sample.total_energy = Some(value),
                    _ => {}
                }
            }
            samples.push(sample);
        }

        if line.contains("Loop time") {
            break;
        }
    }

    samples
}

fn non_finite(value: Option<f64>) -> bool {
    value.is_some_and(|v| !v.is_finite())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThermoSanity {
    pub passed: bool,
    pub warnings: Vec<String>,
}

/// Checks a parsed thermo series for numerical blow-up.
///
/// Temperature growth and energy drift only warn. An empty series cannot
/// fail.
pub fn check_thermo_sanity(samples: &[ThermoSample]) -> ThermoSanity {
    let mut warnings = Vec::new();
    let mut passed = true;

    if samples.is_empty() {
        return ThermoSanity {
            passed: true,
            warnings: vec!["No thermodynamic data found in output".to_string()],
        };
    }

    for sample in samples {
        let step = sample.step;

        if let Some(temp) = sample.temperature {
            if !temp.is_finite() {
                warnings.push(format!("Step {step}: Temperature is NaN/Inf - simulation exploded"));
                passed = false;
            } else if temp < 0.0 {
                warnings.push(format!("Step {step}: Negative temperature ({temp:?}) - unphysical"));
                passed = false;
            } else if temp > MAX_REASONABLE_TEMPERATURE {
                warnings.push(format!(
                    "Step {step}: Temperature {temp:.2e} exceeds {MAX_REASONABLE_TEMPERATURE:.0e} - explosion"
                ));
                passed = false;
            }
        }

        if let Some(etotal) = sample.total_energy {
            if !etotal.is_finite() {
                warnings.push(format!("Step {step}: Total energy is NaN/Inf - simulation exploded"));
                passed = false;
            } else if etotal.abs() > MAX_REASONABLE_ENERGY {
                warnings.push(format!(
                    "Step {step}: Total energy {etotal:.2e} exceeds threshold - possible explosion"
                ));
                passed = false;
            }
        }

        if non_finite(sample.potential_energy) {
            warnings.push(format!("Step {step}: Potential energy is NaN/Inf - simulation exploded"));
            passed = false;
        }

        if non_finite(sample.pressure) {
            warnings.push(format!("Step {step}: Pressure is NaN/Inf - simulation exploded"));
            passed = false;
        }
    }

    if let [first, .., last] = samples {
        if let (Some(t0), Some(t1)) = (first.temperature, last.temperature)
            && t0 > 0.0
        {
            let ratio = t1 / t0;
            if ratio > MAX_TEMPERATURE_RATIO {
                warnings.push(format!(
                    "Temperature increased {ratio:.1}x ({t0:.1} -> {t1:.1}) - possible instability"
                ));
            }
        }

        if let (Some(e0), Some(e1)) = (first.total_energy, last.total_energy)
            && e0 != 0.0
        {
            let drift = (e1 - e0).abs() / e0.abs();
            if drift > MAX_ENERGY_DRIFT {
                warnings.push(format!(
                    "Energy drift of {:.1}% detected - may indicate instability",
                    drift * 100.0
                ));
            }
        }
    }

    if passed && warnings.is_empty() {
        warnings.push(SANITY_PASSED.to_string());
    }

    ThermoSanity { passed, warnings }
}

#[cfg(test)]
mod tests {
    use super::{SANITY_PASSED, check_thermo_sanity, parse_thermo_output};
    use crate::validation::outcome::ThermoSample;

    const LOG: &str = "\
LAMMPS (2 Aug 2023)
Setting up Verlet run ...
   Step          Temp          E_pair         E_mol          TotEng         Press
         0   1.44          -6.7733681      0             -4.6218056     -5.0244179
         5   1.4387596     -6.7716911      0             -4.6217058     -5.0053463
        10   1.4356098     -6.7669754      0             -4.6217628     -4.9747657
Loop time of 0.00123 on 1 procs for 10 steps with 4000 atoms

   Step          Temp
        10   9999.0
";

    fn sample(step: i64, temperature: f64, total_energy: f64) -> ThermoSample {
        ThermoSample {
            step,
            temperature: Some(temperature),
            total_energy: Some(total_energy),
            ..ThermoSample::default()
        }
    }

    #[test]
    fn header_drives_column_mapping() {
        let samples = parse_thermo_output(LOG);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[1].step, 5);
        assert_eq!(samples[0].temperature, Some(1.44));
        assert_eq!(samples[2].total_energy, Some(-4.6217628));
        assert_eq!(samples[0].pressure, Some(-5.0244179));
        assert_eq!(samples[0].potential_energy, None);
    }

    #[test]
    fn parsing_stops_at_first_loop_time() {
        let samples = parse_thermo_output(LOG);
        assert!(samples.iter().all(|s| s.temperature != Some(9999.0)));
    }

    #[test]
    fn rows_before_header_are_ignored() {
        let samples = parse_thermo_output("100 2.0 3.0\nStep Temp\n0 1.0\n");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].step, 0);
    }

    #[test]
    fn short_form_column_names_are_recognised() {
        let samples = parse_thermo_output("Step Temp Press PE KE Etotal\n0 1 2 3 4 5\n");
        let s = samples[0];
        assert_eq!(
            (s.pressure, s.potential_energy, s.kinetic_energy, s.total_energy),
            (Some(2.0), Some(3.0), Some(4.0), Some(5.0))
        );
    }

    #[test]
    fn nan_rows_are_parsed_and_fail_sanity() {
        let samples = parse_thermo_output("Step Temp TotEng Press\n0 1.0 -5.0 0.1\n5 nan -nan inf\n");
        assert_eq!(samples.len(), 2);
        let sanity = check_thermo_sanity(&samples);
        assert!(!sanity.passed);
        assert!(sanity.warnings.iter().any(|w| w == "Step 5: Temperature is NaN/Inf - simulation exploded"));
        assert!(sanity.warnings.iter().any(|w| w.contains("Total energy is NaN/Inf")));
        assert!(sanity.warnings.iter().any(|w| w.contains("Pressure is NaN/Inf")));
    }

    #[test]
    fn stable_series_passes_cleanly() {
        let sanity = check_thermo_sanity(&parse_thermo_output(LOG));
        assert!(sanity.passed);
        assert_eq!(sanity.warnings, vec![SANITY_PASSED]);
    }

    #[test]
    fn runaway_temperature_and_energy_fail() {
        let sanity = check_thermo_sanity(&[sample(0, 300.0, -100.0), sample(5, 2.5e6, 5e12)]);
        assert!(!sanity.passed);
        assert!(sanity.warnings.iter().any(|w| w.contains("explosion")));
        assert!(sanity.warnings.iter().any(|w| w.contains("Total energy")));
    }

    #[test]
    fn negative_sample_temperature_fails() {
        let sanity = check_thermo_sanity(&[sample(0, -1.0, -10.0)]);
        assert!(!sanity.passed);
        assert!(sanity.warnings[0].contains("Negative temperature"));
    }

    #[test]
    fn heating_and_drift_only_warn() {
        let sanity = check_thermo_sanity(&[sample(0, 10.0, -100.0), sample(20, 150.0, -80.0)]);
        assert!(sanity.passed);
        assert!(sanity.warnings.iter().any(|w| w.starts_with("Temperature increased 15.0x")));
        assert!(sanity.warnings.iter().any(|w| w.starts_with("Energy drift of 20.0%")));
        assert!(!sanity.warnings.iter().any(|w| w == SANITY_PASSED));
    }

    #[test]
    fn empty_series_cannot_fail() {
        let sanity = check_thermo_sanity(&[]);
        assert!(sanity.passed);
        assert_eq!(sanity.warnings, vec!["No thermodynamic data found in output"]);
    }
}
