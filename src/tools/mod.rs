// src/tools/mod.rs

//! External collaborators: the language model and the LAMMPS executable.

pub mod lammps;
pub mod llm;

pub use lammps::{EngineRun, EngineSearch, run_engine};
pub use llm::{AnthropicProvider, LanguageModel};
