//! LLM-assisted LAMMPS input deck generation.
//!
//! [`agent::DeckAgent`] drafts a deck with a [`tools::LanguageModel`],
//! checks it with [`validation::validate_deck`] and feeds failures back as
//! fix prompts. Validation is usable on its own for hand-written decks.

#![forbid(unsafe_code)]

pub mod agent;
pub mod cli;
pub mod context;
pub mod deck;
pub mod error;
pub mod model;
pub mod tools;
pub mod validation;

pub use agent::{DeckAgent, generate_deck};
pub use error::{ReaperError, Result};
pub use model::{GenerationRequest, GenerationResult};
pub use validation::{AggregateValidation, ValidationOptions, validate_deck};
