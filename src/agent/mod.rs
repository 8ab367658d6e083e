// src/agent/mod.rs

//! The generate, validate and fix loop.
//!
//! Each attempt drafts a deck with the language model, validates it at every
//! level, and on failure turns the validation into a fix prompt for the next
//! draft. The loop is bounded by [`GenerationRequest::max_attempts`].

pub mod prompt;
pub mod response;

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::context::files::build_file_context;
use crate::error::Result;
use crate::model::{GenerationAttempt, GenerationRequest, GenerationResult};
use crate::tools::lammps::EngineSearch;
use crate::tools::llm::{AnthropicProvider, LanguageModel};
use crate::validation::{AggregateValidation, ValidationOptions, validate_deck_blocking};

pub use prompt::{SYSTEM_PROMPT, build_fix_prompt, build_prompt, format_validation_errors};
pub use response::{clean_llm_output, parse_llm_response};

const FIX_NOTE_CHARS: usize = 200;

#[derive(Debug)]
enum LoopState {
    Drafting,
    Validating(String),
    Fixing,
    Done,
}

/// Drives one language model through the generation loop.
pub struct DeckAgent<M> {
    model: M,
    options: ValidationOptions,
}

impl<M: LanguageModel> DeckAgent<M> {
    /// An agent that validates without an engine; see [`Self::with_engine_search`].
    pub fn new(model: M) -> Self {
        Self {
            model,
            options: ValidationOptions::default(),
        }
    }

    pub fn with_engine_search(mut self, search: EngineSearch) -> Self {
        self.options.search = search;
        self
    }

    /// Replaces the validation settings. Context files still come from the request.
    pub fn with_validation_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        let mut result = GenerationResult::default();

        let mut file_context = String::new();
        if !request.files.is_empty() {
            let (context, _) = build_file_context(&request.files);
            if context.is_empty() {
                result.warnings.push("Some input files could not be read".to_string());
            }
            file_context = context;
        }

        let options = self
            .options
            .clone()
            .with_context_files(request.files.clone());
        let max_attempts = request.max_attempts();

        let mut prompt = build_prompt(&request.intent, &file_context);
        let mut script = String::new();
        let mut validation: Option<AggregateValidation> = None;
        let mut attempt_number = 0;
        let mut state = LoopState::Drafting;

        loop {
            state = match state {
                LoopState::Drafting if attempt_number >= max_attempts => LoopState::Done,
                LoopState::Drafting => {
                    attempt_number += 1;
                    info!(attempt = attempt_number, max_attempts, "requesting deck");

                    match self
                        .model
                        .send(SYSTEM_PROMPT, &prompt, request.max_output_tokens)
                        .await
                    {
                        Err(err) => {
                            result
                                .errors
                                .push(format!("LLM API error on attempt {attempt_number}: {err}"));
                            LoopState::Done
                        }
                        Ok(reply) => {
                            let (draft, assumptions) = parse_llm_response(&reply);
                            result.assumptions.extend(assumptions);
                            if draft.is_empty() {
                                result.errors.push(format!(
                                    "Attempt {attempt_number}: LLM returned empty response"
                                ));
                                LoopState::Drafting
                            } else {
                                LoopState::Validating(draft)
                            }
                        }
                    }
                }
                LoopState::Validating(draft) => {
                    let checked = match validate_deck_blocking(draft.clone(), options.clone()).await {
                        Ok(checked) => checked,
                        Err(err) => {
                            result
                                .errors
                                .push(format!("Validation failed on attempt {attempt_number}: {err}"));
                            break;
                        }
                    };

                    let passed = checked.overall_passed();
                    info!(attempt = attempt_number, passed, issues = checked.issues.len(), "deck validated");
                    result.attempts.push(GenerationAttempt {
                        attempt_number,
                        script_text: draft.clone(),
                        validation_passed: passed,
                        errors: if passed { Vec::new() } else { checked.issues.clone() },
                        fixes_applied: Vec::new(),
                    });
                    script = draft;
                    validation = Some(checked);

                    if passed || !request.enable_iterative_fixing || attempt_number >= max_attempts {
                        LoopState::Done
                    } else {
                        LoopState::Fixing
                    }
                }
                LoopState::Fixing => match validation.as_ref() {
                    Some(failed) => {
                        let errors = format_validation_errors(failed);
                        prompt = build_fix_prompt(failed);
                        if let Some(attempt) = result.attempts.last_mut() {
                            let note: String = errors.chars().take(FIX_NOTE_CHARS).collect();
                            attempt.fixes_applied.push(format!("Attempting fix for: {note}"));
                        }
                        LoopState::Drafting
                    }
                    None => LoopState::Done,
                },
                LoopState::Done => break,
            };
        }

        if let Some(path) = &request.output_path
            && !script.is_empty()
        {
            match write_atomically(path, &script) {
                Ok(()) => result.output_path = Some(path.clone()),
                Err(err) => result.errors.push(format!("Failed to write output file: {err}")),
            }
        }

        result.success = !script.is_empty()
            && validation
                .as_ref()
                .is_some_and(AggregateValidation::overall_passed);
        result.script_text = script;
        result.validation = validation;
        result.total_attempts = result.attempts.len() as u32;
        result
    }
}

/// Writes through a temporary sibling so readers never see a partial deck.
fn write_atomically(path: &Path, content: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(content.as_bytes())?;
    file.persist(path).map_err(|err| err.error)?;
    debug!(path = %path.display(), "deck written");
    Ok(())
}

/// Generates with the Anthropic provider configured from the environment.
pub async fn generate_deck(request: &GenerationRequest) -> GenerationResult {
    let provider = match AnthropicProvider::from_env() {
        Ok(provider) => provider,
        Err(err) => return GenerationResult::failed(format!("Failed to initialize provider: {err}")),
    };
    DeckAgent::new(provider)
        .with_engine_search(EngineSearch::from_env(request.engine_binary.clone()))
        .generate(request)
        .await
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::fs;
    use std::sync::Mutex;

    use super::DeckAgent;
    use crate::error::{ReaperError, Result};
    use crate::model::GenerationRequest;
    use crate::tools::llm::LanguageModel;

    const GOOD: &str = "```json\n{\"assumptions\": [{\"category\": \"units\", \"description\": \"Unit system\", \"assumed_value\": \"lj\", \"confidence\": \"high\"}]}\n```\n# LAMMPS INPUT SCRIPT\nunits lj\natom_style atomic\nlattice fcc 0.8442\nregion box block 0 5 0 5 0 5\ncreate_box 1 box\ncreate_atoms 1 box\nmass 1 1.0\npair_style lj/cut 2.5\npair_coeff 1 1 1.0 1.0 2.5\nfix 1 all nve\nrun 100\n";
    const BROKEN: &str = "# LAMMPS INPUT SCRIPT\nunits lj\ntimestep {{TIMESTEP}}\nrun 100\n";

    /// Replays canned replies and records every prompt it was sent.
    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().expect("prompts lock").clone()
        }
    }

    impl LanguageModel for ScriptedModel {
        async fn send(&self, _system: &str, user_message: &str, _max_tokens: u32) -> Result<String> {
            self.prompts
                .lock()
                .expect("prompts lock")
                .push(user_message.to_string());
            self.replies
                .lock()
                .expect("replies lock")
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    fn ok(text: &str) -> Result<String> {
        Ok(text.to_string())
    }

    #[tokio::test]
    async fn passing_first_draft_stops_the_loop() {
        let agent = DeckAgent::new(ScriptedModel::new(vec![ok(GOOD), ok(GOOD)]));
        let result = agent.generate(&GenerationRequest::new("LJ melt")).await;

        assert!(result.success);
        assert_eq!(result.total_attempts, 1);
        assert!(result.script_text.starts_with("# LAMMPS INPUT SCRIPT\nunits lj"));
        assert_eq!(result.assumptions.len(), 1);
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn failed_draft_is_fixed_on_the_next_attempt() {
        let model = ScriptedModel::new(vec![ok(BROKEN), ok(GOOD)]);
        let agent = DeckAgent::new(model);
        let result = agent.generate(&GenerationRequest::new("LJ melt")).await;

        assert!(result.success);
        assert_eq!(result.total_attempts, 2);
        let first = &result.attempts[0];
        assert!(!first.validation_passed);
        assert_eq!(first.errors[0], "L0: 1 unresolved placeholder(s) found");
        assert!(first.fixes_applied[0].starts_with("Attempting fix for: L0 (Placeholders)"));
        assert!(result.attempts[1].validation_passed);

        let prompts = agent.model.prompts();
        assert!(prompts[0].contains("=== SIMULATION REQUEST ===\nLJ melt"));
        assert!(prompts[1].contains("failed validation"));
        assert!(prompts[1].contains("No LAMMPS output available"));
    }

    #[tokio::test]
    async fn disabled_fixing_allows_exactly_one_attempt() {
        let agent = DeckAgent::new(ScriptedModel::new(vec![ok(BROKEN), ok(GOOD)]));
        let request = GenerationRequest::new("LJ melt").with_iterative_fixing(false);
        let result = agent.generate(&request).await;

        assert!(!result.success);
        assert_eq!(result.total_attempts, 1);
        assert!(result.attempts[0].fixes_applied.is_empty());
        assert_eq!(agent.model.prompts().len(), 1);
    }

    #[tokio::test]
    async fn attempts_are_bounded_by_retries() {
        let agent = DeckAgent::new(ScriptedModel::new(vec![ok(BROKEN), ok(BROKEN), ok(BROKEN)]));
        let request = GenerationRequest::new("LJ melt").with_max_retries(2);
        let result = agent.generate(&request).await;

        assert!(!result.success);
        assert_eq!(result.total_attempts, 3);
        assert!(result.attempts[2].fixes_applied.is_empty());
        assert!(result.script_text.contains("{{TIMESTEP}}"));
    }

    #[tokio::test]
    async fn empty_reply_moves_on_to_the_next_attempt() {
        let agent = DeckAgent::new(ScriptedModel::new(vec![ok("   "), ok(GOOD)]));
        let result = agent.generate(&GenerationRequest::new("LJ melt")).await;

        assert!(result.success);
        assert_eq!(result.errors, vec!["Attempt 1: LLM returned empty response"]);
        assert_eq!(result.total_attempts, 1);
        assert_eq!(result.attempts[0].attempt_number, 2);
    }

    #[tokio::test]
    async fn provider_error_ends_the_loop() {
        let error = ReaperError::Provider {
            status: 401,
            message: "invalid x-api-key".into(),
        };
        let agent = DeckAgent::new(ScriptedModel::new(vec![Err(error), ok(GOOD)]));
        let result = agent.generate(&GenerationRequest::new("LJ melt")).await;

        assert!(!result.success);
        assert!(result.script_text.is_empty());
        assert!(result.validation.is_none());
        assert!(result.errors[0].starts_with("LLM API error on attempt 1:"));
        assert!(result.errors[0].contains("invalid x-api-key"));
    }

    #[tokio::test]
    async fn unreadable_files_warn_but_do_not_stop_generation() {
        let agent = DeckAgent::new(ScriptedModel::new(vec![ok(GOOD)]));
        let request = GenerationRequest::new("LJ melt").with_files(vec!["/nonexistent/system.data".into()]);
        let result = agent.generate(&request).await;

        assert!(result.success);
        assert_eq!(result.warnings, vec!["Some input files could not be read"]);
    }

    #[tokio::test]
    async fn final_deck_is_written_to_the_output_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("nested").join("melt.in");
        let agent = DeckAgent::new(ScriptedModel::new(vec![ok(BROKEN)]));
        let request = GenerationRequest::new("LJ melt")
            .with_iterative_fixing(false)
            .with_output_path(&output);
        let result = agent.generate(&request).await;

        assert!(!result.success);
        assert_eq!(result.output_path.as_deref(), Some(output.as_path()));
        let written = fs::read_to_string(&output).expect("read written deck");
        assert_eq!(written, result.script_text);
    }
}
