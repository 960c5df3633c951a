//! Retrieval/generation parameters and the settings-panel session.
//!
//! State that used to live in ambient client stores is held in plain owned
//! values here ([`ParamsSession`], [`EvalHistory`], [`PromptLibrary`]) and
//! passed explicitly to whatever needs it.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::EvalResult;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional document assistant. \
Answer the user's question concisely and accurately using the provided context fragments. \
If the context does not contain the answer, say so instead of making one up.";

/// Parameters sent with queries and evaluation runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagParams {
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_chunk_top_k")]
    pub chunk_top_k: u32,
    #[serde(default = "default_system_prompt", rename = "systemPrompt", alias = "system_prompt")]
    pub system_prompt: String,
}

fn default_temperature() -> f64 {
    0.7
}
fn default_top_k() -> u32 {
    40
}
fn default_chunk_top_k() -> u32 {
    20
}
fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

impl Default for RagParams {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_k: default_top_k(),
            chunk_top_k: default_chunk_top_k(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl RagParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            bail!("temperature must be in [0.0, 2.0], got {}", self.temperature);
        }
        if self.top_k == 0 {
            bail!("top_k must be >= 1");
        }
        if self.chunk_top_k == 0 {
            bail!("chunk_top_k must be >= 1");
        }
        if self.system_prompt.trim().is_empty() {
            bail!("system_prompt must not be empty");
        }
        Ok(())
    }

    pub fn temperature_profile(&self) -> TemperatureProfile {
        TemperatureProfile::from_value(self.temperature)
    }

    pub fn retrieval_profile(&self) -> RetrievalProfile {
        RetrievalProfile::from_chunk_top_k(self.chunk_top_k)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureProfile {
    Precise,
    Balanced,
    Creative,
}

impl TemperatureProfile {
    pub fn from_value(temperature: f64) -> Self {
        if temperature <= 0.3 {
            TemperatureProfile::Precise
        } else if temperature <= 0.7 {
            TemperatureProfile::Balanced
        } else {
            TemperatureProfile::Creative
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TemperatureProfile::Precise => "precise",
            TemperatureProfile::Balanced => "balanced",
            TemperatureProfile::Creative => "creative",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalProfile {
    Fast,
    Balanced,
    HighRecall,
}

impl RetrievalProfile {
    pub fn from_chunk_top_k(chunk_top_k: u32) -> Self {
        if chunk_top_k < 10 {
            RetrievalProfile::Fast
        } else if chunk_top_k <= 30 {
            RetrievalProfile::Balanced
        } else {
            RetrievalProfile::HighRecall
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RetrievalProfile::Fast => "fast",
            RetrievalProfile::Balanced => "balanced",
            RetrievalProfile::HighRecall => "high recall",
        }
    }
}

// ============ Prompt presets ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptPreset {
    pub id: String,
    pub label: String,
    pub description: String,
    pub content: String,
    pub builtin: bool,
}

/// Built-in system-prompt presets plus user-defined ones.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    presets: Vec<PromptPreset>,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        let builtin = |id: &str, label: &str, description: &str, content: &str| PromptPreset {
            id: id.to_string(),
            label: label.to_string(),
            description: description.to_string(),
            content: content.to_string(),
            builtin: true,
        };
        Self {
            presets: vec![
                builtin(
                    "default",
                    "Default (recommended)",
                    "General document assistant for most scenarios",
                    DEFAULT_SYSTEM_PROMPT,
                ),
                builtin(
                    "precise",
                    "Precise answers",
                    "Prefers definite conclusions, little elaboration",
                    "You are a rigorous, restrained assistant. Give accurate, verifiable \
                     conclusions and do not digress. If the context is insufficient, state that \
                     no reliable conclusion can be drawn rather than guessing.",
                ),
                builtin(
                    "summary",
                    "Summarize",
                    "Leans towards summaries and key points",
                    "You are good at summarizing long texts. Answer with a structured list of \
                     key points, highlighting conclusions and important details, and avoid \
                     repeating the source sentence by sentence.",
                ),
            ],
        }
    }
}

impl PromptLibrary {
    pub fn presets(&self) -> &[PromptPreset] {
        &self.presets
    }

    pub fn find(&self, id: &str) -> Option<&PromptPreset> {
        self.presets.iter().find(|p| p.id == id)
    }

    pub fn name_exists(&self, name: &str) -> bool {
        self.presets.iter().any(|p| p.label == name)
    }

    /// Add a custom preset. Names are trimmed and must be unique.
    pub fn add_custom(&mut self, name: &str, content: &str) -> Result<&PromptPreset> {
        let name = name.trim();
        if name.is_empty() {
            bail!("preset name must not be empty");
        }
        if content.trim().is_empty() {
            bail!("preset content must not be empty");
        }
        if self.name_exists(name) {
            bail!("a preset named '{}' already exists", name);
        }
        self.presets.push(PromptPreset {
            id: format!("custom-{}", uuid::Uuid::new_v4()),
            label: name.to_string(),
            description: String::new(),
            content: content.to_string(),
            builtin: false,
        });
        Ok(&self.presets[self.presets.len() - 1])
    }

    /// Remove a custom preset. Built-in presets cannot be removed.
    pub fn remove(&mut self, id: &str) -> Result<()> {
        match self.presets.iter().position(|p| p.id == id) {
            Some(idx) if self.presets[idx].builtin => {
                bail!("built-in preset '{}' cannot be removed", id)
            }
            Some(idx) => {
                self.presets.remove(idx);
                Ok(())
            }
            None => bail!("preset not found: {}", id),
        }
    }
}

// ============ Settings session ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalStatus {
    Idle,
    Loading,
    Done,
}

/// Saved vs. in-progress parameters, plus which parameters the last
/// evaluation ran with.
#[derive(Debug, Clone)]
pub struct ParamsSession {
    saved: RagParams,
    editing: RagParams,
    eval_status: EvalStatus,
    last_eval_params: Option<RagParams>,
}

impl ParamsSession {
    pub fn new(saved: RagParams) -> Self {
        Self {
            editing: saved.clone(),
            saved,
            eval_status: EvalStatus::Idle,
            last_eval_params: None,
        }
    }

    pub fn saved(&self) -> &RagParams {
        &self.saved
    }

    pub fn editing(&self) -> &RagParams {
        &self.editing
    }

    pub fn eval_status(&self) -> EvalStatus {
        self.eval_status
    }

    pub fn last_eval_params(&self) -> Option<&RagParams> {
        self.last_eval_params.as_ref()
    }

    pub fn edit(&mut self, f: impl FnOnce(&mut RagParams)) {
        f(&mut self.editing);
    }

    /// Discard unsaved edits.
    pub fn reset(&mut self) {
        self.editing = self.saved.clone();
    }

    pub fn is_dirty(&self) -> bool {
        self.editing != self.saved
    }

    /// Save the edited parameters. The previous evaluation no longer
    /// describes them, so it is dropped.
    pub fn commit(&mut self) -> Result<()> {
        self.editing.validate()?;
        self.saved = self.editing.clone();
        self.last_eval_params = None;
        Ok(())
    }

    /// Mark an evaluation as started. Returns the parameters to evaluate, or
    /// `None` if one is already running.
    pub fn begin_eval(&mut self) -> Option<RagParams> {
        if self.eval_status == EvalStatus::Loading {
            return None;
        }
        self.eval_status = EvalStatus::Loading;
        Some(self.editing.clone())
    }

    pub fn finish_eval(&mut self, params: RagParams) {
        self.eval_status = EvalStatus::Done;
        self.last_eval_params = Some(params);
    }

    /// An evaluation failed; go back to the previous state.
    pub fn abort_eval(&mut self) {
        self.eval_status = if self.last_eval_params.is_some() {
            EvalStatus::Done
        } else {
            EvalStatus::Idle
        };
    }

    /// The current edits were already evaluated, so re-running is pointless.
    pub fn is_eval_current(&self) -> bool {
        self.last_eval_params.as_ref() == Some(&self.editing)
    }
}

/// The latest and the previous evaluation result, for trend display.
#[derive(Debug, Clone, Default)]
pub struct EvalHistory {
    current: Option<EvalResult>,
    previous: Option<EvalResult>,
    recorded_at: Option<DateTime<Utc>>,
}

impl EvalHistory {
    pub fn record(&mut self, result: EvalResult) {
        self.previous = self.current.take();
        self.current = Some(result);
        self.recorded_at = Some(Utc::now());
    }

    pub fn current(&self) -> Option<&EvalResult> {
        self.current.as_ref()
    }

    pub fn previous(&self) -> Option<&EvalResult> {
        self.previous.as_ref()
    }

    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        self.recorded_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RagasMetrics;

    fn result(total: usize) -> EvalResult {
        EvalResult {
            total_samples: total,
            metrics: RagasMetrics::default(),
            samples: Vec::new(),
            evaluated_at: None,
        }
    }

    #[test]
    fn test_defaults() {
        let p = RagParams::default();
        assert_eq!(p.temperature, 0.7);
        assert_eq!(p.top_k, 40);
        assert_eq!(p.chunk_top_k, 20);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let mut p = RagParams::default();
        p.temperature = 2.5;
        assert!(p.validate().is_err());
        let mut p = RagParams::default();
        p.system_prompt = "  ".to_string();
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_temperature_profile() {
        assert_eq!(TemperatureProfile::from_value(0.3), TemperatureProfile::Precise);
        assert_eq!(TemperatureProfile::from_value(0.31), TemperatureProfile::Balanced);
        assert_eq!(TemperatureProfile::from_value(0.7), TemperatureProfile::Balanced);
        assert_eq!(TemperatureProfile::from_value(0.71), TemperatureProfile::Creative);
    }

    #[test]
    fn test_retrieval_profile() {
        assert_eq!(RetrievalProfile::from_chunk_top_k(9), RetrievalProfile::Fast);
        assert_eq!(RetrievalProfile::from_chunk_top_k(10), RetrievalProfile::Balanced);
        assert_eq!(RetrievalProfile::from_chunk_top_k(30), RetrievalProfile::Balanced);
        assert_eq!(RetrievalProfile::from_chunk_top_k(31), RetrievalProfile::HighRecall);
    }

    #[test]
    fn test_serializes_frontend_field_names() {
        let json = serde_json::to_value(RagParams::default()).unwrap();
        assert!(json.get("systemPrompt").is_some());
        assert_eq!(json["chunk_top_k"], 20);
    }

    #[test]
    fn test_prompt_library() {
        let mut lib = PromptLibrary::default();
        assert_eq!(lib.presets().len(), 3);
        assert!(lib.find("precise").is_some());

        let id = lib.add_custom("  Legal review ", "Cite clauses.").unwrap().id.clone();
        assert!(lib.name_exists("Legal review"));
        assert!(lib.add_custom("Legal review", "again").is_err());
        assert!(lib.add_custom("", "x").is_err());

        assert!(lib.remove("default").is_err());
        lib.remove(&id).unwrap();
        assert!(lib.remove(&id).is_err());
        assert_eq!(lib.presets().len(), 3);
    }

    #[test]
    fn test_session_edit_reset_commit() {
        let mut s = ParamsSession::new(RagParams::default());
        assert!(!s.is_dirty());

        s.edit(|p| p.temperature = 0.2);
        assert!(s.is_dirty());
        s.reset();
        assert_eq!(s.editing().temperature, 0.7);

        s.edit(|p| p.chunk_top_k = 8);
        s.commit().unwrap();
        assert_eq!(s.saved().chunk_top_k, 8);
        assert!(!s.is_dirty());
    }

    #[test]
    fn test_session_eval_lifecycle() {
        let mut s = ParamsSession::new(RagParams::default());
        assert_eq!(s.eval_status(), EvalStatus::Idle);

        let params = s.begin_eval().unwrap();
        assert_eq!(s.eval_status(), EvalStatus::Loading);
        assert!(s.begin_eval().is_none());

        s.finish_eval(params);
        assert_eq!(s.eval_status(), EvalStatus::Done);
        assert!(s.is_eval_current());

        s.edit(|p| p.temperature = 0.1);
        assert!(!s.is_eval_current());

        s.commit().unwrap();
        assert!(s.last_eval_params().is_none());
    }

    #[test]
    fn test_commit_rejects_invalid() {
        let mut s = ParamsSession::new(RagParams::default());
        s.edit(|p| p.top_k = 0);
        assert!(s.commit().is_err());
        assert_eq!(s.saved().top_k, 40);
    }

    #[test]
    fn test_abort_eval() {
        let mut s = ParamsSession::new(RagParams::default());
        s.begin_eval();
        s.abort_eval();
        assert_eq!(s.eval_status(), EvalStatus::Idle);
    }

    #[test]
    fn test_history_shifts() {
        let mut h = EvalHistory::default();
        assert!(h.current().is_none());
        h.record(result(1));
        h.record(result(2));
        assert_eq!(h.current().unwrap().total_samples, 2);
        assert_eq!(h.previous().unwrap().total_samples, 1);
        assert!(h.recorded_at().is_some());
    }
}
