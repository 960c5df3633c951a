//! `ragdesk eval` and `ragdesk params` commands.
//!
//! `eval run` asks the backend to evaluate the configured parameters and
//! prints a report; `eval show` prints the same report for a saved result
//! file, optionally against an earlier one. `params save` commits the
//! configured parameters (plus command-line overrides) and pushes them to
//! the backend.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::client::RagClient;
use crate::config::Config;
use crate::metrics::{
    format_metrics, metric_deltas, render_score_line, to_percent, EvalResult, MetricKey,
    PassThresholds, SampleStatus, ScoreGrade, Trend,
};
use crate::params::{EvalHistory, ParamsSession, PromptLibrary};

fn thresholds(config: &Config) -> PassThresholds {
    PassThresholds {
        faithfulness: config.eval.min_faithfulness,
        answer_relevance: config.eval.min_answer_relevance,
    }
}

pub fn read_result(path: &Path) -> Result<EvalResult> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse evaluation result {}", path.display()))
}

pub async fn run_eval(
    config: &Config,
    output: Option<PathBuf>,
    previous: Option<PathBuf>,
) -> Result<()> {
    let client = RagClient::from_config(config)?;
    let mut session = ParamsSession::new(config.params.clone());
    let mut history = EvalHistory::default();
    if let Some(ref p) = previous {
        history.record(read_result(p)?);
    }

    let Some(params) = session.begin_eval() else {
        anyhow::bail!("an evaluation is already running");
    };
    println!(
        "Evaluating with temperature {} ({}), chunk_top_k {} ({})...",
        params.temperature,
        params.temperature_profile().label(),
        params.chunk_top_k,
        params.retrieval_profile().label()
    );

    let result = match client.run_evaluation(&params).await {
        Ok(r) => r,
        Err(e) => {
            session.abort_eval();
            return Err(e);
        }
    };
    session.finish_eval(params);
    history.record(result);

    let current = history.current().context("no evaluation recorded")?;
    print_report(current, history.previous(), &thresholds(config));

    if let Some(path) = output {
        std::fs::write(&path, serde_json::to_string_pretty(current)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Saved result to {}", path.display());
    }
    Ok(())
}

pub fn run_show(config: &Config, path: &Path, previous: Option<&Path>) -> Result<()> {
    let result = read_result(path)?;
    let previous = previous.map(read_result).transpose()?;
    print_report(&result, previous.as_ref(), &thresholds(config));
    Ok(())
}

pub fn print_report(
    result: &EvalResult,
    previous: Option<&EvalResult>,
    thresholds: &PassThresholds,
) {
    let metrics = result.effective_metrics();
    let current = format_metrics(Some(&metrics));
    let deltas = previous
        .map(|p| metric_deltas(&current, &format_metrics(Some(&p.effective_metrics()))));

    println!("Evaluation results");
    println!("==================");
    if let Some(ref at) = result.evaluated_at {
        println!("  evaluated at: {}", at);
    }
    println!();
    for (i, key) in MetricKey::ORDER.iter().enumerate() {
        let value = current.get(*key);
        let grade = match ScoreGrade::from_percent(value as f64) {
            ScoreGrade::Good => "good",
            ScoreGrade::Fair => "fair",
            ScoreGrade::Poor => "poor",
        };
        let trend = match deltas.as_ref().map(|d| d[i]) {
            Some(d) if d.trend == Trend::Up => format!("  (+{}%)", d.diff),
            Some(d) if d.trend == Trend::Down => format!("  ({}%)", d.diff),
            Some(_) => "  (=)".to_string(),
            None => String::new(),
        };
        println!("  {:<12} {:>3}%  {}{}", key.label(), value, grade, trend);
    }

    let summary = result.summarize(thresholds);
    println!();
    println!(
        "  {} samples evaluated, {} passed, {} need work ({:.0}% pass rate)",
        result.total_samples.max(summary.total),
        summary.passed,
        summary.failed,
        summary.pass_rate * 100.0
    );

    if result.samples.is_empty() {
        return;
    }
    println!();
    for sample in &result.samples {
        let mark = match sample.status(thresholds) {
            SampleStatus::Pass => "PASS",
            SampleStatus::Fail => "FAIL",
        };
        println!(
            "  [{}] #{} {}  ({})",
            mark,
            sample.id,
            sample.query,
            render_score_line(&sample.metrics)
        );
    }
}

pub fn run_params_show(config: &Config) -> Result<()> {
    let p = &config.params;
    println!("temperature:  {} ({})", p.temperature, p.temperature_profile().label());
    println!("top_k:        {}", p.top_k);
    println!("chunk_top_k:  {} ({})", p.chunk_top_k, p.retrieval_profile().label());
    println!("system prompt:");
    println!("  {}", p.system_prompt);
    println!();
    println!(
        "pass thresholds: faithfulness >= {}%, answer relevance >= {}%",
        to_percent(Some(config.eval.min_faithfulness)).unwrap_or(0.0),
        to_percent(Some(config.eval.min_answer_relevance)).unwrap_or(0.0),
    );
    println!();
    println!("prompt presets:");
    for preset in PromptLibrary::default().presets() {
        println!("  {:<10} {} - {}", preset.id, preset.label, preset.description);
    }
    Ok(())
}

/// Overrides applied on top of the configured parameters by `params save`.
#[derive(Debug, Clone, Default)]
pub struct ParamsOverrides {
    pub temperature: Option<f64>,
    pub top_k: Option<u32>,
    pub chunk_top_k: Option<u32>,
    /// Id of a prompt preset whose content replaces the system prompt.
    pub preset: Option<String>,
}

pub async fn run_params_save(config: &Config, overrides: ParamsOverrides) -> Result<()> {
    let mut session = ParamsSession::new(config.params.clone());
    let prompt = match overrides.preset {
        Some(ref id) => {
            let library = PromptLibrary::default();
            let preset = library
                .find(id)
                .with_context(|| format!("unknown prompt preset: {}", id))?;
            Some(preset.content.clone())
        }
        None => None,
    };

    session.edit(|p| {
        if let Some(t) = overrides.temperature {
            p.temperature = t;
        }
        if let Some(k) = overrides.top_k {
            p.top_k = k;
        }
        if let Some(k) = overrides.chunk_top_k {
            p.chunk_top_k = k;
        }
        if let Some(prompt) = prompt {
            p.system_prompt = prompt;
        }
    });
    session.commit()?;

    let client = RagClient::from_config(config)?;
    client.save_params(session.saved()).await?;

    let p = session.saved();
    println!(
        "Saved parameters to {}: temperature {}, top_k {}, chunk_top_k {}",
        client.base_url(),
        p.temperature,
        p.top_k,
        p.chunk_top_k
    );
    Ok(())
}
