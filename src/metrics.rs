//! Evaluation metric formatting and pass/fail classification.
//!
//! The backend's `/rag/evaluate` endpoint reports RAGAS-style scores in
//! `[0, 1]`. This module turns them into display percentages, grades them,
//! classifies individual samples, and aggregates a result set. None of these
//! functions fail: missing scores degrade to `0` (for thresholds and integer
//! percents) or `None` (for one-decimal percents).

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four reported metrics, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    Faithfulness,
    AnswerRelevance,
    ContextRecall,
    ContextPrecision,
}

impl MetricKey {
    pub const ORDER: [MetricKey; 4] = [
        MetricKey::Faithfulness,
        MetricKey::AnswerRelevance,
        MetricKey::ContextRecall,
        MetricKey::ContextPrecision,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::Faithfulness => "faithfulness",
            MetricKey::AnswerRelevance => "answer_relevance",
            MetricKey::ContextRecall => "context_recall",
            MetricKey::ContextPrecision => "context_precision",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetricKey::Faithfulness => "Faithfulness",
            MetricKey::AnswerRelevance => "Relevance",
            MetricKey::ContextRecall => "Recall",
            MetricKey::ContextPrecision => "Precision",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MetricKey::Faithfulness => {
                "Whether the answer stays faithful to the source documents without hallucinated facts."
            }
            MetricKey::AnswerRelevance => {
                "Whether the answer actually addresses the question asked."
            }
            MetricKey::ContextRecall => {
                "Whether retrieval found all document fragments relevant to the question."
            }
            MetricKey::ContextPrecision => {
                "Whether the retrieved fragments are relevant rather than noise."
            }
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw scores in `[0, 1]`. Any of them may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RagasMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faithfulness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_relevance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_recall: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_precision: Option<f64>,
}

impl RagasMetrics {
    pub fn get(&self, key: MetricKey) -> Option<f64> {
        match key {
            MetricKey::Faithfulness => self.faithfulness,
            MetricKey::AnswerRelevance => self.answer_relevance,
            MetricKey::ContextRecall => self.context_recall,
            MetricKey::ContextPrecision => self.context_precision,
        }
    }

    fn set(&mut self, key: MetricKey, value: Option<f64>) {
        match key {
            MetricKey::Faithfulness => self.faithfulness = value,
            MetricKey::AnswerRelevance => self.answer_relevance = value,
            MetricKey::ContextRecall => self.context_recall = value,
            MetricKey::ContextPrecision => self.context_precision = value,
        }
    }
}

/// Round half toward positive infinity.
fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// Convert a `[0, 1]` score to a percentage with one decimal place.
///
/// `to_percent(Some(0.823)) == Some(82.3)`. Missing or NaN input gives `None`.
pub fn to_percent(value: Option<f64>) -> Option<f64> {
    match value {
        Some(v) if !v.is_nan() => Some(round_half_up(v * 1000.0) / 10.0),
        _ => None,
    }
}

/// Integer percentage used by the summary cards; missing is `0`.
pub fn to_whole_percent(value: Option<f64>) -> i64 {
    match value {
        Some(v) if v.is_finite() => round_half_up(v * 100.0) as i64,
        _ => 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleStatus {
    Pass,
    Fail,
}

impl SampleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleStatus::Pass => "pass",
            SampleStatus::Fail => "fail",
        }
    }
}

impl fmt::Display for SampleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimum scores a sample needs to pass. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassThresholds {
    pub faithfulness: f64,
    pub answer_relevance: f64,
}

impl Default for PassThresholds {
    fn default() -> Self {
        Self {
            faithfulness: 0.7,
            answer_relevance: 0.8,
        }
    }
}

impl PassThresholds {
    pub fn classify(&self, metrics: &RagasMetrics) -> SampleStatus {
        let faithfulness = metrics.faithfulness.unwrap_or(0.0);
        let relevance = metrics.answer_relevance.unwrap_or(0.0);
        if faithfulness >= self.faithfulness && relevance >= self.answer_relevance {
            SampleStatus::Pass
        } else {
            SampleStatus::Fail
        }
    }
}

/// Classify with the default thresholds (faithfulness ≥ 0.7 and answer
/// relevance ≥ 0.8).
pub fn classify_sample(metrics: &RagasMetrics) -> SampleStatus {
    PassThresholds::default().classify(metrics)
}

/// Integer percentages for all four metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricPercents {
    pub faithfulness: i64,
    pub answer_relevance: i64,
    pub context_recall: i64,
    pub context_precision: i64,
}

impl MetricPercents {
    pub fn get(&self, key: MetricKey) -> i64 {
        match key {
            MetricKey::Faithfulness => self.faithfulness,
            MetricKey::AnswerRelevance => self.answer_relevance,
            MetricKey::ContextRecall => self.context_recall,
            MetricKey::ContextPrecision => self.context_precision,
        }
    }
}

/// Format all four metrics as integer percentages. No metrics at all gives
/// zeros across the board.
pub fn format_metrics(metrics: Option<&RagasMetrics>) -> MetricPercents {
    let Some(m) = metrics else {
        return MetricPercents::default();
    };
    MetricPercents {
        faithfulness: to_whole_percent(m.faithfulness),
        answer_relevance: to_whole_percent(m.answer_relevance),
        context_recall: to_whole_percent(m.context_recall),
        context_precision: to_whole_percent(m.context_precision),
    }
}

/// Coarse quality band for a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreGrade {
    Poor,
    Fair,
    Good,
}

impl ScoreGrade {
    pub fn from_percent(percent: f64) -> Self {
        if percent < 60.0 {
            ScoreGrade::Poor
        } else if percent < 80.0 {
            ScoreGrade::Fair
        } else {
            ScoreGrade::Good
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

/// Change of one metric against the previous evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricDelta {
    pub key: MetricKey,
    pub value: i64,
    pub diff: i64,
    pub trend: Trend,
}

/// Per-metric differences between two formatted results, in display order.
pub fn metric_deltas(current: &MetricPercents, previous: &MetricPercents) -> Vec<MetricDelta> {
    MetricKey::ORDER
        .iter()
        .map(|&key| {
            let value = current.get(key);
            let diff = value - previous.get(key);
            let trend = match diff {
                d if d > 0 => Trend::Up,
                d if d < 0 => Trend::Down,
                _ => Trend::Flat,
            };
            MetricDelta {
                key,
                value,
                diff,
                trend,
            }
        })
        .collect()
}

/// Compact `"95 / 98 / - / 100"` line of one-decimal percentages.
pub fn render_score_line(metrics: &RagasMetrics) -> String {
    MetricKey::ORDER
        .iter()
        .map(|&key| match to_percent(metrics.get(key)) {
            Some(p) => format!("{}", p),
            None => "-".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" / ")
}

/// Sample identifiers arrive as numbers from some backends and strings from
/// others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleId {
    Number(u64),
    Text(String),
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleId::Number(n) => write!(f, "{}", n),
            SampleId::Text(s) => f.write_str(s),
        }
    }
}

/// One evaluated question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalSample {
    pub id: SampleId,
    pub query: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub reference_answer: String,
    #[serde(default)]
    pub contexts: Vec<String>,
    #[serde(default)]
    pub metrics: RagasMetrics,
}

impl EvalSample {
    pub fn status(&self, thresholds: &PassThresholds) -> SampleStatus {
        thresholds.classify(&self.metrics)
    }
}

/// Response body of an evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalResult {
    pub total_samples: usize,
    #[serde(default)]
    pub metrics: RagasMetrics,
    #[serde(default)]
    pub samples: Vec<EvalSample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluated_at: Option<String>,
}

/// Aggregate view over an [`EvalResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Fraction of samples passing, `0.0` for an empty result.
    pub pass_rate: f64,
    /// Mean of each metric over the samples that report it.
    pub sample_means: RagasMetrics,
}

impl EvalResult {
    pub fn summarize(&self, thresholds: &PassThresholds) -> EvalSummary {
        let passed = self
            .samples
            .iter()
            .filter(|s| s.status(thresholds) == SampleStatus::Pass)
            .count();
        let total = self.samples.len();

        let mut sample_means = RagasMetrics::default();
        for key in MetricKey::ORDER {
            let values: Vec<f64> = self
                .samples
                .iter()
                .filter_map(|s| s.metrics.get(key))
                .filter(|v| v.is_finite())
                .collect();
            if !values.is_empty() {
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                sample_means.set(key, Some(mean));
            }
        }

        EvalSummary {
            total,
            passed,
            failed: total - passed,
            pass_rate: if total > 0 {
                passed as f64 / total as f64
            } else {
                0.0
            },
            sample_means,
        }
    }

    /// Top-level metrics, falling back to the sample means for any metric the
    /// backend left out.
    pub fn effective_metrics(&self) -> RagasMetrics {
        let means = self.summarize(&PassThresholds::default()).sample_means;
        let mut out = self.metrics;
        for key in MetricKey::ORDER {
            if out.get(key).is_none() {
                out.set(key, means.get(key));
            }
        }
        out
    }
}
