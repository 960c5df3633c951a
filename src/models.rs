//! Wire types exchanged with the RAG backend.
//!
//! Field names follow the backend's JSON; optional request fields are
//! skipped when unset so the backend applies its own defaults.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Retrieval mode for `/query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Basic vector search.
    Naive,
    /// Context-dependent entity retrieval.
    Local,
    /// Global relationship retrieval.
    Global,
    /// Local and global combined.
    Hybrid,
    /// Knowledge graph plus vector retrieval.
    #[default]
    Mix,
    /// Skip retrieval and call the LLM directly.
    Bypass,
}

/// Body of `POST /query` and `POST /query/stream`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryRequest {
    pub query: String,
    pub mode: QueryMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_references: Option<bool>,
}

/// A source document cited by an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default)]
    pub reference_id: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl Reference {
    pub fn display_name(&self) -> &str {
        self.file_path.as_deref().unwrap_or("unknown file")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueryResponse {
    pub response: String,
    #[serde(default)]
    pub references: Vec<Reference>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocActionStatus {
    Success,
    PartialSuccess,
    Failure,
    Duplicated,
    DeletionStarted,
    Busy,
    NotAllowed,
}

/// Response of upload and delete calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DocActionResponse {
    pub status: DocActionStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub track_id: Option<String>,
}

/// Body of `DELETE /documents/delete_document`.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteDocumentsRequest {
    pub doc_ids: Vec<String>,
    pub delete_file: bool,
    pub delete_llm_cache: bool,
}

/// One entry of the backend's document status listing.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DocumentRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub content_length: Option<u64>,
    #[serde(default)]
    pub chunks_count: Option<u64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub error_msg: Option<String>,
}

/// `GET /documents` response: documents grouped by processing status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentsPage {
    #[serde(default)]
    pub statuses: BTreeMap<String, Vec<DocumentRecord>>,
}

/// One line of the evaluation dataset (`EVAL.jsonl`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalDatasetEntry {
    pub q: String,
    #[serde(default)]
    pub gold: Vec<String>,
    #[serde(default)]
    pub doc_hint: Vec<String>,
}

/// `GET /health`. Only the fields the client displays are modelled.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub core_version: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub pipeline_busy: bool,
}
