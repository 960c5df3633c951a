//! HTTP client for the RAG backend.
//!
//! A thin wrapper over `reqwest` that adds authentication headers, maps
//! error responses to readable errors, and refuses to send a query that the
//! sanitizer rejected.
//!
//! # Authentication
//!
//! When `[backend].token` is set every request carries
//! `Authorization: Bearer <token>`; when `[backend].api_key` is set it also
//! carries `X-API-Key`. A `401` from the backend becomes an
//! "authentication required" error.

use anyhow::{bail, Context, Result};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::chat::{LineBuffer, StreamEvent};
use crate::config::Config;
use crate::documents::content_type_for;
use crate::metrics::EvalResult;
use crate::models::{
    DeleteDocumentsRequest, DocActionResponse, DocumentRecord, DocumentsPage, EvalDatasetEntry,
    HealthStatus, QueryMode, QueryRequest, QueryResponse,
};
use crate::params::RagParams;
use crate::sanitize::Sanitizer;

#[derive(Debug, Clone)]
pub struct RagClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    token: Option<String>,
    sanitizer: Sanitizer,
}

impl RagClient {
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.backend.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: config.backend.base_url.trim_end_matches('/').to_string(),
            api_key: config.backend.api_key.clone().filter(|k| !k.is_empty()),
            token: config.backend.token.clone().filter(|t| !t.is_empty()),
            sanitizer: Sanitizer::from_config(&config.sanitizer)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "backend request");
        let mut req = self.http.request(method, url);
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }
        if let Some(ref key) = self.api_key {
            req = req.header("X-API-Key", key);
        }
        req
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response> {
        let resp = req.send().await.context("Failed to reach backend")?;
        check_status(resp).await
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        let resp = self.send(self.request(Method::GET, "/health")).await?;
        Ok(resp.json().await?)
    }

    /// Sanitize `raw` and build a query request from it.
    ///
    /// Fails without contacting the backend if nothing survives
    /// sanitization.
    pub fn prepare_query(
        &self,
        raw: &str,
        mode: QueryMode,
        params: &RagParams,
    ) -> Result<QueryRequest> {
        let outcome = self.sanitizer.inspect(raw);
        if outcome.stripped_injection || outcome.cut_at.is_some() {
            warn!(
                injection = outcome.stripped_injection,
                cut_at = outcome.cut_at.as_deref().unwrap_or(""),
                "query modified by sanitizer"
            );
        }
        if outcome.text.is_empty() {
            bail!("query rejected: it is empty or contains disallowed content");
        }

        Ok(QueryRequest {
            query: outcome.text,
            mode,
            top_k: Some(params.top_k),
            chunk_top_k: Some(params.chunk_top_k),
            include_references: Some(true),
            ..Default::default()
        })
    }

    pub async fn query(&self, req: &QueryRequest) -> Result<QueryResponse> {
        let resp = self
            .send(self.request(Method::POST, "/query").json(req))
            .await?;
        Ok(resp.json().await.context("Invalid /query response")?)
    }

    /// Stream an answer from `/query/stream`, calling `on_event` per NDJSON
    /// line. Malformed lines are logged and skipped.
    pub async fn query_stream<F>(&self, req: &QueryRequest, mut on_event: F) -> Result<()>
    where
        F: FnMut(StreamEvent),
    {
        let mut body = req.clone();
        body.stream = Some(true);
        let mut resp = self
            .send(self.request(Method::POST, "/query/stream").json(&body))
            .await?;

        let mut buf = LineBuffer::default();
        let mut dispatch = |line: &str| match StreamEvent::parse_line(line) {
            Ok(Some(event)) => on_event(event),
            Ok(None) => {}
            Err(e) => warn!("skipping stream line: {:#}", e),
        };

        while let Some(chunk) = resp.chunk().await? {
            for line in buf.push(&chunk) {
                dispatch(&line);
            }
        }
        if let Some(rest) = buf.finish() {
            dispatch(&rest);
        }
        Ok(())
    }

    pub async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        let resp = self.send(self.request(Method::GET, "/documents")).await?;
        let page: DocumentsPage = resp.json().await.context("Invalid /documents response")?;
        Ok(page.flatten())
    }

    pub async fn upload_document(&self, path: &Path) -> Result<DocActionResponse> {
        let content_type = content_type_for(path)
            .with_context(|| format!("unsupported file type: {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("invalid file name: {}", path.display()))?
            .to_string();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(content_type)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .send(self.request(Method::POST, "/documents/upload").multipart(form))
            .await?;
        Ok(resp.json().await?)
    }

    pub async fn delete_documents(
        &self,
        doc_ids: Vec<String>,
        delete_file: bool,
    ) -> Result<DocActionResponse> {
        let body = DeleteDocumentsRequest {
            doc_ids,
            delete_file,
            delete_llm_cache: false,
        };
        let resp = self
            .send(
                self.request(Method::DELETE, "/documents/delete_document")
                    .json(&body),
            )
            .await?;
        Ok(resp.json().await?)
    }

    /// Run an evaluation with the given parameters.
    pub async fn run_evaluation(&self, params: &RagParams) -> Result<EvalResult> {
        let resp = self
            .send(self.request(Method::POST, "/rag/evaluate").json(params))
            .await?;
        Ok(resp.json().await.context("Invalid evaluation response")?)
    }

    pub async fn save_params(&self, params: &RagParams) -> Result<()> {
        params.validate()?;
        self.send(self.request(Method::POST, "/rag/save-params").json(params))
            .await?;
        Ok(())
    }

    pub async fn eval_dataset(&self) -> Result<Vec<EvalDatasetEntry>> {
        let resp = self.send(self.request(Method::GET, "/eval/data")).await?;
        Ok(resp.json().await?)
    }
}

async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let url = resp.url().to_string();
    if status == StatusCode::UNAUTHORIZED {
        bail!("authentication required: {}", url);
    }
    let body = resp.text().await.unwrap_or_default();
    bail!(
        "{} {}\n{}\n{}",
        status.as_u16(),
        status.canonical_reason().unwrap_or(""),
        body,
        url
    )
}
