//! Document management: listing, upload, and deletion against the backend.
//!
//! Used by the `ragdesk docs` subcommands.

use anyhow::{bail, Result};
use std::path::Path;

use crate::client::RagClient;
use crate::config::Config;
use crate::models::{DocumentRecord, DocumentsPage};

/// Extensions the backend can ingest.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "pdf", "docx", "pptx", "xlsx"];

/// Human-readable size: `0 B`, otherwise one decimal in B/KB/MB/GB.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// MIME type used for upload, or `None` if the backend cannot ingest the file.
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "txt" | "md" => Some("text/plain"),
        "pdf" => Some("application/pdf"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        "pptx" => {
            Some("application/vnd.openxmlformats-officedocument.presentationml.presentation")
        }
        "xlsx" => Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        _ => None,
    }
}

pub fn is_supported_file(path: &Path) -> bool {
    content_type_for(path).is_some()
}

impl DocumentsPage {
    /// All documents across status groups, each tagged with its group when
    /// the record itself carries no status.
    pub fn flatten(self) -> Vec<DocumentRecord> {
        self.statuses
            .into_iter()
            .flat_map(|(status, docs)| {
                docs.into_iter().map(move |mut d| {
                    if d.status.is_none() {
                        d.status = Some(status.clone());
                    }
                    d
                })
            })
            .collect()
    }
}

/// CLI entry point for `docs list`.
pub async fn run_list(config: &Config) -> Result<()> {
    let client = RagClient::from_config(config)?;
    let docs = client.list_documents().await?;

    println!("{} documents", docs.len());
    for doc in &docs {
        let size = doc
            .content_length
            .map(format_file_size)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<40} {:<10} {:>10}  chunks: {}",
            doc.file_path.as_deref().unwrap_or("(unknown)"),
            doc.status.as_deref().unwrap_or("?"),
            size,
            doc.chunks_count
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    Ok(())
}

/// CLI entry point for `docs upload`.
pub async fn run_upload(config: &Config, paths: &[std::path::PathBuf]) -> Result<()> {
    for path in paths {
        if !is_supported_file(path) {
            bail!(
                "unsupported file type: {} (supported: {})",
                path.display(),
                SUPPORTED_EXTENSIONS.join(", ")
            );
        }
    }

    let client = RagClient::from_config(config)?;
    for path in paths {
        let resp = client.upload_document(path).await?;
        println!("{}: {:?} {}", path.display(), resp.status, resp.message);
        if let Some(track_id) = resp.track_id {
            println!("  track_id: {}", track_id);
        }
    }
    Ok(())
}

/// CLI entry point for `docs delete`.
pub async fn run_delete(config: &Config, ids: Vec<String>, delete_file: bool) -> Result<()> {
    if ids.is_empty() {
        bail!("no document ids given");
    }
    let client = RagClient::from_config(config)?;
    let resp = client.delete_documents(ids, delete_file).await?;
    println!("{:?}: {}", resp.status, resp.message);
    Ok(())
}
