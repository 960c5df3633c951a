//! `ragdesk sanitize`, `ragdesk query` and `ragdesk health`.

use anyhow::{Context, Result};
use std::io::Write;

use crate::chat::StreamEvent;
use crate::client::RagClient;
use crate::config::Config;
use crate::models::{QueryMode, Reference};
use crate::sanitize::Sanitizer;

/// Print the sanitized form of `raw`. Exits non-zero if the query would be
/// rejected.
pub fn run_sanitize(config: &Config, raw: &str, explain: bool) -> Result<()> {
    let sanitizer = Sanitizer::from_config(&config.sanitizer)?;
    let outcome = sanitizer.inspect(raw);

    println!("{}", outcome.text);
    if explain {
        eprintln!("injection removed: {}", outcome.stripped_injection);
        eprintln!(
            "cut at marker:     {}",
            outcome.cut_at.as_deref().unwrap_or("-")
        );
        eprintln!("length capped:     {}", outcome.capped);
    }

    if outcome.is_rejected(raw) {
        eprintln!("Warning: the query contains disallowed content; please rephrase it.");
        std::process::exit(2);
    }
    Ok(())
}

pub async fn run_query(config: &Config, raw: &str, mode: QueryMode, stream: bool) -> Result<()> {
    let client = RagClient::from_config(config)?;
    let req = match client.prepare_query(raw, mode, &config.params) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Warning: {}", e);
            std::process::exit(2);
        }
    };

    if stream {
        let mut references = Vec::new();
        let mut stdout = std::io::stdout();
        let mut write_err: Option<std::io::Error> = None;
        client
            .query_stream(&req, |event| match event {
                StreamEvent::Response(delta) => {
                    if write_err.is_none() {
                        write_err = write!(stdout, "{}", delta)
                            .and_then(|_| stdout.flush())
                            .err();
                    }
                }
                StreamEvent::References(refs) => references.extend(refs),
                StreamEvent::Error(msg) => eprintln!("\nError: {}", msg),
            })
            .await?;
        if let Some(e) = write_err {
            return Err(e).context("Failed to write streamed answer");
        }
        println!();
        print_references(&references);
    } else {
        let resp = client.query(&req).await?;
        println!("{}", resp.response);
        print_references(&resp.references);
    }
    Ok(())
}

fn print_references(references: &[Reference]) {
    if references.is_empty() {
        return;
    }
    println!();
    println!("References:");
    for r in references {
        match r.reference_id {
            Some(ref id) => println!("  [{}] {}", id, r.display_name()),
            None => println!("  - {}", r.display_name()),
        }
    }
}

pub async fn run_health(config: &Config) -> Result<()> {
    let client = RagClient::from_config(config)?;
    let health = client.health().await?;
    println!("backend:        {}", client.base_url());
    println!("status:         {}", health.status);
    if let Some(ref v) = health.core_version {
        println!("core_version:   {}", v);
    }
    if let Some(ref v) = health.api_version {
        println!("api_version:    {}", v);
    }
    println!("pipeline_busy:  {}", health.pipeline_busy);
    Ok(())
}
