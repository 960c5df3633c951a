//! # ragdesk CLI
//!
//! ```bash
//! ragdesk --config ./config/ragdesk.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragdesk sanitize "<text>"` | Print the sanitized form of a query |
//! | `ragdesk query "<text>"` | Sanitize and send a query to the backend |
//! | `ragdesk docs list` | List indexed documents |
//! | `ragdesk docs upload <file>...` | Upload documents for indexing |
//! | `ragdesk docs delete <id>...` | Delete documents |
//! | `ragdesk eval run` | Evaluate the configured parameters |
//! | `ragdesk eval show <file>` | Print a saved evaluation result |
//! | `ragdesk params show` | Show parameters and prompt presets |
//! | `ragdesk params save` | Save parameters to the backend |
//! | `ragdesk health` | Check the backend |
//! | `ragdesk serve` | Start the local guard service |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ragdesk::config::{self, Config};
use ragdesk::models::QueryMode;
use ragdesk::{documents, eval_cmd, logger, query, server};

/// ragdesk: query guard, evaluation reports, and backend client for a RAG
/// knowledge-base assistant.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Without one, built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "ragdesk",
    about = "Query guard, evaluation reports, and backend client for a RAG knowledge-base assistant",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragdesk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sanitize a query and print the result.
    ///
    /// Exits with status 2 if nothing usable is left.
    Sanitize {
        /// Raw query text.
        text: String,

        /// Report which sanitizer stages changed the query (on stderr).
        #[arg(long)]
        explain: bool,
    },

    /// Sanitize a query and ask the backend.
    Query {
        /// Raw query text.
        text: String,

        /// Retrieval mode.
        #[arg(long, value_enum, default_value_t = QueryMode::Mix)]
        mode: QueryMode,

        /// Stream the answer as it is generated.
        #[arg(long)]
        stream: bool,
    },

    /// Manage indexed documents.
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },

    /// Run or inspect evaluations.
    Eval {
        #[command(subcommand)]
        action: EvalAction,
    },

    /// Inspect retrieval and generation parameters.
    Params {
        #[command(subcommand)]
        action: ParamsAction,
    },

    /// Check backend health.
    Health,

    /// Start the local guard service on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum DocsAction {
    /// List documents grouped by processing status.
    List,
    /// Upload one or more files.
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Delete documents by id.
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
        /// Also delete the source file on the backend.
        #[arg(long)]
        delete_file: bool,
    },
}

#[derive(Subcommand)]
enum ParamsAction {
    /// Show the configured parameters and prompt presets.
    Show,
    /// Save the configured parameters, with optional overrides, to the
    /// backend.
    Save {
        #[arg(long)]
        temperature: Option<f64>,
        #[arg(long)]
        top_k: Option<u32>,
        #[arg(long)]
        chunk_top_k: Option<u32>,
        /// Prompt preset id (`default`, `precise`, `summary`).
        #[arg(long)]
        preset: Option<String>,
    },
}

#[derive(Subcommand)]
enum EvalAction {
    /// Evaluate the configured parameters on the backend.
    Run {
        /// Write the raw result JSON to this file.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Earlier result file to compare against.
        #[arg(long)]
        previous: Option<PathBuf>,
    },
    /// Print a saved evaluation result.
    Show {
        file: PathBuf,
        /// Earlier result file to compare against.
        #[arg(long)]
        previous: Option<PathBuf>,
    },
}

fn load_or_default(path: &std::path::Path) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = load_or_default(&cli.config)?;
    logger::init(&cfg.log.level)?;

    match cli.command {
        Commands::Sanitize { text, explain } => {
            query::run_sanitize(&cfg, &text, explain)?;
        }
        Commands::Query { text, mode, stream } => {
            query::run_query(&cfg, &text, mode, stream).await?;
        }
        Commands::Docs { action } => match action {
            DocsAction::List => documents::run_list(&cfg).await?,
            DocsAction::Upload { files } => documents::run_upload(&cfg, &files).await?,
            DocsAction::Delete { ids, delete_file } => {
                documents::run_delete(&cfg, ids, delete_file).await?
            }
        },
        Commands::Eval { action } => match action {
            EvalAction::Run { output, previous } => {
                eval_cmd::run_eval(&cfg, output, previous).await?;
            }
            EvalAction::Show { file, previous } => {
                eval_cmd::run_show(&cfg, &file, previous.as_deref())?;
            }
        },
        Commands::Params { action } => match action {
            ParamsAction::Show => eval_cmd::run_params_show(&cfg)?,
            ParamsAction::Save {
                temperature,
                top_k,
                chunk_top_k,
                preset,
            } => {
                let overrides = eval_cmd::ParamsOverrides {
                    temperature,
                    top_k,
                    chunk_top_k,
                    preset,
                };
                eval_cmd::run_params_save(&cfg, overrides).await?
            }
        },
        Commands::Health => {
            query::run_health(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
