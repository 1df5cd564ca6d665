use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use logvault::models::{LogBatch, LogEntry};
use logvault::search::translate;
use reqwest::{Client, RequestBuilder};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "logvault-cli")]
#[command(about = "LogVault command line client", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    endpoint: String,

    /// API key sent as X-API-Key
    #[arg(short = 'k', long, env = "LOGVAULT_API_KEY")]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit log entries, either one from flags or a JSON file
    Ingest {
        /// File holding `{"logs": [...]}` or a bare array of entries
        #[arg(short, long, conflicts_with_all = ["level", "message"])]
        file: Option<PathBuf>,

        #[arg(short, long, default_value = "INFO")]
        level: String,

        #[arg(short, long)]
        message: Option<String>,

        #[arg(short, long)]
        source: Option<String>,
    },

    /// Search logs
    Search {
        #[arg(value_name = "QUERY")]
        query: Option<String>,

        #[arg(short, long)]
        source: Option<String>,

        #[arg(short, long, default_value = "1")]
        page: u32,

        #[arg(short = 'l', long, default_value = "20")]
        limit: u32,
    },

    /// List known sources
    Sources,

    /// List known levels
    Levels,

    /// Show the source behind the API key
    Validate,

    /// Check server health
    Health,

    /// Print the engine query for a search string without contacting the server
    Explain {
        #[arg(value_name = "QUERY")]
        query: String,

        #[arg(short, long)]
        source: Option<String>,
    },
}

fn read_batch(path: &PathBuf) -> Result<LogBatch> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if let Ok(batch) = serde_json::from_str::<LogBatch>(&raw) {
        return Ok(batch);
    }
    let logs: Vec<LogEntry> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is neither a batch nor an array of entries", path.display()))?;
    Ok(LogBatch::new(logs))
}

fn with_key(request: RequestBuilder, api_key: Option<&str>) -> Result<RequestBuilder> {
    match api_key {
        Some(key) => Ok(request.header("X-API-Key", key)),
        None => bail!("An API key is required (use --api-key or LOGVAULT_API_KEY)"),
    }
}

async fn print_response(request: RequestBuilder) -> Result<()> {
    let response = request.send().await.context("Request failed")?;
    let status = response.status();
    let body: serde_json::Value = response.json().await.context("Invalid JSON response")?;
    println!("{}", serde_json::to_string_pretty(&body)?);

    if !status.is_success() {
        bail!("Server answered {}", status);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let endpoint = cli.endpoint.trim_end_matches('/');
    let api_key = cli.api_key.as_deref();

    match cli.command {
        Commands::Ingest {
            file,
            level,
            message,
            source,
        } => {
            let batch = match (file, message) {
                (Some(path), _) => read_batch(&path)?,
                (None, Some(message)) => {
                    let mut entry = LogEntry::new(level, message);
                    if let Some(source) = source {
                        entry = entry.with_source(source);
                    }
                    LogBatch::new(vec![entry])
                }
                (None, None) => bail!("Provide --file or --message"),
            };

            let request = client.post(format!("{}/logs", endpoint)).json(&batch);
            print_response(with_key(request, api_key)?).await?;
        }

        Commands::Search {
            query,
            source,
            page,
            limit,
        } => {
            let mut params = vec![("page", page.to_string()), ("limit", limit.to_string())];
            if let Some(q) = query {
                params.push(("q", q));
            }
            if let Some(source) = source {
                params.push(("source", source));
            }

            let request = client.get(format!("{}/search", endpoint)).query(&params);
            print_response(with_key(request, api_key)?).await?;
        }

        Commands::Sources => {
            print_response(client.get(format!("{}/sources", endpoint))).await?;
        }

        Commands::Levels => {
            print_response(client.get(format!("{}/levels", endpoint))).await?;
        }

        Commands::Validate => {
            let request = client.get(format!("{}/validate", endpoint));
            print_response(with_key(request, api_key)?).await?;
        }

        Commands::Health => {
            print_response(client.get(format!("{}/health", endpoint))).await?;
        }

        Commands::Explain { query, source } => {
            let rendered = translate(Some(&query), source.as_deref());
            println!("{}", serde_json::to_string_pretty(&rendered)?);
        }
    }

    Ok(())
}
