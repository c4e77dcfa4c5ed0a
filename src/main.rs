mod ai;
mod config;
mod editor;
mod errors;
mod keys;
mod nav;
mod query;
mod store;
mod tui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use config::{ConfigFile, ResolvedConfig};
use store::StoreClient;

#[derive(Parser, Debug)]
#[command(
    name = "recall",
    about = "A terminal knowledge base for troubleshooting snippets, with local-AI search",
    long_about = None,
)]
struct Args {
    /// Run a one-shot semantic search and print results (omit for the TUI)
    query: Option<String>,

    /// Override the snippet store endpoint
    #[arg(long, env = "RECALL_STORE_URL")]
    store_url: Option<String>,

    /// Override the Ollama endpoint
    #[arg(long, env = "RECALL_OLLAMA_URL")]
    ollama_url: Option<String>,

    /// Override the model name
    #[arg(short, long, env = "RECALL_MODEL")]
    model: Option<String>,

    /// Maximum results for semantic search
    #[arg(short, long)]
    limit: Option<usize>,

    /// Write a default config file to ~/.config/recall/config.toml and exit
    #[arg(long)]
    init: bool,

    /// Generate shell completions and print to stdout (bash, zsh, fish, elvish)
    #[arg(long, value_name = "SHELL")]
    completions: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ── --init ────────────────────────────────────────────────────────────────
    if args.init {
        let path = ConfigFile::write_default_if_missing()?;
        println!("Config written to: {}", path.display());
        println!("Edit it, then run: recall");
        return Ok(());
    }

    // ── --completions ─────────────────────────────────────────────────────────
    if let Some(shell_name) = &args.completions {
        return generate_completions(shell_name);
    }

    let file = ConfigFile::load()?;
    let resolved = ResolvedConfig::resolve(
        &file,
        args.store_url.as_deref(),
        args.ollama_url.as_deref(),
        args.model.as_deref(),
        args.limit,
    );

    init_logging(&resolved);

    // ── One-shot search (plain stdout, no TUI) ────────────────────────────────
    if let Some(query) = args.query {
        return run_search(query, resolved).await;
    }

    // ── Interactive TUI mode ──────────────────────────────────────────────────
    tui::run(resolved).await
}

// ── Logging ───────────────────────────────────────────────────────────────────

/// The TUI owns the terminal, so diagnostics go to a log file. Filter comes
/// from RUST_LOG, then the config file, then a quiet default.
fn init_logging(resolved: &ResolvedConfig) {
    let log_path = config::log_path();
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    else {
        return;
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            EnvFilter::try_new(resolved.log_filter.as_deref().unwrap_or("recall=info"))
        })
        .unwrap_or_else(|_| EnvFilter::new("recall=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .try_init();
}

// ── One-shot search (plain stdout, no TUI) ────────────────────────────────────

async fn run_search(query: String, resolved: ResolvedConfig) -> Result<()> {
    let store = StoreClient::new(resolved.store_url.clone());

    println!();
    println!("  ⌘ recall  ·  {}", resolved.model);
    println!();

    let results = match store.semantic_search(&query, resolved.search_limit).await {
        Ok(results) => results,
        Err(errors::QueryError::Unreachable) => {
            eprintln!("  ✗ store unreachable at {}", resolved.store_url);
            eprintln!("    AI search requires the store service and Ollama to be running.");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("  ✗ search failed: {e}");
            std::process::exit(1);
        }
    };

    if results.is_empty() {
        println!("  no matches for \"{query}\"");
        return Ok(());
    }

    for hit in &results {
        println!("  {:>3.0}%  {}", hit.score * 100.0, hit.snippet.title);
        let preview: String = hit.snippet.problem.chars().take(72).collect();
        println!("        {preview}");
        if let Some(lang) = &hit.snippet.code_language {
            println!("        [{lang}]");
        }
        println!();
    }
    Ok(())
}

// ── Shell completions ─────────────────────────────────────────────────────────

fn generate_completions(shell_name: &str) -> Result<()> {
    use clap_complete::{Shell, generate};

    let shell: Shell = match shell_name.to_lowercase().as_str() {
        "bash" => Shell::Bash,
        "zsh" => Shell::Zsh,
        "fish" => Shell::Fish,
        "elvish" => Shell::Elvish,
        _ => {
            eprintln!("Unknown shell: {shell_name}");
            eprintln!("Supported: bash, zsh, fish, elvish");
            std::process::exit(1);
        }
    };

    let mut cmd = Args::command();
    generate(shell, &mut cmd, "recall", &mut std::io::stdout());
    Ok(())
}
