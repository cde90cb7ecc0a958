use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use memo_core::config::{self, BackendKind, Config};
use memo_core::persistence;
use memo_core::query::MemoQuery;
use memo_core::store::MemoStore;
use memo_core::types::CategoryFilter;
use memo_core::util::truncate_string;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(
    name = "memo",
    about = format!("{} memo - Personal memos with AI summaries and tag suggestions", memo_core::LOGO),
    version = memo_core::VERSION,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize memo configuration and data directory
    Onboard,
    /// Start the HTTP API
    Serve {
        /// Bind host (default: server.host from config)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (default: server.port from config)
        #[arg(short, long)]
        port: Option<u16>,
        /// Keep memos in process memory only
        #[arg(long)]
        ephemeral: bool,
    },
    /// Show memo status
    Status,
    /// List memos
    List {
        /// Only show this category (personal, work, study, idea, other)
        #[arg(short, long)]
        category: Option<String>,
        /// Case-insensitive search over title, content and tags
        #[arg(short, long)]
        query: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("memo=info".parse()?)
                .add_directive("memo_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => cmd_onboard()?,
        Commands::Serve {
            host,
            port,
            ephemeral,
        } => cmd_serve(host, port, ephemeral).await?,
        Commands::Status => cmd_status()?,
        Commands::List { category, query } => cmd_list(category, query).await?,
    }

    Ok(())
}

fn cmd_onboard() -> Result<()> {
    let config_path = config::get_config_path();

    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        println!("Delete it first to re-onboard.");
        return Ok(());
    }

    let cfg = Config::default();
    config::save_config(&cfg, None)?;
    println!("{} Created config at {}", memo_core::LOGO, config_path.display());

    let data_dir = memo_core::util::ensure_dir(&cfg.data_dir())?;
    println!("{} Created data directory at {}", memo_core::LOGO, data_dir.display());

    println!("\n{} memo is ready!", memo_core::LOGO);
    println!("\nNext steps:");
    println!("  1. Add a Gemini API key to {}", config_path.display());
    println!("     (or export GEMINI_API_KEY)");
    println!("  2. Start the API: memo serve");
    Ok(())
}

#[cfg(feature = "http-api")]
async fn cmd_serve(host: Option<String>, port: Option<u16>, ephemeral: bool) -> Result<()> {
    use memo_core::service::http::{serve, AppState};

    let mut cfg = config::load_config_from_env();
    if let Some(host) = host {
        cfg.server.host = host;
    }
    if let Some(port) = port {
        cfg.server.port = port;
    }
    if ephemeral {
        cfg.persistence.backend = BackendKind::Memory;
    }

    let repository = persistence::create_repository(&cfg)?;
    let addr = cfg.bind_addr();
    let state = Arc::new(AppState::with_provider(cfg, repository).await);

    println!("{} Starting memo HTTP API on {}...", memo_core::LOGO, addr);
    serve(&addr, state).await?;
    Ok(())
}

#[cfg(not(feature = "http-api"))]
async fn cmd_serve(_host: Option<String>, _port: Option<u16>, _ephemeral: bool) -> Result<()> {
    eprintln!("HTTP API not available. Rebuild with: cargo build --features http-api");
    std::process::exit(1);
}

fn cmd_status() -> Result<()> {
    let config_path = config::get_config_path();
    let cfg = config::load_config_from_env();

    println!("{} memo Status\n", memo_core::LOGO);
    println!(
        "Config: {} {}",
        config_path.display(),
        if config_path.exists() { "✓" } else { "✗" }
    );
    println!("Version: {} ({})", memo_core::VERSION, memo_core::GIT_HASH);
    println!("Model: {}", cfg.ai.model);
    println!(
        "Gemini API: {}",
        if cfg.providers.gemini.api_key.is_empty() { "not set" } else { "✓" }
    );
    println!(
        "OpenAI API: {}",
        if cfg.providers.openai.api_key.is_empty() { "not set" } else { "✓" }
    );

    match cfg.persistence.resolved_backend() {
        BackendKind::Rest => println!("Store: hosted ({})", cfg.persistence.url),
        BackendKind::Memory => println!("Store: in-memory"),
        BackendKind::File | BackendKind::Auto => {
            let dir = cfg.data_dir();
            println!(
                "Store: files in {} {}",
                dir.display(),
                if dir.exists() { "✓" } else { "✗" }
            );
        }
    }
    println!("HTTP API: {}", cfg.bind_addr());
    Ok(())
}

async fn cmd_list(category: Option<String>, query: Option<String>) -> Result<()> {
    let cfg = config::load_config_from_env();
    let repository = persistence::create_repository(&cfg)?;
    let mut store = MemoStore::new(repository);
    store.load_all().await?;

    let query = MemoQuery::new(
        query.unwrap_or_default(),
        CategoryFilter::parse(category.as_deref().unwrap_or_default()),
    );
    let view = store.view_with(&query);

    if view.memos.is_empty() {
        println!("No memos.");
    }
    for memo in &view.memos {
        let tags = if memo.tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", memo.tags.join(", "))
        };
        println!(
            "{}  {:<8} {}{}",
            memo.created_at.format("%Y-%m-%d %H:%M"),
            memo.category,
            truncate_string(&memo.title, 48, "…"),
            tags
        );
    }

    let stats = &view.stats;
    let breakdown: Vec<String> = stats
        .by_category
        .iter()
        .map(|(category, count)| format!("{}: {}", category, count))
        .collect();
    println!(
        "\n{} of {} memos ({})",
        stats.filtered,
        stats.total,
        breakdown.join(", ")
    );
    Ok(())
}
