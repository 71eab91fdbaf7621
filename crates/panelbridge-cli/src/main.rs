//! panelbridge CLI — stdio panel host and configuration commands.
//!
//! Usage:
//!   panelbridge serve        — Bridge a JSON-lines panel on stdin/stdout
//!   panelbridge models       — List the selectable models
//!   panelbridge onboard      — Create a default configuration
//!   panelbridge status       — Show current configuration and health

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use panelbridge_core::catalog::{ModelCatalog, ProviderKind};
use panelbridge_core::config::Config;
use panelbridge_core::dispatch::{AdapterSet, DispatchDefaults, Dispatcher};
use panelbridge_core::provider::host::{HostModelAdapter, UnavailableHostApi};
use panelbridge_core::provider::local::OllamaAdapter;
use panelbridge_core::provider::multimodal::{GeminiAdapter, API_KEY_ENV};
use panelbridge_core::relay::events::PanelCommand;
use panelbridge_core::relay::stdio::StdioPanel;

#[derive(Parser)]
#[command(
    name = "panelbridge",
    version,
    about = "Bridge between a panel UI and local/hosted generation providers"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Bridge a JSON-lines panel on stdin/stdout
    Serve {
        /// Config file path (default: ~/.panelbridge/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List the selectable models
    Models,

    /// Create or reset the default configuration
    Onboard,

    /// Show configuration status and health
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { config }) => cmd_serve(config).await?,
        Some(Commands::Models) => cmd_models(),
        Some(Commands::Onboard) => cmd_onboard()?,
        Some(Commands::Status) => cmd_status()?,
        None => cmd_serve(None).await?,
    }

    Ok(())
}

// ── Serve Command ───────────────────────────────────────────────────

/// Wire the dispatcher to stdio: panel commands arrive one JSON object
/// per stdin line, replies leave one JSON object per stdout line.
async fn cmd_serve(config_path: Option<PathBuf>) -> Result<()> {
    let config = match config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };

    let default_provider = match ProviderKind::parse_tag(&config.defaults.provider) {
        Some(p) => p,
        None => {
            warn!(
                tag = %config.defaults.provider,
                "unknown default provider in config, falling back to local"
            );
            ProviderKind::LocalModel
        }
    };

    let client = reqwest::Client::new();
    let adapters = AdapterSet {
        local: Arc::new(OllamaAdapter::new(
            client.clone(),
            &config.providers.ollama.base_url,
        )),
        multimodal: Arc::new(GeminiAdapter::new(
            client.clone(),
            &config.providers.gemini.base_url,
            config.providers.gemini.api_key(),
        )),
        host: Arc::new(HostModelAdapter::new(
            Arc::new(UnavailableHostApi),
            config.providers.host.selector.clone(),
        )),
    };

    let dispatcher = Dispatcher::new(
        Arc::new(ModelCatalog::builtin()),
        adapters,
        Arc::new(StdioPanel::new()),
        DispatchDefaults {
            provider: default_provider,
            model_key: config.defaults.model_key.clone(),
        },
    );

    // Banner goes to stderr; stdout belongs to the panel wire.
    eprintln!("  panelbridge v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("  Serving panel messages on stdio. Ctrl+C to stop.");

    let cancel = CancellationToken::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<PanelCommand>(line) {
                    Ok(cmd) => dispatcher.handle_message(cmd, cancel.child_token()).await,
                    Err(e) => warn!(error = %e, "skipping unparseable panel message"),
                }
            }
        }
    }

    eprintln!("  Shutdown complete.");
    Ok(())
}

// ── Models Command ──────────────────────────────────────────────────

fn cmd_models() {
    let catalog = ModelCatalog::builtin();
    println!();
    for (provider, key, descriptor) in catalog.entries() {
        let kinds: Vec<&str> = descriptor.media_kinds.iter().map(|k| k.tag()).collect();
        println!(
            "  {:8} {:10} {:24} [{}]",
            provider.tag(),
            key,
            descriptor.display_name,
            kinds.join(", ")
        );
    }
    println!();
}

// ── Onboard Command ─────────────────────────────────────────────────

fn cmd_onboard() -> Result<()> {
    let path = Config::write_default_template()?;
    println!();
    println!("  ✅ Configuration created at:");
    println!("     {}", path.display());
    println!();
    println!("  Next steps:");
    println!("  1. Edit the config file and add your API key");
    println!("  2. Run `panelbridge serve` to start the bridge");
    println!();
    Ok(())
}

// ── Status Command ──────────────────────────────────────────────────

fn cmd_status() -> Result<()> {
    let config_path = Config::default_path();
    let config = Config::load()?;

    println!();
    println!("  panelbridge status");
    println!("  ─────────────────────────────────────");

    if config_path.exists() {
        println!("  Config:    {}", config_path.display());
    } else {
        println!("  Config:    ❌ Not found (run `panelbridge onboard`)");
    }

    println!("  Local:     {}", config.providers.ollama.base_url);

    let gemini_key = config
        .providers
        .gemini
        .api_key()
        .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()));
    match gemini_key {
        Some(_) => println!("  Gemini:    ✅ API key configured"),
        None => println!("  Gemini:    ❌ No API key (config or {})", API_KEY_ENV),
    }

    match config.providers.host.selector.as_deref() {
        Some(selector) => println!("  Host:      selector `{}`", selector),
        None => println!("  Host:      ❌ No model selector configured"),
    }

    println!("  Default:   {}", config.defaults.provider);
    println!();
    Ok(())
}
