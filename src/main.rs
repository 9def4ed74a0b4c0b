use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use chat_mvp_core::config::{self, Config};
use chat_mvp_core::service::ChatService;

#[derive(Parser)]
#[command(
    name = "chat-mvp",
    about = "Minimal chat web service backed by an OpenAI-compatible API",
    version = chat_mvp_core::VERSION,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Bind host (overrides HOST)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Send one message through the chat pipeline without starting a server
    Ask {
        /// Message to send
        message: Vec<String>,
        /// User id for the session
        #[arg(short, long, default_value = "cli")]
        user: String,
    },
    /// Print the effective configuration (API key redacted)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Read before the subscriber so RUST_LOG from .env applies.
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chat_mvp=info".parse()?)
                .add_directive("chat_mvp_core=info".parse()?),
        )
        .init();

    match dotenv {
        Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
        Err(e) => tracing::debug!("No .env file loaded: {}", e),
    }

    let cli = Cli::parse();
    let cfg = config::load_config_from_env();

    match cli.command {
        Commands::Serve { host, port } => cmd_serve(cfg, host, port).await?,
        Commands::Ask { message, user } => cmd_ask(cfg, message, user).await?,
        Commands::Config => cmd_config(&cfg)?,
    }

    Ok(())
}

// ====== Commands ======

#[cfg(feature = "http-api")]
async fn cmd_serve(mut cfg: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    use chat_mvp_core::service::http::{serve, AppState};

    if let Some(host) = host {
        cfg.server.host = host;
    }
    if let Some(port) = port {
        cfg.server.port = port;
    }

    let chat = ChatService::from_config(&cfg).context("invalid configuration")?;
    let addr = cfg.bind_addr();
    tracing::info!(
        "Starting {} {} on {} (model {}, history window {})",
        chat_mvp_core::SERVICE_NAME,
        chat_mvp_core::VERSION,
        addr,
        cfg.chat.model,
        cfg.chat.history_window,
    );

    let state = Arc::new(AppState::new(cfg, Arc::new(chat)));
    serve(&addr, state).await
}

#[cfg(not(feature = "http-api"))]
async fn cmd_serve(_cfg: Config, _host: Option<String>, _port: Option<u16>) -> Result<()> {
    anyhow::bail!("HTTP API not available. Rebuild with: cargo build --features http-api")
}

async fn cmd_ask(cfg: Config, message: Vec<String>, user: String) -> Result<()> {
    let message = message.join(" ");
    let chat = ChatService::from_config(&cfg).context("invalid configuration")?;
    let reply = chat.chat(&user, &message).await?;
    println!("{reply}");
    Ok(())
}

fn cmd_config(cfg: &Config) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&cfg.redacted())?);
    if let Err(e) = cfg.validate() {
        eprintln!("warning: {e}");
    }
    Ok(())
}
