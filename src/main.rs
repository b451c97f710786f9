use clap::Parser;
use nim_proxy::config::config_search_paths;
use nim_proxy::{build_router, AppState, ProxyConfig, SharedJournal};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "nim-proxy",
    about = "OpenAI-compatible chat completions proxy in front of NVIDIA NIM",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Request journal path
    #[arg(long, default_value = "nim-proxy.log")]
    log_file: PathBuf,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nim_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let mut config = ProxyConfig::find_and_load(cli.config.as_deref())?;
    config.apply_env()?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    let journal = SharedJournal::open(&cli.log_file)?;
    let state = AppState::from_config(config.clone(), journal)?;

    info!("nim-proxy v{}", env!("CARGO_PKG_VERSION"));
    info!("  Backend:   {}", state.backend.base_url);
    info!(
        "  API key:   {}",
        if state.backend.api_key.is_empty() { "not set" } else { "set" }
    );
    info!(
        "  Timeouts:  connect {}s, read {}s",
        config.backend.connect_timeout_secs, config.backend.read_timeout_secs
    );
    info!("  Body cap:  {} bytes", config.max_body_bytes);
    info!("  Journal:   {}", cli.log_file.display());

    let app = build_router(Arc::new(state));
    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
