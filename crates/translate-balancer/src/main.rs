use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use translate_balancer::config::Config;
use translate_balancer::proxy::ProxyServer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "translate-balancer", version, about)]
struct Args {
    /// Configuration file (JSON, or YAML for .yaml/.yml)
    #[arg(
        short,
        long,
        env = "TRANSLATE_BALANCER_CONFIG",
        default_value = "config.json"
    )]
    config: PathBuf,

    /// Override the listen port from the config file
    #[arg(short, long, env = "TRANSLATE_BALANCER_PORT")]
    port: Option<u16>,

    /// Log output format
    #[arg(
        long,
        value_enum,
        env = "TRANSLATE_BALANCER_LOG_FORMAT",
        default_value_t = LogFormat::Text
    )]
    log_format: LogFormat,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init(),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    info!("Translate Balancer v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = Config::from_file(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config.display()))?;
    if let Some(port) = args.port {
        config.listen.port = port;
    }

    let server = ProxyServer::new(&config)?;
    server.run_until(shutdown_signal()).await?;

    info!("Translate Balancer stopped");
    Ok(())
}
