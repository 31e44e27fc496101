use anyhow::Result;
use clap::Parser;
use dagcheck::server::PipelineServer;
use dagcheck::Config;
use std::path::PathBuf;

/// Pipeline DAG validation server
#[derive(Debug, Parser)]
#[command(name = "dagcheck", version, about)]
struct Args {
    /// Path to config.toml (overrides DAGCHECK_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind (overrides server.host)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides server.port)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    // RUST_LOG wins over server.log_level
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.server.log_level.as_str()),
    )
    .init();

    log::info!("Starting dagcheck v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Configuration loaded from {}", config.source_description());
    log::info!(
        "Dangling edge policy: {:?}, limits: {} nodes / {} edges",
        config.validation.dangling_edges,
        config.validation.max_nodes,
        config.validation.max_edges
    );

    PipelineServer::new(config).run().await?;

    Ok(())
}
