use anyhow::{Context, Result};
use clap::Parser;
use filecast::{logging, Server, ServerConfig};
use std::path::PathBuf;
use tracing::{info, warn};

/// Serve the regular files of a directory to filecast clients.
#[derive(Debug, Parser)]
#[command(name = "filecast-server", version, about)]
struct Cli {
    /// TOML config file
    #[arg(short, long, env = "FILECAST_SERVER_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on [default: 0.0.0.0]
    #[arg(long, env = "FILECAST_BIND")]
    bind: Option<String>,

    /// TCP port [default: 5001]
    #[arg(short, long, env = "FILECAST_PORT")]
    port: Option<u16>,

    /// Directory to serve [default: server_files]
    #[arg(short, long, env = "FILECAST_ROOT")]
    root: Option<PathBuf>,

    /// Chunk size in bytes [default: 1048576]
    #[arg(long, env = "FILECAST_CHUNK_SIZE")]
    chunk_size: Option<usize>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn into_config(self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ServerConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(root) = self.root {
            config.root = root;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // Startup messages should be visible without -v.
    logging::init(cli.verbose.max(1));

    let config = cli.into_config()?;
    let server = Server::bind(&config)
        .await
        .with_context(|| format!("Failed to start server on {}:{}", config.bind, config.port))?;

    server
        .run_until(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Interrupted"),
                Err(e) => {
                    warn!("Cannot listen for Ctrl-C, running until killed: {}", e);
                    std::future::pending::<()>().await
                }
            }
        })
        .await?;
    Ok(())
}
