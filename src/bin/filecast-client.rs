use anyhow::{Context, Result};
use clap::Parser;
use filecast::client::repl;
use filecast::{logging, Client, ClientConfig};
use std::path::PathBuf;
use tokio::io::BufReader;

/// Interactive client: list and download files from a filecast server.
#[derive(Debug, Parser)]
#[command(name = "filecast-client", version, about)]
struct Cli {
    /// TOML config file
    #[arg(short, long, env = "FILECAST_CLIENT_CONFIG")]
    config: Option<PathBuf>,

    /// Server host [default: localhost]
    #[arg(long, env = "FILECAST_HOST")]
    host: Option<String>,

    /// Server port [default: 5001]
    #[arg(short, long, env = "FILECAST_PORT")]
    port: Option<u16>,

    /// Client id sent in the handshake [default: random 100-999]
    #[arg(long)]
    id: Option<i32>,

    /// Download directory [default: client_<id>_files]
    #[arg(short, long)]
    download_dir: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn into_config(self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ClientConfig::default(),
        };
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.id.is_some() {
            config.client_id = self.id;
        }
        if self.download_dir.is_some() {
            config.download_dir = self.download_dir;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = cli.into_config()?;
    let client = Client::connect(&config)
        .await
        .with_context(|| format!("Failed to connect to {}:{}", config.host, config.port))?;

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    repl::run(client, stdin, &mut stdout)
        .await
        .context("Session ended with an error")?;
    Ok(())
}
