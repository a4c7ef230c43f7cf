//! File server: accept loop plus one task per connection.
//!
//! Sessions share nothing but the read-only [`FileStore`]. A failing or
//! stalled session never affects the accept loop or other sessions.

pub mod session;

pub use session::{Session, SessionEnd, SessionStats};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::store::FileStore;
use crate::transfer::SenderConfig;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// Bound, not yet serving.
pub struct Server {
    listener: TcpListener,
    store: Arc<FileStore>,
    sender_config: SenderConfig,
}

impl Server {
    /// Bind the listening socket and prepare the store root.
    ///
    /// Fails if the address can't be bound; nothing is served in that case.
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        config.validate()?;

        let root = config.root_path();
        if !root.exists() {
            tokio::fs::create_dir_all(&root).await?;
        }

        let listener = TcpListener::bind((config.bind.as_str(), config.port)).await?;
        info!(
            "Serving {} on {}",
            root.display(),
            listener.local_addr()?
        );

        Ok(Self {
            listener,
            store: Arc::new(FileStore::new(root)),
            sender_config: SenderConfig {
                chunk_size: config.chunk_size,
            },
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// Accept connections forever.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` completes.
    ///
    /// Sessions already running are left to finish on their own.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down listener");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_session(stream, peer),
                    // Usually fd exhaustion or an aborted handshake; keep listening.
                    Err(e) => warn!("Accept failed: {}", e),
                },
            }
        }
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr) {
        debug!("Accepted connection from {}", peer);
        if let Err(e) = stream.set_nodelay(true) {
            debug!("{}: set_nodelay failed: {}", peer, e);
        }

        let store = self.store.clone();
        let sender_config = self.sender_config.clone();

        tokio::spawn(async move {
            let (read_half, write_half) = stream.into_split();
            let mut session = Session::new(
                BufReader::new(read_half),
                BufWriter::new(write_half),
                store,
                sender_config,
            );

            match session.run().await {
                Ok(end) => info!(
                    "Session {} ({:?}) closed: {:?}, {} files / {} bytes sent, {} missing",
                    peer,
                    session.client_id(),
                    end,
                    session.stats().files_sent,
                    session.stats().bytes_sent,
                    session.stats().files_missing,
                ),
                Err(e) => error!(
                    "Session {} ({:?}) failed: {}",
                    peer,
                    session.client_id(),
                    e
                ),
            }
        });
    }
}
