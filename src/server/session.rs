//! One client connection: handshake, then a command loop until QUIT.

use crate::error::Result;
use crate::protocol::{self, Command, Handshake, Listing};
use crate::store::FileStore;
use crate::transfer::{SendOutcome, Sender, SenderConfig};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Counters for one session, logged when it ends.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub commands: u64,
    pub files_sent: u64,
    pub files_missing: u64,
    pub bytes_sent: u64,
}

/// Why the command loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Client sent QUIT.
    Quit,
    /// Client closed the connection between commands.
    Disconnected,
}

/// Server side of one connection.
pub struct Session<R, W> {
    reader: R,
    writer: W,
    store: Arc<FileStore>,
    sender: Sender,
    client_id: Option<i32>,
    stats: SessionStats,
}

impl<R, W> Session<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, store: Arc<FileStore>, config: SenderConfig) -> Self {
        Self {
            reader,
            writer,
            sender: Sender::new(store.clone(), config),
            store,
            client_id: None,
            stats: SessionStats::default(),
        }
    }

    pub fn client_id(&self) -> Option<i32> {
        self.client_id
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Run the session to completion.
    ///
    /// Any error returned has already ended the session; the caller only logs it.
    pub async fn run(&mut self) -> Result<SessionEnd> {
        let hello = Handshake::read(&mut self.reader).await?;
        self.client_id = Some(hello.client_id);
        info!("Client {} connected", hello.client_id);

        let end = self.command_loop().await;
        // Best effort; the peer may already be gone.
        let _ = self.writer.shutdown().await;
        end
    }

    async fn command_loop(&mut self) -> Result<SessionEnd> {
        loop {
            let command = match Command::read(&mut self.reader).await {
                Ok(command) => command,
                Err(e) if e.is_disconnect() => return Ok(SessionEnd::Disconnected),
                Err(e) => return Err(e),
            };
            self.stats.commands += 1;
            debug!("Client {:?}: {:?}", self.client_id, command);

            match command {
                Command::List => self.handle_list().await?,
                Command::Get(names) => self.handle_get(&names).await?,
                Command::Quit => return Ok(SessionEnd::Quit),
                Command::Unknown(line) => {
                    // No reply: the client doesn't expect one.
                    warn!("Client {:?}: ignoring unknown command {:?}", self.client_id, line);
                }
            }
        }
    }

    async fn handle_list(&mut self) -> Result<()> {
        let names = self.store.list().await?;
        debug!("Listing {} files", names.len());
        protocol::send(&mut self.writer, &Listing { names }.encode()?).await
    }

    async fn handle_get(&mut self, names: &[String]) -> Result<()> {
        for name in names {
            match self.sender.send_file(&mut self.writer, name).await? {
                SendOutcome::Sent { bytes, .. } => {
                    self.stats.files_sent += 1;
                    self.stats.bytes_sent += bytes;
                }
                SendOutcome::Missing | SendOutcome::Rejected => self.stats.files_missing += 1,
            }
        }
        Ok(())
    }
}
