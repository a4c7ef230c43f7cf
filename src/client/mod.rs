//! Client session driver.
//!
//! Synchronous from the caller's point of view: every call sends one command
//! and returns once the whole response has been read. Nothing else may be
//! issued while a GET is in flight.

pub mod repl;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::protocol::{self, Command, Handshake, Listing};
use crate::transfer::{FileOutcome, Progress, Receiver, ReceiverConfig};
use rand::Rng;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Response to one executed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Listing(Vec<String>),
    /// One outcome per requested name, in request order.
    Files(Vec<FileOutcome>),
    Quit,
}

/// Random id in the same range the reference client uses.
pub fn random_client_id() -> i32 {
    rand::thread_rng().gen_range(100..=999)
}

/// The server splits GET arguments on whitespace, so each name must survive
/// that split as exactly one word.
fn check_wire_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "empty name"
    } else if name.chars().any(|c| c.is_ascii_whitespace()) {
        "whitespace not allowed"
    } else {
        return Ok(());
    };
    Err(Error::InvalidName {
        name: name.to_string(),
        reason,
    })
}

/// A connected client over any byte stream.
pub struct Client<R, W> {
    reader: R,
    writer: W,
    client_id: i32,
    receiver: Receiver,
}

impl Client<BufReader<OwnedReadHalf>, BufWriter<OwnedWriteHalf>> {
    /// Create the download directory, connect and send the handshake.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let client_id = config.client_id.unwrap_or_else(random_client_id);
        let download_dir = config.download_dir_for(client_id);
        tokio::fs::create_dir_all(&download_dir).await?;

        let stream = TcpStream::connect((config.host.as_str(), config.port)).await?;
        stream.set_nodelay(true)?;
        info!(
            "Connected to {}:{} as client {}",
            config.host, config.port, client_id
        );

        let (read_half, write_half) = stream.into_split();
        Self::handshake(
            BufReader::new(read_half),
            BufWriter::new(write_half),
            client_id,
            ReceiverConfig { root: download_dir },
        )
        .await
    }
}

impl<R, W> Client<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Start a session on an already-open stream.
    pub async fn handshake(
        reader: R,
        mut writer: W,
        client_id: i32,
        config: ReceiverConfig,
    ) -> Result<Self> {
        protocol::send(&mut writer, &Handshake { client_id }.encode()).await?;
        Ok(Self {
            reader,
            writer,
            client_id,
            receiver: Receiver::new(config),
        })
    }

    pub fn client_id(&self) -> i32 {
        self.client_id
    }

    pub fn download_dir(&self) -> &Path {
        self.receiver.root()
    }

    /// Names of the files the server currently offers.
    pub async fn list(&mut self) -> Result<Vec<String>> {
        self.send_command(&Command::List).await?;
        let listing = Listing::read(&mut self.reader).await?;
        debug!("Server lists {} files", listing.names.len());
        Ok(listing.names)
    }

    /// Download every name with a single GET.
    ///
    /// The server answers each name in order; exactly that many responses are
    /// read. Names the command line can't carry one-to-one (empty, or with
    /// whitespace) are refused before anything is sent. Stream errors abort
    /// the batch and leave any partial file behind.
    pub async fn get<S, F>(&mut self, names: &[S], mut on_progress: F) -> Result<Vec<FileOutcome>>
    where
        S: AsRef<str>,
        F: FnMut(&Progress<'_>),
    {
        let names: Vec<String> = names.iter().map(|n| n.as_ref().to_string()).collect();
        if names.is_empty() {
            return Ok(Vec::new());
        }
        for name in &names {
            check_wire_name(name)?;
        }
        let count = names.len();
        self.send_command(&Command::Get(names)).await?;

        let mut outcomes = Vec::with_capacity(count);
        for _ in 0..count {
            let outcome = self
                .receiver
                .receive_file(&mut self.reader, &mut on_progress)
                .await?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// End the session. The server sends nothing back.
    pub async fn quit(mut self) -> Result<()> {
        self.close().await
    }

    /// Run a parsed command.
    ///
    /// Unknown commands are refused locally and never reach the server.
    /// After `Reply::Quit` the session is closed and must not be used again.
    pub async fn execute<F>(&mut self, command: Command, on_progress: F) -> Result<Reply>
    where
        F: FnMut(&Progress<'_>),
    {
        match command {
            Command::List => Ok(Reply::Listing(self.list().await?)),
            Command::Get(names) => Ok(Reply::Files(self.get(&names, on_progress).await?)),
            Command::Quit => {
                self.close().await?;
                Ok(Reply::Quit)
            }
            Command::Unknown(line) => Err(Error::UnknownCommand(line)),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.send_command(&Command::Quit).await?;
        self.writer.shutdown().await?;
        info!("Client {} disconnected", self.client_id);
        Ok(())
    }

    async fn send_command(&mut self, command: &Command) -> Result<()> {
        // Encode first so an oversized line fails before touching the stream.
        let encoded = command.encode()?;
        protocol::send(&mut self.writer, &encoded).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::Session;
    use crate::store::FileStore;
    use crate::transfer::SenderConfig;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Client wired to an in-process server session over a duplex pipe.
    async fn pair(
        store: &TempDir,
        downloads: &TempDir,
    ) -> Client<impl AsyncRead + Unpin, impl AsyncWrite + Unpin> {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let store = Arc::new(FileStore::new(store.path()));
        tokio::spawn(async move {
            let (r, w) = tokio::io::split(server_io);
            let mut session = Session::new(r, w, store, SenderConfig { chunk_size: 4 });
            let _ = session.run().await;
        });

        let (r, w) = tokio::io::split(client_io);
        Client::handshake(
            r,
            w,
            11,
            ReceiverConfig {
                root: downloads.path().to_path_buf(),
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_refuses_names_that_would_split() {
        let store = TempDir::new().unwrap();
        let downloads = TempDir::new().unwrap();
        std::fs::write(store.path().join("a"), "aaa").unwrap();
        std::fs::write(store.path().join("b"), "bbb").unwrap();
        let mut client = pair(&store, &downloads).await;

        for bad in [vec![""], vec!["a b"], vec!["a", "tab\tname"]] {
            let err = client.get(&bad[..], |_| {}).await.unwrap_err();
            assert!(matches!(err, Error::InvalidName { .. }), "{bad:?}: {err}");
            assert!(!err.is_fatal());
        }

        // Nothing reached the server, so the session is still in step.
        assert_eq!(client.list().await.unwrap().len(), 2);
        let outcomes = client.get(&["b"], |_| {}).await.unwrap();
        assert!(matches!(outcomes[0], FileOutcome::Downloaded { bytes: 3, .. }));
        assert!(!downloads.path().join("a").exists());
        client.quit().await.unwrap();
    }

    #[test]
    fn test_random_client_id_range() {
        for _ in 0..1000 {
            let id = random_client_id();
            assert!((100..=999).contains(&id));
        }
    }
}
