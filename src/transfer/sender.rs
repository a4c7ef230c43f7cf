//! Sender side of a GET: one file header, then the file's chunks.

use crate::error::{Error, Result};
use crate::protocol::{FileHeader, DEFAULT_CHUNK_SIZE};
use crate::store::FileStore;
use crate::transfer::chunk::ChunkPlan;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace, warn};

/// Sender configuration
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Bytes per chunk
    pub chunk_size: usize,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// What happened to one requested name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent { bytes: u64, chunks: u32 },
    /// ERROR sent: no such file, or it could not be opened.
    Missing,
    /// ERROR sent: the name tried to leave the store root.
    Rejected,
}

/// Per-session sender. Owns the single chunk buffer reused for every read.
pub struct Sender {
    store: Arc<FileStore>,
    chunk_size: usize,
    buf: Vec<u8>,
}

impl Sender {
    pub fn new(store: Arc<FileStore>, config: SenderConfig) -> Self {
        Self {
            store,
            chunk_size: config.chunk_size,
            buf: Vec::new(),
        }
    }

    /// Answer one GET target.
    ///
    /// Missing or rejected names get an ERROR status and `Ok`; only failures
    /// that leave the stream unusable are returned as errors.
    pub async fn send_file<W>(&mut self, w: &mut W, name: &str) -> Result<SendOutcome>
    where
        W: AsyncWrite + Unpin,
    {
        let (mut file, size) = match self.store.open(name).await {
            Ok(Some(opened)) => opened,
            Ok(None) => {
                debug!("{}: not found", name);
                self.send_missing(w, name).await?;
                return Ok(SendOutcome::Missing);
            }
            Err(Error::InvalidName { reason, .. }) => {
                warn!("Rejected file name {:?}: {}", name, reason);
                self.send_missing(w, name).await?;
                return Ok(SendOutcome::Rejected);
            }
            Err(e) => {
                warn!("Failed to open {}: {}", name, e);
                self.send_missing(w, name).await?;
                return Ok(SendOutcome::Missing);
            }
        };

        let header = FileHeader::Found {
            name: name.to_string(),
            size,
        };
        w.write_all(&header.encode()?).await?;

        if self.buf.len() < self.chunk_size {
            self.buf.resize(self.chunk_size, 0);
        }

        let mut chunks = 0;
        for chunk in ChunkPlan::new(size, self.chunk_size) {
            let buf = &mut self.buf[..chunk.len as usize];
            // The size is already on the wire, so a short file can't be patched up.
            file.read_exact(buf).await.map_err(|e| {
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    Error::protocol(format!("{} shrank below its announced {} bytes", name, size))
                } else {
                    Error::Io(e)
                }
            })?;

            w.write_all(&chunk.encode()).await?;
            w.write_all(buf).await?;
            trace!("{}: sent part {} ({} bytes)", name, chunk.part, chunk.len);
            chunks = chunk.part;
        }
        w.flush().await?;

        debug!("{}: sent {} bytes in {} chunks", name, size, chunks);
        Ok(SendOutcome::Sent {
            bytes: size,
            chunks,
        })
    }

    async fn send_missing<W>(&self, w: &mut W, name: &str) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let header = FileHeader::Missing {
            name: name.to_string(),
        };
        w.write_all(&header.encode()?).await?;
        w.flush().await?;
        Ok(())
    }
}
