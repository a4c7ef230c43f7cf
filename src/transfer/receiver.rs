//! Receiver side of a GET: reassembles chunks into the download directory.

use crate::error::{Error, Result};
use crate::path::resolve;
use crate::protocol::{ChunkHeader, FileHeader, MAX_CHUNK_SIZE};
use crate::transfer::progress::Progress;
use std::io;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, trace, warn};

/// Receiver configuration
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Directory downloaded files are written to
    pub root: PathBuf,
}

/// Result of one file response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Downloaded {
        name: String,
        path: PathBuf,
        bytes: u64,
    },
    /// Server answered ERROR.
    NotFound { name: String },
    /// Server sent a name that would land outside the download directory.
    /// The payload was read and discarded.
    Rejected { name: String, reason: String },
    /// Local write failed. The payload was drained so the session survives.
    Failed { name: String, reason: String },
}

impl FileOutcome {
    pub fn name(&self) -> &str {
        match self {
            FileOutcome::Downloaded { name, .. }
            | FileOutcome::NotFound { name }
            | FileOutcome::Rejected { name, .. }
            | FileOutcome::Failed { name, .. } => name,
        }
    }
}

/// Receiver state. One payload buffer, reused for every chunk.
pub struct Receiver {
    config: ReceiverConfig,
    buf: Vec<u8>,
}

impl Receiver {
    pub fn new(config: ReceiverConfig) -> Self {
        Self {
            config,
            buf: Vec::new(),
        }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.config.root
    }

    /// Read one file response and write it under the download directory.
    ///
    /// `on_progress` runs after every chunk. Errors reading the stream are
    /// returned as-is; a file interrupted that way stays on disk truncated.
    pub async fn receive_file<R, F>(&mut self, r: &mut R, mut on_progress: F) -> Result<FileOutcome>
    where
        R: AsyncRead + Unpin,
        F: FnMut(&Progress<'_>),
    {
        let (name, size) = match FileHeader::read(r).await? {
            FileHeader::Missing { name } => {
                debug!("{}: server reported no such file", name);
                return Ok(FileOutcome::NotFound { name });
            }
            FileHeader::Found { name, size } => (name, size),
        };

        let path = match resolve(&self.config.root, &name) {
            Ok(path) => path,
            Err(Error::InvalidName { reason, .. }) => {
                warn!("Discarding {} bytes for unsafe name {:?}: {}", size, name, reason);
                self.copy_chunks(r, &name, size, None, &mut |_: &Progress<'_>| {})
                    .await?;
                return Ok(FileOutcome::Rejected {
                    name,
                    reason: reason.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let sink = match File::create(&path).await {
            Ok(file) => Some(file),
            Err(e) => {
                warn!("Cannot create {}: {}", path.display(), e);
                self.copy_chunks(r, &name, size, None, &mut |_: &Progress<'_>| {})
                    .await?;
                return Ok(FileOutcome::Failed {
                    name,
                    reason: e.to_string(),
                });
            }
        };

        match self
            .copy_chunks(r, &name, size, sink, &mut on_progress)
            .await?
        {
            None => {
                debug!("{}: received {} bytes -> {}", name, size, path.display());
                Ok(FileOutcome::Downloaded {
                    name,
                    path,
                    bytes: size,
                })
            }
            Some(e) => Ok(FileOutcome::Failed {
                name,
                reason: e.to_string(),
            }),
        }
    }

    /// Read chunks until `size` bytes have arrived, writing them to `sink`.
    ///
    /// A local write error stops writing but not reading; it is returned in
    /// the `Ok` value once the stream is back at a message boundary.
    async fn copy_chunks<R, F>(
        &mut self,
        r: &mut R,
        name: &str,
        size: u64,
        mut sink: Option<File>,
        on_progress: &mut F,
    ) -> Result<Option<io::Error>>
    where
        R: AsyncRead + Unpin,
        F: FnMut(&Progress<'_>),
    {
        let mut received = 0u64;
        let mut write_error = None;

        while received < size {
            let chunk = ChunkHeader::read(r).await?;
            let len = chunk.len as usize;
            let remaining = size - received;

            if len == 0 {
                return Err(Error::protocol(format!("{}: empty chunk", name)));
            }
            if len > MAX_CHUNK_SIZE || chunk.len as u64 > remaining {
                return Err(Error::protocol(format!(
                    "{}: chunk of {} bytes with {} outstanding",
                    name, len, remaining
                )));
            }

            self.buf.resize(len, 0);
            r.read_exact(&mut self.buf).await?;

            if let Some(file) = sink.as_mut() {
                if let Err(e) = file.write_all(&self.buf).await {
                    warn!("Write to {} failed, draining remaining data: {}", name, e);
                    write_error = Some(e);
                    sink = None;
                }
            }

            received += chunk.len as u64;
            trace!("{}: part {} ({} bytes)", name, chunk.part, len);
            on_progress(&Progress {
                name,
                part: chunk.part,
                received,
                total: size,
            });
        }

        if let Some(mut file) = sink {
            if let Err(e) = file.flush().await {
                write_error = Some(e);
            }
        }

        Ok(write_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use std::path::Path;
    use tempfile::TempDir;

    fn response(name: &str, content: &[u8], chunk_size: usize) -> Vec<u8> {
        let mut out = BytesMut::new();
        out.extend_from_slice(
            &FileHeader::Found {
                name: name.to_string(),
                size: content.len() as u64,
            }
            .encode()
            .unwrap(),
        );
        for (i, data) in content.chunks(chunk_size).enumerate() {
            out.extend_from_slice(
                &ChunkHeader {
                    part: i as u32 + 1,
                    len: data.len() as u32,
                }
                .encode(),
            );
            out.extend_from_slice(data);
        }
        out.to_vec()
    }

    fn receiver(tmp: &TempDir) -> Receiver {
        Receiver::new(ReceiverConfig {
            root: tmp.path().to_path_buf(),
        })
    }

    #[tokio::test]
    async fn test_receive_basic() {
        let tmp = TempDir::new().unwrap();
        let wire = response("hello.txt", b"hello world", 4);

        let mut percents = Vec::new();
        let mut r = &wire[..];
        let outcome = receiver(&tmp)
            .receive_file(&mut r, |p| percents.push((p.part, p.percent())))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            FileOutcome::Downloaded {
                name: "hello.txt".into(),
                path: tmp.path().join("hello.txt"),
                bytes: 11,
            }
        );
        assert_eq!(std::fs::read(tmp.path().join("hello.txt")).unwrap(), b"hello world");
        assert_eq!(percents, vec![(1, 36), (2, 72), (3, 100)]);
        assert!(r.is_empty());
    }

    #[tokio::test]
    async fn test_receive_not_found_creates_nothing() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("keep.txt"), "original").unwrap();
        let wire = FileHeader::Missing {
            name: "keep.txt".into(),
        }
        .encode()
        .unwrap();

        let mut r = &wire[..];
        let outcome = receiver(&tmp).receive_file(&mut r, |_| {}).await.unwrap();
        assert_eq!(
            outcome,
            FileOutcome::NotFound {
                name: "keep.txt".into()
            }
        );
        assert_eq!(std::fs::read_to_string(tmp.path().join("keep.txt")).unwrap(), "original");
    }

    #[tokio::test]
    async fn test_receive_rejects_traversal_and_stays_in_sync() {
        let tmp = TempDir::new().unwrap();
        let downloads = tmp.path().join("downloads");
        std::fs::create_dir(&downloads).unwrap();

        let mut wire = response("../escape.txt", b"malicious", 4);
        wire.extend(response("ok.txt", b"fine", 4));

        let mut receiver = Receiver::new(ReceiverConfig { root: downloads.clone() });
        let mut r = &wire[..];

        let first = receiver.receive_file(&mut r, |_| {}).await.unwrap();
        assert!(matches!(first, FileOutcome::Rejected { .. }));
        assert!(!tmp.path().join("escape.txt").exists());

        let second = receiver.receive_file(&mut r, |_| {}).await.unwrap();
        assert_eq!(second.name(), "ok.txt");
        assert_eq!(std::fs::read(downloads.join("ok.txt")).unwrap(), b"fine");
    }

    #[tokio::test]
    async fn test_receive_empty_file() {
        let tmp = TempDir::new().unwrap();
        let wire = response("empty.bin", b"", 4);

        let mut calls = 0;
        let mut r = &wire[..];
        let outcome = receiver(&tmp)
            .receive_file(&mut r, |_| calls += 1)
            .await
            .unwrap();

        assert!(matches!(outcome, FileOutcome::Downloaded { bytes: 0, .. }));
        assert_eq!(calls, 0);
        assert_eq!(std::fs::metadata(tmp.path().join("empty.bin")).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_create_failure_drains_and_continues() {
        let tmp = TempDir::new().unwrap();
        // A directory where the file should go makes File::create fail.
        std::fs::create_dir(tmp.path().join("blocked.txt")).unwrap();

        let mut wire = response("blocked.txt", &[1u8; 10], 4);
        wire.extend(response("next.txt", b"after", 4));

        let mut receiver = receiver(&tmp);
        let mut r = &wire[..];

        let mut calls = 0;
        let first = receiver.receive_file(&mut r, |_| calls += 1).await.unwrap();
        assert!(matches!(first, FileOutcome::Failed { ref name, .. } if name == "blocked.txt"));
        assert_eq!(calls, 0);
        assert!(tmp.path().join("blocked.txt").is_dir());

        let second = receiver.receive_file(&mut r, |_| {}).await.unwrap();
        assert!(matches!(second, FileOutcome::Downloaded { bytes: 5, .. }));
        assert_eq!(std::fs::read(tmp.path().join("next.txt")).unwrap(), b"after");
        assert!(r.is_empty());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_write_failure_drains_and_continues() {
        let tmp = TempDir::new().unwrap();
        if !Path::new("/dev/full").exists() {
            eprintln!("Skipping test: /dev/full not available");
            return;
        }
        // Every write to /dev/full fails with ENOSPC.
        std::os::unix::fs::symlink("/dev/full", tmp.path().join("full.bin")).unwrap();

        let mut wire = response("full.bin", &[2u8; 12], 4);
        wire.extend(response("next.txt", b"ok", 4));

        let mut receiver = receiver(&tmp);
        let mut r = &wire[..];

        let first = receiver.receive_file(&mut r, |_| {}).await.unwrap();
        assert!(matches!(first, FileOutcome::Failed { .. }), "{first:?}");

        let second = receiver.receive_file(&mut r, |_| {}).await.unwrap();
        assert!(matches!(second, FileOutcome::Downloaded { bytes: 2, .. }));
        assert!(r.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_chunk_is_protocol_error() {
        let tmp = TempDir::new().unwrap();
        let mut wire = FileHeader::Found {
            name: "f".into(),
            size: 3,
        }
        .encode()
        .unwrap()
        .to_vec();
        wire.extend_from_slice(&ChunkHeader { part: 1, len: 4 }.encode());
        wire.extend_from_slice(b"abcd");

        let mut r = &wire[..];
        let err = receiver(&tmp).receive_file(&mut r, |_| {}).await.unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_truncated_stream_leaves_partial_file() {
        let tmp = TempDir::new().unwrap();
        let mut wire = response("big.bin", &[9u8; 12], 4);
        wire.truncate(wire.len() - 6);

        let mut r = &wire[..];
        let err = receiver(&tmp).receive_file(&mut r, |_| {}).await.unwrap_err();
        assert!(err.is_disconnect());
        let partial = std::fs::metadata(tmp.path().join("big.bin")).unwrap().len();
        assert!(partial < 12);
    }
}
