//! Session protocol for filecast.
//!
//! No frame header and no message type tag: both peers know what comes next
//! from the command that was sent, so fields are written back to back in a
//! fixed order.
//!
//! Wire format: all multi-byte integers are big-endian.
//! Strings are length-prefixed (u16 len + UTF-8).
//!
//! ```text
//! handshake  client -> server   id:i32
//! command    client -> server   line:str
//! listing    server -> client   count:i32 | name:str * count
//! file       server -> client   "ERROR":str | name:str
//!                               "OK":str | name:str | size:i64 | chunk*
//! chunk                         part:i32 | len:i32 | bytes[len]
//! ```

use crate::error::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 5001;

/// Default chunk size for file payloads (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Largest chunk either side will produce or accept (64 MiB).
pub const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Longest string the u16 length prefix can carry.
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

pub const STATUS_OK: &str = "OK";
pub const STATUS_ERROR: &str = "ERROR";

// =============================================================================
// String primitive
// =============================================================================

pub fn put_str(buf: &mut BytesMut, s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    if bytes.len() > MAX_STRING_LEN {
        return Err(Error::StringTooLong {
            len: bytes.len(),
            max: MAX_STRING_LEN,
        });
    }
    buf.reserve(2 + bytes.len());
    buf.put_u16(bytes.len() as u16);
    buf.put_slice(bytes);
    Ok(())
}

pub async fn read_str<R: AsyncRead + Unpin>(r: &mut R) -> Result<String> {
    let len = r.read_u16().await? as usize;
    let mut bytes = vec![0u8; len];
    r.read_exact(&mut bytes).await?;
    String::from_utf8(bytes).map_err(|_| Error::protocol("invalid UTF-8 in string"))
}

/// Write an encoded message and flush it to the peer.
pub async fn send<W: AsyncWrite + Unpin>(w: &mut W, msg: &Bytes) -> Result<()> {
    w.write_all(msg).await?;
    w.flush().await?;
    Ok(())
}

// =============================================================================
// Handshake
// =============================================================================

/// First message of every session: the client's self-assigned id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    pub client_id: i32,
}

impl Handshake {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(4);
        buf.put_i32(self.client_id);
        buf.freeze()
    }

    pub async fn read<R: AsyncRead + Unpin>(r: &mut R) -> Result<Self> {
        Ok(Self {
            client_id: r.read_i32().await?,
        })
    }
}

// =============================================================================
// Command
// =============================================================================

/// One line of client input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Get(Vec<String>),
    Quit,
    Unknown(String),
}

impl Command {
    /// Parse a command line. The keyword is case-insensitive.
    pub fn parse(line: &str) -> Self {
        let mut words = line.split_ascii_whitespace();
        let Some(keyword) = words.next() else {
            return Command::Unknown(line.to_string());
        };

        if keyword.eq_ignore_ascii_case("list") && words.clone().next().is_none() {
            Command::List
        } else if keyword.eq_ignore_ascii_case("quit") && words.clone().next().is_none() {
            Command::Quit
        } else if keyword.eq_ignore_ascii_case("get") {
            Command::Get(words.map(str::to_string).collect())
        } else {
            Command::Unknown(line.to_string())
        }
    }

    /// Canonical text form sent on the wire.
    pub fn to_line(&self) -> String {
        match self {
            Command::List => "list".to_string(),
            Command::Quit => "quit".to_string(),
            Command::Get(names) if names.is_empty() => "get".to_string(),
            Command::Get(names) => format!("get {}", names.join(" ")),
            Command::Unknown(line) => line.clone(),
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        put_str(&mut buf, &self.to_line())?;
        Ok(buf.freeze())
    }

    pub async fn read<R: AsyncRead + Unpin>(r: &mut R) -> Result<Self> {
        Ok(Self::parse(&read_str(r).await?))
    }
}

// =============================================================================
// Listing
// =============================================================================

/// Response to LIST.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub names: Vec<String>,
}

impl Listing {
    pub fn encode(&self) -> Result<Bytes> {
        let count = i32::try_from(self.names.len())
            .map_err(|_| Error::protocol("too many entries for a listing"))?;
        let names_len: usize = self.names.iter().map(|n| 2 + n.len()).sum();
        let mut buf = BytesMut::with_capacity(4 + names_len);
        buf.put_i32(count);
        for name in &self.names {
            put_str(&mut buf, name)?;
        }
        Ok(buf.freeze())
    }

    pub async fn read<R: AsyncRead + Unpin>(r: &mut R) -> Result<Self> {
        let count = r.read_i32().await?;
        if count < 0 {
            return Err(Error::protocol(format!("negative listing count {count}")));
        }
        // Don't trust the count for preallocation.
        let mut names = Vec::with_capacity((count as usize).min(1024));
        for _ in 0..count {
            names.push(read_str(r).await?);
        }
        Ok(Self { names })
    }
}

// =============================================================================
// File header (one per GET target)
// =============================================================================

/// Status and metadata preceding a file's chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileHeader {
    /// File follows: `size` bytes split into chunks.
    Found { name: String, size: u64 },
    /// No file for the requested name; nothing follows.
    Missing { name: String },
}

impl FileHeader {
    pub fn name(&self) -> &str {
        match self {
            FileHeader::Found { name, .. } | FileHeader::Missing { name } => name,
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        match self {
            FileHeader::Found { name, size } => {
                let size = i64::try_from(*size)
                    .map_err(|_| Error::protocol("file size exceeds i64"))?;
                put_str(&mut buf, STATUS_OK)?;
                put_str(&mut buf, name)?;
                buf.put_i64(size);
            }
            FileHeader::Missing { name } => {
                put_str(&mut buf, STATUS_ERROR)?;
                put_str(&mut buf, name)?;
            }
        }
        Ok(buf.freeze())
    }

    pub async fn read<R: AsyncRead + Unpin>(r: &mut R) -> Result<Self> {
        let status = read_str(r).await?;
        let name = read_str(r).await?;
        match status.as_str() {
            STATUS_OK => {
                let size = r.read_i64().await?;
                let size = u64::try_from(size)
                    .map_err(|_| Error::protocol(format!("negative file size {size}")))?;
                Ok(FileHeader::Found { name, size })
            }
            STATUS_ERROR => Ok(FileHeader::Missing { name }),
            other => Err(Error::protocol(format!("unknown file status {other:?}"))),
        }
    }
}

// =============================================================================
// Chunk header
// =============================================================================

/// Precedes `len` raw payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// 1-based, advisory only.
    pub part: u32,
    pub len: u32,
}

impl ChunkHeader {
    pub const SIZE: usize = 8;

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        buf.put_i32(self.part as i32);
        buf.put_i32(self.len as i32);
        buf.freeze()
    }

    pub async fn read<R: AsyncRead + Unpin>(r: &mut R) -> Result<Self> {
        let part = r.read_i32().await?;
        let len = r.read_i32().await?;
        let len = u32::try_from(len)
            .map_err(|_| Error::protocol(format!("negative chunk length {len}")))?;
        Ok(Self {
            part: part as u32,
            len,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("list"), Command::List);
        assert_eq!(Command::parse("  LiSt "), Command::List);
        assert_eq!(Command::parse("QUIT"), Command::Quit);
        assert_eq!(
            Command::parse("GET a.txt  b.txt"),
            Command::Get(vec!["a.txt".into(), "b.txt".into()])
        );
        assert_eq!(Command::parse("get"), Command::Get(vec![]));
        assert_eq!(
            Command::parse("getaway"),
            Command::Unknown("getaway".into())
        );
        assert_eq!(
            Command::parse("list extra"),
            Command::Unknown("list extra".into())
        );
        assert_eq!(Command::parse(""), Command::Unknown(String::new()));
    }

    #[test]
    fn test_command_line() {
        let get = Command::Get(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(get.to_line(), "get a b c");
        assert_eq!(Command::parse(&get.to_line()), get);
    }

    #[test]
    fn test_string_wire_layout() {
        let mut buf = BytesMut::new();
        put_str(&mut buf, "OK").unwrap();
        assert_eq!(&buf[..], &[0x00, 0x02, b'O', b'K']);
    }

    #[test]
    fn test_string_too_long() {
        let mut buf = BytesMut::new();
        let long = "x".repeat(MAX_STRING_LEN + 1);
        assert!(matches!(
            put_str(&mut buf, &long),
            Err(Error::StringTooLong { .. })
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_handshake_wire_layout() {
        let hs = Handshake { client_id: 517 };
        assert_eq!(&hs.encode()[..], &517i32.to_be_bytes());
    }

    #[tokio::test]
    async fn test_listing_read() {
        let listing = Listing {
            names: vec!["one.txt".into(), "two.bin".into()],
        };
        let encoded = listing.encode().unwrap();
        assert_eq!(&encoded[..4], &2i32.to_be_bytes());

        let mut r = &encoded[..];
        assert_eq!(Listing::read(&mut r).await.unwrap(), listing);
        assert!(r.is_empty());
    }

    #[tokio::test]
    async fn test_negative_listing_count() {
        let bytes = (-1i32).to_be_bytes();
        let mut r = &bytes[..];
        assert!(matches!(
            Listing::read(&mut r).await,
            Err(Error::Protocol { .. })
        ));
    }

    #[tokio::test]
    async fn test_file_header_found() {
        let header = FileHeader::Found {
            name: "report.txt".into(),
            size: 2_500_000,
        };
        let encoded = header.encode().unwrap();
        // "OK" + "report.txt" + i64
        assert_eq!(encoded.len(), 4 + 12 + 8);

        let mut r = &encoded[..];
        assert_eq!(FileHeader::read(&mut r).await.unwrap(), header);
    }

    #[tokio::test]
    async fn test_file_header_missing_carries_name() {
        let header = FileHeader::Missing {
            name: "nope.txt".into(),
        };
        let encoded = header.encode().unwrap();
        let mut r = &encoded[..];
        let decoded = FileHeader::read(&mut r).await.unwrap();
        assert_eq!(decoded.name(), "nope.txt");
        assert!(matches!(decoded, FileHeader::Missing { .. }));
        assert!(r.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_status() {
        let mut buf = BytesMut::new();
        put_str(&mut buf, "MAYBE").unwrap();
        put_str(&mut buf, "f").unwrap();
        let mut r = &buf[..];
        assert!(matches!(
            FileHeader::read(&mut r).await,
            Err(Error::Protocol { .. })
        ));
    }

    #[tokio::test]
    async fn test_chunk_header() {
        let header = ChunkHeader {
            part: 3,
            len: 402_848,
        };
        let encoded = header.encode();
        assert_eq!(encoded.len(), ChunkHeader::SIZE);
        let mut r = &encoded[..];
        assert_eq!(ChunkHeader::read(&mut r).await.unwrap(), header);
    }

    #[tokio::test]
    async fn test_truncated_read_is_disconnect() {
        let bytes = [0x00, 0x05, b'a'];
        let mut r = &bytes[..];
        let err = read_str(&mut r).await.unwrap_err();
        assert!(err.is_disconnect());
    }
}
