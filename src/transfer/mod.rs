//! Chunked file transfer over an established session.
//!
//! The server side reads a file from the [`FileStore`](crate::store::FileStore)
//! and streams it as length-prefixed chunks; the client side writes each chunk
//! to disk as it arrives. Neither side holds more than one chunk in memory.
//!
//! ```text
//! +--------------+   FileHeader + chunks   +--------------+
//! |    Sender    | ----------------------> |   Receiver   |
//! | (store read) |                         | (disk write) |
//! +--------------+                         +--------------+
//! ```

pub mod chunk;
pub mod progress;
pub mod receiver;
pub mod sender;

pub use chunk::ChunkPlan;
pub use progress::Progress;
pub use receiver::{FileOutcome, Receiver, ReceiverConfig};
pub use sender::{SendOutcome, Sender, SenderConfig};
