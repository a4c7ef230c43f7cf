//! filecast - serve a directory of files over a small binary TCP protocol.
//!
//! A [`Server`] exposes the regular files of one directory. A [`Client`]
//! connects, identifies itself with an integer id, lists the files and
//! downloads them in fixed-size chunks, writing each chunk to disk as it
//! arrives.

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod path;
pub mod protocol;
pub mod server;
pub mod store;
pub mod transfer;

pub use client::{Client, Reply};
pub use config::{ClientConfig, ServerConfig};
pub use error::{Error, Result};
pub use protocol::Command;
pub use server::Server;
pub use store::FileStore;
pub use transfer::{FileOutcome, Progress};
