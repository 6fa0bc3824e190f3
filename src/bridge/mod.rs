//! The bridge serves blocks, each with the proof for the leaves it spends, to clients that only
//! keep a [Pollard](crate::accumulator::pollard::Pollard).
//!
//! Blocks come from a [BlockSource]. [BlockServer] accepts TCP connections and runs
//! [serve_blocks] for each one, and [Supervisor] shuts everything down when asked to.
//!
//! # Protocol
//! A client sends two big endian `i32`, the first and last heights it wants. If the last height
//! is smaller than the first, blocks are sent backwards. For every height the server sends a
//! big endian `u32` with the size of the block plus the proof, then the block, then the proof.
//! The server hangs up after the last height, or at the first block it can't send.
use std::path::PathBuf;

use thiserror::Error;

use crate::accumulator::error::AccumulatorError;

pub mod lifecycle;
pub mod server;
pub mod source;

pub use lifecycle::ShutdownOutcome;
pub use lifecycle::Supervisor;
pub use server::serve_blocks;
pub use server::BlockServer;
pub use source::BlockSource;
pub use source::DirBlockSource;
pub use source::MemoryBlockSource;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("block read task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("block {0} not found")]
    BlockNotFound(i32),
    #[error("proof for block {height} doesn't decode")]
    ProofDecode {
        height: i32,
        #[source]
        source: AccumulatorError,
    },
    #[error("{} not found, can't serve blocks", .0.display())]
    DataDirMissing(PathBuf),
}
