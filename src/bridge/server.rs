use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::BlockSource;
use super::Error;
use crate::accumulator::node_hash::BitcoinNodeHash;
use crate::accumulator::proof::BatchProof;

/// Reads the block and proof at `height` on the blocking pool, sources may hit the disk.
async fn read_block<B>(source: &Arc<B>, height: i32) -> Result<(Vec<u8>, Vec<u8>), Error>
where
    B: BlockSource + ?Sized,
{
    let source = source.clone();
    tokio::task::spawn_blocking(move || -> Result<_, Error> {
        Ok((source.block_bytes(height)?, source.proof_bytes(height)?))
    })
    .await?
}

/// Reads one request from `stream` and sends the blocks asked for, see the
/// [module docs](super). Returns how many blocks were sent.
///
/// We stop at the first block that can't be sent, returning why. Whatever was sent before that
/// is complete.
pub async fn serve_blocks<S, B>(stream: &mut S, source: Arc<B>) -> Result<u32, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
    B: BlockSource + ?Sized,
{
    let from_height = stream.read_i32().await?;
    let to_height = stream.read_i32().await?;
    let max_height = source.max_height();

    let forward = to_height >= from_height;
    let to_height = to_height.min(max_height);
    if from_height > max_height {
        info!(from_height, max_height, "asked for blocks we don't have");
        return Ok(0);
    }

    let mut sent = 0;
    let mut height = from_height;
    while (forward && height <= to_height) || (!forward && height >= to_height) {
        let (block, proof) = read_block(&source, height).await?;

        // Never send a proof the client can't read
        BatchProof::<BitcoinNodeHash>::from_bytes(&proof)
            .map_err(|source| Error::ProofDecode { height, source })?;

        let len = u32::try_from(block.len() + proof.len()).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "block too large to send")
        })?;
        stream.write_u32(len).await?;
        stream.write_all(&block).await?;
        stream.write_all(&proof).await?;
        debug!(height, block = block.len(), proof = proof.len(), "sent block");
        sent += 1;

        let next = if forward {
            height.checked_add(1)
        } else {
            height.checked_sub(1)
        };
        match next {
            Some(next) => height = next,
            None => break,
        }
    }

    stream.flush().await?;
    Ok(sent)
}

/// Accepts connections and serves blocks on each of them, until `shutdown` is cancelled.
pub struct BlockServer<B: BlockSource> {
    source: Arc<B>,
    shutdown: CancellationToken,
    workers: TaskTracker,
}

impl<B: BlockSource> BlockServer<B> {
    /// Connection workers are spawned on `workers`, so whoever owns it can wait for them.
    pub fn new(source: Arc<B>, shutdown: CancellationToken, workers: TaskTracker) -> Self {
        BlockServer {
            source,
            shutdown,
            workers,
        }
    }

    pub async fn run(&self, listener: TcpListener) -> Result<(), Error> {
        info!(
            addr = %listener.local_addr()?,
            max_height = self.source.max_height(),
            "listening for connections"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("no longer accepting connections");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (mut stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            warn!(%err, "accept error");
                            continue;
                        }
                    };

                    let source = self.source.clone();
                    let shutdown = self.shutdown.clone();
                    self.workers.spawn(async move {
                        debug!(%peer, "start serving");
                        tokio::select! {
                            res = serve_blocks(&mut stream, source) => match res {
                                Ok(sent) => info!(%peer, sent, "hung up"),
                                Err(err) => warn!(%peer, %err, "stopped serving"),
                            },
                            _ = shutdown.cancelled() => info!(%peer, "shutting down, dropping connection"),
                        }
                    });
                }
            }
        }
    }
}
