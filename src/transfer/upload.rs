use super::{ChunkStream, HttpExecutor};
use crate::error::TransferError;
use futures::{stream, StreamExt, TryFutureExt};
use rand::{Rng, SeedableRng};

pub(super) fn upload(executor: HttpExecutor, url: String, size: u64, chunk_size: usize) -> ChunkStream {
    let client = executor.client();
    let pieces = random_pieces(size, chunk_size);

    async move {
        let client = client?;
        tracing::debug!(%url, size, pieces = pieces.len(), "upload started");

        // One POST per piece; each acknowledged piece counts as a chunk.
        Ok::<_, TransferError>(stream::iter(pieces).then(move |piece| {
            let len = piece.len() as u64;
            let request = client.post(&url).body(piece);
            async move {
                let response = request.send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(TransferError::Status(status.as_u16()));
                }
                Ok(len)
            }
        }))
    }
    .try_flatten_stream()
    .boxed()
}

fn random_pieces(size: u64, chunk_size: usize) -> Vec<Vec<u8>> {
    let mut rng = rand::rngs::StdRng::from_entropy();
    let mut remaining = size;
    let mut pieces = Vec::new();

    while remaining > 0 {
        let len = remaining.min(chunk_size as u64) as usize;
        let mut piece = vec![0u8; len];
        rng.fill(&mut piece[..]);
        pieces.push(piece);
        remaining -= len as u64;
    }
    pieces
}
