use super::{ChunkStream, HttpExecutor};
use crate::error::TransferError;
use futures::{StreamExt, TryFutureExt};

pub(super) fn download(executor: HttpExecutor, url: String) -> ChunkStream {
    let client = executor.client();

    async move {
        let client = client?;
        let response = client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Status(status.as_u16()));
        }
        tracing::debug!(%url, content_length = ?response.content_length(), "download started");

        Ok::<_, TransferError>(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.len() as u64).map_err(TransferError::from)))
    }
    .try_flatten_stream()
    .boxed()
}
