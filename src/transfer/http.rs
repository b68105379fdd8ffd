use super::{download, upload, ChunkStream, TransferExecutor};
use crate::error::TransferError;
use crate::probe::{Direction, ProbeRequest};
use crate::settings::Settings;
use std::time::Duration;

/// Transfers over plain HTTP(S) with `reqwest`.
///
/// A fresh client is built for every probe, so connections never outlive the
/// stream that opened them.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    connect_timeout: Duration,
    transfer_timeout: Duration,
    upload_chunk_bytes: usize,
}

impl Default for HttpExecutor {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}

impl HttpExecutor {
    pub fn new(settings: &Settings) -> Self {
        Self {
            connect_timeout: settings.connect_timeout,
            transfer_timeout: settings.transfer_timeout,
            upload_chunk_bytes: settings.upload_chunk_bytes.max(1),
        }
    }

    pub(super) fn client(&self) -> Result<reqwest::Client, TransferError> {
        Ok(reqwest::Client::builder()
            .timeout(self.transfer_timeout)
            .connect_timeout(self.connect_timeout)
            .build()?)
    }
}

impl TransferExecutor for HttpExecutor {
    fn open(&self, request: &ProbeRequest) -> ChunkStream {
        match request.direction {
            Direction::Download => download::download(self.clone(), request.url.clone()),
            Direction::Upload => upload::upload(
                self.clone(),
                request.url.clone(),
                request.size_bytes,
                self.upload_chunk_bytes,
            ),
        }
    }
}
