//! The byte-moving side of a probe.
//!
//! An executor turns a [`ProbeRequest`] into a stream of completed chunk
//! sizes. The stream is lazy: nothing touches the network until it is first
//! polled, and dropping it aborts whatever is still in flight.

mod download;
mod http;
mod upload;

pub use http::HttpExecutor;

use crate::error::TransferError;
use crate::probe::ProbeRequest;
use futures::stream::BoxStream;
use std::time::Duration;

pub type ChunkStream = BoxStream<'static, Result<u64, TransferError>>;

pub trait TransferExecutor: Send + Sync {
    fn open(&self, request: &ProbeRequest) -> ChunkStream;
}

#[derive(Debug)]
pub enum TransferOutcome {
    Success,
    Truncated,
    NetworkError(TransferError),
}

#[derive(Debug)]
pub struct TransferReport {
    pub bytes: u64,
    pub elapsed: Duration,
    pub outcome: TransferOutcome,
}
