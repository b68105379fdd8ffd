//! Observers notified once per completed probe.
//!
//! Handlers run on the probe's worker thread before the final state is
//! published, so `TrafficGenerator::is_busy` stays true until they return.
//! Keep them short; slow handlers delay the next probe. A handler must not
//! call `TrafficGenerator::wait` on the generator that notifies it: the
//! worker would wait on its own unpublished result and never return.

mod file;

pub use file::ResultsToFile;

use crate::error::SinkError;
use crate::probe::{ProbeRequest, ProbeResult};
use std::sync::Arc;
use tokio::sync::mpsc;

pub trait EventHandler: Send + Sync {
    fn on_probe_finished(&self, request: &ProbeRequest, result: &ProbeResult);
}

/// Accepts notifications and drops them.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHandler;

impl EventHandler for NullHandler {
    fn on_probe_finished(&self, request: &ProbeRequest, result: &ProbeResult) {
        tracing::debug!(
            direction = %request.direction,
            url = %request.url,
            state = %result.state,
            "probe finished"
        );
    }
}

pub type ProbeRecord = (ProbeRequest, ProbeResult);

/// Forwards every completed probe into a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<ProbeRecord>,
}

impl ChannelHandler {
    pub fn new(tx: mpsc::UnboundedSender<ProbeRecord>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProbeRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, request: &ProbeRequest, result: &ProbeResult) -> Result<(), SinkError> {
        self.tx
            .send((request.clone(), *result))
            .map_err(|_| SinkError::ChannelClosed)
    }
}

impl EventHandler for ChannelHandler {
    fn on_probe_finished(&self, request: &ProbeRequest, result: &ProbeResult) {
        if let Err(e) = self.send(request, result) {
            tracing::warn!(error = %e, "dropping probe result");
        }
    }
}

/// Notifies several handlers in insertion order.
#[derive(Default, Clone)]
pub struct FanOut {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl EventHandler for FanOut {
    fn on_probe_finished(&self, request: &ProbeRequest, result: &ProbeResult) {
        for handler in &self.handlers {
            handler.on_probe_finished(request, result);
        }
    }
}
