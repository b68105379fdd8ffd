//! One-probe-at-a-time transfer engine.
//!
//! A [`TrafficGenerator`] launches a single upload or download on a
//! background worker thread and publishes the outcome as a [`ProbeResult`].
//! Callers either poll [`TrafficGenerator::is_busy`] / [`TrafficGenerator::status`],
//! block in [`TrafficGenerator::wait`], or attach an [`EventHandler`].
//!
//! State moves `Undefined | Finished | Error -> Running -> Finished | Error`.
//! The worker assembles the final result on its own and swaps it in under
//! the status lock, so a reader sees either the running snapshot or the
//! complete final one.

use crate::error::{ProbeError, TransferError};
use crate::handler::EventHandler;
use crate::probe::{Direction, ProbeRequest, ProbeResult, ProbeState};
use crate::settings::Settings;
use crate::transfer::{HttpExecutor, TransferExecutor, TransferOutcome, TransferReport};
use futures::StreamExt;
use parking_lot::{Condvar, Mutex};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

struct Shared {
    status: Mutex<ProbeResult>,
    done: Condvar,
    request: Mutex<Option<ProbeRequest>>,
    handler: Mutex<Option<Arc<dyn EventHandler>>>,
}

impl Shared {
    fn publish(&self, result: ProbeResult) {
        *self.status.lock() = result;
        self.done.notify_all();
    }
}

/// Runs one throughput probe at a time.
///
/// Dropping a generator while a probe is running detaches the worker; it
/// still finishes the transfer and notifies the handler.
pub struct TrafficGenerator {
    shared: Arc<Shared>,
    executor: Arc<dyn TransferExecutor>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Default for TrafficGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TrafficGenerator {
    pub fn new() -> Self {
        Self::with_executor(Arc::new(HttpExecutor::default()))
    }

    pub fn with_settings(settings: &Settings) -> Self {
        Self::with_executor(Arc::new(HttpExecutor::new(settings)))
    }

    pub fn with_executor(executor: Arc<dyn TransferExecutor>) -> Self {
        Self {
            shared: Arc::new(Shared {
                status: Mutex::new(ProbeResult::undefined()),
                done: Condvar::new(),
                request: Mutex::new(None),
                handler: Mutex::new(None),
            }),
            executor,
            worker: Mutex::new(None),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.shared.status.lock().state == ProbeState::Running
    }

    /// Snapshot of the current result. While a probe runs this is the
    /// `Running` state with zeroed measurements.
    pub fn status(&self) -> ProbeResult {
        *self.shared.status.lock()
    }

    /// Parameters of the running or most recent probe.
    pub fn request(&self) -> Option<ProbeRequest> {
        self.shared.request.lock().clone()
    }

    /// Sends exactly `size_bytes` to `url`. Returns false without touching
    /// the current state if the arguments are invalid or a probe is running.
    pub fn perform_upload(&self, size_bytes: u64, url: &str) -> bool {
        self.perform(Direction::Upload, size_bytes, url)
    }

    /// Downloads from `url`, stopping once `size_bytes` have arrived. A
    /// smaller resource is downloaded in full.
    pub fn perform_download(&self, size_bytes: u64, url: &str) -> bool {
        self.perform(Direction::Download, size_bytes, url)
    }

    fn perform(&self, direction: Direction, size_bytes: u64, url: &str) -> bool {
        match self.try_perform(direction, size_bytes, url) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%direction, url, error = %e, "probe rejected");
                false
            }
        }
    }

    pub fn try_perform(&self, direction: Direction, size_bytes: u64, url: &str) -> Result<(), ProbeError> {
        if size_bytes == 0 {
            return Err(ProbeError::InvalidArgument("size must be positive".into()));
        }
        if url.trim().is_empty() {
            return Err(ProbeError::InvalidArgument("url must not be empty".into()));
        }

        let request = ProbeRequest {
            direction,
            url: url.to_string(),
            size_bytes,
        };

        let (previous_status, previous_request) = {
            let mut status = self.shared.status.lock();
            if status.state == ProbeState::Running {
                return Err(ProbeError::AlreadyBusy);
            }
            let previous = *status;
            *status = ProbeResult::running();
            let previous_request = self.shared.request.lock().replace(request.clone());
            (previous, previous_request)
        };

        let mut worker = self.worker.lock();
        // The last worker already published its result; this only waits for
        // the thread to exit.
        if let Some(handle) = worker.take() {
            join_worker(handle);
        }

        let shared = Arc::clone(&self.shared);
        let executor = Arc::clone(&self.executor);
        let task = request.clone();
        let spawned = thread::Builder::new()
            .name("probe-worker".into())
            .spawn(move || run_probe(&shared, &*executor, task));

        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                tracing::info!(%direction, url, size_bytes, "probe started");
                Ok(())
            }
            Err(e) => {
                *self.shared.request.lock() = previous_request;
                self.shared.publish(previous_status);
                Err(ProbeError::Spawn(e.to_string()))
            }
        }
    }

    /// Replaces the observer. A handler set while a probe runs receives that
    /// probe's notification.
    pub fn set_event_handler(&self, handler: Arc<dyn EventHandler>) {
        *self.shared.handler.lock() = Some(handler);
    }

    pub fn clear_event_handler(&self) {
        *self.shared.handler.lock() = None;
    }

    /// Blocks until no probe is running and returns the final result.
    pub fn wait(&self) -> ProbeResult {
        let mut status = self.shared.status.lock();
        while status.state == ProbeState::Running {
            self.shared.done.wait(&mut status);
        }
        *status
    }

    /// Like [`TrafficGenerator::wait`], giving up after `timeout`. Returns
    /// `None` if the probe is still running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<ProbeResult> {
        let deadline = Instant::now() + timeout;
        let mut status = self.shared.status.lock();
        while status.state == ProbeState::Running {
            if self.shared.done.wait_until(&mut status, deadline).timed_out() {
                break;
            }
        }
        (status.state != ProbeState::Running).then_some(*status)
    }

    /// Releases the finished worker and everything it held. The last result
    /// stays readable. Must not be called while a probe runs.
    pub fn cleanup(&self) -> Result<(), ProbeError> {
        let mut worker = self.worker.lock();
        if self.is_busy() {
            return Err(ProbeError::AlreadyBusy);
        }
        if let Some(handle) = worker.take() {
            join_worker(handle);
        }
        Ok(())
    }
}

fn join_worker(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        tracing::error!("probe worker panicked");
    }
}

fn run_probe(shared: &Shared, executor: &dyn TransferExecutor, request: ProbeRequest) {
    let report = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => panic::catch_unwind(AssertUnwindSafe(|| runtime.block_on(drive(executor, &request))))
            .unwrap_or_else(|_| TransferReport {
                bytes: 0,
                elapsed: Duration::ZERO,
                outcome: TransferOutcome::NetworkError(TransferError::Runtime("transfer panicked".into())),
            }),
        Err(e) => TransferReport {
            bytes: 0,
            elapsed: Duration::ZERO,
            outcome: TransferOutcome::NetworkError(TransferError::Runtime(e.to_string())),
        },
    };
    let result = finalize(&request, &report);

    match &report.outcome {
        TransferOutcome::NetworkError(e) => tracing::warn!(
            direction = %request.direction,
            url = %request.url,
            bytes = report.bytes,
            error = %e,
            "probe failed"
        ),
        outcome => tracing::info!(
            direction = %request.direction,
            url = %request.url,
            bytes = result.payload_size,
            seconds = result.total_transfer_time,
            truncated = matches!(outcome, TransferOutcome::Truncated),
            "probe finished"
        ),
    }

    let handler = shared.handler.lock().clone();
    if let Some(handler) = handler {
        let notified = panic::catch_unwind(AssertUnwindSafe(|| handler.on_probe_finished(&request, &result)));
        if notified.is_err() {
            tracing::error!(url = %request.url, "event handler panicked");
        }
    }

    shared.publish(result);
}

/// Pulls chunks until the executor is done, fails, or a download reaches its
/// budget. Returning early drops the stream, which aborts the transfer.
async fn drive(executor: &dyn TransferExecutor, request: &ProbeRequest) -> TransferReport {
    let mut chunks = executor.open(request);
    // Payload preparation in `open` is not part of the measurement.
    let start = Instant::now();
    let mut bytes: u64 = 0;

    while let Some(chunk) = chunks.next().await {
        match chunk {
            Ok(len) => {
                bytes += len;
                if request.direction == Direction::Download && bytes >= request.size_bytes {
                    let elapsed = start.elapsed();
                    tracing::debug!(bytes, budget = request.size_bytes, "download budget reached");
                    return TransferReport {
                        bytes,
                        elapsed,
                        outcome: TransferOutcome::Truncated,
                    };
                }
            }
            Err(e) => {
                return TransferReport {
                    bytes,
                    elapsed: start.elapsed(),
                    outcome: TransferOutcome::NetworkError(e),
                };
            }
        }
    }

    TransferReport {
        bytes,
        elapsed: start.elapsed(),
        outcome: TransferOutcome::Success,
    }
}

fn finalize(request: &ProbeRequest, report: &TransferReport) -> ProbeResult {
    let state = match report.outcome {
        TransferOutcome::Success | TransferOutcome::Truncated => ProbeState::Finished,
        TransferOutcome::NetworkError(_) => ProbeState::Error,
    };
    ProbeResult::measured(state, request.direction, report.bytes, report.elapsed)
}
