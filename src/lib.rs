//! Single-shot HTTP throughput probes.
//!
//! ```no_run
//! use probespeed::{ProbeState, TrafficGenerator};
//!
//! let tg = TrafficGenerator::new();
//! assert!(tg.perform_download(1_000_000, "http://example.com/testfiles/20MB.bin"));
//! let result = tg.wait();
//! if result.state == ProbeState::Finished {
//!     println!("{}", result.to_csv(','));
//! }
//! tg.cleanup().ok();
//! ```

pub mod error;
pub mod generator;
pub mod handler;
pub mod probe;
pub mod settings;
pub mod transfer;

pub use error::{CsvError, ProbeError, SinkError, TransferError};
pub use generator::TrafficGenerator;
pub use handler::{ChannelHandler, EventHandler, FanOut, NullHandler, ProbeRecord, ResultsToFile};
pub use probe::{Direction, ProbeRequest, ProbeResult, ProbeState};
pub use settings::{Settings, SettingsField};
pub use transfer::{ChunkStream, HttpExecutor, TransferExecutor, TransferOutcome, TransferReport};
