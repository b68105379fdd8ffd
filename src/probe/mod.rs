pub mod csv;

use std::fmt;
use std::time::Duration;

// Below this the elapsed time is treated as zero and no rate is reported.
const MIN_TRANSFER_SECS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeState {
    #[default]
    Undefined,
    Running,
    Finished,
    Error,
}

impl ProbeState {
    pub fn code(self) -> u8 {
        match self {
            ProbeState::Undefined => 0,
            ProbeState::Running => 1,
            ProbeState::Finished => 2,
            ProbeState::Error => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ProbeState::Undefined),
            1 => Some(ProbeState::Running),
            2 => Some(ProbeState::Finished),
            3 => Some(ProbeState::Error),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ProbeState::Undefined => "UNDEFINED",
            ProbeState::Running => "RUNNING",
            ProbeState::Finished => "FINISHED",
            ProbeState::Error => "ERROR",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "UNDEFINED" => Some(ProbeState::Undefined),
            "RUNNING" => Some(ProbeState::Running),
            "FINISHED" => Some(ProbeState::Finished),
            "ERROR" => Some(ProbeState::Error),
            _ => None,
        }
    }
}

impl fmt::Display for ProbeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upload => f.write_str("upload"),
            Direction::Download => f.write_str("download"),
        }
    }
}

/// Parameters of one probe.
///
/// For uploads `size_bytes` is the exact payload size, for downloads it is
/// the byte budget after which the transfer is truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub direction: Direction,
    pub url: String,
    pub size_bytes: u64,
}

/// Measured outcome of a probe. Rates are in bytes per second, time in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProbeResult {
    pub state: ProbeState,
    pub datarate_dl: f64,
    pub datarate_ul: f64,
    pub total_transfer_time: f64,
    pub payload_size: u64,
}

impl ProbeResult {
    pub fn undefined() -> Self {
        Self::default()
    }

    pub fn running() -> Self {
        Self {
            state: ProbeState::Running,
            ..Self::default()
        }
    }

    /// Builds a final result for `direction`, deriving the rate from the
    /// transferred bytes and the elapsed time.
    pub fn measured(state: ProbeState, direction: Direction, payload_size: u64, elapsed: Duration) -> Self {
        let total_transfer_time = elapsed.as_secs_f64();
        let rate = datarate(payload_size, total_transfer_time);
        let (datarate_dl, datarate_ul) = match direction {
            Direction::Download => (rate, 0.0),
            Direction::Upload => (0.0, rate),
        };

        Self {
            state,
            datarate_dl,
            datarate_ul,
            total_transfer_time,
            payload_size,
        }
    }
}

pub fn datarate(payload_size: u64, seconds: f64) -> f64 {
    if seconds < MIN_TRANSFER_SECS {
        return 0.0;
    }
    payload_size as f64 / seconds
}
