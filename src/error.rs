use thiserror::Error;

/// Reasons a probe could not be started. Surfaced synchronously; the engine
/// state is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("A probe is already running")]
    AlreadyBusy,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to start probe worker: {0}")]
    Spawn(String),
}

/// Failures of the transfer itself. These never cross back to the caller,
/// they only show up as `ProbeState::Error`.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server responded with status {0}")]
    Status(u16),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Failures local to an event handler.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Result receiver was dropped")]
    ChannelClosed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CsvError {
    #[error("Expected 5 fields, found {0}")]
    FieldCount(usize),

    #[error("Invalid state field: {0}")]
    State(String),

    #[error("Invalid number in field {field}: {value}")]
    Number { field: &'static str, value: String },
}
