use std::io;
use thiserror::Error;

/// Metric extraction errors. Only malformed input is rejected; degenerate
/// geometry is absorbed by the palm-width epsilon.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CurlError {
    #[error("expected {expected} hand landmarks, got {found}")]
    LandmarkCount { expected: usize, found: usize },
}

/// Calibration persistence errors. Recoverable: the caller may retry.
#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("calibration storage unavailable: {0}")]
    Io(#[from] io::Error),
    #[error("failed to serialize calibration: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Serial link errors. None of these stop the vision pipeline.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("a serial link is already held; disconnect it first")]
    AlreadyConnected,
    #[error("no serial link is connected")]
    NotConnected,
    #[error("no serial port configured; use --port or serial.port in config.json")]
    NoPort,
    #[error("failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("serial I/O failed: {0}")]
    Io(#[from] io::Error),
}
