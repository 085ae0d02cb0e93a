//! Error types shared by the tuner, engine and scanner

use thiserror::Error;

/// Fault raised by a tuner or a decoding engine.
///
/// These are never expected during a scan; "no signal" and "no sync" are
/// normal outcomes and are not represented here.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tuner fault: {0}")]
    Tuner(String),

    #[error("decoding engine fault: {0}")]
    Engine(String),
}

/// Failure of a whole scan run
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("channel {channel}: {source}")]
    Device {
        channel: String,
        #[source]
        source: DeviceError,
    },
}

/// Failure to load a transmitter script
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read script: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid script: {0}")]
    Json(#[from] serde_json::Error),
}
