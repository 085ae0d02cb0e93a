//! Configuration loaded from environment variables

use std::path::PathBuf;
use std::time::Duration;

use crate::catalog::Band;
use crate::engine::ReceiverOptions;

/// Default time to wait for sync on a channel where a signal was found
pub const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 10;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// How long to wait for sync after signal presence was detected
    pub sync_timeout: Duration,

    /// Which part of the channel plan to scan
    pub bands: Band,

    /// Report destination (stdout when unset)
    pub report_path: Option<PathBuf>,

    /// Transmitter script for the simulated engine
    pub script_path: PathBuf,

    /// Options handed to every decoding engine instance
    pub receiver: ReceiverOptions,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            sync_timeout: Duration::from_secs(
                var("SCAN_SYNC_TIMEOUT_SECS")
                    .and_then(|s| s.trim().parse::<u64>().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(DEFAULT_SYNC_TIMEOUT_SECS),
            ),

            bands: var("SCAN_BANDS")
                .and_then(|s| Band::parse(&s))
                .unwrap_or(Band::All),

            report_path: var("SCAN_REPORT_PATH")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),

            script_path: var("SCAN_SCRIPT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("scan-script.json")),

            receiver: ReceiverOptions {
                decode_tii: var("SCAN_DECODE_TII")
                    .and_then(|s| parse_flag(&s))
                    .unwrap_or(false),
                coarse_corrector: var("SCAN_COARSE_CORRECTOR")
                    .and_then(|s| parse_flag(&s))
                    .unwrap_or(true),
            },
        }
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
