//! Transmitter scripts for the simulated engine
//!
//! A script lists the transmitters "on air", each keyed by centre frequency,
//! with the notifications an engine would raise in quick and full mode and
//! the service table it would report once synchronised:
//!
//! ```json
//! {
//!   "transmitters": [{
//!     "frequency_hz": 176640000,
//!     "quick": [{"after_ms": 200, "event": {"kind": "signal_presence", "present": true}}],
//!     "full":  [{"after_ms": 300, "event": {"kind": "sync", "synced": true}}],
//!     "services": [{"sid": "0xC221", "label": "Radio 1", "components": [{"subchannel": 2, "bitrate_kbps": 128}]}]
//!   }]
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::engine::EngineEvent;
use crate::error::ScriptError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub transmitters: Vec<Transmitter>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Transmitter {
    pub frequency_hz: u32,
    /// Events raised by a quick-mode instance
    #[serde(default)]
    pub quick: Vec<TimedEvent>,
    /// Events raised by a full-mode instance
    #[serde(default)]
    pub full: Vec<TimedEvent>,
    #[serde(default)]
    pub services: Vec<ScriptedService>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimedEvent {
    /// Delay since the previous event (or since start)
    #[serde(default)]
    pub after_ms: u64,
    pub event: EngineEvent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptedService {
    #[serde(deserialize_with = "crate::engine::deserialize_id")]
    pub sid: u32,
    pub label: String,
    #[serde(default)]
    pub components: Vec<ScriptedComponent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptedComponent {
    /// Missing or null means the subchannel is not known
    #[serde(default)]
    pub subchannel: Option<u8>,
    #[serde(default)]
    pub bitrate_kbps: u32,
}

impl Script {
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ScriptError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Transmitter on `frequency_hz`, if any
    pub fn transmitter(&self, frequency_hz: u32) -> Option<&Transmitter> {
        self.transmitters
            .iter()
            .find(|t| t.frequency_hz == frequency_hz)
    }
}
