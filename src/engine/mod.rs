//! Decoding engine and tuner boundary
//!
//! The scanner drives two external collaborators:
//! 1. A tuner that can be retuned and have its input buffers flushed
//! 2. A decoding engine (OFDM demodulation, frame sync, FIC parsing) that
//!    reports what it finds through a [`Listener`] from its own thread(s)
//!
//! Engines are created per scan phase through an [`EngineFactory`] and must
//! honour the drain guarantee: once [`DecoderEngine::stop`] returns, the
//! instance never touches its listener again.

mod listener;

pub use listener::Listener;

use std::sync::Arc;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use crate::error::DeviceError;

/// How an engine instance should run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveMode {
    /// Fast path: only raise signal presence, no full synchronisation
    Quick,
    /// Full receive: sync, FIC decoding, service discovery
    Full,
}

/// Options handed to every engine instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiverOptions {
    /// Decode transmitter identification information
    pub decode_tii: bool,
    /// Enable the coarse frequency corrector
    pub coarse_corrector: bool,
}

impl Default for ReceiverOptions {
    fn default() -> Self {
        Self {
            decode_tii: false,
            coarse_corrector: true,
        }
    }
}

/// A service as listed by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub id: u32,
    pub label: String,
}

/// One component of a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub service_id: u32,
    /// Subchannel carrying this component, `None` if not yet resolved
    pub subchannel_id: Option<u8>,
}

/// Subchannel lookup result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Subchannel {
    /// `None` is the "unknown subchannel" sentinel
    pub id: Option<u8>,
    pub bitrate_kbps: u32,
}

impl Subchannel {
    pub fn is_valid(&self) -> bool {
        self.id.is_some()
    }
}

/// Every notification kind an engine may raise.
///
/// Only some are of interest to the scanner; see [`Listener::dispatch`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    Snr { db: f32 },
    SignalPresence { present: bool },
    Sync { synced: bool },
    ServiceDetected {
        #[serde(deserialize_with = "deserialize_id")]
        sid: u32,
    },
    EnsembleId {
        #[serde(deserialize_with = "deserialize_id")]
        eid: u16,
    },
    EnsembleLabel { label: String },
    #[allow(dead_code)]
    FrequencyCorrection { coarse: i32, fine: i32 },
    #[allow(dead_code)]
    DateTime { unix_secs: i64 },
    #[allow(dead_code)]
    Message { text: String },
}

/// Parse a decimal or `0x`-prefixed hexadecimal identifier
pub fn parse_id(s: &str) -> Option<u64> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

/// Accept ids either as JSON numbers or as strings understood by [`parse_id`]
pub(crate) fn deserialize_id<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u64),
        Text(String),
    }

    let value = match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n,
        RawId::Text(s) => {
            parse_id(&s).ok_or_else(|| D::Error::custom(format!("invalid id {s:?}")))?
        }
    };
    T::try_from(value).map_err(|_| D::Error::custom(format!("id {value:#X} out of range")))
}

/// Software or hardware tuner
pub trait Tuner: Send + Sync {
    fn set_frequency(&self, frequency_hz: u32) -> Result<(), DeviceError>;

    /// Flush input buffers so the next consumer only sees fresh samples
    fn reset(&self) -> Result<(), DeviceError>;

    fn frequency(&self) -> u32;
}

/// One live decoding engine instance
pub trait DecoderEngine: Send {
    fn start(&mut self, mode: ReceiveMode) -> Result<(), DeviceError>;

    /// Stop the instance and block until its delivery context is quiescent.
    /// Calling it on a stopped instance is a no-op.
    fn stop(&mut self);

    fn services(&self) -> Vec<Service>;

    fn components(&self, service: &Service) -> Vec<Component>;

    fn subchannel(&self, component: &Component) -> Subchannel;
}

/// Creates engine instances bound to a listener and tuner
pub trait EngineFactory {
    fn create(
        &self,
        listener: Arc<Listener>,
        tuner: Arc<dyn Tuner>,
        options: ReceiverOptions,
    ) -> Box<dyn DecoderEngine>;
}
