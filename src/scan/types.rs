//! Scan result types

/// One discovered service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceInfo {
    /// Service id, unique within the ensemble
    pub sid: u32,
    pub label: String,
    /// 0 when no component resolved to a valid subchannel
    pub bitrate_kbps: u32,
}

/// Outcome for one channel where sync succeeded
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub channel: String,
    pub frequency_hz: u32,
    pub ensemble_label: String,
    pub ensemble_id: u16,
    /// Latest SNR sample in dB at collection time
    pub snr: f32,
    pub services: Vec<ServiceInfo>,
}

/// What happened on one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOutcome {
    NoSignal,
    NoSync,
    Found { services: usize },
}

/// Everything a run produced
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Catalog length, not the number of channels that yielded results
    pub channels_total: usize,
    pub results: Vec<ScanResult>,
    /// Per-channel outcome in catalog order
    pub outcomes: Vec<(String, ChannelOutcome)>,
}

/// Strip trailing whitespace and control characters (DAB labels are
/// space padded to 16 characters). Leading and inner spacing is kept.
pub fn normalize_label(label: &str) -> String {
    label
        .trim_end_matches(|c: char| c.is_whitespace() || c.is_control())
        .to_string()
}
