//! JSON scan report
//!
//! Keys are emitted in alphabetical order at every level.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::scan::{ScanReport, ScanResult, ServiceInfo};

#[derive(Debug, Serialize)]
pub struct ReportDocument {
    pub results: Vec<ResultEntry>,
    pub scan: ScanMeta,
}

#[derive(Debug, Serialize)]
pub struct ScanMeta {
    pub channels_scanned: usize,
    pub ensembles_found: usize,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ResultEntry {
    pub channel: String,
    pub ensemble: EnsembleEntry,
    pub frequency_hz: u32,
    pub services: Vec<ServiceEntry>,
    pub snr_db: f32,
}

#[derive(Debug, Serialize)]
pub struct EnsembleEntry {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct ServiceEntry {
    pub bitrate_kbps: u32,
    pub label: String,
    pub sid: String,
}

/// `0x` followed by at least four upper-case hex digits
pub fn hex_id(value: u32) -> String {
    format!("0x{:04X}", value)
}

impl ReportDocument {
    pub fn new(report: &ScanReport, at: DateTime<Utc>) -> Self {
        Self {
            results: report.results.iter().map(ResultEntry::from).collect(),
            scan: ScanMeta {
                channels_scanned: report.channels_total,
                ensembles_found: report.results.len(),
                timestamp: at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            },
        }
    }
}

impl From<&ScanResult> for ResultEntry {
    fn from(result: &ScanResult) -> Self {
        Self {
            channel: result.channel.clone(),
            ensemble: EnsembleEntry {
                id: hex_id(result.ensemble_id.into()),
                label: result.ensemble_label.clone(),
            },
            frequency_hz: result.frequency_hz,
            services: result.services.iter().map(ServiceEntry::from).collect(),
            snr_db: result.snr,
        }
    }
}

impl From<&ServiceInfo> for ServiceEntry {
    fn from(service: &ServiceInfo) -> Self {
        Self {
            bitrate_kbps: service.bitrate_kbps,
            label: service.label.clone(),
            sid: hex_id(service.sid),
        }
    }
}

/// Write the report stamped with the current UTC time
pub fn write_report(report: &ScanReport, out: impl Write) -> io::Result<()> {
    write_report_at(report, Utc::now(), out)
}

/// Write the report with 2-space indentation and a trailing newline
pub fn write_report_at(report: &ScanReport, at: DateTime<Utc>, mut out: impl Write) -> io::Result<()> {
    let document = ReportDocument::new(report, at);
    serde_json::to_writer_pretty(&mut out, &document)?;
    out.write_all(b"\n")?;
    out.flush()
}
