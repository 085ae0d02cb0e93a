//! Channel scan orchestration

mod scanner;
mod state;
mod types;

pub use scanner::{ScanOptions, Scanner};
pub use types::{ChannelOutcome, ScanReport, ScanResult, ServiceInfo};
