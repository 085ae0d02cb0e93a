//! Two-phase channel scanner
//!
//! For every catalog channel:
//! 1. Reset the shared state, retune, let the AGC settle
//! 2. Quick-mode engine: wait for signal presence
//! 3. Full-mode engine: wait for sync, dwell while the FIC fills in the
//!    service list, then collect the ensemble
//!
//! Engine instances are always stopped before the state is touched for the
//! next phase or channel; that is what keeps notifications from one channel
//! out of the next channel's result.

use std::ops::Deref;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::catalog::{Catalog, Channel};
use crate::config::{Config, DEFAULT_SYNC_TIMEOUT_SECS};
use crate::engine::{
    DecoderEngine, EngineFactory, Listener, ReceiveMode, ReceiverOptions, Service, Subchannel,
    Tuner,
};
use crate::error::{DeviceError, ScanError};

use super::state::{ScanState, WaitOutcome};
use super::types::{normalize_label, ChannelOutcome, ScanReport, ScanResult, ServiceInfo};

/// AGC settle time after retuning
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// How long the quick-mode engine gets to report signal presence
pub const PRESENCE_TIMEOUT: Duration = Duration::from_secs(3);

/// Grace period after sync for the service list to accumulate
pub const COLLECT_DWELL: Duration = Duration::from_secs(3);

/// Fixed hardware timings. Only shortened in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub settle: Duration,
    pub presence_timeout: Duration,
    pub dwell: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            settle: SETTLE_DELAY,
            presence_timeout: PRESENCE_TIMEOUT,
            dwell: COLLECT_DWELL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Per-channel sync timeout once a signal was found
    pub sync_timeout: Duration,
    pub receiver: ReceiverOptions,
    pub timings: Timings,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            sync_timeout: Duration::from_secs(DEFAULT_SYNC_TIMEOUT_SECS),
            receiver: ReceiverOptions::default(),
            timings: Timings::default(),
        }
    }
}

impl From<&Config> for ScanOptions {
    fn from(config: &Config) -> Self {
        Self {
            sync_timeout: config.sync_timeout,
            receiver: config.receiver,
            timings: Timings::default(),
        }
    }
}

/// Running engine instance, stopped when dropped.
///
/// Also covers early returns through `?`, so a live instance can never
/// outlast the phase that started it.
struct ActiveEngine(Box<dyn DecoderEngine>);

impl ActiveEngine {
    fn stop(mut self) {
        self.0.stop();
    }
}

impl Deref for ActiveEngine {
    type Target = dyn DecoderEngine;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl Drop for ActiveEngine {
    fn drop(&mut self) {
        self.0.stop();
    }
}

/// Result of one channel attempt
enum Attempt {
    NoSignal,
    NoSync,
    Found(ScanResult),
}

/// Sequential scanner over a channel catalog
pub struct Scanner<F: EngineFactory> {
    catalog: Catalog,
    tuner: Arc<dyn Tuner>,
    factory: F,
    options: ScanOptions,
    state: Arc<ScanState>,
    listener: Arc<Listener>,
}

impl<F: EngineFactory> Scanner<F> {
    pub fn new(catalog: Catalog, tuner: Arc<dyn Tuner>, factory: F, options: ScanOptions) -> Self {
        let state = Arc::new(ScanState::new());
        let listener = Arc::new(scan_listener(&state));

        Self {
            catalog,
            tuner,
            factory,
            options,
            state,
            listener,
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Visit every catalog channel once, in order
    pub fn run(&self) -> Result<ScanReport, ScanError> {
        let total = self.catalog.len();
        let mut report = ScanReport {
            channels_total: total,
            ..ScanReport::default()
        };

        info!(
            "Scanning {} channels (sync timeout {}s)",
            total,
            self.options.sync_timeout.as_secs_f32()
        );

        let mut cursor = self.catalog.first();

        while let Some((pos, channel)) = cursor {
            let attempt = self
                .scan_channel(channel)
                .map_err(|source| ScanError::Device {
                    channel: channel.id.clone(),
                    source,
                })?;

            let progress = format!(
                "[{}/{}] {}  ({:.3} MHz) ...",
                pos + 1,
                total,
                channel.id,
                channel.frequency_hz as f64 / 1e6
            );

            let outcome = match attempt {
                Attempt::NoSignal => {
                    info!("{} no signal", progress);
                    ChannelOutcome::NoSignal
                }
                Attempt::NoSync => {
                    info!("{} signal but no sync", progress);
                    ChannelOutcome::NoSync
                }
                Attempt::Found(result) => {
                    info!(
                        "{} found: {} ({} services, SNR {:.1} dB)",
                        progress,
                        result.ensemble_label,
                        result.services.len(),
                        result.snr
                    );
                    let outcome = ChannelOutcome::Found {
                        services: result.services.len(),
                    };
                    report.results.push(result);
                    outcome
                }
            };

            report.outcomes.push((channel.id.clone(), outcome));
            cursor = self.catalog.next(pos);
        }

        info!(
            "Scan complete: {} ensembles on {} channels",
            report.results.len(),
            total
        );
        Ok(report)
    }

    fn scan_channel(&self, channel: &Channel) -> Result<Attempt, DeviceError> {
        let timings = self.options.timings;

        self.state.reset();
        self.tuner.set_frequency(channel.frequency_hz)?;
        self.tuner.reset()?;
        thread::sleep(timings.settle);

        debug!("{}: waiting for signal presence", channel.id);
        let presence = {
            let engine = self.start_engine(ReceiveMode::Quick)?;
            let outcome = self
                .state
                .wait_for(timings.presence_timeout, |s| s.signal_present);
            engine.stop();
            outcome
        };

        if presence == WaitOutcome::TimedOut {
            return Ok(Attempt::NoSignal);
        }

        debug!("{}: signal present, waiting for sync", channel.id);
        self.state.clear_synced();
        self.tuner.reset()?;
        let engine = self.start_engine(ReceiveMode::Full)?;

        if self.state.wait_for(self.options.sync_timeout, |s| s.synced) == WaitOutcome::TimedOut {
            engine.stop();
            return Ok(Attempt::NoSync);
        }

        debug!("{}: synced, collecting services", channel.id);
        thread::sleep(timings.dwell);
        let result = self.collect(channel, &engine);
        engine.stop();

        Ok(Attempt::Found(result))
    }

    fn start_engine(&self, mode: ReceiveMode) -> Result<ActiveEngine, DeviceError> {
        let mut engine = ActiveEngine(self.factory.create(
            self.listener.clone(),
            self.tuner.clone(),
            self.options.receiver,
        ));
        engine.0.start(mode)?;
        Ok(engine)
    }

    fn collect(&self, channel: &Channel, engine: &ActiveEngine) -> ScanResult {
        let snapshot = self.state.snapshot();

        let services: Vec<ServiceInfo> = engine
            .services()
            .iter()
            .map(|service| ServiceInfo {
                sid: service.id,
                label: normalize_label(&service.label),
                bitrate_kbps: first_valid_bitrate(&**engine, service),
            })
            .collect();

        debug!(
            "{}: {} service ids announced, {} listed",
            channel.id,
            snapshot.detected_services.len(),
            services.len()
        );

        ScanResult {
            channel: channel.id.clone(),
            frequency_hz: channel.frequency_hz,
            ensemble_label: normalize_label(&snapshot.ensemble_label),
            ensemble_id: snapshot.ensemble_id,
            snr: snapshot.snr,
            services,
        }
    }
}

/// Listener that feeds engine notifications into `state`
fn scan_listener(state: &Arc<ScanState>) -> Listener {
    let (snr, presence, sync, service, eid, label) = (
        state.clone(),
        state.clone(),
        state.clone(),
        state.clone(),
        state.clone(),
        state.clone(),
    );

    Listener::new()
        .on_snr(move |db| snr.set_snr(db))
        .on_signal_presence(move |present| presence.set_signal_present(present))
        .on_sync(move |synced| sync.set_synced(synced))
        .on_service_detected(move |sid| service.add_service(sid))
        .on_ensemble_id(move |id| eid.set_ensemble_id(id))
        .on_ensemble_label(move |text| label.set_ensemble_label(text))
}

/// Bitrate of the first component whose subchannel resolves, 0 if none does
fn first_valid_bitrate(engine: &dyn DecoderEngine, service: &Service) -> u32 {
    engine
        .components(service)
        .iter()
        .map(|component| engine.subchannel(component))
        .find(Subchannel::is_valid)
        .map(|subchannel| subchannel.bitrate_kbps)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Script, SimFactory, SimTuner};

    fn fast_options(sync_timeout_ms: u64) -> ScanOptions {
        ScanOptions {
            sync_timeout: Duration::from_millis(sync_timeout_ms),
            receiver: ReceiverOptions::default(),
            timings: Timings {
                settle: Duration::from_millis(10),
                presence_timeout: Duration::from_millis(300),
                dwell: Duration::from_millis(100),
            },
        }
    }

    fn two_channels() -> Catalog {
        Catalog::from_channels(vec![
            Channel::new("5A", 174_928_000),
            Channel::new("5B", 176_640_000),
        ])
    }

    fn scanner(
        catalog: Catalog,
        script: &str,
        options: ScanOptions,
    ) -> (Scanner<SimFactory>, Arc<SimTuner>) {
        let tuner = Arc::new(SimTuner::new());
        let factory = SimFactory::new(Script::from_json(script).unwrap());
        (Scanner::new(catalog, tuner.clone(), factory, options), tuner)
    }

    #[test]
    fn test_default_timings_are_hardware_constants() {
        let options = ScanOptions::default();
        assert_eq!(options.sync_timeout, Duration::from_secs(10));
        assert_eq!(options.timings.settle, Duration::from_millis(500));
        assert_eq!(options.timings.presence_timeout, Duration::from_secs(3));
        assert_eq!(options.timings.dwell, Duration::from_secs(3));
    }

    #[test]
    fn test_no_signal_then_ensemble() {
        let script = r#"{"transmitters": [{
            "frequency_hz": 176640000,
            "quick": [{"after_ms": 20, "event": {"kind": "signal_presence", "present": true}}],
            "full": [
                {"after_ms": 10, "event": {"kind": "snr", "db": 14.5}},
                {"after_ms": 10, "event": {"kind": "sync", "synced": true}},
                {"event": {"kind": "ensemble_id", "eid": "0x4C86"}},
                {"event": {"kind": "ensemble_label", "label": "BBC National DAB  "}},
                {"event": {"kind": "service_detected", "sid": "0xC221"}},
                {"event": {"kind": "date_time", "unix_secs": 1700000000}}
            ],
            "services": [
                {"sid": "0xC221", "label": "BBC Radio 1     ", "components": [{"subchannel": 3, "bitrate_kbps": 128}]}
            ]
        }]}"#;
        let (scanner, tuner) = scanner(two_channels(), script, fast_options(2000));

        let report = scanner.run().unwrap();

        assert_eq!(report.channels_total, 2);
        assert_eq!(
            report.outcomes,
            vec![
                ("5A".to_string(), ChannelOutcome::NoSignal),
                ("5B".to_string(), ChannelOutcome::Found { services: 1 }),
            ]
        );
        assert_eq!(
            report.results,
            vec![ScanResult {
                channel: "5B".to_string(),
                frequency_hz: 176_640_000,
                ensemble_label: "BBC National DAB".to_string(),
                ensemble_id: 0x4C86,
                snr: 14.5,
                services: vec![ServiceInfo {
                    sid: 0xC221,
                    label: "BBC Radio 1".to_string(),
                    bitrate_kbps: 128,
                }],
            }]
        );
        assert_eq!(tuner.retunes(), 2);
        // one reset per retune, one more before full mode on 5B
        assert_eq!(tuner.resets(), 3);

        let stats = scanner.factory().stats();
        assert_eq!(stats.created(), 3);
        assert_eq!(stats.started(), 3);
        assert_eq!(stats.stopped(), 3);
    }

    #[test]
    fn test_signal_but_no_sync() {
        let script = r#"{"transmitters": [{
            "frequency_hz": 174928000,
            "quick": [{"after_ms": 10, "event": {"kind": "signal_presence", "present": true}}],
            "full": [{"after_ms": 10, "event": {"kind": "snr", "db": 3.0}}]
        }]}"#;
        let catalog = Catalog::from_channels(vec![Channel::new("5A", 174_928_000)]);
        let (scanner, _) = scanner(catalog, script, fast_options(300));

        let report = scanner.run().unwrap();

        assert!(report.results.is_empty());
        assert_eq!(
            report.outcomes,
            vec![("5A".to_string(), ChannelOutcome::NoSync)]
        );
        // quick and full instance, each stopped exactly once
        let stats = scanner.factory().stats();
        assert_eq!(stats.started(), 2);
        assert_eq!(stats.stopped(), 2);
    }

    #[test]
    fn test_no_state_carried_between_channels() {
        let script = r#"{"transmitters": [
            {
                "frequency_hz": 174928000,
                "quick": [{"after_ms": 10, "event": {"kind": "signal_presence", "present": true}}],
                "full": [
                    {"event": {"kind": "ensemble_id", "eid": "0x1111"}},
                    {"event": {"kind": "ensemble_label", "label": "Alpha Mux"}},
                    {"event": {"kind": "service_detected", "sid": "0xA001"}},
                    {"event": {"kind": "snr", "db": 20.0}},
                    {"after_ms": 10, "event": {"kind": "sync", "synced": true}},
                    {"after_ms": 5000, "event": {"kind": "ensemble_label", "label": "STALE"}}
                ],
                "services": [{"sid": "0xA001", "label": "Alpha One", "components": [{"subchannel": 1, "bitrate_kbps": 96}]}]
            },
            {
                "frequency_hz": 176640000,
                "quick": [{"after_ms": 10, "event": {"kind": "signal_presence", "present": true}}],
                "full": [{"event": {"kind": "sync", "synced": true}}],
                "services": [{"sid": "0xB001", "label": "Bravo One"}]
            }
        ]}"#;
        let (scanner, _) = scanner(two_channels(), script, fast_options(2000));

        let report = scanner.run().unwrap();

        assert_eq!(report.results.len(), 2);
        let a = &report.results[0];
        assert_eq!(a.ensemble_label, "Alpha Mux");
        assert_eq!(a.ensemble_id, 0x1111);

        let b = &report.results[1];
        assert_eq!(b.channel, "5B");
        assert_eq!(b.ensemble_label, "");
        assert_eq!(b.ensemble_id, 0);
        assert_eq!(b.snr, 0.0);
        assert_eq!(
            b.services,
            vec![ServiceInfo {
                sid: 0xB001,
                label: "Bravo One".to_string(),
                bitrate_kbps: 0,
            }]
        );
    }

    #[test]
    fn test_stopped_engine_cannot_leak_into_next_channel() {
        // 5A's quick engine would raise its label after the presence window,
        // i.e. while 5B is being collected, unless stop drains it.
        let script = r#"{"transmitters": [
            {
                "frequency_hz": 174928000,
                "quick": [{"after_ms": 400, "event": {"kind": "ensemble_label", "label": "Ghost"}}]
            },
            {
                "frequency_hz": 176640000,
                "quick": [{"after_ms": 10, "event": {"kind": "signal_presence", "present": true}}],
                "full": [{"after_ms": 10, "event": {"kind": "sync", "synced": true}}]
            }
        ]}"#;
        let mut options = fast_options(2000);
        options.timings.dwell = Duration::from_millis(300);
        let (scanner, _) = scanner(two_channels(), script, options);

        let report = scanner.run().unwrap();

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].ensemble_label, "");
        assert_eq!(scanner.factory().stats().delivered(), 2);
    }

    #[test]
    fn test_visits_every_channel() {
        let catalog = Catalog::from_channels(vec![
            Channel::new("LA", 1_452_960_000),
            Channel::new("LB", 1_454_672_000),
            Channel::new("LC", 1_456_384_000),
        ]);
        let mut options = fast_options(300);
        options.timings.presence_timeout = Duration::from_millis(50);
        let (scanner, tuner) = scanner(catalog, "{}", options);

        let report = scanner.run().unwrap();

        assert_eq!(report.channels_total, 3);
        assert_eq!(report.outcomes.len(), 3);
        assert!(report
            .outcomes
            .iter()
            .all(|(_, outcome)| *outcome == ChannelOutcome::NoSignal));
        assert!(report.results.is_empty());
        assert_eq!(tuner.retunes(), 3);
    }

    #[test]
    fn test_duplicate_ids_visit_every_entry() {
        let catalog = Catalog::from_channels(vec![
            Channel::new("5A", 174_928_000),
            Channel::new("5B", 176_640_000),
            Channel::new("5A", 174_928_000),
        ]);
        let mut options = fast_options(300);
        options.timings.presence_timeout = Duration::from_millis(50);
        let (scanner, tuner) = scanner(catalog, "{}", options);

        let report = scanner.run().unwrap();

        assert_eq!(report.channels_total, 3);
        let ids: Vec<&str> = report.outcomes.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["5A", "5B", "5A"]);
        assert_eq!(tuner.retunes(), 3);
    }

    #[test]
    fn test_snr_is_latest_sample() {
        let script = r#"{"transmitters": [{
            "frequency_hz": 174928000,
            "quick": [{"event": {"kind": "signal_presence", "present": true}}],
            "full": [
                {"event": {"kind": "snr", "db": 5.0}},
                {"after_ms": 10, "event": {"kind": "sync", "synced": true}},
                {"after_ms": 30, "event": {"kind": "snr", "db": 12.0}}
            ]
        }]}"#;
        let catalog = Catalog::from_channels(vec![Channel::new("5A", 174_928_000)]);
        let mut options = fast_options(1000);
        options.timings.dwell = Duration::from_millis(300);
        let (scanner, _) = scanner(catalog, script, options);

        let report = scanner.run().unwrap();

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].snr, 12.0);
    }

    #[test]
    fn test_first_valid_subchannel_sets_bitrate() {
        let script = r#"{"transmitters": [{
            "frequency_hz": 174928000,
            "quick": [{"event": {"kind": "signal_presence", "present": true}}],
            "full": [{"event": {"kind": "sync", "synced": true}}],
            "services": [
                {"sid": 1, "label": "Multi", "components": [
                    {"subchannel": null, "bitrate_kbps": 999},
                    {"subchannel": 4, "bitrate_kbps": 64},
                    {"subchannel": 5, "bitrate_kbps": 192}
                ]},
                {"sid": 2, "label": "Unresolved", "components": [{"subchannel": null}]}
            ]
        }]}"#;
        let catalog = Catalog::from_channels(vec![Channel::new("5A", 174_928_000)]);
        let (scanner, _) = scanner(catalog, script, fast_options(1000));

        let report = scanner.run().unwrap();

        let services = &report.results[0].services;
        assert_eq!(services[0].bitrate_kbps, 64);
        assert_eq!(services[1].bitrate_kbps, 0);
    }

    #[test]
    fn test_device_fault_aborts_run() {
        let catalog = two_channels();
        let tuner = Arc::new(SimTuner::with_fault_at(176_640_000));
        let factory = SimFactory::new(Script::default());
        let mut options = fast_options(300);
        options.timings.presence_timeout = Duration::from_millis(50);
        let scanner = Scanner::new(catalog, tuner, factory, options);

        let err = scanner.run().unwrap_err();

        match err {
            ScanError::Device { channel, source } => {
                assert_eq!(channel, "5B");
                assert!(matches!(source, DeviceError::Tuner(_)));
            }
        }
        let stats = scanner.factory().stats();
        assert_eq!(stats.started(), stats.stopped());
    }
}
