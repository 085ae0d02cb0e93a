//! Narrow notification capability handed to engine instances

use super::EngineEvent;

type Handler<T> = Box<dyn Fn(T) + Send + Sync>;

/// Handlers for the notification kinds a consumer cares about.
///
/// Kinds without a handler are dropped by [`Listener::dispatch`].
#[derive(Default)]
pub struct Listener {
    snr: Option<Handler<f32>>,
    signal_presence: Option<Handler<bool>>,
    sync: Option<Handler<bool>>,
    service_detected: Option<Handler<u32>>,
    ensemble_id: Option<Handler<u16>>,
    ensemble_label: Option<Handler<String>>,
}

impl Listener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_snr(mut self, f: impl Fn(f32) + Send + Sync + 'static) -> Self {
        self.snr = Some(Box::new(f));
        self
    }

    pub fn on_signal_presence(mut self, f: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.signal_presence = Some(Box::new(f));
        self
    }

    pub fn on_sync(mut self, f: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.sync = Some(Box::new(f));
        self
    }

    pub fn on_service_detected(mut self, f: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.service_detected = Some(Box::new(f));
        self
    }

    pub fn on_ensemble_id(mut self, f: impl Fn(u16) + Send + Sync + 'static) -> Self {
        self.ensemble_id = Some(Box::new(f));
        self
    }

    pub fn on_ensemble_label(mut self, f: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.ensemble_label = Some(Box::new(f));
        self
    }

    /// Route an event to its handler. Returns whether a handler consumed it.
    pub fn dispatch(&self, event: EngineEvent) -> bool {
        fn call<T>(handler: &Option<Handler<T>>, value: T) -> bool {
            match handler {
                Some(f) => {
                    f(value);
                    true
                }
                None => false,
            }
        }

        match event {
            EngineEvent::Snr { db } => call(&self.snr, db),
            EngineEvent::SignalPresence { present } => call(&self.signal_presence, present),
            EngineEvent::Sync { synced } => call(&self.sync, synced),
            EngineEvent::ServiceDetected { sid } => call(&self.service_detected, sid),
            EngineEvent::EnsembleId { eid } => call(&self.ensemble_id, eid),
            EngineEvent::EnsembleLabel { label } => call(&self.ensemble_label, label),
            EngineEvent::FrequencyCorrection { .. }
            | EngineEvent::DateTime { .. }
            | EngineEvent::Message { .. } => false,
        }
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("snr", &self.snr.is_some())
            .field("signal_presence", &self.signal_presence.is_some())
            .field("sync", &self.sync.is_some())
            .field("service_detected", &self.service_detected.is_some())
            .field("ensemble_id", &self.ensemble_id.is_some())
            .field("ensemble_label", &self.ensemble_label.is_some())
            .finish()
    }
}
