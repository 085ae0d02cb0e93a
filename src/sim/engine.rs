//! Scripted decoding engine
//!
//! Each started instance replays its transmitter's events from a dedicated
//! delivery thread. `stop` signals that thread and joins it, so no event can
//! reach the listener once `stop` has returned.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use super::script::{Script, ScriptedService, TimedEvent, Transmitter};
use crate::engine::{
    Component, DecoderEngine, EngineFactory, Listener, ReceiveMode, ReceiverOptions, Service,
    Subchannel, Tuner,
};
use crate::error::DeviceError;

/// Engine lifecycle counters (atomic, shared by all instances of a factory)
#[derive(Debug, Default)]
pub struct EngineStats {
    pub instances_created: AtomicU64,
    pub instances_started: AtomicU64,
    pub instances_stopped: AtomicU64,
    pub events_delivered: AtomicU64,
}

impl EngineStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created(&self) -> u64 {
        self.instances_created.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> u64 {
        self.instances_started.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> u64 {
        self.instances_stopped.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> u64 {
        self.events_delivered.load(Ordering::SeqCst)
    }
}

/// Delivery thread handle
struct Worker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// One scripted engine instance
pub struct SimEngine {
    listener: Arc<Listener>,
    transmitter: Option<Transmitter>,
    stats: Arc<EngineStats>,
    worker: Option<Worker>,
}

impl SimEngine {
    fn new(
        listener: Arc<Listener>,
        transmitter: Option<Transmitter>,
        stats: Arc<EngineStats>,
    ) -> Self {
        stats.instances_created.fetch_add(1, Ordering::SeqCst);
        Self {
            listener,
            transmitter,
            stats,
            worker: None,
        }
    }

    fn service_table(&self) -> &[ScriptedService] {
        self.transmitter
            .as_ref()
            .map(|t| t.services.as_slice())
            .unwrap_or_default()
    }
}

impl DecoderEngine for SimEngine {
    fn start(&mut self, mode: ReceiveMode) -> Result<(), DeviceError> {
        if self.worker.is_some() {
            return Err(DeviceError::Engine("instance already started".to_string()));
        }

        let events: Vec<TimedEvent> = match (&self.transmitter, mode) {
            (Some(t), ReceiveMode::Quick) => t.quick.clone(),
            (Some(t), ReceiveMode::Full) => t.full.clone(),
            (None, _) => Vec::new(),
        };

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let listener = self.listener.clone();
        let stats = self.stats.clone();

        let handle = thread::Builder::new()
            .name("dab-engine".to_string())
            .spawn(move || {
                for timed in events {
                    // Sleep until the event is due unless asked to stop
                    match stop_rx.recv_timeout(Duration::from_millis(timed.after_ms)) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                    }
                    listener.dispatch(timed.event);
                    stats.events_delivered.fetch_add(1, Ordering::SeqCst);
                }
            })?;

        self.stats.instances_started.fetch_add(1, Ordering::SeqCst);
        debug!("Engine instance started in {:?} mode", mode);
        self.worker = Some(Worker { stop_tx, handle });
        Ok(())
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        // The thread may already have finished its script
        let _ = worker.stop_tx.try_send(());
        drop(worker.stop_tx);
        if worker.handle.join().is_err() {
            warn!("Engine delivery thread panicked");
        }

        self.stats.instances_stopped.fetch_add(1, Ordering::SeqCst);
        debug!("Engine instance stopped");
    }

    fn services(&self) -> Vec<Service> {
        self.service_table()
            .iter()
            .map(|s| Service {
                id: s.sid,
                label: s.label.clone(),
            })
            .collect()
    }

    fn components(&self, service: &Service) -> Vec<Component> {
        self.service_table()
            .iter()
            .filter(|s| s.sid == service.id)
            .flat_map(|s| s.components.iter())
            .map(|c| Component {
                service_id: service.id,
                subchannel_id: c.subchannel,
            })
            .collect()
    }

    fn subchannel(&self, component: &Component) -> Subchannel {
        let bitrates: HashMap<u8, u32> = self
            .service_table()
            .iter()
            .flat_map(|s| s.components.iter())
            .filter_map(|c| c.subchannel.map(|id| (id, c.bitrate_kbps)))
            .collect();

        component
            .subchannel_id
            .and_then(|id| {
                bitrates.get(&id).map(|bitrate| Subchannel {
                    id: Some(id),
                    bitrate_kbps: *bitrate,
                })
            })
            .unwrap_or_default()
    }
}

impl Drop for SimEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Builds [`SimEngine`] instances for whatever the tuner is tuned to
pub struct SimFactory {
    script: Arc<Script>,
    stats: Arc<EngineStats>,
}

impl SimFactory {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(script),
            stats: EngineStats::new(),
        }
    }

    pub fn stats(&self) -> &Arc<EngineStats> {
        &self.stats
    }
}

impl EngineFactory for SimFactory {
    fn create(
        &self,
        listener: Arc<Listener>,
        tuner: Arc<dyn Tuner>,
        options: ReceiverOptions,
    ) -> Box<dyn DecoderEngine> {
        let frequency = tuner.frequency();
        debug!(
            "Creating engine at {} Hz (tii={}, coarse corrector={})",
            frequency, options.decode_tii, options.coarse_corrector
        );
        let transmitter = self.script.transmitter(frequency).cloned();
        Box::new(SimEngine::new(listener, transmitter, self.stats.clone()))
    }
}
