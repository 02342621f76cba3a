//! # Capture Session
//!
//! Lifecycle around a [`LootPipeline`]: a capture thread pulling raw payloads
//! from a [`PacketSource`], push-style [`CaptureSession::ingest`], a liveness
//! monitor that flips the link status after a period of silence, and fan-out
//! of loot events to observers.
//!
//! ## Concurrency
//! - Pipeline state, the online flag and the last-packet instant sit behind one
//!   mutex; a packet is decoded and correlated atomically.
//! - Observers run after that mutex is released but while a delivery gate is
//!   held for reading. `stop()` takes the gate for writing, so once it returns
//!   no observer is invoked again. Observers must not call `stop()`.
//! - Threads are joined with a bounded timeout; a thread that overruns is
//!   detached and can no longer deliver because the gate is closed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio_stream::wrappers::{ReceiverStream, WatchStream};
use tracing::{debug, error, info, warn};

use crate::catalog::{InMemoryItemCatalog, ItemCatalog};
use crate::config::SessionConfig;
use crate::error::constants::{
    ERR_ALREADY_RUNNING, ERR_LOCK_POISONED, ERR_NOT_RUNNING, ERR_THREAD_SPAWN,
};
use crate::error::{ProtocolError, Result};
use crate::protocol::EventCodes;
use crate::service::pipeline::LootPipeline;
use crate::service::sink::{LootObserver, LootSink, SubscriptionId};
use crate::utils::metrics::{Metrics, MetricsSnapshot};
use crate::world::{LootEvent, WorldState};

/// Online while packets keep arriving within the offline timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Offline,
    Online,
}

/// Supplier of raw UDP payloads, typically a packet-capture backend.
pub trait PacketSource: Send {
    /// Wait up to `timeout` for the next payload. `Ok(None)` on timeout;
    /// `Err(SourceClosed)` once the source is exhausted.
    fn recv(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>>;
}

impl PacketSource for Receiver<Vec<u8>> {
    fn recv(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        match self.recv_timeout(timeout) {
            Ok(payload) => Ok(Some(payload)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(ProtocolError::SourceClosed),
        }
    }
}

struct SessionState {
    pipeline: LootPipeline,
    online: bool,
    last_packet: Option<Instant>,
}

struct Shared {
    state: Mutex<SessionState>,
    gate: RwLock<bool>,
    sink: LootSink,
    status: watch::Sender<LinkStatus>,
    metrics: Arc<Metrics>,
    capture_error: Mutex<Option<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("{}", ERR_LOCK_POISONED);
        poisoned.into_inner()
    })
}

impl Shared {
    fn gate_read(&self) -> RwLockReadGuard<'_, bool> {
        self.gate.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn gate_write(&self) -> RwLockWriteGuard<'_, bool> {
        self.gate.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ingest(&self, data: &[u8]) -> bool {
        let gate = self.gate_read();
        if !*gate {
            return false;
        }

        let events = {
            let mut state = lock(&self.state);
            state.last_packet = Some(Instant::now());
            if !state.online {
                state.online = true;
                self.status.send_replace(LinkStatus::Online);
                info!("Capture online");
            }
            state.pipeline.process_packet(data)
        };

        for event in &events {
            self.sink.publish(event);
        }
        drop(gate);
        true
    }

    /// Flip to offline when no packet arrived within `timeout`.
    fn check_liveness(&self, timeout: Duration) {
        let mut state = lock(&self.state);
        let silent = state
            .last_packet
            .map_or(true, |last| last.elapsed() > timeout);
        if state.online && silent {
            state.online = false;
            self.status.send_replace(LinkStatus::Offline);
            info!(timeout_ms = timeout.as_millis() as u64, "Capture offline");
        }
    }
}

struct Workers {
    handles: Vec<JoinHandle<()>>,
    // dropping the senders wakes and stops the threads
    shutdown: Vec<Sender<()>>,
}

/// A capture session over one pipeline.
pub struct CaptureSession {
    config: SessionConfig,
    shared: Arc<Shared>,
    running: AtomicBool,
    workers: Mutex<Option<Workers>>,
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("running", &self.is_running())
            .field("status", &*self.shared.status.borrow())
            .field("observers", &self.shared.sink.len())
            .finish()
    }
}

impl CaptureSession {
    pub fn new(config: SessionConfig, codes: EventCodes, catalog: Arc<dyn ItemCatalog>) -> Self {
        let metrics = Arc::new(Metrics::new());
        let pipeline = LootPipeline::with_metrics(&config, codes, catalog, Arc::clone(&metrics));
        let (status, _) = watch::channel(LinkStatus::Offline);
        Self {
            config,
            shared: Arc::new(Shared {
                state: Mutex::new(SessionState {
                    pipeline,
                    online: false,
                    last_packet: None,
                }),
                gate: RwLock::new(false),
                sink: LootSink::new(),
                status,
                metrics,
                capture_error: Mutex::new(None),
            }),
            running: AtomicBool::new(false),
            workers: Mutex::new(None),
        }
    }

    /// Build a session, loading the catalogs named in the configuration.
    /// Missing paths fall back to an empty code table or item catalog.
    pub fn from_config(config: SessionConfig) -> Result<Self> {
        config.validate_strict()?;
        let codes = match &config.catalog.event_codes_path {
            Some(path) => EventCodes::from_file(path)?,
            None => {
                warn!("No event-code catalog configured; no messages will be routed");
                EventCodes::default()
            }
        };
        let catalog = match &config.catalog.items_path {
            Some(path) => InMemoryItemCatalog::from_file(path)?,
            None => InMemoryItemCatalog::new(),
        };
        Ok(Self::new(config, codes, Arc::new(catalog)))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start pulling payloads from `source` on a capture thread.
    pub fn start<S: PacketSource + 'static>(&self, source: S) -> Result<()> {
        self.start_inner(Some(Box::new(source)))
    }

    /// Start without a capture thread; payloads arrive through [`ingest`](Self::ingest).
    pub fn start_push(&self) -> Result<()> {
        self.start_inner(None)
    }

    fn start_inner(&self, source: Option<Box<dyn PacketSource>>) -> Result<()> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("{}", ERR_ALREADY_RUNNING);
            return Err(ProtocolError::SessionAlreadyRunning);
        }

        {
            let mut state = lock(&self.shared.state);
            state.online = false;
            state.last_packet = None;
            state.pipeline.world_mut().clear_self();
        }
        self.shared.status.send_replace(LinkStatus::Offline);
        *lock(&self.shared.capture_error) = None;
        *self.shared.gate_write() = true;

        let mut workers = Workers {
            handles: Vec::new(),
            shutdown: Vec::new(),
        };
        let spawned = self.spawn_liveness(&mut workers).and_then(|()| match source {
            Some(source) => self.spawn_capture(source, &mut workers),
            None => Ok(()),
        });

        let ports = self.config.capture.ports.clone();
        *lock(&self.workers) = Some(workers);
        if let Err(e) = spawned {
            let _ = self.stop();
            return Err(e);
        }
        info!(?ports, "Capture session started");
        Ok(())
    }

    fn spawn_liveness(&self, workers: &mut Workers) -> Result<()> {
        let (tx, rx) = mpsc::channel::<()>();
        let shared = Arc::clone(&self.shared);
        let interval = self.config.capture.liveness_interval;
        let timeout = self.config.capture.offline_timeout;
        let handle = thread::Builder::new()
            .name("photon-liveness".into())
            .spawn(move || loop {
                match rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => shared.check_liveness(timeout),
                    _ => break,
                }
            })
            .map_err(|e| ProtocolError::Capture(format!("{ERR_THREAD_SPAWN}: {e}")))?;
        workers.handles.push(handle);
        workers.shutdown.push(tx);
        Ok(())
    }

    fn spawn_capture(&self, mut source: Box<dyn PacketSource>, workers: &mut Workers) -> Result<()> {
        let (tx, rx) = mpsc::channel::<()>();
        let shared = Arc::clone(&self.shared);
        let poll = self.config.capture.poll_interval;
        let handle = thread::Builder::new()
            .name("photon-capture".into())
            .spawn(move || loop {
                if !matches!(rx.try_recv(), Err(mpsc::TryRecvError::Empty)) {
                    break;
                }
                match source.recv(poll) {
                    Ok(Some(payload)) => {
                        shared.ingest(&payload);
                    }
                    Ok(None) => {}
                    Err(ProtocolError::SourceClosed) => {
                        info!("Packet source closed");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "Packet source failed");
                        *lock(&shared.capture_error) = Some(e.to_string());
                        break;
                    }
                }
            })
            .map_err(|e| ProtocolError::Capture(format!("{ERR_THREAD_SPAWN}: {e}")))?;
        workers.handles.push(handle);
        workers.shutdown.push(tx);
        Ok(())
    }

    /// Push one raw payload. Returns `false` when the session is not running.
    pub fn ingest(&self, data: &[u8]) -> bool {
        self.shared.ingest(data)
    }

    /// Stop capture and release reassembly state. Idempotent. Returns the
    /// capture source failure, if the source failed during the run.
    pub fn stop(&self) -> Result<()> {
        *self.shared.gate_write() = false;

        let Some(workers) = lock(&self.workers).take() else {
            debug!("{}", ERR_NOT_RUNNING);
            return Ok(());
        };
        drop(workers.shutdown);

        let deadline = Instant::now() + self.config.capture.shutdown_timeout;
        for handle in workers.handles {
            join_until(handle, deadline);
        }

        {
            let mut state = lock(&self.shared.state);
            state.pipeline.reset_fragments();
            state.online = false;
        }
        self.shared.status.send_replace(LinkStatus::Offline);
        self.running.store(false, Ordering::SeqCst);
        self.shared.metrics.log_metrics();
        info!("Capture session stopped");

        match lock(&self.shared.capture_error).take() {
            Some(message) => Err(ProtocolError::Capture(message)),
            None => Ok(()),
        }
    }

    pub fn subscribe<O: LootObserver + 'static>(&self, observer: O) -> SubscriptionId {
        self.shared.sink.subscribe(Arc::new(observer))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.sink.unsubscribe(id)
    }

    /// Bounded stream of loot events with the configured queue capacity.
    pub fn channel(&self) -> ReceiverStream<LootEvent> {
        self.channel_with_capacity(self.config.sink.queue_capacity)
    }

    pub fn channel_with_capacity(&self, capacity: usize) -> ReceiverStream<LootEvent> {
        self.shared.sink.channel(capacity)
    }

    pub fn status(&self) -> watch::Receiver<LinkStatus> {
        self.shared.status.subscribe()
    }

    pub fn status_stream(&self) -> WatchStream<LinkStatus> {
        WatchStream::new(self.status())
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Run `f` against the world under the session lock.
    pub fn with_world<R>(&self, f: impl FnOnce(&WorldState) -> R) -> R {
        let state = lock(&self.shared.state);
        f(state.pipeline.world())
    }

    /// Forget all players, containers and items, including the local player.
    pub fn reset_world(&self) {
        lock(&self.shared.state).pipeline.world_mut().clear();
    }

    pub fn pending_fragments(&self) -> usize {
        lock(&self.shared.state).pipeline.decoder().pending_fragments().len()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.stop();
        }
    }
}

fn join_until(handle: JoinHandle<()>, deadline: Instant) {
    while !handle.is_finished() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    if handle.is_finished() {
        let name = handle.thread().name().map(str::to_owned);
        if handle.join().is_err() {
            warn!(thread = ?name, "Session thread panicked");
        }
    } else {
        warn!(thread = ?handle.thread().name(), "Session thread did not stop in time, detaching");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryItemCatalog;

    fn session() -> CaptureSession {
        CaptureSession::new(
            SessionConfig::default(),
            EventCodes::default(),
            Arc::new(InMemoryItemCatalog::new()),
        )
    }

    #[test]
    fn test_double_start_rejected() {
        let session = session();
        session.start_push().unwrap();
        assert!(matches!(
            session.start_push(),
            Err(ProtocolError::SessionAlreadyRunning)
        ));
        session.stop().unwrap();
        session.stop().unwrap();
        session.start_push().unwrap();
        session.stop().unwrap();
    }

    #[test]
    fn test_ingest_requires_running() {
        let session = session();
        assert!(!session.ingest(&[0; 12]));
        session.start_push().unwrap();
        assert!(session.ingest(&[0; 12]));
        assert_eq!(*session.status().borrow(), LinkStatus::Online);
        session.stop().unwrap();
        assert!(!session.ingest(&[0; 12]));
        assert_eq!(*session.status().borrow(), LinkStatus::Offline);
    }
}
