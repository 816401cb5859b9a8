//! Fixed-size pool of manager connections
//!
//! The pool owns every [`AmiConnection`], picks a healthy one round robin
//! for each outbound action, merges all their events and responses into a
//! single broadcast stream and swaps out connections that stay unhealthy or
//! give up reconnecting. Replacements keep the slot id and get a new
//! generation, so late signals from the retired instance are ignored.

use crate::action::AmiAction;
use crate::connection::{AmiConnection, ConnectionSignal, ConnectionStatus, SignalKind};
use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::error::{AmiError, AmiResult};
use crate::message::AmiMessage;
use futures::future::join_all;
use pabx_core::config::AmiConfig;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

/// Pool overview for the status surface
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSummary {
    pub initialized: bool,
    pub total: usize,
    pub healthy: usize,
    pub connections: Vec<ConnectionStatus>,
}

/// Cheap to clone; all clones share the same connections
#[derive(Clone)]
pub struct AmiPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    config: Arc<AmiConfig>,
    connections: RwLock<Vec<Arc<AmiConnection>>>,
    cursor: Mutex<usize>,
    initialized: AtomicBool,
    init_lock: tokio::sync::Mutex<()>,
    next_generation: AtomicU64,
    events: broadcast::Sender<AmiMessage>,
    signals: Mutex<Option<mpsc::UnboundedSender<ConnectionSignal>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AmiPool {
    pub fn new(config: AmiConfig) -> Self {
        // Every session delivers its own copy of each event
        let capacity = EVENT_CHANNEL_CAPACITY * config.pool_size.max(1);
        let (events, _) = broadcast::channel(capacity);

        Self {
            inner: Arc::new(PoolInner {
                config: Arc::new(config),
                connections: RwLock::new(Vec::new()),
                cursor: Mutex::new(0),
                initialized: AtomicBool::new(false),
                init_lock: tokio::sync::Mutex::new(()),
                next_generation: AtomicU64::new(0),
                events,
                signals: Mutex::new(None),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Connect every slot concurrently
    ///
    /// Succeeds when at least one connection authenticated; the rest keep
    /// retrying in the background. With none healthy everything created here
    /// is torn down and `NoHealthyConnection` is returned. Calling it again
    /// while initialized is a no-op.
    #[instrument(skip(self), fields(address = %self.inner.config.address()))]
    pub async fn initialize(&self) -> AmiResult<()> {
        let _init = self.inner.init_lock.lock().await;
        if self.is_initialized() {
            return Ok(());
        }

        let size = self.inner.config.pool_size.max(1);
        info!(pool_size = size, "Initializing AMI connection pool");

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let connections: Vec<Arc<AmiConnection>> = (0..size)
            .map(|slot| Arc::new(self.inner.new_connection(slot, signal_tx.clone())))
            .collect();

        *self.inner.signals.lock() = Some(signal_tx);
        *self.inner.connections.write() = connections.clone();

        let fan_in = tokio::spawn(fan_in(Arc::downgrade(&self.inner), signal_rx));

        let results = join_all(connections.iter().map(|conn| conn.connect())).await;
        for (conn, result) in connections.iter().zip(results) {
            if let Err(e) = result {
                warn!(connection_id = conn.id(), error = %e, "AMI connection failed to start");
            }
        }

        let healthy = connections.iter().filter(|conn| conn.is_healthy()).count();
        if healthy == 0 {
            error!(pool_size = size, "No AMI connection could be established");

            fan_in.abort();
            *self.inner.signals.lock() = None;
            self.inner.connections.write().clear();
            join_all(connections.iter().map(|conn| conn.disconnect())).await;

            return Err(AmiError::NoHealthyConnection);
        }

        let monitor = tokio::spawn(health_monitor(
            Arc::downgrade(&self.inner),
            self.inner.config.health_check_interval(),
        ));
        self.inner.tasks.lock().extend([fan_in, monitor]);
        self.inner.initialized.store(true, Ordering::SeqCst);

        info!(healthy, total = size, "✅ AMI connection pool ready");
        Ok(())
    }

    /// Next healthy connection, round robin
    ///
    /// The healthy subset is recomputed on every call, so the cursor is an
    /// index into whatever is healthy right now.
    pub fn get_next_connection(&self) -> AmiResult<Arc<AmiConnection>> {
        let connections = self.inner.connections.read();
        let healthy: Vec<&Arc<AmiConnection>> =
            connections.iter().filter(|conn| conn.is_healthy()).collect();

        if healthy.is_empty() {
            return Err(AmiError::NoHealthyConnection);
        }

        let mut cursor = self.inner.cursor.lock();
        let idx = *cursor % healthy.len();
        *cursor = (idx + 1) % healthy.len();

        Ok(Arc::clone(healthy[idx]))
    }

    /// Send an action on the next healthy connection, initializing lazily
    pub async fn send_action(&self, action: AmiAction) -> AmiResult<()> {
        if !self.is_initialized() {
            self.initialize().await?;
        }

        let connection = self.get_next_connection()?;
        debug!(connection_id = connection.id(), %action, "Dispatching AMI action");

        connection.send_action(action).await
    }

    /// Every event and response from every connection
    pub fn subscribe(&self) -> broadcast::Receiver<AmiMessage> {
        self.inner.events.subscribe()
    }

    pub fn summary(&self) -> PoolSummary {
        let connections: Vec<ConnectionStatus> = self
            .inner
            .connections
            .read()
            .iter()
            .map(|conn| conn.status())
            .collect();

        PoolSummary {
            initialized: self.is_initialized(),
            total: connections.len(),
            healthy: connections.iter().filter(|status| status.healthy).count(),
            connections,
        }
    }

    /// Connection currently occupying `slot`
    pub fn connection(&self, slot: usize) -> Option<Arc<AmiConnection>> {
        self.inner.connections.read().get(slot).cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &AmiConfig {
        &self.inner.config
    }

    /// Stop background tasks and close every connection
    pub async fn disconnect(&self) {
        let _init = self.inner.init_lock.lock().await;

        let tasks = std::mem::take(&mut *self.inner.tasks.lock());
        for task in tasks {
            task.abort();
        }
        *self.inner.signals.lock() = None;

        let connections = std::mem::take(&mut *self.inner.connections.write());
        join_all(connections.iter().map(|conn| conn.disconnect())).await;

        self.inner.initialized.store(false, Ordering::SeqCst);
        info!(closed = connections.len(), "AMI connection pool disconnected");
    }
}

impl PoolInner {
    fn new_connection(
        &self,
        slot: usize,
        signals: mpsc::UnboundedSender<ConnectionSignal>,
    ) -> AmiConnection {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        AmiConnection::new(slot, generation, Arc::clone(&self.config), signals)
    }

    /// Swap the instance in `slot` for a fresh one, if it is still `generation`
    fn replace(&self, slot: usize, generation: u64, reason: &'static str) {
        let Some(signals) = self.signals.lock().clone() else {
            return;
        };

        let (old, new) = {
            let mut connections = self.connections.write();
            match connections.get(slot) {
                Some(current) if current.generation() == generation => {}
                _ => {
                    debug!(slot, generation, "Skipping replacement of retired connection");
                    return;
                }
            }

            let new = Arc::new(self.new_connection(slot, signals));
            let old = std::mem::replace(&mut connections[slot], Arc::clone(&new));
            (old, new)
        };

        warn!(
            slot,
            old_generation = old.generation(),
            new_generation = new.generation(),
            reason,
            "Replacing AMI connection"
        );

        tokio::spawn(async move {
            let (_, result) = tokio::join!(old.disconnect(), new.connect());
            match result {
                Ok(()) => info!(slot, generation = new.generation(), "Replacement connection ready"),
                Err(e) => warn!(slot, error = %e, "Replacement connection failed to start"),
            }
        });
    }

    fn check_health(&self) {
        let stale: Vec<(usize, u64)> = self
            .connections
            .read()
            .iter()
            .filter(|conn| !conn.is_healthy() && !conn.in_retry_cycle())
            .map(|conn| (conn.id(), conn.generation()))
            .collect();

        debug!(unhealthy = stale.len(), "AMI health check");

        for (slot, generation) in stale {
            self.replace(slot, generation, "health check failed");
        }
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

/// Merge connection signals into the pool's broadcast stream
async fn fan_in(pool: Weak<PoolInner>, mut signals: mpsc::UnboundedReceiver<ConnectionSignal>) {
    while let Some(signal) = signals.recv().await {
        let Some(inner) = pool.upgrade() else {
            break;
        };

        match signal.kind {
            SignalKind::Event(message) | SignalKind::Response(message) => {
                // No subscribers is fine
                let _ = inner.events.send(message);
            }
            SignalKind::Authenticated => {
                debug!(slot = signal.slot, generation = signal.generation, "Connection authenticated");
            }
            SignalKind::Disconnected => {
                debug!(slot = signal.slot, generation = signal.generation, "Connection dropped");
            }
            SignalKind::MaxReconnectAttemptsReached => {
                inner.replace(signal.slot, signal.generation, "max reconnect attempts reached");
            }
        }
    }
}

async fn health_monitor(pool: Weak<PoolInner>, period: Duration) {
    let period = period.max(Duration::from_secs(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(inner) = pool.upgrade() else {
            break;
        };
        inner.check_health();
    }
}
