//! One supervised manager session
//!
//! Each [`AmiConnection`] owns a background task that holds the socket, runs
//! the login handshake, keeps the link alive with pings and reconnects with
//! backoff when it drops. Callers talk to the task through a channel; the
//! pool hears about everything the task sees through [`ConnectionSignal`]s.

use crate::action::AmiAction;
use crate::codec::AmiCodec;
use crate::constants::LOGOFF_TIMEOUT_MS;
use crate::error::{AmiError, AmiResult};
use crate::message::AmiMessage;
use crate::reconnect::ReconnectPolicy;
use crate::state::ConnectionState;
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use pabx_core::config::AmiConfig;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, sleep_until, timeout, Instant, MissedTickBehavior};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a connection reports to its pool
#[derive(Debug, Clone)]
pub enum SignalKind {
    Event(AmiMessage),
    Response(AmiMessage),
    Authenticated,
    Disconnected,
    MaxReconnectAttemptsReached,
}

/// A [`SignalKind`] tagged with the slot and generation of its sender
#[derive(Debug, Clone)]
pub struct ConnectionSignal {
    pub slot: usize,
    pub generation: u64,
    pub kind: SignalKind,
}

/// Point-in-time view of a connection for the status surface
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub id: usize,
    pub generation: u64,
    pub state: ConnectionState,
    pub connected: bool,
    pub authenticated: bool,
    pub healthy: bool,
    pub last_activity: Option<DateTime<Utc>>,
    pub reconnect_attempts: u32,
}

struct Outbound {
    action: AmiAction,
    ack: oneshot::Sender<AmiResult<()>>,
}

/// State shared between the handle and its task
struct Shared {
    state: ConnectionState,
    last_activity: Instant,
    last_activity_at: Option<DateTime<Utc>>,
    reconnect_attempts: u32,
    retrying: bool,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
}

impl Shared {
    fn touch(&mut self) {
        self.last_activity = Instant::now();
        self.last_activity_at = Some(Utc::now());
    }
}

/// Resets the shared state when a session ends, whichever way it ends
struct SessionGuard {
    shared: Arc<Mutex<Shared>>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let mut shared = self.shared.lock();
        shared.state = shared.state.lost();
        shared.outbound = None;
    }
}

pub struct AmiConnection {
    id: usize,
    generation: u64,
    config: Arc<AmiConfig>,
    shared: Arc<Mutex<Shared>>,
    signals: mpsc::UnboundedSender<ConnectionSignal>,
    cancel: CancellationToken,
    started: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AmiConnection {
    pub fn new(
        id: usize,
        generation: u64,
        config: Arc<AmiConfig>,
        signals: mpsc::UnboundedSender<ConnectionSignal>,
    ) -> Self {
        Self {
            id,
            generation,
            config,
            shared: Arc::new(Mutex::new(Shared {
                state: ConnectionState::Disconnected,
                last_activity: Instant::now(),
                last_activity_at: None,
                reconnect_attempts: 0,
                retrying: false,
                outbound: None,
            })),
            signals,
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    /// Start the connection task
    ///
    /// Resolves once the first login is accepted, or fails with the error of
    /// the first attempt. Either way the task keeps reconnecting in the
    /// background until the policy is exhausted or `disconnect()` is called.
    pub async fn connect(&self) -> AmiResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(AmiError::AlreadyStarted(self.id));
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let task = ConnectionTask {
            id: self.id,
            generation: self.generation,
            config: Arc::clone(&self.config),
            shared: Arc::clone(&self.shared),
            signals: self.signals.clone(),
            ready: Some(ready_tx),
        };

        let handle = tokio::spawn(task.run(self.cancel.clone()));
        *self.task.lock() = Some(handle);

        ready_rx.await.unwrap_or(Err(AmiError::TaskStopped))
    }

    /// Write an action on this connection
    ///
    /// Fails immediately when no socket is open; otherwise resolves once the
    /// action has been written.
    pub async fn send_action(&self, action: AmiAction) -> AmiResult<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        {
            let shared = self.shared.lock();
            let outbound = match &shared.outbound {
                Some(outbound) if shared.state.is_connected() => outbound,
                _ => return Err(AmiError::NotConnected(self.id)),
            };
            outbound
                .send(Outbound {
                    action,
                    ack: ack_tx,
                })
                .map_err(|_| AmiError::NotConnected(self.id))?;
        }

        ack_rx.await.map_err(|_| AmiError::NotConnected(self.id))?
    }

    /// Log off (best effort) and stop the task for good
    pub async fn disconnect(&self) {
        if self.state().is_connected() {
            let logoff = timeout(
                Duration::from_millis(LOGOFF_TIMEOUT_MS),
                self.send_action(AmiAction::logoff()),
            )
            .await;

            match logoff {
                Ok(Ok(())) => debug!(connection_id = self.id, "Logoff sent"),
                Ok(Err(e)) => debug!(connection_id = self.id, error = %e, "Logoff failed"),
                Err(_) => debug!(connection_id = self.id, "Logoff timed out"),
            }
        }

        self.cancel.cancel();

        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        info!(
            connection_id = self.id,
            generation = self.generation,
            "AMI connection closed"
        );
    }

    /// Authenticated and heard from within the health timeout
    pub fn is_healthy(&self) -> bool {
        let shared = self.shared.lock();
        shared.state.is_authenticated()
            && shared.last_activity.elapsed() < self.config.health_timeout()
    }

    /// Waiting out (or running) a backoff-scheduled reconnect
    pub fn in_retry_cycle(&self) -> bool {
        self.shared.lock().retrying
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.lock().reconnect_attempts
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> ConnectionStatus {
        let healthy = self.is_healthy();
        let shared = self.shared.lock();
        ConnectionStatus {
            id: self.id,
            generation: self.generation,
            state: shared.state,
            connected: shared.state.is_connected(),
            authenticated: shared.state.is_authenticated(),
            healthy,
            last_activity: shared.last_activity_at,
            reconnect_attempts: shared.reconnect_attempts,
        }
    }
}

impl Drop for AmiConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// The task side of a connection; owns the socket while a session is up
struct ConnectionTask {
    id: usize,
    generation: u64,
    config: Arc<AmiConfig>,
    shared: Arc<Mutex<Shared>>,
    signals: mpsc::UnboundedSender<ConnectionSignal>,
    ready: Option<oneshot::Sender<AmiResult<()>>>,
}

impl ConnectionTask {
    async fn run(mut self, cancel: CancellationToken) {
        let mut policy = ReconnectPolicy::from_config(&self.config);

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.session() => result,
            };

            let err = result.err().unwrap_or(AmiError::ConnectionClosed);
            warn!(
                connection_id = self.id,
                generation = self.generation,
                error = %err,
                "AMI connection lost"
            );
            self.emit(SignalKind::Disconnected);

            if let Some(ready) = self.ready.take() {
                let _ = ready.send(Err(err));
            }

            match policy.next_delay() {
                Some(delay) => {
                    {
                        let mut shared = self.shared.lock();
                        shared.retrying = true;
                        shared.reconnect_attempts = policy.attempts();
                    }

                    info!(
                        connection_id = self.id,
                        attempt = policy.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        "Reconnecting to AMI"
                    );

                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = sleep(delay) => {}
                    }
                }
                None => {
                    self.shared.lock().retrying = false;
                    error!(
                        connection_id = self.id,
                        generation = self.generation,
                        attempts = policy.attempts(),
                        "Max reconnect attempts reached, giving up"
                    );
                    self.emit(SignalKind::MaxReconnectAttemptsReached);
                    break;
                }
            }
        }

        debug!(connection_id = self.id, "AMI connection task stopped");
    }

    /// One socket lifetime: connect, login, then pump frames until failure
    async fn session(&mut self) -> AmiResult<()> {
        let _guard = SessionGuard {
            shared: Arc::clone(&self.shared),
        };

        {
            let mut shared = self.shared.lock();
            shared.state = shared.state.begin_connect()?;
        }

        let socket_timeout = self.config.socket_timeout();
        let address = self.config.address();
        debug!(connection_id = self.id, %address, "Connecting to AMI");

        let stream = timeout(socket_timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| AmiError::Timeout(socket_timeout))??;
        stream.set_nodelay(true)?;

        let mut framed = Framed::new(stream, AmiCodec::new());
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();

        {
            let mut shared = self.shared.lock();
            shared.state = shared.state.socket_opened()?;
            shared.outbound = Some(outbound_tx);
            shared.touch();
        }

        framed
            .send(AmiAction::login(&self.config.username, &self.config.secret))
            .await?;

        let heartbeat_period = self.config.heartbeat_interval().max(Duration::from_secs(1));
        let mut heartbeat = interval_at(Instant::now() + heartbeat_period, heartbeat_period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_read = Instant::now();

        loop {
            let authenticated = self.shared.lock().state.is_authenticated();
            // Once pings are flowing a reply is due at least once per period
            let idle_limit = if authenticated {
                socket_timeout + heartbeat_period
            } else {
                socket_timeout
            };

            tokio::select! {
                frame = framed.next() => {
                    let message = match frame {
                        Some(result) => result?,
                        None => return Err(AmiError::ConnectionClosed),
                    };
                    last_read = Instant::now();
                    self.handle_message(message)?;
                }
                Some(outbound) = outbound_rx.recv() => {
                    let name = outbound.action.name().to_string();
                    match framed.send(outbound.action).await {
                        Ok(()) => {
                            debug!(connection_id = self.id, action = %name, "Action sent");
                            let _ = outbound.ack.send(Ok(()));
                        }
                        Err(e) => {
                            let _ = outbound.ack.send(Err(AmiError::NotConnected(self.id)));
                            return Err(e);
                        }
                    }
                }
                _ = heartbeat.tick(), if authenticated => {
                    debug!(connection_id = self.id, "Sending heartbeat ping");
                    framed.send(AmiAction::ping()).await?;
                }
                _ = sleep_until(last_read + idle_limit) => {
                    return Err(AmiError::Timeout(idle_limit));
                }
            }
        }
    }

    fn handle_message(&mut self, message: AmiMessage) -> AmiResult<()> {
        let state = {
            let mut shared = self.shared.lock();
            shared.touch();
            shared.state
        };

        if message.is_event() {
            self.emit(SignalKind::Event(message));
            return Ok(());
        }

        if state.is_authenticated() {
            self.emit(SignalKind::Response(message));
            return Ok(());
        }

        if message.is_auth_accepted() {
            {
                let mut shared = self.shared.lock();
                shared.state = shared.state.login_accepted()?;
                shared.retrying = false;
            }

            info!(
                connection_id = self.id,
                generation = self.generation,
                address = %self.config.address(),
                "✅ Authenticated to AMI"
            );
            self.emit(SignalKind::Authenticated);

            if let Some(ready) = self.ready.take() {
                let _ = ready.send(Ok(()));
            }
            return Ok(());
        }

        if message.is_error() {
            let reason = message.message().unwrap_or("Authentication failed");
            return Err(AmiError::LoginRejected(reason.to_string()));
        }

        debug!(connection_id = self.id, %message, "Ignoring pre-login response");
        Ok(())
    }

    fn emit(&self, kind: SignalKind) {
        let _ = self.signals.send(ConnectionSignal {
            slot: self.id,
            generation: self.generation,
            kind,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> (AmiConnection, mpsc::UnboundedReceiver<ConnectionSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = Arc::new(AmiConfig::new("127.0.0.1", 5038, "admin", "secret"));
        (AmiConnection::new(1, 7, config, tx), rx)
    }

    #[tokio::test]
    async fn test_new_connection_is_disconnected() {
        let (conn, _rx) = connection();

        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(!conn.is_healthy());
        assert!(!conn.in_retry_cycle());

        let status = conn.status();
        assert_eq!(status.id, 1);
        assert_eq!(status.generation, 7);
        assert!(!status.connected);
        assert!(status.last_activity.is_none());
    }

    #[tokio::test]
    async fn test_send_action_without_socket_fails_fast() {
        let (conn, _rx) = connection();

        let result = conn.send_action(AmiAction::ping()).await;
        assert!(matches!(result, Err(AmiError::NotConnected(1))));
    }

    #[tokio::test]
    async fn test_disconnect_before_connect() {
        let (conn, _rx) = connection();
        conn.disconnect().await;
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_status_serializes_camel_case() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let config = Arc::new(AmiConfig::new("127.0.0.1", 5038, "admin", "secret"));
        let conn = AmiConnection::new(0, 0, config, tx);

        let json = serde_json::to_value(conn.status()).unwrap();
        assert_eq!(json["reconnectAttempts"], 0);
        assert_eq!(json["lastActivity"], serde_json::Value::Null);
        assert_eq!(json["state"], "disconnected");
    }
}
