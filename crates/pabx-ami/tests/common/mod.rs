//! AMI Switch Simulator for Integration Testing
//!
//! A scripted manager endpoint on a loopback port. It greets every client
//! with the banner, answers Login/Ping/Logoff the way the switch does, echoes
//! `ActionID` on every other action and can push events or drop sessions on
//! demand. Every action it receives is recorded with its session number.

#![allow(dead_code)]

use futures::StreamExt;
use pabx_ami::{AmiCodec, AmiMessage};
use pabx_core::config::AmiConfig;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;

pub const BANNER: &str = "Asterisk Call Manager/5.0.1\r\n";

enum SessionCommand {
    Write(String),
    Close,
}

#[derive(Default)]
struct SimState {
    reject_logins: AtomicBool,
    next_session: AtomicUsize,
    sessions: Mutex<HashMap<usize, mpsc::UnboundedSender<SessionCommand>>>,
    actions: Mutex<Vec<(usize, String)>>,
}

pub struct AmiSimulator {
    pub addr: SocketAddr,
    state: Arc<SimState>,
    accept_task: JoinHandle<()>,
}

impl AmiSimulator {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(SimState::default());

        let accept_state = Arc::clone(&state);
        let accept_task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let session = accept_state.next_session.fetch_add(1, Ordering::SeqCst);
                let (tx, rx) = mpsc::unbounded_channel();
                accept_state.sessions.lock().unwrap().insert(session, tx);
                tokio::spawn(run_session(session, stream, rx, Arc::clone(&accept_state)));
            }
        });

        Self {
            addr,
            state,
            accept_task,
        }
    }

    /// Client config pointing at this simulator with short timers
    pub fn config(&self, pool_size: usize) -> AmiConfig {
        let mut config = AmiConfig::new("127.0.0.1", self.addr.port(), "admin", "amp111");
        config.pool_size = pool_size;
        config.reconnect_base_delay_ms = 50;
        config.max_reconnect_attempts = 3;
        config.socket_timeout_secs = 5;
        config
    }

    pub fn reject_logins(&self, reject: bool) {
        self.state.reject_logins.store(reject, Ordering::SeqCst);
    }

    /// Write an event block to every open session
    pub fn push_event(&self, fields: &[(&str, &str)]) {
        let block = to_block(fields);
        for tx in self.state.sessions.lock().unwrap().values() {
            let _ = tx.send(SessionCommand::Write(block.clone()));
        }
    }

    /// Drop every open session
    pub fn kill_all(&self) {
        let sessions: Vec<_> = self.state.sessions.lock().unwrap().drain().collect();
        for (_, tx) in sessions {
            let _ = tx.send(SessionCommand::Close);
        }
    }

    pub fn kill_session(&self, session: usize) {
        if let Some(tx) = self.state.sessions.lock().unwrap().remove(&session) {
            let _ = tx.send(SessionCommand::Close);
        }
    }

    pub fn open_sessions(&self) -> Vec<usize> {
        let mut sessions: Vec<usize> = self.state.sessions.lock().unwrap().keys().copied().collect();
        sessions.sort_unstable();
        sessions
    }

    pub fn actions(&self) -> Vec<(usize, String)> {
        self.state.actions.lock().unwrap().clone()
    }

    /// Sessions that received an action named `name`, in arrival order
    pub fn sessions_for(&self, name: &str) -> Vec<usize> {
        self.actions()
            .into_iter()
            .filter(|(_, action)| action == name)
            .map(|(session, _)| session)
            .collect()
    }
}

impl Drop for AmiSimulator {
    fn drop(&mut self) {
        self.accept_task.abort();
        self.kill_all();
    }
}

fn to_block(fields: &[(&str, &str)]) -> String {
    let mut block = String::new();
    for (key, value) in fields {
        block.push_str(&format!("{}: {}\r\n", key, value));
    }
    block.push_str("\r\n");
    block
}

fn reply(state: &SimState, action: &AmiMessage) -> (String, bool) {
    let name = action.get("Action").unwrap_or_default();
    let action_id = action.action_id().unwrap_or_default();

    match name {
        "Login" if state.reject_logins.load(Ordering::SeqCst) => (
            to_block(&[("Response", "Error"), ("Message", "Authentication failed")]),
            false,
        ),
        "Login" => (
            to_block(&[("Response", "Success"), ("Message", "Authentication accepted")]),
            false,
        ),
        "Ping" => (
            to_block(&[
                ("Response", "Success"),
                ("ActionID", action_id),
                ("Ping", "Pong"),
            ]),
            false,
        ),
        "Logoff" => (
            to_block(&[("Response", "Goodbye"), ("Message", "Thanks for all the fish.")]),
            true,
        ),
        _ => (
            to_block(&[("Response", "Success"), ("ActionID", action_id)]),
            false,
        ),
    }
}

async fn run_session(
    session: usize,
    stream: TcpStream,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    state: Arc<SimState>,
) {
    let (read, mut write) = stream.into_split();
    let mut reader = FramedRead::new(read, AmiCodec::new());

    if write.write_all(BANNER.as_bytes()).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            frame = reader.next() => {
                let Some(Ok(action)) = frame else { break };
                let name = action.get("Action").unwrap_or_default().to_string();
                state.actions.lock().unwrap().push((session, name));

                let (response, close) = reply(&state, &action);
                if write.write_all(response.as_bytes()).await.is_err() || close {
                    break;
                }
            }
            command = commands.recv() => match command {
                Some(SessionCommand::Write(block)) => {
                    if write.write_all(block.as_bytes()).await.is_err() {
                        break;
                    }
                }
                Some(SessionCommand::Close) | None => break,
            },
        }
    }

    state.sessions.lock().unwrap().remove(&session);
}

/// Poll `condition` every 10 ms until it holds or `limit` elapses
pub async fn wait_for(limit: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
