//! Link lifecycle: the single owner of the serial connection.
//!
//! [`LinkManager::spawn`] starts an actor task that owns the connection and serializes
//! everything that can change it: commands from [`LinkHandle`]s, outcomes of connect
//! attempts, events from the reader pump, and the reconnect poll.
//!
//! ```text
//!  Closed ──connect──▶ Opening ──opened──▶ Open ──close/EOF──▶ Closed
//!                         │                  │
//!                         └──open error──▶ Failed ◀──I/O error─┘
//!  Closed / Failed ──(next poll tick)──▶ Opening
//! ```
//!
//! Blocking work (enumeration, open, read) runs on the tokio blocking pool. A connect
//! request while an attempt is in flight is ignored, so at most one attempt is ever
//! outstanding. The reconnect poll is level-triggered at a fixed interval with no
//! backoff: an absent board is looked for every [`RECONNECT_INTERVAL`], forever.
//!
//! Connection status is published on a stateful [`Broadcaster`]: every connect outcome,
//! close and explicit disconnect emits one event, and new subscribers first receive the
//! current value.

use log::{debug, error, info, warn};
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::discovery::{DeviceDescriptor, Discovery};
use super::errors::{DiscoveryError, LinkError};
use super::framer::{encode_line, Delimiter, LineFramer};
use super::{LinkHalves, LinkReader, LinkWriter, PortOpener, BAUD_RATE};
use crate::events::{Broadcaster, Subscription};
use crate::logutil::wire;
use crate::metrics::LinkMetrics;

/// Period of the reconnect poll.
pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Closed,
    Opening,
    Open,
    Failed,
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LinkState::Closed => "closed",
            LinkState::Opening => "opening",
            LinkState::Open => "open",
            LinkState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Link parameters. The application always runs with the defaults except for the
/// delimiter, which follows the configured line ending.
#[derive(Debug, Clone)]
pub struct LinkOptions {
    pub baud_rate: u32,
    pub delimiter: Delimiter,
    pub reconnect_interval: Duration,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            baud_rate: BAUD_RATE,
            delimiter: Delimiter::default(),
            reconnect_interval: RECONNECT_INTERVAL,
        }
    }
}

enum LinkCommand {
    Connect,
    Disconnect(oneshot::Sender<()>),
    Write {
        line: String,
        reply: oneshot::Sender<Result<(), LinkError>>,
    },
    State(oneshot::Sender<LinkState>),
    Shutdown(oneshot::Sender<()>),
}

enum AttemptOutcome {
    NotFound,
    DiscoveryFailed(DiscoveryError),
    OpenFailed {
        path: String,
        error: std::io::Error,
    },
    Opened {
        descriptor: DeviceDescriptor,
        halves: LinkHalves,
    },
}

enum LinkEvent {
    Attempt {
        outcome: AttemptOutcome,
        started: Instant,
    },
    Line {
        generation: u64,
        line: String,
    },
    Closed {
        generation: u64,
        error: Option<std::io::Error>,
    },
}

/// Cloneable handle to the link task.
#[derive(Clone)]
pub struct LinkHandle {
    tx: mpsc::UnboundedSender<LinkCommand>,
    status: Arc<Broadcaster<bool>>,
}

impl std::fmt::Debug for LinkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkHandle")
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl LinkHandle {
    /// Request a connect attempt now instead of waiting for the next poll tick.
    pub fn connect(&self) {
        let _ = self.tx.send(LinkCommand::Connect);
    }

    /// Close the connection if open. Always results in one status-false event.
    pub async fn disconnect(&self) {
        let (done, rx) = oneshot::channel();
        if self.tx.send(LinkCommand::Disconnect(done)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Write one line (delimiter appended by the link).
    pub async fn write_line(&self, line: impl Into<String>) -> Result<(), LinkError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(LinkCommand::Write {
                line: line.into(),
                reply,
            })
            .map_err(|_| LinkError::Stopped)?;
        rx.await.map_err(|_| LinkError::Stopped)?
    }

    pub async fn state(&self) -> LinkState {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(LinkCommand::State(tx)).is_err() {
            return LinkState::Closed;
        }
        rx.await.unwrap_or(LinkState::Closed)
    }

    /// Current connection status without a round trip to the task.
    pub fn is_connected(&self) -> bool {
        self.status.latest().unwrap_or(false)
    }

    /// Status events, starting with the current value.
    pub fn subscribe_status(&self) -> Subscription<bool> {
        self.status.subscribe()
    }
}

/// Owner of the link task; [`LinkManager::shutdown`] stops the reconnect poll and
/// closes the connection before returning.
pub struct LinkManager {
    handle: LinkHandle,
    task: JoinHandle<()>,
}

impl LinkManager {
    /// Spawn the link task on the current tokio runtime. Returns the manager and the
    /// stream of inbound lines (one entry per complete line, across reconnects).
    pub fn spawn(
        options: LinkOptions,
        discovery: Discovery,
        opener: Arc<dyn PortOpener>,
        metrics: Arc<LinkMetrics>,
    ) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (lines_tx, lines_rx) = mpsc::unbounded_channel();
        let status = Arc::new(Broadcaster::stateful(false));

        let worker = LinkWorker {
            options,
            discovery: Arc::new(discovery),
            opener,
            metrics,
            state: LinkState::Closed,
            generation: 0,
            conn: None,
            status: status.clone(),
            lines_tx,
            events_tx,
        };
        let task = tokio::spawn(worker.run(cmd_rx, events_rx));

        let handle = LinkHandle { tx: cmd_tx, status };
        (LinkManager { handle, task }, lines_rx)
    }

    pub fn handle(&self) -> LinkHandle {
        self.handle.clone()
    }

    pub async fn shutdown(self) {
        let (done, rx) = oneshot::channel();
        if self.handle.tx.send(LinkCommand::Shutdown(done)).is_ok() {
            let _ = rx.await;
        }
        if let Err(e) = self.task.await {
            warn!("Link task ended abnormally: {}", e);
        }
    }
}

struct Connection {
    generation: u64,
    path: String,
    writer: LinkWriter,
    stop: Arc<AtomicBool>,
}

struct LinkWorker {
    options: LinkOptions,
    discovery: Arc<Discovery>,
    opener: Arc<dyn PortOpener>,
    metrics: Arc<LinkMetrics>,
    state: LinkState,
    generation: u64,
    conn: Option<Connection>,
    status: Arc<Broadcaster<bool>>,
    lines_tx: mpsc::UnboundedSender<String>,
    events_tx: mpsc::UnboundedSender<LinkEvent>,
}

impl LinkWorker {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<LinkCommand>,
        mut events: mpsc::UnboundedReceiver<LinkEvent>,
    ) {
        info!(
            "Link task started ({} baud, reconnect every {:?})",
            self.options.baud_rate, self.options.reconnect_interval
        );
        // First tick fires immediately and performs the initial connect.
        let mut poll = tokio::time::interval(self.options.reconnect_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = poll.tick() => self.on_tick(),
                cmd = commands.recv() => match cmd {
                    Some(cmd) => {
                        if !self.on_command(cmd) {
                            break;
                        }
                    }
                    None => {
                        debug!("All link handles dropped");
                        self.close_for_shutdown();
                        break;
                    }
                },
                Some(event) = events.recv() => self.on_event(event),
            }
        }
        info!("Link task stopped");
    }

    fn on_tick(&mut self) {
        match self.state {
            LinkState::Open => {}
            LinkState::Opening => {
                debug!("Reconnect poll: attempt already in flight");
                self.metrics.inc_connect_skipped();
            }
            LinkState::Closed | LinkState::Failed => {
                debug!("Reconnect poll: link {}, attempting to connect", self.state);
                self.start_attempt();
            }
        }
    }

    /// Returns `false` once the task should stop.
    fn on_command(&mut self, cmd: LinkCommand) -> bool {
        match cmd {
            LinkCommand::Connect => match self.state {
                LinkState::Open => debug!("Connect requested while already open"),
                LinkState::Opening => {
                    debug!("Connect requested while an attempt is in flight");
                    self.metrics.inc_connect_skipped();
                }
                LinkState::Closed | LinkState::Failed => self.start_attempt(),
            },
            LinkCommand::Disconnect(done) => {
                self.disconnect();
                let _ = done.send(());
            }
            LinkCommand::Write { line, reply } => {
                let _ = reply.send(self.write(&line));
            }
            LinkCommand::State(reply) => {
                let _ = reply.send(self.state);
            }
            LinkCommand::Shutdown(done) => {
                self.close_for_shutdown();
                let _ = done.send(());
                return false;
            }
        }
        true
    }

    fn start_attempt(&mut self) {
        self.state = LinkState::Opening;
        self.metrics.inc_connect_attempt();
        let discovery = self.discovery.clone();
        let opener = self.opener.clone();
        let baud_rate = self.options.baud_rate;
        let events = self.events_tx.clone();
        let started = Instant::now();
        tokio::task::spawn_blocking(move || {
            let outcome = attempt(&discovery, opener.as_ref(), baud_rate);
            let _ = events.send(LinkEvent::Attempt { outcome, started });
        });
    }

    fn on_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Attempt { outcome, started } => self.on_attempt(outcome, started),
            LinkEvent::Line { generation, line } => {
                if self.conn.as_ref().map(|c| c.generation) != Some(generation) {
                    return;
                }
                debug!("<- {}", wire(&line));
                let _ = self.lines_tx.send(line);
            }
            LinkEvent::Closed { generation, error } => {
                let current = self.conn.as_ref().map(|c| c.generation);
                if current != Some(generation) {
                    debug!("Ignoring close from stale connection #{}", generation);
                    return;
                }
                if let Some(conn) = self.conn.take() {
                    let path = conn.path.clone();
                    teardown(conn);
                    self.metrics.inc_unexpected_close();
                    match error {
                        Some(e) => {
                            warn!("Serial link on {} failed: {}", path, e);
                            self.state = LinkState::Failed;
                        }
                        None => {
                            warn!("Serial link on {} closed by device", path);
                            self.state = LinkState::Closed;
                        }
                    }
                    self.status.publish(false);
                }
            }
        }
    }

    fn on_attempt(&mut self, outcome: AttemptOutcome, started: Instant) {
        if self.state != LinkState::Opening {
            debug!("Discarding connect outcome; link is {}", self.state);
            return;
        }
        match outcome {
            AttemptOutcome::NotFound => {
                warn!("Board not found; next attempt in {:?}", self.options.reconnect_interval);
                self.state = LinkState::Closed;
                self.status.publish(false);
            }
            AttemptOutcome::DiscoveryFailed(e) => {
                error!("Serial discovery failed: {}", e);
                self.state = LinkState::Closed;
                self.status.publish(false);
            }
            AttemptOutcome::OpenFailed { path, error } => {
                error!("Failed to open serial port {}: {}", path, error);
                self.metrics.inc_open_failure();
                self.state = LinkState::Failed;
                self.status.publish(false);
            }
            AttemptOutcome::Opened { descriptor, halves } => {
                self.generation += 1;
                let generation = self.generation;
                let stop = Arc::new(AtomicBool::new(false));
                let LinkHalves { reader, writer } = halves;

                let delimiter = self.options.delimiter;
                let events = self.events_tx.clone();
                let pump_stop = stop.clone();
                tokio::task::spawn_blocking(move || {
                    pump_reader(reader, delimiter, generation, pump_stop, events)
                });

                info!(
                    "Board connected on {} ({} baud, connection #{})",
                    descriptor.path, self.options.baud_rate, generation
                );
                self.conn = Some(Connection {
                    generation,
                    path: descriptor.path,
                    writer,
                    stop,
                });
                self.state = LinkState::Open;
                self.metrics.observe_open(started);
                self.status.publish(true);
            }
        }
    }

    fn disconnect(&mut self) {
        if let Some(conn) = self.conn.take() {
            info!("Disconnecting from {}", conn.path);
            teardown(conn);
            self.state = LinkState::Closed;
        }
        self.status.publish(false);
    }

    fn close_for_shutdown(&mut self) {
        if let Some(conn) = self.conn.take() {
            info!("Closing {} for shutdown", conn.path);
            teardown(conn);
            self.state = LinkState::Closed;
            self.status.publish(false);
        }
    }

    fn write(&mut self, line: &str) -> Result<(), LinkError> {
        let Some(conn) = self.conn.as_mut() else {
            return Err(LinkError::NotConnected);
        };
        let bytes = encode_line(line, self.options.delimiter);
        let result = conn
            .writer
            .write_all(&bytes)
            .and_then(|_| conn.writer.flush());
        match result {
            Ok(()) => {
                debug!("-> {}", wire(line));
                Ok(())
            }
            Err(e) => {
                warn!("Write to {} failed: {}", conn.path, e);
                Err(LinkError::Write(e))
            }
        }
    }
}

/// Discovery then open; runs on the blocking pool.
fn attempt(discovery: &Discovery, opener: &dyn PortOpener, baud_rate: u32) -> AttemptOutcome {
    let descriptor = match discovery.discover() {
        Ok(Some(d)) => d,
        Ok(None) => return AttemptOutcome::NotFound,
        Err(e) => return AttemptOutcome::DiscoveryFailed(e),
    };
    match opener.open(&descriptor.path, baud_rate) {
        Ok(halves) => AttemptOutcome::Opened { descriptor, halves },
        Err(error) => AttemptOutcome::OpenFailed {
            path: descriptor.path,
            error,
        },
    }
}

/// Stop the reader pump and release the write half. Close errors are not fatal.
fn teardown(mut conn: Connection) {
    conn.stop.store(true, Ordering::Release);
    if let Err(e) = conn.writer.flush() {
        warn!("Error while closing {}: {}", conn.path, e);
    }
}

/// Blocking read loop for one connection. Exits on stop, EOF, hard I/O error, or
/// when the link task is gone.
fn pump_reader(
    mut reader: LinkReader,
    delimiter: Delimiter,
    generation: u64,
    stop: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<LinkEvent>,
) {
    let mut framer = LineFramer::new(delimiter);
    let mut buf = [0u8; 256];
    loop {
        if stop.load(Ordering::Acquire) || events.is_closed() {
            return;
        }
        match reader.read(&mut buf) {
            Ok(0) => {
                let _ = events.send(LinkEvent::Closed {
                    generation,
                    error: None,
                });
                return;
            }
            Ok(n) => {
                for line in framer.push(&buf[..n]) {
                    if events.send(LinkEvent::Line { generation, line }).is_err() {
                        return;
                    }
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                let _ = events.send(LinkEvent::Closed {
                    generation,
                    error: Some(e),
                });
                return;
            }
        }
    }
}
