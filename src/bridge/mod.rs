//! # UI Bridge
//!
//! The only surface the presentation layer sees. It has exactly four operations:
//!
//! | operation | direction |
//! |-----------|-----------|
//! | [`UiBridge::send_command`] | UI → device, fire-and-forget |
//! | [`UiBridge::on_data`] | device → UI, every routed envelope plus alerts and notices |
//! | [`UiBridge::on_connection_status`] | link → UI, current status then every change |
//! | [`UiBridge::check_connection_status`] | direct query of the current status |
//!
//! No transport handle crosses this boundary. A single pump task owns the inbound line
//! stream and the outbound command queue, so envelopes are published in arrival order
//! and commands are written in call order.
//!
//! ```rust,no_run
//! # async fn demo(bridge: boardlink::bridge::UiBridge) {
//! use boardlink::bridge::DataEvent;
//!
//! let mut data = bridge.on_data();
//! bridge.send_command(r#"{"command":"PLAY","position":4}"#);
//! while let Some(event) = data.recv().await {
//!     if let DataEvent::Envelope(env) = event {
//!         println!("{}: {}", env.kind, env.message);
//!     }
//! }
//! # }
//! ```

pub mod router;

pub use router::{route_line, Discard, MessageRouter, Notice, Routed};

use log::{debug, info};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::events::{Broadcaster, Subscription};
use crate::metrics::LinkMetrics;
use crate::protocol::{Command, Envelope};
use crate::serial::LinkHandle;

/// Everything delivered on the data channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataEvent {
    Envelope(Envelope),
    /// Message of an `error` envelope from the device.
    Alert(String),
    Notice(Notice),
}

#[derive(Clone)]
pub struct UiBridge {
    link: LinkHandle,
    data: Arc<Broadcaster<DataEvent>>,
    commands: mpsc::UnboundedSender<String>,
}

impl std::fmt::Debug for UiBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiBridge")
            .field("connected", &self.check_connection_status())
            .finish()
    }
}

impl UiBridge {
    /// Start the bridge pump over the link's inbound line stream. The pump ends once
    /// every clone of the returned bridge is dropped.
    pub fn start(
        link: LinkHandle,
        lines: mpsc::UnboundedReceiver<String>,
        metrics: Arc<LinkMetrics>,
    ) -> (Self, JoinHandle<()>) {
        let data = Arc::new(Broadcaster::new());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let router = MessageRouter::new(link.clone(), metrics);
        let task = tokio::spawn(pump(router, lines, cmd_rx, data.clone()));
        let bridge = UiBridge {
            link,
            data,
            commands: cmd_tx,
        };
        (bridge, task)
    }

    /// Queue a JSON command for the device. Problems come back as
    /// [`DataEvent::Notice`] on the data channel.
    pub fn send_command(&self, json: &str) {
        if self.commands.send(json.to_string()).is_err() {
            self.data.publish(DataEvent::Notice(Notice::NotConnected));
        }
    }

    pub fn on_data(&self) -> Subscription<DataEvent> {
        self.data.subscribe()
    }

    /// Current status first, then every change.
    pub fn on_connection_status(&self) -> Subscription<bool> {
        self.link.subscribe_status()
    }

    pub fn check_connection_status(&self) -> bool {
        self.link.is_connected()
    }
}

async fn pump(
    router: MessageRouter,
    mut lines: mpsc::UnboundedReceiver<String>,
    mut commands: mpsc::UnboundedReceiver<String>,
    data: Arc<Broadcaster<DataEvent>>,
) {
    let mut lines_open = true;
    loop {
        tokio::select! {
            line = lines.recv(), if lines_open => match line {
                Some(line) => match router.route(&line) {
                    Routed::Data(env) => data.publish(DataEvent::Envelope(env)),
                    Routed::Alert(msg) => {
                        info!("Device reported error: {}", msg);
                        data.publish(DataEvent::Alert(msg));
                    }
                    Routed::Discarded(_) => {}
                },
                None => {
                    debug!("Inbound line stream ended");
                    lines_open = false;
                }
            },
            json = commands.recv() => match json {
                Some(json) => {
                    if let Err(notice) = send(&router, &json).await {
                        data.publish(DataEvent::Notice(notice));
                    }
                }
                None => break,
            },
        }
    }
    debug!("Bridge pump stopped");
}

async fn send(router: &MessageRouter, json: &str) -> Result<(), Notice> {
    let cmd = Command::from_json(json).map_err(|e| Notice::InvalidCommand(e.to_string()))?;
    router.dispatch(&cmd).await
}
