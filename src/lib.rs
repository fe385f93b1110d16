//! # Boardlink - Serial Bridge for a Tic-Tac-Toe Board Controller
//!
//! Boardlink connects a terminal front end to a microcontroller that runs a
//! tic-tac-toe game (rules and AI live on the device). It finds the board on the
//! serial bus, keeps the link alive across unplugs, and moves newline-delimited JSON
//! between the board and the UI.
//!
//! ## Features
//!
//! - **Port Discovery**: explicit path, `ARDUINO_PORT`, or enumeration matched by
//!   manufacturer string or USB vendor/product id.
//! - **Self-healing Link**: a single actor owns the connection and re-attempts it every
//!   five seconds while the board is absent.
//! - **Line Protocol**: chunk-tolerant line framing with `\n` or `\r\n` delimiters.
//! - **Typed Events**: envelopes, alerts, notices and connection status delivered over
//!   subscriptions that unsubscribe on drop.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use boardlink::bridge::UiBridge;
//! use boardlink::metrics::LinkMetrics;
//! use boardlink::serial::{Discovery, LinkManager, LinkOptions, MatchPolicy, SystemPortOpener};
//!
//! #[tokio::main]
//! async fn main() {
//!     let metrics = Arc::new(LinkMetrics::new());
//!     let (manager, lines) = LinkManager::spawn(
//!         LinkOptions::default(),
//!         Discovery::system(None, MatchPolicy::default()),
//!         Arc::new(SystemPortOpener::default()),
//!         metrics.clone(),
//!     );
//!     let (bridge, _pump) = UiBridge::start(manager.handle(), lines, metrics);
//!
//!     bridge.send_command(r#"{"command":"RESET"}"#);
//!     manager.shutdown().await;
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`serial`] - discovery, line framing and the link lifecycle actor
//! - [`protocol`] - inbound envelopes and outbound commands
//! - [`bridge`] - message router and the four-operation UI bridge
//! - [`ui`] - terminal presentation layer
//! - [`events`] - publish/subscribe primitives
//! - [`config`] - configuration loading and validation
//! - [`metrics`] / [`logutil`] - link counters and log helpers
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   Console UI    │ ← Board rendering, keyboard input
//! └─────────────────┘
//!          │  send_command / on_data / on_connection_status / check_connection_status
//! ┌─────────────────┐
//! │   UI Bridge     │ ← Routing, command validation, notices
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Serial Link   │ ← Discovery, framing, reconnect poll
//! └─────────────────┘
//! ```

pub mod bridge;
pub mod config;
pub mod events;
pub mod logutil;
pub mod metrics;
pub mod protocol;
pub mod serial;
pub mod ui;
