//! Inbound line classification and outbound command dispatch.
use log::{debug, warn};
use std::sync::Arc;

use crate::logutil::wire;
use crate::metrics::LinkMetrics;
use crate::protocol::{Command, Envelope, EnvelopeError, EnvelopeKind};
use crate::serial::{LinkError, LinkHandle};

/// Why a line never reached the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discard {
    Malformed,
    UnknownType(String),
}

/// Where an inbound line goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    Data(Envelope),
    /// `error` envelopes, surfaced to the user separately from regular data.
    Alert(String),
    Discarded(Discard),
}

/// Classify one inbound line. Never fails; bad input is logged and discarded.
pub fn route_line(line: &str) -> Routed {
    match Envelope::parse(line) {
        Ok(env) if env.kind == EnvelopeKind::Error => Routed::Alert(env.message),
        Ok(env) => Routed::Data(env),
        Err(EnvelopeError::Malformed(e)) => {
            warn!("Discarding malformed line ({}): {}", e, wire(line));
            Routed::Discarded(Discard::Malformed)
        }
        Err(EnvelopeError::UnknownType(kind)) => {
            debug!("Ignoring envelope with unrecognized type '{}'", kind);
            Routed::Discarded(Discard::UnknownType(kind))
        }
    }
}

/// User-facing notice produced by the bridge itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A command was dropped because the board is not connected.
    NotConnected,
    WriteFailed(String),
    InvalidCommand(String),
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::NotConnected => f.write_str("Not connected to the board"),
            Notice::WriteFailed(e) => write!(f, "Failed to send command: {}", e),
            Notice::InvalidCommand(e) => write!(f, "Invalid command: {}", e),
        }
    }
}

/// Routes lines inward and writes commands outward through the link.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    link: LinkHandle,
    metrics: Arc<LinkMetrics>,
}

impl MessageRouter {
    pub fn new(link: LinkHandle, metrics: Arc<LinkMetrics>) -> Self {
        Self { link, metrics }
    }

    /// [`route_line`] plus metrics.
    pub fn route(&self, line: &str) -> Routed {
        let routed = route_line(line);
        match &routed {
            Routed::Data(_) => self.metrics.inc_line_routed(),
            Routed::Alert(_) => self.metrics.inc_alert(),
            Routed::Discarded(_) => self.metrics.inc_line_discarded(),
        }
        routed
    }

    /// Serialize and write `cmd`. A closed link drops the command unwritten.
    pub async fn dispatch(&self, cmd: &Command) -> Result<(), Notice> {
        if !self.link.is_connected() {
            debug!("Dropping {} command: not connected", cmd.name());
            self.metrics.inc_command_dropped();
            return Err(Notice::NotConnected);
        }
        let line = cmd
            .to_line()
            .map_err(|e| Notice::InvalidCommand(e.to_string()))?;
        match self.link.write_line(line).await {
            Ok(()) => {
                self.metrics.inc_command_written();
                Ok(())
            }
            // Closed between the status check and the write.
            Err(LinkError::NotConnected) | Err(LinkError::Stopped) => {
                self.metrics.inc_command_dropped();
                Err(Notice::NotConnected)
            }
            Err(LinkError::Write(e)) => {
                self.metrics.inc_write_failure();
                Err(Notice::WriteFailed(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_payload_passes_through_untouched() {
        let line = r#"{"type":"board","message":" | | | | | | | | | "}"#;
        assert_eq!(
            route_line(line),
            Routed::Data(Envelope::new(EnvelopeKind::Board, " | | | | | | | | | "))
        );
    }

    #[test]
    fn error_type_becomes_alert() {
        assert_eq!(
            route_line(r#"{"type":"error","message":"Cell occupied"}"#),
            Routed::Alert("Cell occupied".into())
        );
    }

    #[test]
    fn garbage_and_unknown_types_are_discarded() {
        assert_eq!(
            route_line("not valid json"),
            Routed::Discarded(Discard::Malformed)
        );
        assert_eq!(route_line("[1,2]"), Routed::Discarded(Discard::Malformed));
        assert_eq!(
            route_line(r#"{"type":"debug","message":"x"}"#),
            Routed::Discarded(Discard::UnknownType("debug".into()))
        );
    }

    #[test]
    fn notice_text() {
        assert_eq!(Notice::NotConnected.to_string(), "Not connected to the board");
        assert!(Notice::WriteFailed("broken pipe".into())
            .to_string()
            .contains("broken pipe"));
    }
}
