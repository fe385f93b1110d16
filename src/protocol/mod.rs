//! # Wire Protocol
//!
//! The board controller speaks newline-delimited JSON at 9600 baud.
//!
//! ## Inbound (device → app)
//!
//! ```json
//! {"type":"board","message":"X|O| \n |X| \nO| |X"}
//! {"type":"game_status","message":"Player O's turn"}
//! ```
//!
//! `type` is one of `info`, `board`, `game_status`, `result`, `error`, `ai_move`,
//! `game_mode`. The `message` payload is opaque here; interpreting it (board grid,
//! turn indicator) is the presentation layer's job.
//!
//! ## Outbound (app → device)
//!
//! ```json
//! {"command":"PLAY","position":4}
//! {"command":"MODE","mode":1}
//! {"command":"RESET"}
//! ```
//!
//! Board legality is never checked on this side; the device owns the rules.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Discriminator of an inbound envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    Info,
    Board,
    GameStatus,
    GameResult,
    Error,
    AiMove,
    GameMode,
}

impl EnvelopeKind {
    pub const ALL: [EnvelopeKind; 7] = [
        EnvelopeKind::Info,
        EnvelopeKind::Board,
        EnvelopeKind::GameStatus,
        EnvelopeKind::GameResult,
        EnvelopeKind::Error,
        EnvelopeKind::AiMove,
        EnvelopeKind::GameMode,
    ];

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_tag() == tag)
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            EnvelopeKind::Info => "info",
            EnvelopeKind::Board => "board",
            EnvelopeKind::GameStatus => "game_status",
            EnvelopeKind::GameResult => "result",
            EnvelopeKind::Error => "error",
            EnvelopeKind::AiMove => "ai_move",
            EnvelopeKind::GameMode => "game_mode",
        }
    }
}

impl std::fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// A tagged message from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub kind: EnvelopeKind,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unrecognized envelope type '{0}'")]
    UnknownType(String),
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    message: String,
}

impl Envelope {
    pub fn new(kind: EnvelopeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Parse one inbound line.
    pub fn parse(line: &str) -> Result<Self, EnvelopeError> {
        let raw: RawEnvelope = serde_json::from_str(line)?;
        let kind = EnvelopeKind::from_tag(&raw.kind).ok_or(EnvelopeError::UnknownType(raw.kind))?;
        Ok(Envelope {
            kind,
            message: raw.message,
        })
    }
}

/// Highest board cell index.
pub const MAX_POSITION: u8 = 8;

/// Who plays whom; the numeric value is what MODE carries on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    ManVsAi = 0,
    ManVsMan = 1,
    AiVsAi = 2,
}

impl GameMode {
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(GameMode::ManVsAi),
            1 => Some(GameMode::ManVsMan),
            2 => Some(GameMode::AiVsAi),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GameMode::ManVsAi => "Man vs AI",
            GameMode::ManVsMan => "Man vs Man",
            GameMode::AiVsAi => "AI vs AI",
        }
    }
}

/// A command for the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "UPPERCASE")]
pub enum Command {
    Play { position: u8 },
    Reset,
    Mode { mode: u8 },
    Save,
    Load,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid command: {0}")]
    Invalid(#[from] serde_json::Error),

    #[error("position {0} out of range (0-8)")]
    PositionOutOfRange(u8),

    #[error("mode {0} out of range (0-2)")]
    ModeOutOfRange(u8),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Play { .. } => "PLAY",
            Command::Reset => "RESET",
            Command::Mode { .. } => "MODE",
            Command::Save => "SAVE",
            Command::Load => "LOAD",
        }
    }

    /// Parameter range check. Move legality is the device's business.
    pub fn validate(&self) -> Result<(), CommandError> {
        match *self {
            Command::Play { position } if position > MAX_POSITION => {
                Err(CommandError::PositionOutOfRange(position))
            }
            Command::Mode { mode } if GameMode::from_wire(mode).is_none() => {
                Err(CommandError::ModeOutOfRange(mode))
            }
            _ => Ok(()),
        }
    }

    /// Parse and validate a JSON command as sent by the presentation layer.
    pub fn from_json(json: &str) -> Result<Self, CommandError> {
        let cmd: Command = serde_json::from_str(json)?;
        cmd.validate()?;
        Ok(cmd)
    }

    /// Single-line JSON encoding for the wire (no delimiter).
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
