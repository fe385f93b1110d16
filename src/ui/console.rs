//! Line-oriented terminal front end.
use anyhow::Result;
use log::debug;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::board::{turn_indicator, Board};
use crate::bridge::{DataEvent, UiBridge};
use crate::protocol::{Command, EnvelopeKind, GameMode};

pub const HELP_TEXT: &str = "\
Commands:
  play <0-8> | p <0-8>   place a mark (cells numbered left to right, top to bottom)
  reset                  start a new game
  mode <0-2>             0 = Man vs AI, 1 = Man vs Man, 2 = AI vs AI
  save | load            save or restore the game on the board
  status                 show whether the board is connected
  help                   this text
  quit                   exit";

/// One parsed line of keyboard input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Send(Command),
    Status,
    Help,
    Quit,
}

/// Parse a console line. `None` for blank or unrecognized input.
pub fn parse_input(line: &str) -> Option<ConsoleInput> {
    let mut words = line.split_whitespace();
    let verb = words.next()?.to_ascii_lowercase();
    let arg = words.next().and_then(|w| w.parse::<u8>().ok());
    let input = match verb.as_str() {
        "play" | "p" => ConsoleInput::Send(Command::Play { position: arg? }),
        "mode" | "m" => ConsoleInput::Send(Command::Mode { mode: arg? }),
        "reset" | "new" => ConsoleInput::Send(Command::Reset),
        "save" => ConsoleInput::Send(Command::Save),
        "load" => ConsoleInput::Send(Command::Load),
        "status" => ConsoleInput::Status,
        "help" | "?" => ConsoleInput::Help,
        "quit" | "exit" | "q" => ConsoleInput::Quit,
        _ => return None,
    };
    Some(input)
}

/// Text printed for one data event.
pub fn render_event(event: &DataEvent) -> String {
    match event {
        DataEvent::Envelope(env) => match env.kind {
            EnvelopeKind::Board => match Board::parse(&env.message) {
                Ok(board) if board.is_empty() => format!("New game\n{}", board.render()),
                Ok(board) => board.render(),
                Err(e) => {
                    debug!("Unparseable board ({}), showing raw text", e);
                    format!("[board] {}", env.message)
                }
            },
            EnvelopeKind::GameStatus => match turn_indicator(&env.message) {
                Some(player) => format!("{} (to move: {})", env.message, player),
                None => env.message.clone(),
            },
            EnvelopeKind::GameResult => format!("*** {} ***", env.message),
            EnvelopeKind::GameMode => {
                match env.message.trim().parse::<u8>().ok().and_then(GameMode::from_wire) {
                    Some(mode) => format!("[mode] {}", mode.label()),
                    None => format!("[mode] {}", env.message),
                }
            }
            kind => format!("[{}] {}", kind, env.message),
        },
        DataEvent::Alert(msg) => format!("!! {}", msg),
        DataEvent::Notice(notice) => format!("-- {}", notice),
    }
}

fn status_text(connected: bool) -> &'static str {
    if connected {
        "Board connected"
    } else {
        "Board disconnected"
    }
}

/// Run the console until `quit` or end of input. Uses nothing but the bridge.
pub async fn run_console(bridge: UiBridge) -> Result<()> {
    let mut data = bridge.on_data();
    let mut status = bridge.on_connection_status();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut last_status: Option<bool> = None;

    println!("{}", HELP_TEXT);
    loop {
        tokio::select! {
            line = stdin.next_line() => {
                let Some(line) = line? else { break };
                match parse_input(&line) {
                    Some(ConsoleInput::Send(cmd)) => match cmd.to_line() {
                        Ok(json) => bridge.send_command(&json),
                        Err(e) => println!("-- Invalid command: {}", e),
                    },
                    Some(ConsoleInput::Status) => {
                        println!("{}", status_text(bridge.check_connection_status()))
                    }
                    Some(ConsoleInput::Help) => println!("{}", HELP_TEXT),
                    Some(ConsoleInput::Quit) => break,
                    None if line.trim().is_empty() => {}
                    None => println!("Unknown input '{}'; type 'help'", line.trim()),
                }
            }
            Some(event) = data.recv() => println!("{}", render_event(&event)),
            Some(connected) = status.recv() => {
                if last_status != Some(connected) {
                    println!("{}", status_text(connected));
                    last_status = Some(connected);
                }
            }
        }
    }
    Ok(())
}
