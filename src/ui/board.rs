//! Interpretation of `board` and `game_status` payloads.
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

pub const CELLS: usize = 9;

static TURN_REGEX: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    X,
    O,
    #[default]
    Empty,
}

impl Cell {
    pub fn symbol(&self) -> char {
        match self {
            Cell::X => 'X',
            Cell::O => 'O',
            Cell::Empty => ' ',
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("expected 9 cells, found {0}")]
    CellCount(usize),
    #[error("unexpected cell content '{0}'")]
    BadCell(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Board {
    pub cells: [Cell; CELLS],
}

impl Board {
    /// Parse a board message: cells separated by `|`, rows possibly separated by
    /// newlines. Empty fragments (from `|\n` joins) are skipped and whitespace-only
    /// fragments past the ninth are treated as padding.
    pub fn parse(message: &str) -> Result<Board, BoardError> {
        let mut fragments: Vec<&str> = message
            .split(['|', '\n'])
            .filter(|f| !f.is_empty())
            .collect();
        while fragments.len() > CELLS && fragments.last().is_some_and(|f| f.trim().is_empty()) {
            fragments.pop();
        }
        if fragments.len() != CELLS {
            return Err(BoardError::CellCount(fragments.len()));
        }

        let mut board = Board::default();
        for (slot, fragment) in board.cells.iter_mut().zip(fragments) {
            *slot = match fragment.trim() {
                "X" => Cell::X,
                "O" => Cell::O,
                "" => Cell::Empty,
                other => return Err(BoardError::BadCell(other.to_string())),
            };
        }
        Ok(board)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|c| *c == Cell::Empty)
    }

    /// Three-row text grid; empty cells show their position number.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (row, chunk) in self.cells.chunks(3).enumerate() {
            if row > 0 {
                out.push_str("---+---+---\n");
            }
            let line: Vec<String> = chunk
                .iter()
                .enumerate()
                .map(|(col, cell)| match cell {
                    Cell::Empty => format!(" {} ", row * 3 + col),
                    c => format!(" {} ", c.symbol()),
                })
                .collect();
            out.push_str(&line.join("|"));
            out.push('\n');
        }
        out
    }
}

/// Letter of the player to move, from text like `"Player X's turn"`.
pub fn turn_indicator(text: &str) -> Option<char> {
    let re = TURN_REGEX
        .get_or_init(|| Regex::new(r"Player (\w)'s turn").expect("Invalid turn regex"));
    re.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().chars().next())
}
