//! Terminal presentation layer. Everything here goes through [`crate::bridge::UiBridge`];
//! payload interpretation (board grids, whose turn it is) happens here, not in the router.

pub mod board;
pub mod console;

pub use board::{turn_indicator, Board, BoardError, Cell};
pub use console::{parse_input, render_event, run_console, ConsoleInput};
