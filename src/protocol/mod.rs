//! Action grammar: the protocol between the reasoning service and the loop.
//!
//! The reasoning service replies in free text; [`parse_reply`] turns that
//! text into a typed [`Action`] or a structured parse failure. The tool
//! vocabulary is closed: anything outside it is an error, never a guess.

mod action;
mod parser;

pub use action::{Action, ToolKind};
pub use parser::{ParsedReply, parse_reply};
