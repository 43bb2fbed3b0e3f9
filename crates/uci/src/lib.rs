//! UCI (Universal Chess Interface) protocol library.
//!
//! This crate provides the wire-level pieces needed to drive a UCI engine
//! from the GUI side: encoding commands, classifying the engine's output
//! lines, and extracting structured search information from `info` lines.
//!
//! # Commands sent to the engine
//!
//! - `uci` - Initialize engine, get id and options
//! - `setoption name <name> value <value>` - Configure an option
//! - `ucinewgame` - Reset game state
//! - `isready` / `readyok` - Synchronization
//! - `position startpos|fen <fen> [moves <move>...]` - Set position
//! - `go [depth <d>] [movetime <ms>]` - Start search
//! - `stop` / `quit`
//!
//! # Parsing
//!
//! Engine output is parsed with a small schema-driven tokenizer (see
//! [`Schema`]): each recognized key owns the tokens up to the next
//! recognized key. [`InfoRecord`] and [`OptionDecl`] are built on top of it.

mod command;
mod info;
mod schema;

pub use command::{encode_moves, is_coordinate_move, GoOptions, GuiCommand};
pub use info::{info_schema, InfoBuilder, InfoRecord, Score, ScoreBound};
pub use schema::{parse_line, parse_scalar, parse_tokens, sublist, FieldKind, FieldValue, Record, Schema};

use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UciError {
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// An option the engine advertised during the `uci` handshake.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionDecl {
    pub name: String,
    /// `check`, `spin`, `combo`, `button` or `string`.
    pub kind: Option<String>,
    pub default: Option<String>,
    pub min: Option<i64>,
    pub max: Option<i64>,
}

fn option_schema() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::new()
            .list("name")
            .scalar("type")
            .list("default")
            .scalar("min")
            .scalar("max")
            .list("var")
    })
}

impl OptionDecl {
    /// Parse the part of an `option` line after the `option` keyword.
    fn parse(tokens: &[&str]) -> Option<Self> {
        let record = parse_tokens(tokens, option_schema());
        let name = record.list("name")?.join(" ");
        if name.is_empty() {
            return None;
        }
        Some(OptionDecl {
            name,
            kind: record.get("type").and_then(FieldValue::to_token),
            default: record.list("default").map(|d| d.join(" ")),
            min: record.int("min"),
            max: record.int("max"),
        })
    }

    fn to_uci(&self) -> String {
        let mut line = format!("option name {}", self.name);
        if let Some(ref kind) = self.kind {
            line.push_str(&format!(" type {}", kind));
        }
        if let Some(ref default) = self.default {
            line.push_str(&format!(" default {}", default));
        }
        if let Some(min) = self.min {
            line.push_str(&format!(" min {}", min));
        }
        if let Some(max) = self.max {
            line.push_str(&format!(" max {}", max));
        }
        line
    }
}

/// Messages sent from engine to GUI.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    /// Engine identification.
    Id { name: Option<String>, author: Option<String> },
    /// UCI initialization complete.
    UciOk,
    /// Engine is ready.
    ReadyOk,
    /// Search information.
    Info(InfoRecord),
    /// Best move found. `mv` is `None` when the engine has no legal move.
    BestMove { mv: Option<String>, ponder: Option<String> },
    /// Option declaration.
    Option(OptionDecl),
    /// Anything else (banners, error text such as `No such option`).
    Other(String),
}

impl EngineMessage {
    /// Classify one line of engine output.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let tokens: Vec<&str> = line.split_whitespace().collect();

        match tokens.first().copied() {
            Some("uciok") => EngineMessage::UciOk,
            Some("readyok") => EngineMessage::ReadyOk,
            Some("info") => match InfoRecord::parse(line) {
                Some(info) => EngineMessage::Info(info),
                None => EngineMessage::Other(line.to_string()),
            },
            Some("bestmove") => {
                let mv = tokens.get(1).copied().and_then(real_move);
                let ponder = match tokens.get(2) {
                    Some(&"ponder") => tokens.get(3).copied().and_then(real_move),
                    _ => None,
                };
                EngineMessage::BestMove { mv, ponder }
            }
            Some("id") if tokens.len() >= 3 => {
                let value = tokens[2..].join(" ");
                match tokens[1] {
                    "name" => EngineMessage::Id {
                        name: Some(value),
                        author: None,
                    },
                    "author" => EngineMessage::Id {
                        name: None,
                        author: Some(value),
                    },
                    _ => EngineMessage::Other(line.to_string()),
                }
            }
            Some("option") => match OptionDecl::parse(&tokens[1..]) {
                Some(decl) => EngineMessage::Option(decl),
                None => EngineMessage::Other(line.to_string()),
            },
            _ => EngineMessage::Other(line.to_string()),
        }
    }

    /// Format message for output.
    pub fn to_uci(&self) -> String {
        match self {
            EngineMessage::Id { name, author } => {
                let mut parts = Vec::new();
                if let Some(n) = name {
                    parts.push(format!("id name {}", n));
                }
                if let Some(a) = author {
                    parts.push(format!("id author {}", a));
                }
                parts.join("\n")
            }
            EngineMessage::UciOk => "uciok".to_string(),
            EngineMessage::ReadyOk => "readyok".to_string(),
            EngineMessage::Info(info) => info.to_uci(),
            EngineMessage::BestMove { mv, ponder } => {
                let mv = mv.as_deref().unwrap_or("(none)");
                match ponder {
                    Some(p) => format!("bestmove {} ponder {}", mv, p),
                    None => format!("bestmove {}", mv),
                }
            }
            EngineMessage::Option(decl) => decl.to_uci(),
            EngineMessage::Other(line) => line.clone(),
        }
    }
}

/// `(none)` and the null move `0000` both mean "no move".
fn real_move(token: &str) -> Option<String> {
    match token {
        "(none)" | "0000" => None,
        mv => Some(mv.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_readyok_and_uciok() {
        assert_eq!(EngineMessage::parse("readyok"), EngineMessage::ReadyOk);
        assert_eq!(EngineMessage::parse("uciok  \r"), EngineMessage::UciOk);
    }

    #[test]
    fn parse_bestmove_with_ponder() {
        assert_eq!(
            EngineMessage::parse("bestmove e2e4 ponder e7e5"),
            EngineMessage::BestMove {
                mv: Some("e2e4".to_string()),
                ponder: Some("e7e5".to_string())
            }
        );
    }

    #[test]
    fn parse_bestmove_without_ponder() {
        assert_eq!(
            EngineMessage::parse("bestmove g1f3"),
            EngineMessage::BestMove {
                mv: Some("g1f3".to_string()),
                ponder: None
            }
        );
    }

    #[test]
    fn parse_bestmove_none() {
        assert_eq!(
            EngineMessage::parse("bestmove (none)"),
            EngineMessage::BestMove { mv: None, ponder: None }
        );
        assert_eq!(
            EngineMessage::parse("bestmove 0000"),
            EngineMessage::BestMove { mv: None, ponder: None }
        );
        assert_eq!(
            EngineMessage::parse("bestmove"),
            EngineMessage::BestMove { mv: None, ponder: None }
        );
    }

    #[test]
    fn parse_id_lines() {
        assert_eq!(
            EngineMessage::parse("id name Stockfish 16.1"),
            EngineMessage::Id {
                name: Some("Stockfish 16.1".to_string()),
                author: None
            }
        );
        assert_eq!(
            EngineMessage::parse("id author the Stockfish developers"),
            EngineMessage::Id {
                name: None,
                author: Some("the Stockfish developers".to_string())
            }
        );
    }

    #[test]
    fn parse_option_declaration() {
        let msg = EngineMessage::parse("option name Skill Level type spin default 20 min 0 max 20");
        assert_eq!(
            msg,
            EngineMessage::Option(OptionDecl {
                name: "Skill Level".to_string(),
                kind: Some("spin".to_string()),
                default: Some("20".to_string()),
                min: Some(0),
                max: Some(20),
            })
        );
    }

    #[test]
    fn parse_option_with_empty_default() {
        let msg = EngineMessage::parse("option name Debug Log File type string default <empty>");
        match msg {
            EngineMessage::Option(decl) => {
                assert_eq!(decl.name, "Debug Log File");
                assert_eq!(decl.kind.as_deref(), Some("string"));
                assert_eq!(decl.default.as_deref(), Some("<empty>"));
                assert_eq!(decl.min, None);
            }
            other => panic!("Expected option, got {:?}", other),
        }
    }

    #[test]
    fn parse_info_message() {
        match EngineMessage::parse("info depth 3 score cp 12 pv e2e4") {
            EngineMessage::Info(info) => {
                assert_eq!(info.depth, Some(3));
                assert_eq!(info.score, Some(Score::Cp(12)));
            }
            other => panic!("Expected info, got {:?}", other),
        }
    }

    #[test]
    fn unknown_lines_are_other() {
        assert_eq!(
            EngineMessage::parse("No such option: Contempt"),
            EngineMessage::Other("No such option: Contempt".to_string())
        );
        assert_eq!(EngineMessage::parse(""), EngineMessage::Other(String::new()));
    }

    #[test]
    fn messages_format_back_to_wire() {
        let msgs = [
            "uciok",
            "readyok",
            "bestmove e2e4 ponder e7e5",
            "bestmove (none)",
            "id name Fake Engine",
            "option name Hash type spin default 16 min 1 max 33554432",
            "info depth 5 score mate 2 pv d1h5 g7g6",
        ];
        for line in msgs {
            assert_eq!(EngineMessage::parse(line).to_uci(), line);
        }
    }
}
