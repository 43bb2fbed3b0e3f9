//! UCI command encoding and parsing.

use crate::UciError;

/// Commands sent from GUI to engine.
#[derive(Debug, Clone, PartialEq)]
pub enum GuiCommand {
    /// Initialize UCI mode.
    Uci,
    /// Toggle engine debug output.
    Debug(bool),
    /// Check if engine is ready.
    IsReady,
    /// Set an engine option. Button options carry no value.
    SetOption { name: String, value: Option<String> },
    /// The next position belongs to a new game.
    UciNewGame,
    /// Set up position.
    Position {
        fen: Option<String>,
        moves: Vec<String>,
    },
    /// Start calculating.
    Go(GoOptions),
    /// Stop calculating.
    Stop,
    /// The opponent played the expected ponder move.
    PonderHit,
    /// Quit the engine.
    Quit,
    /// Unknown command (for forward compatibility).
    Unknown(String),
}

/// Options for the `go` command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GoOptions {
    /// Search for exactly this time in milliseconds.
    pub movetime: Option<u64>,
    /// Search to this depth.
    pub depth: Option<u32>,
    /// White time remaining in milliseconds.
    pub wtime: Option<u64>,
    /// Black time remaining in milliseconds.
    pub btime: Option<u64>,
    /// White increment per move in milliseconds.
    pub winc: Option<u64>,
    /// Black increment per move in milliseconds.
    pub binc: Option<u64>,
    /// Moves to go until next time control.
    pub movestogo: Option<u32>,
    /// Search indefinitely until `stop`.
    pub infinite: bool,
    /// Search in ponder mode.
    pub ponder: bool,
}

impl GoOptions {
    /// Depth-bounded search.
    pub fn depth(depth: u32) -> Self {
        Self {
            depth: Some(depth),
            ..Self::default()
        }
    }

    fn to_uci(&self) -> String {
        let mut parts = vec!["go".to_string()];
        if self.ponder {
            parts.push("ponder".to_string());
        }
        let numeric = [
            ("wtime", self.wtime),
            ("btime", self.btime),
            ("winc", self.winc),
            ("binc", self.binc),
            ("movestogo", self.movestogo.map(u64::from)),
            ("depth", self.depth.map(u64::from)),
            ("movetime", self.movetime),
        ];
        for (key, value) in numeric {
            if let Some(v) = value {
                parts.push(format!("{} {}", key, v));
            }
        }
        if self.infinite {
            parts.push("infinite".to_string());
        }
        parts.join(" ")
    }
}

impl GuiCommand {
    /// Format the command as a single protocol line (no trailing newline).
    pub fn to_uci(&self) -> String {
        match self {
            GuiCommand::Uci => "uci".to_string(),
            GuiCommand::Debug(on) => format!("debug {}", if *on { "on" } else { "off" }),
            GuiCommand::IsReady => "isready".to_string(),
            GuiCommand::SetOption { name, value } => match value {
                Some(v) => format!("setoption name {} value {}", name, v),
                None => format!("setoption name {}", name),
            },
            GuiCommand::UciNewGame => "ucinewgame".to_string(),
            GuiCommand::Position { fen, moves } => {
                let mut line = match fen {
                    Some(f) => format!("position fen {}", f),
                    None => "position startpos".to_string(),
                };
                if !moves.is_empty() {
                    line.push_str(" moves ");
                    line.push_str(&encode_moves(moves));
                }
                line
            }
            GuiCommand::Go(opts) => opts.to_uci(),
            GuiCommand::Stop => "stop".to_string(),
            GuiCommand::PonderHit => "ponderhit".to_string(),
            GuiCommand::Quit => "quit".to_string(),
            GuiCommand::Unknown(raw) => raw.clone(),
        }
    }

    /// Parse a UCI command string.
    pub fn parse(input: &str) -> Result<Self, UciError> {
        let input = input.trim();
        let mut parts = input.split_whitespace();

        let cmd = parts.next().unwrap_or("");

        match cmd {
            "uci" => Ok(GuiCommand::Uci),
            "debug" => Ok(GuiCommand::Debug(parts.next() != Some("off"))),
            "isready" => Ok(GuiCommand::IsReady),
            "setoption" => Self::parse_setoption(parts),
            "ucinewgame" => Ok(GuiCommand::UciNewGame),
            "stop" => Ok(GuiCommand::Stop),
            "ponderhit" => Ok(GuiCommand::PonderHit),
            "quit" => Ok(GuiCommand::Quit),
            "position" => Self::parse_position(parts),
            "go" => Self::parse_go(parts),
            "" => Ok(GuiCommand::Unknown(String::new())),
            _ => Ok(GuiCommand::Unknown(input.to_string())),
        }
    }

    fn parse_setoption<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        if parts.next() != Some("name") {
            return Err(UciError::ParseError(
                "Expected 'name' after 'setoption'".to_string(),
            ));
        }

        // Option names may contain spaces ("Skill Level"), so split on the keyword.
        let rest: Vec<&str> = parts.collect();
        let (name, value) = match rest.iter().position(|&s| s == "value") {
            Some(idx) => (rest[..idx].join(" "), Some(rest[idx + 1..].join(" "))),
            None => (rest.join(" "), None),
        };

        if name.is_empty() {
            return Err(UciError::ParseError("Missing option name".to_string()));
        }

        Ok(GuiCommand::SetOption { name, value })
    }

    fn parse_position<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        let tokens: Vec<&str> = parts.collect();
        let (setup, moves) = match tokens.iter().position(|&t| t == "moves") {
            Some(idx) => (&tokens[..idx], &tokens[idx + 1..]),
            None => (&tokens[..], &tokens[tokens.len()..]),
        };

        let fen = match setup.split_first() {
            Some((&"startpos", _)) => None,
            Some((&"fen", fields)) if !fields.is_empty() => Some(fields.join(" ")),
            Some((&"fen", _)) => return Err(UciError::ParseError("Empty FEN".to_string())),
            Some((other, _)) => {
                return Err(UciError::ParseError(format!(
                    "Expected 'startpos' or 'fen', got '{}'",
                    other
                )))
            }
            None => return Err(UciError::ParseError("Expected 'startpos' or 'fen'".to_string())),
        };

        Ok(GuiCommand::Position {
            fen,
            moves: moves.iter().map(|m| m.to_string()).collect(),
        })
    }

    fn parse_go<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        let mut opts = GoOptions::default();

        while let Some(key) = parts.next() {
            match key {
                "infinite" => opts.infinite = true,
                "ponder" => opts.ponder = true,
                "depth" => opts.depth = parts.next().and_then(|v| v.parse().ok()),
                "movestogo" => opts.movestogo = parts.next().and_then(|v| v.parse().ok()),
                "movetime" | "wtime" | "btime" | "winc" | "binc" => {
                    let value = parts.next().and_then(|v| v.parse().ok());
                    let slot = match key {
                        "movetime" => &mut opts.movetime,
                        "wtime" => &mut opts.wtime,
                        "btime" => &mut opts.btime,
                        "winc" => &mut opts.winc,
                        _ => &mut opts.binc,
                    };
                    *slot = value;
                }
                _ => {}
            }
        }

        Ok(GuiCommand::Go(opts))
    }
}

/// Join a move history into the form used after `position ... moves`.
pub fn encode_moves<S: AsRef<str>>(moves: &[S]) -> String {
    moves
        .iter()
        .map(|m| m.as_ref())
        .collect::<Vec<&str>>()
        .join(" ")
}

/// Whether `token` is a move in coordinate notation (`e2e4`, `a7a8q`).
pub fn is_coordinate_move(token: &str) -> bool {
    let b = token.as_bytes();
    let square = |file: u8, rank: u8| (b'a'..=b'h').contains(&file) && (b'1'..=b'8').contains(&rank);
    match b.len() {
        4 => square(b[0], b[1]) && square(b[2], b[3]),
        5 => square(b[0], b[1]) && square(b[2], b[3]) && matches!(b[4], b'q' | b'r' | b'b' | b'n'),
        _ => false,
    }
}
