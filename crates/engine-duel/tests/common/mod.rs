//! In-process UCI engine for driving sessions and matches in tests.
//!
//! The engine speaks just enough UCI to exercise the session: it answers
//! the handshake, rejects configured option names the way Stockfish does,
//! and plays a fixed knight shuffle unless told to mate, give up a move,
//! or hang up at a given ply.

#![allow(dead_code)]

use engine_duel::channel::LineChannel;
use engine_duel::config::EngineConfig;
use engine_duel::session::EngineSession;
use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;
use uci::{EngineMessage, GuiCommand, InfoBuilder};

/// Moves that return both sides to the start position every four plies.
pub const KNIGHT_SHUFFLE: [&str; 4] = ["g1f3", "g8f6", "f3g1", "f6g8"];

#[derive(Debug, Clone, Default)]
pub struct Script {
    pub name: String,
    /// Option names answered with `No such option`.
    pub rejected: Vec<String>,
    /// At this history length, report `score mate <n>` with the given n.
    pub mate_at: Option<(usize, i32)>,
    /// At this history length, answer `bestmove (none)` with a centipawn score.
    pub no_move_at: Option<usize>,
    /// At this history length, close the stream instead of answering `go`.
    pub hang_up_at: Option<usize>,
}

impl Script {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn rejecting(mut self, names: &[&str]) -> Self {
        self.rejected = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn mate_at(mut self, ply: usize, distance: i32) -> Self {
        self.mate_at = Some((ply, distance));
        self
    }

    pub fn no_move_at(mut self, ply: usize) -> Self {
        self.no_move_at = Some(ply);
        self
    }

    pub fn hang_up_at(mut self, ply: usize) -> Self {
        self.hang_up_at = Some(ply);
        self
    }
}

/// Connects a session to a freshly started scripted engine.
pub fn connect(script: Script, config: &EngineConfig) -> (EngineSession, JoinHandle<()>) {
    let (ours, theirs) = duplex(8192);
    let label = script.name.clone();
    let handle = tokio::spawn(run_engine(script, theirs));
    let (r, w) = tokio::io::split(ours);
    let channel = LineChannel::new(BufReader::new(r), w).with_label(label);
    (EngineSession::from_channel(channel, config), handle)
}

/// A connected session that has completed the handshake.
pub async fn ready(script: Script) -> EngineSession {
    let (mut session, _engine) = connect(script, &EngineConfig::new("scripted"));
    session.init().await.unwrap();
    session
}

async fn run_engine(script: Script, stream: DuplexStream) {
    let (r, mut w) = tokio::io::split(stream);
    let mut lines = BufReader::new(r).lines();
    let mut history = 0usize;

    while let Ok(Some(line)) = lines.next_line().await {
        let replies = match GuiCommand::parse(&line) {
            Ok(GuiCommand::Uci) => vec![
                EngineMessage::Id {
                    name: Some(script.name.clone()),
                    author: Some("test".to_string()),
                }
                .to_uci(),
                "option name Hash type spin default 16 min 1 max 1024".to_string(),
                "option name Threads type spin default 1 min 1 max 512".to_string(),
                EngineMessage::UciOk.to_uci(),
            ],
            Ok(GuiCommand::IsReady) => vec![EngineMessage::ReadyOk.to_uci()],
            Ok(GuiCommand::SetOption { name, .. }) if script.rejected.contains(&name) => {
                vec![format!("No such option: {}", name)]
            }
            Ok(GuiCommand::Position { moves, .. }) => {
                history = moves.len();
                Vec::new()
            }
            Ok(GuiCommand::Go(_)) => {
                if script.hang_up_at == Some(history) {
                    return;
                }
                search_replies(&script, history)
            }
            Ok(GuiCommand::Quit) => return,
            _ => Vec::new(),
        };

        for reply in replies {
            if w.write_all(format!("{}\n", reply).as_bytes()).await.is_err() {
                return;
            }
        }
        if w.flush().await.is_err() {
            return;
        }
    }
}

fn search_replies(script: &Script, history: usize) -> Vec<String> {
    let mv = KNIGHT_SHUFFLE[history % 4];
    let reply = KNIGHT_SHUFFLE[(history + 1) % 4];

    if let Some((ply, distance)) = script.mate_at {
        if ply == history {
            if distance <= 0 {
                return vec![
                    InfoBuilder::new().depth(0).score_mate(distance).build().to_uci(),
                    bestmove(None, None),
                ];
            }
            return vec![
                InfoBuilder::new().depth(1).score_mate(distance).pv([mv]).build().to_uci(),
                bestmove(Some(mv), None),
            ];
        }
    }

    if script.no_move_at == Some(history) {
        return vec![
            InfoBuilder::new().depth(1).score_cp(0).build().to_uci(),
            bestmove(None, None),
        ];
    }

    vec![
        InfoBuilder::new().depth(1).currmove(mv).build().to_uci(),
        InfoBuilder::new()
            .depth(1)
            .seldepth(1)
            .score_cp(10)
            .nodes(20)
            .pv([mv, reply])
            .build()
            .to_uci(),
        bestmove(Some(mv), Some(reply)),
    ]
}

fn bestmove(mv: Option<&str>, ponder: Option<&str>) -> String {
    EngineMessage::BestMove {
        mv: mv.map(String::from),
        ponder: ponder.map(String::from),
    }
    .to_uci()
}
