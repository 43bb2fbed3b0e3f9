//! Match execution between two UCI engine sessions.
//!
//! A [`Match`] owns two [`EngineSession`]s and the shared move history.
//! Each call to [`Match::advance`] plays one half-move: the side to move
//! (from history parity) receives the full history, searches, and its best
//! move is appended. The engine's own evaluation decides the game: a mate
//! score ends it, as does reaching the ply ceiling. No chess rules are
//! checked here.
//!
//! # Example
//!
//! ```ignore
//! let mut sessions = BTreeMap::new();
//! sessions.insert("stockfish".to_string(), EngineSession::start(&sf, &mut rng).await?);
//! sessions.insert("lc0".to_string(), EngineSession::start(&lc0, &mut rng).await?);
//!
//! let mut game = Match::new(sessions, DEFAULT_MAX_PLIES, &mut rng).await?;
//! let outcome = game.run().await;
//! game.shutdown().await?;
//! ```

use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use uci::{InfoRecord, Score};

use crate::color::Color;
use crate::session::{EngineSession, SearchResult, SessionError};

/// Half-move ceiling used when none is configured.
pub const DEFAULT_MAX_PLIES: usize = 200;

/// Errors that end a match without a result.
#[derive(Error, Debug)]
pub enum MatchError {
    /// A participant's session failed.
    #[error("{name}: {source}")]
    Session {
        name: String,
        #[source]
        source: SessionError,
    },
    /// A participant answered in a way that leaves no usable result.
    #[error("Protocol anomaly from {name}: {detail}")]
    ProtocolAnomaly { name: String, detail: String },
    /// A match needs exactly two participants.
    #[error("A match needs exactly two participants, got {0}")]
    Participants(usize),
}

/// A named engine taking part in a match.
#[derive(Debug)]
pub struct Participant {
    pub name: String,
    pub session: EngineSession,
}

impl Participant {
    pub fn new(name: impl Into<String>, session: EngineSession) -> Self {
        Self {
            name: name.into(),
            session,
        }
    }
}

/// Where a match stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    InProgress,
    Decided(Color),
    Drawn,
    /// Stopped by an error; reported as incomplete, never as a draw.
    Aborted,
}

/// How a finished match ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Decided { winner: Color, name: String },
    Drawn,
}

/// Result tag written to match records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchResult {
    White,
    Black,
    Draw,
    Incomplete,
}

impl From<MatchStatus> for MatchResult {
    fn from(status: MatchStatus) -> Self {
        match status {
            MatchStatus::Decided(Color::White) => MatchResult::White,
            MatchStatus::Decided(Color::Black) => MatchResult::Black,
            MatchStatus::Drawn => MatchResult::Draw,
            MatchStatus::InProgress | MatchStatus::Aborted => MatchResult::Incomplete,
        }
    }
}

/// One half-move with the search that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlyRecord {
    /// Zero-based half-move index.
    pub ply: usize,
    pub color: Color,
    pub engine: String,
    pub best_move: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ponder: Option<String>,
    pub info: InfoRecord,
}

/// Serializable summary of a match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRecord {
    pub white: String,
    pub black: String,
    pub result: MatchResult,
    pub winner: Option<String>,
    pub max_plies: usize,
    pub moves: Vec<String>,
    pub plies: Vec<PlyRecord>,
    /// The search that decided the game, if it was decided by mate.
    pub decisive: Option<PlyRecord>,
}

/// A contest between two engine sessions.
pub struct Match {
    white: Participant,
    black: Participant,
    moves: Vec<String>,
    plies: Vec<PlyRecord>,
    decisive: Option<PlyRecord>,
    status: MatchStatus,
    max_plies: usize,
}

impl Match {
    /// Assigns colors uniformly at random from `rng` and starts a new game
    /// on both sessions.
    ///
    /// # Errors
    ///
    /// [`MatchError::Participants`] unless exactly two sessions are given;
    /// session errors from `ucinewgame`.
    pub async fn new<R: Rng>(
        participants: BTreeMap<String, EngineSession>,
        max_plies: usize,
        rng: &mut R,
    ) -> Result<Self, MatchError> {
        if participants.len() != 2 {
            return Err(MatchError::Participants(participants.len()));
        }
        let mut entries = participants.into_iter();
        let (Some(first), Some(second)) = (entries.next(), entries.next()) else {
            return Err(MatchError::Participants(0));
        };

        let (white, black) = if rng.gen_bool(0.5) {
            (first, second)
        } else {
            (second, first)
        };
        Self::with_colors(
            Participant::new(white.0, white.1),
            Participant::new(black.0, black.1),
            max_plies,
        )
        .await
    }

    /// Starts a match with fixed colors.
    pub async fn with_colors(
        mut white: Participant,
        mut black: Participant,
        max_plies: usize,
    ) -> Result<Self, MatchError> {
        for participant in [&mut white, &mut black] {
            participant
                .session
                .new_game()
                .await
                .map_err(|source| MatchError::Session {
                    name: participant.name.clone(),
                    source,
                })?;
        }
        tracing::debug!(white = %white.name, black = %black.name, max_plies, "match started");

        Ok(Self {
            white,
            black,
            moves: Vec::new(),
            plies: Vec::new(),
            decisive: None,
            status: MatchStatus::InProgress,
            max_plies,
        })
    }

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    /// Move history in coordinate notation.
    pub fn moves(&self) -> &[String] {
        &self.moves
    }

    pub fn plies(&self) -> &[PlyRecord] {
        &self.plies
    }

    pub fn decisive(&self) -> Option<&PlyRecord> {
        self.decisive.as_ref()
    }

    pub fn max_plies(&self) -> usize {
        self.max_plies
    }

    pub fn name_of(&self, color: Color) -> &str {
        match color {
            Color::White => &self.white.name,
            Color::Black => &self.black.name,
        }
    }

    pub fn side_to_move(&self) -> Color {
        Color::to_move(self.moves.len())
    }

    /// The result so far, or `None` while in progress or after an abort.
    pub fn outcome(&self) -> Option<Outcome> {
        match self.status {
            MatchStatus::Decided(winner) => Some(Outcome::Decided {
                winner,
                name: self.name_of(winner).to_string(),
            }),
            MatchStatus::Drawn => Some(Outcome::Drawn),
            MatchStatus::InProgress | MatchStatus::Aborted => None,
        }
    }

    /// Plays one half-move. Returns whether play continues.
    ///
    /// Any error moves the match to [`MatchStatus::Aborted`].
    pub async fn advance(&mut self) -> Result<bool, MatchError> {
        if self.status != MatchStatus::InProgress {
            return Ok(false);
        }
        match self.play_ply().await {
            Ok(more) => Ok(more),
            Err(e) => {
                tracing::warn!(ply = self.moves.len(), error = %e, "match aborted");
                self.status = MatchStatus::Aborted;
                Err(e)
            }
        }
    }

    /// Advances until the match ends.
    pub async fn run(&mut self) -> Result<Outcome, MatchError> {
        while self.advance().await? {}
        match self.outcome() {
            Some(outcome) => {
                tracing::info!(
                    white = %self.white.name,
                    black = %self.black.name,
                    plies = self.moves.len(),
                    result = ?MatchResult::from(self.status),
                    "match finished"
                );
                Ok(outcome)
            }
            None => Err(MatchError::ProtocolAnomaly {
                name: self.name_of(self.side_to_move()).to_string(),
                detail: "match stopped without a result".to_string(),
            }),
        }
    }

    async fn play_ply(&mut self) -> Result<bool, MatchError> {
        if self.moves.len() >= self.max_plies {
            self.status = MatchStatus::Drawn;
            return Ok(false);
        }

        let mover = self.side_to_move();
        let participant = match mover {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        };
        let name = participant.name.clone();
        let result = search(participant, &self.moves).await?;

        let record = PlyRecord {
            ply: self.moves.len(),
            color: mover,
            engine: name.clone(),
            best_move: result.best_move.clone(),
            ponder: result.ponder.clone(),
            info: result.info.clone(),
        };
        tracing::debug!(
            ply = record.ply,
            engine = %name,
            mv = result.best_move.as_deref().unwrap_or("(none)"),
            score = ?result.info.score,
            "ply"
        );
        self.plies.push(record.clone());

        if let Some(distance) = result.info.score.and_then(Score::mate) {
            if let Some(mv) = result.best_move {
                self.moves.push(mv);
            }
            let winner = if distance > 0 { mover } else { mover.opposite() };
            self.decisive = Some(record);
            self.status = MatchStatus::Decided(winner);
            return Ok(false);
        }

        match result.best_move {
            Some(mv) => self.moves.push(mv),
            None => {
                return Err(MatchError::ProtocolAnomaly {
                    name,
                    detail: "no move and no mate score".to_string(),
                })
            }
        }

        if self.moves.len() >= self.max_plies {
            self.status = MatchStatus::Drawn;
            return Ok(false);
        }
        Ok(true)
    }

    /// Serializable summary of the match as it stands.
    pub fn record(&self) -> MatchRecord {
        MatchRecord {
            white: self.white.name.clone(),
            black: self.black.name.clone(),
            result: MatchResult::from(self.status),
            winner: match self.status {
                MatchStatus::Decided(color) => Some(self.name_of(color).to_string()),
                _ => None,
            },
            max_plies: self.max_plies,
            moves: self.moves.clone(),
            plies: self.plies.clone(),
            decisive: self.decisive.clone(),
        }
    }

    /// Quits both engines, reporting the first failure.
    pub async fn shutdown(&mut self) -> Result<(), MatchError> {
        let mut first_error = None;
        for participant in [&mut self.white, &mut self.black] {
            if let Err(source) = participant.session.quit().await {
                first_error.get_or_insert(MatchError::Session {
                    name: participant.name.clone(),
                    source,
                });
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Sends the history to the mover and searches.
async fn search(participant: &mut Participant, moves: &[String]) -> Result<SearchResult, MatchError> {
    let session = &mut participant.session;
    let outcome = match session.set_position(moves).await {
        Ok(()) => session.search().await,
        Err(e) => Err(e),
    };
    outcome.map_err(|source| MatchError::Session {
        name: participant.name.clone(),
        source,
    })
}
