//! Engine session: one UCI engine process plus its protocol state.
//!
//! A session owns a [`LineChannel`] and, when spawned, the child process
//! behind it. Every operation is a strict request/response exchange; the
//! `isready`/`readyok` barrier in [`EngineSession::sync`] is what makes it
//! safe to issue the next command after a state change.
//!
//! # Lifecycle
//!
//! 1. [`EngineSession::spawn`] starts the process (`Starting`)
//! 2. [`EngineSession::init`] performs the `uci` handshake (`Ready`)
//! 3. [`EngineSession::configure`] sends the resolved options
//! 4. [`EngineSession::new_game`], [`EngineSession::set_position`] and
//!    [`EngineSession::search`] drive play (`Ready` ⇄ `Searching`)
//! 5. [`EngineSession::quit`] shuts the engine down (`Terminated`)
//!
//! [`EngineSession::start`] does steps 1 to 3 in one call.

use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::mpsc::UnboundedSender;
use uci::{is_coordinate_move, EngineMessage, GoOptions, GuiCommand, InfoRecord, OptionDecl};

use crate::channel::{ChannelError, LineChannel, Traffic};
use crate::config::{ConfigError, EngineConfig};

const QUIT_GRACE: Duration = Duration::from_secs(1);

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Ready,
    Searching,
    Terminated,
}

/// The reply a session is blocked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    UciOk,
    ReadyOk,
    BestMove,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::UciOk => write!(f, "uciok"),
            Reply::ReadyOk => write!(f, "readyok"),
            Reply::BestMove => write!(f, "bestmove"),
        }
    }
}

/// An option the engine did not recognize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionRejected {
    pub name: String,
    pub value: String,
    /// The engine's complaint, verbatim.
    pub response: String,
}

impl fmt::Display for OptionRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {} ({})", self.name, self.value, self.response)
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    /// The engine exited or its pipe broke.
    #[error("Engine channel closed")]
    ChannelClosed,
    /// The engine did not recognize an option. The session stays usable.
    #[error("Option rejected: {0}")]
    ConfigurationRejected(OptionRejected),
    /// A response did not fit the grammar expected in its context.
    #[error("Protocol anomaly: {0}")]
    ProtocolAnomaly(String),
    /// An operation was attempted after termination.
    #[error("Session already terminated")]
    SessionClosed,
    #[error("Failed to spawn engine: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("No response within {0:?}")]
    Timeout(Duration),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid engine config: {0}")]
    Config(#[from] ConfigError),
    /// An earlier exchange was abandoned while waiting for this reply.
    #[error("Previous exchange interrupted while awaiting {0}")]
    Interrupted(Reply),
}

/// Result of one search.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SearchResult {
    /// `None` when the engine reported no legal move.
    pub best_move: Option<String>,
    pub ponder: Option<String>,
    /// The last scored `info` line before `bestmove`.
    pub info: InfoRecord,
}

/// A UCI engine driven over a [`LineChannel`].
pub struct EngineSession {
    channel: LineChannel,
    child: Option<Child>,
    state: SessionState,
    awaiting: Option<Reply>,
    depth: u32,
    ponder: bool,
    options: BTreeMap<String, String>,
    name: Option<String>,
    author: Option<String>,
    advertised: Vec<OptionDecl>,
}

impl EngineSession {
    /// Wraps an already-connected channel. The session starts in
    /// [`SessionState::Starting`]; call [`init`](Self::init) next.
    ///
    /// `config.read_timeout_ms` replaces the channel's read timeout when set.
    pub fn from_channel(channel: LineChannel, config: &EngineConfig) -> Self {
        let channel = match config.read_timeout() {
            Some(limit) => channel.with_read_timeout(Some(limit)),
            None => channel,
        };
        Self {
            channel,
            child: None,
            state: SessionState::Starting,
            awaiting: None,
            depth: config.depth,
            ponder: config.ponder,
            options: BTreeMap::new(),
            name: None,
            author: None,
            advertised: Vec::new(),
        }
    }

    /// Spawns the engine process described by `config`.
    ///
    /// The child is killed when the session is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Spawn`] if the executable cannot be started.
    pub async fn spawn(config: &EngineConfig) -> Result<Self, SessionError> {
        let mut child = Command::new(&config.path)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(SessionError::Spawn)?;

        let label = config
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| config.path.display().to_string());
        let channel = LineChannel::from_child(&mut child)
            .map_err(|_| SessionError::ChannelClosed)?
            .with_label(label);

        tracing::debug!(engine = %channel.label(), pid = ?child.id(), "spawned engine");
        let mut session = Self::from_channel(channel, config);
        session.child = Some(child);
        Ok(session)
    }

    /// Spawns, initializes and configures an engine. Options are resolved
    /// from `config` with randomized values drawn from `rng`; rejected
    /// options are logged and skipped.
    pub async fn start<R: Rng>(config: &EngineConfig, rng: &mut R) -> Result<Self, SessionError> {
        let options = config.resolve_options(rng)?;
        let mut session = Self::spawn(config).await?;
        session.init().await?;
        session.configure(&options).await?;
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn label(&self) -> &str {
        self.channel.label()
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn ponder(&self) -> bool {
        self.ponder
    }

    /// Engine name from `id name`, once initialized.
    pub fn engine_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn engine_author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Options declared by the engine during the handshake.
    pub fn advertised_options(&self) -> &[OptionDecl] {
        &self.advertised
    }

    /// Options the engine accepted, by name.
    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    /// Mirrors all traffic of this session to `observer`.
    pub fn set_observer(&mut self, observer: UnboundedSender<Traffic>) {
        self.channel.set_observer(observer);
    }

    /// `uci` handshake: records engine id and declared options, then syncs.
    pub async fn init(&mut self) -> Result<(), SessionError> {
        self.send(GuiCommand::Uci).await?;
        self.awaiting = Some(Reply::UciOk);
        loop {
            match self.next_message().await? {
                EngineMessage::Id { name, author } => {
                    if name.is_some() {
                        self.name = name;
                    }
                    if author.is_some() {
                        self.author = author;
                    }
                }
                EngineMessage::Option(decl) => self.advertised.push(decl),
                EngineMessage::UciOk => break,
                _ => {}
            }
        }
        self.awaiting = None;
        self.sync().await?;
        self.state = SessionState::Ready;
        tracing::debug!(
            engine = %self.label(),
            name = self.name.as_deref().unwrap_or("?"),
            options = self.advertised.len(),
            "handshake complete"
        );
        Ok(())
    }

    /// Sends every option in order. Options the engine does not recognize
    /// are logged and returned; everything else is fatal.
    pub async fn configure(
        &mut self,
        options: &[(String, String)],
    ) -> Result<Vec<OptionRejected>, SessionError> {
        let mut rejected = Vec::new();
        for (name, value) in options {
            match self.set_option(name, value).await {
                Ok(()) => {}
                Err(SessionError::ConfigurationRejected(r)) => rejected.push(r),
                Err(e) => return Err(e),
            }
        }
        Ok(rejected)
    }

    /// Sends one option and syncs.
    ///
    /// # Errors
    ///
    /// [`SessionError::ConfigurationRejected`] if the engine answered with
    /// `No such option` before `readyok`.
    pub async fn set_option(&mut self, name: &str, value: &str) -> Result<(), SessionError> {
        self.send(GuiCommand::SetOption {
            name: name.to_string(),
            value: Some(value.to_string()),
        })
        .await?;

        let chatter = self.barrier().await?;
        if let Some(response) = chatter.into_iter().find(|l| l.contains("No such")) {
            tracing::warn!(engine = %self.label(), option = name, %value, "{}", response);
            return Err(SessionError::ConfigurationRejected(OptionRejected {
                name: name.to_string(),
                value: value.to_string(),
                response,
            }));
        }
        self.options.insert(name.to_string(), value.to_string());
        Ok(())
    }

    /// `ucinewgame`, then sync.
    pub async fn new_game(&mut self) -> Result<(), SessionError> {
        self.send(GuiCommand::UciNewGame).await?;
        self.sync().await
    }

    /// `position startpos moves ...`, then sync.
    pub async fn set_position(&mut self, moves: &[String]) -> Result<(), SessionError> {
        self.send(GuiCommand::Position {
            fen: None,
            moves: moves.to_vec(),
        })
        .await?;
        self.sync().await
    }

    /// `position fen <fen>`, then sync.
    pub async fn set_fen_position(&mut self, fen: &str) -> Result<(), SessionError> {
        self.send(GuiCommand::Position {
            fen: Some(fen.to_string()),
            moves: Vec::new(),
        })
        .await?;
        self.sync().await
    }

    /// `isready` barrier. Returns once `readyok` arrives.
    pub async fn sync(&mut self) -> Result<(), SessionError> {
        self.barrier().await.map(|_| ())
    }

    /// Searches to the configured depth.
    pub async fn search(&mut self) -> Result<SearchResult, SessionError> {
        self.search_depth(self.depth).await
    }

    /// `go depth <depth>`, keeping the last scored `info` line of the
    /// principal line (no `multipv` or `multipv 1`) until `bestmove` arrives.
    ///
    /// # Errors
    ///
    /// [`SessionError::ProtocolAnomaly`] if `bestmove` carries something
    /// other than a coordinate move or the no-move marker. Channel
    /// failures terminate the session.
    pub async fn search_depth(&mut self, depth: u32) -> Result<SearchResult, SessionError> {
        self.send(GuiCommand::Go(GoOptions::depth(depth))).await?;
        self.state = SessionState::Searching;
        self.awaiting = Some(Reply::BestMove);

        let mut info = InfoRecord::default();
        let (best_move, ponder) = loop {
            match self.next_message().await? {
                EngineMessage::Info(line)
                    if line.has_score() && line.multipv.map_or(true, |n| n == 1) =>
                {
                    info = line
                }
                EngineMessage::BestMove { mv, ponder } => break (mv, ponder),
                _ => {}
            }
        };
        self.awaiting = None;
        self.state = SessionState::Ready;

        if let Some(ref mv) = best_move {
            if !is_coordinate_move(mv) {
                return Err(SessionError::ProtocolAnomaly(format!(
                    "malformed best move {:?}",
                    mv
                )));
            }
        }
        Ok(SearchResult {
            best_move,
            ponder: ponder.filter(|p| is_coordinate_move(p)),
            info,
        })
    }

    /// Sends `quit`, waits briefly for the process to exit, then kills it.
    /// Safe to call more than once.
    pub async fn quit(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Terminated {
            let _ = self.channel.send(&GuiCommand::Quit.to_uci()).await;
            self.state = SessionState::Terminated;
        }
        self.awaiting = None;

        if let Some(mut child) = self.child.take() {
            match tokio::time::timeout(QUIT_GRACE, child.wait()).await {
                Ok(status) => {
                    tracing::debug!(engine = %self.label(), status = ?status.ok(), "engine exited")
                }
                Err(_) => {
                    tracing::debug!(engine = %self.label(), "engine ignored quit, killing");
                    child.kill().await?;
                }
            }
        }
        Ok(())
    }

    /// Fails fast on a terminated session, and terminates a session whose
    /// previous exchange was abandoned mid-wait.
    fn ensure_open(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Terminated {
            return Err(SessionError::SessionClosed);
        }
        if let Some(reply) = self.awaiting.take() {
            self.terminate();
            return Err(SessionError::Interrupted(reply));
        }
        Ok(())
    }

    fn terminate(&mut self) {
        self.state = SessionState::Terminated;
        if let Some(ref mut child) = self.child {
            let _ = child.start_kill();
        }
    }

    async fn send(&mut self, command: GuiCommand) -> Result<(), SessionError> {
        self.ensure_open()?;
        let line = command.to_uci();
        match self.channel.send(&line).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn next_message(&mut self) -> Result<EngineMessage, SessionError> {
        match self.channel.receive().await {
            Ok(line) => Ok(EngineMessage::parse(&line)),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn fail(&mut self, err: ChannelError) -> SessionError {
        self.terminate();
        self.awaiting = None;
        tracing::debug!(engine = %self.label(), error = %err, "session terminated");
        match err {
            ChannelError::Closed => SessionError::ChannelClosed,
            ChannelError::Timeout(limit) => SessionError::Timeout(limit),
            ChannelError::Io(e) => SessionError::Io(e),
        }
    }

    /// Sends `isready` and reads until `readyok`, returning the
    /// unclassified lines seen on the way.
    async fn barrier(&mut self) -> Result<Vec<String>, SessionError> {
        self.send(GuiCommand::IsReady).await?;
        self.awaiting = Some(Reply::ReadyOk);
        let mut chatter = Vec::new();
        loop {
            match self.next_message().await? {
                EngineMessage::ReadyOk => break,
                EngineMessage::Other(line) if !line.is_empty() => chatter.push(line),
                _ => {}
            }
        }
        self.awaiting = None;
        Ok(chatter)
    }
}

impl fmt::Debug for EngineSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineSession")
            .field("label", &self.label())
            .field("state", &self.state)
            .field("depth", &self.depth)
            .field("ponder", &self.ponder)
            .finish()
    }
}
