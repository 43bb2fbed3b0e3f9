//! Line-oriented text channel to a UCI engine.
//!
//! A [`LineChannel`] wraps any async reader/writer pair. Production code
//! builds one from a spawned child's piped stdin/stdout; tests connect it
//! to an in-process engine through [`tokio::io::duplex`].
//!
//! # Example
//!
//! ```no_run
//! use engine_duel::channel::LineChannel;
//! use tokio::process::Command;
//! use std::process::Stdio;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut child = Command::new("stockfish")
//!     .stdin(Stdio::piped())
//!     .stdout(Stdio::piped())
//!     .spawn()?;
//! let mut channel = LineChannel::from_child(&mut child)?;
//! channel.send("isready").await?;
//! assert_eq!(channel.receive().await?, "readyok");
//! # Ok(())
//! # }
//! ```

use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc::UnboundedSender;

/// Errors raised by a [`LineChannel`].
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The remote end exited or the pipe broke.
    #[error("Channel closed")]
    Closed,
    /// No complete line arrived within the read timeout.
    #[error("No line received within {0:?}")]
    Timeout(Duration),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One line of traffic as seen by a channel observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Traffic {
    Sent(String),
    Received(String),
}

type Reader = Box<dyn AsyncBufRead + Unpin + Send>;
type Writer = Box<dyn AsyncWrite + Unpin + Send>;

/// Bidirectional line stream to an engine process.
pub struct LineChannel {
    reader: Reader,
    writer: Writer,
    label: String,
    read_timeout: Option<Duration>,
    observer: Option<UnboundedSender<Traffic>>,
}

impl LineChannel {
    /// Creates a channel over an arbitrary reader/writer pair.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            label: "engine".to_string(),
            read_timeout: None,
            observer: None,
        }
    }

    /// Takes the piped stdin/stdout of a spawned child.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] if either pipe was not configured
    /// or has already been taken.
    pub fn from_child(child: &mut Child) -> Result<Self, ChannelError> {
        let stdin = child.stdin.take().ok_or(ChannelError::Closed)?;
        let stdout = child.stdout.take().ok_or(ChannelError::Closed)?;
        Ok(Self::new(BufReader::new(stdout), stdin))
    }

    /// Sets the label used in log lines.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Bounds every [`receive`](Self::receive) by `timeout`.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Mirrors all traffic to `observer`.
    pub fn with_observer(mut self, observer: UnboundedSender<Traffic>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn set_observer(&mut self, observer: UnboundedSender<Traffic>) {
        self.observer = Some(observer);
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Writes `line` followed by a newline and flushes.
    pub async fn send(&mut self, line: &str) -> Result<(), ChannelError> {
        tracing::trace!(engine = %self.label, "> {}", line);
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        self.writer.write_all(&buf).await.map_err(write_error)?;
        self.writer.flush().await.map_err(write_error)?;
        self.observe(Traffic::Sent(line.to_string()));
        Ok(())
    }

    /// Waits for one complete line and returns it with trailing whitespace
    /// stripped.
    ///
    /// # Errors
    ///
    /// [`ChannelError::Closed`] on end of stream, including a final line
    /// without a terminating newline. [`ChannelError::Timeout`] if a read
    /// timeout is set and expires.
    pub async fn receive(&mut self) -> Result<String, ChannelError> {
        let mut buf = Vec::new();
        let read = match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, self.reader.read_until(b'\n', &mut buf))
                .await
                .map_err(|_| ChannelError::Timeout(limit))??,
            None => self.reader.read_until(b'\n', &mut buf).await?,
        };

        if read == 0 || buf.last() != Some(&b'\n') {
            tracing::trace!(engine = %self.label, "< EOF");
            return Err(ChannelError::Closed);
        }

        let line = String::from_utf8_lossy(&buf).trim_end().to_string();
        tracing::trace!(engine = %self.label, "< {}", line);
        self.observe(Traffic::Received(line.clone()));
        Ok(line)
    }

    fn observe(&self, traffic: Traffic) {
        if let Some(ref observer) = self.observer {
            let _ = observer.send(traffic);
        }
    }
}

fn write_error(err: std::io::Error) -> ChannelError {
    match err.kind() {
        std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset => ChannelError::Closed,
        _ => ChannelError::Io(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, DuplexStream};
    use tokio::sync::mpsc;

    fn channel_pair() -> (LineChannel, DuplexStream) {
        let (ours, theirs) = duplex(1024);
        let (read_half, write_half) = tokio::io::split(ours);
        (LineChannel::new(BufReader::new(read_half), write_half), theirs)
    }

    #[tokio::test]
    async fn send_appends_newline_and_flushes() {
        let (mut channel, mut remote) = channel_pair();
        channel.send("isready").await.unwrap();

        let mut buf = [0u8; 8];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"isready\n");
    }

    #[tokio::test]
    async fn receive_strips_trailing_whitespace() {
        let (mut channel, mut remote) = channel_pair();
        remote.write_all(b"readyok  \r\ninfo depth 1\n").await.unwrap();

        assert_eq!(channel.receive().await.unwrap(), "readyok");
        assert_eq!(channel.receive().await.unwrap(), "info depth 1");
    }

    #[tokio::test]
    async fn receive_reports_closed_on_eof() {
        let (mut channel, remote) = channel_pair();
        drop(remote);

        assert!(matches!(channel.receive().await, Err(ChannelError::Closed)));
    }

    #[tokio::test]
    async fn partial_line_at_eof_is_not_returned() {
        let (mut channel, mut remote) = channel_pair();
        remote.write_all(b"bestmove e2").await.unwrap();
        drop(remote);

        assert!(matches!(channel.receive().await, Err(ChannelError::Closed)));
    }

    #[tokio::test]
    async fn receive_times_out() {
        let (channel, _remote) = channel_pair();
        let mut channel = channel.with_read_timeout(Some(Duration::from_millis(20)));

        match channel.receive().await {
            Err(ChannelError::Timeout(limit)) => assert_eq!(limit, Duration::from_millis(20)),
            other => panic!("Expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn observer_sees_both_directions() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (channel, mut remote) = channel_pair();
        let mut channel = channel.with_observer(tx).with_label("white");
        assert_eq!(channel.label(), "white");

        channel.send("uci").await.unwrap();
        remote.write_all(b"uciok\n").await.unwrap();
        channel.receive().await.unwrap();

        assert_eq!(rx.recv().await, Some(Traffic::Sent("uci".to_string())));
        assert_eq!(rx.recv().await, Some(Traffic::Received("uciok".to_string())));
    }

    #[tokio::test]
    async fn dropped_observer_does_not_break_channel() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let (channel, mut remote) = channel_pair();
        let mut channel = channel.with_observer(tx);

        remote.write_all(b"readyok\n").await.unwrap();
        assert_eq!(channel.receive().await.unwrap(), "readyok");
    }

    #[test]
    fn error_display() {
        assert_eq!(ChannelError::Closed.to_string(), "Channel closed");
        assert_eq!(
            ChannelError::Timeout(Duration::from_secs(2)).to_string(),
            "No line received within 2s"
        );
    }
}
