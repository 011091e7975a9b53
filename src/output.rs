//! Output sinks for the transcript.
//!
//! The renderer never prints directly. It talks to an [`OutputSink`] with
//! four operations:
//!
//! - `append` adds a permanent line,
//! - `replace` overwrites the live status line in place,
//! - `commit` makes the current live line permanent,
//! - `warn` writes to the side error channel.
//!
//! [`TerminalSink`] drives a real terminal (or a pipe, where the live line is
//! only written when committed). [`RecordingSink`] keeps every operation for
//! inspection in tests.

use std::io::{self, Stderr, Stdout, Write};

use colored::Colorize;
use is_terminal::IsTerminal;

/// Clears the current terminal line and returns the cursor to column 0.
const CLEAR_LINE: &str = "\r\x1b[2K";

/// Destination of rendered output.
pub trait OutputSink {
    /// Append a permanent line.
    fn append(&mut self, line: &str) -> io::Result<()>;

    /// Replace the live line.
    fn replace(&mut self, line: &str) -> io::Result<()>;

    /// Make the live line permanent. No-op when there is none.
    fn commit(&mut self) -> io::Result<()>;

    /// Emit a warning on the side channel.
    fn warn(&mut self, message: &str) -> io::Result<()>;

    /// Flush buffered output.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ============================================================================
// Terminal Sink
// ============================================================================

/// Sink writing to a terminal or pipe.
#[derive(Debug)]
pub struct TerminalSink<W: Write, E: Write> {
    out: W,
    err: E,
    interactive: bool,
    use_color: bool,
    live: Option<String>,
}

impl TerminalSink<Stdout, Stderr> {
    /// Sink on the process stdout/stderr; the live line is redrawn in place
    /// only when stdout is a terminal.
    pub fn stdout() -> Self {
        let out = io::stdout();
        let interactive = out.is_terminal();
        Self::new(out, io::stderr(), interactive)
    }
}

impl<W: Write, E: Write> TerminalSink<W, E> {
    /// Create a sink on arbitrary writers.
    pub fn new(out: W, err: E, interactive: bool) -> Self {
        Self {
            out,
            err,
            interactive,
            use_color: true,
            live: None,
        }
    }

    /// Enable or disable the colored warning prefix.
    pub fn with_color(mut self, use_color: bool) -> Self {
        self.use_color = use_color;
        self
    }

    /// Consume the sink, returning the writers.
    pub fn into_inner(self) -> (W, E) {
        (self.out, self.err)
    }
}

impl<W: Write, E: Write> OutputSink for TerminalSink<W, E> {
    fn append(&mut self, line: &str) -> io::Result<()> {
        if !self.interactive {
            return writeln!(self.out, "{}", line);
        }
        match &self.live {
            // keep the live line as the last line on screen
            Some(live) => write!(self.out, "{}{}\n{}", CLEAR_LINE, line, live)?,
            None => writeln!(self.out, "{}", line)?,
        }
        self.out.flush()
    }

    fn replace(&mut self, line: &str) -> io::Result<()> {
        if self.interactive {
            write!(self.out, "{}{}", CLEAR_LINE, line)?;
            self.out.flush()?;
        }
        self.live = Some(line.to_string());
        Ok(())
    }

    fn commit(&mut self) -> io::Result<()> {
        let Some(live) = self.live.take() else {
            return Ok(());
        };
        if self.interactive {
            writeln!(self.out)
        } else {
            writeln!(self.out, "{}", live)
        }
    }

    fn warn(&mut self, message: &str) -> io::Result<()> {
        if self.use_color {
            writeln!(self.err, "{} {}", "[WARNING]:".yellow(), message)
        } else {
            writeln!(self.err, "[WARNING]: {}", message)
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()?;
        self.err.flush()
    }
}

// ============================================================================
// Recording Sink
// ============================================================================

/// One recorded sink operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOp {
    /// A permanent line
    Append(String),
    /// A live line replacement
    Replace(String),
    /// The live line was committed
    Commit,
    /// A side-channel warning
    Warn(String),
}

/// Sink that records operations instead of writing them.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    ops: Vec<SinkOp>,
    live: Option<String>,
}

impl RecordingSink {
    /// Create an empty recording.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded operations.
    pub fn ops(&self) -> &[SinkOp] {
        &self.ops
    }

    /// The permanent lines, as a non-interactive terminal would show them.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut live: Option<&str> = None;
        for op in &self.ops {
            match op {
                SinkOp::Append(line) => lines.push(line.clone()),
                SinkOp::Replace(line) => live = Some(line.as_str()),
                SinkOp::Commit => {
                    if let Some(line) = live.take() {
                        lines.push(line.to_string());
                    }
                }
                SinkOp::Warn(_) => {}
            }
        }
        lines
    }

    /// The permanent lines joined with newlines.
    pub fn transcript(&self) -> String {
        let mut text = self.lines().join("\n");
        text.push('\n');
        text
    }

    /// Warnings sent to the side channel.
    pub fn warnings(&self) -> Vec<String> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                SinkOp::Warn(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// The current, uncommitted live line.
    pub fn live(&self) -> Option<&str> {
        self.live.as_deref()
    }
}

impl OutputSink for RecordingSink {
    fn append(&mut self, line: &str) -> io::Result<()> {
        self.ops.push(SinkOp::Append(line.to_string()));
        Ok(())
    }

    fn replace(&mut self, line: &str) -> io::Result<()> {
        self.live = Some(line.to_string());
        self.ops.push(SinkOp::Replace(line.to_string()));
        Ok(())
    }

    fn commit(&mut self) -> io::Result<()> {
        if self.live.take().is_some() {
            self.ops.push(SinkOp::Commit);
        }
        Ok(())
    }

    fn warn(&mut self, message: &str) -> io::Result<()> {
        self.ops.push(SinkOp::Warn(message.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_pipe_writes_live_line_only_on_commit() {
        let mut sink = TerminalSink::new(Vec::new(), Vec::new(), false);
        sink.replace("ok=1").unwrap();
        sink.replace("ok=2").unwrap();
        sink.append("TASK [x]").unwrap();
        sink.commit().unwrap();
        sink.commit().unwrap();
        let (out, _) = sink.into_inner();
        assert_eq!(text(out), "TASK [x]\nok=2\n");
    }

    #[test]
    fn test_terminal_redraws_live_line_below_appends() {
        let mut sink = TerminalSink::new(Vec::new(), Vec::new(), true);
        sink.replace("running=2").unwrap();
        sink.append("started: [h1] t").unwrap();
        sink.commit().unwrap();
        let (out, _) = sink.into_inner();
        assert_eq!(
            text(out),
            "\r\x1b[2Krunning=2\r\x1b[2Kstarted: [h1] t\nrunning=2\n"
        );
    }

    #[test]
    fn test_warnings_go_to_error_channel() {
        let mut sink = TerminalSink::new(Vec::new(), Vec::new(), false);
        sink.warn("formatter failed").unwrap();
        let (out, err) = sink.into_inner();
        assert!(out.is_empty());
        let err = text(err);
        assert!(err.contains("[WARNING]:"));
        assert!(err.ends_with(" formatter failed\n"));
    }

    #[test]
    fn test_warning_prefix_plain_without_color() {
        let mut sink = TerminalSink::new(Vec::new(), Vec::new(), false).with_color(false);
        sink.warn("formatter failed").unwrap();
        let (_, err) = sink.into_inner();
        assert_eq!(text(err), "[WARNING]: formatter failed\n");
    }

    #[test]
    fn test_recording_lines() {
        let mut sink = RecordingSink::new();
        sink.append("a").unwrap();
        sink.replace("live").unwrap();
        sink.warn("w").unwrap();
        assert_eq!(sink.live(), Some("live"));
        sink.commit().unwrap();
        sink.commit().unwrap();
        sink.append("b").unwrap();
        assert_eq!(sink.lines(), vec!["a", "live", "b"]);
        assert_eq!(sink.transcript(), "a\nlive\nb\n");
        assert_eq!(sink.warnings(), vec!["w"]);
        assert_eq!(sink.ops().iter().filter(|op| **op == SinkOp::Commit).count(), 1);
    }
}
