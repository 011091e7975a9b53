//! External diff formatting.
//!
//! A configured command line (for example `diff-highlight` or
//! `delta --color-only`) receives the rendered diff on stdin and writes the
//! formatted text to stdout. The command is split with shell-word rules and
//! run without a shell.

use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;

use tracing::debug;

use super::{strip_ansi, DiffRenderer};
use crate::callback::FileDiff;
use crate::config::RenderConfig;
use crate::error::{Error, Result};

/// A parsed external formatter command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalFormatter {
    command: String,
    program: String,
    args: Vec<String>,
}

impl ExternalFormatter {
    /// Parse a formatter command line.
    pub fn parse(command: &str) -> Result<Self> {
        let invalid = |message: String| Error::InvalidConfigValue {
            key: "diff_formatter".to_string(),
            message,
        };
        let mut words = shell_words::split(command)
            .map_err(|e| invalid(format!("cannot parse '{}': {}", command, e)))?
            .into_iter();
        let program = words
            .next()
            .ok_or_else(|| invalid("command is empty".to_string()))?;
        Ok(Self {
            command: command.to_string(),
            program,
            args: words.collect(),
        })
    }

    /// The command line as configured.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Pipe `text` through the command and return its stdout.
    pub fn format(&self, text: &str) -> Result<String> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.error(format!("failed to start: {}", e)))?;
        let mut guard = ChildGuard::new(child);

        let stdin = guard.child_mut().and_then(|c| c.stdin.take());
        let stdout = guard.child_mut().and_then(|c| c.stdout.take());
        let stderr = guard.child_mut().and_then(|c| c.stderr.take());
        let (Some(mut stdin), Some(mut stdout), Some(mut stderr)) = (stdin, stdout, stderr) else {
            return Err(self.error("standard streams unavailable"));
        };

        let input = text.as_bytes().to_vec();
        let writer = thread::Builder::new()
            .name("diff-formatter-stdin".to_string())
            .spawn(move || -> io::Result<()> {
                match stdin.write_all(&input) {
                    // the formatter may exit without reading everything
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                    other => other,
                }
            })
            .map_err(|e| self.error(format!("failed to spawn writer: {}", e)))?;
        let error_reader = thread::Builder::new()
            .name("diff-formatter-stderr".to_string())
            .spawn(move || {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf);
                buf
            })
            .map_err(|e| self.error(format!("failed to spawn reader: {}", e)))?;

        let mut output = Vec::new();
        stdout
            .read_to_end(&mut output)
            .map_err(|e| self.error(format!("failed to read output: {}", e)))?;

        let written = writer
            .join()
            .map_err(|_| self.error("stdin writer panicked"))?;
        let errors = error_reader.join().unwrap_or_default();
        let status = guard
            .wait()
            .map_err(|e| self.error(format!("failed to wait: {}", e)))?;

        written.map_err(|e| self.error(format!("failed to write input: {}", e)))?;
        if !status.success() {
            let stderr = String::from_utf8_lossy(&errors);
            let stderr = stderr.trim();
            return Err(self.error(if stderr.is_empty() {
                format!("exited with {}", status)
            } else {
                format!("exited with {}: {}", status, stderr)
            }));
        }

        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::formatter(&self.command, message)
    }
}

/// Owns a child process; kills and reaps it unless it was waited for.
struct ChildGuard {
    child: Option<Child>,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self { child: Some(child) }
    }

    fn child_mut(&mut self) -> Option<&mut Child> {
        self.child.as_mut()
    }

    fn wait(&mut self) -> io::Result<ExitStatus> {
        match self.child.take() {
            Some(mut child) => child.wait(),
            None => Err(io::Error::new(io::ErrorKind::Other, "child already reaped")),
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            debug!("Killing diff formatter process {}", child.id());
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

// ============================================================================
// Diff Formatter
// ============================================================================

/// A rendered diff, plus the formatter error when the raw rendering was used
/// as fallback.
#[derive(Debug)]
pub struct FormattedDiff {
    /// Lines to print
    pub lines: Vec<String>,
    /// Why the external formatter was bypassed
    pub fallback: Option<Error>,
}

/// Renders diffs, piping them through an external formatter when one is
/// configured.
#[derive(Debug, Clone)]
pub struct DiffFormatter {
    renderer: DiffRenderer,
    external: Option<ExternalFormatter>,
}

impl DiffFormatter {
    /// Create a formatter.
    pub fn new(renderer: DiffRenderer, external: Option<ExternalFormatter>) -> Self {
        Self { renderer, external }
    }

    /// Build from render settings.
    pub fn from_config(config: &RenderConfig) -> Result<Self> {
        let external = config
            .diff_formatter
            .as_deref()
            .map(ExternalFormatter::parse)
            .transpose()?;
        Ok(Self::new(DiffRenderer::new(config.colors_enabled()), external))
    }

    /// Render one diff.
    pub fn format(&self, diff: &FileDiff) -> FormattedDiff {
        let lines = self.renderer.render(diff);
        let Some(external) = &self.external else {
            return FormattedDiff {
                lines,
                fallback: None,
            };
        };

        let mut input = lines
            .iter()
            .map(|line| strip_ansi(line))
            .collect::<Vec<_>>()
            .join("\n");
        input.push('\n');

        match external.format(&input) {
            Ok(output) => FormattedDiff {
                lines: output.lines().map(String::from).collect(),
                fallback: None,
            },
            Err(e) => FormattedDiff {
                lines,
                fallback: Some(e),
            },
        }
    }
}
