//! Diff rendering for file changes reported by tasks
//!
//! This module renders a [`FileDiff`] as text:
//! - Unified diff of the before/after bodies (three lines of context)
//! - Pre-rendered (`prepared`) diffs passed through unchanged
//! - Skip notices for binary or oversized files
//! - Optional piping through an external formatter (see [`ExternalFormatter`])
//!
//! # Example
//!
//! ```rust
//! use fleetrecap::callback::FileDiff;
//! use fleetrecap::diff::DiffRenderer;
//!
//! let renderer = DiffRenderer::new(false);
//! let lines = renderer.render(&FileDiff::new("a\n", "b\n").with_headers("/etc/motd", "/etc/motd"));
//! assert_eq!(lines[0], "--- before: /etc/motd");
//! assert_eq!(lines[2], "@@ -1 +1 @@");
//! ```

mod formatter;

pub use formatter::{DiffFormatter, ExternalFormatter, FormattedDiff};

use std::borrow::Cow;

use colored::Colorize;
use once_cell::sync::Lazy;
use regex::Regex;
use similar::{ChangeTag, TextDiff};

use crate::callback::FileDiff;

/// Matches CSI and OSC terminal escape sequences.
static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)")
        .expect("ANSI escape pattern is valid")
});

/// Remove terminal escape sequences from `text`.
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    ANSI_ESCAPE.replace_all(text, "")
}

/// Renders [`FileDiff`]s in fixed unified style.
#[derive(Debug, Clone)]
pub struct DiffRenderer {
    /// Number of context lines around changes
    context_lines: usize,
    /// Whether to use color output
    use_color: bool,
}

impl Default for DiffRenderer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl DiffRenderer {
    /// Create a renderer with three lines of context.
    pub fn new(use_color: bool) -> Self {
        Self {
            context_lines: 3,
            use_color,
        }
    }

    /// Render one diff as lines.
    pub fn render(&self, diff: &FileDiff) -> Vec<String> {
        let mut lines = Vec::new();

        if diff.dst_binary {
            lines.push("diff skipped: destination file appears to be binary".to_string());
        }
        if diff.src_binary {
            lines.push("diff skipped: source file appears to be binary".to_string());
        }
        if let Some(limit) = diff.dst_larger {
            lines.push(format!("diff skipped: destination file size is greater than {}", limit));
        }
        if let Some(limit) = diff.src_larger {
            lines.push(format!("diff skipped: source file size is greater than {}", limit));
        }

        if diff.before.is_some() || diff.after.is_some() {
            let before = diff.before.as_deref().unwrap_or("");
            let after = diff.after.as_deref().unwrap_or("");
            if before == after {
                lines.push("diff skipped: before and after are equal".to_string());
            } else {
                lines.extend(self.unified(
                    before,
                    after,
                    diff.before_header.as_deref(),
                    diff.after_header.as_deref(),
                ));
            }
        }

        if let Some(prepared) = &diff.prepared {
            lines.extend(prepared.lines().map(String::from));
        }

        lines
    }

    fn unified(
        &self,
        before: &str,
        after: &str,
        before_label: Option<&str>,
        after_label: Option<&str>,
    ) -> Vec<String> {
        let text_diff = TextDiff::from_lines(before, after);
        let mut unified = text_diff.unified_diff();
        unified.context_radius(self.context_lines);

        let mut lines = vec![
            self.paint_delete(&header("--- before", before_label)),
            self.paint_insert(&header("+++ after", after_label)),
        ];

        for hunk in unified.iter_hunks() {
            let hunk_header = hunk.header().to_string();
            lines.push(if self.use_color {
                hunk_header.cyan().to_string()
            } else {
                hunk_header
            });

            for change in hunk.iter_changes() {
                let value = change.value();
                let content = value.strip_suffix('\n').unwrap_or(value);
                let line = match change.tag() {
                    ChangeTag::Delete => self.paint_delete(&format!("-{}", content)),
                    ChangeTag::Insert => self.paint_insert(&format!("+{}", content)),
                    ChangeTag::Equal => format!(" {}", content),
                };
                lines.push(line);
                if change.missing_newline() {
                    lines.push("\\ No newline at end of file".to_string());
                }
            }
        }

        lines
    }

    fn paint_delete(&self, text: &str) -> String {
        if self.use_color {
            text.red().to_string()
        } else {
            text.to_string()
        }
    }

    fn paint_insert(&self, text: &str) -> String {
        if self.use_color {
            text.green().to_string()
        } else {
            text.to_string()
        }
    }
}

fn header(prefix: &str, label: Option<&str>) -> String {
    match label {
        Some(label) => format!("{}: {}", prefix, label),
        None => prefix.to_string(),
    }
}
