//! Line formatting for the transcript.
//!
//! Everything here is pure string building; the aggregator decides what to
//! print and when, and pushes the lines to an
//! [`OutputSink`](crate::output::OutputSink).

use std::time::Duration;

use colored::{Color, Colorize};
use indexmap::IndexMap;

use super::counters::{HostStats, StatusCounters};
use super::types::{NoticeKind, OutcomeKind, Payload, ResultId};
use crate::error::{Error, Result};

/// Width of play/task banners.
pub const OUTPUT_WIDTH: usize = 80;

/// Column width of one live status line entry.
pub const STATUS_COLUMN_WIDTH: usize = 14;

/// Width of the host column in the recap.
pub const RECAP_HOST_WIDTH: usize = 26;

/// Recap columns always shown; `interrupted` is added on demand.
const RECAP_KINDS: [OutcomeKind; 7] = [
    OutcomeKind::Ok,
    OutcomeKind::Changed,
    OutcomeKind::Unreachable,
    OutcomeKind::Failed,
    OutcomeKind::Skipped,
    OutcomeKind::Rescued,
    OutcomeKind::Ignored,
];

/// Builds transcript lines.
#[derive(Debug, Clone)]
pub struct Renderer {
    use_color: bool,
}

impl Renderer {
    /// Create a renderer.
    pub fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.use_color {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        if self.use_color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    // ========================================================================
    // Banners
    // ========================================================================

    /// `PREFIX [name] *****` padded to [`OUTPUT_WIDTH`].
    pub fn banner(&self, prefix: &str, name: &str) -> String {
        let header = if name.is_empty() {
            prefix.to_string()
        } else {
            format!("{} [{}]", prefix, name)
        };
        let stars = "*".repeat(OUTPUT_WIDTH.saturating_sub(header.chars().count() + 1).max(3));
        format!("{} {}", self.bold(&header), stars)
    }

    /// Banner starting a playbook.
    pub fn playbook_banner(&self, name: &str) -> String {
        format!("PLAYBOOK: {}", self.bold(name))
    }

    /// Banner starting a play.
    pub fn play_header(&self, name: &str) -> String {
        self.banner("PLAY", name)
    }

    /// Banner starting a task.
    pub fn task_header(&self, name: &str) -> String {
        self.banner("TASK", name)
    }

    /// Banner above the recap table.
    pub fn recap_header(&self) -> String {
        self.banner("PLAY RECAP", "")
    }

    /// Line for a play whose host pattern matched nothing.
    pub fn no_hosts_matched(&self) -> String {
        format!("{}: no hosts matched", self.paint("skipping", Color::Cyan))
    }

    /// One-off line when a host starts working on a task.
    pub fn started_line(&self, host: &str, task: &str) -> String {
        format!("started: [{}] {}", host, task)
    }

    /// Warning line inside the transcript.
    pub fn warning_line(&self, message: &str) -> String {
        format!("{} {}", self.paint("[WARNING]:", Color::Yellow), message)
    }

    /// Side-channel message for a warning, deprecation or exception.
    pub fn notice_message(&self, kind: NoticeKind, id: &ResultId, text: &str) -> String {
        match kind {
            NoticeKind::Warning => format!("{}: {}", id, text),
            NoticeKind::Deprecation => format!("{}: [DEPRECATION] {}", id, text),
            NoticeKind::Exception => format!("{}: exception during task execution:\n{}", id, text),
        }
    }

    /// Side-channel message for a notice equal to an earlier one.
    pub fn duplicate_notice_message(&self, kind: NoticeKind, id: &ResultId, first: &ResultId) -> String {
        format!("{}: same {} as {}", id, kind, first)
    }

    /// Task duration line.
    pub fn elapsed_line(&self, elapsed: Duration) -> String {
        format!("elapsed: {:.3} seconds", elapsed.as_secs_f64())
    }

    // ========================================================================
    // Result Lines
    // ========================================================================

    fn status_prefix(&self, kind: OutcomeKind, subject: &str) -> String {
        self.paint(&format!("{}: {}", kind, subject), kind.color())
    }

    /// Whether a payload has anything worth printing.
    pub fn is_displayable(payload: &Payload) -> bool {
        !payload.cleaned().is_empty()
    }

    /// Render one result: `<status>: <id>`, `<status>: <id> => <yaml>` for a
    /// single YAML line, otherwise the YAML indented below.
    pub fn result_lines(
        &self,
        task: &str,
        kind: OutcomeKind,
        id: &ResultId,
        payload: &Payload,
    ) -> Result<Vec<String>> {
        let prefix = self.status_prefix(kind, &id.to_string());
        let cleaned = payload.cleaned();
        if cleaned.is_empty() {
            return Ok(vec![prefix]);
        }

        let yaml = serde_yaml::to_string(&cleaned.to_value())
            .map_err(|e| Error::render(task, id.to_string(), kind.as_str(), e.to_string()))?;
        let yaml = yaml.strip_prefix("---\n").unwrap_or(&yaml).trim_end();

        let mut body = yaml.lines();
        match (body.next(), body.next()) {
            (Some(only), None) => Ok(vec![format!("{} => {}", prefix, only)]),
            _ => {
                let mut lines = vec![format!("{} =>", prefix)];
                lines.extend(yaml.lines().map(|line| format!("    {}", line)));
                Ok(lines)
            }
        }
    }

    /// Line for a group member whose result equals an earlier one.
    pub fn duplicate_line(&self, kind: OutcomeKind, id: &ResultId, first: &ResultId) -> String {
        format!("{} => same result as {}", self.status_prefix(kind, &id.to_string()), first)
    }

    /// Line used when a result could not be rendered.
    pub fn fallback_line(&self, kind: OutcomeKind, id: &ResultId, error: &Error) -> String {
        format!(
            "{} => (unable to render result: {})",
            self.status_prefix(kind, &id.to_string()),
            error
        )
    }

    /// `<status>: <folded hosts>`.
    pub fn folded_line(&self, kind: OutcomeKind, folded: &str) -> String {
        self.status_prefix(kind, folded)
    }

    // ========================================================================
    // Status Line and Recap
    // ========================================================================

    /// Live status line: non-zero counters in fixed order, truncated to
    /// `width` with a `>` marker.
    pub fn status_line(&self, counters: &StatusCounters, width: usize) -> String {
        let line = Self::tally(counters);
        let width = width.max(2);
        if line.chars().count() <= width {
            return line;
        }
        let mut truncated: String = line.chars().take(width - 1).collect();
        truncated.push('>');
        truncated
    }

    fn tally(counters: &StatusCounters) -> String {
        counters
            .non_zero()
            .into_iter()
            .map(|(name, n)| format!("{:<width$}", format!("{}={}", name, n), width = STATUS_COLUMN_WIDTH))
            .collect::<String>()
            .trim_end()
            .to_string()
    }

    /// Aggregate counters printed after the recap.
    pub fn totals_line(&self, counters: &StatusCounters) -> String {
        let tally = Self::tally(counters);
        if tally.is_empty() {
            "TOTALS: no hosts".to_string()
        } else {
            format!("TOTALS: {}", tally)
        }
    }

    /// Recap rows, one per host in first-appearance order.
    pub fn recap_lines(&self, hosts: &IndexMap<String, HostStats>) -> Vec<String> {
        let show_interrupted = hosts.values().any(HostStats::was_interrupted);
        let mut kinds = RECAP_KINDS.to_vec();
        if show_interrupted {
            kinds.push(OutcomeKind::Interrupted);
        }

        hosts
            .iter()
            .map(|(host, stats)| {
                let host_color = if stats.has_failures() || stats.was_interrupted() {
                    Color::Red
                } else if stats.has_unreachable() {
                    Color::BrightRed
                } else if stats.get(OutcomeKind::Changed) > 0 {
                    Color::Yellow
                } else {
                    Color::Green
                };
                let cells = kinds
                    .iter()
                    .map(|kind| format!("{}={:<4}", kind, stats.get(*kind)))
                    .collect::<Vec<_>>()
                    .join(" ");
                let host = format!("{:<width$}", host, width = RECAP_HOST_WIDTH);
                format!("{} : {}", self.paint(&host, host_color), cells.trim_end())
            })
            .collect()
    }
}
