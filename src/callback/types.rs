//! Event and result types for the aggregation engine
//!
//! This module defines the inbound event contract emitted by the execution
//! engine and the result model the aggregator buffers per task.
//!
//! ## Wire Format
//!
//! Events arrive as JSON objects, one per line, tagged by `event`:
//!
//! ```text
//! {"event": "play_start", "name": "compute", "hosts": ["c1", "c2"]}
//! {"event": "task_start", "name": "install packages"}
//! {"event": "host_result", "host": "c1", "result": {"status": "changed", "msg": "installed"}}
//! {"event": "item_result", "host": "c2", "item": "vim", "result": {"status": "ok"}}
//! {"event": "playbook_end"}
//! ```

use std::fmt;
use std::str::FromStr;

use colored::Color;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::{Error, Result};

/// Result keys that repeat the outcome kind and are dropped on ingestion.
const STATUS_FLAGS: &[&str] = &["changed", "failed", "skipped", "unreachable"];

/// Message used when a changed result reports no diff.
pub const NO_DIFF_REPORTED: &str = "task reports changed=true but does not report any diff.";

// ============================================================================
// Outcome Kind
// ============================================================================

/// Terminal classification of a host-task pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    /// Completed without changes
    Ok,
    /// Completed and changed something
    Changed,
    /// Host could not be reached
    Unreachable,
    /// Task failed
    Failed,
    /// Task was skipped
    Skipped,
    /// Failure handled by a rescue block
    Rescued,
    /// Failure ignored by `ignore_errors`
    Ignored,
    /// Host was still running when the run was cancelled
    Interrupted,
}

impl OutcomeKind {
    /// All kinds, in status line and recap order.
    pub const ALL: [OutcomeKind; 8] = [
        OutcomeKind::Ok,
        OutcomeKind::Changed,
        OutcomeKind::Unreachable,
        OutcomeKind::Failed,
        OutcomeKind::Skipped,
        OutcomeKind::Rescued,
        OutcomeKind::Ignored,
        OutcomeKind::Interrupted,
    ];

    /// Lowercase name used in the transcript.
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeKind::Ok => "ok",
            OutcomeKind::Changed => "changed",
            OutcomeKind::Unreachable => "unreachable",
            OutcomeKind::Failed => "failed",
            OutcomeKind::Skipped => "skipped",
            OutcomeKind::Rescued => "rescued",
            OutcomeKind::Ignored => "ignored",
            OutcomeKind::Interrupted => "interrupted",
        }
    }

    /// Terminal color for this kind.
    pub fn color(self) -> Color {
        match self {
            OutcomeKind::Ok => Color::Green,
            OutcomeKind::Changed => Color::Yellow,
            OutcomeKind::Unreachable => Color::BrightRed,
            OutcomeKind::Failed | OutcomeKind::Interrupted => Color::Red,
            OutcomeKind::Skipped => Color::Cyan,
            OutcomeKind::Rescued => Color::Magenta,
            OutcomeKind::Ignored => Color::Blue,
        }
    }

    /// Failed and unreachable hosts are not targeted by later tasks of a play.
    pub fn removes_host(self) -> bool {
        matches!(self, OutcomeKind::Failed | OutcomeKind::Unreachable)
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutcomeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ok" => Ok(OutcomeKind::Ok),
            "changed" => Ok(OutcomeKind::Changed),
            "unreachable" => Ok(OutcomeKind::Unreachable),
            "failed" | "fatal" => Ok(OutcomeKind::Failed),
            "skipped" | "skipping" => Ok(OutcomeKind::Skipped),
            "rescued" => Ok(OutcomeKind::Rescued),
            "ignored" => Ok(OutcomeKind::Ignored),
            "interrupted" => Ok(OutcomeKind::Interrupted),
            other => Err(Error::malformed(format!("unknown result status '{}'", other))),
        }
    }
}

// ============================================================================
// Payload
// ============================================================================

/// Structured result payload: a message plus arbitrary extra attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    /// Human readable message
    pub msg: Option<String>,
    /// Kind-specific fields, in the order the engine reported them
    pub extra: IndexMap<String, JsonValue>,
}

impl Payload {
    /// Create an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the payload carries nothing at all.
    pub fn is_empty(&self) -> bool {
        self.msg.is_none() && self.extra.is_empty()
    }

    /// Convert into a JSON object with `msg` first.
    pub fn to_value(&self) -> JsonValue {
        let mut map = Map::new();
        if let Some(msg) = &self.msg {
            map.insert("msg".to_string(), JsonValue::String(msg.clone()));
        }
        for (key, value) in &self.extra {
            map.insert(key.clone(), value.clone());
        }
        JsonValue::Object(map)
    }

    /// Payload as shown to operators.
    ///
    /// Internal keys and invocation details are removed, and `stdout_lines` /
    /// `stderr_lines` are dropped when the plain text is also present.
    pub fn cleaned(&self) -> Payload {
        let mut cleaned = self.clone();
        cleaned.extra.retain(|key, _| !is_internal_key(key));
        for (text, lines) in [("stdout", "stdout_lines"), ("stderr", "stderr_lines")] {
            if cleaned.extra.contains_key(text) {
                cleaned.extra.shift_remove(lines);
            }
        }
        cleaned
    }
}

/// Keys that never take part in display or comparison.
pub(crate) fn is_internal_key(key: &str) -> bool {
    key.starts_with("_ansible") || matches!(key, "invocation" | "item" | "results")
}

fn value_to_text(value: JsonValue) -> String {
    match value {
        JsonValue::String(text) => text,
        other => other.to_string(),
    }
}

fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        JsonValue::String(s) => !s.is_empty() && s != "false" && s != "0",
        JsonValue::Array(items) => !items.is_empty(),
        JsonValue::Object(map) => !map.is_empty(),
    }
}

// ============================================================================
// File Diff
// ============================================================================

/// One before/after file diff attached to a result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileDiff {
    /// Content before the change
    #[serde(default, deserialize_with = "lenient_text")]
    pub before: Option<String>,
    /// Content after the change
    #[serde(default, deserialize_with = "lenient_text")]
    pub after: Option<String>,
    /// Label for the before side (usually a path)
    #[serde(default, deserialize_with = "lenient_text")]
    pub before_header: Option<String>,
    /// Label for the after side
    #[serde(default, deserialize_with = "lenient_text")]
    pub after_header: Option<String>,
    /// Pre-rendered diff text
    #[serde(default, deserialize_with = "lenient_text")]
    pub prepared: Option<String>,
    /// Source file looked binary
    #[serde(default, deserialize_with = "lenient_flag")]
    pub src_binary: bool,
    /// Destination file looked binary
    #[serde(default, deserialize_with = "lenient_flag")]
    pub dst_binary: bool,
    /// Source exceeded the size limit (the limit)
    #[serde(default)]
    pub src_larger: Option<u64>,
    /// Destination exceeded the size limit (the limit)
    #[serde(default)]
    pub dst_larger: Option<u64>,
}

impl FileDiff {
    /// Create a diff between two texts.
    pub fn new(before: impl Into<String>, after: impl Into<String>) -> Self {
        Self {
            before: Some(before.into()),
            after: Some(after.into()),
            ..Default::default()
        }
    }

    /// Create a diff carrying pre-rendered text.
    pub fn prepared(text: impl Into<String>) -> Self {
        Self {
            prepared: Some(text.into()),
            ..Default::default()
        }
    }

    /// Placeholder for changed results without a diff.
    pub fn no_diff_reported() -> Self {
        Self::prepared(NO_DIFF_REPORTED)
    }

    /// Set the before/after labels.
    pub fn with_headers(mut self, before: impl Into<String>, after: impl Into<String>) -> Self {
        self.before_header = Some(before.into());
        self.after_header = Some(after.into());
        self
    }

    /// The diff with its labels removed; two diffs are the same change when
    /// their bodies are equal.
    pub fn body(&self) -> FileDiff {
        FileDiff {
            before_header: None,
            after_header: None,
            ..self.clone()
        }
    }
}

fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = JsonValue::deserialize(deserializer)?;
    Ok(match value {
        JsonValue::Null => None,
        JsonValue::String(text) => Some(text),
        // structured before/after (e.g. dicts) are compared as pretty JSON
        other => Some(serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string())),
    })
}

fn lenient_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(is_truthy(&JsonValue::deserialize(deserializer)?))
}

// ============================================================================
// Notices
// ============================================================================

/// Kind of side message a result carries next to its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    /// Module warning
    Warning,
    /// Deprecation notice
    Deprecation,
    /// Exception text, usually a traceback
    Exception,
}

impl NoticeKind {
    /// Name used in "same warning as" lines.
    pub fn as_str(self) -> &'static str {
        match self {
            NoticeKind::Warning => "warning",
            NoticeKind::Deprecation => "deprecation",
            NoticeKind::Exception => "exception",
        }
    }
}

impl fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Warnings, deprecations and exceptions reported with a result.
///
/// They are shown apart from the result body and never take part in result
/// equality.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Notices {
    /// Warning messages
    pub warnings: Vec<String>,
    /// Deprecation messages
    pub deprecations: Vec<String>,
    /// Exception texts
    pub exceptions: Vec<String>,
}

impl Notices {
    /// Check if there is nothing to report.
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty() && self.deprecations.is_empty() && self.exceptions.is_empty()
    }

    /// All notices in display order.
    pub fn iter(&self) -> impl Iterator<Item = (NoticeKind, &str)> {
        let warnings = self.warnings.iter().map(|text| (NoticeKind::Warning, text.as_str()));
        let deprecations = self.deprecations.iter().map(|text| (NoticeKind::Deprecation, text.as_str()));
        let exceptions = self.exceptions.iter().map(|text| (NoticeKind::Exception, text.as_str()));
        warnings.chain(deprecations).chain(exceptions)
    }

    /// Move the notice keys out of a raw result.
    fn take_from(fields: &mut IndexMap<String, JsonValue>) -> Self {
        let mut exceptions = notice_texts(fields.shift_remove("exception"), value_to_text);
        exceptions.extend(notice_texts(fields.shift_remove("exceptions"), value_to_text));
        Self {
            warnings: notice_texts(fields.shift_remove("warnings"), value_to_text),
            deprecations: notice_texts(fields.shift_remove("deprecations"), deprecation_text),
            exceptions,
        }
    }
}

fn notice_texts(value: Option<JsonValue>, text: fn(JsonValue) -> String) -> Vec<String> {
    let values = match value {
        None | Some(JsonValue::Null) => Vec::new(),
        Some(JsonValue::Array(items)) => items,
        Some(other) => vec![other],
    };
    values
        .into_iter()
        .map(text)
        .filter(|text| !text.is_empty())
        .collect()
}

/// `{"msg": ..., "version": ...}` becomes `msg (removed in version ...)`.
fn deprecation_text(value: JsonValue) -> String {
    let JsonValue::Object(mut map) = value else {
        return value_to_text(value);
    };
    let msg = map.remove("msg").map(value_to_text).unwrap_or_default();
    match map.remove("version").or_else(|| map.remove("date")) {
        Some(JsonValue::Null) | None => msg,
        Some(when) => format!("{} (removed in version {})", msg, value_to_text(when)),
    }
}

// ============================================================================
// Host Result
// ============================================================================

/// The outcome of one host-task pair (or one loop item).
#[derive(Debug, Clone, PartialEq)]
pub struct HostResult {
    /// Outcome kind
    pub outcome: OutcomeKind,
    /// Structured payload
    pub payload: Payload,
    /// File diffs, one per changed file or looped item
    pub diffs: Vec<FileDiff>,
    /// Warnings, deprecations and exceptions
    pub notices: Notices,
    /// Per-item breakdown of a looped task
    pub items: Vec<(String, HostResult)>,
    /// Marks the engine's end-of-loop record
    pub loop_total: bool,
}

impl HostResult {
    /// Create an empty result with the given outcome.
    pub fn new(outcome: OutcomeKind) -> Self {
        Self {
            outcome,
            payload: Payload::new(),
            diffs: Vec::new(),
            notices: Notices::default(),
            items: Vec::new(),
            loop_total: false,
        }
    }

    /// An `ok` result with a message.
    pub fn ok(msg: impl Into<String>) -> Self {
        Self::new(OutcomeKind::Ok).with_msg(msg)
    }

    /// A `changed` result with a message.
    pub fn changed(msg: impl Into<String>) -> Self {
        Self::new(OutcomeKind::Changed).with_msg(msg)
    }

    /// A `failed` result with a message.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::new(OutcomeKind::Failed).with_msg(msg)
    }

    /// A `skipped` result with a message.
    pub fn skipped(msg: impl Into<String>) -> Self {
        Self::new(OutcomeKind::Skipped).with_msg(msg)
    }

    /// Set the message.
    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        self.payload.msg = Some(msg.into());
        self
    }

    /// Add an extra payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.payload.extra.insert(key.into(), value.into());
        self
    }

    /// Attach a file diff.
    pub fn with_diff(mut self, diff: FileDiff) -> Self {
        self.diffs.push(diff);
        self
    }

    /// Attach a warning.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.notices.warnings.push(warning.into());
        self
    }

    /// Mark as the end-of-loop record.
    pub fn as_loop_total(mut self) -> Self {
        self.loop_total = true;
        self
    }

    /// Decode a result object as emitted by the execution engine.
    ///
    /// `status` selects the outcome; without it the Ansible-style boolean
    /// flags (`failed`, `unreachable`, `skipped`, `changed`) decide. A
    /// non-object value becomes the message of an `ok` result.
    pub fn from_value(value: JsonValue) -> Result<Self> {
        let mut fields: IndexMap<String, JsonValue> = match value {
            JsonValue::Object(map) => map.into_iter().collect(),
            JsonValue::Null => IndexMap::new(),
            other => {
                let mut fields = IndexMap::new();
                fields.insert("msg".to_string(), other);
                fields
            }
        };

        let outcome = match fields.shift_remove("status") {
            Some(JsonValue::String(status)) => status.parse()?,
            Some(other) => {
                return Err(Error::malformed(format!("result status must be a string, got {}", other)))
            }
            None => Self::outcome_from_flags(&fields),
        };
        for flag in STATUS_FLAGS {
            fields.shift_remove(*flag);
        }

        let diffs = match fields.shift_remove("diff") {
            None | Some(JsonValue::Null) => Vec::new(),
            Some(JsonValue::Array(items)) => items
                .into_iter()
                .map(serde_json::from_value)
                .collect::<std::result::Result<Vec<FileDiff>, _>>()?,
            Some(object @ JsonValue::Object(_)) => vec![serde_json::from_value(object)?],
            Some(other) => {
                return Err(Error::malformed(format!("result diff must be an object or list, got {}", other)))
            }
        };

        let notices = Notices::take_from(&mut fields);
        let loop_total = fields
            .shift_remove("loop_total")
            .is_some_and(|value| is_truthy(&value));

        let mut msg = fields.shift_remove("msg").map(value_to_text);
        if msg.is_none() && outcome == OutcomeKind::Skipped {
            msg = fields.shift_remove("skip_reason").map(value_to_text);
        }

        Ok(Self {
            outcome,
            payload: Payload { msg, extra: fields },
            diffs,
            notices,
            items: Vec::new(),
            loop_total,
        })
    }

    fn outcome_from_flags(fields: &IndexMap<String, JsonValue>) -> OutcomeKind {
        let flag = |key: &str| fields.get(key).is_some_and(is_truthy);
        if flag("unreachable") {
            OutcomeKind::Unreachable
        } else if flag("failed") {
            OutcomeKind::Failed
        } else if flag("skipped") {
            OutcomeKind::Skipped
        } else if flag("changed") {
            OutcomeKind::Changed
        } else {
            OutcomeKind::Ok
        }
    }
}

// ============================================================================
// Result Identity
// ============================================================================

/// Identifies who produced a result: a host, or one loop item on a host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResultId {
    /// A whole host-task pair
    Host(String),
    /// One item of a looped task
    Item {
        /// Host name
        host: String,
        /// Item label
        item: String,
    },
}

impl ResultId {
    /// The host this result belongs to.
    pub fn host(&self) -> &str {
        match self {
            ResultId::Host(host) => host,
            ResultId::Item { host, .. } => host,
        }
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultId::Host(host) => f.write_str(host),
            ResultId::Item { host, item } => write!(f, "{} (item={})", host, item),
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// Lifecycle events emitted by the execution engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A playbook run begins.
    PlaybookStart {
        /// Playbook name
        name: String,
    },
    /// A play begins with its resolved host set.
    PlayStart {
        /// Play name or host pattern
        name: String,
        /// Hosts the play targets
        hosts: Vec<String>,
    },
    /// A task begins.
    TaskStart {
        /// Task name
        name: String,
        /// Explicit targets; defaults to the play's remaining hosts
        hosts: Option<Vec<String>>,
    },
    /// A host started working on the current task.
    HostStart {
        /// Host name
        host: String,
    },
    /// A host finished the current task.
    HostResult {
        /// Host name
        host: String,
        /// The result
        result: HostResult,
    },
    /// A host finished one loop item of the current task.
    ItemResult {
        /// Host name
        host: String,
        /// Item label
        item: String,
        /// The item's result
        result: HostResult,
    },
    /// The playbook run ended.
    PlaybookEnd,
    /// The run was cancelled.
    Interrupt,
}

/// Raw wire shape, decoded before results are interpreted.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WireEvent {
    PlaybookStart {
        #[serde(default)]
        name: String,
    },
    PlayStart {
        #[serde(default)]
        name: String,
        #[serde(default)]
        hosts: Vec<String>,
    },
    TaskStart {
        name: String,
        #[serde(default)]
        hosts: Option<Vec<String>>,
    },
    HostStart {
        host: String,
    },
    HostResult {
        host: String,
        #[serde(default)]
        result: JsonValue,
    },
    ItemResult {
        host: String,
        #[serde(default)]
        item: JsonValue,
        #[serde(default)]
        result: JsonValue,
    },
    PlaybookEnd,
    Interrupt,
}

impl Event {
    /// Decode one JSON event.
    pub fn from_json(line: &str) -> Result<Self> {
        let wire: WireEvent = serde_json::from_str(line)?;
        Ok(match wire {
            WireEvent::PlaybookStart { name } => Event::PlaybookStart { name },
            WireEvent::PlayStart { name, hosts } => Event::PlayStart { name, hosts },
            WireEvent::TaskStart { name, hosts } => Event::TaskStart { name, hosts },
            WireEvent::HostStart { host } => Event::HostStart { host },
            WireEvent::HostResult { host, result } => Event::HostResult {
                result: HostResult::from_value(result)
                    .map_err(|e| Error::malformed(format!("result for host '{}': {}", host, e.detail())))?,
                host,
            },
            WireEvent::ItemResult { host, item, result } => Event::ItemResult {
                result: HostResult::from_value(result)
                    .map_err(|e| Error::malformed(format!("item result for host '{}': {}", host, e.detail())))?,
                item: value_to_text(item),
                host,
            },
            WireEvent::PlaybookEnd => Event::PlaybookEnd,
            WireEvent::Interrupt => Event::Interrupt,
        })
    }

    /// Event name as used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Event::PlaybookStart { .. } => "playbook_start",
            Event::PlayStart { .. } => "play_start",
            Event::TaskStart { .. } => "task_start",
            Event::HostStart { .. } => "host_start",
            Event::HostResult { .. } => "host_result",
            Event::ItemResult { .. } => "item_result",
            Event::PlaybookEnd => "playbook_end",
            Event::Interrupt => "interrupt",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
