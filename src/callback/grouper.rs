//! Equivalence grouping of per-host results.
//!
//! Results are compared through a normalized projection: volatile fields
//! (timings) and internal keys are dropped and the host's own name is
//! replaced by a placeholder, so `node1` and `node2` failing with
//! "node1: permission denied" / "node2: permission denied" land in the
//! same group.

use regex::{NoExpand, Regex, RegexBuilder};
use serde_json::Value as JsonValue;
use tracing::debug;

use super::types::{is_internal_key, FileDiff, HostResult, NoticeKind, OutcomeKind, Payload};

/// Placeholder substituted for the host name during normalization.
pub const ANONYMOUS: &str = "ANONYMOUS";

/// Fields that change on every run and never take part in equality.
pub const DEFAULT_VOLATILE_FIELDS: &[&str] = &["delta", "start", "end", "elapsed", "duration"];

/// A set of ids sharing one normalized value.
#[derive(Debug, Clone, PartialEq)]
pub struct Group<Id, K> {
    /// The shared normalized value
    pub key: K,
    /// Members in arrival order; the first one is the representative
    pub members: Vec<Id>,
}

impl<Id, K> Group<Id, K> {
    /// The first member seen.
    pub fn representative(&self) -> &Id {
        &self.members[0]
    }

    /// Members after the representative.
    pub fn others(&self) -> &[Id] {
        &self.members[1..]
    }
}

/// Partition `(id, key)` pairs into groups of equal keys.
///
/// Groups appear in order of first occurrence and members keep arrival
/// order. Keys only need `PartialEq`, so JSON payloads can be compared
/// without hashing.
pub fn group<Id, K, I>(pairs: I) -> Vec<Group<Id, K>>
where
    I: IntoIterator<Item = (Id, K)>,
    K: PartialEq,
{
    let mut groups: Vec<Group<Id, K>> = Vec::new();
    for (id, key) in pairs {
        match groups.iter_mut().find(|g| g.key == key) {
            Some(existing) => existing.members.push(id),
            None => groups.push(Group {
                key,
                members: vec![id],
            }),
        }
    }
    groups
}

/// Equality key of a host (or loop aggregate) result.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultKey {
    /// Outcome kind
    pub outcome: OutcomeKind,
    /// Normalized payload
    pub payload: Payload,
    /// Diff bodies without headers
    pub diffs: Vec<FileDiff>,
}

/// Equality key of a loop item result.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemKey {
    /// Item label
    pub item: String,
    /// The item's result key
    pub result: ResultKey,
}

/// Builds normalized projections of results.
#[derive(Debug, Clone)]
pub struct Normalizer {
    volatile_fields: Vec<String>,
    anonymize_hosts: bool,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(
            DEFAULT_VOLATILE_FIELDS.iter().map(|s| s.to_string()).collect(),
            true,
        )
    }
}

impl Normalizer {
    /// Create a normalizer.
    pub fn new(volatile_fields: Vec<String>, anonymize_hosts: bool) -> Self {
        Self {
            volatile_fields,
            anonymize_hosts,
        }
    }

    /// Whole-word, case-insensitive matcher for `host`, when anonymizing.
    fn host_pattern(&self, host: &str) -> Option<Regex> {
        if !self.anonymize_hosts || host.is_empty() {
            return None;
        }
        match RegexBuilder::new(&format!(r"\b{}\b", regex::escape(host)))
            .case_insensitive(true)
            .build()
        {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                debug!("Not anonymizing host '{}': {}", host, e);
                None
            }
        }
    }

    /// Normalize a payload produced by `host`.
    pub fn payload(&self, host: &str, payload: &Payload) -> Payload {
        let mut extra = payload.extra.clone();
        extra.retain(|key, _| {
            !is_internal_key(key) && !self.volatile_fields.iter().any(|field| field == key)
        });
        let mut normalized = Payload {
            msg: payload.msg.clone(),
            extra,
        };

        if let Some(pattern) = self.host_pattern(host) {
            let replace = |text: &str| pattern.replace_all(text, NoExpand(ANONYMOUS)).into_owned();
            normalized.msg = normalized.msg.as_deref().map(|msg| replace(msg));
            for value in normalized.extra.values_mut() {
                anonymize_value(value, &replace);
            }
        }
        normalized
    }

    /// Equality key of a warning, deprecation or exception text from `host`.
    pub fn notice_key(&self, host: &str, kind: NoticeKind, text: &str) -> (NoticeKind, String) {
        let text = match self.host_pattern(host) {
            Some(pattern) => pattern.replace_all(text, NoExpand(ANONYMOUS)).into_owned(),
            None => text.to_string(),
        };
        (kind, text)
    }

    /// Equality key of a result produced by `host`.
    pub fn result_key(&self, host: &str, result: &HostResult) -> ResultKey {
        ResultKey {
            outcome: result.outcome,
            payload: self.payload(host, &result.payload),
            diffs: result.diffs.iter().map(FileDiff::body).collect(),
        }
    }

    /// Equality key of one loop item produced by `host`.
    pub fn item_key(&self, host: &str, item: &str, result: &HostResult) -> ItemKey {
        ItemKey {
            item: item.to_string(),
            result: self.result_key(host, result),
        }
    }
}

fn anonymize_value(value: &mut JsonValue, replace: &dyn Fn(&str) -> String) {
    match value {
        JsonValue::String(text) => *text = replace(text),
        JsonValue::Array(items) => items.iter_mut().for_each(|v| anonymize_value(v, replace)),
        JsonValue::Object(map) => map.values_mut().for_each(|v| anonymize_value(v, replace)),
        _ => {}
    }
}
