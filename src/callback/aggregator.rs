//! The `PlaybookRun` state machine.
//!
//! A [`PlaybookRun`] consumes lifecycle events one at a time, buffers the
//! results of the open task, keeps the run-wide counters and the per-host
//! recap, and renders grouped output through its [`OutputSink`] whenever a
//! task completes or is flushed.
//!
//! ```text
//! play_start ─► task_start ─► host_start / item_result / host_result ...
//!                   │                          │
//!                   │            all hosts resolved (or next task,
//!                   │            playbook_end, interrupt)
//!                   ▼                          ▼
//!              TASK banner            grouped result block
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, error, trace, warn};

use super::counters::{HostStats, StatusCounters};
use super::grouper::{group, Normalizer};
use super::render::Renderer;
use super::types::{Event, FileDiff, HostResult, NoticeKind, OutcomeKind, Payload, ResultId};
use crate::config::RenderConfig;
use crate::diff::DiffFormatter;
use crate::error::{Error, Result};
use crate::hostlist::fold;
use crate::output::OutputSink;

const ALL_ITEMS_COMPLETED: &str = "All items completed";
const ITEMS_FAILED: &str = "One or more items failed";
const ALL_ITEMS_SKIPPED: &str = "All items skipped";

// ============================================================================
// Run Status
// ============================================================================

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every host succeeded
    Success,
    /// At least one host failed
    Failed,
    /// At least one host was unreachable, none failed
    Unreachable,
    /// The run was cancelled
    Interrupted,
}

impl RunStatus {
    /// Process exit code for this status.
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Failed => 2,
            RunStatus::Unreachable => 4,
            RunStatus::Interrupted => 99,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
            RunStatus::Unreachable => "unreachable",
            RunStatus::Interrupted => "interrupted",
        };
        f.write_str(text)
    }
}

/// Out-of-band cancellation flag for a [`PlaybookRun`].
///
/// Triggering the handle does not touch the run; the sweep happens on the
/// next call to [`PlaybookRun::handle`] (or `finish`).
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
}

impl InterruptHandle {
    /// Create an untriggered handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Plays and Tasks
// ============================================================================

/// One play: a name, its host set and the tasks run so far.
#[derive(Debug, Clone)]
pub struct PlayRun {
    name: String,
    hosts: IndexSet<String>,
    skipped: bool,
    removed: IndexSet<String>,
    tasks: Vec<TaskRun>,
}

impl PlayRun {
    fn new(name: String, hosts: IndexSet<String>) -> Self {
        Self {
            name,
            skipped: hosts.is_empty(),
            hosts,
            removed: IndexSet::new(),
            tasks: Vec::new(),
        }
    }

    /// Play name as shown in its banner.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hosts the play targets.
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.hosts.iter().map(String::as_str)
    }

    /// Whether the host pattern matched nothing.
    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    /// Hosts dropped after failing or being unreachable.
    pub fn removed_hosts(&self) -> impl Iterator<Item = &str> {
        self.removed.iter().map(String::as_str)
    }

    /// Completed tasks.
    pub fn tasks(&self) -> &[TaskRun] {
        &self.tasks
    }

    fn remaining_hosts(&self) -> Vec<String> {
        self.hosts
            .iter()
            .filter(|host| !self.removed.contains(*host))
            .cloned()
            .collect()
    }
}

/// One task across hosts.
#[derive(Debug, Clone)]
pub struct TaskRun {
    name: String,
    results: IndexMap<String, HostResult>,
    items: IndexMap<String, Vec<(String, HostResult)>>,
    running: IndexSet<String>,
    dispatched: IndexSet<String>,
    started: Instant,
    frozen: bool,
}

impl TaskRun {
    fn new(name: String) -> Self {
        Self {
            name,
            results: IndexMap::new(),
            items: IndexMap::new(),
            running: IndexSet::new(),
            dispatched: IndexSet::new(),
            started: Instant::now(),
            frozen: false,
        }
    }

    /// Task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved results in arrival order.
    pub fn results(&self) -> &IndexMap<String, HostResult> {
        &self.results
    }

    /// Hosts that have not reported a result yet.
    pub fn running(&self) -> impl Iterator<Item = &str> {
        self.running.iter().map(String::as_str)
    }

    /// Whether the task was flushed.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

/// Roll the items of a loop up into one host result.
fn aggregate_items(engine: HostResult, items: &[(String, HostResult)]) -> HostResult {
    let any_failed = items
        .iter()
        .any(|(_, r)| matches!(r.outcome, OutcomeKind::Failed | OutcomeKind::Unreachable));
    let any_changed = items.iter().any(|(_, r)| r.outcome == OutcomeKind::Changed);
    let all_skipped = !items.is_empty() && items.iter().all(|(_, r)| r.outcome == OutcomeKind::Skipped);

    let outcome = match engine.outcome {
        kind @ (OutcomeKind::Ignored
        | OutcomeKind::Rescued
        | OutcomeKind::Interrupted
        | OutcomeKind::Unreachable) => kind,
        _ if any_failed => OutcomeKind::Failed,
        _ if any_changed => OutcomeKind::Changed,
        _ if all_skipped => OutcomeKind::Skipped,
        kind => kind,
    };
    let msg = if any_failed || outcome == OutcomeKind::Failed {
        ITEMS_FAILED
    } else if all_skipped {
        ALL_ITEMS_SKIPPED
    } else {
        ALL_ITEMS_COMPLETED
    };

    let mixed = items
        .first()
        .is_some_and(|(_, first)| items.iter().any(|(_, r)| r.outcome != first.outcome));
    let item_statuses = JsonValue::Array(
        items
            .iter()
            .map(|(label, r)| {
                let mut status = Map::new();
                status.insert(label.clone(), JsonValue::from(r.outcome.as_str()));
                JsonValue::Object(status)
            })
            .collect(),
    );

    let mut payload = if outcome == OutcomeKind::Failed {
        Payload::new()
    } else {
        let mut payload = engine.payload;
        payload.extra.shift_remove("results");
        payload
    };
    payload.msg = Some(msg.to_string());
    if mixed || outcome == OutcomeKind::Failed {
        payload.extra.insert("item_statuses".to_string(), item_statuses);
    }

    let mut diffs: Vec<FileDiff> = items.iter().flat_map(|(_, r)| r.diffs.iter().cloned()).collect();
    diffs.extend(engine.diffs);

    HostResult {
        outcome,
        payload,
        diffs,
        notices: engine.notices,
        items: items.to_vec(),
        loop_total: true,
    }
}

/// Best-effort event for a line whose result could not be decoded.
fn salvage(line: &str, reason: &Error) -> Option<Event> {
    let value: JsonValue = serde_json::from_str(line).ok()?;
    let host = value.get("host")?.as_str()?.to_string();
    let result = HostResult::failed(format!("malformed result: {}", reason.detail()));
    match value.get("event")?.as_str()? {
        "host_result" => Some(Event::HostResult { host, result }),
        "item_result" => {
            let item = match value.get("item") {
                Some(JsonValue::String(label)) => label.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            Some(Event::ItemResult { host, item, result })
        }
        _ => None,
    }
}

// ============================================================================
// Playbook Run
// ============================================================================

/// Aggregates one playbook run and renders it.
pub struct PlaybookRun<S: OutputSink> {
    config: RenderConfig,
    renderer: Renderer,
    normalizer: Normalizer,
    diffs: DiffFormatter,
    sink: S,
    width: usize,
    plays: Vec<PlayRun>,
    current: Option<TaskRun>,
    counters: StatusCounters,
    recap: IndexMap<String, HostStats>,
    interrupt: InterruptHandle,
    status: Option<RunStatus>,
}

impl<S: OutputSink> fmt::Debug for PlaybookRun<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybookRun")
            .field("plays", &self.plays.len())
            .field("counters", &self.counters)
            .field("status", &self.status)
            .finish()
    }
}

impl<S: OutputSink> PlaybookRun<S> {
    /// Start a run.
    ///
    /// Fails when the configured diff formatter command cannot be parsed.
    pub fn new(config: RenderConfig, sink: S) -> Result<Self> {
        let diffs = DiffFormatter::from_config(&config)?;
        let width = config.line_width();
        Ok(Self {
            renderer: Renderer::new(config.colors_enabled()),
            normalizer: Normalizer::new(config.volatile_fields.clone(), config.anonymize_hosts),
            diffs,
            sink,
            width,
            plays: Vec::new(),
            current: None,
            counters: StatusCounters::new(),
            recap: IndexMap::new(),
            interrupt: InterruptHandle::new(),
            status: None,
            config,
        })
    }

    /// Handle for cancelling the run from another thread or task.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// Render settings in use.
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Run-wide counters.
    pub fn counters(&self) -> &StatusCounters {
        &self.counters
    }

    /// Per-host recap rows in first-appearance order.
    pub fn recap(&self) -> &IndexMap<String, HostStats> {
        &self.recap
    }

    /// Plays seen so far.
    pub fn plays(&self) -> &[PlayRun] {
        &self.plays
    }

    /// The task currently buffering results.
    pub fn current_task(&self) -> Option<&TaskRun> {
        self.current.as_ref()
    }

    /// The output sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the run, returning the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Whether the run has ended (normally or by interrupt).
    pub fn is_finished(&self) -> bool {
        self.status.is_some()
    }

    /// Final status, once finished.
    pub fn status(&self) -> Option<RunStatus> {
        self.status
    }

    // ========================================================================
    // Event Entry Points
    // ========================================================================

    /// Decode and handle one JSON line.
    ///
    /// Undecodable lines are reported in the transcript and skipped.
    pub fn handle_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        match Event::from_json(line) {
            Ok(event) => self.handle(event),
            Err(e) => {
                self.report_malformed(e.detail())?;
                match salvage(line, &e) {
                    Some(event) => self.handle(event),
                    None => Ok(()),
                }
            }
        }
    }

    /// Handle one event.
    pub fn handle(&mut self, event: Event) -> Result<()> {
        if self.is_finished() {
            debug!("Ignoring {} event after the run ended", event.name());
            return Ok(());
        }
        if self.interrupt.is_interrupted() {
            debug!("Interrupt pending, dropping {} event", event.name());
            return self.interrupt();
        }
        trace!("Handling {} event", event.name());

        match event {
            Event::PlaybookStart { name } => self.on_playbook_start(&name)?,
            Event::PlayStart { name, hosts } => self.on_play_start(name, hosts)?,
            Event::TaskStart { name, hosts } => self.on_task_start(name, hosts)?,
            Event::HostStart { host } => self.on_host_start(host)?,
            Event::ItemResult { host, item, result } => self.on_item_result(host, item, result)?,
            Event::HostResult { host, result } => self.on_host_result(host, result)?,
            Event::PlaybookEnd => self.end()?,
            Event::Interrupt => self.interrupt()?,
        }

        debug_assert!(self.counters.is_consistent(), "counter invariant broken");
        Ok(())
    }

    /// Cancel the run: every host still running becomes `interrupted`, the
    /// open task is flushed and the recap printed. Idempotent.
    pub fn interrupt(&mut self) -> Result<()> {
        if self.is_finished() {
            return Ok(());
        }
        self.interrupt.interrupt();

        let mut interrupted = Vec::new();
        if let Some(task) = self.current.as_mut() {
            for host in task.running.drain(..) {
                self.counters.resolve(OutcomeKind::Interrupted);
                self.recap.entry(host.clone()).or_default().record(OutcomeKind::Interrupted);
                interrupted.push(host);
            }
        }
        warn!("Run interrupted with {} host(s) still running", interrupted.len());

        self.flush_task()?;
        if !interrupted.is_empty() {
            let line = self.renderer.folded_line(OutcomeKind::Interrupted, &fold(&interrupted));
            self.sink.append(&line)?;
        }
        self.print_recap()?;
        self.status = Some(RunStatus::Interrupted);
        self.sink.flush()?;
        Ok(())
    }

    /// End the run, flushing whatever is buffered, and return its status.
    pub fn finish(&mut self) -> Result<RunStatus> {
        if self.interrupt.is_interrupted() {
            self.interrupt()?;
        }
        if !self.is_finished() {
            self.end()?;
        }
        Ok(self.status.unwrap_or(RunStatus::Success))
    }

    // ========================================================================
    // Event Handlers
    // ========================================================================

    fn on_playbook_start(&mut self, name: &str) -> Result<()> {
        let line = self.renderer.playbook_banner(name);
        self.sink.append(&line)?;
        Ok(())
    }

    fn on_play_start(&mut self, name: String, hosts: Vec<String>) -> Result<()> {
        self.flush_task()?;
        let hosts: IndexSet<String> = hosts.into_iter().collect();
        let name = if name.is_empty() { fold(&hosts) } else { name };
        debug!("Play '{}' starts on {} host(s)", name, hosts.len());

        let play = PlayRun::new(name, hosts);
        self.sink.append("")?;
        self.sink.append(&self.renderer.play_header(&play.name))?;
        if play.skipped {
            self.sink.append(&self.renderer.no_hosts_matched())?;
        }
        self.plays.push(play);
        Ok(())
    }

    fn on_task_start(&mut self, name: String, hosts: Option<Vec<String>>) -> Result<()> {
        self.flush_task()?;
        let Some(play) = self.plays.last() else {
            return self.report_malformed(format!("task '{}' started outside of a play", name));
        };
        if play.skipped {
            debug!("Ignoring task '{}' of play without hosts", name);
            return Ok(());
        }

        let targets = match hosts {
            Some(hosts) => hosts,
            None => play.remaining_hosts(),
        };
        let mut task = TaskRun::new(name);
        for host in targets {
            Self::dispatch(&mut self.counters, &mut self.recap, &mut task, host);
        }
        debug!("Task '{}' dispatched to {} host(s)", task.name, task.running.len());

        self.sink.append("")?;
        self.sink.append(&self.renderer.task_header(&task.name))?;
        self.current = Some(task);
        self.refresh()
    }

    fn on_host_start(&mut self, host: String) -> Result<()> {
        let Some(task) = self.current.as_mut() else {
            return self.orphan("host_start", &host);
        };
        let line = self.renderer.started_line(&host, &task.name);
        if !task.dispatched.contains(&host) {
            Self::dispatch(&mut self.counters, &mut self.recap, task, host);
        }
        if self.config.show_host_start {
            self.sink.append(&line)?;
        }
        self.refresh()
    }

    fn on_item_result(&mut self, host: String, item: String, result: HostResult) -> Result<()> {
        let Some(task) = self.current.as_mut() else {
            return self.orphan("item_result", &host);
        };
        if !task.dispatched.contains(&host) {
            Self::dispatch(&mut self.counters, &mut self.recap, task, host.clone());
        }
        if !task.running.contains(&host) {
            let message = format!("ignoring item result for host '{}', which already finished task '{}'", host, task.name);
            return self.warn_line(&message);
        }
        task.items.entry(host).or_default().push((item, result));
        self.refresh()
    }

    fn on_host_result(&mut self, host: String, result: HostResult) -> Result<()> {
        let Some(task) = self.current.as_mut() else {
            return self.orphan("host_result", &host);
        };
        if !task.dispatched.contains(&host) {
            Self::dispatch(&mut self.counters, &mut self.recap, task, host.clone());
        }
        if !task.running.contains(&host) {
            let message = format!("ignoring duplicate result for host '{}' in task '{}'", host, task.name);
            return self.warn_line(&message);
        }

        let result = match task.items.get(&host) {
            Some(items) if !items.is_empty() => aggregate_items(result, items),
            _ if result.loop_total => aggregate_items(result, &[]),
            _ => result,
        };
        self.record(host, result);

        if self.current.as_ref().is_some_and(|task| task.running.is_empty()) {
            self.flush_task()
        } else {
            self.refresh()
        }
    }

    fn end(&mut self) -> Result<()> {
        self.flush_task()?;
        self.print_recap()?;
        let totals = self.renderer.totals_line(&self.counters);
        self.sink.append(&totals)?;

        let status = if self.recap.values().any(HostStats::has_failures) {
            RunStatus::Failed
        } else if self.recap.values().any(HostStats::has_unreachable) {
            RunStatus::Unreachable
        } else {
            RunStatus::Success
        };
        debug!("Run finished: {}", status);
        self.status = Some(status);
        self.sink.flush()?;
        Ok(())
    }

    // ========================================================================
    // Bookkeeping
    // ========================================================================

    fn dispatch(
        counters: &mut StatusCounters,
        recap: &mut IndexMap<String, HostStats>,
        task: &mut TaskRun,
        host: String,
    ) {
        if !task.dispatched.insert(host.clone()) {
            return;
        }
        counters.dispatch(1);
        recap.entry(host.clone()).or_default();
        task.running.insert(host);
    }

    /// Resolve `host` in the open task.
    fn record(&mut self, host: String, result: HostResult) {
        let Some(task) = self.current.as_mut() else {
            return;
        };
        let kind = result.outcome;
        if !task.running.shift_remove(&host) {
            return;
        }
        self.counters.resolve(kind);
        self.recap.entry(host.clone()).or_default().record(kind);
        if kind.removes_host() {
            if let Some(play) = self.plays.last_mut() {
                play.removed.insert(host.clone());
            }
        }
        task.results.insert(host, result);
    }

    fn refresh(&mut self) -> Result<()> {
        if self.config.renderer.has_live_line() {
            let line = self.renderer.status_line(&self.counters, self.width);
            self.sink.replace(&line)?;
        }
        Ok(())
    }

    /// Note an event that could not be used, in the transcript and the log.
    pub fn report_malformed(&mut self, reason: impl fmt::Display) -> Result<()> {
        warn!("Skipping malformed event: {}", reason);
        let line = self.renderer.warning_line(&format!("skipping malformed event: {}", reason));
        self.sink.append(&line)?;
        Ok(())
    }

    /// A host event arrived with no open task.
    fn orphan(&mut self, event: &str, host: &str) -> Result<()> {
        if self.plays.last().is_some_and(PlayRun::is_skipped) {
            debug!("Ignoring {} for '{}' in play without hosts", event, host);
            return Ok(());
        }
        self.report_malformed(format!("{} for host '{}' outside of a task", event, host))
    }

    fn warn_line(&mut self, message: &str) -> Result<()> {
        warn!("{}", message);
        let line = self.renderer.warning_line(message);
        self.sink.append(&line)?;
        Ok(())
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    fn print_recap(&mut self) -> Result<()> {
        self.sink.commit()?;
        self.sink.append("")?;
        self.sink.append(&self.renderer.recap_header())?;
        for line in self.renderer.recap_lines(&self.recap) {
            self.sink.append(&line)?;
        }
        self.sink.append("")?;
        Ok(())
    }

    /// Freeze the open task and render its result block.
    fn flush_task(&mut self) -> Result<()> {
        let Some(mut task) = self.current.take() else {
            return Ok(());
        };

        // hosts that never sent a final result
        let mut missing = Vec::new();
        let leftovers: Vec<String> = task.running.iter().cloned().collect();
        for host in leftovers {
            match task.items.get(&host) {
                Some(items) if !items.is_empty() => {
                    let result = aggregate_items(HostResult::new(OutcomeKind::Ok), items);
                    task.running.shift_remove(&host);
                    self.counters.resolve(result.outcome);
                    self.recap.entry(host.clone()).or_default().record(result.outcome);
                    task.results.insert(host, result);
                }
                _ => {
                    task.running.shift_remove(&host);
                    task.dispatched.shift_remove(&host);
                    self.counters.retract();
                    if self.recap.get(&host).is_some_and(|stats| stats.total() == 0) {
                        self.recap.shift_remove(&host);
                    }
                    missing.push(host);
                }
            }
        }

        // the committed live line shows the final tally of the task
        self.refresh()?;
        self.sink.commit()?;
        let (lines, warnings) = self.render_task(&task);
        for line in &lines {
            self.sink.append(line)?;
        }
        if !missing.is_empty() {
            let message = format!("no result received from {} for task '{}'", fold(&missing), task.name);
            self.warn_line(&message)?;
        }
        for warning in warnings {
            self.sink.warn(&warning)?;
        }

        task.frozen = true;
        if let Some(play) = self.plays.last_mut() {
            play.tasks.push(task);
        }
        Ok(())
    }

    fn render_task(&self, task: &TaskRun) -> (Vec<String>, Vec<String>) {
        let mut lines = Vec::new();
        let mut warnings = Vec::new();
        let tally = self.config.renderer.has_live_line();

        // Loop items, deduplicated on their own axis.
        let items: Vec<(ResultId, &HostResult)> = task
            .items
            .iter()
            .flat_map(|(host, items)| {
                items.iter().map(move |(item, result)| {
                    (
                        ResultId::Item {
                            host: host.clone(),
                            item: item.clone(),
                        },
                        result,
                    )
                })
            })
            .collect();
        let item_groups = group(items.iter().enumerate().map(|(idx, (id, result))| {
            (idx, self.normalizer.item_key(id.host(), &item_label(id), result))
        }));
        for g in &item_groups {
            let others: Vec<&(ResultId, &HostResult)> = g.others().iter().map(|idx| &items[*idx]).collect();
            self.render_group(task, &items[*g.representative()], &others, false, &mut lines);
        }

        // Host results and loop aggregates.
        let results: Vec<(ResultId, &HostResult)> = task
            .results
            .iter()
            .map(|(host, result)| (ResultId::Host(host.clone()), result))
            .collect();
        let result_groups = group(
            results
                .iter()
                .enumerate()
                .map(|(idx, (id, result))| (idx, self.normalizer.result_key(id.host(), result))),
        );
        for g in &result_groups {
            let others: Vec<&(ResultId, &HostResult)> = g.others().iter().map(|idx| &results[*idx]).collect();
            self.render_group(task, &results[*g.representative()], &others, tally, &mut lines);
        }

        // Warnings, deprecations and exceptions go to the side channel,
        // deduplicated across items and hosts.
        let notices: Vec<(ResultId, NoticeKind, &str)> = items
            .iter()
            .chain(results.iter())
            .flat_map(|(id, result)| {
                let result: &HostResult = *result;
                result.notices.iter().map(move |(kind, text)| (id.clone(), kind, text))
            })
            .collect();
        let notice_groups = group(
            notices
                .iter()
                .enumerate()
                .map(|(idx, (id, kind, text))| (idx, self.normalizer.notice_key(id.host(), *kind, text))),
        );
        for g in &notice_groups {
            let (first, kind, text) = &notices[*g.representative()];
            warnings.push(self.renderer.notice_message(*kind, first, text));
            for idx in g.others() {
                warnings.push(self.renderer.duplicate_notice_message(*kind, &notices[*idx].0, first));
            }
        }

        // Diffs, deduplicated by body only.
        let placeholder = FileDiff::no_diff_reported();
        let mut diffs: Vec<(&str, OutcomeKind, &FileDiff)> = Vec::new();
        for (host, result) in &task.results {
            let changed = result.outcome == OutcomeKind::Changed;
            if !changed && !self.config.always_show_diff {
                continue;
            }
            if result.diffs.is_empty() {
                if changed {
                    diffs.push((host.as_str(), result.outcome, &placeholder));
                }
            } else {
                diffs.extend(result.diffs.iter().map(|diff| (host.as_str(), result.outcome, diff)));
            }
        }
        let diff_groups = group(diffs.iter().enumerate().map(|(idx, (_, _, diff))| (idx, diff.body())));
        for g in &diff_groups {
            let (_, kind, diff) = diffs[*g.representative()];
            let formatted = self.diffs.format(diff);
            if let Some(e) = formatted.fallback {
                debug!("{}", e);
                warnings.push(format!("{}; showing unformatted diff", e));
            }
            lines.extend(formatted.lines);
            let hosts: Vec<&str> = g.members.iter().map(|idx| diffs[*idx].0).collect();
            lines.push(self.renderer.folded_line(kind, &fold(&hosts)));
        }

        if tally {
            for kind in OutcomeKind::ALL {
                let hosts: Vec<&str> = task
                    .results
                    .iter()
                    .filter(|(_, result)| result.outcome == kind)
                    .map(|(host, _)| host.as_str())
                    .collect();
                if !hosts.is_empty() {
                    lines.push(self.renderer.folded_line(kind, &fold(&hosts)));
                }
            }
        }

        lines.push(self.renderer.elapsed_line(task.started.elapsed()));
        (lines, warnings)
    }

    /// Render a representative result followed by its duplicates.
    fn render_group(
        &self,
        task: &TaskRun,
        representative: &(ResultId, &HostResult),
        others: &[&(ResultId, &HostResult)],
        fold_others: bool,
        lines: &mut Vec<String>,
    ) {
        let (id, result) = representative;
        let visible = Renderer::is_displayable(&result.payload)
            || result.outcome != OutcomeKind::Ok
            || !result.diffs.is_empty();
        if !visible {
            return;
        }

        match self.renderer.result_lines(&task.name, result.outcome, id, &result.payload) {
            Ok(rendered) => lines.extend(rendered),
            Err(e) => {
                error!(task = %task.name, host = %id, outcome = %result.outcome, "{}", e);
                lines.push(self.renderer.fallback_line(result.outcome, id, &e));
            }
        }

        if others.is_empty() {
            return;
        }
        if fold_others {
            let hosts: Vec<&str> = others.iter().map(|(other, _)| other.host()).collect();
            let folded = ResultId::Host(fold(&hosts));
            lines.push(self.renderer.duplicate_line(result.outcome, &folded, id));
        } else {
            for (other, _) in others {
                lines.push(self.renderer.duplicate_line(result.outcome, other, id));
            }
        }
    }
}

fn item_label(id: &ResultId) -> String {
    match id {
        ResultId::Item { item, .. } => item.clone(),
        ResultId::Host(_) => String::new(),
    }
}
