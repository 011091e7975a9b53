//! Result aggregation for fan-out task runs
//!
//! This module turns the interleaved per-host event stream of an execution
//! engine into a deduplicated transcript.
//!
//! # Architecture
//!
//! 1. **[`types`]**: the inbound [`Event`] contract and the [`HostResult`] model
//! 2. **[`grouper`]**: normalization and first-seen equivalence grouping
//! 3. **[`counters`]**: run-wide [`StatusCounters`] and per-host [`HostStats`]
//! 4. **[`render`]**: banners, result lines, live status line and recap
//! 5. **[`aggregator`]**: the [`PlaybookRun`] state machine tying it together
//!
//! # Quick Start
//!
//! ```rust
//! use fleetrecap::callback::{Event, HostResult, PlaybookRun};
//! use fleetrecap::config::{RenderConfig, RendererKind};
//! use fleetrecap::output::RecordingSink;
//!
//! let mut run = PlaybookRun::new(RenderConfig::plain(RendererKind::Classic), RecordingSink::new())?;
//! run.handle(Event::PlayStart { name: "web".into(), hosts: vec!["h".into()] })?;
//! run.handle(Event::TaskStart { name: "foo".into(), hosts: None })?;
//! run.handle(Event::HostResult { host: "h".into(), result: HostResult::ok("foo") })?;
//! let status = run.finish()?;
//!
//! assert_eq!(status.exit_code(), 0);
//! assert!(run.sink().lines().contains(&"ok: h => msg: foo".to_string()));
//! # Ok::<(), fleetrecap::error::Error>(())
//! ```

pub mod aggregator;
pub mod counters;
pub mod grouper;
pub mod render;
pub mod types;

pub use aggregator::{InterruptHandle, PlayRun, PlaybookRun, RunStatus, TaskRun};
pub use counters::{HostStats, StatusCounters};
pub use grouper::{group, Group, Normalizer};
pub use render::Renderer;
pub use types::{Event, FileDiff, HostResult, NoticeKind, Notices, OutcomeKind, Payload, ResultId};
