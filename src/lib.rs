//! # fleetrecap - Deduplicating result reporter for fan-out task runs
//!
//! An execution engine running the same task on hundreds of hosts produces
//! hundreds of nearly identical results, in whatever order the hosts finish.
//! fleetrecap consumes that event stream and prints one deterministic,
//! readable transcript:
//!
//! - identical results and diffs are shown once, with the other hosts listed
//!   as `same result as <host>`,
//! - host lists are folded into range notation (`node[001-128]`),
//! - a one-line live tally tracks progress while a task runs,
//! - cancellation and malformed input degrade to a complete recap instead of
//!   a crash.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │            CLI (`fleetrecap replay`, tokio)              │
//! └──────────────────────────────────────────────────────────┘
//!                             │ JSON lines
//!                             ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │           PlaybookRun (callback::aggregator)             │
//! └──────────────────────────────────────────────────────────┘
//!        │                    │                     │
//!        ▼                    ▼                     ▼
//! ┌──────────────┐   ┌─────────────────┐   ┌────────────────┐
//! │   grouper    │   │    hostlist     │   │  diff + render │
//! │ (dedup keys) │   │    (folding)    │   │    (lines)     │
//! └──────────────┘   └─────────────────┘   └────────────────┘
//!                             │
//!                             ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │      OutputSink (terminal / recording for tests)         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust
//! use fleetrecap::prelude::*;
//!
//! let mut run = PlaybookRun::new(RenderConfig::plain(RendererKind::Classic), RecordingSink::new())?;
//! run.handle_line(r#"{"event": "play_start", "name": "web", "hosts": ["web1", "web2"]}"#)?;
//! run.handle_line(r#"{"event": "task_start", "name": "ping"}"#)?;
//! run.handle_line(r#"{"event": "host_result", "host": "web1", "result": {"status": "ok", "msg": "pong"}}"#)?;
//! run.handle_line(r#"{"event": "host_result", "host": "web2", "result": {"status": "ok", "msg": "pong"}}"#)?;
//! run.finish()?;
//!
//! let lines = run.sink().lines();
//! assert!(lines.contains(&"ok: web2 => same result as web1".to_string()));
//! # Ok::<(), fleetrecap::error::Error>(())
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::callback::{
        Event, FileDiff, HostResult, InterruptHandle, OutcomeKind, PlaybookRun, RunStatus,
    };
    pub use crate::config::{ConfigLoader, RenderConfig, RendererKind};
    pub use crate::error::{Error, Result};
    pub use crate::hostlist::fold;
    pub use crate::output::{OutputSink, RecordingSink, TerminalSink};
}

/// Event model, grouping, counters, rendering and the run state machine.
pub mod callback;

/// Render configuration and its loader.
pub mod config;

/// Unified diff rendering and external diff formatters.
pub mod diff;

/// Error types.
pub mod error;

/// Host list folding into range notation.
pub mod hostlist;

/// Output sinks with live line support.
pub mod output;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
