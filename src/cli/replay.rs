//! The `replay` command: drive a run from a JSON-lines event stream.
//!
//! Lines are read from a file or stdin as they arrive, so the command works
//! both on recorded logs and as the tail of a live pipe. Ctrl-C interrupts
//! the run: hosts still running are reported as interrupted and the recap
//! is printed before exiting.

use std::path::Path;

use anyhow::{Context, Result};
use fleetrecap::callback::PlaybookRun;
use fleetrecap::config::RenderConfig;
use fleetrecap::output::TerminalSink;
use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::ReplayArgs;

/// Longest accepted event line.
const MAX_LINE_LENGTH: usize = 64 * 1024 * 1024;

/// Run the replay command, returning the process exit code.
pub async fn execute(args: &ReplayArgs, config: RenderConfig) -> Result<i32> {
    if config.force_color {
        colored::control::set_override(true);
    } else if !config.use_color {
        colored::control::set_override(false);
    }

    let input = open_input(args.file.as_deref()).await?;
    let sink = TerminalSink::stdout().with_color(config.colors_enabled());
    let mut run = PlaybookRun::new(config, sink)?;

    let token = CancellationToken::new();
    let handle = run.interrupt_handle();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt signal");
            handle.interrupt();
            signal_token.cancel();
        }
    });

    let mut lines = FramedRead::new(input, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    loop {
        tokio::select! {
            biased;

            _ = token.cancelled() => {
                run.interrupt()?;
                break;
            }
            next = lines.next() => match next {
                Some(Ok(line)) => run.handle_line(&line)?,
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    run.report_malformed(format!("event line longer than {} bytes", MAX_LINE_LENGTH))?;
                }
                Some(Err(LinesCodecError::Io(e))) => {
                    return Err(e).context("Failed to read event stream");
                }
                None => {
                    debug!("Event stream closed");
                    break;
                }
            },
        }

        if run.is_finished() {
            break;
        }
    }

    let status = run.finish()?;
    info!("Run ended with status {}", status);
    Ok(status.exit_code())
}

async fn open_input(path: Option<&Path>) -> Result<Box<dyn AsyncRead + Unpin + Send>> {
    match path {
        Some(path) if path != Path::new("-") => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open event log: {}", path.display()))?;
            Ok(Box::new(file))
        }
        _ => Ok(Box::new(tokio::io::stdin())),
    }
}
