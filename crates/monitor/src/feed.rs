//! Host process I/O
//!
//! The host writes newline-delimited JSON envelopes to our input and reads
//! action envelopes from our stdout.

use anyhow::{Context, Result};
use state_lib::HostBus;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

/// Emit every non-empty input line onto `channel`. Returns the number of events.
pub async fn pump<R>(reader: R, bus: HostBus, channel: String) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut count = 0u64;

    while let Some(line) = lines
        .next_line()
        .await
        .context("Failed to read host event stream")?
    {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        bus.emit_raw(&channel, line);
        count += 1;

        // Let the adapter drain; if the buffer still wraps it asks for a snapshot
        tokio::task::yield_now().await;
    }

    info!(events = count, "Host event stream ended");
    Ok(count)
}

/// Write every action published on the bus to `writer`, one per line
pub async fn forward_actions<W>(mut rx: broadcast::Receiver<String>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        match rx.recv().await {
            Ok(raw) => {
                writer
                    .write_all(raw.as_bytes())
                    .await
                    .context("Failed to write action")?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
                debug!("Forwarded action to host");
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Dropped actions while the host was not reading");
            }
            Err(RecvError::Closed) => break,
        }
    }

    Ok(())
}
