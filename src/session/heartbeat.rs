//! Periodic keep-alive probes.
//!
//! Heartbeats run as their own task on their own timer, so a read blocked on
//! either socket never delays a probe.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::protocol::KEEP_ALIVE_PROBE;

/// Something a keep-alive probe can be written to.
#[async_trait::async_trait]
pub trait KeepAliveSink: Send + Sync + 'static {
    async fn send_keep_alive(&self) -> io::Result<()>;
}

/// A socket write half shared with the send path. The lock keeps a probe
/// from landing in the middle of a frame.
#[async_trait::async_trait]
impl<W> KeepAliveSink for Mutex<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn send_keep_alive(&self) -> io::Result<()> {
        let mut writer = self.lock().await;
        writer.write_all(&KEEP_ALIVE_PROBE).await?;
        writer.flush().await
    }
}

/// Sends a probe every `period` until `cancel` fires or a write fails.
///
/// The first probe goes out one full period after the call. The task ends
/// with `Ok(())` on cancellation and with the write error otherwise.
pub fn spawn_heartbeat<S>(
    sink: Arc<S>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<io::Result<()>>
where
    S: KeepAliveSink + ?Sized,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = ticker.tick() => {
                    if let Err(e) = sink.send_keep_alive().await {
                        log::warn!("Keep-alive probe failed: {}", e);
                        return Err(e);
                    }
                    log::trace!("Keep-alive probe sent");
                }
            }
        }
    })
}
