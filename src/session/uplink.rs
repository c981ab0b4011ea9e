//! Persistent uplink to the CAMEA image store.
//!
//! A single maintenance task owns the connection: it connects, performs the
//! handshake, runs the heartbeat and watches the read side. Any failure, be
//! it a reset seen by the reader, a failed probe or a failed send, drops the
//! connection and the task dials again right away. Sends never queue; while
//! the uplink is not `Ready` they fail fast with `UplinkError::NotReady`.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::heartbeat::{spawn_heartbeat, KeepAliveSink};
use crate::config::{
    HEARTBEAT_INTERVAL, UPLINK_CONNECT_TIMEOUT, UPLINK_HANDSHAKE_TIMEOUT, UPLINK_RECONNECT_DELAY,
};
use crate::error_handling::{GatewayEvent, GatewayStats, UplinkError};
use crate::protocol::{encode_frame, latin1_to_string, DetectionResponse, KEEP_ALIVE_PROBE};

/// Connection lifecycle of the uplink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UplinkState {
    Disconnected,
    Connecting,
    HandshakeWait,
    Ready,
}

/// Endpoint and timing of the uplink.
#[derive(Debug, Clone)]
pub struct UplinkSettings {
    /// `host:port` of the image store
    pub addr: String,
    pub buffer_size: usize,
    pub heartbeat_interval: Duration,
    pub connect_timeout: Duration,
    pub handshake_timeout: Duration,
    pub reconnect_delay: Duration,
}

impl UplinkSettings {
    /// Settings with the standard timers.
    pub fn new(addr: impl Into<String>, buffer_size: usize) -> Self {
        Self {
            addr: addr.into(),
            buffer_size,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            connect_timeout: UPLINK_CONNECT_TIMEOUT,
            handshake_timeout: UPLINK_HANDSHAKE_TIMEOUT,
            reconnect_delay: UPLINK_RECONNECT_DELAY,
        }
    }
}

/// The live connection: its write half and a token fired when it is known dead.
struct Link {
    writer: OwnedWriteHalf,
    lost: CancellationToken,
}

struct Shared {
    link: Mutex<Option<Link>>,
    state: watch::Sender<UplinkState>,
    reconnects: AtomicUsize,
    stats: Arc<GatewayStats>,
}

impl Shared {
    fn set_state(&self, state: UplinkState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            log::debug!("Uplink {:?} -> {:?}", previous, state);
        }
    }

    fn state(&self) -> UplinkState {
        *self.state.borrow()
    }
}

#[async_trait::async_trait]
impl KeepAliveSink for Shared {
    async fn send_keep_alive(&self) -> io::Result<()> {
        let mut guard = self.link.lock().await;
        let link = guard
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
        link.writer.write_all(&KEEP_ALIVE_PROBE).await?;
        link.writer.flush().await
    }
}

/// Handle to the uplink maintenance task.
pub struct Uplink {
    shared: Arc<Shared>,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Uplink {
    /// Starts connecting in the background and returns immediately.
    ///
    /// Heartbeats stop when `heartbeat_cancel` fires; the connection itself
    /// stays up until `close`.
    pub fn start(
        settings: UplinkSettings,
        stats: Arc<GatewayStats>,
        heartbeat_cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(UplinkState::Disconnected);
        let shared = Arc::new(Shared {
            link: Mutex::new(None),
            state,
            reconnects: AtomicUsize::new(0),
            stats,
        });
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(maintain(
            settings,
            Arc::clone(&shared),
            shutdown.clone(),
            heartbeat_cancel,
        ));
        Self {
            shared,
            shutdown,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn state(&self) -> UplinkState {
        self.shared.state()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<UplinkState> {
        self.shared.state.subscribe()
    }

    /// Number of times a `Ready` connection was lost and rebuilt.
    pub fn reconnect_count(&self) -> usize {
        self.shared.reconnects.load(Ordering::SeqCst)
    }

    /// Frames `response` and writes it to the image store.
    ///
    /// # Errors
    ///
    /// - `UplinkError::NotReady` if the uplink is (re)connecting; nothing is sent
    /// - `UplinkError::Io` if the write fails; the connection is then rebuilt
    ///   but this message is not retried
    pub async fn send_response(
        &self,
        message_id: u16,
        response: &DetectionResponse,
    ) -> Result<(), UplinkError> {
        let frame = encode_frame(message_id, &response.to_payload())?;

        let mut guard = self.shared.link.lock().await;
        let state = self.shared.state();
        let link = match guard.as_mut() {
            Some(link) if state == UplinkState::Ready => link,
            _ => return Err(UplinkError::NotReady(state)),
        };

        // a store that stops reading must not hold up shutdown
        let written = tokio::select! {
            r = async {
                link.writer.write_all(&frame).await?;
                link.writer.flush().await
            } => r,
            _ = self.shutdown.cancelled() => Err(io::Error::new(
                io::ErrorKind::Interrupted,
                "uplink closing",
            )),
        };
        if let Err(e) = written {
            link.lost.cancel();
            return Err(UplinkError::Io(e));
        }
        log::debug!(
            "Uplink sent message {}: {}",
            message_id,
            response.to_log_summary()
        );
        Ok(())
    }

    /// Stops the maintenance task and closes the connection.
    pub async fn close(&self) {
        self.shutdown.cancel();
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                log::error!("Uplink task ended abnormally: {}", e);
            }
        }
    }
}

/// Why a `Ready` connection ended.
enum LinkEnd {
    Shutdown,
    Lost(UplinkError),
}

async fn maintain(
    settings: UplinkSettings,
    shared: Arc<Shared>,
    shutdown: CancellationToken,
    heartbeat_cancel: CancellationToken,
) {
    loop {
        shared.set_state(UplinkState::Connecting);
        let connected = tokio::select! {
            _ = shutdown.cancelled() => break,
            r = connect(&settings, &shared) => r,
        };

        let reader = match connected {
            Ok(reader) => reader,
            Err(e) => {
                log::warn!("Uplink to {} failed: {}", settings.addr, e);
                shared.set_state(UplinkState::Disconnected);
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(settings.reconnect_delay) => continue,
                }
            }
        };
        log::info!("Uplink to {} ready", settings.addr);

        match serve_link(&settings, &shared, reader, &shutdown, &heartbeat_cancel).await {
            LinkEnd::Shutdown => break,
            LinkEnd::Lost(e) => {
                log::warn!("Uplink to {} lost ({}), reconnecting", settings.addr, e);
                shared.reconnects.fetch_add(1, Ordering::SeqCst);
                shared.stats.record(GatewayEvent::UplinkReconnect);
            }
        }
    }

    drop_link(&shared).await;
    shared.set_state(UplinkState::Disconnected);
    log::info!("Uplink to {} closed", settings.addr);
}

/// Connects, sends the handshake probe and waits for the store's answer.
async fn connect(settings: &UplinkSettings, shared: &Shared) -> Result<OwnedReadHalf, UplinkError> {
    let stream = timeout(settings.connect_timeout, TcpStream::connect(&settings.addr))
        .await
        .map_err(|_| {
            UplinkError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect timed out after {:?}", settings.connect_timeout),
            ))
        })??;
    stream.set_nodelay(true)?;
    let (mut reader, mut writer) = stream.into_split();

    writer.write_all(&KEEP_ALIVE_PROBE).await?;
    shared.set_state(UplinkState::HandshakeWait);

    let mut buf = vec![0u8; settings.buffer_size];
    let n = timeout(settings.handshake_timeout, reader.read(&mut buf))
        .await
        .map_err(|_| UplinkError::HandshakeTimeout(settings.handshake_timeout))??;
    if n == 0 {
        return Err(UplinkError::Closed);
    }
    log::debug!("Uplink handshake answer: {:?}", latin1_to_string(&buf[..n]));

    *shared.link.lock().await = Some(Link {
        writer,
        lost: CancellationToken::new(),
    });
    shared.set_state(UplinkState::Ready);
    Ok(reader)
}

/// Runs one `Ready` connection until it fails or the uplink shuts down.
async fn serve_link(
    settings: &UplinkSettings,
    shared: &Arc<Shared>,
    mut reader: OwnedReadHalf,
    shutdown: &CancellationToken,
    heartbeat_cancel: &CancellationToken,
) -> LinkEnd {
    let lost = match shared.link.lock().await.as_ref() {
        Some(link) => link.lost.clone(),
        None => return LinkEnd::Lost(UplinkError::Closed),
    };
    let probes = heartbeat_cancel.child_token();
    let mut heartbeat = spawn_heartbeat(
        Arc::clone(shared),
        settings.heartbeat_interval,
        probes.clone(),
    );

    let mut heartbeat_running = true;

    let mut buf = vec![0u8; settings.buffer_size];
    let end = loop {
        tokio::select! {
            _ = shutdown.cancelled() => break LinkEnd::Shutdown,
            _ = lost.cancelled() => break LinkEnd::Lost(UplinkError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "send failed",
            ))),
            r = &mut heartbeat, if heartbeat_running => match r {
                Ok(Err(e)) => break LinkEnd::Lost(UplinkError::Io(e)),
                // heartbeats were stopped; keep serving reads and sends
                _ => heartbeat_running = false,
            },
            r = reader.read(&mut buf) => match r {
                Ok(0) => break LinkEnd::Lost(UplinkError::Closed),
                Ok(n) => log::debug!("Image store sent {:?}", latin1_to_string(&buf[..n])),
                Err(e) => break LinkEnd::Lost(UplinkError::Io(e)),
            },
        }
    };

    probes.cancel();
    heartbeat.abort();
    shared.set_state(UplinkState::Disconnected);
    drop_link(shared).await;
    end
}

async fn drop_link(shared: &Shared) {
    let link = shared.link.lock().await.take();
    if let Some(mut link) = link {
        link.lost.cancel();
        if let Err(e) = link.writer.shutdown().await {
            log::debug!("Closing uplink socket: {}", e);
        }
    }
}
