//! Inbound CAMEA management session.
//!
//! Accepts one CAMEA connection at a time, acknowledges its handshake, keeps
//! it alive with probes and answers every `DetectionRequest` it sends. When a
//! session ends (peer close, reset or read timeout) the listener goes back to
//! accepting; CAMEA is expected to dial again.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::heartbeat::spawn_heartbeat;
use super::uplink::Uplink;
use crate::config::{GatewayConfig, HEARTBEAT_INTERVAL};
use crate::correlator::{CorrelationOutcome, Correlator};
use crate::error_handling::{GatewayEvent, GatewayStats, RequestError};
use crate::gateway::MessageIdSequence;
use crate::protocol::{
    encode_frame, is_detection_request, is_handshake_ack, is_keep_alive, latin1_to_string,
    parse_detection_request, DetectionResponse, StreamReassembler, HANDSHAKE_ACK,
};

/// Lifecycle of one inbound session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundState {
    Listening,
    Accepted,
    HandshakeSent,
    Active,
    Closing,
    Closed,
}

/// Everything a session needs besides its socket.
pub struct InboundContext {
    pub correlator: Arc<Correlator>,
    pub uplink: Arc<Uplink>,
    pub message_ids: Arc<MessageIdSequence>,
    pub stats: Arc<GatewayStats>,
    pub buffer_size: usize,
    /// A read idle for this long ends the session
    pub socket_timeout: Duration,
    pub heartbeat_interval: Duration,
    /// Parent of every session's heartbeat token
    pub heartbeat_cancel: CancellationToken,
}

impl InboundContext {
    pub fn new(
        config: &GatewayConfig,
        correlator: Arc<Correlator>,
        uplink: Arc<Uplink>,
        message_ids: Arc<MessageIdSequence>,
        stats: Arc<GatewayStats>,
        heartbeat_cancel: CancellationToken,
    ) -> Self {
        Self {
            correlator,
            uplink,
            message_ids,
            stats,
            buffer_size: config.settings.buffer_size,
            socket_timeout: Duration::from_secs(config.settings.socket_timeout_seconds),
            heartbeat_interval: HEARTBEAT_INTERVAL,
            heartbeat_cancel,
        }
    }
}

/// Why a session left `Active`.
#[derive(Debug)]
enum SessionEnd {
    PeerClosed,
    Timeout(Duration),
    Io(io::Error),
    HeartbeatFailed,
    Shutdown,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::PeerClosed => f.write_str("peer closed the connection"),
            SessionEnd::Timeout(d) => write!(f, "no data for {:?}", d),
            SessionEnd::Io(e) => write!(f, "socket error: {}", e),
            SessionEnd::HeartbeatFailed => f.write_str("keep-alive probe failed"),
            SessionEnd::Shutdown => f.write_str("gateway shutting down"),
        }
    }
}

/// Accepts and serves CAMEA sessions one after another until `shutdown`.
///
/// # Errors
///
/// Returns the accept error if the listening socket breaks. That is the only
/// failure this loop does not recover from.
pub async fn run_listener(
    listener: TcpListener,
    ctx: Arc<InboundContext>,
    shutdown: CancellationToken,
) -> io::Result<()> {
    loop {
        log::debug!("Inbound {:?}", InboundState::Listening);
        let (stream, peer) = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            accepted = listener.accept() => accepted?,
        };
        ctx.stats.record(GatewayEvent::InboundSession);
        serve_session(stream, peer, &ctx, &shutdown).await;
    }
}

/// Runs one CAMEA session to completion.
pub async fn serve_session(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: &InboundContext,
    shutdown: &CancellationToken,
) {
    let set_state = |state: InboundState| log::debug!("CAMEA session {}: {:?}", peer, state);

    set_state(InboundState::Accepted);
    log::info!("CAMEA connected from {}", peer);
    if let Err(e) = stream.set_nodelay(true) {
        log::debug!("Cannot disable Nagle for {}: {}", peer, e);
    }
    let (mut reader, writer) = stream.into_split();
    let writer = Arc::new(Mutex::new(writer));

    if let Err(e) = write_bytes(&writer, &HANDSHAKE_ACK).await {
        log::warn!("Handshake to {} failed: {}", peer, e);
        set_state(InboundState::Closed);
        return;
    }
    set_state(InboundState::HandshakeSent);

    let probes = ctx.heartbeat_cancel.child_token();
    let mut heartbeat = spawn_heartbeat(Arc::clone(&writer), ctx.heartbeat_interval, probes.clone());
    let mut heartbeat_running = true;
    set_state(InboundState::Active);

    let mut reassembler = StreamReassembler::new();
    let mut buf = vec![0u8; ctx.buffer_size];
    let end = loop {
        let n = tokio::select! {
            _ = shutdown.cancelled() => break SessionEnd::Shutdown,
            r = &mut heartbeat, if heartbeat_running => match r {
                Ok(Err(_)) => break SessionEnd::HeartbeatFailed,
                _ => {
                    heartbeat_running = false;
                    continue;
                }
            },
            r = timeout(ctx.socket_timeout, reader.read(&mut buf)) => match r {
                Err(_) => break SessionEnd::Timeout(ctx.socket_timeout),
                Ok(Ok(0)) => break SessionEnd::PeerClosed,
                Ok(Err(e)) => break SessionEnd::Io(e),
                Ok(Ok(n)) => n,
            },
        };
        log::trace!("Read {} bytes from {}", n, peer);

        for record in reassembler.push(&buf[..n]) {
            handle_record(&record, &writer, peer, ctx).await;
        }
    };

    set_state(InboundState::Closing);
    probes.cancel();
    heartbeat.abort();
    if let Err(e) = writer.lock().await.shutdown().await {
        log::debug!("Closing socket to {}: {}", peer, e);
    }
    match end {
        SessionEnd::PeerClosed | SessionEnd::Shutdown => {
            log::info!("CAMEA session {} ended: {}", peer, end)
        }
        _ => log::warn!("CAMEA session {} ended: {}", peer, end),
    }
    if !reassembler.pending().is_empty() {
        log::debug!(
            "Discarding {} unterminated bytes from {}: {:?}",
            reassembler.pending().len(),
            peer,
            latin1_to_string(reassembler.pending())
        );
    }
    set_state(InboundState::Closed);
}

async fn write_bytes(writer: &Mutex<OwnedWriteHalf>, bytes: &[u8]) -> io::Result<()> {
    let mut writer = writer.lock().await;
    writer.write_all(bytes).await?;
    writer.flush().await
}

/// Answers one reassembled record.
async fn handle_record(
    record: &[u8],
    writer: &Mutex<OwnedWriteHalf>,
    peer: SocketAddr,
    ctx: &InboundContext,
) {
    if is_keep_alive(record) || is_handshake_ack(record) {
        log::trace!("Control sequence from {}", peer);
        return;
    }
    let text = latin1_to_string(record);
    if !is_detection_request(&text) {
        log::debug!("Ignoring record from {}: {:?}", peer, text);
        return;
    }

    let request = match parse_detection_request(&text) {
        Ok(request) => request,
        Err(RequestError::NotADetectionRequest) => {
            log::debug!("Ignoring record from {}: {:?}", peer, text);
            return;
        }
        Err(e) => {
            log::warn!("Malformed query from {}: {} in {:?}", peer, e, text);
            ctx.stats.record(GatewayEvent::MalformedQuery);
            return;
        }
    };
    ctx.stats.record(GatewayEvent::RequestReceived);
    let message_id = ctx.message_ids.next_id();
    log::info!(
        "DetectionRequest {} for {} (message {})",
        request.request_id,
        request.image_time,
        message_id
    );

    let correlation = ctx.correlator.correlate(&request).await;
    match correlation.outcome {
        CorrelationOutcome::Found => ctx.stats.record(GatewayEvent::MatchFound),
        CorrelationOutcome::NotFound => ctx.stats.record(GatewayEvent::MatchNotFound),
        CorrelationOutcome::LookupFailed => {
            ctx.stats.record(GatewayEvent::VidarFailure);
            ctx.stats.record(GatewayEvent::MatchNotFound);
        }
    }

    let ack = DetectionResponse::RepeatAck(correlation.ack);
    let sent = match encode_frame(message_id, &ack.to_payload()) {
        Ok(frame) => write_bytes(writer, &frame).await.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    match sent {
        Ok(()) => log::info!("Sent to {}: {}", peer, ack.to_log_summary()),
        Err(e) => {
            log::error!("Cannot answer request {} to {}: {}", request.request_id, peer, e);
            ctx.stats.record(GatewayEvent::SendFailure);
        }
    }

    if let Some(detection) = correlation.detection {
        let detection = DetectionResponse::LargeDetection(detection);
        match ctx.uplink.send_response(message_id, &detection).await {
            Ok(()) => log::info!("Uplinked: {}", detection.to_log_summary()),
            Err(e) => {
                log::error!(
                    "Image for request {} not delivered: {}",
                    request.request_id,
                    e
                );
                ctx.stats.record(GatewayEvent::SendFailure);
            }
        }
    }
}
