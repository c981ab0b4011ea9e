//! Gateway supervisor.
//!
//! Owns both sessions, the message-id sequence and the stop conditions
//! (operating-time limit, Ctrl-C, external token). Shutdown always runs in
//! the same order: stop heartbeats, close the uplink, close the listener.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use log::info;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::{GatewayConfig, Mode};
use crate::correlator::{Correlator, CorrelatorSettings};
use crate::error_handling::{GatewayEvent, GatewayStats};
use crate::initialization::init_vidar_client;
use crate::session::{run_listener, InboundContext, Uplink, UplinkSettings};
use crate::vidar::VidarClient;

/// Message ids put on outgoing frames.
///
/// One id is drawn per parsed request and used for both of its answers. The
/// sequence is never reset, wrapping only at `u16::MAX`.
#[derive(Debug)]
pub struct MessageIdSequence {
    next: AtomicU16,
}

impl MessageIdSequence {
    pub fn new(initial: u16) -> Self {
        Self {
            next: AtomicU16::new(initial),
        }
    }

    /// Returns the current id and advances the sequence.
    pub fn next_id(&self) -> u16 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// The id the next call to `next_id` will return.
    pub fn peek(&self) -> u16 {
        self.next.load(Ordering::SeqCst)
    }
}

/// Summary of a finished gateway run.
#[derive(Debug, Clone)]
pub struct GatewayReport {
    /// Detection requests answered
    pub requests: usize,
    pub found: usize,
    pub not_found: usize,
    pub uplink_reconnects: usize,
    pub elapsed_seconds: f64,
}

/// A bound, not yet running gateway.
pub struct Gateway {
    listener: TcpListener,
    context: Arc<InboundContext>,
    uplink: Arc<Uplink>,
    stats: Arc<GatewayStats>,
    heartbeat_cancel: CancellationToken,
    operating_time: Option<Duration>,
}

impl Gateway {
    /// Binds the listener and starts the uplink, with the correlator the
    /// configured mode calls for.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built or the listen address cannot be bound.
    pub async fn bind(config: &GatewayConfig) -> Result<Self> {
        let settings = CorrelatorSettings::from_config(config);
        let correlator = match config.service.mode {
            Mode::Vidar => {
                let http = init_vidar_client().context("Failed to initialize HTTP client")?;
                let client = VidarClient::new(http, &config.vidar.ip, config.zone_filter());
                info!("Answering from Vidar at {}", config.vidar.ip);
                Correlator::with_store(Arc::new(client), settings)
            }
            Mode::Test => {
                info!("TEST mode: answering every request with stub images");
                Correlator::stub(settings)
            }
        };
        Self::with_correlator(config, correlator).await
    }

    /// Binds the listener and starts the uplink around an existing correlator.
    pub async fn with_correlator(config: &GatewayConfig, correlator: Correlator) -> Result<Self> {
        let addr = config.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to listen on {}", addr))?;
        info!("Listening for CAMEA on {}", addr);

        let stats = Arc::new(GatewayStats::new());
        let heartbeat_cancel = CancellationToken::new();
        let uplink = Arc::new(Uplink::start(
            UplinkSettings::new(config.uplink_addr(), config.settings.buffer_size),
            Arc::clone(&stats),
            heartbeat_cancel.clone(),
        ));
        let context = Arc::new(InboundContext::new(
            config,
            Arc::new(correlator),
            Arc::clone(&uplink),
            Arc::new(MessageIdSequence::new(config.service.initial_message_id)),
            Arc::clone(&stats),
            heartbeat_cancel.clone(),
        ));
        let operating_time = match config.service.operating_time_minutes {
            0 => None,
            minutes => Some(Duration::from_secs(minutes * 60)),
        };

        Ok(Self {
            listener,
            context,
            uplink,
            stats,
            heartbeat_cancel,
            operating_time,
        })
    }

    /// Address the CAMEA listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn uplink(&self) -> &Arc<Uplink> {
        &self.uplink
    }

    pub fn stats(&self) -> &Arc<GatewayStats> {
        &self.stats
    }

    /// Overrides the configured operating-time limit.
    pub fn set_operating_time(&mut self, limit: Option<Duration>) {
        self.operating_time = limit;
    }

    /// Serves CAMEA until `stop` fires, the operating time elapses or the
    /// listener breaks, then shuts everything down in order.
    ///
    /// # Errors
    ///
    /// Returns an error only if the accept loop failed.
    pub async fn run(self, stop: CancellationToken) -> Result<GatewayReport> {
        let start = Instant::now();
        let accept_stop = CancellationToken::new();
        let mut listener_task = tokio::spawn(run_listener(
            self.listener,
            Arc::clone(&self.context),
            accept_stop.clone(),
        ));

        let operating_time = self.operating_time;
        let deadline = async move {
            match operating_time {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending().await,
            }
        };

        let finished = tokio::select! {
            _ = stop.cancelled() => {
                info!("Shutdown requested");
                None
            }
            _ = deadline => {
                info!("Operating time elapsed, shutting down");
                None
            }
            r = &mut listener_task => Some(r),
        };

        self.heartbeat_cancel.cancel();
        self.uplink.close().await;
        accept_stop.cancel();
        let listener_result = match finished {
            Some(r) => r,
            None => listener_task.await,
        };

        self.stats.log_summary();
        let report = GatewayReport {
            requests: self.stats.count(GatewayEvent::RequestReceived),
            found: self.stats.count(GatewayEvent::MatchFound),
            not_found: self.stats.count(GatewayEvent::MatchNotFound),
            uplink_reconnects: self.uplink.reconnect_count(),
            elapsed_seconds: start.elapsed().as_secs_f64(),
        };

        match listener_result {
            Ok(Ok(())) => Ok(report),
            Ok(Err(e)) => {
                log::error!("Accept loop failed: {}", e);
                Err(anyhow::Error::new(e).context("CAMEA listener failed"))
            }
            Err(e) => Err(anyhow!("CAMEA listener task ended abnormally: {}", e)),
        }
    }
}

/// Runs the gateway until the operating time elapses or Ctrl-C.
///
/// # Errors
///
/// Returns an error if startup fails or the accept loop breaks.
pub async fn run_gateway(config: GatewayConfig) -> Result<GatewayReport> {
    let gateway = Gateway::bind(&config).await?;
    let stop = CancellationToken::new();

    let signal_stop = stop.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupted");
                signal_stop.cancel();
            }
            Err(e) => log::warn!("Cannot listen for Ctrl-C: {}", e),
        }
    });

    gateway.run(stop).await
}
