// Shared test helpers: configuration text, a fake CAMEA image store and a
// frame reader that skips control sequences.
//
// Each test binary uses a different subset of these.
#![allow(dead_code)]

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use camea_gateway::protocol::{decode_frame, Frame, HANDSHAKE_ACK, KEEP_ALIVE_PROBE};

/// Upper bound for any single wait in the socket tests.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// Gateway configuration listening on an ephemeral loopback port.
pub fn gateway_yaml(mode: &str, vidar_ip: &str, store_port: u16, tolerance_ms: u64) -> String {
    format!(
        r#"
service:
  host: 127.0.0.1
  port: 0
  module_id: CAM1
  mode: {mode}
  operating_time_minutes: 0
  initial_message_id: 100
settings:
  buffer_size: 4096
  timezone: Europe/Kyiv
  socket_timeout_seconds: 30
  camera_unit_id: UNIT7
vidar:
  ip: "{vidar_ip}"
  tolerance_ms: {tolerance_ms}
  zone_filter: "0"
camea_db:
  ip: 127.0.0.1
  port: {store_port}
"#
    )
}

/// Stand-in for the CAMEA image store end of the uplink.
pub struct FakeImageStore {
    listener: TcpListener,
}

impl FakeImageStore {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake image store");
        Self { listener }
    }

    pub fn port(&self) -> u16 {
        self.listener.local_addr().expect("local addr").port()
    }

    /// Accepts the next uplink connection and answers its handshake probe.
    pub async fn accept_handshake(&self) -> TcpStream {
        let (mut stream, _) = timeout(STEP_TIMEOUT, self.listener.accept())
            .await
            .expect("uplink connected in time")
            .expect("accept uplink");
        let mut probe = [0u8; 12];
        timeout(STEP_TIMEOUT, stream.read_exact(&mut probe))
            .await
            .expect("handshake probe in time")
            .expect("read handshake probe");
        assert_eq!(probe, KEEP_ALIVE_PROBE);
        stream.write_all(b"OK").await.expect("answer handshake");
        stream
    }
}

/// Reads data frames off a socket, dropping keep-alives and handshake acks.
#[derive(Default)]
pub struct FrameReader {
    buf: Vec<u8>,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn next_frame(&mut self, stream: &mut TcpStream) -> Frame {
        timeout(STEP_TIMEOUT, self.read_frame(stream))
            .await
            .expect("frame arrived in time")
    }

    async fn read_frame(&mut self, stream: &mut TcpStream) -> Frame {
        loop {
            self.skip_control();
            // a keep-alive cut short by the read is not a frame yet
            let partial_probe = self.buf.starts_with(&KEEP_ALIVE_PROBE[..4]);
            if self.buf.len() >= 4 && !partial_probe {
                if let Some((frame, used)) = decode_frame(&self.buf).expect("well-formed frame") {
                    self.buf.drain(..used);
                    return frame;
                }
            }
            let mut chunk = [0u8; 8192];
            let n = stream.read(&mut chunk).await.expect("read frame bytes");
            assert!(n > 0, "peer closed before a full frame arrived");
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn skip_control(&mut self) {
        loop {
            if self.buf.starts_with(&KEEP_ALIVE_PROBE) {
                self.buf.drain(..KEEP_ALIVE_PROBE.len());
            } else if self.buf.starts_with(&HANDSHAKE_ACK) {
                self.buf.drain(..HANDSHAKE_ACK.len());
            } else {
                return;
            }
        }
    }
}

/// Value of `key` in a `key:value|...` payload.
pub fn field<'a>(payload: &'a str, key: &str) -> Option<&'a str> {
    payload
        .split('|')
        .filter_map(|segment| segment.split_once(':'))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}
