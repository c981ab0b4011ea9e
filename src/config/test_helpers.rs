// Shared configuration fixtures for unit tests.

use super::GatewayConfig;

pub(crate) const SAMPLE_YAML: &str = r#"
service:
  host: 0.0.0.0
  port: 5050
  module_id: CAM1
  mode: VIDAR
  operating_time_minutes: 0
settings:
  buffer_size: 4096
  timezone: Europe/Kyiv
  socket_timeout_seconds: 60
  camera_unit_id: UNIT7
vidar:
  ip: 192.168.6.161
  tolerance_ms: 500
  zone_filter: "0"
camea_db:
  ip: 127.0.0.1
  port: 7777
"#;

/// Parsed `SAMPLE_YAML`.
pub(crate) fn sample_config() -> GatewayConfig {
    GatewayConfig::from_yaml(SAMPLE_YAML).expect("sample config is valid")
}
