//! Fixed control sequences exchanged outside the length-prefixed envelope.

/// Handshake acknowledge the gateway sends right after accepting CAMEA ("HSxx").
pub const HANDSHAKE_ACK: [u8; 4] = [0x48, 0x53, 0x78, 0x78];

/// Keep-alive probe ("KAxx" + 8 zero bytes). Also used as the uplink handshake.
pub const KEEP_ALIVE_PROBE: [u8; 12] = [
    0x4B, 0x41, 0x78, 0x78, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Returns true if `bytes` is exactly the handshake acknowledge.
pub fn is_handshake_ack(bytes: &[u8]) -> bool {
    bytes == HANDSHAKE_ACK
}

/// Returns true if `bytes` is exactly the keep-alive probe.
pub fn is_keep_alive(bytes: &[u8]) -> bool {
    bytes == KEEP_ALIVE_PROBE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_sequences_are_ascii_tagged() {
        assert_eq!(&HANDSHAKE_ACK, b"HSxx");
        assert_eq!(&KEEP_ALIVE_PROBE[..4], b"KAxx");
        assert!(KEEP_ALIVE_PROBE[4..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_exact_match_only() {
        assert!(is_handshake_ack(b"HSxx"));
        assert!(!is_handshake_ack(b"HSxx\0"));
        assert!(is_keep_alive(&KEEP_ALIVE_PROBE));
        assert!(!is_keep_alive(&KEEP_ALIVE_PROBE[..11]));
    }
}
