//! Binary frame envelope shared by both CAMEA links.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! [4 bytes magic "DAtP"][2 bytes message id][2 bytes reserved 0x0000]
//! [4 bytes payload length][payload length bytes of UTF-8 text]
//! ```

use crate::error_handling::FrameError;

/// Magic prefix identifying a data frame.
pub const FRAME_MAGIC: [u8; 4] = *b"DAtP";

/// Fixed header length: magic + message id + reserved + payload length.
pub const FRAME_HEADER_LEN: usize = 12;

/// One decoded wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub message_id: u16,
    pub payload: String,
}

/// Encodes a payload into a complete frame.
///
/// The declared length is the UTF-8 byte length of `payload`.
///
/// # Errors
///
/// Returns `FrameError::PayloadTooLarge` if the payload does not fit in the
/// 32-bit length field.
pub fn encode_frame(message_id: u16, payload: &str) -> Result<Vec<u8>, FrameError> {
    let bytes = payload.as_bytes();
    let len = u32::try_from(bytes.len()).map_err(|_| FrameError::PayloadTooLarge(bytes.len()))?;

    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + bytes.len());
    out.extend_from_slice(&FRAME_MAGIC);
    out.extend_from_slice(&message_id.to_le_bytes());
    out.extend_from_slice(&[0x00, 0x00]);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(bytes);
    Ok(out)
}

/// Decodes one frame from the front of `buf`.
///
/// Returns `Ok(None)` when the buffer does not yet hold the full header plus
/// the declared payload. That is back-pressure, not an error: the caller
/// should read more bytes and try again. On success returns the frame and the
/// number of bytes it occupied.
///
/// # Errors
///
/// - `FrameError::BadMagic` if the first four bytes are not `DAtP`
/// - `FrameError::InvalidUtf8` if the payload is not valid UTF-8
pub fn decode_frame(buf: &[u8]) -> Result<Option<(Frame, usize)>, FrameError> {
    if buf.len() < FRAME_HEADER_LEN {
        return Ok(None);
    }

    let magic: [u8; 4] = [buf[0], buf[1], buf[2], buf[3]];
    if magic != FRAME_MAGIC {
        return Err(FrameError::BadMagic(magic));
    }

    let message_id = u16::from_le_bytes([buf[4], buf[5]]);
    let payload_len = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]) as usize;

    let total = FRAME_HEADER_LEN + payload_len;
    if buf.len() < total {
        return Ok(None);
    }

    let payload = std::str::from_utf8(&buf[FRAME_HEADER_LEN..total])
        .map_err(FrameError::InvalidUtf8)?
        .to_string();

    Ok(Some((
        Frame {
            message_id,
            payload,
        },
        total,
    )))
}
