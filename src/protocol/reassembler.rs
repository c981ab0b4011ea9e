//! Stream reassembly for the inbound CAMEA link.
//!
//! TCP gives us an arbitrary chunking of the byte stream. Every CAMEA message
//! starts with one of a small set of 4-byte leading markers, so a message is
//! known to be complete only once the *next* marker shows up. The reassembler
//! keeps unconsumed bytes verbatim between reads and emits completed segments
//! in arrival order.

use crate::config::STREAM_MARKERS;

/// Accumulates raw reads and splits them into complete records.
#[derive(Debug, Default)]
pub struct StreamReassembler {
    buffer: Vec<u8>,
}

impl StreamReassembler {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Appends one read's bytes and returns every record completed by it.
    ///
    /// Splits happen in front of every leading marker that is not at the very
    /// start of the current segment, so the marker stays attached to the
    /// following record. The trailing segment (possibly empty) stays buffered.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);

        let boundaries = split_points(&self.buffer);
        let Some(&last) = boundaries.last() else {
            return Vec::new();
        };

        let mut records = Vec::with_capacity(boundaries.len());
        let mut start = 0;
        for &end in &boundaries {
            records.push(self.buffer[start..end].to_vec());
            start = end;
        }
        self.buffer.drain(..last);
        records
    }

    /// Bytes received but not yet emitted as a record.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }
}

/// Positions (> 0) where a leading marker begins.
fn split_points(buf: &[u8]) -> Vec<usize> {
    let mut points = Vec::new();
    // position 0 always begins the current segment, a marker there is not a split
    let mut i = 1;
    while i + 4 <= buf.len() {
        if STREAM_MARKERS.iter().any(|m| &buf[i..i + 4] == m) {
            points.push(i);
            i += 4;
        } else {
            i += 1;
        }
    }
    points
}

/// Decodes a record as ISO-8859-1, mapping every byte to one char.
///
/// The envelope header bytes of inbound frames are not valid UTF-8 in
/// general, so CAMEA queries are handled as Latin-1 text.
pub fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
