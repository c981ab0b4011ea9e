//! CAMEA wire protocol.
//!
//! This module provides:
//! - The length-prefixed frame codec shared by both links
//! - The fixed handshake and keep-alive control sequences
//! - Stream reassembly of inbound records
//! - `DetectionRequest` parsing and response payload rendering
//! - Timestamp parsing and formatting

pub mod control;
pub mod frame;
pub mod reassembler;
pub mod request;
pub mod response;
pub mod time;

// Re-export public API
pub use control::{is_handshake_ack, is_keep_alive, HANDSHAKE_ACK, KEEP_ALIVE_PROBE};
pub use frame::{decode_frame, encode_frame, Frame, FRAME_HEADER_LEN, FRAME_MAGIC};
pub use reassembler::{latin1_to_string, StreamReassembler};
pub use request::{is_detection_request, parse_detection_request, DetectionRequest};
pub use response::{DetectionResponse, LargeDetection, PlateRead, RepeatAck, NULL_IMAGE_ID};
pub use time::{epoch_ms_to_zone, format_send_time, format_time_det, parse_image_time};
