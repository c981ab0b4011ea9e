//! Socket sessions: the inbound CAMEA management link and the outbound
//! uplink to the CAMEA image store.

mod heartbeat;
mod inbound;
mod uplink;

// Re-export public API
pub use heartbeat::{spawn_heartbeat, KeepAliveSink};
pub use inbound::{run_listener, serve_session, InboundContext, InboundState};
pub use uplink::{Uplink, UplinkSettings, UplinkState};
