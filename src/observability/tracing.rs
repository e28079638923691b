//! Per-connection spans.
//!
//! Every accepted connection runs inside a `connection` span carrying its
//! id and peer, so session, pump and idle-timeout events correlate.

use std::net::SocketAddr;

use crate::net::connection::ConnectionId;

pub fn connection_span(id: ConnectionId, peer: SocketAddr) -> tracing::Span {
    tracing::info_span!("connection", id = %id, peer = %peer)
}
