//! Venue Transport Port (Driven Port)
//!
//! Interface for the opaque session object that owns the socket to the
//! venue. The transport authenticates the link, delivers outbound packets,
//! and invokes exactly one inbound entry point per received message; it
//! serializes its own callbacks but may run concurrently with the caller's
//! context. Everything above this port treats it as a capability: the
//! gateway never opens sockets itself.

use async_trait::async_trait;

use crate::domain::model::RequestId;

/// Errors reported by the venue transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connecting or handshaking with the venue failed.
    #[error("transport connection failed: {0}")]
    ConnectionFailed(String),

    /// An outbound packet could not be delivered.
    #[error("transport send failed: {0}")]
    SendFailed(String),

    /// The transport has been closed.
    #[error("transport closed")]
    Closed,
}

/// One inbound message delivered by the transport.
///
/// The request id echoes the value returned by [`SessionTransport::send`]
/// for solicited replies; pushes carry an id the gateway never issued.
#[derive(Debug, Clone)]
pub struct InboundFrame {
    /// Request identifier the venue correlates this message to.
    pub request_id: RequestId,
    /// Raw wire buffer, decoded by the gateway's codec.
    pub payload: Vec<u8>,
}

/// The venue session capability.
///
/// Reconnection, if any, is the transport's own responsibility; the gateway
/// logs connection errors and keeps running.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Open the connection to the venue. Idempotent at the call site: the
    /// gateway only calls this while disconnected.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Deliver one outbound packet, returning the venue's request id.
    ///
    /// Fire-and-forget: the eventual reply arrives through the inbound
    /// frame channel with the same request id.
    async fn send(&self, payload: Vec<u8>) -> Result<RequestId, TransportError>;

    /// Close the connection.
    async fn close(&self) -> Result<(), TransportError>;
}
