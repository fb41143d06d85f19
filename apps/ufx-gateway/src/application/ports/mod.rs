//! Port definitions (driven side).

mod transport;

pub use transport::{InboundFrame, SessionTransport, TransportError};
