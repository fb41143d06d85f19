//! Session state machine and identity.
//!
//! `Disconnected → Connecting → Connected → LoggedIn`. Connect is
//! idempotent (an existing connection is reused, only the login step is
//! retried), but a connect attempt already in flight is refused rather
//! than raced. A failed login falls back to `Connected`. The identity
//! triple learned at login (client id, session number, token) is required
//! on every subsequent request except login itself and contract queries.

use super::messages::LoginReply;

/// What a `connect()` caller should do, decided by the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectAction {
    /// No connection exists; open the transport link.
    Start,
    /// A connection already exists; skip straight to the login step.
    Reuse,
    /// Another connect attempt holds the `Connecting` state; refuse.
    InFlight,
}

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection to the venue.
    #[default]
    Disconnected,
    /// Connection attempt in flight.
    Connecting,
    /// Connected, not yet authenticated.
    Connected,
    /// Authenticated; identity triple is populated.
    LoggedIn,
}

impl SessionState {
    /// Whether the session is authenticated.
    #[must_use]
    pub const fn is_logged_in(&self) -> bool {
        matches!(self, Self::LoggedIn)
    }

    /// Whether a connection exists (authenticated or not).
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::LoggedIn)
    }
}

/// The venue-assigned identity triple from a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionIdentity {
    /// Venue-assigned client id.
    pub client_id: String,
    /// Venue-assigned session number; prefixes every local order id.
    pub session_no: String,
    /// Authentication token.
    pub user_token: String,
}

/// Mutable session state behind the client's lock.
#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
    identity: SessionIdentity,
}

impl Session {
    /// Create a disconnected session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the session is authenticated.
    #[must_use]
    pub const fn is_logged_in(&self) -> bool {
        self.state.is_logged_in()
    }

    /// Identity triple; empty until login succeeds.
    #[must_use]
    pub const fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    /// Begin connecting. An existing connection is reused; an attempt
    /// already in flight is refused so a second caller cannot race to the
    /// login step over a link that is not up yet.
    pub fn begin_connect(&mut self) -> ConnectAction {
        match self.state {
            SessionState::Connecting => ConnectAction::InFlight,
            SessionState::Connected | SessionState::LoggedIn => ConnectAction::Reuse,
            SessionState::Disconnected => {
                self.state = SessionState::Connecting;
                ConnectAction::Start
            }
        }
    }

    /// The transport link is up.
    pub fn connected(&mut self) {
        if !self.state.is_connected() {
            self.state = SessionState::Connected;
        }
    }

    /// The connect attempt failed.
    pub fn connect_failed(&mut self) {
        self.state = SessionState::Disconnected;
    }

    /// A login reply validated successfully.
    pub fn complete_login(&mut self, reply: LoginReply) {
        self.identity = SessionIdentity {
            client_id: reply.client_id,
            session_no: reply.session_no,
            user_token: reply.user_token,
        };
        self.state = SessionState::LoggedIn;
    }

    /// The login reply carried an error or lacked the identity triple.
    pub fn login_failed(&mut self) {
        if self.state == SessionState::LoggedIn {
            return;
        }
        self.state = SessionState::Connected;
    }

    /// Tear the session down (close, or a fatal protocol error).
    pub fn disconnect(&mut self) {
        self.state = SessionState::Disconnected;
    }
}
