//! Per-profile connection state machine.
//!
//! The controller asks [`plan`] what a request means for the current state and
//! then drives the adapter accordingly; the table here is the only place that
//! decides which transitions are legal.

use std::fmt::{self, Display};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    Error(String),
}

impl ConnectionState {
    /// `Connecting` and `Disconnecting` resolve on their own; everything else is stable.
    pub fn is_transient(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Disconnecting)
    }

    /// Whether a tunnel is (or is about to be) up for this profile.
    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Connecting)
    }
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Connected => f.write_str("connected"),
            ConnectionState::Disconnecting => f.write_str("disconnecting"),
            ConnectionState::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

/// What a caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Connect,
    Disconnect,
}

/// What the controller has to do to honour a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// Move to `Connecting` and call `bring_up`.
    BringUp,
    /// Move to `Disconnecting` and call `bring_down`.
    BringDown,
    /// Nothing to do.
    Noop,
}

pub fn plan(state: &ConnectionState, request: Request) -> Plan {
    match (state, request) {
        (ConnectionState::Disconnected, Request::Connect)
        | (ConnectionState::Error(_), Request::Connect) => Plan::BringUp,

        // A failed or timed out bring_up may have left a half-built interface.
        (ConnectionState::Connected, Request::Disconnect)
        | (ConnectionState::Error(_), Request::Disconnect) => Plan::BringDown,

        (ConnectionState::Connected, Request::Connect)
        | (ConnectionState::Connecting, Request::Connect)
        | (ConnectionState::Disconnected, Request::Disconnect)
        | (ConnectionState::Disconnecting, Request::Disconnect) => Plan::Noop,

        // Only reachable if a transition was interrupted; settle it in the
        // direction the caller now wants.
        (ConnectionState::Disconnecting, Request::Connect) => Plan::BringUp,
        (ConnectionState::Connecting, Request::Disconnect) => Plan::BringDown,
    }
}
