//! Error types for trace operations.

use thiserror::Error;

/// Main error type for trace operations.
///
/// Only [`TraceError::NameNotFound`] is part of the expected control
/// flow: it aborts the run for a target that cannot be resolved at all.
/// Probe timeouts and failed reverse lookups are not errors; they are
/// absorbed into [`crate::ProbeResult`] and [`crate::HopReport`].
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("unable to resolve target system name {target}")]
    NameNotFound { target: String },

    #[error("failed to create socket: {0}")]
    SocketCreation(#[source] std::io::Error),

    #[error("failed to send probe: {0}")]
    SendFailed(#[source] std::io::Error),

    #[error("failed to read probe reply: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    #[error("invalid hop ceiling: {max_hops}")]
    InvalidMaxHops { max_hops: u8 },

    #[error("cannot probe {destination} on an {family} socket")]
    FamilyMismatch {
        destination: std::net::IpAddr,
        family: crate::Family,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for trace operations.
pub type TraceResult<T> = Result<T, TraceError>;
