//! Error types for the fetch pipeline.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Fetch errors.
///
/// Every outcome of the pipeline that is not a payload ends up here. Only
/// [`FetchError::Parse`] is terminal on first sight; the pipeline retries the
/// other kinds before surfacing them.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Network or OS level failure before a response was received.
    #[error("transport error: {0}")]
    Transport(#[source] TransportFailure),

    /// Backend answered with a non-2xx status.
    #[error("server error: HTTP {status}")]
    Server { status: u16 },

    /// Response carried no usable status code.
    #[error("unexpected response: missing or invalid status code")]
    UnexpectedResponse,

    /// Payload could not be decoded into the requested record.
    #[error("failed to parse response: {message}")]
    Parse { message: String },
}

impl FetchError {
    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            // Network/transient
            Self::Transport(_) => 5,
            Self::UnexpectedResponse => 5,

            // Backend refused
            Self::Server { status } if (400..500).contains(status) => 1,
            Self::Server { .. } => 5,

            // Data problems
            Self::Parse { .. } => 6,
        }
    }

    /// Whether the pipeline may issue another attempt after this error.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Parse { .. })
    }

    /// Transport failure caused by losing the network, as opposed to a
    /// failure that happened while the device was online.
    pub fn is_no_connection(&self) -> bool {
        matches!(self, Self::Transport(failure) if failure.is_no_connection())
    }

    pub(crate) fn parse(err: impl fmt::Display) -> Self {
        Self::Parse {
            message: err.to_string(),
        }
    }
}

impl From<TransportFailure> for FetchError {
    fn from(failure: TransportFailure) -> Self {
        Self::Transport(failure)
    }
}

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Cause of a transport-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// No route to the network at all.
    NotConnected,
    /// An established connection dropped mid-request.
    ConnectionLost,
    /// Cellular data disabled for this process.
    DataNotAllowed,
    /// A voice call blocks data on this radio.
    CallActive,
    /// Roaming data is switched off.
    InternationalRoamingOff,
    /// Request did not complete in time.
    TimedOut,
    /// Anything else (TLS, DNS answered with garbage, redirect loops, ...).
    Other,
}

impl TransportErrorKind {
    /// Causes that clear up by themselves once the device is back online.
    pub fn is_no_connection(self) -> bool {
        matches!(
            self,
            Self::NotConnected
                | Self::ConnectionLost
                | Self::DataNotAllowed
                | Self::CallActive
                | Self::InternationalRoamingOff
        )
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotConnected => "not connected",
            Self::ConnectionLost => "connection lost",
            Self::DataNotAllowed => "data not allowed",
            Self::CallActive => "call active",
            Self::InternationalRoamingOff => "international roaming off",
            Self::TimedOut => "timed out",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// Transport failure with its classified cause.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportFailure {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportFailure {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_no_connection(&self) -> bool {
        self.kind.is_no_connection()
    }
}

impl From<reqwest::Error> for TransportFailure {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::TimedOut
        } else if let Some(kind) = io_kind(&err) {
            kind
        } else if err.is_connect() {
            TransportErrorKind::NotConnected
        } else {
            TransportErrorKind::Other
        };

        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// Walk the source chain looking for the io error reqwest wraps.
fn io_kind(err: &(dyn StdError + 'static)) -> Option<TransportErrorKind> {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return match io_err.kind() {
                io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof => Some(TransportErrorKind::ConnectionLost),
                io::ErrorKind::NetworkUnreachable
                | io::ErrorKind::HostUnreachable
                | io::ErrorKind::NetworkDown
                | io::ErrorKind::AddrNotAvailable => Some(TransportErrorKind::NotConnected),
                io::ErrorKind::TimedOut => Some(TransportErrorKind::TimedOut),
                // The host is reachable and said no; the network itself is fine.
                io::ErrorKind::ConnectionRefused => Some(TransportErrorKind::Other),
                _ => None,
            };
        }
        source = cause.source();
    }
    None
}

/// Startup-time configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Base URL is not an absolute http(s) URL that can carry path segments.
    #[error("invalid base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// Environment variable holds a value of the wrong shape.
    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: String, value: String },

    /// HTTP client could not be constructed.
    #[error("failed to create HTTP client: {message}")]
    Client { message: String },

    /// Reachability notifier refused to start.
    #[error("failed to start reachability notifier: {message}")]
    Reachability { message: String },
}
