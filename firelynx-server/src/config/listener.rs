//! Listener model: a network ingress with a protocol options variant
//!
//! The options variant doubles as the protocol discriminator; there is
//! no separate type field to keep in sync.

use std::fmt;
use std::time::Duration;

/// Protocol kind of a listener, derived from its options variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    Http,
    Grpc,
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Grpc => write!(f, "grpc"),
        }
    }
}

/// A network ingress: bind address plus protocol options.
#[derive(Debug, Clone)]
pub struct Listener {
    pub id: String,
    pub address: String,

    /// Absent when the wire document carried no recognized protocol
    /// variant; validation rejects that state.
    pub options: Option<ListenerOptions>,
}

impl Listener {
    /// The protocol this listener serves, when options are present.
    pub fn kind(&self) -> Option<ListenerKind> {
        self.options.as_ref().map(ListenerOptions::kind)
    }

    /// HTTP options, when this is an HTTP listener.
    pub fn http_options(&self) -> Option<&HttpListenerOptions> {
        match &self.options {
            Some(ListenerOptions::Http(o)) => Some(o),
            _ => None,
        }
    }

    /// gRPC options, when this is a gRPC listener.
    pub fn grpc_options(&self) -> Option<&GrpcListenerOptions> {
        match &self.options {
            Some(ListenerOptions::Grpc(o)) => Some(o),
            _ => None,
        }
    }
}

/// Protocol-specific listener tuning. The variant IS the protocol.
#[derive(Debug, Clone)]
pub enum ListenerOptions {
    Http(HttpListenerOptions),
    Grpc(GrpcListenerOptions),
}

impl ListenerOptions {
    pub fn kind(&self) -> ListenerKind {
        match self {
            Self::Http(_) => ListenerKind::Http,
            Self::Grpc(_) => ListenerKind::Grpc,
        }
    }
}

/// HTTP listener tuning. A zero duration means "use the listener
/// runtime's default".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpListenerOptions {
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub idle_timeout: Duration,
    pub drain_timeout: Duration,
}

/// gRPC listener tuning. Zero durations defer to the runtime default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrpcListenerOptions {
    pub max_connection_idle: Duration,
    pub max_connection_age: Duration,
    pub max_concurrent_streams: Option<u32>,
}
