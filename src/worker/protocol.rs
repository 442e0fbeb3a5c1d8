//! Worker message protocol: requests, replies and correlation.
//!
//! Every request carries a non-negative correlation identifier and an
//! operation code; the matching reply echoes both. The reserved identifier
//! [`NOTIFY`] marks unsolicited worker-to-host notifications, which carry
//! the operation code of the query they answer in advance.

use crate::addr::IpAddress;
use crate::base::LookupError;
use crate::native::PlatformCapability;

/// Correlates a reply with the request that caused it. Non-negative for
/// requests; [`NOTIFY`] for unsolicited notifications.
pub type CorrelationId = i64;

/// Correlation identifier of unsolicited notifications.
pub const NOTIFY: CorrelationId = -1;

/// Operation codes, stable across versions of the protocol.
pub mod opcode {
    pub const SHUTDOWN: u8 = 0;
    pub const REMOTE_LOOKUP: u8 = 1;
    pub const LOCAL_LOOKUP: u8 = 2;
    pub const QUERY_REMOTE_CAPABILITY: u8 = 3;
    pub const QUERY_LOCAL_CAPABILITY: u8 = 4;
    pub const SET_LOG_LEVEL: u8 = 254;
    pub const INIT: u8 = 255;
}

/// Worker logging verbosity, settable at runtime over the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Failures only.
    Critical,
    /// Lifecycle and capability events.
    Normal,
    /// Per-request tracing.
    Verbose,
}

impl Verbosity {
    /// Decode the wire value, clamping unknown levels to `Verbose`.
    pub fn from_wire(level: u8) -> Verbosity {
        match level {
            0 => Verbosity::Critical,
            1 => Verbosity::Normal,
            _ => Verbosity::Verbose,
        }
    }
}

/// A request the host sends to the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Init { os_id: String },
    RemoteLookup { host: String },
    LocalLookup,
    QueryRemoteCapability,
    QueryLocalCapability,
    SetLogLevel(Verbosity),
    Shutdown,
}

impl Request {
    pub fn opcode(&self) -> u8 {
        match self {
            Request::Init { .. } => opcode::INIT,
            Request::RemoteLookup { .. } => opcode::REMOTE_LOOKUP,
            Request::LocalLookup => opcode::LOCAL_LOOKUP,
            Request::QueryRemoteCapability => opcode::QUERY_REMOTE_CAPABILITY,
            Request::QueryLocalCapability => opcode::QUERY_LOCAL_CAPABILITY,
            Request::SetLogLevel(_) => opcode::SET_LOG_LEVEL,
            Request::Shutdown => opcode::SHUTDOWN,
        }
    }
}

/// Reply payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Generic acknowledgement.
    Ack(bool),
    /// Full capability report (init reply).
    Capability(PlatformCapability),
    /// Single capability flag (capability-query reply or notification).
    CapabilityFlag(bool),
    /// Successful lookup result.
    Addresses(Vec<IpAddress>),
    /// The request was processed and failed.
    Failed(LookupError),
}

/// One worker-to-host message: the reply to a request, or an unsolicited
/// notification when `correlation_id` is [`NOTIFY`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub correlation_id: CorrelationId,
    pub opcode: u8,
    pub payload: Payload,
}
