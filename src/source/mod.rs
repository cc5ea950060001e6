//! Where raw host readings come from.
//!
//! The sampler and the HTTP handlers only see the [`MetricsSource`] trait;
//! [`SystemSource`] is the production implementation.

pub mod procnet;
pub mod sysfs;
pub mod system;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::net::SocketAddr;
use thiserror::Error;

pub use system::SystemSource;

/// One best-effort reading of the host counters.
///
/// A field is `None` when the source could not read it; consumers
/// decide what a gap means (the sampler records zero).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HostCounters {
    pub cpu_percent: Option<f64>,
    pub memory_used_bytes: Option<u64>,
    pub memory_total_bytes: Option<u64>,
    /// Cumulative across all interfaces since boot
    pub bytes_sent: Option<u64>,
    pub bytes_recv: Option<u64>,
}

/// Slower-moving facts about the host, read on demand.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HostInfo {
    pub cpu_count_logical: Option<usize>,
    pub cpu_count_physical: Option<usize>,
    /// Filesystem mounted at `/`
    pub disk: Option<DiskSpace>,
    pub boot_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskSpace {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl DiskSpace {
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.available_bytes)
    }
}

/// A network interface and its addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkInterface {
    pub name: String,
    pub mac: Option<String>,
    pub ipv4: Vec<String>,
    pub ipv6: Vec<String>,
    pub is_up: bool,
    /// Link speed in Mbit/s, 0 when unknown
    pub speed: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

/// Socket state as reported by the kernel. `None` is used for
/// connectionless sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Established,
    SynSent,
    SynRecv,
    FinWait1,
    FinWait2,
    TimeWait,
    Close,
    CloseWait,
    LastAck,
    Listen,
    Closing,
    None,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Established => "ESTABLISHED",
            Self::SynSent => "SYN_SENT",
            Self::SynRecv => "SYN_RECV",
            Self::FinWait1 => "FIN_WAIT1",
            Self::FinWait2 => "FIN_WAIT2",
            Self::TimeWait => "TIME_WAIT",
            Self::Close => "CLOSE",
            Self::CloseWait => "CLOSE_WAIT",
            Self::LastAck => "LAST_ACK",
            Self::Listen => "LISTEN",
            Self::Closing => "CLOSING",
            Self::None => "NONE",
        }
    }

    /// States that count towards connection churn. Listening and idle
    /// sockets never do.
    pub fn is_churn_relevant(&self) -> bool {
        matches!(
            self,
            Self::Established
                | Self::TimeWait
                | Self::CloseWait
                | Self::SynSent
                | Self::SynRecv
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single socket from the host's connection table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Connection {
    pub protocol: Protocol,
    pub local: SocketAddr,
    /// Unspecified address with port 0 when there is no peer
    pub remote: SocketAddr,
    pub state: ConnectionState,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("permission denied reading {what}")]
    PermissionDenied { what: String },

    #[error("{what} unavailable: {reason}")]
    Unavailable { what: String, reason: String },
}

/// Capability that produces raw host readings. Reads are treated as
/// fast and local; implementations must not block for long.
pub trait MetricsSource: Send + Sync + 'static {
    fn host_counters(&self) -> HostCounters;

    fn connections(&self) -> Result<Vec<Connection>, SourceError>;

    /// Every field unknown unless the source can say otherwise.
    fn host_info(&self) -> HostInfo {
        HostInfo::default()
    }

    /// Interfaces sorted by name.
    fn interfaces(&self) -> Result<Vec<NetworkInterface>, SourceError> {
        Ok(Vec::new())
    }
}
