//! Parser for the Linux `/proc/net/{tcp,udp}[6]` socket tables.

use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;

use super::{Connection, ConnectionState, Protocol, SourceError};

/// The "inet" tables: TCP and UDP over both address families.
const TABLES: &[(&str, Protocol)] = &[
    ("tcp", Protocol::Tcp),
    ("tcp6", Protocol::Tcp),
    ("udp", Protocol::Udp),
    ("udp6", Protocol::Udp),
];

/// Read every inet socket table under `root` (normally `/proc/net`).
///
/// A missing table is skipped (IPv6 may be disabled); a permission
/// error fails the whole read so the caller can treat it uniformly.
pub fn read_connections(root: &Path) -> Result<Vec<Connection>, SourceError> {
    let mut connections = Vec::new();
    let mut found_any = false;

    for (name, protocol) in TABLES {
        let path = root.join(name);
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                found_any = true;
                connections.extend(parse_table(&content, *protocol));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Err(SourceError::PermissionDenied { what: path.display().to_string() });
            }
            Err(e) => {
                return Err(SourceError::Unavailable {
                    what: path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if !found_any {
        return Err(SourceError::Unavailable {
            what: root.display().to_string(),
            reason: "no socket tables found".into(),
        });
    }
    Ok(connections)
}

/// Parse one table. The header line and malformed rows are skipped.
pub fn parse_table(content: &str, protocol: Protocol) -> Vec<Connection> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| parse_line(line, protocol))
        .collect()
}

fn parse_line(line: &str, protocol: Protocol) -> Option<Connection> {
    // sl local_address rem_address st ...
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 {
        return None;
    }

    let local = parse_endpoint(fields[1])?;
    let remote = parse_endpoint(fields[2])?;
    let state = match protocol {
        Protocol::Tcp => tcp_state(fields[3])?,
        Protocol::Udp => ConnectionState::None,
    };

    Some(Connection { protocol, local, remote, state })
}

/// `0100007F:0050` → `127.0.0.1:80`.
fn parse_endpoint(field: &str) -> Option<SocketAddr> {
    let (addr_hex, port_hex) = field.split_once(':')?;
    let port = u16::from_str_radix(port_hex, 16).ok()?;
    let ip = parse_hex_ip(addr_hex)?;
    Some(SocketAddr::new(ip, port))
}

/// The kernel prints each 32-bit word of the address in host byte
/// order; this assumes a little-endian host.
fn parse_hex_ip(hex: &str) -> Option<IpAddr> {
    match hex.len() {
        8 => {
            let word = u32::from_str_radix(hex, 16).ok()?;
            Some(IpAddr::V4(Ipv4Addr::from(word.to_le_bytes())))
        }
        32 => {
            let mut octets = [0u8; 16];
            for (i, chunk) in octets.chunks_mut(4).enumerate() {
                let word = u32::from_str_radix(&hex[i * 8..i * 8 + 8], 16).ok()?;
                chunk.copy_from_slice(&word.to_le_bytes());
            }
            Some(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => None,
    }
}

fn tcp_state(code: &str) -> Option<ConnectionState> {
    let state = match u8::from_str_radix(code, 16).ok()? {
        0x01 => ConnectionState::Established,
        0x02 => ConnectionState::SynSent,
        0x03 => ConnectionState::SynRecv,
        0x04 => ConnectionState::FinWait1,
        0x05 => ConnectionState::FinWait2,
        0x06 => ConnectionState::TimeWait,
        0x07 => ConnectionState::Close,
        0x08 => ConnectionState::CloseWait,
        0x09 => ConnectionState::LastAck,
        0x0A => ConnectionState::Listen,
        0x0B => ConnectionState::Closing,
        _ => return None,
    };
    Some(state)
}
