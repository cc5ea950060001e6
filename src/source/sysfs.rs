//! Link state from `/sys/class/net/<iface>`.

use std::path::Path;

/// `IFF_UP` in the interface flags word
const IFF_UP: u32 = 0x1;

/// Administrative state and speed of one interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkState {
    pub is_up: bool,
    /// Mbit/s, 0 when the driver does not report one
    pub speed: u32,
}

/// Read `flags` and `speed` for `iface` under `root` (normally
/// `/sys/class/net`). Unreadable files leave the defaults in place.
pub fn link_state(root: &Path, iface: &str) -> LinkState {
    let dir = root.join(iface);
    let read = |file: &str| std::fs::read_to_string(dir.join(file)).ok();

    LinkState {
        is_up: read("flags").and_then(|f| parse_flags(&f)).is_some_and(|f| f & IFF_UP != 0),
        speed: read("speed").map(|s| parse_speed(&s)).unwrap_or(0),
    }
}

/// `0x1003\n` → `0x1003`
fn parse_flags(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    u32::from_str_radix(raw.strip_prefix("0x").unwrap_or(raw), 16).ok()
}

/// Virtual and down links report -1.
fn parse_speed(raw: &str) -> u32 {
    raw.trim().parse::<i64>().ok().and_then(|s| u32::try_from(s).ok()).unwrap_or(0)
}
