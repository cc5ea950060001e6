use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use sysinfo::{Disks, Networks, System};

use super::sysfs::{self, LinkState};
use super::{
    procnet, Connection, DiskSpace, HostCounters, HostInfo, MetricsSource, NetworkInterface,
    SourceError,
};

/// Reads the local host through `sysinfo`, `/proc/net` and `/sys/class/net`.
///
/// `sysinfo` needs `&mut` to refresh, so the handles sit behind one
/// lock; a read holds it only for the refresh itself.
pub struct SystemSource {
    inner: Mutex<Handles>,
    proc_net: PathBuf,
    sys_net: PathBuf,
}

struct Handles {
    sys: System,
    networks: Networks,
    disks: Disks,
}

impl SystemSource {
    pub fn new() -> Self {
        let mut sys = System::new();
        // CPU usage is a delta between two refreshes; prime the baseline
        // so the first real reading is meaningful.
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        Self {
            inner: Mutex::new(Handles {
                sys,
                networks: Networks::new_with_refreshed_list(),
                disks: Disks::new_with_refreshed_list(),
            }),
            proc_net: PathBuf::from("/proc/net"),
            sys_net: PathBuf::from("/sys/class/net"),
        }
    }
}

impl Default for SystemSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSource for SystemSource {
    fn host_counters(&self) -> HostCounters {
        let mut guard = self.inner.lock();
        let Handles { sys, networks, .. } = &mut *guard;

        sys.refresh_cpu_usage();
        sys.refresh_memory();
        networks.refresh();

        let cpu = sys.global_cpu_usage() as f64;
        let total = sys.total_memory();

        // An empty interface list means we could not see any; report the
        // counters as missing rather than as a real zero.
        let interfaces = networks.list();
        let (sent, recv) = if interfaces.is_empty() {
            (None, None)
        } else {
            let (s, r) = interfaces.values().fold((0u64, 0u64), |(s, r), data| {
                (s.saturating_add(data.total_transmitted()), r.saturating_add(data.total_received()))
            });
            (Some(s), Some(r))
        };

        HostCounters {
            cpu_percent: cpu.is_finite().then(|| cpu.clamp(0.0, 100.0)),
            memory_used_bytes: (total > 0).then(|| sys.used_memory()),
            memory_total_bytes: (total > 0).then_some(total),
            bytes_sent: sent,
            bytes_recv: recv,
        }
    }

    fn connections(&self) -> Result<Vec<Connection>, SourceError> {
        procnet::read_connections(&self.proc_net)
    }

    fn host_info(&self) -> HostInfo {
        let mut guard = self.inner.lock();
        let Handles { sys, disks, .. } = &mut *guard;
        disks.refresh();

        let logical = sys.cpus().len();
        let disk = disks
            .list()
            .iter()
            .find(|d| d.mount_point() == Path::new("/"))
            .or_else(|| disks.list().first())
            .map(|d| DiskSpace { total_bytes: d.total_space(), available_bytes: d.available_space() });

        HostInfo {
            cpu_count_logical: (logical > 0).then_some(logical),
            cpu_count_physical: sys.physical_core_count(),
            disk,
            boot_time: boot_time(System::boot_time()),
        }
    }

    fn interfaces(&self) -> Result<Vec<NetworkInterface>, SourceError> {
        let mut guard = self.inner.lock();
        // Pick up interfaces that appeared since startup
        guard.networks.refresh_list();

        let mut interfaces: Vec<NetworkInterface> = guard
            .networks
            .list()
            .iter()
            .map(|(name, data)| {
                let mac = data.mac_address();
                let mac = (!mac.is_unspecified()).then(|| mac.to_string());
                let addrs: Vec<IpAddr> = data.ip_networks().iter().map(|n| n.addr).collect();
                describe_interface(name, mac, &addrs, sysfs::link_state(&self.sys_net, name))
            })
            .collect();
        interfaces.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(interfaces)
    }
}

/// Seconds since the epoch; 0 means the platform could not say.
fn boot_time(secs: u64) -> Option<DateTime<Utc>> {
    if secs == 0 {
        return None;
    }
    DateTime::from_timestamp(i64::try_from(secs).ok()?, 0)
}

fn describe_interface(name: &str, mac: Option<String>, addrs: &[IpAddr], link: LinkState) -> NetworkInterface {
    let (v4, v6): (Vec<&IpAddr>, Vec<&IpAddr>) = addrs.iter().partition(|a| a.is_ipv4());
    NetworkInterface {
        name: name.to_owned(),
        mac,
        ipv4: v4.iter().map(|a| a.to_string()).collect(),
        ipv6: v6.iter().map(|a| a.to_string()).collect(),
        is_up: link.is_up,
        speed: link.speed,
    }
}
