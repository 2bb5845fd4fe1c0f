//! Host identity shown on the idle screen. Every value is best effort: a failed read
//! becomes a fixed fallback string, never an error.

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};
use sysinfo::{Networks, System};
use tracing::debug;

use crate::config::{CommandSpec, ConsoleConfig};

const UNKNOWN: &str = "Unknown";
const MAX_ADDRESSES: usize = 3;
const SKIPPED_INTERFACES: &[&str] = &["lo", "docker", "veth", "fwpr"];
const DMI_VENDOR: &str = "/sys/class/dmi/id/sys_vendor";
const DMI_PRODUCT: &str = "/sys/class/dmi/id/product_name";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub version: String,
    pub kernel: String,
    pub model: String,
    pub cpu: String,
    pub memory: String,
    pub addresses: Vec<String>,
}

/// Caches [`HostInfo`] and regathers it once it is older than the refresh interval.
pub struct HostInfoProvider {
    sys: System,
    version_command: CommandSpec,
    default_vendor: String,
    refresh: Duration,
    cached: Option<(HostInfo, Instant)>,
}

impl HostInfoProvider {
    pub fn new(config: &ConsoleConfig) -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();
        Self {
            sys,
            version_command: config.version_command.clone(),
            default_vendor: config.default_vendor.clone(),
            refresh: config.info_refresh(),
            cached: None,
        }
    }

    pub fn current(&mut self, now: Instant) -> &HostInfo {
        let stale = self
            .cached
            .as_ref()
            .map_or(true, |(_, at)| now.saturating_duration_since(*at) >= self.refresh);
        if stale {
            self.cached = None;
        }
        let (info, _) = self.cached.get_or_insert_with(|| {
            let info = gather(&mut self.sys, &self.version_command, &self.default_vendor);
            debug!(?info, "host info refreshed");
            (info, now)
        });
        info
    }
}

fn gather(sys: &mut System, version_command: &CommandSpec, default_vendor: &str) -> HostInfo {
    sys.refresh_memory();
    let cpu = std::fs::read_to_string("/proc/cpuinfo")
        .ok()
        .and_then(|raw| describe_cpu(&raw))
        .or_else(|| sys.cpus().first().map(|c| c.brand().trim().to_string()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Unknown CPU".to_string());

    HostInfo {
        version: host_version(version_command),
        kernel: System::kernel_version().unwrap_or_else(|| UNKNOWN.to_string()),
        model: describe_model(
            &read_trimmed(Path::new(DMI_VENDOR)),
            &read_trimmed(Path::new(DMI_PRODUCT)),
            default_vendor,
        ),
        cpu,
        memory: format_memory(sys.total_memory()),
        addresses: interface_addresses(),
    }
}

fn read_trimmed(path: &Path) -> String {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn host_version(command: &CommandSpec) -> String {
    Command::new(&command.program)
        .args(&command.args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| parse_version(&String::from_utf8_lossy(&o.stdout)))
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// `pve-manager/8.2.4/faa83925c9641325 (running kernel: 6.8.8-2-pve)` -> `8.2.4`.
pub fn parse_version(output: &str) -> String {
    let output = output.trim();
    match output.split('/').nth(1) {
        Some(rest) => rest.split(' ').next().unwrap_or_default().to_string(),
        None => output.to_string(),
    }
}

/// CPU model from `/proc/cpuinfo`, prefixed with the socket count on multi-socket hosts.
pub fn describe_cpu(cpuinfo: &str) -> Option<String> {
    let mut model = None;
    let mut sockets = HashSet::new();
    for line in cpuinfo.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "model name" => model = Some(value.trim().to_string()),
            "physical id" => {
                sockets.insert(value.trim().to_string());
            }
            _ => {}
        }
    }
    let model = model?;
    Some(match sockets.len() {
        0 | 1 => model,
        n => format!("{n} x {model}"),
    })
}

pub fn describe_model(vendor: &str, product: &str, default_vendor: &str) -> String {
    let joined = format!("{vendor} {product}");
    let joined = joined.trim();
    if joined.is_empty() {
        default_vendor.to_string()
    } else {
        joined.to_string()
    }
}

pub fn format_memory(total_bytes: u64) -> String {
    let gib = total_bytes as f64 / (1024.0 * 1024.0 * 1024.0);
    format!("{gib:.1} GiB Memory")
}

fn interface_addresses() -> Vec<String> {
    let networks = Networks::new_with_refreshed_list();
    let mut interfaces: Vec<(String, Vec<IpAddr>)> = networks
        .list()
        .iter()
        .map(|(name, data)| {
            let addrs = data.ip_networks().iter().map(|n| n.addr).collect();
            (name.clone(), addrs)
        })
        .collect();
    // The interface map is unordered; sort so the same addresses show on every refresh.
    interfaces.sort_by(|a, b| a.0.cmp(&b.0));
    select_addresses(interfaces)
}

/// Management addresses: skips loopback and container/firewall plumbing, keeps the first
/// three distinct addresses in order, falls back to loopback when none remain.
pub fn select_addresses<I>(interfaces: I) -> Vec<String>
where
    I: IntoIterator<Item = (String, Vec<IpAddr>)>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (name, addrs) in interfaces {
        if SKIPPED_INTERFACES.iter().any(|p| name.starts_with(p)) {
            continue;
        }
        for addr in addrs {
            let text = addr.to_string();
            if seen.insert(text.clone()) {
                out.push(text);
            }
        }
    }
    if out.is_empty() {
        out.push("127.0.0.1".to_string());
    }
    out.truncate(MAX_ADDRESSES);
    out
}

/// Web UI URL for an address, bracketing IPv6.
pub fn management_url(address: &str, port: u16) -> String {
    if address.contains(':') {
        format!("https://[{address}]:{port}/")
    } else {
        format!("https://{address}:{port}/")
    }
}
