//! System attribute collection.
//!
//! Reads what the running host actually exposes. Every probe tolerates
//! absence: unreadable files and missing sysfs nodes simply leave the
//! attribute unset.

use std::fs;
use std::path::Path;

use crate::{FingerprintSource, HostAttributes};

/// Collects attributes from the live system.
pub struct SystemFingerprint;

impl FingerprintSource for SystemFingerprint {
    fn attributes(&self) -> HostAttributes {
        HostAttributes {
            cpu_id: cpu_id(),
            mb_serial: board_serial(),
            mac_addresses: mac_addresses(),
            platform: Some(format!(
                "{}-{}",
                std::env::consts::OS,
                std::env::consts::ARCH
            )),
        }
    }
}

/// First `model name` line from /proc/cpuinfo. x86 hosts stopped exposing a
/// per-chip serial decades ago; the model string is the stable part.
fn cpu_id() -> Option<String> {
    let cpuinfo = fs::read_to_string("/proc/cpuinfo").ok()?;
    cpuinfo
        .lines()
        .find(|line| line.starts_with("model name"))
        .and_then(|line| line.split(':').nth(1))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// DMI board serial, falling back to the product UUID when the serial is
/// masked (common on consumer boards without root).
fn board_serial() -> Option<String> {
    for path in [
        "/sys/devices/virtual/dmi/id/board_serial",
        "/sys/devices/virtual/dmi/id/product_uuid",
        "/etc/machine-id",
    ] {
        if let Some(value) = read_trimmed(path) {
            return Some(value);
        }
    }
    None
}

fn read_trimmed(path: impl AsRef<Path>) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "None")
}

/// MAC addresses of physical-looking interfaces under /sys/class/net.
/// Loopback and the usual virtual interface names are skipped here; prefix
/// filtering of virtual vendor MACs happens in [`crate::compute`].
fn mac_addresses() -> Vec<String> {
    const VIRTUAL_IF_PREFIXES: &[&str] = &["lo", "docker", "veth", "br-", "virbr", "tun", "tap"];

    let Ok(entries) = fs::read_dir("/sys/class/net") else {
        return Vec::new();
    };

    let mut macs = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if VIRTUAL_IF_PREFIXES.iter().any(|p| name.starts_with(p)) {
            continue;
        }
        if let Some(mac) = read_trimmed(entry.path().join("address")) {
            if mac != "00:00:00:00:00:00" {
                macs.push(mac);
            }
        }
    }
    macs
}
