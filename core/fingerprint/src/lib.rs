//! Hardware fingerprinting.
//!
//! A fingerprint is a deterministic 32-byte digest over stable host
//! attributes: CPU identifier, motherboard serial, the sorted set of
//! physical MAC addresses, and the platform string. It is computed on
//! demand, never persisted, and feeds key derivation so a vault only opens
//! on the host it was bound to.
//!
//! Attribute collection never fails: a missing attribute degrades to the
//! literal `"unknown"` and lowers the reported stability score instead.
//! Hardware changes (new NIC, replaced board) change the fingerprint and
//! lock the vault out by design; there is no soft match.

mod system;

use ursafe_crypto::sha256;

pub use system::SystemFingerprint;

/// Length of a fingerprint in bytes.
pub const FINGERPRINT_LENGTH: usize = 32;

/// Placeholder for attributes the host does not expose.
const UNKNOWN: &str = "unknown";

/// MAC prefixes of documented virtual interfaces, excluded from the
/// fingerprint because they change with container/VM churn.
const VIRTUAL_MAC_PREFIXES: &[&str] = &[
    "02:42",    // docker bridge
    "00:05:69", // vmware
    "00:0c:29", // vmware
    "00:50:56", // vmware
    "08:00:27", // virtualbox
    "52:54:00", // qemu/kvm
    "00:15:5d", // hyper-v
    "00:16:3e", // xen
];

/// Raw host attributes, prior to canonicalization.
///
/// `None` and empty values both mean "the host does not expose this".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostAttributes {
    pub cpu_id: Option<String>,
    pub mb_serial: Option<String>,
    pub mac_addresses: Vec<String>,
    pub platform: Option<String>,
}

/// A computed hardware fingerprint with its stability score.
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint {
    bytes: [u8; FINGERPRINT_LENGTH],
    stability: f64,
}

impl Fingerprint {
    /// The 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LENGTH] {
        &self.bytes
    }

    /// Fraction of fingerprint components that were actually available,
    /// in `[0, 1]`. Low scores mean weak host binding.
    pub fn stability(&self) -> f64 {
        self.stability
    }
}

/// Source of host attributes.
///
/// The engine takes this as a seam so tests can simulate hardware drift;
/// production callers use [`SystemFingerprint`].
pub trait FingerprintSource: Send + Sync {
    fn attributes(&self) -> HostAttributes;
}

impl FingerprintSource for HostAttributes {
    fn attributes(&self) -> HostAttributes {
        self.clone()
    }
}

/// Compute the fingerprint for a set of host attributes.
///
/// Pure function: equal attributes always hash to equal fingerprints.
/// Canonical serialization is
/// `cpu_id 0x00 mb_serial 0x00 mac_1 0x00 .. mac_n 0x00 platform`,
/// with MACs lowercased, virtual interfaces excluded, and the remainder
/// sorted lexicographically.
pub fn compute(attrs: &HostAttributes) -> Fingerprint {
    let cpu = component(attrs.cpu_id.as_deref());
    let board = component(attrs.mb_serial.as_deref());
    let platform = component(attrs.platform.as_deref());

    let mut macs: Vec<String> = attrs
        .mac_addresses
        .iter()
        .map(|mac| mac.trim().to_ascii_lowercase())
        .filter(|mac| !mac.is_empty() && !is_excluded_mac(mac))
        .collect();
    macs.sort();
    macs.dedup();

    let mac_component = if macs.is_empty() {
        UNKNOWN.to_string()
    } else {
        macs.join("\0")
    };

    let mut canonical = Vec::new();
    canonical.extend_from_slice(cpu.as_bytes());
    canonical.push(0);
    canonical.extend_from_slice(board.as_bytes());
    canonical.push(0);
    canonical.extend_from_slice(mac_component.as_bytes());
    canonical.push(0);
    canonical.extend_from_slice(platform.as_bytes());

    let known = [cpu, board, mac_component.as_str(), platform]
        .iter()
        .filter(|&&c| c != UNKNOWN)
        .count();

    Fingerprint {
        bytes: sha256(&canonical),
        stability: known as f64 / 4.0,
    }
}

fn component(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => UNKNOWN,
    }
}

fn is_excluded_mac(mac: &str) -> bool {
    mac == "00:00:00:00:00:00" || VIRTUAL_MAC_PREFIXES.iter().any(|p| mac.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_attrs() -> HostAttributes {
        HostAttributes {
            cpu_id: Some("GenuineIntel Family 6 Model 142".to_string()),
            mb_serial: Some("MB-9911-X".to_string()),
            mac_addresses: vec!["AA:BB:CC:DD:EE:FF".to_string(), "11:22:33:44:55:66".to_string()],
            platform: Some("linux-x86_64".to_string()),
        }
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let attrs = full_attrs();
        assert_eq!(compute(&attrs), compute(&attrs));
    }

    #[test]
    fn test_fingerprint_is_32_bytes_and_stable_score_full() {
        let fp = compute(&full_attrs());
        assert_eq!(fp.as_bytes().len(), FINGERPRINT_LENGTH);
        assert_eq!(fp.stability(), 1.0);
    }

    #[test]
    fn test_mac_order_does_not_matter() {
        let mut reordered = full_attrs();
        reordered.mac_addresses.reverse();
        assert_eq!(
            compute(&full_attrs()).as_bytes(),
            compute(&reordered).as_bytes()
        );
    }

    #[test]
    fn test_mac_case_does_not_matter() {
        let mut lowered = full_attrs();
        lowered.mac_addresses = lowered
            .mac_addresses
            .iter()
            .map(|m| m.to_ascii_lowercase())
            .collect();
        assert_eq!(
            compute(&full_attrs()).as_bytes(),
            compute(&lowered).as_bytes()
        );
    }

    #[test]
    fn test_virtual_macs_are_excluded() {
        let mut with_docker = full_attrs();
        with_docker
            .mac_addresses
            .push("02:42:ac:11:00:02".to_string());
        assert_eq!(
            compute(&full_attrs()).as_bytes(),
            compute(&with_docker).as_bytes()
        );
    }

    #[test]
    fn test_board_serial_changes_fingerprint() {
        let mut drifted = full_attrs();
        drifted.mb_serial = Some("MB-0000-Y".to_string());
        assert_ne!(compute(&full_attrs()).as_bytes(), compute(&drifted).as_bytes());
    }

    #[test]
    fn test_missing_attributes_degrade_stability() {
        let attrs = HostAttributes {
            cpu_id: None,
            mb_serial: Some("".to_string()),
            mac_addresses: vec![],
            platform: Some("linux-x86_64".to_string()),
        };
        let fp = compute(&attrs);
        assert_eq!(fp.stability(), 0.25);
    }

    #[test]
    fn test_empty_host_still_produces_fingerprint() {
        let fp = compute(&HostAttributes::default());
        assert_eq!(fp.as_bytes().len(), FINGERPRINT_LENGTH);
        assert_eq!(fp.stability(), 0.0);
    }

    #[test]
    fn test_unknown_substitution_is_not_ambiguous_with_literal() {
        // A host that reports no CPU and a host reporting the literal string
        // hash identically; the stability score is what tells them apart.
        let missing = HostAttributes {
            cpu_id: None,
            ..full_attrs()
        };
        let literal = HostAttributes {
            cpu_id: Some("unknown".to_string()),
            ..full_attrs()
        };
        assert_eq!(compute(&missing).as_bytes(), compute(&literal).as_bytes());
        assert!(compute(&missing).stability() < compute(&literal).stability());
    }

    #[test]
    fn test_system_source_never_panics() {
        let attrs = SystemFingerprint.attributes();
        let fp = compute(&attrs);
        assert_eq!(fp.as_bytes().len(), FINGERPRINT_LENGTH);
        assert!((0.0..=1.0).contains(&fp.stability()));
    }
}
