//! Root version token: one value summarizing every sub-document version of a device.

use std::collections::BTreeMap;
use std::io::Cursor;

/// Token meaning "no content yet". Devices and storage both rely on this exact value.
pub const EMPTY_ROOT_VERSION: &str = "0";

const MURMUR_SEED: u32 = 0;

/// Murmur3 x86 32-bit hash of `bytes`, seed 0.
pub fn murmur3_hash(bytes: &[u8]) -> u32 {
    // Reading from an in-memory cursor cannot fail.
    murmur3::murmur3_32(&mut Cursor::new(bytes), MURMUR_SEED).unwrap_or_default()
}

/// Version token for an opaque payload, used when a writer does not provide one.
pub fn payload_version(payload: &[u8]) -> String {
    murmur3_hash(payload).to_string()
}

/// Compute the root version from a `name -> version` map.
///
/// Versions are concatenated without delimiter in name order, so the token is
/// reproducible regardless of how the map was built.
pub fn compute_root_version(versions: &BTreeMap<String, String>) -> String {
    if versions.is_empty() {
        return EMPTY_ROOT_VERSION.to_string();
    }

    let concatenated: String = versions.values().map(String::as_str).collect();
    murmur3_hash(concatenated.as_bytes()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn versions(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_map_is_literal_zero() {
        assert_eq!(compute_root_version(&BTreeMap::new()), "0");
    }

    #[test]
    fn test_known_murmur_vectors() {
        assert_eq!(murmur3_hash(b""), 0);
        assert_eq!(murmur3_hash(b"hello"), 613_153_351);
    }

    #[test]
    fn test_order_of_insertion_does_not_matter() {
        let mut a = BTreeMap::new();
        a.insert("wan".to_string(), "2".to_string());
        a.insert("lan".to_string(), "1".to_string());

        let b = versions(&[("lan", "1"), ("wan", "2")]);
        assert_eq!(compute_root_version(&a), compute_root_version(&b));
    }

    #[test]
    fn test_concatenates_in_name_order() {
        let map = versions(&[("wan", "2"), ("lan", "1")]);
        assert_eq!(compute_root_version(&map), murmur3_hash(b"12").to_string());
    }

    #[test]
    fn test_version_change_changes_root() {
        let before = versions(&[("lan", "1"), ("wan", "2")]);
        let after = versions(&[("lan", "1"), ("wan", "3")]);
        assert_ne!(compute_root_version(&before), compute_root_version(&after));
    }

    #[test]
    fn test_payload_version_is_unsigned_decimal() {
        let version = payload_version(b"abc");
        assert!(version.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(version, murmur3_hash(b"abc").to_string());
    }
}
