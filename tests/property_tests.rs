//! Property-based tests using proptest
//!
//! Invariants of the capability codec, document filtering, root version
//! hashing and the multipart wire codec over generated inputs.

use std::collections::{BTreeMap, HashSet};

use proptest::prelude::*;

use cpe_config_sync::domain::capability::CapabilityTable;
use cpe_config_sync::domain::codec::{decode, encode, MultipartPart};
use cpe_config_sync::domain::root_version::compute_root_version;
use cpe_config_sync::entities::{Document, SubDocument, VersionMap};

/// Strategy for sub-document names
fn name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}".prop_map(|s| s.to_string())
}

/// Strategy for version tokens
fn version_strategy() -> impl Strategy<Value = String> {
    "[0-9]{1,10}".prop_map(|s| s.to_string())
}

fn versions_strategy() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map(name_strategy(), version_strategy(), 0..12)
}

fn document_from(versions: &BTreeMap<String, String>) -> Document {
    versions
        .iter()
        .map(|(name, version)| {
            (
                name.clone(),
                SubDocument::new(format!("payload-{}", name).into_bytes(), version.clone()),
            )
        })
        .collect()
}

proptest! {
    /// Feature map -> bitmap -> feature map is the identity on known features.
    #[test]
    fn test_bitmap_round_trip(enabled in prop::collection::vec(any::<bool>(), 28)) {
        let table = CapabilityTable::default();
        let features: BTreeMap<String, bool> = table
            .feature_names()
            .zip(enabled.iter())
            .map(|(name, on)| (name.to_string(), *on))
            .collect();

        let bitmap = table.bitmap_from_feature_map(&features);
        prop_assert_eq!(table.supported_feature_map(bitmap), features);
    }

    /// Unknown capability groups never change the aggregate.
    #[test]
    fn test_unknown_groups_are_ignored(low in 0u32..0x00FF_FFFF, group in 100u32..=255) {
        let table = CapabilityTable::default();
        let known = format!("{}", (1u32 << 24) | (low & 0x3F));
        let unknown = format!("{},{}", known, (group << 24) | low);
        prop_assert_eq!(
            table.aggregate_bitmap(&known).unwrap(),
            table.aggregate_bitmap(&unknown).unwrap()
        );
    }

    /// The root version depends only on the name -> version mapping.
    #[test]
    fn test_root_version_is_deterministic(versions in versions_strategy()) {
        let forward = document_from(&versions);
        let reversed: Document = versions
            .iter()
            .rev()
            .map(|(name, version)| (name.clone(), SubDocument::new(&b"x"[..], version.clone())))
            .collect();

        prop_assert_eq!(forward.compute_root_version(), compute_root_version(&versions));
        prop_assert_eq!(forward.compute_root_version(), reversed.compute_root_version());
        if versions.is_empty() {
            prop_assert_eq!(forward.compute_root_version(), "0");
        }
    }

    /// Filtering against the device's own versions leaves nothing, and
    /// filtering twice equals filtering once.
    #[test]
    fn test_filter_for_get_is_idempotent(
        versions in versions_strategy(),
        device in versions_strategy(),
    ) {
        let document = document_from(&versions);
        let device_versions: VersionMap = device;

        let once = document.filter_for_get(&device_versions);
        let twice = once.filter_for_get(&device_versions);
        prop_assert_eq!(once.names(), twice.names());

        for name in once.names() {
            prop_assert_ne!(
                device_versions.get(&name).map(String::as_str),
                document.get(&name).and_then(|s| s.version())
            );
        }

        let own: VersionMap = versions.clone();
        prop_assert!(document.filter_for_get(&own).is_empty());
    }

    /// Blocked names never survive, whatever else is in the document.
    #[test]
    fn test_blocklist_always_applies(
        versions in versions_strategy(),
        blocked in prop::collection::hash_set(name_strategy(), 0..4),
    ) {
        let blocked: HashSet<String> = blocked;
        let filtered = document_from(&versions).without_blocked(&blocked);
        for name in filtered.names() {
            prop_assert!(!blocked.contains(&name));
        }
    }

    /// Encoded parts decode back to the same triples.
    #[test]
    fn test_multipart_round_trip(
        entries in prop::collection::btree_map(
            name_strategy(),
            (version_strategy(), prop::collection::vec(any::<u8>(), 0..256)),
            0..8,
        )
    ) {
        let parts: Vec<MultipartPart> = entries
            .into_iter()
            .map(|(name, (version, payload))| MultipartPart::new(name, version, payload))
            .collect();

        let decoded = decode(&encode(&parts)).unwrap();
        prop_assert_eq!(decoded, parts);
    }
}

#[test]
fn test_part_without_namespace_is_skipped() {
    let body = encode(&[MultipartPart::new("lan", "12345", &b"abc"[..])]);
    let boundary = cpe_config_sync::domain::codec::MULTIPART_BOUNDARY;
    let text = String::from_utf8(body.to_vec()).unwrap();
    let closing = format!("--{}--", boundary);
    let extra = format!(
        "--{}\r\nContent-Type: application/msgpack\r\nEtag: 1\r\n\r\nxyz\r\n{}",
        boundary, closing
    );
    let tampered = text.replacen(&closing, &extra, 1);

    let parts = decode(tampered.as_bytes()).unwrap();
    assert_eq!(parts, vec![MultipartPart::new("lan", "12345", &b"abc"[..])]);
}
