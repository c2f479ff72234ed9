//! Capability bitmap codec.
//!
//! Devices advertise which feature groups they understand through the
//! `X-System-Supported-Docs` header: a comma separated list of integers, each
//! `(group_id << 24) | group_bitmap`. Every group maps its local bits onto
//! global capability bits, and the global bits map onto feature names.
//!
//! The global `feature -> bit` table is the fixed point of the protocol and is
//! additive only: an existing bit never changes meaning.

use std::collections::{BTreeMap, HashMap};

use crate::domain::errors::DomainError;

const GROUP_SHIFT: u32 = 24;
const GROUP_BITMAP_MASK: u32 = 0x00FF_FFFF;

/// One `(group bit -> capability bit)` mapping. Both positions are 1-based from the LSB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitMapping {
    pub group_bit: u32,
    pub cpe_bit: u32,
}

impl BitMapping {
    pub const fn new(group_bit: u32, cpe_bit: u32) -> Self {
        Self { group_bit, cpe_bit }
    }
}

/// Immutable capability tables, injected wherever bitmaps are decoded.
#[derive(Debug, Clone)]
pub struct CapabilityTable {
    groups: HashMap<u32, Vec<BitMapping>>,
    features: BTreeMap<String, u32>,
}

impl CapabilityTable {
    pub fn new(groups: HashMap<u32, Vec<BitMapping>>, features: BTreeMap<String, u32>) -> Self {
        Self { groups, features }
    }

    /// Split one header token into `(group_id, group_bitmap)`.
    pub fn parse_group(token: &str) -> Result<(u32, u32), DomainError> {
        let value: u32 = token
            .trim()
            .parse()
            .map_err(|_| DomainError::InvalidCapabilityToken(token.to_string()))?;
        Ok((value >> GROUP_SHIFT, value & GROUP_BITMAP_MASK))
    }

    /// Fold a whole `X-System-Supported-Docs` value into one capability bitmap.
    ///
    /// Unknown group ids are ignored so that newer firmware can mix with older
    /// tables in the same fleet; non numeric tokens are an error.
    pub fn aggregate_bitmap(&self, header: &str) -> Result<i64, DomainError> {
        if header.trim().is_empty() {
            return Ok(0);
        }

        let mut cpe_bitmap: i64 = 0;
        for token in header.split(',') {
            let (group_id, group_bitmap) = Self::parse_group(token)?;
            let Some(mappings) = self.groups.get(&group_id) else {
                tracing::debug!(group_id, "ignoring unknown capability group");
                continue;
            };
            for mapping in mappings {
                if bit_is_set(group_bitmap as i64, mapping.group_bit) {
                    cpe_bitmap |= bit_mask(mapping.cpe_bit);
                }
            }
        }
        Ok(cpe_bitmap)
    }

    pub fn is_feature_supported(&self, cpe_bitmap: i64, feature: &str) -> bool {
        self.features
            .get(feature)
            .is_some_and(|bit| bit_is_set(cpe_bitmap, *bit))
    }

    /// True when the name appears in the feature table at all.
    pub fn is_known_feature(&self, feature: &str) -> bool {
        self.features.contains_key(feature)
    }

    pub fn supported_feature_map(&self, cpe_bitmap: i64) -> BTreeMap<String, bool> {
        self.features
            .iter()
            .map(|(name, bit)| (name.clone(), bit_is_set(cpe_bitmap, *bit)))
            .collect()
    }

    /// Inverse of [`supported_feature_map`](Self::supported_feature_map). Unknown names are skipped.
    pub fn bitmap_from_feature_map(&self, features: &BTreeMap<String, bool>) -> i64 {
        features
            .iter()
            .filter(|(_, enabled)| **enabled)
            .filter_map(|(name, _)| self.features.get(name))
            .fold(0i64, |acc, bit| acc | bit_mask(*bit))
    }

    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }
}

impl Default for CapabilityTable {
    fn default() -> Self {
        let groups: HashMap<u32, Vec<BitMapping>> = [
            (
                1,
                vec![
                    BitMapping::new(1, 1),
                    BitMapping::new(2, 2),
                    BitMapping::new(3, 3),
                    BitMapping::new(4, 4),
                    BitMapping::new(5, 5),
                    BitMapping::new(6, 6),
                ],
            ),
            (
                2,
                vec![
                    BitMapping::new(1, 7),
                    BitMapping::new(2, 8),
                    BitMapping::new(3, 9),
                ],
            ),
            (3, vec![BitMapping::new(1, 10)]),
            (4, vec![BitMapping::new(1, 11)]),
            (5, vec![BitMapping::new(1, 12)]),
            (6, vec![BitMapping::new(1, 13)]),
            (7, vec![BitMapping::new(1, 14)]),
            (8, vec![BitMapping::new(1, 15)]),
            (9, vec![BitMapping::new(1, 16), BitMapping::new(2, 17)]),
            (10, vec![BitMapping::new(1, 18)]),
            (11, vec![BitMapping::new(1, 19)]),
            (
                12,
                vec![
                    BitMapping::new(1, 20),
                    BitMapping::new(2, 21),
                    BitMapping::new(3, 22),
                    BitMapping::new(4, 23),
                    BitMapping::new(5, 24),
                ],
            ),
            (13, vec![BitMapping::new(1, 25), BitMapping::new(2, 26)]),
            (14, vec![BitMapping::new(1, 27)]),
            (15, vec![BitMapping::new(1, 28)]),
        ]
        .into_iter()
        .collect();

        let features: BTreeMap<String, u32> = [
            ("portforwarding", 1),
            ("lan", 2),
            ("wan", 3),
            ("macbinding", 4),
            ("hotspot", 5),
            ("bridge", 6),
            ("privatessid", 7),
            ("homessid", 8),
            ("radio", 9),
            ("moca", 10),
            ("xdns", 11),
            ("advsecurity", 12),
            ("mesh", 13),
            ("aker", 14),
            ("telemetry", 15),
            ("trafficreport", 16),
            ("interfacereport", 17),
            ("statusreport", 18),
            ("radioreport", 19),
            ("telcovoip", 20),
            ("wanmanager", 21),
            ("voiceservice", 22),
            ("wanfailover", 23),
            ("cellularconfig", 24),
            ("gwfailover", 25),
            ("gwrestore", 26),
            ("prioritizedmacs", 27),
            ("lldqoscontrol", 28),
        ]
        .into_iter()
        .map(|(name, bit)| (name.to_string(), bit))
        .collect();

        Self::new(groups, features)
    }
}

/// Mask for a 1-based bit position. Positions outside `1..=63` map to no bit.
fn bit_mask(bit: u32) -> i64 {
    if (1..=63).contains(&bit) {
        1i64 << (bit - 1)
    } else {
        0
    }
}

fn bit_is_set(bitmap: i64, bit: u32) -> bool {
    bitmap & bit_mask(bit) != 0
}
