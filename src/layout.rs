//! Deterministic key-space layouts
//!
//! Two layouts are generated at every tier:
//! - `flat`:   `obj-000000` .. `obj-{tier-1}` directly under the bucket root
//! - `nested`: `prefix-000/obj-000000` .. spread over a fixed partition count
//!
//! Key naming must reproduce identically across runs. Seeding, the probe
//! expectations and the prefix trial all derive their numbers from here.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{OBJECT_INDEX_WIDTH, PARTITION_INDEX_WIDTH};

/// Key naming and distribution scheme of a benchmark container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Flat,
    Nested,
}

impl Layout {
    pub const ALL: [Layout; 2] = [Layout::Flat, Layout::Nested];

    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::Flat => "flat",
            Layout::Nested => "nested",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layout {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "flat" => Ok(Layout::Flat),
            "nested" => Ok(Layout::Nested),
            other => Err(anyhow!("Unknown layout '{}'. Expected 'flat' or 'nested'", other)),
        }
    }
}

/// Parse a space- (or comma-) delimited tier list.
///
/// The result is sorted ascending and de-duplicated; zero or non-numeric
/// entries are rejected.
pub fn parse_tiers(input: &str) -> Result<Vec<u64>> {
    let mut tiers = Vec::new();
    for token in input.split(|c: char| c.is_whitespace() || c == ',') {
        if token.is_empty() {
            continue;
        }
        let tier: u64 = token
            .parse()
            .map_err(|_| anyhow!("Invalid tier '{}': expected a positive integer", token))?;
        if tier == 0 {
            bail!("Invalid tier '0': tiers must be positive");
        }
        tiers.push(tier);
    }
    if tiers.is_empty() {
        bail!("Tier list is empty");
    }
    tiers.sort_unstable();
    tiers.dedup();
    Ok(tiers)
}

/// Bucket name for one (layout, tier) point: `{prefix}-{layout}-{tier}`
pub fn container_name(prefix: &str, layout: Layout, tier: u64) -> String {
    format!("{}-{}-{}", prefix, layout, tier)
}

/// Flat key for object `index`
pub fn flat_key(index: u64) -> String {
    format!("obj-{:0width$}", index, width = OBJECT_INDEX_WIDTH)
}

/// Partition prefix including the trailing delimiter, e.g. `prefix-007/`
pub fn partition_prefix(partition: usize) -> String {
    format!("prefix-{:0width$}/", partition, width = PARTITION_INDEX_WIDTH)
}

/// Nested key for object `index` inside `partition`
pub fn nested_key(partition: usize, index: u64) -> String {
    format!("{}{}", partition_prefix(partition), flat_key(index))
}

/// Object count of every partition for `tier` objects over `partitions`.
///
/// Partition `p` holds `tier / partitions + 1` objects when
/// `p < tier % partitions`, otherwise `tier / partitions`.
pub fn partition_counts(tier: u64, partitions: usize) -> Vec<u64> {
    if partitions == 0 {
        return Vec::new();
    }
    let p = partitions as u64;
    let base = tier / p;
    let remainder = tier % p;
    (0..p).map(|i| if i < remainder { base + 1 } else { base }).collect()
}

/// Number of partitions that actually receive objects.
///
/// Smaller than `partitions` only when `tier < partitions`; empty
/// partitions have no keys and therefore no common prefix.
pub fn populated_partitions(tier: u64, partitions: usize) -> usize {
    partition_counts(tier, partitions).iter().filter(|&&c| c > 0).count()
}

/// All keys of a container, in generation order.
///
/// Nested objects are numbered per partition, so growing a tier only
/// appends keys to each partition and never renames existing ones.
pub fn generate_keys(layout: Layout, tier: u64, partitions: usize) -> Vec<String> {
    match layout {
        Layout::Flat => (0..tier).map(flat_key).collect(),
        Layout::Nested => {
            let mut keys = Vec::with_capacity(tier as usize);
            for (partition, count) in partition_counts(tier, partitions).into_iter().enumerate() {
                for index in 0..count {
                    keys.push(nested_key(partition, index));
                }
            }
            keys
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tiers_sorts_and_dedups() {
        assert_eq!(parse_tiers("1000 100  1000\t10").unwrap(), vec![10, 100, 1000]);
        assert_eq!(parse_tiers("5,2").unwrap(), vec![2, 5]);
    }

    #[test]
    fn test_parse_tiers_rejects_bad_input() {
        assert!(parse_tiers("").is_err());
        assert!(parse_tiers("   ").is_err());
        assert!(parse_tiers("10 0").is_err());
        assert!(parse_tiers("10 abc").is_err());
        assert!(parse_tiers("-5").is_err());
    }

    #[test]
    fn test_container_name() {
        assert_eq!(container_name("listbench", Layout::Flat, 100), "listbench-flat-100");
        assert_eq!(container_name("lb", Layout::Nested, 1000), "lb-nested-1000");
    }

    #[test]
    fn test_key_formats() {
        assert_eq!(flat_key(0), "obj-000000");
        assert_eq!(flat_key(99), "obj-000099");
        assert_eq!(nested_key(3, 12), "prefix-003/obj-000012");
        assert_eq!(partition_prefix(0), "prefix-000/");
    }

    #[test]
    fn test_partition_counts_distribution_rule() {
        for tier in [1u64, 7, 10, 99, 100, 101, 1234, 10_000] {
            for partitions in [1usize, 3, 7, 10, 100] {
                let counts = partition_counts(tier, partitions);
                assert_eq!(counts.len(), partitions);
                assert_eq!(counts.iter().sum::<u64>(), tier, "tier={} p={}", tier, partitions);
                let base = tier / partitions as u64;
                let rem = tier % partitions as u64;
                for (p, count) in counts.iter().enumerate() {
                    let expected = if (p as u64) < rem { base + 1 } else { base };
                    assert_eq!(*count, expected, "tier={} partition={}", tier, p);
                }
            }
        }
    }

    #[test]
    fn test_flat_keys_for_tier_100() {
        let keys = generate_keys(Layout::Flat, 100, 10);
        assert_eq!(keys.len(), 100);
        assert_eq!(keys.first().unwrap(), "obj-000000");
        assert_eq!(keys.last().unwrap(), "obj-000099");
    }

    #[test]
    fn test_nested_keys_for_tier_100() {
        let keys = generate_keys(Layout::Nested, 100, 10);
        assert_eq!(keys.len(), 100);
        for p in 0..10 {
            let prefix = partition_prefix(p);
            assert_eq!(keys.iter().filter(|k| k.starts_with(&prefix)).count(), 10);
        }
        assert!(keys.contains(&"prefix-009/obj-000009".to_string()));
    }

    #[test]
    fn test_nested_keys_grow_without_renaming() {
        let small = generate_keys(Layout::Nested, 25, 10);
        let large = generate_keys(Layout::Nested, 40, 10);
        for key in &small {
            assert!(large.contains(key), "{} missing after growth", key);
        }
    }

    #[test]
    fn test_populated_partitions_when_tier_below_partitions() {
        assert_eq!(populated_partitions(5, 10), 5);
        assert_eq!(populated_partitions(100, 10), 10);
    }
}
