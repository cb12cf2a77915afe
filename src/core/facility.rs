/// Receiving facilities and their capacity data

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::error::{DeskError, Result};
use crate::utils::{DEFAULT_ACCEPTANCE_RATE, MAX_ICU_BEDS};

/// Capacity data kept per facility
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FacilityMeta {
    #[serde(rename = "ICU_open")]
    pub icu_open: u32,
    #[serde(rename = "acceptanceRate")]
    pub acceptance_rate: f64,
}

impl Default for FacilityMeta {
    fn default() -> Self {
        Self {
            icu_open: 0,
            acceptance_rate: DEFAULT_ACCEPTANCE_RATE,
        }
    }
}

/// Facility name -> capacity data, ordered by insertion via `names`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacilityRegistry {
    names: Vec<String>,
    meta: BTreeMap<String, FacilityMeta>,
}

impl FacilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, meta: FacilityMeta) {
        let name = name.into();
        if !self.meta.contains_key(&name) {
            self.names.push(name.clone());
        }
        self.meta.insert(name, meta);
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.meta.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Capacity data, or the defaults for an unknown facility
    pub fn meta(&self, name: &str) -> FacilityMeta {
        self.meta.get(name).copied().unwrap_or_default()
    }

    pub fn set_icu_open(&mut self, name: &str, beds: u32) -> Result<()> {
        if beds > MAX_ICU_BEDS {
            return Err(DeskError::invalid(format!(
                "ICU beds must be between 0 and {} (got {})",
                MAX_ICU_BEDS, beds
            )));
        }
        let meta = self
            .meta
            .get_mut(name)
            .ok_or_else(|| DeskError::UnknownFacility(name.to_string()))?;
        meta.icu_open = beds;
        Ok(())
    }

    /// Name after `current` in registry order, wrapping around
    pub fn next_after(&self, current: &str) -> Option<&str> {
        if self.names.is_empty() {
            return None;
        }
        let idx = self.names.iter().position(|n| n == current).map_or(0, |i| i + 1);
        Some(self.names[idx % self.names.len()].as_str())
    }

    pub fn prev_before(&self, current: &str) -> Option<&str> {
        if self.names.is_empty() {
            return None;
        }
        let len = self.names.len();
        let idx = self
            .names
            .iter()
            .position(|n| n == current)
            .map_or(0, |i| (i + len - 1) % len);
        Some(self.names[idx].as_str())
    }

    /// Flat map form used in the snapshot document
    pub fn to_map(&self) -> BTreeMap<String, FacilityMeta> {
        self.meta.clone()
    }

    /// Rebuild from the snapshot form, keeping `order` first
    pub fn from_map(order: &[&str], map: BTreeMap<String, FacilityMeta>) -> Self {
        let mut registry = Self::new();
        for name in order {
            if let Some(meta) = map.get(*name) {
                registry.insert(*name, *meta);
            }
        }
        for (name, meta) in map {
            if !registry.contains(&name) {
                registry.insert(name, meta);
            }
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> FacilityRegistry {
        let mut r = FacilityRegistry::new();
        r.insert("A", FacilityMeta { icu_open: 2, acceptance_rate: 0.8 });
        r.insert("B", FacilityMeta { icu_open: 5, acceptance_rate: 0.7 });
        r
    }

    #[test]
    fn test_unknown_facility_defaults() {
        let r = registry();
        assert_eq!(r.meta("Z"), FacilityMeta { icu_open: 0, acceptance_rate: 0.75 });
    }

    #[test]
    fn test_set_icu_open() {
        let mut r = registry();
        r.set_icu_open("A", 12).unwrap();
        assert_eq!(r.meta("A").icu_open, 12);

        assert!(matches!(r.set_icu_open("A", 51), Err(DeskError::InvalidInput(_))));
        assert!(matches!(r.set_icu_open("Z", 1), Err(DeskError::UnknownFacility(_))));
    }

    #[test]
    fn test_cycle() {
        let r = registry();
        assert_eq!(r.next_after("A"), Some("B"));
        assert_eq!(r.next_after("B"), Some("A"));
        assert_eq!(r.prev_before("A"), Some("B"));
        assert_eq!(r.next_after("unknown"), Some("A"));
    }

    #[test]
    fn test_map_roundtrip_keeps_order() {
        let r = registry();
        let rebuilt = FacilityRegistry::from_map(&["B", "A"], r.to_map());
        assert_eq!(rebuilt.names(), &["B".to_string(), "A".to_string()]);
        assert_eq!(rebuilt.meta("B").icu_open, 5);
    }

    #[test]
    fn test_meta_json_names() {
        let json = serde_json::to_value(FacilityMeta { icu_open: 3, acceptance_rate: 0.9 }).unwrap();
        assert_eq!(json["ICU_open"], 3);
        assert_eq!(json["acceptanceRate"], 0.9);
    }
}
