/// Day snapshot stored as a JSON document next to the event log

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::error::Result;
use crate::core::facility::FacilityMeta;
use crate::core::referral::{Intervention, Referral};

/// On-disk document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub referrals: Vec<Referral>,
    /// Interventions logged outside a referral, keyed by case id
    #[serde(default)]
    pub interventions: BTreeMap<String, Vec<Intervention>>,
    /// Facility capacity data
    #[serde(default)]
    pub resources: BTreeMap<String, FacilityMeta>,
}

pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot
    ///
    /// `None` when no file exists yet. A file that cannot be read or parsed
    /// yields an empty document.
    pub fn load(&self) -> Option<Snapshot> {
        if !self.path.exists() {
            return None;
        }

        let parsed = fs::read_to_string(&self.path)
            .map_err(|e| e.to_string())
            .and_then(|content| serde_json::from_str::<Snapshot>(&content).map_err(|e| e.to_string()));

        match parsed {
            Ok(snapshot) => {
                tracing::debug!(
                    path = %self.path.display(),
                    referrals = snapshot.referrals.len(),
                    "snapshot loaded"
                );
                Some(snapshot)
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "snapshot unreadable, starting empty");
                Some(Snapshot::default())
            }
        }
    }

    /// Write the snapshot via a private temporary file and rename
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let content = serde_json::to_string_pretty(snapshot)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::referral::tests::sample_referral;
    use crate::core::referral::Status;

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("data.json"));
        assert!(store.load().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("nested").join("data.json"));

        let mut snapshot = Snapshot::default();
        snapshot.referrals.push(sample_referral("AB12CD34", Status::Accepted));
        snapshot.resources.insert(
            "NEIGRIHMS".to_string(),
            FacilityMeta { icu_open: 4, acceptance_rate: 0.8 },
        );
        store.save(&snapshot).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, snapshot);
        let files: Vec<_> = fs::read_dir(dir.path().join("nested")).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_concurrent_saves_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");

        let writers: Vec<_> = (0..4)
            .map(|n| {
                let store = SnapshotStore::new(&path);
                std::thread::spawn(move || {
                    let mut snapshot = Snapshot::default();
                    snapshot.referrals.push(sample_referral(&format!("CASE000{}", n), Status::Prealert));
                    for _ in 0..25 {
                        store.save(&snapshot).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let loaded = SnapshotStore::new(&path).load().unwrap();
        assert_eq!(loaded.referrals.len(), 1);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, "{ not json").unwrap();

        let loaded = SnapshotStore::new(&path).load().unwrap();
        assert!(loaded.referrals.is_empty());
        assert!(loaded.resources.is_empty());
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, r#"{"referrals": []}"#).unwrap();

        let loaded = SnapshotStore::new(&path).load().unwrap();
        assert!(loaded.interventions.is_empty());
    }
}
