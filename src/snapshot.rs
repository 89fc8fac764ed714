//! The folder snapshot and its JSON form.
//!
//! A snapshot maps folder paths to the VMs found directly in each folder.
//! The JSON document is a single object whose keys are folder paths (see
//! [`FolderPath`] for the rendering) and whose values are arrays of
//! `{"name", "uuid"}` objects. Keys are written in the order the folders were
//! discovered; any key order is accepted when reading. There is no key for the
//! datacenter's VM root itself and the empty string is never a valid key.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::debug;

use crate::folder_path::FolderPath;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot access snapshot file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VmRecord {
    pub name: String,
    pub uuid: String,
}

impl VmRecord {
    pub fn new(name: &str, uuid: &str) -> Self {
        VmRecord {
            name: name.to_string(),
            uuid: uuid.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    entries: Vec<(FolderPath, Vec<VmRecord>)>,
    index: HashMap<FolderPath, usize>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `path` has an entry. Returns true when it was added.
    pub fn ensure_folder(&mut self, path: &FolderPath) -> bool {
        if self.index.contains_key(path) {
            return false;
        }
        self.index.insert(path.clone(), self.entries.len());
        self.entries.push((path.clone(), Vec::new()));
        true
    }

    pub fn push_vm(&mut self, path: &FolderPath, record: VmRecord) {
        self.ensure_folder(path);
        let idx = self.index[path];
        self.entries[idx].1.push(record);
    }

    pub fn get(&self, path: &FolderPath) -> Option<&[VmRecord]> {
        self.index.get(path).map(|&idx| self.entries[idx].1.as_slice())
    }

    pub fn contains(&self, path: &FolderPath) -> bool {
        self.index.contains_key(path)
    }

    /// Number of folder entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn vm_count(&self) -> usize {
        self.entries.iter().map(|(_, vms)| vms.len()).sum()
    }

    /// Entries in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = (&FolderPath, &[VmRecord])> {
        self.entries.iter().map(|(path, vms)| (path, vms.as_slice()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &FolderPath> {
        self.entries.iter().map(|(path, _)| path)
    }
}

/// Equal when both have the same folder keys and the same VMs under each
/// key, regardless of order.
impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter().all(|(path, vms)| match other.get(path) {
            Some(other_vms) => {
                let mut a = vms.to_vec();
                let mut b = other_vms.to_vec();
                a.sort();
                b.sort();
                a == b
            }
            None => false,
        })
    }
}

impl Eq for Snapshot {}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (path, vms) in &self.entries {
            map.serialize_entry(path, vms)?;
        }
        map.end()
    }
}

struct SnapshotVisitor;

impl<'de> Visitor<'de> for SnapshotVisitor {
    type Value = Snapshot;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object mapping folder paths to arrays of {name, uuid} objects")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Snapshot, A::Error> {
        let mut snapshot = Snapshot::new();
        while let Some((path, vms)) = access.next_entry::<FolderPath, Vec<VmRecord>>()? {
            if !snapshot.ensure_folder(&path) {
                return Err(de::Error::custom(format!("duplicate folder path '{}'", path)));
            }
            for vm in vms {
                if vm.uuid.trim().is_empty() {
                    return Err(de::Error::custom(format!(
                        "empty uuid for VM '{}' in folder '{}'",
                        vm.name, path
                    )));
                }
                snapshot.push_vm(&path, vm);
            }
        }
        Ok(snapshot)
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(SnapshotVisitor)
    }
}

/// Pretty-printed JSON, keys in discovery order, trailing newline.
pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, SnapshotError> {
    let mut bytes = serde_json::to_vec_pretty(snapshot)?;
    bytes.push(b'\n');
    Ok(bytes)
}

pub fn decode(bytes: &[u8]) -> Result<Snapshot, SnapshotError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn read_snapshot(path: &Path) -> Result<Snapshot, SnapshotError> {
    let bytes = fs::read(path).map_err(|source| SnapshotError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let snapshot = decode(&bytes)?;
    debug!(
        "Loaded snapshot {} with {} folders and {} VMs",
        path.display(),
        snapshot.len(),
        snapshot.vm_count()
    );
    Ok(snapshot)
}

pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), SnapshotError> {
    let bytes = encode(snapshot)?;
    fs::write(path, bytes).map_err(|source| SnapshotError::Io {
        path: path.display().to_string(),
        source,
    })
}
