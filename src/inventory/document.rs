//! Inventory served from a JSON document on disk.
//!
//! The document describes datacenters, folders, VMs and other objects. It is
//! loaded at connect time; when a restore changed anything, the updated tree
//! is written back when the session is released. This backs `file:` server
//! URLs and is how dumps and restores are rehearsed without a live server.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Inventory, InventoryError, MemoryInventory, Node, ObjectRef, VmConfig};
use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    #[serde(default)]
    pub datacenters: Vec<DatacenterDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatacenterDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub folders: Vec<FolderDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vms: Vec<VmDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other: Vec<OtherDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub folders: Vec<FolderDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vms: Vec<VmDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other: Vec<OtherDocument>,
}

/// `uuid: null` models a VM whose configuration cannot be read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmDocument {
    pub name: String,
    pub uuid: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtherDocument {
    pub name: String,
    #[serde(rename = "type")]
    pub type_tag: String,
}

/// Everything needed to open a session.
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    pub server: String,
    pub user: String,
    pub password: String,
}

/// `file:` URL or bare `.json` path of an inventory document.
pub fn document_path(server: &str) -> Option<PathBuf> {
    if let Some(rest) = server.strip_prefix("file://") {
        return Some(PathBuf::from(rest));
    }
    if let Some(rest) = server.strip_prefix("file:") {
        return Some(PathBuf::from(rest));
    }
    if server.ends_with(".json") {
        return Some(PathBuf::from(server));
    }
    None
}

/// Open an inventory for `params.server`.
pub fn connect(params: &ConnectionParams) -> Result<DocumentInventory, Error> {
    let path = document_path(&params.server)
        .ok_or_else(|| Error::UnsupportedServer(params.server.clone()))?;
    DocumentInventory::open(&path, &params.user, &params.password)
}

/// A [`MemoryInventory`] bound to the document it was loaded from.
#[derive(Debug)]
pub struct DocumentInventory {
    path: PathBuf,
    credentials: Option<Credentials>,
    inner: MemoryInventory,
}

impl DocumentInventory {
    /// Loads the document and checks the credentials it declares, if any.
    pub fn open(path: &Path, user: &str, password: &str) -> Result<Self, Error> {
        let raw = fs::read(path).map_err(|err| {
            InventoryError::Connection(format!("cannot read {}: {}", path.display(), err))
        })?;
        let document: InventoryDocument = serde_json::from_slice(&raw).map_err(|err| {
            InventoryError::Connection(format!("invalid inventory document {}: {}", path.display(), err))
        })?;

        if let Some(credentials) = &document.credentials {
            if credentials.user != user || credentials.password != password {
                return Err(InventoryError::Authentication(user.to_string()).into());
            }
        }

        info!("Connected to inventory document {}", path.display());
        Ok(DocumentInventory {
            path: path.to_path_buf(),
            credentials: document.credentials.clone(),
            inner: MemoryInventory::from_document(&document),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn inventory(&self) -> &MemoryInventory {
        &self.inner
    }

    fn save(&self) -> Result<(), InventoryError> {
        let mut document = self.inner.to_document();
        document.credentials = self.credentials.clone();
        let json = serde_json::to_vec_pretty(&document)
            .map_err(|err| InventoryError::Connection(err.to_string()))?;
        fs::write(&self.path, json).map_err(|err| {
            InventoryError::Connection(format!("cannot write {}: {}", self.path.display(), err))
        })?;
        debug!("Saved inventory document {}", self.path.display());
        Ok(())
    }
}

impl Inventory for DocumentInventory {
    fn find_datacenter(&self, name: &str) -> Result<Option<ObjectRef>, InventoryError> {
        self.inner.find_datacenter(name)
    }

    fn vm_root_folder(&self, datacenter: &ObjectRef) -> Result<ObjectRef, InventoryError> {
        self.inner.vm_root_folder(datacenter)
    }

    fn list_children(&self, folder: &ObjectRef) -> Result<Vec<Node>, InventoryError> {
        self.inner.list_children(folder)
    }

    fn vm_config(&self, vm: &ObjectRef) -> Result<Option<VmConfig>, InventoryError> {
        self.inner.vm_config(vm)
    }

    fn create_folder(&mut self, parent: &ObjectRef, name: &str) -> Result<ObjectRef, InventoryError> {
        self.inner.create_folder(parent, name)
    }

    fn move_into_folder(&mut self, folder: &ObjectRef, vm: &ObjectRef) -> Result<(), InventoryError> {
        self.inner.move_into_folder(folder, vm)
    }

    fn disconnect(&mut self) -> Result<(), InventoryError> {
        if self.inner.is_mutated() && !self.inner.is_closed() {
            self.save()?;
        }
        self.inner.disconnect()
    }
}
