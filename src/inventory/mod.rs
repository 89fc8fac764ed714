//! The narrow interface to the remote inventory service.
//!
//! Everything the dump and restore paths know about the inventory goes through
//! [`Inventory`]. Reads take `&self`; the two mutating calls used by restore
//! take `&mut self`.

pub mod document;
pub mod memory;

use std::fmt;
use std::ops::{Deref, DerefMut};

use thiserror::Error;
use tracing::{debug, warn};

use crate::folder_path::FolderPath;

pub use document::{connect, ConnectionParams, DocumentInventory};
pub use memory::MemoryInventory;

pub const FOLDER_TYPE: &str = "Folder";
pub const VIRTUAL_MACHINE_TYPE: &str = "VirtualMachine";

/// Opaque handle to an inventory object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef(String);

impl ObjectRef {
    pub fn new(id: impl Into<String>) -> Self {
        ObjectRef(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A child entry as returned by a folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: ObjectRef,
    pub name: String,
    pub type_tag: String,
}

/// The part of a VM's configuration this tool reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    pub name: String,
    /// Persistent instance UUID, stable across moves and renames.
    pub uuid: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("object '{0}' not found")]
    NotFound(String),

    #[error("'{name}' already exists in '{parent}'")]
    AlreadyExists { parent: String, name: String },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("authentication failed for user '{0}'")]
    Authentication(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("session is closed")]
    Closed,
}

pub trait Inventory {
    fn find_datacenter(&self, name: &str) -> Result<Option<ObjectRef>, InventoryError>;

    /// The datacenter's top-level VM folder. It is never part of a
    /// [`FolderPath`]; paths start with its children.
    fn vm_root_folder(&self, datacenter: &ObjectRef) -> Result<ObjectRef, InventoryError>;

    /// Fails with [`InventoryError::NotFound`] when the folder vanished.
    fn list_children(&self, folder: &ObjectRef) -> Result<Vec<Node>, InventoryError>;

    /// `Ok(None)` when the VM is listed but its configuration cannot be read,
    /// typically because it was destroyed after the listing.
    fn vm_config(&self, vm: &ObjectRef) -> Result<Option<VmConfig>, InventoryError>;

    fn create_folder(&mut self, parent: &ObjectRef, name: &str) -> Result<ObjectRef, InventoryError>;

    fn move_into_folder(&mut self, folder: &ObjectRef, vm: &ObjectRef) -> Result<(), InventoryError>;

    fn disconnect(&mut self) -> Result<(), InventoryError>;

    /// Folders directly under the datacenter's VM root folder.
    fn root_folders(&self, datacenter: &ObjectRef) -> Result<Vec<Node>, InventoryError> {
        let root = self.vm_root_folder(datacenter)?;
        Ok(self
            .list_children(&root)?
            .into_iter()
            .filter(|node| node.type_tag == FOLDER_TYPE)
            .collect())
    }

    fn find_child_folder(
        &self,
        parent: &ObjectRef,
        name: &str,
    ) -> Result<Option<ObjectRef>, InventoryError> {
        Ok(self
            .list_children(parent)?
            .into_iter()
            .find(|node| node.type_tag == FOLDER_TYPE && node.name == name)
            .map(|node| node.id))
    }

    /// Follow `path` segment by segment starting at `root`.
    fn find_by_path(
        &self,
        root: &ObjectRef,
        path: &FolderPath,
    ) -> Result<Option<ObjectRef>, InventoryError> {
        let mut current = root.clone();
        for segment in path.segments() {
            match self.find_child_folder(&current, segment)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }
}

impl<T: Inventory + ?Sized> Inventory for Box<T> {
    fn find_datacenter(&self, name: &str) -> Result<Option<ObjectRef>, InventoryError> {
        (**self).find_datacenter(name)
    }

    fn vm_root_folder(&self, datacenter: &ObjectRef) -> Result<ObjectRef, InventoryError> {
        (**self).vm_root_folder(datacenter)
    }

    fn list_children(&self, folder: &ObjectRef) -> Result<Vec<Node>, InventoryError> {
        (**self).list_children(folder)
    }

    fn vm_config(&self, vm: &ObjectRef) -> Result<Option<VmConfig>, InventoryError> {
        (**self).vm_config(vm)
    }

    fn create_folder(&mut self, parent: &ObjectRef, name: &str) -> Result<ObjectRef, InventoryError> {
        (**self).create_folder(parent, name)
    }

    fn move_into_folder(&mut self, folder: &ObjectRef, vm: &ObjectRef) -> Result<(), InventoryError> {
        (**self).move_into_folder(folder, vm)
    }

    fn disconnect(&mut self) -> Result<(), InventoryError> {
        (**self).disconnect()
    }
}

/// Scoped ownership of a connected inventory.
///
/// The inventory is disconnected exactly once: by [`Session::close`], or on
/// drop for every other exit path.
pub struct Session<I: Inventory> {
    inventory: I,
    open: bool,
}

impl<I: Inventory> Session<I> {
    pub fn new(inventory: I) -> Self {
        debug!("Inventory session acquired");
        Session {
            inventory,
            open: true,
        }
    }

    pub fn close(mut self) -> Result<(), InventoryError> {
        self.open = false;
        debug!("Inventory session released");
        self.inventory.disconnect()
    }
}

impl<I: Inventory> Deref for Session<I> {
    type Target = I;

    fn deref(&self) -> &I {
        &self.inventory
    }
}

impl<I: Inventory> DerefMut for Session<I> {
    fn deref_mut(&mut self) -> &mut I {
        &mut self.inventory
    }
}

impl<I: Inventory> Drop for Session<I> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        debug!("Inventory session released on drop");
        if let Err(err) = self.inventory.disconnect() {
            warn!("Error releasing inventory session: {}", err);
        }
    }
}
