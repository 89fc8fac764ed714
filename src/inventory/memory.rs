use std::collections::HashMap;

use tracing::debug;

use super::document::{DatacenterDocument, FolderDocument, InventoryDocument, OtherDocument, VmDocument};
use super::{Inventory, InventoryError, Node, ObjectRef, VmConfig, FOLDER_TYPE, VIRTUAL_MACHINE_TYPE};

#[derive(Debug, Clone)]
enum ObjectKind {
    Datacenter { vm_root: ObjectRef },
    Folder { children: Vec<ObjectRef> },
    VirtualMachine { uuid: Option<String> },
    Other { type_tag: String },
}

#[derive(Debug, Clone)]
struct Object {
    name: String,
    parent: Option<ObjectRef>,
    kind: ObjectKind,
}

/// An inventory tree held entirely in process.
///
/// Object ids mimic the server's managed object references
/// (`datacenter-1`, `group-v2`, `vm-3`, ...).
#[derive(Debug, Clone, Default)]
pub struct MemoryInventory {
    objects: HashMap<ObjectRef, Object>,
    datacenters: Vec<ObjectRef>,
    next_id: u64,
    closed: bool,
    mutated: bool,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self, prefix: &str) -> ObjectRef {
        self.next_id += 1;
        ObjectRef::new(format!("{}-{}", prefix, self.next_id))
    }

    fn insert_child(&mut self, parent: &ObjectRef, name: &str, prefix: &str, kind: ObjectKind) -> ObjectRef {
        let id = self.allocate(prefix);
        self.objects.insert(
            id.clone(),
            Object {
                name: name.to_string(),
                parent: Some(parent.clone()),
                kind,
            },
        );
        if let Some(Object {
            kind: ObjectKind::Folder { children },
            ..
        }) = self.objects.get_mut(parent)
        {
            children.push(id.clone());
        }
        id
    }

    /// Adds a datacenter with an empty VM root folder and returns the
    /// datacenter handle.
    pub fn add_datacenter(&mut self, name: &str) -> ObjectRef {
        let dc = self.allocate("datacenter");
        let vm_root = self.allocate("group-v");
        self.objects.insert(
            vm_root.clone(),
            Object {
                name: "vm".to_string(),
                parent: Some(dc.clone()),
                kind: ObjectKind::Folder { children: Vec::new() },
            },
        );
        self.objects.insert(
            dc.clone(),
            Object {
                name: name.to_string(),
                parent: None,
                kind: ObjectKind::Datacenter { vm_root },
            },
        );
        self.datacenters.push(dc.clone());
        dc
    }

    /// The VM root folder of a datacenter added with [`add_datacenter`].
    ///
    /// [`add_datacenter`]: MemoryInventory::add_datacenter
    pub fn vm_root(&self, datacenter: &ObjectRef) -> Option<ObjectRef> {
        match self.objects.get(datacenter) {
            Some(Object {
                kind: ObjectKind::Datacenter { vm_root },
                ..
            }) => Some(vm_root.clone()),
            _ => None,
        }
    }

    pub fn add_folder(&mut self, parent: &ObjectRef, name: &str) -> ObjectRef {
        self.insert_child(parent, name, "group-v", ObjectKind::Folder { children: Vec::new() })
    }

    pub fn add_vm(&mut self, parent: &ObjectRef, name: &str, uuid: &str) -> ObjectRef {
        self.insert_child(
            parent,
            name,
            "vm",
            ObjectKind::VirtualMachine {
                uuid: Some(uuid.to_string()),
            },
        )
    }

    /// A VM that is listed but whose configuration cannot be read.
    pub fn add_vm_without_config(&mut self, parent: &ObjectRef, name: &str) -> ObjectRef {
        self.insert_child(parent, name, "vm", ObjectKind::VirtualMachine { uuid: None })
    }

    pub fn add_other(&mut self, parent: &ObjectRef, name: &str, type_tag: &str) -> ObjectRef {
        self.insert_child(
            parent,
            name,
            "obj",
            ObjectKind::Other {
                type_tag: type_tag.to_string(),
            },
        )
    }

    /// Removes an object and everything below it.
    pub fn remove(&mut self, id: &ObjectRef) {
        let Some(object) = self.objects.remove(id) else {
            return;
        };
        if let Some(parent) = &object.parent {
            if let Some(Object {
                kind: ObjectKind::Folder { children },
                ..
            }) = self.objects.get_mut(parent)
            {
                children.retain(|child| child != id);
            }
        }
        if let ObjectKind::Folder { children } = object.kind {
            for child in children {
                self.remove(&child);
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// True once any folder was created or VM moved.
    pub fn is_mutated(&self) -> bool {
        self.mutated
    }

    /// Every folder below the datacenter's VM root, rendered as paths, in
    /// depth-first order.
    pub fn folder_paths(&self, datacenter: &ObjectRef) -> Vec<String> {
        let mut paths = Vec::new();
        if let Some(root) = self.vm_root(datacenter) {
            self.collect_folder_paths(&root, None, &mut paths);
        }
        paths
    }

    fn collect_folder_paths(&self, folder: &ObjectRef, prefix: Option<&str>, out: &mut Vec<String>) {
        for child in self.children_of(folder) {
            if let Some(Object {
                name,
                kind: ObjectKind::Folder { .. },
                ..
            }) = self.objects.get(child)
            {
                let path = match prefix {
                    Some(prefix) => format!("{}/{}", prefix, name),
                    None => name.clone(),
                };
                out.push(path.clone());
                self.collect_folder_paths(child, Some(&path), out);
            }
        }
    }

    /// Names of the folders from the VM root down to the folder holding the
    /// VM with `uuid`, or `None` when no such VM exists. A VM sitting directly
    /// in the VM root yields an empty list.
    pub fn vm_location(&self, uuid: &str) -> Option<Vec<String>> {
        let (_, vm) = self.objects.iter().find(|(_, object)| {
            matches!(&object.kind, ObjectKind::VirtualMachine { uuid: Some(u) } if u == uuid)
        })?;
        let mut segments = Vec::new();
        let mut current = vm.parent.clone();
        while let Some(id) = current {
            let object = self.objects.get(&id)?;
            match object.parent.as_ref().and_then(|p| self.objects.get(p)) {
                Some(Object {
                    kind: ObjectKind::Datacenter { .. },
                    ..
                }) => break,
                _ => segments.push(object.name.clone()),
            }
            current = object.parent.clone();
        }
        segments.reverse();
        Some(segments)
    }

    /// Number of VMs anywhere in the inventory carrying `uuid`.
    pub fn count_vms_with_uuid(&self, uuid: &str) -> usize {
        self.objects
            .values()
            .filter(|object| {
                matches!(&object.kind, ObjectKind::VirtualMachine { uuid: Some(u) } if u == uuid)
            })
            .count()
    }

    fn children_of(&self, folder: &ObjectRef) -> &[ObjectRef] {
        match self.objects.get(folder) {
            Some(Object {
                kind: ObjectKind::Folder { children },
                ..
            }) => children,
            _ => &[],
        }
    }

    fn check_open(&self) -> Result<(), InventoryError> {
        if self.closed {
            return Err(InventoryError::Closed);
        }
        Ok(())
    }

    pub fn from_document(document: &InventoryDocument) -> Self {
        let mut inventory = MemoryInventory::new();
        for dc_doc in &document.datacenters {
            let dc = inventory.add_datacenter(&dc_doc.name);
            if let Some(root) = inventory.vm_root(&dc) {
                inventory.load_folder_contents(&root, &dc_doc.folders, &dc_doc.vms, &dc_doc.other);
            }
        }
        inventory
    }

    fn load_folder_contents(
        &mut self,
        parent: &ObjectRef,
        folders: &[FolderDocument],
        vms: &[VmDocument],
        other: &[OtherDocument],
    ) {
        for folder_doc in folders {
            let folder = self.add_folder(parent, &folder_doc.name);
            self.load_folder_contents(&folder, &folder_doc.folders, &folder_doc.vms, &folder_doc.other);
        }
        for vm_doc in vms {
            match &vm_doc.uuid {
                Some(uuid) => self.add_vm(parent, &vm_doc.name, uuid),
                None => self.add_vm_without_config(parent, &vm_doc.name),
            };
        }
        for other_doc in other {
            self.add_other(parent, &other_doc.name, &other_doc.type_tag);
        }
    }

    pub fn to_document(&self) -> InventoryDocument {
        let datacenters = self
            .datacenters
            .iter()
            .filter_map(|dc| {
                let name = self.objects.get(dc)?.name.clone();
                let root = self.vm_root(dc)?;
                let contents = self.folder_document(&root, name);
                Some(DatacenterDocument {
                    name: contents.name,
                    folders: contents.folders,
                    vms: contents.vms,
                    other: contents.other,
                })
            })
            .collect();
        InventoryDocument {
            credentials: None,
            datacenters,
        }
    }

    fn folder_document(&self, folder: &ObjectRef, name: String) -> FolderDocument {
        let mut doc = FolderDocument {
            name,
            folders: Vec::new(),
            vms: Vec::new(),
            other: Vec::new(),
        };
        for child in self.children_of(folder) {
            let Some(object) = self.objects.get(child) else {
                continue;
            };
            match &object.kind {
                ObjectKind::Folder { .. } => doc.folders.push(self.folder_document(child, object.name.clone())),
                ObjectKind::VirtualMachine { uuid } => doc.vms.push(VmDocument {
                    name: object.name.clone(),
                    uuid: uuid.clone(),
                }),
                ObjectKind::Other { type_tag } => doc.other.push(OtherDocument {
                    name: object.name.clone(),
                    type_tag: type_tag.clone(),
                }),
                ObjectKind::Datacenter { .. } => {}
            }
        }
        doc
    }
}

impl Inventory for MemoryInventory {
    fn find_datacenter(&self, name: &str) -> Result<Option<ObjectRef>, InventoryError> {
        self.check_open()?;
        Ok(self
            .datacenters
            .iter()
            .find(|dc| self.objects.get(*dc).is_some_and(|o| o.name == name))
            .cloned())
    }

    fn vm_root_folder(&self, datacenter: &ObjectRef) -> Result<ObjectRef, InventoryError> {
        self.check_open()?;
        self.vm_root(datacenter)
            .ok_or_else(|| InventoryError::NotFound(datacenter.to_string()))
    }

    fn list_children(&self, folder: &ObjectRef) -> Result<Vec<Node>, InventoryError> {
        self.check_open()?;
        let children = match self.objects.get(folder) {
            Some(Object {
                kind: ObjectKind::Folder { children },
                ..
            }) => children,
            _ => return Err(InventoryError::NotFound(folder.to_string())),
        };
        Ok(children
            .iter()
            .filter_map(|id| {
                let object = self.objects.get(id)?;
                let type_tag = match &object.kind {
                    ObjectKind::Folder { .. } => FOLDER_TYPE.to_string(),
                    ObjectKind::VirtualMachine { .. } => VIRTUAL_MACHINE_TYPE.to_string(),
                    ObjectKind::Other { type_tag } => type_tag.clone(),
                    ObjectKind::Datacenter { .. } => "Datacenter".to_string(),
                };
                Some(Node {
                    id: id.clone(),
                    name: object.name.clone(),
                    type_tag,
                })
            })
            .collect())
    }

    fn vm_config(&self, vm: &ObjectRef) -> Result<Option<VmConfig>, InventoryError> {
        self.check_open()?;
        match self.objects.get(vm) {
            Some(Object {
                name,
                kind: ObjectKind::VirtualMachine { uuid },
                ..
            }) => Ok(uuid.as_ref().map(|uuid| VmConfig {
                name: name.clone(),
                uuid: uuid.clone(),
            })),
            _ => Ok(None),
        }
    }

    fn create_folder(&mut self, parent: &ObjectRef, name: &str) -> Result<ObjectRef, InventoryError> {
        self.check_open()?;
        let exists = self
            .list_children(parent)?
            .iter()
            .any(|node| node.type_tag == FOLDER_TYPE && node.name == name);
        if exists {
            return Err(InventoryError::AlreadyExists {
                parent: parent.to_string(),
                name: name.to_string(),
            });
        }
        let id = self.add_folder(parent, name);
        self.mutated = true;
        debug!("Created folder '{}' ({}) in {}", name, id, parent);
        Ok(id)
    }

    fn move_into_folder(&mut self, folder: &ObjectRef, vm: &ObjectRef) -> Result<(), InventoryError> {
        self.check_open()?;
        if !matches!(
            self.objects.get(folder),
            Some(Object {
                kind: ObjectKind::Folder { .. },
                ..
            })
        ) {
            return Err(InventoryError::NotFound(folder.to_string()));
        }
        let old_parent = match self.objects.get(vm) {
            Some(Object {
                kind: ObjectKind::VirtualMachine { .. },
                parent,
                ..
            }) => parent.clone(),
            _ => return Err(InventoryError::NotFound(vm.to_string())),
        };
        if old_parent.as_ref() == Some(folder) {
            return Ok(());
        }
        if let Some(old_parent) = old_parent {
            if let Some(Object {
                kind: ObjectKind::Folder { children },
                ..
            }) = self.objects.get_mut(&old_parent)
            {
                children.retain(|child| child != vm);
            }
        }
        if let Some(Object {
            kind: ObjectKind::Folder { children },
            ..
        }) = self.objects.get_mut(folder)
        {
            children.push(vm.clone());
        }
        if let Some(object) = self.objects.get_mut(vm) {
            object.parent = Some(folder.clone());
        }
        self.mutated = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), InventoryError> {
        self.check_open()?;
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (MemoryInventory, ObjectRef, ObjectRef) {
        let mut inv = MemoryInventory::new();
        let dc = inv.add_datacenter("DC1");
        let root = inv.vm_root(&dc).unwrap();
        let eng = inv.add_folder(&root, "Engineering");
        inv.add_vm(&eng, "web01", "abc-1");
        inv.add_folder(&eng, "Archived");
        (inv, dc, eng)
    }

    #[test]
    fn test_lists_children_with_type_tags() {
        let (inv, _, eng) = sample();
        let children = inv.list_children(&eng).unwrap();
        let tags: Vec<(&str, &str)> = children
            .iter()
            .map(|n| (n.name.as_str(), n.type_tag.as_str()))
            .collect();
        assert_eq!(tags, vec![("web01", "VirtualMachine"), ("Archived", "Folder")]);
    }

    #[test]
    fn test_find_by_path_follows_segments() {
        let (inv, dc, _) = sample();
        let root = inv.vm_root_folder(&dc).unwrap();
        let path = "Engineering/Archived".parse().unwrap();
        assert!(inv.find_by_path(&root, &path).unwrap().is_some());
        let missing = "Engineering/Nope".parse().unwrap();
        assert!(inv.find_by_path(&root, &missing).unwrap().is_none());
    }

    #[test]
    fn test_create_folder_rejects_duplicate_name() {
        let (mut inv, _, eng) = sample();
        let err = inv.create_folder(&eng, "Archived").unwrap_err();
        assert!(matches!(err, InventoryError::AlreadyExists { .. }));
        assert!(!inv.is_mutated());
        inv.create_folder(&eng, "Current").unwrap();
        assert!(inv.is_mutated());
    }

    #[test]
    fn test_move_updates_location() {
        let (mut inv, dc, eng) = sample();
        let root = inv.vm_root(&dc).unwrap();
        let ops = inv.add_folder(&root, "Ops");
        let vm = inv.list_children(&eng).unwrap()[0].id.clone();
        inv.move_into_folder(&ops, &vm).unwrap();
        assert_eq!(inv.vm_location("abc-1"), Some(vec!["Ops".to_string()]));
        assert_eq!(inv.list_children(&eng).unwrap().len(), 1);
    }

    #[test]
    fn test_remove_drops_subtree() {
        let (mut inv, dc, eng) = sample();
        inv.remove(&eng);
        assert!(inv.folder_paths(&dc).is_empty());
        assert_eq!(inv.vm_location("abc-1"), None);
        assert_eq!(inv.list_children(&eng), Err(InventoryError::NotFound(eng.to_string())));
    }

    #[test]
    fn test_closed_inventory_refuses_calls() {
        let (mut inv, _, eng) = sample();
        inv.disconnect().unwrap();
        assert!(inv.is_closed());
        assert_eq!(inv.list_children(&eng), Err(InventoryError::Closed));
    }

    #[test]
    fn test_document_round_trip_keeps_tree() {
        let (mut inv, dc, eng) = sample();
        inv.add_other(&eng, "pool", "ResourcePool");
        let doc = inv.to_document();
        let reloaded = MemoryInventory::from_document(&doc);
        let dc2 = reloaded.find_datacenter("DC1").unwrap().unwrap();
        assert_eq!(reloaded.folder_paths(&dc2), inv.folder_paths(&dc));
        assert_eq!(reloaded.vm_location("abc-1"), Some(vec!["Engineering".to_string()]));
    }
}
