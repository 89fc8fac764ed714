use crate::inventory::{Node, ObjectRef, FOLDER_TYPE, VIRTUAL_MACHINE_TYPE};

/// What a listed child is, as far as folder snapshots are concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Folder(ObjectRef),
    VirtualMachine(ObjectRef),
    /// Any other object type (vApps, templates of other kinds, ...), carrying
    /// its type tag for diagnostics.
    Unknown(String),
}

pub fn classify(node: &Node) -> Entry {
    match node.type_tag.as_str() {
        FOLDER_TYPE => Entry::Folder(node.id.clone()),
        VIRTUAL_MACHINE_TYPE => Entry::VirtualMachine(node.id.clone()),
        other => Entry::Unknown(other.to_string()),
    }
}
