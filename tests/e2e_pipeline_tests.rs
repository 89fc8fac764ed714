use std::cell::Cell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use tempfile::TempDir;
use vmfolders::inventory::{
    connect, ConnectionParams, DocumentInventory, Inventory, InventoryError, MemoryInventory, Node,
    ObjectRef, VmConfig,
};
use vmfolders::restore::ExecutionMode;
use vmfolders::snapshot::{read_snapshot, write_snapshot};
use vmfolders::{
    dump, DumpRequest, Error, ExclusionRules, RestoreRequest, Session, SilentReporter,
};

const SOURCE: &str = r#"{
  "credentials": {"user": "admin", "password": "secret"},
  "datacenters": [{
    "name": "DC1",
    "folders": [
      {"name": "Engineering",
       "folders": [{"name": "Archived", "vms": [{"name": "old01", "uuid": "old-1"}]}],
       "vms": [{"name": "web01", "uuid": "abc-1"}]},
      {"name": "Templates", "vms": [{"name": "tpl", "uuid": "tpl-1"}]}
    ],
    "other": [{"name": "pool", "type": "ResourcePool"}]
  }]
}"#;

/// The same VMs after a rebuild: everything landed in the holding folder.
const TARGET: &str = r#"{
  "datacenters": [{
    "name": "DC1",
    "folders": [
      {"name": "Discovered virtual machine",
       "vms": [
         {"name": "web01", "uuid": "abc-1"},
         {"name": "old01", "uuid": "old-1"}
       ]}
    ]
  }]
}"#;

fn write_doc(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    format!("file:{}", path.display())
}

fn params(server: &str, user: &str, password: &str) -> ConnectionParams {
    ConnectionParams {
        server: server.to_string(),
        user: user.to_string(),
        password: password.to_string(),
    }
}

fn restore_request(mode: ExecutionMode) -> RestoreRequest {
    RestoreRequest {
        datacenter: "DC1".to_string(),
        target_folder: None,
        holding_folder: "Discovered virtual machine".to_string(),
        mode,
    }
}

fn reopen(server: &str) -> MemoryInventory {
    let inventory = connect(&params(server, "", "")).unwrap();
    inventory.inventory().clone()
}

#[test]
fn test_dump_then_restore_between_documents() {
    let dir = TempDir::new().unwrap();
    let source = write_doc(dir.path(), "source.json", SOURCE);
    let target = write_doc(dir.path(), "target.json", TARGET);
    let snapshot_path = dir.path().join("layout.json");

    let session = Session::new(connect(&params(&source, "admin", "secret")).unwrap());
    let request = DumpRequest {
        datacenter: "DC1".to_string(),
        folders: Vec::new(),
        rules: ExclusionRules::new(&["Templates"], &[] as &[&str], &[]).unwrap(),
    };
    let dumped = dump(&*session, &request, &SilentReporter).unwrap();
    session.close().unwrap();
    write_snapshot(&snapshot_path, &dumped.snapshot).unwrap();

    let snapshot = read_snapshot(&snapshot_path).unwrap();
    assert_eq!(snapshot, dumped.snapshot);
    assert_eq!(snapshot.len(), 2);

    let mut session = Session::new(connect(&params(&target, "", "")).unwrap());
    let restored = vmfolders::engine::restore(
        &mut *session,
        &restore_request(ExecutionMode::Apply),
        &snapshot,
        &SilentReporter,
    )
    .unwrap();
    session.close().unwrap();
    assert!(restored.report.is_complete());

    let after = reopen(&target);
    let dc = after.find_datacenter("DC1").unwrap().unwrap();
    assert_eq!(
        after.folder_paths(&dc),
        vec!["Discovered virtual machine", "Engineering", "Engineering/Archived"]
    );
    assert_eq!(after.vm_location("abc-1"), Some(vec!["Engineering".to_string()]));
    assert_eq!(
        after.vm_location("old-1"),
        Some(vec!["Engineering".to_string(), "Archived".to_string()])
    );

    // the source document was only read
    assert_eq!(fs::read_to_string(dir.path().join("source.json")).unwrap(), SOURCE);
}

#[test]
fn test_simulated_restore_leaves_document_untouched() {
    let dir = TempDir::new().unwrap();
    let target = write_doc(dir.path(), "target.json", TARGET);
    let snapshot = vmfolders::snapshot::decode(
        br#"{"Engineering": [{"name": "web01", "uuid": "abc-1"}]}"#,
    )
    .unwrap();

    let mut session = Session::new(connect(&params(&target, "", "")).unwrap());
    let result = vmfolders::engine::restore(
        &mut *session,
        &restore_request(ExecutionMode::Simulate),
        &snapshot,
        &SilentReporter,
    )
    .unwrap();
    drop(session);

    assert_eq!(result.report.would_apply(), 2);
    assert_eq!(fs::read_to_string(dir.path().join("target.json")).unwrap(), TARGET);
}

#[test]
fn test_connection_failures() {
    let dir = TempDir::new().unwrap();
    let source = write_doc(dir.path(), "source.json", SOURCE);

    let err = connect(&params(&source, "admin", "wrong")).unwrap_err();
    assert!(matches!(
        err,
        Error::Inventory(InventoryError::Authentication(user)) if user == "admin"
    ));

    let missing = format!("file:{}", dir.path().join("missing.json").display());
    assert!(matches!(
        connect(&params(&missing, "admin", "secret")),
        Err(Error::Inventory(InventoryError::Connection(_)))
    ));

    assert!(matches!(
        connect(&params("vcenter.example.com", "admin", "secret")),
        Err(Error::UnsupportedServer(_))
    ));
}

/// Counts disconnects on the way to the inner inventory.
struct CountingInventory {
    inner: DocumentInventory,
    disconnects: Rc<Cell<usize>>,
}

impl Inventory for CountingInventory {
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
        self.disconnects.set(self.disconnects.get() + 1);
        self.inner.disconnect()
    }
}

#[test]
fn test_session_released_once_on_every_path() {
    let dir = TempDir::new().unwrap();
    let source = write_doc(dir.path(), "source.json", SOURCE);
    let disconnects = Rc::new(Cell::new(0));
    let open = || CountingInventory {
        inner: connect(&params(&source, "admin", "secret")).unwrap(),
        disconnects: Rc::clone(&disconnects),
    };

    // failing dump: the session is dropped on the early return
    let failing = || -> Result<(), Error> {
        let session = Session::new(open());
        let request = DumpRequest {
            datacenter: "Nowhere".to_string(),
            folders: Vec::new(),
            rules: ExclusionRules::none(),
        };
        dump(&*session, &request, &SilentReporter)?;
        session.close()?;
        Ok(())
    };
    assert!(matches!(failing(), Err(Error::DatacenterNotFound(_))));
    assert_eq!(disconnects.get(), 1);

    let session = Session::new(open());
    session.close().unwrap();
    assert_eq!(disconnects.get(), 2);
}
