//! # Open-Array Registry Tests
//!
//! Reference counting, shared first-open state, fragment ordering at
//! load time, and the cleanup paths of failed opens.

use std::path::Path;
use std::sync::Arc;

use gridstore::fragment::BookKeeping;
use gridstore::{
    ArrayMode, ArraySchema, AttributeType, CoordsType, StorageError, StorageManager,
};
use tempfile::tempdir;

fn dense_schema(path: &Path) -> ArraySchema {
    ArraySchema::new(path, true, CoordsType::Int64)
        .add_dimension("rows", 1.0, 100.0)
        .add_attribute("v", AttributeType::Int32)
}

fn workspace_with_array(root: &Path, sm: &StorageManager) -> std::path::PathBuf {
    let ws = root.join("w");
    sm.workspace_create(&ws).unwrap();
    let array = ws.join("a");
    sm.array_create(&dense_schema(&array)).unwrap();
    array
}

/// Creates a visible fragment directory by hand, with a chosen name.
fn plant_fragment(array: &Path, name: &str, schema: &ArraySchema) {
    let dir = array.join(name);
    std::fs::create_dir(&dir).unwrap();
    let mut bk = BookKeeping::new(schema, true, &dir, ArrayMode::Write);
    bk.record_cells(1);
    bk.flush().unwrap();
    gridstore::fs::create_marker_file(&dir.join("__tiledb_fragment.tdb")).unwrap();
}

#[test]
fn refcounts_gate_registry_teardown() {
    let root = tempdir().unwrap();
    let sm = StorageManager::new();
    let array = workspace_with_array(root.path(), &sm);

    let handles: Vec<_> = (0..3)
        .map(|_| sm.array_init(&array, ArrayMode::Read, None).unwrap())
        .collect();
    assert_eq!(sm.open_array_refcount(&array).unwrap(), Some(3));

    let mut handles = handles.into_iter();
    sm.array_finalize(handles.next().unwrap()).unwrap();
    sm.array_finalize(handles.next().unwrap()).unwrap();
    assert_eq!(sm.open_array_refcount(&array).unwrap(), Some(1));

    sm.array_finalize(handles.next().unwrap()).unwrap();
    assert_eq!(sm.open_array_refcount(&array).unwrap(), None);
}

#[test]
fn concurrent_opens_share_one_entry() {
    let root = tempdir().unwrap();
    let sm = Arc::new(StorageManager::new());
    let array = workspace_with_array(root.path(), &sm);

    let mut workers = Vec::new();
    for _ in 0..2 {
        let sm = Arc::clone(&sm);
        let array = array.clone();
        workers.push(std::thread::spawn(move || {
            sm.array_init(&array, ArrayMode::Read, None).unwrap()
        }));
    }
    let handles: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();

    assert_eq!(sm.open_array_refcount(&array).unwrap(), Some(2));
    // Both opens observe the very same schema allocation.
    assert!(Arc::ptr_eq(handles[0].schema(), handles[1].schema()));

    for handle in handles {
        sm.array_finalize(handle).unwrap();
    }
    assert_eq!(sm.open_array_refcount(&array).unwrap(), None);
}

#[test]
fn fragments_load_in_timestamp_order() {
    let root = tempdir().unwrap();
    let sm = StorageManager::new();
    let array = workspace_with_array(root.path(), &sm);
    let schema = sm.array_load_schema(&array).unwrap();

    for t in [5, 1, 3, 2, 4] {
        plant_fragment(&array, &format!("__u{t}_{t}"), &schema);
    }

    let reader = sm.array_init(&array, ArrayMode::Read, None).unwrap();
    let order: Vec<String> = reader
        .fragment_paths()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(order, vec!["__u1_1", "__u2_2", "__u3_3", "__u4_4", "__u5_5"]);
    sm.array_finalize(reader).unwrap();
}

#[test]
fn unfinished_fragments_are_invisible_to_readers() {
    let root = tempdir().unwrap();
    let sm = StorageManager::new();
    let array = workspace_with_array(root.path(), &sm);
    let schema = sm.array_load_schema(&array).unwrap();

    plant_fragment(&array, "__u_10", &schema);
    // A directory without the fragment marker is no fragment.
    std::fs::create_dir(array.join("__u_99")).unwrap();

    let reader = sm.array_init(&array, ArrayMode::Read, None).unwrap();
    assert_eq!(reader.fragment_paths().len(), 1);
    sm.array_finalize(reader).unwrap();
}

#[test]
fn malformed_fragment_names_fail_the_open() {
    let root = tempdir().unwrap();
    let sm = StorageManager::new();
    let array = workspace_with_array(root.path(), &sm);
    let schema = sm.array_load_schema(&array).unwrap();

    plant_fragment(&array, "__u_notanumber", &schema);

    assert!(matches!(
        sm.array_init(&array, ArrayMode::Read, None),
        Err(StorageError::InvalidPath(_))
    ));
    // The failed first-open left no registry entry behind.
    assert_eq!(sm.open_array_refcount(&array).unwrap(), None);
}

#[test]
fn empty_schema_files_are_corrupt() {
    let root = tempdir().unwrap();
    let sm = StorageManager::new();
    let array = workspace_with_array(root.path(), &sm);

    std::fs::write(array.join("__array_schema.tdb"), b"").unwrap();
    assert!(matches!(
        sm.array_load_schema(&array),
        Err(StorageError::CorruptSchema(_))
    ));
    assert!(matches!(
        sm.array_init(&array, ArrayMode::Read, None),
        Err(StorageError::CorruptSchema(_))
    ));
    assert_eq!(sm.open_array_refcount(&array).unwrap(), None);
}

#[test]
fn write_opens_bypass_the_registry() {
    let root = tempdir().unwrap();
    let sm = StorageManager::new();
    let array = workspace_with_array(root.path(), &sm);

    let mut writer = sm.array_init(&array, ArrayMode::Write, None).unwrap();
    writer.write("v", &41i32.to_le_bytes()).unwrap();
    writer.record_cells(1).unwrap();
    sm.array_sync(&mut writer).unwrap();
    sm.array_sync_attribute(&mut writer, "v").unwrap();
    assert_eq!(sm.open_array_refcount(&array).unwrap(), None);

    let fragment = writer.fragment_paths()[0].to_path_buf();
    sm.array_finalize(writer).unwrap();
    assert!(fragment.join("__tiledb_fragment.tdb").is_file());
    assert!(fragment.join("v.tdb").is_file());
    assert!(fragment.join("__book_keeping.tdb.gz").is_file());
}

#[test]
fn unknown_attributes_fail_and_release_the_open() {
    let root = tempdir().unwrap();
    let sm = StorageManager::new();
    let array = workspace_with_array(root.path(), &sm);

    assert!(matches!(
        sm.array_init(&array, ArrayMode::Read, Some(&["ghost"])),
        Err(StorageError::NotFound(_))
    ));
    assert_eq!(sm.open_array_refcount(&array).unwrap(), None);
}

#[test]
fn handles_reject_operations_of_the_other_mode() {
    let root = tempdir().unwrap();
    let sm = StorageManager::new();
    let array = workspace_with_array(root.path(), &sm);

    let mut reader = sm.array_init(&array, ArrayMode::Read, None).unwrap();
    assert!(matches!(
        reader.write("v", &[0]),
        Err(StorageError::InvalidMode(_))
    ));
    assert!(matches!(reader.sync(), Err(StorageError::InvalidMode(_))));
    sm.array_finalize(reader).unwrap();

    let writer = sm.array_init(&array, ArrayMode::Write, None).unwrap();
    assert!(matches!(
        writer.consolidate(),
        Err(StorageError::InvalidMode(_))
    ));
    sm.array_finalize(writer).unwrap();
}

#[test]
fn opening_a_missing_array_is_not_found() {
    let root = tempdir().unwrap();
    let sm = StorageManager::new();
    assert!(matches!(
        sm.array_init(root.path().join("nope"), ArrayMode::Read, None),
        Err(StorageError::NotFound(_))
    ));
}
