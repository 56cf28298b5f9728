//! # Namespace Lifecycle Tests
//!
//! End-to-end coverage of the directory hierarchy: entity creation with
//! containment enforcement, marker-file layout, enumeration, moves with
//! schema rewrite, and clear/delete semantics.

use std::path::Path;

use gridstore::{
    ArraySchema, AttributeType, CoordsType, ObjectKind, StorageError, StorageManager,
};
use tempfile::tempdir;

fn dense_schema(path: &Path) -> ArraySchema {
    ArraySchema::new(path, true, CoordsType::Int64)
        .add_dimension("rows", 1.0, 100.0)
        .add_dimension("cols", 1.0, 100.0)
        .add_attribute("v", AttributeType::Int32)
}

#[test]
fn create_lays_out_the_marker_tree() {
    let root = tempdir().unwrap();
    let sm = StorageManager::new();

    let ws = root.path().join("w");
    let group = ws.join("g");
    let array = group.join("a");

    sm.workspace_create(&ws).unwrap();
    sm.group_create(&group).unwrap();
    sm.array_create(&dense_schema(&array)).unwrap();

    assert!(ws.join("__tiledb_workspace.tdb").is_file());
    assert!(ws.join("__tiledb_group.tdb").is_file());
    assert!(group.join("__tiledb_group.tdb").is_file());
    assert!(array.join("__array_schema.tdb").is_file());
    assert!(array.join("__consolidation_lock").is_file());

    assert_eq!(sm.dir_type(&ws).unwrap(), Some(ObjectKind::Workspace));
    assert_eq!(sm.dir_type(&group).unwrap(), Some(ObjectKind::Group));
    assert_eq!(sm.dir_type(&array).unwrap(), Some(ObjectKind::Array));
}

#[test]
fn containment_violations_are_rejected() {
    let root = tempdir().unwrap();
    let sm = StorageManager::new();

    let ws = root.path().join("w");
    sm.workspace_create(&ws).unwrap();

    // A workspace cannot nest in a workspace.
    assert!(matches!(
        sm.workspace_create(ws.join("w2")),
        Err(StorageError::Containment(_))
    ));

    // A group needs a workspace or group parent.
    assert!(matches!(
        sm.group_create(root.path().join("stray_group")),
        Err(StorageError::Containment(_))
    ));

    // An array needs a workspace or group parent.
    assert!(matches!(
        sm.array_create(&dense_schema(&root.path().join("stray_array"))),
        Err(StorageError::Containment(_))
    ));

    // A group cannot live under an array.
    let array = ws.join("a");
    sm.array_create(&dense_schema(&array)).unwrap();
    assert!(matches!(
        sm.group_create(array.join("g")),
        Err(StorageError::Containment(_))
    ));

    // Metadata cannot live outside the hierarchy.
    assert!(matches!(
        sm.metadata_create(&dense_schema(&root.path().join("stray_meta"))),
        Err(StorageError::Containment(_))
    ));
}

#[test]
fn metadata_nests_in_workspaces_groups_and_arrays() {
    let root = tempdir().unwrap();
    let sm = StorageManager::new();

    let ws = root.path().join("w");
    let array = ws.join("a");
    sm.workspace_create(&ws).unwrap();
    sm.array_create(&dense_schema(&array)).unwrap();

    let meta = array.join("m");
    sm.metadata_create(&dense_schema(&meta)).unwrap();
    assert!(meta.join("__metadata_schema.tdb").is_file());
    assert!(meta.join("__consolidation_lock").is_file());
    assert_eq!(sm.dir_type(&meta).unwrap(), Some(ObjectKind::Metadata));

    let loaded = sm.metadata_load_schema(&meta).unwrap();
    assert_eq!(loaded.array_name(), meta.as_path());
}

#[test]
fn ls_reports_entities_and_nothing_else() {
    let root = tempdir().unwrap();
    let sm = StorageManager::new();

    let ws = root.path().join("w");
    sm.workspace_create(&ws).unwrap();
    sm.group_create(ws.join("g")).unwrap();

    // Hidden files and foreign directories are not entities.
    std::fs::write(ws.join(".hidden"), b"x").unwrap();
    std::fs::create_dir(ws.join("plain_dir")).unwrap();

    assert_eq!(
        sm.ls(&ws).unwrap(),
        vec![("g".to_string(), ObjectKind::Group)]
    );
    assert_eq!(sm.ls_c(&ws).unwrap(), 1);

    // The workspace itself shows up in its parent with workspace kind.
    assert_eq!(
        sm.ls(root.path()).unwrap(),
        vec![("w".to_string(), ObjectKind::Workspace)]
    );

    // A missing parent lists as empty.
    assert!(sm.ls(root.path().join("nope")).unwrap().is_empty());
}

#[test]
fn move_rewrites_the_embedded_schema_name() {
    let root = tempdir().unwrap();
    let sm = StorageManager::new();

    let ws = root.path().join("w");
    let group = ws.join("g");
    sm.workspace_create(&ws).unwrap();
    sm.group_create(&group).unwrap();

    let array = group.join("a");
    let moved = group.join("a2");
    sm.array_create(&dense_schema(&array)).unwrap();

    sm.move_entity(&array, &moved).unwrap();
    assert!(!array.exists());
    assert_eq!(sm.dir_type(&moved).unwrap(), Some(ObjectKind::Array));
    assert_eq!(
        sm.array_load_schema(&moved).unwrap().array_name(),
        moved.as_path()
    );
}

#[test]
fn move_enforces_destination_rules() {
    let root = tempdir().unwrap();
    let sm = StorageManager::new();

    let ws = root.path().join("w");
    sm.workspace_create(&ws).unwrap();
    let array = ws.join("a");
    sm.array_create(&dense_schema(&array)).unwrap();

    // Destination may not already exist.
    sm.group_create(ws.join("g")).unwrap();
    assert!(matches!(
        sm.move_entity(&array, ws.join("g")),
        Err(StorageError::AlreadyExists(_))
    ));

    // Destination parent must satisfy containment.
    assert!(matches!(
        sm.move_entity(&array, root.path().join("a")),
        Err(StorageError::Containment(_))
    ));

    // Moving a non-entity fails.
    assert!(matches!(
        sm.move_entity(root.path().join("ghost"), ws.join("g2")),
        Err(StorageError::NotFound(_))
    ));

    // A workspace can move to a non-entity location.
    let ws2 = root.path().join("w2");
    sm.move_entity(&ws, &ws2).unwrap();
    assert_eq!(sm.dir_type(&ws2).unwrap(), Some(ObjectKind::Workspace));
}

#[test]
fn clear_preserves_identity_and_delete_removes_it() {
    let root = tempdir().unwrap();
    let sm = StorageManager::new();

    let ws = root.path().join("w");
    let array = ws.join("a");
    sm.workspace_create(&ws).unwrap();
    sm.array_create(&dense_schema(&array)).unwrap();
    sm.metadata_create(&dense_schema(&array.join("m"))).unwrap();

    // One published fragment.
    let mut writer = sm
        .array_init(&array, gridstore::ArrayMode::Write, None)
        .unwrap();
    writer.write("v", &7i32.to_le_bytes()).unwrap();
    writer.record_cells(1).unwrap();
    sm.array_finalize(writer).unwrap();

    sm.clear(&array).unwrap();
    assert_eq!(sm.dir_type(&array).unwrap(), Some(ObjectKind::Array));
    assert!(array.join("__array_schema.tdb").is_file());
    assert!(array.join("__consolidation_lock").is_file());
    // Fragments and nested metadata are gone.
    assert_eq!(std::fs::read_dir(&array).unwrap().count(), 2);

    sm.delete_entire(&array).unwrap();
    assert!(!array.exists());

    sm.delete_entire(&ws).unwrap();
    assert!(!ws.exists());
}

#[test]
fn schemas_round_trip_through_creation() {
    let root = tempdir().unwrap();
    let sm = StorageManager::new();

    let ws = root.path().join("w");
    sm.workspace_create(&ws).unwrap();
    let array = ws.join("a");
    let schema = dense_schema(&array)
        .with_capacity(512)
        .add_attribute("extra", AttributeType::Float64);
    sm.array_create(&schema).unwrap();

    let loaded = sm.array_load_schema(&array).unwrap();
    assert_eq!(loaded.array_name(), array.as_path());
    assert!(loaded.dense());
    assert_eq!(loaded.capacity(), 512);
    assert_eq!(loaded.attribute_num(), 2);
    assert_eq!(loaded.attribute(1), Some("extra"));
}

#[test]
fn invalid_paths_are_rejected_up_front() {
    let sm = StorageManager::new();
    assert!(matches!(
        sm.workspace_create("/../escape"),
        Err(StorageError::InvalidPath(_))
    ));
    assert!(matches!(
        sm.dir_type("/../escape"),
        Err(StorageError::InvalidPath(_))
    ));
}
