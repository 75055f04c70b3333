use pertboard_core::db::migrations::latest_version;
use pertboard_core::db::{open_db, open_db_in_memory};
use pertboard_core::{ProjectRecord, ProjectStore, SqliteStore, StoreError, TaskRecord};
use rusqlite::Connection;

fn project_record(name: &str) -> ProjectRecord {
    ProjectRecord {
        store_id: -1,
        name: name.to_string(),
        start_date: 1_000,
        end_date: Some(2_000),
        description: "demo project".to_string(),
        created_at: 0,
        creator: Some("alice".to_string()),
        likely_duration: 10,
        min_duration: 8,
        max_duration: 14,
    }
}

fn task_record(project_id: i64, name: &str, order_index: i64) -> TaskRecord {
    TaskRecord {
        store_id: -1,
        project_id,
        name: name.to_string(),
        start_date: 1_000,
        end_date: None,
        description: String::new(),
        created_at: 0,
        creator: None,
        likely_duration: 5,
        min_duration: 5,
        max_duration: 5,
        order_index,
        parent_id: None,
        dependencies: Vec::new(),
        workers: Vec::new(),
    }
}

fn store() -> SqliteStore {
    SqliteStore::try_new(open_db_in_memory().unwrap()).unwrap()
}

#[test]
fn migrations_set_user_version_and_create_tables() {
    let conn = open_db_in_memory().unwrap();
    let version: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, latest_version());

    for table in ["projects", "tasks", "task_dependencies", "task_workers"] {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1;",
                [table],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1, "missing table {table}");
    }
}

#[test]
fn store_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    assert!(matches!(
        SqliteStore::try_new(conn),
        Err(StoreError::InvalidData(_))
    ));
}

#[test]
fn open_db_works_on_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pertboard.db");
    let conn = open_db(&path).unwrap();
    drop(conn);

    // Re-opening an already migrated file is a no-op.
    let conn = open_db(&path).unwrap();
    let version: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, latest_version());
}

#[test]
fn snapshot_round_trips_tasks_links_and_order() {
    let mut store = store();
    let project_id = store.create_project(&project_record("Snapshot")).unwrap();

    let first = store.create_task(&task_record(project_id, "First", 0)).unwrap();
    let mut second_record = task_record(project_id, "Second", 1);
    second_record.parent_id = Some(first);
    second_record.dependencies = vec![first];
    second_record.workers = vec!["bob".to_string()];
    let second = store.create_task(&second_record).unwrap();

    let snapshot = store.fetch_snapshot(project_id).unwrap();
    assert_eq!(snapshot.project.name, "Snapshot");
    assert!(snapshot.project.created_at > 0, "store stamps created_at");
    assert_eq!(snapshot.tasks.len(), 2);
    assert_eq!(snapshot.tasks[0].store_id, first);
    assert_eq!(snapshot.tasks[1].store_id, second);
    assert_eq!(snapshot.tasks[1].parent_id, Some(first));
    assert_eq!(snapshot.tasks[1].dependencies, vec![first]);
    assert_eq!(snapshot.tasks[1].workers, vec!["bob".to_string()]);
}

#[test]
fn snapshot_orders_by_order_index() {
    let mut store = store();
    let project_id = store.create_project(&project_record("Ordered")).unwrap();
    store.create_task(&task_record(project_id, "Late", 2)).unwrap();
    store.create_task(&task_record(project_id, "Early", 0)).unwrap();
    store.create_task(&task_record(project_id, "Middle", 1)).unwrap();

    let snapshot = store.fetch_snapshot(project_id).unwrap();
    let names: Vec<&str> = snapshot.tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Early", "Middle", "Late"]);
}

#[test]
fn duplicate_task_name_maps_to_constraint() {
    let mut store = store();
    let project_id = store.create_project(&project_record("Dupes")).unwrap();
    store.create_task(&task_record(project_id, "Same", 0)).unwrap();
    let err = store
        .create_task(&task_record(project_id, "Same", 1))
        .unwrap_err();
    assert!(matches!(err, StoreError::Constraint(_)));
}

#[test]
fn delete_cascades_links_and_nulls_child_parents() {
    let mut store = store();
    let project_id = store.create_project(&project_record("Cascade")).unwrap();
    let parent = store.create_task(&task_record(project_id, "Parent", 0)).unwrap();
    let mut child_record = task_record(project_id, "Child", 1);
    child_record.parent_id = Some(parent);
    child_record.dependencies = vec![parent];
    child_record.workers = vec!["carol".to_string()];
    let child = store.create_task(&child_record).unwrap();

    store.delete_task(parent).unwrap();

    let snapshot = store.fetch_snapshot(project_id).unwrap();
    assert_eq!(snapshot.tasks.len(), 1);
    assert_eq!(snapshot.tasks[0].store_id, child);
    assert_eq!(snapshot.tasks[0].parent_id, None);
    assert!(snapshot.tasks[0].dependencies.is_empty());
    assert_eq!(snapshot.tasks[0].workers, vec!["carol".to_string()]);
}

#[test]
fn update_of_missing_rows_reports_not_found() {
    let mut store = store();
    let project_id = store.create_project(&project_record("Missing")).unwrap();
    assert!(matches!(
        store.update_task_row(999, 0),
        Err(StoreError::NotFound(999))
    ));
    assert!(matches!(
        store.delete_task(999),
        Err(StoreError::NotFound(999))
    ));
    assert!(matches!(
        store.fetch_snapshot(project_id + 1),
        Err(StoreError::NotFound(_))
    ));
}
