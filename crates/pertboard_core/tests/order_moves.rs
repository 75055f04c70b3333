use pertboard_core::db::open_db_in_memory;
use pertboard_core::order::{attach_as_subtask, move_group_to, shift_rows, task_after_group};
use pertboard_core::{
    persist_project, CommandHistory, CreateTaskCmd, ItemFields, Project, ProjectModel, ProjectStore,
    SqliteStore, TaskHandle,
};

fn setup(names: &[&str]) -> (ProjectModel, SqliteStore, Vec<TaskHandle>) {
    let mut store = SqliteStore::try_new(open_db_in_memory().unwrap()).unwrap();
    let mut model = ProjectModel::new(Project::new(ItemFields::new("Order", 0, None, 1)));
    let mut history = CommandHistory::new();
    persist_project(&mut model, &mut store).unwrap();

    let mut handles = Vec::new();
    for name in names {
        let cmd = CreateTaskCmd::new(ItemFields::new(*name, 0, None, 1), None);
        history.run(Box::new(cmd), &mut model, &mut store).unwrap();
        handles.push(*model.sorted_tasks().last().unwrap());
    }
    (model, store, handles)
}

fn names_in_order(model: &ProjectModel) -> Vec<String> {
    model
        .sorted_tasks()
        .iter()
        .map(|h| model.task(*h).unwrap().name().to_string())
        .collect()
}

fn store_names_in_order(model: &ProjectModel, store: &mut SqliteStore) -> Vec<String> {
    let snapshot = store.fetch_snapshot(model.project().store_id).unwrap();
    snapshot.tasks.iter().map(|t| t.name.clone()).collect()
}

/// Builds [A, B(C, D), E] with C and D as children of B.
fn family() -> (ProjectModel, SqliteStore, Vec<TaskHandle>) {
    let (mut model, mut store, handles) = setup(&["A", "B", "C", "D", "E"]);
    assert!(attach_as_subtask(&mut model, &mut store, handles[2], handles[1]));
    assert!(attach_as_subtask(&mut model, &mut store, handles[3], handles[1]));
    assert_eq!(names_in_order(&model), ["A", "B", "C", "D", "E"]);
    (model, store, handles)
}

#[test]
fn move_places_group_directly_above_target() {
    let (mut model, mut store, h) = family();

    assert!(move_group_to(&mut model, &mut store, h[0], Some(h[4])));

    assert_eq!(names_in_order(&model), ["B", "C", "D", "A", "E"]);
    // A now sits right below childless D, so it adopts D's parent.
    assert_eq!(model.task(h[0]).unwrap().parent, Some(h[1]));
    assert_eq!(store_names_in_order(&model, &mut store), names_in_order(&model));
}

#[test]
fn group_moves_as_a_block() {
    let (mut model, mut store, h) = family();

    assert!(move_group_to(&mut model, &mut store, h[1], None));

    assert_eq!(names_in_order(&model), ["A", "E", "B", "C", "D"]);
    assert_eq!(model.task(h[2]).unwrap().parent, Some(h[1]));
    assert_eq!(model.task(h[3]).unwrap().parent, Some(h[1]));
    assert_eq!(store_names_in_order(&model, &mut store), names_in_order(&model));
}

#[test]
fn move_into_own_group_is_rejected_without_mutation() {
    let (mut model, mut store, h) = family();
    let before = names_in_order(&model);

    assert!(!move_group_to(&mut model, &mut store, h[1], Some(h[2])));
    assert!(!move_group_to(&mut model, &mut store, h[1], Some(h[3])));

    assert_eq!(names_in_order(&model), before);
    assert_eq!(store_names_in_order(&model, &mut store), before);
}

#[test]
fn move_to_top_becomes_root() {
    let (mut model, mut store, h) = family();

    assert!(move_group_to(&mut model, &mut store, h[3], Some(h[0])));

    assert_eq!(names_in_order(&model), ["D", "A", "B", "C", "E"]);
    assert_eq!(model.task(h[3]).unwrap().parent, None);
}

#[test]
fn shift_rows_clamps_at_both_ends() {
    let (mut model, mut store, h) = setup(&["A", "B", "C"]);

    assert!(shift_rows(&mut model, &mut store, h[2], -10));
    assert_eq!(names_in_order(&model), ["C", "A", "B"]);

    assert!(shift_rows(&mut model, &mut store, h[0], 10));
    assert_eq!(names_in_order(&model), ["C", "B", "A"]);
}

#[test]
fn attach_positions_child_after_existing_group() {
    let (mut model, mut store, h) = setup(&["P", "X", "Y"]);

    assert!(attach_as_subtask(&mut model, &mut store, h[2], h[0]));
    assert!(attach_as_subtask(&mut model, &mut store, h[1], h[0]));

    assert_eq!(names_in_order(&model), ["P", "Y", "X"]);
    assert_eq!(model.task(h[0]).unwrap().children, vec![h[2], h[1]]);
    assert_eq!(task_after_group(&model, h[0]), None);
    assert_eq!(store_names_in_order(&model, &mut store), names_in_order(&model));
}

#[test]
fn attach_under_own_descendant_is_rejected() {
    let (mut model, mut store, h) = setup(&["P", "C"]);
    assert!(attach_as_subtask(&mut model, &mut store, h[1], h[0]));
    assert!(!attach_as_subtask(&mut model, &mut store, h[0], h[1]));
    assert_eq!(model.task(h[0]).unwrap().parent, None);
}

#[test]
fn order_indices_stay_dense_after_moves() {
    let (mut model, mut store, h) = family();
    assert!(move_group_to(&mut model, &mut store, h[1], None));
    assert!(move_group_to(&mut model, &mut store, h[4], Some(h[0])));

    let rows: Vec<i64> = model
        .sorted_tasks()
        .iter()
        .map(|handle| model.task(*handle).unwrap().order_index)
        .collect();
    assert_eq!(rows, (0..model.task_count() as i64).collect::<Vec<_>>());
}
