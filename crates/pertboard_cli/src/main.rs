//! CLI smoke entry point.
//!
//! # Responsibility
//! - Drive the core crate end to end against an in-memory database.
//! - Keep output deterministic for quick local sanity checks.

use pertboard_core::{
    open_db_in_memory, persist_project, CommandHistory, CreateTaskCmd, ItemFields, MoveTaskCmd,
    Project, ProjectModel, SqliteStore, TaskHandle,
};

fn print_outline(model: &ProjectModel) {
    for handle in model.sorted_tasks() {
        if let Some(task) = model.task(handle) {
            let mut depth = 0;
            let mut cursor = task.parent;
            while let Some(parent) = cursor {
                depth += 1;
                cursor = model.task(parent).and_then(|t| t.parent);
            }
            println!("{:>3}  {}{}", task.order_index, "  ".repeat(depth), task.name());
        }
    }
}

fn last_task(model: &ProjectModel) -> Option<TaskHandle> {
    model.sorted_tasks().last().copied()
}

fn run() -> Result<(), String> {
    let conn = open_db_in_memory().map_err(|err| err.to_string())?;
    let mut store = SqliteStore::try_new(conn).map_err(|err| err.to_string())?;
    let mut model = ProjectModel::new(Project::new(ItemFields::new("Demo", 0, None, 1)));
    let mut history = CommandHistory::new();

    persist_project(&mut model, &mut store).map_err(|err| err.to_string())?;

    let mut handles = Vec::new();
    for name in ["Design", "Build", "Test"] {
        let cmd = CreateTaskCmd::new(ItemFields::new(name, 0, None, 5), None);
        history
            .run(Box::new(cmd), &mut model, &mut store)
            .map_err(|err| err.to_string())?;
        handles.extend(last_task(&model));
    }

    println!("initial outline:");
    print_outline(&model);

    history
        .run(
            Box::new(MoveTaskCmd::new(handles[2], Some(handles[0]))),
            &mut model,
            &mut store,
        )
        .map_err(|err| err.to_string())?;
    println!("after moving Test above Design:");
    print_outline(&model);

    history
        .undo_last(&mut model, &mut store)
        .map_err(|err| err.to_string())?;
    println!("after undo:");
    print_outline(&model);

    println!("pertboard_core version={}", pertboard_core::core_version());
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
