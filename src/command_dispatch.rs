//! Purpose: Hold top-level CLI command dispatch for `pathstate`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Read-only commands never start a runtime or write the state file.
//! Invariants: Mutating commands return only after the persistor has drained.

use super::*;

pub(super) fn dispatch_command(
    command: Command,
    state_file: &Path,
    root: &str,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "pathstate", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_json(json!({
                "name": "pathstate",
                "version": env!("CARGO_PKG_VERSION"),
            }));
            Ok(RunOutcome::ok())
        }
        Command::Get { path } => {
            let (store, _) = open_store(state_file, root)?;
            let value = store.get(&path)?.cloned().ok_or_else(|| {
                Error::new(ErrorKind::NotFound)
                    .with_message("no value at path")
                    .with_state_path(&path)
                    .with_file(state_file)
            })?;
            emit_json(value);
            Ok(RunOutcome::ok())
        }
        Command::Set {
            path,
            value,
            immutable,
        } => {
            let value = parse_or_raw(&value);
            let store = mutate(state_file, root, |store| {
                store.set_with(&path, value, set_options(immutable))
            })?;
            let stored = store.get(&path)?.cloned().unwrap_or(Value::Null);
            emit_json(json!({ "set": { "path": path, "value": stored } }));
            Ok(RunOutcome::ok())
        }
        Command::Rm { path } => {
            mutate(state_file, root, |store| store.remove(&path))?;
            emit_json(json!({ "removed": { "path": path } }));
            Ok(RunOutcome::ok())
        }
        Command::Flatten { path } => {
            let (store, _) = open_store(state_file, root)?;
            let path = path.unwrap_or_else(|| root.to_string());
            let records = store.flatten(&path)?;
            let value = serde_json::to_value(&records).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to encode records")
                    .with_source(err)
            })?;
            emit_json(json!({ "path": path, "records": value }));
            Ok(RunOutcome::ok())
        }
    }
}
