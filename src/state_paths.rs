//! Purpose: Default state-file location and root-name checks for the CLI.
//! Exports: `default_state_file`, `validate_root_name`, `RootNameError`.
//! Role: Keep CLI path semantics in one place.
//! Invariants: Default state file remains `~/.pathstate/state.json`.
//! Invariants: Root names are single path segments (no `.` or `[`).

use std::path::PathBuf;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum RootNameError {
    Empty,
    ContainsSeparator,
}

pub(crate) fn default_state_file() -> PathBuf {
    let home = std::env::var_os("HOME").unwrap_or_default();
    PathBuf::from(home).join(".pathstate").join("state.json")
}

pub(crate) fn validate_root_name(name: &str) -> Result<(), RootNameError> {
    if name.is_empty() {
        return Err(RootNameError::Empty);
    }
    if name.contains(['.', '[', ']']) {
        return Err(RootNameError::ContainsSeparator);
    }
    Ok(())
}
