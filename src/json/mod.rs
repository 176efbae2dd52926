//! Purpose: Internal JSON decoding boundary shared by the loader, persistor, and CLI.
//! Exports: `parse` module with decode helpers.
//! Role: Single seam for parser details so callsites avoid ad hoc decode logic.
//! Invariants: Helper APIs stay small and deterministic (no hidden global state).

pub(crate) mod parse;
