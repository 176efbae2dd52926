//! Purpose: Shared library crate used by the `pathstate` CLI and tests.
//! Exports: `api` (public surface), `core` (state tree internals), `persist` (backends, loader, persistor).
//! Role: Embeddable state store; the binary is a thin file-backed shell over it.
//! Invariants: `api` is the stable entry point; `core` paths may move between releases.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
mod json;
pub mod persist;
