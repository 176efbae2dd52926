//! Purpose: Persistence collaborators that mirror the store into an external medium.
//! Exports: `Backend`, `MemoryBackend`, `FileBackend`, `load`, `replay`, `LoadOutcome`, `Persistor`, `WriteOp`.
//! Role: Consumes only the listen/flatten/assign contracts of `core::store::Store`.
//! Invariants: Stored keys are relative to the store root; values are JSON text.
//! Invariants: Writes reach a backend strictly in change order, one at a time.

mod backend;
mod file;
mod loader;
mod persistor;

pub use backend::{Backend, MemoryBackend};
pub use file::FileBackend;
pub use loader::{LoadOutcome, load, replay};
pub use persistor::{Persistor, WriteOp};
