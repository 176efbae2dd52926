//! Purpose: Define the stable public Rust API boundary for pathstate.
//! Exports: Store, options, notification, codec, and persistence types.
//! Role: Public, additive-only surface; callers should not need `core` paths.
//! Invariants: Everything re-exported here is covered by integration tests.

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::flatten::{Record, flatten};
pub use crate::core::notify::{Callback, Change, ListenerKey};
pub use crate::core::options::{DEFAULT_ROOT, SetOptions, StoreConfig};
pub use crate::core::path::{Key, Node, NodeKind, parse_path};
pub use crate::core::store::{ASSIGN_MAX_GAP, NotificationPause, Store};
pub use crate::json::parse::parse_or_raw;
pub use crate::persist::{
    Backend, FileBackend, LoadOutcome, MemoryBackend, Persistor, WriteOp, load, replay,
};
