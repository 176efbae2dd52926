//! Purpose: Mirror store changes into a backend through an ordered write queue.
//! Exports: `Persistor`, `WriteOp`.
//! Role: Root listener that snapshots each change and hands it to one drain task.
//! Invariants: Ops are applied in enqueue order; the next op starts after the previous finished.
//! Invariants: Each op owns a deep copy of the changed value taken at notification time.
//! Notes: Failed writes are logged and dropped; there is no retry.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::core::error::{Error, ErrorKind};
use crate::core::flatten::{Record, flatten};
use crate::core::notify::{Change, ListenerKey};
use crate::core::path::{Key, parse_path, relative};
use crate::core::store::Store;
use crate::core::tree::lookup_path;
use crate::persist::backend::Backend;

/// One queued change: replace everything stored under `sub_path`.
#[derive(Clone, Debug, PartialEq)]
pub struct WriteOp {
    /// Changed path relative to the store root (empty for the root itself).
    pub sub_path: String,
    /// New value, or `None` when the path was removed.
    pub value: Option<Value>,
    /// Store containers as one record instead of flattening them.
    pub immutable: bool,
}

impl WriteOp {
    /// Records to write after stale keys under `sub_path` are deleted.
    pub fn records(&self) -> Vec<Record> {
        match &self.value {
            None => Vec::new(),
            Some(value @ (Value::Object(_) | Value::Array(_))) if !self.immutable => {
                flatten(value, &self.sub_path)
            }
            Some(value) => vec![Record::new(self.sub_path.clone(), value.to_string())],
        }
    }

    /// Snapshot a root-listener change; `None` when it should not be persisted.
    ///
    /// Keys come from the alias-free target, so writes and removals made
    /// through an alias land on the records of the concrete path.
    pub(crate) fn from_change(root: &str, change: &Change<'_>) -> Option<Self> {
        if !change.options.persist {
            return None;
        }
        let sub_path = array_owner(relative(change.target, root)?);
        let value = match (change.current, sub_path.as_str()) {
            (current, "") => current.cloned(),
            (Some(root_value), sub_path) => lookup_path(root_value, sub_path).cloned(),
            (None, _) => None,
        };
        Some(Self {
            sub_path,
            value,
            immutable: change.options.immutable,
        })
    }
}

/// Array elements are written through their array: removals shift the
/// remaining slots, so every index below the array has to be rewritten.
fn array_owner(sub_path: &str) -> String {
    let Some(leaf) = parse_path(sub_path).ok().and_then(|mut nodes| nodes.pop()) else {
        return sub_path.to_string();
    };
    match (leaf.name, leaf.parent_path) {
        (Key::Index(_), Some(parent)) => parent,
        _ => sub_path.to_string(),
    }
}

enum Command {
    Write(WriteOp),
    Flush(oneshot::Sender<()>),
}

/// Handle to an attached persistor. Must be created inside a tokio runtime.
#[derive(Debug)]
pub struct Persistor {
    root: String,
    listener: ListenerKey,
    queue: mpsc::UnboundedSender<Command>,
    drain: JoinHandle<()>,
}

impl Persistor {
    /// Listen on the store root and start the drain task.
    pub fn attach<B>(store: &mut Store, backend: Arc<B>) -> Self
    where
        B: Backend + 'static,
    {
        let (queue, receiver) = mpsc::unbounded_channel();
        let drain = tokio::spawn(drain(backend, receiver));

        let root = store.root().to_string();
        let listener_root = root.clone();
        let sender = queue.clone();
        let listener = store.listen(&root, move |change| {
            let Some(op) = WriteOp::from_change(&listener_root, change) else {
                return;
            };
            debug!(sub_path = %op.sub_path, removed = op.value.is_none(), "queued write");
            if sender.send(Command::Write(op)).is_err() {
                warn!("persistor queue closed; dropping change");
            }
        });
        debug!(root = %root, key = listener.get(), "persistor attached");

        Self {
            root,
            listener,
            queue,
            drain,
        }
    }

    /// Wait until every write queued before this call has been applied.
    pub async fn flush(&self) -> Result<(), Error> {
        let (done, wait) = oneshot::channel();
        self.queue
            .send(Command::Flush(done))
            .map_err(|_| queue_closed())?;
        wait.await.map_err(|_| queue_closed())
    }

    /// Stop listening, finish the queued writes, and join the drain task.
    pub async fn shutdown(self, store: &mut Store) -> Result<(), Error> {
        let Persistor {
            root,
            listener,
            queue,
            drain,
        } = self;
        store.remove_listener(&root, listener);
        drop(queue);
        drain.await.map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("persistor task failed")
                .with_source(err)
        })
    }
}

async fn drain<B>(backend: Arc<B>, mut receiver: mpsc::UnboundedReceiver<Command>)
where
    B: Backend + 'static,
{
    while let Some(command) = receiver.recv().await {
        let op = match command {
            Command::Write(op) => op,
            Command::Flush(done) => {
                let _ = done.send(());
                continue;
            }
        };
        let sub_path = op.sub_path.clone();
        let backend = Arc::clone(&backend);
        match tokio::task::spawn_blocking(move || backend.apply(&op)).await {
            Ok(Ok(())) => debug!(sub_path = %sub_path, "write applied"),
            Ok(Err(err)) => error!(sub_path = %sub_path, error = %err, "failed to persist change"),
            Err(err) => error!(sub_path = %sub_path, error = %err, "persist task aborted"),
        }
    }
    debug!("persistor queue drained");
}

fn queue_closed() -> Error {
    Error::new(ErrorKind::Internal).with_message("persistor queue is closed")
}

#[cfg(test)]
mod tests {
    use super::{WriteOp, array_owner};
    use crate::core::flatten::Record;
    use serde_json::json;

    fn op(sub_path: &str, value: Option<serde_json::Value>, immutable: bool) -> WriteOp {
        WriteOp {
            sub_path: sub_path.to_string(),
            value,
            immutable,
        }
    }

    #[test]
    fn containers_are_flattened_unless_immutable() {
        let value = json!({"a": 1, "b": [true]});
        assert_eq!(
            op("cfg", Some(value.clone()), false).records(),
            vec![Record::new("cfg.a", "1"), Record::new("cfg.b[0]", "true")]
        );
        assert_eq!(
            op("cfg", Some(value), true).records(),
            vec![Record::new("cfg", "{\"a\":1,\"b\":[true]}")]
        );
    }

    #[test]
    fn leaves_and_removals() {
        assert_eq!(
            op("name", Some(json!("x")), false).records(),
            vec![Record::new("name", "\"x\"")]
        );
        assert_eq!(
            op("gone", Some(json!(null)), false).records(),
            vec![Record::new("gone", "null")]
        );
        assert!(op("gone", None, false).records().is_empty());
    }

    #[test]
    fn array_elements_are_written_through_their_array() {
        assert_eq!(array_owner("list[2]"), "list");
        assert_eq!(array_owner("grid[0][1]"), "grid[0]");
        assert_eq!(array_owner("list[0].name"), "list[0].name");
        assert_eq!(array_owner("name"), "name");
        assert_eq!(array_owner(""), "");
    }
}
