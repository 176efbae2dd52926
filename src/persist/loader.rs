// Replay stored records into a store with notifications paused.
use tracing::{debug, warn};

use crate::core::error::Error;
use crate::core::flatten::Record;
use crate::core::path::rebase;
use crate::core::store::{ASSIGN_MAX_GAP, Store};
use crate::json::parse::parse_or_raw;
use crate::persist::backend::Backend;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LoadOutcome {
    pub records_total: usize,
    pub applied: usize,
    pub skipped: usize,
}

/// Read every record from `backend` and replay it into `store`.
pub fn load<B>(store: &mut Store, backend: &B) -> Result<LoadOutcome, Error>
where
    B: Backend + ?Sized,
{
    let records = backend.records()?;
    Ok(replay(store, &records))
}

/// Assign each record under the store root without notifying listeners.
///
/// Values that are not valid JSON are kept as strings. A record that cannot
/// be assigned (bad path, shape conflict, an index far past the end of its
/// array) is logged and skipped. Notifications come back on when this
/// returns, however it returns.
pub fn replay(store: &mut Store, records: &[Record]) -> LoadOutcome {
    let mut outcome = LoadOutcome {
        records_total: records.len(),
        ..LoadOutcome::default()
    };
    let mut paused = store.pause_notifications();
    let root = paused.root().to_string();
    let root_prefix = format!("{root}.");
    // One record fills at most one slot, so a longer gap cannot come from a real array.
    let max_gap = records.len().max(ASSIGN_MAX_GAP);

    for record in records {
        let key = record
            .key
            .strip_prefix(root_prefix.as_str())
            .unwrap_or(record.key.as_str());
        let value = parse_or_raw(&record.value);
        match paused.assign_padded(&rebase(&root, key), value, max_gap) {
            Ok(()) => outcome.applied += 1,
            Err(err) => {
                warn!(key = %record.key, error = %err, "skipping stored record");
                outcome.skipped += 1;
            }
        }
    }
    debug!(
        total = outcome.records_total,
        applied = outcome.applied,
        skipped = outcome.skipped,
        "replayed records"
    );
    outcome
}
