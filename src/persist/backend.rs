// Storage contract for flattened records, plus an in-memory implementation.
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::core::error::{Error, ErrorKind};
use crate::core::flatten::Record;
use crate::core::path::is_within;
use crate::persist::persistor::WriteOp;

/// A flat key/value medium holding one record per stored leaf.
///
/// Implementations are called from the blocking pool, one operation at a
/// time per persistor; they only need interior mutability, not ordering.
pub trait Backend: Send + Sync {
    fn records(&self) -> Result<Vec<Record>, Error>;

    fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.records()?.into_iter().map(|record| record.key).collect())
    }

    fn delete(&self, keys: &[String]) -> Result<(), Error>;

    fn put(&self, records: &[Record]) -> Result<(), Error>;

    /// Replace everything stored at or below `op.sub_path` with the op's records.
    fn apply(&self, op: &WriteOp) -> Result<(), Error> {
        let stale: Vec<String> = self
            .keys()?
            .into_iter()
            .filter(|key| is_within(key, &op.sub_path))
            .collect();
        if !stale.is_empty() {
            self.delete(&stale)?;
        }
        let records = op.records();
        if !records.is_empty() {
            self.put(&records)?;
        }
        Ok(())
    }
}

/// Records kept in a sorted map; useful for tests and ephemeral stores.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Mutex<BTreeMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Record>,
    {
        let map = records
            .into_iter()
            .map(|record| (record.key, record.value))
            .collect();
        Self {
            records: Mutex::new(map),
        }
    }

    /// Copy of the current contents, keyed by record key.
    pub fn snapshot(&self) -> Result<BTreeMap<String, String>, Error> {
        Ok(self.guard()?.clone())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.guard()?.get(key).cloned())
    }

    fn guard(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>, Error> {
        self.records.lock().map_err(|_| {
            Error::new(ErrorKind::Internal).with_message("memory backend lock poisoned")
        })
    }
}

impl Backend for MemoryBackend {
    fn records(&self) -> Result<Vec<Record>, Error> {
        Ok(self
            .guard()?
            .iter()
            .map(|(key, value)| Record::new(key.clone(), value.clone()))
            .collect())
    }

    fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.guard()?.keys().cloned().collect())
    }

    fn delete(&self, keys: &[String]) -> Result<(), Error> {
        let mut records = self.guard()?;
        for key in keys {
            records.remove(key);
        }
        Ok(())
    }

    fn put(&self, records: &[Record]) -> Result<(), Error> {
        let mut stored = self.guard()?;
        for record in records {
            stored.insert(record.key.clone(), record.value.clone());
        }
        Ok(())
    }
}
