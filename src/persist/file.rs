// Single-file JSON backend with advisory locking and atomic replace-on-write.
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use getrandom::fill as fill_random;
use libc::{EACCES, EPERM};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use crate::core::error::{Error, ErrorKind};
use crate::core::flatten::Record;
use crate::core::path::is_within;
use crate::json::parse::from_str;
use crate::persist::backend::Backend;
use crate::persist::persistor::WriteOp;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<String>,
    #[serde(default)]
    records: Map<String, Value>,
}

impl Document {
    fn empty() -> Self {
        Self {
            version: FORMAT_VERSION,
            ..Self::default()
        }
    }

    fn records(&self) -> Vec<Record> {
        self.records
            .iter()
            .map(|(key, value)| match value {
                Value::String(text) => Record::new(key.clone(), text.clone()),
                other => Record::new(key.clone(), other.to_string()),
            })
            .collect()
    }

    fn remove_under(&mut self, sub_path: &str) -> usize {
        let before = self.records.len();
        self.records.retain(|key, _| !is_within(key, sub_path));
        before - self.records.len()
    }

    fn insert(&mut self, records: &[Record]) {
        for record in records {
            self.records
                .insert(record.key.clone(), Value::String(record.value.clone()));
        }
    }
}

/// Records stored as one JSON document: `{"version": 1, "saved_at": .., "records": {key: value}}`.
///
/// Readers take a shared lock and writers an exclusive lock on a sibling
/// `.lock` file; the document itself is replaced by rename.
#[derive(Clone, Debug)]
pub struct FileBackend {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_name = path.file_name().unwrap_or_default().to_os_string();
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);
        Self { path, lock_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When the document was last written, if it exists.
    pub fn saved_at(&self) -> Result<Option<OffsetDateTime>, Error> {
        let _lock = self.lock(LockMode::Shared)?;
        let document = self.read_document()?;
        let Some(stamp) = document.saved_at else {
            return Ok(None);
        };
        OffsetDateTime::parse(&stamp, &Rfc3339).map(Some).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message(format!("invalid saved_at timestamp `{stamp}`"))
                .with_file(&self.path)
                .with_source(err)
        })
    }

    fn lock(&self, mode: LockMode) -> Result<StateLock, Error> {
        if let Some(parent) = self.lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| io_error(err, parent))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|err| io_error(err, &self.lock_path))?;
        let locked = match mode {
            LockMode::Shared => FileExt::lock_shared(&file),
            LockMode::Exclusive => file.lock_exclusive(),
        };
        locked.map_err(|err| {
            Error::new(lock_error_kind(&err))
                .with_message("failed to lock state file")
                .with_file(&self.lock_path)
                .with_source(err)
        })?;
        Ok(StateLock { file })
    }

    fn read_document(&self) -> Result<Document, Error> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Document::empty()),
            Err(err) => return Err(io_error(err, &self.path)),
        };
        if text.trim().is_empty() {
            return Ok(Document::empty());
        }
        let document: Document = from_str(&text).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message("state file is not a valid document")
                .with_hint("Move the file aside to start from an empty state.")
                .with_file(&self.path)
                .with_source(err)
        })?;
        if document.version != FORMAT_VERSION {
            return Err(Error::new(ErrorKind::Corrupt)
                .with_message(format!(
                    "unsupported state file version {}",
                    document.version
                ))
                .with_file(&self.path));
        }
        Ok(document)
    }

    fn write_document(&self, document: &mut Document) -> Result<(), Error> {
        document.version = FORMAT_VERSION;
        document.saved_at = OffsetDateTime::now_utc().format(&Rfc3339).ok();
        let bytes = serde_json::to_vec_pretty(document).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode state document")
                .with_source(err)
        })?;

        let temp = self.temp_path()?;
        let result = write_synced(&temp, &bytes).and_then(|()| fs::rename(&temp, &self.path));
        if let Err(err) = result {
            let _ = fs::remove_file(&temp);
            return Err(io_error(err, &self.path));
        }
        debug!(file = %self.path.display(), records = document.records.len(), "state file written");
        Ok(())
    }

    fn temp_path(&self) -> Result<PathBuf, Error> {
        let mut bytes = [0u8; 6];
        fill_random(&mut bytes).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message(format!("failed to generate temp file name: {err}"))
        })?;
        let suffix: String = bytes.iter().map(|byte| format!("{byte:02x}")).collect();
        let mut name = std::ffi::OsString::from(".");
        name.push(self.path.file_name().unwrap_or_default());
        name.push(format!(".{suffix}.tmp"));
        Ok(self.path.with_file_name(name))
    }

    fn modify(&self, change: impl FnOnce(&mut Document)) -> Result<(), Error> {
        let _lock = self.lock(LockMode::Exclusive)?;
        let mut document = self.read_document()?;
        change(&mut document);
        self.write_document(&mut document)
    }
}

impl Backend for FileBackend {
    fn records(&self) -> Result<Vec<Record>, Error> {
        let _lock = self.lock(LockMode::Shared)?;
        Ok(self.read_document()?.records())
    }

    fn delete(&self, keys: &[String]) -> Result<(), Error> {
        self.modify(|document| {
            for key in keys {
                document.records.shift_remove(key);
            }
        })
    }

    fn put(&self, records: &[Record]) -> Result<(), Error> {
        self.modify(|document| document.insert(records))
    }

    /// Delete and write under one lock and one file replacement.
    fn apply(&self, op: &WriteOp) -> Result<(), Error> {
        let records = op.records();
        self.modify(|document| {
            let removed = document.remove_under(&op.sub_path);
            document.insert(&records);
            debug!(sub_path = %op.sub_path, removed, written = records.len(), "applied write");
        })
    }
}

#[derive(Clone, Copy)]
enum LockMode {
    Shared,
    Exclusive,
}

struct StateLock {
    file: File,
}

impl Drop for StateLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn io_error(err: io::Error, path: &Path) -> Error {
    let kind = match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    };
    Error::new(kind).with_file(path).with_source(err)
}

fn lock_error_kind(err: &io::Error) -> ErrorKind {
    let errno = err.raw_os_error().unwrap_or_default();
    if errno == EACCES || errno == EPERM {
        return ErrorKind::Permission;
    }
    match err.kind() {
        io::ErrorKind::WouldBlock => ErrorKind::Busy,
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    }
}
