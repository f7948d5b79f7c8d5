//! Persistent execution contexts.

use redis::{Client, Commands, Connection};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use tiler_common::{ContextError, ContextResult, ExecutionContext};

use crate::error::{StoreError, StoreResult};

/// Execution context backed by a JSON document on disk.
///
/// Every `put_int` rewrites the whole document through a temp file in the
/// same directory, so a crash leaves either the old or the new state.
#[derive(Debug)]
pub struct FileExecutionContext {
    path: PathBuf,
    values: BTreeMap<String, i64>,
}

impl FileExecutionContext {
    /// Load the context at `path`. A missing file is an empty context.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let values = if path.exists() {
            let raw = std::fs::read(&path)?;
            serde_json::from_slice(&raw)?
        } else {
            BTreeMap::new()
        };

        info!(
            path = %path.display(),
            keys = values.len(),
            "Loaded checkpoint file"
        );
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> StoreResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&serde_json::to_vec_pretty(&self.values)?)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl ExecutionContext for FileExecutionContext {
    fn get_int(&self, key: &str) -> ContextResult<Option<i64>> {
        Ok(self.values.get(key).copied())
    }

    fn put_int(&mut self, key: &str, value: i64) -> ContextResult<()> {
        let previous = self.values.insert(key.to_string(), value);
        if let Err(e) = self.persist() {
            match previous {
                Some(old) => self.values.insert(key.to_string(), old),
                None => self.values.remove(key),
            };
            return Err(e.into());
        }
        Ok(())
    }
}

/// Execution context stored in Redis, one string key per entry.
pub struct RedisExecutionContext {
    // Redis commands need `&mut`, reads come through `&self`
    conn: RefCell<Connection>,
    key_prefix: String,
}

impl RedisExecutionContext {
    /// Connect to Redis. Keys are stored as `<key_prefix>:<key>`.
    pub fn connect(redis_url: &str, key_prefix: impl Into<String>) -> StoreResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = client.get_connection()?;
        let key_prefix = key_prefix.into();

        info!(prefix = %key_prefix, "Connected to Redis checkpoint store");
        Ok(Self {
            conn: RefCell::new(conn),
            key_prefix,
        })
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// The Redis key for a context key.
    pub fn redis_key(&self, key: &str) -> String {
        redis_key(&self.key_prefix, key)
    }
}

fn redis_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}:{}", prefix, key)
    }
}

impl ExecutionContext for RedisExecutionContext {
    fn get_int(&self, key: &str) -> ContextResult<Option<i64>> {
        let redis_key = self.redis_key(key);
        let raw: Option<String> = self
            .conn
            .borrow_mut()
            .get(&redis_key)
            .map_err(StoreError::from)?;

        match raw {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|e: std::num::ParseIntError| ContextError::Corrupt {
                    key: redis_key,
                    message: e.to_string(),
                }),
        }
    }

    fn put_int(&mut self, key: &str, value: i64) -> ContextResult<()> {
        let redis_key = self.redis_key(key);
        let _: () = self
            .conn
            .get_mut()
            .set(&redis_key, value)
            .map_err(StoreError::from)?;
        debug!(key = %redis_key, value = value, "Stored checkpoint");
        Ok(())
    }
}
