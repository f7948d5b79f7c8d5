//! Checkpoint execution contexts.
//!
//! An execution context is a small key/value store of integers owned by the
//! driver. Tile streams read their resume cursor from it on open and write
//! it back on every checkpoint.

use std::collections::HashMap;

use crate::error::ContextResult;

/// Integer key/value store used for stream checkpoints.
pub trait ExecutionContext {
    /// Read the value stored under `key`, if any.
    fn get_int(&self, key: &str) -> ContextResult<Option<i64>>;

    /// Store `value` under `key`, replacing any previous value.
    fn put_int(&mut self, key: &str, value: i64) -> ContextResult<()>;
}

impl<C: ExecutionContext + ?Sized> ExecutionContext for &mut C {
    fn get_int(&self, key: &str) -> ContextResult<Option<i64>> {
        (**self).get_int(key)
    }

    fn put_int(&mut self, key: &str, value: i64) -> ContextResult<()> {
        (**self).put_int(key, value)
    }
}

impl<C: ExecutionContext + ?Sized> ExecutionContext for Box<C> {
    fn get_int(&self, key: &str) -> ContextResult<Option<i64>> {
        (**self).get_int(key)
    }

    fn put_int(&mut self, key: &str, value: i64) -> ContextResult<()> {
        (**self).put_int(key, value)
    }
}

/// Process-local execution context.
#[derive(Debug, Clone, Default)]
pub struct MemoryExecutionContext {
    values: HashMap<String, i64>,
}

impl MemoryExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ExecutionContext for MemoryExecutionContext {
    fn get_int(&self, key: &str) -> ContextResult<Option<i64>> {
        Ok(self.values.get(key).copied())
    }

    fn put_int(&mut self, key: &str, value: i64) -> ContextResult<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Wraps a context so every key is prefixed with `<scope>/`.
///
/// Streams always use the same fixed cursor key; scoping lets several
/// granules share one backing store without clobbering each other.
pub struct ScopedContext<C> {
    inner: C,
    scope: String,
}

impl<C: ExecutionContext> ScopedContext<C> {
    pub fn new(inner: C, scope: impl Into<String>) -> Self {
        Self {
            inner,
            scope: scope.into(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    fn scoped_key(&self, key: &str) -> String {
        format!("{}/{}", self.scope, key)
    }
}

impl<C: ExecutionContext> ExecutionContext for ScopedContext<C> {
    fn get_int(&self, key: &str) -> ContextResult<Option<i64>> {
        self.inner.get_int(&self.scoped_key(key))
    }

    fn put_int(&mut self, key: &str, value: i64) -> ContextResult<()> {
        let scoped = self.scoped_key(key);
        tracing::trace!(key = %scoped, value = value, "Writing scoped checkpoint value");
        self.inner.put_int(&scoped, value)
    }
}
