//! In-memory granules.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{GranuleError, GranuleResult};
use crate::{DimensionInfo, Granule, GranuleOpener, VariableInfo};

/// A granule whose structure lives entirely in memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryGranule {
    #[serde(default)]
    pub dimensions: Vec<DimensionInfo>,
    #[serde(default)]
    pub variables: Vec<VariableInfo>,
    /// When set, `close` fails with this message
    #[serde(skip)]
    pub close_failure: Option<String>,
    #[serde(skip)]
    open_handles: Option<Arc<AtomicUsize>>,
}

impl MemoryGranule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dimension(mut self, name: impl Into<String>, len: usize) -> Self {
        self.dimensions.push(DimensionInfo::new(name, len));
        self
    }

    pub fn with_variable(mut self, short_name: impl Into<String>, shape: Vec<usize>) -> Self {
        self.variables.push(VariableInfo::new(short_name, shape));
        self
    }

    pub fn failing_close(mut self, message: impl Into<String>) -> Self {
        self.close_failure = Some(message.into());
        self
    }
}

impl Granule for MemoryGranule {
    fn dimensions(&self) -> GranuleResult<Vec<DimensionInfo>> {
        Ok(self.dimensions.clone())
    }

    fn variables(&self) -> GranuleResult<Vec<VariableInfo>> {
        Ok(self.variables.clone())
    }

    fn close(self) -> GranuleResult<()> {
        if let Some(counter) = &self.open_handles {
            counter.fetch_sub(1, Ordering::SeqCst);
        }
        match self.close_failure {
            Some(message) => Err(GranuleError::CloseFailed(message)),
            None => Ok(()),
        }
    }
}

/// Opens registered [`MemoryGranule`]s by path.
///
/// Tracks how many handles are currently open so tests can assert that a
/// stream released its granule.
#[derive(Debug, Clone, Default)]
pub struct MemoryOpener {
    granules: HashMap<PathBuf, MemoryGranule>,
    open_handles: Arc<AtomicUsize>,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, granule: MemoryGranule) {
        self.granules.insert(path.into(), granule);
    }

    pub fn with_granule(mut self, path: impl Into<PathBuf>, granule: MemoryGranule) -> Self {
        self.insert(path, granule);
        self
    }

    /// Number of handles opened and not yet closed.
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }
}

impl GranuleOpener for MemoryOpener {
    type Granule = MemoryGranule;

    fn open(&self, path: &Path) -> GranuleResult<MemoryGranule> {
        let mut granule = self.granules.get(path).cloned().ok_or_else(|| {
            GranuleError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no granule registered at {}", path.display()),
            ))
        })?;
        self.open_handles.fetch_add(1, Ordering::SeqCst);
        granule.open_handles = Some(Arc::clone(&self.open_handles));
        Ok(granule)
    }
}
