mod allocator;
mod availability;
mod error;
mod mutations;
mod queries;
mod store;
mod validate;

pub use availability::{candidates, order_candidates};
pub use error::EngineError;
pub use store::{normalize_email, CageLock, SharedCageState, Store};

use std::io;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::compactor;
use crate::config::Config;

pub const WAL_FILE_NAME: &str = "cagebnb.wal";

/// Availability search and exclusive booking over an explicitly injected
/// [`Store`].
pub struct Engine {
    store: Arc<Store>,
    compactor: Option<JoinHandle<()>>,
}

impl Engine {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store, compactor: None }
    }

    /// Open the store under `config.data_dir` and start its compactor.
    /// Must be called from within a tokio runtime.
    pub fn open(config: &Config) -> io::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let store = Arc::new(Store::open(&config.data_dir.join(WAL_FILE_NAME))?);

        let threshold = config.compact_threshold;
        let period = config.compact_interval;
        let compactor = tokio::spawn(compactor::run_compactor(Arc::downgrade(&store), threshold, period));

        tracing::info!(
            data_dir = %config.data_dir.display(),
            compact_threshold = threshold,
            "engine opened"
        );
        Ok(Self {
            store,
            compactor: Some(compactor),
        })
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }
}

/// Stops the compactor. The WAL writer exits when the last `Arc<Store>` goes.
impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(task) = self.compactor.take() {
            task.abort();
        }
    }
}
