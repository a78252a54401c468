use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Name the writer registers its failure counter under by default.
pub const DEFAULT_ERROR_COUNTER: &str = "Kafka-write-error-counter";

/// Named, monotonic counter of records that failed mapping.
///
/// Cloning yields another handle to the same count, so the runtime can keep
/// one handle for reporting while transforms on other threads increment it.
#[derive(Clone)]
pub struct ErrorCounter {
    name: Arc<str>,
    count: Arc<AtomicU64>,
}

impl ErrorCounter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            count: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inc(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for ErrorCounter {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_COUNTER)
    }
}

impl fmt::Debug for ErrorCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorCounter")
            .field("name", &self.name)
            .field("count", &self.get())
            .finish()
    }
}
