//! Named admission limits for external resources.
//!
//! Each gate admits at most N concurrent operations; waiters are served in
//! FIFO order by the underlying [`tokio::sync::Semaphore`].

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::warn;

/// External resource guarded by a limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Shapes API calls
    Api,
    /// Telegram API calls
    Platform,
    /// Channel file writes
    FileIo,
}

/// One semaphore per [`Gate`]
#[derive(Debug, Clone)]
pub struct AdmissionLimits {
    api: Arc<Semaphore>,
    platform: Arc<Semaphore>,
    file_io: Arc<Semaphore>,
}

impl AdmissionLimits {
    /// Create limits; a size of zero is raised to one.
    #[must_use]
    pub fn new(api: usize, platform: usize, file_io: usize) -> Self {
        Self {
            api: Arc::new(Semaphore::new(api.max(1))),
            platform: Arc::new(Semaphore::new(platform.max(1))),
            file_io: Arc::new(Semaphore::new(file_io.max(1))),
        }
    }

    /// Limits sized from the environment
    #[must_use]
    pub fn from_env() -> Self {
        use crate::config::{
            get_api_concurrency, get_file_io_concurrency, get_platform_concurrency,
        };
        Self::new(
            get_api_concurrency(),
            get_platform_concurrency(),
            get_file_io_concurrency(),
        )
    }

    /// Wait for a permit on `gate`, then run `fut` while holding it.
    pub async fn run<F, T>(&self, gate: Gate, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let _permit = match self.semaphore(gate).acquire().await {
            Ok(permit) => Some(permit),
            Err(e) => {
                warn!(?gate, "admission limit closed, running unguarded: {e}");
                None
            }
        };
        fut.await
    }

    /// Permits currently free on `gate`
    #[must_use]
    pub fn available(&self, gate: Gate) -> usize {
        self.semaphore(gate).available_permits()
    }

    fn semaphore(&self, gate: Gate) -> &Semaphore {
        match gate {
            Gate::Api => &self.api,
            Gate::Platform => &self.platform,
            Gate::FileIo => &self.file_io,
        }
    }
}

impl Default for AdmissionLimits {
    fn default() -> Self {
        use crate::config::{API_CONCURRENCY, FILE_IO_CONCURRENCY, PLATFORM_CONCURRENCY};
        Self::new(API_CONCURRENCY, PLATFORM_CONCURRENCY, FILE_IO_CONCURRENCY)
    }
}
