use anyhow::Result;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::config::LimitsConfig;

/// Concurrency caps for calls to the external engines.
#[derive(Clone)]
pub struct Limiters {
    pub embedding: Arc<Semaphore>,
    pub llm_generate: Arc<Semaphore>,
    pub acquire_timeout: Duration,
}

impl Limiters {
    pub fn new(cfg: &LimitsConfig) -> Self {
        Self {
            embedding: Arc::new(Semaphore::new(cfg.embedding_concurrency.max(1))),
            llm_generate: Arc::new(Semaphore::new(cfg.llm_generate_concurrency.max(1))),
            acquire_timeout: Duration::from_millis(cfg.acquire_timeout_ms.max(1)),
        }
    }

    pub async fn acquire_embedding(&self) -> Result<OwnedSemaphorePermit> {
        Self::acquire_timed(self.embedding.clone(), self.acquire_timeout, "embedding")
            .await
            .map(|(permit, _)| permit)
    }

    pub async fn acquire_llm(&self) -> Result<OwnedSemaphorePermit> {
        Self::acquire_timed(self.llm_generate.clone(), self.acquire_timeout, "llm_generate")
            .await
            .map(|(permit, _)| permit)
    }

    pub async fn acquire_timed(
        sem: Arc<Semaphore>,
        acquire_timeout: Duration,
        op: &'static str,
    ) -> Result<(OwnedSemaphorePermit, Duration)> {
        let start = Instant::now();

        let permit = tokio::time::timeout(acquire_timeout, sem.acquire_owned())
            .await
            .map_err(|_| anyhow::anyhow!("Limiter acquire timeout for op={}", op))??;

        let waited = start.elapsed();
        debug!(op, waited_ms = waited.as_millis() as u64, "Limiter permit acquired");
        Ok((permit, waited))
    }
}

impl Default for Limiters {
    fn default() -> Self {
        Self::new(&LimitsConfig::default())
    }
}
