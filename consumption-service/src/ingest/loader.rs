use std::sync::Arc;

use consumption_client::{db::insert_consumption_batch, domain::ConsumptionRecord};
use futures::StreamExt;
use sqlx::PgPool;

use super::{IngestError, IngestSummary, RecordStream};
use crate::address::{RetryPolicy, Sleeper, TokioSleeper};

/// Destination for batches of validated records.
#[async_trait::async_trait]
pub trait BatchWriter: Send + Sync {
    async fn write_batch(&self, batch: &[ConsumptionRecord]) -> anyhow::Result<()>;
}

/// [`BatchWriter`] inserting into the `consumption` table.
#[derive(Clone)]
pub struct PgBatchWriter {
    pool: PgPool,
}

impl PgBatchWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl BatchWriter for PgBatchWriter {
    async fn write_batch(&self, batch: &[ConsumptionRecord]) -> anyhow::Result<()> {
        insert_consumption_batch(&self.pool, batch).await
    }
}

/// Drains a [`RecordStream`] into a [`BatchWriter`].
///
/// Rejected items are counted and skipped. A batch is retried under the same
/// fixed-delay [`RetryPolicy`] the address resolver uses; a batch that still
/// fails aborts the load.
pub struct SeedLoader {
    writer: Arc<dyn BatchWriter>,
    batch_size: usize,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl SeedLoader {
    pub fn new(writer: Arc<dyn BatchWriter>, batch_size: usize, retry: RetryPolicy) -> Self {
        Self {
            writer,
            batch_size: batch_size.max(1),
            retry,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub async fn load(&self, mut records: RecordStream) -> Result<IngestSummary, IngestError> {
        let mut summary = IngestSummary::default();
        let mut batch = Vec::with_capacity(self.batch_size);

        while let Some(item) = records.next().await {
            match item {
                Ok(record) => batch.push(record),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping rejected consumption record");
                    summary.rejected += 1;
                    continue;
                }
            }

            if batch.len() >= self.batch_size {
                self.write_with_retry(&batch).await?;
                summary.written += batch.len();
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.write_with_retry(&batch).await?;
            summary.written += batch.len();
        }

        Ok(summary)
    }

    async fn write_with_retry(&self, batch: &[ConsumptionRecord]) -> Result<(), IngestError> {
        let attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=attempts {
            match self.writer.write_batch(batch).await {
                Ok(()) => {
                    metrics::counter!("consumption_ingested_records_total").increment(batch.len() as u64);
                    return Ok(());
                }
                Err(e) if attempt < attempts => {
                    tracing::warn!(error = %e, attempt, batch = batch.len(), "consumption insert failed, retrying");
                    metrics::counter!("consumption_insert_retry_total").increment(1);
                    self.sleeper.sleep(self.retry.backoff).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, attempt, batch = batch.len(), "consumption insert failed, giving up");
                    metrics::counter!("consumption_sink_errors_total").increment(1);
                    return Err(IngestError::Write(e.to_string()));
                }
            }
        }

        Err(IngestError::Write("no write attempted".to_string()))
    }
}
