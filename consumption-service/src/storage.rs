use consumption_client::{
    db::{consumption_by_filters, ConsumptionFilter},
    domain::ConsumptionRecord,
};
use sqlx::PgPool;
use time::{macros::format_description, Date, Duration};

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("query failed: {0}")]
    Query(String),
}

/// Read access to persisted consumption records.
#[async_trait::async_trait]
pub trait ConsumptionStore: Send + Sync {
    /// `meter_id == 0` disables the meter filter; an empty `start_date` or
    /// `end_date` disables the date filter. Dates are `YYYY-MM-DD` and the
    /// whole end day is included.
    async fn get_by_filters(
        &self,
        meter_id: i64,
        start_date: &str,
        end_date: &str,
    ) -> Result<Vec<ConsumptionRecord>, StorageError>;
}

pub fn parse_date(s: &str) -> Result<Date, StorageError> {
    Date::parse(s.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| StorageError::InvalidDate(s.to_string()))
}

/// Translate the string-typed filters into a [`ConsumptionFilter`].
pub fn build_filter(
    meter_id: i64,
    start_date: &str,
    end_date: &str,
) -> Result<ConsumptionFilter, StorageError> {
    let meter_id = (meter_id != 0).then_some(meter_id);

    let range = if start_date.trim().is_empty() || end_date.trim().is_empty() {
        None
    } else {
        let start = parse_date(start_date)?;
        let end = parse_date(end_date)?;
        let end_exclusive = end
            .checked_add(Duration::days(1))
            .ok_or_else(|| StorageError::InvalidDate(end_date.to_string()))?;
        Some((
            start.midnight().assume_utc(),
            end_exclusive.midnight().assume_utc(),
        ))
    };

    Ok(ConsumptionFilter { meter_id, range })
}

/// [`ConsumptionStore`] backed by the `consumption` table.
#[derive(Clone)]
pub struct PgConsumptionStore {
    pool: PgPool,
}

impl PgConsumptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConsumptionStore for PgConsumptionStore {
    async fn get_by_filters(
        &self,
        meter_id: i64,
        start_date: &str,
        end_date: &str,
    ) -> Result<Vec<ConsumptionRecord>, StorageError> {
        let filter = build_filter(meter_id, start_date, end_date)?;
        let started = std::time::Instant::now();

        let rows = consumption_by_filters(&self.pool, &filter)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        metrics::histogram!("storage_query_latency_seconds").record(started.elapsed().as_secs_f64());
        tracing::debug!(meter_id, rows = rows.len(), "fetched consumption records");
        Ok(rows)
    }
}
