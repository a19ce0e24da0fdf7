//! Per-meter fan-out: fetch records, aggregate them into periods, resolve the
//! meter address, and merge everything into one [`AggregationResponse`].

pub mod collector;
pub mod response;

use std::{collections::BTreeSet, sync::Arc, time::Instant};

use crate::{
    address::AddressResolver,
    aggregate::{aggregate, InvalidPeriodKind, PeriodKind},
    storage::ConsumptionStore,
};

pub use collector::MeterResultCollector;
pub use response::{AggregationResponse, MeterResult, PeriodMark};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsumptionError {
    #[error(transparent)]
    InvalidPeriodKind(#[from] InvalidPeriodKind),
}

#[derive(Clone)]
pub struct ConsumptionService {
    store: Arc<dyn ConsumptionStore>,
    resolver: Arc<AddressResolver>,
}

impl ConsumptionService {
    pub fn new(store: Arc<dyn ConsumptionStore>, resolver: Arc<AddressResolver>) -> Self {
        Self { store, resolver }
    }

    /// Aggregate consumption for every meter in `meter_ids` over
    /// `[start_date, end_date]`.
    ///
    /// Only an unknown `kind_period` fails the call, and it does so before any
    /// storage or address work starts. A meter whose records cannot be fetched
    /// is left out of the response; an address that cannot be resolved is
    /// replaced by the fallback address.
    pub async fn get_consumption_by_period(
        &self,
        meter_ids: &[i64],
        start_date: &str,
        end_date: &str,
        kind_period: &str,
    ) -> Result<AggregationResponse, ConsumptionError> {
        let kind: PeriodKind = kind_period.parse()?;
        let started = Instant::now();
        metrics::counter!("consumption_requests_total").increment(1);

        let meters: BTreeSet<i64> = meter_ids.iter().copied().collect();
        let collector = Arc::new(MeterResultCollector::default());
        let mut joins = Vec::with_capacity(meters.len());

        for meter_id in meters {
            let store = self.store.clone();
            let resolver = self.resolver.clone();
            let collector = collector.clone();
            let start_date = start_date.to_string();
            let end_date = end_date.to_string();

            joins.push((
                meter_id,
                tokio::spawn(async move {
                    let records = match store.get_by_filters(meter_id, &start_date, &end_date).await {
                        Ok(records) => records,
                        Err(e) => {
                            tracing::error!(error = %e, meter_id, "failed to fetch consumption, dropping meter");
                            metrics::counter!("consumption_storage_errors_total").increment(1);
                            return;
                        }
                    };

                    let series = aggregate(&records, kind);
                    let address = resolver.resolve_address(meter_id).await;

                    collector.push(MeterResult::from_series(
                        meter_id,
                        address.address.clone(),
                        &series,
                    ));
                }),
            ));
        }

        for (meter_id, join) in joins {
            if let Err(e) = join.await {
                tracing::error!(error = %e, meter_id, "meter task failed, dropping meter");
                metrics::counter!("consumption_task_failures_total").increment(1);
            }
        }

        let response = collector.take_response();

        metrics::histogram!("consumption_request_latency_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(
            kind = %kind,
            requested = meter_ids.len(),
            returned = response.data_graph.len(),
            "consumption aggregated"
        );

        Ok(response)
    }
}
