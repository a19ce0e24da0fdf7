use serde::Serialize;
use time::OffsetDateTime;

use crate::aggregate::PeriodSeries;

/// A period label plus the oldest reading filed under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodMark {
    pub label: String,
    pub earliest: OffsetDateTime,
}

/// One meter's contribution to an [`AggregationResponse`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterResult {
    pub meter_id: i64,
    pub address: String,
    pub active: Vec<f64>,
    pub reactive_inductive: Vec<f64>,
    pub reactive_capacitive: Vec<f64>,
    pub exported: Vec<f64>,
    #[serde(skip)]
    pub periods: Vec<PeriodMark>,
}

impl MeterResult {
    /// Flatten `series` bucket by bucket, in first-seen label order.
    pub fn from_series(meter_id: i64, address: String, series: &PeriodSeries) -> Self {
        let mut result = Self {
            meter_id,
            address,
            active: Vec::new(),
            reactive_inductive: Vec::new(),
            reactive_capacitive: Vec::new(),
            exported: Vec::new(),
            periods: Vec::with_capacity(series.len()),
        };

        for bucket in series.buckets() {
            if let Some(earliest) = bucket.earliest() {
                result.periods.push(PeriodMark {
                    label: bucket.label.clone(),
                    earliest,
                });
            }
            result.active.extend_from_slice(bucket.active());
            result.reactive_inductive.extend_from_slice(bucket.reactive_inductive());
            result.reactive_capacitive.extend_from_slice(bucket.reactive_capacitive());
            result.exported.extend_from_slice(bucket.exported());
        }

        result
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregationResponse {
    pub period: Vec<String>,
    pub data_graph: Vec<MeterResult>,
}
