use std::{collections::HashMap, sync::Mutex};

use time::OffsetDateTime;

use super::response::{AggregationResponse, MeterResult};

/// Append-only sink shared by the per-meter tasks of one request.
#[derive(Default)]
pub struct MeterResultCollector {
    results: Mutex<Vec<MeterResult>>,
}

impl MeterResultCollector {
    pub fn push(&self, result: MeterResult) {
        self.results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(result);
    }

    pub fn len(&self) -> usize {
        self.results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build the response: `data_graph` sorted by meter id, `period` the union
    /// of every meter's labels ordered by the oldest reading behind each label.
    ///
    /// Drains the collector; call once every producer has finished.
    pub fn take_response(&self) -> AggregationResponse {
        let mut data_graph = std::mem::take(
            &mut *self
                .results
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        data_graph.sort_by_key(|r| r.meter_id);

        let period = {
            let mut earliest: HashMap<&str, OffsetDateTime> = HashMap::new();
            for mark in data_graph.iter().flat_map(|r| r.periods.iter()) {
                earliest
                    .entry(mark.label.as_str())
                    .and_modify(|ts| *ts = (*ts).min(mark.earliest))
                    .or_insert(mark.earliest);
            }
            // Ties (same instant, different labels) fall back to the label.
            let mut labels: Vec<(OffsetDateTime, &str)> =
                earliest.into_iter().map(|(label, ts)| (ts, label)).collect();
            labels.sort_unstable();
            labels.into_iter().map(|(_, label)| label.to_string()).collect()
        };

        AggregationResponse { period, data_graph }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumption::response::PeriodMark;
    use time::macros::datetime;

    fn result(meter_id: i64, periods: &[(&str, OffsetDateTime)]) -> MeterResult {
        MeterResult {
            meter_id,
            address: format!("addr-{meter_id}"),
            active: vec![1.0; periods.len()],
            reactive_inductive: vec![0.0; periods.len()],
            reactive_capacitive: vec![0.0; periods.len()],
            exported: vec![0.0; periods.len()],
            periods: periods
                .iter()
                .map(|&(label, earliest)| PeriodMark {
                    label: label.to_string(),
                    earliest,
                })
                .collect(),
        }
    }

    const MAY: OffsetDateTime = datetime!(2023-05-02 00:00:00 UTC);
    const JUN: OffsetDateTime = datetime!(2023-06-02 00:00:00 UTC);
    const JUL: OffsetDateTime = datetime!(2023-07-02 00:00:00 UTC);

    #[test]
    fn response_is_sorted_by_meter_id() {
        let collector = MeterResultCollector::default();
        collector.push(result(3, &[("Jun 2023", JUN)]));
        collector.push(result(1, &[("Jun 2023", JUN)]));
        collector.push(result(2, &[("Jun 2023", JUN)]));

        let response = collector.take_response();
        let ids: Vec<i64> = response.data_graph.iter().map(|r| r.meter_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn period_is_deduplicated_union_of_labels() {
        let collector = MeterResultCollector::default();
        collector.push(result(2, &[("Jun 2023", JUN), ("Jul 2023", JUL)]));
        collector.push(result(1, &[("May 2023", MAY), ("Jun 2023", JUN)]));
        collector.push(result(3, &[]));

        let response = collector.take_response();
        assert_eq!(response.period, vec!["May 2023", "Jun 2023", "Jul 2023"]);
    }

    #[test]
    fn period_is_chronological_even_when_lower_meter_starts_later() {
        let collector = MeterResultCollector::default();
        collector.push(result(1, &[("Jul 2023", JUL)]));
        collector.push(result(2, &[("Jun 2023", JUN), ("Jul 2023", JUL)]));

        let response = collector.take_response();
        assert_eq!(response.period, vec!["Jun 2023", "Jul 2023"]);
    }

    #[test]
    fn label_is_placed_by_its_oldest_reading_across_meters() {
        // Daily labels carry no year, so "Jun 3" can hold 2022 and 2023 readings.
        let collector = MeterResultCollector::default();
        collector.push(result(1, &[("Jun 1", datetime!(2023-06-01 00:00:00 UTC))]));
        collector.push(result(2, &[("Jun 3", datetime!(2022-06-03 00:00:00 UTC))]));

        let response = collector.take_response();
        assert_eq!(response.period, vec!["Jun 3", "Jun 1"]);
    }

    #[test]
    fn empty_collector_yields_empty_response() {
        let collector = MeterResultCollector::default();
        assert!(collector.is_empty());
        assert_eq!(collector.take_response(), AggregationResponse::default());
    }

    #[test]
    fn take_response_drains_results() {
        let collector = MeterResultCollector::default();
        collector.push(result(1, &[("Jun 2023", JUN)]));
        assert_eq!(collector.take_response().data_graph.len(), 1);
        assert!(collector.is_empty());
    }
}
