use std::{collections::HashMap, fmt, str::FromStr};

use consumption_client::domain::ConsumptionRecord;
use time::{Date, Duration, Month, OffsetDateTime};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid kind_period: {0}")]
pub struct InvalidPeriodKind(pub String);

/// Bucketing strategy for a consumption series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodKind {
    Daily,
    Weekly,
    Monthly,
}

impl PeriodKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Derive the bucket label for `ts`, in the timestamp's own offset.
    ///
    /// - daily: `"Jun 3"` (no year, so the same day of different years collides)
    /// - weekly: `"May 28 - Jun 3"`, weeks start on Sunday
    /// - monthly: `"Jul 2023"`
    pub fn label(&self, ts: OffsetDateTime) -> String {
        let date = ts.date();
        match self {
            Self::Daily => day_label(date),
            Self::Weekly => {
                let offset = i64::from(date.weekday().number_days_from_sunday());
                let start = date.checked_sub(Duration::days(offset)).unwrap_or(date);
                let end = start.checked_add(Duration::days(6)).unwrap_or(start);
                format!("{} - {}", day_label(start), day_label(end))
            }
            Self::Monthly => format!("{} {:04}", month_abbrev(date.month()), date.year()),
        }
    }
}

impl FromStr for PeriodKind {
    type Err = InvalidPeriodKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(InvalidPeriodKind(other.to_string())),
        }
    }
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn day_label(date: Date) -> String {
    format!("{} {}", month_abbrev(date.month()), date.day())
}

fn month_abbrev(month: Month) -> &'static str {
    match month {
        Month::January => "Jan",
        Month::February => "Feb",
        Month::March => "Mar",
        Month::April => "Apr",
        Month::May => "May",
        Month::June => "Jun",
        Month::July => "Jul",
        Month::August => "Aug",
        Month::September => "Sep",
        Month::October => "Oct",
        Month::November => "Nov",
        Month::December => "Dec",
    }
}

/// Readings that share one period label, in the order they were appended.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PeriodBucket {
    pub label: String,
    earliest: Option<OffsetDateTime>,
    active: Vec<f64>,
    reactive_inductive: Vec<f64>,
    reactive_capacitive: Vec<f64>,
    exported: Vec<f64>,
}

impl PeriodBucket {
    fn new(label: String) -> Self {
        Self {
            label,
            ..Self::default()
        }
    }

    // The four series are only ever pushed together.
    fn push(&mut self, r: &ConsumptionRecord) {
        self.earliest = Some(self.earliest.map_or(r.ts, |e| e.min(r.ts)));
        self.active.push(r.active_energy);
        self.reactive_inductive.push(r.reactive_inductive);
        self.reactive_capacitive.push(r.reactive_capacitive);
        self.exported.push(r.exported_energy);
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Oldest timestamp seen in this bucket; `None` only while empty.
    pub fn earliest(&self) -> Option<OffsetDateTime> {
        self.earliest
    }

    pub fn active(&self) -> &[f64] {
        &self.active
    }

    pub fn reactive_inductive(&self) -> &[f64] {
        &self.reactive_inductive
    }

    pub fn reactive_capacitive(&self) -> &[f64] {
        &self.reactive_capacitive
    }

    pub fn exported(&self) -> &[f64] {
        &self.exported
    }
}

/// Label -> bucket mapping produced by [`aggregate`].
///
/// Lookup is by label; [`PeriodSeries::buckets`] exposes the first-seen order
/// of labels, which is the only order callers should depend on.
#[derive(Debug, Clone, Default)]
pub struct PeriodSeries {
    buckets: Vec<PeriodBucket>,
    by_label: HashMap<String, usize>,
}

impl PeriodSeries {
    pub fn get(&self, label: &str) -> Option<&PeriodBucket> {
        self.by_label.get(label).map(|&i| &self.buckets[i])
    }

    pub fn buckets(&self) -> &[PeriodBucket] {
        &self.buckets
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|b| b.label.as_str())
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn bucket_mut(&mut self, label: String) -> &mut PeriodBucket {
        let idx = match self.by_label.get(&label) {
            Some(&i) => i,
            None => {
                let i = self.buckets.len();
                self.by_label.insert(label.clone(), i);
                self.buckets.push(PeriodBucket::new(label));
                i
            }
        };
        &mut self.buckets[idx]
    }
}

/// Group `records` into period buckets.
///
/// Records are taken in the order given; nothing is filtered, sorted or
/// rounded.
pub fn aggregate(records: &[ConsumptionRecord], kind: PeriodKind) -> PeriodSeries {
    let mut series = PeriodSeries::default();
    for r in records {
        series.bucket_mut(kind.label(r.ts)).push(r);
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn record(ts: OffsetDateTime, active: f64) -> ConsumptionRecord {
        ConsumptionRecord {
            id: format!("r-{}", ts.unix_timestamp()),
            meter_id: 1,
            ts,
            active_energy: active,
            reactive_inductive: active / 2.0,
            reactive_capacitive: 0.0,
            exported_energy: 1.5,
        }
    }

    #[test]
    fn period_kind_parses_known_tags_only() {
        assert_eq!("daily".parse::<PeriodKind>(), Ok(PeriodKind::Daily));
        assert_eq!("weekly".parse::<PeriodKind>(), Ok(PeriodKind::Weekly));
        assert_eq!("monthly".parse::<PeriodKind>(), Ok(PeriodKind::Monthly));
        assert_eq!(
            "yearly".parse::<PeriodKind>(),
            Err(InvalidPeriodKind("yearly".to_string()))
        );
    }

    #[test]
    fn monthly_label_uses_short_month_and_year() {
        let ts = datetime!(2023-07-04 10:59:00 +00:00);
        assert_eq!(PeriodKind::Monthly.label(ts), "Jul 2023");
    }

    #[test]
    fn daily_label_has_unpadded_day() {
        assert_eq!(PeriodKind::Daily.label(datetime!(2023-06-03 10:59:00 UTC)), "Jun 3");
        assert_eq!(PeriodKind::Daily.label(datetime!(2023-12-25 00:00:00 UTC)), "Dec 25");
    }

    #[test]
    fn weekly_labels_split_consecutive_saturdays() {
        let first = PeriodKind::Weekly.label(datetime!(2023-06-03 10:59:00 UTC));
        let second = PeriodKind::Weekly.label(datetime!(2023-06-10 10:59:00 UTC));
        assert_eq!(first, "May 28 - Jun 3");
        assert_eq!(second, "Jun 4 - Jun 10");
    }

    #[test]
    fn weekly_label_for_sunday_starts_that_day() {
        let label = PeriodKind::Weekly.label(datetime!(2023-06-04 00:00:00 UTC));
        assert_eq!(label, "Jun 4 - Jun 10");
    }

    #[test]
    fn labels_follow_timestamp_offset() {
        // 2023-07-01 01:00 in +02:00 is still June in UTC.
        let ts = datetime!(2023-07-01 01:00:00 +02:00);
        assert_eq!(PeriodKind::Monthly.label(ts), "Jul 2023");
    }

    #[test]
    fn label_derivation_is_deterministic() {
        let ts = datetime!(2024-02-29 23:59:59 UTC);
        for kind in [PeriodKind::Daily, PeriodKind::Weekly, PeriodKind::Monthly] {
            assert_eq!(kind.label(ts), kind.label(ts));
        }
    }

    #[test]
    fn daily_buckets_collide_across_years() {
        let records = vec![
            record(datetime!(2022-06-03 08:00:00 UTC), 1.0),
            record(datetime!(2023-06-03 08:00:00 UTC), 2.0),
        ];
        let series = aggregate(&records, PeriodKind::Daily);
        assert_eq!(series.len(), 1);
        assert_eq!(series.get("Jun 3").map(|b| b.active().to_vec()), Some(vec![1.0, 2.0]));
    }

    #[test]
    fn values_are_appended_in_record_order() {
        let records = vec![
            record(datetime!(2023-06-10 08:00:00 UTC), 3.0),
            record(datetime!(2023-06-03 08:00:00 UTC), 1.0),
            record(datetime!(2023-06-08 08:00:00 UTC), 2.0),
        ];
        let series = aggregate(&records, PeriodKind::Weekly);

        let labels: Vec<&str> = series.labels().collect();
        assert_eq!(labels, vec!["Jun 4 - Jun 10", "May 28 - Jun 3"]);

        let june_week = series.get("Jun 4 - Jun 10").expect("bucket");
        assert_eq!(june_week.active(), &[3.0, 2.0]);
        assert_eq!(june_week.reactive_inductive(), &[1.5, 1.0]);
        assert_eq!(june_week.exported(), &[1.5, 1.5]);
    }

    #[test]
    fn bucket_tracks_earliest_timestamp() {
        let records = vec![
            record(datetime!(2023-06-10 08:00:00 UTC), 3.0),
            record(datetime!(2023-06-05 08:00:00 UTC), 1.0),
            record(datetime!(2023-06-08 08:00:00 UTC), 2.0),
        ];
        let series = aggregate(&records, PeriodKind::Monthly);
        let june = series.get("Jun 2023").expect("bucket");
        assert_eq!(june.earliest(), Some(datetime!(2023-06-05 08:00:00 UTC)));
    }

    #[test]
    fn series_lengths_stay_equal_per_bucket() {
        let records: Vec<_> = (0..40)
            .map(|d| record(datetime!(2023-01-01 12:00:00 UTC) + Duration::days(d * 3), d as f64))
            .collect();
        for kind in [PeriodKind::Daily, PeriodKind::Weekly, PeriodKind::Monthly] {
            let series = aggregate(&records, kind);
            let mut total = 0;
            for b in series.buckets() {
                assert_eq!(b.len(), b.reactive_inductive().len());
                assert_eq!(b.len(), b.reactive_capacitive().len());
                assert_eq!(b.len(), b.exported().len());
                total += b.len();
            }
            assert_eq!(total, records.len());
        }
    }

    #[test]
    fn empty_input_yields_empty_series() {
        let series = aggregate(&[], PeriodKind::Monthly);
        assert!(series.is_empty());
    }
}
