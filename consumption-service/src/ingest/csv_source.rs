use std::{fs::File, path::PathBuf};

use consumption_client::domain::ConsumptionRecord;
use csv::StringRecord;
use time::{format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime};

use super::{IngestError, RecordStream};

/// CSV source for `ConsumptionRecord`.
///
/// Expected header columns (by name):
/// - id (blank ids get a content-derived id)
/// - meter_id
/// - active_energy
/// - date (`YYYY-MM-DD HH:MM:SS+HH` or RFC3339)
/// - reactive_inductive, reactive_capacitive, exported_energy (optional, default 0)
///
/// Malformed rows are yielded as errors and the stream carries on.
pub struct ConsumptionCsvSource {
    path: PathBuf,
}

fn parse_ts(s: &str) -> Result<OffsetDateTime, IngestError> {
    let s = s.trim();
    OffsetDateTime::parse(
        s,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second][offset_hour sign:mandatory]"),
    )
    .or_else(|_| OffsetDateTime::parse(s, &Rfc3339))
    .map_err(|e| IngestError::Parse(format!("invalid date '{s}': {e}")))
}

fn parse_optional_f64(name: &str, s: Option<&str>) -> Result<f64, IngestError> {
    match s.map(str::trim) {
        None | Some("") => Ok(0.0),
        Some(v) => v
            .parse()
            .map_err(|e| IngestError::Parse(format!("invalid {name} '{v}': {e}"))),
    }
}

/// Stable id for rows that arrive without one.
fn derived_id(meter_id: i64, ts: OffsetDateTime, readings: [f64; 4]) -> String {
    let mut h = blake3::Hasher::new();
    h.update(&meter_id.to_le_bytes());
    h.update(&ts.unix_timestamp_nanos().to_le_bytes());
    for v in readings {
        h.update(&v.to_bits().to_le_bytes());
    }
    h.finalize().to_hex().to_string()
}

fn record_to_consumption(
    record: &StringRecord,
    headers: &StringRecord,
) -> Result<ConsumptionRecord, IngestError> {
    let column = |name: &str| -> Option<&str> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .and_then(|idx| record.get(idx))
    };
    let required = |name: &str| -> Result<&str, IngestError> {
        column(name).ok_or_else(|| IngestError::Parse(format!("missing column '{name}' in CSV record")))
    };

    let meter_str = required("meter_id")?;
    let meter_id: i64 = meter_str
        .trim()
        .parse()
        .map_err(|e| IngestError::Parse(format!("invalid meter_id '{meter_str}': {e}")))?;

    let active_str = required("active_energy")?;
    let active_energy: f64 = active_str
        .trim()
        .parse()
        .map_err(|e| IngestError::Parse(format!("invalid active_energy '{active_str}': {e}")))?;

    let ts = parse_ts(required("date")?)?;
    let reactive_inductive = parse_optional_f64("reactive_inductive", column("reactive_inductive"))?;
    let reactive_capacitive = parse_optional_f64("reactive_capacitive", column("reactive_capacitive"))?;
    let exported_energy = parse_optional_f64("exported_energy", column("exported_energy"))?;

    let id = match column("id").map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => derived_id(
            meter_id,
            ts,
            [active_energy, reactive_inductive, reactive_capacitive, exported_energy],
        ),
    };

    Ok(ConsumptionRecord {
        id,
        meter_id,
        ts,
        active_energy,
        reactive_inductive,
        reactive_capacitive,
        exported_energy,
    })
}

impl ConsumptionCsvSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Stream the file's rows. A file that cannot be opened yields a single
    /// error item.
    pub fn records(&self) -> RecordStream {
        // Blocking CSV reads inside one task; seeding runs as a standalone job.
        let path = self.path.clone();
        let s = async_stream::stream! {
            let file = match File::open(&path) {
                Ok(f) => f,
                Err(e) => {
                    yield Err(IngestError::Parse(format!("failed to open CSV file {}: {e}", path.display())));
                    return;
                }
            };
            let mut rdr = csv::Reader::from_reader(file);
            let headers = match rdr.headers() {
                Ok(h) => h.clone(),
                Err(e) => {
                    yield Err(IngestError::Parse(format!("failed to read CSV headers: {e}")));
                    return;
                }
            };

            for result in rdr.records() {
                let parsed = result
                    .map_err(|e| IngestError::Parse(format!("failed to read CSV record: {e}")))
                    .and_then(|record| record_to_consumption(&record, &headers));

                if parsed.is_err() {
                    metrics::counter!("consumption_csv_parse_errors_total").increment(1);
                }
                yield parsed;
            }
        };

        Box::pin(s)
    }
}
