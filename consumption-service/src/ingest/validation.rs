use consumption_client::domain::ConsumptionRecord;
use futures::StreamExt;
use time::macros::datetime;

use super::{IngestError, RecordStream};

/// Reject records that cannot be meter readings.
///
/// Rules:
/// - id must not be empty.
/// - all four readings must be finite and non-negative.
/// - ts must be within a broad sanity window [2000-01-01, 2100-01-01].
pub fn validate_consumption(r: &ConsumptionRecord) -> Result<(), IngestError> {
    if r.id.trim().is_empty() {
        return Err(IngestError::Invalid("id must not be empty".to_string()));
    }

    let readings = [
        ("active_energy", r.active_energy),
        ("reactive_inductive", r.reactive_inductive),
        ("reactive_capacitive", r.reactive_capacitive),
        ("exported_energy", r.exported_energy),
    ];
    for (name, value) in readings {
        if !value.is_finite() || value < 0.0 {
            return Err(IngestError::Invalid(format!(
                "{name} must be a non-negative number (record {})",
                r.id
            )));
        }
    }

    if r.ts < datetime!(2000-01-01 00:00:00 UTC) || r.ts > datetime!(2100-01-01 00:00:00 UTC) {
        return Err(IngestError::Invalid(format!(
            "timestamp out of allowed range (record {})",
            r.id
        )));
    }

    Ok(())
}

/// Turn records failing [`validate_consumption`] into `Err` items.
pub fn validated(records: RecordStream) -> RecordStream {
    Box::pin(records.map(|item| -> Result<ConsumptionRecord, IngestError> {
        let record = item?;
        validate_consumption(&record).inspect_err(|_| {
            metrics::counter!("validation_consumption_rejected_total").increment(1);
        })?;
        Ok(record)
    }))
}
