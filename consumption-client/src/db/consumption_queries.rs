use anyhow::Result;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::domain::ConsumptionRecord;

const SELECT_CONSUMPTION: &str = r#"
        SELECT
            id,
            meter_id,
            ts,
            active_energy,
            reactive_inductive,
            reactive_capacitive,
            exported_energy
        FROM consumption"#;

/// Optional filters for [`consumption_by_filters`].
///
/// The time range is half-open: `start <= ts < end`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumptionFilter {
    pub meter_id: Option<i64>,
    pub range: Option<(OffsetDateTime, OffsetDateTime)>,
}

fn filter_query(filter: &ConsumptionFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::<Postgres>::new(SELECT_CONSUMPTION);
    let mut first = true;
    let mut push_clause = |builder: &mut QueryBuilder<'static, Postgres>| {
        builder.push(if first { " WHERE " } else { " AND " });
        first = false;
    };

    if let Some(meter_id) = filter.meter_id {
        push_clause(&mut builder);
        builder.push("meter_id = ").push_bind(meter_id);
    }
    if let Some((start, end)) = filter.range {
        push_clause(&mut builder);
        builder.push("ts >= ").push_bind(start);
        push_clause(&mut builder);
        builder.push("ts < ").push_bind(end);
    }

    builder.push(" ORDER BY ts");
    builder
}

/// Fetch time-ordered consumption records matching `filter`.
pub async fn consumption_by_filters(
    pool: &PgPool,
    filter: &ConsumptionFilter,
) -> Result<Vec<ConsumptionRecord>> {
    let rows = filter_query(filter)
        .build_query_as::<ConsumptionRecord>()
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Insert a batch of records with a single multi-row `INSERT`.
pub async fn insert_consumption_batch(pool: &PgPool, batch: &[ConsumptionRecord]) -> Result<()> {
    if batch.is_empty() {
        return Ok(());
    }

    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO consumption (id, meter_id, ts, active_energy, reactive_inductive, reactive_capacitive, exported_energy) ",
    );
    builder.push_values(batch, |mut b, r| {
        b.push_bind(r.id.clone())
            .push_bind(r.meter_id)
            .push_bind(r.ts)
            .push_bind(r.active_energy)
            .push_bind(r.reactive_inductive)
            .push_bind(r.reactive_capacitive)
            .push_bind(r.exported_energy);
    });

    builder.build().execute(pool).await?;
    Ok(())
}
