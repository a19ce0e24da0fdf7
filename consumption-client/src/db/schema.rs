use anyhow::Result;
use sqlx::PgPool;

const CREATE_CONSUMPTION_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS consumption (
            id                  TEXT PRIMARY KEY,
            meter_id            BIGINT NOT NULL,
            ts                  TIMESTAMPTZ NOT NULL,
            active_energy       DOUBLE PRECISION NOT NULL DEFAULT 0,
            reactive_inductive  DOUBLE PRECISION NOT NULL DEFAULT 0,
            reactive_capacitive DOUBLE PRECISION NOT NULL DEFAULT 0,
            exported_energy     DOUBLE PRECISION NOT NULL DEFAULT 0
        )"#;

const CREATE_METER_TS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS consumption_meter_id_ts_idx ON consumption (meter_id, ts)";

/// Statements run by [`ensure_consumption_schema`], in order.
pub fn consumption_schema() -> [&'static str; 2] {
    [CREATE_CONSUMPTION_TABLE, CREATE_METER_TS_INDEX]
}

/// Create the `consumption` table and its lookup index if they are missing.
///
/// Safe to call on every start-up.
pub async fn ensure_consumption_schema(pool: &PgPool) -> Result<()> {
    for statement in consumption_schema() {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
