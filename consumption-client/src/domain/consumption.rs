use time::OffsetDateTime;

/// One interval reading from a meter, as stored in the `consumption` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ConsumptionRecord {
    pub id: String,
    pub meter_id: i64,
    pub ts: OffsetDateTime,
    pub active_energy: f64,
    pub reactive_inductive: f64,
    pub reactive_capacitive: f64,
    pub exported_energy: f64,
}
