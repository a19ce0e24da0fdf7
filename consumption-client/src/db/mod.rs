pub mod consumption_queries;
pub mod schema;

pub use consumption_queries::{consumption_by_filters, insert_consumption_batch, ConsumptionFilter};
pub use schema::ensure_consumption_schema;
