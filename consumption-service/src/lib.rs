pub mod address;
pub mod aggregate;
pub mod cache;
pub mod config;
pub mod consumption;
pub mod http;
pub mod ingest;
pub mod metrics_server;
pub mod observability;
pub mod storage;

pub use consumption::{AggregationResponse, ConsumptionError, ConsumptionService, MeterResult};
