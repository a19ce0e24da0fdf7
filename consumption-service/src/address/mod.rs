//! Meter address resolution: a remote lookup wrapped in a cache-aside
//! resolver with bounded retries and a fallback placeholder.

pub mod http;
pub mod resolver;

use std::time::Duration;

use consumption_client::domain::Address;

pub use http::HttpAddressLookup;
pub use resolver::{AddressResolver, RetryPolicy};

#[derive(thiserror::Error, Debug)]
pub enum LookupError {
    #[error("address service unreachable: {0}")]
    Transport(String),
    #[error("address service returned status {0}")]
    Status(u16),
    #[error("invalid address payload: {0}")]
    Decode(String),
}

/// Remote source of meter addresses.
#[async_trait::async_trait]
pub trait AddressLookup: Send + Sync {
    async fn lookup(&self, meter_id: i64) -> Result<Address, LookupError>;
}

/// Delay between lookup attempts. Swapped out in tests to avoid wall-clock waits.
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
