use serde::{Deserialize, Serialize};

/// Physical address of a meter as returned by the address service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(rename = "id")]
    pub meter_id: i64,
    pub address: String,
}

impl Address {
    pub const FALLBACK_TEXT: &'static str = "Address unavailable";

    /// Placeholder returned when the address service cannot be reached.
    pub fn fallback() -> Self {
        Self {
            meter_id: 0,
            address: Self::FALLBACK_TEXT.to_string(),
        }
    }
}
