use std::time::Duration;

use consumption_client::domain::Address;

use super::{AddressLookup, LookupError};

/// Address lookup against `GET {base_url}/address/{meter_id}`.
pub struct HttpAddressLookup {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAddressLookup {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| LookupError::Transport(format!("failed to build http client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url_for(&self, meter_id: i64) -> String {
        format!("{}/address/{meter_id}", self.base_url)
    }
}

#[async_trait::async_trait]
impl AddressLookup for HttpAddressLookup {
    async fn lookup(&self, meter_id: i64) -> Result<Address, LookupError> {
        let resp = self
            .client
            .get(self.url_for(meter_id))
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        resp.json::<Address>()
            .await
            .map_err(|e| LookupError::Decode(e.to_string()))
    }
}
