use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::{consumption::ConsumptionService, storage::parse_date};

#[derive(Debug, Default, Deserialize)]
pub struct ConsumptionParams {
    #[serde(alias = "meters_ids")]
    pub meter_ids: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub kind_period: Option<String>,
}

/// A request that passed parameter validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumptionQuery {
    pub meter_ids: Vec<i64>,
    pub start_date: String,
    pub end_date: String,
    pub kind_period: String,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum BadRequest {
    #[error("meter_ids, start_date, end_date and kind_period are required")]
    MissingParams,
    #[error("invalid {0}, expected YYYY-MM-DD")]
    InvalidDate(&'static str),
    #[error("start_date must not be after end_date")]
    ReversedRange,
    #[error("invalid meter_ids, expected comma-separated integers")]
    InvalidMeterIds,
}

fn required(v: &Option<String>) -> Result<&str, BadRequest> {
    v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(BadRequest::MissingParams)
}

impl ConsumptionParams {
    pub fn validate(&self) -> Result<ConsumptionQuery, BadRequest> {
        let meter_ids = required(&self.meter_ids)?;
        let start_date = required(&self.start_date)?;
        let end_date = required(&self.end_date)?;
        let kind_period = required(&self.kind_period)?;

        let start = parse_date(start_date).map_err(|_| BadRequest::InvalidDate("start_date"))?;
        let end = parse_date(end_date).map_err(|_| BadRequest::InvalidDate("end_date"))?;
        if start > end {
            return Err(BadRequest::ReversedRange);
        }

        let meter_ids = meter_ids
            .split(',')
            .map(|id| id.trim().parse::<i64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| BadRequest::InvalidMeterIds)?;

        Ok(ConsumptionQuery {
            meter_ids,
            start_date: start_date.to_string(),
            end_date: end_date.to_string(),
            kind_period: kind_period.to_string(),
        })
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

async fn get_consumption(
    State(service): State<ConsumptionService>,
    params: Result<Query<ConsumptionParams>, QueryRejection>,
) -> Response {
    // Malformed query strings (e.g. both `meter_ids` and `meters_ids`) get the
    // same JSON error body as failed validation.
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => {
            metrics::counter!("http_consumption_bad_requests_total").increment(1);
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let query = match params.validate() {
        Ok(q) => q,
        Err(e) => {
            metrics::counter!("http_consumption_bad_requests_total").increment(1);
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    match service
        .get_consumption_by_period(
            &query.meter_ids,
            &query.start_date,
            &query.end_date,
            &query.kind_period,
        )
        .await
    {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            metrics::counter!("http_consumption_bad_requests_total").increment(1);
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

pub fn router(service: ConsumptionService) -> Router {
    Router::new()
        .route("/consumption", get(get_consumption))
        .route("/healthz", get(healthz))
        .with_state(service)
}
