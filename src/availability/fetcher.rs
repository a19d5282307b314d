//! Client for the external Availability Service.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::models::CLOCK_TIME_FORMAT;

use super::models::{AvailabilityQuery, AvailableUnit, VehicleTypeSummary};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AvailabilityFetchError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("invalid response: {0}")]
    Decode(String),
}

impl AvailabilityFetchError {
    /// Returns true if the error is transient and a retry may succeed.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Http { status, .. } => *status == 429 || (500..=599).contains(status),
            Self::Decode(_) => false,
        }
    }
}

/// Query string sent to the Availability Service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityWireRequest {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_type_id: Option<String>,
    pub pickup_time: String,
    pub return_time: String,
}

impl From<&AvailabilityQuery> for AvailabilityWireRequest {
    fn from(query: &AvailabilityQuery) -> Self {
        Self {
            date_from: query.date_range.from,
            date_to: query.date_range.to,
            vehicle_type_id: query.vehicle_type_id.clone(),
            pickup_time: query.pickup_time.format(CLOCK_TIME_FORMAT).to_string(),
            return_time: query.return_time.format(CLOCK_TIME_FORMAT).to_string(),
        }
    }
}

/// Source of unit availability and the vehicle-type catalog.
#[async_trait]
pub trait AvailabilityFetcher: Send + Sync {
    /// Units matching the request, in the service's order.
    async fn fetch_units(
        &self,
        request: &AvailabilityWireRequest,
    ) -> Result<Vec<AvailableUnit>, AvailabilityFetchError>;

    async fn fetch_vehicle_types(&self) -> Result<Vec<VehicleTypeSummary>, AvailabilityFetchError>;
}

/// List responses come either bare or wrapped in `{ "data": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListResponse<T> {
    Bare(Vec<T>),
    Wrapped { data: Vec<T> },
}

impl<T> ListResponse<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            ListResponse::Bare(items) | ListResponse::Wrapped { data: items } => items,
        }
    }
}

/// `AvailabilityFetcher` backed by the backend's REST API
#[derive(Debug, Clone)]
pub struct HttpAvailabilityFetcher {
    http: Client,
    base_url: String,
}

impl HttpAvailabilityFetcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AvailabilityFetchError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("motorent-web/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AvailabilityFetchError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_list<T, Q>(&self, path: &str, query: Option<&Q>) -> Result<Vec<T>, AvailabilityFetchError>
    where
        T: for<'de> Deserialize<'de>,
        Q: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.http.get(&url);
        if let Some(query) = query {
            builder = builder.query(query);
        }

        let res = builder.send().await.map_err(map_reqwest_error)?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AvailabilityFetchError::Http {
                status: status.as_u16(),
                body,
            });
        }

        res.json::<ListResponse<T>>()
            .await
            .map(ListResponse::into_vec)
            .map_err(|e| AvailabilityFetchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AvailabilityFetcher for HttpAvailabilityFetcher {
    async fn fetch_units(
        &self,
        request: &AvailabilityWireRequest,
    ) -> Result<Vec<AvailableUnit>, AvailabilityFetchError> {
        self.get_list("/availability", Some(request)).await
    }

    async fn fetch_vehicle_types(&self) -> Result<Vec<VehicleTypeSummary>, AvailabilityFetchError> {
        self.get_list::<_, ()>("/vehicle-types", None).await
    }
}

fn map_reqwest_error(e: reqwest::Error) -> AvailabilityFetchError {
    if e.is_timeout() {
        AvailabilityFetchError::Timeout
    } else {
        AvailabilityFetchError::Transport(e.to_string())
    }
}
