//! HTTP/JSON proxy for the remote poem service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::CurrentPoem,
    error::ServiceError,
    protocol::{
        CurrentPoemResponse, DailyPoemResponse, LastUpdateDateResponse, PoemCountResponse,
        CURRENT_POEM_PATH, DAILY_POEM_PATH, LAST_UPDATE_DATE_PATH, POEM_COUNT_PATH,
    },
};
use tracing::debug;
use url::Url;

use crate::{
    config::{with_trailing_slash, ClientSettings, ConfigError},
    PoemService,
};

const OP_CURRENT_POEM: &str = "get_current_poem";
const OP_POEM_COUNT: &str = "get_poem_count";
const OP_LAST_UPDATE_DATE: &str = "get_last_update_date";
const OP_DAILY_POEM: &str = "get_daily_poem";

pub struct HttpPoemService {
    http: Client,
    base_url: Url,
}

impl HttpPoemService {
    pub fn new(base_url: Url, timeout: Duration) -> reqwest::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: with_trailing_slash(base_url),
        })
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, ConfigError> {
        let base_url = settings.service_url()?;
        Ok(Self::new(base_url, settings.request_timeout)?)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, op: &'static str, path: &str) -> Result<Url, ServiceError> {
        self.base_url
            .join(path)
            .map_err(|err| ServiceError::unavailable(op, format!("invalid endpoint {path}: {err}")))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        op: &'static str,
        path: &str,
    ) -> Result<T, ServiceError> {
        let url = self.endpoint(op, path)?;
        debug!(op, %url, "poem service query");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| ServiceError::unavailable(op, err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = body_text(response).await;
            return Err(ServiceError::unavailable(op, format!("status {status}: {body}")));
        }
        decode(op, response).await
    }
}

async fn body_text(response: Response) -> String {
    response.text().await.unwrap_or_default()
}

async fn decode<T: DeserializeOwned>(
    op: &'static str,
    response: Response,
) -> Result<T, ServiceError> {
    response
        .json::<T>()
        .await
        .map_err(|err| ServiceError::unavailable(op, format!("malformed response: {err}")))
}

fn is_rejection(status: StatusCode) -> bool {
    status.is_client_error()
}

#[async_trait]
impl PoemService for HttpPoemService {
    async fn fetch_current_poem(&self) -> Result<CurrentPoem, ServiceError> {
        let body: CurrentPoemResponse = self.get_json(OP_CURRENT_POEM, CURRENT_POEM_PATH).await?;
        Ok(body.into())
    }

    async fn fetch_poem_count(&self) -> Result<u64, ServiceError> {
        self.get_json::<PoemCountResponse>(OP_POEM_COUNT, POEM_COUNT_PATH).await
    }

    async fn fetch_last_update_day_index(&self) -> Result<i64, ServiceError> {
        self.get_json::<LastUpdateDateResponse>(OP_LAST_UPDATE_DATE, LAST_UPDATE_DATE_PATH)
            .await
    }

    async fn regenerate(&self) -> Result<String, ServiceError> {
        let url = self.endpoint(OP_DAILY_POEM, DAILY_POEM_PATH)?;
        debug!(op = OP_DAILY_POEM, %url, "poem service write");
        let response = self
            .http
            .post(url)
            .send()
            .await
            .map_err(|err| ServiceError::unavailable(OP_DAILY_POEM, err.to_string()))?;

        let status = response.status();
        if is_rejection(status) {
            let body = body_text(response).await;
            return Err(ServiceError::rejected(OP_DAILY_POEM, status.as_u16(), body));
        }
        if !status.is_success() {
            let body = body_text(response).await;
            return Err(ServiceError::unavailable(
                OP_DAILY_POEM,
                format!("status {status}: {body}"),
            ));
        }
        decode::<DailyPoemResponse>(OP_DAILY_POEM, response).await
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
