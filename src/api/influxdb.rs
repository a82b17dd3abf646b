//! InfluxDB 3 client over the HTTP API.

mod point;
mod row;
pub mod sql;

use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

pub use self::{
    point::{FieldValue, Point},
    row::{Row, Scalar},
};
use crate::prelude::*;

/// Time-series store as consumed by the writer and the rollups.
pub trait Store {
    /// Run the SQL query and return all the rows.
    async fn query(&self, sql: &str) -> Result<Vec<Row>>;

    /// Write the points in a single batch.
    async fn write(&self, points: &[Point]) -> Result;

    async fn server_version(&self) -> Result<String>;
}

/// Classified store failures which callers match on.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Queried table or column does not exist yet.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("request rejected with {status}: {message}")]
    Rejected { status: StatusCode, message: String },
}

impl StoreError {
    /// InfluxDB does not give a dedicated error code to missing relations, only the message.
    pub fn from_response(status: StatusCode, message: String) -> Self {
        let lowercase = message.to_lowercase();
        if lowercase.contains("not found") || lowercase.contains("no field named") {
            Self::NotFound(message)
        } else {
            Self::Rejected { status, message }
        }
    }
}

/// Check whether the error means «the table or the column does not exist».
#[must_use]
pub fn is_not_found(error: &Error) -> bool {
    matches!(error.downcast_ref::<StoreError>(), Some(StoreError::NotFound(_)))
}

pub struct Client {
    inner: reqwest::Client,
    base_url: Url,
    database: String,
    token: String,
}

impl Client {
    #[instrument(skip_all, fields(base_url = %base_url, database = %database))]
    pub fn new(base_url: Url, database: String, token: String) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(concat!("sun2000-monitor/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { inner, base_url, database, token })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).with_context(|| format!("invalid endpoint `{path}`"))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(StoreError::from_response(status, message).into())
    }
}

impl Store for Client {
    #[instrument(skip_all, level = Level::DEBUG)]
    async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        #[derive(Serialize)]
        struct QueryRequest<'a> {
            db: &'a str,
            q: &'a str,
            format: &'a str,
        }

        debug!(sql, "querying…");
        let response = self
            .inner
            .post(self.endpoint("api/v3/query_sql")?)
            .bearer_auth(&self.token)
            .json(&QueryRequest { db: &self.database, q: sql, format: "json" })
            .send()
            .await
            .context("failed to send the query")?;
        let rows: Vec<serde_json::Map<String, serde_json::Value>> = Self::check(response)
            .await?
            .json()
            .await
            .context("failed to deserialize the query response")?;
        debug!(n_rows = rows.len(), "queried");
        Ok(rows.into_iter().map(Row::from).collect())
    }

    #[instrument(skip_all, fields(n_points = points.len()))]
    async fn write(&self, points: &[Point]) -> Result {
        if points.is_empty() {
            debug!("nothing to write");
            return Ok(());
        }
        let body = points.iter().map(Point::to_line).collect::<Result<Vec<_>>>()?.join("\n");
        let mut url = self.endpoint("api/v3/write_lp")?;
        url.query_pairs_mut()
            .append_pair("db", &self.database)
            .append_pair("precision", "nanosecond");
        let response = self
            .inner
            .post(url)
            .bearer_auth(&self.token)
            .body(body)
            .send()
            .await
            .context("failed to send the points")?;
        Self::check(response).await?;
        debug!("written");
        Ok(())
    }

    #[instrument(skip_all)]
    async fn server_version(&self) -> Result<String> {
        #[derive(Deserialize)]
        struct PingResponse {
            version: String,
        }

        let response = self
            .inner
            .get(self.endpoint("ping")?)
            .bearer_auth(&self.token)
            .send()
            .await
            .context("failed to ping the server")?;
        let ping: PingResponse = Self::check(response)
            .await?
            .json()
            .await
            .context("failed to deserialize the ping response")?;
        Ok(ping.version)
    }
}
