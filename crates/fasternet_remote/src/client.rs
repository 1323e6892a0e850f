use std::time::Duration;

use fasternet_core::error::AppError;
use serde::de::DeserializeOwned;
use tracing::debug;

pub const REST_PREFIX: &str = "/rest/v1";

/// Query string pairs, applied in order.
pub type QueryPairs = Vec<(&'static str, String)>;

/// Thin PostgREST client for the hosted store.
#[derive(Debug, Clone)]
pub struct RestClient {
    base_url: String,
    api_key: String,
    agent: ureq::Agent,
}

impl RestClient {
    /// Accepts `http(s)://host[:port]`; a trailing slash is trimmed.
    pub fn new(base_url: &str, api_key: &str, timeout_ms: u64) -> Result<Self, AppError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();

        let rest = base_url
            .strip_prefix("https://")
            .or_else(|| base_url.strip_prefix("http://"));
        match rest {
            Some(host) if !host.is_empty() && !host.contains(['/', '?', '#', '@', ' ']) => {}
            _ => {
                return Err(AppError::new(
                    "STORE_CONFIG_INVALID",
                    "Hosted store URL must be http(s)://host[:port]",
                )
                .with_details(format!("url={base_url}")));
            }
        }
        if api_key.trim().is_empty() {
            return Err(AppError::new(
                "STORE_CONFIG_INVALID",
                "Hosted store key is missing",
            ));
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_millis(timeout_ms))
            .build();

        Ok(Self {
            base_url,
            api_key: api_key.trim().to_string(),
            agent,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn table_url(&self, table: &str) -> String {
        format!("{}{REST_PREFIX}/{table}", self.base_url)
    }

    fn request(&self, method: &str, table: &str, query: &QueryPairs) -> ureq::Request {
        let mut req = self
            .agent
            .request(method, &self.table_url(table))
            .set("apikey", &self.api_key)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .set("Accept", "application/json");
        for (k, v) in query {
            req = req.query(k, v);
        }
        req
    }

    pub fn get<T: DeserializeOwned>(&self, table: &str, query: &QueryPairs) -> Result<T, AppError> {
        debug!(table, ?query, "GET");
        let resp = self.request("GET", table, query).call();
        decode(table, resp)
    }

    /// Write with `Prefer: return=representation`, so the store answers with the affected rows.
    pub fn write<T: DeserializeOwned>(
        &self,
        method: &str,
        table: &str,
        query: &QueryPairs,
        body: Option<serde_json::Value>,
    ) -> Result<T, AppError> {
        debug!(method, table, ?query, "write");
        let req = self
            .request(method, table, query)
            .set("Prefer", "return=representation");
        let resp = match body {
            Some(body) => req.send_json(body),
            None => req.call(),
        };
        decode(table, resp)
    }
}

fn decode<T: DeserializeOwned>(
    table: &str,
    resp: Result<ureq::Response, ureq::Error>,
) -> Result<T, AppError> {
    match resp {
        Ok(r) => r.into_json().map_err(|e| {
            AppError::new("STORE_DECODE_FAILED", "Failed to decode hosted store response")
                .with_details(format!("table={table}; err={e}"))
        }),
        Err(ureq::Error::Status(status, r)) => {
            let body = r.into_string().unwrap_or_default();
            Err(
                AppError::new("STORE_REQUEST_FAILED", "Hosted store rejected the request")
                    .with_details(format!("table={table}; status={status}; body={body}"))
                    .with_retryable(status >= 500 || status == 429),
            )
        }
        Err(e) => Err(AppError::new(
            "STORE_UNREACHABLE",
            "Failed to reach the hosted store",
        )
        .with_details(e.to_string())
        .with_retryable(true)),
    }
}

pub(crate) fn to_body<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, AppError> {
    serde_json::to_value(value).map_err(|e| {
        AppError::new("STORE_ENCODE_FAILED", "Failed to encode hosted store request")
            .with_details(e.to_string())
    })
}

pub(crate) fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}
