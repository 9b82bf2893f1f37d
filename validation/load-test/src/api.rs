//! HTTP access to the TrackMe API.

use std::time::{Duration, Instant};

use anyhow::Context;
use reqwest::{header, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::TestConfig;

/// Thin wrapper over a pooled `reqwest::Client` rooted at `{host}{api_prefix}`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

/// Outcome of a single HTTP exchange.
///
/// A request that never got a complete response has `status == 0` and a
/// `transport_error`.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
    pub latency_us: u64,
    pub transport_error: Option<String>,
}

impl ApiClient {
    pub fn new(
        host: &str,
        api_prefix: &str,
        timeout: Duration,
        pool_size: usize,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(pool_size)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base: format!(
                "{}/{}",
                host.trim_end_matches('/'),
                api_prefix.trim_matches('/')
            ),
        })
    }

    pub fn from_config(config: &TestConfig) -> anyhow::Result<Self> {
        Self::new(
            &config.host,
            &config.api_prefix,
            config.request_timeout(),
            config.peak_users() as usize,
        )
    }

    /// Absolute URL of an API path such as `/clients`.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    pub async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
        token: Option<&str>,
    ) -> ApiResponse {
        let request = self.http.get(self.url(path)).query(query);
        self.execute(request, token).await
    }

    pub async fn post<B>(&self, path: &str, body: &B, token: Option<&str>) -> ApiResponse
    where
        B: Serialize + ?Sized + Sync,
    {
        let request = self.http.post(self.url(path)).json(body);
        self.execute(request, token).await
    }

    pub async fn put<B>(&self, path: &str, body: &B, token: Option<&str>) -> ApiResponse
    where
        B: Serialize + ?Sized + Sync,
    {
        let request = self.http.put(self.url(path)).json(body);
        self.execute(request, token).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> ApiResponse {
        let request = self.http.delete(self.url(path));
        self.execute(request, token).await
    }

    async fn execute(&self, request: RequestBuilder, token: Option<&str>) -> ApiResponse {
        let request = match token {
            Some(token) => request.header(header::AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        };
        let start = Instant::now();

        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                match response.text().await {
                    Ok(body) => ApiResponse {
                        status,
                        body,
                        latency_us: start.elapsed().as_micros() as u64,
                        transport_error: None,
                    },
                    // A truncated body is no response at all
                    Err(e) => ApiResponse {
                        status: 0,
                        body: String::new(),
                        latency_us: start.elapsed().as_micros() as u64,
                        transport_error: Some(format!(
                            "Failed to read {} response body: {}",
                            status, e
                        )),
                    },
                }
            }
            Err(e) => ApiResponse {
                status: 0,
                body: String::new(),
                latency_us: start.elapsed().as_micros() as u64,
                transport_error: Some(e.to_string()),
            },
        }
    }
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }

    /// The first `max` characters of the body, for failure messages.
    pub fn snippet(&self, max: usize) -> &str {
        match self.body.char_indices().nth(max) {
            Some((end, _)) => &self.body[..end],
            None => &self.body,
        }
    }

    pub fn bytes(&self) -> usize {
        self.body.len()
    }
}
