use crate::domain::model::Provider;
use crate::domain::ports::{ConfigProvider, Endpoint, ProviderClient, RawResponse, ResponseFormat};
use crate::utils::error::{GeoError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

/// reqwest 實作；每次呼叫都受 `request_timeout` 限制
pub struct HttpProviderClient {
    client: Client,
    sparql_endpoint: String,
    overpass_base: Url,
    request_timeout: Duration,
}

impl HttpProviderClient {
    pub fn new(sparql_endpoint: &str, overpass_endpoint: &str, request_timeout: Duration) -> Result<Self> {
        // Url::join 需要結尾斜線才會保留最後一段路徑
        let normalized = if overpass_endpoint.ends_with('/') {
            overpass_endpoint.to_string()
        } else {
            format!("{}/", overpass_endpoint)
        };
        let overpass_base = Url::parse(&normalized).map_err(|e| GeoError::InvalidConfigValueError {
            field: "overpass_endpoint".to_string(),
            value: overpass_endpoint.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client: Client::new(),
            sparql_endpoint: sparql_endpoint.to_string(),
            overpass_base,
            request_timeout,
        })
    }

    pub fn from_config<C: ConfigProvider>(config: &C) -> Result<Self> {
        Self::new(
            config.graph_endpoint(),
            config.filter_endpoint(),
            config.request_timeout(),
        )
    }

    fn overpass_url(&self, path: &str) -> Result<Url> {
        self.overpass_base
            .join(path)
            .map_err(|e| GeoError::ConfigError {
                message: format!("cannot build Overpass URL for '{}': {}", path, e),
            })
    }

    // 逾時由 reqwest 判斷，涵蓋連線、送出與讀取回應本文
    fn transport(&self, provider: Provider, e: reqwest::Error) -> GeoError {
        if e.is_timeout() {
            return GeoError::Timeout {
                provider,
                timeout: self.request_timeout,
            };
        }
        GeoError::Transport {
            provider,
            message: e.to_string(),
        }
    }

    async fn execute(
        &self,
        provider: Provider,
        url: String,
        params: Vec<(&str, &str)>,
        format: ResponseFormat,
    ) -> Result<RawResponse> {
        tracing::debug!("📡 GET {} ({:?})", url, format);
        let response = self
            .client
            .get(&url)
            .query(&params)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| self.transport(provider, e))?;

        let status = response.status();
        tracing::debug!("📡 {} response status: {}", provider, status);
        check_status(provider, &url, status)?;

        match format {
            ResponseFormat::Json => {
                let value: serde_json::Value =
                    response.json().await.map_err(|e| self.transport(provider, e))?;
                Ok(RawResponse::Json(value))
            }
            ResponseFormat::Xml => {
                let text = response.text().await.map_err(|e| self.transport(provider, e))?;
                Ok(RawResponse::Xml(text))
            }
        }
    }
}

fn check_status(provider: Provider, url: &str, status: StatusCode) -> Result<()> {
    if status == StatusCode::NOT_FOUND {
        return Err(GeoError::NotFound {
            provider,
            url: url.to_string(),
        });
    }
    if !status.is_success() {
        return Err(GeoError::Transport {
            provider,
            message: format!("HTTP {}", status),
        });
    }
    Ok(())
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn send(
        &self,
        endpoint: Endpoint,
        query: &str,
        format: ResponseFormat,
    ) -> Result<RawResponse> {
        let provider = endpoint.provider();
        let (url, params) = match endpoint {
            Endpoint::GraphQuery => (
                self.sparql_endpoint.clone(),
                vec![("query", query), ("format", "json")],
            ),
            Endpoint::FilterInterpreter => (
                self.overpass_url("interpreter")?.to_string(),
                vec![("data", query)],
            ),
        };

        self.execute(provider, url, params, format).await
    }

    async fn stop_queries(&self) -> Result<()> {
        let url = self.overpass_url("kill_my_queries")?.to_string();
        tracing::debug!("📡 GET {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| self.transport(Provider::Osm, e))?;
        check_status(Provider::Osm, &url, response.status())
    }
}
