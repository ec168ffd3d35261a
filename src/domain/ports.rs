use crate::domain::model::Provider;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// 上游端點
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// SPARQL endpoint, `?query=...&format=json`
    GraphQuery,
    /// Overpass `interpreter`, `?data=...`
    FilterInterpreter,
}

impl Endpoint {
    pub fn provider(&self) -> Provider {
        match self {
            Endpoint::GraphQuery => Provider::DbPedia,
            Endpoint::FilterInterpreter => Provider::Osm,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    Xml,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawResponse {
    Json(serde_json::Value),
    Xml(String),
}

/// Transport to the geodata providers. Implementations never retry or cache.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn send(&self, endpoint: Endpoint, query: &str, format: ResponseFormat)
        -> Result<RawResponse>;

    /// Best-effort "kill my queries" on the filter-query provider.
    async fn stop_queries(&self) -> Result<()>;
}

pub trait ConfigProvider: Send + Sync {
    fn graph_endpoint(&self) -> &str;
    fn filter_endpoint(&self) -> &str;
    fn query_timeout_seconds(&self) -> u64;
    fn request_timeout(&self) -> Duration;
}
