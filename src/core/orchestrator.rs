use crate::core::boundary::BoundaryResolver;
use crate::core::normalizer::{normalize_filter_response, normalize_graph_response};
use crate::core::query_builder::{build_filter_query, build_graph_query};
use crate::domain::model::{
    Coordinates, EntityRequest, FeatureCollection, FilterNormalization, Provider,
    SkippedElement, University,
};
use crate::domain::ports::{Endpoint, ProviderClient, RawResponse, ResponseFormat};
use crate::utils::error::{GeoError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    ResolvingBoundary,
    BoundaryReady,
    QueryingUniversities,
    Complete,
    Failed,
}

/// 呈現層可讀取的狀態
#[derive(Debug, Clone, Default, Serialize)]
pub struct PresentationState {
    pub center: Option<Coordinates>,
    pub boundary: Option<FeatureCollection>,
    pub graph_universities: Vec<University>,
    pub filter_universities: Vec<University>,
    pub filter_skipped: Vec<SkippedElement>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// 每個分支成功時為記錄筆數
pub type BranchOutcome = Result<usize>;

#[derive(Debug)]
pub struct LookupReport {
    pub graph: BranchOutcome,
    pub filter: BranchOutcome,
}

impl LookupReport {
    pub fn is_complete(&self) -> bool {
        self.graph.is_ok() && self.filter.is_ok()
    }

    pub fn failures(&self) -> Vec<(Provider, &GeoError)> {
        let mut failures = Vec::new();
        if let Err(e) = &self.graph {
            failures.push((Provider::DbPedia, e));
        }
        if let Err(e) = &self.filter {
            failures.push((Provider::Osm, e));
        }
        failures
    }
}

pub struct Orchestrator<C: ProviderClient> {
    client: C,
    query_timeout_seconds: u64,
    phase: Phase,
    phase_history: Vec<Phase>,
    state: PresentationState,
}

impl<C: ProviderClient> Orchestrator<C> {
    pub fn new(client: C, query_timeout_seconds: u64) -> Self {
        Self {
            client,
            query_timeout_seconds,
            phase: Phase::Idle,
            phase_history: Vec::new(),
            state: PresentationState::default(),
        }
    }

    /// 最近一次 `resolve_entity` 結束時的階段（`Complete` 或 `Failed`）
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// 最近一次 `resolve_entity` 依序經過的階段
    pub fn phases(&self) -> &[Phase] {
        &self.phase_history
    }

    pub fn state(&self) -> &PresentationState {
        &self.state
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// 解析邊界後並行查詢兩個來源。
    ///
    /// 邊界解析失敗時回傳錯誤，既有結果保持不變；否則回傳兩個分支各自的結果，
    /// 單一分支失敗不影響另一分支寫入。
    pub async fn resolve_entity(&mut self, request: &EntityRequest) -> Result<LookupReport> {
        tracing::info!(
            "🚀 Resolving {} ({}) at [{}, {}]",
            request.entity,
            request.city_name,
            request.center.lat,
            request.center.lon
        );
        self.state.center = Some(request.center);
        self.phase_history.clear();
        self.transition(Phase::ResolvingBoundary);

        let resolved = BoundaryResolver::new(&self.client)
            .resolve(&request.entity)
            .await;
        let boundary = match resolved {
            Ok(boundary) => boundary,
            Err(e) => {
                tracing::error!("❌ Boundary resolution failed: {} ({:?})", e, e.kind());
                self.transition(Phase::Failed);
                return Err(e);
            }
        };
        self.state.boundary = Some(boundary);
        self.transition(Phase::BoundaryReady);

        self.transition(Phase::QueryingUniversities);
        let (graph, filter) = tokio::join!(
            self.lookup_graph(&request.city_name),
            self.lookup_filter(&request.city_name)
        );

        // 各分支只覆寫自己的欄位
        let graph = graph.map(|universities| {
            let count = universities.len();
            self.state.graph_universities = universities;
            count
        });
        let filter = filter.map(|normalized| {
            let count = normalized.universities.len();
            self.state.filter_universities = normalized.universities;
            self.state.filter_skipped = normalized.skipped;
            count
        });

        let report = LookupReport { graph, filter };
        for (provider, e) in report.failures() {
            tracing::error!(
                "❌ {} lookup failed: {} ({:?})",
                provider,
                e,
                e.kind()
            );
            tracing::error!("💡 {}", e.recovery_suggestion());
        }

        self.state.resolved_at = Some(Utc::now());
        self.transition(if report.is_complete() {
            Phase::Complete
        } else {
            Phase::Failed
        });
        Ok(report)
    }

    async fn lookup_graph(&self, city_name: &str) -> Result<Vec<University>> {
        let query = build_graph_query(city_name);
        tracing::debug!("📡 DBpedia query: {}", query);

        let raw = self
            .client
            .send(Endpoint::GraphQuery, &query, ResponseFormat::Json)
            .await?;
        let RawResponse::Json(value) = raw else {
            return Err(GeoError::malformed(Provider::DbPedia, "expected JSON response"));
        };

        let universities = normalize_graph_response(&value)?;
        tracing::info!("🎓 DBpedia: {} universities in {}", universities.len(), city_name);
        Ok(universities)
    }

    async fn lookup_filter(&self, city_name: &str) -> Result<FilterNormalization> {
        let result = self.run_filter_query(city_name).await;

        if result.is_err() {
            tracing::warn!("🛑 Overpass lookup failed, asking provider to stop running queries");
            if let Err(e) = self.client.stop_queries().await {
                tracing::debug!("kill_my_queries failed: {}", e);
            }
        }

        result
    }

    async fn run_filter_query(&self, city_name: &str) -> Result<FilterNormalization> {
        let query = build_filter_query(city_name, self.query_timeout_seconds);
        tracing::debug!("📡 Overpass query: {}", query);

        let raw = self
            .client
            .send(Endpoint::FilterInterpreter, &query, ResponseFormat::Json)
            .await?;
        let RawResponse::Json(value) = raw else {
            return Err(GeoError::malformed(Provider::Osm, "expected JSON response"));
        };

        let normalized = normalize_filter_response(&value)?;
        tracing::info!(
            "🎓 OSM: {} universities in {} ({} elements skipped)",
            normalized.universities.len(),
            city_name,
            normalized.skipped.len()
        );
        Ok(normalized)
    }

    fn transition(&mut self, next: Phase) {
        tracing::debug!("Phase {:?} -> {:?}", self.phase, next);
        self.phase = next;
        self.phase_history.push(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{OsmEntity, OsmType};
    use crate::utils::error::ErrorKind;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const BOUNDARY_XML: &str = r#"<osm><node id="1" lat="45.75" lon="4.85"><tag k="name" v="Lyon"/></node></osm>"#;

    /// 依端點回傳預設回應的假 client
    struct MockClient {
        boundary: Mutex<Vec<Result<RawResponse>>>,
        graph: Mutex<Vec<Result<RawResponse>>>,
        filter: Mutex<Vec<Result<RawResponse>>>,
        stop_calls: AtomicUsize,
    }

    impl MockClient {
        fn new() -> Self {
            Self {
                boundary: Mutex::new(Vec::new()),
                graph: Mutex::new(Vec::new()),
                filter: Mutex::new(Vec::new()),
                stop_calls: AtomicUsize::new(0),
            }
        }

        fn with_boundary(self, response: Result<RawResponse>) -> Self {
            self.boundary.lock().unwrap().push(response);
            self
        }

        fn with_graph(self, response: Result<RawResponse>) -> Self {
            self.graph.lock().unwrap().push(response);
            self
        }

        fn with_filter(self, response: Result<RawResponse>) -> Self {
            self.filter.lock().unwrap().push(response);
            self
        }
    }

    #[async_trait]
    impl ProviderClient for MockClient {
        async fn send(
            &self,
            endpoint: Endpoint,
            query: &str,
            format: ResponseFormat,
        ) -> Result<RawResponse> {
            let queue = match (endpoint, format) {
                (Endpoint::GraphQuery, _) => &self.graph,
                (Endpoint::FilterInterpreter, ResponseFormat::Xml) => {
                    assert!(query.ends_with("(._;>;);out;"));
                    &self.boundary
                }
                (Endpoint::FilterInterpreter, ResponseFormat::Json) => &self.filter,
            };
            queue.lock().unwrap().remove(0)
        }

        async fn stop_queries(&self) -> Result<()> {
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn request() -> EntityRequest {
        EntityRequest {
            entity: OsmEntity::new(OsmType::Relation, 120965),
            city_name: "Lyon".to_string(),
            center: Coordinates::new(45.75, 4.85),
        }
    }

    fn graph_body(name: &str) -> RawResponse {
        RawResponse::Json(json!({
            "results": {"bindings": [
                {"univ": {"value": name}, "lat": {"value": "45.7"}, "long": {"value": "4.8"}}
            ]}
        }))
    }

    fn filter_body(name: &str) -> RawResponse {
        RawResponse::Json(json!({
            "elements": [{"lat": 45.7, "lon": 4.8, "tags": {"name": name}}]
        }))
    }

    fn not_found(provider: Provider) -> GeoError {
        GeoError::NotFound {
            provider,
            url: "http://test/".to_string(),
        }
    }

    #[tokio::test]
    async fn test_resolve_entity_success() {
        let client = MockClient::new()
            .with_boundary(Ok(RawResponse::Xml(BOUNDARY_XML.to_string())))
            .with_graph(Ok(graph_body("X University")))
            .with_filter(Ok(filter_body("Y University")));
        let mut orchestrator = Orchestrator::new(client, 60);
        assert_eq!(orchestrator.phase(), Phase::Idle);

        let report = orchestrator.resolve_entity(&request()).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(orchestrator.phase(), Phase::Complete);
        assert_eq!(
            orchestrator.phases(),
            &[
                Phase::ResolvingBoundary,
                Phase::BoundaryReady,
                Phase::QueryingUniversities,
                Phase::Complete,
            ]
        );
        let state = orchestrator.state();
        assert_eq!(state.center, Some(Coordinates::new(45.75, 4.85)));
        assert_eq!(state.boundary.as_ref().unwrap().len(), 1);
        assert_eq!(state.graph_universities[0].provider(), Provider::DbPedia);
        assert_eq!(state.filter_universities[0].provider(), Provider::Osm);
        assert!(state.resolved_at.is_some());
        assert_eq!(orchestrator.client().stop_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_boundary_failure_skips_lookups() {
        let client = MockClient::new().with_boundary(Err(not_found(Provider::Osm)));
        let mut orchestrator = Orchestrator::new(client, 60);

        let err = orchestrator.resolve_entity(&request()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(orchestrator.phase(), Phase::Failed);
        assert_eq!(orchestrator.phases(), &[Phase::ResolvingBoundary, Phase::Failed]);
        assert!(orchestrator.state().boundary.is_none());
        assert!(orchestrator.state().graph_universities.is_empty());
    }

    #[tokio::test]
    async fn test_graph_failure_keeps_filter_results() {
        let client = MockClient::new()
            .with_boundary(Ok(RawResponse::Xml(BOUNDARY_XML.to_string())))
            .with_graph(Err(not_found(Provider::DbPedia)))
            .with_filter(Ok(filter_body("Y University")));
        let mut orchestrator = Orchestrator::new(client, 60);

        let report = orchestrator.resolve_entity(&request()).await.unwrap();

        assert_eq!(report.graph.as_ref().unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(*report.filter.as_ref().unwrap(), 1);
        assert_eq!(orchestrator.phase(), Phase::Failed);
        assert_eq!(orchestrator.state().filter_universities.len(), 1);
        assert_eq!(orchestrator.client().stop_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_filter_failure_stops_queries_and_keeps_graph_results() {
        let client = MockClient::new()
            .with_boundary(Ok(RawResponse::Xml(BOUNDARY_XML.to_string())))
            .with_graph(Ok(graph_body("X University")))
            .with_filter(Err(GeoError::Transport {
                provider: Provider::Osm,
                message: "HTTP 504".to_string(),
            }));
        let mut orchestrator = Orchestrator::new(client, 60);

        let report = orchestrator.resolve_entity(&request()).await.unwrap();

        assert_eq!(report.filter.as_ref().unwrap_err().kind(), ErrorKind::Transport);
        assert_eq!(orchestrator.state().graph_universities.len(), 1);
        assert_eq!(orchestrator.client().stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.failures().len(), 1);
    }

    #[tokio::test]
    async fn test_results_are_overwritten_and_failures_keep_previous() {
        let client = MockClient::new()
            .with_boundary(Ok(RawResponse::Xml(BOUNDARY_XML.to_string())))
            .with_boundary(Ok(RawResponse::Xml(BOUNDARY_XML.to_string())))
            .with_graph(Ok(graph_body("First")))
            .with_graph(Ok(graph_body("Second")))
            .with_filter(Ok(filter_body("Kept")))
            .with_filter(Err(not_found(Provider::Osm)));
        let mut orchestrator = Orchestrator::new(client, 60);

        orchestrator.resolve_entity(&request()).await.unwrap();
        orchestrator.resolve_entity(&request()).await.unwrap();

        // 每次呼叫重新記錄階段
        assert_eq!(orchestrator.phases().len(), 4);
        assert_eq!(orchestrator.phases().last(), Some(&Phase::Failed));

        let state = orchestrator.state();
        assert_eq!(state.graph_universities.len(), 1);
        assert_eq!(state.graph_universities[0].name(), "Second");
        assert_eq!(state.filter_universities.len(), 1);
        assert_eq!(state.filter_universities[0].name(), "Kept");
    }

    #[tokio::test]
    async fn test_malformed_graph_binding_fails_branch() {
        let client = MockClient::new()
            .with_boundary(Ok(RawResponse::Xml(BOUNDARY_XML.to_string())))
            .with_graph(Ok(RawResponse::Json(json!({
                "results": {"bindings": [{"univ": {"value": "No coords"}}]}
            }))))
            .with_filter(Ok(filter_body("Y University")));
        let mut orchestrator = Orchestrator::new(client, 60);

        let report = orchestrator.resolve_entity(&request()).await.unwrap();

        assert_eq!(
            report.graph.as_ref().unwrap_err().kind(),
            ErrorKind::MalformedResponse
        );
        assert!(report.filter.is_ok());
    }
}
