//! Upstream map-data API.
//!
//! `HttpApi` talks to the real service; `MemoryApi` serves canned records
//! for tests and offline runs. Both return boxed futures so the trait stays
//! dyn-compatible.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use formats::{
    MunicipalityDetail, MunicipalitySummary, PrefectureScores, PrefectureSummary, RegionSummary,
    StatsSummary, normalize_code,
};
use layers::PolygonLayer;
use navigation::{FetchRequest, FetchResponse};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

use crate::config::DashboardConfig;

#[derive(Debug)]
pub struct ApiError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait DashboardApi: Send + Sync {
    fn regions(&self) -> BoxFuture<'_, Result<Vec<RegionSummary>, ApiError>>;

    fn prefectures(
        &self,
        region: Option<String>,
    ) -> BoxFuture<'_, Result<Vec<PrefectureSummary>, ApiError>>;

    fn municipalities(
        &self,
        prefecture: Option<String>,
        region: Option<String>,
    ) -> BoxFuture<'_, Result<Vec<MunicipalitySummary>, ApiError>>;

    fn municipality_detail(&self, code: String)
    -> BoxFuture<'_, Result<MunicipalityDetail, ApiError>>;

    fn stats(&self) -> BoxFuture<'_, Result<StatsSummary, ApiError>>;

    /// Prefecture aggregates keyed by 2-digit prefecture code.
    fn prefecture_scores(&self) -> BoxFuture<'_, Result<PrefectureScores, ApiError>>;

    /// Raw boundary payload for one corpus.
    fn boundary(&self, layer: PolygonLayer) -> BoxFuture<'_, Result<Bytes, ApiError>>;

    /// Performs the request behind a controller ticket.
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'_, Result<FetchResponse, ApiError>> {
        Box::pin(async move {
            match request {
                FetchRequest::Regions => self.regions().await.map(FetchResponse::Regions),
                FetchRequest::AllPrefectures => self
                    .prefectures(None)
                    .await
                    .map(FetchResponse::AllPrefectures),
                FetchRequest::Stats => self.stats().await.map(FetchResponse::Stats),
                FetchRequest::Prefectures { region } => self
                    .prefectures(Some(region))
                    .await
                    .map(FetchResponse::Prefectures),
                FetchRequest::Municipalities { prefecture, region } => self
                    .municipalities(Some(prefecture), region)
                    .await
                    .map(FetchResponse::Municipalities),
                FetchRequest::Detail { code } => self
                    .municipality_detail(code)
                    .await
                    .map(|d| FetchResponse::Detail(Box::new(d))),
            }
        })
    }
}

/// reqwest client for the upstream service.
pub struct HttpApi {
    base: String,
    prefecture_topology_url: String,
    municipality_geojson_url: String,
    client: reqwest::Client,
}

impl HttpApi {
    pub fn new(config: &DashboardConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.api_timeout)
            .build()
            .map_err(|e| ApiError::with_source("failed to build HTTP client", e))?;
        Ok(Self {
            base: config.api_base.trim_end_matches('/').to_string(),
            prefecture_topology_url: config.prefecture_topology_url.clone(),
            municipality_geojson_url: config.municipality_geojson_url.clone(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn get(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, ApiError> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| ApiError::with_source(format!("GET {url} failed"), e))?;
        if !resp.status().is_success() {
            return Err(ApiError::new(format!("GET {url}: HTTP {}", resp.status())));
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        self.get(&url, query)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ApiError::with_source(format!("GET {url}: invalid body"), e))
    }
}

fn optional_params<const N: usize>(
    pairs: [(&'static str, Option<String>); N],
) -> Vec<(&'static str, String)> {
    pairs
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
        .collect()
}

impl DashboardApi for HttpApi {
    fn regions(&self) -> BoxFuture<'_, Result<Vec<RegionSummary>, ApiError>> {
        Box::pin(async move { self.get_json("/api/v1/map/regions", &[]).await })
    }

    fn prefectures(
        &self,
        region: Option<String>,
    ) -> BoxFuture<'_, Result<Vec<PrefectureSummary>, ApiError>> {
        Box::pin(async move {
            let query = optional_params([("region", region)]);
            self.get_json("/api/v1/map/prefectures", &query).await
        })
    }

    fn municipalities(
        &self,
        prefecture: Option<String>,
        region: Option<String>,
    ) -> BoxFuture<'_, Result<Vec<MunicipalitySummary>, ApiError>> {
        Box::pin(async move {
            let query = optional_params([("prefecture", prefecture), ("region", region)]);
            self.get_json("/api/v1/map/municipalities", &query).await
        })
    }

    fn municipality_detail(
        &self,
        code: String,
    ) -> BoxFuture<'_, Result<MunicipalityDetail, ApiError>> {
        Box::pin(async move {
            self.get_json(&format!("/api/v1/map/municipality/{}", code.trim()), &[])
                .await
        })
    }

    fn stats(&self) -> BoxFuture<'_, Result<StatsSummary, ApiError>> {
        Box::pin(async move { self.get_json("/api/v1/map/stats", &[]).await })
    }

    fn prefecture_scores(&self) -> BoxFuture<'_, Result<PrefectureScores, ApiError>> {
        Box::pin(async move { self.get_json("/api/scores/by-prefecture", &[]).await })
    }

    fn boundary(&self, layer: PolygonLayer) -> BoxFuture<'_, Result<Bytes, ApiError>> {
        let url = match layer {
            PolygonLayer::Prefectures => self.prefecture_topology_url.clone(),
            PolygonLayer::Municipalities => self.municipality_geojson_url.clone(),
        };
        Box::pin(async move {
            self.get(&url, &[])
                .await?
                .bytes()
                .await
                .map_err(|e| ApiError::with_source(format!("GET {url}: failed to read body"), e))
        })
    }
}

/// Canned upstream data.
#[derive(Default)]
pub struct MemoryApi {
    regions: Vec<RegionSummary>,
    prefectures: Vec<PrefectureSummary>,
    municipalities: Vec<MunicipalitySummary>,
    details: BTreeMap<String, MunicipalityDetail>,
    stats: Option<StatsSummary>,
    scores: PrefectureScores,
    boundaries: BTreeMap<PolygonLayer, Bytes>,
    failing: RwLock<BTreeSet<String>>,
}

impl MemoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_regions(mut self, rows: Vec<RegionSummary>) -> Self {
        self.regions = rows;
        self
    }

    pub fn with_prefectures(mut self, rows: Vec<PrefectureSummary>) -> Self {
        self.prefectures = rows;
        self
    }

    pub fn with_municipalities(mut self, rows: Vec<MunicipalitySummary>) -> Self {
        self.municipalities = rows;
        self
    }

    pub fn with_detail(mut self, detail: MunicipalityDetail) -> Self {
        self.details
            .insert(normalize_code(&detail.summary.city_code), detail);
        self
    }

    pub fn with_stats(mut self, stats: StatsSummary) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn with_scores(mut self, scores: PrefectureScores) -> Self {
        self.scores = scores;
        self
    }

    pub fn with_boundary(mut self, layer: PolygonLayer, payload: impl Into<Bytes>) -> Self {
        self.boundaries.insert(layer, payload.into());
        self
    }

    /// Makes `endpoint` (`regions`, `prefectures`, `municipalities`,
    /// `detail`, `stats`, `scores`, or a layer source id) fail from now on.
    pub async fn fail_endpoint(&self, endpoint: &str) {
        self.failing.write().await.insert(endpoint.to_string());
    }

    async fn check(&self, endpoint: &str) -> Result<(), ApiError> {
        if self.failing.read().await.contains(endpoint) {
            return Err(ApiError::new(format!("{endpoint}: service unavailable")));
        }
        Ok(())
    }
}

impl DashboardApi for MemoryApi {
    fn regions(&self) -> BoxFuture<'_, Result<Vec<RegionSummary>, ApiError>> {
        Box::pin(async move {
            self.check("regions").await?;
            Ok(self.regions.clone())
        })
    }

    fn prefectures(
        &self,
        region: Option<String>,
    ) -> BoxFuture<'_, Result<Vec<PrefectureSummary>, ApiError>> {
        Box::pin(async move {
            self.check("prefectures").await?;
            Ok(self
                .prefectures
                .iter()
                .filter(|p| region.as_deref().is_none_or(|r| p.region == r))
                .cloned()
                .collect())
        })
    }

    fn municipalities(
        &self,
        prefecture: Option<String>,
        region: Option<String>,
    ) -> BoxFuture<'_, Result<Vec<MunicipalitySummary>, ApiError>> {
        Box::pin(async move {
            self.check("municipalities").await?;
            Ok(self
                .municipalities
                .iter()
                .filter(|m| prefecture.as_deref().is_none_or(|p| m.prefecture == p))
                .filter(|m| region.as_deref().is_none_or(|r| m.region.is_empty() || m.region == r))
                .cloned()
                .collect())
        })
    }

    fn municipality_detail(
        &self,
        code: String,
    ) -> BoxFuture<'_, Result<MunicipalityDetail, ApiError>> {
        Box::pin(async move {
            self.check("detail").await?;
            self.details
                .get(&normalize_code(&code))
                .cloned()
                .ok_or_else(|| ApiError::new(format!("municipality {code} not found")))
        })
    }

    fn stats(&self) -> BoxFuture<'_, Result<StatsSummary, ApiError>> {
        Box::pin(async move {
            self.check("stats").await?;
            self.stats
                .clone()
                .ok_or_else(|| ApiError::new("stats not available"))
        })
    }

    fn prefecture_scores(&self) -> BoxFuture<'_, Result<PrefectureScores, ApiError>> {
        Box::pin(async move {
            self.check("scores").await?;
            Ok(self.scores.clone())
        })
    }

    fn boundary(&self, layer: PolygonLayer) -> BoxFuture<'_, Result<Bytes, ApiError>> {
        Box::pin(async move {
            self.check(&format!("boundary/{}", layer.source_id())).await?;
            self.boundaries
                .get(&layer)
                .cloned()
                .ok_or_else(|| ApiError::new(format!("{} boundaries not found", layer.source_id())))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{DashboardApi, MemoryApi};
    use formats::PrefectureSummary;
    use layers::PolygonLayer;
    use navigation::{FetchRequest, FetchResponse};

    fn pref(name: &str, region: &str) -> PrefectureSummary {
        PrefectureSummary {
            prefecture: name.to_string(),
            region: region.to_string(),
            avg_score: None,
            avg_citizen: None,
            avg_promotion: None,
            avg_business: None,
            avg_education: None,
            avg_information: None,
            municipality_count: 0,
            total_population: None,
        }
    }

    #[tokio::test]
    async fn fetch_routes_requests_and_filters() {
        let api = MemoryApi::new().with_prefectures(vec![
            pref("東京都", "関東地方"),
            pref("大阪府", "近畿地方"),
        ]);
        let resp = api
            .fetch(FetchRequest::Prefectures {
                region: "近畿地方".to_string(),
            })
            .await
            .unwrap();
        let FetchResponse::Prefectures(rows) = resp else {
            panic!("wrong response variant");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].prefecture, "大阪府");

        let all = api.fetch(FetchRequest::AllPrefectures).await.unwrap();
        assert!(matches!(all, FetchResponse::AllPrefectures(rows) if rows.len() == 2));
    }

    #[tokio::test]
    async fn failing_endpoints_report_errors() {
        let api = MemoryApi::new().with_boundary(PolygonLayer::Prefectures, "{}");
        assert!(api.boundary(PolygonLayer::Prefectures).await.is_ok());
        api.fail_endpoint("prefectures").await;
        let err = api.boundary(PolygonLayer::Prefectures).await.unwrap_err();
        assert!(err.to_string().contains("unavailable"));
        assert!(api.boundary(PolygonLayer::Municipalities).await.is_err());
        assert!(api.fetch(FetchRequest::Stats).await.is_err());
    }
}
