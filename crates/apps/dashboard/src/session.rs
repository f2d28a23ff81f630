//! One dashboard session: controller, boundary cache, map engine and the
//! glue between them.

use std::collections::BTreeMap;

use diagnostics::{
    DiagnosticKind, MARKERS_WITHOUT_COORDINATES, RECONCILE_COLLISIONS,
    RECONCILE_FEATURES_WITHOUT_DATA, RECONCILE_UNMATCHED_RECORDS, STYLE_SKIPPED_MUTATIONS,
};
use formats::{PrefectureScores, PrefectureSummary};
use foundation::ListenerId;
use futures_util::StreamExt;
use futures_util::future::join_all;
use futures_util::stream::FuturesUnordered;
use layers::{Legend, PolygonLayer, ScoreColorMapper};
use navigation::{
    CodeReconciler, ColorLookup, Completion, FetchResponse, FetchTicket, NavigationDispatcher,
    NavigationError, ReconcileReport, ViewLevel, ViewLevelController,
};
use render::{
    CameraMove, DesiredStyle, EngineError, KEY_PROPERTY, MapEngine, MarkerSet, PointerEvent,
    RecordingEngine, StyleAdapter, municipality_markers, national_view, prefecture_markers,
    prefecture_view, region_markers, region_view,
};
use streaming::BoundaryDataCache;

use crate::api::{ApiError, DashboardApi};
use crate::config::DashboardConfig;

pub const LEGEND_TITLE: &str = "DXスコア";

/// Camera framing key; the detail overlay keeps the prefecture framing.
type Framing = (ViewLevel, Option<String>, Option<String>);

/// Owns everything one map view needs, with an explicit `init`/`teardown`
/// lifecycle.
pub struct MapSession<A: DashboardApi, E: MapEngine> {
    config: DashboardConfig,
    api: A,
    engine: E,
    mapper: ScoreColorMapper,
    controller: ViewLevelController,
    cache: BoundaryDataCache,
    adapter: StyleAdapter,
    dispatcher: NavigationDispatcher,
    scores: PrefectureScores,
    reports: BTreeMap<PolygonLayer, ReconcileReport>,
    framed: Option<Framing>,
    initialized: bool,
}

impl<A: DashboardApi, E: MapEngine> MapSession<A, E> {
    pub fn new(config: DashboardConfig, api: A, engine: E) -> Self {
        let mapper = ScoreColorMapper::for_kind(config.score_scale);
        let cache =
            BoundaryDataCache::new(config.prefecture_corpus(), config.municipality_corpus());
        let dispatcher = NavigationDispatcher::new(config.feature_fields());
        Self {
            config,
            api,
            engine,
            mapper,
            controller: ViewLevelController::new(),
            cache,
            adapter: StyleAdapter::new(),
            dispatcher,
            scores: PrefectureScores::new(),
            reports: BTreeMap::new(),
            framed: None,
            initialized: false,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn controller(&self) -> &ViewLevelController {
        &self.controller
    }

    pub fn cache(&self) -> &BoundaryDataCache {
        &self.cache
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn mapper(&self) -> &ScoreColorMapper {
        &self.mapper
    }

    pub fn legend(&self) -> Legend {
        Legend::for_mapper(LEGEND_TITLE, &self.mapper)
    }

    pub fn report(&self, layer: PolygonLayer) -> Option<&ReconcileReport> {
        self.reports.get(&layer)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Loads the national data set and both boundary corpora, installs the
    /// polygon layers that loaded and renders the national view. Fetch
    /// failures degrade the view instead of failing.
    pub async fn init(&mut self) -> Result<(), EngineError> {
        if self.initialized {
            return Ok(());
        }
        let tickets = self.controller.initial_requests();
        let loads: Vec<_> = PolygonLayer::ALL
            .into_iter()
            .filter_map(|layer| self.cache.begin_load(layer))
            .collect();

        let api = &self.api;
        let (summaries, boundaries, scores) = tokio::join!(
            join_all(tickets.into_iter().map(|t| async move {
                let result = api.fetch(t.request.clone()).await;
                (t, result)
            })),
            join_all(loads.into_iter().map(|ticket| async move {
                let result = api.boundary(ticket.layer()).await;
                (ticket, result)
            })),
            api.prefecture_scores(),
        );

        for (ticket, result) in summaries {
            settle(&mut self.controller, &ticket, result);
        }
        match scores {
            Ok(scores) => self.scores = scores,
            Err(e) => tracing::debug!(error = %e, "prefecture score aggregate unavailable"),
        }
        for (ticket, result) in boundaries {
            let layer = ticket.layer();
            let payload = result.and_then(|bytes| {
                String::from_utf8(bytes.to_vec())
                    .map_err(|e| ApiError::with_source("boundary payload is not UTF-8", e))
            });
            if let Err(e) = self.cache.complete_load(ticket, payload) {
                tracing::debug!(layer = layer.source_id(), "falling back to markers");
                self.controller
                    .diagnostics_mut()
                    .emit(DiagnosticKind::GeometryUnavailable, e.to_string());
            }
        }
        // Corpora resident from an earlier init are installed again too.
        for layer in PolygonLayer::ALL {
            if self.adapter.is_installed(layer) {
                continue;
            }
            if let Some(index) = self.cache.index(layer) {
                let data = index.to_source_value(KEY_PROPERTY);
                self.adapter.install(&mut self.engine, layer, data)?;
            }
        }

        self.initialized = true;
        tracing::info!(
            regions = self.controller.regions().len(),
            prefectures = self.controller.all_prefectures().len(),
            "session initialized"
        );
        self.refresh();
        Ok(())
    }

    /// Detaches listeners before removing the layers they target.
    pub fn teardown(&mut self) -> Result<(), EngineError> {
        self.dispatcher.detach(&mut self.engine)?;
        self.adapter.teardown(&mut self.engine)?;
        self.engine.set_markers(Vec::new());
        self.framed = None;
        self.initialized = false;
        tracing::info!("session torn down");
        Ok(())
    }

    pub async fn enter_region(&mut self, region: &str) -> Result<(), NavigationError> {
        let ticket = self.controller.enter_region(region)?;
        self.run(ticket).await;
        Ok(())
    }

    pub async fn enter_prefecture(&mut self, prefecture: &str) -> Result<(), NavigationError> {
        let ticket = self.controller.enter_prefecture(prefecture)?;
        self.run(ticket).await;
        Ok(())
    }

    pub async fn enter_municipality(&mut self, code: &str) -> Result<(), NavigationError> {
        let ticket = self.controller.enter_municipality(code)?;
        self.run(ticket).await;
        Ok(())
    }

    /// Walks a `region/prefecture/code` path, stopping at the first step the
    /// controller rejects. Steps taken before the rejection stay in effect.
    pub async fn drill(&mut self, path: &str) -> Result<(), NavigationError> {
        let mut steps = path.split('/').map(str::trim).filter(|s| !s.is_empty());
        if let Some(region) = steps.next() {
            self.enter_region(region).await?;
        }
        if let Some(prefecture) = steps.next() {
            self.enter_prefecture(prefecture).await?;
        }
        if let Some(code) = steps.next() {
            self.enter_municipality(code).await?;
        }
        Ok(())
    }

    pub async fn navigate_back(&mut self) -> Result<(), NavigationError> {
        let ticket = self.controller.navigate_back()?;
        self.run(ticket).await;
        Ok(())
    }

    /// Breadcrumb jump.
    pub async fn navigate_to(&mut self, level: ViewLevel) -> Result<(), NavigationError> {
        match self.controller.navigate_to(level)? {
            Some(ticket) => self.run(ticket).await,
            None => self.refresh(),
        }
        Ok(())
    }

    pub async fn close_detail(&mut self) -> Result<(), NavigationError> {
        let ticket = self.controller.close_detail()?;
        self.run(ticket).await;
        Ok(())
    }

    /// Routes one listener delivery from the engine.
    pub async fn dispatch(
        &mut self,
        listener: ListenerId,
        event: &PointerEvent,
    ) -> Result<(), NavigationError> {
        let ticket = self
            .dispatcher
            .handle(&mut self.engine, &mut self.controller, listener, event)?;
        if let Some(ticket) = ticket {
            self.run(ticket).await;
        }
        Ok(())
    }

    /// Performs several fetches at once, applying each as it completes.
    /// Superseded results are discarded by the controller.
    pub async fn execute(&mut self, tickets: Vec<FetchTicket>) -> Vec<Completion> {
        let api = &self.api;
        let controller = &mut self.controller;
        let mut pending: FuturesUnordered<_> = tickets
            .into_iter()
            .map(|t| async move {
                let result = api.fetch(t.request.clone()).await;
                (t, result)
            })
            .collect();
        let mut out = Vec::new();
        while let Some((ticket, result)) = pending.next().await {
            out.push(settle(controller, &ticket, result));
        }
        drop(pending);
        self.refresh();
        out
    }

    async fn run(&mut self, ticket: FetchTicket) {
        self.execute(vec![ticket]).await;
    }

    /// Re-derives the map from current state: polygon styles, marker
    /// fallback, camera and interaction binding.
    pub fn refresh(&mut self) {
        if !self.initialized {
            return;
        }
        let level = self.controller.level();
        let desired = self.desired_style(level);

        let report = self.adapter.apply(&mut self.engine, &desired);
        if report.skipped > 0 {
            self.controller
                .counters_mut()
                .add(STYLE_SKIPPED_MUTATIONS, report.skipped as u64);
        }

        let markers = self.fallback_markers(level);
        if markers.skipped > 0 {
            self.controller
                .counters_mut()
                .add(MARKERS_WITHOUT_COORDINATES, markers.skipped as u64);
        }
        self.engine.set_markers(markers.markers);

        self.frame(level);

        if let Err(e) = self.dispatcher.sync(&mut self.engine, level) {
            tracing::warn!(error = %e, "failed to bind map interaction");
        }
    }

    fn active_layer(level: ViewLevel) -> PolygonLayer {
        match level {
            ViewLevel::National | ViewLevel::Region => PolygonLayer::Prefectures,
            ViewLevel::Prefecture | ViewLevel::Municipality => PolygonLayer::Municipalities,
        }
    }

    fn desired_style(&mut self, level: ViewLevel) -> DesiredStyle {
        let layer = Self::active_layer(level);
        let Some(index) = self.cache.index(layer) else {
            return DesiredStyle::new();
        };
        let reconciler = CodeReconciler::new(&self.mapper);
        let lookup: ColorLookup = match layer {
            PolygonLayer::Prefectures => {
                let rows = self.prefecture_rows(level);
                reconciler.prefecture_lookup(&rows)
            }
            PolygonLayer::Municipalities => {
                reconciler.municipality_lookup(self.controller.municipalities())
            }
        };
        let report = CodeReconciler::reconcile(&lookup, index);
        let colors = lookup.colors_for_index(index);
        // A redraw of unchanged data is not a new join.
        if self.reports.get(&layer) != Some(&report) {
            record_report(&mut self.controller, layer, &report);
            self.reports.insert(layer, report);
        }

        let desired = DesiredStyle::new().show(layer, colors, self.mapper.no_data_color());
        match (layer, self.controller.selection().prefecture()) {
            (PolygonLayer::Municipalities, Some(prefecture)) => desired.filtered(
                layer,
                self.config.municipality_prefecture_field.clone(),
                prefecture,
            ),
            _ => desired,
        }
    }

    /// Prefecture rows colouring the prefecture layer. Missing averages
    /// fall back to the by-prefecture score aggregate.
    fn prefecture_rows(&self, level: ViewLevel) -> Vec<PrefectureSummary> {
        let region = self.controller.selection().region();
        let mut rows: Vec<PrefectureSummary> = match (level, region) {
            (ViewLevel::Region, Some(_)) if !self.controller.prefectures().is_empty() => {
                self.controller.prefectures().to_vec()
            }
            (ViewLevel::Region, Some(region)) => self
                .controller
                .all_prefectures()
                .iter()
                .filter(|p| p.region == region)
                .cloned()
                .collect(),
            _ => self.controller.all_prefectures().to_vec(),
        };
        for row in rows.iter_mut().filter(|r| r.avg_score.is_none()) {
            row.avg_score = self
                .scores
                .values()
                .find(|s| s.prefecture_name == row.prefecture)
                .and_then(|s| s.avg_score);
        }
        rows
    }

    fn fallback_markers(&self, level: ViewLevel) -> MarkerSet {
        if self.cache.is_available(Self::active_layer(level)) {
            return MarkerSet::default();
        }
        match level {
            ViewLevel::National => region_markers(self.controller.regions(), &self.mapper),
            ViewLevel::Region => {
                let rows = self.prefecture_rows(level);
                prefecture_markers(&rows, &self.mapper)
            }
            ViewLevel::Prefecture | ViewLevel::Municipality => {
                municipality_markers(self.controller.municipalities(), &self.mapper)
            }
        }
    }

    fn frame(&mut self, level: ViewLevel) {
        let selection = self.controller.selection();
        let framing_level = level.min(ViewLevel::Prefecture);
        let key: Framing = (
            framing_level,
            selection.region().map(str::to_string),
            selection.prefecture().map(str::to_string),
        );
        if self.framed.as_ref() == Some(&key) {
            return;
        }
        let target: Option<CameraMove> = match (framing_level, &key.1, &key.2) {
            (ViewLevel::National, _, _) => Some(national_view()),
            (ViewLevel::Region, Some(region), _) => region_view(region),
            (ViewLevel::Prefecture, _, Some(prefecture)) => {
                let geometry = self
                    .cache
                    .index(PolygonLayer::Prefectures)
                    .and_then(|i| i.bounds_for(prefecture));
                let points = self
                    .controller
                    .municipalities()
                    .iter()
                    .filter_map(|m| m.coordinates());
                prefecture_view(prefecture, geometry, points)
            }
            _ => None,
        };
        match target {
            Some(target) => {
                self.engine.move_camera(target);
                self.framed = Some(key);
            }
            None => tracing::debug!(level = %level, "no camera target"),
        }
    }
}

impl<A: DashboardApi> MapSession<A, RecordingEngine> {
    /// Feeds a synthetic pointer event through the engine's listeners.
    pub async fn simulate(&mut self, event: PointerEvent) -> Vec<Result<(), NavigationError>> {
        self.engine.emit(event);
        let mut out = Vec::new();
        for (listener, event) in self.engine.take_deliveries() {
            out.push(self.dispatch(listener, &event).await);
        }
        out
    }
}

fn settle(
    controller: &mut ViewLevelController,
    ticket: &FetchTicket,
    result: Result<FetchResponse, ApiError>,
) -> Completion {
    match result {
        Ok(response) => controller.apply(ticket.token, response),
        Err(e) => controller.fail(ticket.channel(), ticket.token, e),
    }
}

fn record_report(
    controller: &mut ViewLevelController,
    layer: PolygonLayer,
    report: &ReconcileReport,
) {
    let counters = controller.counters_mut();
    counters.add(RECONCILE_COLLISIONS, report.collisions as u64);
    counters.add(
        RECONCILE_UNMATCHED_RECORDS,
        report.unmatched_records.len() as u64,
    );
    counters.add(
        RECONCILE_FEATURES_WITHOUT_DATA,
        report.features_without_data.len() as u64,
    );
    if report.collisions > 0 {
        controller.diagnostics_mut().emit(
            DiagnosticKind::ReconcileCollision,
            format!(
                "{}: {} records shared a canonical key",
                layer.source_id(),
                report.collisions
            ),
        );
    }
}
