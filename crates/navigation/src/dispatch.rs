use foundation::ListenerId;
use formats::canonical_geometry_code;
use layers::PolygonLayer;
use render::{
    EngineError, FeatureRef, HOVER_STATE, KEY_PROPERTY, MapEngine, PointerEvent, PointerKind,
};
use serde_json::Value;

use crate::controller::{FetchTicket, NavigationError, ViewLevelController};
use crate::level::ViewLevel;
use crate::reconcile::CodeReconciler;

/// What a polygon click does at a given level.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClickAction {
    /// Look up the clicked prefecture's region, then enter the region.
    ResolveRegion,
    EnterPrefecture,
    EnterMunicipality,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Binding {
    pub layer: PolygonLayer,
    pub click: ClickAction,
}

const BINDINGS: [(ViewLevel, Binding); 4] = [
    (
        ViewLevel::National,
        Binding {
            layer: PolygonLayer::Prefectures,
            click: ClickAction::ResolveRegion,
        },
    ),
    (
        ViewLevel::Region,
        Binding {
            layer: PolygonLayer::Prefectures,
            click: ClickAction::EnterPrefecture,
        },
    ),
    (
        ViewLevel::Prefecture,
        Binding {
            layer: PolygonLayer::Municipalities,
            click: ClickAction::EnterMunicipality,
        },
    ),
    (
        ViewLevel::Municipality,
        Binding {
            layer: PolygonLayer::Municipalities,
            click: ClickAction::EnterMunicipality,
        },
    ),
];

pub fn binding_for(level: ViewLevel) -> Binding {
    BINDINGS
        .iter()
        .find(|(l, _)| *l == level)
        .map(|(_, b)| *b)
        .unwrap_or(BINDINGS[0].1)
}

/// Feature properties the dispatcher reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureFields {
    pub prefecture_name: String,
    pub municipality_code: String,
}

impl Default for FeatureFields {
    fn default() -> Self {
        Self {
            prefecture_name: "nam_ja".to_string(),
            municipality_code: "N03_007".to_string(),
        }
    }
}

#[derive(Debug)]
struct Attached {
    binding: Binding,
    listeners: Vec<ListenerId>,
}

/// Routes pointer events on the active polygon layer into the controller.
///
/// Listeners live exactly as long as the layer binding: `sync` detaches
/// before rebinding and `detach` must run before the layer is removed.
#[derive(Debug, Default)]
pub struct NavigationDispatcher {
    fields: FeatureFields,
    attached: Option<Attached>,
    hovered: Option<(PolygonLayer, String)>,
}

impl NavigationDispatcher {
    pub fn new(fields: FeatureFields) -> Self {
        Self {
            fields,
            attached: None,
            hovered: None,
        }
    }

    pub fn attached_layer(&self) -> Option<PolygonLayer> {
        self.attached.as_ref().map(|a| a.binding.layer)
    }

    pub fn binding(&self) -> Option<Binding> {
        self.attached.as_ref().map(|a| a.binding)
    }

    pub fn owns(&self, listener: ListenerId) -> bool {
        self.attached
            .as_ref()
            .is_some_and(|a| a.listeners.contains(&listener))
    }

    /// Points the listeners at the layer `level` interacts with. A missing
    /// layer leaves the dispatcher detached.
    pub fn sync<E: MapEngine>(
        &mut self,
        engine: &mut E,
        level: ViewLevel,
    ) -> Result<(), EngineError> {
        let binding = binding_for(level);
        if let Some(attached) = self.attached.as_mut() {
            if attached.binding.layer == binding.layer {
                attached.binding = binding;
                return Ok(());
            }
        }
        self.detach(engine)?;

        let layer_id = binding.layer.fill_id();
        if !engine.has_layer(layer_id) {
            tracing::debug!(layer = layer_id, "layer absent; interaction not bound");
            return Ok(());
        }
        let mut listeners = Vec::with_capacity(3);
        for kind in [PointerKind::Click, PointerKind::HoverEnter, PointerKind::HoverLeave] {
            listeners.push(engine.on(layer_id, kind)?);
        }
        tracing::debug!(layer = layer_id, %level, "interaction bound");
        self.attached = Some(Attached { binding, listeners });
        Ok(())
    }

    /// Removes every listener and hover emphasis.
    pub fn detach<E: MapEngine>(&mut self, engine: &mut E) -> Result<(), EngineError> {
        self.clear_hover(engine);
        if let Some(attached) = self.attached.take() {
            for id in attached.listeners {
                engine.off(id)?;
            }
        }
        Ok(())
    }

    /// Handles one delivery. Clicks may transition the controller; hover
    /// only touches feature state.
    pub fn handle<E: MapEngine>(
        &mut self,
        engine: &mut E,
        controller: &mut ViewLevelController,
        listener: ListenerId,
        event: &PointerEvent,
    ) -> Result<Option<FetchTicket>, NavigationError> {
        if !self.owns(listener) {
            tracing::debug!(listener = listener.0, "event from a detached listener ignored");
            return Ok(None);
        }
        match event.kind {
            PointerKind::Click => self.click(controller, event),
            PointerKind::HoverEnter => {
                self.hover(engine, event);
                Ok(None)
            }
            PointerKind::HoverLeave => {
                self.clear_hover(engine);
                Ok(None)
            }
        }
    }

    fn click(
        &self,
        controller: &mut ViewLevelController,
        event: &PointerEvent,
    ) -> Result<Option<FetchTicket>, NavigationError> {
        let Some(binding) = self.binding() else {
            return Ok(None);
        };
        let Some(feature) = event.feature.as_ref() else {
            return Ok(None);
        };
        match binding.click {
            ClickAction::ResolveRegion => {
                let Some(name) = feature.property_text(&self.fields.prefecture_name) else {
                    return Ok(None);
                };
                let region = CodeReconciler::resolve_region(&name, controller.all_prefectures())
                    .map(str::to_string);
                match region {
                    Some(region) => controller.enter_region(&region).map(Some),
                    None => {
                        let err = NavigationError::UnresolvedRegion(name);
                        controller.record_rejection(&err);
                        Err(err)
                    }
                }
            }
            ClickAction::EnterPrefecture => {
                let Some(name) = feature.property_text(&self.fields.prefecture_name) else {
                    return Ok(None);
                };
                controller.enter_prefecture(&name).map(Some)
            }
            ClickAction::EnterMunicipality => {
                let Some(code) = self.municipality_key(feature) else {
                    return Ok(None);
                };
                controller.enter_municipality(&code).map(Some)
            }
        }
    }

    fn municipality_key(&self, feature: &FeatureRef) -> Option<String> {
        feature
            .property_text(KEY_PROPERTY)
            .or_else(|| {
                feature
                    .property_text(&self.fields.municipality_code)
                    .and_then(|raw| canonical_geometry_code(&raw))
            })
    }

    fn hover<E: MapEngine>(&mut self, engine: &mut E, event: &PointerEvent) {
        let Some(layer) = self.attached_layer() else {
            return;
        };
        let Some(id) = event.feature.as_ref().and_then(|f| f.id.clone()) else {
            return;
        };
        if self.hovered.as_ref().is_some_and(|(l, h)| *l == layer && *h == id) {
            return;
        }
        self.clear_hover(engine);
        if set_hover(engine, layer, &id, true) {
            self.hovered = Some((layer, id));
        }
    }

    fn clear_hover<E: MapEngine>(&mut self, engine: &mut E) {
        if let Some((layer, id)) = self.hovered.take() {
            set_hover(engine, layer, &id, false);
        }
    }
}

fn set_hover<E: MapEngine>(engine: &mut E, layer: PolygonLayer, id: &str, on: bool) -> bool {
    let source = layer.source_id();
    if !engine.has_source(source) {
        return false;
    }
    match engine.set_feature_state(source, id, HOVER_STATE, Value::Bool(on)) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(source, feature = id, error = %e, "hover state not applied");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ClickAction, FeatureFields, NavigationDispatcher, binding_for};
    use crate::controller::{FetchRequest, FetchResponse, NavigationError, ViewLevelController};
    use crate::level::ViewLevel;
    use formats::{MunicipalitySummary, PrefectureSummary, RegionSummary};
    use layers::PolygonLayer;
    use render::{FeatureRef, MapEngine, PointerEvent, PointerKind, RecordingEngine, StyleAdapter};
    use serde_json::{Map, Value, json};

    fn engine_with_layers() -> RecordingEngine {
        let mut engine = RecordingEngine::new();
        let mut adapter = StyleAdapter::new();
        for layer in PolygonLayer::ALL {
            adapter
                .install(&mut engine, layer, json!({"type": "FeatureCollection", "features": []}))
                .unwrap();
        }
        engine
    }

    fn controller() -> ViewLevelController {
        let mut c = ViewLevelController::new();
        let tickets = c.initial_requests();
        c.apply(
            tickets[0].token,
            FetchResponse::Regions(vec![RegionSummary {
                region: "関東".to_string(),
                avg_score: None,
                municipality_count: 0,
                prefecture_count: 1,
                total_population: None,
                prefectures: vec!["東京都".to_string()],
            }]),
        );
        c.apply(
            tickets[1].token,
            FetchResponse::AllPrefectures(vec![PrefectureSummary {
                prefecture: "東京都".to_string(),
                region: "関東".to_string(),
                avg_score: Some(80.0),
                avg_citizen: None,
                avg_promotion: None,
                avg_business: None,
                avg_education: None,
                avg_information: None,
                municipality_count: 1,
                total_population: None,
            }]),
        );
        c
    }

    fn event(kind: PointerKind, layer: PolygonLayer, id: &str, props: Value) -> PointerEvent {
        let properties: Map<String, Value> = props.as_object().cloned().unwrap_or_default();
        PointerEvent {
            kind,
            layer_id: layer.fill_id().to_string(),
            feature: Some(FeatureRef {
                id: Some(id.to_string()),
                properties,
            }),
        }
    }

    /// Emits `e` and dispatches every delivery it produced.
    fn fire(
        engine: &mut RecordingEngine,
        dispatcher: &mut NavigationDispatcher,
        controller: &mut ViewLevelController,
        e: PointerEvent,
    ) -> Vec<Result<Option<crate::FetchTicket>, NavigationError>> {
        engine.emit(e);
        engine
            .take_deliveries()
            .into_iter()
            .map(|(id, ev)| dispatcher.handle(engine, controller, id, &ev))
            .collect()
    }

    #[test]
    fn strategy_table() {
        assert_eq!(binding_for(ViewLevel::National).click, ClickAction::ResolveRegion);
        assert_eq!(binding_for(ViewLevel::Region).click, ClickAction::EnterPrefecture);
        assert_eq!(binding_for(ViewLevel::Prefecture).layer, PolygonLayer::Municipalities);
        assert_eq!(
            binding_for(ViewLevel::Municipality).click,
            ClickAction::EnterMunicipality
        );
    }

    #[test]
    fn clicks_drive_the_drill_down() {
        let mut engine = engine_with_layers();
        let mut c = controller();
        let mut d = NavigationDispatcher::new(FeatureFields::default());

        d.sync(&mut engine, c.level()).unwrap();
        let results = fire(
            &mut engine,
            &mut d,
            &mut c,
            event(
                PointerKind::Click,
                PolygonLayer::Prefectures,
                "東京都",
                json!({"nam_ja": "東京都"}),
            ),
        );
        assert_eq!(results.len(), 1);
        assert_eq!(c.level(), ViewLevel::Region);
        assert_eq!(c.selection().region(), Some("関東"));

        d.sync(&mut engine, c.level()).unwrap();
        fire(
            &mut engine,
            &mut d,
            &mut c,
            event(
                PointerKind::Click,
                PolygonLayer::Prefectures,
                "東京都",
                json!({"nam_ja": "東京都"}),
            ),
        );
        assert_eq!(c.level(), ViewLevel::Prefecture);
        let token = c.pending(crate::Channel::Municipalities).unwrap();
        c.apply(
            token,
            FetchResponse::Municipalities(vec![MunicipalitySummary {
                city_code: "131130".to_string(),
                city_name: "渋谷区".to_string(),
                prefecture: "東京都".to_string(),
                region: "関東".to_string(),
                population: None,
                latitude: None,
                longitude: None,
                total_score: Some(82.0),
                cat_citizen_services: None,
                cat_promotion_system: None,
                cat_business_dx: None,
                cat_education_dx: None,
                cat_information: None,
                pattern_id: None,
                pattern_name: None,
            }]),
        );

        d.sync(&mut engine, c.level()).unwrap();
        assert_eq!(engine.listeners_on("prefectures-fill"), 0);
        assert_eq!(engine.listeners_on("municipalities-fill"), 3);
        let results = fire(
            &mut engine,
            &mut d,
            &mut c,
            event(
                PointerKind::Click,
                PolygonLayer::Municipalities,
                "13113",
                json!({"N03_007": "13113"}),
            ),
        );
        let ticket = results.into_iter().next().unwrap().unwrap().unwrap();
        assert_eq!(ticket.request, FetchRequest::Detail { code: "131130".to_string() });
        assert_eq!(c.level(), ViewLevel::Municipality);
    }

    #[test]
    fn unresolved_region_blocks_the_step() {
        let mut engine = engine_with_layers();
        let mut c = controller();
        let mut d = NavigationDispatcher::new(FeatureFields::default());
        d.sync(&mut engine, c.level()).unwrap();

        let results = fire(
            &mut engine,
            &mut d,
            &mut c,
            event(
                PointerKind::Click,
                PolygonLayer::Prefectures,
                "x",
                json!({"nam_ja": "大阪府"}),
            ),
        );
        assert_eq!(
            results,
            vec![Err(NavigationError::UnresolvedRegion("大阪府".to_string()))]
        );
        assert_eq!(c.level(), ViewLevel::National);
    }

    #[test]
    fn hover_never_navigates() {
        let mut engine = engine_with_layers();
        let mut c = controller();
        let mut d = NavigationDispatcher::new(FeatureFields::default());
        d.sync(&mut engine, c.level()).unwrap();

        fire(
            &mut engine,
            &mut d,
            &mut c,
            event(
                PointerKind::HoverEnter,
                PolygonLayer::Prefectures,
                "東京都",
                json!({"nam_ja": "東京都"}),
            ),
        );
        assert_eq!(c.level(), ViewLevel::National);
        assert_eq!(
            engine.feature_state("prefectures", "東京都").unwrap()["hover"],
            json!(true)
        );

        fire(
            &mut engine,
            &mut d,
            &mut c,
            PointerEvent {
                kind: PointerKind::HoverLeave,
                layer_id: "prefectures-fill".to_string(),
                feature: None,
            },
        );
        assert_eq!(
            engine.feature_state("prefectures", "東京都").unwrap()["hover"],
            json!(false)
        );
        assert_eq!(c.level(), ViewLevel::National);
    }

    #[test]
    fn listeners_are_paired_with_the_layer() {
        let mut engine = engine_with_layers();
        let mut d = NavigationDispatcher::new(FeatureFields::default());
        d.sync(&mut engine, ViewLevel::National).unwrap();
        d.sync(&mut engine, ViewLevel::Region).unwrap();
        // Same layer: no rebinding, no duplicates.
        assert_eq!(engine.listener_count(), 3);

        d.sync(&mut engine, ViewLevel::Prefecture).unwrap();
        assert_eq!(engine.listener_count(), 3);
        assert_eq!(d.attached_layer(), Some(PolygonLayer::Municipalities));

        d.detach(&mut engine).unwrap();
        assert_eq!(engine.listener_count(), 0);
        assert_eq!(d.attached_layer(), None);
    }

    #[test]
    fn missing_layer_leaves_dispatcher_detached() {
        let mut engine = RecordingEngine::new();
        let mut d = NavigationDispatcher::new(FeatureFields::default());
        d.sync(&mut engine, ViewLevel::National).unwrap();
        assert_eq!(d.attached_layer(), None);
        assert!(!engine.has_layer("prefectures-fill"));
    }
}
