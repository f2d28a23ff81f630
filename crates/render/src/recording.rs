use std::collections::BTreeMap;

use foundation::ListenerId;
use serde_json::{Map, Value};

use crate::engine::{
    CameraMove, EngineError, LayerSpec, MapEngine, Marker, PointerEvent, PointerKind,
};

#[derive(Debug, Clone, PartialEq)]
pub struct LayerState {
    pub spec: LayerSpec,
    pub paint: BTreeMap<String, Value>,
    pub layout: BTreeMap<String, Value>,
    pub filter: Option<Value>,
}

/// Headless `MapEngine` that keeps everything in memory.
///
/// Pointer input is simulated with `emit`: every listener attached to the
/// event's layer and kind receives one delivery, queued until
/// `take_deliveries`.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    sources: BTreeMap<String, Value>,
    layers: BTreeMap<String, LayerState>,
    feature_state: BTreeMap<(String, String), Map<String, Value>>,
    listeners: BTreeMap<ListenerId, (String, PointerKind)>,
    next_listener: u64,
    deliveries: Vec<(ListenerId, PointerEvent)>,
    camera: Option<CameraMove>,
    camera_moves: usize,
    markers: Vec<Marker>,
    mutations: usize,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(&self, id: &str) -> Option<&Value> {
        self.sources.get(id)
    }

    pub fn layer(&self, id: &str) -> Option<&LayerState> {
        self.layers.get(id)
    }

    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.keys().map(String::as_str).collect()
    }

    pub fn paint(&self, layer: &str, name: &str) -> Option<&Value> {
        self.layers.get(layer).and_then(|l| l.paint.get(name))
    }

    pub fn layout(&self, layer: &str, name: &str) -> Option<&Value> {
        self.layers.get(layer).and_then(|l| l.layout.get(name))
    }

    pub fn feature_state(&self, source: &str, feature_id: &str) -> Option<&Map<String, Value>> {
        self.feature_state
            .get(&(source.to_string(), feature_id.to_string()))
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn listeners_on(&self, layer: &str) -> usize {
        self.listeners.values().filter(|(l, _)| l == layer).count()
    }

    /// Final camera target; earlier moves were interrupted.
    pub fn camera(&self) -> Option<&CameraMove> {
        self.camera.as_ref()
    }

    pub fn camera_moves(&self) -> usize {
        self.camera_moves
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// Successful style and data mutations so far.
    pub fn mutations(&self) -> usize {
        self.mutations
    }

    /// Simulates pointer input. Returns the number of listeners reached.
    pub fn emit(&mut self, event: PointerEvent) -> usize {
        let targets: Vec<ListenerId> = self
            .listeners
            .iter()
            .filter(|(_, (layer, kind))| *layer == event.layer_id && *kind == event.kind)
            .map(|(id, _)| *id)
            .collect();
        for id in &targets {
            self.deliveries.push((*id, event.clone()));
        }
        targets.len()
    }

    pub fn take_deliveries(&mut self) -> Vec<(ListenerId, PointerEvent)> {
        std::mem::take(&mut self.deliveries)
    }

    fn layer_mut(&mut self, id: &str) -> Result<&mut LayerState, EngineError> {
        self.layers
            .get_mut(id)
            .ok_or_else(|| EngineError::MissingLayer(id.to_string()))
    }
}

impl MapEngine for RecordingEngine {
    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn add_source(&mut self, id: &str, data: Value) -> Result<(), EngineError> {
        if self.sources.contains_key(id) {
            return Err(EngineError::DuplicateSource(id.to_string()));
        }
        self.sources.insert(id.to_string(), data);
        self.mutations += 1;
        Ok(())
    }

    fn set_source_data(&mut self, id: &str, data: Value) -> Result<(), EngineError> {
        let slot = self
            .sources
            .get_mut(id)
            .ok_or_else(|| EngineError::MissingSource(id.to_string()))?;
        *slot = data;
        self.mutations += 1;
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> Result<(), EngineError> {
        if self.layers.values().any(|l| l.spec.source == id) {
            return Err(EngineError::SourceInUse(id.to_string()));
        }
        self.sources
            .remove(id)
            .ok_or_else(|| EngineError::MissingSource(id.to_string()))?;
        self.feature_state.retain(|(source, _), _| source != id);
        Ok(())
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layers.contains_key(id)
    }

    fn add_layer(&mut self, spec: LayerSpec) -> Result<(), EngineError> {
        if self.layers.contains_key(&spec.id) {
            return Err(EngineError::DuplicateLayer(spec.id));
        }
        if !self.sources.contains_key(&spec.source) {
            return Err(EngineError::MissingSource(spec.source));
        }
        self.layers.insert(
            spec.id.clone(),
            LayerState {
                spec,
                paint: BTreeMap::new(),
                layout: BTreeMap::new(),
                filter: None,
            },
        );
        self.mutations += 1;
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), EngineError> {
        self.layers
            .remove(id)
            .ok_or_else(|| EngineError::MissingLayer(id.to_string()))?;
        Ok(())
    }

    fn set_paint_property(
        &mut self,
        layer: &str,
        name: &str,
        value: Value,
    ) -> Result<(), EngineError> {
        self.layer_mut(layer)?.paint.insert(name.to_string(), value);
        self.mutations += 1;
        Ok(())
    }

    fn set_layout_property(
        &mut self,
        layer: &str,
        name: &str,
        value: Value,
    ) -> Result<(), EngineError> {
        self.layer_mut(layer)?.layout.insert(name.to_string(), value);
        self.mutations += 1;
        Ok(())
    }

    fn set_filter(&mut self, layer: &str, filter: Option<Value>) -> Result<(), EngineError> {
        self.layer_mut(layer)?.filter = filter;
        self.mutations += 1;
        Ok(())
    }

    fn set_feature_state(
        &mut self,
        source: &str,
        feature_id: &str,
        key: &str,
        value: Value,
    ) -> Result<(), EngineError> {
        if !self.sources.contains_key(source) {
            return Err(EngineError::MissingSource(source.to_string()));
        }
        self.feature_state
            .entry((source.to_string(), feature_id.to_string()))
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn on(&mut self, layer: &str, kind: PointerKind) -> Result<ListenerId, EngineError> {
        if !self.layers.contains_key(layer) {
            return Err(EngineError::MissingLayer(layer.to_string()));
        }
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners.insert(id, (layer.to_string(), kind));
        Ok(id)
    }

    fn off(&mut self, listener: ListenerId) -> Result<(), EngineError> {
        self.listeners
            .remove(&listener)
            .map(|_| ())
            .ok_or(EngineError::UnknownListener(listener))
    }

    fn move_camera(&mut self, target: CameraMove) {
        self.camera = Some(target);
        self.camera_moves += 1;
    }

    fn set_markers(&mut self, markers: Vec<Marker>) {
        self.markers = markers;
    }
}

#[cfg(test)]
mod tests {
    use super::RecordingEngine;
    use crate::engine::{
        CameraMove, EngineError, LayerKind, LayerSpec, MapEngine, PointerEvent, PointerKind,
    };
    use serde_json::json;

    fn fill(id: &str, source: &str) -> LayerSpec {
        LayerSpec {
            id: id.to_string(),
            source: source.to_string(),
            kind: LayerKind::Fill,
        }
    }

    #[test]
    fn layers_need_their_source() {
        let mut engine = RecordingEngine::new();
        assert_eq!(
            engine.add_layer(fill("a-fill", "a")),
            Err(EngineError::MissingSource("a".to_string()))
        );
        engine.add_source("a", json!({})).unwrap();
        engine.add_layer(fill("a-fill", "a")).unwrap();
        assert!(engine.has_layer("a-fill"));
        assert!(engine.remove_source("a").is_err());
        engine.remove_layer("a-fill").unwrap();
        engine.remove_source("a").unwrap();
    }

    #[test]
    fn mutating_a_missing_layer_is_an_error() {
        let mut engine = RecordingEngine::new();
        let err = engine
            .set_paint_property("nope", "fill-color", json!("#000000"))
            .unwrap_err();
        assert_eq!(err, EngineError::MissingLayer("nope".to_string()));
        assert_eq!(engine.mutations(), 0);
    }

    #[test]
    fn events_reach_each_listener_once() {
        let mut engine = RecordingEngine::new();
        engine.add_source("a", json!({})).unwrap();
        engine.add_layer(fill("a-fill", "a")).unwrap();
        let click = engine.on("a-fill", PointerKind::Click).unwrap();
        engine.on("a-fill", PointerKind::HoverEnter).unwrap();

        let event = PointerEvent {
            kind: PointerKind::Click,
            layer_id: "a-fill".to_string(),
            feature: None,
        };
        assert_eq!(engine.emit(event.clone()), 1);
        let deliveries = engine.take_deliveries();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].0, click);

        engine.off(click).unwrap();
        assert_eq!(engine.emit(event), 0);
        assert!(engine.off(click).is_err());
    }

    #[test]
    fn latest_camera_move_supersedes() {
        let mut engine = RecordingEngine::new();
        engine.move_camera(CameraMove::FlyTo {
            center: [137.0, 38.0],
            zoom: 4.5,
        });
        engine.move_camera(CameraMove::FlyTo {
            center: [139.8, 35.8],
            zoom: 7.5,
        });
        assert_eq!(engine.camera_moves(), 2);
        assert_eq!(
            engine.camera(),
            Some(&CameraMove::FlyTo {
                center: [139.8, 35.8],
                zoom: 7.5
            })
        );
    }
}
