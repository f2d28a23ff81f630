use foundation::{ListenerId, LonLatBounds};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    DuplicateSource(String),
    MissingSource(String),
    SourceInUse(String),
    DuplicateLayer(String),
    MissingLayer(String),
    UnknownListener(ListenerId),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::DuplicateSource(id) => write!(f, "source {id:?} already exists"),
            EngineError::MissingSource(id) => write!(f, "source {id:?} does not exist"),
            EngineError::SourceInUse(id) => write!(f, "source {id:?} still has layers"),
            EngineError::DuplicateLayer(id) => write!(f, "layer {id:?} already exists"),
            EngineError::MissingLayer(id) => write!(f, "layer {id:?} does not exist"),
            EngineError::UnknownListener(id) => write!(f, "listener {} is not attached", id.0),
        }
    }
}

impl std::error::Error for EngineError {}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LayerKind {
    Fill,
    Line,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub id: String,
    pub source: String,
    pub kind: LayerKind,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PointerKind {
    Click,
    HoverEnter,
    HoverLeave,
}

/// The feature under the pointer, as the engine reports it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRef {
    pub id: Option<String>,
    pub properties: Map<String, Value>,
}

impl FeatureRef {
    pub fn property_text(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub layer_id: String,
    pub feature: Option<FeatureRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CameraMove {
    FlyTo { center: [f64; 2], zoom: f64 },
    FitBounds { bounds: LonLatBounds, padding_px: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub position: [f64; 2],
    pub label: String,
    pub size_px: f64,
    pub color: foundation::Rgba,
}

/// Imperative surface of a slippy-map rendering engine.
///
/// Mutations on a missing layer return `EngineError::MissingLayer`; callers
/// check `has_layer` first and treat absence as a skip.
pub trait MapEngine {
    fn has_source(&self, id: &str) -> bool;
    fn add_source(&mut self, id: &str, data: Value) -> Result<(), EngineError>;
    fn set_source_data(&mut self, id: &str, data: Value) -> Result<(), EngineError>;
    fn remove_source(&mut self, id: &str) -> Result<(), EngineError>;

    fn has_layer(&self, id: &str) -> bool;
    fn add_layer(&mut self, spec: LayerSpec) -> Result<(), EngineError>;
    fn remove_layer(&mut self, id: &str) -> Result<(), EngineError>;

    fn set_paint_property(&mut self, layer: &str, name: &str, value: Value)
    -> Result<(), EngineError>;
    fn set_layout_property(
        &mut self,
        layer: &str,
        name: &str,
        value: Value,
    ) -> Result<(), EngineError>;
    fn set_filter(&mut self, layer: &str, filter: Option<Value>) -> Result<(), EngineError>;
    fn set_feature_state(
        &mut self,
        source: &str,
        feature_id: &str,
        key: &str,
        value: Value,
    ) -> Result<(), EngineError>;

    fn on(&mut self, layer: &str, kind: PointerKind) -> Result<ListenerId, EngineError>;
    fn off(&mut self, listener: ListenerId) -> Result<(), EngineError>;

    /// Starts a camera animation, interrupting any in progress.
    fn move_camera(&mut self, target: CameraMove);

    fn set_markers(&mut self, markers: Vec<Marker>);
}
