use std::collections::{BTreeMap, HashMap};

use foundation::LonLatBounds;
use formats::{FeatureCollection, canonical_geometry_code, topology_to_features};
use layers::PolygonLayer;

use crate::residency::ResidencyState;

/// Wire encoding of a boundary corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadFormat {
    /// TopoJSON; `object` names the geometry object, `None` takes the first.
    Topology { object: Option<String> },
    GeoJson,
}

/// How a feature's key property is turned into a lookup key.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum KeyStyle {
    /// Trimmed text, e.g. a prefecture name.
    Name,
    /// Zero-padded canonical 5-digit municipality code.
    MunicipalityCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusSpec {
    pub format: PayloadFormat,
    pub key_field: String,
    pub key_style: KeyStyle,
}

impl CorpusSpec {
    pub fn prefectures(name_field: impl Into<String>) -> Self {
        Self {
            format: PayloadFormat::Topology { object: None },
            key_field: name_field.into(),
            key_style: KeyStyle::Name,
        }
    }

    pub fn municipalities(code_field: impl Into<String>) -> Self {
        Self {
            format: PayloadFormat::GeoJson,
            key_field: code_field.into(),
            key_style: KeyStyle::MunicipalityCode,
        }
    }

    fn key_of(&self, raw: &str) -> Option<String> {
        match self.key_style {
            KeyStyle::Name => {
                let name = raw.trim();
                (!name.is_empty()).then(|| name.to_string())
            }
            KeyStyle::MunicipalityCode => canonical_geometry_code(raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryError {
    Fetch { layer: PolygonLayer, message: String },
    Decode { layer: PolygonLayer, message: String },
    NotRequested { layer: PolygonLayer },
}

impl std::fmt::Display for BoundaryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundaryError::Fetch { layer, message } => {
                write!(f, "{} boundaries: fetch failed: {message}", layer.source_id())
            }
            BoundaryError::Decode { layer, message } => {
                write!(f, "{} boundaries: decode failed: {message}", layer.source_id())
            }
            BoundaryError::NotRequested { layer } => {
                write!(f, "{} boundaries: no load in flight", layer.source_id())
            }
        }
    }
}

impl std::error::Error for BoundaryError {}

/// Decoded corpus plus a key index over it.
///
/// One key may own several features (an island split into separate
/// polygons); all of them are returned by `lookup`.
#[derive(Debug, Clone, Default)]
pub struct BoundaryIndex {
    collection: FeatureCollection,
    keys: Vec<Option<String>>,
    by_key: HashMap<String, Vec<usize>>,
    unkeyed: usize,
}

impl BoundaryIndex {
    pub fn build(collection: FeatureCollection, spec: &CorpusSpec) -> Self {
        let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();
        let mut keys = Vec::with_capacity(collection.len());
        let mut unkeyed = 0;
        for (i, feature) in collection.features.iter().enumerate() {
            let key = feature
                .property_text(&spec.key_field)
                .and_then(|raw| spec.key_of(&raw));
            match &key {
                Some(k) => by_key.entry(k.clone()).or_default().push(i),
                None => unkeyed += 1,
            }
            keys.push(key);
        }
        Self {
            collection,
            keys,
            by_key,
            unkeyed,
        }
    }

    pub fn collection(&self) -> &FeatureCollection {
        &self.collection
    }

    pub fn feature_count(&self) -> usize {
        self.collection.len()
    }

    /// Features whose key property was missing or unparseable.
    pub fn unkeyed(&self) -> usize {
        self.unkeyed
    }

    pub fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn lookup(&self, key: &str) -> Vec<&formats::BoundaryFeature> {
        self.by_key
            .get(key)
            .map(|idx| idx.iter().map(|&i| &self.collection.features[i]).collect())
            .unwrap_or_default()
    }

    /// Union of the bounds of every feature under `key`.
    pub fn bounds_for(&self, key: &str) -> Option<LonLatBounds> {
        self.lookup(key)
            .into_iter()
            .filter_map(|f| f.bounds())
            .reduce(|a, b| a.union(&b))
    }

    /// GeoJSON for the map engine. Each keyed feature gets its canonical key
    /// as both feature id and `key_property`, so paint expressions and
    /// feature state address features by the same join key.
    pub fn to_source_value(&self, key_property: &str) -> serde_json::Value {
        let mut out = self.collection.clone();
        for (feature, key) in out.features.iter_mut().zip(&self.keys) {
            if let Some(key) = key {
                feature.id = Some(key.clone());
                feature
                    .properties
                    .insert(key_property.to_string(), serde_json::Value::String(key.clone()));
            }
        }
        out.to_geojson_value()
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.by_key.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

/// Proof that a load was started; handed back with the payload.
#[derive(Debug, PartialEq, Eq)]
pub struct LoadTicket {
    layer: PolygonLayer,
}

impl LoadTicket {
    pub fn layer(&self) -> PolygonLayer {
        self.layer
    }
}

#[derive(Debug)]
struct Corpus {
    spec: CorpusSpec,
    state: ResidencyState,
    index: Option<BoundaryIndex>,
    failure: Option<BoundaryError>,
}

/// Session-lifetime store of the two boundary corpora.
///
/// Each corpus is fetched at most once. A failed corpus stays failed and
/// the dependent layer renders without polygons.
#[derive(Debug)]
pub struct BoundaryDataCache {
    corpora: BTreeMap<PolygonLayer, Corpus>,
}

impl BoundaryDataCache {
    pub fn new(prefectures: CorpusSpec, municipalities: CorpusSpec) -> Self {
        let mut corpora = BTreeMap::new();
        for (layer, spec) in [
            (PolygonLayer::Prefectures, prefectures),
            (PolygonLayer::Municipalities, municipalities),
        ] {
            corpora.insert(
                layer,
                Corpus {
                    spec,
                    state: ResidencyState::NotRequested,
                    index: None,
                    failure: None,
                },
            );
        }
        Self { corpora }
    }

    pub fn state(&self, layer: PolygonLayer) -> ResidencyState {
        self.corpora
            .get(&layer)
            .map(|c| c.state)
            .unwrap_or_default()
    }

    /// Starts the one and only load of `layer`. `None` when a load already
    /// started, finished or failed.
    pub fn begin_load(&mut self, layer: PolygonLayer) -> Option<LoadTicket> {
        let corpus = self.corpora.get_mut(&layer)?;
        if corpus.state != ResidencyState::NotRequested {
            tracing::debug!(
                layer = layer.source_id(),
                state = ?corpus.state,
                "boundary load already started"
            );
            return None;
        }
        corpus.state = ResidencyState::Requested;
        tracing::debug!(layer = layer.source_id(), "boundary load requested");
        Some(LoadTicket { layer })
    }

    /// Settles a load. Returns the number of indexed features on success.
    pub fn complete_load<E: std::fmt::Display>(
        &mut self,
        ticket: LoadTicket,
        payload: Result<String, E>,
    ) -> Result<usize, BoundaryError> {
        let layer = ticket.layer;
        let Some(corpus) = self.corpora.get_mut(&layer) else {
            return Err(BoundaryError::NotRequested { layer });
        };
        if corpus.state != ResidencyState::Requested {
            return Err(BoundaryError::NotRequested { layer });
        }

        let decoded = match payload {
            Err(e) => Err(BoundaryError::Fetch {
                layer,
                message: e.to_string(),
            }),
            Ok(text) => decode(&text, &corpus.spec.format).map_err(|message| {
                BoundaryError::Decode { layer, message }
            }),
        };

        match decoded {
            Ok(collection) => {
                let index = BoundaryIndex::build(collection, &corpus.spec);
                let count = index.feature_count();
                if index.unkeyed() > 0 {
                    tracing::warn!(
                        layer = layer.source_id(),
                        unkeyed = index.unkeyed(),
                        "boundary features without a usable key"
                    );
                }
                tracing::info!(layer = layer.source_id(), features = count, "boundaries resident");
                corpus.index = Some(index);
                corpus.state = ResidencyState::Resident;
                Ok(count)
            }
            Err(err) => {
                tracing::warn!(layer = layer.source_id(), error = %err, "boundaries unavailable");
                corpus.state = ResidencyState::Failed;
                corpus.failure = Some(err.clone());
                Err(err)
            }
        }
    }

    pub fn index(&self, layer: PolygonLayer) -> Option<&BoundaryIndex> {
        self.corpora.get(&layer).and_then(|c| c.index.as_ref())
    }

    pub fn is_available(&self, layer: PolygonLayer) -> bool {
        self.state(layer) == ResidencyState::Resident
    }

    pub fn failure(&self, layer: PolygonLayer) -> Option<&BoundaryError> {
        self.corpora.get(&layer).and_then(|c| c.failure.as_ref())
    }

    pub fn spec(&self, layer: PolygonLayer) -> Option<&CorpusSpec> {
        self.corpora.get(&layer).map(|c| &c.spec)
    }

    /// Canonical lookup key for a raw property value of `layer`'s corpus.
    pub fn key_for(&self, layer: PolygonLayer, raw: &str) -> Option<String> {
        self.spec(layer).and_then(|s| s.key_of(raw))
    }
}

fn decode(text: &str, format: &PayloadFormat) -> Result<FeatureCollection, String> {
    match format {
        PayloadFormat::Topology { object } => {
            topology_to_features(text, object.as_deref()).map_err(|e| e.to_string())
        }
        PayloadFormat::GeoJson => {
            FeatureCollection::from_geojson_str(text).map_err(|e| e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BoundaryDataCache, BoundaryError, CorpusSpec};
    use crate::residency::ResidencyState;
    use layers::PolygonLayer;
    use pretty_assertions::assert_eq;

    const MUNICIPALITIES: &str = r#"{"type":"FeatureCollection","features":[
        {"type":"Feature","properties":{"N03_001":"東京都","N03_007":"13113"},
         "geometry":{"type":"Polygon","coordinates":[[[139.66,35.64],[139.72,35.64],[139.72,35.69],[139.66,35.64]]]}},
        {"type":"Feature","properties":{"N03_001":"北海道","N03_007":1101},
         "geometry":{"type":"Polygon","coordinates":[[[141.2,43.0],[141.4,43.0],[141.4,43.1],[141.2,43.0]]]}},
        {"type":"Feature","properties":{"N03_001":"東京都","N03_007":"13421"},
         "geometry":{"type":"Polygon","coordinates":[[[142.1,27.0],[142.2,27.0],[142.2,27.1],[142.1,27.0]]]}},
        {"type":"Feature","properties":{"N03_001":"東京都","N03_007":"13421"},
         "geometry":{"type":"Polygon","coordinates":[[[153.9,24.2],[154.0,24.2],[154.0,24.3],[153.9,24.2]]]}},
        {"type":"Feature","properties":{"N03_001":"東京都"},
         "geometry":{"type":"Polygon","coordinates":[[[139.0,35.0],[139.1,35.0],[139.1,35.1],[139.0,35.0]]]}}
    ]}"#;

    const PREFECTURES: &str = r#"{"type":"Topology","arcs":[[[139.5,35.5],[140.0,35.5],[140.0,36.0],[139.5,35.5]]],
        "objects":{"japan":{"type":"GeometryCollection","geometries":[
            {"type":"Polygon","properties":{"nam_ja":"東京都"},"arcs":[[0]]}
        ]}}}"#;

    fn cache() -> BoundaryDataCache {
        BoundaryDataCache::new(
            CorpusSpec::prefectures("nam_ja"),
            CorpusSpec::municipalities("N03_007"),
        )
    }

    #[test]
    fn loads_exactly_once() {
        let mut cache = cache();
        assert_eq!(cache.state(PolygonLayer::Municipalities), ResidencyState::NotRequested);

        let ticket = cache.begin_load(PolygonLayer::Municipalities).expect("first load");
        assert_eq!(cache.state(PolygonLayer::Municipalities), ResidencyState::Requested);
        assert!(cache.begin_load(PolygonLayer::Municipalities).is_none());

        let n = cache
            .complete_load(ticket, Ok::<_, String>(MUNICIPALITIES.to_string()))
            .unwrap();
        assert_eq!(n, 5);
        assert!(cache.is_available(PolygonLayer::Municipalities));
        assert!(cache.begin_load(PolygonLayer::Municipalities).is_none());
    }

    #[test]
    fn indexes_zero_padded_codes_and_split_areas() {
        let mut cache = cache();
        let ticket = cache.begin_load(PolygonLayer::Municipalities).unwrap();
        cache
            .complete_load(ticket, Ok::<_, String>(MUNICIPALITIES.to_string()))
            .unwrap();
        let index = cache.index(PolygonLayer::Municipalities).unwrap();

        assert_eq!(index.keys(), vec!["01101", "13113", "13421"]);
        assert_eq!(index.unkeyed(), 1);
        assert_eq!(index.lookup("13421").len(), 2);

        let b = index.bounds_for("13421").unwrap();
        assert_eq!(b.min, [142.1, 24.2]);
        assert_eq!(b.max, [154.0, 27.1]);
        assert!(index.bounds_for("99999").is_none());
        assert_eq!(
            cache.key_for(PolygonLayer::Municipalities, "1101").as_deref(),
            Some("01101")
        );
    }

    #[test]
    fn source_data_carries_the_join_key() {
        let mut cache = cache();
        let ticket = cache.begin_load(PolygonLayer::Municipalities).unwrap();
        cache
            .complete_load(ticket, Ok::<_, String>(MUNICIPALITIES.to_string()))
            .unwrap();
        let value = cache
            .index(PolygonLayer::Municipalities)
            .unwrap()
            .to_source_value("dx_key");
        let features = value["features"].as_array().unwrap();
        assert_eq!(features.len(), 5);
        assert_eq!(features[1]["id"], "01101");
        assert_eq!(features[1]["properties"]["dx_key"], "01101");
        assert!(features[4]["properties"].get("dx_key").is_none());
    }

    #[test]
    fn prefecture_topology_is_keyed_by_name() {
        let mut cache = cache();
        let ticket = cache.begin_load(PolygonLayer::Prefectures).unwrap();
        cache
            .complete_load(ticket, Ok::<_, String>(PREFECTURES.to_string()))
            .unwrap();
        let index = cache.index(PolygonLayer::Prefectures).unwrap();
        assert!(index.contains("東京都"));
    }

    #[test]
    fn failures_are_terminal() {
        let mut cache = cache();
        let ticket = cache.begin_load(PolygonLayer::Prefectures).unwrap();
        let err = cache
            .complete_load(ticket, Err("connection refused"))
            .unwrap_err();
        assert!(matches!(err, BoundaryError::Fetch { .. }));
        assert_eq!(cache.state(PolygonLayer::Prefectures), ResidencyState::Failed);
        assert!(cache.index(PolygonLayer::Prefectures).is_none());
        assert!(cache.failure(PolygonLayer::Prefectures).is_some());
        assert!(cache.begin_load(PolygonLayer::Prefectures).is_none());

        let ticket = cache.begin_load(PolygonLayer::Municipalities).unwrap();
        let err = cache
            .complete_load(ticket, Ok::<_, String>("{}".to_string()))
            .unwrap_err();
        assert!(matches!(err, BoundaryError::Decode { .. }));
        assert_eq!(cache.state(PolygonLayer::Municipalities), ResidencyState::Failed);
    }
}
