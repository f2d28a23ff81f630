use foundation::LonLatBounds;
use serde_json::{Map, Value};

/// Closed or open ring of `[lon, lat]` positions.
pub type Ring = Vec<[f64; 2]>;

#[derive(Debug, Clone, PartialEq)]
pub enum PolygonGeometry {
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

impl PolygonGeometry {
    pub fn bounds(&self) -> Option<LonLatBounds> {
        let positions: Box<dyn Iterator<Item = &[f64; 2]>> = match self {
            PolygonGeometry::Polygon(rings) => Box::new(rings.iter().flatten()),
            PolygonGeometry::MultiPolygon(polys) => Box::new(polys.iter().flatten().flatten()),
        };
        LonLatBounds::from_points(positions.map(|p| (p[0], p[1])))
    }
}

/// One administrative area's shape plus its raw properties.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryFeature {
    pub id: Option<String>,
    pub properties: Map<String, Value>,
    pub geometry: PolygonGeometry,
}

impl BoundaryFeature {
    /// Reads a property as text; numbers are rendered without a fraction when integral.
    pub fn property_text(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(i.to_string()),
                None => Some(n.to_string()),
            },
            _ => None,
        }
    }

    pub fn bounds(&self) -> Option<LonLatBounds> {
        self.geometry.bounds()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<BoundaryFeature>,
}

#[derive(Debug)]
pub enum GeoJsonError {
    Json(String),
    NotAFeatureCollection,
    InvalidFeature { index: usize, reason: String },
}

impl std::fmt::Display for GeoJsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeoJsonError::Json(msg) => write!(f, "JSON parse error: {msg}"),
            GeoJsonError::NotAFeatureCollection => {
                write!(f, "expected GeoJSON FeatureCollection")
            }
            GeoJsonError::InvalidFeature { index, reason } => {
                write!(f, "invalid feature at index {index}: {reason}")
            }
        }
    }
}

impl std::error::Error for GeoJsonError {}

impl FeatureCollection {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn from_geojson_str(payload: &str) -> Result<Self, GeoJsonError> {
        let value: Value =
            serde_json::from_str(payload).map_err(|e| GeoJsonError::Json(e.to_string()))?;
        Self::from_geojson_value(value)
    }

    /// Parses a FeatureCollection of polygonal features.
    ///
    /// Features with a `null` geometry or a non-polygonal geometry carry no
    /// boundary and are skipped.
    pub fn from_geojson_value(value: Value) -> Result<Self, GeoJsonError> {
        let obj = value
            .as_object()
            .ok_or(GeoJsonError::NotAFeatureCollection)?;
        let ty = obj
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(GeoJsonError::NotAFeatureCollection)?;
        if ty != "FeatureCollection" {
            return Err(GeoJsonError::NotAFeatureCollection);
        }

        let features_val = obj
            .get("features")
            .and_then(|v| v.as_array())
            .ok_or(GeoJsonError::NotAFeatureCollection)?;

        let mut features = Vec::with_capacity(features_val.len());
        for (index, feat_val) in features_val.iter().enumerate() {
            let feat_obj = feat_val.as_object().ok_or(GeoJsonError::InvalidFeature {
                index,
                reason: "feature must be an object".to_string(),
            })?;

            let feat_type = feat_obj.get("type").and_then(|v| v.as_str()).ok_or(
                GeoJsonError::InvalidFeature {
                    index,
                    reason: "feature missing type".to_string(),
                },
            )?;
            if feat_type != "Feature" {
                return Err(GeoJsonError::InvalidFeature {
                    index,
                    reason: format!("unexpected feature type: {feat_type}"),
                });
            }

            let geometry = match feat_obj.get("geometry") {
                None | Some(Value::Null) => continue,
                Some(g) => parse_geometry(g)
                    .map_err(|reason| GeoJsonError::InvalidFeature { index, reason })?,
            };
            let Some(geometry) = geometry else {
                continue;
            };

            features.push(BoundaryFeature {
                id: id_text(feat_obj.get("id")),
                properties: feat_obj
                    .get("properties")
                    .and_then(|v| v.as_object())
                    .cloned()
                    .unwrap_or_default(),
                geometry,
            });
        }

        Ok(Self { features })
    }

    /// Emits a GeoJSON FeatureCollection, e.g. as map-engine source data.
    pub fn to_geojson_value(&self) -> Value {
        let features: Vec<Value> = self.features.iter().map(feature_to_value).collect();
        let mut root = Map::new();
        root.insert(
            "type".to_string(),
            Value::String("FeatureCollection".to_string()),
        );
        root.insert("features".to_string(), Value::Array(features));
        Value::Object(root)
    }
}

pub(crate) fn id_text(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn feature_to_value(feat: &BoundaryFeature) -> Value {
    let mut fobj = Map::new();
    fobj.insert("type".to_string(), Value::String("Feature".to_string()));
    if let Some(id) = &feat.id {
        fobj.insert("id".to_string(), Value::String(id.clone()));
    }
    fobj.insert(
        "properties".to_string(),
        Value::Object(feat.properties.clone()),
    );

    let (ty, coords) = match &feat.geometry {
        PolygonGeometry::Polygon(rings) => ("Polygon", rings_value(rings)),
        PolygonGeometry::MultiPolygon(polys) => (
            "MultiPolygon",
            Value::Array(polys.iter().map(|p| rings_value(p)).collect()),
        ),
    };
    let mut gobj = Map::new();
    gobj.insert("type".to_string(), Value::String(ty.to_string()));
    gobj.insert("coordinates".to_string(), coords);
    fobj.insert("geometry".to_string(), Value::Object(gobj));
    Value::Object(fobj)
}

fn rings_value(rings: &[Ring]) -> Value {
    Value::Array(
        rings
            .iter()
            .map(|ring| {
                Value::Array(
                    ring.iter()
                        .map(|p| Value::Array(vec![Value::from(p[0]), Value::from(p[1])]))
                        .collect(),
                )
            })
            .collect(),
    )
}

/// `Ok(None)` for geometry types that carry no area.
fn parse_geometry(value: &Value) -> Result<Option<PolygonGeometry>, String> {
    let obj = value
        .as_object()
        .ok_or("geometry must be an object".to_string())?;
    let ty = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or("geometry missing type".to_string())?;

    match ty {
        "Polygon" | "MultiPolygon" => {}
        _ => return Ok(None),
    }

    let coords = obj
        .get("coordinates")
        .ok_or("geometry missing coordinates".to_string())?;

    if ty == "Polygon" {
        Ok(Some(PolygonGeometry::Polygon(parse_polygon(coords)?)))
    } else {
        let polys = coords
            .as_array()
            .ok_or("MultiPolygon coordinates must be an array of polygons".to_string())?;
        let mut out = Vec::with_capacity(polys.len());
        for poly in polys {
            out.push(parse_polygon(poly)?);
        }
        Ok(Some(PolygonGeometry::MultiPolygon(out)))
    }
}

fn parse_polygon(coords: &Value) -> Result<Vec<Ring>, String> {
    let rings = coords
        .as_array()
        .ok_or("Polygon coordinates must be an array of rings".to_string())?;
    let mut out = Vec::with_capacity(rings.len());
    for ring in rings {
        let arr = ring
            .as_array()
            .ok_or("ring must be an array of positions".to_string())?;
        let mut pts = Vec::with_capacity(arr.len());
        for item in arr {
            pts.push(parse_position(item)?);
        }
        out.push(pts);
    }
    Ok(out)
}

fn parse_position(value: &Value) -> Result<[f64; 2], String> {
    let arr = value
        .as_array()
        .ok_or("position must be an array".to_string())?;
    if arr.len() < 2 {
        return Err("position must have [lon, lat]".to_string());
    }
    let lon = arr[0].as_f64().ok_or("lon must be a number".to_string())?;
    let lat = arr[1].as_f64().ok_or("lat must be a number".to_string())?;
    Ok([lon, lat])
}
