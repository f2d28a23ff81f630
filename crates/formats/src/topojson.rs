//! TopoJSON topology decoding.
//!
//! A topology stores shared borders once as arcs; polygons reference arcs by
//! index (negative indices mean "arc `!i` traversed backwards"). Quantized
//! topologies delta-encode arc positions and carry a `transform` mapping the
//! integer grid back to lon/lat.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::geojson::{BoundaryFeature, FeatureCollection, PolygonGeometry, Ring, id_text};

#[derive(Debug)]
pub enum TopoJsonError {
    Json(String),
    NotATopology,
    MissingObject(String),
    ArcOutOfRange { index: i64, arc_count: usize },
    InvalidArcs { reason: String },
}

impl std::fmt::Display for TopoJsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopoJsonError::Json(msg) => write!(f, "JSON parse error: {msg}"),
            TopoJsonError::NotATopology => write!(f, "expected TopoJSON Topology"),
            TopoJsonError::MissingObject(name) => write!(f, "topology has no object {name:?}"),
            TopoJsonError::ArcOutOfRange { index, arc_count } => {
                write!(f, "arc index {index} out of range (topology has {arc_count} arcs)")
            }
            TopoJsonError::InvalidArcs { reason } => write!(f, "invalid arc references: {reason}"),
        }
    }
}

impl std::error::Error for TopoJsonError {}

#[derive(Debug, Deserialize)]
struct Topology {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    transform: Option<Transform>,
    #[serde(default)]
    arcs: Vec<Vec<Vec<f64>>>,
    #[serde(default)]
    objects: Map<String, Value>,
}

#[derive(Debug, Copy, Clone, Deserialize)]
struct Transform {
    scale: [f64; 2],
    translate: [f64; 2],
}

#[derive(Debug, Deserialize)]
struct TopoGeometry {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    arcs: Option<Value>,
    #[serde(default)]
    geometries: Vec<TopoGeometry>,
}

/// Converts one object of a topology into a flat polygon feature collection.
///
/// When `object` is `None` the first object (by name) is used. Non-polygonal
/// and null geometries are skipped.
pub fn topology_to_features(
    payload: &str,
    object: Option<&str>,
) -> Result<FeatureCollection, TopoJsonError> {
    let topology: Topology =
        serde_json::from_str(payload).map_err(|e| TopoJsonError::Json(e.to_string()))?;
    if topology.kind != "Topology" {
        return Err(TopoJsonError::NotATopology);
    }

    let object_value = match object {
        Some(name) => topology
            .objects
            .get(name)
            .ok_or_else(|| TopoJsonError::MissingObject(name.to_string()))?,
        None => topology
            .objects
            .values()
            .next()
            .ok_or_else(|| TopoJsonError::MissingObject("<any>".to_string()))?,
    };
    let root: TopoGeometry = serde_json::from_value(object_value.clone())
        .map_err(|e| TopoJsonError::Json(e.to_string()))?;

    let arcs = decode_arcs(&topology.arcs, topology.transform);

    let mut features = Vec::new();
    collect_features(&root, &arcs, &mut features)?;
    Ok(FeatureCollection { features })
}

fn collect_features(
    geom: &TopoGeometry,
    arcs: &[Vec<[f64; 2]>],
    out: &mut Vec<BoundaryFeature>,
) -> Result<(), TopoJsonError> {
    let geometry = match geom.kind.as_deref() {
        Some("GeometryCollection") => {
            for child in &geom.geometries {
                collect_features(child, arcs, out)?;
            }
            return Ok(());
        }
        Some("Polygon") => {
            let refs: Vec<Vec<i64>> = arc_refs(geom.arcs.as_ref())?;
            PolygonGeometry::Polygon(stitch_polygon(&refs, arcs)?)
        }
        Some("MultiPolygon") => {
            let refs: Vec<Vec<Vec<i64>>> = arc_refs(geom.arcs.as_ref())?;
            let mut polys = Vec::with_capacity(refs.len());
            for poly in &refs {
                polys.push(stitch_polygon(poly, arcs)?);
            }
            PolygonGeometry::MultiPolygon(polys)
        }
        _ => return Ok(()),
    };

    out.push(BoundaryFeature {
        id: id_text(geom.id.as_ref()),
        properties: geom.properties.clone().unwrap_or_default(),
        geometry,
    });
    Ok(())
}

fn arc_refs<T: serde::de::DeserializeOwned>(value: Option<&Value>) -> Result<T, TopoJsonError> {
    let value = value.ok_or_else(|| TopoJsonError::InvalidArcs {
        reason: "polygon without arcs".to_string(),
    })?;
    serde_json::from_value(value.clone()).map_err(|e| TopoJsonError::InvalidArcs {
        reason: e.to_string(),
    })
}

/// Absolute lon/lat positions for every arc.
fn decode_arcs(raw: &[Vec<Vec<f64>>], transform: Option<Transform>) -> Vec<Vec<[f64; 2]>> {
    raw.iter()
        .map(|arc| {
            let mut x = 0.0;
            let mut y = 0.0;
            arc.iter()
                .filter(|p| p.len() >= 2)
                .map(|p| match transform {
                    Some(t) => {
                        x += p[0];
                        y += p[1];
                        [x * t.scale[0] + t.translate[0], y * t.scale[1] + t.translate[1]]
                    }
                    None => [p[0], p[1]],
                })
                .collect()
        })
        .collect()
}

fn stitch_polygon(rings: &[Vec<i64>], arcs: &[Vec<[f64; 2]>]) -> Result<Vec<Ring>, TopoJsonError> {
    rings.iter().map(|ring| stitch_ring(ring, arcs)).collect()
}

/// Joins arcs end to start; consecutive arcs share their junction point.
fn stitch_ring(refs: &[i64], arcs: &[Vec<[f64; 2]>]) -> Result<Ring, TopoJsonError> {
    let mut ring: Ring = Vec::new();
    for &r in refs {
        let (index, reversed) = if r < 0 { (!r, true) } else { (r, false) };
        let arc = usize::try_from(index)
            .ok()
            .and_then(|i| arcs.get(i))
            .ok_or(TopoJsonError::ArcOutOfRange {
                index: r,
                arc_count: arcs.len(),
            })?;

        let mut points = arc.clone();
        if reversed {
            points.reverse();
        }
        let skip = usize::from(!ring.is_empty());
        ring.extend(points.into_iter().skip(skip));
    }
    Ok(ring)
}

#[cfg(test)]
mod tests {
    use super::{TopoJsonError, topology_to_features};
    use crate::geojson::PolygonGeometry;
    use pretty_assertions::assert_eq;

    // Two unit squares sharing the edge x=1. Arc 0 is the shared edge going
    // up; the right square walks it backwards.
    const TWO_SQUARES: &str = r#"{
        "type": "Topology",
        "transform": { "scale": [0.5, 0.5], "translate": [130.0, 30.0] },
        "arcs": [
            [[2, 0], [0, 2]],
            [[2, 2], [-2, 0], [0, -2], [2, 0]],
            [[2, 0], [2, 0], [0, 2], [-2, 0]]
        ],
        "objects": {
            "prefectures": {
                "type": "GeometryCollection",
                "geometries": [
                    { "type": "Polygon", "id": 1, "properties": { "nam_ja": "西県" }, "arcs": [[0, 1]] },
                    { "type": "Polygon", "properties": { "nam_ja": "東県" }, "arcs": [[2, -1]] },
                    { "type": null, "properties": { "nam_ja": "無" } }
                ]
            }
        }
    }"#;

    #[test]
    fn decodes_quantized_shared_arcs() {
        let fc = topology_to_features(TWO_SQUARES, Some("prefectures")).expect("decode");
        assert_eq!(fc.len(), 2);

        let west = &fc.features[0];
        assert_eq!(west.id.as_deref(), Some("1"));
        assert_eq!(west.property_text("nam_ja").as_deref(), Some("西県"));
        let PolygonGeometry::Polygon(rings) = &west.geometry else {
            panic!("expected polygon");
        };
        assert_eq!(
            rings[0],
            vec![
                [131.0, 30.0],
                [131.0, 31.0],
                [130.0, 31.0],
                [130.0, 30.0],
                [131.0, 30.0],
            ]
        );

        let east = &fc.features[1];
        let PolygonGeometry::Polygon(rings) = &east.geometry else {
            panic!("expected polygon");
        };
        // Ends on the reversed shared edge, back at its start.
        assert_eq!(rings[0].first(), Some(&[131.0, 30.0]));
        assert_eq!(rings[0].last(), Some(&[131.0, 30.0]));
        let b = east.bounds().unwrap();
        assert_eq!(b.max, [132.0, 31.0]);
    }

    #[test]
    fn defaults_to_first_object() {
        let fc = topology_to_features(TWO_SQUARES, None).unwrap();
        assert_eq!(fc.len(), 2);
    }

    #[test]
    fn reports_bad_references() {
        let payload = r#"{"type":"Topology","arcs":[[[0,0],[1,1]]],
            "objects":{"o":{"type":"Polygon","arcs":[[5]]}}}"#;
        let err = topology_to_features(payload, None).unwrap_err();
        assert!(matches!(err, TopoJsonError::ArcOutOfRange { index: 5, arc_count: 1 }));

        let err = topology_to_features(TWO_SQUARES, Some("cities")).unwrap_err();
        assert!(matches!(err, TopoJsonError::MissingObject(_)));

        let err = topology_to_features(r#"{"type":"FeatureCollection"}"#, None).unwrap_err();
        assert!(matches!(err, TopoJsonError::NotATopology));
    }
}
