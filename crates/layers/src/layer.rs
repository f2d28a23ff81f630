use serde::{Deserialize, Serialize};

/// The two polygon corpora the map can show.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PolygonLayer {
    Prefectures,
    Municipalities,
}

impl PolygonLayer {
    pub const ALL: [PolygonLayer; 2] = [PolygonLayer::Prefectures, PolygonLayer::Municipalities];

    pub fn source_id(self) -> &'static str {
        match self {
            PolygonLayer::Prefectures => "prefectures",
            PolygonLayer::Municipalities => "municipalities",
        }
    }

    /// Layer receiving pointer interaction.
    pub fn fill_id(self) -> &'static str {
        match self {
            PolygonLayer::Prefectures => "prefectures-fill",
            PolygonLayer::Municipalities => "municipalities-fill",
        }
    }

    pub fn line_id(self) -> &'static str {
        match self {
            PolygonLayer::Prefectures => "prefectures-line",
            PolygonLayer::Municipalities => "municipalities-line",
        }
    }

    pub fn from_layer_id(id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|l| l.fill_id() == id || l.line_id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::PolygonLayer;

    #[test]
    fn layer_ids_resolve_back() {
        for layer in PolygonLayer::ALL {
            assert_eq!(PolygonLayer::from_layer_id(layer.fill_id()), Some(layer));
            assert_eq!(PolygonLayer::from_layer_id(layer.line_id()), Some(layer));
        }
        assert_eq!(PolygonLayer::from_layer_id("background"), None);
    }
}
