use std::env;
use std::time::Duration;

use layers::ScaleKind;
use navigation::FeatureFields;
use streaming::CorpusSpec;

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";
pub const DEFAULT_API_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_PREFECTURE_TOPOLOGY_URL: &str =
    "https://raw.githubusercontent.com/dataofjapan/land/master/japan.topojson";
pub const DEFAULT_MUNICIPALITY_GEOJSON_PATH: &str = "/static/geo/municipalities.geojson";

/// Runtime settings, read from `DASHBOARD_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub api_base: String,
    pub api_timeout: Duration,
    pub prefecture_topology_url: String,
    pub municipality_geojson_url: String,
    /// Prefecture name property in the topology.
    pub prefecture_name_field: String,
    /// Municipality code property in the GeoJSON.
    pub municipality_code_field: String,
    /// Owning-prefecture property in the GeoJSON; used to filter the layer.
    pub municipality_prefecture_field: String,
    pub score_scale: ScaleKind,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; unset or invalid values fall
    /// back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base = var_string(&lookup, "DASHBOARD_API_BASE", DEFAULT_API_BASE);
        let municipality_default = format!(
            "{}{DEFAULT_MUNICIPALITY_GEOJSON_PATH}",
            api_base.trim_end_matches('/')
        );
        Self {
            api_timeout: Duration::from_millis(var_u64(
                &lookup,
                "DASHBOARD_API_TIMEOUT_MS",
                DEFAULT_API_TIMEOUT_MS,
            )),
            prefecture_topology_url: var_string(
                &lookup,
                "DASHBOARD_PREFECTURE_TOPOLOGY_URL",
                DEFAULT_PREFECTURE_TOPOLOGY_URL,
            ),
            municipality_geojson_url: var_string(
                &lookup,
                "DASHBOARD_MUNICIPALITY_GEOJSON_URL",
                &municipality_default,
            ),
            prefecture_name_field: var_string(&lookup, "DASHBOARD_PREFECTURE_NAME_FIELD", "nam_ja"),
            municipality_code_field: var_string(
                &lookup,
                "DASHBOARD_MUNICIPALITY_CODE_FIELD",
                "N03_007",
            ),
            municipality_prefecture_field: var_string(
                &lookup,
                "DASHBOARD_MUNICIPALITY_PREFECTURE_FIELD",
                "N03_001",
            ),
            score_scale: var_parsed(&lookup, "DASHBOARD_SCORE_SCALE", ScaleKind::Standard),
            api_base,
        }
    }

    pub fn prefecture_corpus(&self) -> CorpusSpec {
        CorpusSpec::prefectures(self.prefecture_name_field.clone())
    }

    pub fn municipality_corpus(&self) -> CorpusSpec {
        CorpusSpec::municipalities(self.municipality_code_field.clone())
    }

    pub fn feature_fields(&self) -> FeatureFields {
        FeatureFields {
            prefecture_name: self.prefecture_name_field.clone(),
            municipality_code: self.municipality_code_field.clone(),
        }
    }
}

fn var_string<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: &str) -> String {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn var_u64<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: u64) -> u64 {
    var_parsed(lookup, key, default)
}

fn var_parsed<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Debug,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            tracing::warn!(key, value = %raw, ?default, "invalid setting; using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_PREFECTURE_TOPOLOGY_URL, DashboardConfig};
    use layers::ScaleKind;
    use std::collections::HashMap;
    use std::time::Duration;

    fn from_pairs(pairs: &[(&str, &str)]) -> DashboardConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DashboardConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let c = DashboardConfig::default();
        assert_eq!(c.api_base, "http://localhost:8000");
        assert_eq!(c.api_timeout, Duration::from_millis(10_000));
        assert_eq!(c.prefecture_topology_url, DEFAULT_PREFECTURE_TOPOLOGY_URL);
        assert_eq!(
            c.municipality_geojson_url,
            "http://localhost:8000/static/geo/municipalities.geojson"
        );
        assert_eq!(c.municipality_code_field, "N03_007");
        assert_eq!(c.score_scale, ScaleKind::Standard);
    }

    #[test]
    fn overrides_and_invalid_values() {
        let c = from_pairs(&[
            ("DASHBOARD_API_BASE", "https://dx.example.jp/"),
            ("DASHBOARD_API_TIMEOUT_MS", "abc"),
            ("DASHBOARD_SCORE_SCALE", "narrow"),
            ("DASHBOARD_PREFECTURE_NAME_FIELD", "  "),
        ]);
        assert_eq!(c.api_base, "https://dx.example.jp/");
        assert_eq!(
            c.municipality_geojson_url,
            "https://dx.example.jp/static/geo/municipalities.geojson"
        );
        assert_eq!(c.api_timeout, Duration::from_millis(10_000));
        assert_eq!(c.score_scale, ScaleKind::Narrow);
        assert_eq!(c.prefecture_name_field, "nam_ja");

        let c = from_pairs(&[("DASHBOARD_SCORE_SCALE", "wide")]);
        assert_eq!(c.score_scale, ScaleKind::Standard);
    }
}
