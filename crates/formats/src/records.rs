//! Records served by the upstream map-data API.
//!
//! Scores, coordinates and population come from outer joins and may be
//! `null`; they are modelled as `Option` so one sparse row never fails a batch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSummary {
    pub region: String,
    #[serde(default)]
    pub avg_score: Option<f64>,
    #[serde(default)]
    pub municipality_count: u32,
    #[serde(default)]
    pub prefecture_count: u32,
    #[serde(default)]
    pub total_population: Option<u64>,
    #[serde(default)]
    pub prefectures: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefectureSummary {
    pub prefecture: String,
    pub region: String,
    #[serde(default)]
    pub avg_score: Option<f64>,
    #[serde(default)]
    pub avg_citizen: Option<f64>,
    #[serde(default)]
    pub avg_promotion: Option<f64>,
    #[serde(default)]
    pub avg_business: Option<f64>,
    #[serde(default)]
    pub avg_education: Option<f64>,
    #[serde(default)]
    pub avg_information: Option<f64>,
    #[serde(default)]
    pub municipality_count: u32,
    #[serde(default)]
    pub total_population: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MunicipalitySummary {
    /// 5- or 6-digit local government code (the 6th digit is a check digit).
    pub city_code: String,
    pub city_name: String,
    pub prefecture: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub population: Option<u64>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub total_score: Option<f64>,
    #[serde(default)]
    pub cat_citizen_services: Option<f64>,
    #[serde(default)]
    pub cat_promotion_system: Option<f64>,
    #[serde(default)]
    pub cat_business_dx: Option<f64>,
    #[serde(default)]
    pub cat_education_dx: Option<f64>,
    #[serde(default)]
    pub cat_information: Option<f64>,
    #[serde(default)]
    pub pattern_id: Option<u32>,
    #[serde(default)]
    pub pattern_name: Option<String>,
}

impl MunicipalitySummary {
    /// `(lon, lat)`; zero or missing components count as "no coordinates".
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let lon = self.longitude.filter(|v| v.is_finite() && *v != 0.0)?;
        let lat = self.latitude.filter(|v| v.is_finite() && *v != 0.0)?;
        Some((lon, lat))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub collected_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarMunicipality {
    pub city_name: String,
    #[serde(default)]
    pub population: Option<u64>,
    #[serde(default)]
    pub total_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MunicipalityDetail {
    #[serde(flatten)]
    pub summary: MunicipalitySummary,
    #[serde(default)]
    pub dx_status: Option<Map<String, Value>>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub policy_status: Option<String>,
    #[serde(default)]
    pub mynumber_rate: Option<f64>,
    #[serde(default)]
    pub online_proc_rate: Option<f64>,
    #[serde(default)]
    pub computer_per_student: Option<f64>,
    #[serde(default)]
    pub terminal_os_type: Option<String>,
    #[serde(default)]
    pub survey_year: Option<String>,
    #[serde(default)]
    pub news: Vec<NewsItem>,
    #[serde(default)]
    pub national_rank: Option<u32>,
    #[serde(default)]
    pub total_municipalities: Option<u32>,
    #[serde(default)]
    pub similar_municipalities: Vec<SimilarMunicipality>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternCount {
    pub pattern_name: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub total_municipalities: u32,
    #[serde(default)]
    pub avg_score: Option<f64>,
    #[serde(default)]
    pub min_score: Option<f64>,
    #[serde(default)]
    pub max_score: Option<f64>,
    #[serde(default)]
    pub stddev_score: Option<f64>,
    #[serde(default)]
    pub pattern_distribution: Vec<PatternCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefectureScore {
    pub prefecture_code: String,
    pub prefecture_name: String,
    #[serde(default)]
    pub avg_score: Option<f64>,
    #[serde(default)]
    pub municipality_count: u32,
}

/// Prefecture-level score aggregate keyed by 2-digit prefecture code.
pub type PrefectureScores = BTreeMap<String, PrefectureScore>;

#[cfg(test)]
mod tests {
    use super::{MunicipalityDetail, MunicipalitySummary, PrefectureScores, RegionSummary};

    #[test]
    fn sparse_municipality_rows_deserialize() {
        let row = r#"{
            "city_code": "131130", "city_name": "渋谷区", "prefecture": "東京都",
            "region": "関東地方", "population": 243883,
            "latitude": null, "longitude": 139.70, "total_score": null
        }"#;
        let m: MunicipalitySummary = serde_json::from_str(row).expect("row");
        assert_eq!(m.city_code, "131130");
        assert_eq!(m.total_score, None);
        assert_eq!(m.coordinates(), None);
        assert_eq!(m.pattern_name, None);
    }

    #[test]
    fn detail_flattens_summary_fields() {
        let payload = r#"{
            "city_code": "131130", "city_name": "渋谷区", "prefecture": "東京都",
            "latitude": 35.66, "longitude": 139.70, "total_score": 82.0,
            "dx_status": null, "national_rank": 3, "total_municipalities": 1741,
            "news": [{ "title": "t", "url": "https://example.invalid/n" }],
            "similar_municipalities": [{ "city_name": "中野区", "population": 335000, "total_score": 71.5 }]
        }"#;
        let d: MunicipalityDetail = serde_json::from_str(payload).expect("detail");
        assert_eq!(d.summary.city_name, "渋谷区");
        assert_eq!(d.summary.coordinates(), Some((139.70, 35.66)));
        assert_eq!(d.national_rank, Some(3));
        assert_eq!(d.news.len(), 1);
        assert_eq!(d.similar_municipalities[0].total_score, Some(71.5));
    }

    #[test]
    fn region_and_prefecture_score_shapes() {
        let r: RegionSummary = serde_json::from_str(
            r#"{"region":"関東地方","avg_score":61.2,"municipality_count":316,
                "prefecture_count":7,"total_population":43000000,"prefectures":["東京都"]}"#,
        )
        .unwrap();
        assert_eq!(r.prefectures, vec!["東京都".to_string()]);

        let scores: PrefectureScores = serde_json::from_str(
            r#"{"13":{"prefecture_code":"13","prefecture_name":"東京都","avg_score":82.5,"municipality_count":62}}"#,
        )
        .unwrap();
        assert_eq!(scores["13"].avg_score, Some(82.5));
    }
}
