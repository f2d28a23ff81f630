//! Point markers drawn when the active level has no polygon geometry.

use formats::{MunicipalitySummary, PrefectureSummary, RegionSummary};
use layers::ScoreColorMapper;

use crate::camera::{prefecture_center, region_center};
use crate::engine::Marker;

pub const REGION_MARKER_PX: f64 = 40.0;
pub const PREFECTURE_MARKER_PX: f64 = 32.0;
pub const MIN_MUNICIPALITY_MARKER_PX: f64 = 12.0;
pub const MAX_MUNICIPALITY_MARKER_PX: f64 = 28.0;
const DEFAULT_POPULATION: u64 = 10_000;

/// Markers plus the number of records left out for lack of a position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerSet {
    pub markers: Vec<Marker>,
    pub skipped: usize,
}

/// `clamp(log10(population) * 5, 12, 28)`; unknown or zero population
/// counts as 10 000.
pub fn municipality_marker_size(population: Option<u64>) -> f64 {
    let pop = population.filter(|p| *p > 0).unwrap_or(DEFAULT_POPULATION) as f64;
    (pop.log10() * 5.0).clamp(MIN_MUNICIPALITY_MARKER_PX, MAX_MUNICIPALITY_MARKER_PX)
}

fn score_text(score: Option<f64>) -> String {
    match score {
        Some(s) if s.is_finite() => format!("{s:.1}"),
        _ => "-".to_string(),
    }
}

pub fn region_markers(regions: &[RegionSummary], mapper: &ScoreColorMapper) -> MarkerSet {
    let mut set = MarkerSet::default();
    for region in regions {
        let Some(position) = region_center(&region.region) else {
            set.skipped += 1;
            continue;
        };
        let short = region.region.trim_end_matches("地方");
        set.markers.push(Marker {
            position,
            label: format!("{short} {}", score_text(region.avg_score)),
            size_px: REGION_MARKER_PX,
            color: mapper.color_of(region.avg_score),
        });
    }
    set
}

pub fn prefecture_markers(
    prefectures: &[PrefectureSummary],
    mapper: &ScoreColorMapper,
) -> MarkerSet {
    let mut set = MarkerSet::default();
    for pref in prefectures {
        let Some(position) = prefecture_center(&pref.prefecture) else {
            set.skipped += 1;
            continue;
        };
        set.markers.push(Marker {
            position,
            label: format!("{} {}", pref.prefecture, score_text(pref.avg_score)),
            size_px: PREFECTURE_MARKER_PX,
            color: mapper.color_of(pref.avg_score),
        });
    }
    set
}

pub fn municipality_markers(
    municipalities: &[MunicipalitySummary],
    mapper: &ScoreColorMapper,
) -> MarkerSet {
    let mut set = MarkerSet::default();
    for m in municipalities {
        let Some((lon, lat)) = m.coordinates() else {
            tracing::debug!(city_code = %m.city_code, "municipality without coordinates");
            set.skipped += 1;
            continue;
        };
        set.markers.push(Marker {
            position: [lon, lat],
            label: m.city_name.clone(),
            size_px: municipality_marker_size(m.population),
            color: mapper.color_of(m.total_score),
        });
    }
    set
}

#[cfg(test)]
mod tests {
    use super::{municipality_marker_size, municipality_markers, region_markers};
    use formats::{MunicipalitySummary, RegionSummary};
    use layers::ScoreColorMapper;

    fn muni(
        code: &str,
        lon: Option<f64>,
        lat: Option<f64>,
        pop: Option<u64>,
    ) -> MunicipalitySummary {
        MunicipalitySummary {
            city_code: code.to_string(),
            city_name: format!("市{code}"),
            prefecture: "東京都".to_string(),
            region: "関東地方".to_string(),
            population: pop,
            latitude: lat,
            longitude: lon,
            total_score: Some(70.0),
            cat_citizen_services: None,
            cat_promotion_system: None,
            cat_business_dx: None,
            cat_education_dx: None,
            cat_information: None,
            pattern_id: None,
            pattern_name: None,
        }
    }

    #[test]
    fn marker_size_is_clamped() {
        assert!((municipality_marker_size(None) - 20.0).abs() < 1e-9);
        assert!((municipality_marker_size(Some(0)) - 20.0).abs() < 1e-9);
        assert_eq!(municipality_marker_size(Some(100)), 12.0);
        assert_eq!(municipality_marker_size(Some(10_000_000_000)), 28.0);
    }

    #[test]
    fn records_without_coordinates_are_skipped() {
        let mapper = ScoreColorMapper::standard();
        let rows = vec![
            muni("131130", Some(139.70), Some(35.66), Some(243_883)),
            muni("131016", None, Some(35.69), None),
            muni("131024", Some(0.0), Some(0.0), None),
        ];
        let set = municipality_markers(&rows, &mapper);
        assert_eq!(set.markers.len(), 1);
        assert_eq!(set.skipped, 2);
        assert_eq!(set.markers[0].position, [139.70, 35.66]);
    }

    #[test]
    fn region_labels_drop_the_suffix() {
        let regions = vec![RegionSummary {
            region: "関東地方".to_string(),
            avg_score: Some(61.24),
            municipality_count: 316,
            prefecture_count: 7,
            total_population: None,
            prefectures: Vec::new(),
        }];
        let set = region_markers(&regions, &ScoreColorMapper::standard());
        assert_eq!(set.markers[0].label, "関東 61.2");
        assert_eq!(set.markers[0].position, [139.8, 35.8]);
    }
}
