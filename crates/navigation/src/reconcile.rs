//! Joins business records to boundary features.
//!
//! Business municipality codes may carry a trailing check digit; geometry
//! uses the 5-digit canonical form. Both sides are reduced to canonical keys
//! before joining. Prefectures join on their name.

use std::collections::BTreeMap;

use formats::{MunicipalitySummary, PrefectureSummary, normalize_code};
use foundation::Rgba;
use layers::ScoreColorMapper;
use streaming::BoundaryIndex;

/// Canonical key → color, built first-wins.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorLookup {
    colors: BTreeMap<String, Rgba>,
    no_data: Rgba,
    collided: Vec<String>,
}

impl ColorLookup {
    pub fn get(&self, key: &str) -> Option<Rgba> {
        self.colors.get(key).copied()
    }

    /// Color of a feature; features without a record get the no-data color.
    pub fn color_for(&self, key: &str) -> Rgba {
        self.get(key).unwrap_or(self.no_data)
    }

    pub fn no_data(&self) -> Rgba {
        self.no_data
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn colors(&self) -> &BTreeMap<String, Rgba> {
        &self.colors
    }

    /// Records dropped because an earlier record had the same key.
    pub fn collisions(&self) -> usize {
        self.collided.len()
    }

    /// Keys that saw a collision, once per dropped record.
    pub fn collided_keys(&self) -> &[String] {
        &self.collided
    }

    /// Only the entries that have geometry; the rest stay off the map.
    pub fn colors_for_index(&self, index: &BoundaryIndex) -> BTreeMap<String, Rgba> {
        self.colors
            .iter()
            .filter(|(key, _)| index.contains(key))
            .map(|(key, color)| (key.clone(), *color))
            .collect()
    }
}

/// Outcome of one join, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub matched: usize,
    /// Lookup keys with no geometry feature.
    pub unmatched_records: Vec<String>,
    /// Geometry keys with no record; these render as no data.
    pub features_without_data: Vec<String>,
    pub collisions: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct CodeReconciler<'a> {
    mapper: &'a ScoreColorMapper,
}

impl<'a> CodeReconciler<'a> {
    pub fn new(mapper: &'a ScoreColorMapper) -> Self {
        Self { mapper }
    }

    /// Builds a lookup from already-canonical keys. The first record of a
    /// key wins; later ones are counted as collisions.
    pub fn build_lookup<I, K>(&self, records: I) -> ColorLookup
    where
        I: IntoIterator<Item = (K, Option<f64>)>,
        K: Into<String>,
    {
        let mut colors = BTreeMap::new();
        let mut collided = Vec::new();
        for (key, score) in records {
            let key = key.into();
            if colors.contains_key(&key) {
                tracing::debug!(key = %key, "duplicate canonical key; keeping first record");
                collided.push(key);
                continue;
            }
            colors.insert(key, self.mapper.color_of(score));
        }
        ColorLookup {
            colors,
            no_data: self.mapper.no_data_color(),
            collided,
        }
    }

    pub fn municipality_lookup(&self, rows: &[MunicipalitySummary]) -> ColorLookup {
        self.build_lookup(
            rows.iter()
                .map(|m| (normalize_code(&m.city_code), m.total_score)),
        )
    }

    pub fn prefecture_lookup(&self, rows: &[PrefectureSummary]) -> ColorLookup {
        self.build_lookup(
            rows.iter()
                .map(|p| (p.prefecture.trim().to_string(), p.avg_score)),
        )
    }

    pub fn reconcile(lookup: &ColorLookup, index: &BoundaryIndex) -> ReconcileReport {
        let mut report = ReconcileReport {
            collisions: lookup.collisions(),
            ..ReconcileReport::default()
        };
        for key in lookup.colors.keys() {
            if index.contains(key) {
                report.matched += 1;
            } else {
                report.unmatched_records.push(key.clone());
            }
        }
        report.features_without_data = index
            .keys()
            .into_iter()
            .filter(|key| !lookup.colors.contains_key(*key))
            .map(str::to_string)
            .collect();
        if !report.unmatched_records.is_empty() {
            tracing::debug!(
                count = report.unmatched_records.len(),
                "records without boundary geometry"
            );
        }
        report
    }

    /// Region owning a prefecture, by exact name. `None` blocks the step.
    pub fn resolve_region<'p>(
        prefecture: &str,
        prefectures: &'p [PrefectureSummary],
    ) -> Option<&'p str> {
        prefectures
            .iter()
            .find(|p| p.prefecture == prefecture)
            .map(|p| p.region.as_str())
    }
}
