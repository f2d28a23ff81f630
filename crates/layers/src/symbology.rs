use foundation::Rgba;
use serde::{Deserialize, Serialize};

/// One contiguous score range mapped to a display color.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorBucket {
    pub lower_bound: f64,
    pub color: Rgba,
    pub label: String,
}

impl ColorBucket {
    pub fn new(lower_bound: f64, color: Rgba, label: impl Into<String>) -> Self {
        Self {
            lower_bound,
            color,
            label: label.into(),
        }
    }
}

/// Built-in bucket tables. A deployment runs exactly one of them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleKind {
    /// 0–100 score scale.
    #[default]
    Standard,
    /// 1–54 score scale of the improved scoring model.
    Narrow,
}

impl std::str::FromStr for ScaleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(ScaleKind::Standard),
            "narrow" => Ok(ScaleKind::Narrow),
            other => Err(format!("unknown score scale: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScaleError {
    Empty,
    NonFiniteBound { index: usize },
    NotDescending { index: usize },
    NoDataColorCollides { index: usize },
}

impl std::fmt::Display for ScaleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleError::Empty => write!(f, "score scale needs at least one bucket"),
            ScaleError::NonFiniteBound { index } => {
                write!(f, "bucket {index} has a non-finite lower bound")
            }
            ScaleError::NotDescending { index } => {
                write!(f, "bucket {index} does not descend below its predecessor")
            }
            ScaleError::NoDataColorCollides { index } => {
                write!(f, "no-data color equals the color of bucket {index}")
            }
        }
    }
}

impl std::error::Error for ScaleError {}

/// Fill and border color of one feature.
///
/// Both come from the same classification so a polygon never shows a border
/// from a different bucket than its fill.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FeatureStyle {
    pub fill: Rgba,
    pub line: Rgba,
    pub fill_opacity: f32,
}

impl FeatureStyle {
    pub const BASE_OPACITY: f32 = 0.7;
    pub const HOVER_OPACITY: f32 = 0.9;

    pub fn from_color(color: Rgba) -> Self {
        Self {
            fill: color,
            line: color,
            fill_opacity: Self::BASE_OPACITY,
        }
    }
}

/// Classifies scores into colors.
///
/// Buckets are held in descending `lower_bound` order. A score takes the
/// color of the first bucket whose lower bound it reaches; positive scores
/// below the lowest bound clamp to the lowest bucket. Missing, non-finite
/// and non-positive scores are "no data".
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreColorMapper {
    buckets: Vec<ColorBucket>,
    no_data: Rgba,
    no_data_label: String,
}

impl ScoreColorMapper {
    pub fn new(
        buckets: Vec<ColorBucket>,
        no_data: Rgba,
        no_data_label: impl Into<String>,
    ) -> Result<Self, ScaleError> {
        if buckets.is_empty() {
            return Err(ScaleError::Empty);
        }
        for (index, bucket) in buckets.iter().enumerate() {
            if !bucket.lower_bound.is_finite() {
                return Err(ScaleError::NonFiniteBound { index });
            }
            if index > 0 && bucket.lower_bound >= buckets[index - 1].lower_bound {
                return Err(ScaleError::NotDescending { index });
            }
            if bucket.color == no_data {
                return Err(ScaleError::NoDataColorCollides { index });
            }
        }
        Ok(Self {
            buckets,
            no_data,
            no_data_label: no_data_label.into(),
        })
    }

    pub fn for_kind(kind: ScaleKind) -> Self {
        match kind {
            ScaleKind::Standard => Self::standard(),
            ScaleKind::Narrow => Self::narrow(),
        }
    }

    /// 0–100 scale used by the drill-down dashboard legend.
    pub fn standard() -> Self {
        Self {
            buckets: vec![
                ColorBucket::new(80.0, Rgba::rgb(0x00, 0x3f, 0x5c), "80-100 先進"),
                ColorBucket::new(65.0, Rgba::rgb(0x2f, 0x9e, 0x8f), "65-79 進行中"),
                ColorBucket::new(50.0, Rgba::rgb(0xa8, 0xd0, 0x8d), "50-64 平均的"),
                ColorBucket::new(30.0, Rgba::rgb(0xf9, 0xa0, 0x3f), "30-49 遅延"),
                ColorBucket::new(0.0, Rgba::rgb(0xe6, 0x39, 0x46), "0-29 初期段階"),
            ],
            no_data: Rgba::rgb(0xcc, 0xcc, 0xcc),
            no_data_label: "データなし".to_string(),
        }
    }

    /// 1–54 scale; most municipalities land in the 34–37 band.
    pub fn narrow() -> Self {
        Self {
            buckets: vec![
                ColorBucket::new(48.0, Rgba::rgb(0x00, 0x3d, 0x82), "48+ 最適"),
                ColorBucket::new(42.0, Rgba::rgb(0x0e, 0x71, 0xeb), "42-47 有望"),
                ColorBucket::new(38.0, Rgba::rgb(0x2d, 0x8c, 0xff), "38-41 良好"),
                ColorBucket::new(34.0, Rgba::rgb(0x89, 0xc4, 0xf4), "34-37 平均"),
                ColorBucket::new(28.0, Rgba::rgb(0xff, 0xb8, 0x4d), "28-33 やや課題"),
                ColorBucket::new(22.0, Rgba::rgb(0xff, 0x8a, 0x65), "22-27 課題あり"),
                ColorBucket::new(15.0, Rgba::rgb(0xf2, 0x50, 0x22), "15-21 要対策"),
                ColorBucket::new(1.0, Rgba::rgb(0xd1, 0x34, 0x38), "1-14 要改善"),
            ],
            no_data: Rgba::rgb(0x9c, 0xa3, 0xaf),
            no_data_label: "データなし".to_string(),
        }
    }

    pub fn buckets(&self) -> &[ColorBucket] {
        &self.buckets
    }

    pub fn no_data_color(&self) -> Rgba {
        self.no_data
    }

    pub fn no_data_label(&self) -> &str {
        &self.no_data_label
    }

    /// Index into `buckets()` (0 = top bucket); `None` means no data.
    pub fn bucket_index(&self, score: Option<f64>) -> Option<usize> {
        let score = score.filter(|s| s.is_finite() && *s > 0.0)?;
        let idx = self
            .buckets
            .iter()
            .position(|b| score >= b.lower_bound)
            .unwrap_or(self.buckets.len() - 1);
        Some(idx)
    }

    /// Ordinal where higher means a better bucket; 0 is the lowest bucket.
    pub fn rank(&self, score: Option<f64>) -> Option<usize> {
        self.bucket_index(score)
            .map(|idx| self.buckets.len() - 1 - idx)
    }

    pub fn color_of(&self, score: Option<f64>) -> Rgba {
        match self.bucket_index(score) {
            Some(idx) => self.buckets[idx].color,
            None => self.no_data,
        }
    }

    pub fn style_of(&self, score: Option<f64>) -> FeatureStyle {
        FeatureStyle::from_color(self.color_of(score))
    }
}

impl Default for ScoreColorMapper {
    fn default() -> Self {
        Self::standard()
    }
}
