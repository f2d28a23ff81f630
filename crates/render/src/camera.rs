//! Where the camera goes for each drill-down step.

use foundation::LonLatBounds;

use crate::engine::CameraMove;

pub const NATIONAL_CENTER: [f64; 2] = [137.0, 38.0];
pub const NATIONAL_ZOOM: f64 = 4.5;

/// Degrees added around municipality points when fitting a prefecture.
pub const POINT_FIT_PADDING_DEG: f64 = 0.1;
pub const FIT_PADDING_PX: u32 = 50;
pub const PREFECTURE_FALLBACK_ZOOM: f64 = 8.0;

/// `(name, [lon, lat], zoom)`
const REGION_VIEWS: [(&str, [f64; 2], f64); 8] = [
    ("北海道地方", [141.35, 43.06], 6.0),
    ("東北地方", [140.0, 39.0], 6.5),
    ("関東地方", [139.8, 35.8], 7.5),
    ("中部地方", [137.5, 36.2], 7.0),
    ("近畿地方", [135.5, 34.7], 7.5),
    ("中国地方", [132.5, 34.6], 7.5),
    ("四国地方", [133.5, 33.7], 8.0),
    ("九州・沖縄地方", [130.7, 32.5], 7.0),
];

const PREFECTURE_CENTERS: [(&str, [f64; 2]); 47] = [
    ("北海道", [141.35, 43.06]),
    ("青森県", [140.74, 40.82]),
    ("岩手県", [141.15, 39.70]),
    ("宮城県", [140.87, 38.27]),
    ("秋田県", [140.10, 39.72]),
    ("山形県", [140.36, 38.24]),
    ("福島県", [140.47, 37.75]),
    ("茨城県", [140.45, 36.34]),
    ("栃木県", [139.88, 36.57]),
    ("群馬県", [139.06, 36.39]),
    ("埼玉県", [139.65, 35.86]),
    ("千葉県", [140.12, 35.61]),
    ("東京都", [139.69, 35.69]),
    ("神奈川県", [139.64, 35.45]),
    ("新潟県", [139.02, 37.90]),
    ("富山県", [137.21, 36.70]),
    ("石川県", [136.63, 36.59]),
    ("福井県", [136.22, 36.07]),
    ("山梨県", [138.57, 35.66]),
    ("長野県", [138.18, 36.65]),
    ("岐阜県", [136.72, 35.39]),
    ("静岡県", [138.38, 34.98]),
    ("愛知県", [136.91, 35.18]),
    ("三重県", [136.51, 34.73]),
    ("滋賀県", [135.87, 35.00]),
    ("京都府", [135.76, 35.02]),
    ("大阪府", [135.52, 34.69]),
    ("兵庫県", [135.18, 34.69]),
    ("奈良県", [135.83, 34.69]),
    ("和歌山県", [135.17, 34.23]),
    ("鳥取県", [134.24, 35.50]),
    ("島根県", [133.05, 35.47]),
    ("岡山県", [133.92, 34.66]),
    ("広島県", [132.46, 34.40]),
    ("山口県", [131.47, 34.19]),
    ("徳島県", [134.56, 34.07]),
    ("香川県", [134.04, 34.34]),
    ("愛媛県", [132.77, 33.84]),
    ("高知県", [133.53, 33.56]),
    ("福岡県", [130.42, 33.61]),
    ("佐賀県", [130.30, 33.25]),
    ("長崎県", [129.87, 32.75]),
    ("熊本県", [130.71, 32.79]),
    ("大分県", [131.61, 33.24]),
    ("宮崎県", [131.42, 31.91]),
    ("鹿児島県", [130.56, 31.56]),
    ("沖縄県", [127.68, 26.21]),
];

pub fn national_view() -> CameraMove {
    CameraMove::FlyTo {
        center: NATIONAL_CENTER,
        zoom: NATIONAL_ZOOM,
    }
}

/// Center and zoom of a region. Accepts the name with or without the
/// trailing "地方".
pub fn region_view(name: &str) -> Option<CameraMove> {
    let name = name.trim();
    REGION_VIEWS
        .iter()
        .find(|(n, _, _)| *n == name || n.strip_suffix("地方") == Some(name))
        .map(|&(_, center, zoom)| CameraMove::FlyTo { center, zoom })
}

pub fn prefecture_center(name: &str) -> Option<[f64; 2]> {
    let name = name.trim();
    PREFECTURE_CENTERS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|&(_, c)| c)
}

pub fn region_center(name: &str) -> Option<[f64; 2]> {
    match region_view(name)? {
        CameraMove::FlyTo { center, .. } => Some(center),
        CameraMove::FitBounds { bounds, .. } => Some(bounds.center()),
    }
}

/// Frames a prefecture: its polygon bounds when known, else the padded
/// bounds of its municipalities' coordinates, else its tabulated center.
pub fn prefecture_view<I>(
    name: &str,
    geometry: Option<LonLatBounds>,
    municipality_points: I,
) -> Option<CameraMove>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    if let Some(bounds) = geometry {
        return Some(CameraMove::FitBounds {
            bounds,
            padding_px: FIT_PADDING_PX,
        });
    }
    if let Some(bounds) = LonLatBounds::from_points(municipality_points) {
        return Some(CameraMove::FitBounds {
            bounds: bounds.padded(POINT_FIT_PADDING_DEG),
            padding_px: FIT_PADDING_PX,
        });
    }
    prefecture_center(name).map(|center| CameraMove::FlyTo {
        center,
        zoom: PREFECTURE_FALLBACK_ZOOM,
    })
}

#[cfg(test)]
mod tests {
    use super::{national_view, prefecture_center, prefecture_view, region_view};
    use crate::engine::CameraMove;
    use foundation::LonLatBounds;

    #[test]
    fn region_lookup_tolerates_short_names() {
        let full = region_view("関東地方").unwrap();
        assert_eq!(region_view("関東"), Some(full.clone()));
        assert_eq!(
            full,
            CameraMove::FlyTo {
                center: [139.8, 35.8],
                zoom: 7.5
            }
        );
        assert_eq!(region_view("月面"), None);
        assert!(matches!(national_view(), CameraMove::FlyTo { zoom, .. } if zoom == 4.5));
    }

    #[test]
    fn prefecture_prefers_geometry_then_points_then_center() {
        let geom = LonLatBounds::new([138.9, 35.5], [139.9, 35.9]);
        assert_eq!(
            prefecture_view("東京都", Some(geom), Vec::<(f64, f64)>::new()),
            Some(CameraMove::FitBounds {
                bounds: geom,
                padding_px: 50
            })
        );

        let Some(CameraMove::FitBounds { bounds, .. }) =
            prefecture_view("東京都", None, vec![(139.70, 35.66), (139.50, 35.70)])
        else {
            panic!("expected fit");
        };
        assert!((bounds.min[0] - 139.40).abs() < 1e-9);
        assert!((bounds.max[1] - 35.80).abs() < 1e-9);

        assert_eq!(
            prefecture_view("東京都", None, Vec::<(f64, f64)>::new()),
            Some(CameraMove::FlyTo {
                center: [139.69, 35.69],
                zoom: 8.0
            })
        );
        assert_eq!(prefecture_center("沖縄県"), Some([127.68, 26.21]));
    }
}
