/// Axis-aligned lon/lat bounding box in degrees.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LonLatBounds {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl LonLatBounds {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        LonLatBounds { min, max }
    }

    pub fn from_point(lon: f64, lat: f64) -> Self {
        LonLatBounds {
            min: [lon, lat],
            max: [lon, lat],
        }
    }

    /// Smallest box containing every finite point; `None` when there is none.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut out: Option<Self> = None;
        for (lon, lat) in points {
            if !lon.is_finite() || !lat.is_finite() {
                continue;
            }
            match out.as_mut() {
                Some(b) => b.extend(lon, lat),
                None => out = Some(Self::from_point(lon, lat)),
            }
        }
        out
    }

    pub fn extend(&mut self, lon: f64, lat: f64) {
        self.min[0] = self.min[0].min(lon);
        self.min[1] = self.min[1].min(lat);
        self.max[0] = self.max[0].max(lon);
        self.max[1] = self.max[1].max(lat);
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut out = *self;
        out.extend(other.min[0], other.min[1]);
        out.extend(other.max[0], other.max[1]);
        out
    }

    /// Grows the box by `degrees` on every side.
    pub fn padded(&self, degrees: f64) -> Self {
        LonLatBounds {
            min: [self.min[0] - degrees, self.min[1] - degrees],
            max: [self.max[0] + degrees, self.max[1] + degrees],
        }
    }

    pub fn center(&self) -> [f64; 2] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
        ]
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min[0] && lon <= self.max[0] && lat >= self.min[1] && lat <= self.max[1]
    }
}

#[cfg(test)]
mod tests {
    use super::LonLatBounds;

    #[test]
    fn from_points_skips_non_finite() {
        let b = LonLatBounds::from_points([(139.0, 35.0), (f64::NAN, 1.0), (140.0, 36.5)]).unwrap();
        assert_eq!(b.min, [139.0, 35.0]);
        assert_eq!(b.max, [140.0, 36.5]);
        assert!(LonLatBounds::from_points(Vec::<(f64, f64)>::new()).is_none());
    }

    #[test]
    fn padding_and_center() {
        let b = LonLatBounds::new([139.0, 35.0], [140.0, 36.0]).padded(0.1);
        assert!((b.min[0] - 138.9).abs() < 1e-9);
        assert!((b.max[1] - 36.1).abs() < 1e-9);
        let c = b.center();
        assert!((c[0] - 139.5).abs() < 1e-9);
        assert!(b.contains(139.5, 35.5));
    }
}
