use crate::level::ViewLevel;

/// Label of the root breadcrumb.
pub const NATIONAL_LABEL: &str = "全国";

/// What the user drilled into.
///
/// Fields are only reachable through setters that clear everything below
/// the field being set, so `municipality ⇒ prefecture ⇒ region` always holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionPath {
    region: Option<String>,
    prefecture: Option<String>,
    municipality: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crumb {
    pub level: ViewLevel,
    pub label: String,
}

impl SelectionPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn prefecture(&self) -> Option<&str> {
        self.prefecture.as_deref()
    }

    pub fn municipality(&self) -> Option<&str> {
        self.municipality.as_deref()
    }

    pub(crate) fn set_region(&mut self, region: impl Into<String>) {
        self.region = Some(region.into());
        self.prefecture = None;
        self.municipality = None;
    }

    /// Returns `false` (and changes nothing) without a region.
    pub(crate) fn set_prefecture(&mut self, prefecture: impl Into<String>) -> bool {
        if self.region.is_none() {
            return false;
        }
        self.prefecture = Some(prefecture.into());
        self.municipality = None;
        true
    }

    /// Returns `false` (and changes nothing) without a prefecture.
    pub(crate) fn set_municipality(&mut self, code: impl Into<String>) -> bool {
        if self.prefecture.is_none() {
            return false;
        }
        self.municipality = Some(code.into());
        true
    }

    /// Clears every field that belongs to a level deeper than `level`.
    pub(crate) fn clear_below(&mut self, level: ViewLevel) {
        if level < ViewLevel::Municipality {
            self.municipality = None;
        }
        if level < ViewLevel::Prefecture {
            self.prefecture = None;
        }
        if level < ViewLevel::Region {
            self.region = None;
        }
    }

    pub fn is_consistent(&self) -> bool {
        (self.municipality.is_none() || self.prefecture.is_some())
            && (self.prefecture.is_none() || self.region.is_some())
    }

    /// True when no field deeper than `level` is set.
    pub fn is_clear_below(&self, level: ViewLevel) -> bool {
        (level >= ViewLevel::Municipality || self.municipality.is_none())
            && (level >= ViewLevel::Prefecture || self.prefecture.is_none())
            && (level >= ViewLevel::Region || self.region.is_none())
    }

    /// Breadcrumb trail from the root down to `level`.
    pub fn crumbs(&self, level: ViewLevel) -> Vec<Crumb> {
        let mut out = vec![Crumb {
            level: ViewLevel::National,
            label: NATIONAL_LABEL.to_string(),
        }];
        let deeper = [
            (ViewLevel::Region, &self.region),
            (ViewLevel::Prefecture, &self.prefecture),
            (ViewLevel::Municipality, &self.municipality),
        ];
        for (crumb_level, value) in deeper {
            if crumb_level > level {
                break;
            }
            let Some(label) = value else {
                break;
            };
            out.push(Crumb {
                level: crumb_level,
                label: label.clone(),
            });
        }
        out
    }
}
