/// Drill-down depth. Ordered from the root down.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ViewLevel {
    #[default]
    National,
    Region,
    Prefecture,
    /// Detail overlay on top of the prefecture map.
    Municipality,
}

impl ViewLevel {
    pub const ALL: [ViewLevel; 4] = [
        ViewLevel::National,
        ViewLevel::Region,
        ViewLevel::Prefecture,
        ViewLevel::Municipality,
    ];

    pub fn parent(self) -> Option<ViewLevel> {
        match self {
            ViewLevel::National => None,
            ViewLevel::Region => Some(ViewLevel::National),
            ViewLevel::Prefecture => Some(ViewLevel::Region),
            ViewLevel::Municipality => Some(ViewLevel::Prefecture),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ViewLevel::National => "national",
            ViewLevel::Region => "region",
            ViewLevel::Prefecture => "prefecture",
            ViewLevel::Municipality => "municipality",
        }
    }
}

impl std::fmt::Display for ViewLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
