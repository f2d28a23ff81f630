use foundation::Rgba;

use crate::symbology::ScoreColorMapper;

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub color: Rgba,
}

/// Static legend derived from the active scale: buckets top-down, then the
/// no-data entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Legend {
    pub title: String,
    pub entries: Vec<LegendEntry>,
}

impl Legend {
    pub fn for_mapper(title: impl Into<String>, mapper: &ScoreColorMapper) -> Self {
        let mut entries: Vec<LegendEntry> = mapper
            .buckets()
            .iter()
            .map(|b| LegendEntry {
                label: b.label.clone(),
                color: b.color,
            })
            .collect();
        entries.push(LegendEntry {
            label: mapper.no_data_label().to_string(),
            color: mapper.no_data_color(),
        });
        Self {
            title: title.into(),
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Legend;
    use crate::symbology::ScoreColorMapper;
    use pretty_assertions::assert_eq;

    #[test]
    fn standard_legend_order() {
        let legend = Legend::for_mapper("DXスコア", &ScoreColorMapper::standard());
        let labels: Vec<&str> = legend.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "80-100 先進",
                "65-79 進行中",
                "50-64 平均的",
                "30-49 遅延",
                "0-29 初期段階",
                "データなし",
            ]
        );
        assert_eq!(legend.entries[0].color.to_hex(), "#003f5c");
    }
}
