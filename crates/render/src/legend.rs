use layers::{Legend, ScoreColorMapper};

/// One swatch row for the legend collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegendRow {
    pub swatch: String,
    pub label: String,
}

pub fn legend_rows(legend: &Legend) -> Vec<LegendRow> {
    legend
        .entries
        .iter()
        .map(|e| LegendRow {
            swatch: e.color.to_hex(),
            label: e.label.clone(),
        })
        .collect()
}

/// Plain-text legend, one `#rrggbb label` row per line under the title.
pub fn render_legend_text(mapper: &ScoreColorMapper, title: &str) -> String {
    let legend = Legend::for_mapper(title, mapper);
    let mut out = legend.title.clone();
    for row in legend_rows(&legend) {
        out.push('\n');
        out.push_str(&row.swatch);
        out.push(' ');
        out.push_str(&row.label);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::render_legend_text;
    use layers::ScoreColorMapper;

    #[test]
    fn text_legend_ends_with_no_data() {
        let text = render_legend_text(&ScoreColorMapper::standard(), "DXスコア");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "DXスコア");
        assert_eq!(lines[1], "#003f5c 80-100 先進");
        assert_eq!(lines.last().copied(), Some("#cccccc データなし"));
        assert_eq!(lines.len(), 7);
    }
}
