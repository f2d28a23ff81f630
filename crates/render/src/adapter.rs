use std::collections::{BTreeMap, BTreeSet};

use foundation::Rgba;
use layers::{FeatureStyle, PolygonLayer};
use serde_json::{Value, json};

use crate::engine::{EngineError, LayerKind, LayerSpec, MapEngine};

/// Property injected into every keyed boundary feature; color expressions
/// match on it.
pub const KEY_PROPERTY: &str = "dx_key";

/// Feature-state flag toggled by hover.
pub const HOVER_STATE: &str = "hover";

/// What one polygon layer should look like.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerStyle {
    pub colors: BTreeMap<String, Rgba>,
    pub no_data: Rgba,
    /// `(property, value)` equality filter.
    pub filter: Option<(String, String)>,
}

/// Declarative target state of every polygon layer. Layers without an
/// entry are hidden.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredStyle {
    layers: BTreeMap<PolygonLayer, LayerStyle>,
}

impl DesiredStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(
        mut self,
        layer: PolygonLayer,
        colors: BTreeMap<String, Rgba>,
        no_data: Rgba,
    ) -> Self {
        self.layers.insert(
            layer,
            LayerStyle {
                colors,
                no_data,
                filter: None,
            },
        );
        self
    }

    pub fn filtered(
        mut self,
        layer: PolygonLayer,
        property: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        if let Some(style) = self.layers.get_mut(&layer) {
            style.filter = Some((property.into(), value.into()));
        }
        self
    }

    pub fn layer(&self, layer: PolygonLayer) -> Option<&LayerStyle> {
        self.layers.get(&layer)
    }

    pub fn is_visible(&self, layer: PolygonLayer) -> bool {
        self.layers.contains_key(&layer)
    }
}

/// `match` expression over the join key with the no-data color as fallback.
pub fn color_expression(colors: &BTreeMap<String, Rgba>, no_data: Rgba) -> Value {
    if colors.is_empty() {
        return Value::String(no_data.to_hex());
    }
    let mut expr = vec![json!("match"), json!(["get", KEY_PROPERTY])];
    for (key, color) in colors {
        expr.push(Value::String(key.clone()));
        expr.push(Value::String(color.to_hex()));
    }
    expr.push(Value::String(no_data.to_hex()));
    Value::Array(expr)
}

pub fn hover_opacity_expression() -> Value {
    json!([
        "case",
        ["boolean", ["feature-state", HOVER_STATE], false],
        FeatureStyle::HOVER_OPACITY,
        FeatureStyle::BASE_OPACITY
    ])
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StyleReport {
    pub applied: usize,
    /// Mutations dropped because their layer did not exist.
    pub skipped: usize,
}

/// Translates `DesiredStyle` into guarded engine mutations.
#[derive(Debug, Default)]
pub struct StyleAdapter {
    installed: BTreeSet<PolygonLayer>,
}

impl StyleAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_installed(&self, layer: PolygonLayer) -> bool {
        self.installed.contains(&layer)
    }

    /// Adds (or refreshes) the source and its fill and line layers, hidden.
    pub fn install<E: MapEngine>(
        &mut self,
        engine: &mut E,
        layer: PolygonLayer,
        data: Value,
    ) -> Result<(), EngineError> {
        let source = layer.source_id();
        if engine.has_source(source) {
            engine.set_source_data(source, data)?;
        } else {
            engine.add_source(source, data)?;
        }
        for (id, kind) in [
            (layer.fill_id(), LayerKind::Fill),
            (layer.line_id(), LayerKind::Line),
        ] {
            if !engine.has_layer(id) {
                engine.add_layer(LayerSpec {
                    id: id.to_string(),
                    source: source.to_string(),
                    kind,
                })?;
            }
            engine.set_layout_property(id, "visibility", json!("none"))?;
        }
        engine.set_paint_property(layer.fill_id(), "fill-opacity", hover_opacity_expression())?;
        engine.set_paint_property(layer.line_id(), "line-width", json!(1.0))?;
        self.installed.insert(layer);
        tracing::debug!(layer = source, "polygon layer installed");
        Ok(())
    }

    /// Applies `desired` to every polygon layer, skipping absent layers.
    pub fn apply<E: MapEngine>(&self, engine: &mut E, desired: &DesiredStyle) -> StyleReport {
        let mut report = StyleReport::default();
        for layer in PolygonLayer::ALL {
            let style = desired.layer(layer);
            let visibility = if style.is_some() { "visible" } else { "none" };
            for id in [layer.fill_id(), layer.line_id()] {
                guarded(engine, id, &mut report, |e| {
                    e.set_layout_property(id, "visibility", json!(visibility))
                });
            }
            let Some(style) = style else {
                continue;
            };
            let colors = color_expression(&style.colors, style.no_data);
            let filter = style
                .filter
                .as_ref()
                .map(|(property, value)| json!(["==", ["get", property], value]));

            guarded(engine, layer.fill_id(), &mut report, |e| {
                e.set_paint_property(layer.fill_id(), "fill-color", colors.clone())
            });
            guarded(engine, layer.line_id(), &mut report, |e| {
                e.set_paint_property(layer.line_id(), "line-color", colors.clone())
            });
            for id in [layer.fill_id(), layer.line_id()] {
                guarded(engine, id, &mut report, |e| e.set_filter(id, filter.clone()));
            }
        }
        report
    }

    /// Removes every installed layer and its source.
    pub fn teardown<E: MapEngine>(&mut self, engine: &mut E) -> Result<(), EngineError> {
        for layer in std::mem::take(&mut self.installed) {
            for id in [layer.fill_id(), layer.line_id()] {
                if engine.has_layer(id) {
                    engine.remove_layer(id)?;
                }
            }
            if engine.has_source(layer.source_id()) {
                engine.remove_source(layer.source_id())?;
            }
        }
        Ok(())
    }
}

fn guarded<E, F>(engine: &mut E, layer_id: &str, report: &mut StyleReport, mutate: F)
where
    E: MapEngine,
    F: FnOnce(&mut E) -> Result<(), EngineError>,
{
    if !engine.has_layer(layer_id) {
        tracing::debug!(layer = layer_id, "layer absent; style mutation skipped");
        report.skipped += 1;
        return;
    }
    match mutate(engine) {
        Ok(()) => report.applied += 1,
        Err(e) => {
            tracing::warn!(layer = layer_id, error = %e, "style mutation failed");
            report.skipped += 1;
        }
    }
}
