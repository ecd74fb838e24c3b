//! Layer metadata (`{layer}?f=json`) and Esri drawing-info conversion.
//!
//! Esri renderers are converted into [`RendererDescriptor`]s. Colors arrive
//! as `[r, g, b, a]` arrays with 0-255 components. Unique values are typed
//! by the renderer field's declared type so that numeric fields compare as
//! numbers and text fields as text.

use map_analysis_layer_models::{
    AttributeValue, ClassBreak, FieldType, GeometryKind, LayerDescription, RendererDescriptor,
    Rgba, Style, UniqueValueInfo,
};
use serde::Deserialize;

use crate::ArcGisError;

/// Layer metadata as returned by the REST endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerInfo {
    /// Layer name.
    #[serde(default)]
    pub name: String,
    /// Esri geometry type, absent for tables.
    pub geometry_type: Option<String>,
    /// Drawing rules, absent for layers without a view.
    pub drawing_info: Option<DrawingInfo>,
    /// Attribute fields.
    #[serde(default)]
    pub fields: Vec<FieldInfo>,
    /// Native spatial reference.
    pub spatial_reference: Option<SpatialReference>,
    /// Extent, whose spatial reference some services report instead.
    pub extent: Option<Extent>,
}

/// `drawingInfo` block.
#[derive(Debug, Clone, Deserialize)]
pub struct DrawingInfo {
    /// Raw Esri renderer.
    pub renderer: Option<serde_json::Value>,
}

/// One attribute field.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldInfo {
    /// Field name.
    pub name: String,
    /// Esri field type, e.g. `esriFieldTypeString`.
    #[serde(rename = "type")]
    pub field_type: String,
}

/// A spatial reference.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpatialReference {
    /// Well-known id.
    pub wkid: Option<u32>,
    /// Latest well-known id.
    pub latest_wkid: Option<u32>,
}

/// Layer extent.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extent {
    /// Extent spatial reference.
    pub spatial_reference: Option<SpatialReference>,
}

impl LayerInfo {
    /// Spatial reference id of the layer, if reported anywhere.
    #[must_use]
    pub fn wkid(&self) -> Option<u32> {
        self.spatial_reference
            .or_else(|| self.extent.and_then(|e| e.spatial_reference))
            .and_then(|sr| sr.latest_wkid.or(sr.wkid))
    }

    fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .or_else(|| self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name)))
    }

    /// Declared type of `field`. Field names are matched case-insensitively.
    #[must_use]
    pub fn field_type(&self, field: &str) -> FieldType {
        self.field(field)
            .map_or(FieldType::Other, |f| parse_field_type(&f.field_type))
    }

    /// The layer's own spelling of `field`, which is what query results
    /// key their attributes by.
    #[must_use]
    pub fn field_name(&self, field: &str) -> Option<&str> {
        self.field(field).map(|f| f.name.as_str())
    }

    /// Converts the metadata into a layer description. Layers without a
    /// geometry type or renderer have no layer view and yield `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ArcGisError::Conversion`] if the renderer cannot be
    /// converted.
    pub fn to_description(&self) -> Result<Option<LayerDescription>, ArcGisError> {
        let Some(geometry_type) = &self.geometry_type else {
            log::warn!("Layer {:?} has no geometry type", self.name);
            return Ok(None);
        };
        let Some(renderer) = self.drawing_info.as_ref().and_then(|d| d.renderer.as_ref()) else {
            log::warn!("Layer {:?} has no drawing info", self.name);
            return Ok(None);
        };

        let mut renderer = parse_renderer(renderer, |field| self.field_type(field))?;
        if let RendererDescriptor::ClassBreaks { field, .. }
        | RendererDescriptor::UniqueValue { field, .. } = &mut renderer
            && let Some(name) = self.field_name(field).filter(|name| *name != field.as_str())
        {
            log::debug!("Renderer field {field:?} matched layer field {name:?}");
            *field = name.to_string();
        }

        Ok(Some(LayerDescription {
            name: self.name.clone(),
            geometry_kind: GeometryKind::parse(geometry_type),
            renderer,
            wkid: self.wkid(),
        }))
    }
}

/// Maps an Esri field type name onto [`FieldType`].
#[must_use]
pub fn parse_field_type(esri_type: &str) -> FieldType {
    match esri_type.trim_start_matches("esriFieldType") {
        "String" | "GUID" | "GlobalID" => FieldType::Text,
        "SmallInteger" | "Integer" | "BigInteger" | "OID" => FieldType::Integer,
        "Single" | "Double" => FieldType::Double,
        _ => FieldType::Other,
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum EsriRenderer {
    Simple {
        symbol: Option<EsriSymbol>,
        #[serde(default)]
        label: String,
    },
    #[serde(rename_all = "camelCase")]
    ClassBreaks {
        field: String,
        min_value: Option<f64>,
        #[serde(default)]
        class_break_infos: Vec<EsriClassBreakInfo>,
    },
    #[serde(rename_all = "camelCase")]
    UniqueValue {
        field1: String,
        #[serde(default)]
        unique_value_infos: Vec<EsriUniqueValueInfo>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EsriClassBreakInfo {
    class_min_value: Option<f64>,
    class_max_value: f64,
    #[serde(default)]
    label: String,
    symbol: Option<EsriSymbol>,
}

#[derive(Debug, Deserialize)]
struct EsriUniqueValueInfo {
    value: serde_json::Value,
    #[serde(default)]
    label: String,
    symbol: Option<EsriSymbol>,
}

#[derive(Debug, Default, Deserialize)]
struct EsriSymbol {
    #[serde(rename = "type")]
    kind: Option<String>,
    color: Option<Vec<f64>>,
    outline: Option<EsriOutline>,
}

#[derive(Debug, Deserialize)]
struct EsriOutline {
    color: Option<Vec<f64>>,
    #[serde(default)]
    width: f64,
}

impl EsriSymbol {
    fn to_style(&self) -> Style {
        let fill = self.color.as_deref().map_or(Rgba::TRANSPARENT, parse_color);
        self.outline.as_ref().map_or_else(
            || Style::fill_only(fill),
            |outline| {
                Style::new(
                    fill,
                    outline.color.as_deref().map_or(Rgba::TRANSPARENT, parse_color),
                    outline.width,
                )
            },
        )
    }

    /// Picture markers and fills carry an image instead of a color.
    fn is_picture(&self) -> bool {
        matches!(self.kind.as_deref(), Some("esriPMS" | "esriPFS"))
    }
}

/// Style of the `index`th class. Picture symbols get a generated fill so
/// that their classes stay distinct in the legend.
fn symbol_style(symbol: Option<&EsriSymbol>, index: usize) -> Style {
    match symbol {
        Some(symbol) if symbol.is_picture() && symbol.color.is_none() => {
            let fill = picture_fill(index);
            log::warn!("Picture symbol for class {index} has no color; using {fill}");
            Style::fill_only(fill)
        }
        Some(symbol) => symbol.to_style(),
        None => EsriSymbol::default().to_style(),
    }
}

/// Spreads hues by the golden angle so neighbouring classes contrast.
fn picture_fill(index: usize) -> Rgba {
    #[allow(clippy::cast_precision_loss)]
    let hue = (index as f64 * 137.508) % 360.0;
    let (saturation, value) = (0.6, 0.85);
    let chroma = value * saturation;
    let x = chroma * (1.0 - ((hue / 60.0) % 2.0 - 1.0).abs());
    let (r, g, b) = match hue {
        h if h < 60.0 => (chroma, x, 0.0),
        h if h < 120.0 => (x, chroma, 0.0),
        h if h < 180.0 => (0.0, chroma, x),
        h if h < 240.0 => (0.0, x, chroma),
        h if h < 300.0 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = value - chroma;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let channel = |c: f64| ((c + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba::opaque(channel(r), channel(g), channel(b))
}

/// Converts an Esri `[r, g, b, a]` color. Missing components default to
/// 0, except alpha which defaults to opaque.
#[must_use]
pub fn parse_color(components: &[f64]) -> Rgba {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let channel = |i: usize, default: u8| {
        components
            .get(i)
            .map_or(default, |c| c.round().clamp(0.0, 255.0) as u8)
    };
    Rgba::new(channel(0, 0), channel(1, 0), channel(2, 0), channel(3, 255))
}

/// Converts an Esri JSON renderer into a [`RendererDescriptor`].
///
/// `field_type` reports the declared type of the unique-value field.
///
/// # Errors
///
/// Returns [`ArcGisError::Conversion`] for unsupported renderer types or
/// malformed renderer JSON.
pub fn parse_renderer(
    renderer: &serde_json::Value,
    field_type: impl Fn(&str) -> FieldType,
) -> Result<RendererDescriptor, ArcGisError> {
    let esri: EsriRenderer =
        serde_json::from_value(renderer.clone()).map_err(|e| ArcGisError::Conversion {
            message: format!(
                "Unsupported renderer {}: {e}",
                renderer["type"].as_str().unwrap_or("without type")
            ),
        })?;

    Ok(match esri {
        EsriRenderer::Simple { symbol, label } => RendererDescriptor::Simple {
            style: symbol_style(symbol.as_ref(), 0),
            label,
        },
        EsriRenderer::ClassBreaks {
            field,
            min_value,
            class_break_infos,
        } => {
            let mut lower = min_value.unwrap_or(f64::NEG_INFINITY);
            let breaks = class_break_infos
                .into_iter()
                .enumerate()
                .map(|(i, info)| {
                    let min = info.class_min_value.unwrap_or(lower);
                    lower = info.class_max_value;
                    ClassBreak {
                        min,
                        max: info.class_max_value,
                        style: symbol_style(info.symbol.as_ref(), i),
                        label: info.label,
                    }
                })
                .collect();
            RendererDescriptor::ClassBreaks { field, breaks }
        }
        EsriRenderer::UniqueValue {
            field1,
            unique_value_infos,
        } => {
            let declared = field_type(&field1);
            let values = unique_value_infos
                .into_iter()
                .enumerate()
                .map(|(i, info)| UniqueValueInfo {
                    value: typed_value(&info.value, declared),
                    style: symbol_style(info.symbol.as_ref(), i),
                    label: info.label,
                })
                .collect();
            RendererDescriptor::UniqueValue {
                field: field1,
                field_type: declared,
                values,
            }
        }
    })
}

/// Types a declared unique value by the field's type. Esri reports these
/// values as strings regardless of the field type.
fn typed_value(value: &serde_json::Value, field_type: FieldType) -> AttributeValue {
    match (value, field_type) {
        (serde_json::Value::String(s), FieldType::Integer | FieldType::Double) => s
            .trim()
            .parse::<f64>()
            .map_or_else(|_| AttributeValue::Text(s.clone()), AttributeValue::Number),
        (serde_json::Value::Number(n), FieldType::Text) => AttributeValue::Text(n.to_string()),
        (other, _) => AttributeValue::from(other),
    }
}
