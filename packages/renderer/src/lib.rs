#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Renderer interpretation.
//!
//! Given a layer's [`RendererDescriptor`] and one feature's attributes,
//! works out which symbol the feature is drawn with. A feature that no
//! class-break band or unique value matches is not an error: it gets the
//! caller's default style and is reported as unclassified, which is what
//! the "No data" legend entry stands for.

use map_analysis_layer_models::{
    AttributeValue, Attributes, ClassBreak, LegendEntry, RendererDescriptor, Style,
    UniqueValueInfo,
};

/// The style a feature resolved to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved<'a> {
    /// Style to draw the feature with.
    pub style: Style,
    /// Label of the matching class, `None` when unclassified.
    pub label: Option<&'a str>,
}

impl Resolved<'_> {
    /// Whether the default style was used because nothing matched.
    #[must_use]
    pub const fn is_unclassified(&self) -> bool {
        self.label.is_none()
    }
}

/// Resolves the style for a feature's attributes.
///
/// * `Simple`: always the fixed style.
/// * `ClassBreaks`: the first band with `min <= value < max`.
/// * `UniqueValue`: the first entry strictly equal to the attribute.
///
/// Anything unmatched (including a missing or wrongly typed attribute)
/// resolves to `default`.
#[must_use]
pub fn resolve_style<'a>(
    renderer: &'a RendererDescriptor,
    attributes: &Attributes,
    default: Style,
) -> Resolved<'a> {
    let matched = match renderer {
        RendererDescriptor::Simple { style, label } => {
            return Resolved {
                style: *style,
                label: Some(label.as_str()),
            };
        }
        RendererDescriptor::ClassBreaks { field, breaks } => attributes
            .get(field)
            .and_then(|value| classify(breaks, value))
            .map(|band| (band.style, band.label.as_str())),
        RendererDescriptor::UniqueValue { field, values, .. } => attributes
            .get(field)
            .and_then(|value| match_unique_value(values, value))
            .map(|info| (info.style, info.label.as_str())),
    };

    matched.map_or_else(
        || {
            log::trace!(
                "No {} class matched field {:?}; using default style",
                renderer.kind(),
                renderer.field().unwrap_or_default()
            );
            Resolved {
                style: default,
                label: None,
            }
        },
        |(style, label)| Resolved {
            style,
            label: Some(label),
        },
    )
}

/// [`resolve_style`] with [`Style::unclassified`] as the default.
#[must_use]
pub fn resolve_style_or_unclassified<'a>(
    renderer: &'a RendererDescriptor,
    attributes: &Attributes,
) -> Resolved<'a> {
    resolve_style(renderer, attributes, Style::unclassified())
}

/// Finds the band a value falls into. Non-numeric values never match.
#[must_use]
pub fn classify<'a>(breaks: &'a [ClassBreak], value: &AttributeValue) -> Option<&'a ClassBreak> {
    let value = value.as_f64()?;
    breaks.iter().find(|band| band.contains(value))
}

/// Finds the unique-value entry equal to `value`.
///
/// Equality is type-aware: a numeric attribute never matches a text entry
/// even when they print the same.
#[must_use]
pub fn match_unique_value<'a>(
    values: &'a [UniqueValueInfo],
    value: &AttributeValue,
) -> Option<&'a UniqueValueInfo> {
    values.iter().find(|info| info.value == *value)
}

/// Every legend entry the renderer declares, in declaration order.
///
/// Used for on-screen legends that describe the whole layer rather than
/// only the classes seen inside a boundary.
#[must_use]
pub fn declared_entries(renderer: &RendererDescriptor) -> Vec<LegendEntry> {
    match renderer {
        RendererDescriptor::Simple { style, label } => {
            vec![LegendEntry::new(label.clone(), *style)]
        }
        RendererDescriptor::ClassBreaks { breaks, .. } => breaks
            .iter()
            .map(|band| LegendEntry::new(band.label.clone(), band.style))
            .collect(),
        RendererDescriptor::UniqueValue { values, .. } => values
            .iter()
            .map(|info| LegendEntry::new(info.label.clone(), info.style))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use map_analysis_layer_models::{FieldType, Rgba};

    use super::*;

    fn style(r: u8) -> Style {
        Style::new(Rgba::opaque(r, 0, 0), Rgba::opaque(0, 0, 0), 1.0)
    }

    fn attrs(field: &str, value: AttributeValue) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert(field.to_string(), value);
        attributes
    }

    fn low_high() -> RendererDescriptor {
        RendererDescriptor::ClassBreaks {
            field: "DENSITY".to_string(),
            breaks: vec![
                ClassBreak {
                    min: 0.0,
                    max: 10.0,
                    style: style(10),
                    label: "Low".to_string(),
                },
                ClassBreak {
                    min: 10.0,
                    max: 20.0,
                    style: style(20),
                    label: "High".to_string(),
                },
            ],
        }
    }

    fn zones() -> RendererDescriptor {
        RendererDescriptor::UniqueValue {
            field: "ZONE".to_string(),
            field_type: FieldType::Integer,
            values: vec![
                UniqueValueInfo {
                    value: AttributeValue::Number(1.0),
                    style: style(1),
                    label: "Residential".to_string(),
                },
                UniqueValueInfo {
                    value: AttributeValue::Number(2.0),
                    style: style(2),
                    label: "Commercial".to_string(),
                },
            ],
        }
    }

    #[test]
    fn simple_always_returns_fixed_style() {
        let renderer = RendererDescriptor::Simple {
            style: style(5),
            label: "Parcels".to_string(),
        };
        let resolved = resolve_style_or_unclassified(&renderer, &Attributes::new());
        assert_eq!(resolved.style, style(5));
        assert_eq!(resolved.label, Some("Parcels"));
    }

    #[test]
    fn class_breaks_picks_matching_band() {
        let renderer = low_high();
        let resolved = resolve_style_or_unclassified(
            &renderer,
            &attrs("DENSITY", AttributeValue::Number(15.0)),
        );
        assert_eq!(resolved.style, style(20));
        assert_eq!(resolved.label, Some("High"));
    }

    #[test]
    fn class_breaks_lower_bound_inclusive_upper_exclusive() {
        let renderer = low_high();
        let at_ten = resolve_style_or_unclassified(
            &renderer,
            &attrs("DENSITY", AttributeValue::Number(10.0)),
        );
        assert_eq!(at_ten.label, Some("High"));

        let at_twenty = resolve_style_or_unclassified(
            &renderer,
            &attrs("DENSITY", AttributeValue::Number(20.0)),
        );
        assert!(at_twenty.is_unclassified());
    }

    #[test]
    fn class_breaks_out_of_range_uses_default() {
        let renderer = low_high();
        let resolved = resolve_style_or_unclassified(
            &renderer,
            &attrs("DENSITY", AttributeValue::Number(25.0)),
        );
        assert_eq!(resolved.style, Style::unclassified());
        assert!(resolved.is_unclassified());
    }

    #[test]
    fn class_breaks_missing_or_text_field_uses_default() {
        let renderer = low_high();
        let fallback = style(99);

        let missing = resolve_style(&renderer, &Attributes::new(), fallback);
        assert_eq!(missing.style, fallback);
        assert!(missing.is_unclassified());

        let text = resolve_style(
            &renderer,
            &attrs("DENSITY", AttributeValue::Text("15".to_string())),
            fallback,
        );
        assert_eq!(text.style, fallback);
    }

    #[test]
    fn class_breaks_nan_is_unclassified() {
        let renderer = low_high();
        let resolved = resolve_style_or_unclassified(
            &renderer,
            &attrs("DENSITY", AttributeValue::Number(f64::NAN)),
        );
        assert!(resolved.is_unclassified());
    }

    #[test]
    fn unique_value_matches_exactly() {
        let renderer = zones();
        let resolved =
            resolve_style_or_unclassified(&renderer, &attrs("ZONE", AttributeValue::Number(2.0)));
        assert_eq!(resolved.style, style(2));
        assert_eq!(resolved.label, Some("Commercial"));
    }

    #[test]
    fn unique_value_unmatched_falls_back() {
        let renderer = zones();
        let resolved =
            resolve_style_or_unclassified(&renderer, &attrs("ZONE", AttributeValue::Number(7.0)));
        assert_eq!(resolved.style, Style::unclassified());
        assert_eq!(resolved.style.fill(), Rgba::opaque(211, 211, 211));
        assert_eq!(resolved.style.outline(), Rgba::opaque(169, 169, 169));
    }

    #[test]
    fn unique_value_does_not_coerce_text_to_number() {
        let renderer = zones();
        let resolved = resolve_style_or_unclassified(
            &renderer,
            &attrs("ZONE", AttributeValue::Text("1".to_string())),
        );
        assert!(resolved.is_unclassified());
    }

    #[test]
    fn declared_entries_follow_renderer_order() {
        let entries = declared_entries(&zones());
        let labels: Vec<&str> = entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, ["Residential", "Commercial"]);
    }

    #[test]
    fn resolves_from_deserialized_renderer() {
        let renderer: RendererDescriptor = serde_json::from_value(serde_json::json!({
            "type": "classBreaks",
            "field": "POP",
            "breaks": [
                {"min": 0, "max": 100, "label": "Sparse",
                 "style": {"fill": {"r": 1, "g": 1, "b": 1, "a": 255}}},
                {"min": 100, "max": 1000, "label": "Dense",
                 "style": {"fill": {"r": 2, "g": 2, "b": 2, "a": 255}}}
            ]
        }))
        .unwrap();

        let resolved =
            resolve_style_or_unclassified(&renderer, &attrs("POP", AttributeValue::Number(500.0)));
        assert_eq!(resolved.label, Some("Dense"));
    }
}
