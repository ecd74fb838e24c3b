//! Renderable legend rows.
//!
//! A swatch is two nested rectangles: the outer one painted with the
//! outline color, the inner one with the fill color, inset by the outline
//! width so the outline reads as a border.

use map_analysis_layer_models::{LegendEntry, Rgba};
use serde::Serialize;

/// Default swatch edge length, in points.
pub const DEFAULT_SWATCH_SIZE: f64 = 16.0;

/// An axis-aligned rectangle in swatch-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SwatchRect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width, never negative.
    pub width: f64,
    /// Height, never negative.
    pub height: f64,
}

/// A drawn legend swatch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Swatch {
    /// Border rectangle, painted with `outline`.
    pub outer: SwatchRect,
    /// Fill rectangle, painted with `fill`.
    pub inner: SwatchRect,
    /// Outline color.
    pub outline: Rgba,
    /// Fill color.
    pub fill: Rgba,
}

impl Swatch {
    /// Lays out a square swatch of edge `size` for a style's colors and
    /// outline width. The inset is capped at half the size so the inner
    /// rectangle never has negative extent.
    #[must_use]
    pub fn new(entry: &LegendEntry, size: f64) -> Self {
        let size = size.max(0.0);
        let style = entry.style;
        let inset = if style.has_outline() {
            style.outline_width().min(size / 2.0)
        } else {
            0.0
        };

        Self {
            outer: SwatchRect {
                x: 0.0,
                y: 0.0,
                width: size,
                height: size,
            },
            inner: SwatchRect {
                x: inset,
                y: inset,
                width: 2.0f64.mul_add(-inset, size),
                height: 2.0f64.mul_add(-inset, size),
            },
            outline: style.outline(),
            fill: style.fill(),
        }
    }

    /// Standalone SVG for the swatch.
    #[must_use]
    pub fn to_svg(&self) -> String {
        let size = self.outer.width;
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{size}\" height=\"{size}\" \
             viewBox=\"0 0 {size} {size}\">{}{}</svg>",
            svg_rect(&self.outer, self.outline),
            svg_rect(&self.inner, self.fill),
        )
    }
}

fn svg_rect(rect: &SwatchRect, color: Rgba) -> String {
    format!(
        "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\" fill-opacity=\"{}\"/>",
        rect.x,
        rect.y,
        rect.width,
        rect.height,
        color.to_hex(),
        color.opacity()
    )
}

/// One legend row: a swatch next to its label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendRow {
    /// Drawn swatch.
    pub swatch: Swatch,
    /// Label text.
    pub label: String,
}

/// Turns legend entries into rows ready for a report or on-screen legend.
#[must_use]
pub fn to_renderable_rows(entries: &[LegendEntry], swatch_size: f64) -> Vec<LegendRow> {
    entries
        .iter()
        .map(|entry| LegendRow {
            swatch: Swatch::new(entry, swatch_size),
            label: entry.label.clone(),
        })
        .collect()
}
