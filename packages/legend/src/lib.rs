#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Legend aggregation.
//!
//! Collects the styles seen during one clipping pass into an ordered list
//! of legend entries. Entries are keyed by fill color only: the first
//! label seen for a color wins and later labels for the same fill are
//! dropped. Class-breaks legends end with a synthetic "No data" entry.

pub mod swatch;

use std::collections::BTreeSet;

use map_analysis_layer_models::{ClippedFeature, LegendEntry, RendererKind, Rgba, Style};

pub use swatch::{DEFAULT_SWATCH_SIZE, LegendRow, Swatch, SwatchRect, to_renderable_rows};

/// Label of the entry standing for unclassified features.
pub const NO_DATA_LABEL: &str = "No data";

/// Neutral gray fill of the "No data" entry.
pub const NO_DATA_FILL: Rgba = Rgba::opaque(200, 200, 200);

/// The synthetic "No data" entry: neutral gray fill, no outline.
#[must_use]
pub fn no_data_entry() -> LegendEntry {
    LegendEntry::new(NO_DATA_LABEL, Style::fill_only(NO_DATA_FILL))
}

/// Accumulates legend entries for one aggregation pass.
///
/// Insertion order is preserved. A fill color is only ever added once.
#[derive(Debug, Clone, Default)]
pub struct LegendAccumulator {
    entries: Vec<LegendEntry>,
    seen: BTreeSet<[u8; 4]>,
}

impl LegendAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `(style, label)` unless an entry with the same fill color is
    /// already present. Returns whether an entry was added.
    pub fn accumulate(&mut self, style: Style, label: impl Into<String>) -> bool {
        if !self.seen.insert(style.fill().key()) {
            return false;
        }
        self.entries.push(LegendEntry::new(label, style));
        true
    }

    /// Entries collected so far.
    #[must_use]
    pub fn entries(&self) -> &[LegendEntry] {
        &self.entries
    }

    /// Number of entries collected so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ends the pass. Class-breaks legends get the "No data" entry
    /// appended (unless its fill color is already taken).
    #[must_use]
    pub fn finish(mut self, kind: RendererKind) -> Vec<LegendEntry> {
        if kind == RendererKind::ClassBreaks {
            let entry = no_data_entry();
            if !self.accumulate(entry.style, entry.label) {
                log::debug!("\"{NO_DATA_LABEL}\" fill already used by another legend entry");
            }
        }
        self.entries
    }
}

/// Builds a legend from `(style, label)` pairs.
///
/// Empty input produces an empty legend, plus the "No data" entry when
/// `kind` is class-breaks.
#[must_use]
pub fn generate_legend_items<I, S>(items: I, kind: RendererKind) -> Vec<LegendEntry>
where
    I: IntoIterator<Item = (Style, S)>,
    S: Into<String>,
{
    let mut accumulator = LegendAccumulator::new();
    for (style, label) in items {
        accumulator.accumulate(style, label);
    }
    accumulator.finish(kind)
}

/// Builds the legend for the features that survived a clipping pass.
///
/// Unclassified features add nothing themselves; they are represented by
/// the "No data" entry of class-breaks legends.
#[must_use]
pub fn legend_for_clipped(features: &[ClippedFeature], kind: RendererKind) -> Vec<LegendEntry> {
    generate_legend_items(
        features.iter().filter_map(|feature| {
            feature
                .class_label
                .as_deref()
                .map(|label| (feature.style, label))
        }),
        kind,
    )
}

#[cfg(test)]
mod tests {
    use geo::MultiPolygon;
    use map_analysis_layer_models::Attributes;

    use super::*;

    fn style(r: u8, outline: u8) -> Style {
        Style::new(Rgba::opaque(r, 0, 0), Rgba::opaque(outline, outline, outline), 1.0)
    }

    fn clipped(style: Style, label: Option<&str>) -> ClippedFeature {
        ClippedFeature {
            attributes: Attributes::new(),
            geometry: MultiPolygon::new(vec![]),
            style,
            class_label: label.map(ToString::to_string),
        }
    }

    #[test]
    fn keeps_first_seen_order() {
        let entries = generate_legend_items(
            [(style(3, 0), "C"), (style(1, 0), "A"), (style(2, 0), "B")],
            RendererKind::UniqueValue,
        );
        let labels: Vec<&str> = entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, ["C", "A", "B"]);
    }

    #[test]
    fn same_fill_keeps_first_label() {
        let entries = generate_legend_items(
            [(style(1, 0), "Low"), (style(1, 90), "Also low")],
            RendererKind::UniqueValue,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].label, "Low");
        assert_eq!(entries[0].style.outline(), Rgba::opaque(0, 0, 0));
    }

    #[test]
    fn different_alpha_is_a_different_color() {
        let translucent = Style::fill_only(Rgba::new(1, 0, 0, 128));
        let entries = generate_legend_items(
            [(style(1, 0), "Opaque"), (translucent, "Translucent")],
            RendererKind::Simple,
        );
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn empty_input_is_empty_except_class_breaks() {
        let none: [(Style, &str); 0] = [];
        assert!(generate_legend_items(none, RendererKind::Simple).is_empty());
        assert!(generate_legend_items(none, RendererKind::UniqueValue).is_empty());

        let class_breaks = generate_legend_items(none, RendererKind::ClassBreaks);
        assert_eq!(class_breaks, vec![no_data_entry()]);
    }

    #[test]
    fn no_data_is_appended_last_for_class_breaks() {
        let entries = generate_legend_items(
            [(style(1, 0), "Low"), (style(2, 0), "High")],
            RendererKind::ClassBreaks,
        );
        assert_eq!(entries.len(), 3);
        let last = entries.last().unwrap();
        assert_eq!(last.label, NO_DATA_LABEL);
        assert_eq!(last.style.fill(), NO_DATA_FILL);
        assert!(!last.style.has_outline());
    }

    #[test]
    fn no_data_never_duplicates_a_fill() {
        let gray = Style::fill_only(NO_DATA_FILL);
        let entries = generate_legend_items([(gray, "Gray band")], RendererKind::ClassBreaks);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].label, "Gray band");
    }

    #[test]
    fn accumulate_reports_insertions() {
        let mut accumulator = LegendAccumulator::new();
        assert!(accumulator.accumulate(style(1, 0), "A"));
        assert!(!accumulator.accumulate(style(1, 0), "A again"));
        assert_eq!(accumulator.len(), 1);
        assert!(!accumulator.is_empty());
    }

    #[test]
    fn clipped_legend_skips_unclassified_features() {
        let features = vec![
            clipped(Style::unclassified(), None),
            clipped(style(9, 0), Some("Nine")),
            clipped(style(9, 0), Some("Nine again")),
        ];
        let entries = legend_for_clipped(&features, RendererKind::ClassBreaks);
        let labels: Vec<&str> = entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, ["Nine", NO_DATA_LABEL]);
    }
}
