#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Analysis report assembly.
//!
//! Builds a paginated document definition: a full-bleed title page, then a
//! two-column page with the map snapshot beside a dataset summary, followed
//! by one legend section per dataset. Rendering the definition to PDF is
//! left to whichever engine consumes the JSON.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use map_analysis_legend::LegendRow;
use serde::{Deserialize, Serialize};

/// Paper size of the rendered document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PageSize {
    /// US Letter.
    #[default]
    Letter,
    /// ISO A4.
    A4,
    /// US Legal.
    Legal,
}

/// Page orientation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Taller than wide.
    #[default]
    Portrait,
    /// Wider than tall.
    Landscape,
}

/// The captured map snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapImage {
    /// Image file the renderer should embed.
    pub path: PathBuf,
    /// Pixel width, if known.
    pub width: Option<u32>,
    /// Pixel height, if known.
    pub height: Option<u32>,
}

/// One line of the dataset summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRow {
    /// Dataset display name.
    pub dataset: String,
    /// Features inside the boundary.
    pub feature_count: usize,
    /// Total clipped area, for polygon datasets.
    pub clipped_area: Option<f64>,
    /// Failure notice, when the dataset could not be analysed.
    pub error: Option<String>,
}

/// Legend rows of one dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendSection {
    /// Section heading, usually the dataset name.
    pub heading: Option<String>,
    /// Rows in legend order.
    pub rows: Vec<LegendRow>,
}

/// Options that do not change the page structure.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOptions {
    /// Line printed under the title.
    pub subtitle: Option<String>,
    /// Paper size.
    pub page_size: PageSize,
    /// Orientation.
    pub orientation: Orientation,
    /// Dataset summary shown beside the map.
    pub summary: Vec<SummaryRow>,
    /// Timestamp printed on the title page.
    pub generated_at: DateTime<Utc>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            subtitle: None,
            page_size: PageSize::default(),
            orientation: Orientation::default(),
            summary: Vec::new(),
            generated_at: Utc::now(),
        }
    }
}

/// A content node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Block {
    /// Full-bleed title block.
    #[serde(rename_all = "camelCase")]
    Title {
        /// Report title.
        text: String,
        /// Optional second line.
        subtitle: Option<String>,
        /// Generation timestamp, already formatted.
        generated_at: String,
    },
    /// Side-by-side columns of equal width.
    Columns {
        /// Column contents.
        columns: Vec<Self>,
    },
    /// Embedded image.
    Image {
        /// Image file.
        path: PathBuf,
        /// Pixel width, if known.
        width: Option<u32>,
        /// Pixel height, if known.
        height: Option<u32>,
    },
    /// Section heading.
    Heading {
        /// Heading text.
        text: String,
    },
    /// A simple table.
    Table {
        /// Header cells.
        headers: Vec<String>,
        /// Body rows.
        rows: Vec<Vec<String>>,
    },
    /// A two-column legend row: swatch then label.
    #[serde(rename_all = "camelCase")]
    LegendRow {
        /// Swatch as standalone SVG.
        swatch_svg: String,
        /// Swatch geometry and colors.
        swatch: map_analysis_legend::Swatch,
        /// Label text.
        label: String,
    },
}

/// One page of content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    /// Content in reading order.
    pub blocks: Vec<Block>,
}

/// The assembled report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Paper size.
    pub page_size: PageSize,
    /// Orientation.
    pub page_orientation: Orientation,
    /// Pages in order.
    pub pages: Vec<Page>,
}

impl Document {
    /// Pretty-printed JSON for the PDF renderer.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Number of pages.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Builds a report with a single, untitled legend.
#[must_use]
pub fn build_report(
    title: &str,
    map_image: Option<&MapImage>,
    legend_rows: &[LegendRow],
    options: &ReportOptions,
) -> Document {
    build_sectioned_report(
        title,
        map_image,
        &[LegendSection {
            heading: None,
            rows: legend_rows.to_vec(),
        }],
        options,
    )
}

/// Builds a report with one legend section per dataset.
///
/// A missing map image is not an error: the image column is left out and
/// the rest of the report is assembled as usual.
#[must_use]
pub fn build_sectioned_report(
    title: &str,
    map_image: Option<&MapImage>,
    sections: &[LegendSection],
    options: &ReportOptions,
) -> Document {
    let title_page = Page {
        blocks: vec![Block::Title {
            text: title.to_string(),
            subtitle: options.subtitle.clone(),
            generated_at: options
                .generated_at
                .format("%Y-%m-%d %H:%M UTC")
                .to_string(),
        }],
    };

    let mut columns = Vec::with_capacity(2);
    match map_image {
        Some(image) => columns.push(Block::Image {
            path: image.path.clone(),
            width: image.width,
            height: image.height,
        }),
        None => log::warn!("No map image available; report will omit the map snapshot"),
    }
    if !options.summary.is_empty() {
        columns.push(summary_table(&options.summary));
    }

    let mut blocks = Vec::new();
    if !columns.is_empty() {
        blocks.push(Block::Columns { columns });
    }

    for section in sections {
        if let Some(heading) = &section.heading {
            blocks.push(Block::Heading {
                text: heading.clone(),
            });
        }
        blocks.extend(section.rows.iter().map(|row| Block::LegendRow {
            swatch_svg: row.swatch.to_svg(),
            swatch: row.swatch,
            label: row.label.clone(),
        }));
    }

    Document {
        page_size: options.page_size,
        page_orientation: options.orientation,
        pages: vec![title_page, Page { blocks }],
    }
}

fn summary_table(summary: &[SummaryRow]) -> Block {
    Block::Table {
        headers: vec![
            "Dataset".to_string(),
            "Features".to_string(),
            "Clipped area".to_string(),
        ],
        rows: summary
            .iter()
            .map(|row| {
                let area = match (&row.error, row.clipped_area) {
                    (Some(error), _) => error.clone(),
                    (None, Some(area)) => format!("{area:.2}"),
                    (None, None) => "-".to_string(),
                };
                vec![row.dataset.clone(), row.feature_count.to_string(), area]
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use map_analysis_legend::{DEFAULT_SWATCH_SIZE, no_data_entry, to_renderable_rows};

    use super::*;

    fn options() -> ReportOptions {
        ReportOptions {
            subtitle: Some("Ward 6".to_string()),
            generated_at: Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap(),
            ..ReportOptions::default()
        }
    }

    fn image() -> MapImage {
        MapImage {
            path: PathBuf::from("map.png"),
            width: Some(800),
            height: Some(600),
        }
    }

    fn rows() -> Vec<LegendRow> {
        to_renderable_rows(&[no_data_entry()], DEFAULT_SWATCH_SIZE)
    }

    #[test]
    fn first_page_is_only_the_title() {
        let doc = build_report("Zoning", Some(&image()), &rows(), &options());
        assert_eq!(doc.page_count(), 2);
        assert_eq!(
            doc.pages[0].blocks,
            vec![Block::Title {
                text: "Zoning".to_string(),
                subtitle: Some("Ward 6".to_string()),
                generated_at: "2024-03-01 14:30 UTC".to_string(),
            }]
        );
    }

    #[test]
    fn second_page_puts_map_in_a_column_then_legend() {
        let doc = build_report("Zoning", Some(&image()), &rows(), &options());
        let blocks = &doc.pages[1].blocks;
        let Block::Columns { columns } = &blocks[0] else {
            panic!("expected columns first, got {:?}", blocks[0]);
        };
        assert!(matches!(
            &columns[0],
            Block::Image { path, .. } if path == &PathBuf::from("map.png")
        ));
        assert!(matches!(&blocks[1], Block::LegendRow { label, .. } if label == "No data"));
    }

    #[test]
    fn missing_image_is_not_fatal() {
        let doc = build_report("Zoning", None, &rows(), &options());
        let blocks = &doc.pages[1].blocks;
        assert_eq!(blocks.len(), 1);
        assert!(matches!(&blocks[0], Block::LegendRow { .. }));
    }

    #[test]
    fn summary_sits_beside_the_map() {
        let mut opts = options();
        opts.summary = vec![
            SummaryRow {
                dataset: "Parcels".to_string(),
                feature_count: 12,
                clipped_area: Some(1234.567),
                error: None,
            },
            SummaryRow {
                dataset: "Hydrants".to_string(),
                feature_count: 0,
                clipped_area: None,
                error: Some("Query failed".to_string()),
            },
        ];

        let doc = build_report("Zoning", Some(&image()), &[], &opts);
        let Block::Columns { columns } = &doc.pages[1].blocks[0] else {
            panic!("expected columns");
        };
        assert_eq!(columns.len(), 2);
        let Block::Table { rows, .. } = &columns[1] else {
            panic!("expected summary table");
        };
        assert_eq!(rows[0], ["Parcels", "12", "1234.57"]);
        assert_eq!(rows[1], ["Hydrants", "0", "Query failed"]);
    }

    #[test]
    fn sections_get_headings() {
        let sections = vec![
            LegendSection {
                heading: Some("Parcels".to_string()),
                rows: rows(),
            },
            LegendSection {
                heading: Some("Flood zones".to_string()),
                rows: Vec::new(),
            },
        ];
        let doc = build_sectioned_report("Zoning", None, &sections, &options());
        let headings: Vec<&str> = doc.pages[1]
            .blocks
            .iter()
            .filter_map(|b| match b {
                Block::Heading { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(headings, ["Parcels", "Flood zones"]);
    }

    #[test]
    fn serializes_with_type_tags() {
        let doc = build_report("Zoning", Some(&image()), &rows(), &options());
        let json: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert_eq!(json["pageSize"], "LETTER");
        assert_eq!(json["pageOrientation"], "portrait");
        assert_eq!(json["pages"][0]["blocks"][0]["type"], "title");
        assert_eq!(json["pages"][1]["blocks"][1]["type"], "legendRow");
        assert!(
            json["pages"][1]["blocks"][1]["swatchSvg"]
                .as_str()
                .unwrap()
                .starts_with("<svg")
        );
    }
}
