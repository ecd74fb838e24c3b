//! Paginated feature queries with an optional spatial filter.
//!
//! Queries ask for `f=geojson` output and paginate with `resultOffset`
//! while the server reports `exceededTransferLimit`. A boundary filter is
//! sent as an Esri JSON geometry with `spatialRel=esriSpatialRelIntersects`.

use geo::orient::{Direction, Orient};
use geo::{LineString, Polygon};
use map_analysis_layer_models::{Boundary, Feature};

use crate::ArcGisError;

/// Page size used when the caller does not set one.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// The geometry parameters of a spatial query.
#[derive(Debug, Clone, PartialEq)]
pub struct EsriGeometryFilter {
    /// Esri JSON geometry.
    pub geometry: serde_json::Value,
    /// Esri geometry type name.
    pub geometry_type: &'static str,
}

impl EsriGeometryFilter {
    /// Converts a boundary into Esri JSON. Area boundaries become `rings`
    /// with clockwise exteriors and counter-clockwise holes, a single point
    /// becomes `x`/`y` and several points become `points`.
    #[must_use]
    pub fn from_boundary(boundary: &Boundary, wkid: u32) -> Self {
        let spatial_reference = serde_json::json!({ "wkid": wkid });
        match boundary {
            Boundary::Area(multi) => {
                let rings: Vec<serde_json::Value> =
                    multi.0.iter().flat_map(polygon_rings).collect();
                Self {
                    geometry: serde_json::json!({
                        "rings": rings,
                        "spatialReference": spatial_reference,
                    }),
                    geometry_type: "esriGeometryPolygon",
                }
            }
            Boundary::Points(points) => match points.0.as_slice() {
                [point] => Self {
                    geometry: serde_json::json!({
                        "x": point.x(),
                        "y": point.y(),
                        "spatialReference": spatial_reference,
                    }),
                    geometry_type: "esriGeometryPoint",
                },
                many => Self {
                    geometry: serde_json::json!({
                        "points": many.iter().map(|p| [p.x(), p.y()]).collect::<Vec<_>>(),
                        "spatialReference": spatial_reference,
                    }),
                    geometry_type: "esriGeometryMultipoint",
                },
            },
        }
    }

    /// Query-string parameters for this filter.
    #[must_use]
    pub fn params(&self, wkid: u32) -> Vec<(&'static str, String)> {
        vec![
            ("geometry", self.geometry.to_string()),
            ("geometryType", self.geometry_type.to_string()),
            ("spatialRel", "esriSpatialRelIntersects".to_string()),
            ("inSR", wkid.to_string()),
        ]
    }
}

/// Esri reads ring winding as exterior/hole, the reverse of `GeoJSON`.
fn polygon_rings(polygon: &Polygon<f64>) -> Vec<serde_json::Value> {
    let polygon = polygon.orient(Direction::Reversed);
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(ring_coordinates)
        .collect()
}

fn ring_coordinates(ring: &LineString<f64>) -> serde_json::Value {
    serde_json::Value::Array(
        ring.coords()
            .map(|c| serde_json::json!([c.x, c.y]))
            .collect(),
    )
}

/// One decoded response page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Features of the page, in server order.
    pub features: Vec<Feature>,
    /// Raw feature count, including any that could not be converted.
    pub raw_count: usize,
    /// Whether more pages follow.
    pub exceeded_transfer_limit: bool,
}

/// Decodes one `f=geojson` query response.
///
/// Features without geometry or with unconvertible geometry are skipped
/// with a warning.
///
/// # Errors
///
/// * [`ArcGisError::Json`] if the body is not JSON.
/// * [`ArcGisError::Api`] if the body is an ArcGIS error object.
/// * [`ArcGisError::Conversion`] if there is no features array.
pub fn parse_page(body: &str, wkid: Option<u32>) -> Result<Page, ArcGisError> {
    let json: serde_json::Value = serde_json::from_str(body)?;
    check_api_error(&json)?;

    let raw = json["features"]
        .as_array()
        .ok_or_else(|| ArcGisError::Conversion {
            message: "No features array in ArcGIS response".to_string(),
        })?;

    let mut features = Vec::with_capacity(raw.len());
    for value in raw {
        let converted = geojson::Feature::from_json_value(value.clone())
            .map_err(|e| e.to_string())
            .and_then(|f| Feature::from_geojson(f, wkid).map_err(|e| e.to_string()));
        match converted {
            Ok(feature) => features.push(feature),
            Err(e) => log::warn!("Skipping ArcGIS feature: {e}"),
        }
    }

    Ok(Page {
        features,
        raw_count: raw.len(),
        exceeded_transfer_limit: json["exceededTransferLimit"].as_bool().unwrap_or(false)
            || json["properties"]["exceededTransferLimit"]
                .as_bool()
                .unwrap_or(false),
    })
}

/// Fails with [`ArcGisError::Api`] if `json` is an ArcGIS error payload.
///
/// # Errors
///
/// See above.
pub fn check_api_error(json: &serde_json::Value) -> Result<(), ArcGisError> {
    if json.get("error").is_some() {
        return Err(ArcGisError::Api {
            message: json["error"]["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string(),
        });
    }
    Ok(())
}

/// Fetches every feature of `{layer_url}/query`, optionally restricted to
/// `filter`.
///
/// # Errors
///
/// Returns [`ArcGisError`] if a request fails, the server answers with a
/// non-success status or an error payload, or a page cannot be decoded.
pub async fn fetch_features(
    client: &reqwest::Client,
    layer_url: &str,
    filter: Option<&EsriGeometryFilter>,
    wkid: u32,
    page_size: u32,
) -> Result<Vec<Feature>, ArcGisError> {
    let query_url = format!("{}/query", layer_url.trim_end_matches('/'));
    let mut all_features = Vec::new();
    let mut offset = 0usize;

    loop {
        let mut params = vec![
            ("where", "1=1".to_string()),
            ("outFields", "*".to_string()),
            ("f", "geojson".to_string()),
            ("returnGeometry", "true".to_string()),
            ("outSR", wkid.to_string()),
            ("resultRecordCount", page_size.to_string()),
            ("resultOffset", offset.to_string()),
        ];
        if let Some(filter) = filter {
            params.extend(filter.params(wkid));
        }

        log::debug!("Querying {query_url} at offset {offset}");
        let resp = client.get(&query_url).query(&params).send().await?;
        if !resp.status().is_success() {
            return Err(ArcGisError::Api {
                message: format!("ArcGIS request failed with status {}", resp.status()),
            });
        }
        let body = resp.text().await?;

        let page = parse_page(&body, Some(wkid))?;
        if page.raw_count == 0 {
            break;
        }
        offset += page.raw_count;
        all_features.extend(page.features);

        if !page.exceeded_transfer_limit {
            break;
        }
    }

    log::info!("Fetched {} feature(s) from {query_url}", all_features.len());
    Ok(all_features)
}
