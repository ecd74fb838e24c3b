#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `ArcGIS` REST datasets for the analysis pipeline.
//!
//! Reads layer metadata (geometry type, renderer, field types, spatial
//! reference) from `{layer}?f=json` and queries features from
//! `{layer}/query` as `GeoJSON`, restricted to the analysis boundary.
//! Requests are not retried; a failure surfaces as a query failure of the
//! dataset.

pub mod metadata;
pub mod query;

use async_trait::async_trait;
use map_analysis_clip::SpatialFilter;
use map_analysis_layer_models::{Feature, LayerDescription};
use map_analysis_pipeline::{FeatureSource, QueryError};
use thiserror::Error;

pub use metadata::{LayerInfo, parse_color, parse_field_type, parse_renderer};
pub use query::{DEFAULT_PAGE_SIZE, EsriGeometryFilter, fetch_features};

/// Spatial reference used for boundaries and results unless configured.
pub const WGS84_WKID: u32 = 4326;

/// Errors that can occur while talking to an `ArcGIS` service.
#[derive(Debug, Error)]
pub enum ArcGisError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The service answered with an error.
    #[error("ArcGIS API error: {message}")]
    Api {
        /// Message reported by the service.
        message: String,
    },

    /// The response could not be converted.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

impl From<ArcGisError> for QueryError {
    fn from(error: ArcGisError) -> Self {
        Self::with_source(error.to_string(), error)
    }
}

/// A feature layer served by `ArcGIS` REST.
#[derive(Debug, Clone)]
pub struct ArcGisFeatureSource {
    id: String,
    name: String,
    layer_url: String,
    wkid: u32,
    page_size: u32,
    client: reqwest::Client,
}

impl ArcGisFeatureSource {
    /// Creates a source for the layer at `layer_url`
    /// (e.g. `.../FeatureServer/0`).
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        layer_url: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            layer_url: layer_url.into(),
            wkid: WGS84_WKID,
            page_size: DEFAULT_PAGE_SIZE,
            client,
        }
    }

    /// Sets the spatial reference of the boundary and of returned features.
    #[must_use]
    pub const fn with_wkid(mut self, wkid: u32) -> Self {
        self.wkid = wkid;
        self
    }

    /// Sets the number of features requested per page.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Layer endpoint URL.
    #[must_use]
    pub fn layer_url(&self) -> &str {
        &self.layer_url
    }

    /// Fetches and decodes the layer metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ArcGisError`] if the request fails or the response is not
    /// valid layer metadata.
    pub async fn fetch_layer_info(&self) -> Result<LayerInfo, ArcGisError> {
        let resp = self
            .client
            .get(&self.layer_url)
            .query(&[("f", "json")])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ArcGisError::Api {
                message: format!("ArcGIS request failed with status {}", resp.status()),
            });
        }

        let json: serde_json::Value = serde_json::from_str(&resp.text().await?)?;
        query::check_api_error(&json)?;
        Ok(serde_json::from_value(json)?)
    }
}

#[async_trait]
impl FeatureSource for ArcGisFeatureSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn describe(&self) -> Result<Option<LayerDescription>, QueryError> {
        let info = self.fetch_layer_info().await?;
        Ok(info.to_description()?)
    }

    async fn query(&self, filter: Option<&SpatialFilter>) -> Result<Vec<Feature>, QueryError> {
        let esri_filter =
            filter.map(|f| EsriGeometryFilter::from_boundary(f.boundary(), self.wkid));
        Ok(fetch_features(
            &self.client,
            &self.layer_url,
            esri_filter.as_ref(),
            self.wkid,
            self.page_size,
        )
        .await?)
    }
}
