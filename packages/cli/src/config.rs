//! Analysis configuration file.
//!
//! ```toml
//! title = "Site suitability"
//! subtitle = "Ward 6"
//! wkid = 4326
//!
//! [[datasets]]
//! id = "zoning"
//! name = "Zoning"
//! url = "https://example.com/arcgis/rest/services/Zoning/FeatureServer/0"
//!
//! [[datasets]]
//! id = "parcels"
//! name = "Parcels"
//! features = "parcels.geojson"
//! renderer = "parcels_renderer.json"
//! geometry_kind = "polygon"
//! ```
//!
//! Relative file paths are resolved against the config file's directory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use map_analysis_arcgis::{ArcGisFeatureSource, WGS84_WKID, parse_renderer};
use map_analysis_layer_models::{
    AttributeValue, Feature, FieldType, GeometryKind, LayerDescription, ModelError,
    RendererDescriptor,
};
use map_analysis_pipeline::{FeatureSource, LocalFeatureSource};
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while loading an analysis configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A `GeoJSON` or renderer file could not be parsed.
    #[error("Invalid GeoJSON in {path}: {message}")]
    GeoJson {
        /// File that failed.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// The config parsed but is inconsistent.
    #[error("Invalid config: {message}")]
    Invalid {
        /// What is wrong.
        message: String,
    },
}

/// Format of a local renderer file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RendererFormat {
    /// This tool's own renderer JSON.
    #[default]
    Native,
    /// An Esri `drawingInfo.renderer` object.
    Esri,
}

/// One dataset entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatasetConfig {
    /// Unique dataset id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// `ArcGIS` layer URL.
    pub url: Option<String>,
    /// Local `GeoJSON` feature collection.
    pub features: Option<PathBuf>,
    /// Local renderer JSON.
    pub renderer: Option<PathBuf>,
    /// Format of `renderer`.
    #[serde(default)]
    pub renderer_format: RendererFormat,
    /// Geometry type of the local features.
    pub geometry_kind: Option<GeometryKind>,
}

/// The whole analysis configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnalysisConfig {
    /// Report title.
    #[serde(default = "default_title")]
    pub title: String,
    /// Report subtitle.
    pub subtitle: Option<String>,
    /// Spatial reference of boundaries and queried features.
    #[serde(default = "default_wkid")]
    pub wkid: u32,
    /// Features per `ArcGIS` query page.
    pub page_size: Option<u32>,
    /// Datasets in analysis order.
    #[serde(default)]
    pub datasets: Vec<DatasetConfig>,
    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

fn default_title() -> String {
    "Map analysis".to_string()
}

const fn default_wkid() -> u32 {
    WGS84_WKID
}

impl AnalysisConfig {
    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] for malformed TOML and
    /// [`ConfigError::Invalid`] for duplicate ids or datasets that are
    /// neither remote nor fully local.
    pub fn parse(text: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::de::from_str(text)?;
        config.base_dir = base_dir.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// See [`AnalysisConfig::parse`]; also [`ConfigError::Io`] if the file
    /// cannot be read.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = read(path)?;
        Self::parse(
            &text,
            path.parent().unwrap_or_else(|| Path::new(".")),
        )
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut ids = BTreeSet::new();
        for dataset in &self.datasets {
            if !ids.insert(dataset.id.as_str()) {
                return Err(ConfigError::Invalid {
                    message: format!("duplicate dataset id {:?}", dataset.id),
                });
            }
            let local = dataset.features.is_some()
                && dataset.renderer.is_some()
                && dataset.geometry_kind.is_some();
            if dataset.url.is_some() == local {
                return Err(ConfigError::Invalid {
                    message: format!(
                        "dataset {:?} needs either a url or features, renderer and geometry_kind",
                        dataset.id
                    ),
                });
            }
        }
        Ok(())
    }

    /// Keeps only the datasets whose ids are listed, in config order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an id is not configured.
    pub fn retain_datasets(&mut self, ids: &[String]) -> Result<(), ConfigError> {
        if let Some(unknown) = ids
            .iter()
            .find(|id| !self.datasets.iter().any(|d| &d.id == *id))
        {
            return Err(ConfigError::Invalid {
                message: format!("unknown dataset {unknown:?}"),
            });
        }
        self.datasets.retain(|d| ids.contains(&d.id));
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Builds a feature source for every dataset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a local dataset's files cannot be read or
    /// parsed.
    pub fn build_sources(&self) -> Result<Vec<Arc<dyn FeatureSource>>, ConfigError> {
        let client = reqwest::Client::new();
        self.datasets
            .iter()
            .map(|dataset| -> Result<Arc<dyn FeatureSource>, ConfigError> {
                if let Some(url) = &dataset.url {
                    let mut source =
                        ArcGisFeatureSource::new(&dataset.id, &dataset.name, url, client.clone())
                            .with_wkid(self.wkid);
                    if let Some(page_size) = self.page_size {
                        source = source.with_page_size(page_size);
                    }
                    return Ok(Arc::new(source));
                }
                Ok(Arc::new(self.load_local(dataset)?))
            })
            .collect()
    }

    fn load_local(&self, dataset: &DatasetConfig) -> Result<LocalFeatureSource, ConfigError> {
        let (Some(features_path), Some(renderer_path), Some(geometry_kind)) = (
            &dataset.features,
            &dataset.renderer,
            &dataset.geometry_kind,
        ) else {
            return Err(ConfigError::Invalid {
                message: format!("dataset {:?} is not a local dataset", dataset.id),
            });
        };

        let features_path = self.resolve(features_path);
        let features = load_features(&features_path, Some(self.wkid))?;

        let renderer_path = self.resolve(renderer_path);
        let renderer_json: serde_json::Value =
            serde_json::from_str(&read(&renderer_path)?).map_err(|e| ConfigError::GeoJson {
                path: renderer_path.clone(),
                message: e.to_string(),
            })?;
        let renderer = match dataset.renderer_format {
            RendererFormat::Native => serde_json::from_value::<RendererDescriptor>(renderer_json)
                .map_err(|e| e.to_string()),
            RendererFormat::Esri => parse_renderer(&renderer_json, |field| {
                infer_field_type(&features, field)
            })
            .map_err(|e| e.to_string()),
        }
        .map_err(|message| ConfigError::Invalid {
            message: format!("renderer of dataset {:?}: {message}", dataset.id),
        })?;

        log::debug!(
            "Loaded {} local feature(s) for {}",
            features.len(),
            dataset.id
        );

        Ok(LocalFeatureSource::new(
            &dataset.id,
            &dataset.name,
            Some(LayerDescription {
                name: dataset.name.clone(),
                geometry_kind: geometry_kind.clone(),
                renderer,
                wkid: Some(self.wkid),
            }),
            features,
        ))
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a `GeoJSON` feature collection. Features without geometry are
/// skipped.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read or is not a feature
/// collection.
pub fn load_features(path: &Path, wkid: Option<u32>) -> Result<Vec<Feature>, ConfigError> {
    let geojson_error = |message: String| ConfigError::GeoJson {
        path: path.to_path_buf(),
        message,
    };

    let collection: geojson::FeatureCollection = read(path)?
        .parse()
        .map_err(|e: geojson::Error| geojson_error(e.to_string()))?;

    let mut features = Vec::with_capacity(collection.features.len());
    for feature in collection.features {
        match Feature::from_geojson(feature, wkid) {
            Ok(feature) => features.push(feature),
            Err(ModelError::MissingGeometry) => {
                log::warn!("Skipping feature without geometry in {}", path.display());
            }
            Err(e) => return Err(geojson_error(e.to_string())),
        }
    }
    Ok(features)
}

/// Guesses a field's type from the first non-null value in `features`.
fn infer_field_type(features: &[Feature], field: &str) -> FieldType {
    features
        .iter()
        .filter_map(|f| f.attribute(field))
        .find(|value| !value.is_null())
        .map_or(FieldType::Other, |value| match value {
            AttributeValue::Number(n) if n.fract().abs() < f64::EPSILON => FieldType::Integer,
            AttributeValue::Number(_) => FieldType::Double,
            AttributeValue::Text(_) => FieldType::Text,
            AttributeValue::Bool(_) | AttributeValue::Null => FieldType::Other,
        })
}
