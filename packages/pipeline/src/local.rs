//! In-memory feature source.

use async_trait::async_trait;
use map_analysis_clip::SpatialFilter;
use map_analysis_layer_models::{Feature, LayerDescription};

use crate::{FeatureSource, QueryError};

/// A dataset whose features and layer metadata are already loaded.
#[derive(Debug, Clone)]
pub struct LocalFeatureSource {
    id: String,
    name: String,
    layer: Option<LayerDescription>,
    features: Vec<Feature>,
}

impl LocalFeatureSource {
    /// Creates a source. A `None` layer stands for a dataset without a
    /// layer view.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        layer: Option<LayerDescription>,
        features: Vec<Feature>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            layer,
            features,
        }
    }

    /// All loaded features, unfiltered.
    #[must_use]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }
}

#[async_trait]
impl FeatureSource for LocalFeatureSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn describe(&self) -> Result<Option<LayerDescription>, QueryError> {
        Ok(self.layer.clone())
    }

    async fn query(&self, filter: Option<&SpatialFilter>) -> Result<Vec<Feature>, QueryError> {
        Ok(match filter {
            Some(filter) => filter.apply(&self.features).into_iter().cloned().collect(),
            None => self.features.clone(),
        })
    }
}
