//! Boundary inputs: a `GeoJSON` file or a clicked point with a buffer.

use std::path::Path;

use geo::Point;
use map_analysis_layer_models::Boundary;

use crate::config::ConfigError;

/// Sides of the polygon approximating a buffered point.
pub const DEFAULT_BUFFER_SEGMENTS: usize = 64;

/// Reads a boundary from a `GeoJSON` geometry, feature or feature
/// collection.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::GeoJson`] if it holds no usable boundary.
pub fn boundary_from_file(path: &Path) -> Result<Boundary, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let boundary = Boundary::from_geojson_str(&text).map_err(|e| ConfigError::GeoJson {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    log::debug!("Loaded boundary from {}", path.display());
    Ok(boundary)
}

/// A clicked point, buffered by `radius` when it is positive.
#[must_use]
pub fn boundary_from_point(x: f64, y: f64, radius: f64, segments: usize) -> Boundary {
    Boundary::around_point(Point::new(x, y), radius, segments)
}

/// Parses `x,y` command-line coordinates.
///
/// # Errors
///
/// Returns a message if the text is not two comma-separated numbers.
pub fn parse_point(text: &str) -> Result<(f64, f64), String> {
    let (x, y) = text
        .split_once(',')
        .ok_or_else(|| format!("expected x,y but got {text:?}"))?;
    let parse = |value: &str| {
        value
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid coordinate {value:?}: {e}"))
    };
    Ok((parse(x)?, parse(y)?))
}
