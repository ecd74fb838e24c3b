//! Layer drawing-rule descriptors.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::{AttributeValue, FieldType, Style};

/// Which kind of drawing rule a layer uses.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RendererKind {
    /// One fixed symbol for every feature.
    Simple,
    /// Numeric ranges, each with its own symbol.
    ClassBreaks,
    /// Discrete attribute values, each with its own symbol.
    UniqueValue,
}

/// One `[min, max)` band of a class-breaks renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassBreak {
    /// Inclusive lower bound.
    pub min: f64,
    /// Exclusive upper bound.
    pub max: f64,
    /// Symbol for values in this band.
    pub style: Style,
    /// Legend label for this band.
    pub label: String,
}

impl ClassBreak {
    /// Whether `value` falls in `[min, max)`.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value < self.max
    }
}

/// One entry of a unique-value renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniqueValueInfo {
    /// Attribute value this entry matches (strict, type-aware equality).
    pub value: AttributeValue,
    /// Symbol for matching features.
    pub style: Style,
    /// Legend label for this entry.
    pub label: String,
}

/// How a layer's features are drawn.
///
/// Supplied by layer metadata and treated as read-only input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RendererDescriptor {
    /// A single fixed style.
    #[serde(rename_all = "camelCase")]
    Simple {
        /// The style applied to every feature.
        style: Style,
        /// Legend label.
        #[serde(default)]
        label: String,
    },
    /// Ordered numeric bands keyed by one attribute field.
    #[serde(rename_all = "camelCase")]
    ClassBreaks {
        /// Numeric attribute the bands classify.
        field: String,
        /// Bands in scan order.
        breaks: Vec<ClassBreak>,
    },
    /// Discrete values keyed by one attribute field.
    #[serde(rename_all = "camelCase")]
    UniqueValue {
        /// Attribute the values are matched against.
        field: String,
        /// Declared type of `field`.
        #[serde(default)]
        field_type: FieldType,
        /// Entries in scan order.
        values: Vec<UniqueValueInfo>,
    },
}

impl RendererDescriptor {
    /// The kind of this renderer.
    #[must_use]
    pub const fn kind(&self) -> RendererKind {
        match self {
            Self::Simple { .. } => RendererKind::Simple,
            Self::ClassBreaks { .. } => RendererKind::ClassBreaks,
            Self::UniqueValue { .. } => RendererKind::UniqueValue,
        }
    }

    /// The attribute field the renderer reads, if any.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Simple { .. } => None,
            Self::ClassBreaks { field, .. } | Self::UniqueValue { field, .. } => Some(field),
        }
    }
}
