//! Colors and drawing styles.

use serde::{Deserialize, Serialize};

/// An 8-bit-per-channel RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rgba {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel (255 = opaque).
    pub a: u8,
}

impl Rgba {
    /// Fully transparent black, used for "no outline".
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    /// Creates a color from its four channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Creates a fully opaque color.
    #[must_use]
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// The channel tuple used as a legend de-duplication key.
    #[must_use]
    pub const fn key(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Whether the color draws nothing.
    #[must_use]
    pub const fn is_transparent(self) -> bool {
        self.a == 0
    }

    /// `#rrggbb` form, ignoring alpha.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Alpha as a fraction in `0.0..=1.0`.
    #[must_use]
    pub fn opacity(self) -> f64 {
        f64::from(self.a) / 255.0
    }
}

impl std::fmt::Display for Rgba {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rgba({}, {}, {}, {})",
            self.r,
            self.g,
            self.b,
            (self.opacity() * 1000.0).round() / 1000.0
        )
    }
}

/// How a feature is drawn: fill, outline color and outline width.
///
/// The outline width is never negative; [`Style::new`] clamps negative or
/// non-finite widths to zero and deserialization goes through the same
/// path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawStyle", rename_all = "camelCase")]
pub struct Style {
    fill: Rgba,
    outline: Rgba,
    outline_width: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStyle {
    fill: Rgba,
    #[serde(default = "transparent")]
    outline: Rgba,
    #[serde(default)]
    outline_width: f64,
}

const fn transparent() -> Rgba {
    Rgba::TRANSPARENT
}

impl From<RawStyle> for Style {
    fn from(raw: RawStyle) -> Self {
        Self::new(raw.fill, raw.outline, raw.outline_width)
    }
}

impl Style {
    /// Creates a style, clamping the outline width to be non-negative.
    #[must_use]
    pub fn new(fill: Rgba, outline: Rgba, outline_width: f64) -> Self {
        let outline_width = if outline_width.is_finite() && outline_width > 0.0 {
            outline_width
        } else {
            0.0
        };

        Self {
            fill,
            outline,
            outline_width,
        }
    }

    /// A fill-only style with no outline.
    #[must_use]
    pub fn fill_only(fill: Rgba) -> Self {
        Self::new(fill, Rgba::TRANSPARENT, 0.0)
    }

    /// Style applied to features no renderer class matched: light-gray
    /// fill with a dark-gray outline.
    #[must_use]
    pub fn unclassified() -> Self {
        Self::new(Rgba::opaque(211, 211, 211), Rgba::opaque(169, 169, 169), 1.0)
    }

    /// Fill color.
    #[must_use]
    pub const fn fill(&self) -> Rgba {
        self.fill
    }

    /// Outline color.
    #[must_use]
    pub const fn outline(&self) -> Rgba {
        self.outline
    }

    /// Outline width, always `>= 0`.
    #[must_use]
    pub const fn outline_width(&self) -> f64 {
        self.outline_width
    }

    /// Whether an outline would actually be drawn.
    #[must_use]
    pub fn has_outline(&self) -> bool {
        self.outline_width > 0.0 && !self.outline.is_transparent()
    }
}
