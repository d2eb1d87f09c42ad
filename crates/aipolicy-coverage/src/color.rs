//! Coverage-to-color strategies.
//!
//! Every strategy is a pure function of its input except [`AtlasColors`],
//! which memoizes one generated color per canonical name for the lifetime
//! of the instance. Masked coverage always receives the strategy's no-data
//! color.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use aipolicy_core::AreaId;
use serde::{Deserialize, Serialize};

use crate::coverage::{CountryCoverage, CoverageLevel};

/// Visualization mode selecting one of the color strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorMode {
    #[default]
    Semantic,
    RgbPure,
    AreaDominant,
    Atlas,
}

impl ColorMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ColorMode::Semantic => "semantic",
            ColorMode::RgbPure => "rgb-pure",
            ColorMode::AreaDominant => "area-dominant",
            ColorMode::Atlas => "atlas",
        }
    }
}

impl std::fmt::Display for ColorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ColorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "semantic" => Ok(ColorMode::Semantic),
            "rgb-pure" => Ok(ColorMode::RgbPure),
            "area-dominant" => Ok(ColorMode::AreaDominant),
            "atlas" => Ok(ColorMode::Atlas),
            other => Err(format!(
                "unknown color mode '{other}' (expected semantic, rgb-pure, area-dominant or atlas)"
            )),
        }
    }
}

/// Maps one coverage entry to a hex display color.
pub trait ColorStrategy {
    fn color_for(&self, coverage: &CountryCoverage) -> String;

    /// Color used for countries without data or hidden by an area filter.
    fn no_data_color(&self) -> &'static str;
}

/// Colors for the four coverage levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelColors {
    pub none: &'static str,
    pub emerging: &'static str,
    pub developing: &'static str,
    pub advanced: &'static str,
}

impl LevelColors {
    #[must_use]
    pub fn for_level(&self, level: CoverageLevel) -> &'static str {
        match level {
            CoverageLevel::None => self.none,
            CoverageLevel::Emerging => self.emerging,
            CoverageLevel::Developing => self.developing,
            CoverageLevel::Advanced => self.advanced,
        }
    }
}

pub const SEMANTIC_COLORS: LevelColors = LevelColors {
    none: "#9ca3af",
    emerging: "#ef4444",
    developing: "#eab308",
    advanced: "#22c55e",
};

pub const PURE_RGB_COLORS: LevelColors = LevelColors {
    none: "#808080",
    emerging: "#ff0000",
    developing: "#ffff00",
    advanced: "#00ff00",
};

/// One hue per policy area, indexed by [`AreaId::index`].
pub const AREA_PALETTE: [&str; 10] = [
    "#dc2626", "#2563eb", "#16a34a", "#9333ea", "#ea580c", "#0891b2", "#ca8a04", "#db2777",
    "#65a30d", "#4f46e5",
];

pub const NO_POLICY_COLOR: &str = "#e5e7eb";

/// `none → gray`, `1-3 → red`, `4-7 → yellow`, `8-10 → green`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemanticColors;

impl ColorStrategy for SemanticColors {
    fn color_for(&self, coverage: &CountryCoverage) -> String {
        if coverage.masked {
            return self.no_data_color().to_owned();
        }
        SEMANTIC_COLORS.for_level(coverage.level).to_owned()
    }

    fn no_data_color(&self) -> &'static str {
        SEMANTIC_COLORS.none
    }
}

/// Same buckets as [`SemanticColors`] with saturated primaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct PureRgbColors;

impl ColorStrategy for PureRgbColors {
    fn color_for(&self, coverage: &CountryCoverage) -> String {
        if coverage.masked {
            return self.no_data_color().to_owned();
        }
        PURE_RGB_COLORS.for_level(coverage.level).to_owned()
    }

    fn no_data_color(&self) -> &'static str {
        PURE_RGB_COLORS.none
    }
}

/// Colors a country by the hue of its dominant policy area.
#[derive(Debug, Clone, Copy, Default)]
pub struct DominantAreaColors;

impl DominantAreaColors {
    #[must_use]
    pub fn area_color(area: AreaId) -> &'static str {
        AREA_PALETTE[area.index()]
    }
}

impl ColorStrategy for DominantAreaColors {
    fn color_for(&self, coverage: &CountryCoverage) -> String {
        match coverage.dominant_area {
            Some(area) if !coverage.masked => Self::area_color(area).to_owned(),
            _ => self.no_data_color().to_owned(),
        }
    }

    fn no_data_color(&self) -> &'static str {
        NO_POLICY_COLOR
    }
}

/// Decorative per-country coloring unrelated to policy data.
///
/// The first request for a country draws a random pastel; later requests
/// return the memoized value until [`AtlasColors::reset`].
#[derive(Debug, Default)]
pub struct AtlasColors {
    memo: Mutex<HashMap<String, String>>,
}

impl AtlasColors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Memoized color for `canonical_name`.
    #[must_use]
    pub fn color_of(&self, canonical_name: &str) -> String {
        let mut memo = self.memo.lock().unwrap_or_else(PoisonError::into_inner);
        memo.entry(canonical_name.to_owned())
            .or_insert_with(random_pastel)
            .clone()
    }

    /// Number of countries colored so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.memo.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reset(&self) {
        self.memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl ColorStrategy for AtlasColors {
    fn color_for(&self, coverage: &CountryCoverage) -> String {
        if coverage.masked {
            return self.no_data_color().to_owned();
        }
        self.color_of(&coverage.canonical_name)
    }

    fn no_data_color(&self) -> &'static str {
        NO_POLICY_COLOR
    }
}

fn random_pastel() -> String {
    let hue = rand::random::<f64>() * 360.0;
    let saturation = 0.45 + rand::random::<f64>() * 0.25;
    let lightness = 0.62 + rand::random::<f64>() * 0.13;
    let (r, g, b) = hsl_to_rgb(hue, saturation, lightness);
    format!("#{r:02x}{g:02x}{b:02x}")
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::many_single_char_names
)]
fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (u8, u8, u8) {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = (h % 360.0) / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r1, g1, b1) = match hp {
        hp if hp < 1.0 => (c, x, 0.0),
        hp if hp < 2.0 => (x, c, 0.0),
        hp if hp < 3.0 => (0.0, c, x),
        hp if hp < 4.0 => (0.0, x, c),
        hp if hp < 5.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    let channel = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    (channel(r1), channel(g1), channel(b1))
}

/// Holds one instance of every strategy and dispatches by [`ColorMode`].
///
/// The atlas memo lives here, so tests and views that need independent
/// atlas colorings construct independent palettes.
#[derive(Debug, Default)]
pub struct ColorPalette {
    semantic: SemanticColors,
    rgb_pure: PureRgbColors,
    area_dominant: DominantAreaColors,
    atlas: AtlasColors,
}

impl ColorPalette {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn strategy(&self, mode: ColorMode) -> &dyn ColorStrategy {
        match mode {
            ColorMode::Semantic => &self.semantic,
            ColorMode::RgbPure => &self.rgb_pure,
            ColorMode::AreaDominant => &self.area_dominant,
            ColorMode::Atlas => &self.atlas,
        }
    }

    #[must_use]
    pub fn color_for(&self, coverage: &CountryCoverage, mode: ColorMode) -> String {
        self.strategy(mode).color_for(coverage)
    }

    #[must_use]
    pub fn atlas(&self) -> &AtlasColors {
        &self.atlas
    }
}
