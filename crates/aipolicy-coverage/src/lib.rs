//! Coverage scoring, coloring, and search for the AI-policy map.
//!
//! Everything here is synchronous and free of I/O: the aggregator turns raw
//! backend records into a [`CoverageMap`], a [`ColorStrategy`] assigns
//! display colors, and a [`SearchIndex`] serves autocomplete over the same
//! canonical names.

pub mod aggregate;
pub mod color;
pub mod coverage;
pub mod search;
pub mod stats;

pub use aggregate::{AggregateOptions, CoverageAggregator};
pub use color::{
    AtlasColors, ColorMode, ColorPalette, ColorStrategy, DominantAreaColors, PureRgbColors,
    SemanticColors,
};
pub use coverage::{CountryCoverage, CoverageLevel, CoverageMap, NormalizedPolicy};
pub use search::SearchIndex;
pub use stats::{AdminStatistics, LevelCounts, MapStats};
