//! Grouping parameters.
//!
//! Every threshold the grouping pipeline uses lives here. The structs load
//! from JSON with `#[serde(default)]`, so a config file only needs the fields
//! it overrides.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{LayoutError, Result};

/// Parameters for column detection and heuristic line grouping.
///
/// All distances are in normalized image units.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GroupingParams {
    /// Below this many lines the page is always a single column.
    pub column_min_lines: usize,

    /// Minimum spread of line x-centers before a column split is considered.
    pub column_min_spread: f64,

    /// Minimum horizontal gap between the right edge of the left column's
    /// x-centers and the left edge of the right column's.
    pub column_min_gap: f64,

    /// Floor of the title-to-description window.
    pub title_gap_floor: f64,

    /// Title window in multiples of the median line height.
    pub title_gap_factor: f64,

    /// Floor of the gap allowed between chained description lines.
    pub chain_gap_floor: f64,

    /// Chain gap in multiples of the median line height.
    pub chain_gap_factor: f64,

    /// Confidence below this marks the decision ambiguous.
    pub ambiguity_threshold: f64,

    /// Pages with more lines than this and no groups are suspicious.
    pub empty_result_line_limit: usize,

    /// Confidence cap applied to suspicious empty results.
    pub empty_result_confidence_cap: f64,
}

impl Default for GroupingParams {
    fn default() -> Self {
        Self {
            column_min_lines: 4,
            column_min_spread: 0.22,
            column_min_gap: 0.12,
            title_gap_floor: 0.14,
            title_gap_factor: 3.0,
            chain_gap_floor: 0.055,
            chain_gap_factor: 1.6,
            ambiguity_threshold: 0.75,
            empty_result_line_limit: 12,
            empty_result_confidence_cap: 0.6,
        }
    }
}

impl GroupingParams {
    /// Window between a title and the first description line below it.
    pub fn title_gap(&self, median_height: f64) -> f64 {
        self.title_gap_floor
            .max(self.title_gap_factor * median_height)
    }

    /// Largest gap between two chained description lines.
    pub fn chain_gap(&self, median_height: f64) -> f64 {
        self.chain_gap_floor
            .max(self.chain_gap_factor * median_height)
    }
}

/// Parameters of the semantic escalation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SemanticParams {
    /// Wall-clock bound for one semantic round-trip, in seconds.
    pub timeout_secs: f64,

    /// Only pages with more lines than this escalate.
    pub line_threshold: usize,

    /// Cluster segments geometrically when the semantic pass returns nothing.
    pub enable_cluster_fallback: bool,
}

impl Default for SemanticParams {
    fn default() -> Self {
        Self {
            timeout_secs: 12.0,
            line_threshold: 12,
            enable_cluster_fallback: true,
        }
    }
}

impl SemanticParams {
    /// The round-trip bound. Saturates instead of panicking for values
    /// [`EngineConfig::validate`] would reject.
    pub fn timeout(&self) -> Duration {
        match Duration::try_from_secs_f64(self.timeout_secs) {
            Ok(timeout) => timeout,
            Err(_) if self.timeout_secs > 0.0 => Duration::MAX,
            Err(_) => Duration::ZERO,
        }
    }
}

/// Parameters of the geometry-only segment clusterer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClusterParams {
    /// Segments whose x-center lies within this of a column centroid join it.
    pub column_tolerance: f64,

    /// Floor of the vertical gap that splits a group.
    pub gap_floor: f64,

    /// Vertical split gap in multiples of the median segment height.
    pub gap_factor: f64,

    /// Largest jump in source line index inside one group.
    pub max_source_line_gap: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            column_tolerance: 0.18,
            gap_floor: 0.02,
            gap_factor: 1.8,
            max_source_line_gap: 2,
        }
    }
}

/// Scoring weights of context fusion.
///
/// Both scores are lower-is-better; a fragment attaches to the best-scoring
/// dish only when the score is under the cutoff.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FusionParams {
    pub paragraph_dy_weight: f64,
    pub paragraph_dx_weight: f64,
    pub paragraph_overlap_weight: f64,
    /// A paragraph starting this far above the dish center is penalized.
    pub paragraph_above_margin: f64,
    pub paragraph_above_penalty: f64,
    /// A paragraph this far below the dish center is penalized.
    pub paragraph_far_below_margin: f64,
    pub paragraph_far_below_penalty: f64,
    pub paragraph_cutoff: f64,

    pub price_dy_weight: f64,
    pub price_dx_weight: f64,
    /// Applied when the price's x-center is left of the dish title's.
    pub price_left_penalty: f64,
    pub price_far_below_margin: f64,
    pub price_far_below_penalty: f64,
    pub price_cutoff: f64,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            paragraph_dy_weight: 1.8,
            paragraph_dx_weight: 0.9,
            paragraph_overlap_weight: 0.6,
            paragraph_above_margin: 0.04,
            paragraph_above_penalty: 0.7,
            paragraph_far_below_margin: 0.35,
            paragraph_far_below_penalty: 0.9,
            paragraph_cutoff: 2.0,
            price_dy_weight: 3.0,
            price_dx_weight: 0.8,
            price_left_penalty: 0.4,
            price_far_below_margin: 0.18,
            price_far_below_penalty: 1.0,
            price_cutoff: 1.6,
        }
    }
}

/// Every tunable of the engine, as loaded from a config file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub grouping: GroupingParams,
    pub semantic: SemanticParams,
    pub cluster: ClusterParams,
    pub fusion: FusionParams,
    /// Flow used when the caller names none.
    pub default_flow: Option<String>,
}

impl EngineConfig {
    /// Loads a JSON config file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values no grouping run can work with.
    pub fn validate(&self) -> Result<()> {
        let timeout = self.semantic.timeout_secs;
        if timeout <= 0.0 || Duration::try_from_secs_f64(timeout).is_err() {
            return Err(LayoutError::Config(format!(
                "semantic.timeout_secs must be a positive number of seconds, got {timeout}"
            )));
        }
        if self.grouping.ambiguity_threshold < 0.0 || self.grouping.ambiguity_threshold > 1.0 {
            return Err(LayoutError::Config(
                "grouping.ambiguity_threshold must be in [0, 1]".to_string(),
            ));
        }
        if self.cluster.column_tolerance <= 0.0 {
            return Err(LayoutError::Config(
                "cluster.column_tolerance must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_thresholds() {
        let params = GroupingParams::default();
        assert_eq!(params.title_gap(0.01), 0.14);
        assert!((params.title_gap(0.1) - 0.3).abs() < 1e-12);
        assert_eq!(params.chain_gap(0.01), 0.055);
        assert_eq!(SemanticParams::default().timeout(), Duration::from_secs(12));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"semantic":{"line_threshold":4},"fusion":{"price_cutoff":1.0}}"#)
                .unwrap();
        assert_eq!(config.semantic.line_threshold, 4);
        assert_eq!(config.semantic.timeout_secs, 12.0);
        assert_eq!(config.fusion.price_cutoff, 1.0);
        assert_eq!(config.fusion.paragraph_cutoff, 2.0);
        assert_eq!(config.grouping, GroupingParams::default());
    }

    #[test]
    fn validate_rejects_non_positive_timeout() {
        let mut config = EngineConfig::default();
        config.semantic.timeout_secs = 0.0;
        assert!(matches!(config.validate(), Err(LayoutError::Config(_))));
    }

    #[test]
    fn validate_rejects_timeouts_too_large_for_a_duration() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"semantic":{"timeout_secs":1e20}}"#).unwrap();
        assert!(matches!(config.validate(), Err(LayoutError::Config(_))));
        assert_eq!(config.semantic.timeout(), Duration::MAX);

        let nan = SemanticParams {
            timeout_secs: f64::NAN,
            ..SemanticParams::default()
        };
        assert_eq!(nan.timeout(), Duration::ZERO);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = EngineConfig::from_json_file("/nonexistent/menulayout.json").unwrap_err();
        assert!(matches!(err, LayoutError::Io(_)));
    }
}
