//! Planner tuning parameters.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Parameters of the grid search. Every field has a default, so partial JSON
/// documents are accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Grid edge length of the first, coarsest resolution (ly)
    #[serde(default = "default_initial_cube_side")]
    pub initial_cube_side: f64,

    /// The search stops once the grid edge shrinks to this (ly)
    #[serde(default = "default_minimum_cube_side")]
    pub minimum_cube_side: f64,

    /// Lower bound on the edge of the region scanned per step (ly)
    #[serde(default = "default_search_side")]
    pub search_side: f64,

    /// Advancing stops within `arrival_factor` cubes of the target
    #[serde(default = "default_arrival_factor")]
    pub arrival_factor: f64,

    /// A new waypoint must be closer to the target by more than this many cubes
    #[serde(default = "default_progress_factor")]
    pub progress_factor: f64,

    /// Grid edge multiplier applied after every resolution
    #[serde(default = "default_shrink_factor")]
    pub shrink_factor: f64,

    /// Longest allowed hop between consecutive waypoints (ly), unlimited when absent
    #[serde(default)]
    pub max_hop: Option<f64>,

    /// Percentile of target distance defining the candidate shell
    #[serde(default = "default_shell_percentile")]
    pub shell_percentile: f64,

    /// Percentile of scored weight kept as ranked candidates
    #[serde(default = "default_candidate_percentile")]
    pub candidate_percentile: f64,

    #[serde(default = "default_radius_cap_factor")]
    pub radius_cap_factor: f64,

    #[serde(default = "default_radius_cap_absolute")]
    pub radius_cap_absolute: f64,

    /// Systems requested per radius query
    #[serde(default = "default_nearest_limit")]
    pub nearest_limit: usize,

    #[serde(default = "default_max_iterations")]
    pub max_iterations_per_resolution: usize,

    /// Score candidate cubes on the rayon pool
    #[serde(default = "default_true")]
    pub parallel_scoring: bool,

    /// Finish the route with the target itself once it is within reach
    #[serde(default = "default_true")]
    pub append_target: bool,
}

fn default_initial_cube_side() -> f64 {
    40.0
}

fn default_minimum_cube_side() -> f64 {
    20.0
}

fn default_search_side() -> f64 {
    1200.0
}

fn default_arrival_factor() -> f64 {
    6.0
}

fn default_progress_factor() -> f64 {
    2.0
}

fn default_shrink_factor() -> f64 {
    0.8
}

fn default_shell_percentile() -> f64 {
    5.0
}

fn default_candidate_percentile() -> f64 {
    15.0
}

fn default_radius_cap_factor() -> f64 {
    5.0
}

fn default_radius_cap_absolute() -> f64 {
    200.0
}

fn default_nearest_limit() -> usize {
    5
}

fn default_max_iterations() -> usize {
    64
}

fn default_true() -> bool {
    true
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            initial_cube_side: default_initial_cube_side(),
            minimum_cube_side: default_minimum_cube_side(),
            search_side: default_search_side(),
            arrival_factor: default_arrival_factor(),
            progress_factor: default_progress_factor(),
            shrink_factor: default_shrink_factor(),
            max_hop: None,
            shell_percentile: default_shell_percentile(),
            candidate_percentile: default_candidate_percentile(),
            radius_cap_factor: default_radius_cap_factor(),
            radius_cap_absolute: default_radius_cap_absolute(),
            nearest_limit: default_nearest_limit(),
            max_iterations_per_resolution: default_max_iterations(),
            parallel_scoring: true,
            append_target: true,
        }
    }
}

impl PlannerConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: PlannerConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Returns a copy with the keys of a JSON object applied on top.
    pub fn with_overrides(&self, overrides: &Value) -> Result<Self, ConfigError> {
        let Value::Object(patch) = overrides else {
            return Err(ConfigError::Invalid("overrides must be a JSON object".into()));
        };
        let mut merged = serde_json::to_value(self)?;
        if let Value::Object(base) = &mut merged {
            for (key, value) in patch {
                base.insert(key.clone(), value.clone());
            }
        }
        let config: PlannerConfig = serde_json::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("initial_cube_side", self.initial_cube_side),
            ("minimum_cube_side", self.minimum_cube_side),
            ("search_side", self.search_side),
            ("arrival_factor", self.arrival_factor),
            ("radius_cap_factor", self.radius_cap_factor),
            ("radius_cap_absolute", self.radius_cap_absolute),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!("{name} must be positive, got {value}")));
            }
        }
        if !(self.progress_factor.is_finite() && self.progress_factor >= 0.0) {
            return Err(ConfigError::Invalid("progress_factor must be non-negative".into()));
        }
        if !(self.shrink_factor > 0.0 && self.shrink_factor < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "shrink_factor must be in (0, 1), got {}",
                self.shrink_factor
            )));
        }
        for (name, value) in [
            ("shell_percentile", self.shell_percentile),
            ("candidate_percentile", self.candidate_percentile),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::Invalid(format!("{name} must be within 0..=100")));
            }
        }
        if let Some(hop) = self.max_hop {
            if !(hop.is_finite() && hop > 0.0) {
                return Err(ConfigError::Invalid("max_hop must be positive".into()));
            }
        }
        if self.nearest_limit == 0 || self.max_iterations_per_resolution == 0 {
            return Err(ConfigError::Invalid(
                "nearest_limit and max_iterations_per_resolution must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Largest radius the waypoint resolver may search for a given grid edge.
    pub fn radius_cap(&self, cube_side: f64) -> f64 {
        (self.radius_cap_factor * cube_side).min(self.radius_cap_absolute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_json_uses_defaults() {
        let config = PlannerConfig::from_json_str(r#"{"max_hop": 60.0}"#).expect("config");
        assert_eq!(config.max_hop, Some(60.0));
        assert_eq!(config.initial_cube_side, 40.0);
        assert_eq!(config.search_side, 1200.0);
    }

    #[test]
    fn overrides_are_validated() {
        let base = PlannerConfig::default();
        let tuned = base
            .with_overrides(&json!({"minimum_cube_side": 10.0}))
            .expect("override");
        assert_eq!(tuned.minimum_cube_side, 10.0);

        let err = base.with_overrides(&json!({"shrink_factor": 1.5})).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(base.with_overrides(&json!([1, 2])).is_err());
    }

    #[test]
    fn radius_cap_is_bounded() {
        let config = PlannerConfig::default();
        assert_eq!(config.radius_cap(24.0), 120.0);
        assert_eq!(config.radius_cap(64.0), 200.0);
    }
}
