use serde::{Deserialize, Serialize};

use crate::error::{FillError, Result};

/// Tuning for [`HoleFiller`](crate::fill::HoleFiller).
/// Defaults reproduce the classic behaviour: ten stability attempts, each
/// reducing the slope tenfold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillConfig {
    /// Elevation field to use when the grid has no `topographic__elevation`.
    pub elevation_field: Option<String>,
    /// Global stability attempts before giving up.
    pub max_stability_retries: u32,
    /// Factor applied to the slope after each rejected tilt, in (0, 1).
    pub slope_reduction: f64,
    /// Per-lake slope floor; reductions below it abandon the attempt.
    pub min_slope: f64,
    /// Cap on rounds of subsidiary lakes per attempt.
    pub max_subsidiary_rounds: u32,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            elevation_field: None,
            max_stability_retries: 10,
            slope_reduction: 0.1,
            min_slope: 1e-30,
            max_subsidiary_rounds: 100,
        }
    }
}

impl FillConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_stability_retries == 0 {
            return Err(FillError::InvalidConfig(
                "max_stability_retries must be at least 1".to_string(),
            ));
        }
        if !(self.slope_reduction > 0.0 && self.slope_reduction < 1.0) {
            return Err(FillError::InvalidConfig(format!(
                "slope_reduction {} must lie strictly between 0 and 1",
                self.slope_reduction
            )));
        }
        if !(self.min_slope.is_finite() && self.min_slope > 0.0) {
            return Err(FillError::InvalidConfig(format!(
                "min_slope {} must be positive and finite",
                self.min_slope
            )));
        }
        Ok(())
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)
            .map_err(|e| FillError::InvalidConfig(format!("cannot parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

/// Normalise the per-call slope argument: `None` and zero mean a flat fill.
pub(crate) fn resolve_slope(apply_slope: Option<f64>) -> Result<Option<f64>> {
    match apply_slope {
        None => Ok(None),
        Some(s) if s == 0.0 => Ok(None),
        Some(s) if s.is_finite() && s > 0.0 => Ok(Some(s)),
        Some(s) => Err(FillError::InvalidConfig(format!(
            "slope {s} must be a positive finite number"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(FillConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let config = FillConfig::from_json(r#"{"elevation_field":"dem","max_stability_retries":3}"#)
            .unwrap();
        assert_eq!(config.elevation_field.as_deref(), Some("dem"));
        assert_eq!(config.max_stability_retries, 3);
        assert_eq!(config.slope_reduction, 0.1);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let bad = FillConfig {
            slope_reduction: 1.0,
            ..FillConfig::default()
        };
        assert!(matches!(bad.validate(), Err(FillError::InvalidConfig(_))));
        let bad = FillConfig {
            max_stability_retries: 0,
            ..FillConfig::default()
        };
        assert!(bad.validate().is_err());
        assert!(FillConfig::from_json("{not json").is_err());
    }

    #[test]
    fn slope_argument_normalisation() {
        assert_eq!(resolve_slope(None).unwrap(), None);
        assert_eq!(resolve_slope(Some(0.0)).unwrap(), None);
        assert_eq!(resolve_slope(Some(1e-6)).unwrap(), Some(1e-6));
        assert!(resolve_slope(Some(-1e-6)).is_err());
        assert!(resolve_slope(Some(f64::NAN)).is_err());
    }
}
