//! Plausibility check for signal-quality fields.

use crate::codec::DecodedValue;
use crate::config::QualityConfig;
use crate::error::SanityVetoError;

/// Vetoes a node's payload when a quality metric reads implausibly.
///
/// A field is a quality metric when its name starts with `prefix`. Readings
/// above `upper_bound`, or exactly zero, come from a radio that did not
/// actually hear the node.
#[derive(Debug, Clone, PartialEq)]
pub struct SanityFilter {
    prefix: String,
    upper_bound: f64,
}

impl Default for SanityFilter {
    fn default() -> Self {
        Self::from_config(&QualityConfig::default())
    }
}

impl SanityFilter {
    pub fn new(prefix: impl Into<String>, upper_bound: f64) -> Self {
        Self {
            prefix: prefix.into(),
            upper_bound,
        }
    }

    pub fn from_config(config: &QualityConfig) -> Self {
        Self::new(config.prefix.clone(), config.max)
    }

    /// Whether `field` is subject to the check. An empty prefix disables it.
    pub fn applies_to(&self, field: &str) -> bool {
        !self.prefix.is_empty() && field.starts_with(&self.prefix)
    }

    pub fn check(&self, field: &str, value: &DecodedValue) -> Result<(), SanityVetoError> {
        if !self.applies_to(field) {
            return Ok(());
        }

        let reading = value.as_f64();
        let reason = if reading > self.upper_bound {
            "above the plausible maximum"
        } else if reading == 0.0 {
            "exactly zero"
        } else {
            return Ok(());
        };

        Err(SanityVetoError {
            field: field.to_string(),
            value: reading,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Datacode, Numeric};

    fn value(v: u64) -> DecodedValue {
        DecodedValue {
            datacode: Datacode::UInt16,
            value: Numeric::Unsigned(v),
        }
    }

    #[test]
    fn test_default_bounds() {
        let filter = SanityFilter::default();

        assert!(filter.check("RSSI", &value(70)).is_ok());
        assert!(filter.check("RSSI", &value(1500)).is_ok());

        let err = filter.check("RSSI", &value(1501)).unwrap_err();
        assert_eq!(err.field, "RSSI");
        assert_eq!(err.value, 1501.0);

        let err = filter.check("RSSI_gw", &value(0)).unwrap_err();
        assert_eq!(err.reason, "exactly zero");
    }

    #[test]
    fn test_other_fields_pass() {
        let filter = SanityFilter::default();
        assert!(filter.check("Power", &value(0)).is_ok());
        assert!(filter.check("rssi", &value(9999)).is_ok());
    }

    #[test]
    fn test_configured_prefix() {
        let filter = SanityFilter::from_config(&QualityConfig {
            prefix: "LQI".to_string(),
            max: 255.0,
        });
        assert!(filter.check("LQI", &value(256)).is_err());
        assert!(filter.check("RSSI", &value(0)).is_ok());

        let disabled = SanityFilter::new("", 0.0);
        assert!(!disabled.applies_to("RSSI"));
        assert!(disabled.check("RSSI", &value(0)).is_ok());
    }
}
