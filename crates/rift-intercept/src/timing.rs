//! Response timing: flat transfer durations and bandwidth-limited transfers.

use crate::error::ConstructionError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound on any computed transfer window.
const MAX_TRANSFER_WINDOW: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// How long the body of a simulated response takes to arrive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResponseTiming {
    /// Spread the whole body over this duration, regardless of its size.
    Fixed(Duration),
    /// Stream at this many kilobytes (1024 bytes) per second.
    Rate { kbps: f64 },
}

impl Default for ResponseTiming {
    fn default() -> Self {
        ResponseTiming::Fixed(Duration::ZERO)
    }
}

impl ResponseTiming {
    /// Interpret a signed timing value.
    ///
    /// `>= 0` is a total duration in seconds, `< 0` a rate in KB/s.
    pub fn from_signed(value: f64) -> Result<Self, ConstructionError> {
        if !value.is_finite() {
            return Err(ConstructionError::InvalidTiming(format!(
                "response time must be finite, got {value}"
            )));
        }
        if value < 0.0 {
            Ok(ResponseTiming::Rate { kbps: -value })
        } else {
            Duration::try_from_secs_f64(value)
                .map(ResponseTiming::Fixed)
                .map_err(|e| ConstructionError::InvalidTiming(e.to_string()))
        }
    }

    /// The signed representation accepted by [`ResponseTiming::from_signed`].
    pub fn as_signed(&self) -> f64 {
        match self {
            ResponseTiming::Fixed(d) => d.as_secs_f64(),
            ResponseTiming::Rate { kbps } => -kbps,
        }
    }

    /// Total time to transfer a body of `data_size` bytes.
    pub fn transfer_window(&self, data_size: u64) -> Duration {
        match self {
            ResponseTiming::Fixed(d) => (*d).min(MAX_TRANSFER_WINDOW),
            ResponseTiming::Rate { .. } if data_size == 0 => Duration::ZERO,
            ResponseTiming::Rate { kbps } => {
                let secs = data_size as f64 / (kbps * 1024.0);
                Duration::try_from_secs_f64(secs)
                    .unwrap_or(MAX_TRANSFER_WINDOW)
                    .min(MAX_TRANSFER_WINDOW)
            }
        }
    }
}

impl From<Bandwidth> for ResponseTiming {
    fn from(preset: Bandwidth) -> Self {
        ResponseTiming::Rate {
            kbps: preset.kbps(),
        }
    }
}

/// Named download speeds for simulating slow networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bandwidth {
    /// 8 kbps
    #[serde(rename = "1kbps")]
    OneKbps,
    /// 12 kbps
    Slow,
    /// 56 kbps
    Gprs,
    /// 128 kbps
    Edge,
    /// 3200 kbps
    #[serde(rename = "3g")]
    ThreeG,
    /// 7200 kbps
    #[serde(rename = "3g_plus", alias = "3g+")]
    ThreeGPlus,
    /// 12000 kbps
    Wifi,
}

impl Bandwidth {
    pub const ALL: [Bandwidth; 7] = [
        Bandwidth::OneKbps,
        Bandwidth::Slow,
        Bandwidth::Gprs,
        Bandwidth::Edge,
        Bandwidth::ThreeG,
        Bandwidth::ThreeGPlus,
        Bandwidth::Wifi,
    ];

    /// Speed in kilobytes per second.
    pub fn kbps(&self) -> f64 {
        let kilobits = match self {
            Bandwidth::OneKbps => 8.0,
            Bandwidth::Slow => 12.0,
            Bandwidth::Gprs => 56.0,
            Bandwidth::Edge => 128.0,
            Bandwidth::ThreeG => 3200.0,
            Bandwidth::ThreeGPlus => 7200.0,
            Bandwidth::Wifi => 12000.0,
        };
        kilobits / 8.0
    }

    /// Negative response-time value for APIs taking the signed form.
    pub fn as_response_time(&self) -> f64 {
        -self.kbps()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_positive_is_fixed() {
        let timing = ResponseTiming::from_signed(2.5).unwrap();
        assert_eq!(timing, ResponseTiming::Fixed(Duration::from_millis(2500)));
        assert_eq!(timing.transfer_window(0), Duration::from_millis(2500));
        assert_eq!(timing.transfer_window(1 << 20), Duration::from_millis(2500));
        assert_eq!(timing.as_signed(), 2.5);
    }

    #[test]
    fn test_signed_negative_is_rate() {
        let timing = ResponseTiming::from_signed(-100.0).unwrap();
        assert_eq!(timing, ResponseTiming::Rate { kbps: 100.0 });
        assert_eq!(timing.transfer_window(200 * 1024), Duration::from_secs(2));
        assert_eq!(timing.transfer_window(0), Duration::ZERO);
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(ResponseTiming::from_signed(f64::NAN).is_err());
        assert!(ResponseTiming::from_signed(f64::INFINITY).is_err());
        assert!(ResponseTiming::from_signed(f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn test_tiny_rate_is_capped() {
        let timing = ResponseTiming::from_signed(-1e-300).unwrap();
        assert_eq!(timing.transfer_window(1024), MAX_TRANSFER_WINDOW);
    }

    #[test]
    fn test_presets_are_ordered() {
        assert!(Bandwidth::OneKbps.kbps() < Bandwidth::Slow.kbps());
        assert!(Bandwidth::Gprs.kbps() < Bandwidth::Edge.kbps());
        assert!(Bandwidth::Edge.kbps() < Bandwidth::ThreeG.kbps());
        assert!(Bandwidth::ThreeG.kbps() < Bandwidth::ThreeGPlus.kbps());
        assert!(Bandwidth::ThreeGPlus.kbps() < Bandwidth::Wifi.kbps());
        assert_eq!(Bandwidth::OneKbps.kbps(), 1.0);
        assert_eq!(Bandwidth::Slow.as_response_time(), -1.5);
    }

    #[test]
    fn test_preset_serde_names() {
        let preset: Bandwidth = serde_yaml::from_str("3g+").unwrap();
        assert_eq!(preset, Bandwidth::ThreeGPlus);
        let preset: Bandwidth = serde_yaml::from_str("\"1kbps\"").unwrap();
        assert_eq!(preset, Bandwidth::OneKbps);
        let preset: Bandwidth = serde_yaml::from_str("edge").unwrap();
        assert_eq!(preset, Bandwidth::Edge);
    }
}
